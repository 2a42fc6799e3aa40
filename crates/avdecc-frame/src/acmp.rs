//! ACMP PDUs.

use bytes::{Buf, BufMut};

use crate::consts::{COMMON_CONTROL_HEADER_LEN, SUBTYPE_ACMP};
use crate::error::{ensure_capacity, ensure_len, FrameError, Result};
use crate::ether::MacAddr;
use crate::header::ControlHeader;

/// Full ACMPDU length, excluding the Ethernet header.
pub const ACMPDU_LEN: usize = 56;
/// control_data_length carried by every ACMPDU.
pub const ACMP_CONTROL_DATA_LEN: u16 = (ACMPDU_LEN - COMMON_CONTROL_HEADER_LEN) as u16;

/// Field offsets within an ACMPDU.
pub mod offsets {
    pub const STREAM_ID: usize = 4;
    pub const CONTROLLER_ENTITY_ID: usize = 12;
    pub const TALKER_ENTITY_ID: usize = 20;
    pub const LISTENER_ENTITY_ID: usize = 28;
    pub const TALKER_UNIQUE_ID: usize = 36;
    pub const LISTENER_UNIQUE_ID: usize = 38;
    pub const STREAM_DEST_MAC: usize = 40;
    pub const CONNECTION_COUNT: usize = 46;
    pub const SEQUENCE_ID: usize = 48;
    pub const FLAGS: usize = 50;
    pub const STREAM_VLAN_ID: usize = 52;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AcmpPdu {
    pub message_type: u8,
    pub status: u8,
    pub stream_id: u64,
    pub controller_entity_id: u64,
    pub talker_entity_id: u64,
    pub listener_entity_id: u64,
    pub talker_unique_id: u16,
    pub listener_unique_id: u16,
    pub stream_dest_mac: MacAddr,
    pub connection_count: u16,
    pub sequence_id: u16,
    pub flags: u16,
    pub stream_vlan_id: u16,
}

impl AcmpPdu {
    /// A command addressed from `controller_entity_id`; the sequence id is
    /// stamped later by the controller state machine.
    pub fn command(message_type: u8, controller_entity_id: u64) -> Self {
        Self {
            message_type,
            controller_entity_id,
            ..Self::default()
        }
    }

    /// Write the PDU at `pos`. Returns bytes written.
    pub fn encode(&self, dst: &mut [u8], pos: usize) -> Result<usize> {
        ensure_capacity(dst, pos, ACMPDU_LEN)?;
        ControlHeader {
            subtype: SUBTYPE_ACMP,
            message_type: self.message_type,
            status: self.status,
            control_data_length: ACMP_CONTROL_DATA_LEN,
            stream_id: self.stream_id,
        }
        .encode(dst, pos)?;

        let mut out = &mut dst[pos + COMMON_CONTROL_HEADER_LEN..pos + ACMPDU_LEN];
        out.put_u64(self.controller_entity_id);
        out.put_u64(self.talker_entity_id);
        out.put_u64(self.listener_entity_id);
        out.put_u16(self.talker_unique_id);
        out.put_u16(self.listener_unique_id);
        out.put_slice(&self.stream_dest_mac.0);
        out.put_u16(self.connection_count);
        out.put_u16(self.sequence_id);
        out.put_u16(self.flags);
        out.put_u16(self.stream_vlan_id);
        out.put_u16(0);
        Ok(ACMPDU_LEN)
    }

    /// Read an ACMPDU at `pos`.
    pub fn decode(src: &[u8], pos: usize) -> Result<Self> {
        ensure_len(src, pos, ACMPDU_LEN)?;
        let header = ControlHeader::decode(src, pos)?;
        if header.subtype != SUBTYPE_ACMP {
            return Err(FrameError::UnexpectedSubtype(header.subtype));
        }
        if header.control_data_length < ACMP_CONTROL_DATA_LEN {
            return Err(FrameError::ShortControlData {
                declared: header.control_data_length,
                required: ACMP_CONTROL_DATA_LEN,
            });
        }

        let mut input = &src[pos + COMMON_CONTROL_HEADER_LEN..pos + ACMPDU_LEN];
        let controller_entity_id = input.get_u64();
        let talker_entity_id = input.get_u64();
        let listener_entity_id = input.get_u64();
        let talker_unique_id = input.get_u16();
        let listener_unique_id = input.get_u16();
        let mut mac = [0u8; 6];
        input.copy_to_slice(&mut mac);
        let connection_count = input.get_u16();
        let sequence_id = input.get_u16();
        let flags = input.get_u16();
        let stream_vlan_id = input.get_u16();

        Ok(Self {
            message_type: header.message_type,
            status: header.status,
            stream_id: header.stream_id,
            controller_entity_id,
            talker_entity_id,
            listener_entity_id,
            talker_unique_id,
            listener_unique_id,
            stream_dest_mac: MacAddr(mac),
            connection_count,
            sequence_id,
            flags,
            stream_vlan_id,
        })
    }

    /// Response message types are odd.
    pub fn is_response(&self) -> bool {
        self.message_type & 1 == 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::{acmp_flags, acmp_message, acmp_status};

    fn connect_rx() -> AcmpPdu {
        AcmpPdu {
            talker_entity_id: 0x0011_2233_4455_6677,
            listener_entity_id: 0x8899_AABB_CCDD_EEFF,
            talker_unique_id: 2,
            listener_unique_id: 5,
            flags: acmp_flags::FAST_CONNECT,
            ..AcmpPdu::command(acmp_message::CONNECT_RX_COMMAND, 0x0102_0304_0506_0708)
        }
    }

    #[test]
    fn fields_land_at_offsets() {
        let mut pdu = connect_rx();
        pdu.sequence_id = 0xBEEF;
        let mut buf = [0u8; ACMPDU_LEN];
        assert_eq!(pdu.encode(&mut buf, 0).unwrap(), ACMPDU_LEN);

        assert_eq!(buf[0], 0xFC);
        assert_eq!(buf[1], acmp_message::CONNECT_RX_COMMAND);
        assert_eq!(u16::from_be_bytes([buf[2], buf[3]]), 44);
        assert_eq!(buf[offsets::CONTROLLER_ENTITY_ID], 0x01);
        assert_eq!(buf[offsets::TALKER_ENTITY_ID], 0x00);
        assert_eq!(buf[offsets::LISTENER_ENTITY_ID], 0x88);
        assert_eq!(&buf[offsets::TALKER_UNIQUE_ID..40], &[0, 2, 0, 5]);
        assert_eq!(&buf[offsets::SEQUENCE_ID..50], &[0xBE, 0xEF]);
        assert_eq!(&buf[offsets::FLAGS..52], &[0, 2]);
    }

    #[test]
    fn decode_response_with_status() {
        let mut pdu = connect_rx();
        pdu.message_type = acmp_message::CONNECT_RX_RESPONSE;
        pdu.status = acmp_status::CONTROLLER_NOT_AUTHORIZED;
        pdu.stream_dest_mac = MacAddr([0x91, 0xE0, 0xF0, 0x00, 0xAB, 0xCD]);
        pdu.connection_count = 1;

        let mut buf = vec![0u8; 14 + ACMPDU_LEN];
        pdu.encode(&mut buf, 14).unwrap();
        let back = AcmpPdu::decode(&buf, 14).unwrap();
        assert_eq!(back, pdu);
        assert!(back.is_response());
    }

    #[test]
    fn rejects_aecp_and_short_frames() {
        let mut buf = [0u8; ACMPDU_LEN];
        connect_rx().encode(&mut buf, 0).unwrap();
        buf[0] = 0xFB;
        assert_eq!(
            AcmpPdu::decode(&buf, 0),
            Err(FrameError::UnexpectedSubtype(0x7B))
        );
        assert!(matches!(
            AcmpPdu::decode(&buf[..40], 0),
            Err(FrameError::Truncated { .. })
        ));
    }
}
