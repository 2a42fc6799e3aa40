//! Read-only typed views over cached frames.
//!
//! A view shares the frame buffer it was built from and decodes fields on
//! each accessor call. Construction checks the region is long enough for
//! every fixed field, so accessors cannot fail.

use avdecc_frame::acmp::offsets as acmp;
use avdecc_frame::aecp::{
    offsets as aem, COUNTERS_BLOCK_WORDS, COUNTERS_PDU_LEN, STREAM_FORMAT_PDU_LEN,
    STREAM_INFO_PDU_LEN,
};
use avdecc_frame::descriptor::{external_port, stream_input, TalkerRef, OBJECT_NAME_LEN};
use avdecc_frame::{FrameError, MacAddr, ACMPDU_LEN};
use bytes::Buf;

use crate::descriptor::FrameInfo;
use crate::error::Result;

fn require(frame: &FrameInfo, need: usize) -> Result<()> {
    if frame.size() < need {
        return Err(FrameError::Truncated {
            len: frame.size(),
            need,
        }
        .into());
    }
    Ok(())
}

fn u8_at(frame: &FrameInfo, at: usize) -> u8 {
    frame.bytes()[at]
}

fn u16_at(frame: &FrameInfo, at: usize) -> u16 {
    (&frame.bytes()[at..]).get_u16()
}

fn u32_at(frame: &FrameInfo, at: usize) -> u32 {
    (&frame.bytes()[at..]).get_u32()
}

fn u64_at(frame: &FrameInfo, at: usize) -> u64 {
    (&frame.bytes()[at..]).get_u64()
}

fn mac_at(frame: &FrameInfo, at: usize) -> MacAddr {
    let mut mac = [0u8; 6];
    mac.copy_from_slice(&frame.bytes()[at..at + 6]);
    MacAddr(mac)
}

/// Status field of the common control header, bits 15..11 of bytes 2..4.
fn control_status(frame: &FrameInfo) -> u8 {
    frame.bytes()[2] >> 3
}

/// STREAM_INPUT descriptor snapshot.
#[derive(Debug, Clone)]
pub struct StreamInputDescriptorResponse {
    frame: FrameInfo,
}

impl StreamInputDescriptorResponse {
    pub fn new(frame: FrameInfo) -> Result<Self> {
        require(&frame, stream_input::FORMATS)?;
        Ok(Self { frame })
    }

    pub fn descriptor_index(&self) -> u16 {
        u16_at(&self.frame, stream_input::DESCRIPTOR_INDEX)
    }

    /// Object name up to the first NUL, lossily decoded.
    pub fn object_name(&self) -> String {
        let start = stream_input::OBJECT_NAME;
        let raw = &self.frame.bytes()[start..start + OBJECT_NAME_LEN];
        let end = raw.iter().position(|b| *b == 0).unwrap_or(raw.len());
        String::from_utf8_lossy(&raw[..end]).into_owned()
    }

    pub fn localized_description(&self) -> u16 {
        u16_at(&self.frame, stream_input::LOCALIZED_DESCRIPTION)
    }

    pub fn clock_domain_index(&self) -> u16 {
        u16_at(&self.frame, stream_input::CLOCK_DOMAIN_INDEX)
    }

    pub fn stream_flags(&self) -> u16 {
        u16_at(&self.frame, stream_input::STREAM_FLAGS)
    }

    pub fn current_format(&self) -> u64 {
        u64_at(&self.frame, stream_input::CURRENT_FORMAT)
    }

    pub fn formats_offset(&self) -> u16 {
        u16_at(&self.frame, stream_input::FORMATS_OFFSET)
    }

    pub fn number_of_formats(&self) -> u16 {
        u16_at(&self.frame, stream_input::NUMBER_OF_FORMATS)
    }

    /// Backup talker `n` (0..3).
    pub fn backup_talker(&self, n: usize) -> Option<TalkerRef> {
        let (entity_at, unique_at) = match n {
            0 => (stream_input::BACKUP_TALKER_ENTITY_ID_0, stream_input::BACKUP_TALKER_UNIQUE_ID_0),
            1 => (stream_input::BACKUP_TALKER_ENTITY_ID_1, stream_input::BACKUP_TALKER_UNIQUE_ID_1),
            2 => (stream_input::BACKUP_TALKER_ENTITY_ID_2, stream_input::BACKUP_TALKER_UNIQUE_ID_2),
            _ => return None,
        };
        Some(TalkerRef {
            entity_id: u64_at(&self.frame, entity_at),
            unique_id: u16_at(&self.frame, unique_at),
        })
    }

    pub fn backedup_talker(&self) -> TalkerRef {
        TalkerRef {
            entity_id: u64_at(&self.frame, stream_input::BACKEDUP_TALKER_ENTITY_ID),
            unique_id: u16_at(&self.frame, stream_input::BACKEDUP_TALKER_UNIQUE_ID),
        }
    }

    pub fn avb_interface_index(&self) -> u16 {
        u16_at(&self.frame, stream_input::AVB_INTERFACE_INDEX)
    }

    pub fn buffer_length(&self) -> u32 {
        u32_at(&self.frame, stream_input::BUFFER_LENGTH)
    }

    /// Supported format `n`, located through `formats_offset`. `None` past
    /// `number_of_formats` or past the end of the snapshot.
    pub fn format(&self, n: u16) -> Option<u64> {
        if n >= self.number_of_formats() {
            return None;
        }
        let at = usize::from(self.formats_offset()) + usize::from(n) * stream_input::FORMAT_LEN;
        (at + stream_input::FORMAT_LEN <= self.frame.size()).then(|| u64_at(&self.frame, at))
    }

    /// All supported formats that fit in the snapshot.
    pub fn formats(&self) -> Vec<u64> {
        (0..self.number_of_formats())
            .map_while(|n| self.format(n))
            .collect()
    }
}

/// EXTERNAL_PORT_INPUT descriptor snapshot.
#[derive(Debug, Clone)]
pub struct ExternalPortInputDescriptorResponse {
    frame: FrameInfo,
}

impl ExternalPortInputDescriptorResponse {
    pub fn new(frame: FrameInfo) -> Result<Self> {
        require(&frame, external_port::LEN)?;
        Ok(Self { frame })
    }

    pub fn descriptor_index(&self) -> u16 {
        u16_at(&self.frame, external_port::DESCRIPTOR_INDEX)
    }

    pub fn port_flags(&self) -> u16 {
        u16_at(&self.frame, external_port::PORT_FLAGS)
    }

    pub fn clock_domain_index(&self) -> u16 {
        u16_at(&self.frame, external_port::CLOCK_DOMAIN_INDEX)
    }

    pub fn number_of_controls(&self) -> u16 {
        u16_at(&self.frame, external_port::NUMBER_OF_CONTROLS)
    }

    pub fn base_control(&self) -> u16 {
        u16_at(&self.frame, external_port::BASE_CONTROL)
    }

    pub fn signal_type(&self) -> u16 {
        u16_at(&self.frame, external_port::SIGNAL_TYPE)
    }

    pub fn signal_index(&self) -> u16 {
        u16_at(&self.frame, external_port::SIGNAL_INDEX)
    }

    pub fn signal_output(&self) -> u16 {
        u16_at(&self.frame, external_port::SIGNAL_OUTPUT)
    }

    pub fn block_latency(&self) -> u32 {
        u32_at(&self.frame, external_port::BLOCK_LATENCY)
    }

    pub fn jack_index(&self) -> u16 {
        u16_at(&self.frame, external_port::JACK_INDEX)
    }
}

/// GET_STREAM_FORMAT / SET_STREAM_FORMAT response.
#[derive(Debug, Clone)]
pub struct StreamFormatResponse {
    frame: FrameInfo,
}

impl StreamFormatResponse {
    pub fn new(frame: FrameInfo) -> Result<Self> {
        require(&frame, STREAM_FORMAT_PDU_LEN)?;
        Ok(Self { frame })
    }

    pub fn status(&self) -> u8 {
        control_status(&self.frame)
    }

    pub fn stream_format(&self) -> u64 {
        u64_at(&self.frame, aem::STREAM_FORMAT)
    }
}

/// GET_STREAM_INFO / SET_STREAM_INFO response.
#[derive(Debug, Clone)]
pub struct StreamInfoResponse {
    frame: FrameInfo,
}

impl StreamInfoResponse {
    pub fn new(frame: FrameInfo) -> Result<Self> {
        require(&frame, STREAM_INFO_PDU_LEN)?;
        Ok(Self { frame })
    }

    pub fn status(&self) -> u8 {
        control_status(&self.frame)
    }

    pub fn flags(&self) -> u32 {
        u32_at(&self.frame, aem::STREAM_INFO_FLAGS)
    }

    pub fn has_flag(&self, flag: u32) -> bool {
        self.flags() & flag != 0
    }

    pub fn stream_format(&self) -> u64 {
        u64_at(&self.frame, aem::STREAM_INFO_STREAM_FORMAT)
    }

    pub fn stream_id(&self) -> u64 {
        u64_at(&self.frame, aem::STREAM_INFO_STREAM_ID)
    }

    pub fn msrp_accumulated_latency(&self) -> u32 {
        u32_at(&self.frame, aem::STREAM_INFO_MSRP_ACCUMULATED_LATENCY)
    }

    pub fn stream_dest_mac(&self) -> MacAddr {
        mac_at(&self.frame, aem::STREAM_INFO_STREAM_DEST_MAC)
    }

    pub fn msrp_failure_code(&self) -> u8 {
        u8_at(&self.frame, aem::STREAM_INFO_MSRP_FAILURE_CODE)
    }

    pub fn msrp_failure_bridge_id(&self) -> u64 {
        u64_at(&self.frame, aem::STREAM_INFO_MSRP_FAILURE_BRIDGE_ID)
    }

    pub fn stream_vlan_id(&self) -> u16 {
        u16_at(&self.frame, aem::STREAM_INFO_STREAM_VLAN_ID)
    }
}

/// STREAM_INPUT counters, by position in the GET_COUNTERS block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamInputCounter {
    MediaLocked = 0,
    MediaUnlocked = 1,
    StreamReset = 2,
    SeqNumMismatch = 3,
    MediaReset = 4,
    TimestampUncertain = 5,
    TimestampValid = 6,
    TimestampNotValid = 7,
    UnsupportedFormat = 8,
    LateTimestamp = 9,
    EarlyTimestamp = 10,
    FramesRx = 11,
    FramesTx = 12,
}

impl StreamInputCounter {
    pub const ALL: [StreamInputCounter; 13] = [
        StreamInputCounter::MediaLocked,
        StreamInputCounter::MediaUnlocked,
        StreamInputCounter::StreamReset,
        StreamInputCounter::SeqNumMismatch,
        StreamInputCounter::MediaReset,
        StreamInputCounter::TimestampUncertain,
        StreamInputCounter::TimestampValid,
        StreamInputCounter::TimestampNotValid,
        StreamInputCounter::UnsupportedFormat,
        StreamInputCounter::LateTimestamp,
        StreamInputCounter::EarlyTimestamp,
        StreamInputCounter::FramesRx,
        StreamInputCounter::FramesTx,
    ];

    /// Bit of this counter in `counters_valid`.
    pub fn valid_bit(self) -> u32 {
        1 << self as u32
    }

    pub fn name(self) -> &'static str {
        match self {
            StreamInputCounter::MediaLocked => "MEDIA_LOCKED",
            StreamInputCounter::MediaUnlocked => "MEDIA_UNLOCKED",
            StreamInputCounter::StreamReset => "STREAM_RESET",
            StreamInputCounter::SeqNumMismatch => "SEQ_NUM_MISMATCH",
            StreamInputCounter::MediaReset => "MEDIA_RESET",
            StreamInputCounter::TimestampUncertain => "TIMESTAMP_UNCERTAIN",
            StreamInputCounter::TimestampValid => "TIMESTAMP_VALID",
            StreamInputCounter::TimestampNotValid => "TIMESTAMP_NOT_VALID",
            StreamInputCounter::UnsupportedFormat => "UNSUPPORTED_FORMAT",
            StreamInputCounter::LateTimestamp => "LATE_TIMESTAMP",
            StreamInputCounter::EarlyTimestamp => "EARLY_TIMESTAMP",
            StreamInputCounter::FramesRx => "FRAMES_RX",
            StreamInputCounter::FramesTx => "FRAMES_TX",
        }
    }
}

/// GET_COUNTERS response.
#[derive(Debug, Clone)]
pub struct CountersResponse {
    frame: FrameInfo,
}

impl CountersResponse {
    pub fn new(frame: FrameInfo) -> Result<Self> {
        require(&frame, COUNTERS_PDU_LEN)?;
        Ok(Self { frame })
    }

    pub fn status(&self) -> u8 {
        control_status(&self.frame)
    }

    pub fn counters_valid(&self) -> u32 {
        u32_at(&self.frame, aem::COUNTERS_VALID)
    }

    /// Raw counter at `index` (0..32), whether or not it is marked valid.
    pub fn counter(&self, index: usize) -> Option<u32> {
        (index < COUNTERS_BLOCK_WORDS).then(|| u32_at(&self.frame, aem::COUNTERS_BLOCK + 4 * index))
    }

    /// A STREAM_INPUT counter, `None` unless the entity marked it valid.
    pub fn get(&self, counter: StreamInputCounter) -> Option<u32> {
        if self.counters_valid() & counter.valid_bit() == 0 {
            return None;
        }
        self.counter(counter as usize)
    }
}

/// ACMP GET_RX_STATE response.
#[derive(Debug, Clone)]
pub struct RxStateResponse {
    frame: FrameInfo,
}

impl RxStateResponse {
    pub fn new(frame: FrameInfo) -> Result<Self> {
        require(&frame, ACMPDU_LEN)?;
        Ok(Self { frame })
    }

    pub fn status(&self) -> u8 {
        control_status(&self.frame)
    }

    pub fn stream_id(&self) -> u64 {
        u64_at(&self.frame, acmp::STREAM_ID)
    }

    pub fn talker_entity_id(&self) -> u64 {
        u64_at(&self.frame, acmp::TALKER_ENTITY_ID)
    }

    pub fn listener_entity_id(&self) -> u64 {
        u64_at(&self.frame, acmp::LISTENER_ENTITY_ID)
    }

    pub fn talker_unique_id(&self) -> u16 {
        u16_at(&self.frame, acmp::TALKER_UNIQUE_ID)
    }

    pub fn listener_unique_id(&self) -> u16 {
        u16_at(&self.frame, acmp::LISTENER_UNIQUE_ID)
    }

    pub fn stream_dest_mac(&self) -> MacAddr {
        mac_at(&self.frame, acmp::STREAM_DEST_MAC)
    }

    pub fn connection_count(&self) -> u16 {
        u16_at(&self.frame, acmp::CONNECTION_COUNT)
    }

    pub fn flags(&self) -> u16 {
        u16_at(&self.frame, acmp::FLAGS)
    }

    pub fn stream_vlan_id(&self) -> u16 {
        u16_at(&self.frame, acmp::STREAM_VLAN_ID)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use avdecc_frame::aecp::stream_info_flags;
    use avdecc_frame::consts::{acmp_message, aecp_message, aem_command, descriptor_type};
    use avdecc_frame::{
        AcmpPdu, AemPayload, AemPdu, Counters, StreamInfo, StreamInputDescriptor, ETHER_HDR_SIZE,
    };
    use bytes::Bytes;

    fn aem_response(command_type: u16, payload: AemPayload) -> FrameInfo {
        let mut pdu = AemPdu::command(1, command_type, descriptor_type::STREAM_INPUT, 0, payload);
        pdu.header.message_type = aecp_message::AEM_RESPONSE;
        pdu.header.status = 9;
        let mut buf = vec![0u8; ETHER_HDR_SIZE + pdu.encoded_len()];
        pdu.encode(&mut buf, ETHER_HDR_SIZE).unwrap();
        FrameInfo::new(Bytes::from(buf), ETHER_HDR_SIZE, pdu.encoded_len()).unwrap()
    }

    #[test]
    fn stream_input_descriptor_fields() {
        let desc = StreamInputDescriptor {
            descriptor_index: 4,
            object_name: "Stage Left".into(),
            clock_domain_index: 1,
            stream_flags: 0x0002,
            current_format: 0x00A0_0208_4000_0800,
            backup_talkers: [
                TalkerRef::default(),
                TalkerRef {
                    entity_id: 0x55,
                    unique_id: 6,
                },
                TalkerRef::default(),
            ],
            backedup_talker: TalkerRef {
                entity_id: 0x77,
                unique_id: 8,
            },
            buffer_length: 666,
            formats: vec![1, 2, 3],
            ..StreamInputDescriptor::default()
        };
        let mut buf = vec![0u8; 42 + desc.encoded_len()];
        desc.encode(&mut buf, 42).unwrap();
        let view = StreamInputDescriptorResponse::new(
            FrameInfo::new(Bytes::from(buf), 42, desc.encoded_len()).unwrap(),
        )
        .unwrap();

        assert_eq!(view.descriptor_index(), 4);
        assert_eq!(view.object_name(), "Stage Left");
        assert_eq!(view.clock_domain_index(), 1);
        assert_eq!(view.stream_flags(), 2);
        assert_eq!(view.current_format(), 0x00A0_0208_4000_0800);
        assert_eq!(view.number_of_formats(), 3);
        assert_eq!(view.backup_talker(1).unwrap().unique_id, 6);
        assert_eq!(view.backup_talker(3), None);
        assert_eq!(view.backedup_talker().entity_id, 0x77);
        assert_eq!(view.buffer_length(), 666);
        assert_eq!(view.formats(), vec![1, 2, 3]);
        assert_eq!(view.format(3), None);
    }

    #[test]
    fn formats_stop_at_snapshot_end() {
        let desc = StreamInputDescriptor {
            formats: vec![1, 2],
            ..StreamInputDescriptor::default()
        };
        let mut buf = vec![0u8; desc.encoded_len()];
        desc.encode(&mut buf, 0).unwrap();
        let view = StreamInputDescriptorResponse::new(
            FrameInfo::new(Bytes::from(buf), 0, desc.encoded_len() - 8).unwrap(),
        )
        .unwrap();
        assert_eq!(view.formats(), vec![1]);
    }

    #[test]
    fn short_frames_rejected() {
        let short = FrameInfo::new(Bytes::from_static(&[0u8; 30]), 0, 30).unwrap();
        assert!(StreamInputDescriptorResponse::new(short.clone()).is_err());
        assert!(StreamFormatResponse::new(short.clone()).is_err());
        assert!(CountersResponse::new(short.clone()).is_err());
        assert!(RxStateResponse::new(short).is_err());
    }

    #[test]
    fn stream_format_and_status() {
        let view = StreamFormatResponse::new(aem_response(
            aem_command::GET_STREAM_FORMAT,
            AemPayload::StreamFormat(0x00A0_0208_4000_0800),
        ))
        .unwrap();
        assert_eq!(view.stream_format(), 0x00A0_0208_4000_0800);
        assert_eq!(view.status(), 9);
    }

    #[test]
    fn stream_info_fields() {
        let info = StreamInfo {
            flags: stream_info_flags::CONNECTED | stream_info_flags::STREAM_VLAN_ID_VALID,
            stream_id: 0xABCD,
            stream_dest_mac: MacAddr([0x91, 0xE0, 0xF0, 0, 0, 1]),
            msrp_failure_code: 3,
            stream_vlan_id: 2,
            ..StreamInfo::default()
        };
        let view = StreamInfoResponse::new(aem_response(
            aem_command::GET_STREAM_INFO,
            AemPayload::StreamInfo(info),
        ))
        .unwrap();
        assert!(view.has_flag(stream_info_flags::CONNECTED));
        assert!(!view.has_flag(stream_info_flags::STREAM_ID_VALID));
        assert_eq!(view.stream_id(), 0xABCD);
        assert_eq!(view.stream_dest_mac(), info.stream_dest_mac);
        assert_eq!(view.msrp_failure_code(), 3);
        assert_eq!(view.stream_vlan_id(), 2);
    }

    #[test]
    fn counters_respect_valid_bits() {
        let mut counters = Counters::default();
        counters.counters_valid = StreamInputCounter::FramesRx.valid_bit();
        counters.counters[StreamInputCounter::FramesRx as usize] = 1234;
        counters.counters[StreamInputCounter::MediaLocked as usize] = 5;
        let view = CountersResponse::new(aem_response(
            aem_command::GET_COUNTERS,
            AemPayload::Counters(counters),
        ))
        .unwrap();

        assert_eq!(view.get(StreamInputCounter::FramesRx), Some(1234));
        assert_eq!(view.get(StreamInputCounter::MediaLocked), None);
        assert_eq!(view.counter(0), Some(5));
        assert_eq!(view.counter(32), None);
    }

    #[test]
    fn rx_state_fields() {
        let pdu = AcmpPdu {
            message_type: acmp_message::GET_RX_STATE_RESPONSE,
            stream_id: 0x1234,
            talker_entity_id: 0xAA,
            listener_entity_id: 0xBB,
            talker_unique_id: 1,
            listener_unique_id: 2,
            connection_count: 1,
            stream_vlan_id: 2,
            ..AcmpPdu::default()
        };
        let mut buf = vec![0u8; ETHER_HDR_SIZE + ACMPDU_LEN];
        pdu.encode(&mut buf, ETHER_HDR_SIZE).unwrap();
        let view = RxStateResponse::new(
            FrameInfo::new(Bytes::from(buf), ETHER_HDR_SIZE, ACMPDU_LEN).unwrap(),
        )
        .unwrap();
        assert_eq!(view.stream_id(), 0x1234);
        assert_eq!(view.talker_entity_id(), 0xAA);
        assert_eq!(view.listener_unique_id(), 2);
        assert_eq!(view.connection_count(), 1);
        assert_eq!(view.stream_vlan_id(), 2);
    }
}
