//! AECP AEM command and response PDUs.
//!
//! Offsets in this module are relative to the start of the AVTP PDU, i.e.
//! the byte after the Ethernet header.

use bytes::{Buf, BufMut};

use crate::consts::{aecp_message, aem_command, COMMON_CONTROL_HEADER_LEN, SUBTYPE_AECP};
use crate::error::{ensure_capacity, ensure_len, FrameError, Result};
use crate::ether::MacAddr;
use crate::header::ControlHeader;

/// Common control header + controller_entity_id + sequence_id + command_type.
pub const AEM_HEADER_LEN: usize = 24;
/// AEM header + descriptor_type + descriptor_index.
pub const AEM_DESCRIPTOR_PDU_LEN: usize = 28;
/// GET/SET_STREAM_FORMAT carrying a stream format.
pub const STREAM_FORMAT_PDU_LEN: usize = 36;
/// GET/SET_STREAM_INFO carrying the full stream info block.
pub const STREAM_INFO_PDU_LEN: usize = 72;
/// GET_COUNTERS response: counters_valid + 32 counters.
pub const COUNTERS_PDU_LEN: usize = 160;
/// Number of 32-bit counters in a GET_COUNTERS response.
pub const COUNTERS_BLOCK_WORDS: usize = 32;

/// Field offsets within an AEM PDU.
pub mod offsets {
    pub const CONTROLLER_ENTITY_ID: usize = 12;
    pub const SEQUENCE_ID: usize = 20;
    pub const COMMAND_TYPE: usize = 22;
    pub const DESCRIPTOR_TYPE: usize = 24;
    pub const DESCRIPTOR_INDEX: usize = 26;

    pub const STREAM_FORMAT: usize = 28;

    pub const STREAM_INFO_FLAGS: usize = 28;
    pub const STREAM_INFO_STREAM_FORMAT: usize = 32;
    pub const STREAM_INFO_STREAM_ID: usize = 40;
    pub const STREAM_INFO_MSRP_ACCUMULATED_LATENCY: usize = 48;
    pub const STREAM_INFO_STREAM_DEST_MAC: usize = 52;
    pub const STREAM_INFO_MSRP_FAILURE_CODE: usize = 58;
    pub const STREAM_INFO_MSRP_FAILURE_BRIDGE_ID: usize = 60;
    pub const STREAM_INFO_STREAM_VLAN_ID: usize = 68;

    pub const COUNTERS_VALID: usize = 28;
    pub const COUNTERS_BLOCK: usize = 32;
}

/// GET/SET_STREAM_INFO `flags` bits.
pub mod stream_info_flags {
    pub const CLASS_B: u32 = 0x0000_0001;
    pub const FAST_CONNECT: u32 = 0x0000_0002;
    pub const SAVED_STATE: u32 = 0x0000_0004;
    pub const STREAMING_WAIT: u32 = 0x0000_0008;
    pub const SUPPORTS_ENCRYPTED: u32 = 0x0000_0010;
    pub const ENCRYPTED_PDUS: u32 = 0x0000_0020;
    pub const TALKER_FAILED: u32 = 0x0000_0040;
    pub const STREAM_VLAN_ID_VALID: u32 = 0x0200_0000;
    pub const CONNECTED: u32 = 0x0400_0000;
    pub const MSRP_FAILURE_VALID: u32 = 0x0800_0000;
    pub const STREAM_DEST_MAC_VALID: u32 = 0x1000_0000;
    pub const MSRP_ACC_LAT_VALID: u32 = 0x2000_0000;
    pub const STREAM_ID_VALID: u32 = 0x4000_0000;
    pub const STREAM_FORMAT_VALID: u32 = 0x8000_0000;
}

/// AECP header as used by AEM commands and responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AemHeader {
    pub message_type: u8,
    pub status: u8,
    pub control_data_length: u16,
    pub target_entity_id: u64,
    pub controller_entity_id: u64,
    pub sequence_id: u16,
    pub unsolicited: bool,
    /// Command type without the unsolicited bit.
    pub command_type: u16,
}

impl AemHeader {
    pub fn is_response(&self) -> bool {
        self.message_type == aecp_message::AEM_RESPONSE
    }

    /// Write the header at `pos`. Returns bytes written.
    pub fn encode(&self, dst: &mut [u8], pos: usize) -> Result<usize> {
        ensure_capacity(dst, pos, AEM_HEADER_LEN)?;
        ControlHeader {
            subtype: SUBTYPE_AECP,
            message_type: self.message_type,
            status: self.status,
            control_data_length: self.control_data_length,
            stream_id: self.target_entity_id,
        }
        .encode(dst, pos)?;

        let mut out = &mut dst[pos + COMMON_CONTROL_HEADER_LEN..pos + AEM_HEADER_LEN];
        out.put_u64(self.controller_entity_id);
        out.put_u16(self.sequence_id);
        let u_bit = if self.unsolicited {
            aem_command::UNSOLICITED_FLAG
        } else {
            0
        };
        out.put_u16(u_bit | (self.command_type & aem_command::COMMAND_TYPE_MASK));
        Ok(AEM_HEADER_LEN)
    }

    /// Read an AEM header at `pos`, rejecting other subtypes and AECP message types.
    pub fn decode(src: &[u8], pos: usize) -> Result<Self> {
        ensure_len(src, pos, AEM_HEADER_LEN)?;
        let common = ControlHeader::decode(src, pos)?;
        if common.subtype != SUBTYPE_AECP {
            return Err(FrameError::UnexpectedSubtype(common.subtype));
        }
        if common.message_type != aecp_message::AEM_COMMAND
            && common.message_type != aecp_message::AEM_RESPONSE
        {
            return Err(FrameError::UnsupportedMessageType(common.message_type));
        }

        let mut input = &src[pos + COMMON_CONTROL_HEADER_LEN..pos + AEM_HEADER_LEN];
        let controller_entity_id = input.get_u64();
        let sequence_id = input.get_u16();
        let raw_command = input.get_u16();

        Ok(Self {
            message_type: common.message_type,
            status: common.status,
            control_data_length: common.control_data_length,
            target_entity_id: common.stream_id,
            controller_entity_id,
            sequence_id,
            unsolicited: raw_command & aem_command::UNSOLICITED_FLAG != 0,
            command_type: raw_command & aem_command::COMMAND_TYPE_MASK,
        })
    }
}

/// Body of SET_STREAM_INFO commands and GET/SET_STREAM_INFO responses.
///
/// Only fields whose `*_VALID` bit is set in `flags` carry meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreamInfo {
    pub flags: u32,
    pub stream_format: u64,
    pub stream_id: u64,
    pub msrp_accumulated_latency: u32,
    pub stream_dest_mac: MacAddr,
    pub msrp_failure_code: u8,
    pub msrp_failure_bridge_id: u64,
    pub stream_vlan_id: u16,
}

impl StreamInfo {
    pub fn has_flag(&self, flag: u32) -> bool {
        self.flags & flag != 0
    }
}

/// Body of a GET_COUNTERS response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Counters {
    pub counters_valid: u32,
    pub counters: [u32; COUNTERS_BLOCK_WORDS],
}

impl Default for Counters {
    fn default() -> Self {
        Self {
            counters_valid: 0,
            counters: [0; COUNTERS_BLOCK_WORDS],
        }
    }
}

/// Command-specific body following descriptor_type/descriptor_index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AemPayload {
    Empty,
    StreamFormat(u64),
    StreamInfo(StreamInfo),
    Counters(Counters),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    Empty,
    StreamFormat,
    StreamInfo,
    Counters,
}

impl Layout {
    fn pdu_len(self) -> usize {
        match self {
            Layout::Empty => AEM_DESCRIPTOR_PDU_LEN,
            Layout::StreamFormat => STREAM_FORMAT_PDU_LEN,
            Layout::StreamInfo => STREAM_INFO_PDU_LEN,
            Layout::Counters => COUNTERS_PDU_LEN,
        }
    }

    fn of(payload: &AemPayload) -> Self {
        match payload {
            AemPayload::Empty => Layout::Empty,
            AemPayload::StreamFormat(_) => Layout::StreamFormat,
            AemPayload::StreamInfo(_) => Layout::StreamInfo,
            AemPayload::Counters(_) => Layout::Counters,
        }
    }
}

fn layout_for(command_type: u16, is_response: bool) -> Result<Layout> {
    let layout = match (command_type, is_response) {
        (aem_command::GET_STREAM_FORMAT, false) => Layout::Empty,
        (aem_command::GET_STREAM_FORMAT, true) => Layout::StreamFormat,
        (aem_command::SET_STREAM_FORMAT, _) => Layout::StreamFormat,
        (aem_command::GET_STREAM_INFO, false) => Layout::Empty,
        (aem_command::GET_STREAM_INFO, true) => Layout::StreamInfo,
        (aem_command::SET_STREAM_INFO, _) => Layout::StreamInfo,
        (aem_command::START_STREAMING, _) | (aem_command::STOP_STREAMING, _) => Layout::Empty,
        (aem_command::GET_COUNTERS, false) => Layout::Empty,
        (aem_command::GET_COUNTERS, true) => Layout::Counters,
        (other, _) => return Err(FrameError::UnsupportedCommand(other)),
    };
    Ok(layout)
}

/// Encoded PDU length (excluding Ethernet header) of an AEM message.
pub fn aem_pdu_len(command_type: u16, is_response: bool) -> Result<usize> {
    layout_for(command_type, is_response).map(Layout::pdu_len)
}

/// An AEM command or response addressed to one descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AemPdu {
    pub header: AemHeader,
    pub descriptor_type: u16,
    pub descriptor_index: u16,
    pub payload: AemPayload,
}

impl AemPdu {
    /// A zeroed command with control_data_length filled in.
    ///
    /// `target_entity_id` and `sequence_id` are left at zero for the
    /// controller state machine to stamp.
    pub fn command(
        controller_entity_id: u64,
        command_type: u16,
        descriptor_type: u16,
        descriptor_index: u16,
        payload: AemPayload,
    ) -> Self {
        let len = Layout::of(&payload).pdu_len();
        Self {
            header: AemHeader {
                message_type: aecp_message::AEM_COMMAND,
                status: 0,
                control_data_length: (len - COMMON_CONTROL_HEADER_LEN) as u16,
                target_entity_id: 0,
                controller_entity_id,
                sequence_id: 0,
                unsolicited: false,
                command_type,
            },
            descriptor_type,
            descriptor_index,
            payload,
        }
    }

    /// Length of this PDU once encoded.
    pub fn encoded_len(&self) -> usize {
        Layout::of(&self.payload).pdu_len()
    }

    /// Write the PDU at `pos`. Returns bytes written.
    ///
    /// Fails without touching `dst` if the payload variant is not the one the
    /// command type uses or the buffer is too small.
    pub fn encode(&self, dst: &mut [u8], pos: usize) -> Result<usize> {
        let expected = layout_for(self.header.command_type, self.header.is_response())?;
        if expected != Layout::of(&self.payload) {
            return Err(FrameError::PayloadMismatch(self.header.command_type));
        }
        let len = expected.pdu_len();
        ensure_capacity(dst, pos, len)?;

        self.header.encode(dst, pos)?;
        let mut out = &mut dst[pos + AEM_HEADER_LEN..pos + len];
        out.put_u16(self.descriptor_type);
        out.put_u16(self.descriptor_index);
        match &self.payload {
            AemPayload::Empty => {}
            AemPayload::StreamFormat(format) => out.put_u64(*format),
            AemPayload::StreamInfo(info) => {
                out.put_u32(info.flags);
                out.put_u64(info.stream_format);
                out.put_u64(info.stream_id);
                out.put_u32(info.msrp_accumulated_latency);
                out.put_slice(&info.stream_dest_mac.0);
                out.put_u8(info.msrp_failure_code);
                out.put_u8(0);
                out.put_u64(info.msrp_failure_bridge_id);
                out.put_u16(info.stream_vlan_id);
                out.put_u16(0);
            }
            AemPayload::Counters(counters) => {
                out.put_u32(counters.counters_valid);
                for value in counters.counters {
                    out.put_u32(value);
                }
            }
        }
        Ok(len)
    }

    /// Read an AEM PDU at `pos`, selecting the body layout from the command type.
    pub fn decode(src: &[u8], pos: usize) -> Result<Self> {
        let header = AemHeader::decode(src, pos)?;
        let layout = layout_for(header.command_type, header.is_response())?;
        let len = layout.pdu_len();
        ensure_len(src, pos, len)?;

        let required = (len - COMMON_CONTROL_HEADER_LEN) as u16;
        if header.control_data_length < required {
            return Err(FrameError::ShortControlData {
                declared: header.control_data_length,
                required,
            });
        }

        let mut input = &src[pos + AEM_HEADER_LEN..pos + len];
        let descriptor_type = input.get_u16();
        let descriptor_index = input.get_u16();
        let payload = match layout {
            Layout::Empty => AemPayload::Empty,
            Layout::StreamFormat => AemPayload::StreamFormat(input.get_u64()),
            Layout::StreamInfo => {
                let flags = input.get_u32();
                let stream_format = input.get_u64();
                let stream_id = input.get_u64();
                let msrp_accumulated_latency = input.get_u32();
                let mut mac = [0u8; 6];
                input.copy_to_slice(&mut mac);
                let msrp_failure_code = input.get_u8();
                input.advance(1);
                let msrp_failure_bridge_id = input.get_u64();
                let stream_vlan_id = input.get_u16();
                AemPayload::StreamInfo(StreamInfo {
                    flags,
                    stream_format,
                    stream_id,
                    msrp_accumulated_latency,
                    stream_dest_mac: MacAddr(mac),
                    msrp_failure_code,
                    msrp_failure_bridge_id,
                    stream_vlan_id,
                })
            }
            Layout::Counters => {
                let counters_valid = input.get_u32();
                let mut counters = [0u32; COUNTERS_BLOCK_WORDS];
                for value in counters.iter_mut() {
                    *value = input.get_u32();
                }
                AemPayload::Counters(Counters {
                    counters_valid,
                    counters,
                })
            }
        };

        Ok(Self {
            header,
            descriptor_type,
            descriptor_index,
            payload,
        })
    }

    /// The stream format carried by this PDU, if its layout has one.
    pub fn stream_format(&self) -> Option<u64> {
        match &self.payload {
            AemPayload::StreamFormat(format) => Some(*format),
            AemPayload::StreamInfo(info) => Some(info.stream_format),
            _ => None,
        }
    }
}
