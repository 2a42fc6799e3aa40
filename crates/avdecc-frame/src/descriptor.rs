//! AEM descriptor layouts.
//!
//! Descriptors arrive as the body of a READ_DESCRIPTOR response, starting at
//! [`READ_DESCRIPTOR_PAYLOAD_OFFSET`] within the AECP PDU. Offsets below are
//! relative to the first byte of the descriptor itself.

use bytes::BufMut;

use crate::aecp::AemHeader;
use crate::consts::{aecp_message, aem_command, descriptor_type, COMMON_CONTROL_HEADER_LEN};
use crate::error::{ensure_capacity, ensure_len, FrameError, Result};

/// Descriptor start within a READ_DESCRIPTOR response PDU
/// (AEM header + configuration_index + reserved).
pub const READ_DESCRIPTOR_PAYLOAD_OFFSET: usize = 28;

/// Length of an AEM object name.
pub const OBJECT_NAME_LEN: usize = 64;

/// STREAM_INPUT / STREAM_OUTPUT descriptor layout.
pub mod stream_input {
    pub const DESCRIPTOR_TYPE: usize = 0;
    pub const DESCRIPTOR_INDEX: usize = 2;
    pub const OBJECT_NAME: usize = 4;
    pub const LOCALIZED_DESCRIPTION: usize = 68;
    pub const CLOCK_DOMAIN_INDEX: usize = 70;
    pub const STREAM_FLAGS: usize = 72;
    pub const CURRENT_FORMAT: usize = 74;
    pub const FORMATS_OFFSET: usize = 82;
    pub const NUMBER_OF_FORMATS: usize = 84;
    pub const BACKUP_TALKER_ENTITY_ID_0: usize = 86;
    pub const BACKUP_TALKER_UNIQUE_ID_0: usize = 94;
    pub const BACKUP_TALKER_ENTITY_ID_1: usize = 96;
    pub const BACKUP_TALKER_UNIQUE_ID_1: usize = 104;
    pub const BACKUP_TALKER_ENTITY_ID_2: usize = 106;
    pub const BACKUP_TALKER_UNIQUE_ID_2: usize = 114;
    pub const BACKEDUP_TALKER_ENTITY_ID: usize = 116;
    pub const BACKEDUP_TALKER_UNIQUE_ID: usize = 124;
    pub const AVB_INTERFACE_INDEX: usize = 126;
    pub const BUFFER_LENGTH: usize = 128;
    /// Start of the formats array and the fixed part's length.
    pub const FORMATS: usize = 132;
    pub const FORMAT_LEN: usize = 8;

    /// Length of a descriptor listing `number_of_formats` formats.
    pub const fn len(number_of_formats: u16) -> usize {
        FORMATS + FORMAT_LEN * number_of_formats as usize
    }
}

/// EXTERNAL_PORT_INPUT / EXTERNAL_PORT_OUTPUT descriptor layout.
pub mod external_port {
    pub const DESCRIPTOR_TYPE: usize = 0;
    pub const DESCRIPTOR_INDEX: usize = 2;
    pub const PORT_FLAGS: usize = 4;
    pub const CLOCK_DOMAIN_INDEX: usize = 6;
    pub const NUMBER_OF_CONTROLS: usize = 8;
    pub const BASE_CONTROL: usize = 10;
    pub const SIGNAL_TYPE: usize = 12;
    pub const SIGNAL_INDEX: usize = 14;
    pub const SIGNAL_OUTPUT: usize = 16;
    pub const BLOCK_LATENCY: usize = 18;
    pub const JACK_INDEX: usize = 22;
    pub const LEN: usize = 24;
}

/// Overwrite `current_format` of the STREAM_INPUT descriptor at `pos`.
///
/// Leaves every other byte of `buf` untouched.
pub fn set_current_format(buf: &mut [u8], pos: usize, format: u64) -> Result<()> {
    ensure_len(buf, pos, stream_input::FORMATS)?;
    let at = pos + stream_input::CURRENT_FORMAT;
    buf[at..at + 8].copy_from_slice(&format.to_be_bytes());
    Ok(())
}

/// Write a READ_DESCRIPTOR response PDU at `pos` carrying `descriptor`.
///
/// Only `status`, `target_entity_id`, `controller_entity_id` and
/// `sequence_id` are taken from `header`. Returns bytes written.
pub fn encode_read_descriptor_response(
    header: &AemHeader,
    configuration_index: u16,
    descriptor: &[u8],
    dst: &mut [u8],
    pos: usize,
) -> Result<usize> {
    let len = READ_DESCRIPTOR_PAYLOAD_OFFSET + descriptor.len();
    ensure_capacity(dst, pos, len)?;
    AemHeader {
        message_type: aecp_message::AEM_RESPONSE,
        control_data_length: (len - COMMON_CONTROL_HEADER_LEN) as u16,
        unsolicited: false,
        command_type: aem_command::READ_DESCRIPTOR,
        ..*header
    }
    .encode(dst, pos)?;
    let mut out = &mut dst[pos + crate::aecp::AEM_HEADER_LEN..pos + len];
    out.put_u16(configuration_index);
    out.put_u16(0);
    out.put_slice(descriptor);
    Ok(len)
}

/// Locate the descriptor body of a READ_DESCRIPTOR response PDU at `pos`.
///
/// Returns the body's offset within `src` and its length, as declared by
/// control_data_length.
pub fn read_descriptor_body(src: &[u8], pos: usize) -> Result<(usize, usize)> {
    let header = AemHeader::decode(src, pos)?;
    if header.command_type != aem_command::READ_DESCRIPTOR {
        return Err(FrameError::UnsupportedCommand(header.command_type));
    }
    if header.message_type != aecp_message::AEM_RESPONSE {
        return Err(FrameError::UnsupportedMessageType(header.message_type));
    }
    let pdu_len = COMMON_CONTROL_HEADER_LEN + usize::from(header.control_data_length);
    if pdu_len < READ_DESCRIPTOR_PAYLOAD_OFFSET + 4 {
        return Err(FrameError::ShortControlData {
            declared: header.control_data_length,
            required: (READ_DESCRIPTOR_PAYLOAD_OFFSET + 4 - COMMON_CONTROL_HEADER_LEN) as u16,
        });
    }
    ensure_len(src, pos, pdu_len)?;
    Ok((
        pos + READ_DESCRIPTOR_PAYLOAD_OFFSET,
        pdu_len - READ_DESCRIPTOR_PAYLOAD_OFFSET,
    ))
}

/// A talker reference: entity id plus stream unique id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TalkerRef {
    pub entity_id: u64,
    pub unique_id: u16,
}

/// STREAM_INPUT descriptor contents, used to build READ_DESCRIPTOR bodies.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StreamInputDescriptor {
    pub descriptor_index: u16,
    pub object_name: String,
    pub localized_description: u16,
    pub clock_domain_index: u16,
    pub stream_flags: u16,
    pub current_format: u64,
    pub backup_talkers: [TalkerRef; 3],
    pub backedup_talker: TalkerRef,
    pub avb_interface_index: u16,
    pub buffer_length: u32,
    pub formats: Vec<u64>,
}

impl StreamInputDescriptor {
    pub fn encoded_len(&self) -> usize {
        stream_input::len(self.formats.len() as u16)
    }

    /// Write the descriptor at `pos`. Object names longer than 64 bytes are cut.
    pub fn encode(&self, dst: &mut [u8], pos: usize) -> Result<usize> {
        let len = self.encoded_len();
        ensure_capacity(dst, pos, len)?;
        let mut out = &mut dst[pos..pos + len];
        out.put_u16(descriptor_type::STREAM_INPUT);
        out.put_u16(self.descriptor_index);
        put_object_name(&mut out, &self.object_name);
        out.put_u16(self.localized_description);
        out.put_u16(self.clock_domain_index);
        out.put_u16(self.stream_flags);
        out.put_u64(self.current_format);
        out.put_u16(stream_input::FORMATS as u16);
        out.put_u16(self.formats.len() as u16);
        for talker in self.backup_talkers.iter().chain([&self.backedup_talker]) {
            out.put_u64(talker.entity_id);
            out.put_u16(talker.unique_id);
        }
        out.put_u16(self.avb_interface_index);
        out.put_u32(self.buffer_length);
        for format in &self.formats {
            out.put_u64(*format);
        }
        Ok(len)
    }
}

/// EXTERNAL_PORT_INPUT descriptor contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExternalPortInputDescriptor {
    pub descriptor_index: u16,
    pub port_flags: u16,
    pub clock_domain_index: u16,
    pub number_of_controls: u16,
    pub base_control: u16,
    pub signal_type: u16,
    pub signal_index: u16,
    pub signal_output: u16,
    pub block_latency: u32,
    pub jack_index: u16,
}

impl ExternalPortInputDescriptor {
    pub fn encode(&self, dst: &mut [u8], pos: usize) -> Result<usize> {
        ensure_capacity(dst, pos, external_port::LEN)?;
        let mut out = &mut dst[pos..pos + external_port::LEN];
        out.put_u16(descriptor_type::EXTERNAL_PORT_INPUT);
        out.put_u16(self.descriptor_index);
        out.put_u16(self.port_flags);
        out.put_u16(self.clock_domain_index);
        out.put_u16(self.number_of_controls);
        out.put_u16(self.base_control);
        out.put_u16(self.signal_type);
        out.put_u16(self.signal_index);
        out.put_u16(self.signal_output);
        out.put_u32(self.block_latency);
        out.put_u16(self.jack_index);
        Ok(external_port::LEN)
    }
}

fn put_object_name(out: &mut &mut [u8], name: &str) {
    let mut field = [0u8; OBJECT_NAME_LEN];
    let bytes = name.as_bytes();
    let n = bytes.len().min(OBJECT_NAME_LEN);
    field[..n].copy_from_slice(&bytes[..n]);
    out.put_slice(&field);
}
