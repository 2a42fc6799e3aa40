use bytes::{Buf, BufMut};

use crate::consts::COMMON_CONTROL_HEADER_LEN;
use crate::error::{ensure_capacity, ensure_len, Result};

const CD_BIT: u8 = 0x80;
const SUBTYPE_MASK: u8 = 0x7F;
const MESSAGE_TYPE_MASK: u8 = 0x0F;
const STATUS_SHIFT: u16 = 11;
const CONTROL_DATA_LENGTH_MASK: u16 = 0x07FF;

/// AVTP common control header shared by AECP and ACMP.
///
/// ```text
/// ┌────┬─────────┬────┬─────┬──────────┬────────┬─────────────────┬─────────────────────┐
/// │ cd │ subtype │ sv │ ver │ msg_type │ status │ control_data_len│ stream_id/entity_id │
/// │ 1b │   7b    │ 1b │ 3b  │    4b    │   5b   │      11b        │        64b          │
/// └────┴─────────┴────┴─────┴──────────┴────────┴─────────────────┴─────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlHeader {
    pub subtype: u8,
    pub message_type: u8,
    pub status: u8,
    pub control_data_length: u16,
    /// `target_entity_id` for AECP, `stream_id` for ACMP.
    pub stream_id: u64,
}

impl ControlHeader {
    /// Write the header at `pos`. Returns bytes written.
    pub fn encode(&self, dst: &mut [u8], pos: usize) -> Result<usize> {
        ensure_capacity(dst, pos, COMMON_CONTROL_HEADER_LEN)?;
        let mut out = &mut dst[pos..pos + COMMON_CONTROL_HEADER_LEN];
        out.put_u8(CD_BIT | (self.subtype & SUBTYPE_MASK));
        out.put_u8(self.message_type & MESSAGE_TYPE_MASK);
        out.put_u16(
            (u16::from(self.status) << STATUS_SHIFT)
                | (self.control_data_length & CONTROL_DATA_LENGTH_MASK),
        );
        out.put_u64(self.stream_id);
        Ok(COMMON_CONTROL_HEADER_LEN)
    }

    /// Read the header at `pos`.
    pub fn decode(src: &[u8], pos: usize) -> Result<Self> {
        ensure_len(src, pos, COMMON_CONTROL_HEADER_LEN)?;
        let mut input = &src[pos..pos + COMMON_CONTROL_HEADER_LEN];
        let subtype = input.get_u8() & SUBTYPE_MASK;
        let message_type = input.get_u8() & MESSAGE_TYPE_MASK;
        let status_len = input.get_u16();
        let stream_id = input.get_u64();
        Ok(Self {
            subtype,
            message_type,
            status: (status_len >> STATUS_SHIFT) as u8,
            control_data_length: status_len & CONTROL_DATA_LENGTH_MASK,
            stream_id,
        })
    }
}

/// Read only the AVTP subtype at `pos`, for demultiplexing.
pub fn peek_subtype(src: &[u8], pos: usize) -> Result<u8> {
    ensure_len(src, pos, 1)?;
    Ok(src[pos] & SUBTYPE_MASK)
}
