/// Errors that can occur during frame encoding/decoding.
///
/// Every variant is final for the frame at hand: encoders never leave a
/// partially written frame behind for the caller to use, and decoders never
/// return a partially filled structure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// The input ends before the structure does.
    #[error("frame truncated ({len} bytes, need {need})")]
    Truncated { len: usize, need: usize },

    /// The output buffer cannot hold the encoded structure.
    #[error("buffer too small ({capacity} bytes, need {need})")]
    BufferTooSmall { capacity: usize, need: usize },

    /// The Ethernet frame does not carry AVTP.
    #[error("unexpected ethertype 0x{0:04x} (expected 0x22f0)")]
    BadEthertype(u16),

    /// The AVTP subtype is not the one being decoded.
    #[error("unexpected AVTP subtype 0x{0:02x}")]
    UnexpectedSubtype(u8),

    /// The AECP message type is not an AEM command or response.
    #[error("unsupported AECP message type {0}")]
    UnsupportedMessageType(u8),

    /// The AEM command type has no known layout.
    #[error("unsupported AEM command type 0x{0:04x}")]
    UnsupportedCommand(u16),

    /// The header's control_data_length is shorter than the layout requires.
    #[error("control data length {declared} shorter than required {required}")]
    ShortControlData { declared: u16, required: u16 },

    /// A payload variant does not belong to the command type it was paired with.
    #[error("payload does not match AEM command type 0x{0:04x}")]
    PayloadMismatch(u16),
}

pub type Result<T> = std::result::Result<T, FrameError>;

pub(crate) fn ensure_len(buf: &[u8], pos: usize, need: usize) -> Result<()> {
    let end = pos.saturating_add(need);
    if buf.len() < end {
        return Err(FrameError::Truncated {
            len: buf.len(),
            need: end,
        });
    }
    Ok(())
}

pub(crate) fn ensure_capacity(buf: &[u8], pos: usize, need: usize) -> Result<()> {
    let end = pos.saturating_add(need);
    if buf.len() < end {
        return Err(FrameError::BufferTooSmall {
            capacity: buf.len(),
            need: end,
        });
    }
    Ok(())
}
