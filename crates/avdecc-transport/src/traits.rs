use bytes::Bytes;

use crate::error::Result;

/// Largest frame the queue accepts (untagged Ethernet, no FCS).
pub const MAX_FRAME_SIZE: usize = 1514;

/// How the queue reports back once a frame has left the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeliveryMode {
    /// Transmit and forget.
    FireAndForget,
    /// Report the transmit result for this frame to the queue's observer.
    NotifyOnTransmit,
}

/// Accepts fully built frames for asynchronous transmission.
///
/// `token` is the caller's opaque correlation value. It is handed back to the
/// transmit observer for [`DeliveryMode::NotifyOnTransmit`] frames and is
/// otherwise only used for logging. No ordering between enqueued frames is
/// promised.
pub trait TxQueue: Send + Sync {
    /// Queue a frame for transmission. Must not block on the network.
    fn enqueue(&self, token: u64, mode: DeliveryMode, frame: Bytes) -> Result<()>;
}

/// Writes raw Ethernet frames to the wire.
///
/// Implemented by whatever owns the network tap; the queue worker is the only
/// caller.
pub trait FrameSink: Send {
    fn send_frame(&mut self, frame: &[u8]) -> std::io::Result<()>;
}

impl<F> FrameSink for F
where
    F: FnMut(&[u8]) -> std::io::Result<()> + Send,
{
    fn send_frame(&mut self, frame: &[u8]) -> std::io::Result<()> {
        self(frame)
    }
}

/// Receives transmit results for frames queued with
/// [`DeliveryMode::NotifyOnTransmit`].
pub trait TransmitObserver: Send + Sync {
    fn transmitted(&self, token: u64, result: std::result::Result<(), &std::io::Error>);
}
