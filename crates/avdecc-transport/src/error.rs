/// Errors that can occur while handing frames to the network.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The frame sink rejected a frame.
    #[error("failed to transmit frame ({len} bytes): {source}")]
    Transmit {
        len: usize,
        source: std::io::Error,
    },

    /// The frame is larger than an Ethernet frame may be.
    #[error("frame too large ({len} bytes, max {max})")]
    FrameTooLarge { len: usize, max: usize },

    /// The queue is at capacity.
    #[error("transmit queue full (capacity {0})")]
    QueueFull(usize),

    /// The transmit worker could not be started.
    #[error("failed to spawn transmit worker: {0}")]
    Spawn(std::io::Error),

    /// The queue has been shut down.
    #[error("transmit queue shut down")]
    Shutdown,
}

pub type Result<T> = std::result::Result<T, TransportError>;
