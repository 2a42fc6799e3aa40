use crate::descriptor::{CommandKind, DescriptorKey};

/// Errors that can occur in controller operations.
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    /// Transmit queue rejected the frame.
    #[error("transport error: {0}")]
    Transport(#[from] avdecc_transport::TransportError),

    /// Frame encode/decode failure.
    #[error("frame error: {0}")]
    Frame(#[from] avdecc_frame::FrameError),

    /// No entity with this id is known to the directory.
    #[error("unknown entity 0x{0:016x}")]
    UnknownEntity(u64),

    /// The entity departed; its descriptors no longer accept updates.
    #[error("entity 0x{0:016x} departed")]
    EntityDeparted(u64),

    /// The entity has no descriptor with this type and index.
    #[error("entity 0x{entity_id:016x} has no {key}")]
    UnknownDescriptor { entity_id: u64, key: DescriptorKey },

    /// The descriptor type does not support this command.
    #[error("{command} not supported by descriptor type 0x{descriptor_type:04x}")]
    UnsupportedCommand {
        descriptor_type: u16,
        command: CommandKind,
    },

    /// A READ_DESCRIPTOR response carried a non-success status.
    #[error("entity 0x{entity_id:016x} refused READ_DESCRIPTOR with status {status}")]
    DescriptorRejected { entity_id: u64, status: u8 },

    /// Every sequence id of the engine is held by a pending request.
    #[error("no free sequence id ({0} requests pending)")]
    SequenceExhausted(usize),

    /// A pending request already holds this sequence id.
    #[error("sequence id {0} already in flight")]
    SequenceInUse(u16),

    /// A response was handed to a descriptor it does not address.
    #[error("response addressed to another descriptor: {0}")]
    Misrouted(String),

    /// The background timer thread could not be started.
    #[error("failed to spawn timer thread: {0}")]
    Spawn(#[source] std::io::Error),

    /// A lock was poisoned by a panicking thread.
    #[error("{0} lock poisoned")]
    LockPoisoned(&'static str),
}

pub type Result<T> = std::result::Result<T, ControllerError>;
