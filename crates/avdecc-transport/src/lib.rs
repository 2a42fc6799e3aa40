//! Transmit queue abstraction for AVDECC controller frames.
//!
//! The controller core never touches the network directly. It hands fully
//! built Ethernet frames to a [`TxQueue`] together with an opaque correlation
//! token, and carries on. This crate provides:
//! - the [`TxQueue`] / [`FrameSink`] seams
//! - [`SystemTxQueue`], a bounded queue drained by a worker thread
//! - [`RecordingTxQueue`], an in-memory queue for tests and offline tools
//!
//! Raw socket access lives outside this workspace; plug it in as a [`FrameSink`].

pub mod error;
pub mod queue;
pub mod recording;
pub mod traits;

pub use error::{Result, TransportError};
pub use queue::{SystemTxQueue, TxQueueConfig};
pub use recording::{RecordingTxQueue, SentFrame};
pub use traits::{DeliveryMode, FrameSink, TransmitObserver, TxQueue, MAX_FRAME_SIZE};
