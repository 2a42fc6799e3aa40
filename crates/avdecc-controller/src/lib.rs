//! AVDECC controller core.
//!
//! This is the layer that talks to entities. Send AEM and ACMP commands to a
//! descriptor, feed received frames back in, and receive exactly one
//! completion per command through a [`NotificationSink`]. Descriptors read
//! from an entity are cached as shared frame buffers and exposed through
//! typed, zero-copy response views.

pub mod acmp;
pub mod aecp;
pub mod capability;
pub mod clock;
pub mod config;
pub mod controller;
pub mod descriptor;
pub mod entity;
pub mod error;
pub mod external_port_input;
mod inflight;
pub mod notify;
pub mod stream_input;
pub mod views;

pub use acmp::AcmpController;
pub use aecp::{AecpController, Resolution};
pub use capability::{commands_for, DescriptorCapability};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AcmpConfig, AecpConfig, ControllerConfig};
pub use controller::{Controller, TimerHandle};
pub use descriptor::{CommandKind, Descriptor, DescriptorKey, FrameInfo};
pub use entity::{Entity, EntityDirectory};
pub use error::{ControllerError, Result};
pub use external_port_input::ExternalPortInput;
pub use inflight::RequestState;
pub use notify::{CallbackSink, Notification, NotificationId, NotificationSink, NullSink, Outcome};
pub use stream_input::{CommandRequest, StreamInput};
pub use views::{
    CountersResponse, ExternalPortInputDescriptorResponse, RxStateResponse, StreamFormatResponse,
    StreamInfoResponse, StreamInputCounter, StreamInputDescriptorResponse,
};
