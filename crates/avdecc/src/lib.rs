//! IEEE 1722.1 AVDECC controller core.
//!
//! avdecc sends AEM and ACMP commands to remote AVB entities, correlates the
//! responses, and keeps a zero-copy cache of the descriptors it has read.
//!
//! # Crate Structure
//!
//! - [`transport`]: Transmit queue seam and its threaded/recording implementations
//! - [`frame`]: Ethernet/AVTP control header, AECP AEM and ACMP codecs
//! - [`controller`]: Correlation engines, descriptor cache and command façades
//!   (behind `controller` feature)

/// Re-export transport types.
pub mod transport {
    pub use avdecc_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use avdecc_frame::*;
}

/// Re-export controller types (requires `controller` feature).
#[cfg(feature = "controller")]
pub mod controller {
    pub use avdecc_controller::*;
}
