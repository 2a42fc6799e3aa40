//! Frame codec for IEEE 1722.1 AVDECC control traffic.
//!
//! Every PDU handled here rides in an Ethernet II frame with ethertype
//! 0x22F0 and starts with the 12-byte AVTP common control header. This crate
//! encodes and decodes:
//! - AECP AEM commands and responses for the stream descriptor families
//! - ACMP connection management PDUs
//! - STREAM_INPUT and EXTERNAL_PORT_INPUT descriptor bodies
//!
//! Encoders write into caller-owned buffers at a caller-supplied offset and
//! check capacity before writing anything. Decoders never return a partially
//! filled structure.

pub mod acmp;
pub mod aecp;
pub mod codec;
pub mod consts;
pub mod descriptor;
pub mod error;
pub mod ether;
pub mod header;

pub use acmp::{AcmpPdu, ACMPDU_LEN};
pub use aecp::{AemHeader, AemPayload, AemPdu, Counters, StreamInfo};
pub use codec::{decode_frame, encode_frame, Frame, Pdu};
pub use descriptor::{
    encode_read_descriptor_response, read_descriptor_body, ExternalPortInputDescriptor,
    StreamInputDescriptor, TalkerRef,
};
pub use error::{FrameError, Result};
pub use ether::{EtherHeader, MacAddr, ETHER_HDR_SIZE};
pub use header::ControlHeader;
