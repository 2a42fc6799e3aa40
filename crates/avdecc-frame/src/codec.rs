use bytes::BytesMut;

use crate::acmp::AcmpPdu;
use crate::aecp::AemPdu;
use crate::consts::{SUBTYPE_ACMP, SUBTYPE_AECP};
use crate::error::{FrameError, Result};
use crate::ether::{EtherHeader, ETHER_HDR_SIZE};
use crate::header::peek_subtype;

/// An AVDECC control PDU this codec understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pdu {
    Aem(AemPdu),
    Acmp(AcmpPdu),
}

impl Pdu {
    pub fn encoded_len(&self) -> usize {
        match self {
            Pdu::Aem(pdu) => pdu.encoded_len(),
            Pdu::Acmp(_) => crate::acmp::ACMPDU_LEN,
        }
    }
}

/// A complete Ethernet frame carrying one AVDECC PDU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub ether: EtherHeader,
    pub pdu: Pdu,
}

impl Frame {
    /// The total wire size of this frame (Ethernet header + PDU).
    pub fn wire_size(&self) -> usize {
        ETHER_HDR_SIZE + self.pdu.encoded_len()
    }
}

/// Append `frame` to `dst` in wire format.
///
/// On error `dst` is left at its original length.
///
/// ```text
/// ┌──────────────┬────────────┬───────────┬──────────────────────────┐
/// │ dest (6B)    │ src (6B)   │ 0x22F0    │ AECP / ACMP PDU          │
/// └──────────────┴────────────┴───────────┴──────────────────────────┘
/// ```
pub fn encode_frame(frame: &Frame, dst: &mut BytesMut) -> Result<()> {
    let start = dst.len();
    dst.resize(start + frame.wire_size(), 0);
    let out = &mut dst[start..];
    let written = frame.ether.encode(out).and_then(|_| match &frame.pdu {
        Pdu::Aem(pdu) => pdu.encode(out, ETHER_HDR_SIZE),
        Pdu::Acmp(pdu) => pdu.encode(out, ETHER_HDR_SIZE),
    });
    if let Err(err) = written {
        dst.truncate(start);
        return Err(err);
    }
    Ok(())
}

/// Decode a whole Ethernet frame, dispatching on the AVTP subtype.
pub fn decode_frame(src: &[u8]) -> Result<Frame> {
    let ether = EtherHeader::decode(src)?;
    let pdu = match peek_subtype(src, ETHER_HDR_SIZE)? {
        SUBTYPE_AECP => Pdu::Aem(AemPdu::decode(src, ETHER_HDR_SIZE)?),
        SUBTYPE_ACMP => Pdu::Acmp(AcmpPdu::decode(src, ETHER_HDR_SIZE)?),
        other => return Err(FrameError::UnexpectedSubtype(other)),
    };
    Ok(Frame { ether, pdu })
}
