use std::fmt;
use std::str::FromStr;

use bytes::{Buf, BufMut};

use crate::consts::AVTP_ETHERTYPE;
use crate::error::{ensure_capacity, ensure_len, FrameError, Result};

/// Ethernet header: destination (6) + source (6) + ethertype (2) = 14 bytes.
pub const ETHER_HDR_SIZE: usize = 14;

/// A 48-bit MAC address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    /// IEEE 1722.1 ACMP multicast destination (91:E0:F0:01:00:00).
    pub const ACMP_MULTICAST: MacAddr = MacAddr([0x91, 0xE0, 0xF0, 0x01, 0x00, 0x00]);

    pub const ZERO: MacAddr = MacAddr([0; 6]);

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }

    /// The address as the low 48 bits of a `u64`.
    pub fn to_u64(&self) -> u64 {
        self.0.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b))
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl FromStr for MacAddr {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut out = [0u8; 6];
        let mut parts = s.split([':', '-']);
        for octet in out.iter_mut() {
            let part = parts
                .next()
                .ok_or_else(|| format!("invalid MAC '{s}': expected 6 octets"))?;
            *octet = u8::from_str_radix(part, 16)
                .map_err(|_| format!("invalid MAC '{s}': bad octet '{part}'"))?;
        }
        if parts.next().is_some() {
            return Err(format!("invalid MAC '{s}': expected 6 octets"));
        }
        Ok(MacAddr(out))
    }
}

/// Ethernet II header preceding every AVDECC PDU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EtherHeader {
    pub dest: MacAddr,
    pub src: MacAddr,
    pub ethertype: u16,
}

impl EtherHeader {
    /// Header for an AVTP frame from `src` to `dest`.
    pub fn avtp(dest: MacAddr, src: MacAddr) -> Self {
        Self {
            dest,
            src,
            ethertype: AVTP_ETHERTYPE,
        }
    }

    /// Write the header at the start of `dst`. Returns bytes written.
    pub fn encode(&self, dst: &mut [u8]) -> Result<usize> {
        ensure_capacity(dst, 0, ETHER_HDR_SIZE)?;
        let mut out = &mut dst[..ETHER_HDR_SIZE];
        out.put_slice(&self.dest.0);
        out.put_slice(&self.src.0);
        out.put_u16(self.ethertype);
        Ok(ETHER_HDR_SIZE)
    }

    /// Read the header at the start of `src`, rejecting non-AVTP frames.
    pub fn decode(src: &[u8]) -> Result<Self> {
        ensure_len(src, 0, ETHER_HDR_SIZE)?;
        let mut input = &src[..ETHER_HDR_SIZE];
        let mut dest = [0u8; 6];
        let mut source = [0u8; 6];
        input.copy_to_slice(&mut dest);
        input.copy_to_slice(&mut source);
        let ethertype = input.get_u16();
        if ethertype != AVTP_ETHERTYPE {
            return Err(FrameError::BadEthertype(ethertype));
        }
        Ok(Self {
            dest: MacAddr(dest),
            src: MacAddr(source),
            ethertype,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_layout() {
        let hdr = EtherHeader::avtp(
            MacAddr::ACMP_MULTICAST,
            MacAddr([0x00, 0x1b, 0x92, 0x01, 0x02, 0x03]),
        );
        let mut buf = [0u8; ETHER_HDR_SIZE];
        assert_eq!(hdr.encode(&mut buf).unwrap(), ETHER_HDR_SIZE);
        assert_eq!(&buf[0..6], &[0x91, 0xE0, 0xF0, 0x01, 0x00, 0x00]);
        assert_eq!(&buf[12..14], &[0x22, 0xF0]);
        assert_eq!(EtherHeader::decode(&buf).unwrap(), hdr);
    }

    #[test]
    fn rejects_other_ethertype() {
        let mut buf = [0u8; ETHER_HDR_SIZE];
        buf[12] = 0x08;
        assert_eq!(
            EtherHeader::decode(&buf),
            Err(FrameError::BadEthertype(0x0800))
        );
    }

    #[test]
    fn short_buffers() {
        assert!(matches!(
            EtherHeader::decode(&[0u8; 10]),
            Err(FrameError::Truncated { .. })
        ));
        let mut small = [0u8; 4];
        assert!(matches!(
            EtherHeader::avtp(MacAddr::ZERO, MacAddr::ZERO).encode(&mut small),
            Err(FrameError::BufferTooSmall { .. })
        ));
    }

    #[test]
    fn mac_parse_and_display() {
        let mac: MacAddr = "00:1B:92:aa:bb:cc".parse().unwrap();
        assert_eq!(mac.to_string(), "00:1b:92:aa:bb:cc");
        assert_eq!(mac.to_u64(), 0x001b_92aa_bbcc);
        assert!("00:1b:92".parse::<MacAddr>().is_err());
        assert!("00:1b:92:aa:bb:cc:dd".parse::<MacAddr>().is_err());
        assert!("zz:1b:92:aa:bb:cc".parse::<MacAddr>().is_err());
    }
}
