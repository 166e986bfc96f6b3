//! UDP header codec, carried over from `header.UDP`/`BuildUdpPacket` in the
//! original implementation (§11 of SPEC_FULL.md). pTCP itself never routes
//! protocol 17, but `ParsePacket` still has to tell "unsupported" from
//! "recognized but not TCP" and this is the recognized-but-unused sibling.
//! Marshal/unmarshal/checksum go through `etherparse::UdpHeader` the same
//! way the TCP codec does.

use etherparse::UdpHeaderSlice;

use crate::codec::ip::Ipv4Header;
use crate::result::{Error, ParseError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UdpHeader {
    pub src_port: u16,
    pub dst_port: u16,
    pub len: u16,
    pub checksum: u16,
}

impl UdpHeader {
    pub fn new(src_port: u16, dst_port: u16) -> Self {
        Self {
            src_port,
            dst_port,
            len: 0,
            checksum: 0,
        }
    }

    pub fn header_len(&self) -> usize {
        8
    }

    fn to_etherparse(&self) -> etherparse::UdpHeader {
        let mut h = etherparse::UdpHeader::new(self.src_port, self.dst_port);
        h.length = self.len;
        h.checksum = self.checksum;
        h
    }

    pub fn marshal(&self) -> [u8; 8] {
        let mut out = Vec::with_capacity(8);
        self.to_etherparse()
            .write(&mut out)
            .expect("writing a fixed 8-byte UDP header into a Vec cannot fail");
        let mut b = [0_u8; 8];
        b.copy_from_slice(&out[..8]);
        b
    }

    pub fn unmarshal(b: &[u8]) -> Result<Self> {
        let slice =
            UdpHeaderSlice::from_slice(b).map_err(|_| Error::Parse(ParseError::TooShort))?;
        Ok(Self {
            src_port: slice.source_port(),
            dst_port: slice.destination_port(),
            len: slice.length(),
            checksum: slice.checksum(),
        })
    }

    pub fn calc_checksum(&self, ip: &Ipv4Header, payload: &[u8]) -> u16 {
        let mut hdr = self.to_etherparse();
        hdr.checksum = 0;
        hdr.calc_checksum_ipv4(&ip.to_etherparse(), payload)
            .expect("payload within a single IPv4 packet never overflows the checksum length field")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marshal_unmarshal_roundtrip() {
        let mut h = UdpHeader::new(53, 12345);
        h.len = 8;
        let b = h.marshal();
        let h2 = UdpHeader::unmarshal(&b).unwrap();
        assert_eq!(h2.src_port, h.src_port);
        assert_eq!(h2.dst_port, h.dst_port);
        assert_eq!(h2.len, h.len);
    }
}
