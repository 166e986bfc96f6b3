//! IPv4 header marshal/unmarshal and the header checksum, delegated to
//! `etherparse::Ipv4Header`/`Ipv4HeaderSlice` exactly the way the teacher's
//! `reader_writer.rs` (`Ipv4HeaderSlice::from_slice`, `.write()`) and
//! `tcp/packet.rs` (`etherparse::Ipv4Header::new`) do — this crate never
//! computes an internet checksum by hand.
//!
//! Field layout grounded on `header.IPv4` in the original `xitongsys/ptcp`
//! (the struct itself was filtered out of the retrieved source, but its call
//! sites in `build.go`/`parser.go` pin the field layout spec §3 also
//! specifies).

use std::net::Ipv4Addr;

use etherparse::{IpTrafficClass, Ipv4HeaderSlice};

use crate::result::{Error, ParseError, Result};

pub const PROTO_TCP: u8 = 6;
pub const PROTO_UDP: u8 = 17;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4Header {
    pub total_len: u16,
    pub ttl: u8,
    pub protocol: u8,
    pub checksum: u16,
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
}

impl Ipv4Header {
    pub fn new(protocol: u8, src: Ipv4Addr, dst: Ipv4Addr) -> Self {
        let mut h = Self {
            total_len: 20,
            ttl: crate::meta::DEFAULT_TTL,
            protocol,
            checksum: 0,
            src,
            dst,
        };
        h.reset_checksum();
        h
    }

    pub fn header_len(&self) -> usize {
        20
    }

    /// The `etherparse::Ipv4Header` this header corresponds to, options-free
    /// per spec §3 ("version+IHL byte fixed 0x45"). `pub(crate)` so the TCP
    /// and UDP codecs can hand it to `calc_checksum_ipv4`.
    pub(crate) fn to_etherparse(&self) -> etherparse::Ipv4Header {
        let traffic_class = match self.protocol {
            PROTO_TCP => IpTrafficClass::Tcp,
            PROTO_UDP => IpTrafficClass::Udp,
            _ => IpTrafficClass::IPv4,
        };
        let mut h = etherparse::Ipv4Header::new(
            self.total_len.saturating_sub(20),
            self.ttl,
            traffic_class,
            self.src.octets(),
            self.dst.octets(),
        );
        h.protocol = self.protocol;
        h
    }

    /// Recomputes `checksum` over the header with the checksum field
    /// zeroed, via `etherparse::Ipv4Header::write` (which computes and
    /// writes the real checksum itself — see `reader_writer.rs:158`, where
    /// the teacher never touches the checksum field by hand).
    pub fn reset_checksum(&mut self) {
        let bytes = self.marshal();
        self.checksum = u16::from_be_bytes([bytes[10], bytes[11]]);
    }

    pub fn marshal(&self) -> [u8; 20] {
        let mut out = Vec::with_capacity(20);
        self.to_etherparse()
            .write(&mut out)
            .expect("writing a fixed 20-byte IPv4 header into a Vec cannot fail");
        let mut b = [0_u8; 20];
        b.copy_from_slice(&out[..20]);
        b
    }

    pub fn unmarshal(b: &[u8]) -> Result<Self> {
        let slice =
            Ipv4HeaderSlice::from_slice(b).map_err(|_| Error::Parse(ParseError::TooShort))?;
        Ok(Self {
            total_len: slice.total_len(),
            ttl: slice.ttl(),
            protocol: slice.protocol(),
            checksum: slice.header_checksum(),
            src: slice.source_addr(),
            dst: slice.destination_addr(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_changes_predictably_with_dst() {
        let mut h = Ipv4Header::new(
            PROTO_TCP,
            "1.2.3.4".parse().unwrap(),
            "5.6.7.8".parse().unwrap(),
        );
        h.total_len = 40;
        h.reset_checksum();
        let cs1 = h.checksum;

        h.dst = "5.6.7.9".parse().unwrap();
        h.reset_checksum();
        let cs2 = h.checksum;

        assert_ne!(cs1, cs2);
    }

    #[test]
    fn checksum_field_zeroed_roundtrips_to_zero() {
        let mut h = Ipv4Header::new(
            PROTO_TCP,
            "10.0.0.1".parse().unwrap(),
            "10.0.0.2".parse().unwrap(),
        );
        h.total_len = 40;
        h.reset_checksum();

        // etherparse computed the checksum over the header with the
        // checksum field zeroed, so zeroing it again and asking etherparse
        // to parse the header back must reproduce the same value.
        let b = h.marshal();
        let reparsed = Ipv4Header::unmarshal(&b).unwrap();
        assert_eq!(reparsed.checksum, h.checksum);
    }

    #[test]
    fn unmarshal_rejects_short_input() {
        let b = [0_u8; 10];
        assert!(matches!(
            Ipv4Header::unmarshal(&b),
            Err(Error::Parse(ParseError::TooShort))
        ));
    }

    #[test]
    fn marshal_unmarshal_roundtrip() {
        let h = Ipv4Header::new(
            PROTO_TCP,
            "192.168.1.1".parse().unwrap(),
            "192.168.1.2".parse().unwrap(),
        );
        let b = h.marshal();
        let h2 = Ipv4Header::unmarshal(&b).unwrap();
        assert_eq!(h, h2);
    }
}
