//! TCP header marshal/unmarshal plus the pseudo-header checksum, delegated
//! to `etherparse::TcpHeader`/`TcpHeaderSlice::calc_checksum_ipv4` exactly
//! the way the teacher's `tcp/packet.rs:69` (`check_sum`) and
//! `reader_writer.rs:159` (`TcpHeaderSlice::from_slice`) do.
//!
//! Field layout grounded on `header.TCP`/`ReCalTcpCheckSum` in the original
//! `xitongsys/ptcp` `build.go`.

use etherparse::TcpHeaderSlice;

use crate::codec::ip::Ipv4Header;
use crate::codec::util::{ACK, CWR, ECE, FIN, PSH, RST, SYN, URG};
use crate::result::{Error, ParseError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TcpHeader {
    pub src_port: u16,
    pub dst_port: u16,
    pub seq: u32,
    pub ack_num: u32,
    pub flags: u8,
    pub window: u16,
    pub checksum: u16,
}

impl TcpHeader {
    pub fn new(src_port: u16, dst_port: u16, seq: u32, ack_num: u32, flags: u8) -> Self {
        Self {
            src_port,
            dst_port,
            seq,
            ack_num,
            flags,
            window: crate::meta::DEFAULT_WINDOW,
            checksum: 0,
        }
    }

    pub fn header_len(&self) -> usize {
        20
    }

    pub fn syn(&self) -> bool {
        self.flags & SYN != 0
    }
    pub fn ack(&self) -> bool {
        self.flags & ACK != 0
    }
    pub fn fin(&self) -> bool {
        self.flags & FIN != 0
    }
    pub fn rst(&self) -> bool {
        self.flags & RST != 0
    }

    /// The `etherparse::TcpHeader` this header corresponds to, no options
    /// per spec §3 ("data-offset nibble fixed 0x50").
    fn to_etherparse(&self) -> etherparse::TcpHeader {
        let mut h = etherparse::TcpHeader::new(self.src_port, self.dst_port, self.seq, self.window);
        h.acknowledgment_number = self.ack_num;
        h.fin = self.flags & FIN != 0;
        h.syn = self.flags & SYN != 0;
        h.rst = self.flags & RST != 0;
        h.psh = self.flags & PSH != 0;
        h.ack = self.flags & ACK != 0;
        h.urg = self.flags & URG != 0;
        h.ece = self.flags & ECE != 0;
        h.cwr = self.flags & CWR != 0;
        h.checksum = self.checksum;
        h
    }

    pub fn marshal(&self) -> [u8; 20] {
        let mut out = Vec::with_capacity(20);
        self.to_etherparse()
            .write(&mut out)
            .expect("writing a fixed 20-byte TCP header into a Vec cannot fail");
        let mut b = [0_u8; 20];
        b.copy_from_slice(&out[..20]);
        b
    }

    pub fn unmarshal(b: &[u8]) -> Result<Self> {
        let slice =
            TcpHeaderSlice::from_slice(b).map_err(|_| Error::Parse(ParseError::TooShort))?;
        let mut flags = 0_u8;
        if slice.fin() {
            flags |= FIN;
        }
        if slice.syn() {
            flags |= SYN;
        }
        if slice.rst() {
            flags |= RST;
        }
        if slice.psh() {
            flags |= PSH;
        }
        if slice.ack() {
            flags |= ACK;
        }
        if slice.urg() {
            flags |= URG;
        }
        if slice.ece() {
            flags |= ECE;
        }
        if slice.cwr() {
            flags |= CWR;
        }
        Ok(Self {
            src_port: slice.source_port(),
            dst_port: slice.destination_port(),
            seq: slice.sequence_number(),
            ack_num: slice.acknowledgment_number(),
            flags,
            window: slice.window_size(),
            checksum: slice.checksum(),
        })
    }

    /// Pseudo-header checksum over (src IP, dst IP, 0, protocol, TCP length)
    /// + TCP header + payload, per spec §3 — computed by etherparse exactly
    /// as `TcpIpHeader::check_sum` (`tcp/packet.rs:69`) does.
    pub fn calc_checksum(&self, ip: &Ipv4Header, payload: &[u8]) -> u16 {
        let mut hdr = self.to_etherparse();
        hdr.checksum = 0;
        hdr.calc_checksum_ipv4(&ip.to_etherparse(), payload)
            .expect("payload within a single IPv4 packet never overflows the checksum length field")
    }
}

#[allow(dead_code)]
pub const ALL_FLAGS: [u8; 7] = [FIN, SYN, RST, PSH, ACK, URG, ECE | CWR];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marshal_unmarshal_roundtrip() {
        let h = TcpHeader::new(1234, 80, 7, 8, SYN | ACK);
        let b = h.marshal();
        let h2 = TcpHeader::unmarshal(&b).unwrap();
        assert_eq!(h2.src_port, h.src_port);
        assert_eq!(h2.dst_port, h.dst_port);
        assert_eq!(h2.seq, h.seq);
        assert_eq!(h2.ack_num, h.ack_num);
        assert_eq!(h2.flags, h.flags);
        assert_eq!(h2.window, h.window);
    }

    #[test]
    fn unmarshal_rejects_short_input() {
        assert!(matches!(
            TcpHeader::unmarshal(&[0_u8; 5]),
            Err(Error::Parse(ParseError::TooShort))
        ));
    }

    #[test]
    fn checksum_changes_with_payload() {
        let ip = Ipv4Header::new(
            6,
            "10.0.0.1".parse().unwrap(),
            "10.0.0.2".parse().unwrap(),
        );
        let h = TcpHeader::new(1, 2, 0, 0, SYN);
        let cs1 = h.calc_checksum(&ip, b"");
        let cs2 = h.calc_checksum(&ip, b"hello");
        assert_ne!(cs1, cs2);
    }
}
