//! Packet assembly and classification, grounded on `header/build.go` and
//! `header/parser.go` in the original `xitongsys/ptcp`: `BuildTcpHeader`,
//! `BuildTcpPacket`, `BuildUdpPacket`, and `Get`/`GetBase`.

use std::net::Ipv4Addr;

use crate::codec::ip::{Ipv4Header, PROTO_TCP, PROTO_UDP};
use crate::codec::tcp::TcpHeader;
use crate::codec::udp::UdpHeader;
use crate::codec::util::{addr_string, ACK, SYN};
use crate::result::{Error, ParseError, Result};

/// The two transport headers pTCP ever parses off the wire. UDP is parsed
/// for completeness and classification, never routed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transport {
    Tcp(TcpHeader),
    Udp(UdpHeader),
}

/// A fully parsed IPv4 packet: protocol, IP header, transport header and
/// payload, mirroring `header.Get`'s four return values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPacket {
    pub ip: Ipv4Header,
    pub transport: Transport,
    pub payload: Vec<u8>,
}

impl ParsedPacket {
    /// `proto:src:dst` and `proto:dst:src` keys, as used to look up a
    /// listener/connection from the receiver's perspective (`header.GetBase`).
    pub fn src_key(&self) -> String {
        base_key(&self.ip.src, self.src_port(), &self.ip.dst, self.dst_port())
    }

    pub fn dst_key(&self) -> String {
        base_key(&self.ip.dst, self.dst_port(), &self.ip.src, self.src_port())
    }

    /// `ip:port` of the packet's destination — the key a Listener is
    /// registered under.
    pub fn local_listener_key(&self) -> String {
        addr_string(self.ip.dst, self.dst_port())
    }

    pub fn src_port(&self) -> u16 {
        match &self.transport {
            Transport::Tcp(h) => h.src_port,
            Transport::Udp(h) => h.src_port,
        }
    }

    pub fn dst_port(&self) -> u16 {
        match &self.transport {
            Transport::Tcp(h) => h.dst_port,
            Transport::Udp(h) => h.dst_port,
        }
    }

    pub fn tcp(&self) -> Option<&TcpHeader> {
        match &self.transport {
            Transport::Tcp(h) => Some(h),
            Transport::Udp(_) => None,
        }
    }
}

fn base_key(local: &Ipv4Addr, local_port: u16, remote: &Ipv4Addr, remote_port: u16) -> String {
    format!(
        "{}:{}",
        addr_string(*local, local_port),
        addr_string(*remote, remote_port)
    )
}

/// Parses an IPv4 datagram (no Ethernet framing). Rejects anything shorter
/// than an IPv4 header and anything that isn't TCP or UDP.
pub fn parse_packet(b: &[u8]) -> Result<ParsedPacket> {
    if b.len() < 20 {
        return Err(Error::Parse(ParseError::TooShort));
    }
    let ip = Ipv4Header::unmarshal(b)?;
    let rest = &b[ip.header_len()..];

    let transport = match ip.protocol {
        PROTO_TCP => {
            let h = TcpHeader::unmarshal(rest)?;
            Transport::Tcp(h)
        }
        PROTO_UDP => {
            let h = UdpHeader::unmarshal(rest)?;
            Transport::Udp(h)
        }
        other => return Err(Error::Parse(ParseError::UnsupportedProtocol(other))),
    };

    let header_len = match &transport {
        Transport::Tcp(h) => h.header_len(),
        Transport::Udp(h) => h.header_len(),
    };
    let payload = rest.get(header_len..).unwrap_or(&[]).to_vec();

    Ok(ParsedPacket {
        ip,
        transport,
        payload,
    })
}

/// Builds a SYN header pair for the given local/remote endpoints, with the
/// fixed seq/ack placeholders pTCP uses instead of real sequence tracking
/// (see SPEC_FULL.md §9, Open Question #1).
pub fn build_tcp_header(local: (Ipv4Addr, u16), remote: (Ipv4Addr, u16)) -> (Ipv4Header, TcpHeader) {
    let ip = Ipv4Header::new(PROTO_TCP, local.0, remote.0);
    let tcp = TcpHeader::new(local.1, remote.1, 2, 3, SYN);
    (ip, tcp)
}

/// Finalizes checksums and total length, then serializes IP header + TCP
/// header + payload into one buffer.
pub fn build_tcp_packet(mut ip: Ipv4Header, mut tcp: TcpHeader, payload: &[u8]) -> Vec<u8> {
    ip.total_len = (ip.header_len() + tcp.header_len() + payload.len()) as u16;
    ip.reset_checksum();
    tcp.checksum = 0;
    tcp.checksum = tcp.calc_checksum(&ip, payload);

    let mut out = Vec::with_capacity(ip.total_len as usize);
    out.extend_from_slice(&ip.marshal());
    out.extend_from_slice(&tcp.marshal());
    out.extend_from_slice(payload);
    out
}

pub fn build_udp_header(local: (Ipv4Addr, u16), remote: (Ipv4Addr, u16)) -> (Ipv4Header, UdpHeader) {
    let ip = Ipv4Header::new(PROTO_UDP, local.0, remote.0);
    let udp = UdpHeader::new(local.1, remote.1);
    (ip, udp)
}

pub fn build_udp_packet(mut ip: Ipv4Header, mut udp: UdpHeader, payload: &[u8]) -> Vec<u8> {
    udp.len = (udp.header_len() + payload.len()) as u16;
    ip.total_len = (ip.header_len() as u16) + udp.len;
    ip.reset_checksum();
    udp.checksum = 0;
    udp.checksum = udp.calc_checksum(&ip, payload);

    let mut out = Vec::with_capacity(ip.total_len as usize);
    out.extend_from_slice(&ip.marshal());
    out.extend_from_slice(&udp.marshal());
    out.extend_from_slice(payload);
    out
}

/// Convenience wrapper matching `BuildTcpHeader` + `BuildTcpPacket` chained,
/// for call sites (`dial`, `conn`) that just want bytes for a given flag set.
pub fn build_tcp_datagram(
    local: (Ipv4Addr, u16),
    remote: (Ipv4Addr, u16),
    seq: u32,
    ack: u32,
    flags: u8,
    payload: &[u8],
) -> Vec<u8> {
    let ip = Ipv4Header::new(PROTO_TCP, local.0, remote.0);
    let tcp = TcpHeader::new(local.1, remote.1, seq, ack, flags);
    build_tcp_packet(ip, tcp, payload)
}

#[allow(dead_code)]
const SYN_ACK: u8 = SYN | ACK;
