//! Small conversions grounded on `header/util.go` in the original
//! implementation: IP string/u32 round-trips, TCP flag bits, and the
//! `proto:src:dst` classification a router needs out of a parsed packet.

use std::net::Ipv4Addr;

/// TCP flag bits, as laid out in spec §3.
pub const FIN: u8 = 0x01;
pub const SYN: u8 = 0x02;
pub const RST: u8 = 0x04;
pub const PSH: u8 = 0x08;
pub const ACK: u8 = 0x10;
pub const URG: u8 = 0x20;
pub const ECE: u8 = 0x40;
pub const CWR: u8 = 0x80;

pub const PROTO_TCP: u8 = 6;
pub const PROTO_UDP: u8 = 17;

/// `"A.B.C.D"` -> big-endian u32, matching `header.Str2IP`.
pub fn str_to_ip(s: &str) -> Option<u32> {
    s.parse::<Ipv4Addr>().ok().map(u32::from)
}

/// u32 -> `"A.B.C.D"`, matching `header.IP2Str`.
pub fn ip_to_str(ip: u32) -> String {
    Ipv4Addr::from(ip).to_string()
}

/// Splits `"ip:port"`. Bare `":port"` is treated as `127.0.0.1:port`,
/// matching `header.ParseAddr`.
pub fn parse_addr(addr: &str) -> Option<(Ipv4Addr, u16)> {
    let (ip_part, port_part) = addr.rsplit_once(':')?;
    let port: u16 = port_part.parse().ok()?;
    let ip = if ip_part.is_empty() {
        Ipv4Addr::new(127, 0, 0, 1)
    } else {
        ip_part.parse().ok()?
    };
    Some((ip, port))
}

pub fn addr_string(ip: Ipv4Addr, port: u16) -> String {
    format!("{}:{}", ip, port)
}
