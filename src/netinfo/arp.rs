//! `/proc/net/arp` parser, grounded on `netinfo.Arp`/`netinfo.NewArp`.

use std::collections::HashMap;
use std::io::{BufRead, BufReader};
use std::net::Ipv4Addr;

use crate::codec::ethernet::Mac;
use crate::result::Result;

pub const ARP_PATH: &str = "/proc/net/arp";

#[derive(Debug, Clone)]
pub struct ArpItem {
    pub ip: Ipv4Addr,
    pub device: String,
    pub hw_addr: Mac,
}

#[derive(Debug, Default)]
pub struct Arp {
    entries: HashMap<Ipv4Addr, ArpItem>,
}

impl Arp {
    pub fn load() -> Result<Self> {
        Self::load_from(ARP_PATH)
    }

    pub fn load_from(path: &str) -> Result<Self> {
        let f = std::fs::File::open(path)?;
        Ok(Self::parse(BufReader::new(f)))
    }

    fn parse<R: std::io::Read>(reader: BufReader<R>) -> Self {
        let mut entries = HashMap::new();
        for line in reader.lines().skip(1) {
            let line = match line {
                Ok(l) => l,
                Err(_) => break,
            };
            let fields: Vec<&str> = line.split_whitespace().collect();
            // IP address | HW type | Flags | HW address | Mask | Device
            if fields.len() < 6 {
                continue;
            }
            let ip: Ipv4Addr = match fields[0].parse() {
                Ok(ip) => ip,
                Err(_) => continue,
            };
            let hw_addr = match parse_mac(fields[3]) {
                Some(mac) => mac,
                None => continue,
            };
            entries.insert(
                ip,
                ArpItem {
                    ip,
                    device: fields[5].to_string(),
                    hw_addr,
                },
            );
        }
        Self { entries }
    }

    pub fn get_hw_addr(&self, ip: Ipv4Addr) -> Option<Mac> {
        self.entries.get(&ip).map(|e| e.hw_addr)
    }
}

fn parse_mac(s: &str) -> Option<Mac> {
    let mut mac = [0_u8; 6];
    let mut parts = s.split(':');
    for slot in mac.iter_mut() {
        *slot = u8::from_str_radix(parts.next()?, 16).ok()?;
    }
    if parts.next().is_some() {
        return None;
    }
    Some(mac)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn parses_sample_arp_table() {
        let sample = "IP address       HW type     Flags       HW address            Mask     Device\n\
                       192.168.1.1      0x1         0x2         aa:bb:cc:dd:ee:ff     *        eth0\n";
        let arp = Arp::parse(BufReader::new(Cursor::new(sample)));
        let mac = arp.get_hw_addr("192.168.1.1".parse().unwrap()).unwrap();
        assert_eq!(mac, [0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]);
    }

    #[test]
    fn unknown_ip_misses() {
        let sample = "Header\n";
        let arp = Arp::parse(BufReader::new(Cursor::new(sample)));
        assert!(arp.get_hw_addr("10.0.0.1".parse().unwrap()).is_none());
    }

    #[test]
    fn skips_malformed_lines_instead_of_panicking() {
        let sample = "Header\nnotanip bad line here\n192.168.1.2 0x1 0x2 11:22:33:44:55:66 * eth0\n";
        let arp = Arp::parse(BufReader::new(Cursor::new(sample)));
        assert!(arp.get_hw_addr("192.168.1.2".parse().unwrap()).is_some());
    }
}
