//! `/proc/net/route` parser, grounded on `netinfo.Route`/`netinfo.GetGateway`.
//! Destination/gateway/mask are stored little-endian-hex in the kernel's
//! table, hence the nibble-reversal in `parse_hex_le`.

use std::io::{BufRead, BufReader};
use std::net::Ipv4Addr;

use crate::result::Result;

pub const ROUTE_PATH: &str = "/proc/net/route";

#[derive(Debug, Clone)]
struct RouteItem {
    dest: u32,
    gateway: u32,
    mask: u32,
    #[allow(dead_code)]
    device: String,
}

#[derive(Debug, Default)]
pub struct Route {
    routes: Vec<RouteItem>,
}

impl Route {
    pub fn load() -> Result<Self> {
        Self::load_from(ROUTE_PATH)
    }

    pub fn load_from(path: &str) -> Result<Self> {
        let f = std::fs::File::open(path)?;
        Ok(Self::parse(BufReader::new(f)))
    }

    fn parse<R: std::io::Read>(reader: BufReader<R>) -> Self {
        let mut routes = Vec::new();
        for line in reader.lines().skip(1) {
            let line = match line {
                Ok(l) => l,
                Err(_) => break,
            };
            // Iface Destination Gateway Flags RefCnt Use Metric Mask MTU Window IRTT
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 8 {
                continue;
            }
            let (dest, gateway, mask) = match (
                parse_hex_le(fields[1]),
                parse_hex_le(fields[2]),
                parse_hex_le(fields[7]),
            ) {
                (Some(d), Some(g), Some(m)) => (d, g, m),
                _ => continue,
            };
            routes.push(RouteItem {
                dest,
                gateway,
                mask,
                device: fields[0].to_string(),
            });
        }
        Self { routes }
    }

    /// Returns the gateway for `dst`, scanning routes most-recently-added
    /// first so a later, more specific route wins ties the same way the
    /// kernel table's insertion order does.
    pub fn get_gateway(&self, dst: Ipv4Addr) -> Option<Ipv4Addr> {
        let dst: u32 = u32::from(dst);
        for route in self.routes.iter().rev() {
            if dst & route.mask == route.dest {
                return Some(Ipv4Addr::from(route.gateway));
            }
        }
        None
    }
}

/// `/proc/net/route` stores 32-bit fields as 8 little-endian hex digits,
/// e.g. `0102A8C0` for `192.168.2.1`. Byte-swapping turns that into the
/// same big-endian-octet ordering `Ipv4Addr`'s `From<u32>` uses.
fn parse_hex_le(s: &str) -> Option<u32> {
    if s.len() != 8 {
        return None;
    }
    u32::from_str_radix(s, 16).ok().map(u32::swap_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn parses_default_route_and_resolves_gateway() {
        // Destination 00000000 (default), Gateway 0102A8C0 (192.168.2.1 LE),
        // Mask 00000000.
        let sample = "Iface\tDestination\tGateway \tFlags\tRefCnt\tUse\tMetric\tMask\t\tMTU\tWindow\tIRTT\n\
                       eth0\t00000000\t0102A8C0\t0003\t0\t0\t0\t00000000\t0\t0\t0\n";
        let route = Route::parse(BufReader::new(Cursor::new(sample)));
        let gw = route.get_gateway("8.8.8.8".parse().unwrap()).unwrap();
        assert_eq!(gw, Ipv4Addr::new(192, 168, 2, 1));
    }

    #[test]
    fn no_matching_route_returns_none() {
        let sample = "Header\n";
        let route = Route::parse(BufReader::new(Cursor::new(sample)));
        assert!(route.get_gateway("1.2.3.4".parse().unwrap()).is_none());
    }

    #[test]
    fn skips_short_malformed_lines() {
        let sample = "Header\neth0 bad\n";
        let route = Route::parse(BufReader::new(Cursor::new(sample)));
        assert_eq!(route.routes.len(), 0);
    }
}
