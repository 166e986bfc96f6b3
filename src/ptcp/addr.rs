//! The `"ip:port"` address pTCP hands back from `LocalAddr`/`RemoteAddr`,
//! grounded on `ptcp.Addr`/`ptcp/addr.go`.

use std::fmt;
use std::net::Ipv4Addr;

use crate::codec::util::addr_string;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Addr {
    text: String,
}

impl Addr {
    pub fn new(ip: Ipv4Addr, port: u16) -> Self {
        Self {
            text: addr_string(ip, port),
        }
    }

    pub fn from_string(addr: impl Into<String>) -> Self {
        Self { text: addr.into() }
    }

    /// Matches Go's `net.Addr.Network()`: always `"ptcp"`.
    pub fn network(&self) -> &'static str {
        "ptcp"
    }
}

impl fmt::Display for Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_is_always_ptcp() {
        let a = Addr::new("10.0.0.1".parse().unwrap(), 80);
        assert_eq!(a.network(), "ptcp");
        assert_eq!(a.to_string(), "10.0.0.1:80");
    }
}
