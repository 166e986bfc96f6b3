//! Local interface/address/mask enumeration, grounded on `netinfo.Local`/
//! `netinfo.NewLocal`, which walks `net.Interfaces()` in the Go original.
//! Rust's standard library has no interface-enumeration API, so this walks
//! `getifaddrs(3)` directly through `libc` the same way `link::raw` reaches
//! for raw sockets.

use std::collections::HashMap;
use std::ffi::CStr;
use std::net::Ipv4Addr;

use crate::result::Result;

#[derive(Debug, Clone)]
pub struct LocalInterface {
    pub ip: Ipv4Addr,
    pub device: String,
    pub mask: Ipv4Addr,
}

#[derive(Debug, Default)]
pub struct Local {
    by_ip: HashMap<Ipv4Addr, LocalInterface>,
}

impl Local {
    pub fn load() -> Result<Self> {
        let mut by_ip = HashMap::new();
        // SAFETY: getifaddrs populates `head` with a linked list owned by
        // libc; it is always freed via freeifaddrs before returning.
        unsafe {
            let mut head: *mut libc::ifaddrs = std::ptr::null_mut();
            if libc::getifaddrs(&mut head) != 0 {
                return Err(std::io::Error::last_os_error().into());
            }

            let mut cur = head;
            while !cur.is_null() {
                let ifa = &*cur;
                if !ifa.ifa_addr.is_null() {
                    let family = (*ifa.ifa_addr).sa_family as i32;
                    if family == libc::AF_INET {
                        let sockaddr = ifa.ifa_addr as *const libc::sockaddr_in;
                        let ip = Ipv4Addr::from(u32::from_be((*sockaddr).sin_addr.s_addr));

                        let mask = if !ifa.ifa_netmask.is_null() {
                            let m = ifa.ifa_netmask as *const libc::sockaddr_in;
                            Ipv4Addr::from(u32::from_be((*m).sin_addr.s_addr))
                        } else {
                            Ipv4Addr::new(0, 0, 0, 0)
                        };

                        let device = CStr::from_ptr(ifa.ifa_name).to_string_lossy().into_owned();
                        by_ip.insert(ip, LocalInterface { ip, device, mask });
                    }
                }
                cur = ifa.ifa_next;
            }

            libc::freeifaddrs(head);
        }
        Ok(Self { by_ip })
    }

    pub fn get_interface(&self, ip: Ipv4Addr) -> Option<&LocalInterface> {
        self.by_ip.get(&ip)
    }

    pub fn get_by_device(&self, device: &str) -> Option<&LocalInterface> {
        self.by_ip.values().find(|i| i.device == device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_table_misses_lookups() {
        let local = Local::default();
        assert!(local.get_interface("127.0.0.1".parse().unwrap()).is_none());
        assert!(local.get_by_device("lo").is_none());
    }
}
