//! A raw `AF_PACKET`/`SOCK_RAW` link, grounded on `ptcp.Raw`/`ptcp/raw.go`:
//! one socket bound to a named interface, `ETH_P_ALL` so it sees (and can
//! source-filter) every frame, `recvfrom`/`sendto` through `libc` since
//! Rust's standard library has no link-layer socket API.

use std::ffi::CString;
use std::mem;
use std::net::Ipv4Addr;
use std::sync::Mutex;

use crate::codec::ethernet::{Frame, Mac};
use crate::codec::EtherType;
use crate::meta::BUFFERSIZE;
use crate::netinfo::{Arp, Route};
use crate::result::{Error, ResolveError, Result};

use super::Link;

pub struct RawLink {
    fd: i32,
    if_index: i32,
    if_mac: Mac,
    route: Route,
    arp: Arp,
    recv_buf: Mutex<Vec<u8>>,
}

impl RawLink {
    /// Opens and binds a raw link-layer socket on `interface_name`, taking
    /// one-time snapshots of the route and ARP tables the way
    /// `ptcp.Init` does up front rather than per-packet.
    pub fn open(interface_name: &str) -> Result<Self> {
        let fd = unsafe {
            libc::socket(
                libc::AF_PACKET,
                libc::SOCK_RAW,
                htons(libc::ETH_P_ALL as u16) as i32,
            )
        };
        if fd < 0 {
            return Err(std::io::Error::last_os_error().into());
        }

        let if_index = interface_index(interface_name)?;
        let if_mac = interface_mac(fd, interface_name)?;

        let mut sll: libc::sockaddr_ll = unsafe { mem::zeroed() };
        sll.sll_family = libc::AF_PACKET as u16;
        sll.sll_protocol = htons(libc::ETH_P_ALL as u16);
        sll.sll_ifindex = if_index;

        let bind_rc = unsafe {
            libc::bind(
                fd,
                &sll as *const libc::sockaddr_ll as *const libc::sockaddr,
                mem::size_of::<libc::sockaddr_ll>() as u32,
            )
        };
        if bind_rc < 0 {
            let err = std::io::Error::last_os_error();
            unsafe { libc::close(fd) };
            return Err(err.into());
        }

        let reuse: i32 = 1;
        unsafe {
            libc::setsockopt(
                fd,
                libc::SOL_SOCKET,
                libc::SO_REUSEADDR,
                &reuse as *const i32 as *const libc::c_void,
                mem::size_of::<i32>() as u32,
            );
        }

        Ok(Self {
            fd,
            if_index,
            if_mac,
            route: Route::load()?,
            arp: Arp::load()?,
            recv_buf: Mutex::new(vec![0_u8; BUFFERSIZE]),
        })
    }
}

impl Drop for RawLink {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.fd);
        }
    }
}

impl Link for RawLink {
    fn read(&self) -> Result<Vec<u8>> {
        let mut buf = self.recv_buf.lock().unwrap();
        let n = unsafe {
            libc::recvfrom(
                self.fd,
                buf.as_mut_ptr() as *mut libc::c_void,
                buf.len(),
                0,
                std::ptr::null_mut(),
                std::ptr::null_mut(),
            )
        };
        if n < 0 {
            return Err(std::io::Error::last_os_error().into());
        }
        let frame = Frame::unmarshal(&buf[..n as usize])?;
        Ok(frame.payload)
    }

    fn write(&self, ip_packet: &[u8]) -> Result<()> {
        let dst_ip = destination_ip(ip_packet)?;

        let dst_mac = match self.route.get_gateway(dst_ip) {
            Some(gateway) if gateway != Ipv4Addr::new(0, 0, 0, 0) => self
                .arp
                .get_hw_addr(gateway)
                .ok_or(Error::Resolve(ResolveError::ArpMiss(u32::from(gateway))))?,
            // On-link destination: the original uses the interface's own
            // MAC as the destination, which is the quirk spec.md calls out
            // (§ GLOSSARY "On-link destination") rather than a real ARP
            // resolution of `dst_ip` itself.
            _ => self.if_mac,
        };

        let frame = Frame {
            destination: dst_mac,
            source: self.if_mac,
            service_vlan: None,
            vlan: None,
            ether_type: EtherType::IPv4,
            payload: ip_packet.to_vec(),
        };
        let bytes = frame.marshal()?;

        let mut sll: libc::sockaddr_ll = unsafe { mem::zeroed() };
        sll.sll_family = libc::AF_PACKET as u16;
        sll.sll_ifindex = self.if_index;
        sll.sll_halen = 6;
        sll.sll_addr[..6].copy_from_slice(&dst_mac);

        let rc = unsafe {
            libc::sendto(
                self.fd,
                bytes.as_ptr() as *const libc::c_void,
                bytes.len(),
                0,
                &sll as *const libc::sockaddr_ll as *const libc::sockaddr,
                mem::size_of::<libc::sockaddr_ll>() as u32,
            )
        };
        if rc < 0 {
            return Err(std::io::Error::last_os_error().into());
        }
        Ok(())
    }
}

fn destination_ip(ip_packet: &[u8]) -> Result<Ipv4Addr> {
    let ip = crate::codec::ip::Ipv4Header::unmarshal(ip_packet)?;
    Ok(ip.dst)
}

fn htons(v: u16) -> u16 {
    v.to_be()
}

fn interface_index(name: &str) -> Result<i32> {
    let cname = CString::new(name).map_err(|_| {
        Error::Resolve(ResolveError::UnknownLocalIp)
    })?;
    let idx = unsafe { libc::if_nametoindex(cname.as_ptr()) };
    if idx == 0 {
        return Err(std::io::Error::last_os_error().into());
    }
    Ok(idx as i32)
}

fn interface_mac(fd: i32, name: &str) -> Result<Mac> {
    let mut ifr: libc::ifreq = unsafe { mem::zeroed() };
    let name_bytes = name.as_bytes();
    for (i, b) in name_bytes.iter().enumerate().take(ifr.ifr_name.len() - 1) {
        ifr.ifr_name[i] = *b as libc::c_char;
    }

    let rc = unsafe { libc::ioctl(fd, libc::SIOCGIFHWADDR, &mut ifr) };
    if rc < 0 {
        return Err(std::io::Error::last_os_error().into());
    }

    let mut mac = [0_u8; 6];
    unsafe {
        let sa_data = ifr.ifr_ifru.ifru_hwaddr.sa_data;
        for (i, slot) in mac.iter_mut().enumerate() {
            *slot = sa_data[i] as u8;
        }
    }
    Ok(mac)
}
