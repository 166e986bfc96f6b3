//! Passive-open endpoint: completes the inbound three-way handshake and
//! hands finished `Conn`s to `Accept`. Grounded on `ptcp.Listener`/
//! `ptcp/listener.go`, whose `Accept` body was left unfinished in the
//! original — the half-open cache and promotion logic here follow spec
//! §4.5 instead.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use log::debug;

use crate::codec::build::{build_tcp_datagram, parse_packet, Transport};
use crate::codec::util::{ACK, SYN};
use crate::meta::{HALF_OPEN_TTL, LISTENERBUFSIZE};
use crate::ptcp::addr::Addr;
use crate::ptcp::conn::{Conn, State};
use crate::queue::BoundedQueue;
use crate::result::{Error, Result};

struct HalfOpen {
    synack: Vec<u8>,
    created: Instant,
}

pub struct Listener {
    addr: Addr,
    local: (Ipv4Addr, u16),
    pub(crate) input: BoundedQueue<Vec<u8>>,
    pub(crate) output: BoundedQueue<Vec<u8>>,
    half_open: Mutex<HashMap<String, HalfOpen>>,
    closed: AtomicBool,
}

impl Listener {
    pub fn new(local: (Ipv4Addr, u16)) -> Self {
        Self {
            addr: Addr::new(local.0, local.1),
            local,
            input: BoundedQueue::new(LISTENERBUFSIZE),
            output: BoundedQueue::new(LISTENERBUFSIZE),
            half_open: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    pub fn addr(&self) -> &Addr {
        &self.addr
    }

    pub fn key(&self) -> String {
        self.addr.to_string()
    }

    /// Blocks until a peer completes the handshake, returning the new
    /// CONNECTED `Conn` registered with the Router.
    pub fn accept(self: &Arc<Self>) -> Result<Arc<Conn>> {
        loop {
            let packet = self.input.recv()?;
            if let Some(remote) = self.handle_packet(&packet) {
                let conn = Arc::new(Conn::new(self.local, remote, State::Connected));
                crate::ptcp::router::instance().create_conn(conn.clone());
                return Ok(conn);
            }
        }
    }

    /// Applies one inbound packet to the half-open cache. Returns the
    /// remote endpoint to promote into a `Conn` once its final ACK lands.
    /// Split out from `accept` so the handshake logic is testable without
    /// a live Router singleton.
    fn handle_packet(&self, packet: &[u8]) -> Option<(Ipv4Addr, u16)> {
        let parsed = parse_packet(packet).ok()?;
        let tcp = match &parsed.transport {
            Transport::Tcp(h) => h,
            Transport::Udp(_) => return None,
        };

        self.evict_expired();

        let remote = (parsed.ip.src, tcp.src_port);
        let remote_key = crate::codec::util::addr_string(remote.0, remote.1);

        if tcp.flags == SYN && parsed.payload.is_empty() {
            let synack = build_tcp_datagram(
                self.local,
                remote,
                0,
                tcp.seq.wrapping_add(1),
                SYN | ACK,
                &[],
            );
            self.half_open.lock().unwrap().insert(
                remote_key,
                HalfOpen {
                    synack: synack.clone(),
                    created: Instant::now(),
                },
            );
            let _ = self.output.try_send(synack);
            None
        } else if tcp.flags == ACK && parsed.payload.is_empty() {
            let had_entry = self.half_open.lock().unwrap().remove(&remote_key).is_some();
            if had_entry {
                Some(remote)
            } else {
                None
            }
        } else {
            debug!("listener {} ignoring flags {:#x}", self.key(), tcp.flags);
            None
        }
    }

    fn evict_expired(&self) {
        let mut cache = self.half_open.lock().unwrap();
        cache.retain(|_, entry| entry.created.elapsed() < HALF_OPEN_TTL);
    }

    /// Re-enqueues cached SYN+ACK responses so a lost one is retried; the
    /// half-open entry's own TTL bounds the attempt window (§4.5).
    pub fn spawn_rebroadcast(self: &Arc<Self>) {
        let listener = self.clone();
        std::thread::spawn(move || loop {
            if listener.closed.load(Ordering::Acquire) {
                return;
            }
            listener.evict_expired();
            let packets: Vec<Vec<u8>> = listener
                .half_open
                .lock()
                .unwrap()
                .values()
                .map(|e| e.synack.clone())
                .collect();
            for p in packets {
                let _ = listener.output.try_send(p);
            }
            std::thread::sleep(Duration::from_secs(2));
        });
    }

    pub fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.input.close();
        self.output.close();
        crate::ptcp::router::instance().close_listener(&self.key());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_matches_address_string() {
        let l = Listener::new(("10.0.0.1".parse().unwrap(), 12222));
        assert_eq!(l.key(), "10.0.0.1:12222");
    }

    #[test]
    fn syn_without_payload_is_cached_and_emits_synack() {
        let l = Listener::new(("10.0.0.1".parse().unwrap(), 12222));
        let syn = build_tcp_datagram(
            ("10.0.0.2".parse().unwrap(), 5555),
            ("10.0.0.1".parse().unwrap(), 12222),
            7,
            0,
            SYN,
            &[],
        );
        let promoted = l.handle_packet(&syn);
        assert!(promoted.is_none());
        assert_eq!(l.output.len(), 1);
        assert_eq!(l.half_open.lock().unwrap().len(), 1);
    }

    #[test]
    fn matching_ack_promotes_and_clears_half_open_entry() {
        let l = Listener::new(("10.0.0.1".parse().unwrap(), 12222));
        let remote = ("10.0.0.2".parse().unwrap(), 5555);
        let syn = build_tcp_datagram(remote, ("10.0.0.1".parse().unwrap(), 12222), 7, 0, SYN, &[]);
        assert!(l.handle_packet(&syn).is_none());

        let ack = build_tcp_datagram(remote, ("10.0.0.1".parse().unwrap(), 12222), 8, 8, ACK, &[]);
        let promoted = l.handle_packet(&ack);
        assert_eq!(promoted, Some(remote));
        assert!(l.half_open.lock().unwrap().is_empty());
    }

    #[test]
    fn ack_without_prior_syn_is_ignored() {
        let l = Listener::new(("10.0.0.1".parse().unwrap(), 12222));
        let ack = build_tcp_datagram(
            ("10.0.0.2".parse().unwrap(), 5555),
            ("10.0.0.1".parse().unwrap(), 12222),
            8,
            8,
            ACK,
            &[],
        );
        assert!(l.handle_packet(&ack).is_none());
    }
}
