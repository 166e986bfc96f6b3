//! The process-wide demultiplexer singleton, grounded on `ptcp.PTCP`/
//! `ptcp/ptcp.go`. §9's first Design Note calls for an explicit object with
//! well-defined init order rather than implicit init-at-load, so this is a
//! `Router` constructed once by [`init`] and reached afterwards through
//! [`instance`] — a `std::sync::OnceLock` standing in for the original's
//! package-level `var ptcpServer *PTCP`.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};
use std::thread;

use log::{debug, info, warn};

use crate::codec::build::{parse_packet, Transport};
use crate::codec::util::{ACK, FIN};
use crate::link::raw::RawLink;
use crate::link::Link;
use crate::ptcp::conn::Conn;
use crate::ptcp::listener::Listener;
use crate::result::Result;

static ROUTER: OnceLock<Arc<Router>> = OnceLock::new();

pub struct Router {
    link: Box<dyn Link>,
    listeners: RwLock<HashMap<String, Arc<Listener>>>,
    connections: RwLock<HashMap<String, Arc<Conn>>>,
}

/// One-time process-wide setup: opens the named link, installs the
/// singleton, and starts the ingress loop and idle-timeout sweeper.
pub fn init(interface_name: &str) -> Result<()> {
    let link = RawLink::open(interface_name)?;
    init_with_link(Box::new(link))
}

/// Test/advanced entry point taking an arbitrary `Link` (a `MockLink`, for
/// instance) instead of opening a real raw socket.
pub fn init_with_link(link: Box<dyn Link>) -> Result<()> {
    let router = Arc::new(Router {
        link,
        listeners: RwLock::new(HashMap::new()),
        connections: RwLock::new(HashMap::new()),
    });

    if ROUTER.set(router.clone()).is_err() {
        warn!("ptcp::init called more than once; ignoring");
        return Ok(());
    }

    let ingress = router.clone();
    thread::spawn(move || ingress.run_ingress());

    let sweeper = router.clone();
    thread::spawn(move || sweeper.run_sweeper());

    Ok(())
}

/// Panics if called before [`init`], matching the original's nil-singleton
/// behavior when `Dial`/`Listen` are called before `Init`.
pub fn instance() -> Arc<Router> {
    ROUTER
        .get()
        .expect("ptcp::init must be called before dialing or listening")
        .clone()
}

impl Router {
    fn run_ingress(self: Arc<Self>) {
        loop {
            match self.link.read() {
                Ok(payload) if !payload.is_empty() => self.dispatch(payload),
                Ok(_) => {}
                Err(e) => {
                    warn!("link read failed: {}", e);
                    thread::sleep(std::time::Duration::from_millis(50));
                }
            }
        }
    }

    fn dispatch(&self, bytes: Vec<u8>) {
        let parsed = match parse_packet(&bytes) {
            Ok(p) => p,
            Err(e) => {
                debug!("discarding unparseable packet: {}", e);
                return;
            }
        };
        let tcp = match &parsed.transport {
            Transport::Tcp(h) => h.clone(),
            Transport::Udp(_) => return,
        };

        let conn_key = parsed.dst_key();
        let conn = self.connections.read().unwrap().get(&conn_key).cloned();
        if let Some(conn) = conn {
            if tcp.flags == FIN {
                let responder = conn.clone();
                thread::spawn(move || responder.close_response());
            } else if tcp.flags == ACK {
                conn.update_time();
            }
            let _ = conn.input.try_send(bytes);
            return;
        }

        let listener_key = parsed.local_listener_key();
        if let Some(listener) = self.listeners.read().unwrap().get(&listener_key).cloned() {
            let _ = listener.input.try_send(bytes);
        }
    }

    fn run_sweeper(self: Arc<Self>) {
        loop {
            thread::sleep(crate::meta::conn_timeout());
            self.sweep_once();
        }
    }

    /// One idle-timeout scan-and-close pass, split out of the loop above so
    /// it's directly testable without waiting on the sweeper's own sleep
    /// cadence (mirrors `Listener::handle_packet`'s split for the same
    /// reason).
    fn sweep_once(&self) {
        let timed_out: Vec<Arc<Conn>> = self
            .connections
            .read()
            .unwrap()
            .values()
            .filter(|c| c.is_timeout())
            .cloned()
            .collect();
        for conn in timed_out {
            info!("idle-timeout closing {}", conn.key());
            let _ = conn.close();
        }
    }

    pub fn create_conn(self: &Arc<Self>, conn: Arc<Conn>) {
        let key = conn.key();
        self.connections
            .write()
            .unwrap()
            .insert(key, conn.clone());

        let link = self.clone();
        let pumped = conn.clone();
        thread::spawn(move || loop {
            match pumped.output.recv() {
                Ok(bytes) => {
                    if let Err(e) = link.link.write(&bytes) {
                        warn!("egress write failed for {}: {}", pumped.key(), e);
                    }
                }
                Err(_) => return,
            }
        });

        conn.spawn_keep_alive();
    }

    pub fn close_conn(&self, key: &str) {
        self.connections.write().unwrap().remove(key);
    }

    pub fn create_listener(self: &Arc<Self>, listener: Arc<Listener>) {
        let key = listener.key();
        self.listeners
            .write()
            .unwrap()
            .insert(key, listener.clone());

        let link = self.clone();
        let pumped = listener.clone();
        thread::spawn(move || loop {
            match pumped.output.recv() {
                Ok(bytes) => {
                    if let Err(e) = link.link.write(&bytes) {
                        warn!("egress write failed for listener {}: {}", pumped.key(), e);
                    }
                }
                Err(_) => return,
            }
        });

        listener.spawn_rebroadcast();
    }

    pub fn close_listener(&self, key: &str) {
        self.listeners.write().unwrap().remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::build::build_tcp_datagram;
    use crate::codec::util::SYN;
    use crate::link::MockLink;
    use crate::ptcp::conn::State;
    use std::net::Ipv4Addr;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::OnceLock as StdOnceLock;
    use std::time::Duration;

    static INIT_ONCE: AtomicBool = AtomicBool::new(false);
    static TEST_LINK: StdOnceLock<Arc<MockLink>> = StdOnceLock::new();

    /// The whole test binary shares one `ROUTER` (it's a process-wide
    /// `OnceLock`), so every test in this module drives the same `Router`
    /// through the same `MockLink` — wrapped in an `Arc` so the test keeps a
    /// handle to it alongside the `Box<dyn Link>` the Router owns.
    fn ensure_router() -> (Arc<Router>, Arc<MockLink>) {
        if !INIT_ONCE.swap(true, Ordering::SeqCst) {
            let link = Arc::new(MockLink::new());
            TEST_LINK.set(link.clone()).ok();
            init_with_link(Box::new(link)).unwrap();
        }
        (instance(), TEST_LINK.get().unwrap().clone())
    }

    /// Polls `link.sent()` for a frame matching `pred`, newest first.
    fn wait_for_frame(link: &MockLink, pred: impl Fn(&crate::codec::build::ParsedPacket) -> bool) -> Vec<u8> {
        for _ in 0..300 {
            if let Some(frame) = link
                .sent()
                .into_iter()
                .rev()
                .find(|b| parse_packet(b).map(|p| pred(&p)).unwrap_or(false))
            {
                return frame;
            }
            thread::sleep(Duration::from_millis(10));
        }
        panic!("timed out waiting for a matching frame on the mock link");
    }

    #[test]
    fn double_init_does_not_panic() {
        let (a, _) = ensure_router();
        let (b, _) = ensure_router();
        assert!(Arc::ptr_eq(&a, &b));
    }

    /// S3 (Dial handshake) followed by S5 (active close), both driven
    /// against the shared `MockLink` — combined into one test so the two
    /// scenarios run strictly in order regardless of how the test harness
    /// schedules `#[test]` functions across threads.
    #[test]
    fn dial_handshake_reaches_connected_then_active_close_reaches_closed() {
        let (_, link) = ensure_router();
        let remote: (Ipv4Addr, u16) = (Ipv4Addr::new(127, 0, 0, 1), 12222);

        let remote_addr = format!("{}:{}", remote.0, remote.1);
        let dial_handle = thread::spawn(move || crate::ptcp::dial::dial(&remote_addr));

        // S3: let the SYN reach the mock link, learn the ephemeral local
        // port Dial picked, then answer with a SYN|ACK.
        let syn = wait_for_frame(&link, |p| p.tcp().map(|h| h.syn() && !h.ack()).unwrap_or(false));
        let parsed_syn = parse_packet(&syn).unwrap();
        let local = (parsed_syn.ip.src, parsed_syn.src_port());

        let synack = build_tcp_datagram(remote, local, 0, 1, SYN | ACK, &[]);
        link.push_inbound(synack);

        let conn = dial_handle.join().unwrap().expect("dial should succeed");
        assert_eq!(conn.state(), State::Connected);

        let final_ack = wait_for_frame(&link, |p| {
            p.tcp()
                .map(|h| h.flags == ACK && h.seq == 1 && h.ack_num == 1)
                .unwrap_or(false)
        });
        assert!(parse_packet(&final_ack).unwrap().payload.is_empty());

        // S5: active close — exactly one FIN goes out, a FIN|ACK comes
        // back, exactly one final ACK goes out, state lands on CLOSED.
        let closing = conn.clone();
        let close_handle = thread::spawn(move || closing.close());

        let fin = wait_for_frame(&link, |p| p.tcp().map(|h| h.flags == FIN).unwrap_or(false));
        assert_eq!(parse_packet(&fin).unwrap().tcp().unwrap().ack_num, 3);

        let finack = build_tcp_datagram(remote, local, 3, 3, FIN | ACK, &[]);
        link.push_inbound(finack);

        close_handle.join().unwrap().unwrap();
        assert_eq!(conn.state(), State::Closed);

        let closing_ack = wait_for_frame(&link, |p| {
            p.tcp()
                .map(|h| h.flags == ACK && h.seq == 3 && h.ack_num == 3)
                .unwrap_or(false)
        });
        assert!(parse_packet(&closing_ack).unwrap().payload.is_empty());
    }

    /// S6: the idle-timeout sweeper removes a Conn that has gone quiet.
    /// Calls `sweep_once` directly instead of waiting on the background
    /// sweeper thread's own sleep cadence, which is pinned to whatever
    /// `conn_timeout()` happened to read on this process's very first
    /// `init_with_link` call and isn't worth racing against.
    #[test]
    fn idle_sweep_removes_a_quiet_connection() {
        let (router, _) = ensure_router();
        let local: (Ipv4Addr, u16) = (Ipv4Addr::new(10, 1, 2, 3), 40001);
        let remote: (Ipv4Addr, u16) = (Ipv4Addr::new(10, 1, 2, 4), 12223);
        let conn = Arc::new(Conn::new(local, remote, State::Connected));
        let key = conn.key();
        router.create_conn(conn.clone());

        std::env::set_var("PTCP_CONN_TIMEOUT_SECS", "0");
        thread::sleep(Duration::from_millis(1100));
        router.sweep_once();
        std::env::remove_var("PTCP_CONN_TIMEOUT_SECS");

        assert!(!router.connections.read().unwrap().contains_key(&key));
        assert_eq!(conn.state(), State::Closed);
    }
}
