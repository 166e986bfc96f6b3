//! The per-connection state machine, grounded on `ptcp.Conn`/`ptcp/conn.go`
//! but replacing the original's recover-from-panic-on-closed-channel Read/
//! Write (§9 Design Note #3) with `BoundedQueue`'s explicit closed bit, and
//! filling in the handshake/teardown protocols spec §4.6 describes (the Go
//! source never implemented them).

use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use log::{debug, info, warn};

use crate::codec::build::{build_tcp_datagram, parse_packet, Transport};
use crate::codec::util::{ACK, FIN, PSH};
use crate::meta::{conn_timeout, CONNCHANBUFSIZE, RETRYINTERVAL, RETRYTIME};
use crate::ptcp::addr::Addr;
use crate::queue::BoundedQueue;
use crate::result::{Error, Result};

/// Fixed seq/ack placeholders for the data phase, kept for bug-compatibility
/// with the original instead of real byte-counting sequencing (§9, Open
/// Question #1; decision recorded in DESIGN.md).
const DATA_SEQ: u32 = 2;
const DATA_ACK: u32 = 2;
/// Fixed placeholders for the close handshake.
const CLOSE_SEQ: u32 = 3;
const CLOSE_ACK: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum State {
    Connecting = 0,
    Connected = 1,
    Closing = 2,
    Closed = 3,
}

impl From<u8> for State {
    fn from(v: u8) -> Self {
        match v {
            0 => State::Connecting,
            1 => State::Connected,
            2 => State::Closing,
            _ => State::Closed,
        }
    }
}

pub struct Conn {
    local_addr: Addr,
    remote_addr: Addr,
    local: (Ipv4Addr, u16),
    remote: (Ipv4Addr, u16),
    state: AtomicU8,
    pub(crate) input: BoundedQueue<Vec<u8>>,
    pub(crate) output: BoundedQueue<Vec<u8>>,
    last_activity: AtomicU64,
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

impl Conn {
    pub fn new(local: (Ipv4Addr, u16), remote: (Ipv4Addr, u16), state: State) -> Self {
        Self {
            local_addr: Addr::new(local.0, local.1),
            remote_addr: Addr::new(remote.0, remote.1),
            local,
            remote,
            state: AtomicU8::new(state as u8),
            input: BoundedQueue::new(CONNCHANBUFSIZE),
            output: BoundedQueue::new(CONNCHANBUFSIZE),
            last_activity: AtomicU64::new(now_secs()),
        }
    }

    pub fn local_addr(&self) -> &Addr {
        &self.local_addr
    }

    pub fn remote_addr(&self) -> &Addr {
        &self.remote_addr
    }

    /// The router key this Conn is registered under: `localAddr:remoteAddr`.
    pub fn key(&self) -> String {
        format!("{}:{}", self.local_addr, self.remote_addr)
    }

    pub fn state(&self) -> State {
        State::from(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, s: State) {
        self.state.store(s as u8, Ordering::Release);
    }

    /// Promotes a CONNECTING Conn to CONNECTED once Dial's handshake
    /// finishes. Not exposed more broadly — Accept constructs Conns already
    /// CONNECTED.
    pub(crate) fn mark_connected(&self) {
        self.set_state(State::Connected);
    }

    pub fn update_time(&self) {
        self.last_activity.store(now_secs(), Ordering::Relaxed);
    }

    pub fn is_timeout(&self) -> bool {
        let last = self.last_activity.load(Ordering::Relaxed);
        now_secs().saturating_sub(last) > conn_timeout().as_secs()
    }

    /// Non-blocking variant used by Dial/Accept/Close: pops a raw encoded
    /// packet if one is waiting, returns `Ok(None)` otherwise.
    pub fn read_with_header(&self) -> Result<Option<Vec<u8>>> {
        self.input.try_recv()
    }

    /// Non-blocking variant used by Dial/Accept/Close: pushes raw encoded
    /// bytes verbatim, dropping silently if the queue is full.
    pub fn write_with_header(&self, bytes: Vec<u8>) -> Result<bool> {
        self.output.try_send(bytes)
    }

    /// Blocking stream read: strips headers, skips empty-payload control
    /// packets, copies into `buf`.
    pub fn read(&self, buf: &mut [u8]) -> Result<usize> {
        if self.state() != State::Connected {
            return Err(Error::Closed);
        }
        loop {
            let packet = self.input.recv()?;
            let parsed = match parse_packet(&packet) {
                Ok(p) => p,
                Err(_) => continue,
            };
            if parsed.payload.is_empty() {
                continue;
            }
            let n = parsed.payload.len().min(buf.len());
            buf[..n].copy_from_slice(&parsed.payload[..n]);
            return Ok(parsed.payload.len());
        }
    }

    /// Blocking stream write: builds a PSH|ACK packet with the fixed data
    /// placeholders and blocks until there is room on the output queue.
    pub fn write(&self, buf: &[u8]) -> Result<usize> {
        if self.state() != State::Connected {
            return Err(Error::Closed);
        }
        let bytes = build_tcp_datagram(
            self.local,
            self.remote,
            DATA_SEQ,
            DATA_ACK,
            PSH | ACK,
            buf,
        );
        self.output.send(bytes)?;
        Ok(buf.len())
    }

    /// Spawns the once-per-second keep-alive emitter. Stops once the Conn
    /// leaves CONNECTED.
    pub fn spawn_keep_alive(self: &std::sync::Arc<Self>) {
        let conn = self.clone();
        thread::spawn(move || loop {
            if conn.state() != State::Connected {
                return;
            }
            let bytes = build_tcp_datagram(conn.local, conn.remote, DATA_SEQ, DATA_ACK, ACK, &[]);
            let _ = conn.output.try_send(bytes);
            thread::sleep(Duration::from_secs(1));
        });
    }

    /// Active close (`CloseRequest`): FIN, wait for FIN|ACK, final ACK.
    fn close_request(&self) -> Result<()> {
        self.set_state(State::Closing);
        let fin = build_tcp_datagram(self.local, self.remote, CLOSE_SEQ, CLOSE_ACK, FIN, &[]);

        let matched = retransmit_until(&self.output, &self.input, fin, |h| {
            h.fin() && h.ack() && h.ack_num == CLOSE_ACK
        });

        if !matched {
            warn!("active close on {} timed out waiting for FIN|ACK", self.key());
            self.set_state(State::Closed);
            return Err(Error::Handshake("timeout"));
        }

        let ack = build_tcp_datagram(self.local, self.remote, CLOSE_SEQ, CLOSE_ACK, ACK, &[]);
        let _ = self.output.try_send(ack);
        self.set_state(State::Closed);
        info!("{} closed (active)", self.key());
        Ok(())
    }

    /// Passive close (`CloseResponse`): triggered by the router on an
    /// inbound FIN. FIN|ACK, wait for ACK, then drop from the router.
    pub fn close_response(self: &std::sync::Arc<Self>) {
        self.set_state(State::Closing);
        let finack = build_tcp_datagram(self.local, self.remote, CLOSE_SEQ, CLOSE_ACK, FIN | ACK, &[]);

        let matched = retransmit_until(&self.output, &self.input, finack, |h| {
            h.ack() && !h.fin() && h.ack_num == CLOSE_ACK
        });

        if !matched {
            debug!("passive close on {} timed out waiting for ACK", self.key());
        }

        self.set_state(State::Closed);
        self.input.close();
        self.output.close();
        crate::ptcp::router::instance().close_conn(&self.key());
        info!("{} closed (passive)", self.key());
    }

    /// User-visible `Close`: active-close protocol, then deregister and
    /// close both queues. Idempotent — closing twice is a no-op.
    pub fn close(&self) -> Result<()> {
        if self.state() == State::Closed {
            return Ok(());
        }
        let result = self.close_request();
        self.input.close();
        self.output.close();
        crate::ptcp::router::instance().close_conn(&self.key());
        result
    }
}

/// Retransmits `packet` onto `output` every `RETRYINTERVAL` up to
/// `RETRYTIME` times, polling `input` for a response satisfying `matches`.
/// Returns `true` as soon as a matching response is observed.
pub(crate) fn retransmit_until(
    output: &BoundedQueue<Vec<u8>>,
    input: &BoundedQueue<Vec<u8>>,
    packet: Vec<u8>,
    matches: impl Fn(&crate::codec::TcpHeader) -> bool,
) -> bool {
    const POLL: Duration = Duration::from_millis(20);

    for _ in 0..RETRYTIME {
        let _ = output.try_send(packet.clone());

        let mut waited = Duration::ZERO;
        while waited < RETRYINTERVAL {
            if let Ok(Some(bytes)) = input.try_recv() {
                if let Ok(parsed) = parse_packet(&bytes) {
                    if let Transport::Tcp(h) = &parsed.transport {
                        if matches(h) {
                            return true;
                        }
                    }
                }
            }
            thread::sleep(POLL);
            waited += POLL;
        }
    }
    false
}
