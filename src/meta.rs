//! Crate-wide constants: MTU/header sizes and the knobs from spec §4.7.

use std::time::Duration;

pub const ETHERNET_MTU: usize = 1500;
pub const TCP_HEADER_SIZE: usize = 20;
pub const IP_HEADER_SIZE: usize = 20;
pub const ETHERNET_HEADER_SIZE: usize = 14;
pub const MIN_FRAME_PAYLOAD: usize = 46;
pub const TCP_IP_PAYLOAD_MAXIMUM_SIZE: usize = ETHERNET_MTU - TCP_HEADER_SIZE - IP_HEADER_SIZE;

/// How many times Dial/Close retransmit a handshake/teardown packet before
/// giving up.
pub const RETRYTIME: u32 = 5;
/// Delay between retransmissions.
pub const RETRYINTERVAL: Duration = Duration::from_millis(500);
/// Receive buffer size for one raw frame.
pub const BUFFERSIZE: usize = 65535;
/// Bounded queue capacity for a Conn's input/output queues.
pub const CONNCHANBUFSIZE: usize = 1024;
/// Bounded queue capacity for a Listener's input/output queues.
pub const LISTENERBUFSIZE: usize = 1024;
/// Default idle-timeout, in seconds, before the sweeper closes a Conn.
pub const CONNTIMEOUT_DEFAULT_SECS: u64 = 30;
/// TTL of a listener's half-open (SYN seen, ACK not yet seen) cache entry.
pub const HALF_OPEN_TTL: Duration = Duration::from_secs(10);
/// Default TCP window advertised in outbound headers.
pub const DEFAULT_WINDOW: u16 = 29200;
/// TTL written into outbound IPv4 headers.
pub const DEFAULT_TTL: u8 = 255;

/// Reads `PTCP_CONN_TIMEOUT_SECS` if set, else the default from spec §4.7.
pub fn conn_timeout() -> Duration {
    let secs = std::env::var("PTCP_CONN_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(CONNTIMEOUT_DEFAULT_SECS);
    Duration::from_secs(secs)
}
