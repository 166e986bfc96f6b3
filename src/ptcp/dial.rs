//! Active-open driver, grounded on `Dial`/`ptcp/dial.go` + `GetLocalAddr`/
//! `ptcp/util.go`, completed with the handshake retry loop spec §4.7
//! describes (the original stopped at "create the Conn and register it").

use std::net::{Ipv4Addr, UdpSocket};

use log::info;

use crate::codec::build::build_tcp_datagram;
use crate::codec::util::{parse_addr, ACK, SYN};
use crate::ptcp::conn::{retransmit_until, Conn, State};
use crate::result::{Error, Result};

/// Opens a throwaway UDP socket to `remote` and reads back the local
/// endpoint the kernel would route through — the standard "which local IP
/// originates traffic to R?" trick `GetLocalAddr` uses.
fn local_addr_for(remote: (Ipv4Addr, u16)) -> Result<(Ipv4Addr, u16)> {
    let socket = UdpSocket::bind("0.0.0.0:0")?;
    socket.connect((remote.0, remote.1))?;
    let local = socket.local_addr()?;
    match local.ip() {
        std::net::IpAddr::V4(ip) => Ok((ip, local.port())),
        std::net::IpAddr::V6(_) => Err(Error::Resolve(crate::result::ResolveError::UnknownLocalIp)),
    }
}

/// `Dial("ptcp", "ip:port")`: resolves a local endpoint, drives the
/// three-way handshake, and returns a CONNECTED `Conn` registered with the
/// Router.
pub fn dial(remote_addr: &str) -> Result<std::sync::Arc<Conn>> {
    let remote = parse_addr(remote_addr)
        .ok_or(Error::Resolve(crate::result::ResolveError::UnknownLocalIp))?;
    let local = local_addr_for(remote)?;

    let conn = std::sync::Arc::new(Conn::new(local, remote, State::Connecting));
    crate::ptcp::router::instance().create_conn(conn.clone());

    let syn = build_tcp_datagram(local, remote, 0, 0, SYN, &[]);
    let matched = retransmit_until(&conn.output, &conn.input, syn, |h| {
        h.syn() && h.ack() && h.ack_num == 1
    });

    if !matched {
        conn.input.close();
        conn.output.close();
        crate::ptcp::router::instance().close_conn(&conn.key());
        return Err(Error::Handshake("timeout"));
    }

    let final_ack = build_tcp_datagram(local, remote, 1, 1, ACK, &[]);
    let sent = conn.write_with_header(final_ack)?;
    if !sent {
        conn.input.close();
        conn.output.close();
        crate::ptcp::router::instance().close_conn(&conn.key());
        return Err(Error::Handshake("packet loss"));
    }

    conn.mark_connected();
    info!("dial to {} completed, conn {} CONNECTED", remote_addr, conn.key());
    Ok(conn)
}
