//! The public pTCP API: `init`, `dial`, `listen`, and the `Conn`/`Listener`/
//! `Addr` types, matching the surface spec §6 describes.

pub mod addr;
pub mod conn;
pub mod dial;
pub mod listener;
pub mod router;

pub use addr::Addr;
pub use conn::{Conn, State};
pub use listener::Listener;

use std::sync::Arc;

use crate::codec::util::parse_addr;
use crate::result::{Error, ResolveError, Result};

/// `Init(interfaceName)`: opens the raw link and starts the Router's
/// ingress/sweeper threads. Must be called exactly once before `dial` or
/// `listen`.
pub fn init(interface_name: &str) -> Result<()> {
    router::init(interface_name)
}

/// `Dial("ptcp", addr)`. The network argument is accepted for symmetry with
/// `net.Dial` but pTCP only ever speaks one network.
pub fn dial(network: &str, addr: &str) -> Result<Arc<Conn>> {
    check_network(network)?;
    dial::dial(addr)
}

/// `Listen("ptcp", addr)`: registers a `Listener` with the Router and
/// returns it for the caller to `Accept` on.
pub fn listen(network: &str, addr: &str) -> Result<Arc<Listener>> {
    check_network(network)?;
    let local = parse_addr(addr).ok_or(Error::Resolve(ResolveError::UnknownLocalIp))?;
    let listener = Arc::new(Listener::new(local));
    router::instance().create_listener(listener.clone());
    Ok(listener)
}

fn check_network(network: &str) -> Result<()> {
    if network != "ptcp" {
        return Err(Error::Resolve(ResolveError::UnsupportedNetwork));
    }
    Ok(())
}
