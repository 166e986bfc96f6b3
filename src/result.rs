use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

/// Error kinds, grouped the way spec §7 groups them.
#[derive(Debug)]
pub enum Error {
    /// Packet too short, unsupported protocol, bad VLAN, bad FCS.
    Parse(ParseError),
    /// ARP miss, no route, unknown local IP.
    Resolve(ResolveError),
    /// "timeout" or "packet loss" from a handshake/teardown driver.
    Handshake(&'static str),
    /// Read/Write on a non-CONNECTED Conn, or a send/recv on a closed queue.
    Closed,
    /// OS-level failure surfaced from the Link.
    Io(std::io::Error),
}

#[derive(Debug)]
pub enum ParseError {
    TooShort,
    UnsupportedProtocol(u8),
    InvalidVlan(&'static str),
    InvalidFcs,
    UnexpectedEof,
}

#[derive(Debug)]
pub enum ResolveError {
    ArpMiss(u32),
    NoRoute(u32),
    UnknownLocalIp,
    UnsupportedNetwork,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Parse(e) => write!(f, "parse error: {:?}", e),
            Error::Resolve(e) => write!(f, "resolve error: {:?}", e),
            Error::Handshake(msg) => write!(f, "{}", msg),
            Error::Closed => write!(f, "closed"),
            Error::Io(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for Error {}

macro_rules! impl_error {
    ($err:ty, $variant:ident) => {
        impl From<$err> for Error {
            fn from(err: $err) -> Self {
                Error::$variant(err)
            }
        }
    };
}

impl_error!(std::io::Error, Io);
impl_error!(ParseError, Parse);
impl_error!(ResolveError, Resolve);
