//! ARP table, routing table, and local-interface snapshots, grounded on the
//! `netinfo` package in the original `xitongsys/ptcp`: these are read once
//! at `ptcp::init` and consulted by `link::raw` to resolve next-hop MACs.

pub mod arp;
pub mod local;
pub mod route;

pub use arp::Arp;
pub use local::Local;
pub use route::Route;
