//! The link-layer abstraction pTCP drives everything else through: open a
//! named interface, block for the next frame's IP payload, or resolve and
//! transmit one. Grounded on the teacher's `data_link::DataLayer` trait,
//! widened from raw send/recv to the IP-payload-in, IP-payload-out contract
//! spec §4.3 describes (next-hop MAC resolution happens inside `write`, not
//! at the call site).

pub mod raw;

use crate::result::Result;

pub trait Link: Send + Sync {
    /// Blocks for the next Ethernet frame addressed to this interface and
    /// returns its IP payload.
    fn read(&self) -> Result<Vec<u8>>;

    /// Resolves the next-hop MAC for `ip_packet`'s destination and
    /// transmits it Ethernet-framed.
    fn write(&self, ip_packet: &[u8]) -> Result<()>;
}

#[cfg(test)]
pub use mock::MockLink;

#[cfg(test)]
mod mock {
    use super::Link;
    use crate::result::{Error, Result};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// An in-memory `Link` double: `write` appends to `sent`, `read` pops
    /// from a preloaded `inbound` queue. Used to drive router/dial/accept/
    /// close scenarios without a real socket.
    #[derive(Default)]
    pub struct MockLink {
        inbound: Mutex<VecDeque<Vec<u8>>>,
        sent: Mutex<Vec<Vec<u8>>>,
    }

    impl MockLink {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn push_inbound(&self, packet: Vec<u8>) {
            self.inbound.lock().unwrap().push_back(packet);
        }

        pub fn sent(&self) -> Vec<Vec<u8>> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl Link for MockLink {
        fn read(&self) -> Result<Vec<u8>> {
            self.inbound
                .lock()
                .unwrap()
                .pop_front()
                .ok_or(Error::Closed)
        }

        fn write(&self, ip_packet: &[u8]) -> Result<()> {
            self.sent.lock().unwrap().push(ip_packet.to_vec());
            Ok(())
        }
    }

    #[test]
    fn write_then_read_roundtrips_through_the_mock() {
        let link = MockLink::new();
        link.write(b"hello").unwrap();
        assert_eq!(link.sent(), vec![b"hello".to_vec()]);

        link.push_inbound(b"world".to_vec());
        assert_eq!(link.read().unwrap(), b"world");
        assert!(matches!(link.read(), Err(Error::Closed)));
    }
}
