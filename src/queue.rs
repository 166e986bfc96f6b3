//! A bounded, multi-producer multi-consumer queue with non-blocking `send`
//! (drop-when-full, matching the original's non-blocking `select` enqueue in
//! `ptcp.Start`) and blocking `recv`.
//!
//! Design Note #4 in spec §9 explicitly rejects the original's
//! panic/`recover`-on-closed-channel pattern (`ptcp/conn.go`'s `Read`/
//! `Write`); this uses an explicit closed flag instead, checked by both
//! `send` and `recv` so a closed queue fails fast rather than panicking.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use crossbeam_queue::ArrayQueue;

use crate::result::{Error, Result};

pub struct BoundedQueue<T> {
    inner: ArrayQueue<T>,
    closed: AtomicBool,
    lock: Mutex<()>,
    not_empty: Condvar,
    not_full: Condvar,
}

impl<T> BoundedQueue<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: ArrayQueue::new(capacity),
            closed: AtomicBool::new(false),
            lock: Mutex::new(()),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        }
    }

    /// Enqueues without blocking. Drops the value (returning `Ok(false)`)
    /// if the queue is full, mirroring the original's non-blocking `select`.
    /// Returns `Err(Error::Closed)` once `close` has been called.
    pub fn try_send(&self, value: T) -> Result<bool> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::Closed);
        }
        let ok = self.inner.push(value).is_ok();
        if ok {
            let _guard = self.lock.lock().unwrap();
            self.not_empty.notify_one();
        }
        Ok(ok)
    }

    /// Blocks until there is room for `value`, per spec §4.6's "Write blocks
    /// if OutputChan is full" (user `Conn::write`, unlike the ingress
    /// loop's drop-on-full enqueue).
    pub fn send(&self, mut value: T) -> Result<()> {
        loop {
            if self.closed.load(Ordering::Acquire) {
                return Err(Error::Closed);
            }
            match self.inner.push(value) {
                Ok(()) => {
                    let _guard = self.lock.lock().unwrap();
                    self.not_empty.notify_one();
                    return Ok(());
                }
                Err(rejected) => {
                    value = rejected;
                    let guard = self.lock.lock().unwrap();
                    if !self.inner.is_full() || self.closed.load(Ordering::Acquire) {
                        continue;
                    }
                    let _ = self
                        .not_full
                        .wait_timeout(guard, Duration::from_millis(200))
                        .unwrap();
                }
            }
        }
    }

    /// Blocks until a value is available or the queue is closed and
    /// drained.
    pub fn recv(&self) -> Result<T> {
        loop {
            if let Some(v) = self.inner.pop() {
                let _guard = self.lock.lock().unwrap();
                self.not_full.notify_one();
                return Ok(v);
            }
            if self.closed.load(Ordering::Acquire) {
                return Err(Error::Closed);
            }
            let guard = self.lock.lock().unwrap();
            // Re-check after acquiring the lock: a value or close may have
            // landed between the checks above and taking the lock.
            if !self.inner.is_empty() || self.closed.load(Ordering::Acquire) {
                continue;
            }
            let _ = self
                .not_empty
                .wait_timeout(guard, Duration::from_millis(200))
                .unwrap();
        }
    }

    /// Pops without blocking: `Ok(None)` if empty, `Err(Closed)` if closed
    /// and drained. Used by the non-blocking `ReadWithHeader` control-flow
    /// path (Dial/Accept/Close polling for a handshake response).
    pub fn try_recv(&self) -> Result<Option<T>> {
        if let Some(v) = self.inner.pop() {
            let _guard = self.lock.lock().unwrap();
            self.not_full.notify_one();
            return Ok(Some(v));
        }
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::Closed);
        }
        Ok(None)
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        let _guard = self.lock.lock().unwrap();
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn send_then_recv_roundtrips() {
        let q = BoundedQueue::new(4);
        assert!(q.try_send(1).unwrap());
        assert_eq!(q.recv().unwrap(), 1);
    }

    #[test]
    fn full_queue_drops_instead_of_blocking() {
        let q = BoundedQueue::new(1);
        assert!(q.try_send(1).unwrap());
        assert!(!q.try_send(2).unwrap());
        assert_eq!(q.recv().unwrap(), 1);
    }

    #[test]
    fn closed_queue_rejects_send_and_drains_then_errors_on_recv() {
        let q = BoundedQueue::new(4);
        q.try_send(1).unwrap();
        q.close();
        assert!(matches!(q.try_send(2), Err(Error::Closed)));
        assert_eq!(q.recv().unwrap(), 1);
        assert!(matches!(q.recv(), Err(Error::Closed)));
    }

    #[test]
    fn recv_blocks_until_a_concurrent_send_wakes_it() {
        let q = Arc::new(BoundedQueue::new(4));
        let q2 = q.clone();
        let handle = thread::spawn(move || q2.recv().unwrap());
        thread::sleep(Duration::from_millis(50));
        q.try_send(42).unwrap();
        assert_eq!(handle.join().unwrap(), 42);
    }

    #[test]
    fn blocking_send_waits_for_room_then_succeeds() {
        let q = Arc::new(BoundedQueue::new(1));
        q.try_send(1).unwrap();
        let q2 = q.clone();
        let handle = thread::spawn(move || q2.send(2));
        thread::sleep(Duration::from_millis(50));
        assert_eq!(q.recv().unwrap(), 1);
        handle.join().unwrap().unwrap();
        assert_eq!(q.recv().unwrap(), 2);
    }
}
