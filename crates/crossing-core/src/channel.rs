//! Latest-value mailbox connecting the toggle task to its waiters.
//!
//! [`Mailbox`] looks like a queue from the producer side: every
//! [`publish`](Mailbox::publish) appends. A receiver, however, always takes
//! the newest value and throws the rest of the backlog away in the same
//! critical section. A waiter that checks in rarely therefore never sees a
//! phase that has already been superseded.
//!
//! Each published value is handed to at most one receiver. Publishing wakes
//! a single blocked receiver; [`close`](Mailbox::close) wakes all of them.

use std::time::{Duration, Instant};

use crossing_types::Phase;
use parking_lot::{Condvar, Mutex};
use tracing::trace;

/// The mailbox that carries phase changes.
pub type PhaseChannel = Mailbox<Phase>;

/// Returned by [`Mailbox::receive_unless_closed`] once the mailbox is closed
/// and drained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("channel closed")]
pub struct ChannelClosed;

#[derive(Debug)]
struct Slot<T> {
    backlog: Vec<T>,
    closed: bool,
}

impl<T> Slot<T> {
    /// Take the newest value and drop everything published before it.
    fn take_latest(&mut self) -> Option<T> {
        let latest = self.backlog.pop()?;
        if !self.backlog.is_empty() {
            trace!(discarded = self.backlog.len(), "collapsed stale backlog");
            self.backlog.clear();
        }
        Some(latest)
    }
}

/// Thread-safe single-slot handoff that only ever delivers the most recent
/// value.
#[derive(Debug)]
pub struct Mailbox<T> {
    slot: Mutex<Slot<T>>,
    available: Condvar,
}

impl<T> Mailbox<T> {
    /// Create an empty, open mailbox.
    pub const fn new() -> Self {
        Self {
            slot: Mutex::new(Slot {
                backlog: Vec::new(),
                closed: false,
            }),
            available: Condvar::new(),
        }
    }

    /// Append `value` and wake one blocked receiver.
    ///
    /// Never blocks beyond the short critical section. After
    /// [`close`](Self::close) the value is dropped.
    pub fn publish(&self, value: T) {
        let mut slot = self.slot.lock();
        if slot.closed {
            trace!("publish after close dropped");
            return;
        }
        slot.backlog.push(value);
        self.available.notify_one();
    }

    /// Block until a value is available, then return the newest one.
    ///
    /// Everything published before the returned value is discarded. Waits
    /// indefinitely and ignores [`close`](Self::close); use
    /// [`receive_unless_closed`](Self::receive_unless_closed) when the
    /// caller must be released on shutdown.
    pub fn receive(&self) -> T {
        let mut slot = self.slot.lock();
        loop {
            if let Some(value) = slot.take_latest() {
                return value;
            }
            self.available.wait(&mut slot);
        }
    }

    /// Like [`receive`](Self::receive), but returns [`ChannelClosed`] once
    /// the mailbox is closed and holds nothing.
    ///
    /// A value published before the close is still delivered.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelClosed`] when closed and empty.
    pub fn receive_unless_closed(&self) -> Result<T, ChannelClosed> {
        let mut slot = self.slot.lock();
        loop {
            if let Some(value) = slot.take_latest() {
                return Ok(value);
            }
            if slot.closed {
                return Err(ChannelClosed);
            }
            self.available.wait(&mut slot);
        }
    }

    /// Wait at most `timeout` for a value.
    ///
    /// Returns `None` on timeout, or if the mailbox is closed and empty.
    pub fn receive_timeout(&self, timeout: Duration) -> Option<T> {
        self.receive_timeout_unless_closed(timeout).unwrap_or(None)
    }

    /// Wait at most `timeout` for a value, telling a timeout apart from a
    /// close.
    ///
    /// Returns `Ok(None)` on timeout. The closed state is read under the
    /// same lock as the backlog, so a close racing the timeout is reported
    /// consistently.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelClosed`] when closed and empty.
    pub fn receive_timeout_unless_closed(
        &self,
        timeout: Duration,
    ) -> Result<Option<T>, ChannelClosed> {
        let deadline = Instant::now().checked_add(timeout);
        let mut slot = self.slot.lock();
        loop {
            if let Some(value) = slot.take_latest() {
                return Ok(Some(value));
            }
            if slot.closed {
                return Err(ChannelClosed);
            }
            match deadline {
                Some(deadline) => {
                    if self.available.wait_until(&mut slot, deadline).timed_out() {
                        return match slot.take_latest() {
                            Some(value) => Ok(Some(value)),
                            None if slot.closed => Err(ChannelClosed),
                            None => Ok(None),
                        };
                    }
                }
                // Timeout too large to represent: wait like `receive`.
                None => self.available.wait(&mut slot),
            }
        }
    }

    /// Take the newest value without blocking.
    pub fn try_receive(&self) -> Option<T> {
        self.slot.lock().take_latest()
    }

    /// Close the mailbox and wake every blocked receiver.
    ///
    /// Values already published remain receivable. Idempotent.
    pub fn close(&self) {
        let mut slot = self.slot.lock();
        if !slot.closed {
            slot.closed = true;
            self.available.notify_all();
        }
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.slot.lock().closed
    }
}

impl<T> Default for Mailbox<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    use super::*;

    #[test]
    fn receive_returns_latest_of_backlog() {
        let channel = Mailbox::new();
        for i in 1..=5 {
            channel.publish(i);
        }
        assert_eq!(channel.receive(), 5);
        // Older values are gone.
        assert_eq!(channel.try_receive(), None);
    }

    #[test]
    fn stale_values_never_resurface() {
        let channel = Arc::new(Mailbox::new());
        channel.publish(1);
        channel.publish(2);
        channel.publish(3);
        assert_eq!(channel.receive(), 3);

        let producer = {
            let channel = Arc::clone(&channel);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(50));
                channel.publish(4);
            })
        };
        // Blocks until 4 arrives; 1 and 2 must not come back.
        assert_eq!(channel.receive(), 4);
        producer.join().unwrap();
    }

    #[test]
    fn receive_blocks_until_publish() {
        let channel = Arc::new(PhaseChannel::new());
        let receiver = {
            let channel = Arc::clone(&channel);
            thread::spawn(move || channel.receive())
        };
        thread::sleep(Duration::from_millis(50));
        assert!(!receiver.is_finished());

        channel.publish(Phase::Go);
        assert_eq!(receiver.join().unwrap(), Phase::Go);
    }

    #[test]
    fn stop_then_go_collapses_to_go() {
        let channel = PhaseChannel::new();
        channel.publish(Phase::Stop);
        channel.publish(Phase::Go);
        assert_eq!(channel.receive(), Phase::Go);
    }

    #[test]
    fn each_value_reaches_one_receiver() {
        let channel = Arc::new(Mailbox::<u32>::new());
        let received = Arc::new(AtomicUsize::new(0));
        let receivers: Vec<_> = (0..4)
            .map(|_| {
                let channel = Arc::clone(&channel);
                let received = Arc::clone(&received);
                thread::spawn(move || {
                    if channel.receive_timeout(Duration::from_millis(300)).is_some() {
                        received.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();

        thread::sleep(Duration::from_millis(50));
        channel.publish(7_u32);

        for handle in receivers {
            handle.join().unwrap();
        }
        assert_eq!(received.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn receive_timeout_expires_on_empty() {
        let channel: Mailbox<u8> = Mailbox::new();
        let started = Instant::now();
        assert_eq!(channel.receive_timeout(Duration::from_millis(30)), None);
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn receive_timeout_returns_published_value() {
        let channel = Mailbox::new();
        channel.publish('a');
        channel.publish('b');
        assert_eq!(channel.receive_timeout(Duration::from_secs(1)), Some('b'));
    }

    #[test]
    fn close_releases_blocked_receivers() {
        let channel: Arc<Mailbox<u8>> = Arc::new(Mailbox::new());
        let receivers: Vec<_> = (0..3)
            .map(|_| {
                let channel = Arc::clone(&channel);
                thread::spawn(move || channel.receive_unless_closed())
            })
            .collect();

        thread::sleep(Duration::from_millis(50));
        channel.close();

        for handle in receivers {
            assert_eq!(handle.join().unwrap(), Err(ChannelClosed));
        }
        assert!(channel.is_closed());
    }

    #[test]
    fn close_keeps_pending_value_and_drops_later_publishes() {
        let channel = Mailbox::new();
        channel.publish(1);
        channel.close();
        channel.publish(2);

        assert_eq!(channel.receive_unless_closed(), Ok(1));
        assert_eq!(channel.receive_unless_closed(), Err(ChannelClosed));
        assert_eq!(channel.receive_timeout(Duration::from_millis(10)), None);
    }

    #[test]
    fn timeout_and_close_are_distinguished() {
        let channel: Mailbox<u8> = Mailbox::new();
        assert_eq!(
            channel.receive_timeout_unless_closed(Duration::from_millis(10)),
            Ok(None)
        );

        channel.publish(3);
        channel.close();
        assert_eq!(
            channel.receive_timeout_unless_closed(Duration::from_millis(10)),
            Ok(Some(3))
        );
        assert_eq!(
            channel.receive_timeout_unless_closed(Duration::from_millis(10)),
            Err(ChannelClosed)
        );
    }

    #[test]
    fn close_during_timed_wait_reports_closed() {
        let channel: Arc<Mailbox<u8>> = Arc::new(Mailbox::new());
        let receiver = {
            let channel = Arc::clone(&channel);
            thread::spawn(move || channel.receive_timeout_unless_closed(Duration::from_secs(5)))
        };
        thread::sleep(Duration::from_millis(50));
        channel.close();
        assert_eq!(receiver.join().unwrap(), Err(ChannelClosed));
    }

    #[test]
    fn mailbox_can_live_in_a_static() {
        static MAILBOX: Mailbox<u8> = Mailbox::new();
        MAILBOX.publish(9);
        assert_eq!(MAILBOX.try_receive(), Some(9));
    }

    #[test]
    fn close_is_idempotent() {
        let channel: Mailbox<()> = Mailbox::default();
        channel.close();
        channel.close();
        assert!(channel.is_closed());
    }

    #[test]
    fn concurrent_producers_deliver_a_published_value() {
        let channel = Arc::new(Mailbox::<u32>::new());
        let producers: Vec<_> = (0..4_u32)
            .map(|id| {
                let channel = Arc::clone(&channel);
                thread::spawn(move || {
                    for n in 0..100_u32 {
                        channel.publish(id * 1_000 + n);
                    }
                })
            })
            .collect();
        for handle in producers {
            handle.join().unwrap();
        }

        let value = channel.receive();
        assert!(value % 1_000 == 99, "latest value of some producer, got {value}");
        assert_eq!(channel.try_receive(), None);
    }
}
