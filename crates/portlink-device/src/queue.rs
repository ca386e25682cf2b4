/*!
 * The shared inbound message queue.
 *
 * The transport's receive thread appends messages; protocol callers
 * scan-and-remove replies by channel. The scan-and-remove sequence is
 * atomic so two callers can never consume the same reply or miss a
 * concurrent insert. Non-matching messages stay queued, in order, for
 * their own eventual correlation.
 */
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Duration;

use portlink_core::message::Message;

/// A thread-safe FIFO of inbound messages shared between the transport
/// and protocol callers.
#[derive(Debug, Default)]
pub struct MessageQueue {
    messages: Mutex<VecDeque<Message>>,
    available: Condvar,
}

impl MessageQueue {
    /// Create a new, empty queue
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Message>> {
        // a poisoned queue only means a panicking pusher; the data is intact
        self.messages.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Append a message and wake all waiting callers
    pub fn push(&self, message: Message) {
        self.lock().push_back(message);
        self.available.notify_all();
    }

    /// Atomically remove and return the first message on the given
    /// channel, leaving all other messages queued in place.
    pub fn take_matching(&self, channel: i32) -> Option<Message> {
        let mut messages = self.lock();
        let index = messages.iter().position(|m| m.channel() == channel)?;
        messages.remove(index)
    }

    /// Remove and return the oldest message regardless of channel
    pub fn pop_front(&self) -> Option<Message> {
        self.lock().pop_front()
    }

    /// Block until a message is pushed or the timeout elapses.
    ///
    /// Spurious wakeups are fine: callers rescan and re-check their
    /// deadline on every wake.
    pub fn wait(&self, timeout: Duration) {
        let guard = self.lock();
        let _ = self
            .available
            .wait_timeout(guard, timeout)
            .unwrap_or_else(|e| e.into_inner());
    }

    /// The number of queued messages
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the queue is empty
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drop all queued messages
    pub fn clear(&self) {
        self.lock().clear();
    }
}
