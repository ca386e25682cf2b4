/*!
 * Channel allocation.
 *
 * Channel 0 is the control channel. Streaming bindings use the low
 * channel range so that synchronous channels, which roll over, can
 * never collide with a live binding.
 */
use std::sync::atomic::{AtomicI32, Ordering};

use portlink_core::error::{Error, Result};

/// The lowest channel handed out for streaming bindings
pub const LOWEST_STREAMING_CHANNEL: i32 = 1;
/// The highest channel handed out for streaming bindings
pub const HIGHEST_STREAMING_CHANNEL: i32 = 31;
/// The lowest channel handed out for synchronous request/reply pairs
pub const LOWEST_SYNCHRONOUS_CHANNEL: i32 = 32;
/// Synchronous channels roll over to the lowest value at this bound
pub const CHANNEL_ROLLOVER: i32 = 8192;

/// Allocates correlation channels for one protocol session.
///
/// Safe for concurrent callers; allocation is a synchronized increment.
#[derive(Debug)]
pub struct ChannelAllocator {
    synchronous: AtomicI32,
    streaming: AtomicI32,
}

impl ChannelAllocator {
    /// Create a fresh allocator
    pub fn new() -> Self {
        Self {
            synchronous: AtomicI32::new(LOWEST_SYNCHRONOUS_CHANNEL - 1),
            streaming: AtomicI32::new(LOWEST_STREAMING_CHANNEL - 1),
        }
    }

    /// Reset both counters, e.g. when a session is (re-)initiated
    pub fn reset(&self) {
        self.synchronous
            .store(LOWEST_SYNCHRONOUS_CHANNEL - 1, Ordering::SeqCst);
        self.streaming
            .store(LOWEST_STREAMING_CHANNEL - 1, Ordering::SeqCst);
    }

    /// A new unique channel for a synchronous protocol run.
    ///
    /// Channel numbers are kept from becoming too large by rolling over.
    pub fn next_synchronous(&self) -> i32 {
        let previous = self
            .synchronous
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                let next = current + 1;
                Some(if next >= CHANNEL_ROLLOVER {
                    LOWEST_SYNCHRONOUS_CHANNEL
                } else {
                    next
                })
            })
            // the closure never returns None
            .unwrap_or(LOWEST_SYNCHRONOUS_CHANNEL - 1);
        let next = previous + 1;
        if next >= CHANNEL_ROLLOVER {
            LOWEST_SYNCHRONOUS_CHANNEL
        } else {
            next
        }
    }

    /// A new channel for a streaming binding; fails when the streaming
    /// range is exhausted.
    pub fn next_streaming(&self) -> Result<i32> {
        let channel = self.streaming.fetch_add(1, Ordering::SeqCst) + 1;
        if channel > HIGHEST_STREAMING_CHANNEL {
            self.streaming.fetch_sub(1, Ordering::SeqCst);
            return Err(Error::device("no streaming channels left"));
        }
        Ok(channel)
    }
}

impl Default for ChannelAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synchronous_channels_start_at_lowest() {
        let channels = ChannelAllocator::new();
        assert_eq!(channels.next_synchronous(), LOWEST_SYNCHRONOUS_CHANNEL);
        assert_eq!(channels.next_synchronous(), LOWEST_SYNCHRONOUS_CHANNEL + 1);
    }

    #[test]
    fn test_synchronous_rollover_skips_streaming_range() {
        let channels = ChannelAllocator::new();
        channels
            .synchronous
            .store(CHANNEL_ROLLOVER - 1, Ordering::SeqCst);
        assert_eq!(channels.next_synchronous(), LOWEST_SYNCHRONOUS_CHANNEL);
    }

    #[test]
    fn test_streaming_channels_exhaust() {
        let channels = ChannelAllocator::new();
        for expected in LOWEST_STREAMING_CHANNEL..=HIGHEST_STREAMING_CHANNEL {
            assert_eq!(channels.next_streaming().unwrap(), expected);
        }
        assert!(channels.next_streaming().is_err());
    }

    #[test]
    fn test_reset() {
        let channels = ChannelAllocator::new();
        channels.next_synchronous();
        channels.next_streaming().unwrap();
        channels.reset();
        assert_eq!(channels.next_synchronous(), LOWEST_SYNCHRONOUS_CHANNEL);
        assert_eq!(channels.next_streaming().unwrap(), LOWEST_STREAMING_CHANNEL);
    }
}
