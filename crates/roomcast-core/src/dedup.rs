//! Receiver-side message deduplication
//!
//! Delivery over the relay carries no deduplication guarantee: retransmission
//! on reconnect may duplicate broadcasts. Receivers close this gap by keying
//! on the sender-assigned message id and suppressing repeats inside a
//! bounded sliding window.
//!
//! The window is exact, not probabilistic: one room's traffic is small and
//! duplicate suppression here is correctness-bearing.

use std::collections::{HashSet, VecDeque};

use crate::types::{MessageId, Timestamp};

// ----------------------------------------------------------------------------
// Constants
// ----------------------------------------------------------------------------

/// Default maximum number of ids retained in the window
pub const DEFAULT_WINDOW_CAPACITY: usize = 4096;

/// Default time-to-live for window entries (5 minutes)
pub const DEFAULT_WINDOW_TTL_MS: u64 = 300_000;

// ----------------------------------------------------------------------------
// Statistics
// ----------------------------------------------------------------------------

/// Counters for deduplication behavior
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DedupStats {
    /// Total messages observed
    pub observed: u64,
    /// Messages suppressed as duplicates
    pub duplicates: u64,
    /// Entries evicted by capacity or TTL
    pub evicted: u64,
}

impl DedupStats {
    /// Fraction of observed messages that were duplicates
    pub fn duplicate_rate(&self) -> f64 {
        if self.observed == 0 {
            0.0
        } else {
            self.duplicates as f64 / self.observed as f64
        }
    }
}

// ----------------------------------------------------------------------------
// Deduplication Window
// ----------------------------------------------------------------------------

/// Sliding-window duplicate detector keyed on [`MessageId`]
#[derive(Debug)]
pub struct DedupWindow {
    seen: HashSet<MessageId>,
    order: VecDeque<(MessageId, Timestamp)>,
    capacity: usize,
    ttl_ms: u64,
    stats: DedupStats,
}

impl DedupWindow {
    /// Create a window with explicit capacity and entry TTL
    pub fn new(capacity: usize, ttl_ms: u64) -> Self {
        Self {
            seen: HashSet::with_capacity(capacity.min(1024)),
            order: VecDeque::new(),
            capacity: capacity.max(1),
            ttl_ms,
            stats: DedupStats::default(),
        }
    }

    /// Create a window with default parameters
    pub fn with_default_parameters() -> Self {
        Self::new(DEFAULT_WINDOW_CAPACITY, DEFAULT_WINDOW_TTL_MS)
    }

    /// Observe a message id at the given time. Returns `true` when the id is
    /// a duplicate (already inside the window) and should be suppressed.
    pub fn observe(&mut self, id: MessageId, now: Timestamp) -> bool {
        self.stats.observed += 1;
        self.evict_expired(now);

        if self.seen.contains(&id) {
            self.stats.duplicates += 1;
            return true;
        }

        self.seen.insert(id);
        self.order.push_back((id, now));

        while self.order.len() > self.capacity {
            if let Some((oldest, _)) = self.order.pop_front() {
                self.seen.remove(&oldest);
                self.stats.evicted += 1;
            }
        }

        false
    }

    /// Check for a duplicate without recording the id
    pub fn contains(&self, id: &MessageId) -> bool {
        self.seen.contains(id)
    }

    /// Drop entries older than the TTL
    fn evict_expired(&mut self, now: Timestamp) {
        while let Some((id, inserted)) = self.order.front().copied() {
            if now - inserted <= self.ttl_ms {
                break;
            }
            self.order.pop_front();
            self.seen.remove(&id);
            self.stats.evicted += 1;
        }
    }

    /// Current number of ids inside the window
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the window holds no ids
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Get deduplication counters
    pub fn stats(&self) -> DedupStats {
        self.stats
    }

    /// Clear all entries and reset counters
    pub fn clear(&mut self) {
        self.seen.clear();
        self.order.clear();
        self.stats = DedupStats::default();
    }
}

impl Default for DedupWindow {
    fn default() -> Self {
        Self::with_default_parameters()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
