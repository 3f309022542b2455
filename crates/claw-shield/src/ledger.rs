//! Per-address failure ledger.
//!
//! Three maps keyed by address hold the accumulated failure score, the time
//! of the last failure, and the start of any permanent block. All three sit
//! behind a single reader/writer lock: writes take the exclusive side and
//! only do map lookups and timestamp comparisons while holding it.
//!
//! Two ordered indexes ride along with the maps so eviction and compaction
//! never scan: unblocked addresses ordered by last failure, and blocked
//! addresses ordered by block start.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::clock::{Clock, SystemClock};

/// Outcome of recording one failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureRecord {
    /// The address is still inside a permanent block; nothing was counted.
    AlreadyBlocked,
    /// The failure was counted.
    Counted {
        /// Accumulated score after this failure.
        count: u64,
        /// The previous window had lapsed and the count started over.
        window_reset: bool,
    },
    /// The failure was counted and pushed the address over the block
    /// threshold; a permanent block now starts.
    Blocked {
        /// Accumulated score after this failure.
        count: u64,
    },
}

impl FailureRecord {
    /// Accumulated score, if the failure was counted.
    #[must_use]
    pub const fn count(&self) -> Option<u64> {
        match self {
            Self::AlreadyBlocked => None,
            Self::Counted { count, .. } | Self::Blocked { count } => Some(*count),
        }
    }
}

/// Point-in-time view of one address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressSnapshot {
    /// Accumulated failure score.
    pub count: u64,
    /// Time of the most recent failure.
    pub last_attempt: Option<Instant>,
    /// Start of the permanent block, if any (may already be expired).
    pub blocked_since: Option<Instant>,
}

#[derive(Debug, Default)]
struct LedgerState {
    attempts: HashMap<String, u64>,
    last_attempt: HashMap<String, Instant>,
    blocked: HashMap<String, Instant>,
    /// Unblocked tracked addresses, oldest failure first.
    recency: BTreeSet<(Instant, String)>,
    /// Blocked addresses, oldest block first.
    block_order: BTreeSet<(Instant, String)>,
}

impl LedgerState {
    /// Stamp the latest failure time of an address.
    fn touch(&mut self, address: &str, now: Instant) {
        if let Some(previous) = self.last_attempt.insert(address.to_owned(), now) {
            self.recency.remove(&(previous, address.to_owned()));
        }
        if !self.blocked.contains_key(address) {
            self.recency.insert((now, address.to_owned()));
        }
    }

    fn block(&mut self, address: &str, now: Instant) {
        if let Some(last) = self.last_attempt.get(address).copied() {
            self.recency.remove(&(last, address.to_owned()));
        }
        if let Some(previous) = self.blocked.insert(address.to_owned(), now) {
            self.block_order.remove(&(previous, address.to_owned()));
        }
        self.block_order.insert((now, address.to_owned()));
    }

    /// Lift a block. The count starts over from zero.
    fn unblock(&mut self, address: &str) {
        let Some(since) = self.blocked.remove(address) else {
            return;
        };
        self.block_order.remove(&(since, address.to_owned()));
        self.attempts.insert(address.to_owned(), 0);
        if let Some(last) = self.last_attempt.get(address).copied() {
            self.recency.insert((last, address.to_owned()));
        }
    }

    fn forget(&mut self, address: &str) {
        self.attempts.remove(address);
        if let Some(last) = self.last_attempt.remove(address) {
            self.recency.remove(&(last, address.to_owned()));
        }
    }

    /// Lift every block that started at least `duration` before `now`.
    fn release_lapsed(&mut self, now: Instant, duration: Duration) -> usize {
        let mut released = 0;
        while let Some((since, address)) = self.block_order.first().cloned() {
            if now.saturating_duration_since(since) < duration {
                break;
            }
            self.unblock(&address);
            released += 1;
        }
        released
    }

    /// Drop the least recently seen address that is not blocked.
    fn evict_stalest(&mut self) -> Option<String> {
        let (_, victim) = self.recency.first().cloned()?;
        self.forget(&victim);
        Some(victim)
    }

    /// Drop unblocked addresses idle for longer than `retention`.
    fn forget_idle(&mut self, now: Instant, retention: Duration) -> usize {
        let mut removed = 0;
        while let Some((last, address)) = self.recency.first().cloned() {
            if now.saturating_duration_since(last) <= retention {
                break;
            }
            self.forget(&address);
            removed += 1;
        }
        removed
    }
}

/// In-memory record of recent failures per address.
#[derive(Debug)]
pub struct AttemptLedger {
    state: RwLock<LedgerState>,
    rolling_window: Duration,
    permanent_block_duration: Duration,
    max_tracked: Option<usize>,
    clock: Arc<dyn Clock>,
}

impl AttemptLedger {
    /// Create a ledger using the system clock.
    #[must_use]
    pub fn new(rolling_window: Duration, permanent_block_duration: Duration) -> Self {
        Self::with_clock(rolling_window, permanent_block_duration, Arc::new(SystemClock))
    }

    /// Create a ledger reading time from `clock`.
    #[must_use]
    pub fn with_clock(
        rolling_window: Duration,
        permanent_block_duration: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            state: RwLock::new(LedgerState::default()),
            rolling_window,
            permanent_block_duration,
            max_tracked: None,
            clock,
        }
    }

    /// Bound the number of tracked addresses.
    #[must_use]
    pub fn with_max_tracked(mut self, max_tracked: Option<usize>) -> Self {
        self.max_tracked = max_tracked;
        self
    }

    /// Record a single failure with weight 1 and return the new count.
    ///
    /// Returns the current count unchanged when the address is blocked.
    pub fn record_failure(&self, address: &str) -> u64 {
        match self.record_weighted_failure(address, 1, None) {
            FailureRecord::AlreadyBlocked => self.peek_count(address),
            FailureRecord::Counted { count, .. } | FailureRecord::Blocked { count } => count,
        }
    }

    /// Record a failure of the given weight.
    ///
    /// In one exclusive critical section this evicts an expired permanent
    /// block, restarts a lapsed window, adds `weight`, stamps the attempt
    /// time and, when `block_threshold` is reached, starts a permanent block.
    pub fn record_weighted_failure(
        &self,
        address: &str,
        weight: u64,
        block_threshold: Option<u64>,
    ) -> FailureRecord {
        let now = self.clock.now();
        let mut state = self.state.write();

        if let Some(since) = state.blocked.get(address).copied() {
            if now.saturating_duration_since(since) < self.permanent_block_duration {
                return FailureRecord::AlreadyBlocked;
            }
            state.unblock(address);
            info!(address = %address, "Permanent block expired");
        }

        let known = state.last_attempt.contains_key(address);
        if !known {
            if let Some(max) = self.max_tracked {
                if state.last_attempt.len() >= max {
                    state.release_lapsed(now, self.permanent_block_duration);
                    if let Some(evicted) = state.evict_stalest() {
                        debug!(evicted = %evicted, "Ledger full, evicted stalest address");
                    }
                }
            }
        }

        let window_reset = state
            .last_attempt
            .get(address)
            .is_some_and(|last| now.saturating_duration_since(*last) > self.rolling_window);

        let entry = state.attempts.entry(address.to_owned()).or_insert(0);
        if window_reset {
            *entry = 0;
        }
        *entry = entry.saturating_add(weight);
        let count = *entry;
        state.touch(address, now);

        if block_threshold.is_some_and(|threshold| count >= threshold) {
            state.block(address, now);
            return FailureRecord::Blocked { count };
        }

        debug!(address = %address, count = count, window_reset = window_reset, "Failure recorded");
        FailureRecord::Counted {
            count,
            window_reset,
        }
    }

    /// Current accumulated count for an address (0 if unknown).
    #[must_use]
    pub fn peek_count(&self, address: &str) -> u64 {
        self.state.read().attempts.get(address).copied().unwrap_or(0)
    }

    /// Forget the failure history of an address.
    ///
    /// Has no effect while the address is inside a permanent block.
    /// Returns whether anything was removed.
    pub fn reset(&self, address: &str) -> bool {
        let now = self.clock.now();
        let mut state = self.state.write();

        if let Some(since) = state.blocked.get(address).copied() {
            if now.saturating_duration_since(since) < self.permanent_block_duration {
                debug!(address = %address, "Reset ignored for blocked address");
                return false;
            }
            state.unblock(address);
        }

        let removed = state.attempts.contains_key(address);
        state.forget(address);
        removed
    }

    /// Whether the rolling window of an address has lapsed at `now`.
    ///
    /// Unknown addresses have no window and report `false`.
    #[must_use]
    pub fn is_expired_window(&self, address: &str, now: Instant) -> bool {
        self.state
            .read()
            .last_attempt
            .get(address)
            .is_some_and(|last| now.saturating_duration_since(*last) > self.rolling_window)
    }

    /// Whether the address is inside a permanent block right now.
    #[must_use]
    pub fn is_blocked(&self, address: &str) -> bool {
        let now = self.clock.now();
        self.state
            .read()
            .blocked
            .get(address)
            .is_some_and(|since| now.saturating_duration_since(*since) < self.permanent_block_duration)
    }

    /// Everything the ledger knows about an address.
    #[must_use]
    pub fn snapshot(&self, address: &str) -> Option<AddressSnapshot> {
        let state = self.state.read();
        let count = state.attempts.get(address).copied();
        let last_attempt = state.last_attempt.get(address).copied();
        let blocked_since = state.blocked.get(address).copied();

        if count.is_none() && last_attempt.is_none() && blocked_since.is_none() {
            return None;
        }

        Some(AddressSnapshot {
            count: count.unwrap_or(0),
            last_attempt,
            blocked_since,
        })
    }

    /// Drop expired permanent blocks and idle, unblocked records.
    ///
    /// Returns the number of addresses removed from tracking.
    pub fn compact(&self, idle_retention: Duration) -> usize {
        let now = self.clock.now();
        let mut state = self.state.write();

        let unblocked = state.release_lapsed(now, self.permanent_block_duration);
        let removed = state.forget_idle(now, idle_retention);

        if removed > 0 || unblocked > 0 {
            info!(
                removed = removed,
                unblocked = unblocked,
                "Compacted attempt ledger"
            );
        }
        removed
    }

    /// Number of addresses with a failure record.
    #[must_use]
    pub fn tracked_count(&self) -> usize {
        self.state.read().last_attempt.len()
    }

    /// Number of addresses currently inside a permanent block.
    #[must_use]
    pub fn blocked_count(&self) -> usize {
        let now = self.clock.now();
        self.state
            .read()
            .blocked
            .values()
            .filter(|since| now.saturating_duration_since(**since) < self.permanent_block_duration)
            .count()
    }

    /// The rolling window.
    #[must_use]
    pub const fn rolling_window(&self) -> Duration {
        self.rolling_window
    }

    /// The permanent block duration.
    #[must_use]
    pub const fn permanent_block_duration(&self) -> Duration {
        self.permanent_block_duration
    }

    /// The ledger's clock.
    #[must_use]
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::thread;

    const WINDOW: Duration = Duration::from_secs(300);
    const BLOCK: Duration = Duration::from_secs(86400);

    fn ledger() -> (AttemptLedger, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let ledger = AttemptLedger::with_clock(WINDOW, BLOCK, clock.clone());
        (ledger, clock)
    }

    // ==================== Counting Tests ====================

    #[test]
    fn test_record_failure_counts_up() {
        let (ledger, _) = ledger();

        assert_eq!(ledger.record_failure("1.2.3.4"), 1);
        assert_eq!(ledger.record_failure("1.2.3.4"), 2);
        assert_eq!(ledger.record_failure("1.2.3.4"), 3);
        assert_eq!(ledger.peek_count("1.2.3.4"), 3);
    }

    #[test]
    fn test_addresses_are_independent() {
        let (ledger, _) = ledger();

        ledger.record_failure("1.2.3.4");
        ledger.record_failure("1.2.3.4");
        ledger.record_failure("5.6.7.8");

        assert_eq!(ledger.peek_count("1.2.3.4"), 2);
        assert_eq!(ledger.peek_count("5.6.7.8"), 1);
        assert_eq!(ledger.peek_count("9.9.9.9"), 0);
        assert_eq!(ledger.tracked_count(), 2);
    }

    #[test]
    fn test_weighted_failure() {
        let (ledger, _) = ledger();

        let record = ledger.record_weighted_failure("1.2.3.4", 3, None);
        assert_eq!(
            record,
            FailureRecord::Counted {
                count: 3,
                window_reset: false
            }
        );
        assert_eq!(record.count(), Some(3));
    }

    // ==================== Window Tests ====================

    #[test]
    fn test_window_resets_after_idle() {
        let (ledger, clock) = ledger();

        ledger.record_failure("1.2.3.4");
        ledger.record_failure("1.2.3.4");
        clock.advance(WINDOW + Duration::from_secs(1));

        let record = ledger.record_weighted_failure("1.2.3.4", 1, None);
        assert_eq!(
            record,
            FailureRecord::Counted {
                count: 1,
                window_reset: true
            }
        );
    }

    #[test]
    fn test_window_is_sliding() {
        let (ledger, clock) = ledger();

        // Each failure lands inside the window of the previous one.
        for _ in 0..5 {
            ledger.record_failure("1.2.3.4");
            clock.advance(WINDOW - Duration::from_secs(1));
        }
        assert_eq!(ledger.peek_count("1.2.3.4"), 5);
    }

    #[test]
    fn test_window_boundary_is_inclusive() {
        let (ledger, clock) = ledger();

        ledger.record_failure("1.2.3.4");
        clock.advance(WINDOW);
        assert_eq!(ledger.record_failure("1.2.3.4"), 2);
    }

    #[test]
    fn test_is_expired_window() {
        let (ledger, clock) = ledger();
        assert!(!ledger.is_expired_window("1.2.3.4", clock.now()));

        ledger.record_failure("1.2.3.4");
        assert!(!ledger.is_expired_window("1.2.3.4", clock.now()));

        clock.advance(WINDOW + Duration::from_millis(1));
        assert!(ledger.is_expired_window("1.2.3.4", clock.now()));
    }

    // ==================== Block Tests ====================

    #[test]
    fn test_threshold_starts_block() {
        let (ledger, _) = ledger();

        for _ in 0..9 {
            let record = ledger.record_weighted_failure("1.2.3.4", 1, Some(10));
            assert!(matches!(record, FailureRecord::Counted { .. }));
        }
        let record = ledger.record_weighted_failure("1.2.3.4", 1, Some(10));
        assert_eq!(record, FailureRecord::Blocked { count: 10 });
        assert!(ledger.is_blocked("1.2.3.4"));
        assert_eq!(ledger.blocked_count(), 1);
    }

    #[test]
    fn test_blocked_address_is_not_counted() {
        let (ledger, _) = ledger();

        ledger.record_weighted_failure("1.2.3.4", 10, Some(10));
        let record = ledger.record_weighted_failure("1.2.3.4", 1, Some(10));

        assert_eq!(record, FailureRecord::AlreadyBlocked);
        assert_eq!(ledger.peek_count("1.2.3.4"), 10);
        assert_eq!(ledger.record_failure("1.2.3.4"), 10);
    }

    #[test]
    fn test_block_expires_and_count_restarts() {
        let (ledger, clock) = ledger();

        ledger.record_weighted_failure("1.2.3.4", 10, Some(10));
        clock.advance(BLOCK - Duration::from_secs(1));
        assert!(ledger.is_blocked("1.2.3.4"));

        clock.advance(Duration::from_secs(1));
        assert!(!ledger.is_blocked("1.2.3.4"));
        assert_eq!(ledger.blocked_count(), 0);

        let record = ledger.record_weighted_failure("1.2.3.4", 1, Some(10));
        assert_eq!(record.count(), Some(1));
        assert!(ledger.snapshot("1.2.3.4").is_some_and(|s| s.blocked_since.is_none()));
    }

    #[test]
    fn test_block_expiry_restarts_count_even_with_long_window() {
        let clock = Arc::new(ManualClock::new());
        let ledger =
            AttemptLedger::with_clock(Duration::from_secs(10 * 86400), BLOCK, clock.clone());

        ledger.record_weighted_failure("1.2.3.4", 10, Some(10));
        clock.advance(BLOCK);

        assert_eq!(ledger.record_weighted_failure("1.2.3.4", 1, Some(10)).count(), Some(1));
    }

    // ==================== Reset Tests ====================

    #[test]
    fn test_reset_forgets_history() {
        let (ledger, _) = ledger();

        ledger.record_failure("1.2.3.4");
        ledger.record_failure("1.2.3.4");
        assert!(ledger.reset("1.2.3.4"));

        assert_eq!(ledger.peek_count("1.2.3.4"), 0);
        assert!(ledger.snapshot("1.2.3.4").is_none());
        assert_eq!(ledger.record_failure("1.2.3.4"), 1);
    }

    #[test]
    fn test_reset_unknown_address() {
        let (ledger, _) = ledger();
        assert!(!ledger.reset("1.2.3.4"));
    }

    #[test]
    fn test_reset_does_not_clear_block() {
        let (ledger, _) = ledger();

        ledger.record_weighted_failure("1.2.3.4", 10, Some(10));
        assert!(!ledger.reset("1.2.3.4"));

        assert!(ledger.is_blocked("1.2.3.4"));
        assert_eq!(ledger.peek_count("1.2.3.4"), 10);
    }

    #[test]
    fn test_reset_after_block_lapsed_forgets_everything() {
        let (ledger, clock) = ledger();

        ledger.record_weighted_failure("1.2.3.4", 10, Some(10));
        clock.advance(BLOCK);

        assert!(ledger.reset("1.2.3.4"));
        assert!(ledger.snapshot("1.2.3.4").is_none());
        assert_eq!(ledger.tracked_count(), 0);
        assert_eq!(ledger.record_failure("1.2.3.4"), 1);
    }

    // ==================== Compaction Tests ====================

    #[test]
    fn test_compact_removes_idle_records() {
        let (ledger, clock) = ledger();

        ledger.record_failure("1.2.3.4");
        clock.advance(Duration::from_secs(3600));
        ledger.record_failure("5.6.7.8");

        let removed = ledger.compact(Duration::from_secs(1800));
        assert_eq!(removed, 1);
        assert_eq!(ledger.peek_count("1.2.3.4"), 0);
        assert_eq!(ledger.peek_count("5.6.7.8"), 1);
    }

    #[test]
    fn test_compact_keeps_active_blocks() {
        let (ledger, clock) = ledger();

        ledger.record_weighted_failure("1.2.3.4", 10, Some(10));
        clock.advance(Duration::from_secs(7200));

        assert_eq!(ledger.compact(Duration::from_secs(60)), 0);
        assert!(ledger.is_blocked("1.2.3.4"));
    }

    #[test]
    fn test_compact_releases_expired_blocks() {
        let (ledger, clock) = ledger();

        ledger.record_weighted_failure("1.2.3.4", 10, Some(10));
        clock.advance(BLOCK + Duration::from_secs(1));

        assert_eq!(ledger.compact(Duration::from_secs(60)), 1);
        assert!(ledger.snapshot("1.2.3.4").is_none());
    }

    // ==================== Bounded Tracking Tests ====================

    #[test]
    fn test_max_tracked_evicts_stalest() {
        let clock = Arc::new(ManualClock::new());
        let ledger = AttemptLedger::with_clock(WINDOW, BLOCK, clock.clone())
            .with_max_tracked(Some(2));

        ledger.record_failure("a");
        clock.advance(Duration::from_secs(1));
        ledger.record_failure("b");
        clock.advance(Duration::from_secs(1));
        ledger.record_failure("c");

        assert_eq!(ledger.tracked_count(), 2);
        assert_eq!(ledger.peek_count("a"), 0);
        assert_eq!(ledger.peek_count("b"), 1);
        assert_eq!(ledger.peek_count("c"), 1);
    }

    #[test]
    fn test_max_tracked_never_evicts_blocked() {
        let clock = Arc::new(ManualClock::new());
        let ledger = AttemptLedger::with_clock(WINDOW, BLOCK, clock.clone())
            .with_max_tracked(Some(1));

        ledger.record_weighted_failure("a", 10, Some(10));
        clock.advance(Duration::from_secs(1));
        ledger.record_failure("b");

        assert!(ledger.is_blocked("a"));
        assert_eq!(ledger.tracked_count(), 2);
    }

    #[test]
    fn test_max_tracked_evicts_in_recency_order() {
        let clock = Arc::new(ManualClock::new());
        let ledger = AttemptLedger::with_clock(WINDOW, BLOCK, clock.clone())
            .with_max_tracked(Some(3));

        for address in ["a", "b", "c"] {
            ledger.record_failure(address);
            clock.advance(Duration::from_secs(1));
        }
        // Refreshing "a" makes "b" the stalest.
        ledger.record_failure("a");
        clock.advance(Duration::from_secs(1));

        ledger.record_failure("d");
        assert_eq!(ledger.peek_count("b"), 0);
        clock.advance(Duration::from_secs(1));

        ledger.record_failure("e");
        assert_eq!(ledger.peek_count("c"), 0);
        clock.advance(Duration::from_secs(1));

        ledger.record_failure("f");
        assert_eq!(ledger.peek_count("a"), 0);

        assert_eq!(ledger.tracked_count(), 3);
        for address in ["d", "e", "f"] {
            assert_eq!(ledger.peek_count(address), 1);
        }
    }

    #[test]
    fn test_max_tracked_skips_blocked_but_keeps_order() {
        let clock = Arc::new(ManualClock::new());
        let ledger = AttemptLedger::with_clock(WINDOW, BLOCK, clock.clone())
            .with_max_tracked(Some(2));

        ledger.record_weighted_failure("a", 10, Some(10));
        clock.advance(Duration::from_secs(1));
        ledger.record_failure("b");
        clock.advance(Duration::from_secs(1));
        ledger.record_failure("c");

        assert!(ledger.is_blocked("a"));
        assert_eq!(ledger.peek_count("b"), 0);
        assert_eq!(ledger.peek_count("c"), 1);
        assert_eq!(ledger.tracked_count(), 2);
    }

    #[test]
    fn test_max_tracked_evicts_lapsed_block() {
        let clock = Arc::new(ManualClock::new());
        let ledger = AttemptLedger::with_clock(WINDOW, BLOCK, clock.clone())
            .with_max_tracked(Some(1));

        ledger.record_weighted_failure("a", 10, Some(10));
        clock.advance(BLOCK);
        ledger.record_failure("b");

        assert_eq!(ledger.tracked_count(), 1);
        assert!(ledger.snapshot("a").is_none());
        assert_eq!(ledger.peek_count("b"), 1);
    }

    #[test]
    fn test_max_tracked_at_scale() {
        let clock = Arc::new(ManualClock::new());
        let ledger = AttemptLedger::with_clock(WINDOW, BLOCK, clock.clone())
            .with_max_tracked(Some(1000));

        for i in 0..3000 {
            ledger.record_failure(&format!("10.0.{}.{}", i / 256, i % 256));
            clock.advance(Duration::from_millis(1));
        }

        assert_eq!(ledger.tracked_count(), 1000);
        assert_eq!(ledger.peek_count("10.0.0.0"), 0);
        assert_eq!(ledger.peek_count("10.0.11.183"), 1); // i = 2999
    }

    // ==================== Concurrency Tests ====================

    #[test]
    fn test_concurrent_failures_are_not_lost() {
        let (ledger, _) = ledger();
        let ledger = Arc::new(ledger);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                thread::spawn(move || {
                    for _ in 0..500 {
                        ledger.record_weighted_failure("1.2.3.4", 3, None);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(ledger.peek_count("1.2.3.4"), 8 * 500 * 3);
    }
}
