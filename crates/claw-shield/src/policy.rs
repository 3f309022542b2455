//! Blocking policy.
//!
//! Per-address state machine:
//!
//! ```text
//! Clean -> Tracking (count < max) -> Throttled (max <= count < 2*max)
//!       -> PermanentlyBlocked (count >= 2*max, for the block duration)
//! ```
//!
//! A single failure adds `1 + suspicion score`, so one suspicious attempt may
//! skip states. Blocks lapse lazily and the address starts over at zero.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::ledger::{AttemptLedger, FailureRecord};
use crate::notify::{NotificationBus, SecurityAlert};
use crate::suspicion::SuspicionScorer;

/// Where an address sits in the escalation ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AddressState {
    /// No failure on record.
    Clean,
    /// Failures below the throttling threshold.
    Tracking,
    /// At or above the throttling threshold; failures are punished.
    Throttled,
    /// Rejected outright until the block lapses.
    PermanentlyBlocked,
}

/// Decision for one failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Plain failure response.
    Allow,
    /// Punish this request with a garbage payload.
    Throttle,
    /// The address is permanently blocked.
    Block,
}

impl Verdict {
    /// Whether the caller should punish the client.
    #[must_use]
    pub const fn is_punish(&self) -> bool {
        matches!(self, Self::Throttle | Self::Block)
    }
}

/// Decides how to respond to failed login attempts.
#[derive(Debug)]
pub struct BlockPolicy {
    ledger: Arc<AttemptLedger>,
    scorer: SuspicionScorer,
    bus: NotificationBus,
    max_attempts: u32,
}

impl BlockPolicy {
    /// Create a policy over a shared ledger.
    #[must_use]
    pub fn new(
        ledger: Arc<AttemptLedger>,
        scorer: SuspicionScorer,
        bus: NotificationBus,
        max_attempts: u32,
    ) -> Self {
        Self {
            ledger,
            scorer,
            bus,
            max_attempts,
        }
    }

    fn throttle_threshold(&self) -> u64 {
        u64::from(self.max_attempts)
    }

    fn block_threshold(&self) -> u64 {
        u64::from(self.max_attempts) * 2
    }

    /// Record a failed attempt and decide the response.
    pub fn record_failed_attempt(&self, address: &str, username: &str) -> Verdict {
        let score = self.scorer.score(username);
        let weight = 1 + u64::from(score);

        let record =
            self.ledger
                .record_weighted_failure(address, weight, Some(self.block_threshold()));

        if matches!(record, FailureRecord::AlreadyBlocked) {
            debug!(address = %address, "Failure from blocked address");
            return Verdict::Block;
        }

        if score > 0 {
            warn!(address = %address, score = score, "Suspicious username");
            self.bus.publish(SecurityAlert::suspicious(address, username));
        }

        match record {
            FailureRecord::Blocked { count } => {
                warn!(address = %address, count = count, "Address permanently blocked");
                self.bus.publish(SecurityAlert::permanently_blocked(address));
                Verdict::Block
            }
            FailureRecord::Counted { count, .. } if count >= self.throttle_threshold() => {
                warn!(address = %address, count = count, "Address throttled");
                Verdict::Throttle
            }
            _ => Verdict::Allow,
        }
    }

    /// Whether the address is inside a permanent block.
    #[must_use]
    pub fn is_blocked(&self, address: &str) -> bool {
        self.ledger.is_blocked(address)
    }

    /// Forget the failure history of an address that is not blocked.
    pub fn reset(&self, address: &str) -> bool {
        self.ledger.reset(address)
    }

    /// Current state of an address.
    ///
    /// A lapsed window reads as `Tracking` until the next failure restarts
    /// the count, and a lapsed block reads the same way.
    #[must_use]
    pub fn state(&self, address: &str) -> AddressState {
        if self.ledger.is_blocked(address) {
            return AddressState::PermanentlyBlocked;
        }
        let Some(snapshot) = self.ledger.snapshot(address) else {
            return AddressState::Clean;
        };
        if snapshot.blocked_since.is_some() {
            return AddressState::Tracking;
        }
        let now = self.ledger.clock().now();
        if self.ledger.is_expired_window(address, now) {
            return AddressState::Tracking;
        }
        if snapshot.count >= self.throttle_threshold() {
            AddressState::Throttled
        } else {
            AddressState::Tracking
        }
    }

    /// The throttling threshold.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// The scorer in use.
    #[must_use]
    pub const fn scorer(&self) -> &SuspicionScorer {
        &self.scorer
    }
}
