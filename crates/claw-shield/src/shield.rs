//! Unified brute-force protection facade.

use std::sync::Arc;

use tracing::info;

use crate::clock::{Clock, SystemClock};
use crate::config::ShieldConfig;
use crate::error::{ShieldError, ShieldResult};
use crate::garbage::{GarbageChunks, GarbageGenerator};
use crate::ledger::AttemptLedger;
use crate::notify::{AlertStream, NotificationBus};
use crate::policy::{AddressState, BlockPolicy, Verdict};
use crate::suspicion::SuspicionScorer;

/// Counters describing the shield's current load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShieldStats {
    /// Addresses with a failure record.
    pub tracked_addresses: usize,
    /// Addresses inside a permanent block.
    pub blocked_addresses: usize,
    /// Alerts accepted by the notification bus.
    pub alerts_published: u64,
    /// Alerts dropped because the bus was full.
    pub alerts_dropped: u64,
    /// Alerts waiting for the consumer.
    pub alerts_pending: usize,
}

/// Brute-force protection for a login endpoint.
///
/// Construct one per process and share it (e.g. behind an `Arc`) with every
/// request handler. Handlers call [`is_blocked`](Self::is_blocked) before
/// authenticating, [`record_failed_attempt`](Self::record_failed_attempt) on
/// failure, [`generate_garbage`](Self::generate_garbage) when told to punish,
/// and [`reset_attempts`](Self::reset_attempts) on success.
#[derive(Debug)]
pub struct BruteForceShield {
    config: ShieldConfig,
    ledger: Arc<AttemptLedger>,
    policy: BlockPolicy,
    garbage: GarbageGenerator,
    bus: NotificationBus,
}

impl BruteForceShield {
    /// Create a shield with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns `ShieldError::Config` if the configuration is invalid.
    pub fn new(config: ShieldConfig) -> ShieldResult<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a shield reading time from `clock`.
    ///
    /// # Errors
    ///
    /// Returns `ShieldError::Config` if the configuration is invalid.
    pub fn with_clock(config: ShieldConfig, clock: Arc<dyn Clock>) -> ShieldResult<Self> {
        config.validate()?;
        Ok(Self::assemble(config, clock))
    }

    /// Create with default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::assemble(ShieldConfig::default(), Arc::new(SystemClock))
    }

    fn assemble(config: ShieldConfig, clock: Arc<dyn Clock>) -> Self {
        let ledger = Arc::new(
            AttemptLedger::with_clock(
                config.rolling_window,
                config.permanent_block_duration,
                clock,
            )
            .with_max_tracked(config.max_tracked_addresses),
        );
        let bus = NotificationBus::new(config.notification_capacity, config.overflow_policy);
        let policy = BlockPolicy::new(
            Arc::clone(&ledger),
            SuspicionScorer::new(config.suspicious_patterns.clone()),
            bus.clone(),
            config.max_attempts,
        );
        let garbage = GarbageGenerator::new(
            Arc::clone(&ledger),
            config.base_garbage_size,
            config.garbage_ceiling,
        );

        info!(
            max_attempts = config.max_attempts,
            rolling_window_secs = config.rolling_window.as_secs(),
            block_secs = config.permanent_block_duration.as_secs(),
            "Brute-force shield initialised"
        );

        Self {
            config,
            ledger,
            policy,
            garbage,
            bus,
        }
    }

    // ==================== Request Path ====================

    /// Whether the address is permanently blocked right now.
    #[must_use]
    pub fn is_blocked(&self, address: &str) -> bool {
        self.policy.is_blocked(address)
    }

    /// Like [`is_blocked`](Self::is_blocked) but as a `Result`.
    ///
    /// # Errors
    ///
    /// Returns `ShieldError::Blocked` if the address is blocked.
    pub fn check(&self, address: &str) -> ShieldResult<()> {
        if self.is_blocked(address) {
            return Err(ShieldError::Blocked {
                address: address.to_owned(),
            });
        }
        Ok(())
    }

    /// Record a failed login. Returns `true` if the caller must punish.
    pub fn record_failed_attempt(&self, address: &str, username: &str) -> bool {
        self.evaluate_failed_attempt(address, username).is_punish()
    }

    /// Record a failed login and return the full verdict.
    pub fn evaluate_failed_attempt(&self, address: &str, username: &str) -> Verdict {
        self.policy.record_failed_attempt(address, username)
    }

    /// Random payload sized by the address's offence history.
    #[must_use]
    pub fn generate_garbage(&self, address: &str) -> Vec<u8> {
        self.garbage.generate(address)
    }

    /// Same payload as [`generate_garbage`](Self::generate_garbage), produced
    /// lazily in chunks.
    #[must_use]
    pub fn garbage_chunks(&self, address: &str) -> GarbageChunks {
        self.garbage.chunks(address)
    }

    /// Size in bytes the next garbage payload would have.
    #[must_use]
    pub fn garbage_size(&self, address: &str) -> u64 {
        self.garbage.payload_size(address)
    }

    /// Clear the failure history after a successful login.
    ///
    /// Permanent blocks are not lifted.
    pub fn reset_attempts(&self, address: &str) {
        if self.policy.reset(address) {
            info!(address = %address, "Failed attempts reset");
        }
    }

    /// Take the alert stream. Only one subscriber may exist at a time.
    ///
    /// # Errors
    ///
    /// Returns `ShieldError::AlreadySubscribed` if a stream is already live.
    pub fn subscribe_notifications(&self) -> ShieldResult<AlertStream> {
        self.bus.subscribe()
    }

    // ==================== Inspection ====================

    /// Current escalation state of an address.
    #[must_use]
    pub fn state(&self, address: &str) -> AddressState {
        self.policy.state(address)
    }

    /// Accumulated failure score of an address.
    #[must_use]
    pub fn attempt_count(&self, address: &str) -> u64 {
        self.ledger.peek_count(address)
    }

    /// Current counters.
    #[must_use]
    pub fn stats(&self) -> ShieldStats {
        ShieldStats {
            tracked_addresses: self.ledger.tracked_count(),
            blocked_addresses: self.ledger.blocked_count(),
            alerts_published: self.bus.published_count(),
            alerts_dropped: self.bus.dropped_count(),
            alerts_pending: self.bus.pending(),
        }
    }

    /// Drop idle records and lapsed blocks.
    pub fn compact(&self) -> usize {
        self.ledger.compact(self.config.idle_retention)
    }

    /// The configuration in use.
    #[must_use]
    pub const fn config(&self) -> &ShieldConfig {
        &self.config
    }
}
