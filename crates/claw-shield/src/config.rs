//! Shield configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ShieldError, ShieldResult};
use crate::suspicion::{default_patterns, SuspiciousPattern};

/// One gibibyte.
pub const GIB: u64 = 1024 * 1024 * 1024;

/// What the notification bus does when its queue is full.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverflowPolicy {
    /// Discard the alert being published.
    #[default]
    DropNewest,
    /// Evict the oldest queued alert to make room.
    DropOldest,
}

/// Configuration for the brute-force shield.
///
/// Immutable once a [`crate::BruteForceShield`] has been built from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShieldConfig {
    /// Failures within the rolling window before responses are throttled.
    /// Twice this value triggers a permanent block.
    pub max_attempts: u32,
    /// Idle time after which an address's failure count starts over.
    pub rolling_window: Duration,
    /// How long a permanent block lasts.
    pub permanent_block_duration: Duration,
    /// Garbage bytes per accumulated failure.
    pub base_garbage_size: u64,
    /// Hard cap on a single garbage payload.
    pub garbage_ceiling: u64,
    /// Weighted username patterns.
    pub suspicious_patterns: Vec<SuspiciousPattern>,
    /// Capacity of the alert queue.
    pub notification_capacity: usize,
    /// Behaviour when the alert queue is full.
    pub overflow_policy: OverflowPolicy,
    /// Upper bound on tracked addresses (None = unbounded).
    pub max_tracked_addresses: Option<usize>,
    /// Idle records older than this are dropped by compaction.
    pub idle_retention: Duration,
    /// Interval between background compaction passes.
    pub compaction_interval: Duration,
}

impl Default for ShieldConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            rolling_window: Duration::from_secs(5 * 60),             // 5 minutes
            permanent_block_duration: Duration::from_secs(86400),    // 24 hours
            base_garbage_size: GIB,
            garbage_ceiling: 10 * GIB,
            suspicious_patterns: default_patterns(),
            notification_capacity: 100,
            overflow_policy: OverflowPolicy::DropNewest,
            max_tracked_addresses: None,
            idle_retention: Duration::from_secs(86400),
            compaction_interval: Duration::from_secs(600),
        }
    }
}

impl ShieldConfig {
    /// Create a new builder.
    #[must_use]
    pub fn builder() -> ShieldConfigBuilder {
        ShieldConfigBuilder::default()
    }

    /// Check the configuration for values the policy cannot work with.
    ///
    /// # Errors
    ///
    /// Returns `ShieldError::Config` describing the first invalid field.
    pub fn validate(&self) -> ShieldResult<()> {
        if self.max_attempts == 0 {
            return Err(ShieldError::Config("max_attempts must be positive".into()));
        }
        if self.rolling_window.is_zero() {
            return Err(ShieldError::Config("rolling_window must be non-zero".into()));
        }
        if self.permanent_block_duration.is_zero() {
            return Err(ShieldError::Config(
                "permanent_block_duration must be non-zero".into(),
            ));
        }
        if self.garbage_ceiling == 0 {
            return Err(ShieldError::Config("garbage_ceiling must be positive".into()));
        }
        if self.notification_capacity == 0 {
            return Err(ShieldError::Config(
                "notification_capacity must be positive".into(),
            ));
        }
        if self.max_tracked_addresses == Some(0) {
            return Err(ShieldError::Config(
                "max_tracked_addresses must be positive when set".into(),
            ));
        }
        Ok(())
    }
}

/// Builder for `ShieldConfig`.
#[derive(Debug, Clone, Default)]
pub struct ShieldConfigBuilder {
    config: ShieldConfig,
}

impl ShieldConfigBuilder {
    /// Set the throttling threshold.
    #[must_use]
    pub const fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.config.max_attempts = max_attempts;
        self
    }

    /// Set the rolling window.
    #[must_use]
    pub const fn rolling_window(mut self, window: Duration) -> Self {
        self.config.rolling_window = window;
        self
    }

    /// Set the permanent block duration.
    #[must_use]
    pub const fn permanent_block_duration(mut self, duration: Duration) -> Self {
        self.config.permanent_block_duration = duration;
        self
    }

    /// Set the per-failure garbage size.
    #[must_use]
    pub const fn base_garbage_size(mut self, bytes: u64) -> Self {
        self.config.base_garbage_size = bytes;
        self
    }

    /// Set the garbage ceiling.
    #[must_use]
    pub const fn garbage_ceiling(mut self, bytes: u64) -> Self {
        self.config.garbage_ceiling = bytes;
        self
    }

    /// Replace the suspicious pattern table.
    #[must_use]
    pub fn suspicious_patterns(mut self, patterns: Vec<SuspiciousPattern>) -> Self {
        self.config.suspicious_patterns = patterns;
        self
    }

    /// Set the alert queue capacity.
    #[must_use]
    pub const fn notification_capacity(mut self, capacity: usize) -> Self {
        self.config.notification_capacity = capacity;
        self
    }

    /// Set the overflow policy.
    #[must_use]
    pub const fn overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.config.overflow_policy = policy;
        self
    }

    /// Bound the number of tracked addresses.
    #[must_use]
    pub const fn max_tracked_addresses(mut self, max: usize) -> Self {
        self.config.max_tracked_addresses = Some(max);
        self
    }

    /// Set the idle retention used by compaction.
    #[must_use]
    pub const fn idle_retention(mut self, retention: Duration) -> Self {
        self.config.idle_retention = retention;
        self
    }

    /// Set the background compaction interval.
    #[must_use]
    pub const fn compaction_interval(mut self, interval: Duration) -> Self {
        self.config.compaction_interval = interval;
        self
    }

    /// Build the configuration.
    #[must_use]
    pub fn build(self) -> ShieldConfig {
        self.config
    }
}
