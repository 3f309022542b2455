//! # claw-shield
//!
//! Adaptive brute-force protection for Clawbernetes login endpoints.
//!
//! The shield tracks failed logins per client address and escalates:
//!
//! - [`AttemptLedger`] - Per-address failure score with a sliding window
//! - [`SuspicionScorer`] - Extra weight for suspicious-looking usernames
//! - [`BlockPolicy`] - Tracking → throttled → permanently blocked
//! - [`GarbageGenerator`] - Random payloads that grow with offence history
//! - [`NotificationBus`] - Bounded, non-blocking security alert queue
//!
//! [`BruteForceShield`] composes all of them and is the only type a request
//! handler needs.
//!
//! # Example
//!
//! ```rust
//! use claw_shield::{BruteForceShield, ShieldConfig};
//! use std::time::Duration;
//!
//! let config = ShieldConfig::builder()
//!     .max_attempts(5)
//!     .rolling_window(Duration::from_secs(300))
//!     .base_garbage_size(1024)
//!     .build();
//! let shield = BruteForceShield::new(config).unwrap();
//!
//! let ip = "203.0.113.7";
//! if shield.is_blocked(ip) {
//!     // reject with 403
//! } else if shield.record_failed_attempt(ip, "bob") {
//!     let payload = shield.generate_garbage(ip);
//!     println!("punishing with {} bytes", payload.len());
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod clock;
pub mod config;
pub mod error;
pub mod garbage;
pub mod ledger;
pub mod notify;
pub mod policy;
pub mod shield;
pub mod suspicion;
pub mod tasks;

// Re-export main types
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{OverflowPolicy, ShieldConfig, ShieldConfigBuilder};
pub use error::{ShieldError, ShieldResult};
pub use garbage::{GarbageChunks, GarbageGenerator};
pub use ledger::{AddressSnapshot, AttemptLedger, FailureRecord};
pub use notify::{AlertKind, AlertStream, NotificationBus, SecurityAlert};
pub use policy::{AddressState, BlockPolicy, Verdict};
pub use shield::{BruteForceShield, ShieldStats};
pub use suspicion::{SuspicionScorer, SuspiciousPattern};
pub use tasks::{spawn_alert_logger, spawn_compaction};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::config::ShieldConfig;
    pub use crate::error::{ShieldError, ShieldResult};
    pub use crate::notify::{AlertStream, SecurityAlert};
    pub use crate::policy::{AddressState, Verdict};
    pub use crate::shield::BruteForceShield;
}
