//! Error types for brute-force protection.

use thiserror::Error;

/// Errors that can occur in shield operations.
///
/// Policy decisions (allow, throttle, block) are return values, not errors.
/// This type only covers the few surfaces that can genuinely fail.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ShieldError {
    /// Address is permanently blocked.
    #[error("address {address} is blocked due to suspicious activity")]
    Blocked {
        /// The blocked address.
        address: String,
    },

    /// The notification bus already has a live subscriber.
    #[error("notification bus already has a subscriber")]
    AlreadySubscribed,

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for shield operations.
pub type ShieldResult<T> = Result<T, ShieldError>;
