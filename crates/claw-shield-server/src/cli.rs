//! Command-line arguments for the `claw-shield` binary.

use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use claw_shield::config::GIB;
use claw_shield::ShieldConfig;

use crate::config::{Credentials, ServerConfig};

/// Login endpoint with adaptive brute-force protection.
#[derive(Debug, Parser)]
#[command(name = "claw-shield")]
#[command(author, version, about, long_about = None)]
pub struct ServerArgs {
    /// Address to listen on.
    #[arg(long, env = "CLAW_SHIELD_BIND", default_value = "0.0.0.0:7328")]
    pub bind: SocketAddr,

    /// Accepted login email.
    #[arg(long, env = "CLAW_SHIELD_USERNAME")]
    pub username: String,

    /// Accepted login password.
    #[arg(long, env = "CLAW_SHIELD_PASSWORD", hide_env_values = true)]
    pub password: String,

    /// Failed attempts before garbage responses begin.
    #[arg(long, env = "CLAW_SHIELD_MAX_ATTEMPTS", default_value_t = 5)]
    pub max_attempts: u32,

    /// Rolling window for counting attempts, in seconds.
    #[arg(long, env = "CLAW_SHIELD_WINDOW_SECS", default_value_t = 300)]
    pub rolling_window_secs: u64,

    /// Length of a permanent block, in seconds.
    #[arg(long, env = "CLAW_SHIELD_BLOCK_SECS", default_value_t = 86_400)]
    pub block_secs: u64,

    /// Garbage bytes served per accumulated failure.
    #[arg(long, env = "CLAW_SHIELD_GARBAGE_BYTES", default_value_t = GIB)]
    pub base_garbage_bytes: u64,

    /// Upper bound on a single garbage payload.
    #[arg(long, env = "CLAW_SHIELD_GARBAGE_CEILING", default_value_t = 10 * GIB)]
    pub garbage_ceiling_bytes: u64,

    /// Maximum number of addresses tracked at once.
    #[arg(long, env = "CLAW_SHIELD_MAX_TRACKED")]
    pub max_tracked: Option<usize>,

    /// Use the first `X-Forwarded-For` hop as the client address.
    #[arg(long, env = "CLAW_SHIELD_TRUST_FORWARDED_FOR")]
    pub trust_forwarded_for: bool,

    /// Emit logs as JSON.
    #[arg(long, env = "CLAW_SHIELD_LOG_JSON")]
    pub log_json: bool,
}

impl ServerArgs {
    /// Protection settings derived from the arguments.
    pub fn shield_config(&self) -> ShieldConfig {
        let mut builder = ShieldConfig::builder()
            .max_attempts(self.max_attempts)
            .rolling_window(Duration::from_secs(self.rolling_window_secs))
            .permanent_block_duration(Duration::from_secs(self.block_secs))
            .base_garbage_size(self.base_garbage_bytes)
            .garbage_ceiling(self.garbage_ceiling_bytes);
        if let Some(max) = self.max_tracked {
            builder = builder.max_tracked_addresses(max);
        }
        builder.build()
    }

    /// HTTP settings derived from the arguments.
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig::new(self.bind, Credentials::new(&self.username, &self.password))
            .with_trust_forwarded_for(self.trust_forwarded_for)
    }
}
