//! Shared state for the login server.

use std::sync::Arc;
use std::time::Instant;

use claw_shield::BruteForceShield;

use crate::config::ServerConfig;

/// State shared by every request handler.
#[derive(Debug)]
pub struct AppState {
    config: Arc<ServerConfig>,
    shield: Arc<BruteForceShield>,
    start_time: Instant,
}

impl AppState {
    /// Create the state around an existing shield.
    pub fn new(config: ServerConfig, shield: Arc<BruteForceShield>) -> Self {
        Self {
            config: Arc::new(config),
            shield,
            start_time: Instant::now(),
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Get the shield.
    pub fn shield(&self) -> &BruteForceShield {
        &self.shield
    }

    /// Seconds since the server started.
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
