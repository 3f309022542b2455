//! HTTP login endpoint guarded by [`claw_shield`].
//!
//! The server exposes:
//!
//! - `GET /health`: liveness and shield counters
//! - `POST /v1/login`: JSON `{"email", "password"}` login behind [`guard::login_guard`]
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use claw_shield::BruteForceShield;
//! use claw_shield_server::{Credentials, ServerConfig, ShieldServer};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::new(
//!         "0.0.0.0:7328".parse()?,
//!         Credentials::new("ops@example.com", "secret"),
//!     );
//!     let shield = Arc::new(BruteForceShield::with_defaults());
//!
//!     ShieldServer::new(config, shield).serve().await?;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod config;
pub mod error;
pub mod guard;
pub mod handlers;
pub mod routes;
pub mod server;
pub mod state;

pub use cli::ServerArgs;
pub use config::{Credentials, ServerConfig};
pub use error::{ServerError, ServerResult};
pub use routes::create_router;
pub use server::ShieldServer;
pub use state::AppState;
