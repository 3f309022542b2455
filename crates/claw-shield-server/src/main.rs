//! Claw Shield login server binary.
//!
//! Serves a login endpoint that throttles, punishes and blocks brute-force
//! clients.

use std::sync::Arc;

use clap::Parser;
use claw_shield::{spawn_alert_logger, spawn_compaction, BruteForceShield};
use claw_shield_server::{ServerArgs, ShieldServer};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let args = ServerArgs::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if args.log_json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let shield_config = args.shield_config();
    let compaction_interval = shield_config.compaction_interval;
    let shield = match BruteForceShield::new(shield_config) {
        Ok(shield) => Arc::new(shield),
        Err(e) => {
            error!("Invalid shield configuration: {}", e);
            std::process::exit(1);
        }
    };

    match shield.subscribe_notifications() {
        Ok(alerts) => {
            spawn_alert_logger(alerts);
        }
        Err(e) => error!("Alert logger not started: {}", e),
    }
    spawn_compaction(Arc::clone(&shield), compaction_interval);

    info!("Starting Claw Shield on {}", args.bind);
    info!("  Login endpoint: http://{}/v1/login", args.bind);

    let server = ShieldServer::new(args.server_config(), shield);
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
        }
    };

    if let Err(e) = server.serve_with_shutdown(shutdown).await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
}
