//! HTTP request handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ServerError, ServerResult};
use crate::state::AppState;

/// Login request body.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    /// Account identifier.
    pub email: String,
    /// Plaintext password.
    #[serde(default)]
    pub password: String,
}

/// Successful login response.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    /// Status message.
    pub status: String,
    /// The authenticated account.
    pub email: String,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Status message.
    pub status: String,
    /// Server uptime in seconds.
    pub uptime_secs: u64,
    /// Addresses currently tracked by the shield.
    pub tracked_addresses: usize,
    /// Addresses currently blocked by the shield.
    pub blocked_addresses: usize,
}

/// Handle GET /health.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let stats = state.shield().stats();
    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs: state.uptime_secs(),
        tracked_addresses: stats.tracked_addresses,
        blocked_addresses: stats.blocked_addresses,
    })
}

/// Handle POST /v1/login.
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> ServerResult<Json<LoginResponse>> {
    let credentials = &state.config().credentials;

    if !credentials.matches_user(&request.email) {
        debug!("Login for unknown user");
        return Err(ServerError::UserNotFound);
    }
    if !credentials.verify_password(&request.password) {
        debug!("Login with wrong password");
        return Err(ServerError::InvalidPassword);
    }

    Ok(Json(LoginResponse {
        status: "ok".to_string(),
        email: request.email,
    }))
}
