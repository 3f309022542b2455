//! Route definitions for the login server.

use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::guard::login_guard;
use crate::handlers::{health_check, login};
use crate::state::AppState;

/// Create the router with all routes configured.
pub fn create_router(state: Arc<AppState>) -> Router {
    let guarded_login =
        post(login).layer(middleware::from_fn_with_state(Arc::clone(&state), login_guard));

    Router::new()
        .route("/health", get(health_check))
        .route("/v1/login", guarded_login)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
