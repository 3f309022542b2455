//! Brute-force guard middleware for the login route.
//!
//! Every login request passes through [`login_guard`]:
//!
//! 1. A blocked client address is rejected with `403` before the handler runs.
//! 2. The body is buffered and parsed so the attempted username is known.
//! 3. A `200` from the handler clears the address.
//! 4. A `401` or `404` is recorded as a failed attempt. Once the address is
//!    throttled the error is replaced by a garbage download.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use claw_shield::BruteForceShield;
use tracing::{debug, warn};

use crate::error::ServerError;
use crate::handlers::LoginRequest;
use crate::state::AppState;

/// Header used to identify clients behind a proxy.
pub const FORWARDED_FOR: &str = "x-forwarded-for";

/// Filename announced for punishment payloads.
pub const GARBAGE_FILENAME: &str = "garbage.bin";

/// Middleware applying brute-force protection to a login handler.
pub async fn login_guard(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let address = client_address(&request, state.config().trust_forwarded_for);
    let shield = state.shield();

    if let Err(e) = shield.check(&address) {
        debug!(address = %address, error = %e, "Rejected blocked address");
        return ServerError::Blocked.into_response();
    }

    let (parts, body) = request.into_parts();
    let bytes = match to_bytes(body, state.config().body_limit).await {
        Ok(bytes) => bytes,
        Err(e) => return ServerError::InvalidRequest(e.to_string()).into_response(),
    };
    let login: LoginRequest = match serde_json::from_slice(&bytes) {
        Ok(login) => login,
        Err(e) => return ServerError::InvalidRequest(e.to_string()).into_response(),
    };

    let response = next.run(Request::from_parts(parts, Body::from(bytes))).await;

    match response.status() {
        StatusCode::OK => {
            shield.reset_attempts(&address);
            response
        }
        StatusCode::UNAUTHORIZED | StatusCode::NOT_FOUND => {
            if shield.record_failed_attempt(&address, &login.email) {
                punishment_response(shield, &address)
            } else {
                response
            }
        }
        _ => response,
    }
}

/// Resolve the client address for a request.
///
/// With `trust_forwarded_for` the first hop of `X-Forwarded-For` wins.
/// Otherwise the socket peer address is used, or `"unknown"` when the
/// router was not served with connect info.
pub fn client_address(request: &Request, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for {
        let forwarded = request
            .headers()
            .get(FORWARDED_FOR)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|hop| !hop.is_empty());
        if let Some(hop) = forwarded {
            return hop.to_string();
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or_else(|| "unknown".to_string(), |info| info.0.ip().to_string())
}

/// Build the garbage download served to a throttled address.
pub fn punishment_response(shield: &BruteForceShield, address: &str) -> Response {
    let chunks = shield.garbage_chunks(address);
    let size = chunks.remaining();
    warn!(address = %address, bytes = size, "Serving garbage payload");

    let body = Body::from_stream(futures::stream::iter(chunks.map(Ok::<_, Infallible>)));
    let disposition = format!("attachment; filename={GARBAGE_FILENAME}");

    let mut response = (StatusCode::OK, body).into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(size));
    response
}
