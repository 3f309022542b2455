//! Server configuration.

use std::fmt;
use std::net::SocketAddr;

use subtle::ConstantTimeEq;

/// The single account the login endpoint accepts.
///
/// The password is kept only as a BLAKE3 digest.
#[derive(Clone)]
pub struct Credentials {
    username: String,
    password_hash: [u8; 32],
}

impl Credentials {
    /// Create credentials from a username and plaintext password.
    #[must_use]
    pub fn new(username: impl Into<String>, password: &str) -> Self {
        Self {
            username: username.into(),
            password_hash: *blake3::hash(password.as_bytes()).as_bytes(),
        }
    }

    /// Whether `username` names the configured account.
    #[must_use]
    pub fn matches_user(&self, username: &str) -> bool {
        self.username.as_bytes().ct_eq(username.as_bytes()).into()
    }

    /// Whether `password` is the configured password.
    #[must_use]
    pub fn verify_password(&self, password: &str) -> bool {
        let candidate = blake3::hash(password.as_bytes());
        self.password_hash.ct_eq(candidate.as_bytes()).into()
    }

    /// The configured username.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password_hash", &"[REDACTED]")
            .finish()
    }
}

/// Configuration for the login server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the HTTP server to.
    pub bind_addr: SocketAddr,
    /// Accepted account.
    pub credentials: Credentials,
    /// Maximum accepted login body size in bytes.
    pub body_limit: usize,
    /// Take the client address from `X-Forwarded-For` when present.
    pub trust_forwarded_for: bool,
}

impl ServerConfig {
    /// Create a new configuration.
    #[must_use]
    pub fn new(bind_addr: SocketAddr, credentials: Credentials) -> Self {
        Self {
            bind_addr,
            credentials,
            body_limit: 16 * 1024,
            trust_forwarded_for: false,
        }
    }

    /// Set the maximum body size.
    #[must_use]
    pub const fn with_body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }

    /// Trust `X-Forwarded-For` for the client address.
    #[must_use]
    pub const fn with_trust_forwarded_for(mut self, trust: bool) -> Self {
        self.trust_forwarded_for = trust;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_verify() {
        let creds = Credentials::new("alice@example.com", "hunter2");

        assert!(creds.matches_user("alice@example.com"));
        assert!(!creds.matches_user("bob@example.com"));
        assert!(creds.verify_password("hunter2"));
        assert!(!creds.verify_password("hunter3"));
        assert!(!creds.verify_password(""));
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let creds = Credentials::new("alice", "hunter2");
        let debug = format!("{creds:?}");

        assert!(debug.contains("alice"));
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_server_config_builders() {
        let addr: SocketAddr = "127.0.0.1:7328".parse().unwrap();
        let config = ServerConfig::new(addr, Credentials::new("a", "b"))
            .with_body_limit(1024)
            .with_trust_forwarded_for(true);

        assert_eq!(config.bind_addr, addr);
        assert_eq!(config.body_limit, 1024);
        assert!(config.trust_forwarded_for);
    }
}
