//! Session Configuration
//!
//! Settings for the session manager. Built via
//! [`crate::builders::SessionConfigBuilder`].

use std::time::Duration;

/// Session manager configuration.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Base URL of the secrets service, e.g. `https://vault.example.com:8200`.
    pub base_url: String,
    /// Enrich plain tokens with renewability/TTL metadata via
    /// `auth/token/lookup-self`.
    pub self_lookup: bool,
    /// Revoke the managed token on `destroy()` when it is revocable.
    pub revoke_on_destroy: bool,
    /// Upper bound on the revocation call during shutdown.
    pub revocation_timeout: Duration,
}

impl SessionConfig {
    /// Configuration with defaults for a base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            self_lookup: true,
            revoke_on_destroy: true,
            revocation_timeout: Duration::from_secs(5),
        }
    }
}
