//! Configuration Builder
//!
//! Fluent builder for session configuration.

use std::time::Duration;

use url::Url;

use crate::error::{ConfigurationError, VaultSessionError};
use crate::types::SessionConfig;

/// Session configuration builder.
#[derive(Default)]
pub struct SessionConfigBuilder {
    base_url: Option<String>,
    self_lookup: bool,
    revoke_on_destroy: bool,
    revocation_timeout: Duration,
}

impl SessionConfigBuilder {
    /// Create new configuration builder.
    pub fn new() -> Self {
        Self {
            self_lookup: true,
            revoke_on_destroy: true,
            revocation_timeout: Duration::from_secs(5),
            ..Default::default()
        }
    }

    /// Set the base URL of the secrets service.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Enable or disable self-lookup enrichment of externally supplied
    /// tokens.
    pub fn self_lookup(mut self, enable: bool) -> Self {
        self.self_lookup = enable;
        self
    }

    /// Enable or disable token revocation on destroy.
    pub fn revoke_on_destroy(mut self, enable: bool) -> Self {
        self.revoke_on_destroy = enable;
        self
    }

    /// Set the upper bound on the revocation call during shutdown.
    pub fn revocation_timeout(mut self, timeout: Duration) -> Self {
        self.revocation_timeout = timeout;
        self
    }

    /// Build the session configuration.
    pub fn build(self) -> Result<SessionConfig, VaultSessionError> {
        let base_url = self.base_url.ok_or_else(|| {
            VaultSessionError::Configuration(ConfigurationError::MissingRequired {
                field: "base_url".to_string(),
            })
        })?;

        let parsed = Url::parse(&base_url).map_err(|_| {
            VaultSessionError::Configuration(ConfigurationError::InvalidEndpoint {
                url: base_url.clone(),
            })
        })?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(VaultSessionError::Configuration(
                ConfigurationError::InvalidEndpoint { url: base_url },
            ));
        }

        Ok(SessionConfig {
            base_url,
            self_lookup: self.self_lookup,
            revoke_on_destroy: self.revoke_on_destroy,
            revocation_timeout: self.revocation_timeout,
        })
    }
}

/// Create a new session configuration builder.
pub fn session_config() -> SessionConfigBuilder {
    SessionConfigBuilder::new()
}
