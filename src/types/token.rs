//! Token Types
//!
//! Client token definitions for the secrets service.

use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;

/// Opaque client token. Immutable once created.
#[derive(Clone)]
pub struct VaultToken {
    value: SecretString,
}

impl VaultToken {
    /// Create a new token from its secret value.
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: SecretString::new(value.into()),
        }
    }

    /// Get the token value (for the `X-Vault-Token` header).
    pub fn secret(&self) -> &str {
        self.value.expose_secret()
    }
}

impl std::fmt::Debug for VaultToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultToken")
            .field("value", &"[REDACTED]")
            .finish()
    }
}

/// Login-issued token with renewal metadata.
///
/// Only `LoginToken` instances participate in renewal and revocation
/// scheduling; a bare [`VaultToken`] carries no lease information.
#[derive(Clone, Debug)]
pub struct LoginToken {
    /// The underlying token.
    pub token: VaultToken,
    /// Whether the token can be renewed without re-authenticating.
    pub renewable: bool,
    /// Remaining validity window.
    pub lease_duration: Duration,
    /// Token accessor, if the service returned one.
    pub accessor: Option<String>,
    /// Token type, e.g. `service` or `batch`.
    pub token_type: Option<String>,
}

impl LoginToken {
    /// Create a renewable login token.
    pub fn renewable(token: VaultToken, lease_duration: Duration) -> Self {
        Self {
            token,
            renewable: true,
            lease_duration,
            accessor: None,
            token_type: None,
        }
    }

    /// Create a non-renewable login token.
    pub fn of(token: VaultToken, lease_duration: Duration) -> Self {
        Self {
            token,
            renewable: false,
            lease_duration,
            accessor: None,
            token_type: None,
        }
    }

    /// Set the accessor.
    pub fn with_accessor(mut self, accessor: impl Into<String>) -> Self {
        self.accessor = Some(accessor.into());
        self
    }

    /// Set the token type.
    pub fn with_token_type(mut self, token_type: impl Into<String>) -> Self {
        self.token_type = Some(token_type.into());
        self
    }

    /// Whether this is a service token, eligible for revocation semantics.
    ///
    /// Batch tokens cannot be revoked. Falls back to the token prefix when
    /// the service did not report a type.
    pub fn is_service_token(&self) -> bool {
        match self.token_type.as_deref() {
            Some("service") => true,
            Some(_) => false,
            None => {
                let secret = self.token.secret();
                secret.starts_with("hvs.") || secret.starts_with("s.")
            }
        }
    }
}

/// Token held by the session manager: either login-issued with metadata or
/// externally supplied.
#[derive(Clone, Debug)]
pub enum SessionToken {
    /// Externally supplied token without lease metadata.
    Plain(VaultToken),
    /// Login-issued token with renewal metadata.
    Login(LoginToken),
}

impl SessionToken {
    /// Get the underlying token.
    pub fn token(&self) -> &VaultToken {
        match self {
            Self::Plain(token) => token,
            Self::Login(login) => &login.token,
        }
    }

    /// Get the login metadata, if present.
    pub fn as_login(&self) -> Option<&LoginToken> {
        match self {
            Self::Plain(_) => None,
            Self::Login(login) => Some(login),
        }
    }

    /// Whether the token is renewable.
    pub fn is_renewable(&self) -> bool {
        self.as_login().map(|l| l.renewable).unwrap_or(false)
    }
}

/// Token plus its revocation eligibility, replaced wholesale on renewal.
#[derive(Clone, Debug)]
pub struct TokenWrapper {
    /// The managed token.
    pub token: SessionToken,
    /// True only if the token was obtained via login and is a service token.
    pub revocable: bool,
}

impl TokenWrapper {
    /// Wrap a token obtained via login.
    pub fn from_login(login: LoginToken) -> Self {
        let revocable = login.is_service_token();
        Self {
            token: SessionToken::Login(login),
            revocable,
        }
    }

    /// Wrap an externally supplied token. Never revocable.
    pub fn external(token: SessionToken) -> Self {
        Self {
            token,
            revocable: false,
        }
    }
}

/// Outcome of a renewal attempt, drives whether the background task
/// reschedules itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenewOutcome {
    /// The failure (or expiry) was terminal; the token has been dropped.
    pub terminal_error: bool,
    /// The renewal succeeded and the token was replaced.
    pub successful: bool,
}

impl RenewOutcome {
    /// Successful renewal; schedule the next one.
    pub fn renewed() -> Self {
        Self {
            terminal_error: false,
            successful: true,
        }
    }

    /// Terminal failure; the token was dropped.
    pub fn terminal() -> Self {
        Self {
            terminal_error: true,
            successful: false,
        }
    }

    /// Retryable failure; the token was kept, retry policy belongs to the
    /// caller.
    pub fn retryable() -> Self {
        Self {
            terminal_error: false,
            successful: false,
        }
    }

    /// Whether the background task should schedule another renewal.
    pub fn should_reschedule(&self) -> bool {
        self.successful && !self.terminal_error
    }
}
