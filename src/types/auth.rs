//! Auth Response Types
//!
//! Serde shapes for the login, renewal, and lookup responses of the secrets
//! service. Field aliases cover the `lease_duration`/`ttl` and
//! `type`/`token_type` spellings that differ between endpoints.

use serde::Deserialize;
use std::time::Duration;

use crate::types::token::{LoginToken, VaultToken};

/// The `auth` section of a login or renew response.
#[derive(Clone, Debug, Deserialize)]
pub struct AuthSection {
    /// The issued client token.
    pub client_token: String,
    /// Whether the token can be renewed.
    #[serde(default)]
    pub renewable: bool,
    /// Lease duration in seconds.
    #[serde(default, alias = "ttl")]
    pub lease_duration: u64,
    /// Token accessor.
    #[serde(default)]
    pub accessor: Option<String>,
    /// Token type.
    #[serde(default, alias = "type")]
    pub token_type: Option<String>,
}

impl AuthSection {
    /// Convert into a [`LoginToken`].
    pub fn into_login_token(self) -> LoginToken {
        LoginToken {
            token: VaultToken::new(self.client_token),
            renewable: self.renewable,
            lease_duration: Duration::from_secs(self.lease_duration),
            accessor: self.accessor,
            token_type: self.token_type,
        }
    }
}

/// Response envelope for login and renew calls.
#[derive(Clone, Debug, Deserialize)]
pub struct AuthResponse {
    /// The authentication section. Absent means no token was produced.
    #[serde(default)]
    pub auth: Option<AuthSection>,
}

/// The `data` section of a `lookup-self` response.
#[derive(Clone, Debug, Deserialize)]
pub struct LookupData {
    /// Whether the token can be renewed.
    #[serde(default)]
    pub renewable: bool,
    /// Remaining time-to-live in seconds.
    #[serde(default)]
    pub ttl: u64,
    /// Token accessor.
    #[serde(default)]
    pub accessor: Option<String>,
    /// Token type.
    #[serde(default, alias = "token_type")]
    pub r#type: Option<String>,
}

/// Response envelope for `lookup-self`.
#[derive(Clone, Debug, Deserialize)]
pub struct LookupResponse {
    /// Token metadata.
    pub data: LookupData,
}

impl LookupResponse {
    /// Merge the lookup metadata onto an existing plain token.
    pub fn enrich(self, token: VaultToken) -> LoginToken {
        let data = self.data;
        LoginToken {
            token,
            renewable: data.renewable,
            lease_duration: Duration::from_secs(data.ttl),
            accessor: data.accessor,
            token_type: data.r#type,
        }
    }
}
