//! Error Types
//!
//! Error hierarchy for the session manager and authentication flows.
//!
//! The whole hierarchy is `Clone` so a single login result can be shared
//! with every waiter of a single-flight computation.

use std::time::Duration;
use thiserror::Error;

/// Root error type for the crate.
#[derive(Error, Debug, Clone)]
pub enum VaultSessionError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Flow error: {0}")]
    Flow(#[from] FlowError),

    #[error("Login error: {0}")]
    Login(#[from] LoginError),

    #[error("Lookup error: {0}")]
    Lookup(#[from] LookupError),

    #[error("Revocation error: {0}")]
    Revocation(#[from] RevocationError),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("Session manager has been destroyed")]
    Closed,
}

impl VaultSessionError {
    /// Get error code for telemetry.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "VAULT_CONFIG",
            Self::Flow(_) => "VAULT_FLOW",
            Self::Login(_) => "VAULT_LOGIN",
            Self::Lookup(_) => "VAULT_LOOKUP",
            Self::Revocation(_) => "VAULT_REVOCATION",
            Self::Network(_) => "VAULT_NETWORK",
            Self::Protocol(_) => "VAULT_PROTOCOL",
            Self::Api(_) => "VAULT_API",
            Self::Closed => "VAULT_CLOSED",
        }
    }

    /// Check if the error is a client-side rejection (HTTP 4xx).
    ///
    /// The default renewal classifier treats these as terminal: the server
    /// understood the request and refused it, so submitting the same renewal
    /// again cannot succeed.
    pub fn is_client_rejection(&self) -> bool {
        match self {
            Self::Api(ApiError { status, .. }) => (400..500).contains(status),
            Self::Flow(FlowError::StepFailed { source, .. }) => source.is_client_rejection(),
            _ => false,
        }
    }
}

/// Configuration error.
#[derive(Error, Debug, Clone)]
pub enum ConfigurationError {
    #[error("Missing required field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid endpoint URL: {url}")]
    InvalidEndpoint { url: String },
}

/// Authentication flow error.
#[derive(Error, Debug, Clone)]
pub enum FlowError {
    #[error("Step {kind} (index {index}) failed: {source}")]
    StepFailed {
        /// Step kind name, e.g. `http-request` or `map`.
        kind: &'static str,
        /// Position in the flattened step sequence.
        index: usize,
        #[source]
        source: Box<VaultSessionError>,
    },

    #[error("Flow completed without producing a token")]
    NoTokenProduced,

    #[error("Flow has no terminal login step")]
    MissingLoginStep,
}

/// Token supplier / login error, surfaced to `get_token()` callers.
#[derive(Error, Debug, Clone)]
pub enum LoginError {
    #[error("Login failed: {message}")]
    Failed { message: String },

    #[error("Login response carried no client token")]
    NoClientToken,
}

/// Self-lookup error. Always absorbed by the session manager.
#[derive(Error, Debug, Clone)]
pub enum LookupError {
    #[error("Token self-lookup failed: {message}")]
    Failed { message: String },
}

/// Revocation error. Always absorbed by the session manager.
#[derive(Error, Debug, Clone)]
pub enum RevocationError {
    #[error("Token revocation failed: {message}")]
    Failed { message: String },

    #[error("Revocation timed out after {timeout:?}")]
    Timeout { timeout: Duration },
}

/// Network/transport error.
#[derive(Error, Debug, Clone)]
pub enum NetworkError {
    #[error("Connection failed: {message}")]
    ConnectionFailed { message: String },

    #[error("Request timeout after {timeout:?}")]
    Timeout { timeout: Duration },
}

/// Protocol/response parsing error.
#[derive(Error, Debug, Clone)]
pub enum ProtocolError {
    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Unexpected redirect to: {location}")]
    UnexpectedRedirect { location: String },

    #[error("Response too large: {size} bytes")]
    ResponseTooLarge { size: usize },

    #[error("Invalid JSON: {message}")]
    InvalidJson { message: String },
}

/// Non-success response from the secrets service.
#[derive(Error, Debug, Clone)]
#[error("HTTP {status}: {}", messages.join("; "))]
pub struct ApiError {
    /// HTTP status code.
    pub status: u16,
    /// Error messages from the response body, if any.
    pub messages: Vec<String>,
}

/// Result type for session operations.
pub type VaultSessionResult<T> = Result<T, VaultSessionError>;

/// Error response body from the secrets service.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct VaultErrorResponse {
    #[serde(default)]
    pub errors: Vec<String>,
}

/// Parse error response from an HTTP body.
pub fn parse_error_response(body: &str) -> Option<VaultErrorResponse> {
    serde_json::from_str(body).ok()
}

/// Create error from a non-success HTTP response.
pub fn create_error_from_response(status: u16, body: &str) -> VaultSessionError {
    let messages = parse_error_response(body)
        .map(|r| r.errors)
        .unwrap_or_default();

    VaultSessionError::Api(ApiError { status, messages })
}
