//! Vault Session
//!
//! Client-side credential session management for a Vault-style secrets
//! service.
//!
//! # Features
//!
//! - Declarative multi-step authentication flows (values, suppliers, remote
//!   calls, transforms, zips, side effects) terminated by a login step
//! - Managed token sessions: single-flight login, caching, background
//!   renewal ahead of lease expiry
//! - Terminal-vs-retryable renewal failure classification via a pluggable
//!   predicate
//! - Self-lookup enrichment of externally supplied tokens
//! - Best-effort, timeout-bounded revocation on shutdown
//! - Lifecycle event listeners and a blocking facade for synchronous callers
//!
//! # Example
//!
//! ```rust,ignore
//! use serde_json::json;
//! use vault_session::{session_config, FlowStep, VaultSessionClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = session_config()
//!         .base_url("https://vault.example.com:8200")
//!         .build()?;
//!
//!     let client = VaultSessionClient::new(config)?;
//!
//!     // AppRole login with a server-issued secret id.
//!     let flow = FlowStep::from_http_request(
//!         vault_session::FlowHttpRequest::post("auth/approle/role/web/secret-id"),
//!     )
//!     .map(|secret| {
//!         Ok(json!({
//!             "role_id": "web",
//!             "secret_id": secret.body_json()["data"]["secret_id"],
//!         })
//!         .into())
//!     })
//!     .login_path("auth/approle/login", &[]);
//!
//!     let session = client.session_from_flow(flow);
//!     let token = session.get_token().await?;
//!     println!("token accessor ready, {} bytes", token.secret().len());
//!
//!     session.destroy().await;
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - `types`: tokens, wire shapes, session configuration
//! - `error`: error hierarchy with failure classification helpers
//! - `core`: HTTP transport, task scheduler, path templating
//! - `flow`: declarative authentication flows and their executor
//! - `session`: token lifecycle (manager, suppliers, triggers, blocking)
//! - `events`: lifecycle event dispatch
//! - `builders`: fluent configuration builder
//! - `client`: high-level client combining all functionality

pub mod builders;
pub mod client;
pub mod core;
pub mod error;
pub mod events;
pub mod flow;
pub mod session;
pub mod types;

// Re-export main client
pub use client::VaultSessionClient;

// Re-export builders
pub use builders::{session_config, SessionConfigBuilder};

// Re-export errors
pub use error::{
    create_error_from_response, parse_error_response, ApiError, ConfigurationError, FlowError,
    LoginError, LookupError, NetworkError, ProtocolError, RevocationError, VaultErrorResponse,
    VaultSessionError, VaultSessionResult,
};

// Re-export types
pub use types::{
    // Wire
    AuthResponse, AuthSection, LookupData, LookupResponse,
    // Token
    LoginToken, RenewOutcome, SessionToken, TokenWrapper, VaultToken,
    // Config
    SessionConfig,
};

// Re-export core components
pub use core::{
    HttpMethod, HttpRequest, HttpResponse, HttpTransport, MockHttpTransport, MockScheduler,
    ReqwestHttpTransport, ScheduleHandle, TaskScheduler, TokioScheduler,
};

// Re-export flows
pub use flow::{AuthFlow, FlowExecutor, FlowHttpRequest, FlowStep, FlowValue};

// Re-export session management
pub use session::{
    default_renewal_classifier, BlockingSession, DefaultRefreshTrigger, DirectLoginSupplier,
    FlowSupplier, RefreshTrigger, RenewalClassifier, SessionManager, StaticTokenSupplier,
    TokenSupplier,
};

// Re-export events
pub use events::{
    EventDispatcher, EventListener, EventRecord, InMemoryEventListener, NoOpEventListener,
    SessionEvent,
};
