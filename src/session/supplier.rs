//! Token Suppliers
//!
//! Sources the session manager can obtain a token from: a declarative flow,
//! a direct login call, or an externally supplied token.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::core::template::{api_url, render_path};
use crate::core::transport::{HttpRequest, HttpTransport};
use crate::error::{create_error_from_response, LoginError, VaultSessionError, VaultSessionResult};
use crate::flow::{AuthFlow, FlowExecutor};
use crate::types::{AuthResponse, SessionToken, VaultToken};

/// Source of tokens for the session manager.
#[async_trait]
pub trait TokenSupplier: Send + Sync {
    /// Obtain a token. Called at most once per single-flight login.
    async fn obtain(&self) -> VaultSessionResult<SessionToken>;

    /// Whether tokens from this supplier are obtained via login. Externally
    /// supplied tokens are never eligible for revocation.
    fn via_login(&self) -> bool {
        true
    }
}

/// Supplier running a declarative authentication flow.
pub struct FlowSupplier<T: HttpTransport> {
    flow: AuthFlow,
    executor: FlowExecutor<T>,
}

impl<T: HttpTransport> FlowSupplier<T> {
    /// Create a supplier for `flow` against a service base URL.
    pub fn new(flow: AuthFlow, base_url: impl Into<String>, transport: Arc<T>) -> Self {
        Self {
            flow,
            executor: FlowExecutor::new(base_url, transport),
        }
    }
}

#[async_trait]
impl<T: HttpTransport> TokenSupplier for FlowSupplier<T> {
    async fn obtain(&self) -> VaultSessionResult<SessionToken> {
        self.executor.execute(&self.flow).await
    }
}

/// Supplier submitting a single login request with a caller-provided body.
///
/// The body construction for a concrete backend (role ids, signed identity
/// documents, certificates) happens outside this crate.
pub struct DirectLoginSupplier<T: HttpTransport> {
    base_url: String,
    path: String,
    body: serde_json::Value,
    transport: Arc<T>,
}

impl<T: HttpTransport> DirectLoginSupplier<T> {
    /// Create a supplier POSTing `body` to a rendered login path.
    pub fn new(
        base_url: impl Into<String>,
        path_template: &str,
        path_vars: &[&str],
        body: serde_json::Value,
        transport: Arc<T>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            path: render_path(path_template, path_vars),
            body,
            transport,
        }
    }
}

#[async_trait]
impl<T: HttpTransport> TokenSupplier for DirectLoginSupplier<T> {
    async fn obtain(&self) -> VaultSessionResult<SessionToken> {
        let url = api_url(&self.base_url, &self.path);
        debug!(%url, "direct login");

        let request = HttpRequest::post_json(url, &self.body)?;
        let response = self.transport.send(request).await?;
        if !response.is_success() {
            return Err(create_error_from_response(response.status, &response.body));
        }

        let auth: AuthResponse = response.json()?;
        let section = auth
            .auth
            .ok_or(VaultSessionError::Login(LoginError::NoClientToken))?;
        Ok(SessionToken::Login(section.into_login_token()))
    }
}

/// Supplier handing out an externally provided token.
pub struct StaticTokenSupplier {
    token: VaultToken,
}

impl StaticTokenSupplier {
    /// Wrap an existing token.
    pub fn new(token: VaultToken) -> Self {
        Self { token }
    }
}

#[async_trait]
impl TokenSupplier for StaticTokenSupplier {
    async fn obtain(&self) -> VaultSessionResult<SessionToken> {
        Ok(SessionToken::Plain(self.token.clone()))
    }

    fn via_login(&self) -> bool {
        false
    }
}
