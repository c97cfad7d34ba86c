//! Vault Session Client
//!
//! High-level client that combines authentication flows and session
//! management.

use std::sync::Arc;

use crate::core::{HttpTransport, ReqwestHttpTransport, TaskScheduler, TokioScheduler};
use crate::error::{VaultSessionError, VaultSessionResult};
use crate::events::{EventDispatcher, EventListener};
use crate::flow::{AuthFlow, FlowExecutor};
use crate::session::{
    default_renewal_classifier, DefaultRefreshTrigger, DirectLoginSupplier, FlowSupplier,
    RefreshTrigger, RenewalClassifier, SessionManager, StaticTokenSupplier, TokenSupplier,
};
use crate::types::{SessionConfig, SessionToken, VaultToken};

/// Client for the secrets service: executes authentication flows and opens
/// managed token sessions.
pub struct VaultSessionClient<T: HttpTransport = ReqwestHttpTransport> {
    config: SessionConfig,
    transport: Arc<T>,
    trigger: Arc<dyn RefreshTrigger>,
    scheduler: Arc<dyn TaskScheduler>,
    events: Arc<EventDispatcher>,
    classifier: RenewalClassifier,
}

impl VaultSessionClient<ReqwestHttpTransport> {
    /// Create a new client with the default HTTP transport.
    pub fn new(config: SessionConfig) -> Result<Self, VaultSessionError> {
        let transport = Arc::new(ReqwestHttpTransport::new()?);
        Ok(Self::with_transport(config, transport))
    }
}

impl<T: HttpTransport + 'static> VaultSessionClient<T> {
    /// Create a client with a custom transport.
    pub fn with_transport(config: SessionConfig, transport: Arc<T>) -> Self {
        Self {
            config,
            transport,
            trigger: Arc::new(DefaultRefreshTrigger::new()),
            scheduler: Arc::new(TokioScheduler::new()),
            events: Arc::new(EventDispatcher::new()),
            classifier: default_renewal_classifier(),
        }
    }

    /// Replace the refresh trigger.
    pub fn with_trigger(mut self, trigger: Arc<dyn RefreshTrigger>) -> Self {
        self.trigger = trigger;
        self
    }

    /// Replace the task scheduler.
    pub fn with_scheduler(mut self, scheduler: Arc<dyn TaskScheduler>) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// Replace the renewal failure classifier.
    pub fn with_classifier(mut self, classifier: RenewalClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Register a lifecycle event listener.
    pub fn add_listener(self, listener: Arc<dyn EventListener>) -> Self {
        self.events.add_listener(listener);
        self
    }

    /// Get the session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Execute an authentication flow once, without opening a session.
    pub async fn execute_flow(&self, flow: &AuthFlow) -> VaultSessionResult<SessionToken> {
        let executor = FlowExecutor::new(self.config.base_url.clone(), self.transport.clone());
        executor.execute(flow).await
    }

    /// Open a managed session that logs in through `flow`.
    pub fn session_from_flow(&self, flow: AuthFlow) -> SessionManager<T> {
        self.session_with_supplier(Arc::new(FlowSupplier::new(
            flow,
            self.config.base_url.clone(),
            self.transport.clone(),
        )))
    }

    /// Open a managed session that logs in with a single POST to a login
    /// path, e.g. `auth/approle/login`.
    pub fn session_from_login(
        &self,
        path_template: &str,
        path_vars: &[&str],
        body: serde_json::Value,
    ) -> SessionManager<T> {
        self.session_with_supplier(Arc::new(DirectLoginSupplier::new(
            self.config.base_url.clone(),
            path_template,
            path_vars,
            body,
            self.transport.clone(),
        )))
    }

    /// Open a managed session around an externally obtained token.
    pub fn session_with_token(&self, token: VaultToken) -> SessionManager<T> {
        self.session_with_supplier(Arc::new(StaticTokenSupplier::new(token)))
    }

    /// Open a managed session with a custom token supplier.
    pub fn session_with_supplier(&self, supplier: Arc<dyn TokenSupplier>) -> SessionManager<T> {
        SessionManager::with_components(
            self.config.clone(),
            self.transport.clone(),
            supplier,
            self.trigger.clone(),
            self.scheduler.clone(),
            self.events.clone(),
            self.classifier.clone(),
        )
    }
}
