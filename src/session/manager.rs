//! Session Manager
//!
//! Token-lifecycle core: caches one token behind a state machine, coalesces
//! concurrent logins into a single flight, schedules background renewal
//! before expiry, classifies renewal failures, and revokes on shutdown.
//!
//! State machine: `Empty -> Pending -> Valid -> Empty | Terminated`. Exactly
//! one writer transitions the cell at a time; once `Terminated` no new
//! `Pending` or `Valid` transition is permitted.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::core::scheduler::{ScheduleHandle, ScheduledTask, TaskScheduler, TokioScheduler};
use crate::core::template::api_url;
use crate::core::transport::{HttpRequest, HttpTransport};
use crate::error::{
    create_error_from_response, LoginError, LookupError, ProtocolError, RevocationError,
    VaultSessionError, VaultSessionResult,
};
use crate::events::{EventDispatcher, SessionEvent};
use crate::session::supplier::TokenSupplier;
use crate::session::trigger::{DefaultRefreshTrigger, RefreshTrigger};
use crate::types::{
    AuthResponse, LoginToken, LookupResponse, RenewOutcome, SessionConfig, SessionToken,
    TokenWrapper, VaultToken,
};

/// Pluggable predicate deciding whether a renewal failure is terminal.
///
/// Terminal failures drop the token; the next `get_token()` performs a fresh
/// login. Anything else keeps the existing token.
pub type RenewalClassifier = Arc<dyn Fn(&VaultSessionError) -> bool + Send + Sync>;

/// Default classifier: client-side rejections (HTTP 4xx) are terminal,
/// everything else is retryable.
pub fn default_renewal_classifier() -> RenewalClassifier {
    Arc::new(VaultSessionError::is_client_rejection)
}

type LoginOutcome = Result<TokenWrapper, VaultSessionError>;

enum TokenState {
    Empty,
    Pending(watch::Receiver<Option<LoginOutcome>>),
    Valid(TokenWrapper),
    Terminated,
}

/// Token-lifecycle manager. Cheap to clone; all clones share one state
/// machine.
pub struct SessionManager<T: HttpTransport> {
    inner: Arc<SessionInner<T>>,
}

impl<T: HttpTransport> Clone for SessionManager<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

struct SessionInner<T: HttpTransport> {
    config: SessionConfig,
    transport: Arc<T>,
    supplier: Arc<dyn TokenSupplier>,
    trigger: Arc<dyn RefreshTrigger>,
    scheduler: Arc<dyn TaskScheduler>,
    events: Arc<EventDispatcher>,
    classifier: RenewalClassifier,
    state: Mutex<TokenState>,
    /// Bumped on every token replacement or drop; stale renewal schedules
    /// compare against it and become no-ops.
    generation: AtomicU64,
    schedule: Mutex<Option<ScheduleHandle>>,
    /// At most one in-flight renewal.
    renew_lock: tokio::sync::Mutex<()>,
}

impl<T: HttpTransport + 'static> SessionManager<T> {
    /// Create a manager with default trigger, scheduler, classifier, and an
    /// empty event dispatcher.
    pub fn new(config: SessionConfig, transport: Arc<T>, supplier: Arc<dyn TokenSupplier>) -> Self {
        Self::with_components(
            config,
            transport,
            supplier,
            Arc::new(DefaultRefreshTrigger::new()),
            Arc::new(TokioScheduler::new()),
            Arc::new(EventDispatcher::new()),
            default_renewal_classifier(),
        )
    }

    /// Create a manager with custom collaborators.
    pub fn with_components(
        config: SessionConfig,
        transport: Arc<T>,
        supplier: Arc<dyn TokenSupplier>,
        trigger: Arc<dyn RefreshTrigger>,
        scheduler: Arc<dyn TaskScheduler>,
        events: Arc<EventDispatcher>,
        classifier: RenewalClassifier,
    ) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                config,
                transport,
                supplier,
                trigger,
                scheduler,
                events,
                classifier,
                state: Mutex::new(TokenState::Empty),
                generation: AtomicU64::new(0),
                schedule: Mutex::new(None),
                renew_lock: tokio::sync::Mutex::new(()),
            }),
        }
    }

    /// The event dispatcher; register listeners here.
    pub fn events(&self) -> &EventDispatcher {
        &self.inner.events
    }

    /// Get the current token, performing a single-flight login when none is
    /// cached.
    ///
    /// Concurrent callers observing a login in progress all receive the same
    /// eventual result. A caller giving up does not cancel the login for the
    /// other waiters.
    pub async fn get_token(&self) -> VaultSessionResult<VaultToken> {
        enum Wait {
            Start(
                watch::Sender<Option<LoginOutcome>>,
                watch::Receiver<Option<LoginOutcome>>,
            ),
            Join(watch::Receiver<Option<LoginOutcome>>),
        }

        let wait = {
            let mut state = self.inner.state.lock().unwrap();
            match &*state {
                TokenState::Valid(wrapper) => return Ok(wrapper.token.token().clone()),
                TokenState::Terminated => return Err(VaultSessionError::Closed),
                TokenState::Pending(rx) => Wait::Join(rx.clone()),
                TokenState::Empty => {
                    let (tx, rx) = watch::channel(None);
                    *state = TokenState::Pending(rx.clone());
                    Wait::Start(tx, rx)
                }
            }
        };

        let rx = match wait {
            Wait::Start(tx, rx) => {
                let mut guard = FlightGuard {
                    inner: self.inner.clone(),
                    flight: rx.clone(),
                    completed: false,
                };
                tokio::spawn(async move {
                    let result = guard.inner.perform_login().await;
                    let outcome = guard.inner.complete_login(result);
                    guard.completed = true;
                    let _ = tx.send(Some(outcome));
                });
                rx
            }
            Wait::Join(rx) => rx,
        };

        self.inner.await_login(rx).await
    }

    /// Submit a renewal for the current token.
    ///
    /// Returns an outcome rather than an error: renewal failures surface as
    /// events, never as exceptions to unrelated callers. Without a current
    /// renewable token this is a terminal no-op; a fresh token is obtained
    /// through [`SessionManager::get_token`], not here.
    pub async fn renew(&self) -> RenewOutcome {
        self.inner.renew().await
    }

    /// Read-and-clear the current token, revoking it best-effort when it is
    /// revocable. Revocation failures are absorbed.
    pub async fn revoke(&self) {
        self.inner.clear(false).await;
    }

    /// Shut the manager down: permanently `Terminated`, pending schedules
    /// cancelled, the token revoked best-effort within the configured
    /// timeout. Idempotent; a second call performs no network call.
    pub async fn destroy(&self) {
        self.inner.clear(true).await;
    }
}

/// Returns the `Pending` cell to `Empty` when a login flight dies without
/// reporting a result (a panic in a supplier or flow closure). User code
/// runs inside the spawned flight, so this cannot be ruled out.
struct FlightGuard<T: HttpTransport> {
    inner: Arc<SessionInner<T>>,
    flight: watch::Receiver<Option<LoginOutcome>>,
    completed: bool,
}

impl<T: HttpTransport> Drop for FlightGuard<T> {
    fn drop(&mut self) {
        if self.completed {
            return;
        }
        let mut state = self.inner.state.lock().unwrap();
        // Only clear our own flight; a newer one may already be in place.
        if matches!(&*state, TokenState::Pending(rx) if rx.same_channel(&self.flight)) {
            *state = TokenState::Empty;
        }
    }
}

impl<T: HttpTransport + 'static> SessionInner<T> {
    async fn await_login(
        &self,
        mut rx: watch::Receiver<Option<LoginOutcome>>,
    ) -> VaultSessionResult<VaultToken> {
        loop {
            if let Some(outcome) = rx.borrow().clone() {
                return outcome.map(|wrapper| wrapper.token.token().clone());
            }
            if rx.changed().await.is_err() {
                // Sender dropped without a value. Free the cell so the next
                // call can start a fresh login.
                let mut state = self.state.lock().unwrap();
                if matches!(&*state, TokenState::Pending(current) if current.same_channel(&rx)) {
                    *state = TokenState::Empty;
                }
                return Err(VaultSessionError::Login(LoginError::Failed {
                    message: "login task aborted".to_string(),
                }));
            }
        }
    }

    async fn perform_login(&self) -> VaultSessionResult<TokenWrapper> {
        let obtained = match self.supplier.obtain().await {
            Ok(token) => token,
            Err(e) => {
                self.events.publish(SessionEvent::LoginFailed {
                    message: e.to_string(),
                });
                return Err(e);
            }
        };

        let token = self.enrich(obtained).await;
        let revocable = self.supplier.via_login()
            && token
                .as_login()
                .map(LoginToken::is_service_token)
                .unwrap_or(false);

        self.events.publish(SessionEvent::LoginSucceeded {
            renewable: token.is_renewable(),
        });

        Ok(TokenWrapper { token, revocable })
    }

    /// Merge lookup-self metadata onto a plain token. Failure is non-fatal:
    /// the plain token is kept and stays non-revocable.
    async fn enrich(&self, obtained: SessionToken) -> SessionToken {
        match obtained {
            SessionToken::Plain(token) if self.config.self_lookup => {
                match self.lookup_self(&token).await {
                    Ok(login) => SessionToken::Login(login),
                    Err(e) => {
                        warn!(error = %e, "token self-lookup failed, keeping plain token");
                        self.events.publish(SessionEvent::LookupFailed {
                            message: e.to_string(),
                        });
                        SessionToken::Plain(token)
                    }
                }
            }
            other => other,
        }
    }

    async fn lookup_self(&self, token: &VaultToken) -> VaultSessionResult<LoginToken> {
        let request = HttpRequest::get(api_url(&self.config.base_url, "auth/token/lookup-self"))
            .with_token(token);

        let result: VaultSessionResult<LoginToken> = async {
            let response = self.transport.send(request).await?;
            if !response.is_success() {
                return Err(create_error_from_response(response.status, &response.body));
            }
            let lookup: LookupResponse = response.json()?;
            Ok(lookup.enrich(token.clone()))
        }
        .await;

        result.map_err(|e| {
            VaultSessionError::Lookup(LookupError::Failed {
                message: e.to_string(),
            })
        })
    }

    fn complete_login(self: &Arc<Self>, result: VaultSessionResult<TokenWrapper>) -> LoginOutcome {
        let mut state = self.state.lock().unwrap();

        // A destroy may have raced the login; the obtained token must not
        // take effect.
        if matches!(&*state, TokenState::Terminated) {
            return Err(VaultSessionError::Closed);
        }

        match result {
            Ok(wrapper) => {
                *state = TokenState::Valid(wrapper.clone());
                let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
                drop(state);
                self.schedule_renewal(&wrapper, generation);
                Ok(wrapper)
            }
            Err(e) => {
                *state = TokenState::Empty;
                Err(e)
            }
        }
    }

    fn schedule_renewal(self: &Arc<Self>, wrapper: &TokenWrapper, generation: u64) {
        let login = match wrapper.token.as_login() {
            Some(login) if login.renewable => login,
            _ => return,
        };

        let delay = self.trigger.next_delay(login);
        debug!(delay_secs = delay.as_secs(), "scheduling token renewal");

        let weak = Arc::downgrade(self);
        let task: ScheduledTask = Box::pin(async move {
            if let Some(inner) = weak.upgrade() {
                inner.renewal_due(generation).await;
            }
        });

        let handle = self.scheduler.schedule_once(delay, task);
        if let Some(previous) = self.schedule.lock().unwrap().replace(handle) {
            previous.cancel();
        }
    }

    /// Background renewal entry point. A revoke, drop, or replacement may
    /// have raced the timer, so the current state is re-checked first.
    async fn renewal_due(self: Arc<Self>, generation: u64) {
        let still_current = {
            let state = self.state.lock().unwrap();
            self.generation.load(Ordering::SeqCst) == generation
                && matches!(&*state, TokenState::Valid(w) if w.token.is_renewable())
        };
        if !still_current {
            debug!("stale renewal schedule, skipping");
            return;
        }

        // Rescheduling happens inside renew() on success.
        let _ = self.renew().await;
    }

    async fn renew(self: &Arc<Self>) -> RenewOutcome {
        let _guard = self.renew_lock.lock().await;

        let current = {
            let state = self.state.lock().unwrap();
            match &*state {
                TokenState::Valid(wrapper) => wrapper.clone(),
                _ => return RenewOutcome::terminal(),
            }
        };
        let login = match current.token.as_login() {
            Some(login) if login.renewable => login.clone(),
            _ => return RenewOutcome::terminal(),
        };

        self.events.publish(SessionEvent::BeforeRenewal);

        match self.submit_renew(&login.token).await {
            Ok(renewed) => {
                let threshold = self.trigger.valid_ttl_threshold(&renewed);
                if renewed.lease_duration <= threshold {
                    warn!(
                        lease_secs = renewed.lease_duration.as_secs(),
                        threshold_secs = threshold.as_secs(),
                        "renewed lease at or below threshold, dropping token"
                    );
                    self.drop_token();
                    self.events.publish(SessionEvent::TokenExpired);
                    RenewOutcome::terminal()
                } else {
                    let wrapper = TokenWrapper {
                        token: SessionToken::Login(renewed.clone()),
                        // The original revocability survives renewal.
                        revocable: current.revocable,
                    };
                    let generation = {
                        let mut state = self.state.lock().unwrap();
                        if matches!(&*state, TokenState::Terminated) {
                            return RenewOutcome::terminal();
                        }
                        *state = TokenState::Valid(wrapper.clone());
                        self.generation.fetch_add(1, Ordering::SeqCst) + 1
                    };
                    self.events.publish(SessionEvent::TokenRenewed {
                        lease_duration_secs: renewed.lease_duration.as_secs(),
                    });
                    self.schedule_renewal(&wrapper, generation);
                    RenewOutcome::renewed()
                }
            }
            Err(e) => {
                let terminal = (self.classifier)(&e);
                self.events.publish(SessionEvent::RenewalFailed {
                    terminal,
                    message: e.to_string(),
                });
                if terminal {
                    warn!(error = %e, "terminal renewal failure, dropping token");
                    self.drop_token();
                    RenewOutcome::terminal()
                } else {
                    debug!(error = %e, "retryable renewal failure, keeping token");
                    RenewOutcome::retryable()
                }
            }
        }
    }

    async fn submit_renew(&self, token: &VaultToken) -> VaultSessionResult<LoginToken> {
        let request = HttpRequest::post(api_url(&self.config.base_url, "auth/token/renew-self"))
            .with_token(token);

        let response = self.transport.send(request).await?;
        if !response.is_success() {
            return Err(create_error_from_response(response.status, &response.body));
        }

        let auth: AuthResponse = response.json()?;
        auth.auth.map(|section| section.into_login_token()).ok_or(
            VaultSessionError::Protocol(ProtocolError::MissingField {
                field: "auth".to_string(),
            }),
        )
    }

    fn drop_token(&self) {
        let mut state = self.state.lock().unwrap();
        if matches!(&*state, TokenState::Valid(_)) {
            *state = TokenState::Empty;
        }
        drop(state);

        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(handle) = self.schedule.lock().unwrap().take() {
            handle.cancel();
        }
    }

    /// Atomically read-and-clear the state, then best-effort revoke the
    /// previous token. Clearing happens unconditionally.
    async fn clear(self: &Arc<Self>, terminate: bool) {
        let wrapper = {
            let mut state = self.state.lock().unwrap();
            let next = if terminate {
                TokenState::Terminated
            } else {
                TokenState::Empty
            };
            match std::mem::replace(&mut *state, next) {
                TokenState::Valid(wrapper) => Some(wrapper),
                TokenState::Terminated => {
                    // Terminated is permanent, even for a plain revoke.
                    *state = TokenState::Terminated;
                    None
                }
                _ => None,
            }
        };

        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(handle) = self.schedule.lock().unwrap().take() {
            handle.cancel();
        }

        let Some(wrapper) = wrapper else { return };
        if !wrapper.revocable {
            return;
        }
        if terminate && !self.config.revoke_on_destroy {
            return;
        }

        self.events.publish(SessionEvent::BeforeRevocation);

        let revoke = self.submit_revoke(wrapper.token.token());
        match tokio::time::timeout(self.config.revocation_timeout, revoke).await {
            Ok(Ok(())) => {
                self.events.publish(SessionEvent::TokenRevoked);
            }
            Ok(Err(e)) => {
                warn!(error = %e, "token revocation failed");
                self.events.publish(SessionEvent::RevocationFailed {
                    message: e.to_string(),
                });
            }
            Err(_) => {
                let e = RevocationError::Timeout {
                    timeout: self.config.revocation_timeout,
                };
                warn!(error = %e, "token revocation timed out");
                self.events.publish(SessionEvent::RevocationFailed {
                    message: e.to_string(),
                });
            }
        }
    }

    async fn submit_revoke(&self, token: &VaultToken) -> VaultSessionResult<()> {
        let request = HttpRequest::post(api_url(&self.config.base_url, "auth/token/revoke-self"))
            .with_token(token);

        let response = self.transport.send(request).await?;
        if !response.is_success() {
            return Err(VaultSessionError::Revocation(RevocationError::Failed {
                message: create_error_from_response(response.status, &response.body).to_string(),
            }));
        }

        // Response body ignored.
        Ok(())
    }
}
