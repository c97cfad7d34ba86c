//! Blocking Facade
//!
//! Synchronous wrapper over [`SessionManager`] for callers outside an async
//! context. Each call blocks the current thread on the supplied runtime
//! handle; never call these from inside that runtime.

use tokio::runtime::Handle;

use crate::core::transport::HttpTransport;
use crate::error::VaultSessionResult;
use crate::session::manager::SessionManager;
use crate::types::{RenewOutcome, VaultToken};

/// Blocking view of a session manager.
pub struct BlockingSession<T: HttpTransport> {
    manager: SessionManager<T>,
    handle: Handle,
}

impl<T: HttpTransport + 'static> BlockingSession<T> {
    /// Wrap a manager, driving its futures on `handle`.
    pub fn new(manager: SessionManager<T>, handle: Handle) -> Self {
        Self { manager, handle }
    }

    /// Blocking [`SessionManager::get_token`].
    pub fn get_token(&self) -> VaultSessionResult<VaultToken> {
        self.handle.block_on(self.manager.get_token())
    }

    /// Blocking [`SessionManager::renew`].
    pub fn renew(&self) -> RenewOutcome {
        self.handle.block_on(self.manager.renew())
    }

    /// Blocking [`SessionManager::revoke`].
    pub fn revoke(&self) {
        self.handle.block_on(self.manager.revoke());
    }

    /// Blocking [`SessionManager::destroy`].
    pub fn destroy(&self) {
        self.handle.block_on(self.manager.destroy());
    }

    /// The wrapped async manager.
    pub fn manager(&self) -> &SessionManager<T> {
        &self.manager
    }
}
