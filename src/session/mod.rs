//! Session Module
//!
//! Token lifecycle management: suppliers obtain tokens, the manager caches
//! and renews them, triggers decide renewal timing, and the blocking facade
//! adapts it all for synchronous callers.

pub mod blocking;
pub mod manager;
pub mod supplier;
pub mod trigger;

pub use blocking::BlockingSession;
pub use manager::{default_renewal_classifier, RenewalClassifier, SessionManager};
pub use supplier::{DirectLoginSupplier, FlowSupplier, StaticTokenSupplier, TokenSupplier};
pub use trigger::{DefaultRefreshTrigger, RefreshTrigger};
