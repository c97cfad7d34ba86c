//! Lifecycle Events
//!
//! Structured notifications emitted by the session manager. The core has no
//! dependency on any concrete notification transport; callers register
//! listeners on the [`EventDispatcher`].

use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, RwLock};
use tracing::debug;

/// Lifecycle notification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    /// A login produced a token.
    LoginSucceeded {
        /// Whether the obtained token is renewable.
        renewable: bool,
    },
    /// The token supplier failed; surfaced to the `get_token()` caller too.
    LoginFailed { message: String },
    /// A renewal attempt is about to be submitted.
    BeforeRenewal,
    /// A renewal succeeded and the stored token was replaced.
    TokenRenewed {
        /// New lease duration in seconds.
        lease_duration_secs: u64,
    },
    /// A renewal failed.
    RenewalFailed {
        /// Terminal failures drop the token; retryable ones keep it.
        terminal: bool,
        message: String,
    },
    /// The renewed lease fell at or below the valid-TTL threshold; the token
    /// was dropped without rescheduling.
    TokenExpired,
    /// A revocation call is about to be submitted.
    BeforeRevocation,
    /// The token was revoked.
    TokenRevoked,
    /// Revocation failed; absorbed, never raised to the caller.
    RevocationFailed { message: String },
    /// Self-lookup enrichment failed; the plain token was kept.
    LookupFailed { message: String },
}

/// Listener interface for lifecycle events.
pub trait EventListener: Send + Sync {
    /// Called for every published event.
    fn on_event(&self, event: &SessionEvent);
}

/// Multicast dispatcher pushing events to all registered listeners.
#[derive(Default)]
pub struct EventDispatcher {
    listeners: RwLock<Vec<Arc<dyn EventListener>>>,
}

impl EventDispatcher {
    /// Create new dispatcher with no listeners.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener.
    pub fn add_listener(&self, listener: Arc<dyn EventListener>) {
        self.listeners.write().unwrap().push(listener);
    }

    /// Publish an event to every listener.
    pub fn publish(&self, event: SessionEvent) {
        debug!(?event, "session event");
        let listeners = self.listeners.read().unwrap().clone();
        for listener in listeners {
            listener.on_event(&event);
        }
    }
}

/// Recorded event with its timestamp.
#[derive(Clone, Debug)]
pub struct EventRecord {
    /// When the event was observed.
    pub at: DateTime<Utc>,
    /// The event itself.
    pub event: SessionEvent,
}

/// In-memory listener for testing.
#[derive(Default)]
pub struct InMemoryEventListener {
    events: Mutex<Vec<EventRecord>>,
}

impl InMemoryEventListener {
    /// Create new in-memory listener.
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded events, in order.
    pub fn records(&self) -> Vec<EventRecord> {
        self.events.lock().unwrap().clone()
    }

    /// All recorded events without timestamps.
    pub fn events(&self) -> Vec<SessionEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.event.clone())
            .collect()
    }

    /// Whether an event matching the predicate was recorded.
    pub fn contains(&self, predicate: impl Fn(&SessionEvent) -> bool) -> bool {
        self.events.lock().unwrap().iter().any(|r| predicate(&r.event))
    }
}

impl EventListener for InMemoryEventListener {
    fn on_event(&self, event: &SessionEvent) {
        self.events.lock().unwrap().push(EventRecord {
            at: Utc::now(),
            event: event.clone(),
        });
    }
}

/// Listener that discards all events.
#[derive(Default)]
pub struct NoOpEventListener;

impl EventListener for NoOpEventListener {
    fn on_event(&self, _event: &SessionEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatcher_multicasts() {
        let dispatcher = EventDispatcher::new();
        let first = Arc::new(InMemoryEventListener::new());
        let second = Arc::new(InMemoryEventListener::new());
        dispatcher.add_listener(first.clone());
        dispatcher.add_listener(second.clone());

        dispatcher.publish(SessionEvent::TokenExpired);

        assert_eq!(first.events(), vec![SessionEvent::TokenExpired]);
        assert_eq!(second.events(), vec![SessionEvent::TokenExpired]);
    }

    #[test]
    fn test_dispatcher_without_listeners() {
        let dispatcher = EventDispatcher::new();
        dispatcher.publish(SessionEvent::BeforeRenewal);
    }

    #[test]
    fn test_in_memory_listener_predicate() {
        let listener = InMemoryEventListener::new();
        listener.on_event(&SessionEvent::RenewalFailed {
            terminal: true,
            message: "permission denied".to_string(),
        });

        assert!(listener.contains(|e| matches!(
            e,
            SessionEvent::RenewalFailed { terminal: true, .. }
        )));
        assert!(!listener.contains(|e| matches!(e, SessionEvent::TokenRevoked)));
    }
}
