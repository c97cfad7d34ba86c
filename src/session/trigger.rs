//! Refresh Trigger
//!
//! Policy computing when a renewal should be attempted for a token and the
//! minimum remaining time-to-live a renewal must yield to be worth keeping.
//! Pluggable to support backoff or service-specific renewal windows.

use std::time::Duration;

use crate::types::LoginToken;

/// Renewal scheduling policy.
pub trait RefreshTrigger: Send + Sync {
    /// Delay until the next renewal attempt for `token`.
    fn next_delay(&self, token: &LoginToken) -> Duration;

    /// Minimum acceptable lease duration after a successful renewal. A
    /// renewed lease at or below this threshold drops the token instead of
    /// rescheduling.
    fn valid_ttl_threshold(&self, token: &LoginToken) -> Duration;
}

/// Default trigger: renew `lead_time` before expiry, never sooner than one
/// second from now.
#[derive(Clone, Debug)]
pub struct DefaultRefreshTrigger {
    lead_time: Duration,
    margin: Duration,
}

impl DefaultRefreshTrigger {
    /// Create a trigger with the default 5s lead time and 2s safety margin.
    pub fn new() -> Self {
        Self {
            lead_time: Duration::from_secs(5),
            margin: Duration::from_secs(2),
        }
    }

    /// Set how long before expiry a renewal is attempted.
    pub fn with_lead_time(mut self, lead_time: Duration) -> Self {
        self.lead_time = lead_time;
        self
    }

    /// Set the safety margin added to the lead time for the valid-TTL
    /// threshold. Configurable independently of the lead time.
    pub fn with_margin(mut self, margin: Duration) -> Self {
        self.margin = margin;
        self
    }
}

impl Default for DefaultRefreshTrigger {
    fn default() -> Self {
        Self::new()
    }
}

impl RefreshTrigger for DefaultRefreshTrigger {
    fn next_delay(&self, token: &LoginToken) -> Duration {
        token
            .lease_duration
            .saturating_sub(self.lead_time)
            .max(Duration::from_secs(1))
    }

    fn valid_ttl_threshold(&self, _token: &LoginToken) -> Duration {
        self.lead_time + self.margin
    }
}
