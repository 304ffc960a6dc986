use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tunables of the reconciler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileSettings {
    /// Two channels count as `Both` active when their accepted events are at
    /// most this far apart.
    pub freshness_window: Duration,
    /// Fail the session once every channel is degraded and their consecutive
    /// failures add up to this many. `None` never escalates.
    pub max_consecutive_failures: Option<u32>,
    pub push_reconnect: ReconnectPolicy,
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self {
            freshness_window: Duration::from_secs(5),
            max_consecutive_failures: Some(10),
            push_reconnect: ReconnectPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectPolicy {
    /// Reconnect attempts allowed per session; 0 disables reconnection.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl ReconnectPolicy {
    pub fn disabled() -> Self {
        Self {
            max_attempts: 0,
            ..Self::default()
        }
    }

    /// Backoff before the given 1-based attempt: doubles from `initial_delay`,
    /// capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        self.initial_delay
            .saturating_mul(1u32 << shift)
            .min(self.max_delay)
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
        }
    }
}
