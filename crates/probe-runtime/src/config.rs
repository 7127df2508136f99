//! Emission policy knobs for the probe.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// How often the navigation URL is polled for changes.
    pub poll_interval_ms: u64,
    /// Heartbeat while parked on the landing page without a username.
    pub heartbeat_interval_ms: u64,
    /// Path of the provider's signed-in landing page.
    pub landing_path: String,
    pub retry: RetrySchedule,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 500,
            heartbeat_interval_ms: 3000,
            landing_path: "/home".to_string(),
            retry: RetrySchedule::default(),
        }
    }
}

impl ProbeConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms.max(1))
    }
}

/// Bounded, linearly growing retry schedule for late-rendering identity.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySchedule {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

impl Default for RetrySchedule {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            base_delay_ms: 500,
        }
    }
}

impl RetrySchedule {
    /// Delay before `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.base_delay_ms.saturating_mul(u64::from(attempt.max(1))))
    }
}
