//! Engine configuration.

use std::time::Duration;

use identity_resolver::DEFAULT_CSRF_COOKIE;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Path of the provider's signed-in landing page.
    pub landing_path: String,
    /// Script-visible session cookie captured as the CSRF-style token.
    pub csrf_cookie: String,
    /// Wait before asking the probe again when the cookie is missing.
    pub cookie_retry_delay_ms: u64,
    pub max_cookie_retries: u32,
    /// How long to hold finalization open for a late username.
    pub username_wait_ms: u64,
    /// Cosmetic pause between finalization and the host callback.
    pub completion_delay_ms: u64,
    pub event_buffer: usize,
    pub signal_buffer: usize,
    pub patterns: NavigationPatterns,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            landing_path: "/home".to_string(),
            csrf_cookie: DEFAULT_CSRF_COOKIE.to_string(),
            cookie_retry_delay_ms: 1_000,
            max_cookie_retries: 1,
            username_wait_ms: 5_000,
            completion_delay_ms: 500,
            event_buffer: 64,
            signal_buffer: 64,
            patterns: NavigationPatterns::default(),
        }
    }
}

impl EngineConfig {
    pub fn cookie_retry_delay(&self) -> Duration {
        Duration::from_millis(self.cookie_retry_delay_ms)
    }

    pub fn username_wait(&self) -> Duration {
        Duration::from_millis(self.username_wait_ms)
    }

    pub fn completion_delay(&self) -> Duration {
        Duration::from_millis(self.completion_delay_ms)
    }
}

/// Paths that map navigation targets onto progress states.
///
/// Credential-entry entries are exact paths and are checked first; verification
/// entries are prefixes. So `/i/flow/login` is credential entry, any other
/// `/i/flow/...` step is verification, and `/login/challenge` is verification.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationPatterns {
    pub credential_entry: Vec<String>,
    pub verification: Vec<String>,
}

impl Default for NavigationPatterns {
    fn default() -> Self {
        Self {
            credential_entry: ["/login", "/i/flow/login", "/i/flow/signup"]
                .into_iter()
                .map(String::from)
                .collect(),
            verification: [
                "/i/flow/",
                "/account/access",
                "/oauth",
                "/login/challenge",
                "/login/verify",
                "/i/oauth2",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}
