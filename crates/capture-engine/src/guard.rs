//! Completion guard.
//!
//! Decides, signal by signal, whether enough is known to finish the capture.
//! The guard is synchronous: it returns [`GuardAction`]s and the engine loop
//! carries them out (timers, probe commands, delivery). The latch inside makes
//! finalization happen at most once however signals arrive.

use std::time::Duration;

use identity_resolver::{extract_csrf_token, navigation_path};
use serde::Serialize;
use sessioncap_core_types::{CompletionToken, SessionSignal};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::accumulator::{IdentityAccumulator, MergeOutcome};
use crate::config::EngineConfig;
use crate::latch::CompletionLatch;
use crate::EngineError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalizeReason {
    /// Cookie seen with a username already accumulated.
    UsernameKnown,
    /// Username arrived while the wait window was open.
    UsernameArrived,
    /// Wait window ran out; username left unresolved.
    WindowExpired,
    /// Host supplied the username itself.
    HostOverride,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardAction {
    ScheduleCookieRetry { delay: Duration },
    RequestRecheck,
    OpenUsernameWindow { timeout: Duration },
    Finalize {
        token: CompletionToken,
        reason: FinalizeReason,
    },
}

#[derive(Debug)]
pub struct CompletionGuard {
    landing_path: String,
    csrf_cookie: String,
    cookie_retry_delay: Duration,
    max_cookie_retries: u32,
    username_wait: Duration,
    accumulator: IdentityAccumulator,
    latch: CompletionLatch,
    csrf_token: Option<String>,
    cookie_retries_used: u32,
    cookie_retry_pending: bool,
    window_open: bool,
}

impl CompletionGuard {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            landing_path: config.landing_path.clone(),
            csrf_cookie: config.csrf_cookie.clone(),
            cookie_retry_delay: config.cookie_retry_delay(),
            max_cookie_retries: config.max_cookie_retries,
            username_wait: config.username_wait(),
            accumulator: IdentityAccumulator::default(),
            latch: CompletionLatch::new(),
            csrf_token: None,
            cookie_retries_used: 0,
            cookie_retry_pending: false,
            window_open: false,
        }
    }

    pub fn identity(&self) -> &IdentityAccumulator {
        &self.accumulator
    }

    pub fn is_finalized(&self) -> bool {
        self.latch.is_set()
    }

    pub fn timer_token(&self) -> CancellationToken {
        self.latch.timer_token()
    }

    /// Merge the signal and decide what to do next.
    pub fn on_signal(&mut self, signal: &SessionSignal) -> (MergeOutcome, Vec<GuardAction>) {
        let merged = self.accumulator.merge(signal);
        let mut actions = Vec::new();
        if self.latch.is_set() {
            return (merged, actions);
        }

        if merged.username_set && self.window_open && self.csrf_token.is_some() {
            actions.extend(self.finalize(FinalizeReason::UsernameArrived));
            return (merged, actions);
        }

        if navigation_path(&signal.navigation_url).as_deref() != Some(self.landing_path.as_str()) {
            return (merged, actions);
        }

        let Some(csrf) = extract_csrf_token(&signal.raw_cookies, &self.csrf_cookie) else {
            if !self.cookie_retry_pending && self.cookie_retries_used < self.max_cookie_retries {
                self.cookie_retries_used += 1;
                self.cookie_retry_pending = true;
                actions.push(GuardAction::ScheduleCookieRetry {
                    delay: self.cookie_retry_delay,
                });
            } else {
                debug!("session cookie missing on landing; waiting for a later signal");
            }
            return (merged, actions);
        };
        self.csrf_token = Some(csrf);

        if self.accumulator.username().is_some() {
            actions.extend(self.finalize(FinalizeReason::UsernameKnown));
        } else if !self.window_open {
            self.window_open = true;
            actions.push(GuardAction::OpenUsernameWindow {
                timeout: self.username_wait,
            });
        }
        (merged, actions)
    }

    /// The cookie retry delay elapsed: ask the probe for a fresh signal.
    pub fn on_cookie_retry_elapsed(&mut self) -> Vec<GuardAction> {
        self.cookie_retry_pending = false;
        if self.latch.is_set() {
            return Vec::new();
        }
        vec![GuardAction::RequestRecheck]
    }

    /// The username wait window elapsed: finish without a username.
    pub fn on_window_elapsed(&mut self) -> Vec<GuardAction> {
        self.window_open = false;
        if self.csrf_token.is_none() {
            return Vec::new();
        }
        self.finalize(FinalizeReason::WindowExpired)
            .into_iter()
            .collect()
    }

    /// Host-supplied username; overrides whatever was accumulated.
    pub fn complete_with_username(
        &mut self,
        username: String,
    ) -> Result<Vec<GuardAction>, EngineError> {
        if self.latch.is_set() {
            return Err(EngineError::AlreadyCompleted);
        }
        if self.csrf_token.is_none() {
            return Err(EngineError::SessionNotReady);
        }
        let username = username.trim().trim_start_matches('@').to_string();
        if username.is_empty() {
            return Err(EngineError::InvalidUsername);
        }
        self.accumulator.force_username(username);
        Ok(self
            .finalize(FinalizeReason::HostOverride)
            .into_iter()
            .collect())
    }

    fn finalize(&mut self, reason: FinalizeReason) -> Option<GuardAction> {
        let csrf = self.csrf_token.clone()?;
        if !self.latch.try_set() {
            return None;
        }
        self.window_open = false;
        self.cookie_retry_pending = false;
        let token = CompletionToken::new(csrf, self.accumulator.username().map(str::to_string));
        Some(GuardAction::Finalize { token, reason })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sessioncap_core_types::SESSION_MARKER;

    const HOME: &str = "https://x.com/home";

    fn guard() -> CompletionGuard {
        CompletionGuard::new(&EngineConfig::default())
    }

    fn finalized(actions: &[GuardAction]) -> Option<&CompletionToken> {
        actions.iter().find_map(|action| match action {
            GuardAction::Finalize { token, .. } => Some(token),
            _ => None,
        })
    }

    #[test]
    fn cookie_and_known_username_finalize_immediately() {
        let mut g = guard();
        g.on_signal(&SessionSignal::new("https://x.com/i/flow/login", "").with_username("alice"));
        let (_, actions) = g.on_signal(&SessionSignal::new(HOME, "ct0=tok"));
        let token = finalized(&actions).expect("finalized");
        assert_eq!(token.session_marker, SESSION_MARKER);
        assert_eq!(token.csrf_token, "tok");
        assert_eq!(token.username.as_deref(), Some("alice"));
    }

    #[test]
    fn replayed_qualifying_signal_finalizes_once() {
        let mut g = guard();
        let signal = SessionSignal::new(HOME, "ct0=tok").with_username("alice");
        let (_, first) = g.on_signal(&signal);
        let (_, second) = g.on_signal(&signal);
        assert!(finalized(&first).is_some());
        assert!(second.is_empty());
        assert!(g.on_window_elapsed().is_empty());
    }

    #[test]
    fn missing_cookie_schedules_exactly_one_retry() {
        let mut g = guard();
        let (_, first) = g.on_signal(&SessionSignal::new(HOME, "lang=en"));
        assert_eq!(
            first,
            vec![GuardAction::ScheduleCookieRetry {
                delay: Duration::from_millis(1_000)
            }]
        );
        let (_, while_pending) = g.on_signal(&SessionSignal::new(HOME, "lang=en"));
        assert!(while_pending.is_empty());

        assert_eq!(g.on_cookie_retry_elapsed(), vec![GuardAction::RequestRecheck]);
        let (_, after) = g.on_signal(&SessionSignal::new(HOME, "lang=en"));
        assert!(after.is_empty());

        let (_, late) = g.on_signal(&SessionSignal::new(HOME, "ct0=late").with_username("bob"));
        assert_eq!(finalized(&late).unwrap().csrf_token, "late");
    }

    #[test]
    fn window_then_late_username() {
        let mut g = guard();
        let (_, actions) = g.on_signal(&SessionSignal::new(HOME, "ct0=tok"));
        assert!(matches!(actions[..], [GuardAction::OpenUsernameWindow { .. }]));

        let (_, again) = g.on_signal(&SessionSignal::new(HOME, "ct0=tok"));
        assert!(again.is_empty());

        let (merged, late) =
            g.on_signal(&SessionSignal::new("https://x.com/carol", "").with_username("carol"));
        assert!(merged.username_set);
        assert_eq!(finalized(&late).unwrap().username.as_deref(), Some("carol"));
    }

    #[test]
    fn window_expiry_finalizes_without_username() {
        let mut g = guard();
        g.on_signal(&SessionSignal::new(HOME, "ct0=tok"));
        let actions = g.on_window_elapsed();
        let token = finalized(&actions).expect("finalized on expiry");
        assert_eq!(token.username, None);
        assert!(g.is_finalized());
    }

    #[test]
    fn non_landing_signals_never_finalize() {
        let mut g = guard();
        let (_, actions) = g.on_signal(
            &SessionSignal::new("https://x.com/i/flow/login", "ct0=tok").with_username("alice"),
        );
        assert!(actions.is_empty());
        assert!(!g.is_finalized());
    }

    #[test]
    fn host_override_requires_cookie_and_replaces_username() {
        let mut g = guard();
        assert!(matches!(
            g.complete_with_username("dave".into()),
            Err(EngineError::SessionNotReady)
        ));
        g.on_signal(&SessionSignal::new(HOME, "ct0=tok").with_user_id("1"));
        g.on_signal(&SessionSignal::new("https://x.com/x", "").with_username("wrong"));
        // window was open, so the username above already finalized
        assert!(g.is_finalized());
        assert!(matches!(
            g.complete_with_username("dave".into()),
            Err(EngineError::AlreadyCompleted)
        ));

        let mut g = guard();
        g.on_signal(&SessionSignal::new(HOME, "ct0=tok"));
        let actions = g.complete_with_username("@dave".into()).expect("override");
        assert_eq!(finalized(&actions).unwrap().username.as_deref(), Some("dave"));
    }
}
