//! Page probe.
//!
//! Runs next to the sandboxed browsing context, extracts identity hints from
//! page snapshots and emits `LOGIN_STATUS` wire messages. It emits on start,
//! whenever the polled navigation URL changes, on host re-check requests, and
//! on a bounded retry/heartbeat schedule while the landing page has not yet
//! revealed a username. A failed extraction skips one emission and nothing
//! more.

pub mod config;
pub mod source;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use identity_resolver::{inspect, navigation_path};
use probe_bridge::{wire, ProbeCommandReceiver};
use sessioncap_core_types::{ProbeCommand, SessionSignal};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub use config::{ProbeConfig, RetrySchedule};
pub use source::{PageSource, ScriptStep, ScriptedPageSource, SharedPage};

#[derive(Clone, Debug, Error)]
pub enum ProbeError {
    #[error("page unavailable: {0}")]
    Unavailable(String),
    #[error("outbound channel closed")]
    ChannelClosed,
}

/// Why an emission happened; recorded for logs and stats.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EmitTrigger {
    Initial,
    Navigation,
    Recheck,
    Retry,
    Heartbeat,
}

impl EmitTrigger {
    fn as_str(self) -> &'static str {
        match self {
            EmitTrigger::Initial => "initial",
            EmitTrigger::Navigation => "navigation",
            EmitTrigger::Recheck => "recheck",
            EmitTrigger::Retry => "retry",
            EmitTrigger::Heartbeat => "heartbeat",
        }
    }
}

#[derive(Debug, Default)]
struct RetryState {
    attempts: u32,
    next_at: Option<Instant>,
    exhausted: bool,
}

impl RetryState {
    fn after_emit(&mut self, on_landing: bool, has_username: bool, schedule: &RetrySchedule) {
        if !on_landing || has_username {
            *self = RetryState::default();
            return;
        }
        if self.exhausted || self.next_at.is_some() {
            return;
        }
        if self.attempts >= schedule.max_attempts {
            self.exhausted = true;
            return;
        }
        self.attempts += 1;
        self.next_at = Some(Instant::now() + schedule.delay_for(self.attempts));
    }

    /// Heartbeats only run while a retry is still outstanding.
    fn waiting(&self) -> bool {
        !self.exhausted && self.next_at.is_some()
    }
}

#[derive(Default)]
struct ProbeCounters {
    emitted: AtomicU64,
    failed: AtomicU64,
}

pub struct Probe<S: PageSource + 'static> {
    source: Arc<S>,
    config: ProbeConfig,
    outbound: mpsc::Sender<String>,
    counters: Arc<ProbeCounters>,
    last_url: Option<String>,
    retry: RetryState,
}

impl<S: PageSource + 'static> Probe<S> {
    pub fn new(source: Arc<S>, config: ProbeConfig, outbound: mpsc::Sender<String>) -> Self {
        Self {
            source,
            config,
            outbound,
            counters: Arc::new(ProbeCounters::default()),
            last_url: None,
            retry: RetryState::default(),
        }
    }

    /// Extract once and put a wire message on the outbound channel.
    async fn emit(&mut self, trigger: EmitTrigger) -> Result<(), ProbeError> {
        let snapshot = match self.source.snapshot().await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                warn!(trigger = trigger.as_str(), %err, "page snapshot failed; skipping emission");
                return Ok(());
            }
        };
        let identity = inspect(&snapshot);
        let on_landing =
            navigation_path(&snapshot.url).as_deref() == Some(self.config.landing_path.as_str());
        let has_username = identity.username.is_some();

        let signal = SessionSignal {
            navigation_url: snapshot.url.clone(),
            raw_cookies: snapshot.cookies.clone(),
            username: identity.username().map(str::to_string),
            user_id: identity.user_id.clone(),
        };
        debug!(
            trigger = trigger.as_str(),
            url = %signal.navigation_url,
            username = ?signal.username,
            heuristic = ?identity.username.as_ref().map(|found| found.heuristic),
            "probe emitting signal"
        );
        self.last_url = Some(snapshot.url);
        self.outbound
            .send(wire::encode(&signal))
            .await
            .map_err(|_| ProbeError::ChannelClosed)?;
        self.counters.emitted.fetch_add(1, Ordering::Relaxed);
        self.retry
            .after_emit(on_landing, has_username, &self.config.retry);
        Ok(())
    }

    async fn poll_navigation(&mut self) -> Result<(), ProbeError> {
        match self.source.current_url().await {
            Ok(url) if self.last_url.as_deref() != Some(url.as_str()) => {
                self.emit(EmitTrigger::Navigation).await
            }
            Ok(_) => Ok(()),
            Err(err) => {
                debug!(%err, "navigation poll failed");
                Ok(())
            }
        }
    }

    /// Run the probe loop on the current runtime.
    pub fn spawn(mut self, mut commands: ProbeCommandReceiver) -> ProbeHandle {
        let cancel = CancellationToken::new();
        let loop_token = cancel.clone();
        let counters = Arc::clone(&self.counters);
        let task = tokio::spawn(async move {
            let poll_every = self.config.poll_interval();
            let heartbeat_every = self.config.heartbeat_interval();
            let mut poll = interval_at(Instant::now() + poll_every, poll_every);
            poll.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut heartbeat = interval_at(Instant::now() + heartbeat_every, heartbeat_every);
            heartbeat.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut commands_open = true;

            let mut outcome = self.emit(EmitTrigger::Initial).await;
            while outcome.is_ok() {
                let retry_at = self.retry.next_at;
                let waiting = self.retry.waiting();
                outcome = tokio::select! {
                    _ = loop_token.cancelled() => break,
                    _ = poll.tick() => self.poll_navigation().await,
                    command = commands.recv(), if commands_open => match command {
                        Some(ProbeCommand::Recheck) => self.emit(EmitTrigger::Recheck).await,
                        None => {
                            commands_open = false;
                            Ok(())
                        }
                    },
                    _ = sleep_until(retry_at.unwrap_or_else(Instant::now)), if retry_at.is_some() => {
                        self.retry.next_at = None;
                        self.emit(EmitTrigger::Retry).await
                    }
                    _ = heartbeat.tick(), if waiting => self.emit(EmitTrigger::Heartbeat).await,
                };
            }
            if let Err(err) = outcome {
                debug!(%err, "probe loop stopped");
            }
        });
        ProbeHandle {
            cancel,
            task: Some(task),
            counters,
        }
    }
}

/// Lifecycle handle for a running probe.
pub struct ProbeHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
    counters: Arc<ProbeCounters>,
}

impl ProbeHandle {
    pub fn emitted(&self) -> u64 {
        self.counters.emitted.load(Ordering::Relaxed)
    }

    pub fn failed_snapshots(&self) -> u64 {
        self.counters.failed.load(Ordering::Relaxed)
    }

    pub async fn shutdown(mut self) -> Result<(), tokio::task::JoinError> {
        self.cancel.cancel();
        match self.task.take() {
            Some(task) => match task.await {
                Ok(()) => Ok(()),
                Err(err) if err.is_cancelled() => Ok(()),
                Err(err) => Err(err),
            },
            None => Ok(()),
        }
    }
}

impl Drop for ProbeHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_state_caps_attempts_then_stops_heartbeat() {
        let schedule = RetrySchedule {
            max_attempts: 2,
            base_delay_ms: 10,
        };
        let mut state = RetryState::default();
        state.after_emit(true, false, &schedule);
        assert_eq!(state.attempts, 1);
        assert!(state.waiting());

        state.next_at = None;
        state.after_emit(true, false, &schedule);
        assert_eq!(state.attempts, 2);

        state.next_at = None;
        state.after_emit(true, false, &schedule);
        assert!(state.exhausted);
        assert!(!state.waiting());
    }

    #[test]
    fn username_or_leaving_landing_resets_retries() {
        let schedule = RetrySchedule::default();
        let mut state = RetryState::default();
        state.after_emit(true, false, &schedule);
        state.after_emit(true, true, &schedule);
        assert_eq!(state.attempts, 0);
        assert!(!state.waiting());

        state.after_emit(true, false, &schedule);
        state.after_emit(false, false, &schedule);
        assert!(state.next_at.is_none());
    }

    #[test]
    fn heartbeat_emission_does_not_consume_attempts() {
        let schedule = RetrySchedule::default();
        let mut state = RetryState::default();
        state.after_emit(true, false, &schedule);
        state.after_emit(true, false, &schedule);
        state.after_emit(true, false, &schedule);
        assert_eq!(state.attempts, 1);
    }
}
