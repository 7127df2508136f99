use std::sync::Arc;

use probe_bridge::ProbeCommandSender;
use serde::Serialize;
use sessioncap_core_types::{CaptureState, CompletionToken, EngineId, SessionSignal};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::contribution::{CommunityCache, ContributedIdentity, IdentityObservation};
use crate::errors::{EngineError, EngineResult};
use crate::guard::{CompletionGuard, FinalizeReason, GuardAction};
use crate::host::{deliver, CompletionHandler};
use crate::state::{CaptureStateMachine, Transition};
use crate::tasks::{TaskInfo, TaskList, TimerFired, TimerKind};

/// Observable engine activity.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    StateChanged(Transition),
    IdentityUpdated {
        username: Option<String>,
        user_id: Option<String>,
    },
    CookieRetryScheduled {
        delay_ms: u64,
    },
    RecheckRequested,
    WaitingForUsername {
        timeout_ms: u64,
    },
    Finalized {
        reason: FinalizeReason,
    },
    Delivered {
        token: CompletionToken,
    },
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct EngineStatus {
    pub state: CaptureState,
    pub username: Option<String>,
    pub user_id: Option<String>,
    pub signals: u64,
    pub finalized: bool,
    pub delivered: bool,
    pub pending_timers: Vec<TaskInfo>,
}

#[derive(Clone, Debug, Serialize)]
pub struct EngineOutcome {
    pub token: Option<CompletionToken>,
    pub reason: Option<FinalizeReason>,
    pub status: EngineStatus,
}

enum HostRequest {
    CompleteWithUsername {
        username: String,
        reply: oneshot::Sender<EngineResult<()>>,
    },
}

/// Capture engine, configured but not yet running.
pub struct CaptureEngine {
    id: EngineId,
    config: EngineConfig,
    handler: Arc<dyn CompletionHandler>,
    cache: Option<Arc<dyn CommunityCache>>,
    commands: Option<ProbeCommandSender>,
    events: broadcast::Sender<EngineEvent>,
}

impl CaptureEngine {
    pub fn new(config: EngineConfig, handler: Arc<dyn CompletionHandler>) -> Self {
        let (events, _) = broadcast::channel(config.event_buffer.max(1));
        Self {
            id: EngineId::new(),
            config,
            handler,
            cache: None,
            commands: None,
            events,
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn CommunityCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_probe_commands(mut self, commands: ProbeCommandSender) -> Self {
        self.commands = Some(commands);
        self
    }

    /// Subscribe before spawning to see every event, including the first
    /// state transition.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    pub fn spawn(self, signals: mpsc::Receiver<SessionSignal>) -> EngineHandle {
        let cancel = CancellationToken::new();
        let (status_tx, status_rx) = watch::channel(EngineStatus::default());
        let (request_tx, request_rx) = mpsc::channel(4);
        let (fired_tx, fired_rx) = mpsc::unbounded_channel();

        let id = self.id.clone();
        let events = self.events.clone();
        let runner = EngineLoop {
            machine: CaptureStateMachine::new(
                self.config.landing_path.clone(),
                self.config.patterns.clone(),
            ),
            guard: CompletionGuard::new(&self.config),
            tasks: TaskList::new(fired_tx),
            delivery_token: cancel.child_token(),
            id: self.id,
            config: self.config,
            handler: self.handler,
            cache: self.cache,
            commands: self.commands,
            events: self.events,
            status: status_tx,
            signals_seen: 0,
            pending_delivery: None,
            delivered: None,
        };
        let task = tokio::spawn(runner.run(signals, request_rx, fired_rx, cancel.clone()));

        EngineHandle {
            id,
            events,
            status: status_rx,
            requests: request_tx,
            cancel,
            task: Some(task),
        }
    }
}

struct EngineLoop {
    id: EngineId,
    config: EngineConfig,
    handler: Arc<dyn CompletionHandler>,
    cache: Option<Arc<dyn CommunityCache>>,
    commands: Option<ProbeCommandSender>,
    events: broadcast::Sender<EngineEvent>,
    status: watch::Sender<EngineStatus>,
    machine: CaptureStateMachine,
    guard: CompletionGuard,
    tasks: TaskList,
    delivery_token: CancellationToken,
    signals_seen: u64,
    pending_delivery: Option<(CompletionToken, FinalizeReason)>,
    delivered: Option<(CompletionToken, FinalizeReason)>,
}

impl EngineLoop {
    async fn run(
        mut self,
        mut signals: mpsc::Receiver<SessionSignal>,
        mut requests: mpsc::Receiver<HostRequest>,
        mut fired: mpsc::UnboundedReceiver<TimerFired>,
        cancel: CancellationToken,
    ) -> EngineOutcome {
        if let Some(transition) = self.machine.begin() {
            self.publish_transition(transition);
        }
        self.refresh_status();

        let mut signals_open = true;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                timer = fired.recv() => {
                    let Some(timer) = timer else { break };
                    if self.on_timer(timer).await {
                        break;
                    }
                }
                signal = signals.recv(), if signals_open => match signal {
                    Some(signal) => self.on_signal(signal),
                    None => {
                        debug!(engine = %self.id, "signal stream closed");
                        signals_open = false;
                    }
                },
                request = requests.recv() => {
                    if let Some(request) = request {
                        self.on_request(request);
                    }
                }
            }
            self.refresh_status();
            if !signals_open && !self.tasks.has_live() {
                debug!(engine = %self.id, "no signals and no pending timers; stopping");
                break;
            }
        }

        self.tasks.cancel_all();
        self.refresh_status();
        let (token, reason) = match self.delivered.take() {
            Some((token, reason)) => (Some(token), Some(reason)),
            None => (None, None),
        };
        EngineOutcome {
            token,
            reason,
            status: self.status.borrow().clone(),
        }
    }

    fn on_signal(&mut self, signal: SessionSignal) {
        self.signals_seen += 1;
        if let Some(transition) = self.machine.observe(&signal.navigation_url) {
            self.publish_transition(transition);
        }
        let (merged, actions) = self.guard.on_signal(&signal);
        if merged.changed() {
            let identity = self.guard.identity();
            let _ = self.events.send(EngineEvent::IdentityUpdated {
                username: identity.username().map(str::to_string),
                user_id: identity.user_id().map(str::to_string),
            });
        }
        self.apply(actions);
    }

    fn on_request(&mut self, request: HostRequest) {
        match request {
            HostRequest::CompleteWithUsername { username, reply } => {
                let result = match self.guard.complete_with_username(username) {
                    Ok(actions) => {
                        self.apply(actions);
                        Ok(())
                    }
                    Err(err) => {
                        debug!(engine = %self.id, %err, "host override rejected");
                        Err(err)
                    }
                };
                let _ = reply.send(result);
            }
        }
    }

    /// Returns `true` once the completion has been delivered.
    async fn on_timer(&mut self, timer: TimerFired) -> bool {
        if !self.tasks.complete(timer) {
            debug!(engine = %self.id, task = %timer.id, "ignoring cancelled timer");
            return false;
        }
        match timer.kind {
            TimerKind::CookieRetry => {
                let actions = self.guard.on_cookie_retry_elapsed();
                self.apply(actions);
                false
            }
            TimerKind::UsernameWindow => {
                let actions = self.guard.on_window_elapsed();
                self.apply(actions);
                false
            }
            TimerKind::Delivery => {
                let Some((token, reason)) = self.pending_delivery.take() else {
                    return false;
                };
                deliver(self.handler.as_ref(), &token);
                info!(
                    engine = %self.id,
                    ?reason,
                    username = ?token.username,
                    "capture completed"
                );
                let _ = self.events.send(EngineEvent::Delivered {
                    token: token.clone(),
                });
                self.contribute(&token).await;
                self.delivered = Some((token, reason));
                true
            }
        }
    }

    fn apply(&mut self, actions: Vec<GuardAction>) {
        for action in actions {
            match action {
                GuardAction::ScheduleCookieRetry { delay } => {
                    debug!(engine = %self.id, delay_ms = delay.as_millis() as u64, "session cookie missing; scheduling recheck");
                    self.tasks
                        .schedule(TimerKind::CookieRetry, delay, self.guard.timer_token());
                    let _ = self.events.send(EngineEvent::CookieRetryScheduled {
                        delay_ms: delay.as_millis() as u64,
                    });
                }
                GuardAction::RequestRecheck => {
                    match &self.commands {
                        Some(commands) => commands.recheck(),
                        None => debug!(engine = %self.id, "no probe command channel; recheck skipped"),
                    }
                    let _ = self.events.send(EngineEvent::RecheckRequested);
                }
                GuardAction::OpenUsernameWindow { timeout } => {
                    debug!(engine = %self.id, timeout_ms = timeout.as_millis() as u64, "waiting for username");
                    self.tasks
                        .schedule(TimerKind::UsernameWindow, timeout, self.guard.timer_token());
                    let _ = self.events.send(EngineEvent::WaitingForUsername {
                        timeout_ms: timeout.as_millis() as u64,
                    });
                }
                GuardAction::Finalize { token, reason } => {
                    info!(engine = %self.id, ?reason, "capture finalized");
                    self.tasks.prune_cancelled();
                    self.tasks.schedule(
                        TimerKind::Delivery,
                        self.config.completion_delay(),
                        self.delivery_token.child_token(),
                    );
                    self.pending_delivery = Some((token, reason));
                    let _ = self.events.send(EngineEvent::Finalized { reason });
                }
            }
        }
    }

    async fn contribute(&self, token: &CompletionToken) {
        let Some(cache) = &self.cache else { return };
        let (Some(username), Some(user_id)) = (token.username.clone(), self.guard.identity().user_id())
        else {
            debug!(engine = %self.id, "identity incomplete; skipping cache contribution");
            return;
        };
        let identity = ContributedIdentity {
            user_id: user_id.to_string(),
            username,
        };
        let observation = IdentityObservation::login_capture(self.id.clone());
        if let Err(err) = cache.contribute(&identity, &observation).await {
            warn!(engine = %self.id, %err, "community cache contribution failed");
        }
    }

    fn publish_transition(&self, transition: Transition) {
        info!(
            engine = %self.id,
            from = %transition.from,
            to = %transition.to,
            progress = transition.to.progress_text(),
            "capture state changed"
        );
        let _ = self.events.send(EngineEvent::StateChanged(transition));
    }

    fn refresh_status(&self) {
        let identity = self.guard.identity();
        let status = EngineStatus {
            state: self.machine.state(),
            username: identity.username().map(str::to_string),
            user_id: identity.user_id().map(str::to_string),
            signals: self.signals_seen,
            finalized: self.guard.is_finalized(),
            delivered: self.delivered.is_some(),
            pending_timers: self.tasks.live(),
        };
        self.status.send_replace(status);
    }
}

/// Control surface for a running engine.
pub struct EngineHandle {
    pub id: EngineId,
    events: broadcast::Sender<EngineEvent>,
    status: watch::Receiver<EngineStatus>,
    requests: mpsc::Sender<HostRequest>,
    cancel: CancellationToken,
    task: Option<JoinHandle<EngineOutcome>>,
}

impl EngineHandle {
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    pub fn status(&self) -> EngineStatus {
        self.status.borrow().clone()
    }

    pub fn watch_status(&self) -> watch::Receiver<EngineStatus> {
        self.status.clone()
    }

    /// Finish with a host-supplied username, overriding any inferred one.
    pub async fn complete_with_username(&self, username: impl Into<String>) -> EngineResult<()> {
        let (reply, rx) = oneshot::channel();
        self.requests
            .send(HostRequest::CompleteWithUsername {
                username: username.into(),
                reply,
            })
            .await
            .map_err(|_| EngineError::Stopped)?;
        rx.await.map_err(|_| EngineError::Stopped)?
    }

    /// Wait for the engine to stop on its own.
    ///
    /// Dropping the returned future before it resolves tears the engine down.
    pub async fn join(mut self) -> EngineResult<EngineOutcome> {
        let task = self.task.as_mut().ok_or(EngineError::Stopped)?;
        let outcome = task
            .await
            .map_err(|err| EngineError::Internal(err.to_string()));
        self.task = None;
        outcome
    }

    /// Tear the engine down now; pending timers are cancelled.
    pub async fn shutdown(self) -> EngineResult<EngineOutcome> {
        self.cancel.cancel();
        self.join().await
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            self.cancel.cancel();
            task.abort();
        }
    }
}
