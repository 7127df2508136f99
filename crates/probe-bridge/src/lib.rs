//! Bridge between the sandboxed page probe and the capture engine.
//!
//! The probe runs in a context we do not control. Everything it sends is
//! treated as untrusted text: payloads that do not decode to a well-formed
//! `LOGIN_STATUS` message are counted, reported on the event bus and dropped.
//! Valid signals are forwarded strictly in arrival order.

pub mod command;
pub mod config;
pub mod wire;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sessioncap_core_types::SessionSignal;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub use command::{command_channel, ProbeCommandReceiver, ProbeCommandSender};
pub use config::BridgeConfig;

/// Why an inbound payload was discarded.
#[derive(Clone, Debug, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum DropReason {
    #[error("payload too large ({0} bytes)")]
    TooLarge(usize),
    #[error("invalid json: {0}")]
    InvalidJson(String),
    #[error("payload is not an object")]
    NotAnObject,
    #[error("unknown message type {0:?}")]
    UnknownType(String),
    #[error("invalid LOGIN_STATUS shape: {0}")]
    InvalidShape(String),
    #[error("empty navigation url")]
    EmptyUrl,
}

/// Errors surfaced by the bridge.
#[derive(Clone, Debug, Error)]
pub enum BridgeError {
    #[error("payload dropped: {0}")]
    Dropped(#[from] DropReason),
    #[error("channel closed")]
    ChannelClosed,
}

/// Events emitted by the bridge to observers.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum BridgeEvent {
    SignalAccepted { url: String },
    PayloadDropped { reason: DropReason },
}

pub type BridgeEventBus = broadcast::Sender<BridgeEvent>;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeStats {
    pub accepted: u64,
    pub dropped: u64,
}

pub struct ProbeBridge {
    pub events: BridgeEventBus,
    config: BridgeConfig,
    accepted: AtomicU64,
    dropped: AtomicU64,
}

impl ProbeBridge {
    pub fn new(config: BridgeConfig) -> (Arc<Self>, broadcast::Receiver<BridgeEvent>) {
        let (events, rx) = broadcast::channel(config.event_buffer.max(1));
        (
            Arc::new(Self {
                events,
                config,
                accepted: AtomicU64::new(0),
                dropped: AtomicU64::new(0),
            }),
            rx,
        )
    }

    /// Decode one raw payload. Never panics, whatever the input.
    pub fn ingest(&self, raw: &str) -> Result<SessionSignal, BridgeError> {
        match wire::decode(raw, self.config.max_payload_bytes) {
            Ok(signal) => {
                self.accepted.fetch_add(1, Ordering::Relaxed);
                let _ = self.events.send(BridgeEvent::SignalAccepted {
                    url: signal.navigation_url.clone(),
                });
                Ok(signal)
            }
            Err(reason) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                debug!(%reason, "dropping probe payload");
                let _ = self.events.send(BridgeEvent::PayloadDropped {
                    reason: reason.clone(),
                });
                Err(reason.into())
            }
        }
    }

    pub fn stats(&self) -> BridgeStats {
        BridgeStats {
            accepted: self.accepted.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }

    /// Spawn the forwarding loop: raw probe payloads in, normalized signals out.
    ///
    /// The loop ends when the inbound side closes, the outbound side closes, or
    /// the handle is shut down.
    pub fn spawn_forwarder(
        self: &Arc<Self>,
        mut inbound: mpsc::Receiver<String>,
        outbound: mpsc::Sender<SessionSignal>,
    ) -> BridgeHandle {
        let bridge = Arc::clone(self);
        let cancel = CancellationToken::new();
        let loop_token = cancel.clone();
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = loop_token.cancelled() => break,
                    raw = inbound.recv() => {
                        let Some(raw) = raw else { break };
                        let Ok(signal) = bridge.ingest(&raw) else { continue };
                        if outbound.send(signal).await.is_err() {
                            debug!("engine side closed; stopping bridge");
                            break;
                        }
                    }
                }
            }
        });
        BridgeHandle {
            cancel,
            task: Some(task),
        }
    }
}

/// Lifecycle handle for the forwarding loop.
pub struct BridgeHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl BridgeHandle {
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

impl Drop for BridgeHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
