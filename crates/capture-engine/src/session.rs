use std::sync::Arc;

use probe_bridge::{
    command_channel, BridgeConfig, BridgeEvent, BridgeHandle, BridgeStats, ProbeBridge,
    ProbeCommandReceiver,
};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::contribution::CommunityCache;
use crate::engine::{CaptureEngine, EngineEvent, EngineHandle, EngineOutcome};
use crate::errors::EngineResult;
use crate::host::CompletionHandler;

/// The probe's side of a session: where to post raw payloads and where
/// re-check commands arrive.
pub struct ProbeEndpoints {
    pub inbound: mpsc::Sender<String>,
    pub commands: ProbeCommandReceiver,
}

/// A bridge and an engine wired together for one login attempt.
pub struct CaptureSession {
    bridge: Arc<ProbeBridge>,
    bridge_handle: BridgeHandle,
    engine: EngineHandle,
    events: Option<broadcast::Receiver<EngineEvent>>,
}

impl CaptureSession {
    pub fn start(
        engine_config: EngineConfig,
        bridge_config: BridgeConfig,
        handler: Arc<dyn CompletionHandler>,
        cache: Option<Arc<dyn CommunityCache>>,
    ) -> (Self, ProbeEndpoints) {
        let (inbound_tx, inbound_rx) = mpsc::channel(bridge_config.event_buffer.max(1));
        let (signal_tx, signal_rx) = mpsc::channel(engine_config.signal_buffer.max(1));
        let (command_tx, command_rx) = command_channel();

        let (bridge, _) = ProbeBridge::new(bridge_config);
        let bridge_handle = bridge.spawn_forwarder(inbound_rx, signal_tx);

        let mut engine = CaptureEngine::new(engine_config, handler).with_probe_commands(command_tx);
        if let Some(cache) = cache {
            engine = engine.with_cache(cache);
        }
        let events = engine.subscribe();
        let engine = engine.spawn(signal_rx);
        debug!(engine = %engine.id, "capture session started");

        (
            Self {
                bridge,
                bridge_handle,
                engine,
                events: Some(events),
            },
            ProbeEndpoints {
                inbound: inbound_tx,
                commands: command_rx,
            },
        )
    }

    pub fn engine(&self) -> &EngineHandle {
        &self.engine
    }

    /// Event stream starting from the engine's first transition. Only the
    /// first call gets it; later observers use [`EngineHandle::subscribe`].
    pub fn take_events(&mut self) -> Option<broadcast::Receiver<EngineEvent>> {
        self.events.take()
    }

    pub fn bridge_events(&self) -> broadcast::Receiver<BridgeEvent> {
        self.bridge.events.subscribe()
    }

    pub fn bridge_stats(&self) -> BridgeStats {
        self.bridge.stats()
    }

    /// Shared bridge; stays readable after the session is joined.
    pub fn bridge(&self) -> Arc<ProbeBridge> {
        Arc::clone(&self.bridge)
    }

    /// Wait for the engine to finish, then stop the bridge.
    pub async fn join(self) -> EngineResult<EngineOutcome> {
        let Self {
            engine,
            bridge_handle,
            ..
        } = self;
        let outcome = engine.join().await;
        if let Err(err) = bridge_handle.shutdown().await {
            warn!(%err, "bridge forwarder ended abnormally");
        }
        outcome
    }

    pub async fn shutdown(self) -> EngineResult<EngineOutcome> {
        let Self {
            engine,
            bridge_handle,
            ..
        } = self;
        let outcome = engine.shutdown().await;
        if let Err(err) = bridge_handle.shutdown().await {
            warn!(%err, "bridge forwarder ended abnormally");
        }
        outcome
    }
}
