//! Shared plumbing for commands that run a full capture session.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use capture_engine::{
    CacheStats, CaptureSession, CommunityCache, CompletionHandler, EngineStatus, FinalizeReason,
    InMemoryCommunityCache, ProbeEndpoints,
};
use probe_bridge::BridgeStats;
use serde::Serialize;
use sessioncap_core_types::{CaptureState, CompletionToken};
use tokio::time::timeout;
use tracing::{info, warn};

use crate::config::AppConfig;

#[derive(Debug, Serialize)]
pub struct SessionReport {
    pub completed: bool,
    pub token: Option<CompletionToken>,
    pub reason: Option<FinalizeReason>,
    pub state: CaptureState,
    pub user_id: Option<String>,
    pub signals: u64,
    pub bridge: BridgeStats,
    pub cache: CacheStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probe_emissions: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probe_failed_snapshots: Option<u64>,
}

pub struct RunningSession {
    pub session: CaptureSession,
    pub endpoints: ProbeEndpoints,
    cache: Arc<InMemoryCommunityCache>,
}

pub fn start_session(config: &AppConfig) -> RunningSession {
    let handler: Arc<dyn CompletionHandler> =
        Arc::new(|_marker: &str, csrf: &str, username: Option<&str>| {
            info!(csrf_len = csrf.len(), username = ?username, "host received session");
        });
    let cache = Arc::new(InMemoryCommunityCache::new());
    let shared: Arc<dyn CommunityCache> = cache.clone();
    let (session, endpoints) = CaptureSession::start(
        config.engine.clone(),
        config.bridge.clone(),
        handler,
        Some(shared),
    );
    RunningSession {
        session,
        endpoints,
        cache,
    }
}

/// Wait up to `limit` for the engine to stop and summarize what happened.
/// Running out of time is reported as an incomplete session, not an error.
pub async fn finish(
    session: CaptureSession,
    cache: Arc<InMemoryCommunityCache>,
    limit: Duration,
) -> Result<SessionReport> {
    let bridge = session.bridge();
    let status_rx = session.engine().watch_status();

    let (token, reason, status) = match timeout(limit, session.join()).await {
        Ok(outcome) => {
            let outcome = outcome?;
            (outcome.token, outcome.reason, outcome.status)
        }
        Err(_) => {
            warn!(limit_ms = limit.as_millis() as u64, "capture did not finish in time");
            let status: EngineStatus = status_rx.borrow().clone();
            (None, None, status)
        }
    };

    Ok(SessionReport {
        completed: token.is_some(),
        token,
        reason,
        state: status.state,
        user_id: status.user_id,
        signals: status.signals,
        bridge: bridge.stats(),
        cache: cache.stats(),
        probe_emissions: None,
        probe_failed_snapshots: None,
    })
}

impl RunningSession {
    pub fn into_parts(self) -> (CaptureSession, ProbeEndpoints, Arc<InMemoryCommunityCache>) {
        (self.session, self.endpoints, self.cache)
    }
}

pub fn print_report(report: &SessionReport) {
    match &report.token {
        Some(token) => {
            println!("Capture completed ({:?})", report.reason);
            println!("- Session marker: {}", token.session_marker);
            println!("- CSRF token: {}", token.csrf_token);
            println!(
                "- Username: {}",
                token.username.as_deref().unwrap_or("(unresolved)")
            );
        }
        None => println!("Capture not completed"),
    }
    println!("- State: {}", report.state);
    println!(
        "- User id: {}",
        report.user_id.as_deref().unwrap_or("(unknown)")
    );
    println!("- Signals processed: {}", report.signals);
    println!(
        "- Bridge: {} accepted, {} dropped",
        report.bridge.accepted, report.bridge.dropped
    );
    println!("- Cache contributions: {}", report.cache.contributions);
    if let Some(emitted) = report.probe_emissions {
        println!("- Probe emissions: {}", emitted);
    }
    if let Some(failed) = report.probe_failed_snapshots {
        println!("- Failed page snapshots: {}", failed);
    }
}
