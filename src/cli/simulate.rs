use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use probe_runtime::{Probe, ScriptStep, ScriptedPageSource};
use tokio::fs;
use tracing::{info, warn};

use super::output::emit;
use super::session::{finish, print_report, start_session};
use crate::cli::context::CliContext;

#[derive(Args, Clone, Debug)]
pub struct SimulateArgs {
    /// JSON timeline: `[{ "after_ms": 0, "page": { ... } }, ...]`
    pub script: PathBuf,

    /// Extra time allowed after the last step before giving up
    #[arg(long, default_value_t = 10_000)]
    pub grace_ms: u64,
}

pub async fn cmd_simulate(args: SimulateArgs, ctx: &CliContext) -> Result<()> {
    let raw = fs::read_to_string(&args.script)
        .await
        .with_context(|| format!("reading {}", args.script.display()))?;
    let steps: Vec<ScriptStep> = serde_json::from_str(&raw)
        .with_context(|| format!("parsing {}", args.script.display()))?;
    let source = ScriptedPageSource::new(steps)?;
    let limit = source.duration() + Duration::from_millis(args.grace_ms);
    info!(steps_ms = source.duration().as_millis() as u64, "starting simulated login");

    let config = ctx.config();
    let (session, endpoints, cache) = start_session(config).into_parts();
    let probe = Probe::new(Arc::new(source), config.probe.clone(), endpoints.inbound)
        .spawn(endpoints.commands);

    let mut report = finish(session, cache, limit).await?;
    report.probe_emissions = Some(probe.emitted());
    report.probe_failed_snapshots = Some(probe.failed_snapshots());
    if let Err(err) = probe.shutdown().await {
        warn!(%err, "probe ended abnormally");
    }

    emit(ctx.output(), &report, print_report)
}
