use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use tokio::fs;
use tokio::time::sleep;
use tracing::debug;

use super::output::emit;
use super::session::{finish, print_report, start_session};
use crate::cli::context::CliContext;

#[derive(Args, Clone, Debug)]
pub struct ReplayArgs {
    /// File with one raw probe message per line (blank lines and `#` comments skipped)
    pub recording: PathBuf,

    /// Pause between messages
    #[arg(long, default_value_t = 0)]
    pub pace_ms: u64,

    /// Give up waiting for completion after this long
    #[arg(long, default_value_t = 30_000)]
    pub timeout_ms: u64,
}

pub async fn cmd_replay(args: ReplayArgs, ctx: &CliContext) -> Result<()> {
    let raw = fs::read_to_string(&args.recording)
        .await
        .with_context(|| format!("reading {}", args.recording.display()))?;
    let messages = recorded_messages(&raw);
    debug!(count = messages.len(), "replaying probe messages");

    let (session, endpoints, cache) = start_session(ctx.config()).into_parts();
    for message in messages {
        if endpoints.inbound.send(message.to_string()).await.is_err() {
            debug!("session stopped before the recording ended");
            break;
        }
        if args.pace_ms > 0 {
            sleep(Duration::from_millis(args.pace_ms)).await;
        }
    }
    // Closing the probe side lets the engine stop once its timers settle.
    drop(endpoints);

    let report = finish(session, cache, Duration::from_millis(args.timeout_ms)).await?;
    emit(ctx.output(), &report, print_report)
}

fn recorded_messages(raw: &str) -> Vec<&str> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .collect()
}
