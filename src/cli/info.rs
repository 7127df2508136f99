use anyhow::Result;
use serde::Serialize;

use super::output::emit;
use crate::cli::context::CliContext;

#[derive(Debug, Serialize)]
struct SystemInfo<'a> {
    version: &'static str,
    build_date: &'static str,
    git_hash: &'static str,
    config_path: String,
    login_url: &'a str,
    landing_path: &'a str,
    csrf_cookie: &'a str,
    username_wait_ms: u64,
    probe_retry_attempts: u32,
}

pub async fn cmd_info(ctx: &CliContext) -> Result<()> {
    let config = ctx.config();
    let info = SystemInfo {
        version: env!("CARGO_PKG_VERSION"),
        build_date: option_env!("BUILD_DATE").unwrap_or("unknown"),
        git_hash: option_env!("GIT_HASH").unwrap_or("unknown"),
        config_path: ctx.config_path().display().to_string(),
        login_url: &config.host.login_url,
        landing_path: &config.engine.landing_path,
        csrf_cookie: &config.engine.csrf_cookie,
        username_wait_ms: config.engine.username_wait_ms,
        probe_retry_attempts: config.probe.retry.max_attempts,
    };

    emit(ctx.output(), &info, |info| {
        println!("SessionCap System Information");
        println!("============================");
        println!("Version: {}", info.version);
        println!("Build Date: {}", info.build_date);
        println!("Git Commit: {}", info.git_hash);
        println!();
        println!("Configuration ({}):", info.config_path);
        println!("- Login URL: {}", info.login_url);
        println!("- Landing Path: {}", info.landing_path);
        println!("- Session Cookie: {}", info.csrf_cookie);
        println!("- Username Wait: {} ms", info.username_wait_ms);
        println!("- Probe Retry Attempts: {}", info.probe_retry_attempts);
    })
}
