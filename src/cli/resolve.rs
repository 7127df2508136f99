use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use identity_resolver::{inspect, PageSnapshot};
use serde::{Deserialize, Serialize};
use tokio::fs;

use super::output::emit;
use crate::cli::context::CliContext;

#[derive(Args, Clone, Debug)]
pub struct ResolveArgs {
    /// JSON page snapshot, or an array of snapshots
    pub snapshot: PathBuf,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SnapshotFile {
    Many(Vec<PageSnapshot>),
    One(Box<PageSnapshot>),
}

#[derive(Debug, Serialize)]
pub struct ResolvedPage {
    pub url: String,
    pub username: Option<String>,
    pub heuristic: Option<&'static str>,
    pub user_id: Option<String>,
}

pub async fn cmd_resolve(args: ResolveArgs, ctx: &CliContext) -> Result<()> {
    let raw = fs::read_to_string(&args.snapshot)
        .await
        .with_context(|| format!("reading {}", args.snapshot.display()))?;
    let pages = resolve_pages(&raw)
        .with_context(|| format!("parsing {}", args.snapshot.display()))?;

    emit(ctx.output(), &pages, |pages| {
        for page in pages {
            let url = if page.url.is_empty() { "(no url)" } else { page.url.as_str() };
            match (&page.username, page.heuristic) {
                (Some(username), Some(heuristic)) => {
                    println!("{url}: @{username} (via {heuristic})")
                }
                _ => println!("{url}: no username"),
            }
            if let Some(user_id) = &page.user_id {
                println!("  user id {user_id}");
            }
        }
    })
}

fn resolve_pages(raw: &str) -> Result<Vec<ResolvedPage>> {
    let snapshots = match serde_json::from_str::<SnapshotFile>(raw)? {
        SnapshotFile::Many(snapshots) => snapshots,
        SnapshotFile::One(snapshot) => vec![*snapshot],
    };
    Ok(snapshots
        .iter()
        .map(|snapshot| {
            let identity = inspect(snapshot);
            ResolvedPage {
                url: snapshot.url.clone(),
                username: identity.username().map(str::to_string),
                heuristic: identity.username.as_ref().map(|found| found.heuristic),
                user_id: identity.user_id,
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_and_array_inputs() {
        let one = resolve_pages(
            r#"{"url":"https://x.com/home","visible_text":"Hello @exampleuser welcome","cookies":"twid=u%3A123456789"}"#,
        )
        .unwrap();
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].username.as_deref(), Some("exampleuser"));
        assert_eq!(one[0].heuristic, Some("text_mention"));
        assert_eq!(one[0].user_id.as_deref(), Some("123456789"));

        let many = resolve_pages(r#"[{"url":"https://x.com/home","visible_text":"@home"},{}]"#)
            .unwrap();
        assert_eq!(many.len(), 2);
        assert!(many.iter().all(|page| page.username.is_none()));
    }
}
