//! Ordered username heuristics.
//!
//! Each heuristic is a pure function over a [`PageSnapshot`]. The chain is
//! tried in order and the first match wins; a heuristic that panics on odd
//! page shapes counts as a miss.

use std::panic::{self, AssertUnwindSafe};

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::flow_state::handle_from_flow_state;
use crate::handle::{first_mention, handle_from_href, normalize_handle};
use crate::model::{LandmarkKind, PageSnapshot};

pub type HeuristicFn = fn(&PageSnapshot) -> Option<String>;

#[derive(Clone, Copy)]
pub struct Heuristic {
    pub name: &'static str,
    pub run: HeuristicFn,
}

impl Heuristic {
    pub const fn new(name: &'static str, run: HeuristicFn) -> Self {
        Self { name, run }
    }

    /// Run the heuristic; any panic is swallowed and reported as no match.
    pub fn attempt(&self, snapshot: &PageSnapshot) -> Option<String> {
        match panic::catch_unwind(AssertUnwindSafe(|| (self.run)(snapshot))) {
            Ok(result) => result,
            Err(_) => {
                debug!(heuristic = self.name, "heuristic panicked; treating as no match");
                None
            }
        }
    }
}

pub const DEFAULT_CHAIN: &[Heuristic] = &[
    Heuristic::new("flow_state", from_flow_state),
    Heuristic::new("landmarks", from_landmarks),
    Heuristic::new("text_mention", from_text_mention),
    Heuristic::new("profile_links", from_profile_links),
    Heuristic::new("local_storage", from_local_storage),
];

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UsernameMatch {
    pub username: String,
    pub heuristic: &'static str,
}

/// Walk `chain` in order and return the first match.
pub fn resolve_with(chain: &[Heuristic], snapshot: &PageSnapshot) -> Option<UsernameMatch> {
    for heuristic in chain {
        if let Some(username) = heuristic.attempt(snapshot) {
            return Some(UsernameMatch {
                username,
                heuristic: heuristic.name,
            });
        }
        debug!(heuristic = heuristic.name, "no username match");
    }
    None
}

pub fn resolve_username(snapshot: &PageSnapshot) -> Option<UsernameMatch> {
    resolve_with(DEFAULT_CHAIN, snapshot)
}

pub fn from_flow_state(snapshot: &PageSnapshot) -> Option<String> {
    handle_from_flow_state(&snapshot.url)
}

pub fn from_landmarks(snapshot: &PageSnapshot) -> Option<String> {
    let ordered = [LandmarkKind::ProfileLink, LandmarkKind::AccountSwitcher];
    ordered.iter().find_map(|kind| {
        snapshot
            .landmarks
            .iter()
            .filter(|landmark| landmark.kind == *kind)
            .find_map(|landmark| {
                landmark
                    .href
                    .as_deref()
                    .and_then(handle_from_href)
                    .or_else(|| landmark.text.as_deref().and_then(first_mention))
            })
    })
}

pub fn from_text_mention(snapshot: &PageSnapshot) -> Option<String> {
    first_mention(&snapshot.visible_text)
}

const PROFILE_CONTEXT_HINTS: &[&str] = &["profile", "account", "user"];

pub fn from_profile_links(snapshot: &PageSnapshot) -> Option<String> {
    snapshot
        .links
        .iter()
        .filter(|link| link.href.starts_with('/') && !link.href.starts_with("//"))
        .filter(|link| {
            link.near_profile_image
                || link.ancestor_labels.iter().any(|label| {
                    let label = label.to_ascii_lowercase();
                    PROFILE_CONTEXT_HINTS.iter().any(|hint| label.contains(hint))
                })
        })
        .find_map(|link| handle_from_href(&link.href))
}

pub fn from_local_storage(snapshot: &PageSnapshot) -> Option<String> {
    snapshot
        .local_storage
        .iter()
        .filter(|entry| {
            let key = entry.key.to_ascii_lowercase();
            key.contains("user") || key.contains("account")
        })
        .filter_map(|entry| serde_json::from_str::<Value>(&entry.value).ok())
        .find_map(|value| find_screen_name(&value))
}

fn find_screen_name(value: &Value) -> Option<String> {
    match value {
        Value::Object(map) => map
            .get("screen_name")
            .and_then(Value::as_str)
            .and_then(normalize_handle)
            .or_else(|| map.values().find_map(find_screen_name)),
        Value::Array(items) => items.iter().find_map(find_screen_name),
        _ => None,
    }
}
