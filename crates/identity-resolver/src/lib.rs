//! Identity inference for SessionCap.
//!
//! Turns a page snapshot into a best-effort username (ordered heuristic chain)
//! and a user id (cookie match). Nothing here returns an error: every miss is
//! simply `None`.

pub mod cookies;
pub mod flow_state;
pub mod handle;
pub mod heuristics;
pub mod model;

use serde::Serialize;

pub use cookies::{extract_csrf_token, extract_user_id, DEFAULT_CSRF_COOKIE};
pub use heuristics::{resolve_username, resolve_with, Heuristic, UsernameMatch, DEFAULT_CHAIN};
pub use model::{Landmark, LandmarkKind, PageLink, PageSnapshot, StorageEntry};

/// Identity signals read from one snapshot.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PageIdentity {
    pub username: Option<UsernameMatch>,
    pub user_id: Option<String>,
}

impl PageIdentity {
    pub fn username(&self) -> Option<&str> {
        self.username.as_ref().map(|found| found.username.as_str())
    }
}

pub fn inspect(snapshot: &PageSnapshot) -> PageIdentity {
    PageIdentity {
        username: resolve_username(snapshot),
        user_id: extract_user_id(&snapshot.cookies),
    }
}

/// Path component of a navigation URL, without a trailing slash (except root).
pub fn navigation_path(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let path = parsed.path();
    let trimmed = path.trim_end_matches('/');
    Some(if trimmed.is_empty() { "/" } else { trimmed }.to_string())
}
