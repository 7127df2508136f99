use std::fmt;

use thiserror::Error;
use uuid::Uuid;

/// Placeholder handed to the host in place of the protected session cookie.
///
/// The real credential stays inside the browsing context's cookie jar; script
/// running in the page cannot read it, so neither can we.
pub const SESSION_MARKER: &str = "browser-context-session";

/// Shared error type for the capture crates.
#[derive(Debug, Error, Clone)]
pub enum SessionError {
    #[error("{message}")]
    Message { message: String },
}

impl SessionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }
}

#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct EngineId(pub String);

impl EngineId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for EngineId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EngineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One snapshot reported by the probe: where the page is, which cookies the
/// page can see, and whatever identity the probe managed to infer.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SessionSignal {
    pub navigation_url: String,
    pub raw_cookies: String,
    pub username: Option<String>,
    pub user_id: Option<String>,
}

impl SessionSignal {
    pub fn new(navigation_url: impl Into<String>, raw_cookies: impl Into<String>) -> Self {
        Self {
            navigation_url: navigation_url.into(),
            raw_cookies: raw_cookies.into(),
            username: None,
            user_id: None,
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}

/// Presentation-facing login progress.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-full", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum CaptureState {
    #[default]
    Idle,
    PageLoading,
    CredentialEntry,
    Verifying,
    Authenticated,
}

impl CaptureState {
    /// Progress line shown while the flow is running.
    pub fn progress_text(self) -> &'static str {
        match self {
            CaptureState::Idle => "Not signed in",
            CaptureState::PageLoading => "Loading sign-in page…",
            CaptureState::CredentialEntry => "Enter your credentials",
            CaptureState::Verifying => "Verifying…",
            CaptureState::Authenticated => "Signed in",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CaptureState::Idle => "idle",
            CaptureState::PageLoading => "page_loading",
            CaptureState::CredentialEntry => "credential_entry",
            CaptureState::Verifying => "verifying",
            CaptureState::Authenticated => "authenticated",
        }
    }
}

impl fmt::Display for CaptureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single artifact delivered to the host when capture finishes.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CompletionToken {
    pub session_marker: String,
    pub csrf_token: String,
    pub username: Option<String>,
}

impl CompletionToken {
    pub fn new(csrf_token: impl Into<String>, username: Option<String>) -> Self {
        Self {
            session_marker: SESSION_MARKER.to_string(),
            csrf_token: csrf_token.into(),
            username,
        }
    }
}

/// Commands the host may push back into the browsing context.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-full", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProbeCommand {
    /// Re-run extraction immediately and emit a fresh signal.
    Recheck,
}
