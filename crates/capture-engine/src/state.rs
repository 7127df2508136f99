use identity_resolver::navigation_path;
use serde::Serialize;
use sessioncap_core_types::CaptureState;

use crate::config::NavigationPatterns;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub from: CaptureState,
    pub to: CaptureState,
}

/// Progress tracker driven purely by navigation targets.
///
/// Informational only: finalization never looks at this state.
#[derive(Clone, Debug)]
pub struct CaptureStateMachine {
    state: CaptureState,
    landing_path: String,
    patterns: NavigationPatterns,
}

impl CaptureStateMachine {
    pub fn new(landing_path: impl Into<String>, patterns: NavigationPatterns) -> Self {
        Self {
            state: CaptureState::Idle,
            landing_path: landing_path.into(),
            patterns,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    /// Navigation to the provider has started.
    pub fn begin(&mut self) -> Option<Transition> {
        match self.state {
            CaptureState::Idle => self.move_to(CaptureState::PageLoading),
            _ => None,
        }
    }

    pub fn observe(&mut self, navigation_url: &str) -> Option<Transition> {
        let target = self.classify(navigation_url)?;
        self.move_to(target)
    }

    fn classify(&self, navigation_url: &str) -> Option<CaptureState> {
        let path = navigation_path(navigation_url)?;
        if self
            .patterns
            .credential_entry
            .iter()
            .any(|candidate| path == candidate.trim_end_matches('/'))
        {
            return Some(CaptureState::CredentialEntry);
        }
        if self
            .patterns
            .verification
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
        {
            return Some(CaptureState::Verifying);
        }
        if path == self.landing_path {
            return Some(CaptureState::Authenticated);
        }
        None
    }

    fn move_to(&mut self, target: CaptureState) -> Option<Transition> {
        if self.state == target {
            return None;
        }
        let transition = Transition {
            from: self.state,
            to: target,
        };
        self.state = target;
        Some(transition)
    }
}
