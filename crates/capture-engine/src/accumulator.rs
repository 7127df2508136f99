use serde::Serialize;
use sessioncap_core_types::SessionSignal;

/// Fields newly filled by one merge.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    pub username_set: bool,
    pub user_id_set: bool,
}

impl MergeOutcome {
    pub fn changed(self) -> bool {
        self.username_set || self.user_id_set
    }
}

/// Identity gathered across signals. First write wins.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct IdentityAccumulator {
    username: Option<String>,
    user_id: Option<String>,
}

impl IdentityAccumulator {
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn merge(&mut self, signal: &SessionSignal) -> MergeOutcome {
        MergeOutcome {
            username_set: fill(&mut self.username, signal.username.as_deref()),
            user_id_set: fill(&mut self.user_id, signal.user_id.as_deref()),
        }
    }

    /// Replace the username regardless of what was accumulated.
    ///
    /// Only the finalize path may call this.
    pub(crate) fn force_username(&mut self, username: String) {
        self.username = Some(username);
    }
}

fn fill(slot: &mut Option<String>, incoming: Option<&str>) -> bool {
    match (slot.as_ref(), incoming) {
        (None, Some(value)) if !value.is_empty() => {
            *slot = Some(value.to_string());
            true
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_absent_value_does_not_clobber() {
        let mut acc = IdentityAccumulator::default();
        let first = SessionSignal::new("https://x.com/home", "").with_username("alice");
        let second = SessionSignal::new("https://x.com/home", "");
        assert!(acc.merge(&first).username_set);
        assert!(!acc.merge(&second).changed());
        assert_eq!(acc.username(), Some("alice"));
    }

    #[test]
    fn later_different_value_does_not_clobber() {
        let mut acc = IdentityAccumulator::default();
        acc.merge(&SessionSignal::new("u", "").with_username("alice"));
        acc.merge(&SessionSignal::new("u", "").with_username("mallory").with_user_id("7"));
        assert_eq!(acc.username(), Some("alice"));
        assert_eq!(acc.user_id(), Some("7"));
    }

    #[test]
    fn forced_override_replaces() {
        let mut acc = IdentityAccumulator::default();
        acc.merge(&SessionSignal::new("u", "").with_username("alice"));
        acc.force_username("alice_real".into());
        assert_eq!(acc.username(), Some("alice_real"));
    }
}
