use serde::{Deserialize, Serialize};

/// Everything the probe could read out of the page at one instant.
///
/// The probe fills in whatever it can reach; every collection may be empty and
/// heuristics must cope with partially-rendered pages.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PageSnapshot {
    pub url: String,
    /// Cookie header visible to page script (protected cookies are absent).
    pub cookies: String,
    pub landmarks: Vec<Landmark>,
    pub visible_text: String,
    pub links: Vec<PageLink>,
    pub local_storage: Vec<StorageEntry>,
}

impl PageSnapshot {
    pub fn at(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LandmarkKind {
    ProfileLink,
    AccountSwitcher,
}

/// Well-known navigation control carrying the signed-in account.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Landmark {
    pub kind: LandmarkKind,
    #[serde(default)]
    pub href: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PageLink {
    pub href: String,
    pub text: Option<String>,
    /// Link sits next to (or wraps) an avatar image.
    pub near_profile_image: bool,
    /// `data-testid` / `aria-label` values of enclosing elements.
    pub ancestor_labels: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageEntry {
    pub key: String,
    pub value: String,
}
