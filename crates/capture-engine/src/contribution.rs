//! Community cache reporting interface.
//!
//! The engine only reports: one contribution after a successful capture that
//! resolved both the username and the user id. Storage and accounting belong
//! to the cache.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sessioncap_core_types::EngineId;
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributedIdentity {
    pub user_id: String,
    pub username: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IdentityObservation {
    pub engine: EngineId,
    pub observed_at: DateTime<Utc>,
    pub source: String,
}

impl IdentityObservation {
    pub fn login_capture(engine: EngineId) -> Self {
        Self {
            engine,
            observed_at: Utc::now(),
            source: "login_capture".to_string(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub contributions: u64,
    pub identities: u64,
}

#[derive(Clone, Debug, Error)]
pub enum CacheError {
    #[error("cache unavailable: {0}")]
    Unavailable(String),
    #[error("contribution rejected: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait CommunityCache: Send + Sync {
    async fn contribute(
        &self,
        identity: &ContributedIdentity,
        observation: &IdentityObservation,
    ) -> Result<(), CacheError>;

    /// Locally known counters.
    fn stats(&self) -> CacheStats;

    /// Counters as reported by the cache's backing service.
    async fn fetch_server_stats(&self) -> Result<CacheStats, CacheError>;
}

/// Process-local cache; the server view is the local view.
#[derive(Default)]
pub struct InMemoryCommunityCache {
    identities: Mutex<HashMap<String, String>>,
    contributions: AtomicU64,
}

impl InMemoryCommunityCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, user_id: &str) -> Option<String> {
        self.identities.lock().get(user_id).cloned()
    }
}

#[async_trait]
impl CommunityCache for InMemoryCommunityCache {
    async fn contribute(
        &self,
        identity: &ContributedIdentity,
        _observation: &IdentityObservation,
    ) -> Result<(), CacheError> {
        if identity.user_id.is_empty() || identity.username.is_empty() {
            return Err(CacheError::Rejected("incomplete identity".into()));
        }
        self.identities
            .lock()
            .insert(identity.user_id.clone(), identity.username.clone());
        self.contributions.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn stats(&self) -> CacheStats {
        CacheStats {
            contributions: self.contributions.load(Ordering::Relaxed),
            identities: self.identities.lock().len() as u64,
        }
    }

    async fn fetch_server_stats(&self) -> Result<CacheStats, CacheError> {
        Ok(self.stats())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_contributions() {
        let cache = InMemoryCommunityCache::new();
        let identity = ContributedIdentity {
            user_id: "42".into(),
            username: "alice".into(),
        };
        let observation = IdentityObservation::login_capture(EngineId::new());
        cache.contribute(&identity, &observation).await.unwrap();
        cache.contribute(&identity, &observation).await.unwrap();
        assert_eq!(cache.lookup("42").as_deref(), Some("alice"));
        let stats = cache.fetch_server_stats().await.unwrap();
        assert_eq!(stats.contributions, 2);
        assert_eq!(stats.identities, 1);
    }

    #[tokio::test]
    async fn rejects_incomplete_identity() {
        let cache = InMemoryCommunityCache::new();
        let identity = ContributedIdentity {
            user_id: String::new(),
            username: "alice".into(),
        };
        let observation = IdentityObservation::login_capture(EngineId::new());
        assert!(cache.contribute(&identity, &observation).await.is_err());
        assert_eq!(cache.stats(), CacheStats::default());
    }
}
