use std::sync::Arc;

use async_trait::async_trait;
use identity_resolver::PageSnapshot;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::time::{Duration, Instant};

use crate::ProbeError;

/// Read access to the browsing context the probe lives in.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Cheap read of the current navigation target, used for polling.
    async fn current_url(&self) -> Result<String, ProbeError>;

    /// Full extraction pass over the page.
    async fn snapshot(&self) -> Result<PageSnapshot, ProbeError>;
}

/// Page that the caller mutates directly; handy for hosts that push DOM
/// snapshots in from elsewhere.
#[derive(Clone, Default)]
pub struct SharedPage {
    inner: Arc<Mutex<PageSnapshot>>,
}

impl SharedPage {
    pub fn new(initial: PageSnapshot) -> Self {
        Self {
            inner: Arc::new(Mutex::new(initial)),
        }
    }

    pub fn replace(&self, page: PageSnapshot) {
        *self.inner.lock() = page;
    }

    pub fn update(&self, f: impl FnOnce(&mut PageSnapshot)) {
        let mut guard = self.inner.lock();
        f(&mut *guard);
    }
}

#[async_trait]
impl PageSource for SharedPage {
    async fn current_url(&self) -> Result<String, ProbeError> {
        Ok(self.inner.lock().url.clone())
    }

    async fn snapshot(&self) -> Result<PageSnapshot, ProbeError> {
        Ok(self.inner.lock().clone())
    }
}

/// One step of a scripted page timeline.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScriptStep {
    /// Offset from the start of the script at which this page becomes current.
    pub after_ms: u64,
    pub page: PageSnapshot,
}

/// Replays a fixed timeline of page states against the wall clock.
pub struct ScriptedPageSource {
    steps: Vec<ScriptStep>,
    started: Instant,
}

impl ScriptedPageSource {
    pub fn new(mut steps: Vec<ScriptStep>) -> Result<Self, ProbeError> {
        if steps.is_empty() {
            return Err(ProbeError::Unavailable("empty page script".into()));
        }
        steps.sort_by_key(|step| step.after_ms);
        Ok(Self {
            steps,
            started: Instant::now(),
        })
    }

    /// Offset of the final step.
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.steps.last().map(|step| step.after_ms).unwrap_or(0))
    }

    fn current(&self) -> &PageSnapshot {
        let elapsed = self.started.elapsed().as_millis() as u64;
        let idx = self
            .steps
            .iter()
            .rposition(|step| step.after_ms <= elapsed)
            .unwrap_or(0);
        &self.steps[idx].page
    }
}

#[async_trait]
impl PageSource for ScriptedPageSource {
    async fn current_url(&self) -> Result<String, ProbeError> {
        Ok(self.current().url.clone())
    }

    async fn snapshot(&self) -> Result<PageSnapshot, ProbeError> {
        Ok(self.current().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn script_starts_on_first_step() {
        let source = ScriptedPageSource::new(vec![
            ScriptStep {
                after_ms: 10_000,
                page: PageSnapshot::at("https://x.com/home"),
            },
            ScriptStep {
                after_ms: 0,
                page: PageSnapshot::at("https://x.com/login"),
            },
        ])
        .expect("script");
        assert_eq!(source.current_url().await.unwrap(), "https://x.com/login");
        assert_eq!(source.duration(), Duration::from_millis(10_000));
    }

    #[test]
    fn empty_script_is_rejected() {
        assert!(ScriptedPageSource::new(Vec::new()).is_err());
    }

    #[tokio::test]
    async fn shared_page_reflects_updates() {
        let page = SharedPage::new(PageSnapshot::at("https://x.com/login"));
        page.update(|snapshot| snapshot.url = "https://x.com/home".into());
        assert_eq!(page.current_url().await.unwrap(), "https://x.com/home");
    }
}
