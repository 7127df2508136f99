//! Enumerable timer list.
//!
//! Every deferred action the engine takes is a [`ScheduledTask`]: a sleeping
//! tokio task that posts a [`TimerFired`] back onto the engine queue unless its
//! token is cancelled first.

use std::fmt;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration, Instant};
use tokio_util::sync::CancellationToken;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerKind {
    CookieRetry,
    UsernameWindow,
    Delivery,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimerFired {
    pub id: TaskId,
    pub kind: TimerKind,
}

#[derive(Debug)]
pub struct ScheduledTask {
    pub id: TaskId,
    pub kind: TimerKind,
    pub due: Instant,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Read-only view of a pending timer.
#[derive(Clone, Debug, Serialize)]
pub struct TaskInfo {
    pub id: TaskId,
    pub kind: TimerKind,
    pub remaining_ms: u64,
}

#[derive(Debug)]
pub struct TaskList {
    next_id: u64,
    tasks: Vec<ScheduledTask>,
    fired_tx: mpsc::UnboundedSender<TimerFired>,
}

impl TaskList {
    pub fn new(fired_tx: mpsc::UnboundedSender<TimerFired>) -> Self {
        Self {
            next_id: 0,
            tasks: Vec::new(),
            fired_tx,
        }
    }

    pub fn schedule(&mut self, kind: TimerKind, delay: Duration, cancel: CancellationToken) -> TaskId {
        self.next_id += 1;
        let id = TaskId(self.next_id);
        let tx = self.fired_tx.clone();
        let token = cancel.clone();
        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = sleep(delay) => {
                    let _ = tx.send(TimerFired { id, kind });
                }
            }
        });
        self.tasks.push(ScheduledTask {
            id,
            kind,
            due: Instant::now() + delay,
            cancel,
            handle,
        });
        id
    }

    /// Drop the record of a timer that has fired.
    ///
    /// Returns `false` if the timer was cancelled in the meantime, in which case
    /// the firing must be ignored.
    pub fn complete(&mut self, fired: TimerFired) -> bool {
        let Some(idx) = self.tasks.iter().position(|task| task.id == fired.id) else {
            return false;
        };
        let task = self.tasks.swap_remove(idx);
        !task.cancel.is_cancelled()
    }

    pub fn is_pending(&self, kind: TimerKind) -> bool {
        self.tasks
            .iter()
            .any(|task| task.kind == kind && !task.cancel.is_cancelled())
    }

    pub fn has_live(&self) -> bool {
        self.tasks.iter().any(|task| !task.cancel.is_cancelled())
    }

    pub fn live(&self) -> Vec<TaskInfo> {
        let now = Instant::now();
        self.tasks
            .iter()
            .filter(|task| !task.cancel.is_cancelled())
            .map(|task| TaskInfo {
                id: task.id,
                kind: task.kind,
                remaining_ms: task.due.saturating_duration_since(now).as_millis() as u64,
            })
            .collect()
    }

    /// Forget timers whose token has been cancelled (e.g. by the latch).
    pub fn prune_cancelled(&mut self) {
        self.tasks.retain(|task| !task.cancel.is_cancelled());
    }

    pub fn cancel_all(&mut self) {
        for task in self.tasks.drain(..) {
            task.cancel.cancel();
            task.handle.abort();
        }
    }
}

impl Drop for TaskList {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;

    #[tokio::test]
    async fn fired_timer_reports_back() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut list = TaskList::new(tx);
        let id = list.schedule(TimerKind::CookieRetry, Duration::from_millis(5), CancellationToken::new());
        assert_eq!(list.live().len(), 1);
        assert!(list.has_live());

        let fired = timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("timer fired")
            .unwrap();
        assert_eq!(fired.id, id);
        assert!(list.complete(fired));
        assert!(list.live().is_empty());
    }

    #[tokio::test]
    async fn cancelled_timer_never_fires() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut list = TaskList::new(tx);
        let token = CancellationToken::new();
        list.schedule(TimerKind::UsernameWindow, Duration::from_millis(5), token.child_token());
        token.cancel();
        assert!(!list.is_pending(TimerKind::UsernameWindow));
        assert!(!list.has_live());
        list.prune_cancelled();
        assert!(list.live().is_empty());
        assert!(timeout(Duration::from_millis(50), rx.recv()).await.is_err());
    }
}
