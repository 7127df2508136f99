use tokio_util::sync::CancellationToken;

/// One-shot finalization gate.
///
/// Tripping the latch also cancels its token, and every guard timer is
/// scheduled on a child of that token.
#[derive(Debug, Default)]
pub struct CompletionLatch {
    tripped: bool,
    token: CancellationToken,
}

impl CompletionLatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_set(&self) -> bool {
        self.tripped
    }

    /// Returns `true` exactly once.
    pub fn try_set(&mut self) -> bool {
        if self.tripped {
            return false;
        }
        self.tripped = true;
        self.token.cancel();
        true
    }

    /// Token for timers that must die with the latch.
    pub fn timer_token(&self) -> CancellationToken {
        self.token.child_token()
    }
}
