//! Host → probe command channel.
//!
//! Capacity is one: a re-check requested while another is still pending
//! coalesces into it, which is what makes the command idempotent.

use sessioncap_core_types::ProbeCommand;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::debug;

#[derive(Clone, Debug)]
pub struct ProbeCommandSender {
    tx: mpsc::Sender<ProbeCommand>,
}

#[derive(Debug)]
pub struct ProbeCommandReceiver {
    rx: mpsc::Receiver<ProbeCommand>,
}

pub fn command_channel() -> (ProbeCommandSender, ProbeCommandReceiver) {
    let (tx, rx) = mpsc::channel(1);
    (ProbeCommandSender { tx }, ProbeCommandReceiver { rx })
}

impl ProbeCommandSender {
    /// Fire-and-forget request for a fresh signal.
    pub fn recheck(&self) {
        match self.tx.try_send(ProbeCommand::Recheck) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => debug!("recheck already pending"),
            Err(TrySendError::Closed(_)) => debug!("probe gone; recheck ignored"),
        }
    }
}

impl ProbeCommandReceiver {
    pub async fn recv(&mut self) -> Option<ProbeCommand> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<ProbeCommand> {
        self.rx.try_recv().ok()
    }
}
