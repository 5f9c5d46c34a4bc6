use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};

/// Creates a shutdown trigger and the signal that observes it.
///
/// Nothing is ever sent over the underlying channel: dropping the trigger
/// disconnects it, and every clone of the signal sees that at once.
pub fn shutdown() -> (ShutdownTrigger, ShutdownSignal) {
    let (sender, receiver) = channel::bounded(0);
    (ShutdownTrigger(sender), ShutdownSignal(receiver))
}

#[derive(Debug)]
pub struct ShutdownTrigger(Sender<()>);

impl ShutdownTrigger {
    pub fn trigger(self) {
        drop(self.0);
    }
}

#[derive(Debug, Clone)]
pub struct ShutdownSignal(Receiver<()>);

impl ShutdownSignal {
    pub fn is_triggered(&self) -> bool {
        matches!(self.0.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// Sleeps for `timeout` or until shutdown is triggered, whichever comes
    /// first. Returns `true` if shutdown was triggered.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        matches!(
            self.0.recv_timeout(timeout),
            Err(RecvTimeoutError::Disconnected)
        )
    }
}
