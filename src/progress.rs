//! Progress reporting for long-running pipeline operations
//!
//! The collector and restore orchestrator only ever talk to a
//! [`ProgressSink`]. The CLI renders updates as an indicatif bar; a front end
//! on another thread can take them from a [`ChannelProgress`] receiver.

use crossbeam_channel::{unbounded, Receiver, Sender};

/// One human-readable progress step
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    pub completed: usize,
    pub total: usize,
    pub message: String,
}

pub trait ProgressSink: Send + Sync {
    fn report(&self, update: ProgressUpdate);
}

/// Discards all updates
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _update: ProgressUpdate) {}
}

/// Forwards updates over a crossbeam channel
pub struct ChannelProgress {
    tx: Sender<ProgressUpdate>,
}

impl ChannelProgress {
    pub fn new() -> (Self, Receiver<ProgressUpdate>) {
        let (tx, rx) = unbounded();
        (Self { tx }, rx)
    }
}

impl ProgressSink for ChannelProgress {
    fn report(&self, update: ProgressUpdate) {
        // A dropped receiver just means nobody is watching anymore
        let _ = self.tx.send(update);
    }
}
