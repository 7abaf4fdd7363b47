//! # Scheduled Tasks
//!
//! Cancellable delayed events on the tokio runtime.
//!
//! A [`Scheduler`] spawns a sleep task that posts an event to the owner's
//! channel when the delay elapses. The returned [`ScheduledTask`] aborts the
//! sleep when cancelled or dropped. An event that was already queued before
//! cancellation still arrives, so events carry the identity the owner needs
//! to recognise them as stale.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Posts events to an owner after a delay.
#[derive(Debug)]
pub struct Scheduler<E> {
    tx: mpsc::UnboundedSender<E>,
}

impl<E> Clone for Scheduler<E> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<E: Send + 'static> Scheduler<E> {
    /// Creates a scheduler and the receiver its events arrive on.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<E>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Posts `event` after `delay`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule(&self, delay: Duration, event: E) -> ScheduledTask {
        let tx = self.tx.clone();
        let handle = tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            // The owner may be gone; nothing to do then.
            let _ = tx.send(event);
        });
        ScheduledTask { handle }
    }

    /// Posts `event` immediately.
    pub fn post(&self, event: E) {
        let _ = self.tx.send(event);
    }

    /// Sender half, for tasks that post their own completion.
    pub fn sender(&self) -> mpsc::UnboundedSender<E> {
        self.tx.clone()
    }
}

/// Handle to a pending delayed event. Cancelled on drop.
#[derive(Debug)]
pub struct ScheduledTask {
    handle: JoinHandle<()>,
}

impl ScheduledTask {
    pub fn cancel(self) {
        self.handle.abort();
    }

    /// Whether the event has not been posted yet.
    pub fn is_pending(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Holds at most one scheduled task; replacing it cancels the previous one.
#[derive(Debug, Default)]
pub struct TaskSlot {
    task: Option<ScheduledTask>,
}

impl TaskSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `task`, cancelling whatever was held before.
    pub fn replace(&mut self, task: ScheduledTask) {
        if let Some(previous) = self.task.replace(task) {
            previous.cancel();
        }
    }

    /// Cancels the held task. Returns whether one was still pending.
    pub fn cancel(&mut self) -> bool {
        match self.task.take() {
            Some(task) => {
                let pending = task.is_pending();
                task.cancel();
                pending
            }
            None => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.task.as_ref().is_some_and(ScheduledTask::is_pending)
    }
}
