//! Channel-backed [`Scheduler`] for hosts with a tick loop.
//!
//! The worker pushes tasks from its thread; the host calls
//! [`TickScheduler::run_pending`] once per tick on its world thread.

use crossbeam_channel::{unbounded, Receiver, Sender};

use super::traits::{Scheduler, Task};

/// Scheduler drained by the host's tick loop.
pub struct TickScheduler {
    sender: Sender<Task>,
    receiver: Receiver<Task>,
}

impl TickScheduler {
    /// Creates an empty scheduler.
    #[must_use]
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self { sender, receiver }
    }

    /// Runs every queued task on the calling thread. Returns how many ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        while let Ok(task) = self.receiver.try_recv() {
            task();
            ran += 1;
        }
        ran
    }

    /// Number of queued tasks.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }
}

impl Default for TickScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TickScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TickScheduler")
            .field("pending", &self.pending())
            .finish()
    }
}

impl Scheduler for TickScheduler {
    fn run_on_authoritative_thread(&self, task: Task) {
        // The receiver lives as long as `self`, so sending cannot fail.
        let _ = self.sender.send(task);
    }
}
