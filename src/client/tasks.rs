//! Spawned work owned by the client loop
//!
//! Deferred timers and outbound requests run as tokio tasks whose results
//! are polled back into the loop, so their effects are applied in the same
//! turn as everything else. Dropping or aborting a set cancels every task.

use std::future::Future;
use std::time::Duration;

use tokio::task::{AbortHandle, JoinSet};
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::protocol::RoundId;
use crate::settlement::Verdict;

/// Tracked tasks producing values of type `T`
pub struct TaskSet<T> {
    name: &'static str,
    tasks: JoinSet<T>,
}

impl<T: Send + 'static> TaskSet<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            tasks: JoinSet::new(),
        }
    }

    pub fn spawn<F>(&mut self, task: F) -> AbortHandle
    where
        F: Future<Output = T> + Send + 'static,
    {
        self.tasks.spawn(task)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Next finished value; never resolves while the set is empty
    ///
    /// Cancel safe.
    pub async fn next(&mut self) -> T {
        loop {
            match self.tasks.join_next().await {
                Some(Ok(value)) => return value,
                Some(Err(error)) if error.is_cancelled() => {}
                Some(Err(error)) => warn!(set = self.name, error = %error, "task failed"),
                None => std::future::pending::<()>().await,
            }
        }
    }

    pub fn abort_all(&mut self) {
        if !self.tasks.is_empty() {
            debug!(set = self.name, count = self.tasks.len(), "aborting tasks");
        }
        self.tasks.abort_all();
    }
}

/// Deferred work scheduled by the client loop
#[derive(Debug, Clone, PartialEq)]
pub enum Timer {
    /// Show the outcome once the wheel has rested
    RevealResult {
        round_id: Option<RoundId>,
        winning_number: u8,
    },
    /// Play the provisional verdict
    DeliverVerdict { round_id: RoundId, verdict: Verdict },
    /// Fetch the authoritative balance
    RefreshBalance,
    /// Dismiss the transient notice
    ClearNotice,
}

pub type TimerSet = TaskSet<Timer>;

impl TaskSet<Timer> {
    /// Fire `timer` after `delay`
    pub fn schedule(&mut self, timer: Timer, delay: Duration) -> AbortHandle {
        debug!(?timer, ?delay, "timer scheduled");
        self.spawn(async move {
            sleep(delay).await;
            timer
        })
    }
}
