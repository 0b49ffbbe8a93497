//! Completion handle returned by scheduled tasks.

use core::future::Future;
use core::pin::Pin;
use core::task::{Context, Poll};

use futures::channel::oneshot;

use super::{StatusResult, TaskOutcome};
use crate::engine::EngineStatus;

/// Resolves to the single [`TaskOutcome`] of a scheduled task.
///
/// Wait for it with [`wait`](Self::wait), poll it with
/// [`try_outcome`](Self::try_outcome), or `.await` it. Dropping the handle
/// does not cancel the task.
#[must_use = "dropping the handle discards the task's result"]
pub struct TaskHandle {
    receiver: oneshot::Receiver<TaskOutcome>,
    delivered: bool,
}

// The worker never drops a sender unsent unless it died; report that as UNKNOWN.
fn lost() -> StatusResult {
    log::error!("Task notification lost; worker stopped before delivering it");
    StatusResult::from_status(EngineStatus::Unknown)
}

impl TaskHandle {
    pub(crate) fn new(receiver: oneshot::Receiver<TaskOutcome>) -> Self {
        Self { receiver, delivered: false }
    }

    /// Blocks the calling thread until the outcome arrives.
    pub fn wait(self) -> TaskOutcome {
        futures::executor::block_on(self)
    }

    /// Returns the outcome if it has arrived. Yields `Some` at most once.
    pub fn try_outcome(&mut self) -> Option<TaskOutcome> {
        if self.delivered {
            return None;
        }
        let outcome = match self.receiver.try_recv() {
            Ok(Some(outcome)) => outcome,
            Ok(None) => return None,
            Err(oneshot::Canceled) => Err(lost()),
        };
        self.delivered = true;
        Some(outcome)
    }
}

impl Future for TaskHandle {
    type Output = TaskOutcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.delivered {
            return Poll::Ready(Err(lost()));
        }
        let polled = Pin::new(&mut self.receiver).poll(cx);
        polled.map(|received| {
            self.delivered = true;
            received.unwrap_or_else(|oneshot::Canceled| Err(lost()))
        })
    }
}
