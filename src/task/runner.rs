//! Background task runner.
//!
//! A single named worker thread drains an mpsc queue. Jobs run strictly one at
//! a time in submission order, so two tasks scheduled by one session can never
//! touch its engine concurrently; a second request queues behind the first.

use core::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::thread::{self, JoinHandle, ThreadId};

use futures::channel::oneshot;

use super::{deliver, Callback, Completion, Task, TaskHandle, TaskOutcome};
use crate::engine::PrngEngine;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Errors raised when handing work to the runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunnerError {
    /// The worker thread could not be started.
    Spawn(String),
    /// The worker is gone; nothing can be scheduled any more.
    Stopped,
}

impl fmt::Display for RunnerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunnerError::Spawn(e) => write!(f, "Failed to start worker thread: {}", e),
            RunnerError::Stopped => write!(f, "Worker thread has stopped"),
        }
    }
}

impl std::error::Error for RunnerError {}

/// Executes tasks on a dedicated worker thread.
pub struct TaskRunner {
    queue: Option<mpsc::Sender<Job>>,
    worker: Option<JoinHandle<()>>,
    worker_id: ThreadId,
}

impl TaskRunner {
    /// Starts the worker thread.
    pub fn spawn(name: &str) -> Result<Self, RunnerError> {
        let (queue, jobs) = mpsc::channel::<Job>();
        let worker = thread::Builder::new()
            .name(name.to_owned())
            .spawn(move || {
                log::debug!("Task worker started");
                for job in jobs {
                    // Jobs already turn task panics into notifications; this
                    // only guards against a panicking callback.
                    if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                        log::error!("Task completion callback panicked");
                    }
                }
                log::debug!("Task worker stopped");
            })
            .map_err(|e| RunnerError::Spawn(e.to_string()))?;

        let worker_id = worker.thread().id();
        Ok(Self { queue: Some(queue), worker: Some(worker), worker_id })
    }

    fn submit(&self, job: Job) -> Result<(), RunnerError> {
        let queue = self.queue.as_ref().ok_or(RunnerError::Stopped)?;
        queue.send(job).map_err(|_| RunnerError::Stopped)
    }

    fn on_worker(&self) -> bool {
        thread::current().id() == self.worker_id
    }

    /// Queues `task`; once it has executed, exactly one of
    /// `completion.on_success` / `completion.on_failure` runs on the worker.
    pub fn dispatch<E, C>(&self, mut task: Task<E>, completion: C) -> Result<(), RunnerError>
    where
        E: PrngEngine + 'static,
        C: Completion,
    {
        log::debug!("Scheduling task {}", task.name());
        self.submit(Box::new(move || {
            let name = task.name();
            if panic::catch_unwind(AssertUnwindSafe(|| task.execute())).is_err() {
                log::error!("Task {} panicked while executing", name);
            }
            let outcome = task.outcome();
            match &outcome {
                Ok(result) => log::debug!("Task {} finished: {}", name, result),
                Err(result) => log::info!("Task {} failed: {}", name, result),
            }
            deliver(completion, outcome);
        }))
    }

    /// Queues `task` and returns a handle resolving to its outcome.
    pub fn schedule<E>(&self, task: Task<E>) -> Result<TaskHandle, RunnerError>
    where
        E: PrngEngine + 'static,
    {
        let (sender, receiver) = oneshot::channel();
        self.dispatch(task, sender)?;
        Ok(TaskHandle::new(receiver))
    }

    /// Queues `task` and calls `on_done` with its outcome on the worker thread.
    pub fn schedule_with<E, F>(&self, task: Task<E>, on_done: F) -> Result<(), RunnerError>
    where
        E: PrngEngine + 'static,
        F: FnOnce(TaskOutcome) + Send + 'static,
    {
        self.dispatch(task, Callback(on_done))
    }

    /// Blocks until everything queued so far has been executed and notified.
    ///
    /// Returns immediately when called from the worker itself.
    pub fn drain(&self) -> Result<(), RunnerError> {
        if self.on_worker() {
            return Ok(());
        }
        let (done, wait) = mpsc::channel();
        self.submit(Box::new(move || {
            let _ = done.send(());
        }))?;
        wait.recv().map_err(|_| RunnerError::Stopped)
    }

    /// Closes the queue and joins the worker after it finishes queued jobs.
    pub fn shutdown(&mut self) {
        self.queue.take();
        let Some(worker) = self.worker.take() else {
            return;
        };
        if self.on_worker() {
            // Dropped from inside a callback; the loop ends on its own.
            return;
        }
        if worker.join().is_err() {
            log::error!("Task worker thread panicked");
        }
    }
}

impl Drop for TaskRunner {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::mock::MockEngine;
    use crate::engine::EngineStatus;
    use crate::keys::derive_key;
    use crate::task::{EngineSlot, SharedEngine};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn shared(engine: MockEngine) -> SharedEngine<MockEngine> {
        Arc::new(Mutex::new(EngineSlot::new(engine)))
    }

    #[test]
    fn test_schedule_delivers_success() {
        let runner = TaskRunner::spawn("test-worker").unwrap();
        let engine = shared(MockEngine::new());
        let outcome = runner.schedule(Task::save_state(engine)).unwrap().wait();
        assert_eq!(outcome.unwrap().message, "Success");
    }

    #[test]
    fn test_schedule_with_delivers_failure() {
        let runner = TaskRunner::spawn("test-worker").unwrap();
        let engine = shared(MockEngine::new().check_status(EngineStatus::FileNotFound));
        let (tx, rx) = mpsc::channel();
        let task = Task::check_initialized(engine, "./".into(), derive_key(b"k"));
        runner
            .schedule_with(task, move |outcome| {
                let on_worker = thread::current().name() == Some("test-worker");
                tx.send((outcome, on_worker)).unwrap();
            })
            .unwrap();

        let (outcome, on_worker) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(on_worker);
        let failure = outcome.unwrap_err();
        assert_eq!(failure.code, EngineStatus::FileNotFound.code());
        assert_eq!(failure.message, "File Not Found");
    }

    #[test]
    fn test_panicking_task_still_notifies() {
        let runner = TaskRunner::spawn("test-worker").unwrap();
        let engine = shared(MockEngine::new().panic_on_save());
        let outcome = runner.schedule(Task::save_state(Arc::clone(&engine))).unwrap().wait();
        assert_eq!(outcome.unwrap_err().message, "Unknown Error");

        // The worker survives and the poisoned lock is recovered.
        let check = Task::check_initialized(engine, "./".into(), derive_key(b"k"));
        assert!(runner.schedule(check).unwrap().wait().is_ok());
    }

    #[test]
    fn test_jobs_run_in_order_and_drain_waits() {
        let runner = TaskRunner::spawn("test-worker").unwrap();
        let engine = MockEngine::new().delay(Duration::from_millis(20));
        let probe = engine.probe();
        let engine = shared(engine);

        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..3 {
            let order = Arc::clone(&order);
            runner
                .schedule_with(Task::save_state(Arc::clone(&engine)), move |_| order.lock().unwrap().push(i))
                .unwrap();
        }
        runner.drain().unwrap();
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
        assert_eq!(probe.save_calls(), 3);
        assert_eq!(probe.overlaps(), 0);
    }

    #[test]
    fn test_shutdown_finishes_queued_work() {
        let mut runner = TaskRunner::spawn("test-worker").unwrap();
        let engine = MockEngine::new().delay(Duration::from_millis(10));
        let probe = engine.probe();
        let handle = runner.schedule(Task::save_state(shared(engine))).unwrap();
        runner.shutdown();
        assert_eq!(probe.save_calls(), 1);
        assert!(handle.wait().is_ok());
        assert_eq!(runner.drain(), Err(RunnerError::Stopped));
    }
}
