//! One-shot background tasks.
//!
//! A [`Task`] wraps one potentially blocking engine call (loading or saving
//! the state file). [`runner::TaskRunner`] executes it on a worker thread and
//! then delivers exactly one notification through a [`Completion`]: either
//! `on_success` or `on_failure`, both carrying a [`StatusResult`].
//!
//! `execute()` only records the engine status. Notification is the runner's
//! job and always happens after `execute()` has returned.

pub mod handle;
pub mod runner;

use core::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use futures::channel::oneshot;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::engine::{EngineStatus, PrngEngine};
use crate::keys::DerivedKey;

pub use handle::TaskHandle;
pub use runner::{RunnerError, TaskRunner};

/// Uniform shape of both success and failure notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StatusResult {
    /// Engine status code.
    pub code: i32,
    /// "Success", "File Not Found", "Decryption Error" or "Unknown Error".
    pub message: String,
}

impl StatusResult {
    pub fn from_status(status: EngineStatus) -> Self {
        Self { code: status.code(), message: String::from(status.message()) }
    }

    pub fn is_success(&self) -> bool {
        self.code == EngineStatus::Success.code()
    }
}

impl fmt::Display for StatusResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}

/// Terminal notification of a task: `Ok` on the success channel, `Err` on the failure channel.
pub type TaskOutcome = Result<StatusResult, StatusResult>;

impl From<EngineStatus> for TaskOutcome {
    fn from(status: EngineStatus) -> Self {
        let result = StatusResult::from_status(status);
        if result.is_success() {
            Ok(result)
        } else {
            Err(result)
        }
    }
}

/// Receiver of a task's single terminal notification.
pub trait Completion: Send + 'static {
    fn on_success(self, result: StatusResult);
    fn on_failure(self, result: StatusResult);
}

pub(crate) fn deliver<C: Completion>(completion: C, outcome: TaskOutcome) {
    match outcome {
        Ok(result) => completion.on_success(result),
        Err(result) => completion.on_failure(result),
    }
}

impl Completion for oneshot::Sender<TaskOutcome> {
    fn on_success(self, result: StatusResult) {
        if self.send(Ok(result)).is_err() {
            log::debug!("Task handle dropped before its result arrived");
        }
    }

    fn on_failure(self, result: StatusResult) {
        if self.send(Err(result)).is_err() {
            log::debug!("Task handle dropped before its result arrived");
        }
    }
}

/// Adapts a closure taking the whole [`TaskOutcome`] into a [`Completion`].
pub struct Callback<F>(pub F);

impl<F> Completion for Callback<F>
where
    F: FnOnce(TaskOutcome) + Send + 'static,
{
    fn on_success(self, result: StatusResult) {
        (self.0)(Ok(result))
    }

    fn on_failure(self, result: StatusResult) {
        (self.0)(Err(result))
    }
}

/// The engine plus its destroyed flag, shared by the session and its tasks.
pub struct EngineSlot<E> {
    engine: E,
    destroyed: bool,
}

impl<E: PrngEngine> EngineSlot<E> {
    pub fn new(engine: E) -> Self {
        Self { engine, destroyed: false }
    }

    /// The engine, unless it has been destroyed.
    pub fn engine_mut(&mut self) -> Option<&mut E> {
        if self.destroyed {
            None
        } else {
            Some(&mut self.engine)
        }
    }

    /// Read-only access, also after destroy (for entropy queries).
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Destroys the engine once; later calls do nothing.
    pub fn destroy(&mut self) {
        if !self.destroyed {
            self.engine.destroy();
            self.destroyed = true;
        }
    }
}

pub type SharedEngine<E> = Arc<Mutex<EngineSlot<E>>>;

/// Locks the slot, taking it back if a panicking task poisoned the lock.
pub fn lock_engine<E>(engine: &SharedEngine<E>) -> MutexGuard<'_, EngineSlot<E>> {
    engine.lock().unwrap_or_else(|poisoned| {
        log::error!("Engine lock poisoned by a panicking task; recovering");
        poisoned.into_inner()
    })
}

/// What a task does when executed.
pub enum TaskKind {
    /// Load state for `file_id` if it decrypts under `key`.
    CheckInitialized { file_id: String, key: DerivedKey },
    /// Persist the current state.
    SaveState,
}

/// A one-shot unit of background work bound to one engine.
pub struct Task<E> {
    kind: TaskKind,
    engine: SharedEngine<E>,
    status: Option<EngineStatus>,
}

impl<E: PrngEngine> Task<E> {
    pub fn check_initialized(engine: SharedEngine<E>, file_id: String, key: DerivedKey) -> Self {
        Self { kind: TaskKind::CheckInitialized { file_id, key }, engine, status: None }
    }

    pub fn save_state(engine: SharedEngine<E>) -> Self {
        Self { kind: TaskKind::SaveState, engine, status: None }
    }

    pub fn name(&self) -> &'static str {
        match self.kind {
            TaskKind::CheckInitialized { .. } => "is_initialized",
            TaskKind::SaveState => "save_state",
        }
    }

    /// Runs the engine call and records its status. Blocks on the engine lock.
    pub fn execute(&mut self) {
        let status = {
            let mut slot = lock_engine(&self.engine);
            match slot.engine_mut() {
                None => {
                    log::warn!("Task {} ran after the engine was destroyed", self.name());
                    EngineStatus::Unknown
                }
                Some(engine) => match &self.kind {
                    TaskKind::CheckInitialized { file_id, key } => engine.is_initialized(file_id, key),
                    TaskKind::SaveState => engine.save_state(),
                },
            }
        };
        self.status = Some(status);
    }

    /// Status recorded by `execute`, if it completed.
    #[cfg(test)]
    fn status(&self) -> Option<EngineStatus> {
        self.status
    }

    /// Notification for the recorded status. A task that never completed reports UNKNOWN.
    pub fn outcome(&self) -> TaskOutcome {
        self.status.unwrap_or(EngineStatus::Unknown).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::mock::MockEngine;
    use crate::keys::derive_key;

    fn shared(engine: MockEngine) -> SharedEngine<MockEngine> {
        Arc::new(Mutex::new(EngineSlot::new(engine)))
    }

    #[test]
    fn test_outcome_channels() {
        assert_eq!(TaskOutcome::from(EngineStatus::Success), Ok(StatusResult { code: 0, message: "Success".into() }));
        let failure = TaskOutcome::from(EngineStatus::DecryptionError).unwrap_err();
        assert_eq!(failure.code, 2);
        assert_eq!(failure.message, "Decryption Error");
        assert_eq!(failure.to_string(), "Decryption Error (code 2)");
    }

    #[test]
    fn test_execute_records_status_only() {
        let engine = MockEngine::new().check_status(EngineStatus::FileNotFound);
        let probe = engine.probe();
        let mut task = Task::check_initialized(shared(engine), "./".into(), derive_key(b"k"));

        assert_eq!(task.status(), None);
        assert_eq!(task.outcome().unwrap_err().message, "Unknown Error");

        task.execute();
        assert_eq!(probe.check_calls(), 1);
        assert_eq!(task.status(), Some(EngineStatus::FileNotFound));
        assert_eq!(task.outcome().unwrap_err().message, "File Not Found");
    }

    #[test]
    fn test_task_after_destroy_reports_unknown() {
        let engine = MockEngine::new();
        let probe = engine.probe();
        let slot = shared(engine);
        lock_engine(&slot).destroy();
        lock_engine(&slot).destroy();
        assert_eq!(probe.destroy_calls(), 1);

        let mut task = Task::save_state(slot);
        task.execute();
        assert_eq!(probe.save_calls(), 0);
        assert_eq!(task.status(), Some(EngineStatus::Unknown));
    }

    #[test]
    fn test_callback_completion() {
        let (tx, rx) = std::sync::mpsc::channel();
        deliver(Callback(move |outcome: TaskOutcome| tx.send(outcome).unwrap()), EngineStatus::Success.into());
        assert!(rx.recv().unwrap().unwrap().is_success());
    }
}
