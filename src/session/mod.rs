//! Session facade.
//!
//! [`RngSession`] is the single long-lived object a caller talks to. It owns
//! one engine for its whole life and exposes:
//!
//! | operation          | mode                                   |
//! |--------------------|----------------------------------------|
//! | `initialize`       | blocking, bounded retry                |
//! | `get_bytes`        | blocking                               |
//! | `entropy_strength` | blocking, pure query                   |
//! | `destroy`          | blocking, saves final state            |
//! | `is_initialized`   | background task, returns immediately   |
//! | `save_state`       | background task, returns immediately   |
//!
//! Background tasks for one session run one after another on its worker
//! thread. Usage errors are returned synchronously and never scheduled.

pub mod retry;

use core::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::config::{ConfigError, RngConfig};
use crate::engine::pool::EntropyPool;
use crate::engine::{EngineError, EntropyStrength, PrngEngine};
use crate::keys::derive_key;
use crate::task::{lock_engine, EngineSlot, RunnerError, SharedEngine, Task, TaskHandle, TaskOutcome, TaskRunner};

use retry::{InitOutcome, RetryPolicy};

/// Errors returned synchronously by session operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Bad arguments.
    InvalidArgument(&'static str),
    /// The session was destroyed.
    Destroyed,
    /// `get_bytes` before a successful initialize or load.
    NotInitialized,
    /// The retry loop ran out of attempts.
    InsufficientEntropy { attempts: u32 },
    /// Hard fault raised by the engine, passed through unchanged.
    Fault(EngineError),
    /// The worker thread is unavailable.
    Runner(RunnerError),
    /// The configuration was rejected.
    Config(ConfigError),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::InvalidArgument(msg) => write!(f, "Incorrect Arguments. {}", msg),
            SessionError::Destroyed => write!(f, "RNG session has been destroyed"),
            SessionError::NotInitialized => write!(f, "RNG not initialized"),
            SessionError::InsufficientEntropy { .. } => write!(f, "Not enough entropy!"),
            SessionError::Fault(e) => write!(f, "{}", e),
            SessionError::Runner(e) => write!(f, "{}", e),
            SessionError::Config(e) => write!(f, "Invalid configuration: {}", e),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::Fault(e) => Some(e),
            SessionError::Runner(e) => Some(e),
            SessionError::Config(e) => Some(e),
            _ => None,
        }
    }
}

impl From<EngineError> for SessionError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::NotInitialized => SessionError::NotInitialized,
            other => SessionError::Fault(other),
        }
    }
}

impl From<RunnerError> for SessionError {
    fn from(err: RunnerError) -> Self {
        SessionError::Runner(err)
    }
}

impl From<ConfigError> for SessionError {
    fn from(err: ConfigError) -> Self {
        SessionError::Config(err)
    }
}

/// Owner of one engine and its background worker.
pub struct RngSession<E: PrngEngine + 'static = EntropyPool> {
    engine: SharedEngine<E>,
    runner: TaskRunner,
    retry: RetryPolicy,
    default_file_id: String,
    destroyed: AtomicBool,
}

impl RngSession<EntropyPool> {
    /// Opens a session over the reference [`EntropyPool`] engine.
    pub fn open(config: RngConfig) -> Result<Self, SessionError> {
        config.validate()?;
        let pool = EntropyPool::new(config.pool.clone());
        Self::with_engine(pool, config)
    }
}

impl<E: PrngEngine + 'static> RngSession<E> {
    /// Opens a session over a caller-supplied engine.
    pub fn with_engine(engine: E, config: RngConfig) -> Result<Self, SessionError> {
        if config.max_entropy_multiplier == 0 {
            return Err(ConfigError::NoAttempts.into());
        }
        let runner = TaskRunner::spawn(&config.worker_thread_name)?;
        log::info!("RNG session opened (worker {})", config.worker_thread_name);
        Ok(Self {
            engine: Arc::new(Mutex::new(EngineSlot::new(engine))),
            runner,
            retry: RetryPolicy::new(config.max_entropy_multiplier),
            default_file_id: config.default_file_id,
            destroyed: AtomicBool::new(false),
        })
    }

    fn lock(&self) -> MutexGuard<'_, EngineSlot<E>> {
        lock_engine(&self.engine)
    }

    fn resolve_file_id<'a>(&'a self, file_id: Option<&'a str>) -> Result<&'a str, SessionError> {
        match file_id {
            None => Ok(&self.default_file_id),
            Some("") => Err(SessionError::InvalidArgument("File identifier is empty")),
            Some(id) => Ok(id),
        }
    }

    fn ensure_live(&self) -> Result<(), SessionError> {
        if self.is_destroyed() {
            Err(SessionError::Destroyed)
        } else {
            Ok(())
        }
    }

    /// True once `destroy` has been called.
    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    /// Seeds the engine, retrying with a growing entropy multiplier.
    ///
    /// Blocks until the engine seeds, a hard fault occurs, or the attempts run out.
    pub fn initialize(&self, key_material: &[u8], file_id: Option<&str>) -> Result<bool, SessionError> {
        self.ensure_live()?;
        let file_id = self.resolve_file_id(file_id)?;
        let key = derive_key(key_material);

        let mut slot = self.lock();
        let engine = slot.engine_mut().ok_or(SessionError::Destroyed)?;
        let outcome = self.retry.run(|multiplier| {
            log::debug!("Initialize attempt with entropy multiplier {}", multiplier);
            engine.initialize(file_id, multiplier, &key)
        });

        match outcome {
            InitOutcome::Seeded { attempts } => {
                log::info!("RNG initialized after {} attempt(s)", attempts);
                Ok(true)
            }
            InitOutcome::Exhausted { attempts } => {
                log::warn!("RNG initialize gave up after {} attempts", attempts);
                Err(SessionError::InsufficientEntropy { attempts })
            }
            InitOutcome::Fault { attempt, error } => {
                log::error!("RNG initialize aborted on attempt {}: {}", attempt, error);
                Err(SessionError::Fault(error))
            }
        }
    }

    fn check_task(&self, key_material: &[u8], file_id: Option<&str>) -> Result<Task<E>, SessionError> {
        self.ensure_live()?;
        let file_id = self.resolve_file_id(file_id)?.to_owned();
        Ok(Task::check_initialized(Arc::clone(&self.engine), file_id, derive_key(key_material)))
    }

    /// Checks in the background for saved state under `file_id` and loads it.
    ///
    /// The handle resolves on the success channel when state was loaded, and on
    /// the failure channel with "File Not Found", "Decryption Error" or
    /// "Unknown Error" otherwise.
    pub fn is_initialized(&self, key_material: &[u8], file_id: Option<&str>) -> Result<TaskHandle, SessionError> {
        let task = self.check_task(key_material, file_id)?;
        Ok(self.runner.schedule(task)?)
    }

    /// Like [`is_initialized`](Self::is_initialized), but calls `on_done` on the worker thread.
    pub fn is_initialized_with<F>(&self, key_material: &[u8], file_id: Option<&str>, on_done: F) -> Result<(), SessionError>
    where
        F: FnOnce(TaskOutcome) + Send + 'static,
    {
        let task = self.check_task(key_material, file_id)?;
        Ok(self.runner.schedule_with(task, on_done)?)
    }

    /// Returns `count` bytes of generator output.
    pub fn get_bytes(&self, count: usize) -> Result<Vec<u8>, SessionError> {
        self.ensure_live()?;
        let mut out = Vec::new();
        out.try_reserve_exact(count)
            .map_err(|_| SessionError::InvalidArgument("Requested byte count cannot be allocated"))?;
        out.resize(count, 0);
        let mut slot = self.lock();
        let engine = slot.engine_mut().ok_or(SessionError::Destroyed)?;
        engine.generate_block(&mut out)?;
        Ok(out)
    }

    /// Encrypts and writes the current state in the background.
    pub fn save_state(&self) -> Result<TaskHandle, SessionError> {
        self.ensure_live()?;
        Ok(self.runner.schedule(Task::save_state(Arc::clone(&self.engine)))?)
    }

    /// Like [`save_state`](Self::save_state), but calls `on_done` on the worker thread.
    pub fn save_state_with<F>(&self, on_done: F) -> Result<(), SessionError>
    where
        F: FnOnce(TaskOutcome) + Send + 'static,
    {
        self.ensure_live()?;
        Ok(self.runner.schedule_with(Task::save_state(Arc::clone(&self.engine)), on_done)?)
    }

    /// Waits for queued tasks, then destroys the engine (which saves final state).
    ///
    /// Every later call except `entropy_strength` fails with [`SessionError::Destroyed`].
    pub fn destroy(&self) -> Result<(), SessionError> {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return Err(SessionError::Destroyed);
        }
        if let Err(e) = self.runner.drain() {
            log::warn!("Destroying RNG session without draining tasks: {}", e);
        }
        self.lock().destroy();
        log::info!("RNG session destroyed");
        Ok(())
    }

    /// Rates the entropy sources available to the engine.
    pub fn entropy_strength(&self) -> EntropyStrength {
        self.lock().engine().entropy_strength()
    }
}

impl<E: PrngEngine + 'static> Drop for RngSession<E> {
    fn drop(&mut self) {
        if !self.is_destroyed() {
            log::debug!("RNG session dropped without destroy; destroying now");
            let _ = self.destroy();
        }
    }
}
