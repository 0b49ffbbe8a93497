//! Persistent CSPRNG state manager.
//!
//! A [`RngSession`] owns one generator engine. The engine is seeded from
//! gathered entropy, its state is kept on disk encrypted under a key derived
//! from caller-supplied key material, and loading or saving that state runs
//! as one-shot background tasks that report back through a [`TaskHandle`] or
//! a callback.
//!
//! ```no_run
//! use seedkeep::{RngConfig, RngSession};
//!
//! let session = RngSession::open(RngConfig::default())?;
//! if session.is_initialized(b"app secret", None)?.wait().is_err() {
//!     session.initialize(b"app secret", None)?;
//! }
//! let bytes = session.get_bytes(32)?;
//! assert_eq!(bytes.len(), 32);
//! session.destroy()?;
//! # Ok::<(), seedkeep::SessionError>(())
//! ```

pub mod config;
pub mod engine;
pub mod entropy;
pub mod keys;
pub mod session;
pub mod storage;
pub mod task;

pub use config::RngConfig;
pub use engine::{EngineStatus, EntropyStrength, PrngEngine};
pub use keys::{derive_key, DerivedKey};
pub use session::{RngSession, SessionError};
pub use task::{StatusResult, TaskHandle, TaskOutcome};
