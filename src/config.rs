//! Configuration management for seedkeep.
//!
//! Defines the structure for user-configurable settings. The host application
//! builds an [`RngConfig`] (usually via `Default`) and hands it to
//! [`RngSession::open`](crate::session::RngSession::open).

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// File identifier used when the caller does not name one: the current directory.
pub const DEFAULT_FILE_ID: &str = "./";

/// Upper bound (exclusive) of the entropy attempt multiplier.
pub const MAX_ENTROPY_GEN_MULTIPLIER: u32 = 6;

/// Name of the state file created inside a directory-style file identifier.
pub const DEFAULT_STATE_FILE_NAME: &str = "rng.state";

/// Largest accepted scrypt `log_n`.
pub const MAX_KDF_LOG_N: u8 = 20;

/// Largest accepted scrypt parallelism.
pub const MAX_KDF_P: u32 = 16;

/// Largest accepted scrypt working memory (`128 * r * 2^log_n` bytes).
pub const MAX_KDF_MEMORY: u64 = 1 << 30;

/// Errors reported by [`RngConfig::validate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// `max_entropy_multiplier` must allow at least one attempt.
    NoAttempts,
    /// `state_file_name` is empty or contains a path separator.
    BadStateFileName,
    /// `seed_len` must be non-zero.
    ZeroSeedLen,
    /// scrypt refused the cost parameters.
    BadKdfParams,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::NoAttempts => write!(f, "max_entropy_multiplier must be at least 1"),
            ConfigError::BadStateFileName => write!(f, "state_file_name must be a plain, non-empty file name"),
            ConfigError::ZeroSeedLen => write!(f, "seed_len must be non-zero"),
            ConfigError::BadKdfParams => write!(f, "invalid scrypt parameters"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Main configuration structure for a session.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct RngConfig {
    /// File identifier used when `initialize`/`is_initialized` get `None`.
    pub default_file_id: String,

    /// Number of initialize attempts; attempt `m` uses multiplier `m`.
    pub max_entropy_multiplier: u32,

    /// Name given to the background worker thread.
    pub worker_thread_name: String,

    /// Settings of the reference [`EntropyPool`](crate::engine::pool::EntropyPool) engine.
    pub pool: PoolConfig,
}

impl Default for RngConfig {
    fn default() -> Self {
        Self {
            default_file_id: String::from(DEFAULT_FILE_ID),
            max_entropy_multiplier: MAX_ENTROPY_GEN_MULTIPLIER,
            worker_thread_name: String::from("seedkeep-worker"),
            pool: PoolConfig::default(),
        }
    }
}

impl RngConfig {
    /// Checks the settings for values that would make the session unusable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_entropy_multiplier == 0 {
            return Err(ConfigError::NoAttempts);
        }
        self.pool.validate()
    }
}

/// Configuration of the file-backed reference engine.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct PoolConfig {
    /// File name appended to directory-style file identifiers.
    pub state_file_name: String,

    /// Bytes gathered from every source per multiplier step.
    pub seed_len: usize,

    /// Estimated entropy (bits) a harvest must reach to seed the generator.
    pub min_entropy_bits: u32,

    /// Key stretching applied to the derived key before it encrypts the state file.
    pub kdf: KdfConfig,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            state_file_name: String::from(DEFAULT_STATE_FILE_NAME),
            seed_len: 32,
            min_entropy_bits: 256,
            kdf: KdfConfig::default(),
        }
    }
}

impl PoolConfig {
    /// Validates the engine settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let name = self.state_file_name.as_str();
        if name.is_empty() || name.contains('/') || name.contains('\\') {
            return Err(ConfigError::BadStateFileName);
        }
        if self.seed_len == 0 {
            return Err(ConfigError::ZeroSeedLen);
        }
        self.kdf.validate()
    }
}

/// scrypt cost parameters for the state file key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct KdfConfig {
    /// CPU/memory cost as a power of two.
    pub log_n: u8,
    /// Block size.
    pub r: u32,
    /// Parallelism.
    pub p: u32,
}

impl Default for KdfConfig {
    fn default() -> Self {
        Self { log_n: 14, r: 8, p: 1 }
    }
}

impl KdfConfig {
    /// Converts into scrypt parameters producing a 32-byte key.
    pub fn params(&self) -> Result<scrypt::Params, ConfigError> {
        scrypt::Params::new(self.log_n, self.r, self.p, 32).map_err(|_| ConfigError::BadKdfParams)
    }

    /// Bytes of memory one derivation needs.
    pub fn memory_cost(&self) -> u64 {
        128 * u64::from(self.r) << u32::from(self.log_n.min(MAX_KDF_LOG_N))
    }

    /// Validates the parameters against the cost bounds and scrypt's own limits.
    ///
    /// State file headers are checked with the same rules before any key is derived.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.log_n > MAX_KDF_LOG_N || self.p > MAX_KDF_P || self.memory_cost() > MAX_KDF_MEMORY {
            return Err(ConfigError::BadKdfParams);
        }
        self.params().map(|_| ())
    }
}
