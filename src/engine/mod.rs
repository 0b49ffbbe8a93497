//! PRNG engine interface.
//!
//! The session drives any type implementing [`PrngEngine`]. The crate ships
//! [`pool::EntropyPool`], a file-backed reference engine, and (for tests)
//! [`mock::MockEngine`].

pub mod generator;
pub mod pool;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

use core::fmt;

use crate::keys::DerivedKey;
use crate::storage::StorageError;

/// Result of the state-file operations of an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum EngineStatus {
    Success = 0,
    FileNotFound = 1,
    DecryptionError = 2,
    Unknown = 3,
}

impl EngineStatus {
    /// Integer code reported in a [`StatusResult`](crate::task::StatusResult).
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Human readable message for the status.
    pub fn message(self) -> &'static str {
        match self {
            EngineStatus::Success => "Success",
            EngineStatus::FileNotFound => "File Not Found",
            EngineStatus::DecryptionError => "Decryption Error",
            EngineStatus::Unknown => "Unknown Error",
        }
    }
}

impl From<StorageError> for EngineStatus {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound => EngineStatus::FileNotFound,
            StorageError::CryptoError => EngineStatus::DecryptionError,
            _ => EngineStatus::Unknown,
        }
    }
}

/// How many independent entropy sources the engine can draw on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntropyStrength {
    /// Only the operating system.
    Weak,
    /// The OS plus one more source (e.g. microphone or camera).
    Medium,
    /// The OS plus several more sources.
    Strong,
}

impl EntropyStrength {
    /// Rates a number of available sources.
    pub fn from_source_count(count: usize) -> Self {
        match count {
            0 | 1 => EntropyStrength::Weak,
            2 => EntropyStrength::Medium,
            _ => EntropyStrength::Strong,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EntropyStrength::Weak => "WEAK",
            EntropyStrength::Medium => "MEDIUM",
            EntropyStrength::Strong => "STRONG",
        }
    }
}

impl fmt::Display for EntropyStrength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised synchronously by an engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// `generate_block` before a successful initialize or load.
    NotInitialized,
    /// The platform failed to provide entropy. Not worth retrying.
    Hardware(String),
    /// The state file could not be written while seeding.
    Storage(StorageError),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::NotInitialized => write!(f, "RNG not initialized"),
            EngineError::Hardware(msg) => f.write_str(msg),
            EngineError::Storage(e) => write!(f, "Failed to persist RNG state: {}", e),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<StorageError> for EngineError {
    fn from(err: StorageError) -> Self {
        EngineError::Storage(err)
    }
}

/// A seedable generator whose state can be persisted encrypted.
///
/// Implementations are not expected to be thread safe; the session
/// serializes every call.
pub trait PrngEngine: Send {
    /// Gathers entropy scaled by `multiplier` and seeds the generator.
    ///
    /// `Ok(false)` means the harvest was judged insufficient and a retry with
    /// a larger multiplier may succeed. `Err` is a hard fault.
    fn initialize(&mut self, file_id: &str, multiplier: u32, key: &DerivedKey) -> Result<bool, EngineError>;

    /// Fills `out` with generator output.
    fn generate_block(&mut self, out: &mut [u8]) -> Result<(), EngineError>;

    /// Loads previously saved state for `file_id` if it decrypts under `key`.
    fn is_initialized(&mut self, file_id: &str, key: &DerivedKey) -> EngineStatus;

    /// Encrypts the in-memory state and writes it to the bound state file.
    fn save_state(&mut self) -> EngineStatus;

    /// Persists final state, then releases all secret material.
    fn destroy(&mut self);

    /// Rates the entropy sources available to the engine.
    fn entropy_strength(&self) -> EntropyStrength;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_and_messages() {
        assert_eq!(EngineStatus::Success.code(), 0);
        assert_eq!(EngineStatus::FileNotFound.message(), "File Not Found");
        assert_eq!(EngineStatus::DecryptionError.message(), "Decryption Error");
        assert_eq!(EngineStatus::Unknown.message(), "Unknown Error");
    }

    #[test]
    fn test_storage_error_mapping() {
        assert_eq!(EngineStatus::from(StorageError::NotFound), EngineStatus::FileNotFound);
        assert_eq!(EngineStatus::from(StorageError::CryptoError), EngineStatus::DecryptionError);
        assert_eq!(EngineStatus::from(StorageError::Corruption), EngineStatus::Unknown);
    }

    #[test]
    fn test_strength_labels() {
        assert_eq!(EntropyStrength::from_source_count(1).to_string(), "WEAK");
        assert_eq!(EntropyStrength::from_source_count(2).as_str(), "MEDIUM");
        assert_eq!(EntropyStrength::from_source_count(5).as_str(), "STRONG");
    }
}
