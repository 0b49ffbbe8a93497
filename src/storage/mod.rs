//! Storage Module.
//!
//! Persistence of the generator state:
//! - Raw file primitives (atomic replace, bounded reads).
//! - The encrypted state file envelope (scrypt + ChaCha20-Poly1305).

pub mod raw_files;
pub mod state_file;

use core::fmt;

/// Errors related to storage operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// File not found.
    NotFound,
    /// Permission denied.
    PermissionDenied,
    /// IO error (generic).
    IoError,
    /// The file is not a state file or is truncated.
    Corruption,
    /// Encryption/Decryption failure (wrong key or tampered file).
    CryptoError,
    /// Invalid path or filename.
    InvalidPath,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::NotFound => write!(f, "State file not found"),
            StorageError::PermissionDenied => write!(f, "Permission denied"),
            StorageError::IoError => write!(f, "I/O error"),
            StorageError::Corruption => write!(f, "State file is corrupted"),
            StorageError::CryptoError => write!(f, "State file could not be decrypted"),
            StorageError::InvalidPath => write!(f, "Invalid state file path"),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => StorageError::NotFound,
            std::io::ErrorKind::PermissionDenied => StorageError::PermissionDenied,
            _ => StorageError::IoError,
        }
    }
}
