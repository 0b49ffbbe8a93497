//! Operating-system entropy source.
//!
//! Reads from the kernel CSPRNG through `rand_core::OsRng` (`getrandom`).
//! This source is critical: if the OS cannot deliver randomness the platform
//! is considered broken and seeding aborts.

use rand_core::{OsRng, RngCore};

use super::{EntropyError, EntropySource};

/// OS CSPRNG source.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsSource {
    _private: (),
}

impl OsSource {
    /// Creates a new OS source.
    pub fn new() -> Self {
        Self { _private: () }
    }
}

impl EntropySource for OsSource {
    fn name(&self) -> &'static str {
        "OsRng"
    }

    fn fill(&mut self, dest: &mut [u8]) -> Result<(), EntropyError> {
        OsRng.try_fill_bytes(dest).map_err(|e| {
            log::error!("OS entropy source failed: {}", e);
            EntropyError::Fault(self.name())
        })
    }

    fn entropy_estimate(&self) -> f64 {
        8.0
    }

    fn is_critical(&self) -> bool {
        true
    }
}
