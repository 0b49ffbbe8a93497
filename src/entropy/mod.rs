//! Entropy collection.
//!
//! Defines the interface the reference engine queries for raw entropy and the
//! aggregator that conditions several independent inputs (OS, CPU jitter,
//! caller-fed peripheral samples) into a single generator seed.
//!
//! # Design
//! - **Multi-Source**: independent sources are mixed so one weak input cannot
//!   lower the quality of the seed.
//! - **Critical sources**: the OS source is mandatory. Its failure is a hard
//!   fault that aborts seeding instead of being retried.
//! - **Health tests**: every contribution runs through SP 800-90B style tests
//!   before it is credited with any entropy.

pub mod aggregator;
pub mod custom;
pub mod health;
pub mod jitter;
pub mod os;
pub mod sources;

use core::fmt;

/// Error types for entropy collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntropyError {
    /// No source is registered.
    NoSources,
    /// Failed to collect sufficient entropy bytes.
    CollectionFailed,
    /// Source is exhausted (e.g., fixed buffer).
    Exhausted,
    /// Health test failure (SP 800-90B).
    HealthTestFailed,
    /// Platform not supported.
    NotSupported,
    /// A critical source failed; the platform cannot provide entropy.
    Fault(&'static str),
}

impl fmt::Display for EntropyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntropyError::NoSources => write!(f, "No entropy source registered"),
            EntropyError::CollectionFailed => write!(f, "Entropy collection failed"),
            EntropyError::Exhausted => write!(f, "Entropy source exhausted"),
            EntropyError::HealthTestFailed => write!(f, "Entropy health test failed"),
            EntropyError::NotSupported => write!(f, "Entropy source not supported on this platform"),
            EntropyError::Fault(source) => write!(f, "Hardware entropy fault in source '{}'", source),
        }
    }
}

impl std::error::Error for EntropyError {}

/// A trait for entropy sources.
pub trait EntropySource: Send {
    /// Returns a unique identifier for the source.
    fn name(&self) -> &'static str;

    /// Fills `dest` with raw bytes from the source.
    fn fill(&mut self, dest: &mut [u8]) -> Result<(), EntropyError>;

    /// Conservative estimate of min-entropy per byte, in bits (0.0-8.0).
    fn entropy_estimate(&self) -> f64;

    /// Whether a failure of this source must abort seeding.
    fn is_critical(&self) -> bool {
        false
    }

    /// Whether the source can currently deliver anything at all.
    fn is_available(&self) -> bool {
        true
    }

    /// Whether the source counts as an independent input when rating strength.
    /// CPU timing sources return false.
    fn counts_toward_strength(&self) -> bool {
        true
    }
}
