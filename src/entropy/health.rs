//! Continuous health tests (NIST SP 800-90B, section 4.4).
//!
//! - Repetition Count Test: catches a source that got stuck on one value.
//! - Adaptive Proportion Test: catches a value that became far too common.
//!
//! Cutoffs assume a claimed min-entropy of 4 bits per sample and a false
//! positive rate of about 2^-20, rounded up for margin.

use super::EntropyError;

const RCT_CUTOFF: usize = 10;
const APT_WINDOW: usize = 512;
const APT_CUTOFF: usize = 50;

/// Stateful health tester fed one sample at a time.
#[derive(Debug, Default)]
pub struct HealthTester {
    last_sample: Option<u8>,
    run_length: usize,

    window_pos: usize,
    window_value: u8,
    window_hits: usize,
}

impl HealthTester {
    /// Creates a new health tester.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a byte sample into both tests.
    pub fn feed(&mut self, sample: u8) -> Result<(), EntropyError> {
        self.repetition_count(sample)?;
        self.adaptive_proportion(sample)
    }

    /// Feeds every byte of `samples`, stopping at the first failure.
    pub fn feed_all(&mut self, samples: &[u8]) -> Result<(), EntropyError> {
        samples.iter().try_for_each(|&s| self.feed(s))
    }

    fn repetition_count(&mut self, sample: u8) -> Result<(), EntropyError> {
        if self.last_sample == Some(sample) {
            self.run_length += 1;
            if self.run_length >= RCT_CUTOFF {
                return Err(EntropyError::HealthTestFailed);
            }
        } else {
            self.last_sample = Some(sample);
            self.run_length = 1;
        }
        Ok(())
    }

    fn adaptive_proportion(&mut self, sample: u8) -> Result<(), EntropyError> {
        if self.window_pos == 0 {
            self.window_value = sample;
            self.window_hits = 1;
            self.window_pos = 1;
            return Ok(());
        }

        if sample == self.window_value {
            self.window_hits += 1;
            if self.window_hits >= APT_CUTOFF {
                return Err(EntropyError::HealthTestFailed);
            }
        }

        self.window_pos += 1;
        if self.window_pos >= APT_WINDOW {
            self.window_pos = 0;
        }
        Ok(())
    }
}

/// Runs a fresh tester over one contribution.
pub fn check(samples: &[u8]) -> Result<(), EntropyError> {
    HealthTester::new().feed_all(samples)
}
