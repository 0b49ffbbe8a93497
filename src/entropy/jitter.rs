//! CPU Jitter Entropy Source.
//!
//! Harvests entropy from execution timing variations: cache misses, pipeline
//! stalls, branch mispredictions, interrupts and scheduler noise all perturb
//! how long a short busy loop takes.
//!
//! # Design
//! - **Timestamp Source**: `std::time::Instant`, read as nanoseconds since the
//!   source was created.
//! - **Oscillator**: a short CPU-bound loop whose duration is sampled.
//! - **Whitening**: 64 timing deltas are folded into every output byte by
//!   parity; the aggregator hashes the result before use.

use std::time::Instant;

use super::{EntropyError, EntropySource};

/// CPU Jitter Entropy Source.
pub struct JitterSource {
    epoch: Instant,
}

impl JitterSource {
    /// Creates a new jitter source.
    pub fn new() -> Self {
        Self { epoch: Instant::now() }
    }

    #[inline(always)]
    fn timestamp(&self) -> u64 {
        self.epoch.elapsed().as_nanos() as u64
    }

    /// Performs a tiny amount of CPU-bound work to induce jitter.
    #[inline(always)]
    fn jitter_loop() {
        let mut x = 0u64;
        for i in 0..16 {
            x = x.wrapping_mul(31).wrapping_add(i);
            core::hint::black_box(x);
        }
    }

    /// Checks that the timer advances at all.
    fn timer_works(&self) -> bool {
        let t1 = self.timestamp();
        for _ in 0..64 {
            Self::jitter_loop();
        }
        self.timestamp() != t1
    }
}

impl Default for JitterSource {
    fn default() -> Self {
        Self::new()
    }
}

impl EntropySource for JitterSource {
    fn name(&self) -> &'static str {
        "CpuJitter"
    }

    fn fill(&mut self, dest: &mut [u8]) -> Result<(), EntropyError> {
        if !self.timer_works() {
            return Err(EntropyError::NotSupported);
        }

        for byte in dest.iter_mut() {
            let mut acc = 0u8;
            for _ in 0..8 {
                let mut folded = 0u64;
                for _ in 0..8 {
                    let start = self.timestamp();
                    Self::jitter_loop();
                    let end = self.timestamp();
                    folded ^= end.wrapping_sub(start);
                }
                acc = (acc << 1) | (folded.count_ones() % 2) as u8;
            }
            *byte = acc;
        }

        Ok(())
    }

    fn entropy_estimate(&self) -> f64 {
        // Timer resolution varies a lot between platforms and VMs.
        1.0
    }

    fn is_available(&self) -> bool {
        self.timer_works()
    }

    fn counts_toward_strength(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jitter_source_fill() {
        let mut source = JitterSource::new();
        let mut buf = [0u8; 64];
        match source.fill(&mut buf) {
            Ok(()) => assert!(!source.is_critical() && !source.counts_toward_strength()),
            Err(EntropyError::NotSupported) => assert!(!source.is_available()),
            Err(e) => panic!("JitterSource failed: {:?}", e),
        }
    }
}
