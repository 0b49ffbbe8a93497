//! Custom Caller-Provided Entropy Source.
//!
//! Lets the host feed samples from peripherals the library cannot reach
//! itself (microphone, camera, sensors, UI events).

use super::{EntropyError, EntropySource};

/// Source that buffers caller-injected entropy.
pub struct CustomSource {
    name: &'static str,
    buffer: Vec<u8>,
    estimate: f64,
}

impl CustomSource {
    /// Creates a new empty source with a 2 bits/byte estimate.
    pub fn new() -> Self {
        Self::named("CustomInput")
    }

    /// Creates a new empty source reporting `name`.
    pub fn named(name: &'static str) -> Self {
        Self { name, buffer: Vec::new(), estimate: 2.0 }
    }

    /// Overrides the per-byte entropy estimate (clamped to 0.0-8.0).
    pub fn with_estimate(mut self, bits_per_byte: f64) -> Self {
        self.estimate = bits_per_byte.clamp(0.0, 8.0);
        self
    }

    /// Add entropy bytes to the pool.
    pub fn add_bytes(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    #[cfg(test)]
    fn buffered(&self) -> usize {
        self.buffer.len()
    }
}

impl Default for CustomSource {
    fn default() -> Self {
        Self::new()
    }
}

impl EntropySource for CustomSource {
    fn name(&self) -> &'static str {
        self.name
    }

    fn fill(&mut self, dest: &mut [u8]) -> Result<(), EntropyError> {
        if self.buffer.len() < dest.len() {
            return Err(EntropyError::Exhausted);
        }
        dest.copy_from_slice(&self.buffer[..dest.len()]);
        self.buffer.drain(..dest.len());
        Ok(())
    }

    fn entropy_estimate(&self) -> f64 {
        self.estimate
    }

    fn is_available(&self) -> bool {
        !self.buffer.is_empty()
    }
}
