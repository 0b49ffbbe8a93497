//! Entropy Aggregator.
//!
//! Collects from every registered source, health-tests each contribution and
//! conditions the lot through a BLAKE3 key-derivation hasher into a seed.

use zeroize::Zeroizing;

use super::{health, EntropyError, EntropySource};
use crate::engine::EntropyStrength;

const SEED_CONTEXT: &str = "seedkeep 2024 entropy aggregator seed v1";

/// Result of one harvest.
pub struct Harvest {
    /// Conditioned 32-byte seed.
    pub seed: Zeroizing<[u8; 32]>,
    /// Entropy credited to contributions that passed health tests, in bits.
    pub estimated_bits: f64,
    /// Number of sources whose contribution was credited.
    pub healthy_sources: usize,
}

/// Aggregator that collects from multiple sources.
pub struct EntropyAggregator {
    sources: Vec<Box<dyn EntropySource>>,
}

impl EntropyAggregator {
    /// Creates a new empty aggregator.
    pub fn new() -> Self {
        Self { sources: Vec::new() }
    }

    /// Adds a source to the aggregator.
    pub fn add_source<S>(&mut self, source: S)
    where
        S: EntropySource + 'static,
    {
        self.sources.push(Box::new(source));
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.sources.len()
    }

    /// Gathers `bytes_per_source` bytes from every source.
    ///
    /// A failing critical source aborts with its error. Other failures only
    /// drop that source's contribution. Contributions that fail health tests
    /// are still mixed in but credited with zero entropy.
    pub fn harvest(&mut self, bytes_per_source: usize) -> Result<Harvest, EntropyError> {
        if self.sources.is_empty() {
            return Err(EntropyError::NoSources);
        }

        let mut hasher = blake3::Hasher::new_derive_key(SEED_CONTEXT);
        let mut buf = Zeroizing::new(vec![0u8; bytes_per_source]);
        let mut estimated_bits = 0.0;
        let mut healthy_sources = 0;
        let mut contributed = 0;

        for source in self.sources.iter_mut() {
            match source.fill(&mut buf) {
                Ok(()) => {}
                Err(e) if source.is_critical() => {
                    log::error!("Critical entropy source {} failed: {}", source.name(), e);
                    return Err(e);
                }
                Err(e) => {
                    log::debug!("Skipping entropy source {}: {}", source.name(), e);
                    continue;
                }
            }

            // Length-prefix every contribution so source boundaries are unambiguous.
            hasher.update(source.name().as_bytes());
            hasher.update(&(buf.len() as u64).to_le_bytes());
            hasher.update(&buf);
            contributed += 1;

            match health::check(&buf) {
                Ok(()) => {
                    estimated_bits += buf.len() as f64 * source.entropy_estimate();
                    healthy_sources += 1;
                }
                Err(e) => log::warn!("Entropy source {} failed health tests: {}", source.name(), e),
            }
        }

        if contributed == 0 {
            return Err(EntropyError::CollectionFailed);
        }

        let mut seed = Zeroizing::new([0u8; 32]);
        seed.copy_from_slice(hasher.finalize().as_bytes());
        Ok(Harvest { seed, estimated_bits, healthy_sources })
    }

    /// Rates the source set by how many independent sources are available.
    ///
    /// OS alone is weak; each peripheral feed on top raises the rating.
    pub fn strength(&self) -> EntropyStrength {
        let available = self
            .sources
            .iter()
            .filter(|s| s.counts_toward_strength() && s.is_available())
            .count();
        EntropyStrength::from_source_count(available)
    }
}

impl Default for EntropyAggregator {
    fn default() -> Self {
        Self::new()
    }
}
