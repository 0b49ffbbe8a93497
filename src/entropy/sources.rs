//! Standard Entropy Sources Registry.
//!
//! Re-exports available entropy sources and builds the default set.

use super::aggregator::EntropyAggregator;

pub use super::custom::CustomSource;
pub use super::jitter::JitterSource;
pub use super::os::OsSource;

/// The default source set: the OS CSPRNG plus CPU timing jitter.
pub fn default_sources() -> EntropyAggregator {
    let mut agg = EntropyAggregator::new();
    agg.add_source(OsSource::new());
    agg.add_source(JitterSource::new());
    agg
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EntropyStrength;

    #[test]
    fn test_default_sources_are_weak() {
        // No peripheral feeds: OS only.
        let agg = default_sources();
        assert_eq!(agg.len(), 2);
        assert_eq!(agg.strength(), EntropyStrength::Weak);
    }
}
