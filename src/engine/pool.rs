//! File-backed reference engine.
//!
//! `EntropyPool` seeds a [`Generator`] from an [`EntropyAggregator`] harvest and
//! persists the generator state through the encrypted state file.
//!
//! # Lifecycle
//! - `initialize` harvests `seed_len * (multiplier + 1)` bytes per source and
//!   writes a fresh state file.
//! - `is_initialized` loads an existing state file instead; the loaded state is
//!   reseeded with fresh OS entropy so two loads of one file never share output.
//! - `save_state` rewrites the bound file, then ratchets the in-memory key so
//!   the live generator runs ahead of what is on disk.
//! - `destroy` saves one last time and drops (zeroizes) everything secret.

use std::path::PathBuf;

use super::generator::Generator;
use super::{EngineError, EngineStatus, EntropyStrength, PrngEngine};
use crate::config::PoolConfig;
use crate::entropy::aggregator::EntropyAggregator;
use crate::entropy::os::OsSource;
use crate::entropy::sources::default_sources;
use crate::entropy::{EntropyError, EntropySource};
use crate::keys::DerivedKey;
use crate::storage::state_file::{self, resolve_path, SealingKey};

struct StateBinding {
    path: PathBuf,
    key: SealingKey,
}

/// Reference [`PrngEngine`] persisting to an encrypted state file.
pub struct EntropyPool {
    config: PoolConfig,
    sources: EntropyAggregator,
    generator: Option<Generator>,
    binding: Option<StateBinding>,
}

impl EntropyPool {
    /// Creates a pool over the default sources (OS + CPU jitter).
    pub fn new(config: PoolConfig) -> Self {
        Self::with_sources(config, default_sources())
    }

    /// Creates a pool over a caller-built source set.
    pub fn with_sources(config: PoolConfig, sources: EntropyAggregator) -> Self {
        Self { config, sources, generator: None, binding: None }
    }

    /// Registers an extra source, e.g. a microphone or camera feed.
    pub fn add_source<S>(&mut self, source: S)
    where
        S: EntropySource + 'static,
    {
        self.sources.add_source(source);
    }

    #[cfg(test)]
    fn is_seeded(&self) -> bool {
        self.generator.is_some()
    }

    #[cfg(test)]
    fn state_path(&self) -> Option<&std::path::Path> {
        self.binding.as_ref().map(|b| b.path.as_path())
    }

    fn refresh_loaded(generator: &mut Generator) {
        let mut fresh = zeroize::Zeroizing::new([0u8; 32]);
        match OsSource::new().fill(&mut fresh[..]) {
            Ok(()) => generator.reseed(&fresh[..]),
            Err(e) => log::warn!("Loaded RNG state without fresh entropy: {}", e),
        }
    }
}

impl PrngEngine for EntropyPool {
    fn initialize(&mut self, file_id: &str, multiplier: u32, key: &DerivedKey) -> Result<bool, EngineError> {
        let per_source = self.config.seed_len.saturating_mul(multiplier as usize + 1);
        let harvest = match self.sources.harvest(per_source) {
            Ok(harvest) => harvest,
            Err(EntropyError::Fault(source)) => {
                return Err(EngineError::Hardware(format!("Entropy source {} is not working", source)))
            }
            Err(EntropyError::NoSources) => {
                return Err(EngineError::Hardware(String::from("No entropy source available")))
            }
            Err(e) => {
                log::debug!("Harvest at multiplier {} failed: {}", multiplier, e);
                return Ok(false);
            }
        };

        let required = f64::from(self.config.min_entropy_bits);
        if harvest.healthy_sources == 0 || harvest.estimated_bits < required {
            log::info!(
                "Harvest at multiplier {} credited {:.0} of {:.0} bits from {} healthy sources",
                multiplier,
                harvest.estimated_bits,
                required,
                harvest.healthy_sources
            );
            return Ok(false);
        }

        let generator = Generator::from_seed(&harvest.seed);
        let path = resolve_path(file_id, &self.config.state_file_name);
        let sealing = SealingKey::derive(key, self.config.kdf)?;
        state_file::save(&path, &generator.to_bytes()[..], &sealing)?;

        log::info!("RNG seeded at multiplier {}, state bound to {}", multiplier, path.display());
        self.generator = Some(generator);
        self.binding = Some(StateBinding { path, key: sealing });
        Ok(true)
    }

    fn generate_block(&mut self, out: &mut [u8]) -> Result<(), EngineError> {
        let generator = self.generator.as_mut().ok_or(EngineError::NotInitialized)?;
        generator.fill(out);
        Ok(())
    }

    fn is_initialized(&mut self, file_id: &str, key: &DerivedKey) -> EngineStatus {
        let path = resolve_path(file_id, &self.config.state_file_name);
        let (plaintext, sealing) = match state_file::load(&path, key) {
            Ok(loaded) => loaded,
            Err(e) => {
                log::debug!("No usable RNG state at {}: {}", path.display(), e);
                return e.into();
            }
        };

        let mut generator = match Generator::from_bytes(&plaintext) {
            Ok(generator) => generator,
            Err(e) => {
                log::warn!("RNG state at {} is malformed: {:?}", path.display(), e);
                return EngineStatus::Unknown;
            }
        };
        Self::refresh_loaded(&mut generator);

        log::info!("RNG state loaded from {}", path.display());
        self.generator = Some(generator);
        self.binding = Some(StateBinding { path, key: sealing });
        EngineStatus::Success
    }

    fn save_state(&mut self) -> EngineStatus {
        let (Some(generator), Some(binding)) = (self.generator.as_mut(), self.binding.as_ref()) else {
            log::warn!("save_state called with no seeded generator");
            return EngineStatus::Unknown;
        };

        match state_file::save(&binding.path, &generator.to_bytes()[..], &binding.key) {
            Ok(()) => {
                generator.reseed(b"saved");
                log::debug!("RNG state saved to {}", binding.path.display());
                EngineStatus::Success
            }
            Err(e) => {
                log::warn!("Saving RNG state to {} failed: {}", binding.path.display(), e);
                e.into()
            }
        }
    }

    fn destroy(&mut self) {
        if self.generator.is_some() {
            let status = self.save_state();
            if status != EngineStatus::Success {
                log::warn!("Final RNG state save failed: {}", status.message());
            }
        }
        self.generator = None;
        self.binding = None;
    }

    fn entropy_strength(&self) -> EntropyStrength {
        self.sources.strength()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KdfConfig;
    use crate::entropy::custom::CustomSource;
    use crate::keys::derive_key;

    fn fast_config() -> PoolConfig {
        PoolConfig { kdf: KdfConfig { log_n: 4, r: 8, p: 1 }, ..PoolConfig::default() }
    }

    fn scratch(tag: &str) -> (PathBuf, String) {
        let dir = std::env::temp_dir().join(format!("seedkeep_pool_{}_{}", tag, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        let id = format!("{}/", dir.display());
        (dir, id)
    }

    fn varied(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i as u8).wrapping_mul(37).wrapping_add(11)).collect()
    }

    struct DeadOs;

    impl EntropySource for DeadOs {
        fn name(&self) -> &'static str {
            "DeadOs"
        }
        fn fill(&mut self, _dest: &mut [u8]) -> Result<(), EntropyError> {
            Err(EntropyError::Fault("DeadOs"))
        }
        fn entropy_estimate(&self) -> f64 {
            8.0
        }
        fn is_critical(&self) -> bool {
            true
        }
    }

    #[test]
    fn test_initialize_save_and_reload() {
        let (dir, id) = scratch("reload");
        let key = derive_key(b"pool key");

        let mut pool = EntropyPool::new(fast_config());
        assert!(!pool.is_seeded());
        assert!(pool.initialize(&id, 0, &key).unwrap());
        assert_eq!(pool.state_path(), Some(dir.join("rng.state").as_path()));

        let mut out = [0u8; 16];
        pool.generate_block(&mut out).unwrap();
        assert_eq!(pool.save_state(), EngineStatus::Success);

        let mut other = EntropyPool::new(fast_config());
        assert_eq!(other.is_initialized(&id, &key), EngineStatus::Success);
        assert!(other.is_seeded());
        other.generate_block(&mut out).unwrap();

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_reload_failures() {
        let (dir, id) = scratch("failures");
        let mut pool = EntropyPool::new(fast_config());
        assert_eq!(pool.is_initialized(&id, &derive_key(b"k")), EngineStatus::FileNotFound);

        assert!(pool.initialize(&id, 0, &derive_key(b"right")).unwrap());
        let mut other = EntropyPool::new(fast_config());
        assert_eq!(other.is_initialized(&id, &derive_key(b"wrong")), EngineStatus::DecryptionError);
        assert!(!other.is_seeded());

        std::fs::write(dir.join("rng.state"), b"garbage").unwrap();
        assert_eq!(other.is_initialized(&id, &derive_key(b"right")), EngineStatus::Unknown);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_generate_before_initialize() {
        let mut pool = EntropyPool::new(fast_config());
        let mut out = [0u8; 4];
        assert_eq!(pool.generate_block(&mut out), Err(EngineError::NotInitialized));
        assert_eq!(pool.save_state(), EngineStatus::Unknown);
    }

    #[test]
    fn test_weak_harvest_needs_larger_multiplier() {
        let (dir, id) = scratch("weak");
        let mut mic = CustomSource::named("Mic").with_estimate(2.0);
        mic.add_bytes(&varied(400));
        let mut sources = EntropyAggregator::new();
        sources.add_source(mic);

        // 32 bytes * (m + 1) * 2 bits reaches 256 bits at m = 3.
        let mut pool = EntropyPool::with_sources(fast_config(), sources);
        let key = derive_key(b"k");
        for m in 0..3 {
            assert!(!pool.initialize(&id, m, &key).unwrap());
        }
        assert!(pool.initialize(&id, 3, &key).unwrap());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_critical_source_failure_is_hardware_fault() {
        let mut sources = EntropyAggregator::new();
        sources.add_source(DeadOs);
        let mut pool = EntropyPool::with_sources(fast_config(), sources);
        match pool.initialize("./", 0, &derive_key(b"k")) {
            Err(EngineError::Hardware(msg)) => assert!(msg.contains("DeadOs")),
            other => panic!("expected hardware fault, got {:?}", other),
        }
    }

    #[test]
    fn test_destroy_saves_and_forgets() {
        let (dir, id) = scratch("destroy");
        let key = derive_key(b"k");
        let mut pool = EntropyPool::new(fast_config());
        assert!(pool.initialize(&id, 0, &key).unwrap());
        let before = std::fs::read(dir.join("rng.state")).unwrap();

        pool.destroy();
        assert!(!pool.is_seeded());
        assert!(pool.state_path().is_none());
        assert_ne!(std::fs::read(dir.join("rng.state")).unwrap(), before);

        let mut out = [0u8; 1];
        assert_eq!(pool.generate_block(&mut out), Err(EngineError::NotInitialized));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_strength_follows_sources() {
        let mut pool = EntropyPool::new(fast_config());
        assert_eq!(pool.entropy_strength(), EntropyStrength::Weak);
        let mut cam = CustomSource::named("Camera");
        cam.add_bytes(&[1, 2, 3]);
        pool.add_source(cam);
        assert_eq!(pool.entropy_strength(), EntropyStrength::Medium);
    }
}
