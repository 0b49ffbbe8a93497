//! Scriptable [`PrngEngine`] test double.
//!
//! The engine is moved into the session under test, so everything a test
//! wants to observe afterwards lives in a shared [`MockProbe`].

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use super::{EngineError, EngineStatus, EntropyStrength, PrngEngine};
use crate::keys::DerivedKey;

/// Observations shared between a [`MockEngine`] and the test.
#[derive(Debug, Default)]
pub struct MockProbe {
    multipliers: Mutex<Vec<u32>>,
    checks: AtomicUsize,
    saves: AtomicUsize,
    destroys: AtomicUsize,
    active: AtomicUsize,
    overlaps: AtomicUsize,
    destroyed: AtomicBool,
}

impl MockProbe {
    /// Multipliers passed to `initialize`, in call order.
    pub fn multipliers(&self) -> Vec<u32> {
        self.multipliers.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Number of `initialize` calls.
    pub fn init_calls(&self) -> usize {
        self.multipliers.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn check_calls(&self) -> usize {
        self.checks.load(Ordering::SeqCst)
    }

    pub fn save_calls(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn destroy_calls(&self) -> usize {
        self.destroys.load(Ordering::SeqCst)
    }

    /// Times an engine call started while another one was still running.
    pub fn overlaps(&self) -> usize {
        self.overlaps.load(Ordering::SeqCst)
    }

    /// Whether `destroy` has run.
    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    fn enter(&self) -> ActiveGuard<'_> {
        if self.active.fetch_add(1, Ordering::SeqCst) > 0 {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        ActiveGuard { probe: self }
    }
}

struct ActiveGuard<'a> {
    probe: &'a MockProbe,
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.probe.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Test engine whose answers are fixed up front.
#[derive(Debug)]
pub struct MockEngine {
    probe: Arc<MockProbe>,
    succeed_at: Option<u32>,
    fault_at: Option<(u32, String)>,
    check_status: EngineStatus,
    save_status: EngineStatus,
    strength: EntropyStrength,
    delay: Duration,
    panic_on_save: bool,
    seeded: bool,
    counter: u8,
}

impl MockEngine {
    /// An engine that seeds on the first attempt and answers every task with success.
    pub fn new() -> Self {
        Self {
            probe: Arc::new(MockProbe::default()),
            succeed_at: Some(0),
            fault_at: None,
            check_status: EngineStatus::Success,
            save_status: EngineStatus::Success,
            strength: EntropyStrength::Weak,
            delay: Duration::ZERO,
            panic_on_save: false,
            seeded: false,
            counter: 0,
        }
    }

    /// Shared probe; clone it before handing the engine away.
    pub fn probe(&self) -> Arc<MockProbe> {
        Arc::clone(&self.probe)
    }

    /// `initialize` returns true once the multiplier reaches `multiplier`.
    pub fn succeed_at(mut self, multiplier: u32) -> Self {
        self.succeed_at = Some(multiplier);
        self
    }

    /// `initialize` never gathers enough entropy.
    pub fn never_seed(mut self) -> Self {
        self.succeed_at = None;
        self
    }

    /// `initialize` raises a hardware fault at `multiplier`.
    pub fn fault_at(mut self, multiplier: u32, message: &str) -> Self {
        self.fault_at = Some((multiplier, message.to_owned()));
        self
    }

    pub fn check_status(mut self, status: EngineStatus) -> Self {
        self.check_status = status;
        self
    }

    pub fn save_status(mut self, status: EngineStatus) -> Self {
        self.save_status = status;
        self
    }

    pub fn strength(mut self, strength: EntropyStrength) -> Self {
        self.strength = strength;
        self
    }

    /// Time every task-side call spends inside the engine.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Makes `save_state` panic, to exercise worker panic handling.
    pub fn panic_on_save(mut self) -> Self {
        self.panic_on_save = true;
        self
    }

    fn pause(&self) {
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
    }
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PrngEngine for MockEngine {
    fn initialize(&mut self, _file_id: &str, multiplier: u32, _key: &DerivedKey) -> Result<bool, EngineError> {
        let _active = self.probe.enter();
        self.probe.multipliers.lock().unwrap_or_else(PoisonError::into_inner).push(multiplier);

        if let Some((at, message)) = &self.fault_at {
            if *at == multiplier {
                return Err(EngineError::Hardware(message.clone()));
            }
        }
        let seeded = self.succeed_at.is_some_and(|at| multiplier >= at);
        self.seeded |= seeded;
        Ok(seeded)
    }

    fn generate_block(&mut self, out: &mut [u8]) -> Result<(), EngineError> {
        let _active = self.probe.enter();
        if !self.seeded {
            return Err(EngineError::NotInitialized);
        }
        for byte in out.iter_mut() {
            *byte = self.counter;
            self.counter = self.counter.wrapping_add(1);
        }
        Ok(())
    }

    fn is_initialized(&mut self, _file_id: &str, _key: &DerivedKey) -> EngineStatus {
        let _active = self.probe.enter();
        self.probe.checks.fetch_add(1, Ordering::SeqCst);
        self.pause();
        if self.check_status == EngineStatus::Success {
            self.seeded = true;
        }
        self.check_status
    }

    fn save_state(&mut self) -> EngineStatus {
        let _active = self.probe.enter();
        self.probe.saves.fetch_add(1, Ordering::SeqCst);
        self.pause();
        if self.panic_on_save {
            panic!("mock engine save_state panic");
        }
        self.save_status
    }

    fn destroy(&mut self) {
        let _active = self.probe.enter();
        self.probe.destroys.fetch_add(1, Ordering::SeqCst);
        self.probe.destroyed.store(true, Ordering::SeqCst);
        self.seeded = false;
    }

    fn entropy_strength(&self) -> EntropyStrength {
        self.strength
    }
}
