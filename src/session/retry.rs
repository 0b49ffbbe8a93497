//! Initialize retry policy.
//!
//! Each attempt passes a growing entropy multiplier to the engine. Every
//! engine answer is classified before the loop decides what to do next:
//!
//! - `Ok(true)`  -> [`Attempt::Seeded`], stop with success.
//! - `Ok(false)` -> [`Attempt::Retry`], try again with more entropy.
//! - `Err(_)`    -> [`Attempt::Fault`], stop; hard faults are never retried.
//!
//! Running out of multipliers yields [`InitOutcome::Exhausted`].

use crate::engine::EngineError;

/// Classification of one engine answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt {
    Seeded,
    Retry,
    Fault(EngineError),
}

impl From<Result<bool, EngineError>> for Attempt {
    fn from(result: Result<bool, EngineError>) -> Self {
        match result {
            Ok(true) => Attempt::Seeded,
            Ok(false) => Attempt::Retry,
            Err(e) => Attempt::Fault(e),
        }
    }
}

/// Terminal state of the retry loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitOutcome {
    Seeded { attempts: u32 },
    Exhausted { attempts: u32 },
    Fault { attempt: u32, error: EngineError },
}

/// Bounded retry over the entropy attempt multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_multiplier: u32,
}

impl RetryPolicy {
    /// Multipliers `0..max_multiplier` will be tried.
    pub fn new(max_multiplier: u32) -> Self {
        Self { max_multiplier }
    }

    /// Calls `attempt` with multipliers 0, 1, 2, ... until it seeds, faults, or the bound is hit.
    pub fn run<F>(&self, mut attempt: F) -> InitOutcome
    where
        F: FnMut(u32) -> Result<bool, EngineError>,
    {
        for multiplier in 0..self.max_multiplier {
            match Attempt::from(attempt(multiplier)) {
                Attempt::Seeded => return InitOutcome::Seeded { attempts: multiplier + 1 },
                Attempt::Retry => log::debug!("Not enough entropy at multiplier {}", multiplier),
                Attempt::Fault(error) => return InitOutcome::Fault { attempt: multiplier + 1, error },
            }
        }
        InitOutcome::Exhausted { attempts: self.max_multiplier }
    }
}
