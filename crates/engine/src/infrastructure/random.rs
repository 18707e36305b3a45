//! Random implementations and small selection helpers.

use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::infrastructure::ports::RandomPort;

/// System random - uses real randomness.
pub struct SystemRandom;

impl SystemRandom {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SystemRandom {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomPort for SystemRandom {
    fn gen_range(&self, min: i32, max: i32) -> i32 {
        if max <= min {
            return min;
        }
        rand::thread_rng().gen_range(min..=max)
    }
}

/// Reproducible random source.
///
/// The same seed replays the same sequence of draws, which makes a whole
/// generate-and-repair run reproducible.
pub struct SeededRandom {
    rng: Mutex<StdRng>,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl RandomPort for SeededRandom {
    fn gen_range(&self, min: i32, max: i32) -> i32 {
        if max <= min {
            return min;
        }
        let mut rng = match self.rng.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        rng.gen_range(min..=max)
    }
}

/// Seeded source when a seed is configured, system randomness otherwise.
pub fn random_source(seed: Option<u64>) -> Arc<dyn RandomPort> {
    match seed {
        Some(seed) => Arc::new(SeededRandom::new(seed)),
        None => Arc::new(SystemRandom::new()),
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Uniform index into a collection of `len` items.
pub fn pick_index(random: &dyn RandomPort, len: usize) -> Option<usize> {
    if len == 0 {
        return None;
    }
    let max = i32::try_from(len - 1).unwrap_or(i32::MAX);
    usize::try_from(random.gen_range(0, max)).ok()
}

pub fn pick<'a, T>(random: &dyn RandomPort, items: &'a [T]) -> Option<&'a T> {
    pick_index(random, items.len()).and_then(|i| items.get(i))
}

/// Fisher-Yates shuffle driven by the port.
pub fn shuffle<T>(random: &dyn RandomPort, items: &mut [T]) {
    for i in (1..items.len()).rev() {
        if let Some(j) = pick_index(random, i + 1) {
            items.swap(i, j.min(i));
        }
    }
}

/// True with probability `percent / 100`.
pub fn chance(random: &dyn RandomPort, percent: i32) -> bool {
    random.gen_range(1, 100) <= percent
}

/// Fixed random for testing; returns its value clamped into range.
#[cfg(test)]
pub struct FixedRandom(pub i32);

#[cfg(test)]
impl RandomPort for FixedRandom {
    fn gen_range(&self, min: i32, max: i32) -> i32 {
        self.0.clamp(min, max.max(min))
    }
}
