//! Random number generator abstraction for particle synthesis.
//!
//! Every randomized step of the engine (shape jitter, placement sampling,
//! salt noise, background noise) draws from a `SynthRng` trait object, so
//! callers decide between a reproducible seeded source and an entropy-seeded
//! one:
//!
//! - `StdRandom::from_u64_seed`: deterministic, used by tests
//! - `StdRandom::from_entropy`: the process default for interactive use
//!
//! # Example
//!
//! ```ignore
//! use particle_core::rng::{StdRandom, SynthRng};
//!
//! let mut rng = StdRandom::from_u64_seed(42);
//! let x = rng.next_int_range(10, 20); // 10..20
//! let v = rng.next_double(); // 0.0..1.0
//! let g = rng.next_gaussian(0.5, 0.1);
//! ```

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

/// Trait for random sources used by the synthesis engine.
///
/// Kept object-safe so the engine can take `&mut dyn SynthRng` everywhere.
pub trait SynthRng: SynthRngClone {
    /// Returns a random integer in [min, max).
    ///
    /// Returns `min` when the range is empty.
    fn next_int_range(&mut self, min: i64, max: i64) -> i64;

    /// Returns a random double in [0.0, 1.0).
    fn next_double(&mut self) -> f64;

    /// Returns a sample from the standard normal distribution.
    fn next_standard_normal(&mut self) -> f64;

    /// Returns a random usize in [0, max).
    fn next_usize_max(&mut self, max: usize) -> usize {
        if max == 0 {
            return 0;
        }
        (self.next_int_range(0, max as i64)) as usize
    }

    /// Returns a gaussian sample with the given mean and standard deviation.
    fn next_gaussian(&mut self, mean: f64, std_dev: f64) -> f64 {
        mean + std_dev * self.next_standard_normal()
    }
}

/// Pick `count` distinct values from `pool`, in random order.
///
/// Partial Fisher-Yates; when `count` exceeds the pool the whole pool is
/// returned shuffled. Free function since generic methods aren't dyn-compatible.
pub fn choose_distinct(pool: &[f64], count: usize, rng: &mut dyn SynthRng) -> Vec<f64> {
    let mut values = pool.to_vec();
    let take = count.min(values.len());
    for i in 0..take {
        let j = i + rng.next_usize_max(values.len() - i);
        values.swap(i, j);
    }
    values.truncate(take);
    values
}

/// Evenly spaced values in [start, stop) with the given step.
pub fn arange(start: f64, stop: f64, step: f64) -> Vec<f64> {
    if step <= 0.0 || stop <= start {
        return Vec::new();
    }
    // Absorb representation error so 2.0 / 0.05 counts 40 values, not 41.
    let count = ((stop - start) / step - 1e-9).ceil() as usize;
    (0..count).map(|i| start + i as f64 * step).collect()
}

/// Helper trait for cloning boxed SynthRng trait objects.
pub trait SynthRngClone {
    fn clone_box(&self) -> Box<dyn SynthRng>;
}

impl<T: SynthRng + Clone + 'static> SynthRngClone for T {
    fn clone_box(&self) -> Box<dyn SynthRng> {
        Box::new(self.clone())
    }
}

impl Clone for Box<dyn SynthRng> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Standard Rust RNG wrapper using `rand::rngs::StdRng`.
#[derive(Clone)]
pub struct StdRandom {
    rng: StdRng,
}

impl StdRandom {
    /// Create from a u64 seed. Same seed, same sequence.
    pub fn from_u64_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Create from OS entropy.
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }
}

impl SynthRng for StdRandom {
    fn next_int_range(&mut self, min: i64, max: i64) -> i64 {
        if min >= max {
            return min;
        }
        self.rng.gen_range(min..max)
    }

    fn next_double(&mut self) -> f64 {
        self.rng.gen()
    }

    fn next_standard_normal(&mut self) -> f64 {
        self.rng.sample(StandardNormal)
    }
}
