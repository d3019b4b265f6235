use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Seeded random source for tie-breaks in non-critical choices.
///
/// Owned by a [`Planner`](crate::Planner) and seeded from its
/// configuration, so two planners built with the same seed make the same
/// choices.
pub struct TieBreakRng {
    seed: u64,
    rng: StdRng,
}

impl TieBreakRng {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// The seed the generator was last (re)started from.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Restart the sequence from `seed`.
    pub fn reseed(&mut self, seed: u64) {
        *self = Self::new(seed);
    }

    /// Uniform value in `[0, max)`; always 0 when `max <= 0`.
    pub fn jitter(&mut self, max: f32) -> f32 {
        if max > 0.0 {
            self.rng.random::<f32>() * max
        } else {
            0.0
        }
    }
}

impl std::fmt::Debug for TieBreakRng {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TieBreakRng").field("seed", &self.seed).finish()
    }
}
