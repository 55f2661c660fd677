//! Deterministic random number generation shared by every participant of a game.
//!
//! A single root generator is seeded from [`GameParams::random_seed`](crate::GameParams). Every
//! consumer gets its own child generator seeded from the next value of the root. As long as all
//! participants fork the same number of children in the same order, each child produces the same
//! sequence on every machine.

use rand_chacha::{
    rand_core::{RngCore, SeedableRng},
    ChaCha8Rng,
};
use tracing::debug;

#[derive(Debug, Default)]
pub struct RandomForker {
    seed: u64,

    /// Created lazily on the first fork so that reseeding before the game starts costs nothing.
    root: Option<ChaCha8Rng>,
}

impl RandomForker {
    pub fn new(seed: u64) -> Self {
        Self { seed, root: None }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Replace the seed. The next fork starts a fresh root sequence.
    pub fn reseed(&mut self, seed: u64) {
        debug!("Reseeding random generator with {}", seed);
        self.seed = seed;
        self.root = None;
    }

    /// Forget the root generator, keeping the seed.
    pub fn reset(&mut self) {
        self.root = None;
    }

    /// Derive a new child generator, advancing the root generator.
    pub fn fork(&mut self) -> ChaCha8Rng {
        let seed = self.seed;
        let root = self
            .root
            .get_or_insert_with(|| ChaCha8Rng::seed_from_u64(seed));
        ChaCha8Rng::seed_from_u64(root.next_u64())
    }
}
