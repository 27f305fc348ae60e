use rand::{rngs::StdRng, RngCore, SeedableRng};

/// Seedable random number generator.
///
/// Randomness is only consumed when rotating to a fresh base address, but a
/// rotation changes every probe that follows, so the seed is kept around:
/// logging it is enough to replay a solve exactly.
#[derive(Debug)]
pub struct Rng {
    seed: u64,
    rng: StdRng,
}

impl Rng {
    /// Creates a generator from a seed value.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            seed,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Creates a generator from a random seed.
    pub fn from_entropy() -> Self {
        Self::from_seed(rand::random())
    }

    /// The seed this generator was created from.
    pub fn seed(&self) -> u64 {
        self.seed
    }
}

impl RngCore for Rng {
    fn next_u32(&mut self) -> u32 {
        self.rng.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.rng.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.rng.fill_bytes(dest);
    }
}

impl Clone for Rng {
    /// Cloning restarts the sequence from the seed.
    fn clone(&self) -> Self {
        Self::from_seed(self.seed)
    }
}
