#![forbid(unsafe_code)]

use crate::{Error, Result};
use rand_chacha::ChaCha20Rng;
use rand_core::{CryptoRng, RngCore, SeedableRng};
use tracing::debug;
use zeroize::Zeroize;

/// Cryptographically strong random bytes for key generation.
///
/// Created once per harness run and shared by every handshake of that run.
/// Sessions and parallel workers take a [`fork`](Self::fork) so they never
/// share stream positions.
pub struct RandomSource {
    rng: ChaCha20Rng,
    label: &'static str,
}

impl RandomSource {
    /// Seed a new source from the operating system.
    pub fn new() -> Result<Self> {
        let mut seed = [0u8; 32];
        getrandom::getrandom(&mut seed).map_err(|e| Error::RandomUnavailable(e.to_string()))?;
        let rng = ChaCha20Rng::from_seed(seed);
        seed.zeroize();
        debug!("random source created from OS entropy");
        Ok(Self { rng, label: "os" })
    }

    /// Deterministic source, for reproducible test runs.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self { rng: ChaCha20Rng::from_seed(seed), label: "seeded" }
    }

    /// Derive an independent child source.
    pub fn fork(&mut self) -> Self {
        let mut seed = [0u8; 32];
        self.rng.fill_bytes(&mut seed);
        let rng = ChaCha20Rng::from_seed(seed);
        seed.zeroize();
        Self { rng, label: "fork" }
    }
}

impl RngCore for RandomSource {
    fn next_u32(&mut self) -> u32 { self.rng.next_u32() }
    fn next_u64(&mut self) -> u64 { self.rng.next_u64() }
    fn fill_bytes(&mut self, dest: &mut [u8]) { self.rng.fill_bytes(dest) }
    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> core::result::Result<(), rand_core::Error> {
        self.rng.try_fill_bytes(dest)
    }
}

impl CryptoRng for RandomSource {}

impl Drop for RandomSource {
    fn drop(&mut self) {
        if self.label != "fork" {
            debug!(source = self.label, "random source released");
        }
    }
}

impl core::fmt::Debug for RandomSource {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RandomSource").field("label", &self.label).finish_non_exhaustive()
    }
}
