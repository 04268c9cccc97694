//! Round outcome drawing.
//!
//! A session's seed is drawn once, from the OS entropy source, at session
//! start. Each round's roll is then `Sha256(seed || round)` reduced to
//! `[0, 1_000_000)`, so the full outcome sequence is fixed before the first
//! round and never influenced by anything the client submits. Seeded
//! construction for test harnesses lives behind the `mocks` feature.

use commonware_cryptography::{sha256::Sha256, Hasher};
use rand::{rngs::OsRng, RngCore};

use abyss_types::{RNG_SEED_LEN, PPM};

/// Rolls are uniform in `[0, ROLL_RANGE)`, the same ppm scale as survival
/// probabilities.
pub const ROLL_RANGE: u32 = PPM;

/// A resolved draw: the roll, the survival threshold it was compared
/// against, and the verdict.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DrawnOutcome {
    pub roll: u32,
    pub threshold: u32,
    pub survived: bool,
}

/// Draw a fresh session seed from the OS CSPRNG.
pub fn generate_seed() -> [u8; RNG_SEED_LEN] {
    let mut seed = [0u8; RNG_SEED_LEN];
    OsRng.fill_bytes(&mut seed);
    seed
}

/// Deterministic roll for a round: first eight bytes of
/// `Sha256(seed || round_le)`, reduced modulo the roll range.
pub fn derive_roll(seed: &[u8; RNG_SEED_LEN], round: u16) -> u32 {
    let mut material = [0u8; RNG_SEED_LEN + 2];
    material[..RNG_SEED_LEN].copy_from_slice(seed);
    material[RNG_SEED_LEN..].copy_from_slice(&round.to_le_bytes());
    let digest = Sha256::hash(&material);
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&digest.as_ref()[..8]);
    (u64::from_le_bytes(buf) % ROLL_RANGE as u64) as u32
}

/// Rolls at or above the threshold survive, so exactly `survival_ppm` of the
/// range is a win.
pub fn survival_threshold(survival_ppm: u32) -> u32 {
    ROLL_RANGE.saturating_sub(survival_ppm)
}

pub fn draw_outcome(seed: &[u8; RNG_SEED_LEN], round: u16, survival_ppm: u32) -> DrawnOutcome {
    let roll = derive_roll(seed, round);
    let threshold = survival_threshold(survival_ppm);
    DrawnOutcome {
        roll,
        threshold,
        survived: roll >= threshold,
    }
}
