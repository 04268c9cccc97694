//! Round-outcome math.
//!
//! Survival probability decays linearly with round depth down to a floor,
//! and the payout multiplier for each round is derived so that
//! `survival * multiplier` equals the configured expected-value target
//! (`1.0 - house_edge`) for every round. That constant-EV identity is the
//! central fairness invariant; it holds to within 1 ppm of rounding for all
//! rounds in `1..=max_rounds`.

use abyss_types::{GameConfig, PPM};

/// Per-round survival probability and payout multiplier, both in ppm.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RoundStats {
    pub survival_ppm: u32,
    pub multiplier_ppm: u64,
}

/// Survival probability for `round`: `max(floor, base - decay * (round - 1))`.
pub fn survival_ppm(config: &GameConfig, round: u16) -> u32 {
    let reduction =
        (round.saturating_sub(1) as u64).saturating_mul(config.decay_per_round_ppm as u64);
    let decayed = (config.base_survival_ppm as u64).saturating_sub(reduction);
    decayed.max(config.survival_floor_ppm as u64) as u32
}

/// Payout multiplier for `round`, derived from the EV target. Grows as the
/// survival probability shrinks; with the default curve it is ~1.36x at
/// round 1 and caps out at `target / floor` once the floor is reached.
pub fn multiplier_ppm(config: &GameConfig, round: u16) -> u64 {
    let survival = survival_ppm(config, round) as u128;
    // survival > 0 is guaranteed by config validation (floor > 0).
    ((config.target_ev_ppm() as u128 * PPM as u128) / survival) as u64
}

pub fn round_stats(config: &GameConfig, round: u16) -> RoundStats {
    RoundStats {
        survival_ppm: survival_ppm(config, round),
        multiplier_ppm: multiplier_ppm(config, round),
    }
}

/// Worst-case payout for a bet, capping house risk per session.
pub fn max_payout_for_bet(bet: u64, max_payout_multiplier: u16) -> u64 {
    bet.saturating_mul(max_payout_multiplier as u64)
}

/// Value after one survived round: `min(cap, floor(value * multiplier))`.
pub fn step_treasure(value: u64, multiplier_ppm: u64, max_payout: u64) -> u64 {
    let grown = (value as u128 * multiplier_ppm as u128) / PPM as u128;
    grown.min(max_payout as u128) as u64
}
