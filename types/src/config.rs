use bytes::{Buf, BufMut};
use commonware_codec::{EncodeSize, Error, Read, ReadExt, Write};
use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;

/// Fixed-point scale for probabilities and multipliers (1_000_000 = 1.0).
pub const PPM: u32 = 1_000_000;

#[derive(Debug, ThisError, PartialEq, Eq)]
pub enum ConfigError {
    #[error("survival floor must be positive")]
    ZeroSurvivalFloor,
    #[error("base survival {got}ppm exceeds 100%")]
    BaseSurvivalAboveUnit { got: u32 },
    #[error("survival floor {floor}ppm exceeds base survival {base}ppm")]
    FloorAboveBase { floor: u32, base: u32 },
    #[error("house edge {got}ppm must be below 100%")]
    EdgeAboveUnit { got: u32 },
    #[error("max payout multiplier must be positive")]
    ZeroMaxPayoutMultiplier,
    #[error("max rounds must be positive")]
    ZeroMaxRounds,
    #[error("min bet {min} exceeds max bet {max}")]
    BetBoundsInverted { min: u64, max: u64 },
    #[error("reserve safety margin {got}ppm must be below 100%")]
    SafetyMarginAboveUnit { got: u32 },
}

/// Tunable game parameters, immutable once the engine is constructed.
///
/// Every field has a documented default and can be overridden individually
/// from JSON via [`GameConfig::from_json`]; unset fields fall back to the
/// defaults. [`GameConfig::validate`] is the single source of truth for
/// parameter sanity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Survival probability at round 1.
    pub base_survival_ppm: u32,
    /// Linear reduction applied per round past the first.
    pub decay_per_round_ppm: u32,
    /// Survival probability never decays below this floor.
    pub survival_floor_ppm: u32,
    /// Fraction by which the per-round expected value is held below 1.0.
    /// The payout multiplier for each round is derived from this so that
    /// `survival * multiplier` is constant across rounds.
    pub house_edge_ppm: u32,
    /// Worst-case payout cap, as a multiple of the bet.
    pub max_payout_multiplier: u16,
    /// Hard cap on rounds per session.
    pub max_rounds: u16,
    /// Smallest accepted bet.
    pub min_bet: u64,
    /// Largest accepted bet. Zero means unbounded.
    pub max_bet: u64,
    /// Fraction of the house balance held back from all reservations.
    pub reserve_safety_margin_ppm: u32,
    /// Sessions idle longer than this are eligible for forced expiry.
    pub session_timeout_secs: u64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            base_survival_ppm: 700_000,       // 70% at round 1
            decay_per_round_ppm: 50_000,      // -5% per round
            survival_floor_ppm: 10_000,       // 1% floor
            house_edge_ppm: 50_000,           // 5% edge, EV held at 0.95
            max_payout_multiplier: 100,
            max_rounds: 50,
            min_bet: 10,
            max_bet: 10_000,
            reserve_safety_margin_ppm: 100_000, // 10% of balance never at risk
            session_timeout_secs: 3_600,
        }
    }
}

impl GameConfig {
    /// Parse a partial override from JSON. Missing fields keep their
    /// defaults; the result still needs [`GameConfig::validate`].
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Per-round expected value target in ppm (`1.0 - house_edge`).
    pub fn target_ev_ppm(&self) -> u32 {
        PPM - self.house_edge_ppm
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.survival_floor_ppm == 0 {
            return Err(ConfigError::ZeroSurvivalFloor);
        }
        if self.base_survival_ppm > PPM {
            return Err(ConfigError::BaseSurvivalAboveUnit {
                got: self.base_survival_ppm,
            });
        }
        if self.survival_floor_ppm > self.base_survival_ppm {
            return Err(ConfigError::FloorAboveBase {
                floor: self.survival_floor_ppm,
                base: self.base_survival_ppm,
            });
        }
        if self.house_edge_ppm >= PPM {
            return Err(ConfigError::EdgeAboveUnit {
                got: self.house_edge_ppm,
            });
        }
        if self.max_payout_multiplier == 0 {
            return Err(ConfigError::ZeroMaxPayoutMultiplier);
        }
        if self.max_rounds == 0 {
            return Err(ConfigError::ZeroMaxRounds);
        }
        if self.max_bet > 0 && self.min_bet > self.max_bet {
            return Err(ConfigError::BetBoundsInverted {
                min: self.min_bet,
                max: self.max_bet,
            });
        }
        if self.reserve_safety_margin_ppm >= PPM {
            return Err(ConfigError::SafetyMarginAboveUnit {
                got: self.reserve_safety_margin_ppm,
            });
        }
        Ok(())
    }
}

impl Write for GameConfig {
    fn write(&self, writer: &mut impl BufMut) {
        self.base_survival_ppm.write(writer);
        self.decay_per_round_ppm.write(writer);
        self.survival_floor_ppm.write(writer);
        self.house_edge_ppm.write(writer);
        self.max_payout_multiplier.write(writer);
        self.max_rounds.write(writer);
        self.min_bet.write(writer);
        self.max_bet.write(writer);
        self.reserve_safety_margin_ppm.write(writer);
        self.session_timeout_secs.write(writer);
    }
}

impl Read for GameConfig {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        Ok(Self {
            base_survival_ppm: u32::read(reader)?,
            decay_per_round_ppm: u32::read(reader)?,
            survival_floor_ppm: u32::read(reader)?,
            house_edge_ppm: u32::read(reader)?,
            max_payout_multiplier: u16::read(reader)?,
            max_rounds: u16::read(reader)?,
            min_bet: u64::read(reader)?,
            max_bet: u64::read(reader)?,
            reserve_safety_margin_ppm: u32::read(reader)?,
            session_timeout_secs: u64::read(reader)?,
        })
    }
}

impl EncodeSize for GameConfig {
    fn encode_size(&self) -> usize {
        self.base_survival_ppm.encode_size()
            + self.decay_per_round_ppm.encode_size()
            + self.survival_floor_ppm.encode_size()
            + self.house_edge_ppm.encode_size()
            + self.max_payout_multiplier.encode_size()
            + self.max_rounds.encode_size()
            + self.min_bet.encode_size()
            + self.max_bet.encode_size()
            + self.reserve_safety_margin_ppm.encode_size()
            + self.session_timeout_secs.encode_size()
    }
}
