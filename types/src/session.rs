use bytes::{Buf, BufMut};
use commonware_codec::{EncodeSize, Error, Read, ReadExt, Write};
use commonware_cryptography::ed25519::PublicKey;
use thiserror::Error as ThisError;

/// Length of the per-session RNG seed.
pub const RNG_SEED_LEN: usize = 32;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionStatus {
    Active,
    Lost,
    CashedOut,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionStatus::Active)
    }
}

#[derive(Debug, ThisError, PartialEq, Eq)]
pub enum TransitionError {
    #[error("session is {status:?}, expected Active")]
    NotActive { status: SessionStatus },
}

#[derive(Debug, ThisError, PartialEq, Eq)]
pub enum SessionInvariantError {
    #[error("treasure {treasure} exceeds max payout {max_payout}")]
    TreasureAboveCap { treasure: u64, max_payout: u64 },
    #[error("round number must start at 1")]
    ZeroRound,
}

/// One wager's full lifecycle record, from stake to terminal outcome.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GameSession {
    pub id: u64,
    pub owner: PublicKey,
    /// Stake, fixed at creation.
    pub bet: u64,
    /// Accumulated value. Zero until round 1 resolves, and zeroed on loss.
    pub treasure: u64,
    /// Worst-case payout (`bet * max_payout_multiplier`), reserved against
    /// the house for the session's lifetime.
    pub max_payout: u64,
    /// The next expected round, starting at 1.
    pub round: u16,
    pub status: SessionStatus,
    /// Seed fixed at creation; every round's roll derives from it.
    pub rng_seed: [u8; RNG_SEED_LEN],
    pub created_at: u64,
    pub last_active_at: u64,
    pub ended_at: Option<u64>,
}

impl GameSession {
    pub fn ensure_active(&self) -> Result<(), TransitionError> {
        match self.status {
            SessionStatus::Active => Ok(()),
            status => Err(TransitionError::NotActive { status }),
        }
    }

    /// The authoritative value a client must echo back when playing the next
    /// round: the stake before round 1 resolves, the treasure afterwards.
    /// `bet` and `treasure` stay distinct fields; round-1 semantics are never
    /// inferred from the treasure being zero.
    pub fn value_at_risk(&self) -> u64 {
        if self.round == 1 {
            self.bet
        } else {
            self.treasure
        }
    }

    /// Sole writer of the ACTIVE -> LOST transition. Zeroes the treasure;
    /// the stake was transferred to the house at session start and stays
    /// there.
    pub fn mark_lost(&mut self, now: u64) -> Result<(), TransitionError> {
        self.ensure_active()?;
        self.status = SessionStatus::Lost;
        self.treasure = 0;
        self.ended_at = Some(now);
        Ok(())
    }

    /// Sole writer of the ACTIVE -> CASHED_OUT transition.
    pub fn mark_cashed_out(&mut self, now: u64) -> Result<(), TransitionError> {
        self.ensure_active()?;
        self.status = SessionStatus::CashedOut;
        self.ended_at = Some(now);
        Ok(())
    }

    /// Whether the session is eligible for forced expiry. Strictly greater
    /// than the threshold; a session exactly at it is left alone.
    pub fn is_expired(&self, now: u64, timeout_secs: u64) -> bool {
        self.status == SessionStatus::Active
            && now.saturating_sub(self.last_active_at) > timeout_secs
    }

    pub fn validate_invariants(&self) -> Result<(), SessionInvariantError> {
        if self.treasure > self.max_payout {
            return Err(SessionInvariantError::TreasureAboveCap {
                treasure: self.treasure,
                max_payout: self.max_payout,
            });
        }
        if self.round == 0 {
            return Err(SessionInvariantError::ZeroRound);
        }
        Ok(())
    }
}

impl Write for SessionStatus {
    fn write(&self, writer: &mut impl BufMut) {
        let discriminant: u8 = match self {
            SessionStatus::Active => 0,
            SessionStatus::Lost => 1,
            SessionStatus::CashedOut => 2,
        };
        discriminant.write(writer);
    }
}

impl Read for SessionStatus {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        match u8::read(reader)? {
            0 => Ok(SessionStatus::Active),
            1 => Ok(SessionStatus::Lost),
            2 => Ok(SessionStatus::CashedOut),
            _ => Err(Error::Invalid("SessionStatus", "unknown status")),
        }
    }
}

impl EncodeSize for SessionStatus {
    fn encode_size(&self) -> usize {
        1
    }
}

impl Write for GameSession {
    fn write(&self, writer: &mut impl BufMut) {
        self.id.write(writer);
        self.owner.write(writer);
        self.bet.write(writer);
        self.treasure.write(writer);
        self.max_payout.write(writer);
        self.round.write(writer);
        self.status.write(writer);
        writer.put_slice(&self.rng_seed);
        self.created_at.write(writer);
        self.last_active_at.write(writer);
        self.ended_at.write(writer);
    }
}

impl Read for GameSession {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        let id = u64::read(reader)?;
        let owner = PublicKey::read(reader)?;
        let bet = u64::read(reader)?;
        let treasure = u64::read(reader)?;
        let max_payout = u64::read(reader)?;
        let round = u16::read(reader)?;
        let status = SessionStatus::read(reader)?;
        if reader.remaining() < RNG_SEED_LEN {
            return Err(Error::EndOfBuffer);
        }
        let mut rng_seed = [0u8; RNG_SEED_LEN];
        reader.copy_to_slice(&mut rng_seed);
        Ok(Self {
            id,
            owner,
            bet,
            treasure,
            max_payout,
            round,
            status,
            rng_seed,
            created_at: u64::read(reader)?,
            last_active_at: u64::read(reader)?,
            ended_at: Option::<u64>::read(reader)?,
        })
    }
}

impl EncodeSize for GameSession {
    fn encode_size(&self) -> usize {
        self.id.encode_size()
            + self.owner.encode_size()
            + self.bet.encode_size()
            + self.treasure.encode_size()
            + self.max_payout.encode_size()
            + self.round.encode_size()
            + self.status.encode_size()
            + RNG_SEED_LEN
            + self.created_at.encode_size()
            + self.last_active_at.encode_size()
            + self.ended_at.encode_size()
    }
}
