use abyss_types::SessionStatus;
use thiserror::Error as ThisError;

/// Classification of engine failures, mirroring the validation layers a
/// transition passes through. Callers branch on this; the variants carry the
/// failing comparison for diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bet or round bounds, or an otherwise malformed request.
    Validation,
    /// Caller is not the session owner.
    Authorization,
    /// Stale or skipped round number.
    Replay,
    /// Client-submitted value disagrees with authoritative state.
    Tamper,
    /// House cannot safely take on (or settle) the requested risk.
    Liquidity,
    /// Session missing, terminal, or the house is locked.
    State,
}

#[derive(Clone, Debug, ThisError, PartialEq, Eq)]
pub enum EngineError {
    #[error("bet {bet} outside allowed range [{min}, {max}]")]
    BetOutOfBounds { bet: u64, min: u64, max: u64 },

    #[error("wallet balance {available} cannot cover bet {bet}")]
    InsufficientFunds { bet: u64, available: u64 },

    #[error("session {session_id} already exists")]
    SessionExists { session_id: u64 },

    #[error("round {round} exceeds maximum {max}")]
    MaxRoundsReached { round: u16, max: u16 },

    #[error("cannot cash out zero treasure (no completed round)")]
    ZeroCashOut,

    #[error("session {session_id} is not owned by the caller")]
    NotSessionOwner { session_id: u64 },

    #[error("round mismatch: submitted {submitted}, expected {expected}")]
    RoundMismatch { submitted: u16, expected: u16 },

    #[error("value mismatch: submitted {submitted}, expected {expected}")]
    ValueMismatch { submitted: u64, expected: u64 },

    #[error("reservation {requested} exceeds house headroom {headroom}")]
    InsufficientLiquidity { requested: u64, headroom: u64 },

    #[error("payout {requested} exceeds house balance {balance}")]
    PayoutUnavailable { requested: u64, balance: u64 },

    #[error("session {session_id} not found")]
    SessionNotFound { session_id: u64 },

    #[error("session {session_id} is {status:?}, expected Active")]
    SessionNotActive {
        session_id: u64,
        status: SessionStatus,
    },

    #[error("house is locked")]
    HouseLocked,

    #[error("accounting counter overflow")]
    Overflow,
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::BetOutOfBounds { .. }
            | EngineError::InsufficientFunds { .. }
            | EngineError::SessionExists { .. }
            | EngineError::MaxRoundsReached { .. }
            | EngineError::ZeroCashOut => ErrorKind::Validation,
            EngineError::NotSessionOwner { .. } => ErrorKind::Authorization,
            EngineError::RoundMismatch { .. } => ErrorKind::Replay,
            EngineError::ValueMismatch { .. } => ErrorKind::Tamper,
            EngineError::InsufficientLiquidity { .. }
            | EngineError::PayoutUnavailable { .. }
            | EngineError::Overflow => ErrorKind::Liquidity,
            EngineError::SessionNotFound { .. }
            | EngineError::SessionNotActive { .. }
            | EngineError::HouseLocked => ErrorKind::State,
        }
    }
}
