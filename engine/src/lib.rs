//! Abyss session economics engine.
//!
//! A player stakes a fixed bet, then repeatedly risks the accumulated value
//! against a decaying survival probability: each survived round multiplies
//! the value at risk, a failed round forfeits everything, and the player may
//! cash out between rounds. The engine owns the session state machine, the
//! round-outcome math (constant expected value under a configured house
//! edge), the house-liquidity reservation that bounds aggregate payout risk,
//! and the anti-replay/anti-tamper validation on every transition.
//!
//! ## Determinism requirements
//! - No wall-clock reads inside the engine; every operation takes `now` from
//!   the caller.
//! - A session's rolls are fixed by the seed drawn at session start; replays
//!   of the same session resolve identically.
//!
//! ## Atomicity
//! Every operation is linearizable: a single lock covers the session store,
//! the house ledger, and the wallet map, so a state transition and its ledger
//! adjustment are indivisible to concurrent callers. Error paths mutate
//! nothing.

pub mod math;
pub mod rng;

mod engine;
mod errors;
mod reaper;
mod store;

#[cfg(any(test, feature = "mocks"))]
pub mod mocks;

pub use engine::{
    CashOutReceipt, HouseStatus, RoundOutcome, SessionEngine, SessionStarted, WalletInfo,
};
pub use errors::{EngineError, ErrorKind};
pub use reaper::SweptSession;
pub use store::{MemoryStore, SessionStore};

#[cfg(test)]
mod tests;
