//! Data model for the abyss session wagering engine.
//!
//! Defines the tunable game configuration, the per-session record and its
//! status machine, and the house ledger. The engine crate layers the round
//! math and orchestration on top of these types; everything here is pure
//! state plus the codecs used to persist it.

mod config;
mod house;
mod session;

pub use config::*;
pub use house::*;
pub use session::*;
