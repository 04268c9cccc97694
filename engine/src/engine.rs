use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use abyss_types::{
    ConfigError, GameConfig, GameSession, HouseState, LedgerError, SessionStatus, RNG_SEED_LEN,
};
use commonware_cryptography::ed25519::PublicKey;
use tracing::{debug, info, warn};

use crate::errors::EngineError;
use crate::math;
use crate::rng;
use crate::store::SessionStore;

/// Receipt for a freshly opened session: the stake has moved to the house,
/// the worst-case payout is reserved, and round 1 is pending.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionStarted {
    pub session_id: u64,
    pub bet: u64,
    pub max_payout: u64,
    pub round: u16,
    pub survival_ppm: u32,
    pub multiplier_ppm: u64,
    pub created_at: u64,
}

/// Result of resolving one round. `round` is the round that was resolved;
/// `new_value` and `total_value` are the post-round treasure (zero on a
/// loss).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoundOutcome {
    pub session_id: u64,
    pub round: u16,
    pub roll: u32,
    pub threshold: u32,
    pub survived: bool,
    pub survival_ppm: u32,
    pub multiplier_ppm: u64,
    pub new_value: u64,
    pub total_value: u64,
    pub timestamp: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CashOutReceipt {
    pub session_id: u64,
    pub final_amount: u64,
    /// Winnings net of the original stake. Negative cash-outs are impossible
    /// (zero treasure is rejected), but the stake can exceed the floored
    /// round-1 treasure, so this is signed.
    pub profit: i64,
    pub timestamp: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WalletInfo {
    pub balance: u64,
    pub active_sessions: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HouseStatus {
    pub balance: u64,
    pub reserved: u64,
    pub headroom: u64,
    pub total_received: u64,
    pub total_paid_out: u64,
    pub locked: bool,
}

pub(crate) struct EngineState<S: SessionStore> {
    pub(crate) store: S,
    pub(crate) house: HouseState,
    pub(crate) wallets: HashMap<PublicKey, u64>,
}

/// The wagering engine: session lifecycle, round resolution, and the house
/// ledger, all behind one lock so each operation is atomic.
///
/// Preconditions on every transition are checked in a fixed order (session
/// existence and status, then ownership, then round freshness, then value
/// agreement, then bounds) so a given bad request always fails the same way.
pub struct SessionEngine<S: SessionStore> {
    pub(crate) config: GameConfig,
    pub(crate) state: Mutex<EngineState<S>>,
}

impl<S: SessionStore> SessionEngine<S> {
    pub fn new(config: GameConfig, store: S) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            state: Mutex::new(EngineState {
                store,
                house: HouseState::default(),
                wallets: HashMap::new(),
            }),
        })
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, EngineState<S>> {
        // A panic mid-operation leaves no partial mutation behind (commits
        // are single assignments), so a poisoned lock is still consistent.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Credit a player wallet.
    pub fn deposit(&self, owner: &PublicKey, amount: u64) -> Result<u64, EngineError> {
        let mut state = self.lock();
        let balance = state.wallets.entry(owner.clone()).or_insert(0);
        *balance = balance.checked_add(amount).ok_or(EngineError::Overflow)?;
        let balance = *balance;
        debug!(?owner, amount, balance, "wallet deposit");
        Ok(balance)
    }

    /// External funding of the house balance. Returns the new balance.
    pub fn fund_house(&self, amount: u64) -> Result<u64, EngineError> {
        let mut state = self.lock();
        state.house.fund(amount).map_err(ledger_error)?;
        info!(amount, balance = state.house.balance, "house funded");
        Ok(state.house.balance)
    }

    /// Admin withdrawal from the house, capped at the unreserved balance.
    pub fn withdraw_house(&self, amount: u64) -> Result<u64, EngineError> {
        let mut state = self.lock();
        state.house.withdraw(amount).map_err(ledger_error)?;
        info!(amount, balance = state.house.balance, "house withdrawal");
        Ok(state.house.balance)
    }

    /// Flip the house kill-switch. A locked house accepts no new sessions
    /// and settles no cash-outs; live sessions keep playing rounds.
    pub fn set_locked(&self, locked: bool) {
        let mut state = self.lock();
        state.house.locked = locked;
        warn!(locked, "house lock changed");
    }

    pub fn wallet_info(&self, owner: &PublicKey) -> WalletInfo {
        let state = self.lock();
        let balance = state.wallets.get(owner).copied().unwrap_or(0);
        let active_sessions = state
            .store
            .ids()
            .into_iter()
            .filter_map(|id| state.store.get(id))
            .filter(|s| s.status == SessionStatus::Active && &s.owner == owner)
            .count();
        WalletInfo {
            balance,
            active_sessions,
        }
    }

    pub fn house_status(&self) -> HouseStatus {
        let state = self.lock();
        HouseStatus {
            balance: state.house.balance,
            reserved: state.house.reserved,
            headroom: state.house.headroom(self.config.reserve_safety_margin_ppm),
            total_received: state.house.total_received,
            total_paid_out: state.house.total_paid_out,
            locked: state.house.locked,
        }
    }

    pub fn get_session(&self, session_id: u64) -> Option<GameSession> {
        self.lock().store.get(session_id)
    }

    /// Open a session: move the stake from the caller's wallet to the house
    /// and reserve the worst-case payout against the house balance. Either
    /// everything applies or nothing does.
    pub fn start_session(
        &self,
        owner: &PublicKey,
        session_id: u64,
        bet: u64,
        now: u64,
    ) -> Result<SessionStarted, EngineError> {
        self.start_session_inner(owner, session_id, bet, now, rng::generate_seed())
    }

    /// Open a session with a caller-supplied seed, fixing the outcome
    /// sequence. Test harnesses only.
    #[cfg(any(test, feature = "mocks"))]
    pub fn start_session_seeded(
        &self,
        owner: &PublicKey,
        session_id: u64,
        bet: u64,
        now: u64,
        seed: [u8; RNG_SEED_LEN],
    ) -> Result<SessionStarted, EngineError> {
        self.start_session_inner(owner, session_id, bet, now, seed)
    }

    fn start_session_inner(
        &self,
        owner: &PublicKey,
        session_id: u64,
        bet: u64,
        now: u64,
        seed: [u8; RNG_SEED_LEN],
    ) -> Result<SessionStarted, EngineError> {
        let mut guard = self.lock();
        let state = &mut *guard;

        if state.house.locked {
            return Err(EngineError::HouseLocked);
        }
        if state.store.contains(session_id) {
            return Err(EngineError::SessionExists { session_id });
        }
        if bet < self.config.min_bet
            || (self.config.max_bet > 0 && bet > self.config.max_bet)
        {
            return Err(EngineError::BetOutOfBounds {
                bet,
                min: self.config.min_bet,
                max: self.config.max_bet,
            });
        }
        let available = state.wallets.get(owner).copied().unwrap_or(0);
        let remaining = available
            .checked_sub(bet)
            .ok_or(EngineError::InsufficientFunds { bet, available })?;

        let max_payout = math::max_payout_for_bet(bet, self.config.max_payout_multiplier);

        // Stage the ledger mutations on a scratch copy so a reservation
        // failure leaves the house untouched.
        let mut house = state.house.clone();
        house.receive_bet(bet).map_err(ledger_error)?;
        house
            .reserve(max_payout, self.config.reserve_safety_margin_ppm)
            .map_err(ledger_error)?;

        state.house = house;
        state.wallets.insert(owner.clone(), remaining);
        let session = GameSession {
            id: session_id,
            owner: owner.clone(),
            bet,
            treasure: 0,
            max_payout,
            round: 1,
            status: SessionStatus::Active,
            rng_seed: seed,
            created_at: now,
            last_active_at: now,
            ended_at: None,
        };
        state.store.insert(session);

        let stats = math::round_stats(&self.config, 1);
        info!(session_id, bet, max_payout, "session started");
        Ok(SessionStarted {
            session_id,
            bet,
            max_payout,
            round: 1,
            survival_ppm: stats.survival_ppm,
            multiplier_ppm: stats.multiplier_ppm,
            created_at: now,
        })
    }

    /// Resolve the session's next round. The caller must echo the round
    /// number it expects to play and the value it believes is at risk; both
    /// are checked against authoritative state before any roll happens.
    pub fn play_round(
        &self,
        caller: &PublicKey,
        session_id: u64,
        submitted_round: u16,
        submitted_value: u64,
        now: u64,
    ) -> Result<RoundOutcome, EngineError> {
        let mut guard = self.lock();
        let state = &mut *guard;

        let mut session = state
            .store
            .get(session_id)
            .ok_or(EngineError::SessionNotFound { session_id })?;
        if session.status.is_terminal() {
            return Err(EngineError::SessionNotActive {
                session_id,
                status: session.status,
            });
        }
        if &session.owner != caller {
            return Err(EngineError::NotSessionOwner { session_id });
        }
        if submitted_round != session.round {
            return Err(EngineError::RoundMismatch {
                submitted: submitted_round,
                expected: session.round,
            });
        }
        let value_at_risk = session.value_at_risk();
        if submitted_value != value_at_risk {
            return Err(EngineError::ValueMismatch {
                submitted: submitted_value,
                expected: value_at_risk,
            });
        }
        if session.round > self.config.max_rounds {
            return Err(EngineError::MaxRoundsReached {
                round: session.round,
                max: self.config.max_rounds,
            });
        }

        let round = session.round;
        let stats = math::round_stats(&self.config, round);
        let drawn = rng::draw_outcome(&session.rng_seed, round, stats.survival_ppm);

        let new_value = if drawn.survived {
            let grown = math::step_treasure(value_at_risk, stats.multiplier_ppm, session.max_payout);
            session.treasure = grown;
            // Fails before anything is committed if the counter is exhausted.
            session.round = session.round.checked_add(1).ok_or(EngineError::Overflow)?;
            session.last_active_at = now;
            grown
        } else {
            session.mark_lost(now).map_err(|_| EngineError::SessionNotActive {
                session_id,
                status: session.status,
            })?;
            state.house.release(session.max_payout);
            0
        };
        state.store.insert(session);

        debug!(
            session_id,
            round,
            roll = drawn.roll,
            threshold = drawn.threshold,
            survived = drawn.survived,
            new_value,
            "round resolved"
        );
        Ok(RoundOutcome {
            session_id,
            round,
            roll: drawn.roll,
            threshold: drawn.threshold,
            survived: drawn.survived,
            survival_ppm: stats.survival_ppm,
            multiplier_ppm: stats.multiplier_ppm,
            new_value,
            total_value: new_value,
            timestamp: now,
        })
    }

    /// Settle an active session at its current treasure. Requires at least
    /// one survived round; the submitted value must match the treasure.
    pub fn cash_out(
        &self,
        caller: &PublicKey,
        session_id: u64,
        submitted_value: u64,
        now: u64,
    ) -> Result<CashOutReceipt, EngineError> {
        let mut guard = self.lock();
        let state = &mut *guard;

        if state.house.locked {
            return Err(EngineError::HouseLocked);
        }
        let mut session = state
            .store
            .get(session_id)
            .ok_or(EngineError::SessionNotFound { session_id })?;
        if session.status.is_terminal() {
            return Err(EngineError::SessionNotActive {
                session_id,
                status: session.status,
            });
        }
        if &session.owner != caller {
            return Err(EngineError::NotSessionOwner { session_id });
        }
        if submitted_value != session.treasure {
            return Err(EngineError::ValueMismatch {
                submitted: submitted_value,
                expected: session.treasure,
            });
        }
        if session.treasure == 0 {
            return Err(EngineError::ZeroCashOut);
        }

        let payout = session.treasure;
        let wallet_balance = state.wallets.get(caller).copied().unwrap_or(0);
        let credited = wallet_balance
            .checked_add(payout)
            .ok_or(EngineError::Overflow)?;

        let mut house = state.house.clone();
        house.release(session.max_payout);
        house.payout(payout).map_err(ledger_error)?;
        session
            .mark_cashed_out(now)
            .map_err(|_| EngineError::SessionNotActive {
                session_id,
                status: session.status,
            })?;

        state.house = house;
        state.wallets.insert(caller.clone(), credited);
        let bet = session.bet;
        state.store.insert(session);

        let profit = payout as i64 - bet as i64;
        info!(session_id, payout, profit, "session cashed out");
        Ok(CashOutReceipt {
            session_id,
            final_amount: payout,
            profit,
            timestamp: now,
        })
    }
}

fn ledger_error(err: LedgerError) -> EngineError {
    match err {
        LedgerError::ReservationExceedsHeadroom {
            requested,
            headroom,
        } => EngineError::InsufficientLiquidity {
            requested,
            headroom,
        },
        LedgerError::PayoutExceedsBalance { requested, balance } => {
            EngineError::PayoutUnavailable { requested, balance }
        }
        LedgerError::WithdrawalExceedsFree { requested, free } => {
            EngineError::InsufficientLiquidity {
                requested,
                headroom: free,
            }
        }
        LedgerError::ReservedExceedsBalance { .. } | LedgerError::Overflow => EngineError::Overflow,
    }
}
