//! Forced expiry of abandoned sessions.
//!
//! Active sessions hold a liquidity reservation for their worst-case payout,
//! so an abandoned session pins house funds indefinitely. A sweep forfeits
//! every session idle for strictly longer than the configured timeout:
//! the reservation is released and the session is marked LOST with no
//! refund, exactly as if the player had failed a round.

use tracing::info;

use crate::engine::SessionEngine;
use crate::store::SessionStore;

/// Record of one forfeited session from a sweep.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SweptSession {
    pub session_id: u64,
    /// Treasure forfeited to the house (zero if round 1 never resolved).
    pub forfeited: u64,
    /// Reservation returned to house headroom.
    pub released: u64,
}

impl<S: SessionStore> SessionEngine<S> {
    /// Sweep every expired session in one atomic pass. Idempotent: already
    /// terminal sessions are never swept again, and a sweep at the exact
    /// timeout boundary touches nothing.
    pub fn sweep_expired(&self, now: u64) -> Vec<SweptSession> {
        let timeout = self.config.session_timeout_secs;
        let mut guard = self.lock();
        let state = &mut *guard;

        let mut swept = Vec::new();
        for id in state.store.ids() {
            let Some(mut session) = state.store.get(id) else {
                continue;
            };
            if !session.is_expired(now, timeout) {
                continue;
            }
            let forfeited = session.treasure;
            let released = session.max_payout;
            if session.mark_lost(now).is_err() {
                // is_expired only matches ACTIVE sessions.
                continue;
            }
            state.house.release(released);
            state.store.insert(session);
            swept.push(SweptSession {
                session_id: id,
                forfeited,
                released,
            });
        }
        if !swept.is_empty() {
            info!(count = swept.len(), "swept expired sessions");
        }
        swept
    }

    /// Ids of sessions that a sweep at `now` would forfeit.
    pub fn expired_sessions(&self, now: u64) -> Vec<u64> {
        let timeout = self.config.session_timeout_secs;
        let state = self.lock();
        state
            .store
            .ids()
            .into_iter()
            .filter_map(|id| state.store.get(id))
            .filter(|s| s.is_expired(now, timeout))
            .map(|s| s.id)
            .collect()
    }
}
