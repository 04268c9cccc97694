//! Session repository.
//!
//! The engine is storage-agnostic: it reads, writes, and deletes session
//! records through this trait and never assumes anything about the backing
//! medium. The in-memory implementation backs unit tests and the in-process
//! deployment; a persistent deployment supplies its own adapter.

use abyss_types::GameSession;
use std::collections::HashMap;

pub trait SessionStore {
    /// Fetch a session by id.
    fn get(&self, id: u64) -> Option<GameSession>;

    /// Insert or overwrite a session record keyed by its id.
    fn insert(&mut self, session: GameSession);

    /// Remove a session, returning it if present.
    fn remove(&mut self, id: u64) -> Option<GameSession>;

    /// All session ids currently held, in no particular order.
    fn ids(&self) -> Vec<u64>;

    fn contains(&self, id: u64) -> bool {
        self.get(id).is_some()
    }
}

#[derive(Default)]
pub struct MemoryStore {
    sessions: HashMap<u64, GameSession>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemoryStore {
    fn get(&self, id: u64) -> Option<GameSession> {
        self.sessions.get(&id).cloned()
    }

    fn insert(&mut self, session: GameSession) {
        self.sessions.insert(session.id, session);
    }

    fn remove(&mut self, id: u64) -> Option<GameSession> {
        self.sessions.remove(&id)
    }

    fn ids(&self) -> Vec<u64> {
        self.sessions.keys().copied().collect()
    }
}
