//! Persistence adapter: the graceful-degradation boundary.
//!
//! The session core never talks to a concrete store. It depends on the
//! [`GameStore`] trait plus an explicit reachability signal, so the whole
//! gaming path (create/join/move/broadcast) works identically whether the
//! backing store is healthy, down or absent. A failed save only costs the
//! session its `persisted` flag.
//!
//! [`MemoryStore`] is the shipped implementation: it keeps records and
//! serves stats in memory, and its reachability can be toggled to simulate
//! an outage, which the degradation tests rely on.

use async_trait::async_trait;
use shared::{ClientId, Outcome, PersistenceRecord, PlayerStats};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum StoreError {
    #[error("persistence store unreachable")]
    Unavailable,
}

/// Narrow save/load interface to whatever durable store backs the arena.
/// Both operations may fail independently of game logic and must never be
/// allowed to raise past the session store boundary.
#[async_trait]
pub trait GameStore: Send + Sync {
    /// Durably records one completed session.
    async fn save(&self, record: &PersistenceRecord) -> Result<(), StoreError>;

    /// Aggregated stats for one player.
    async fn load_stats(&self, player_id: ClientId) -> Result<PlayerStats, StoreError>;
}

/// In-memory store with a switchable reachability flag.
pub struct MemoryStore {
    records: Mutex<Vec<PersistenceRecord>>,
    reachable: AtomicBool,
    save_attempts: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            reachable: AtomicBool::new(true),
            save_attempts: AtomicU64::new(0),
        }
    }

    /// Simulates the store going down (false) or recovering (true).
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// How many saves have been attempted, successful or not.
    pub fn save_attempts(&self) -> u64 {
        self.save_attempts.load(Ordering::SeqCst)
    }

    pub fn records(&self) -> Vec<PersistenceRecord> {
        self.records.lock().expect("records lock poisoned").clone()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GameStore for MemoryStore {
    async fn save(&self, record: &PersistenceRecord) -> Result<(), StoreError> {
        self.save_attempts.fetch_add(1, Ordering::SeqCst);
        if !self.reachable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable);
        }
        self.records
            .lock()
            .expect("records lock poisoned")
            .push(record.clone());
        Ok(())
    }

    async fn load_stats(&self, player_id: ClientId) -> Result<PlayerStats, StoreError> {
        if !self.reachable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable);
        }

        let records = self.records.lock().expect("records lock poisoned");
        let mut stats = PlayerStats::default();
        for record in records.iter() {
            if !record.participants.contains(&player_id) {
                continue;
            }
            stats.games_played += 1;
            if let Outcome::Winner { client_id } = record.outcome {
                if client_id == player_id {
                    stats.wins += 1;
                } else {
                    stats.losses += 1;
                }
            }
        }

        Ok(stats)
    }
}
