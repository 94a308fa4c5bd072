//! Session lifecycle and the in-memory session table.
//!
//! This module owns every active game session:
//! - Creation, joining, leaving and move application
//! - The one-way status machine WaitingForPlayers -> Running -> Ended
//! - Per-session serialization: each session sits behind its own mutex, so
//!   at most one join/leave/move is in flight per session while unrelated
//!   sessions proceed concurrently
//! - Passive reaping of Ended sessions after a grace window
//!
//! The table itself is a `RwLock<HashMap>`: lookups take a short read lock
//! and clone the session's `Arc`, structural insert/delete takes a short
//! write lock. Cross-references are ids only (a session stores participant
//! ids, never connections), so teardown is index bookkeeping, not link
//! chasing.
//!
//! Broadcasts happen through the [`BroadcastRouter`] while the session's
//! lock is held, which is what gives one session's update stream its
//! ordering guarantee.

use crate::broadcast::BroadcastRouter;
use crate::error::ArenaError;
use crate::games::GameState;
use log::{debug, info, warn};
use serde_json::json;
use shared::{ClientId, GameKind, Outcome, PersistenceRecord, SessionId, SessionStatus};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};

/// One running game instance and its bookkeeping.
#[derive(Debug)]
pub struct Session {
    pub id: SessionId,
    pub game_kind: GameKind,
    /// Current participants in join order. Bounded by
    /// `game_kind.max_players()`.
    pub participants: Vec<ClientId>,
    /// Everyone who ever joined, for the persistence record.
    pub roster: Vec<ClientId>,
    pub status: SessionStatus,
    pub outcome: Option<Outcome>,
    /// Whether the final record reached the persistence store.
    pub persisted: bool,
    game: Option<GameState>,
    created_at: Instant,
    started_at: Option<Instant>,
    ended_at: Option<Instant>,
}

impl Session {
    pub fn new(id: SessionId, game_kind: GameKind, creator: ClientId) -> Self {
        Self {
            id,
            game_kind,
            participants: vec![creator],
            roster: vec![creator],
            status: SessionStatus::WaitingForPlayers,
            outcome: None,
            persisted: false,
            game: None,
            created_at: Instant::now(),
            started_at: None,
            ended_at: None,
        }
    }

    /// Complete state needed to render this session: lifecycle metadata
    /// plus the game's own fields once the game exists.
    pub fn snapshot(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        map.insert("session_id".to_string(), json!(self.id));
        map.insert("game_kind".to_string(), json!(self.game_kind));
        map.insert("status".to_string(), json!(self.status));
        map.insert("participants".to_string(), json!(self.participants));
        if let Some(game) = &self.game {
            if let serde_json::Value::Object(fields) = game.snapshot() {
                map.extend(fields);
            }
        }
        serde_json::Value::Object(map)
    }

    fn age_at_end(&self) -> Duration {
        self.started_at.unwrap_or(self.created_at).elapsed()
    }

    fn reapable(&self, grace: Duration) -> bool {
        self.status == SessionStatus::Ended
            && self.ended_at.map(|t| t.elapsed() > grace).unwrap_or(false)
    }
}

/// Result of a session-store operation, carrying everything the arena
/// needs to follow up: which sends failed (disconnect cascade) and whether
/// the session ended (persistence attempt).
#[derive(Debug, Default)]
pub struct OpOutput {
    pub session_id: SessionId,
    pub failed_sends: Vec<ClientId>,
    pub ended: Option<EndedSession>,
}

/// Handed to the arena exactly once per ended session.
#[derive(Debug)]
pub struct EndedSession {
    /// Kept alive so the persistence task can flip `persisted` on success.
    pub session: Arc<Mutex<Session>>,
    pub record: PersistenceRecord,
}

/// In-memory table of active sessions plus a client -> session index.
///
/// Lock order everywhere: table read/write, then a session's mutex, then
/// the membership index. Never the reverse.
pub struct SessionStore {
    sessions: RwLock<HashMap<SessionId, Arc<Mutex<Session>>>>,
    membership: RwLock<HashMap<ClientId, SessionId>>,
    next_session_id: AtomicU64,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            membership: RwLock::new(HashMap::new()),
            next_session_id: AtomicU64::new(1),
        }
    }

    async fn lookup(&self, session_id: SessionId) -> Result<Arc<Mutex<Session>>, ArenaError> {
        self.sessions
            .read()
            .await
            .get(&session_id)
            .cloned()
            .ok_or(ArenaError::SessionNotFound(session_id))
    }

    /// Creates a session in WaitingForPlayers with the creator as first
    /// participant and sends the creator its initial snapshot. Creation
    /// never fails: a creator still occupying a session is moved out of it
    /// first, with the usual leave consequences (an abandoned old session
    /// shows up in the returned output).
    pub async fn create_session(
        &self,
        game_kind: GameKind,
        creator: ClientId,
        router: &BroadcastRouter,
    ) -> OpOutput {
        let session_id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        let session = Arc::new(Mutex::new(Session::new(session_id, game_kind, creator)));

        self.sessions
            .write()
            .await
            .insert(session_id, Arc::clone(&session));

        let guard = session.lock().await;
        let mut failed_sends = Vec::new();
        let mut ended = None;

        // Vacate-then-claim until the claim sticks: the emptiness check and
        // the insert share one write-lock acquisition, so a concurrent
        // operation for the same client cannot slip in between them.
        loop {
            {
                let mut membership = self.membership.write().await;
                if !membership.contains_key(&creator) {
                    membership.insert(creator, session_id);
                    break;
                }
            }
            if let Some(prior) = self.leave_session(creator, router).await {
                debug!(
                    "Client {} moved out of session {} by create",
                    creator, prior.session_id
                );
                failed_sends.extend(prior.failed_sends);
                ended = prior.ended.or(ended);
            }
        }

        failed_sends.extend(router.state_update(&guard).await);

        info!(
            "Created {} session {} for client {}",
            game_kind.label(),
            session_id,
            creator
        );

        OpOutput {
            session_id,
            failed_sends,
            ended,
        }
    }

    /// Adds a client to a waiting session. Reaching the game's minimum
    /// flips the session to Running and fires the initial state broadcast
    /// to every participant.
    pub async fn join_session(
        &self,
        session_id: SessionId,
        client_id: ClientId,
        router: &BroadcastRouter,
    ) -> Result<OpOutput, ArenaError> {
        let session = self.lookup(session_id).await?;
        let mut guard = session.lock().await;

        match guard.status {
            SessionStatus::WaitingForPlayers => {}
            SessionStatus::Running => return Err(ArenaError::AlreadyStarted(session_id)),
            // An Ended session only lingers for its final broadcast; to a
            // joiner it no longer exists.
            SessionStatus::Ended => return Err(ArenaError::SessionNotFound(session_id)),
        }

        if guard.participants.len() >= guard.game_kind.max_players() {
            return Err(ArenaError::AlreadyFull(session_id));
        }

        // Occupancy check and claim under one write-lock acquisition, so
        // two concurrent joins for the same client cannot both pass.
        {
            let mut membership = self.membership.write().await;
            if membership.contains_key(&client_id) {
                return Err(ArenaError::AlreadyInSession(client_id));
            }
            membership.insert(client_id, session_id);
        }

        guard.participants.push(client_id);
        guard.roster.push(client_id);

        if guard.participants.len() >= guard.game_kind.min_players() {
            let game = GameState::new(guard.game_kind, &guard.participants);
            guard.game = Some(game);
            guard.status = SessionStatus::Running;
            guard.started_at = Some(Instant::now());
            info!("Session {} is running: {:?}", session_id, guard.participants);
        }

        let failed_sends = router.state_update(&guard).await;

        Ok(OpOutput {
            session_id,
            failed_sends,
            ended: None,
        })
    }

    /// Removes a client from whatever session it occupies. A Running
    /// session that drops below its minimum ends as Abandoned (final
    /// broadcast + persistence record); an emptied waiting session is
    /// deleted on the spot. Returns `None` if the client was in no session.
    pub async fn leave_session(
        &self,
        client_id: ClientId,
        router: &BroadcastRouter,
    ) -> Option<OpOutput> {
        let session_id = self.membership.write().await.remove(&client_id)?;
        let session = match self.lookup(session_id).await {
            Ok(s) => s,
            Err(_) => return None,
        };

        let mut guard = session.lock().await;
        guard.participants.retain(|&c| c != client_id);
        debug!("Client {} left session {}", client_id, session_id);

        match guard.status {
            SessionStatus::WaitingForPlayers if guard.participants.is_empty() => {
                drop(guard);
                self.sessions.write().await.remove(&session_id);
                info!("Deleted empty waiting session {}", session_id);
                Some(OpOutput {
                    session_id,
                    ..Default::default()
                })
            }
            SessionStatus::WaitingForPlayers => {
                let failed_sends = router.state_update(&guard).await;
                Some(OpOutput {
                    session_id,
                    failed_sends,
                    ended: None,
                })
            }
            SessionStatus::Running
                if guard.participants.len() < guard.game_kind.min_players() =>
            {
                let record = self.end_locked(&mut guard, Outcome::Abandoned).await;
                let failed_sends = router.session_ended(&guard).await;
                Some(OpOutput {
                    session_id,
                    failed_sends,
                    ended: Some(EndedSession {
                        session: Arc::clone(&session),
                        record,
                    }),
                })
            }
            SessionStatus::Running => {
                let failed_sends = router.state_update(&guard).await;
                Some(OpOutput {
                    session_id,
                    failed_sends,
                    ended: None,
                })
            }
            // Already ended; the final broadcast has been sent.
            SessionStatus::Ended => Some(OpOutput {
                session_id,
                ..Default::default()
            }),
        }
    }

    /// Applies one participant's move and broadcasts the updated snapshot.
    /// A move that decides the game ends the session with a Winner outcome.
    /// InvalidMove is reported to the caller only; the session continues.
    pub async fn apply_move(
        &self,
        session_id: SessionId,
        client_id: ClientId,
        payload: &serde_json::Value,
        router: &BroadcastRouter,
    ) -> Result<OpOutput, ArenaError> {
        let session = self.lookup(session_id).await?;
        let mut guard = session.lock().await;

        if !guard.participants.contains(&client_id) {
            return Err(ArenaError::NotParticipant {
                session_id,
                client_id,
            });
        }
        if guard.status != SessionStatus::Running {
            return Err(ArenaError::NotRunning(session_id));
        }

        let game = guard
            .game
            .as_mut()
            .ok_or(ArenaError::NotRunning(session_id))?;
        if let Err(e) = game.apply_move(client_id, payload) {
            warn!(
                "Dropped invalid move from client {} in session {}: {}",
                client_id, session_id, e
            );
            return Err(e);
        }

        if let Some(winner) = game.winner() {
            let record = self
                .end_locked(&mut guard, Outcome::Winner { client_id: winner })
                .await;
            let failed_sends = router.session_ended(&guard).await;
            return Ok(OpOutput {
                session_id,
                failed_sends,
                ended: Some(EndedSession {
                    session: Arc::clone(&session),
                    record,
                }),
            });
        }

        let failed_sends = router.state_update(&guard).await;
        Ok(OpOutput {
            session_id,
            failed_sends,
            ended: None,
        })
    }

    /// Advances time-driven games one step and broadcasts the sessions that
    /// changed. Called from the server's tick interval.
    pub async fn tick_sessions(&self, router: &BroadcastRouter) -> Vec<OpOutput> {
        let snapshot: Vec<(SessionId, Arc<Mutex<Session>>)> = {
            let sessions = self.sessions.read().await;
            sessions.iter().map(|(id, s)| (*id, Arc::clone(s))).collect()
        };

        let mut outputs = Vec::new();
        for (session_id, session) in snapshot {
            let mut guard = session.lock().await;
            if guard.status != SessionStatus::Running {
                continue;
            }
            let Some(game) = guard.game.as_mut() else {
                continue;
            };
            if !game.tick() {
                continue;
            }

            if let Some(winner) = game.winner() {
                let record = self
                    .end_locked(&mut guard, Outcome::Winner { client_id: winner })
                    .await;
                let failed_sends = router.session_ended(&guard).await;
                outputs.push(OpOutput {
                    session_id,
                    failed_sends,
                    ended: Some(EndedSession {
                        session: Arc::clone(&session),
                        record,
                    }),
                });
            } else {
                let failed_sends = router.state_update(&guard).await;
                outputs.push(OpOutput {
                    session_id,
                    failed_sends,
                    ended: None,
                });
            }
        }

        outputs
    }

    /// Removes Ended sessions older than the grace window. Sessions whose
    /// lock is held are picked up by a later sweep; this is a passive
    /// bound on memory, not a deadline.
    pub async fn reap_ended(&self, grace: Duration) -> Vec<SessionId> {
        let mut reaped = Vec::new();
        let mut sessions = self.sessions.write().await;

        sessions.retain(|&id, session| match session.try_lock() {
            Ok(guard) if guard.reapable(grace) => {
                reaped.push(id);
                false
            }
            _ => true,
        });
        drop(sessions);

        if !reaped.is_empty() {
            info!("Reaped ended sessions: {:?}", reaped);
        }
        reaped
    }

    /// Flips status to Ended, records the outcome and clears the membership
    /// index for everyone still in the session. Caller holds the session's
    /// lock and is responsible for the final broadcast.
    async fn end_locked(&self, session: &mut Session, outcome: Outcome) -> PersistenceRecord {
        session.status = SessionStatus::Ended;
        session.outcome = Some(outcome);
        session.ended_at = Some(Instant::now());

        let mut membership = self.membership.write().await;
        for client_id in &session.participants {
            membership.remove(client_id);
        }
        drop(membership);

        info!("Session {} ended: {:?}", session.id, outcome);

        PersistenceRecord {
            session_id: session.id,
            game_kind: session.game_kind,
            participants: session.roster.clone(),
            outcome,
            duration: session.age_at_end(),
        }
    }

    /// Session the client currently occupies, if any.
    pub async fn session_of(&self, client_id: ClientId) -> Option<SessionId> {
        self.membership.read().await.get(&client_id).copied()
    }

    pub async fn status_of(&self, session_id: SessionId) -> Option<SessionStatus> {
        let session = self.sessions.read().await.get(&session_id).cloned()?;
        let guard = session.lock().await;
        Some(guard.status)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
