//! Session registry, grounded on `SessionManager` (duplicate-login kicks
//! the old session, a single mutual-exclusion index keyed by session id)
//! but reworked around a player-username index instead of a Mongo
//! `ObjectId`-keyed account, since sessions here authenticate directly
//! against `Player` rows rather than a separate account/character split.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use tokio::sync::{mpsc, Mutex as AsyncMutex};

use crate::domain::EntityId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Greeting,
    Menu,
    AuthUser,
    AuthPass,
    RegisterUser,
    RegisterPass,
    Playing,
    Quitting,
}

#[derive(Debug, Default)]
pub struct SessionFlags {
    pub logging_out: bool,
    pub following: Option<EntityId>,
}

/// The mutable part of a session's state. Reader-task mutation is already
/// serialized (one reader per connection processes lines one at a time);
/// this lock exists so command handlers running from other contexts
/// (follow-chain recursion, broadcasts reading `current_room_id`) can read
/// or adjust it safely too.
pub struct SessionState {
    pub phase: SessionPhase,
    pub player_id: Option<EntityId>,
    pub username: Option<String>,
    pub is_admin: bool,
    pub current_room_id: Option<EntityId>,
    pub pending_username: Option<String>,
    pub auth_failures: u32,
    pub last_activity: Instant,
    pub flags: SessionFlags,
}

impl SessionState {
    fn new() -> Self {
        Self {
            phase: SessionPhase::Greeting,
            player_id: None,
            username: None,
            is_admin: false,
            current_room_id: None,
            pending_username: None,
            auth_failures: 0,
            last_activity: Instant::now(),
            flags: SessionFlags::default(),
        }
    }
}

/// A session's outbound queue is a plain channel, not protected by
/// `SessionState`'s lock, so sending a message to a session never contends
/// with reads/writes of its phase or room.
#[derive(Clone)]
pub struct SessionHandle {
    pub session_id: EntityId,
    pub remote_addr: SocketAddr,
    pub outbound: mpsc::UnboundedSender<String>,
    pub state: Arc<AsyncMutex<SessionState>>,
}

impl SessionHandle {
    pub fn send_line(&self, line: String) {
        // A send failure means the writer task / socket is already gone;
        // the reader loop will notice on its next read and clean up.
        let _ = self.outbound.send(line);
    }

    pub async fn display_name(&self) -> String {
        self.state
            .lock()
            .await
            .username
            .clone()
            .unwrap_or_else(|| "someone".to_string())
    }
}

#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<DashMap<EntityId, SessionHandle>>,
    sessions_by_username: Arc<DashMap<String, EntityId>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &self,
        session_id: EntityId,
        remote_addr: SocketAddr,
        outbound: mpsc::UnboundedSender<String>,
    ) -> SessionHandle {
        let handle = SessionHandle {
            session_id: session_id.clone(),
            remote_addr,
            outbound,
            state: Arc::new(AsyncMutex::new(SessionState::new())),
        };
        self.sessions.insert(session_id, handle.clone());
        handle
    }

    /// Binds `username` to `session_id`, kicking whichever session previously
    /// held that username so a session owns at most one authenticated
    /// player.
    pub fn bind_username(&self, username: &str, session_id: &str) -> Option<SessionHandle> {
        let previous = self
            .sessions_by_username
            .insert(username.to_string(), session_id.to_string());
        previous.and_then(|old_id| {
            if old_id == session_id {
                None
            } else {
                self.get(&old_id)
            }
        })
    }

    pub fn get(&self, session_id: &str) -> Option<SessionHandle> {
        self.sessions.get(session_id).map(|h| h.clone())
    }

    /// Linear scan over active sessions; fine at the scale a single process
    /// handles, and avoids keeping a second index in sync with login/logout.
    pub async fn get_by_player_id(&self, player_id: &str) -> Option<SessionHandle> {
        for handle in self.all() {
            if handle.state.lock().await.player_id.as_deref() == Some(player_id) {
                return Some(handle);
            }
        }
        None
    }

    pub fn unregister(&self, session_id: &str) {
        self.sessions.remove(session_id);
        self.sessions_by_username.retain(|_, sid| sid != session_id);
    }

    pub fn active_session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn all(&self) -> Vec<SessionHandle> {
        self.sessions.iter().map(|e| e.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::unbounded_channel;

    fn addr() -> SocketAddr {
        "127.0.0.1:4000".parse().unwrap()
    }

    #[test]
    fn duplicate_username_binding_returns_the_previous_session() {
        let registry = SessionRegistry::new();
        let (tx1, _rx1) = unbounded_channel();
        let (tx2, _rx2) = unbounded_channel();
        registry.register("s1".to_string(), addr(), tx1);
        registry.register("s2".to_string(), addr(), tx2);

        assert!(registry.bind_username("alice", "s1").is_none());
        let kicked = registry.bind_username("alice", "s2").unwrap();
        assert_eq!(kicked.session_id, "s1");
    }

    #[test]
    fn unregister_removes_from_both_indices() {
        let registry = SessionRegistry::new();
        let (tx, _rx) = unbounded_channel();
        registry.register("s1".to_string(), addr(), tx);
        registry.bind_username("alice", "s1");
        registry.unregister("s1");
        assert_eq!(registry.active_session_count(), 0);
        assert!(registry.bind_username("alice", "s2").is_none());
    }
}
