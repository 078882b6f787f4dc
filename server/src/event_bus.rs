//! In-process typed publish/subscribe, grounded on `message_hub.rs`'s
//! `DashMap<String, broadcast::Sender<T>>` keyed-channel idiom but delivering
//! synchronously on the publisher's call stack: handlers run in registration
//! order (FIFO per topic) and a handler panic is caught so it cannot block
//! delivery to the next handler.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use dashmap::DashMap;

use crate::domain::EntityId;

#[derive(Debug, Clone)]
pub enum GameEvent {
    PlayerJoined { room_id: EntityId, player_id: EntityId },
    PlayerLeft { room_id: EntityId, player_id: EntityId },
    PlayerMoved {
        player_id: EntityId,
        from_room_id: EntityId,
        to_room_id: EntityId,
    },
    RoomUpdated { room_id: EntityId },
    ObjectMoved { object_id: EntityId },
    CombatStarted { instance_id: EntityId, room_id: EntityId },
    CombatEnded { instance_id: EntityId },
    MonsterKilled { monster_id: EntityId, room_id: EntityId },
    SchedulerTick { phase_second: u32 },
}

impl GameEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            GameEvent::PlayerJoined { .. } => "player_joined",
            GameEvent::PlayerLeft { .. } => "player_left",
            GameEvent::PlayerMoved { .. } => "player_moved",
            GameEvent::RoomUpdated { .. } => "room_updated",
            GameEvent::ObjectMoved { .. } => "object_moved",
            GameEvent::CombatStarted { .. } => "combat_started",
            GameEvent::CombatEnded { .. } => "combat_ended",
            GameEvent::MonsterKilled { .. } => "monster_killed",
            GameEvent::SchedulerTick { .. } => "scheduler_tick",
        }
    }
}

type Handler = Arc<dyn Fn(&GameEvent) + Send + Sync>;

/// No persistence: events are operational signals for decoupling managers,
/// not an audit log.
#[derive(Clone, Default)]
pub struct EventBus {
    handlers: Arc<DashMap<&'static str, Vec<Handler>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, kind: &'static str, handler: F)
    where
        F: Fn(&GameEvent) + Send + Sync + 'static,
    {
        self.handlers.entry(kind).or_default().push(Arc::new(handler));
    }

    /// Delivers `event` to every subscriber of its kind, in registration
    /// order. A handler that panics is caught and logged; it does not
    /// prevent delivery to subsequent handlers.
    pub fn publish(&self, event: GameEvent) {
        let kind = event.kind();
        let Some(handlers) = self.handlers.get(kind) else {
            return;
        };
        for handler in handlers.iter() {
            let handler = handler.clone();
            let event_ref = &event;
            let result = panic::catch_unwind(AssertUnwindSafe(|| handler(event_ref)));
            if result.is_err() {
                log::error!("event handler for '{kind}' panicked");
            }
        }
    }

    pub fn subscriber_count(&self, kind: &str) -> usize {
        self.handlers.get(kind).map(|h| h.len()).unwrap_or(0)
    }
}
