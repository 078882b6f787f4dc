//! Game Engine: the composition root tying world state, sessions, combat,
//! and the event bus together, plus the cross-cutting broadcast helpers
//! every command handler uses. Grounded on `core.rs`'s `MuCoreRuntime`,
//! which owns a map/session/message-hub trio the same way this owns
//! world/sessions/combat/event_bus, including its graceful-shutdown
//! sequencing (stop accepting, notify, grace period, force-close).

use std::sync::Arc;
use std::time::Duration;

use protocol::{
    encode_message, CombatEnd, CombatStart, CombatVictor, CombatantSummary, ServerMessage, TextMessage, TurnStart,
};
use tokio::time::sleep;

use crate::auth::AuthService;
use crate::combat::{combatant_from_monster, combatant_from_player, CombatEngine, CombatOutcome};
use crate::config::ServerConfig;
use crate::db::Repositories;
use crate::domain::{CombatInstance, CombatantKind};
use crate::error::GameResult;
use crate::event_bus::{EventBus, GameEvent};
use crate::session::SessionRegistry;
use crate::templates::TemplateRegistry;
use crate::world::World;

pub struct Engine {
    pub config: ServerConfig,
    pub repos: Repositories,
    pub world: World,
    pub sessions: SessionRegistry,
    pub combat: CombatEngine,
    pub event_bus: EventBus,
    pub auth: AuthService,
}

impl Engine {
    pub async fn bootstrap(config: ServerConfig) -> GameResult<Arc<Self>> {
        let pool = crate::db::connect(&config.database_url).await?;
        let repos = Repositories::new(pool);
        let event_bus = EventBus::new();
        let templates = TemplateRegistry::load_from_dir(std::path::Path::new(&config.templates_dir))?;
        let world = World::hydrate(repos.clone(), event_bus.clone(), templates).await?;
        let sessions = SessionRegistry::new();
        let combat = CombatEngine::new();
        let auth = AuthService::new(repos.players.clone());

        Ok(Arc::new(Self {
            config,
            repos,
            world,
            sessions,
            combat,
            event_bus,
            auth,
        }))
    }

    /// Sends `message` to every session currently in `room_id`, optionally
    /// skipping `exclude_session_id` (the actor whose own action triggered
    /// the broadcast, when they already get a tailored response).
    pub fn broadcast_to_room(&self, room_id: &str, message: &ServerMessage, exclude_session_id: Option<&str>) {
        let Ok(line) = encode_message(message) else { return };
        for player_id in self.world.players_in_room(room_id) {
            let sessions = self.sessions.clone();
            let player_id = player_id.clone();
            let line = line.clone();
            let exclude = exclude_session_id.map(|s| s.to_string());
            tokio::spawn(async move {
                if let Some(session) = sessions.get_by_player_id(&player_id).await {
                    if exclude.as_deref() != Some(session.session_id.as_str()) {
                        session.send_line(line);
                    }
                }
            });
        }
    }

    pub fn broadcast_global(&self, message: &ServerMessage) {
        let Ok(line) = encode_message(message) else { return };
        for session in self.sessions.all() {
            session.send_line(line.clone());
        }
    }

    /// Starts a player-vs-monster instance in `room_id` and announces it to
    /// the room. The monster's `active_combat_instance` is set so it cannot
    /// be drawn into a second fight concurrently.
    pub async fn start_combat_with_monster(&self, room_id: &str, player_id: &str, monster_id: &str) {
        let Some(mut monster) = self.world.get_monster(monster_id) else { return };
        if monster.active_combat_instance.is_some() {
            return;
        }
        let Some(session) = self.sessions.get_by_player_id(player_id).await else { return };
        let Some(player_state_room) = session.state.lock().await.current_room_id.clone() else { return };
        let _ = player_state_room;

        let player_combatant = match self.player_snapshot(player_id).await {
            Some(c) => c,
            None => return,
        };
        let monster_combatant = combatant_from_monster(&monster);
        let instance = self
            .combat
            .start_combat(room_id, vec![player_combatant, monster_combatant]);

        monster.active_combat_instance = Some(instance.id.clone());
        self.world.update_monster_in_place(monster.clone());
        let _ = self.world.persist_monster(&monster).await;

        self.event_bus.publish(GameEvent::CombatStarted {
            instance_id: instance.id.clone(),
            room_id: room_id.to_string(),
        });
        self.broadcast_to_room(
            room_id,
            &ServerMessage::SystemMessage(TextMessage {
                message: format!("{} attacks!", monster.localized_name("en")),
            }),
            None,
        );
        self.broadcast_to_room(
            room_id,
            &ServerMessage::CombatStart(CombatStart {
                instance_id: instance.id.clone(),
                room_id: room_id.to_string(),
                combatants: instance
                    .combatants
                    .iter()
                    .map(|c| CombatantSummary {
                        id: c.id.clone(),
                        display_name: c.display_name.clone(),
                        hp: c.hp,
                        max_hp: c.max_hp,
                        speed: c.speed,
                    })
                    .collect(),
            }),
            None,
        );
        if let Some(first_actor) = instance
            .current_combatant_id()
            .and_then(|id| instance.combatant(id))
        {
            self.broadcast_to_room(
                room_id,
                &ServerMessage::TurnStart(TurnStart {
                    instance_id: instance.id.clone(),
                    turn_number: instance.turn_number,
                    actor_id: first_actor.id.clone(),
                    actor_name: first_actor.display_name.clone(),
                }),
                None,
            );
        }
    }

    /// Checks whether `instance_id` has just ended and, if so, settles the
    /// outcome (persisting player HP, paying out experience/gold to
    /// survivors, despawning dead monsters) and announces it to the room.
    /// Called after every action that can end a fight, instead of command
    /// handlers calling `combat.check_end` directly, so the reward/persist
    /// side effects happen exactly once per instance.
    pub async fn finish_combat_if_ended(&self, instance_id: &str) -> GameResult<bool> {
        let Some((outcome, instance)) = self.combat.check_end(instance_id).await? else {
            return Ok(false);
        };
        self.settle_combat_outcome(&outcome, &instance).await;
        self.event_bus.publish(GameEvent::CombatEnded {
            instance_id: instance_id.to_string(),
        });

        let victor = match outcome {
            CombatOutcome::Victory => CombatVictor::Players,
            CombatOutcome::Defeat => CombatVictor::Monsters,
            CombatOutcome::Aborted => CombatVictor::Aborted,
        };
        let message = match outcome {
            CombatOutcome::Victory => "the monsters have been defeated!".to_string(),
            CombatOutcome::Defeat => "the party has fallen!".to_string(),
            CombatOutcome::Aborted => "the fight breaks apart.".to_string(),
        };
        self.broadcast_to_room(
            &instance.room_id,
            &ServerMessage::CombatEnd(CombatEnd {
                instance_id: instance_id.to_string(),
                victor,
                message,
            }),
            None,
        );
        Ok(true)
    }

    /// Writes every player combatant's final HP back to their row regardless
    /// of outcome, then on a player victory credits each dead monster's gold
    /// reward (reused as its experience reward; templates carry no separate
    /// experience field) to whichever player landed the killing blow's
    /// lineage of hits — the combatant recorded in its `last_attacker_id` —
    /// and despawns the monster so the next respawn sweep can refill its
    /// spawn point.
    async fn settle_combat_outcome(&self, outcome: &CombatOutcome, instance: &CombatInstance) {
        for combatant in instance.combatants.iter().filter(|c| c.kind == CombatantKind::Player) {
            if let Ok(mut player) = self.repos.players.get_by_id(&combatant.ref_id).await {
                player.stats.current_hp = combatant.hp;
                let _ = self.repos.players.update(&player).await;
            }
        }

        if !matches!(outcome, CombatOutcome::Victory) {
            return;
        }

        for combatant in instance.combatants.iter().filter(|c| c.kind == CombatantKind::Monster) {
            if let Some(monster) = self.world.get_monster(&combatant.ref_id) {
                if let Some(last_attacker_id) = &combatant.last_attacker_id {
                    if monster.gold_reward > 0 {
                        if let Ok(mut player) = self.repos.players.get_by_id(last_attacker_id).await {
                            player.experience += monster.gold_reward;
                            player.gold += monster.gold_reward;
                            let _ = self.repos.players.update(&player).await;
                        }
                    }
                }
                let _ = self.world.despawn_monster(&monster.id).await;
            }
        }
    }

    /// Builds a fresh [`crate::domain::Combatant`] snapshot from a session's
    /// authenticated player row. Command handlers hydrate the canonical
    /// `Player` from the repository rather than trusting cached session
    /// state, since stats can change between turns (leveling, healing).
    async fn player_snapshot(&self, player_id: &str) -> Option<crate::domain::Combatant> {
        let player = self.repos.players.get_by_id(player_id).await.ok()?;
        Some(combatant_from_player(&player))
    }

    /// Stops accepting new connections is the caller's responsibility (it
    /// drops the listener); this notifies every connected session, waits a
    /// grace period for in-flight commands to finish, then returns so the
    /// caller can tear down remaining sockets.
    pub async fn shutdown(&self) {
        self.broadcast_global(&ServerMessage::SystemMessage(TextMessage {
            message: "the server is shutting down.".to_string(),
        }));
        sleep(Duration::from_secs(2)).await;
    }
}
