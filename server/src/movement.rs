//! Movement Manager: validates and performs a player's transition from one
//! room to another, including the follow chain and new-room aggro check.
//! Grounded on `directory.rs`'s load-checked hand-off between map instances,
//! generalized from moving a whole session between servers to moving a
//! single player between rooms, plus `map_server.rs`'s broadcast-on-transition
//! idiom for departure/arrival messages.

use std::collections::HashSet;

use common::Direction;
use protocol::{MonsterAggro, PlayerMoved, RoomInfo, ServerMessage};

use crate::domain::EntityId;
use crate::engine::Engine;
use crate::error::{GameError, GameResult};

const MAX_FOLLOW_DEPTH: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveReason {
    Walk,
    AdminGoto,
    Follow,
}

/// Moves `player_id` through `direction`, resolving and validating the exit
/// from their current room.
pub async fn walk(engine: &Engine, player_id: &str, direction: Direction) -> GameResult<()> {
    let current_room_id = current_room_of(engine, player_id).await?;
    let room = engine
        .world
        .get_room(&current_room_id)
        .ok_or_else(|| GameError::NotFound(format!("room {current_room_id}")))?;
    let target_room_id = room
        .exit_toward(direction)
        .cloned()
        .ok_or_else(|| GameError::Input(format!("there is no exit to the {direction}")))?;
    move_player_inner(
        engine,
        player_id,
        &target_room_id,
        Some(direction),
        MoveReason::Walk,
        &mut HashSet::new(),
        0,
    )
    .await
}

/// Teleports `player_id` directly into `target_room_id`, bypassing exit
/// validation. Reserved for admin `goto`.
pub async fn admin_goto(engine: &Engine, player_id: &str, target_room_id: &str) -> GameResult<()> {
    move_player_inner(
        engine,
        player_id,
        target_room_id,
        None,
        MoveReason::AdminGoto,
        &mut HashSet::new(),
        0,
    )
    .await
}

async fn current_room_of(engine: &Engine, player_id: &str) -> GameResult<EntityId> {
    let session = engine
        .sessions
        .get_by_player_id(player_id)
        .await
        .ok_or_else(|| GameError::NotFound(format!("session for player {player_id}")))?;
    let state = session.state.lock().await;
    state
        .current_room_id
        .clone()
        .ok_or_else(|| GameError::State("player has no current room".to_string()))
}

async fn move_player_inner(
    engine: &Engine,
    player_id: &str,
    target_room_id: &str,
    exit_direction: Option<Direction>,
    reason: MoveReason,
    visited: &mut HashSet<EntityId>,
    depth: usize,
) -> GameResult<()> {
    if engine.combat.is_player_in_combat(player_id) {
        return Err(GameError::State("cannot move while in combat".to_string()));
    }

    let session = engine
        .sessions
        .get_by_player_id(player_id)
        .await
        .ok_or_else(|| GameError::NotFound(format!("session for player {player_id}")))?;
    let current_room_id = {
        let state = session.state.lock().await;
        state
            .current_room_id
            .clone()
            .ok_or_else(|| GameError::State("player has no current room".to_string()))?
    };
    let target_room_id = target_room_id.to_string();

    if engine.world.get_room(&target_room_id).is_none() {
        return Err(GameError::NotFound(format!("room {target_room_id}")));
    }

    engine.world.leave_room(player_id, &current_room_id);
    engine.world.join_room(player_id, &target_room_id);
    {
        let mut state = session.state.lock().await;
        state.current_room_id = Some(target_room_id.clone());
    }

    let direction_label = exit_direction.map(|d| d.to_string());
    let mover_name = session.display_name().await;
    engine.broadcast_to_room(
        &current_room_id,
        &ServerMessage::PlayerMoved(PlayerMoved {
            player_name: mover_name.clone(),
            direction: direction_label.clone(),
            from_room_id: current_room_id.clone(),
            to_room_id: target_room_id.clone(),
        }),
        Some(&session.session_id),
    );
    engine.broadcast_to_room(
        &target_room_id,
        &ServerMessage::PlayerMoved(PlayerMoved {
            player_name: mover_name,
            direction: direction_label,
            from_room_id: current_room_id.clone(),
            to_room_id: target_room_id.clone(),
        }),
        Some(&session.session_id),
    );

    if let Some(room) = engine.world.get_room(&target_room_id) {
        session.send_line(protocol::encode_message(&ServerMessage::RoomInfo(room_info(
            engine, &room, &target_room_id,
        )))
        .unwrap_or_default());
    }

    engine.event_bus.publish(crate::event_bus::GameEvent::PlayerMoved {
        player_id: player_id.to_string(),
        from_room_id: current_room_id.clone(),
        to_room_id: target_room_id.clone(),
    });

    move_followers(engine, player_id, &target_room_id, exit_direction, visited, depth).await;
    check_aggro(engine, player_id, &target_room_id).await;

    Ok(())
}

/// Followers move one step behind their leader. Recursion is bounded by
/// `MAX_FOLLOW_DEPTH` and a `visited` set to stop cycles (A follows B follows
/// A); a follower that fails to move has its follow flag cleared and is
/// notified, without rolling back the leader's already-completed move.
fn move_followers<'a>(
    engine: &'a Engine,
    leader_id: &'a str,
    target_room_id: &'a str,
    exit_direction: Option<Direction>,
    visited: &'a mut HashSet<EntityId>,
    depth: usize,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send + 'a>> {
    Box::pin(async move {
        if depth >= MAX_FOLLOW_DEPTH || !visited.insert(leader_id.to_string()) {
            return;
        }

        let followers: Vec<_> = engine
            .sessions
            .all()
            .into_iter()
            .filter(|handle| {
                let flags_match = handle
                    .state
                    .try_lock()
                    .map(|s| s.flags.following.as_deref() == Some(leader_id))
                    .unwrap_or(false);
                flags_match
            })
            .collect();

        for follower in followers {
            let follower_player_id = {
                let state = follower.state.lock().await;
                state.player_id.clone()
            };
            let Some(follower_player_id) = follower_player_id else { continue };

            let result = Box::pin(move_player_inner(
                engine,
                &follower_player_id,
                target_room_id,
                exit_direction,
                MoveReason::Follow,
                visited,
                depth + 1,
            ))
            .await;

            if result.is_err() {
                let mut state = follower.state.lock().await;
                state.flags.following = None;
                drop(state);
                follower.send_line(
                    protocol::encode_message(&ServerMessage::SystemMessage(protocol::TextMessage {
                        message: "you could not keep up and stopped following.".to_string(),
                    }))
                    .unwrap_or_default(),
                );
            }
        }
        let _ = target_room_id;
    })
}

/// Relocates a player that has just successfully fled combat into the first
/// adjacent room with no active aggressive monster, broadcasting the
/// departure/arrival the same way [`walk`] does. Returns the room moved
/// into, or `None` if no safe adjacent room exists (the player stays put).
pub async fn flee_to_safe_room(engine: &Engine, player_id: &str, current_room_id: &str) -> Option<EntityId> {
    let room = engine.world.get_room(current_room_id)?;
    let target_room_id = room
        .exits
        .values()
        .find(|candidate| {
            !engine
                .world
                .get_room_monsters(candidate)
                .into_iter()
                .any(|m| m.is_aggressive() && m.alive)
        })?
        .clone();

    let session = engine.sessions.get_by_player_id(player_id).await?;
    engine.world.leave_room(player_id, current_room_id);
    engine.world.join_room(player_id, &target_room_id);
    {
        let mut state = session.state.lock().await;
        state.current_room_id = Some(target_room_id.clone());
    }

    let mover_name = session.display_name().await;
    engine.broadcast_to_room(
        current_room_id,
        &ServerMessage::PlayerMoved(PlayerMoved {
            player_name: mover_name.clone(),
            direction: None,
            from_room_id: current_room_id.to_string(),
            to_room_id: target_room_id.clone(),
        }),
        Some(&session.session_id),
    );
    engine.broadcast_to_room(
        &target_room_id,
        &ServerMessage::PlayerMoved(PlayerMoved {
            player_name: mover_name,
            direction: None,
            from_room_id: current_room_id.to_string(),
            to_room_id: target_room_id.clone(),
        }),
        Some(&session.session_id),
    );

    if let Some(room) = engine.world.get_room(&target_room_id) {
        session.send_line(
            protocol::encode_message(&ServerMessage::RoomInfo(room_info(engine, &room, &target_room_id)))
                .unwrap_or_default(),
        );
    }

    engine.event_bus.publish(crate::event_bus::GameEvent::PlayerMoved {
        player_id: player_id.to_string(),
        from_room_id: current_room_id.to_string(),
        to_room_id: target_room_id.clone(),
    });

    Some(target_room_id)
}

/// Aggressive monsters in the destination room may start combat against the
/// arriving player. Only one monster initiates per arrival (the first
/// aggressive monster found) to avoid stacking multiple fights on a single
/// step; a player already in combat is skipped (shouldn't occur here, since
/// movement is blocked while in combat, but kept defensive for follow-chain
/// re-entrancy).
async fn check_aggro(engine: &Engine, player_id: &str, room_id: &str) {
    if engine.combat.is_player_in_combat(player_id) {
        return;
    }
    let Some(aggressor) = engine
        .world
        .get_room_monsters(room_id)
        .into_iter()
        .find(|m| m.is_aggressive() && m.alive && m.active_combat_instance.is_none())
    else {
        return;
    };
    engine.broadcast_to_room(
        room_id,
        &ServerMessage::MonsterAggro(MonsterAggro {
            monster_name: aggressor.localized_name("en").to_string(),
            room_id: room_id.to_string(),
        }),
        None,
    );
    engine.start_combat_with_monster(room_id, player_id, &aggressor.id).await;
}

fn room_info(engine: &Engine, room: &crate::domain::Room, room_id: &str) -> RoomInfo {
    RoomInfo {
        room_id: room_id.to_string(),
        name: room.localized_name("en").to_string(),
        description: room.localized_description("en").to_string(),
        exits: room.exits.keys().map(|d| d.to_string()).collect(),
        players: engine.world.players_in_room(room_id),
        monsters: engine
            .world
            .get_room_monsters(room_id)
            .into_iter()
            .map(|m| m.localized_name("en").to_string())
            .collect(),
        objects: engine
            .world
            .get_room_objects(room_id)
            .into_iter()
            .map(|o| o.name.localized("en").to_string())
            .collect(),
    }
}
