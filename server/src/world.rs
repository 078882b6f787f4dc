//! World Manager: in-memory indices over rooms/objects/monsters/players,
//! hydrated from repositories at startup, with all writes mirrored back to
//! storage. Grounded on `directory.rs`'s `DashMap`-indexed, load-aware
//! selection pattern, generalized from map-instance routing to room-scoped
//! entity indices.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::Instant as TokioInstant;
use uuid::Uuid;

use crate::db::Repositories;
use crate::domain::{EntityId, GameObject, LocationKind, Monster, ObjectLocation, Room};
use crate::error::{GameError, GameResult};
use crate::event_bus::{EventBus, GameEvent};
use crate::templates::TemplateRegistry;

pub struct World {
    repos: Repositories,
    event_bus: EventBus,
    templates: TemplateRegistry,
    rooms_by_id: DashMap<EntityId, Room>,
    objects_by_id: DashMap<EntityId, GameObject>,
    monsters_by_id: DashMap<EntityId, Monster>,
    objects_by_room: DashMap<EntityId, Vec<EntityId>>,
    monsters_by_room: DashMap<EntityId, Vec<EntityId>>,
    players_by_room: DashMap<EntityId, Vec<EntityId>>,
    spawn_locks: DashMap<(EntityId, EntityId), Arc<AsyncMutex<()>>>,
    /// Keyed by `(room_id, template_id)`: the instant a spawn point becomes
    /// eligible to refill again after one of its monsters died. Absent means
    /// never on cooldown (never died, or already past due).
    respawn_at: DashMap<(EntityId, EntityId), TokioInstant>,
}

impl World {
    /// Loads every row from the repositories into the in-memory indices.
    /// Thereafter all reads are in-memory; writes go through `World` and are
    /// mirror-written to `repos`.
    pub async fn hydrate(
        repos: Repositories,
        event_bus: EventBus,
        templates: TemplateRegistry,
    ) -> GameResult<Self> {
        let rooms_by_id = DashMap::new();
        for room in repos.rooms.list_all().await? {
            rooms_by_id.insert(room.id.clone(), room);
        }

        let objects_by_id = DashMap::new();
        let objects_by_room: DashMap<EntityId, Vec<EntityId>> = DashMap::new();
        for object in repos.objects.list_all().await? {
            if object.location.kind == LocationKind::Room {
                objects_by_room
                    .entry(object.location.id.clone())
                    .or_default()
                    .push(object.id.clone());
            }
            objects_by_id.insert(object.id.clone(), object);
        }

        let monsters_by_id = DashMap::new();
        let monsters_by_room: DashMap<EntityId, Vec<EntityId>> = DashMap::new();
        for monster in repos.monsters.list_all().await? {
            monsters_by_room
                .entry(monster.current_room_id.clone())
                .or_default()
                .push(monster.id.clone());
            monsters_by_id.insert(monster.id.clone(), monster);
        }

        Ok(Self {
            repos,
            event_bus,
            templates,
            rooms_by_id,
            objects_by_id,
            monsters_by_id,
            objects_by_room,
            monsters_by_room,
            players_by_room: DashMap::new(),
            spawn_locks: DashMap::new(),
            respawn_at: DashMap::new(),
        })
    }

    pub fn get_room(&self, id: &str) -> Option<Room> {
        self.rooms_by_id.get(id).map(|r| r.clone())
    }

    /// Idempotent: if `room.id` already exists, this is a no-op success.
    pub async fn create_room(&self, room: Room) -> GameResult<Room> {
        if self.rooms_by_id.contains_key(&room.id) {
            return Ok(self.rooms_by_id.get(&room.id).unwrap().clone());
        }
        room.validate()
            .map_err(|e| GameError::Input(e.to_string()))?;
        let created = self.repos.rooms.create(&room).await?;
        self.rooms_by_id.insert(created.id.clone(), created.clone());
        Ok(created)
    }

    pub async fn update_room(&self, room: Room) -> GameResult<()> {
        room.validate()
            .map_err(|e| GameError::Input(e.to_string()))?;
        self.repos.rooms.update(&room).await?;
        self.rooms_by_id.insert(room.id.clone(), room.clone());
        self.event_bus.publish(GameEvent::RoomUpdated { room_id: room.id });
        Ok(())
    }

    /// Fails if the room still holds players, monsters, or objects.
    pub async fn delete_room(&self, id: &str) -> GameResult<()> {
        let occupied = self
            .players_by_room
            .get(id)
            .map(|v| !v.is_empty())
            .unwrap_or(false)
            || self.monsters_by_room.get(id).map(|v| !v.is_empty()).unwrap_or(false)
            || self.objects_by_room.get(id).map(|v| !v.is_empty()).unwrap_or(false);
        if occupied {
            return Err(GameError::State(format!("room {id} is occupied")));
        }
        self.repos.rooms.delete(id).await?;
        self.rooms_by_id.remove(id);
        Ok(())
    }

    pub fn get_room_objects(&self, room_id: &str) -> Vec<GameObject> {
        self.objects_by_room
            .get(room_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.objects_by_id.get(id).map(|o| o.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Idempotent: if `object.id` already exists, this is a no-op success,
    /// mirroring `create_room`'s seeding contract.
    pub async fn create_object(&self, object: GameObject) -> GameResult<GameObject> {
        if self.objects_by_id.contains_key(&object.id) {
            return Ok(self.objects_by_id.get(&object.id).unwrap().clone());
        }
        object.validate().map_err(|e| GameError::Input(e.to_string()))?;
        let created = self.repos.objects.create(&object).await?;
        if created.location.kind == LocationKind::Room {
            self.objects_by_room
                .entry(created.location.id.clone())
                .or_default()
                .push(created.id.clone());
        }
        self.objects_by_id.insert(created.id.clone(), created.clone());
        Ok(created)
    }

    pub fn get_inventory_objects(&self, player_id: &str) -> Vec<GameObject> {
        self.objects_by_id
            .iter()
            .filter(|entry| {
                entry.location.kind == LocationKind::PlayerInventory && entry.location.id == player_id
            })
            .map(|entry| entry.clone())
            .collect()
    }

    /// Atomically updates both sides of a location change and emits
    /// `object_moved`. No object exists in two places because the old
    /// location's room/room-index entry is removed before the new one is
    /// added, under the same lock (`DashMap` entries serialize per shard).
    pub async fn move_object(&self, object_id: &str, new_location: ObjectLocation) -> GameResult<()> {
        let mut object = self
            .objects_by_id
            .get(object_id)
            .map(|o| o.clone())
            .ok_or_else(|| GameError::NotFound(format!("object {object_id}")))?;

        let old_location = object.location.clone();
        if old_location.kind == LocationKind::Room {
            if let Some(mut ids) = self.objects_by_room.get_mut(&old_location.id) {
                ids.retain(|id| id != object_id);
            }
        }
        if new_location.kind == LocationKind::Room {
            self.objects_by_room
                .entry(new_location.id.clone())
                .or_default()
                .push(object_id.to_string());
        }

        object.location = new_location;
        self.repos.objects.update(&object).await?;
        self.objects_by_id.insert(object_id.to_string(), object);
        self.event_bus.publish(GameEvent::ObjectMoved {
            object_id: object_id.to_string(),
        });
        Ok(())
    }

    pub fn get_monster(&self, id: &str) -> Option<Monster> {
        self.monsters_by_id.get(id).map(|m| m.clone())
    }

    pub fn get_room_monsters(&self, room_id: &str) -> Vec<Monster> {
        self.monsters_by_room
            .get(room_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.monsters_by_id.get(id).map(|m| m.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn update_monster_in_place(&self, monster: Monster) {
        self.monsters_by_id.insert(monster.id.clone(), monster);
    }

    pub async fn persist_monster(&self, monster: &Monster) -> GameResult<()> {
        self.repos.monsters.update(monster).await
    }

    pub fn join_room(&self, player_id: &str, room_id: &str) {
        self.players_by_room
            .entry(room_id.to_string())
            .or_default()
            .push(player_id.to_string());
    }

    pub fn leave_room(&self, player_id: &str, room_id: &str) {
        if let Some(mut players) = self.players_by_room.get_mut(room_id) {
            players.retain(|p| p != player_id);
        }
    }

    pub fn players_in_room(&self, room_id: &str) -> Vec<EntityId> {
        self.players_by_room.get(room_id).map(|v| v.clone()).unwrap_or_default()
    }

    pub fn total_online_players(&self) -> usize {
        self.players_by_room.iter().map(|entry| entry.len()).sum()
    }

    /// Spawns one monster from `template_id` into `room_id`. Per-spawn-point
    /// serialization is provided by the caller (`spawn_monsters_in_all_rooms`)
    /// acquiring the matching lock before calling this.
    pub async fn spawn_monster(&self, template_id: &str, room_id: &str) -> GameResult<Monster> {
        let template = self
            .templates
            .get(template_id)
            .ok_or_else(|| GameError::NotFound(format!("monster template {template_id}")))?;
        let stats = crate::domain::StatBlock::new(
            template.level,
            template.str_,
            template.dex,
            template.con,
            template.int_,
            template.wis,
            template.cha,
        );
        let monster = Monster {
            id: Uuid::new_v4().to_string(),
            template_id: template_id.to_string(),
            name: template.display_name(),
            stats,
            monster_type: template.monster_type,
            behavior: template.behavior,
            current_room_id: room_id.to_string(),
            aggro_range: template.aggro_range,
            roaming_range: template.roaming_range,
            drop_items: template.drop_items.clone(),
            gold_reward: template.gold_reward,
            respawn_time_sec: template.respawn_time_sec,
            alive: true,
            active_combat_instance: None,
        };
        self.repos.monsters.create(&monster).await?;
        self.monsters_by_room
            .entry(room_id.to_string())
            .or_default()
            .push(monster.id.clone());
        self.monsters_by_id.insert(monster.id.clone(), monster.clone());
        self.event_bus.publish(GameEvent::RoomUpdated {
            room_id: room_id.to_string(),
        });
        Ok(monster)
    }

    /// Despawning a monster is always a death: the spawn point it came from
    /// enters the respawn queue, eligible again after its `respawn_time_sec`.
    pub async fn despawn_monster(&self, id: &str) -> GameResult<()> {
        let Some((_, monster)) = self.monsters_by_id.remove(id) else {
            return Ok(());
        };
        if let Some(mut ids) = self.monsters_by_room.get_mut(&monster.current_room_id) {
            ids.retain(|m| m != id);
        }
        self.repos.monsters.delete(id).await?;
        self.respawn_at.insert(
            (monster.current_room_id.clone(), monster.template_id.clone()),
            TokioInstant::now() + Duration::from_secs(monster.respawn_time_sec),
        );
        self.event_bus.publish(GameEvent::RoomUpdated {
            room_id: monster.current_room_id,
        });
        Ok(())
    }

    /// Re-fills every room's spawn points up to their configured `count`,
    /// serializing per spawn point so concurrent calls cannot exceed the cap.
    /// A spawn point with a death still on cooldown (see [`Self::despawn_monster`])
    /// is skipped entirely this tick, even if its deficit is nonzero.
    pub async fn spawn_monsters_in_all_rooms(&self) -> GameResult<usize> {
        let rooms: Vec<Room> = self.rooms_by_id.iter().map(|r| r.clone()).collect();
        let mut spawned = 0;
        for room in rooms {
            for spawn_point in &room.spawn_points {
                let key = (room.id.clone(), spawn_point.template_id.clone());
                let lock = self
                    .spawn_locks
                    .entry(key.clone())
                    .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                    .value()
                    .clone();
                let _guard = lock.lock().await;

                if let Some(ready_at) = self.respawn_at.get(&key) {
                    if TokioInstant::now() < *ready_at {
                        continue;
                    }
                }

                let alive_count = self
                    .get_room_monsters(&room.id)
                    .into_iter()
                    .filter(|m| m.template_id == spawn_point.template_id && m.alive)
                    .count() as u32;
                let deficit = spawn_point.count.saturating_sub(alive_count);
                for _ in 0..deficit {
                    self.spawn_monster(&spawn_point.template_id, &room.id).await?;
                    spawned += 1;
                }
                if deficit > 0 {
                    self.respawn_at.remove(&key);
                }
            }
        }
        Ok(spawned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::run_migrations;
    use crate::domain::{MonsterBehavior, MonsterType, SpawnPoint};
    use crate::templates::MonsterTemplate;
    use common::{Direction, LocMap};
    use sqlx::sqlite::SqlitePoolOptions;
    use std::collections::BTreeMap;

    async fn empty_world() -> World {
        let pool = SqlitePoolOptions::new().connect("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        let repos = Repositories::new(pool);
        World::hydrate(repos, EventBus::new(), TemplateRegistry::default())
            .await
            .unwrap()
    }

    fn sample_room(id: &str) -> Room {
        Room {
            id: id.to_string(),
            name: LocMap::new(format!("Room {id}")),
            description: LocMap::new("A room."),
            exits: BTreeMap::new(),
            spawn_points: vec![],
        }
    }

    #[tokio::test]
    async fn seeding_same_room_twice_is_idempotent() {
        let world = empty_world().await;
        world.create_room(sample_room("r1")).await.unwrap();
        world.create_room(sample_room("r1")).await.unwrap();
        assert!(world.get_room("r1").is_some());
    }

    #[tokio::test]
    async fn delete_room_fails_when_occupied() {
        let world = empty_world().await;
        world.create_room(sample_room("r1")).await.unwrap();
        world.join_room("alice", "r1");
        let err = world.delete_room("r1").await.unwrap_err();
        assert!(matches!(err, GameError::State(_)));
    }

    #[tokio::test]
    async fn move_object_updates_both_room_indices() {
        let world = empty_world().await;
        world.create_room(sample_room("r1")).await.unwrap();
        world.create_room(sample_room("r2")).await.unwrap();
        let object = GameObject {
            id: "o1".to_string(),
            name: LocMap::new("Sword"),
            description: LocMap::new("Sharp."),
            object_type: "weapon".to_string(),
            category: "equipment".to_string(),
            weight: 1.0,
            stackable: false,
            max_stack: 1,
            properties: Default::default(),
            location: ObjectLocation::room("r1"),
        };
        world.repos.objects.create(&object).await.unwrap();
        world.objects_by_id.insert(object.id.clone(), object.clone());
        world.objects_by_room.entry("r1".to_string()).or_default().push(object.id.clone());

        world
            .move_object("o1", ObjectLocation::room("r2"))
            .await
            .unwrap();

        assert!(world.get_room_objects("r1").is_empty());
        assert_eq!(world.get_room_objects("r2").len(), 1);
    }

    #[tokio::test]
    async fn spawn_respects_spawn_point_cap() {
        let world = empty_world().await;
        world
            .create_room(Room {
                spawn_points: vec![SpawnPoint {
                    room_id: "r1".to_string(),
                    template_id: "goblin".to_string(),
                    count: 2,
                    respawn_time_sec: 30,
                    roaming_enabled: false,
                }],
                ..sample_room("r1")
            })
            .await
            .unwrap();

        let mut world = world;
        let mut templates = TemplateRegistry::default();
        templates.insert(MonsterTemplate {
            template_id: "goblin".to_string(),
            name_en: "Goblin".to_string(),
            name_ko: None,
            level: 1,
            str_: 8,
            dex: 8,
            con: 8,
            int_: 4,
            wis: 4,
            cha: 4,
            monster_type: MonsterType::Aggressive,
            behavior: MonsterBehavior::Stationary,
            aggro_range: 0,
            roaming_range: 0,
            drop_items: vec![],
            gold_reward: 1,
            respawn_time_sec: 30,
        });
        world.templates = templates;

        let first = world.spawn_monsters_in_all_rooms().await.unwrap();
        let second = world.spawn_monsters_in_all_rooms().await.unwrap();
        assert_eq!(first, 2);
        assert_eq!(second, 0);
        assert_eq!(world.get_room_monsters("r1").len(), 2);
    }

    #[tokio::test]
    async fn a_dead_monster_does_not_respawn_before_its_timer_elapses() {
        let world = empty_world().await;
        tokio::time::pause();
        world
            .create_room(Room {
                spawn_points: vec![SpawnPoint {
                    room_id: "r1".to_string(),
                    template_id: "goblin".to_string(),
                    count: 1,
                    respawn_time_sec: 5,
                    roaming_enabled: false,
                }],
                ..sample_room("r1")
            })
            .await
            .unwrap();

        let mut world = world;
        let mut templates = TemplateRegistry::default();
        templates.insert(MonsterTemplate {
            template_id: "goblin".to_string(),
            name_en: "Goblin".to_string(),
            name_ko: None,
            level: 1,
            str_: 8,
            dex: 8,
            con: 8,
            int_: 4,
            wis: 4,
            cha: 4,
            monster_type: MonsterType::Aggressive,
            behavior: MonsterBehavior::Stationary,
            aggro_range: 0,
            roaming_range: 0,
            drop_items: vec![],
            gold_reward: 1,
            respawn_time_sec: 5,
        });
        world.templates = templates;

        world.spawn_monsters_in_all_rooms().await.unwrap();
        let monster_id = world.get_room_monsters("r1")[0].id.clone();
        world.despawn_monster(&monster_id).await.unwrap();
        assert!(world.get_room_monsters("r1").is_empty());

        let immediate = world.spawn_monsters_in_all_rooms().await.unwrap();
        assert_eq!(immediate, 0, "respawn happened before the timer elapsed");

        tokio::time::advance(Duration::from_secs(15)).await;

        let after_wait = world.spawn_monsters_in_all_rooms().await.unwrap();
        assert_eq!(after_wait, 1);
        assert_eq!(world.get_room_monsters("r1").len(), 1);
    }
}
