//! Per-entity repositories over a `SqlitePool`, grounded on the
//! `MongoDbContext`/`AccountRepository` shape (one struct per collection,
//! wrapping a handle to the store) but re-expressed over SQL rows instead of
//! BSON documents, with the generic CRUD contract the component design
//! requires: `get_by_id, list_where, create, update, delete, count`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use common::{Direction, LocMap};
use sqlx::{Row, SqlitePool};

use crate::domain::{
    DropItem, GameObject, LocationKind, Monster, MonsterBehavior, MonsterType, ObjectLocation,
    Player, Room, SpawnPoint, StatBlock,
};
use crate::error::{GameError, GameResult};

fn locmap_from_columns(en: String, ko: Option<String>) -> LocMap {
    let mut loc = LocMap::new(en);
    if let Some(ko) = ko {
        loc.insert("ko", ko);
    }
    loc
}

#[derive(Clone)]
pub struct PlayerRepository {
    pool: SqlitePool,
}

impl PlayerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> GameResult<Player> {
        let row = sqlx::query("SELECT * FROM players WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| GameError::NotFound(format!("player {id}")))?;
        Self::from_row(row)
    }

    pub async fn get_by_username(&self, username: &str) -> GameResult<Option<Player>> {
        let row = sqlx::query("SELECT * FROM players WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::from_row).transpose()
    }

    pub async fn create(&self, player: &Player) -> GameResult<Player> {
        let stats_json = serde_json::to_string(&player.stats).map_err(GameError::internal)?;
        let inventory_json = serde_json::to_string(&player.inventory).map_err(GameError::internal)?;
        sqlx::query(
            "INSERT INTO players (id, username, password_hash, is_admin, preferred_locale, created_at, last_login, current_room_id, stats, inventory, gold, experience)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&player.id)
        .bind(&player.username)
        .bind(&player.password_hash)
        .bind(player.is_admin)
        .bind(&player.preferred_locale)
        .bind(player.created_at.to_rfc3339())
        .bind(player.last_login.map(|t| t.to_rfc3339()))
        .bind(&player.current_room_id)
        .bind(stats_json)
        .bind(inventory_json)
        .bind(player.gold as i64)
        .bind(player.experience as i64)
        .execute(&self.pool)
        .await?;
        Ok(player.clone())
    }

    pub async fn update(&self, player: &Player) -> GameResult<()> {
        let stats_json = serde_json::to_string(&player.stats).map_err(GameError::internal)?;
        let inventory_json = serde_json::to_string(&player.inventory).map_err(GameError::internal)?;
        let result = sqlx::query(
            "UPDATE players SET password_hash = ?, is_admin = ?, preferred_locale = ?, last_login = ?, current_room_id = ?, stats = ?, inventory = ?, gold = ?, experience = ?
             WHERE id = ?",
        )
        .bind(&player.password_hash)
        .bind(player.is_admin)
        .bind(&player.preferred_locale)
        .bind(player.last_login.map(|t| t.to_rfc3339()))
        .bind(&player.current_room_id)
        .bind(stats_json)
        .bind(inventory_json)
        .bind(player.gold as i64)
        .bind(player.experience as i64)
        .bind(&player.id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(GameError::NotFound(format!("player {}", player.id)));
        }
        Ok(())
    }

    pub async fn delete(&self, id: &str) -> GameResult<()> {
        sqlx::query("DELETE FROM players WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn count(&self) -> GameResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) as n FROM players")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get::<i64, _>("n")?)
    }

    fn from_row(row: sqlx::sqlite::SqliteRow) -> GameResult<Player> {
        let stats_json: String = row.try_get("stats")?;
        let inventory_json: String = row.try_get("inventory")?;
        let last_login: Option<String> = row.try_get("last_login")?;
        Ok(Player {
            id: row.try_get("id")?,
            username: row.try_get("username")?,
            password_hash: row.try_get("password_hash")?,
            is_admin: row.try_get("is_admin")?,
            preferred_locale: row.try_get("preferred_locale")?,
            created_at: parse_timestamp(row.try_get("created_at")?)?,
            last_login: last_login.map(parse_timestamp).transpose()?,
            current_room_id: row.try_get("current_room_id")?,
            stats: serde_json::from_str::<StatBlock>(&stats_json).map_err(GameError::internal)?,
            inventory: serde_json::from_str(&inventory_json).map_err(GameError::internal)?,
            gold: row.try_get::<i64, _>("gold")? as u64,
            experience: row.try_get::<i64, _>("experience")? as u64,
        })
    }
}

fn parse_timestamp(raw: String) -> GameResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(GameError::internal)
}

#[derive(Clone)]
pub struct RoomRepository {
    pool: SqlitePool,
}

impl RoomRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> GameResult<Room> {
        let row = sqlx::query("SELECT * FROM rooms WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| GameError::NotFound(format!("room {id}")))?;
        Self::from_row(row)
    }

    pub async fn list_all(&self) -> GameResult<Vec<Room>> {
        let rows = sqlx::query("SELECT * FROM rooms").fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::from_row).collect()
    }

    /// Idempotent create: a seed id that already exists is a no-op success,
    /// matching the world-seeding idempotence requirement.
    pub async fn create(&self, room: &Room) -> GameResult<Room> {
        let exits_json = serde_json::to_string(&room.exits).map_err(GameError::internal)?;
        let spawn_points_json = serde_json::to_string(&room.spawn_points).map_err(GameError::internal)?;
        sqlx::query(
            "INSERT OR IGNORE INTO rooms (id, name_en, name_ko, description_en, description_ko, exits, spawn_points)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&room.id)
        .bind(room.name.en())
        .bind(room.name.as_map().get("ko"))
        .bind(room.description.en())
        .bind(room.description.as_map().get("ko"))
        .bind(exits_json)
        .bind(spawn_points_json)
        .execute(&self.pool)
        .await?;
        Ok(room.clone())
    }

    pub async fn update(&self, room: &Room) -> GameResult<()> {
        let exits_json = serde_json::to_string(&room.exits).map_err(GameError::internal)?;
        let spawn_points_json = serde_json::to_string(&room.spawn_points).map_err(GameError::internal)?;
        let result = sqlx::query(
            "UPDATE rooms SET name_en = ?, name_ko = ?, description_en = ?, description_ko = ?, exits = ?, spawn_points = ?
             WHERE id = ?",
        )
        .bind(room.name.en())
        .bind(room.name.as_map().get("ko"))
        .bind(room.description.en())
        .bind(room.description.as_map().get("ko"))
        .bind(exits_json)
        .bind(spawn_points_json)
        .bind(&room.id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(GameError::NotFound(format!("room {}", room.id)));
        }
        Ok(())
    }

    pub async fn delete(&self, id: &str) -> GameResult<()> {
        sqlx::query("DELETE FROM rooms WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn count(&self) -> GameResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) as n FROM rooms")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get::<i64, _>("n")?)
    }

    fn from_row(row: sqlx::sqlite::SqliteRow) -> GameResult<Room> {
        let exits_json: String = row.try_get("exits")?;
        let spawn_points_json: String = row.try_get("spawn_points")?;
        let exits: BTreeMap<Direction, String> =
            serde_json::from_str(&exits_json).map_err(GameError::internal)?;
        let spawn_points: Vec<SpawnPoint> =
            serde_json::from_str(&spawn_points_json).map_err(GameError::internal)?;
        Ok(Room {
            id: row.try_get("id")?,
            name: locmap_from_columns(row.try_get("name_en")?, row.try_get("name_ko")?),
            description: locmap_from_columns(
                row.try_get("description_en")?,
                row.try_get("description_ko")?,
            ),
            exits,
            spawn_points,
        })
    }
}

#[derive(Clone)]
pub struct GameObjectRepository {
    pool: SqlitePool,
}

impl GameObjectRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> GameResult<GameObject> {
        let row = sqlx::query("SELECT * FROM game_objects WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| GameError::NotFound(format!("object {id}")))?;
        Self::from_row(row)
    }

    pub async fn list_all(&self) -> GameResult<Vec<GameObject>> {
        let rows = sqlx::query("SELECT * FROM game_objects")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Self::from_row).collect()
    }

    pub async fn create(&self, object: &GameObject) -> GameResult<GameObject> {
        let properties_json = serde_json::to_string(&object.properties).map_err(GameError::internal)?;
        let (kind, loc_id) = location_columns(&object.location);
        sqlx::query(
            "INSERT OR IGNORE INTO game_objects (id, name_en, name_ko, description_en, description_ko, object_type, category, weight, stackable, max_stack, properties, location_kind, location_id)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&object.id)
        .bind(object.name.en())
        .bind(object.name.as_map().get("ko"))
        .bind(object.description.en())
        .bind(object.description.as_map().get("ko"))
        .bind(&object.object_type)
        .bind(&object.category)
        .bind(object.weight)
        .bind(object.stackable)
        .bind(object.max_stack as i64)
        .bind(properties_json)
        .bind(kind)
        .bind(loc_id)
        .execute(&self.pool)
        .await?;
        Ok(object.clone())
    }

    pub async fn update(&self, object: &GameObject) -> GameResult<()> {
        let properties_json = serde_json::to_string(&object.properties).map_err(GameError::internal)?;
        let (kind, loc_id) = location_columns(&object.location);
        let result = sqlx::query(
            "UPDATE game_objects SET properties = ?, location_kind = ?, location_id = ? WHERE id = ?",
        )
        .bind(properties_json)
        .bind(kind)
        .bind(loc_id)
        .bind(&object.id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(GameError::NotFound(format!("object {}", object.id)));
        }
        Ok(())
    }

    pub async fn delete(&self, id: &str) -> GameResult<()> {
        sqlx::query("DELETE FROM game_objects WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    fn from_row(row: sqlx::sqlite::SqliteRow) -> GameResult<GameObject> {
        let properties_json: String = row.try_get("properties")?;
        let location_kind: String = row.try_get("location_kind")?;
        let kind = match location_kind.as_str() {
            "room" => LocationKind::Room,
            "player_inventory" => LocationKind::PlayerInventory,
            "npc_inventory" => LocationKind::NpcInventory,
            other => return Err(GameError::internal(anyhow::anyhow!("unknown location kind {other}"))),
        };
        Ok(GameObject {
            id: row.try_get("id")?,
            name: locmap_from_columns(row.try_get("name_en")?, row.try_get("name_ko")?),
            description: locmap_from_columns(
                row.try_get("description_en")?,
                row.try_get("description_ko")?,
            ),
            object_type: row.try_get("object_type")?,
            category: row.try_get("category")?,
            weight: row.try_get("weight")?,
            stackable: row.try_get("stackable")?,
            max_stack: row.try_get::<i64, _>("max_stack")? as u32,
            properties: serde_json::from_str(&properties_json).map_err(GameError::internal)?,
            location: ObjectLocation {
                kind,
                id: row.try_get("location_id")?,
            },
        })
    }
}

fn location_columns(location: &ObjectLocation) -> (&'static str, &str) {
    let kind = match location.kind {
        LocationKind::Room => "room",
        LocationKind::PlayerInventory => "player_inventory",
        LocationKind::NpcInventory => "npc_inventory",
    };
    (kind, &location.id)
}

#[derive(Clone)]
pub struct MonsterRepository {
    pool: SqlitePool,
}

impl MonsterRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> GameResult<Monster> {
        let row = sqlx::query("SELECT * FROM monsters WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| GameError::NotFound(format!("monster {id}")))?;
        Self::from_row(row)
    }

    pub async fn list_all(&self) -> GameResult<Vec<Monster>> {
        let rows = sqlx::query("SELECT * FROM monsters").fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::from_row).collect()
    }

    pub async fn create(&self, monster: &Monster) -> GameResult<Monster> {
        let stats_json = serde_json::to_string(&monster.stats).map_err(GameError::internal)?;
        let drop_items_json = serde_json::to_string(&monster.drop_items).map_err(GameError::internal)?;
        sqlx::query(
            "INSERT OR IGNORE INTO monsters (id, template_id, name_en, name_ko, stats, monster_type, behavior, current_room_id, aggro_range, roaming_range, drop_items, gold_reward, respawn_time_sec, alive)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&monster.id)
        .bind(&monster.template_id)
        .bind(monster.name.en())
        .bind(monster.name.as_map().get("ko"))
        .bind(stats_json)
        .bind(monster_type_str(monster.monster_type))
        .bind(monster_behavior_str(monster.behavior))
        .bind(&monster.current_room_id)
        .bind(monster.aggro_range as i64)
        .bind(monster.roaming_range as i64)
        .bind(drop_items_json)
        .bind(monster.gold_reward as i64)
        .bind(monster.respawn_time_sec as i64)
        .bind(monster.alive)
        .execute(&self.pool)
        .await?;
        Ok(monster.clone())
    }

    pub async fn update(&self, monster: &Monster) -> GameResult<()> {
        let stats_json = serde_json::to_string(&monster.stats).map_err(GameError::internal)?;
        let result = sqlx::query(
            "UPDATE monsters SET stats = ?, current_room_id = ?, alive = ? WHERE id = ?",
        )
        .bind(stats_json)
        .bind(&monster.current_room_id)
        .bind(monster.alive)
        .bind(&monster.id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(GameError::NotFound(format!("monster {}", monster.id)));
        }
        Ok(())
    }

    pub async fn delete(&self, id: &str) -> GameResult<()> {
        sqlx::query("DELETE FROM monsters WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    fn from_row(row: sqlx::sqlite::SqliteRow) -> GameResult<Monster> {
        let stats_json: String = row.try_get("stats")?;
        let drop_items_json: String = row.try_get("drop_items")?;
        let monster_type: String = row.try_get("monster_type")?;
        let behavior: String = row.try_get("behavior")?;
        Ok(Monster {
            id: row.try_get("id")?,
            template_id: row.try_get("template_id")?,
            name: locmap_from_columns(row.try_get("name_en")?, row.try_get("name_ko")?),
            stats: serde_json::from_str(&stats_json).map_err(GameError::internal)?,
            monster_type: parse_monster_type(&monster_type)?,
            behavior: parse_monster_behavior(&behavior)?,
            current_room_id: row.try_get("current_room_id")?,
            aggro_range: row.try_get::<i64, _>("aggro_range")? as u32,
            roaming_range: row.try_get::<i64, _>("roaming_range")? as u32,
            drop_items: serde_json::from_str::<Vec<DropItem>>(&drop_items_json)
                .map_err(GameError::internal)?,
            gold_reward: row.try_get::<i64, _>("gold_reward")? as u64,
            respawn_time_sec: row.try_get::<i64, _>("respawn_time_sec")? as u64,
            alive: row.try_get("alive")?,
            active_combat_instance: None,
        })
    }
}

fn monster_type_str(t: MonsterType) -> &'static str {
    match t {
        MonsterType::Aggressive => "aggressive",
        MonsterType::Passive => "passive",
        MonsterType::Neutral => "neutral",
    }
}

fn parse_monster_type(raw: &str) -> GameResult<MonsterType> {
    match raw {
        "aggressive" => Ok(MonsterType::Aggressive),
        "passive" => Ok(MonsterType::Passive),
        "neutral" => Ok(MonsterType::Neutral),
        other => Err(GameError::internal(anyhow::anyhow!("unknown monster_type {other}"))),
    }
}

fn monster_behavior_str(b: MonsterBehavior) -> &'static str {
    match b {
        MonsterBehavior::Stationary => "stationary",
        MonsterBehavior::Roaming => "roaming",
        MonsterBehavior::Patrolling => "patrolling",
    }
}

fn parse_monster_behavior(raw: &str) -> GameResult<MonsterBehavior> {
    match raw {
        "stationary" => Ok(MonsterBehavior::Stationary),
        "roaming" => Ok(MonsterBehavior::Roaming),
        "patrolling" => Ok(MonsterBehavior::Patrolling),
        other => Err(GameError::internal(anyhow::anyhow!("unknown behavior {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::run_migrations;
    use crate::domain::{ObjectLocation, Player};
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .connect("sqlite::memory:")
            .await
            .unwrap();
        run_migrations(&pool).await.unwrap();
        pool
    }

    fn sample_player() -> Player {
        Player {
            id: "p1".to_string(),
            username: "alice".to_string(),
            password_hash: "hash".to_string(),
            is_admin: false,
            preferred_locale: "en".to_string(),
            created_at: Utc::now(),
            last_login: None,
            current_room_id: "town_square".to_string(),
            stats: StatBlock::new(1, 10, 10, 10, 10, 10, 10),
            inventory: vec![],
            gold: 0,
            experience: 0,
        }
    }

    #[tokio::test]
    async fn create_then_get_returns_equal_entity() {
        let pool = memory_pool().await;
        let repo = PlayerRepository::new(pool);
        let player = sample_player();
        repo.create(&player).await.unwrap();
        let fetched = repo.get_by_id(&player.id).await.unwrap();
        assert_eq!(fetched, player);
    }

    #[tokio::test]
    async fn get_by_id_missing_is_not_found() {
        let pool = memory_pool().await;
        let repo = PlayerRepository::new(pool);
        let err = repo.get_by_id("nope").await.unwrap_err();
        assert!(matches!(err, GameError::NotFound(_)));
    }

    #[tokio::test]
    async fn room_round_trips_exits_and_spawn_points() {
        let pool = memory_pool().await;
        let repo = RoomRepository::new(pool);
        let mut room = Room {
            id: "r1".to_string(),
            name: LocMap::new("Room One"),
            description: LocMap::new("A room."),
            exits: BTreeMap::from([(Direction::North, "r2".to_string())]),
            spawn_points: vec![SpawnPoint {
                room_id: "r1".to_string(),
                template_id: "goblin".to_string(),
                count: 2,
                respawn_time_sec: 30,
                roaming_enabled: false,
            }],
        };
        repo.create(&room).await.unwrap();
        let fetched = repo.get_by_id("r1").await.unwrap();
        assert_eq!(fetched, room);

        room.exits.insert(Direction::South, "r3".to_string());
        repo.update(&room).await.unwrap();
        let fetched = repo.get_by_id("r1").await.unwrap();
        assert_eq!(fetched.exits.len(), 2);
    }

    #[tokio::test]
    async fn seeding_the_same_room_id_twice_is_a_no_op() {
        let pool = memory_pool().await;
        let repo = RoomRepository::new(pool);
        let room = Room {
            id: "r1".to_string(),
            name: LocMap::new("Room One"),
            description: LocMap::new("A room."),
            exits: BTreeMap::new(),
            spawn_points: vec![],
        };
        repo.create(&room).await.unwrap();
        repo.create(&room).await.unwrap();
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn game_object_has_exactly_one_location_after_round_trip() {
        let pool = memory_pool().await;
        let repo = GameObjectRepository::new(pool);
        let obj = GameObject {
            id: "o1".to_string(),
            name: LocMap::new("Sword"),
            description: LocMap::new("Sharp."),
            object_type: "weapon".to_string(),
            category: "equipment".to_string(),
            weight: 2.0,
            stackable: false,
            max_stack: 1,
            properties: Default::default(),
            location: ObjectLocation::room("r1"),
        };
        repo.create(&obj).await.unwrap();
        let fetched = repo.get_by_id("o1").await.unwrap();
        assert_eq!(fetched.location, ObjectLocation::room("r1"));
    }
}
