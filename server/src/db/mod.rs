pub mod migrations;
pub mod repository;

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use crate::error::GameResult;
pub use repository::{GameObjectRepository, MonsterRepository, PlayerRepository, RoomRepository};

/// Connects to the configured SQLite database and applies pending migrations.
pub async fn connect(database_url: &str) -> GameResult<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;
    migrations::run_migrations(&pool).await?;
    Ok(pool)
}

/// Bundles one repository per entity type, handed to the world manager at
/// startup for hydration and used by it for all mirror-writes thereafter.
#[derive(Clone)]
pub struct Repositories {
    pub players: PlayerRepository,
    pub rooms: RoomRepository,
    pub objects: GameObjectRepository,
    pub monsters: MonsterRepository,
}

impl Repositories {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            players: PlayerRepository::new(pool.clone()),
            rooms: RoomRepository::new(pool.clone()),
            objects: GameObjectRepository::new(pool.clone()),
            monsters: MonsterRepository::new(pool),
        }
    }
}
