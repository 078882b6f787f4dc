//! Ordered, idempotent schema migrations, grounded on the embedded-SQL-schema
//! pattern used by `other_examples/111b7aff_tobert-sshwarma__src-db-schema.rs.rs`
//! (a `SCHEMA_VERSION` constant plus `CREATE TABLE IF NOT EXISTS` statements),
//! adapted into discrete numbered steps so each one can be guarded
//! individually via a `schema_migrations` table rather than applied as one
//! monolithic block.

use sqlx::SqlitePool;

use crate::error::GameResult;

pub struct Migration {
    pub version: i64,
    pub sql: &'static str,
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        sql: r#"
            CREATE TABLE IF NOT EXISTS players (
                id TEXT PRIMARY KEY,
                username TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                is_admin INTEGER NOT NULL DEFAULT 0,
                preferred_locale TEXT NOT NULL DEFAULT 'en',
                created_at TEXT NOT NULL,
                last_login TEXT,
                current_room_id TEXT NOT NULL,
                stats TEXT NOT NULL,
                inventory TEXT NOT NULL DEFAULT '[]',
                gold INTEGER NOT NULL DEFAULT 0,
                experience INTEGER NOT NULL DEFAULT 0
            );
        "#,
    },
    Migration {
        version: 2,
        sql: r#"
            CREATE TABLE IF NOT EXISTS rooms (
                id TEXT PRIMARY KEY,
                name_en TEXT NOT NULL,
                name_ko TEXT,
                description_en TEXT NOT NULL,
                description_ko TEXT,
                exits TEXT NOT NULL DEFAULT '{}',
                spawn_points TEXT NOT NULL DEFAULT '[]'
            );
        "#,
    },
    Migration {
        version: 3,
        sql: r#"
            CREATE TABLE IF NOT EXISTS game_objects (
                id TEXT PRIMARY KEY,
                name_en TEXT NOT NULL,
                name_ko TEXT,
                description_en TEXT NOT NULL,
                description_ko TEXT,
                object_type TEXT NOT NULL,
                category TEXT NOT NULL,
                weight REAL NOT NULL DEFAULT 0,
                stackable INTEGER NOT NULL DEFAULT 0,
                max_stack INTEGER NOT NULL DEFAULT 1,
                properties TEXT NOT NULL DEFAULT '{}',
                location_kind TEXT NOT NULL,
                location_id TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_game_objects_location
                ON game_objects (location_kind, location_id);
        "#,
    },
    Migration {
        version: 4,
        sql: r#"
            CREATE TABLE IF NOT EXISTS monsters (
                id TEXT PRIMARY KEY,
                template_id TEXT NOT NULL,
                name_en TEXT NOT NULL,
                name_ko TEXT,
                stats TEXT NOT NULL,
                monster_type TEXT NOT NULL,
                behavior TEXT NOT NULL,
                current_room_id TEXT NOT NULL,
                aggro_range INTEGER NOT NULL DEFAULT 0,
                roaming_range INTEGER NOT NULL DEFAULT 0,
                drop_items TEXT NOT NULL DEFAULT '[]',
                gold_reward INTEGER NOT NULL DEFAULT 0,
                respawn_time_sec INTEGER NOT NULL DEFAULT 30,
                alive INTEGER NOT NULL DEFAULT 1
            );
            CREATE INDEX IF NOT EXISTS idx_monsters_room ON monsters (current_room_id);
        "#,
    },
    Migration {
        version: 5,
        sql: r#"
            CREATE TABLE IF NOT EXISTS sessions_history (
                id TEXT PRIMARY KEY,
                player_id TEXT,
                remote_addr TEXT NOT NULL,
                connected_at TEXT NOT NULL,
                disconnected_at TEXT
            );
        "#,
    },
];

/// Runs every migration whose version is not yet recorded, each inside its
/// own transaction. `CREATE TABLE IF NOT EXISTS` makes re-running any step a
/// no-op even without the tracking table, but the tracking table avoids the
/// cost of re-probing `sqlite_master` on every startup.
pub async fn run_migrations(pool: &SqlitePool) -> GameResult<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS schema_migrations (version INTEGER PRIMARY KEY, applied_at TEXT NOT NULL)",
    )
    .execute(pool)
    .await?;

    for migration in MIGRATIONS {
        let already_applied: Option<(i64,)> =
            sqlx::query_as("SELECT version FROM schema_migrations WHERE version = ?")
                .bind(migration.version)
                .fetch_optional(pool)
                .await?;
        if already_applied.is_some() {
            continue;
        }

        let mut tx = pool.begin().await?;
        for statement in migration.sql.split(';') {
            let statement = statement.trim();
            if statement.is_empty() {
                continue;
            }
            sqlx::query(statement).execute(&mut *tx).await?;
        }
        sqlx::query("INSERT INTO schema_migrations (version, applied_at) VALUES (?, datetime('now'))")
            .bind(migration.version)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        log::info!("applied migration {}", migration.version);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let pool = memory_pool().await;
        run_migrations(&pool).await.unwrap();
        run_migrations(&pool).await.unwrap();

        let tables: Vec<(String,)> =
            sqlx::query_as("SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'players'")
                .fetch_all(&pool)
                .await
                .unwrap();
        assert_eq!(tables.len(), 1);
    }
}
