//! Credential verification and account creation, grounded on `db/models.rs`'s
//! `Account::new`/`verify_password` bcrypt idiom, adapted to operate on
//! `Player` rows directly (no separate account/character split) and to
//! populate a fresh character's stats/starting room on registration.

use chrono::Utc;
use uuid::Uuid;

use crate::db::PlayerRepository;
use crate::domain::{self, Player, StatBlock};
use crate::error::{GameError, GameResult};

const STARTING_ROOM_ID: &str = "town_square";

#[derive(Clone)]
pub struct AuthService {
    players: PlayerRepository,
}

impl AuthService {
    pub fn new(players: PlayerRepository) -> Self {
        Self { players }
    }

    pub async fn authenticate(&self, username: &str, password: &str) -> GameResult<Player> {
        let mut player = self
            .players
            .get_by_username(username)
            .await?
            .ok_or_else(|| GameError::Auth("unknown username or password".to_string()))?;
        let ok = bcrypt::verify(password, &player.password_hash)?;
        if !ok {
            return Err(GameError::Auth("unknown username or password".to_string()));
        }
        player.last_login = Some(Utc::now());
        self.players.update(&player).await?;
        Ok(player)
    }

    pub async fn register(&self, username: &str, password: &str) -> GameResult<Player> {
        domain::validate_username(username).map_err(|e| GameError::Input(e.to_string()))?;
        domain::validate_password(password).map_err(|e| GameError::Input(e.to_string()))?;

        if self.players.get_by_username(username).await?.is_some() {
            return Err(GameError::Conflict(format!("username {username} is taken")));
        }

        let password_hash = bcrypt::hash(password, bcrypt::DEFAULT_COST)?;
        let player = Player {
            id: Uuid::new_v4().to_string(),
            username: username.to_string(),
            password_hash,
            is_admin: false,
            preferred_locale: common::DEFAULT_LOCALE.to_string(),
            created_at: Utc::now(),
            last_login: Some(Utc::now()),
            current_room_id: STARTING_ROOM_ID.to_string(),
            stats: StatBlock::new(1, 10, 10, 10, 10, 10, 10),
            inventory: vec![],
            gold: 0,
            experience: 0,
        };
        self.players.create(&player).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::run_migrations;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn service() -> AuthService {
        let pool = SqlitePoolOptions::new().connect("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        AuthService::new(PlayerRepository::new(pool))
    }

    #[tokio::test]
    async fn register_then_authenticate_succeeds() {
        let auth = service().await;
        auth.register("alice", "hunter2").await.unwrap();
        let player = auth.authenticate("alice", "hunter2").await.unwrap();
        assert_eq!(player.username, "alice");
        assert_eq!(player.current_room_id, STARTING_ROOM_ID);
    }

    #[tokio::test]
    async fn authenticate_rejects_wrong_password() {
        let auth = service().await;
        auth.register("alice", "hunter2").await.unwrap();
        let err = auth.authenticate("alice", "wrong-pass").await.unwrap_err();
        assert!(matches!(err, GameError::Auth(_)));
    }

    #[tokio::test]
    async fn register_rejects_duplicate_username() {
        let auth = service().await;
        auth.register("alice", "hunter2").await.unwrap();
        let err = auth.register("alice", "another1").await.unwrap_err();
        assert!(matches!(err, GameError::Conflict(_)));
    }

    #[tokio::test]
    async fn register_rejects_short_password() {
        let auth = service().await;
        let err = auth.register("alice", "short").await.unwrap_err();
        assert!(matches!(err, GameError::Input(_)));
    }
}
