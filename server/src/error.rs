//! Error kinds shared across the engine, grounded on the abstract error list
//! in the component design: malformed input, auth, authorization, missing
//! entities, state conflicts, timeouts and transport/storage failures.

use protocol::ActionResult;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum GameError {
    #[error("input error: {0}")]
    Input(String),
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("not authorized: {0}")]
    Authz(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("illegal state: {0}")]
    State(String),
    #[error("timed out: {0}")]
    Timeout(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("internal error")]
    Internal(#[source] anyhow::Error),
}

impl GameError {
    pub fn internal(err: impl Into<anyhow::Error>) -> Self {
        GameError::Internal(err.into())
    }

    /// User-facing message per the propagation policy: `Internal` is never
    /// shown verbatim and is logged with a correlation id instead.
    pub fn into_action_result(self, action: &str) -> ActionResult {
        let message = match &self {
            GameError::Internal(err) => {
                let correlation_id = Uuid::new_v4();
                log::error!("internal error [{correlation_id}]: {err:#}");
                format!("an internal error occurred (code: {correlation_id})")
            }
            other => other.to_string(),
        };
        ActionResult {
            action: action.to_string(),
            message: Some(message),
            data: None,
        }
    }
}

impl From<sqlx::Error> for GameError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => GameError::NotFound("row not found".to_string()),
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                GameError::Conflict(db_err.message().to_string())
            }
            _ => GameError::Storage(err.to_string()),
        }
    }
}

impl From<bcrypt::BcryptError> for GameError {
    fn from(err: bcrypt::BcryptError) -> Self {
        GameError::internal(err)
    }
}

pub type GameResult<T> = Result<T, GameError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_error_hides_the_source_message() {
        let err = GameError::internal(anyhow::anyhow!("leaked db password in this string"));
        let result = err.into_action_result("look");
        let message = result.message.unwrap();
        assert!(!message.contains("leaked"));
        assert!(message.starts_with("an internal error occurred"));
    }

    #[test]
    fn state_error_surfaces_its_text_directly() {
        let err = GameError::State("already in combat".to_string());
        let result = err.into_action_result("attack");
        assert_eq!(result.message.unwrap(), "illegal state: already in combat");
    }
}
