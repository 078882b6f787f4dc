//! Domain entities: rooms, objects, monsters, players, and combat snapshots.
//!
//! Entities here own validation and localization; they know nothing about
//! SQL or sockets. `crate::db` maps them to/from rows, `crate::world` indexes
//! them in memory, `crate::combat` mutates `Combatant` snapshots.

mod combat;
mod monster;
mod object;
mod player;
mod room;

pub use combat::{Combatant, CombatantKind, CombatInstance, CombatInstanceState};
pub use monster::{DropItem, Monster, MonsterBehavior, MonsterType};
pub use object::{GameObject, LocationKind, ObjectLocation};
pub use player::{Player, StatBlock};
pub use room::{Room, SpawnPoint};

/// Entities are keyed by opaque string ids (room ids are human-chosen, e.g.
/// `forest_3_2`; player/object/monster ids are UUIDs minted on creation).
pub type EntityId = String;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("{field} must be between {min} and {max}, got {actual}")]
    OutOfRange {
        field: &'static str,
        min: i64,
        max: i64,
        actual: i64,
    },
    #[error("current_hp ({current}) exceeds max_hp ({max})")]
    HpExceedsMax { current: i32, max: i32 },
    #[error("username must be 3-20 chars of [A-Za-z0-9_], got {0:?}")]
    InvalidUsername(String),
    #[error("password must be at least 6 characters")]
    InvalidPassword,
    #[error("locale map is missing a mandatory 'en' entry")]
    MissingDefaultLocale,
}

pub fn validate_username(username: &str) -> Result<(), DomainError> {
    let len_ok = (3..=20).contains(&username.len());
    let chars_ok = username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if len_ok && chars_ok {
        Ok(())
    } else {
        Err(DomainError::InvalidUsername(username.to_string()))
    }
}

pub fn validate_password(password: &str) -> Result<(), DomainError> {
    if password.len() >= 6 {
        Ok(())
    } else {
        Err(DomainError::InvalidPassword)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_boundary_lengths() {
        assert!(validate_username("abc").is_ok());
        assert!(validate_username("a".repeat(20).as_str()).is_ok());
        assert!(validate_username("ab").is_err());
        assert!(validate_username(&"a".repeat(21)).is_err());
        assert!(validate_username("bad name").is_err());
    }

    #[test]
    fn password_boundary_length() {
        assert!(validate_password("hunter2").is_ok());
        assert!(validate_password("abcde").is_err());
        assert!(validate_password("abcdef").is_ok());
    }
}
