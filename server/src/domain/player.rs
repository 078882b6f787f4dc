use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{DomainError, EntityId};

/// The six primary stats plus the values derived from them. Derived values
/// are recomputed by [`StatBlock::recompute_derived`] whenever a primary or
/// the level changes; callers must not hand-edit `hp`/`attack`/etc.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatBlock {
    pub level: u32,
    pub str_: u32,
    pub dex: u32,
    pub con: u32,
    pub int_: u32,
    pub wis: u32,
    pub cha: u32,
    pub current_hp: i32,
    pub max_hp: i32,
    pub current_mp: i32,
    pub max_mp: i32,
    pub attack: i32,
    pub defense: i32,
    pub speed: i32,
    pub carry_weight: f32,
}

impl StatBlock {
    pub fn new(level: u32, str_: u32, dex: u32, con: u32, int_: u32, wis: u32, cha: u32) -> Self {
        let mut stats = Self {
            level,
            str_,
            dex,
            con,
            int_,
            wis,
            cha,
            current_hp: 0,
            max_hp: 0,
            current_mp: 0,
            max_mp: 0,
            attack: 0,
            defense: 0,
            speed: 0,
            carry_weight: 0.0,
        };
        stats.recompute_derived();
        stats.current_hp = stats.max_hp;
        stats.current_mp = stats.max_mp;
        stats
    }

    /// Recomputes every derived stat from the primaries and level. Called on
    /// load and on any primary-stat mutation; `current_hp`/`current_mp` are
    /// clamped to the new max rather than reset.
    pub fn recompute_derived(&mut self) {
        let level = self.level as i32;
        self.max_hp = 10 * (self.con as i32) + 5 * level;
        self.max_mp = 5 * (self.int_ as i32) + 3 * level;
        self.attack = 2 * (self.str_ as i32) + level;
        self.defense = self.con as i32 + (self.dex as i32) / 2;
        self.speed = self.dex as i32;
        self.carry_weight = derive_max_carry_weight(self.str_);
        self.current_hp = self.current_hp.clamp(0, self.max_hp);
        self.current_mp = self.current_mp.clamp(0, self.max_mp);
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        for (field, value) in [
            ("str", self.str_),
            ("dex", self.dex),
            ("con", self.con),
            ("int", self.int_),
            ("wis", self.wis),
            ("cha", self.cha),
        ] {
            if !(1..=30).contains(&value) {
                return Err(DomainError::OutOfRange {
                    field,
                    min: 1,
                    max: 30,
                    actual: value as i64,
                });
            }
        }
        if !(1..=100).contains(&self.level) {
            return Err(DomainError::OutOfRange {
                field: "level",
                min: 1,
                max: 100,
                actual: self.level as i64,
            });
        }
        if self.current_hp > self.max_hp {
            return Err(DomainError::HpExceedsMax {
                current: self.current_hp,
                max: self.max_hp,
            });
        }
        Ok(())
    }
}

/// A player's carry capacity, derived purely from strength. Consumers must
/// call this (or read `StatBlock::carry_weight`) rather than deriving their
/// own formula from the raw `str_` primary.
pub fn derive_max_carry_weight(str_: u32) -> f32 {
    10.0 + (str_ as f32) * 5.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: EntityId,
    pub username: String,
    pub password_hash: String,
    pub is_admin: bool,
    pub preferred_locale: String,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
    pub current_room_id: EntityId,
    pub stats: StatBlock,
    pub inventory: Vec<EntityId>,
    pub gold: u64,
    pub experience: u64,
}

impl Player {
    pub fn validate(&self) -> Result<(), DomainError> {
        super::validate_username(&self.username)?;
        self.stats.validate()
    }

    pub fn max_carry_weight(&self) -> f32 {
        self.stats.carry_weight
    }

    pub fn is_alive(&self) -> bool {
        self.stats.current_hp > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recompute_derived_clamps_current_hp_to_new_max() {
        let mut stats = StatBlock::new(1, 10, 10, 10, 10, 10, 10);
        stats.current_hp = stats.max_hp;
        stats.con = 1;
        stats.recompute_derived();
        assert!(stats.current_hp <= stats.max_hp);
    }

    #[test]
    fn carry_weight_is_pure_function_of_strength() {
        assert_eq!(derive_max_carry_weight(10), 60.0);
        assert_eq!(derive_max_carry_weight(1), 15.0);
    }

    #[test]
    fn validate_rejects_hp_above_max() {
        let mut stats = StatBlock::new(1, 10, 10, 10, 10, 10, 10);
        stats.current_hp = stats.max_hp + 1;
        assert!(stats.validate().is_err());
    }
}
