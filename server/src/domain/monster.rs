use common::LocMap;
use serde::{Deserialize, Serialize};

use super::player::StatBlock;
use super::{DomainError, EntityId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonsterType {
    Aggressive,
    Passive,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonsterBehavior {
    Stationary,
    Roaming,
    Patrolling,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropItem {
    pub template_id: EntityId,
    pub chance: f32,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Monster {
    pub id: EntityId,
    pub template_id: EntityId,
    pub name: LocMap,
    pub stats: StatBlock,
    pub monster_type: MonsterType,
    pub behavior: MonsterBehavior,
    pub current_room_id: EntityId,
    pub aggro_range: u32,
    pub roaming_range: u32,
    pub drop_items: Vec<DropItem>,
    pub gold_reward: u64,
    pub respawn_time_sec: u64,
    pub alive: bool,
    /// Id of the active [`crate::domain::CombatInstance`] this monster is a
    /// combatant in, if any — enforces "at most one active combat instance."
    pub active_combat_instance: Option<EntityId>,
}

impl Monster {
    pub fn validate(&self) -> Result<(), DomainError> {
        self.stats.validate()
    }

    pub fn localized_name(&self, locale: &str) -> &str {
        self.name.localized(locale)
    }

    pub fn is_aggressive(&self) -> bool {
        self.monster_type == MonsterType::Aggressive
    }

    pub fn in_combat(&self) -> bool {
        self.active_combat_instance.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::player::StatBlock;

    fn sample() -> Monster {
        Monster {
            id: "goblin_1".to_string(),
            template_id: "goblin".to_string(),
            name: LocMap::new("Goblin"),
            stats: StatBlock::new(1, 8, 10, 8, 4, 4, 4),
            monster_type: MonsterType::Aggressive,
            behavior: MonsterBehavior::Roaming,
            current_room_id: "forest_1".to_string(),
            aggro_range: 0,
            roaming_range: 2,
            drop_items: vec![],
            gold_reward: 5,
            respawn_time_sec: 30,
            alive: true,
            active_combat_instance: None,
        }
    }

    #[test]
    fn monster_round_trips_through_json_preserving_drop_items() {
        let mut monster = sample();
        monster.drop_items.push(DropItem {
            template_id: "dagger".to_string(),
            chance: 0.1,
            quantity: 1,
        });
        let json = serde_json::to_string(&monster).unwrap();
        let restored: Monster = serde_json::from_str(&json).unwrap();
        assert_eq!(monster, restored);
    }

    #[test]
    fn monster_is_in_at_most_one_combat_instance() {
        let mut monster = sample();
        assert!(!monster.in_combat());
        monster.active_combat_instance = Some("combat_1".to_string());
        assert!(monster.in_combat());
    }
}
