use std::collections::HashMap;

use common::LocMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{DomainError, EntityId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationKind {
    Room,
    PlayerInventory,
    NpcInventory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectLocation {
    pub kind: LocationKind,
    pub id: EntityId,
}

impl ObjectLocation {
    pub fn room(room_id: impl Into<EntityId>) -> Self {
        Self {
            kind: LocationKind::Room,
            id: room_id.into(),
        }
    }

    pub fn player_inventory(player_id: impl Into<EntityId>) -> Self {
        Self {
            kind: LocationKind::PlayerInventory,
            id: player_id.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameObject {
    pub id: EntityId,
    pub name: LocMap,
    pub description: LocMap,
    pub object_type: String,
    pub category: String,
    pub weight: f32,
    pub stackable: bool,
    pub max_stack: u32,
    pub properties: HashMap<String, Value>,
    pub location: ObjectLocation,
}

impl GameObject {
    /// Every object has exactly one location; the type system already
    /// guarantees that (a single `ObjectLocation` field), so validation only
    /// checks the stacking contract.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.stackable && self.max_stack == 0 {
            return Err(DomainError::OutOfRange {
                field: "max_stack",
                min: 1,
                max: i64::MAX,
                actual: 0,
            });
        }
        Ok(())
    }

    pub fn localized_name(&self, locale: &str) -> &str {
        self.name.localized(locale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> GameObject {
        GameObject {
            id: "sword_01".to_string(),
            name: LocMap::new("Iron Sword"),
            description: LocMap::new("A plain iron sword."),
            object_type: "weapon".to_string(),
            category: "equipment".to_string(),
            weight: 3.5,
            stackable: false,
            max_stack: 1,
            properties: HashMap::new(),
            location: ObjectLocation::room("town_square"),
        }
    }

    #[test]
    fn object_round_trips_through_json() {
        let obj = sample();
        let json = serde_json::to_string(&obj).unwrap();
        let restored: GameObject = serde_json::from_str(&json).unwrap();
        assert_eq!(obj, restored);
    }

    #[test]
    fn stackable_object_requires_nonzero_max_stack() {
        let mut obj = sample();
        obj.stackable = true;
        obj.max_stack = 0;
        assert!(obj.validate().is_err());
    }
}
