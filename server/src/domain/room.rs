use std::collections::BTreeMap;

use common::{Direction, LocMap};
use serde::{Deserialize, Serialize};

use super::{DomainError, EntityId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub id: EntityId,
    pub name: LocMap,
    pub description: LocMap,
    pub exits: BTreeMap<Direction, EntityId>,
    pub spawn_points: Vec<SpawnPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnPoint {
    pub room_id: EntityId,
    pub template_id: EntityId,
    pub count: u32,
    pub respawn_time_sec: u64,
    pub roaming_enabled: bool,
}

impl Room {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.name.as_map().contains_key("en") && self.description.as_map().contains_key("en") {
            Ok(())
        } else {
            Err(DomainError::MissingDefaultLocale)
        }
    }

    pub fn localized_name(&self, locale: &str) -> &str {
        self.name.localized(locale)
    }

    pub fn localized_description(&self, locale: &str) -> &str {
        self.description.localized(locale)
    }

    pub fn exit_toward(&self, direction: Direction) -> Option<&EntityId> {
        self.exits.get(&direction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_room() -> Room {
        Room {
            id: "town_square".to_string(),
            name: LocMap::new("Town Square").with("ko", "마을 광장"),
            description: LocMap::new("A bustling square."),
            exits: BTreeMap::from([(Direction::North, "north_gate".to_string())]),
            spawn_points: vec![],
        }
    }

    #[test]
    fn room_round_trips_through_json() {
        let room = sample_room();
        let json = serde_json::to_string(&room).unwrap();
        let restored: Room = serde_json::from_str(&json).unwrap();
        assert_eq!(room, restored);
    }

    #[test]
    fn room_with_no_exits_has_no_walkable_direction() {
        let mut room = sample_room();
        room.exits.clear();
        assert_eq!(room.exit_toward(Direction::North), None);
    }

    #[test]
    fn localized_name_falls_back_to_en() {
        let room = sample_room();
        assert_eq!(room.localized_name("fr"), "Town Square");
        assert_eq!(room.localized_name("ko"), "마을 광장");
    }
}
