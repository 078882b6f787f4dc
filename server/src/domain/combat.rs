use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::EntityId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombatantKind {
    Player,
    Monster,
}

/// A combat-capable participant snapshot, derived from a [`super::Player`] or
/// [`super::Monster`] at join time. Damage is applied here during the fight
/// and written back to the source entity when the instance ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Combatant {
    pub id: EntityId,
    pub kind: CombatantKind,
    pub ref_id: EntityId,
    pub display_name: String,
    pub hp: i32,
    pub max_hp: i32,
    pub attack: i32,
    pub defense: i32,
    pub speed: i32,
    pub is_defending: bool,
    pub alive: bool,
    /// Id of the combatant that dealt this combatant's most recent hit,
    /// used to credit a monster's reward to its last damager rather than
    /// pooling it across every survivor.
    pub last_attacker_id: Option<EntityId>,
}

impl Combatant {
    pub fn apply_damage(&mut self, amount: i32) {
        self.hp = (self.hp - amount).max(0);
        if self.hp == 0 {
            self.alive = false;
        }
    }

    pub fn heal(&mut self, amount: i32) {
        self.hp = (self.hp + amount).min(self.max_hp);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombatInstanceState {
    Active,
    Ending,
    Ended,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatInstance {
    pub id: EntityId,
    pub room_id: EntityId,
    pub combatants: Vec<Combatant>,
    pub turn_order: Vec<EntityId>,
    pub current_turn_index: usize,
    pub turn_number: u32,
    pub state: CombatInstanceState,
    pub started_at: DateTime<Utc>,
    pub last_action_at: DateTime<Utc>,
}

impl CombatInstance {
    /// Stable sort by descending speed; ties keep insertion order.
    pub fn compute_turn_order(combatants: &[Combatant]) -> Vec<EntityId> {
        let mut indexed: Vec<&Combatant> = combatants.iter().collect();
        indexed.sort_by(|a, b| b.speed.cmp(&a.speed));
        indexed.into_iter().map(|c| c.id.clone()).collect()
    }

    pub fn current_combatant_id(&self) -> Option<&EntityId> {
        self.turn_order.get(self.current_turn_index)
    }

    pub fn combatant_mut(&mut self, id: &str) -> Option<&mut Combatant> {
        self.combatants.iter_mut().find(|c| c.id == id)
    }

    pub fn combatant(&self, id: &str) -> Option<&Combatant> {
        self.combatants.iter().find(|c| c.id == id)
    }

    pub fn alive_of_kind(&self, kind: CombatantKind) -> impl Iterator<Item = &Combatant> {
        self.combatants
            .iter()
            .filter(move |c| c.kind == kind && c.alive)
    }

    /// Advances to the next not-yet-acted combatant, wrapping `turn_number`.
    pub fn advance_turn(&mut self) {
        if self.turn_order.is_empty() {
            return;
        }
        self.current_turn_index += 1;
        if self.current_turn_index >= self.turn_order.len() {
            self.current_turn_index = 0;
            self.turn_number += 1;
        }
    }

    /// Removes a combatant from the instance, keeping `current_turn_index`
    /// pointed at the same logical "next to act" combatant. If the removed
    /// combatant was the current one, the index is left in place so it now
    /// refers to whoever shifted into that slot (or wraps to 0).
    pub fn remove_combatant(&mut self, id: &str) {
        self.combatants.retain(|c| c.id != id);
        if let Some(pos) = self.turn_order.iter().position(|cid| cid == id) {
            self.turn_order.remove(pos);
            if pos < self.current_turn_index
                || (pos == self.current_turn_index && self.current_turn_index == self.turn_order.len())
            {
                self.current_turn_index = self.current_turn_index.saturating_sub(1);
            }
            if !self.turn_order.is_empty() {
                self.current_turn_index %= self.turn_order.len();
            } else {
                self.current_turn_index = 0;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn combatant(id: &str, speed: i32) -> Combatant {
        Combatant {
            id: id.to_string(),
            kind: CombatantKind::Player,
            ref_id: id.to_string(),
            display_name: id.to_string(),
            hp: 10,
            max_hp: 10,
            attack: 5,
            defense: 1,
            speed,
            is_defending: false,
            alive: true,
            last_attacker_id: None,
        }
    }

    #[test]
    fn turn_order_sorts_by_descending_speed_stably() {
        let combatants = vec![combatant("a", 5), combatant("b", 10), combatant("c", 5)];
        let order = CombatInstance::compute_turn_order(&combatants);
        assert_eq!(order, vec!["b", "a", "c"]);
    }

    #[test]
    fn advance_turn_wraps_and_increments_turn_number() {
        let mut instance = CombatInstance {
            id: "c1".to_string(),
            room_id: "r1".to_string(),
            combatants: vec![combatant("a", 5), combatant("b", 3)],
            turn_order: vec!["a".to_string(), "b".to_string()],
            current_turn_index: 0,
            turn_number: 1,
            state: CombatInstanceState::Active,
            started_at: Utc::now(),
            last_action_at: Utc::now(),
        };
        instance.advance_turn();
        assert_eq!(instance.current_turn_index, 1);
        assert_eq!(instance.turn_number, 1);
        instance.advance_turn();
        assert_eq!(instance.current_turn_index, 0);
        assert_eq!(instance.turn_number, 2);
    }

    #[test]
    fn removing_current_combatant_advances_to_next() {
        let mut instance = CombatInstance {
            id: "c1".to_string(),
            room_id: "r1".to_string(),
            combatants: vec![combatant("a", 5), combatant("b", 3), combatant("c", 1)],
            turn_order: vec!["a".to_string(), "b".to_string(), "c".to_string()],
            current_turn_index: 1,
            turn_number: 1,
            state: CombatInstanceState::Active,
            started_at: Utc::now(),
            last_action_at: Utc::now(),
        };
        instance.remove_combatant("b");
        assert_eq!(instance.turn_order, vec!["a", "c"]);
        assert!(instance.current_turn_index < instance.turn_order.len());
    }

    #[test]
    fn apply_damage_floors_at_zero_and_marks_dead() {
        let mut c = combatant("a", 5);
        c.apply_damage(100);
        assert_eq!(c.hp, 0);
        assert!(!c.alive);
    }
}
