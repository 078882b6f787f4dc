//! Monster/item template loading from a JSON templates directory, per the
//! persisted-state layout's "configuration directory holding JSON templates
//! for monsters and items." Templates are read once at startup; `World`
//! copies a template's fields into a fresh `Monster`/`GameObject` on spawn.

use std::collections::HashMap;
use std::path::Path;

use common::LocMap;
use serde::Deserialize;

use crate::domain::{DropItem, MonsterBehavior, MonsterType};
use crate::error::{GameError, GameResult};

#[derive(Debug, Clone, Deserialize)]
pub struct MonsterTemplate {
    pub template_id: String,
    pub name_en: String,
    #[serde(default)]
    pub name_ko: Option<String>,
    pub level: u32,
    pub str_: u32,
    pub dex: u32,
    pub con: u32,
    pub int_: u32,
    pub wis: u32,
    pub cha: u32,
    pub monster_type: MonsterType,
    pub behavior: MonsterBehavior,
    #[serde(default)]
    pub aggro_range: u32,
    #[serde(default)]
    pub roaming_range: u32,
    #[serde(default)]
    pub drop_items: Vec<DropItem>,
    #[serde(default)]
    pub gold_reward: u64,
    #[serde(default = "default_respawn_time")]
    pub respawn_time_sec: u64,
}

fn default_respawn_time() -> u64 {
    30
}

impl MonsterTemplate {
    pub fn display_name(&self) -> LocMap {
        let mut loc = LocMap::new(self.name_en.clone());
        if let Some(ko) = &self.name_ko {
            loc.insert("ko", ko.clone());
        }
        loc
    }
}

#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    monsters: HashMap<String, MonsterTemplate>,
}

impl TemplateRegistry {
    /// Loads every `*.json` file directly under `dir` as a [`MonsterTemplate`].
    /// A missing directory yields an empty registry rather than an error,
    /// since a fresh deployment may not have templates seeded yet.
    pub fn load_from_dir(dir: &Path) -> GameResult<Self> {
        let mut monsters = HashMap::new();
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(_) => return Ok(Self { monsters }),
        };
        for entry in entries {
            let entry = entry.map_err(GameError::internal)?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let content = std::fs::read_to_string(&path).map_err(GameError::internal)?;
            let template: MonsterTemplate = serde_json::from_str(&content).map_err(GameError::internal)?;
            monsters.insert(template.template_id.clone(), template);
        }
        Ok(Self { monsters })
    }

    pub fn get(&self, template_id: &str) -> Option<&MonsterTemplate> {
        self.monsters.get(template_id)
    }

    pub fn insert(&mut self, template: MonsterTemplate) {
        self.monsters.insert(template.template_id.clone(), template);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_directory_yields_empty_registry() {
        let registry = TemplateRegistry::load_from_dir(Path::new("/nonexistent/path")).unwrap();
        assert!(registry.get("goblin").is_none());
    }

    #[test]
    fn template_display_name_falls_back_to_en() {
        let template = MonsterTemplate {
            template_id: "goblin".to_string(),
            name_en: "Goblin".to_string(),
            name_ko: None,
            level: 1,
            str_: 8,
            dex: 10,
            con: 8,
            int_: 4,
            wis: 4,
            cha: 4,
            monster_type: MonsterType::Aggressive,
            behavior: MonsterBehavior::Roaming,
            aggro_range: 0,
            roaming_range: 2,
            drop_items: vec![],
            gold_reward: 5,
            respawn_time_sec: 30,
        };
        assert_eq!(template.display_name().localized("fr"), "Goblin");
    }
}
