//! Shared primitives for the world model and wire protocol.
//!
//! Kept dependency-free of tokio/sqlx/etc. so both the `protocol` crate and
//! the `server` crate can depend on it without pulling in async runtimes.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

pub const DEFAULT_LOCALE: &str = "en";

/// One of the ten directions a room exit can point.
///
/// The set is closed: there is no "northnorth" or free-form direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Direction {
    North,
    South,
    East,
    West,
    Up,
    Down,
    Northeast,
    Northwest,
    Southeast,
    Southwest,
}

impl Direction {
    pub const ALL: [Direction; 10] = [
        Direction::North,
        Direction::South,
        Direction::East,
        Direction::West,
        Direction::Up,
        Direction::Down,
        Direction::Northeast,
        Direction::Northwest,
        Direction::Southeast,
        Direction::Southwest,
    ];

    /// Accepts both the full name and the short form (`n`, `sw`, ...), case-insensitive.
    pub fn parse(raw: &str) -> Option<Direction> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "n" | "north" => Some(Direction::North),
            "s" | "south" => Some(Direction::South),
            "e" | "east" => Some(Direction::East),
            "w" | "west" => Some(Direction::West),
            "u" | "up" => Some(Direction::Up),
            "d" | "down" => Some(Direction::Down),
            "ne" | "northeast" => Some(Direction::Northeast),
            "nw" | "northwest" => Some(Direction::Northwest),
            "se" | "southeast" => Some(Direction::Southeast),
            "sw" | "southwest" => Some(Direction::Southwest),
            _ => None,
        }
    }

    pub fn opposite(self) -> Direction {
        match self {
            Direction::North => Direction::South,
            Direction::South => Direction::North,
            Direction::East => Direction::West,
            Direction::West => Direction::East,
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Northeast => Direction::Southwest,
            Direction::Northwest => Direction::Southeast,
            Direction::Southeast => Direction::Northwest,
            Direction::Southwest => Direction::Northeast,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::North => "north",
            Direction::South => "south",
            Direction::East => "east",
            Direction::West => "west",
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Northeast => "northeast",
            Direction::Northwest => "northwest",
            Direction::Southeast => "southeast",
            Direction::Southwest => "southwest",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A locale-keyed set of translated strings with a mandatory `en` entry.
///
/// `localized(locale)` falls back to `en` when the requested locale is missing,
/// matching the server's "at least en and ko" contract from the data model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocMap(BTreeMap<String, String>);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LocMapError {
    #[error("locale map is missing a mandatory '{DEFAULT_LOCALE}' entry")]
    MissingDefault,
}

impl LocMap {
    pub fn new(en: impl Into<String>) -> Self {
        let mut map = BTreeMap::new();
        map.insert(DEFAULT_LOCALE.to_string(), en.into());
        Self(map)
    }

    pub fn from_map(map: BTreeMap<String, String>) -> Result<Self, LocMapError> {
        if !map.contains_key(DEFAULT_LOCALE) {
            return Err(LocMapError::MissingDefault);
        }
        Ok(Self(map))
    }

    pub fn with(mut self, locale: impl Into<String>, text: impl Into<String>) -> Self {
        self.0.insert(locale.into(), text.into());
        self
    }

    pub fn insert(&mut self, locale: impl Into<String>, text: impl Into<String>) {
        self.0.insert(locale.into(), text.into());
    }

    /// Returns the translation for `locale`, falling back to `en`.
    pub fn localized(&self, locale: &str) -> &str {
        self.0
            .get(locale)
            .or_else(|| self.0.get(DEFAULT_LOCALE))
            .map(String::as_str)
            .unwrap_or_default()
    }

    pub fn en(&self) -> &str {
        self.localized(DEFAULT_LOCALE)
    }

    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.0
    }

    pub fn into_map(self) -> BTreeMap<String, String> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_short_forms_resolve() {
        assert_eq!(Direction::parse("n"), Some(Direction::North));
        assert_eq!(Direction::parse("SW"), Some(Direction::Southwest));
        assert_eq!(Direction::parse("northeast"), Some(Direction::Northeast));
        assert_eq!(Direction::parse("diagonal"), None);
    }

    #[test]
    fn direction_opposite_is_involutive() {
        for dir in Direction::ALL {
            assert_eq!(dir.opposite().opposite(), dir);
        }
    }

    #[test]
    fn locmap_falls_back_to_en() {
        let loc = LocMap::new("Town Square").with("ko", "마을 광장");
        assert_eq!(loc.localized("ko"), "마을 광장");
        assert_eq!(loc.localized("fr"), "Town Square");
    }

    #[test]
    fn locmap_from_map_requires_en() {
        let mut map = BTreeMap::new();
        map.insert("ko".to_string(), "마을".to_string());
        assert_eq!(LocMap::from_map(map), Err(LocMapError::MissingDefault));
    }
}
