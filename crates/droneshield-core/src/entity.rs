//! Entity identity: categories and (category, index) keys

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Kind of simulated entity carried by a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityCategory {
    /// Attacking drone
    Attacker,
    /// Defending drone
    Defender,
    /// Protected ground asset
    ProtectedObject,
}

impl EntityCategory {
    /// All categories in snapshot order
    pub const ALL: [EntityCategory; 3] = [
        EntityCategory::Attacker,
        EntityCategory::Defender,
        EntityCategory::ProtectedObject,
    ];

    /// Wire name used both as the JSON array field prefix and in target strings
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityCategory::Attacker => "attacker",
            EntityCategory::Defender => "defender",
            EntityCategory::ProtectedObject => "protected_object",
        }
    }

    /// Name of the snapshot array holding this category
    pub fn field_name(&self) -> &'static str {
        match self {
            EntityCategory::Attacker => "attackers",
            EntityCategory::Defender => "defenders",
            EntityCategory::ProtectedObject => "protected_objects",
        }
    }

    /// Fallback color when a snapshot entry carries none (linear 0..1 RGB)
    pub fn default_color(&self) -> [f32; 3] {
        match self {
            EntityCategory::Attacker => [1.0, 0.0, 0.0],
            EntityCategory::Defender => [0.0, 0.0, 1.0],
            EntityCategory::ProtectedObject => [0.0, 1.0, 0.0],
        }
    }

    /// Whether entities of this category are agents (drones) rather than assets
    pub fn is_agent(&self) -> bool {
        !matches!(self, EntityCategory::ProtectedObject)
    }
}

impl std::fmt::Display for EntityCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EntityKeyError {
    #[error("Unknown entity category: {0}")]
    UnknownCategory(String),
    #[error("Invalid entity index: {0}")]
    InvalidIndex(String),
    #[error("Expected <category>:<index>, got {0:?}")]
    Malformed(String),
}

impl FromStr for EntityCategory {
    type Err = EntityKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "attacker" | "attackers" => Ok(EntityCategory::Attacker),
            "defender" | "defenders" => Ok(EntityCategory::Defender),
            "protected_object" | "protected_objects" | "asset" | "assets" => {
                Ok(EntityCategory::ProtectedObject)
            }
            other => Err(EntityKeyError::UnknownCategory(other.to_string())),
        }
    }
}

/// Identity of an entity within a session.
///
/// Snapshots carry no persistent ids, so an entity is known only by its
/// category and its position in that category's array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityKey {
    #[serde(rename = "type", alias = "category")]
    pub category: EntityCategory,
    pub index: usize,
}

impl EntityKey {
    pub const fn new(category: EntityCategory, index: usize) -> Self {
        Self { category, index }
    }

    pub const fn attacker(index: usize) -> Self {
        Self::new(EntityCategory::Attacker, index)
    }

    pub const fn defender(index: usize) -> Self {
        Self::new(EntityCategory::Defender, index)
    }

    pub const fn protected_object(index: usize) -> Self {
        Self::new(EntityCategory::ProtectedObject, index)
    }
}

impl Default for EntityKey {
    fn default() -> Self {
        Self::attacker(0)
    }
}

impl std::fmt::Display for EntityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.category, self.index)
    }
}

impl FromStr for EntityKey {
    type Err = EntityKeyError;

    /// Parse the compact `category:index` form, e.g. `defender:2`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (category, index) = s
            .split_once(':')
            .ok_or_else(|| EntityKeyError::Malformed(s.to_string()))?;
        let category = category.parse()?;
        let index = index
            .trim()
            .parse::<usize>()
            .map_err(|_| EntityKeyError::InvalidIndex(index.to_string()))?;
        Ok(Self { category, index })
    }
}
