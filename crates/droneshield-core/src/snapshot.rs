//! World-state snapshots and their ingestion
//!
//! A snapshot is a complete, self-contained description of every entity at
//! one instant. All defaulting and validation happens here so downstream
//! code can treat every field as present.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::entity::{EntityCategory, EntityKey};

/// Most recent history positions kept per entity
pub const MAX_HISTORY: usize = 100;

/// Size used when an entry omits it or sends a non-positive value
pub const DEFAULT_SIZE: f64 = 1.0;

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("Failed to parse snapshot JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Snapshot must be a JSON object, got {0}")]
    NotAnObject(&'static str),
}

/// Point in world space (Y up)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub z: f64,
    /// Instantaneous speed reported by the simulation
    #[serde(default)]
    pub speed: f64,
}

impl Position {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z, speed: 0.0 }
    }

    pub fn to_array(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

/// One attacker, defender or protected object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityState {
    #[serde(default, deserialize_with = "null_as_default")]
    pub position: Position,
    #[serde(default = "default_size", deserialize_with = "size_or_default")]
    pub size: f64,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub history: Vec<Position>,
    /// Agent has been knocked out
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_disabled: bool,
    /// Protected object has been hit
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_destroyed: bool,
}

impl Default for EntityState {
    fn default() -> Self {
        Self {
            position: Position::default(),
            size: DEFAULT_SIZE,
            color: None,
            history: Vec::new(),
            is_disabled: false,
            is_destroyed: false,
        }
    }
}

impl EntityState {
    /// Entity at a position with default size and no history
    pub fn at(x: f64, y: f64, z: f64) -> Self {
        Self {
            position: Position::new(x, y, z),
            ..Default::default()
        }
    }

    /// Size to render with; non-positive or non-finite sizes fall back to the default
    pub fn effective_size(&self) -> f64 {
        if self.size.is_finite() && self.size > 0.0 {
            self.size
        } else {
            DEFAULT_SIZE
        }
    }

    /// Disabled agent or destroyed asset
    pub fn is_inactive(&self) -> bool {
        self.is_disabled || self.is_destroyed
    }

    /// Whether enough history was transmitted to draw a trail
    pub fn has_trail(&self) -> bool {
        self.history.len() >= 2
    }

    /// History followed by the current position, oldest first
    pub fn trail_path(&self) -> Vec<Position> {
        let mut path = Vec::with_capacity(self.history.len() + 1);
        path.extend_from_slice(&self.history);
        path.push(self.position);
        path
    }
}

fn default_size() -> f64 {
    DEFAULT_SIZE
}

fn size_or_default<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(DEFAULT_SIZE))
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Complete world state at one instant
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct WorldSnapshot {
    pub attackers: Vec<EntityState>,
    pub defenders: Vec<EntityState>,
    pub protected_objects: Vec<EntityState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formation: Option<String>,
}

impl WorldSnapshot {
    /// Parse one feed message
    pub fn from_json(text: &str) -> Result<Self, SnapshotError> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(value)
    }

    /// Build a snapshot from an already-parsed JSON document.
    ///
    /// Missing, null or unreadable category arrays become empty sequences.
    pub fn from_value(value: Value) -> Result<Self, SnapshotError> {
        let Value::Object(map) = value else {
            return Err(SnapshotError::NotAnObject(json_kind(&value)));
        };

        Ok(Self {
            attackers: read_category(&map, EntityCategory::Attacker),
            defenders: read_category(&map, EntityCategory::Defender),
            protected_objects: read_category(&map, EntityCategory::ProtectedObject),
            is_active: map.get("is_active").and_then(Value::as_bool),
            strategy: read_label(&map, "strategy"),
            formation: read_label(&map, "formation"),
        })
    }

    /// Entries of one category, in index order
    pub fn entities(&self, category: EntityCategory) -> &[EntityState] {
        match category {
            EntityCategory::Attacker => &self.attackers,
            EntityCategory::Defender => &self.defenders,
            EntityCategory::ProtectedObject => &self.protected_objects,
        }
    }

    pub fn entities_mut(&mut self, category: EntityCategory) -> &mut Vec<EntityState> {
        match category {
            EntityCategory::Attacker => &mut self.attackers,
            EntityCategory::Defender => &mut self.defenders,
            EntityCategory::ProtectedObject => &mut self.protected_objects,
        }
    }

    /// Look up an entity by identity; `None` when the index is out of range
    pub fn get(&self, key: EntityKey) -> Option<&EntityState> {
        self.entities(key.category).get(key.index)
    }

    pub fn count(&self, category: EntityCategory) -> usize {
        self.entities(category).len()
    }

    /// Total number of entities across all categories
    pub fn len(&self) -> usize {
        EntityCategory::ALL.iter().map(|c| self.count(*c)).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every entity with its key, categories in snapshot order
    pub fn iter(&self) -> impl Iterator<Item = (EntityKey, &EntityState)> + '_ {
        EntityCategory::ALL.into_iter().flat_map(move |category| {
            self.entities(category)
                .iter()
                .enumerate()
                .map(move |(index, state)| (EntityKey::new(category, index), state))
        })
    }

    /// Agents still in play (attackers, defenders)
    pub fn active_agents(&self, category: EntityCategory) -> usize {
        self.entities(category)
            .iter()
            .filter(|e| !e.is_inactive())
            .count()
    }
}

impl TryFrom<Value> for WorldSnapshot {
    type Error = SnapshotError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(value)
    }
}

fn read_category(map: &Map<String, Value>, category: EntityCategory) -> Vec<EntityState> {
    let field = category.field_name();
    let entries = match map.get(field) {
        None | Some(Value::Null) => return Vec::new(),
        Some(Value::Array(entries)) => entries,
        Some(other) => {
            tracing::warn!(
                "Snapshot field {} is {}, not an array; treating as empty",
                field,
                json_kind(other)
            );
            return Vec::new();
        }
    };

    let mut states = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        match EntityState::deserialize(entry) {
            Ok(mut state) => {
                bound_history(&mut state.history);
                states.push(state);
            }
            Err(e) => {
                // Dropping a single entry would shift every later index and
                // misattribute identities, so the whole category goes.
                tracing::warn!(
                    "Unreadable {} entry at index {}: {}; treating category as empty",
                    category,
                    index,
                    e
                );
                return Vec::new();
            }
        }
    }
    states
}

fn bound_history(history: &mut Vec<Position>) {
    if history.len() > MAX_HISTORY {
        let excess = history.len() - MAX_HISTORY;
        history.drain(..excess);
    }
}

fn read_label(map: &Map<String, Value>, field: &str) -> Option<String> {
    map.get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
