//! Drone Shield Core - Snapshot model, ingestion, and entity identity
//!
//! This crate provides the foundational types shared by the scene and web crates:
//! - World-state snapshots as delivered by the simulation feed
//! - Ingestion with defaulting of missing or malformed fields
//! - Entity identity as (category, index) keys
//! - Color string parsing

pub mod color;
pub mod entity;
pub mod snapshot;

pub use color::parse_color;
pub use entity::{EntityCategory, EntityKey, EntityKeyError};
pub use snapshot::{EntityState, Position, SnapshotError, WorldSnapshot, DEFAULT_SIZE, MAX_HISTORY};
