//! TASKFORGE Core - Entity Types
//!
//! Pure data structures shared by every other crate in the workspace:
//! identifiers, agent/task/assignment records, graph nodes and edges,
//! query filter expressions, engine configuration and the error hierarchy.
//! No scheduling or learning logic lives here.

use chrono::{DateTime, Utc};
use uuid::Uuid;

pub mod config;
pub mod entities;
pub mod enums;
pub mod error;
pub mod filter;
pub mod graph;

pub use config::*;
pub use entities::*;
pub use enums::*;
pub use error::*;
pub use filter::*;
pub use graph::*;

// ============================================================================
// IDENTITY TYPES
// ============================================================================

/// Entity identifier using UUIDv7 for timestamp-sortable IDs.
pub type EntityId = Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Agent identifier.
pub type AgentId = EntityId;

/// Task identifier.
pub type TaskId = EntityId;

/// Graph node identifier.
pub type NodeId = EntityId;

/// Graph edge identifier (derived, see [`edge_id`]).
pub type EdgeId = EntityId;

/// Generate a new UUIDv7 EntityId (timestamp-sortable).
pub fn new_entity_id() -> EntityId {
    Uuid::now_v7()
}

/// Deterministic edge identifier for a `(source, target, type)` triple.
///
/// Re-adding the same triple yields the same id, which is what makes edge
/// insertion an upsert.
pub fn edge_id(source: NodeId, target: NodeId, edge_type: EdgeType) -> EdgeId {
    let name = format!("{}:{}:{}", source, target, edge_type.as_db_str());
    Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes())
}

/// Deterministic node identifier for a named concept such as a skill.
pub fn named_node_id(node_type: NodeType, name: &str) -> NodeId {
    let name = format!("{}:{}", node_type.as_db_str(), name.to_lowercase());
    Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes())
}
