//! Knowledge graph node and edge records

use crate::*;
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Bookkeeping attached to every node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct NodeMetadata {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created_at: Timestamp,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub updated_at: Timestamp,
    /// Incremented on every mutation; 1 after the first insert
    pub version: u64,
    /// Confidence in [0, 1]
    pub confidence: f64,
    /// Component or upstream system that produced the node
    pub source: String,
}

impl Default for NodeMetadata {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            created_at: now,
            updated_at: now,
            version: 0,
            confidence: 1.0,
            source: "engine".to_string(),
        }
    }
}

/// A typed node in the knowledge graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Node {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub id: NodeId,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    /// Arbitrary JSON payload; query filters address its properties
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub data: serde_json::Value,
    pub metadata: NodeMetadata,
}

impl Node {
    /// Create a node with default metadata.
    pub fn new(id: NodeId, node_type: NodeType, data: serde_json::Value) -> Self {
        Self {
            id,
            node_type,
            data,
            metadata: NodeMetadata::default(),
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.metadata.confidence = clamp_unit(confidence);
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.metadata.source = source.into();
        self
    }

    /// Resolve a property for filtering and ordering.
    ///
    /// `id` and `type` are reserved names; everything else is looked up in
    /// `data`, with dots separating nested object keys.
    pub fn property(&self, property: &str) -> Option<serde_json::Value> {
        match property {
            "id" => Some(serde_json::Value::String(self.id.to_string())),
            "type" => Some(serde_json::Value::String(
                self.node_type.as_db_str().to_string(),
            )),
            path => {
                let mut current = &self.data;
                for key in path.split('.') {
                    current = current.get(key)?;
                }
                Some(current.clone())
            }
        }
    }
}

/// Optional annotations supplied when adding an edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeAttrs {
    pub confidence: f64,
    pub context: Option<String>,
}

impl Default for EdgeAttrs {
    fn default() -> Self {
        Self {
            confidence: 1.0,
            context: None,
        }
    }
}

impl EdgeAttrs {
    pub fn with_context(context: impl Into<String>) -> Self {
        Self {
            confidence: 1.0,
            context: Some(context.into()),
        }
    }
}

/// Bookkeeping attached to every edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct EdgeMetadata {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created_at: Timestamp,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub updated_at: Timestamp,
    pub confidence: f64,
    pub context: Option<String>,
}

/// A directed, weighted relationship between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Edge {
    /// Derived from `(source, target, type)`, see [`edge_id`]
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub id: EdgeId,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub source: NodeId,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub target: NodeId,
    #[serde(rename = "type")]
    pub edge_type: EdgeType,
    /// Relationship strength; traversal cost is `1 / weight`
    pub weight: f64,
    pub metadata: EdgeMetadata,
}

impl Edge {
    /// Build an edge with fresh timestamps.
    pub fn new(
        source: NodeId,
        target: NodeId,
        edge_type: EdgeType,
        weight: f64,
        attrs: EdgeAttrs,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: edge_id(source, target, edge_type),
            source,
            target,
            edge_type,
            weight,
            metadata: EdgeMetadata {
                created_at: now,
                updated_at: now,
                confidence: clamp_unit(attrs.confidence),
                context: attrs.context,
            },
        }
    }

    /// Path-finding cost, `None` when the edge cannot be traversed.
    pub fn cost(&self) -> Option<f64> {
        if self.weight.is_finite() && self.weight > 0.0 {
            Some(1.0 / self.weight)
        } else {
            None
        }
    }
}
