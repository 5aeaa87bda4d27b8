//! TASKFORGE Graph - Typed Relationship Store
//!
//! Arena-backed node/edge storage with hash indexes:
//! - nodes and edges live in dense slot vectors and are referenced by index
//! - per-id, per-type and per-edge-key indexes point into the slots
//! - adjacency lists hold edge slots in insertion order, which keeps
//!   traversal output deterministic
//!
//! Removal tombstones a slot instead of shifting the arena, so indexes held
//! elsewhere stay valid. Operations that reference a missing id are no-ops
//! with empty results; the store never returns errors.

mod query;
mod traversal;

use chrono::Utc;
use std::collections::{BTreeSet, HashMap};
use taskforge_core::{edge_id, Edge, EdgeAttrs, EdgeId, EdgeType, Node, NodeId, NodeType};
use tracing::debug;

/// In-memory knowledge graph.
#[derive(Debug, Clone, Default)]
pub struct GraphStore {
    nodes: Vec<Option<Node>>,
    node_index: HashMap<NodeId, usize>,
    type_index: HashMap<NodeType, BTreeSet<usize>>,
    /// Outgoing edge slots per node slot
    outgoing: Vec<Vec<usize>>,
    /// Incoming edge slots per node slot
    incoming: Vec<Vec<usize>>,
    edges: Vec<Option<Edge>>,
    edge_index: HashMap<EdgeId, usize>,
}

impl GraphStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // NODES
    // ========================================================================

    /// Insert or overwrite a node.
    ///
    /// First insert sets `version = 1`. Overwrites keep `created_at`, bump the
    /// version and move the node between type indexes if its type changed.
    pub fn add_node(&mut self, mut node: Node) -> NodeId {
        let id = node.id;
        let now = Utc::now();

        if let Some(&slot) = self.node_index.get(&id) {
            let previous = self.nodes[slot]
                .as_ref()
                .map(|e| (e.metadata.created_at, e.metadata.version, e.node_type));
            if let Some((created_at, version, old_type)) = previous {
                node.metadata.created_at = created_at;
                node.metadata.version = version + 1;
                if old_type != node.node_type {
                    self.unindex_type(old_type, slot);
                    self.type_index.entry(node.node_type).or_default().insert(slot);
                }
            }
            node.metadata.updated_at = now;
            self.nodes[slot] = Some(node);
            return id;
        }

        node.metadata.version = 1;
        node.metadata.updated_at = now;
        let slot = self.nodes.len();
        self.type_index.entry(node.node_type).or_default().insert(slot);
        self.node_index.insert(id, slot);
        self.nodes.push(Some(node));
        self.outgoing.push(Vec::new());
        self.incoming.push(Vec::new());
        id
    }

    /// Shallow-merge `patch` into a node's data.
    ///
    /// Object patches merge key by key into object data; anything else
    /// replaces the data wholesale. Returns false if the node is missing.
    pub fn merge_node_data(&mut self, id: NodeId, patch: serde_json::Value) -> bool {
        let Some(node) = self.node_mut(id) else {
            return false;
        };
        match (&mut node.data, patch) {
            (serde_json::Value::Object(data), serde_json::Value::Object(patch)) => {
                for (key, value) in patch {
                    data.insert(key, value);
                }
            }
            (data, patch) => *data = patch,
        }
        node.metadata.version += 1;
        node.metadata.updated_at = Utc::now();
        true
    }

    /// Remove a node and every edge touching it.
    pub fn remove_node(&mut self, id: NodeId) -> Option<Node> {
        let slot = self.node_index.remove(&id)?;
        let incident: BTreeSet<usize> = self.outgoing[slot]
            .iter()
            .chain(self.incoming[slot].iter())
            .copied()
            .collect();
        for edge_slot in incident {
            self.remove_edge_slot(edge_slot);
        }
        self.outgoing[slot].clear();
        self.incoming[slot].clear();
        let node = self.nodes[slot].take()?;
        self.unindex_type(node.node_type, slot);
        Some(node)
    }

    pub fn get_node(&self, id: NodeId) -> Option<&Node> {
        self.node_index
            .get(&id)
            .and_then(|&slot| self.nodes[slot].as_ref())
    }

    pub fn contains_node(&self, id: NodeId) -> bool {
        self.node_index.contains_key(&id)
    }

    /// Nodes of one type, in insertion order.
    pub fn nodes_of_type(&self, node_type: NodeType) -> Vec<&Node> {
        self.type_index
            .get(&node_type)
            .map(|slots| {
                slots
                    .iter()
                    .filter_map(|&slot| self.nodes[slot].as_ref())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn node_count(&self) -> usize {
        self.node_index.len()
    }

    // ========================================================================
    // EDGES
    // ========================================================================

    /// Upsert the edge for `(source, target, edge_type)`.
    ///
    /// Both endpoints must exist. Re-adding a triple overwrites weight and
    /// annotations in place and keeps `created_at`.
    pub fn add_edge(
        &mut self,
        source: NodeId,
        target: NodeId,
        edge_type: EdgeType,
        weight: f64,
        attrs: EdgeAttrs,
    ) -> Option<EdgeId> {
        let (Some(&source_slot), Some(&target_slot)) =
            (self.node_index.get(&source), self.node_index.get(&target))
        else {
            debug!(%source, %target, edge_type = %edge_type, "Edge endpoint missing, skipping");
            return None;
        };

        let id = edge_id(source, target, edge_type);
        if let Some(&slot) = self.edge_index.get(&id) {
            if let Some(edge) = self.edges[slot].as_mut() {
                let fresh = Edge::new(source, target, edge_type, weight, attrs);
                edge.weight = fresh.weight;
                edge.metadata.confidence = fresh.metadata.confidence;
                edge.metadata.context = fresh.metadata.context;
                edge.metadata.updated_at = fresh.metadata.updated_at;
            }
            return Some(id);
        }

        let slot = self.edges.len();
        self.edges
            .push(Some(Edge::new(source, target, edge_type, weight, attrs)));
        self.edge_index.insert(id, slot);
        self.outgoing[source_slot].push(slot);
        self.incoming[target_slot].push(slot);
        Some(id)
    }

    /// Remove the edge for a triple. Returns false if it did not exist.
    pub fn remove_edge(&mut self, source: NodeId, target: NodeId, edge_type: EdgeType) -> bool {
        match self.edge_index.get(&edge_id(source, target, edge_type)) {
            Some(&slot) => self.remove_edge_slot(slot).is_some(),
            None => false,
        }
    }

    pub fn get_edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edge_index
            .get(&id)
            .and_then(|&slot| self.edges[slot].as_ref())
    }

    pub fn find_edge(&self, source: NodeId, target: NodeId, edge_type: EdgeType) -> Option<&Edge> {
        self.get_edge(edge_id(source, target, edge_type))
    }

    /// Outgoing edges of a node, optionally restricted to some types.
    pub fn edges_from(&self, id: NodeId, edge_types: Option<&[EdgeType]>) -> Vec<&Edge> {
        match self.node_index.get(&id) {
            Some(&slot) => self.collect_edges(&self.outgoing[slot], edge_types),
            None => Vec::new(),
        }
    }

    /// Incoming edges of a node, optionally restricted to some types.
    pub fn edges_to(&self, id: NodeId, edge_types: Option<&[EdgeType]>) -> Vec<&Edge> {
        match self.node_index.get(&id) {
            Some(&slot) => self.collect_edges(&self.incoming[slot], edge_types),
            None => Vec::new(),
        }
    }

    pub fn edge_count(&self) -> usize {
        self.edge_index.len()
    }

    // ========================================================================
    // INTERNALS
    // ========================================================================

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        let slot = *self.node_index.get(&id)?;
        self.nodes[slot].as_mut()
    }

    fn unindex_type(&mut self, node_type: NodeType, slot: usize) {
        if let Some(slots) = self.type_index.get_mut(&node_type) {
            slots.remove(&slot);
        }
    }

    fn remove_edge_slot(&mut self, slot: usize) -> Option<Edge> {
        let edge = self.edges[slot].take()?;
        self.edge_index.remove(&edge.id);
        if let Some(&source_slot) = self.node_index.get(&edge.source) {
            self.outgoing[source_slot].retain(|&s| s != slot);
        }
        if let Some(&target_slot) = self.node_index.get(&edge.target) {
            self.incoming[target_slot].retain(|&s| s != slot);
        }
        Some(edge)
    }

    fn collect_edges(&self, slots: &[usize], edge_types: Option<&[EdgeType]>) -> Vec<&Edge> {
        slots
            .iter()
            .filter_map(|&slot| self.edges[slot].as_ref())
            .filter(|edge| edge_matches(edge, edge_types))
            .collect()
    }

    /// Node slots in insertion order, restricted to the given types.
    fn candidate_slots(&self, node_types: Option<&[NodeType]>) -> Vec<usize> {
        match node_types {
            None => self
                .nodes
                .iter()
                .enumerate()
                .filter(|(_, node)| node.is_some())
                .map(|(slot, _)| slot)
                .collect(),
            Some(types) => {
                let mut slots: BTreeSet<usize> = BTreeSet::new();
                for node_type in types {
                    if let Some(indexed) = self.type_index.get(node_type) {
                        slots.extend(indexed.iter().copied());
                    }
                }
                slots.into_iter().collect()
            }
        }
    }
}

fn edge_matches(edge: &Edge, edge_types: Option<&[EdgeType]>) -> bool {
    edge_types.map_or(true, |types| types.contains(&edge.edge_type))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use taskforge_core::new_entity_id;

    fn node(node_type: NodeType) -> Node {
        Node::new(new_entity_id(), node_type, json!({}))
    }

    #[test]
    fn test_add_node_sets_version_one() {
        let mut graph = GraphStore::new();
        let id = graph.add_node(node(NodeType::Agent));
        assert_eq!(graph.get_node(id).unwrap().metadata.version, 1);
        assert_eq!(graph.node_count(), 1);
    }

    #[test]
    fn test_overwrite_bumps_version_and_keeps_created_at() {
        let mut graph = GraphStore::new();
        let original = node(NodeType::Task);
        let id = graph.add_node(original.clone());
        let created_at = graph.get_node(id).unwrap().metadata.created_at;

        let mut replacement = original;
        replacement.data = json!({"status": "active"});
        graph.add_node(replacement);

        let stored = graph.get_node(id).unwrap();
        assert_eq!(stored.metadata.version, 2);
        assert_eq!(stored.metadata.created_at, created_at);
        assert_eq!(stored.data["status"], json!("active"));
        assert_eq!(graph.node_count(), 1);
    }

    #[test]
    fn test_overwrite_with_new_type_moves_index() {
        let mut graph = GraphStore::new();
        let mut n = node(NodeType::Concept);
        let id = graph.add_node(n.clone());
        n.node_type = NodeType::Domain;
        graph.add_node(n);
        assert!(graph.nodes_of_type(NodeType::Concept).is_empty());
        assert_eq!(graph.nodes_of_type(NodeType::Domain)[0].id, id);
    }

    #[test]
    fn test_merge_node_data() {
        let mut graph = GraphStore::new();
        let id = graph.add_node(Node::new(new_entity_id(), NodeType::Task, json!({"a": 1, "b": 2})));
        assert!(graph.merge_node_data(id, json!({"b": 3, "c": 4})));
        let stored = graph.get_node(id).unwrap();
        assert_eq!(stored.data, json!({"a": 1, "b": 3, "c": 4}));
        assert_eq!(stored.metadata.version, 2);
        assert!(!graph.merge_node_data(new_entity_id(), json!({})));
    }

    #[test]
    fn test_add_edge_upserts() {
        let mut graph = GraphStore::new();
        let a = graph.add_node(node(NodeType::Agent));
        let s = graph.add_node(node(NodeType::Skill));

        let first = graph
            .add_edge(a, s, EdgeType::HasSkill, 0.5, EdgeAttrs::default())
            .unwrap();
        let second = graph
            .add_edge(a, s, EdgeType::HasSkill, 0.9, EdgeAttrs::with_context("re-added"))
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(graph.edge_count(), 1);
        let edge = graph.get_edge(first).unwrap();
        assert_eq!(edge.weight, 0.9);
        assert_eq!(edge.metadata.context.as_deref(), Some("re-added"));
        assert_eq!(graph.edges_from(a, None).len(), 1);
    }

    #[test]
    fn test_add_edge_missing_endpoint_is_noop() {
        let mut graph = GraphStore::new();
        let a = graph.add_node(node(NodeType::Agent));
        assert!(graph
            .add_edge(a, new_entity_id(), EdgeType::HasSkill, 1.0, EdgeAttrs::default())
            .is_none());
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_edges_filtered_by_type() {
        let mut graph = GraphStore::new();
        let a = graph.add_node(node(NodeType::Task));
        let b = graph.add_node(node(NodeType::Task));
        graph.add_edge(a, b, EdgeType::DependsOn, 1.0, EdgeAttrs::default());
        graph.add_edge(a, b, EdgeType::RelatedTo, 1.0, EdgeAttrs::default());

        assert_eq!(graph.edges_from(a, None).len(), 2);
        assert_eq!(graph.edges_from(a, Some(&[EdgeType::DependsOn])).len(), 1);
        assert_eq!(graph.edges_to(b, Some(&[EdgeType::RelatedTo])).len(), 1);
        assert!(graph.edges_to(a, None).is_empty());
    }

    #[test]
    fn test_remove_node_drops_incident_edges() {
        let mut graph = GraphStore::new();
        let a = graph.add_node(node(NodeType::Agent));
        let b = graph.add_node(node(NodeType::Skill));
        let c = graph.add_node(node(NodeType::Task));
        graph.add_edge(a, b, EdgeType::HasSkill, 1.0, EdgeAttrs::default());
        graph.add_edge(c, a, EdgeType::AssignedTo, 1.0, EdgeAttrs::default());

        let removed = graph.remove_node(a).unwrap();
        assert_eq!(removed.id, a);
        assert!(!graph.contains_node(a));
        assert_eq!(graph.edge_count(), 0);
        assert!(graph.edges_from(c, None).is_empty());
        assert!(graph.edges_to(b, None).is_empty());
        assert!(graph.nodes_of_type(NodeType::Agent).is_empty());
        assert!(graph.remove_node(a).is_none());
    }

    #[test]
    fn test_remove_edge() {
        let mut graph = GraphStore::new();
        let a = graph.add_node(node(NodeType::Task));
        let b = graph.add_node(node(NodeType::Task));
        graph.add_edge(a, b, EdgeType::DependsOn, 1.0, EdgeAttrs::default());
        assert!(graph.remove_edge(a, b, EdgeType::DependsOn));
        assert!(!graph.remove_edge(a, b, EdgeType::DependsOn));
        assert!(graph.find_edge(a, b, EdgeType::DependsOn).is_none());
    }

    #[test]
    fn test_nodes_of_type_in_insertion_order() {
        let mut graph = GraphStore::new();
        let ids: Vec<NodeId> = (0..5).map(|_| graph.add_node(node(NodeType::Skill))).collect();
        graph.add_node(node(NodeType::Agent));
        let listed: Vec<NodeId> = graph
            .nodes_of_type(NodeType::Skill)
            .into_iter()
            .map(|n| n.id)
            .collect();
        assert_eq!(listed, ids);
    }
}
