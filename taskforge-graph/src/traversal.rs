//! Relation traversal and weighted shortest paths.

use crate::{edge_matches, GraphStore};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet, VecDeque};
use taskforge_core::{Edge, EdgeType, Node, NodeId};

/// Costs closer than this are treated as equal when breaking ties.
const COST_EPSILON: f64 = 1e-9;

/// Heap entry; ordered so the max-heap pops the cheapest, then lowest id.
#[derive(Debug, Clone, Copy)]
struct State {
    cost: f64,
    id: NodeId,
    slot: usize,
}

impl Ord for State {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.id.cmp(&self.id))
    }
}

impl PartialOrd for State {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for State {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for State {}

impl GraphStore {
    /// Nodes reachable from `id` within `depth` hops over matching edges.
    ///
    /// Breadth-first, in discovery order. The start node is never included,
    /// even when a cycle leads back to it.
    pub fn find_related_nodes(
        &self,
        id: NodeId,
        edge_types: Option<&[EdgeType]>,
        depth: usize,
    ) -> Vec<Node> {
        let Some(&start) = self.node_index.get(&id) else {
            return Vec::new();
        };

        let mut visited: HashSet<usize> = HashSet::from([start]);
        let mut frontier: VecDeque<(usize, usize)> = VecDeque::from([(start, 0)]);
        let mut related = Vec::new();

        while let Some((slot, hops)) = frontier.pop_front() {
            if hops >= depth {
                continue;
            }
            for &edge_slot in &self.outgoing[slot] {
                let Some(edge) = self.edges[edge_slot].as_ref() else {
                    continue;
                };
                if !edge_matches(edge, edge_types) {
                    continue;
                }
                let Some(&next) = self.node_index.get(&edge.target) else {
                    continue;
                };
                if visited.insert(next) {
                    if let Some(node) = self.nodes[next].as_ref() {
                        related.push(node.clone());
                    }
                    frontier.push_back((next, hops + 1));
                }
            }
        }
        related
    }

    /// Cheapest path from `start` to `end`, as the ordered list of edges.
    ///
    /// Edge cost is `1 / weight`; edges with non-positive weight cannot be
    /// crossed. Among equal-cost routes the predecessor with the lower node
    /// id wins, so the result does not depend on insertion order. Returns an
    /// empty list when either id is unknown, `start == end`, or `end` is
    /// unreachable.
    pub fn find_path(
        &self,
        start: NodeId,
        end: NodeId,
        edge_types: Option<&[EdgeType]>,
    ) -> Vec<Edge> {
        let (Some(&start_slot), Some(&end_slot)) =
            (self.node_index.get(&start), self.node_index.get(&end))
        else {
            return Vec::new();
        };
        if start_slot == end_slot {
            return Vec::new();
        }

        let mut dist = vec![f64::INFINITY; self.nodes.len()];
        // Edge slot used to reach each node slot
        let mut via: Vec<Option<usize>> = vec![None; self.nodes.len()];
        let mut heap = BinaryHeap::new();

        dist[start_slot] = 0.0;
        heap.push(State {
            cost: 0.0,
            id: start,
            slot: start_slot,
        });

        while let Some(State { cost, id, slot }) = heap.pop() {
            if cost > dist[slot] {
                continue;
            }
            if slot == end_slot {
                break;
            }

            for &edge_slot in &self.outgoing[slot] {
                let Some(edge) = self.edges[edge_slot].as_ref() else {
                    continue;
                };
                if !edge_matches(edge, edge_types) {
                    continue;
                }
                let (Some(step), Some(&next)) = (edge.cost(), self.node_index.get(&edge.target))
                else {
                    continue;
                };

                let next_cost = cost + step;
                if next_cost < dist[next] - COST_EPSILON {
                    dist[next] = next_cost;
                    via[next] = Some(edge_slot);
                    heap.push(State {
                        cost: next_cost,
                        id: edge.target,
                        slot: next,
                    });
                } else if (next_cost - dist[next]).abs() <= COST_EPSILON
                    && self.predecessor_id(via[next]).is_some_and(|prev| id < prev)
                {
                    via[next] = Some(edge_slot);
                }
            }
        }

        let mut path = Vec::new();
        let mut cursor = end_slot;
        while cursor != start_slot {
            if path.len() >= self.nodes.len() {
                return Vec::new();
            }
            let Some(edge) = via[cursor].and_then(|s| self.edges[s].as_ref()) else {
                return Vec::new();
            };
            path.push(edge.clone());
            match self.node_index.get(&edge.source) {
                Some(&prev) => cursor = prev,
                None => return Vec::new(),
            }
        }
        path.reverse();
        path
    }

    fn predecessor_id(&self, edge_slot: Option<usize>) -> Option<NodeId> {
        edge_slot
            .and_then(|s| self.edges[s].as_ref())
            .map(|edge| edge.source)
    }
}


#[cfg(test)]
mod prop_tests {
    use crate::GraphStore;
    use proptest::prelude::*;
    use serde_json::json;
    use taskforge_core::{EdgeAttrs, EdgeType, GraphQuery, Node, NodeId, NodeType, OrderBy};
    use uuid::Uuid;

    fn build(node_count: usize, links: &[(usize, usize, f64)]) -> (GraphStore, Vec<NodeId>) {
        let mut graph = GraphStore::new();
        let ids: Vec<NodeId> = (0..node_count)
            .map(|i| {
                graph.add_node(Node::new(
                    Uuid::from_u128(i as u128 + 1),
                    NodeType::Concept,
                    json!({"rank": (i * 7) % 5}),
                ))
            })
            .collect();
        for &(a, b, weight) in links {
            graph.add_edge(
                ids[a % node_count],
                ids[b % node_count],
                EdgeType::RelatedTo,
                weight,
                EdgeAttrs::default(),
            );
        }
        (graph, ids)
    }

    proptest! {
        #[test]
        fn prop_path_is_connected_chain(
            node_count in 2usize..10,
            links in prop::collection::vec((0usize..10, 0usize..10, 0.1f64..5.0), 0..30),
        ) {
            let (graph, ids) = build(node_count, &links);
            let start = ids[0];
            let end = ids[node_count - 1];
            let path = graph.find_path(start, end, None);

            if !path.is_empty() {
                prop_assert_eq!(path[0].source, start);
                prop_assert_eq!(path[path.len() - 1].target, end);
                for pair in path.windows(2) {
                    prop_assert_eq!(pair[0].target, pair[1].source);
                }
            }
            // repeated calls agree
            prop_assert_eq!(path, graph.find_path(start, end, None));
        }

        #[test]
        fn prop_related_excludes_start(
            node_count in 1usize..10,
            links in prop::collection::vec((0usize..10, 0usize..10, 0.1f64..5.0), 0..30),
            depth in 0usize..5,
        ) {
            let (graph, ids) = build(node_count, &links);
            let related = graph.find_related_nodes(ids[0], None, depth);
            prop_assert!(related.iter().all(|n| n.id != ids[0]));
        }

        #[test]
        fn prop_query_is_idempotent(
            node_count in 1usize..10,
            links in prop::collection::vec((0usize..10, 0usize..10, 0.1f64..5.0), 0..10),
        ) {
            let (graph, _) = build(node_count, &links);
            let query = GraphQuery::new().order_by(OrderBy::desc("rank"));
            prop_assert_eq!(graph.query(&query), graph.query(&query));
        }
    }
}
