//! Filtered, ordered node queries.

use crate::GraphStore;
use taskforge_core::{compare_property_values, GraphQuery, Node};

impl GraphStore {
    /// Run a query and return matching nodes.
    ///
    /// Without `order_by` results come in insertion order. With it, the sort
    /// is stable, so nodes with equal keys keep insertion order and repeated
    /// queries over an unmodified store return identical sequences.
    pub fn query(&self, query: &GraphQuery) -> Vec<Node> {
        let mut matched: Vec<&Node> = self
            .candidate_slots(query.node_types.as_deref())
            .into_iter()
            .filter_map(|slot| self.nodes[slot].as_ref())
            .filter(|node| query.matches(node))
            .collect();

        if let Some(order) = &query.order_by {
            let mut keyed: Vec<(Option<serde_json::Value>, &Node)> = matched
                .into_iter()
                .map(|node| (node.property(&order.property), node))
                .collect();
            keyed.sort_by(|(a, _), (b, _)| {
                let ordering = compare_property_values(a.as_ref(), b.as_ref());
                if order.descending && a.is_some() && b.is_some() {
                    ordering.reverse()
                } else {
                    ordering
                }
            });
            matched = keyed.into_iter().map(|(_, node)| node).collect();
        }

        let limit = query.limit.unwrap_or(usize::MAX);
        matched.into_iter().take(limit).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use crate::GraphStore;
    use serde_json::json;
    use taskforge_core::{new_entity_id, Filter, GraphQuery, Node, NodeId, NodeType, OrderBy};

    fn seeded_graph() -> (GraphStore, Vec<NodeId>) {
        let mut graph = GraphStore::new();
        let mut ids = Vec::new();
        for (priority, status) in [(3, "pending"), (1, "active"), (2, "pending"), (5, "done")] {
            ids.push(graph.add_node(Node::new(
                new_entity_id(),
                NodeType::Task,
                json!({"priority": priority, "status": status}),
            )));
        }
        graph.add_node(Node::new(new_entity_id(), NodeType::Agent, json!({"priority": 9})));
        (graph, ids)
    }

    #[test]
    fn test_query_by_type_and_filter() {
        let (graph, ids) = seeded_graph();
        let query = GraphQuery::of_type(NodeType::Task).filter(Filter::eq("status", "pending"));
        let result: Vec<NodeId> = graph.query(&query).into_iter().map(|n| n.id).collect();
        assert_eq!(result, vec![ids[0], ids[2]]);
    }

    #[test]
    fn test_query_order_and_limit() {
        let (graph, ids) = seeded_graph();
        let query = GraphQuery::of_type(NodeType::Task)
            .order_by(OrderBy::desc("priority"))
            .limit(2);
        let result: Vec<NodeId> = graph.query(&query).into_iter().map(|n| n.id).collect();
        assert_eq!(result, vec![ids[3], ids[0]]);

        let query = GraphQuery::of_type(NodeType::Task).order_by(OrderBy::asc("priority"));
        let result: Vec<NodeId> = graph.query(&query).into_iter().map(|n| n.id).collect();
        assert_eq!(result, vec![ids[1], ids[2], ids[0], ids[3]]);
    }

    #[test]
    fn test_query_all_types() {
        let (graph, _) = seeded_graph();
        let query = GraphQuery::new().filter(Filter::gt("priority", 4i64));
        assert_eq!(graph.query(&query).len(), 2);
    }

    #[test]
    fn test_order_missing_property_sorts_last() {
        let mut graph = GraphStore::new();
        let without = graph.add_node(Node::new(new_entity_id(), NodeType::Idea, json!({})));
        let with = graph.add_node(Node::new(new_entity_id(), NodeType::Idea, json!({"score": 1})));
        for order in [OrderBy::asc("score"), OrderBy::desc("score")] {
            let result: Vec<NodeId> = graph
                .query(&GraphQuery::new().order_by(order))
                .into_iter()
                .map(|n| n.id)
                .collect();
            assert_eq!(result, vec![with, without]);
        }
    }

    #[test]
    fn test_query_is_idempotent() {
        let (graph, _) = seeded_graph();
        let query = GraphQuery::new().order_by(OrderBy::asc("status"));
        assert_eq!(graph.query(&query), graph.query(&query));
    }
}
