//! TASKFORGE Test Utilities
//!
//! Centralized test infrastructure for the TASKFORGE workspace:
//! - Proptest generators for entity types
//! - Test fixtures for common scenarios
//! - Custom assertions for TASKFORGE-specific validation

// Re-export core types for convenience
pub use taskforge_core::{
    new_entity_id, Agent, AgentAction, AgentId, AgentPerformance, AgentStatus, EdgeAttrs,
    EdgeType, EngineConfig, EngineError, EngineResult, EntityId, Node, NodeId, NodeType,
    Participant, ParticipantRole, RewardComponents, Task, TaskId, TaskPerformance, TaskStatus,
    Tier,
};
pub use taskforge_graph::GraphStore;

use uuid::Uuid;

/// Skill vocabulary shared by generators and fixtures.
pub const SKILLS: [&str; 8] = [
    "rust", "python", "sql", "frontend", "ops", "ml", "design", "writing",
];

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for generating TASKFORGE entity types.

    use super::*;
    use proptest::prelude::*;

    // === Identity Type Generators ===

    /// Generate a random UUID (for generic ID generation).
    pub fn arb_uuid() -> impl Strategy<Value = Uuid> {
        any::<[u8; 16]>().prop_map(Uuid::from_bytes)
    }

    /// Generate a valid UUIDv7 (timestamp-sortable).
    pub fn arb_uuid_v7() -> impl Strategy<Value = Uuid> {
        Just(()).prop_map(|_| Uuid::now_v7())
    }

    // === Enum Generators ===

    pub fn arb_tier() -> impl Strategy<Value = Tier> {
        prop_oneof![
            Just(Tier::LowLevel),
            Just(Tier::MidLevel),
            Just(Tier::HighLevel),
        ]
    }

    pub fn arb_task_status() -> impl Strategy<Value = TaskStatus> {
        prop_oneof![
            Just(TaskStatus::Pending),
            Just(TaskStatus::Active),
            Just(TaskStatus::Completed),
            Just(TaskStatus::Failed),
        ]
    }

    pub fn arb_participant_role() -> impl Strategy<Value = ParticipantRole> {
        prop_oneof![
            Just(ParticipantRole::Primary),
            Just(ParticipantRole::Helper),
            Just(ParticipantRole::Reviewer),
        ]
    }

    pub fn arb_agent_action() -> impl Strategy<Value = AgentAction> {
        prop_oneof![
            Just(AgentAction::AcceptTask),
            Just(AgentAction::DelegateTask),
            Just(AgentAction::RequestHelp),
        ]
    }

    pub fn arb_node_type() -> impl Strategy<Value = NodeType> {
        prop::sample::select(NodeType::ALL.to_vec())
    }

    // === Entity Generators ===

    /// Generate a skill name from the shared vocabulary.
    pub fn arb_skill() -> impl Strategy<Value = String> {
        prop::sample::select(SKILLS.to_vec()).prop_map(str::to_string)
    }

    /// Generate an idle agent with up to four skills and 0..8000 xp.
    pub fn arb_agent() -> impl Strategy<Value = Agent> {
        (
            prop::collection::btree_set(arb_skill(), 0..=4),
            0.0f64..8000.0,
            0.0f64..=1.0,
        )
            .prop_map(|(skills, xp, success_rate)| {
                Agent::new(skills).with_xp(xp).with_performance(AgentPerformance {
                    success_rate,
                    ..AgentPerformance::default()
                })
            })
    }

    /// Generate a pending task under `idea_id`.
    pub fn arb_task(idea_id: EntityId) -> impl Strategy<Value = Task> {
        (
            prop::collection::vec(arb_skill(), 0..=3),
            0.0f64..=1.0,
            0.0f64..200.0,
            1.0f64..480.0,
            0i32..5,
        )
            .prop_map(move |(skills, complexity, xp, estimated, priority)| {
                Task::new(idea_id, "generated task")
                    .with_required_skills(skills)
                    .with_complexity(complexity)
                    .with_xp(xp)
                    .with_estimated_time(estimated)
                    .with_priority(priority)
            })
    }

    /// Generate an in-range task outcome.
    pub fn arb_task_performance() -> impl Strategy<Value = TaskPerformance> {
        (0.0f64..600.0, 0.0f64..=1.0, 0.0f64..=1.0, 0.0f64..=1.0).prop_map(
            |(time, quality, collaboration, innovation)| {
                TaskPerformance::new(time, quality)
                    .with_collaboration(collaboration)
                    .with_innovation(innovation)
            },
        )
    }

    /// Generate a participant for an existing agent.
    pub fn arb_participant(agent_id: AgentId) -> impl Strategy<Value = Participant> {
        (0.0f64..10.0, arb_participant_role())
            .prop_map(move |(contribution, role)| Participant::new(agent_id, contribution, role))
    }

    /// Generate reward components in [0, 1].
    pub fn arb_reward_components() -> impl Strategy<Value = RewardComponents> {
        prop::array::uniform6(0.0f64..=1.0).prop_map(RewardComponents::from_array)
    }

    /// Generate a configuration that passes validation.
    pub fn arb_valid_config() -> impl Strategy<Value = EngineConfig> {
        (any::<u64>(), 0.0f64..=1.0, 0.001f64..0.5, 0.0f64..0.5).prop_map(
            |(seed, epsilon, alpha, stability_threshold)| {
                let mut config = EngineConfig::seeded(seed);
                config.policy.epsilon = epsilon;
                config.policy.alpha = alpha;
                config.assignment.stability_threshold = stability_threshold;
                config
            },
        )
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built test fixtures for common testing scenarios.

    use super::*;

    /// Seeded configuration with exploration disabled, so action selection
    /// is fully greedy and runs are reproducible.
    pub fn deterministic_config() -> EngineConfig {
        let mut config = EngineConfig::seeded(7);
        config.policy.epsilon = 0.0;
        config
    }

    /// Idle agent with the given skills and experience.
    pub fn agent<I, S>(skills: I, xp: f64) -> Agent
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Agent::new(skills).with_xp(xp)
    }

    /// Pending task needing `skills` at `complexity`.
    pub fn task<I, S>(idea_id: EntityId, skills: I, complexity: f64) -> Task
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Task::new(idea_id, "fixture task")
            .with_required_skills(skills)
            .with_complexity(complexity)
            .with_xp(50.0)
            .with_estimated_time(60.0)
    }

    /// Outcome with the given quality, finished in an hour.
    pub fn outcome(quality: f64) -> TaskPerformance {
        TaskPerformance::new(60.0, quality)
            .with_collaboration(0.5)
            .with_innovation(0.5)
    }

    /// Idea node to hang tasks from.
    pub fn idea_node(title: &str) -> Node {
        Node::new(
            new_entity_id(),
            NodeType::Idea,
            serde_json::json!({ "title": title }),
        )
    }

    /// Chain of `len` concept nodes joined by `related_to` edges of `weight`.
    pub fn chain_graph(len: usize, weight: f64) -> (GraphStore, Vec<NodeId>) {
        let mut graph = GraphStore::new();
        let ids: Vec<NodeId> = (0..len)
            .map(|i| {
                graph.add_node(Node::new(
                    new_entity_id(),
                    NodeType::Concept,
                    serde_json::json!({ "index": i }),
                ))
            })
            .collect();
        for pair in ids.windows(2) {
            graph.add_edge(
                pair[0],
                pair[1],
                EdgeType::RelatedTo,
                weight,
                EdgeAttrs::default(),
            );
        }
        (graph, ids)
    }
}

// ============================================================================
// ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Custom assertion functions for TASKFORGE-specific validation.

    use super::*;

    /// Assert that an EngineResult is Ok.
    #[track_caller]
    pub fn assert_ok<T: std::fmt::Debug>(result: &EngineResult<T>) {
        assert!(result.is_ok(), "Expected Ok, got Err: {:?}", result);
    }

    /// Assert that an EngineResult is a Config error.
    #[track_caller]
    pub fn assert_config_error<T: std::fmt::Debug>(result: &EngineResult<T>) {
        match result {
            Err(EngineError::Config(_)) => {}
            other => panic!("Expected Config error, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_close(actual: f64, expected: f64, tolerance: f64) {
        assert!(
            (actual - expected).abs() <= tolerance,
            "Expected {} within {} of {}",
            actual,
            tolerance,
            expected
        );
    }

    /// Assert that `values` add up to `total`.
    #[track_caller]
    pub fn assert_sums_to(values: impl IntoIterator<Item = f64>, total: f64, tolerance: f64) {
        let sum: f64 = values.into_iter().sum();
        assert_close(sum, total, tolerance);
    }

    /// Assert that every reward weight lies in `[min, max]` and the weights
    /// form a distribution.
    #[track_caller]
    pub fn assert_weights_valid(weights: &RewardComponents, min: f64, max: f64) {
        for (name, value) in RewardComponents::NAMES.iter().zip(weights.to_array()) {
            assert!(
                value >= min - 1e-9 && value <= max + 1e-9,
                "Weight {} = {} outside [{}, {}]",
                name,
                value,
                min,
                max
            );
        }
        assert_close(weights.sum(), 1.0, 1e-6);
    }
}
