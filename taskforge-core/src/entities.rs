//! Agent, task and assignment records

use crate::*;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ============================================================================
// AGENT
// ============================================================================

/// Rolling performance metrics for an agent.
///
/// Metrics are exponential moving averages; `learning_rate` is the EMA rate
/// and adapts to outcomes (see the assignment coordinator).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AgentPerformance {
    /// Success rate in [0, 1]
    pub success_rate: f64,
    /// Average completion time in minutes
    pub average_completion_time: f64,
    /// Number of tasks finished with status `completed`
    pub total_tasks_completed: u64,
    /// Current EMA learning rate, in [0.05, 0.3]
    pub learning_rate: f64,
}

impl AgentPerformance {
    pub const DEFAULT_LEARNING_RATE: f64 = 0.1;
    pub const MAX_LEARNING_RATE: f64 = 0.3;
    pub const MIN_LEARNING_RATE: f64 = 0.05;
}

impl Default for AgentPerformance {
    fn default() -> Self {
        Self {
            success_rate: 0.5,
            average_completion_time: 0.0,
            total_tasks_completed: 0,
            learning_rate: Self::DEFAULT_LEARNING_RATE,
        }
    }
}

/// A worker in the pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Agent {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub id: AgentId,
    /// Highest tier the agent's experience qualifies it for
    pub tier: Tier,
    #[cfg_attr(feature = "openapi", schema(value_type = Vec<String>))]
    pub skills: BTreeSet<String>,
    /// Accumulated experience, never negative
    pub xp: f64,
    pub status: AgentStatus,
    pub performance: AgentPerformance,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created_at: Timestamp,
}

impl Agent {
    /// Create a new idle agent with zero experience.
    pub fn new<I, S>(skills: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: new_entity_id(),
            tier: Tier::LowLevel,
            skills: skills.into_iter().map(Into::into).collect(),
            xp: 0.0,
            status: AgentStatus::Idle,
            performance: AgentPerformance::default(),
            created_at: Utc::now(),
        }
    }

    /// Set accumulated experience (negative values are clamped to zero).
    pub fn with_xp(mut self, xp: f64) -> Self {
        self.xp = if xp.is_finite() { xp.max(0.0) } else { 0.0 };
        self
    }

    /// Set performance metrics.
    pub fn with_performance(mut self, performance: AgentPerformance) -> Self {
        self.performance = performance;
        self
    }

    /// Set availability.
    pub fn with_status(mut self, status: AgentStatus) -> Self {
        self.status = status;
        self
    }

    /// Check if agent has a specific skill.
    pub fn has_skill(&self, skill: &str) -> bool {
        self.skills.contains(skill)
    }

    /// Fraction of `required` covered by this agent's skills.
    ///
    /// An empty requirement list carries no information and scores 0.5.
    pub fn skill_match(&self, required: &[String]) -> f64 {
        if required.is_empty() {
            return 0.5;
        }
        let matched = required.iter().filter(|s| self.has_skill(s)).count();
        matched as f64 / required.len() as f64
    }

    /// Required skills this agent lacks.
    pub fn missing_skills<'a>(&self, required: &'a [String]) -> Vec<&'a String> {
        required.iter().filter(|s| !self.has_skill(s)).collect()
    }
}

// ============================================================================
// TASK
// ============================================================================

/// A unit of work submitted for assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Task {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub id: TaskId,
    /// Idea this task was decomposed from
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub idea_id: EntityId,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: i32,
    /// Experience awarded on completion
    pub xp: f64,
    pub required_skills: Vec<String>,
    /// Difficulty in [0, 1]
    pub complexity: f64,
    /// Estimated effort in minutes
    pub estimated_time: f64,
    #[cfg_attr(feature = "openapi", schema(value_type = Vec<String>))]
    pub dependencies: Vec<TaskId>,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date-time"))]
    pub deadline: Option<Timestamp>,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "uuid"))]
    pub assigned_agent_id: Option<AgentId>,
}

impl Task {
    /// Create a new pending task.
    pub fn new(idea_id: EntityId, title: impl Into<String>) -> Self {
        Self {
            id: new_entity_id(),
            idea_id,
            title: title.into(),
            description: String::new(),
            status: TaskStatus::Pending,
            priority: 0,
            xp: 0.0,
            required_skills: Vec::new(),
            complexity: 0.0,
            estimated_time: 60.0,
            dependencies: Vec::new(),
            deadline: None,
            assigned_agent_id: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set complexity, clamped to [0, 1].
    pub fn with_complexity(mut self, complexity: f64) -> Self {
        self.complexity = clamp_unit(complexity);
        self
    }

    pub fn with_required_skills<I, S>(mut self, skills: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_skills = skills.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_xp(mut self, xp: f64) -> Self {
        self.xp = if xp.is_finite() { xp.max(0.0) } else { 0.0 };
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Set the estimate in minutes.
    pub fn with_estimated_time(mut self, minutes: f64) -> Self {
        self.estimated_time = minutes;
        self
    }

    pub fn with_dependencies(mut self, dependencies: Vec<TaskId>) -> Self {
        self.dependencies = dependencies;
        self
    }

    pub fn with_deadline(mut self, deadline: Timestamp) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Ratio of actual to estimated time; a non-positive estimate counts as on time.
    pub fn time_ratio(&self, actual_minutes: f64) -> f64 {
        if self.estimated_time > 0.0 && actual_minutes.is_finite() {
            actual_minutes.max(0.0) / self.estimated_time
        } else {
            1.0
        }
    }
}

// ============================================================================
// ASSIGNMENT
// ============================================================================

/// Record of a task matched to an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Assignment {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub task_id: TaskId,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub agent_id: AgentId,
    /// Utility score the agent won with
    pub score: f64,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub timestamp: Timestamp,
    pub status: AssignmentStatus,
}

impl Assignment {
    /// Create a pending assignment.
    pub fn new(task_id: TaskId, agent_id: AgentId, score: f64) -> Self {
        Self {
            task_id,
            agent_id,
            score,
            timestamp: Utc::now(),
            status: AssignmentStatus::Pending,
        }
    }

    /// Mark the assignment accepted.
    pub fn accept(&mut self) {
        self.status = AssignmentStatus::Accepted;
    }

    /// Mark the assignment rejected.
    pub fn reject(&mut self) {
        self.status = AssignmentStatus::Rejected;
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}

// ============================================================================
// COLLABORATION / OUTCOMES
// ============================================================================

/// An agent that contributed to a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Participant {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub agent_id: AgentId,
    /// Relative amount of work, non-negative
    pub contribution: f64,
    pub role: ParticipantRole,
}

impl Participant {
    pub fn new(agent_id: AgentId, contribution: f64, role: ParticipantRole) -> Self {
        Self {
            agent_id,
            contribution: if contribution.is_finite() {
                contribution.max(0.0)
            } else {
                0.0
            },
            role,
        }
    }
}

/// Observed outcome of a finished task.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct TaskPerformance {
    /// Actual time spent, in minutes
    pub completion_time: f64,
    /// Quality in [0, 1]
    pub quality: f64,
    /// Collaboration quality in [0, 1]
    pub collaboration: f64,
    /// Novelty of the solution in [0, 1]
    pub innovation: f64,
}

impl TaskPerformance {
    pub fn new(completion_time: f64, quality: f64) -> Self {
        Self {
            completion_time,
            quality,
            collaboration: 0.0,
            innovation: 0.0,
        }
    }

    pub fn with_collaboration(mut self, collaboration: f64) -> Self {
        self.collaboration = collaboration;
        self
    }

    pub fn with_innovation(mut self, innovation: f64) -> Self {
        self.innovation = innovation;
        self
    }

    /// Copy with every field clamped to its documented range.
    pub fn sanitized(&self) -> Self {
        Self {
            completion_time: if self.completion_time.is_finite() {
                self.completion_time.max(0.0)
            } else {
                0.0
            },
            quality: clamp_unit(self.quality),
            collaboration: clamp_unit(self.collaboration),
            innovation: clamp_unit(self.innovation),
        }
    }
}

/// Opaque upstream signal attached to a task (urgency and sentiment scoring
/// happens outside the engine).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct TaskSignal {
    /// Urgency in [0, 1]
    pub urgency: f64,
    /// Sentiment in [-1, 1]
    pub sentiment: f64,
}

impl TaskSignal {
    /// Create a signal, clamping both values into range.
    pub fn new(urgency: f64, sentiment: f64) -> Self {
        Self {
            urgency: clamp_unit(urgency),
            sentiment: if sentiment.is_finite() {
                sentiment.clamp(-1.0, 1.0)
            } else {
                0.0
            },
        }
    }
}

impl Default for TaskSignal {
    fn default() -> Self {
        Self {
            urgency: 0.5,
            sentiment: 0.0,
        }
    }
}

// ============================================================================
// REWARDS / CREDIT
// ============================================================================

/// The six reward components, also used for per-component weights.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct RewardComponents {
    pub completion: f64,
    pub quality: f64,
    pub efficiency: f64,
    pub collaboration: f64,
    pub innovation: f64,
    pub learning: f64,
}

impl RewardComponents {
    /// Component names in array order.
    pub const NAMES: [&'static str; REWARD_COMPONENT_COUNT] = [
        "completion",
        "quality",
        "efficiency",
        "collaboration",
        "innovation",
        "learning",
    ];

    /// Every component set to `value`.
    pub fn splat(value: f64) -> Self {
        Self::from_array([value; REWARD_COMPONENT_COUNT])
    }

    pub fn from_array(values: [f64; REWARD_COMPONENT_COUNT]) -> Self {
        let [completion, quality, efficiency, collaboration, innovation, learning] = values;
        Self {
            completion,
            quality,
            efficiency,
            collaboration,
            innovation,
            learning,
        }
    }

    pub fn to_array(&self) -> [f64; REWARD_COMPONENT_COUNT] {
        [
            self.completion,
            self.quality,
            self.efficiency,
            self.collaboration,
            self.innovation,
            self.learning,
        ]
    }

    pub fn sum(&self) -> f64 {
        self.to_array().iter().sum()
    }

    /// Copy with non-finite components replaced by zero.
    pub fn sanitized(&self) -> Self {
        Self::from_array(self.to_array().map(|v| if v.is_finite() { v } else { 0.0 }))
    }
}

/// One participant's portion of a task reward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CreditShare {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub agent_id: AgentId,
    pub share: f64,
    /// Role with contribution and reward percentages, e.g.
    /// `primary contributor (50.0% of contribution, 62.5% of reward)`
    pub reason: String,
}

/// Clamp to [0, 1], mapping NaN to 0.
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_new() {
        let agent = Agent::new(["rust", "sql"]);
        assert_eq!(agent.status, AgentStatus::Idle);
        assert_eq!(agent.tier, Tier::LowLevel);
        assert_eq!(agent.xp, 0.0);
        assert!(agent.has_skill("rust"));
        assert!(!agent.has_skill("go"));
    }

    #[test]
    fn test_agent_negative_xp_clamped() {
        let agent = Agent::new(Vec::<String>::new()).with_xp(-50.0);
        assert_eq!(agent.xp, 0.0);
    }

    #[test]
    fn test_skill_match_defaults_for_empty_requirements() {
        let agent = Agent::new(["rust"]);
        assert_eq!(agent.skill_match(&[]), 0.5);
    }

    #[test]
    fn test_skill_match_fraction() {
        let agent = Agent::new(["rust", "sql"]);
        let required = vec!["rust".to_string(), "go".to_string()];
        assert_eq!(agent.skill_match(&required), 0.5);
        assert_eq!(agent.missing_skills(&required), vec![&"go".to_string()]);
    }

    #[test]
    fn test_task_complexity_clamped() {
        let task = Task::new(new_entity_id(), "t").with_complexity(1.7);
        assert_eq!(task.complexity, 1.0);
        let task = Task::new(new_entity_id(), "t").with_complexity(f64::NAN);
        assert_eq!(task.complexity, 0.0);
    }

    #[test]
    fn test_time_ratio_guards_zero_estimate() {
        let task = Task::new(new_entity_id(), "t").with_estimated_time(0.0);
        assert_eq!(task.time_ratio(30.0), 1.0);
        let task = Task::new(new_entity_id(), "t").with_estimated_time(60.0);
        assert_eq!(task.time_ratio(30.0), 0.5);
    }

    #[test]
    fn test_assignment_lifecycle() {
        let mut assignment = Assignment::new(new_entity_id(), new_entity_id(), 0.7);
        assert_eq!(assignment.status, AssignmentStatus::Pending);
        assert!(assignment.is_active());
        assignment.accept();
        assert!(assignment.is_active());
        assignment.reject();
        assert!(!assignment.is_active());
    }

    #[test]
    fn test_performance_sanitized() {
        let perf = TaskPerformance::new(-5.0, 1.4)
            .with_collaboration(f64::NAN)
            .with_innovation(-0.2)
            .sanitized();
        assert_eq!(perf.completion_time, 0.0);
        assert_eq!(perf.quality, 1.0);
        assert_eq!(perf.collaboration, 0.0);
        assert_eq!(perf.innovation, 0.0);
    }

    #[test]
    fn test_reward_components_array_order() {
        let components = RewardComponents::from_array([1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(components.quality, 2.0);
        assert_eq!(components.learning, 6.0);
        assert_eq!(components.sum(), 21.0);
        assert_eq!(RewardComponents::NAMES[1], "quality");
    }

    #[test]
    fn test_reward_components_sanitized() {
        let components = RewardComponents {
            efficiency: f64::NAN,
            ..RewardComponents::splat(0.5)
        }
        .sanitized();
        assert_eq!(components.efficiency, 0.0);
        assert_eq!(components.sum(), 2.5);
    }

    #[test]
    fn test_signal_clamped() {
        let signal = TaskSignal::new(2.0, -3.0);
        assert_eq!(signal.urgency, 1.0);
        assert_eq!(signal.sentiment, -1.0);
    }
}
