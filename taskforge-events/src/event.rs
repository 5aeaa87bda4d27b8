//! Engine event types

use serde::{Deserialize, Serialize};
use taskforge_core::{
    AgentAction, AgentId, CreditShare, RewardComponents, TaskId, TaskStatus, Tier,
};

/// Why an assignment attempt did not produce a match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AssignmentFailure {
    /// The task already has a pending or accepted assignment
    AlreadyAssigned { agent_id: AgentId },
    /// The task is already completed or failed
    TaskTerminal { status: TaskStatus },
    /// No idle agent meets the required tier
    NoEligibleAgents { tier: Tier },
    /// Eligible agents exist but none chose to accept
    NoWillingAgents { eligible: usize },
    /// Engine state could not be read or written
    Internal { reason: String },
}

impl AssignmentFailure {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentFailure::AlreadyAssigned { .. } => "already_assigned",
            AssignmentFailure::TaskTerminal { .. } => "task_terminal",
            AssignmentFailure::NoEligibleAgents { .. } => "no_eligible_agents",
            AssignmentFailure::NoWillingAgents { .. } => "no_willing_agents",
            AssignmentFailure::Internal { .. } => "internal",
        }
    }
}

/// Events emitted by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EngineEvent {
    // ========================================================================
    // AGENT EVENTS
    // ========================================================================
    /// An agent joined the pool.
    AgentRegistered {
        agent_id: AgentId,
        tier: Tier,
        skills: Vec<String>,
    },

    /// An agent left the pool.
    AgentRemoved { agent_id: AgentId },

    // ========================================================================
    // ASSIGNMENT EVENTS
    // ========================================================================
    /// A task was matched to an agent.
    AssignmentSucceeded {
        task_id: TaskId,
        agent_id: AgentId,
        score: f64,
        /// Utility lead over the runner-up (`None` with a single candidate)
        margin: Option<f64>,
        /// Whether the lead cleared the stability threshold
        stable: bool,
    },

    /// A task could not be matched.
    AssignmentFailed {
        task_id: TaskId,
        reason: AssignmentFailure,
    },

    /// A task moved between statuses.
    TaskStatusChanged {
        task_id: TaskId,
        from: TaskStatus,
        to: TaskStatus,
    },

    // ========================================================================
    // LEARNING EVENTS
    // ========================================================================
    /// An agent's policy parameters moved.
    PolicyUpdated {
        agent_id: AgentId,
        action: AgentAction,
        composite_reward: f64,
    },

    /// A task reward was computed.
    RewardCalculated {
        agent_id: AgentId,
        task_id: TaskId,
        total: f64,
        components: RewardComponents,
    },

    /// A reward was split among collaborators.
    CreditDistributed {
        task_id: TaskId,
        total_reward: f64,
        shares: Vec<CreditShare>,
    },

    /// An agent's reward weights adapted.
    WeightsUpdated {
        agent_id: AgentId,
        weights: RewardComponents,
    },
}

impl EngineEvent {
    /// Get the event type as a string (for logging and filtering).
    pub fn event_type(&self) -> &'static str {
        match self {
            EngineEvent::AgentRegistered { .. } => "AgentRegistered",
            EngineEvent::AgentRemoved { .. } => "AgentRemoved",
            EngineEvent::AssignmentSucceeded { .. } => "AssignmentSucceeded",
            EngineEvent::AssignmentFailed { .. } => "AssignmentFailed",
            EngineEvent::TaskStatusChanged { .. } => "TaskStatusChanged",
            EngineEvent::PolicyUpdated { .. } => "PolicyUpdated",
            EngineEvent::RewardCalculated { .. } => "RewardCalculated",
            EngineEvent::CreditDistributed { .. } => "CreditDistributed",
            EngineEvent::WeightsUpdated { .. } => "WeightsUpdated",
        }
    }

    /// Task the event concerns, if any.
    pub fn task_id(&self) -> Option<TaskId> {
        match self {
            EngineEvent::AssignmentSucceeded { task_id, .. }
            | EngineEvent::AssignmentFailed { task_id, .. }
            | EngineEvent::TaskStatusChanged { task_id, .. }
            | EngineEvent::RewardCalculated { task_id, .. }
            | EngineEvent::CreditDistributed { task_id, .. } => Some(*task_id),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use taskforge_core::new_entity_id;

    #[test]
    fn test_event_serializes_with_type_tag() {
        let task_id = new_entity_id();
        let event = EngineEvent::AssignmentFailed {
            task_id,
            reason: AssignmentFailure::NoEligibleAgents {
                tier: Tier::HighLevel,
            },
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], json!("AssignmentFailed"));
        assert_eq!(value["reason"]["kind"], json!("no_eligible_agents"));
        assert_eq!(value["reason"]["tier"], json!("high_level"));

        let back: EngineEvent = serde_json::from_value(value).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_event_type_and_task_id() {
        let agent_id = new_entity_id();
        let event = EngineEvent::AgentRemoved { agent_id };
        assert_eq!(event.event_type(), "AgentRemoved");
        assert_eq!(event.task_id(), None);

        let task_id = new_entity_id();
        let event = EngineEvent::TaskStatusChanged {
            task_id,
            from: TaskStatus::Pending,
            to: TaskStatus::Active,
        };
        assert_eq!(event.task_id(), Some(task_id));
    }
}
