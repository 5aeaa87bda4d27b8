//! Read-only views returned by the coordinator

use crate::policy::PolicySnapshot;
use serde::{Deserialize, Serialize};
use taskforge_core::{AgentId, AgentPerformance, AgentStatus, Assignment, TaskStatus, Tier, Timestamp};

/// Current standing of one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AgentMetrics {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub agent_id: AgentId,
    pub tier: Tier,
    pub xp: f64,
    pub status: AgentStatus,
    pub performance: AgentPerformance,
    pub active_assignments: usize,
    /// Collaboration partners with a tracked score
    pub collaborators: usize,
    pub policy: Option<PolicySnapshot>,
}

/// A closed assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AssignmentRecord {
    pub assignment: Assignment,
    /// Terminal status the task finished with
    pub outcome: TaskStatus,
    /// Total reward before credit was split
    pub reward: f64,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub closed_at: Timestamp,
}
