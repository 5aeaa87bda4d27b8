//! Enum types for TASKFORGE entities

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// GRAPH ENUMS
// ============================================================================

/// Node type discriminator for the knowledge graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Idea,
    Task,
    Agent,
    Skill,
    Tool,
    XpEvent,
    Feedback,
    Concept,
    Domain,
}

impl NodeType {
    /// All node types, in declaration order.
    pub const ALL: [NodeType; 9] = [
        NodeType::Idea,
        NodeType::Task,
        NodeType::Agent,
        NodeType::Skill,
        NodeType::Tool,
        NodeType::XpEvent,
        NodeType::Feedback,
        NodeType::Concept,
        NodeType::Domain,
    ];

    /// Convert to database string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            NodeType::Idea => "idea",
            NodeType::Task => "task",
            NodeType::Agent => "agent",
            NodeType::Skill => "skill",
            NodeType::Tool => "tool",
            NodeType::XpEvent => "xp_event",
            NodeType::Feedback => "feedback",
            NodeType::Concept => "concept",
            NodeType::Domain => "domain",
        }
    }
}

/// Relationship type carried by a graph edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    /// agent -> skill
    HasSkill,
    /// task -> agent
    AssignedTo,
    /// task -> task it waits on
    DependsOn,
    /// task -> idea it was decomposed from
    PartOf,
    /// agent -> agent, weighted by collaboration score
    CollaboratedWith,
    /// agent -> xp_event
    Earned,
    /// agent -> agent
    DelegatedTo,
    RelatedTo,
    UsesTool,
    GaveFeedback,
}

impl EdgeType {
    /// Convert to database string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            EdgeType::HasSkill => "has_skill",
            EdgeType::AssignedTo => "assigned_to",
            EdgeType::DependsOn => "depends_on",
            EdgeType::PartOf => "part_of",
            EdgeType::CollaboratedWith => "collaborated_with",
            EdgeType::Earned => "earned",
            EdgeType::DelegatedTo => "delegated_to",
            EdgeType::RelatedTo => "related_to",
            EdgeType::UsesTool => "uses_tool",
            EdgeType::GaveFeedback => "gave_feedback",
        }
    }
}

// ============================================================================
// AGENT / TASK ENUMS
// ============================================================================

/// Availability of an agent for new work.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    /// Registered and free to take a task
    #[default]
    Idle,
    /// Matched to exactly one task
    Busy,
    /// Not taking work
    Offline,
}

impl AgentStatus {
    /// Convert to database string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            AgentStatus::Idle => "idle",
            AgentStatus::Busy => "busy",
            AgentStatus::Offline => "offline",
        }
    }

    /// Check if the agent can accept new work.
    pub fn can_accept_work(&self) -> bool {
        matches!(self, AgentStatus::Idle)
    }
}

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    Active,
    Completed,
    Failed,
}

impl TaskStatus {
    /// Convert to database string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Active => "active",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    /// Completed and failed tasks never change status again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

/// Status of an assignment record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    #[default]
    Pending,
    Accepted,
    Rejected,
}

impl AssignmentStatus {
    /// Pending and accepted assignments hold the task.
    pub fn is_active(&self) -> bool {
        matches!(self, AssignmentStatus::Pending | AssignmentStatus::Accepted)
    }
}

/// Capability tier gating which tasks an agent may receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    LowLevel,
    MidLevel,
    HighLevel,
}

impl Tier {
    /// Tiers from least to most demanding.
    pub const ALL: [Tier; 3] = [Tier::LowLevel, Tier::MidLevel, Tier::HighLevel];

    /// Convert to database string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            Tier::LowLevel => "low_level",
            Tier::MidLevel => "mid_level",
            Tier::HighLevel => "high_level",
        }
    }
}

/// How much supervision an agent in a tier works under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum AutonomyLevel {
    Supervised,
    Guided,
    Autonomous,
}

/// Role a participant played on a shared task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum ParticipantRole {
    Primary,
    Helper,
    Reviewer,
}

impl ParticipantRole {
    /// Convert to database string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            ParticipantRole::Primary => "primary",
            ParticipantRole::Helper => "helper",
            ParticipantRole::Reviewer => "reviewer",
        }
    }

    /// Credit multiplier applied to a participant's share.
    pub fn credit_multiplier(&self) -> f64 {
        match self {
            ParticipantRole::Primary => 1.0,
            ParticipantRole::Helper => 0.7,
            ParticipantRole::Reviewer => 0.5,
        }
    }
}

/// Action an agent's policy may choose when offered a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum AgentAction {
    AcceptTask,
    DelegateTask,
    RequestHelp,
}

impl AgentAction {
    /// All actions; uniform exploration draws from this list.
    pub const ALL: [AgentAction; 3] = [
        AgentAction::AcceptTask,
        AgentAction::DelegateTask,
        AgentAction::RequestHelp,
    ];

    /// Convert to database string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            AgentAction::AcceptTask => "accept_task",
            AgentAction::DelegateTask => "delegate_task",
            AgentAction::RequestHelp => "request_help",
        }
    }
}

// ============================================================================
// DISPLAY / PARSE
// ============================================================================

fn normalize_token(input: &str) -> String {
    input
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

impl FromStr for NodeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "idea" => Ok(NodeType::Idea),
            "task" => Ok(NodeType::Task),
            "agent" => Ok(NodeType::Agent),
            "skill" => Ok(NodeType::Skill),
            "tool" => Ok(NodeType::Tool),
            "xpevent" => Ok(NodeType::XpEvent),
            "feedback" => Ok(NodeType::Feedback),
            "concept" => Ok(NodeType::Concept),
            "domain" => Ok(NodeType::Domain),
            _ => Err(format!("Invalid NodeType: {}", s)),
        }
    }
}

impl fmt::Display for EdgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

impl FromStr for EdgeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "hasskill" => Ok(EdgeType::HasSkill),
            "assignedto" => Ok(EdgeType::AssignedTo),
            "dependson" => Ok(EdgeType::DependsOn),
            "partof" => Ok(EdgeType::PartOf),
            "collaboratedwith" => Ok(EdgeType::CollaboratedWith),
            "earned" => Ok(EdgeType::Earned),
            "delegatedto" => Ok(EdgeType::DelegatedTo),
            "relatedto" => Ok(EdgeType::RelatedTo),
            "usestool" => Ok(EdgeType::UsesTool),
            "gavefeedback" => Ok(EdgeType::GaveFeedback),
            _ => Err(format!("Invalid EdgeType: {}", s)),
        }
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

impl FromStr for AgentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "idle" => Ok(AgentStatus::Idle),
            "busy" => Ok(AgentStatus::Busy),
            "offline" => Ok(AgentStatus::Offline),
            _ => Err(format!("Invalid AgentStatus: {}", s)),
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "pending" => Ok(TaskStatus::Pending),
            "active" => Ok(TaskStatus::Active),
            "completed" | "complete" => Ok(TaskStatus::Completed),
            "failed" | "failure" => Ok(TaskStatus::Failed),
            _ => Err(format!("Invalid TaskStatus: {}", s)),
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "lowlevel" | "low" => Ok(Tier::LowLevel),
            "midlevel" | "mid" => Ok(Tier::MidLevel),
            "highlevel" | "high" => Ok(Tier::HighLevel),
            _ => Err(format!("Invalid Tier: {}", s)),
        }
    }
}

impl fmt::Display for ParticipantRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

impl FromStr for ParticipantRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "primary" => Ok(ParticipantRole::Primary),
            "helper" => Ok(ParticipantRole::Helper),
            "reviewer" => Ok(ParticipantRole::Reviewer),
            _ => Err(format!("Invalid ParticipantRole: {}", s)),
        }
    }
}

impl fmt::Display for AgentAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}
