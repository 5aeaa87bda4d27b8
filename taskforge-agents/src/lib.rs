//! TASKFORGE Agents - Assignment and Learning
//!
//! Matches tasks to a pool of tiered agents and learns from the outcomes:
//! - Tier model (experience thresholds, complexity to tier mapping)
//! - Per-agent policy with epsilon-greedy action selection
//! - Adaptive multi-component reward with per-agent weights
//! - Credit apportionment among collaborators
//! - The [`AssignmentCoordinator`] tying these to the knowledge graph and
//!   the event bus

mod coordinator;
mod credit;
mod metrics;
mod policy;
mod reward;
mod signal;
mod tier;

pub use coordinator::{apply_outcome, AssignmentCoordinator, UtilityInputs};
pub use credit::CreditApportioner;
pub use metrics::{AgentMetrics, AssignmentRecord};
pub use policy::{
    complexity_match, current_load, ActionValues, DecisionContext, DelegateCandidate,
    PolicyEngine, PolicyParameter, PolicyParameters, PolicySnapshot, RewardSignal,
    DELEGATE_LOAD_LIMIT, LOAD_PER_ASSIGNMENT, MAX_LOAD,
};
pub use reward::{
    project_weights, AgentRewardStats, RewardBreakdown, RewardEngine, SystemRewardStats,
    COMPONENT_CONFIDENCE,
};
pub use signal::{NeutralSignal, SignalSource};
pub use tier::{TierModel, TierRequirements, HIGH_COMPLEXITY, MID_COMPLEXITY};

pub use taskforge_events::{
    AssignmentFailure, CollectingSink, EngineEvent, EventBus, EventSink, TracingSink,
};
