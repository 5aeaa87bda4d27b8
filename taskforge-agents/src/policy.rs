//! Per-agent policy learning
//!
//! Each agent carries a small linear policy: five non-negative parameters that
//! sum to one and weight the factors an agent considers when offered a task.
//! Offers are answered epsilon-greedily over three actions (accept, delegate,
//! request help); rewards nudge the parameters with a gradient-style step
//! against the agent's recent average reward.

use crate::tier::TierModel;
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;
use taskforge_core::{Agent, AgentAction, AgentId, AgentStatus, PolicyConfig, Task, TaskSignal, Tier};
use tracing::debug;

/// Load reported by an agent with this many active assignments is capped at 100.
pub const LOAD_PER_ASSIGNMENT: f64 = 20.0;
pub const MAX_LOAD: f64 = 100.0;
/// Agents at or above this load are not considered as delegates.
pub const DELEGATE_LOAD_LIMIT: f64 = 80.0;

/// Load percentage for a number of active assignments.
pub fn current_load(active_assignments: usize) -> f64 {
    (LOAD_PER_ASSIGNMENT * active_assignments as f64).min(MAX_LOAD)
}

/// How well a task's complexity suits an agent level.
///
/// 1.0 inside the level's band, 0.5 below it, 0.2 above it.
pub fn complexity_match(level: Tier, complexity: f64) -> f64 {
    let (low, high) = match level {
        Tier::LowLevel => (0.0, 0.4),
        Tier::MidLevel => (0.3, 0.7),
        Tier::HighLevel => (0.6, 1.0),
    };
    if complexity < low {
        0.5
    } else if complexity > high {
        0.2
    } else {
        1.0
    }
}

// ============================================================================
// PARAMETERS
// ============================================================================

/// Named policy parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyParameter {
    TaskComplexityWeight,
    SkillMatchWeight,
    LoadBalanceWeight,
    CollaborationBonus,
    RiskTolerance,
}

impl PolicyParameter {
    pub const ALL: [PolicyParameter; 5] = [
        PolicyParameter::TaskComplexityWeight,
        PolicyParameter::SkillMatchWeight,
        PolicyParameter::LoadBalanceWeight,
        PolicyParameter::CollaborationBonus,
        PolicyParameter::RiskTolerance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyParameter::TaskComplexityWeight => "task_complexity_weight",
            PolicyParameter::SkillMatchWeight => "skill_match_weight",
            PolicyParameter::LoadBalanceWeight => "load_balance_weight",
            PolicyParameter::CollaborationBonus => "collaboration_bonus",
            PolicyParameter::RiskTolerance => "risk_tolerance",
        }
    }

    pub fn default_weight(&self) -> f64 {
        match self {
            PolicyParameter::TaskComplexityWeight => 0.25,
            PolicyParameter::SkillMatchWeight => 0.3,
            PolicyParameter::LoadBalanceWeight => 0.2,
            PolicyParameter::CollaborationBonus => 0.15,
            PolicyParameter::RiskTolerance => 0.1,
        }
    }

    /// Parameter an action reinforces, with its gradient multiplier.
    pub fn reinforced_by(action: AgentAction) -> (PolicyParameter, f64) {
        match action {
            AgentAction::AcceptTask => (PolicyParameter::TaskComplexityWeight, 1.1),
            AgentAction::DelegateTask => (PolicyParameter::CollaborationBonus, 1.2),
            AgentAction::RequestHelp => (PolicyParameter::RiskTolerance, 0.8),
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for PolicyParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Parameter vector; always non-negative and summing to 1.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyParameters {
    values: [f64; 5],
}

impl Default for PolicyParameters {
    fn default() -> Self {
        Self {
            values: PolicyParameter::ALL.map(|p| p.default_weight()),
        }
    }
}

impl PolicyParameters {
    /// Build from raw weights; negative or NaN entries become 0 and the rest
    /// are renormalized. A vector with no usable mass yields the defaults.
    pub fn from_weights(values: [f64; 5]) -> Self {
        let mut params = Self { values };
        params.normalize();
        params
    }

    pub fn get(&self, parameter: PolicyParameter) -> f64 {
        self.values[parameter.index()]
    }

    pub fn sum(&self) -> f64 {
        self.values.iter().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (PolicyParameter, f64)> + '_ {
        PolicyParameter::ALL.iter().map(|&p| (p, self.get(p)))
    }

    pub fn to_map(&self) -> BTreeMap<String, f64> {
        self.iter().map(|(p, v)| (p.as_str().to_string(), v)).collect()
    }

    fn normalize(&mut self) {
        for v in self.values.iter_mut() {
            if !v.is_finite() || *v < 0.0 {
                *v = 0.0;
            }
        }
        let sum = self.sum();
        if !sum.is_finite() || sum <= f64::EPSILON {
            *self = Self::default();
            return;
        }
        for v in self.values.iter_mut() {
            *v /= sum;
        }
    }
}

// ============================================================================
// SIGNALS AND DECISIONS
// ============================================================================

/// Reward feedback for one policy update.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RewardSignal {
    pub immediate: f64,
    pub long_term: f64,
    pub feedback: f64,
    pub collaboration: f64,
}

impl RewardSignal {
    /// Blend of the four sub-signals; non-finite inputs count as 0.
    pub fn composite(&self) -> f64 {
        let finite = |v: f64| if v.is_finite() { v } else { 0.0 };
        0.4 * finite(self.immediate)
            + 0.3 * finite(self.long_term)
            + 0.2 * finite(self.feedback)
            + 0.1 * finite(self.collaboration)
    }
}

/// Another agent that could take a delegated task.
#[derive(Debug, Clone, Copy)]
pub struct DelegateCandidate<'a> {
    pub agent: &'a Agent,
    pub active_assignments: usize,
}

/// Situation in which an agent is offered a task.
#[derive(Debug, Clone, Copy)]
pub struct DecisionContext<'a> {
    /// Active assignments of the agent being asked
    pub active_assignments: usize,
    pub signal: TaskSignal,
    pub delegates: &'a [DelegateCandidate<'a>],
}

impl<'a> DecisionContext<'a> {
    pub fn new(active_assignments: usize, signal: TaskSignal) -> Self {
        Self {
            active_assignments,
            signal,
            delegates: &[],
        }
    }

    pub fn with_delegates(mut self, delegates: &'a [DelegateCandidate<'a>]) -> Self {
        self.delegates = delegates;
        self
    }
}

/// Estimated value of each action.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActionValues {
    pub accept: f64,
    /// `-inf` when nobody can take the task
    pub delegate: f64,
    pub help: f64,
}

impl ActionValues {
    /// Greedy choice; ties favor accepting, then delegating.
    pub fn best(&self) -> AgentAction {
        let mut best = (AgentAction::AcceptTask, self.accept);
        for (action, value) in [
            (AgentAction::DelegateTask, self.delegate),
            (AgentAction::RequestHelp, self.help),
        ] {
            if value > best.1 {
                best = (action, value);
            }
        }
        best.0
    }
}

// ============================================================================
// STATE
// ============================================================================

#[derive(Debug, Clone)]
struct PolicyState {
    level: Tier,
    parameters: PolicyParameters,
    recent_rewards: VecDeque<f64>,
    /// Symmetric: mirrored in the other agent's map
    collaboration: HashMap<AgentId, f64>,
}

impl PolicyState {
    fn new(level: Tier) -> Self {
        Self {
            level,
            parameters: PolicyParameters::default(),
            recent_rewards: VecDeque::new(),
            collaboration: HashMap::new(),
        }
    }

    fn average_reward(&self) -> f64 {
        if self.recent_rewards.is_empty() {
            0.0
        } else {
            self.recent_rewards.iter().sum::<f64>() / self.recent_rewards.len() as f64
        }
    }
}

/// Read-only view of one agent's policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PolicySnapshot {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub agent_id: AgentId,
    pub level: Tier,
    pub parameters: BTreeMap<String, f64>,
    pub recent_rewards: Vec<f64>,
    pub average_reward: f64,
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub collaboration_scores: BTreeMap<AgentId, f64>,
}

// ============================================================================
// ENGINE
// ============================================================================

/// Epsilon-greedy policy learner over all registered agents.
pub struct PolicyEngine {
    config: PolicyConfig,
    tiers: TierModel,
    states: HashMap<AgentId, PolicyState>,
    rng: Box<dyn RngCore + Send>,
}

impl fmt::Debug for PolicyEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyEngine")
            .field("config", &self.config)
            .field("agents", &self.states.len())
            .finish()
    }
}

impl PolicyEngine {
    /// Create an engine drawing exploration decisions from `rng`.
    pub fn new(config: PolicyConfig, rng: Box<dyn RngCore + Send>) -> Self {
        Self {
            config,
            tiers: TierModel::default(),
            states: HashMap::new(),
            rng,
        }
    }

    /// Create an engine with a deterministic RNG.
    pub fn seeded(config: PolicyConfig, seed: u64) -> Self {
        Self::new(config, Box::new(StdRng::seed_from_u64(seed)))
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    /// Start tracking an agent, or refresh its level if already tracked.
    pub fn register_agent(&mut self, agent: &Agent) {
        let level = self.tiers.tier_for_xp(agent.xp);
        self.states
            .entry(agent.id)
            .and_modify(|state| state.level = level)
            .or_insert_with(|| PolicyState::new(level));
    }

    /// Forget an agent, including other agents' collaboration scores with it.
    pub fn remove_agent(&mut self, agent_id: AgentId) -> bool {
        let removed = self.states.remove(&agent_id).is_some();
        for state in self.states.values_mut() {
            state.collaboration.remove(&agent_id);
        }
        removed
    }

    pub fn contains(&self, agent_id: AgentId) -> bool {
        self.states.contains_key(&agent_id)
    }

    pub fn parameters(&self, agent_id: AgentId) -> Option<&PolicyParameters> {
        self.states.get(&agent_id).map(|s| &s.parameters)
    }

    /// Value of taking the task on directly.
    pub fn accept_value(&self, agent: &Agent, task: &Task, active_assignments: usize) -> f64 {
        let (level, params) = match self.states.get(&agent.id) {
            Some(state) => (state.level, state.parameters.clone()),
            None => (self.tiers.tier_for_xp(agent.xp), PolicyParameters::default()),
        };
        params.get(PolicyParameter::TaskComplexityWeight) * complexity_match(level, task.complexity)
            + params.get(PolicyParameter::SkillMatchWeight)
                * agent.skill_match(&task.required_skills)
            + params.get(PolicyParameter::LoadBalanceWeight)
                * (1.0 - current_load(active_assignments) / MAX_LOAD)
    }

    /// Value of every action for `agent` offered `task`.
    pub fn action_values(&self, agent: &Agent, task: &Task, ctx: &DecisionContext<'_>) -> ActionValues {
        let accept = self.accept_value(agent, task, ctx.active_assignments);

        let delegate = ctx
            .delegates
            .iter()
            .filter(|c| {
                c.agent.id != agent.id
                    && c.agent.status == AgentStatus::Idle
                    && current_load(c.active_assignments) < DELEGATE_LOAD_LIMIT
            })
            .map(|c| {
                let score = self.collaboration_score(agent.id, c.agent.id).unwrap_or(0.0);
                self.accept_value(c.agent, task, c.active_assignments) * (1.0 + score)
            })
            .fold(f64::NEG_INFINITY, f64::max);

        let (level, average_reward) = match self.states.get(&agent.id) {
            Some(state) => (state.level, state.average_reward()),
            None => (self.tiers.tier_for_xp(agent.xp), 0.0),
        };
        let caution = if level == Tier::LowLevel { 1.2 } else { 0.8 };
        let help = ((task.complexity + ctx.signal.urgency) / 2.0) * caution * (1.0 + average_reward);

        ActionValues {
            accept,
            delegate,
            help,
        }
    }

    /// Epsilon-greedy action choice.
    pub fn select_action(&mut self, agent: &Agent, task: &Task, ctx: &DecisionContext<'_>) -> AgentAction {
        let explore = self.rng.random::<f64>() < self.config.epsilon;
        if explore {
            let action = AgentAction::ALL[self.rng.random_range(0..AgentAction::ALL.len())];
            debug!(agent_id = %agent.id, task_id = %task.id, action = %action, "Exploring");
            return action;
        }
        let values = self.action_values(agent, task, ctx);
        let action = values.best();
        debug!(
            agent_id = %agent.id,
            task_id = %task.id,
            action = %action,
            accept = values.accept,
            delegate = values.delegate,
            help = values.help,
            "Selected action"
        );
        action
    }

    /// Apply one reward to an agent's policy; returns the composite reward.
    pub fn update_policy(&mut self, agent: &Agent, action: AgentAction, signal: RewardSignal) -> f64 {
        let level = self.tiers.tier_for_xp(agent.xp);
        let capacity = self.config.reward_history.max(1);
        let alpha = self.config.alpha;
        let state = self
            .states
            .entry(agent.id)
            .or_insert_with(|| PolicyState::new(level));

        let composite = signal.composite();
        state.recent_rewards.push_back(composite);
        while state.recent_rewards.len() > capacity {
            state.recent_rewards.pop_front();
        }
        let advantage = composite - state.average_reward();

        let (boosted, multiplier) = PolicyParameter::reinforced_by(action);
        let mut values = state.parameters.values;
        for parameter in PolicyParameter::ALL {
            let value = &mut values[parameter.index()];
            let mut gradient = advantage * (1.0 - *value);
            if parameter == boosted {
                gradient *= multiplier;
            }
            *value = (*value + alpha * gradient).max(0.0);
        }
        state.parameters = PolicyParameters::from_weights(values);
        state.level = level;

        debug!(
            agent_id = %agent.id,
            action = %action,
            composite,
            advantage,
            "Policy updated"
        );
        composite
    }

    /// Blend a new reward into the symmetric collaboration score of two agents.
    pub fn update_collaboration_score(&mut self, a: AgentId, b: AgentId, reward: f64) -> f64 {
        let decay = self.config.collaboration_decay;
        let old = self.collaboration_score(a, b).unwrap_or(0.0);
        let reward = if reward.is_finite() { reward } else { 0.0 };
        let score = decay * old + (1.0 - decay) * reward;
        for (owner, other) in [(a, b), (b, a)] {
            if let Some(state) = self.states.get_mut(&owner) {
                state.collaboration.insert(other, score);
            }
        }
        score
    }

    /// Tracked collaboration score between two agents.
    pub fn collaboration_score(&self, a: AgentId, b: AgentId) -> Option<f64> {
        self.states.get(&a)?.collaboration.get(&b).copied()
    }

    pub fn snapshot(&self, agent_id: AgentId) -> Option<PolicySnapshot> {
        let state = self.states.get(&agent_id)?;
        Some(PolicySnapshot {
            agent_id,
            level: state.level,
            parameters: state.parameters.to_map(),
            recent_rewards: state.recent_rewards.iter().copied().collect(),
            average_reward: state.average_reward(),
            collaboration_scores: state
                .collaboration
                .iter()
                .map(|(k, v)| (*k, *v))
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskforge_core::new_entity_id;

    fn greedy() -> PolicyConfig {
        PolicyConfig {
            epsilon: 0.0,
            ..PolicyConfig::default()
        }
    }

    fn task(complexity: f64) -> Task {
        Task::new(new_entity_id(), "t").with_complexity(complexity)
    }

    fn signal(value: f64) -> RewardSignal {
        RewardSignal {
            immediate: value,
            long_term: value,
            feedback: value,
            collaboration: value,
        }
    }

    #[test]
    fn test_default_parameters_sum_to_one() {
        let params = PolicyParameters::default();
        assert!((params.sum() - 1.0).abs() < 1e-12);
        assert_eq!(params.get(PolicyParameter::SkillMatchWeight), 0.3);
    }

    #[test]
    fn test_degenerate_weights_reset_to_defaults() {
        let params = PolicyParameters::from_weights([0.0, -1.0, f64::NAN, 0.0, 0.0]);
        assert_eq!(params, PolicyParameters::default());
    }

    #[test]
    fn test_complexity_match_bands() {
        assert_eq!(complexity_match(Tier::LowLevel, 0.2), 1.0);
        assert_eq!(complexity_match(Tier::LowLevel, 0.5), 0.2);
        assert_eq!(complexity_match(Tier::MidLevel, 0.1), 0.5);
        assert_eq!(complexity_match(Tier::HighLevel, 0.6), 1.0);
    }

    #[test]
    fn test_current_load_capped() {
        assert_eq!(current_load(0), 0.0);
        assert_eq!(current_load(2), 40.0);
        assert_eq!(current_load(9), 100.0);
    }

    #[test]
    fn test_action_values_for_lone_agent() {
        let mut engine = PolicyEngine::seeded(greedy(), 1);
        let agent = Agent::new(Vec::<String>::new());
        engine.register_agent(&agent);
        let t = task(0.2);
        let ctx = DecisionContext::new(0, TaskSignal::default());
        let values = engine.action_values(&agent, &t, &ctx);

        assert!((values.accept - 0.6).abs() < 1e-12);
        assert_eq!(values.delegate, f64::NEG_INFINITY);
        assert!((values.help - 0.42).abs() < 1e-12);
        assert_eq!(engine.select_action(&agent, &t, &ctx), AgentAction::AcceptTask);
    }

    #[test]
    fn test_delegation_skips_busy_and_loaded_agents() {
        let mut engine = PolicyEngine::seeded(greedy(), 1);
        let me = Agent::new(["rust"]);
        let busy = Agent::new(["rust"]).with_status(AgentStatus::Busy);
        let loaded = Agent::new(["rust"]);
        let free = Agent::new(["rust"]);
        for a in [&me, &busy, &loaded, &free] {
            engine.register_agent(a);
        }
        let t = task(0.2).with_required_skills(["rust"]);

        let only_unavailable = [
            DelegateCandidate { agent: &busy, active_assignments: 0 },
            DelegateCandidate { agent: &loaded, active_assignments: 4 },
        ];
        let ctx = DecisionContext::new(0, TaskSignal::default()).with_delegates(&only_unavailable);
        assert_eq!(engine.action_values(&me, &t, &ctx).delegate, f64::NEG_INFINITY);

        let with_free = [DelegateCandidate { agent: &free, active_assignments: 0 }];
        let ctx = DecisionContext::new(0, TaskSignal::default()).with_delegates(&with_free);
        let values = engine.action_values(&me, &t, &ctx);
        assert!((values.delegate - engine.accept_value(&free, &t, 0)).abs() < 1e-12);
    }

    #[test]
    fn test_help_value_uses_urgency_and_level() {
        let engine = PolicyEngine::seeded(greedy(), 1);
        let junior = Agent::new(Vec::<String>::new());
        let senior = Agent::new(Vec::<String>::new()).with_xp(6000.0);
        let t = task(0.6);
        let ctx = DecisionContext::new(0, TaskSignal::new(0.4, 0.0));
        assert!((engine.action_values(&junior, &t, &ctx).help - 0.6).abs() < 1e-12);
        assert!((engine.action_values(&senior, &t, &ctx).help - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_ties_favor_accept() {
        let values = ActionValues {
            accept: 0.5,
            delegate: 0.5,
            help: 0.5,
        };
        assert_eq!(values.best(), AgentAction::AcceptTask);
    }

    #[test]
    fn test_full_exploration_visits_every_action() {
        let config = PolicyConfig {
            epsilon: 1.0,
            ..PolicyConfig::default()
        };
        let mut engine = PolicyEngine::seeded(config, 42);
        let agent = Agent::new(Vec::<String>::new());
        let t = task(0.2);
        let ctx = DecisionContext::new(0, TaskSignal::default());
        let chosen: std::collections::HashSet<AgentAction> =
            (0..200).map(|_| engine.select_action(&agent, &t, &ctx)).collect();
        assert_eq!(chosen.len(), 3);
    }

    #[test]
    fn test_seeded_engines_agree() {
        let config = PolicyConfig {
            epsilon: 0.5,
            ..PolicyConfig::default()
        };
        let mut a = PolicyEngine::seeded(config.clone(), 7);
        let mut b = PolicyEngine::seeded(config, 7);
        let agent = Agent::new(Vec::<String>::new());
        let t = task(0.5);
        let ctx = DecisionContext::new(0, TaskSignal::default());
        for _ in 0..50 {
            assert_eq!(a.select_action(&agent, &t, &ctx), b.select_action(&agent, &t, &ctx));
        }
    }

    #[test]
    fn test_update_policy_keeps_distribution() {
        let mut engine = PolicyEngine::seeded(greedy(), 1);
        let agent = Agent::new(Vec::<String>::new());
        engine.register_agent(&agent);

        let composite = engine.update_policy(&agent, AgentAction::AcceptTask, signal(1.0));
        assert!((composite - 1.0).abs() < 1e-12);
        engine.update_policy(&agent, AgentAction::DelegateTask, signal(0.0));
        engine.update_policy(&agent, AgentAction::RequestHelp, signal(3.0));

        let params = engine.parameters(agent.id).unwrap();
        assert!((params.sum() - 1.0).abs() < 1e-9);
        assert!(params.iter().all(|(_, v)| v >= 0.0));
    }

    #[test]
    fn test_recent_rewards_ring_buffer() {
        let mut engine = PolicyEngine::seeded(greedy(), 1);
        let agent = Agent::new(Vec::<String>::new());
        for i in 0..15 {
            engine.update_policy(&agent, AgentAction::AcceptTask, signal(i as f64));
        }
        let snapshot = engine.snapshot(agent.id).unwrap();
        assert_eq!(snapshot.recent_rewards.len(), 10);
        assert!((snapshot.recent_rewards[0] - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_collaboration_score_symmetric() {
        let mut engine = PolicyEngine::seeded(greedy(), 1);
        let a = Agent::new(Vec::<String>::new());
        let b = Agent::new(Vec::<String>::new());
        engine.register_agent(&a);
        engine.register_agent(&b);

        assert_eq!(engine.collaboration_score(a.id, b.id), None);
        let first = engine.update_collaboration_score(a.id, b.id, 1.0);
        assert!((first - 0.1).abs() < 1e-12);
        let second = engine.update_collaboration_score(b.id, a.id, 1.0);
        assert!((second - 0.19).abs() < 1e-12);
        assert_eq!(engine.collaboration_score(a.id, b.id), Some(second));
        assert_eq!(engine.collaboration_score(b.id, a.id), Some(second));

        engine.remove_agent(b.id);
        assert_eq!(engine.collaboration_score(a.id, b.id), None);
    }
}
