//! Assignment coordinator
//!
//! Owns the agent registry, task table, knowledge graph and all learning
//! state behind a single mutex. Every mutating operation follows the same
//! shape: look up and validate under the lock, then apply writes that cannot
//! fail, then emit events (still under the lock, so subscribers observe
//! commit order).
//!
//! Public operations never return errors. Problems are logged with `tracing`
//! and reported through the boolean result or an `AssignmentFailed` event.

use crate::credit::{contribution_reason, CreditApportioner};
use crate::metrics::{AgentMetrics, AssignmentRecord};
use crate::policy::{DecisionContext, DelegateCandidate, PolicyEngine, RewardSignal};
use crate::reward::{AgentRewardStats, RewardEngine, SystemRewardStats};
use crate::signal::{NeutralSignal, SignalSource};
use crate::tier::{TierModel, TierRequirements};
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use taskforge_core::{
    clamp_unit, named_node_id, new_entity_id, Agent, AgentAction, AgentError, AgentId,
    AgentPerformance, AgentStatus, Assignment, AssignmentConfig, CreditShare, EdgeAttrs,
    EdgeType, EngineConfig, EngineError, EngineResult, Node, NodeType, Participant,
    ParticipantRole, StorageError, Task, TaskId, TaskPerformance, TaskSignal, TaskStatus, Tier,
};
use taskforge_events::{AssignmentFailure, EngineEvent, EventBus, EventSink};
use taskforge_graph::GraphStore;
use tracing::{debug, info, info_span, warn, Span};

/// Source tag on graph nodes written by the coordinator.
const NODE_SOURCE: &str = "coordinator";

// ============================================================================
// UTILITY
// ============================================================================

/// Inputs to the utility score of one candidate agent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UtilityInputs {
    pub skill_match: f64,
    pub performance: f64,
    pub workload: f64,
    pub xp_gain: f64,
    pub collaboration: f64,
}

impl UtilityInputs {
    /// Gather the inputs for `agent` and `task`.
    ///
    /// `collaboration` is supplied by the caller since it depends on other
    /// agents' assignments.
    pub fn new(
        agent: &Agent,
        task: &Task,
        active_assignments: usize,
        collaboration: f64,
        reference_completion_time: f64,
    ) -> Self {
        let perf = &agent.performance;
        let normalized_time = if reference_completion_time > 0.0 {
            clamp_unit(perf.average_completion_time / reference_completion_time)
        } else {
            0.0
        };
        let xp_gain = task.xp / (agent.xp + 1.0);
        Self {
            skill_match: agent.skill_match(&task.required_skills),
            performance: clamp_unit(0.6 * perf.success_rate + 0.4 * (1.0 - normalized_time)),
            workload: (1.0 - 0.2 * active_assignments as f64).max(0.0),
            xp_gain: if xp_gain.is_finite() { xp_gain } else { 0.0 },
            collaboration: clamp_unit(collaboration),
        }
    }

    pub fn score(&self) -> f64 {
        0.3 * self.skill_match
            + 0.25 * self.performance
            + 0.2 * self.workload
            + 0.15 * self.xp_gain
            + 0.1 * self.collaboration
    }
}

/// Fold a finished task into an agent's rolling metrics.
///
/// Metrics move by the agent's current learning rate, which then adapts:
/// it grows after high-quality successes and shrinks after failures.
pub fn apply_outcome(performance: &mut AgentPerformance, success: bool, outcome: &TaskPerformance) {
    let rate = performance.learning_rate;
    let observed = if success { 1.0 } else { 0.0 };
    performance.success_rate = clamp_unit((1.0 - rate) * performance.success_rate + rate * observed);

    performance.average_completion_time =
        if performance.total_tasks_completed == 0 && performance.average_completion_time == 0.0 {
            outcome.completion_time
        } else {
            (1.0 - rate) * performance.average_completion_time + rate * outcome.completion_time
        };

    if success {
        performance.total_tasks_completed += 1;
        if outcome.quality > 0.8 {
            performance.learning_rate = (rate * 1.1).min(AgentPerformance::MAX_LEARNING_RATE);
        }
    } else {
        performance.learning_rate = (rate * 0.9).max(AgentPerformance::MIN_LEARNING_RATE);
    }
}

// ============================================================================
// STATE
// ============================================================================

struct EngineState {
    graph: GraphStore,
    policy: PolicyEngine,
    rewards: RewardEngine,
    credit: CreditApportioner,
    /// Ordered by id so candidate iteration is deterministic
    agents: BTreeMap<AgentId, Agent>,
    tasks: HashMap<TaskId, Task>,
    /// At most one per task
    active: HashMap<TaskId, Assignment>,
    history: Vec<AssignmentRecord>,
    contributions: HashMap<TaskId, Vec<Participant>>,
}

impl EngineState {
    fn active_count(&self, agent_id: AgentId) -> usize {
        self.active.values().filter(|a| a.agent_id == agent_id).count()
    }

    /// Mean tracked collaboration score between `agent_id` and agents currently
    /// holding tasks of the same idea or the task's dependencies.
    fn collaboration_affinity(&self, agent_id: AgentId, task: &Task) -> f64 {
        let partners: BTreeSet<AgentId> = self
            .active
            .values()
            .filter(|held| held.task_id != task.id && held.agent_id != agent_id)
            .filter(|held| {
                task.dependencies.contains(&held.task_id)
                    || self
                        .tasks
                        .get(&held.task_id)
                        .is_some_and(|t| t.idea_id == task.idea_id)
            })
            .map(|held| held.agent_id)
            .collect();
        let scores: Vec<f64> = partners
            .iter()
            .filter_map(|partner| self.policy.collaboration_score(agent_id, *partner))
            .collect();
        if scores.is_empty() {
            0.0
        } else {
            scores.iter().sum::<f64>() / scores.len() as f64
        }
    }
}

/// Winner chosen for a task, computed before anything is written.
#[derive(Debug, Clone, Copy)]
struct AssignmentPlan {
    agent_id: AgentId,
    score: f64,
    tier: Tier,
    margin: Option<f64>,
    stable: bool,
}

// ============================================================================
// COORDINATOR
// ============================================================================

/// Matches tasks to agents and feeds outcomes back into learning.
pub struct AssignmentCoordinator {
    state: Mutex<EngineState>,
    tiers: TierModel,
    config: AssignmentConfig,
    events: EventBus,
    signals: Arc<dyn SignalSource>,
    span: Span,
}

impl std::fmt::Debug for AssignmentCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssignmentCoordinator")
            .field("config", &self.config)
            .field("events", &self.events)
            .finish()
    }
}

impl AssignmentCoordinator {
    /// Create a coordinator. The exploration RNG is seeded from
    /// `config.seed`, or from OS entropy when no seed is set.
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        let rng: Box<dyn RngCore + Send> = match config.seed {
            Some(seed) => Box::new(StdRng::seed_from_u64(seed)),
            None => Box::new(StdRng::from_os_rng()),
        };
        Self::with_rng(config, rng)
    }

    /// Create a coordinator drawing exploration decisions from `rng`.
    pub fn with_rng(config: EngineConfig, rng: Box<dyn RngCore + Send>) -> EngineResult<Self> {
        config.validate()?;
        let span = info_span!("coordinator", service = %config.service_name);
        let state = EngineState {
            graph: GraphStore::new(),
            policy: PolicyEngine::new(config.policy.clone(), rng),
            rewards: RewardEngine::new(config.reward.clone()),
            credit: CreditApportioner::new(config.credit.clone()),
            agents: BTreeMap::new(),
            tasks: HashMap::new(),
            active: HashMap::new(),
            history: Vec::new(),
            contributions: HashMap::new(),
        };
        Ok(Self {
            state: Mutex::new(state),
            tiers: TierModel::default(),
            config: config.assignment.clone(),
            events: EventBus::new(config.event_capacity),
            signals: Arc::new(NeutralSignal),
            span,
        })
    }

    /// Use `span` as the parent of every log line this coordinator writes.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn with_signal_source(mut self, signals: Arc<dyn SignalSource>) -> Self {
        self.signals = signals;
        self
    }

    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events.add_sink(sink);
        self
    }

    /// Event bus; call `subscribe()` on it for a broadcast receiver.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    fn lock(&self) -> EngineResult<MutexGuard<'_, EngineState>> {
        self.state
            .lock()
            .map_err(|_| EngineError::Storage(StorageError::LockPoisoned))
    }

    fn read<R>(&self, f: impl FnOnce(&EngineState) -> R) -> Option<R> {
        match self.lock() {
            Ok(state) => Some(f(&state)),
            Err(e) => {
                warn!(error = %e, "Engine state unavailable");
                None
            }
        }
    }

    // ========================================================================
    // AGENTS
    // ========================================================================

    /// Add an agent to the pool.
    ///
    /// The agent's tier is derived from its experience. Writes an `agent`
    /// node, a `skill` node per skill and `has_skill` edges. Returns false if
    /// the id is already registered.
    pub fn register_agent(&self, mut agent: Agent) -> bool {
        let _entered = self.span.enter();
        let mut guard = match self.lock() {
            Ok(guard) => guard,
            Err(e) => {
                warn!(agent_id = %agent.id, error = %e, "Failed to register agent");
                return false;
            }
        };
        let state = &mut *guard;

        if state.agents.contains_key(&agent.id) {
            warn!(agent_id = %agent.id, "Agent already registered");
            return false;
        }

        agent.tier = self.tiers.tier_for_xp(agent.xp);
        state.graph.add_node(
            Node::new(agent.id, NodeType::Agent, agent_node_data(&agent)).with_source(NODE_SOURCE),
        );
        for skill in &agent.skills {
            let skill_id = named_node_id(NodeType::Skill, skill);
            if !state.graph.contains_node(skill_id) {
                state.graph.add_node(
                    Node::new(skill_id, NodeType::Skill, json!({ "name": skill }))
                        .with_source(NODE_SOURCE),
                );
            }
            state
                .graph
                .add_edge(agent.id, skill_id, EdgeType::HasSkill, 1.0, EdgeAttrs::default());
        }
        state.policy.register_agent(&agent);
        state.rewards.register_agent(agent.id);

        info!(agent_id = %agent.id, tier = %agent.tier, skills = agent.skills.len(), "Agent registered");
        let event = EngineEvent::AgentRegistered {
            agent_id: agent.id,
            tier: agent.tier,
            skills: agent.skills.iter().cloned().collect(),
        };
        state.agents.insert(agent.id, agent);
        self.events.emit(event);
        true
    }

    /// Remove an idle agent and everything the engine learned about it.
    pub fn remove_agent(&self, agent_id: AgentId) -> bool {
        let _entered = self.span.enter();
        let mut guard = match self.lock() {
            Ok(guard) => guard,
            Err(e) => {
                warn!(agent_id = %agent_id, error = %e, "Failed to remove agent");
                return false;
            }
        };
        let state = &mut *guard;

        let Some(agent) = state.agents.get(&agent_id) else {
            warn!(error = %AgentError::NotRegistered { agent_id }, "Agent not removed");
            return false;
        };
        if agent.status == AgentStatus::Busy || state.active_count(agent_id) > 0 {
            warn!(error = %AgentError::AgentBusy { agent_id }, "Agent not removed");
            return false;
        }

        state.agents.remove(&agent_id);
        state.graph.remove_node(agent_id);
        state.policy.remove_agent(agent_id);
        state.rewards.remove_agent(agent_id);
        state.credit.remove_agent(agent_id);
        for participants in state.contributions.values_mut() {
            participants.retain(|p| p.agent_id != agent_id);
        }

        info!(agent_id = %agent_id, "Agent removed");
        self.events.emit(EngineEvent::AgentRemoved { agent_id });
        true
    }

    // ========================================================================
    // ASSIGNMENT
    // ========================================================================

    /// Match `task` to the best willing agent.
    ///
    /// On success the task is marked active with its assigned agent (both in
    /// the caller's copy and in the engine's task table) and the agent becomes
    /// busy. Returns false, leaving the task untouched, when the task is
    /// already held or finished, when no idle agent qualifies for its tier,
    /// or when every qualified agent declines.
    pub fn assign_task(&self, task: &mut Task) -> bool {
        let _entered = self.span.enter();
        let raw = self.signals.signal(task);
        let signal = TaskSignal::new(raw.urgency, raw.sentiment);

        let mut guard = match self.lock() {
            Ok(guard) => guard,
            Err(e) => {
                warn!(task_id = %task.id, error = %e, "Failed to assign task");
                self.events.emit(EngineEvent::AssignmentFailed {
                    task_id: task.id,
                    reason: AssignmentFailure::Internal {
                        reason: e.to_string(),
                    },
                });
                return false;
            }
        };
        let state = &mut *guard;

        match self.plan_assignment(state, task, signal) {
            Ok(plan) => {
                self.commit_assignment(state, task, plan);
                true
            }
            Err(reason) => {
                info!(task_id = %task.id, reason = reason.as_str(), "Task not assigned");
                self.events.emit(EngineEvent::AssignmentFailed {
                    task_id: task.id,
                    reason,
                });
                false
            }
        }
    }

    fn plan_assignment(
        &self,
        state: &mut EngineState,
        task: &Task,
        signal: TaskSignal,
    ) -> Result<AssignmentPlan, AssignmentFailure> {
        if let Some(existing) = state.active.get(&task.id) {
            return Err(AssignmentFailure::AlreadyAssigned {
                agent_id: existing.agent_id,
            });
        }
        let status = match state.tasks.get(&task.id) {
            Some(stored) if stored.status.is_terminal() => stored.status,
            _ => task.status,
        };
        if status.is_terminal() {
            return Err(AssignmentFailure::TaskTerminal { status });
        }

        let tier = self.tiers.required_tier(task);
        let eligible: Vec<AgentId> = state
            .agents
            .values()
            .filter(|a| a.status.can_accept_work() && self.tiers.is_qualified(a, tier))
            .map(|a| a.id)
            .collect();
        if eligible.is_empty() {
            return Err(AssignmentFailure::NoEligibleAgents { tier });
        }

        let loads: HashMap<AgentId, usize> = state
            .agents
            .keys()
            .map(|id| (*id, state.active_count(*id)))
            .collect();
        let load_of = |id: &AgentId| loads.get(id).copied().unwrap_or(0);

        let willing: Vec<AgentId> = {
            let agents = &state.agents;
            let policy = &mut state.policy;
            let delegates: Vec<DelegateCandidate<'_>> = agents
                .values()
                .filter(|a| a.status == AgentStatus::Idle)
                .map(|agent| DelegateCandidate {
                    agent,
                    active_assignments: load_of(&agent.id),
                })
                .collect();

            eligible
                .iter()
                .filter_map(|id| agents.get(id))
                .filter(|agent| {
                    let ctx = DecisionContext::new(load_of(&agent.id), signal)
                        .with_delegates(&delegates);
                    let action = policy.select_action(agent, task, &ctx);
                    if action != AgentAction::AcceptTask {
                        debug!(agent_id = %agent.id, task_id = %task.id, action = %action, "Agent declined");
                    }
                    action == AgentAction::AcceptTask
                })
                .map(|agent| agent.id)
                .collect()
        };
        if willing.is_empty() {
            return Err(AssignmentFailure::NoWillingAgents {
                eligible: eligible.len(),
            });
        }

        let mut scored: Vec<(AgentId, f64)> = willing
            .iter()
            .filter_map(|id| state.agents.get(id))
            .map(|agent| {
                let inputs = UtilityInputs::new(
                    agent,
                    task,
                    load_of(&agent.id),
                    state.collaboration_affinity(agent.id, task),
                    self.config.reference_completion_time,
                );
                (agent.id, inputs.score())
            })
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        let Some(&(agent_id, score)) = scored.first() else {
            return Err(AssignmentFailure::NoWillingAgents {
                eligible: eligible.len(),
            });
        };
        let margin = scored.get(1).map(|(_, runner_up)| score - runner_up);
        let stable = margin.map_or(true, |m| m >= self.config.stability_threshold);

        Ok(AssignmentPlan {
            agent_id,
            score,
            tier,
            margin,
            stable,
        })
    }

    fn commit_assignment(&self, state: &mut EngineState, task: &mut Task, plan: AssignmentPlan) {
        let mut assignment = Assignment::new(task.id, plan.agent_id, plan.score);
        assignment.accept();

        let previous = task.status;
        task.status = TaskStatus::Active;
        task.assigned_agent_id = Some(plan.agent_id);

        if let Some(agent) = state.agents.get_mut(&plan.agent_id) {
            agent.status = AgentStatus::Busy;
        }

        state.graph.add_node(
            Node::new(task.id, NodeType::Task, task_node_data(task)).with_source(NODE_SOURCE),
        );
        state
            .graph
            .merge_node_data(plan.agent_id, json!({ "status": AgentStatus::Busy.as_db_str() }));
        state.graph.add_edge(
            task.id,
            plan.agent_id,
            EdgeType::AssignedTo,
            plan.score,
            EdgeAttrs::with_context(format!("tier:{}", plan.tier)),
        );
        for dependency in &task.dependencies {
            if state.graph.contains_node(*dependency) {
                state.graph.add_edge(
                    task.id,
                    *dependency,
                    EdgeType::DependsOn,
                    1.0,
                    EdgeAttrs::default(),
                );
            }
        }
        if state.graph.contains_node(task.idea_id) {
            state
                .graph
                .add_edge(task.id, task.idea_id, EdgeType::PartOf, 1.0, EdgeAttrs::default());
        }

        state.tasks.insert(task.id, task.clone());
        state.active.insert(task.id, assignment);

        if !plan.stable {
            info!(
                task_id = %task.id,
                agent_id = %plan.agent_id,
                margin = plan.margin.unwrap_or(0.0),
                threshold = self.config.stability_threshold,
                "Assignment margin below stability threshold"
            );
        }
        info!(task_id = %task.id, agent_id = %plan.agent_id, score = plan.score, "Task assigned");

        self.events.emit(EngineEvent::TaskStatusChanged {
            task_id: task.id,
            from: previous,
            to: TaskStatus::Active,
        });
        self.events.emit(EngineEvent::AssignmentSucceeded {
            task_id: task.id,
            agent_id: plan.agent_id,
            score: plan.score,
            margin: plan.margin,
            stable: plan.stable,
        });
    }

    /// Record or replace a collaborator's contribution to an active task.
    pub fn record_contribution(&self, task_id: TaskId, participant: Participant) -> bool {
        let _entered = self.span.enter();
        let mut guard = match self.lock() {
            Ok(guard) => guard,
            Err(e) => {
                warn!(task_id = %task_id, error = %e, "Failed to record contribution");
                return false;
            }
        };
        let state = &mut *guard;

        if !state.active.contains_key(&task_id) {
            warn!(error = %AgentError::NoActiveAssignment { task_id }, "Contribution ignored");
            return false;
        }
        if !state.agents.contains_key(&participant.agent_id) {
            warn!(
                error = %AgentError::NotRegistered { agent_id: participant.agent_id },
                "Contribution ignored"
            );
            return false;
        }

        let participant = Participant::new(
            participant.agent_id,
            participant.contribution,
            participant.role,
        );
        let entries = state.contributions.entry(task_id).or_default();
        match entries.iter_mut().find(|p| p.agent_id == participant.agent_id) {
            Some(existing) => *existing = participant,
            None => entries.push(participant),
        }
        debug!(task_id = %task_id, participants = entries.len(), "Contribution recorded");
        true
    }

    // ========================================================================
    // COMPLETION
    // ========================================================================

    /// Report a status change for an assigned task.
    ///
    /// Moving back to `pending` is refused while the assignment is active.
    /// Other non-terminal statuses only update the task. `completed` and `failed`
    /// close the assignment: the reward is computed, split among recorded
    /// collaborators, fed into every recipient's policy and reward weights,
    /// experience is awarded (completed tasks only) and the assigned agent
    /// returns to idle. Returns false if the task has no active assignment or
    /// the update is refused.
    pub fn update_task_status(
        &self,
        task_id: TaskId,
        status: TaskStatus,
        performance: TaskPerformance,
    ) -> bool {
        let _entered = self.span.enter();
        let mut guard = match self.lock() {
            Ok(guard) => guard,
            Err(e) => {
                warn!(task_id = %task_id, error = %e, "Failed to update task status");
                return false;
            }
        };
        let state = &mut *guard;

        let Some(assignment) = state.active.get(&task_id).cloned() else {
            warn!(error = %AgentError::NoActiveAssignment { task_id }, "Status update ignored");
            return false;
        };
        let Some(task) = state.tasks.get(&task_id).cloned() else {
            warn!(error = %AgentError::TaskNotFound { task_id }, "Status update ignored");
            return false;
        };
        if !state.agents.contains_key(&assignment.agent_id) {
            warn!(
                error = %AgentError::NotRegistered { agent_id: assignment.agent_id },
                "Status update ignored"
            );
            return false;
        }

        if status == TaskStatus::Pending {
            warn!(
                error = %AgentError::AlreadyAssigned { task_id, agent_id: assignment.agent_id },
                "Cannot move an assigned task back to pending"
            );
            return false;
        }

        if !status.is_terminal() {
            let previous = task.status;
            if previous != status {
                if let Some(stored) = state.tasks.get_mut(&task_id) {
                    stored.status = status;
                }
                state
                    .graph
                    .merge_node_data(task_id, json!({ "status": status.as_db_str() }));
                self.events.emit(EngineEvent::TaskStatusChanged {
                    task_id,
                    from: previous,
                    to: status,
                });
            }
            return true;
        }

        self.close_assignment(state, assignment, task, status, performance.sanitized());
        true
    }

    fn close_assignment(
        &self,
        state: &mut EngineState,
        assignment: Assignment,
        mut task: Task,
        status: TaskStatus,
        performance: TaskPerformance,
    ) {
        let success = status == TaskStatus::Completed;
        let primary_id = assignment.agent_id;

        let mut participants = state.contributions.remove(&task.id).unwrap_or_default();
        participants.retain(|p| state.agents.contains_key(&p.agent_id));
        let collaborator_count = participants
            .iter()
            .filter(|p| p.agent_id != primary_id)
            .count();

        // Metrics first, so the reward and the long-term signal see the outcome
        let primary = match state.agents.get_mut(&primary_id) {
            Some(agent) => {
                apply_outcome(&mut agent.performance, success, &performance);
                agent.clone()
            }
            None => return,
        };

        let reward = state
            .rewards
            .calculate_reward(&primary, &task, &performance, collaborator_count);
        self.events.emit(EngineEvent::RewardCalculated {
            agent_id: primary_id,
            task_id: task.id,
            total: reward.total,
            components: reward.components,
        });

        let shares = if collaborator_count > 0 {
            if !participants.iter().any(|p| p.agent_id == primary_id) {
                participants.push(Participant::new(primary_id, 1.0, ParticipantRole::Primary));
            }
            let shares = state
                .credit
                .assign_credit(task.id, reward.total, &participants);
            self.events.emit(EngineEvent::CreditDistributed {
                task_id: task.id,
                total_reward: reward.total,
                shares: shares.clone(),
            });
            shares
        } else {
            vec![CreditShare {
                agent_id: primary_id,
                share: reward.total,
                reason: contribution_reason(ParticipantRole::Primary, 1.0, 1.0),
            }]
        };

        let role_of = |agent_id: AgentId| {
            participants
                .iter()
                .find(|p| p.agent_id == agent_id)
                .map(|p| p.role)
                .unwrap_or(ParticipantRole::Primary)
        };

        for share in &shares {
            let fraction = if reward.total.abs() > f64::EPSILON {
                share.share / reward.total
            } else {
                1.0 / shares.len() as f64
            };
            let Some(recipient) = state.agents.get_mut(&share.agent_id) else {
                continue;
            };

            if success {
                let award = task.xp * fraction;
                if award.is_finite() && award > 0.0 {
                    recipient.xp += award;
                    recipient.tier = self.tiers.tier_for_xp(recipient.xp);
                    let xp_event = state.graph.add_node(
                        Node::new(
                            new_entity_id(),
                            NodeType::XpEvent,
                            json!({
                                "task_id": task.id.to_string(),
                                "agent_id": recipient.id.to_string(),
                                "amount": award,
                            }),
                        )
                        .with_source(NODE_SOURCE),
                    );
                    state.graph.add_edge(
                        recipient.id,
                        xp_event,
                        EdgeType::Earned,
                        1.0,
                        EdgeAttrs::with_context(task.title.clone()),
                    );
                }
            }
            state.graph.merge_node_data(
                recipient.id,
                json!({ "xp": recipient.xp, "tier": recipient.tier.as_db_str() }),
            );

            let action = match role_of(share.agent_id) {
                ParticipantRole::Primary => AgentAction::AcceptTask,
                ParticipantRole::Helper | ParticipantRole::Reviewer => AgentAction::DelegateTask,
            };
            let signal = RewardSignal {
                immediate: share.share,
                long_term: recipient.performance.success_rate,
                feedback: performance.quality,
                collaboration: performance.collaboration,
            };
            let recipient = recipient.clone();
            let composite = state.policy.update_policy(&recipient, action, signal);
            self.events.emit(EngineEvent::PolicyUpdated {
                agent_id: recipient.id,
                action,
                composite_reward: composite,
            });
        }

        if shares.len() > 1 {
            for (i, first) in shares.iter().enumerate() {
                for second in &shares[i + 1..] {
                    let score = state.policy.update_collaboration_score(
                        first.agent_id,
                        second.agent_id,
                        performance.collaboration,
                    );
                    let context = format!("task:{}", task.id);
                    for (a, b) in [
                        (first.agent_id, second.agent_id),
                        (second.agent_id, first.agent_id),
                    ] {
                        state.graph.add_edge(
                            a,
                            b,
                            EdgeType::CollaboratedWith,
                            score,
                            EdgeAttrs::with_context(context.clone()),
                        );
                    }
                }
            }
        }

        for share in &shares {
            if let Some(weights) = state.rewards.update_weights(share.agent_id) {
                self.events.emit(EngineEvent::WeightsUpdated {
                    agent_id: share.agent_id,
                    weights,
                });
            }
        }

        if let Some(agent) = state.agents.get_mut(&primary_id) {
            agent.status = AgentStatus::Idle;
        }
        state
            .graph
            .merge_node_data(primary_id, json!({ "status": AgentStatus::Idle.as_db_str() }));

        let previous = task.status;
        task.status = status;
        state
            .graph
            .merge_node_data(task.id, json!({ "status": status.as_db_str() }));
        state.active.remove(&task.id);
        state.history.push(AssignmentRecord {
            assignment,
            outcome: status,
            reward: reward.total,
            closed_at: Utc::now(),
        });

        info!(
            task_id = %task.id,
            agent_id = %primary_id,
            status = %status,
            reward = reward.total,
            recipients = shares.len(),
            "Task closed"
        );
        self.events.emit(EngineEvent::TaskStatusChanged {
            task_id: task.id,
            from: previous,
            to: status,
        });
        state.tasks.insert(task.id, task);
    }

    // ========================================================================
    // READS
    // ========================================================================

    pub fn get_agent_status(&self, agent_id: AgentId) -> Option<AgentStatus> {
        self.read(|state| state.agents.get(&agent_id).map(|a| a.status))
            .flatten()
    }

    pub fn get_agent(&self, agent_id: AgentId) -> Option<Agent> {
        self.read(|state| state.agents.get(&agent_id).cloned())
            .flatten()
    }

    /// All registered agents, ordered by id.
    pub fn agents(&self) -> Vec<Agent> {
        self.read(|state| state.agents.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn get_agent_metrics(&self, agent_id: AgentId) -> Option<AgentMetrics> {
        self.read(|state| {
            let agent = state.agents.get(&agent_id)?;
            let policy = state.policy.snapshot(agent_id);
            Some(AgentMetrics {
                agent_id,
                tier: agent.tier,
                xp: agent.xp,
                status: agent.status,
                performance: agent.performance.clone(),
                active_assignments: state.active_count(agent_id),
                collaborators: policy
                    .as_ref()
                    .map(|p| p.collaboration_scores.len())
                    .unwrap_or(0),
                policy,
            })
        })
        .flatten()
    }

    pub fn get_tier_requirements(&self, tier: Tier) -> TierRequirements {
        self.tiers.requirements(tier).clone()
    }

    pub fn tier_model(&self) -> &TierModel {
        &self.tiers
    }

    pub fn get_agent_reward_stats(&self, agent_id: AgentId) -> Option<AgentRewardStats> {
        self.read(|state| state.rewards.agent_stats(agent_id))
            .flatten()
    }

    pub fn get_system_reward_stats(&self) -> Option<SystemRewardStats> {
        self.read(|state| state.rewards.system_stats())
    }

    pub fn get_task(&self, task_id: TaskId) -> Option<Task> {
        self.read(|state| state.tasks.get(&task_id).cloned())
            .flatten()
    }

    pub fn active_assignment(&self, task_id: TaskId) -> Option<Assignment> {
        self.read(|state| state.active.get(&task_id).cloned())
            .flatten()
    }

    /// Closed assignments, oldest first.
    pub fn assignment_history(&self) -> Vec<AssignmentRecord> {
        self.read(|state| state.history.clone())
            .unwrap_or_default()
    }

    /// Run `f` against the knowledge graph under the engine lock.
    pub fn with_graph<R>(&self, f: impl FnOnce(&GraphStore) -> R) -> Option<R> {
        self.read(|state| f(&state.graph))
    }

    /// Mutable graph access, for seeding ideas, tools and other context.
    ///
    /// Nodes the coordinator owns (agents, tasks, xp events) should be left
    /// alone; the coordinator does not re-validate them.
    pub fn with_graph_mut<R>(&self, f: impl FnOnce(&mut GraphStore) -> R) -> Option<R> {
        match self.lock() {
            Ok(mut state) => Some(f(&mut state.graph)),
            Err(e) => {
                warn!(error = %e, "Engine state unavailable");
                None
            }
        }
    }
}

fn agent_node_data(agent: &Agent) -> serde_json::Value {
    json!({
        "tier": agent.tier.as_db_str(),
        "xp": agent.xp,
        "status": agent.status.as_db_str(),
        "skills": agent.skills,
        "success_rate": agent.performance.success_rate,
    })
}

fn task_node_data(task: &Task) -> serde_json::Value {
    json!({
        "title": task.title,
        "idea_id": task.idea_id.to_string(),
        "status": task.status.as_db_str(),
        "priority": task.priority,
        "complexity": task.complexity,
        "xp": task.xp,
        "required_skills": task.required_skills,
    })
}
