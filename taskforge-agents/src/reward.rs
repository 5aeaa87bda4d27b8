//! Multi-component task rewards with adaptive per-agent weights
//!
//! A task outcome is scored on six components. Each agent weighs them with
//! its own weight vector, which drifts toward the components the agent has
//! recently scored well on. Weights are kept inside `[min_weight, max_weight]`
//! and always sum to one.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use taskforge_core::{
    Agent, AgentId, RewardComponents, RewardConfig, Task, TaskPerformance, REWARD_COMPONENT_COUNT,
};
use tracing::debug;

/// Trust placed in each component when blending the total.
pub const COMPONENT_CONFIDENCE: RewardComponents = RewardComponents {
    completion: 0.95,
    quality: 0.9,
    efficiency: 0.85,
    collaboration: 0.8,
    innovation: 0.7,
    learning: 0.75,
};

/// Result of scoring one task outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardBreakdown {
    pub total: f64,
    pub components: RewardComponents,
    /// Exploration bonus applied to this reward
    pub exploration_bonus: f64,
}

#[derive(Debug, Clone)]
struct AgentRewardState {
    weights: RewardComponents,
    exploration_bonus: f64,
    samples: VecDeque<RewardComponents>,
    rewards_calculated: u64,
    total_reward: f64,
    weight_updates: u64,
}

/// Reward history and weights of one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AgentRewardStats {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub agent_id: AgentId,
    pub weights: RewardComponents,
    pub exploration_bonus: f64,
    pub sample_count: usize,
    /// Mean of the stored component samples
    pub average_components: Option<RewardComponents>,
    pub rewards_calculated: u64,
    pub total_reward: f64,
    pub average_reward: f64,
    pub weight_updates: u64,
}

/// Aggregate reward statistics across agents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SystemRewardStats {
    pub agent_count: usize,
    pub rewards_calculated: u64,
    pub total_reward: f64,
    pub average_reward: f64,
    /// Mean weight vector (equal weights with no agents)
    pub average_weights: RewardComponents,
    pub average_exploration_bonus: f64,
}

/// Per-agent reward computation and weight adaptation.
#[derive(Debug, Clone)]
pub struct RewardEngine {
    config: RewardConfig,
    agents: HashMap<AgentId, AgentRewardState>,
}

impl RewardEngine {
    pub fn new(config: RewardConfig) -> Self {
        Self {
            config,
            agents: HashMap::new(),
        }
    }

    pub fn config(&self) -> &RewardConfig {
        &self.config
    }

    /// Start tracking an agent with equal weights. No-op if already tracked.
    pub fn register_agent(&mut self, agent_id: AgentId) {
        let config = &self.config;
        self.agents
            .entry(agent_id)
            .or_insert_with(|| Self::fresh_state(config));
    }

    pub fn remove_agent(&mut self, agent_id: AgentId) -> bool {
        self.agents.remove(&agent_id).is_some()
    }

    pub fn weights(&self, agent_id: AgentId) -> Option<RewardComponents> {
        self.agents.get(&agent_id).map(|s| s.weights)
    }

    /// Raw component values for an outcome, before weighting.
    pub fn components(
        agent: &Agent,
        task: &Task,
        performance: &TaskPerformance,
        collaborator_count: usize,
    ) -> RewardComponents {
        let perf = performance.sanitized();
        let ratio = task.time_ratio(perf.completion_time);

        RewardComponents {
            completion: 1.0 + (1.0 - ratio).max(0.0),
            quality: perf.quality * perf.quality,
            efficiency: 2.0 / (1.0 + (ratio - 1.0).exp()) - 1.0,
            collaboration: perf.collaboration * (1.0 + (collaborator_count as f64 + 1.0).ln()),
            innovation: perf.innovation * (1.0 + task.complexity),
            learning: 0.5 * agent.missing_skills(&task.required_skills).len() as f64,
        }
        .sanitized()
    }

    /// Score an outcome for `agent`, store the component sample and decay the
    /// agent's exploration bonus.
    pub fn calculate_reward(
        &mut self,
        agent: &Agent,
        task: &Task,
        performance: &TaskPerformance,
        collaborator_count: usize,
    ) -> RewardBreakdown {
        let components = Self::components(agent, task, performance, collaborator_count);
        let config = &self.config;
        let state = self
            .agents
            .entry(agent.id)
            .or_insert_with(|| Self::fresh_state(config));

        let weights = state.weights.to_array();
        let confidence = COMPONENT_CONFIDENCE.to_array();
        let weighted: f64 = components
            .to_array()
            .iter()
            .enumerate()
            .map(|(i, c)| weights[i] * confidence[i] * c)
            .sum();

        let bonus = state.exploration_bonus;
        let total = weighted * (1.0 + bonus);
        state.exploration_bonus =
            (bonus * config.exploration_decay).max(config.min_exploration_bonus);

        state.samples.push_back(components);
        while state.samples.len() > config.sample_window {
            state.samples.pop_front();
        }
        state.rewards_calculated += 1;
        state.total_reward += total;

        debug!(
            agent_id = %agent.id,
            task_id = %task.id,
            total,
            exploration_bonus = bonus,
            "Reward calculated"
        );

        RewardBreakdown {
            total,
            components,
            exploration_bonus: bonus,
        }
    }

    /// Store an externally computed component observation.
    pub fn record_sample(&mut self, agent_id: AgentId, components: RewardComponents) {
        let config = &self.config;
        let state = self
            .agents
            .entry(agent_id)
            .or_insert_with(|| Self::fresh_state(config));
        state.samples.push_back(components.sanitized());
        while state.samples.len() > config.sample_window {
            state.samples.pop_front();
        }
    }

    /// Move the agent's weights toward its average component values.
    ///
    /// Returns the new weights, or `None` if the agent is unknown or has
    /// fewer than `min_samples` samples.
    pub fn update_weights(&mut self, agent_id: AgentId) -> Option<RewardComponents> {
        let config = &self.config;
        let state = self.agents.get_mut(&agent_id)?;
        if state.samples.len() < config.min_samples {
            return None;
        }

        let average = average_components(&state.samples)?.to_array();
        let mut weights = state.weights.to_array();
        for (w, avg) in weights.iter_mut().zip(average) {
            *w += config.weight_learning_rate * (avg - *w);
        }
        let projected = project_weights(weights, config.min_weight, config.max_weight);

        state.weights = RewardComponents::from_array(projected);
        state.weight_updates += 1;
        debug!(agent_id = %agent_id, weights = ?projected, "Reward weights updated");
        Some(state.weights)
    }

    pub fn agent_stats(&self, agent_id: AgentId) -> Option<AgentRewardStats> {
        let state = self.agents.get(&agent_id)?;
        Some(AgentRewardStats {
            agent_id,
            weights: state.weights,
            exploration_bonus: state.exploration_bonus,
            sample_count: state.samples.len(),
            average_components: average_components(&state.samples),
            rewards_calculated: state.rewards_calculated,
            total_reward: state.total_reward,
            average_reward: if state.rewards_calculated == 0 {
                0.0
            } else {
                state.total_reward / state.rewards_calculated as f64
            },
            weight_updates: state.weight_updates,
        })
    }

    pub fn system_stats(&self) -> SystemRewardStats {
        let agent_count = self.agents.len();
        let rewards_calculated: u64 = self.agents.values().map(|s| s.rewards_calculated).sum();
        let total_reward: f64 = self.agents.values().map(|s| s.total_reward).sum();

        let (average_weights, average_exploration_bonus) = if agent_count == 0 {
            (
                RewardComponents::splat(1.0 / REWARD_COMPONENT_COUNT as f64),
                self.config.initial_exploration_bonus,
            )
        } else {
            let mut sums = [0.0; REWARD_COMPONENT_COUNT];
            for state in self.agents.values() {
                for (sum, w) in sums.iter_mut().zip(state.weights.to_array()) {
                    *sum += w;
                }
            }
            let bonus: f64 = self.agents.values().map(|s| s.exploration_bonus).sum();
            (
                RewardComponents::from_array(sums.map(|s| s / agent_count as f64)),
                bonus / agent_count as f64,
            )
        };

        SystemRewardStats {
            agent_count,
            rewards_calculated,
            total_reward,
            average_reward: if rewards_calculated == 0 {
                0.0
            } else {
                total_reward / rewards_calculated as f64
            },
            average_weights,
            average_exploration_bonus,
        }
    }

    fn fresh_state(config: &RewardConfig) -> AgentRewardState {
        AgentRewardState {
            weights: RewardComponents::splat(1.0 / REWARD_COMPONENT_COUNT as f64),
            exploration_bonus: config.initial_exploration_bonus,
            samples: VecDeque::new(),
            rewards_calculated: 0,
            total_reward: 0.0,
            weight_updates: 0,
        }
    }
}

fn average_components(samples: &VecDeque<RewardComponents>) -> Option<RewardComponents> {
    if samples.is_empty() {
        return None;
    }
    let mut sums = [0.0; REWARD_COMPONENT_COUNT];
    for sample in samples {
        for (sum, c) in sums.iter_mut().zip(sample.to_array()) {
            *sum += c;
        }
    }
    Some(RewardComponents::from_array(
        sums.map(|s| s / samples.len() as f64),
    ))
}

/// Project weights onto `{w : Σw = 1, min ≤ w_i ≤ max}`.
///
/// Finds the shift `τ` with `Σ clamp(w_i + τ, min, max) = 1` by bisection,
/// which moves every unclamped weight by the same amount. Requires
/// `n·min ≤ 1 ≤ n·max`.
pub fn project_weights(
    weights: [f64; REWARD_COMPONENT_COUNT],
    min: f64,
    max: f64,
) -> [f64; REWARD_COMPONENT_COUNT] {
    let weights = weights.map(|w| if w.is_finite() { w } else { min });
    let shifted = |tau: f64| weights.map(|w| (w + tau).clamp(min, max));
    let total = |tau: f64| shifted(tau).iter().sum::<f64>();

    let highest = weights.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let lowest = weights.iter().copied().fold(f64::INFINITY, f64::min);
    // total(lo) = n·min and total(hi) = n·max bracket the target
    let mut lo = min - highest;
    let mut hi = max - lowest;
    for _ in 0..200 {
        let mid = 0.5 * (lo + hi);
        if total(mid) < 1.0 {
            lo = mid;
        } else {
            hi = mid;
        }
    }

    let mut projected = shifted(0.5 * (lo + hi));
    // Hand the rounding residue to a weight with room to absorb it
    let residue = 1.0 - projected.iter().sum::<f64>();
    if let Some(w) = projected
        .iter_mut()
        .find(|w| **w + residue >= min && **w + residue <= max)
    {
        *w += residue;
    }
    projected
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;
    use taskforge_core::new_entity_id;

    fn components() -> impl Strategy<Value = RewardComponents> {
        prop::array::uniform6(-2.0f64..5.0).prop_map(RewardComponents::from_array)
    }

    proptest! {
        #[test]
        fn prop_weights_bounded_and_normalized(
            samples in prop::collection::vec(components(), 10..60),
        ) {
            let mut engine = RewardEngine::new(RewardConfig::default());
            let agent_id = new_entity_id();
            for sample in samples {
                engine.record_sample(agent_id, sample);
                if let Some(weights) = engine.update_weights(agent_id) {
                    prop_assert!((weights.sum() - 1.0).abs() < 1e-9);
                    for w in weights.to_array() {
                        prop_assert!((0.05 - 1e-12..=0.5 + 1e-12).contains(&w));
                    }
                }
            }
        }
    }
}
