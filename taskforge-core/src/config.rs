//! Configuration types

use crate::*;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Number of reward components; weight bounds must admit a distribution over them.
pub const REWARD_COMPONENT_COUNT: usize = 6;

/// Policy learning settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Probability of picking a uniformly random action
    pub epsilon: f64,
    /// Parameter learning rate
    pub alpha: f64,
    /// Capacity of the recent-reward ring buffer
    pub reward_history: usize,
    /// Weight kept from the previous collaboration score on update
    pub collaboration_decay: f64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            epsilon: 0.1,
            alpha: 0.01,
            reward_history: 10,
            collaboration_decay: 0.9,
        }
    }
}

/// Reward computation and weight adaptation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardConfig {
    pub initial_exploration_bonus: f64,
    /// Multiplier applied to the bonus each time it is used
    pub exploration_decay: f64,
    pub min_exploration_bonus: f64,
    pub min_weight: f64,
    pub max_weight: f64,
    /// Number of component samples kept per agent
    pub sample_window: usize,
    /// Samples required before weights adapt
    pub min_samples: usize,
    /// Step size of the temporal-difference weight update
    pub weight_learning_rate: f64,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            initial_exploration_bonus: 0.1,
            exploration_decay: 0.995,
            min_exploration_bonus: 0.01,
            min_weight: 0.05,
            max_weight: 0.5,
            sample_window: 100,
            min_samples: 10,
            weight_learning_rate: 0.1,
        }
    }
}

/// Credit apportionment settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditConfig {
    /// Ledger decay applied before each addition
    pub ledger_decay: f64,
    /// Soft floor on a participant's raw share
    pub min_share: f64,
    /// Strength of the historical-contribution bonus
    pub history_factor: f64,
}

impl Default for CreditConfig {
    fn default() -> Self {
        Self {
            ledger_decay: 0.95,
            min_share: 0.1,
            history_factor: 0.1,
        }
    }
}

/// Matching settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentConfig {
    /// Minimum utility margin for a winner to count as stable
    pub stability_threshold: f64,
    /// Completion time (minutes) that normalizes to 1.0 in the performance factor
    pub reference_completion_time: f64,
}

impl Default for AssignmentConfig {
    fn default() -> Self {
        Self {
            stability_threshold: 0.1,
            reference_completion_time: 240.0,
        }
    }
}

/// Master configuration struct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Name attached to the coordinator's tracing span
    pub service_name: String,
    /// Enables debug-level logging in the simulation binary
    pub debug: bool,
    /// Seed for the exploration RNG; OS entropy when `None`
    pub seed: Option<u64>,
    /// Buffered events per broadcast receiver
    pub event_capacity: usize,
    pub policy: PolicyConfig,
    pub reward: RewardConfig,
    pub credit: CreditConfig,
    pub assignment: AssignmentConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            service_name: "taskforge".to_string(),
            debug: false,
            seed: None,
            event_capacity: 1024,
            policy: PolicyConfig::default(),
            reward: RewardConfig::default(),
            credit: CreditConfig::default(),
            assignment: AssignmentConfig::default(),
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn invalid(field: &str, value: impl ToString, reason: &str) -> EngineError {
    EngineError::Config(ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    })
}

impl EngineConfig {
    /// Deterministic configuration for tests and simulations.
    pub fn seeded(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..Self::default()
        }
    }

    /// Create from environment variables with fallback to defaults.
    ///
    /// Environment variables:
    /// - `TASKFORGE_SERVICE_NAME` (default: taskforge)
    /// - `TASKFORGE_DEBUG`: `true`/`1` enables debug logging
    /// - `TASKFORGE_SEED`: exploration RNG seed
    /// - `TASKFORGE_EVENT_CAPACITY` (default: 1024)
    /// - `TASKFORGE_EPSILON` (default: 0.1)
    /// - `TASKFORGE_ALPHA` (default: 0.01)
    /// - `TASKFORGE_EXPLORATION_BONUS` (default: 0.1)
    /// - `TASKFORGE_EXPLORATION_DECAY` (default: 0.995)
    /// - `TASKFORGE_LEDGER_DECAY` (default: 0.95)
    /// - `TASKFORGE_STABILITY_THRESHOLD` (default: 0.1)
    /// - `TASKFORGE_REFERENCE_COMPLETION_TIME` (default: 240)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            service_name: std::env::var("TASKFORGE_SERVICE_NAME")
                .unwrap_or(defaults.service_name),
            debug: std::env::var("TASKFORGE_DEBUG")
                .map(|s| s.eq_ignore_ascii_case("true") || s == "1")
                .unwrap_or(defaults.debug),
            seed: std::env::var("TASKFORGE_SEED")
                .ok()
                .and_then(|s| s.trim().parse().ok()),
            event_capacity: env_or("TASKFORGE_EVENT_CAPACITY", defaults.event_capacity),
            policy: PolicyConfig {
                epsilon: env_or("TASKFORGE_EPSILON", defaults.policy.epsilon),
                alpha: env_or("TASKFORGE_ALPHA", defaults.policy.alpha),
                ..defaults.policy
            },
            reward: RewardConfig {
                initial_exploration_bonus: env_or(
                    "TASKFORGE_EXPLORATION_BONUS",
                    defaults.reward.initial_exploration_bonus,
                ),
                exploration_decay: env_or(
                    "TASKFORGE_EXPLORATION_DECAY",
                    defaults.reward.exploration_decay,
                ),
                ..defaults.reward
            },
            credit: CreditConfig {
                ledger_decay: env_or("TASKFORGE_LEDGER_DECAY", defaults.credit.ledger_decay),
                ..defaults.credit
            },
            assignment: AssignmentConfig {
                stability_threshold: env_or(
                    "TASKFORGE_STABILITY_THRESHOLD",
                    defaults.assignment.stability_threshold,
                ),
                reference_completion_time: env_or(
                    "TASKFORGE_REFERENCE_COMPLETION_TIME",
                    defaults.assignment.reference_completion_time,
                ),
            },
        }
    }

    /// Validate the configuration.
    /// Returns Ok(()) if valid, Err(EngineError::Config) if invalid.
    pub fn validate(&self) -> EngineResult<()> {
        if self.service_name.trim().is_empty() {
            return Err(EngineError::Config(ConfigError::MissingRequired {
                field: "service_name".to_string(),
            }));
        }

        if self.event_capacity == 0 {
            return Err(invalid("event_capacity", 0, "event_capacity must be positive"));
        }

        let policy = &self.policy;
        if !(0.0..=1.0).contains(&policy.epsilon) {
            return Err(invalid(
                "policy.epsilon",
                policy.epsilon,
                "epsilon must be between 0.0 and 1.0",
            ));
        }
        if !(policy.alpha > 0.0 && policy.alpha <= 1.0) {
            return Err(invalid(
                "policy.alpha",
                policy.alpha,
                "alpha must be in (0.0, 1.0]",
            ));
        }
        if policy.reward_history == 0 {
            return Err(invalid(
                "policy.reward_history",
                0,
                "reward_history must be positive",
            ));
        }
        if !(0.0..1.0).contains(&policy.collaboration_decay) {
            return Err(invalid(
                "policy.collaboration_decay",
                policy.collaboration_decay,
                "collaboration_decay must be in [0.0, 1.0)",
            ));
        }

        let reward = &self.reward;
        if !(reward.min_weight > 0.0 && reward.min_weight < reward.max_weight) {
            return Err(invalid(
                "reward.min_weight",
                reward.min_weight,
                "min_weight must be positive and below max_weight",
            ));
        }
        let n = REWARD_COMPONENT_COUNT as f64;
        if reward.min_weight * n > 1.0 || reward.max_weight * n < 1.0 {
            return Err(invalid(
                "reward.max_weight",
                reward.max_weight,
                "weight bounds must admit weights summing to 1",
            ));
        }
        if reward.min_samples == 0 || reward.sample_window < reward.min_samples {
            return Err(invalid(
                "reward.sample_window",
                reward.sample_window,
                "sample_window must be at least min_samples, which must be positive",
            ));
        }
        if !(reward.exploration_decay > 0.0 && reward.exploration_decay <= 1.0) {
            return Err(invalid(
                "reward.exploration_decay",
                reward.exploration_decay,
                "exploration_decay must be in (0.0, 1.0]",
            ));
        }
        if reward.min_exploration_bonus < 0.0
            || reward.initial_exploration_bonus < reward.min_exploration_bonus
        {
            return Err(invalid(
                "reward.initial_exploration_bonus",
                reward.initial_exploration_bonus,
                "initial bonus must be non-negative and at least the floor",
            ));
        }
        if !(reward.weight_learning_rate > 0.0 && reward.weight_learning_rate <= 1.0) {
            return Err(invalid(
                "reward.weight_learning_rate",
                reward.weight_learning_rate,
                "weight_learning_rate must be in (0.0, 1.0]",
            ));
        }

        let credit = &self.credit;
        if !(credit.ledger_decay > 0.0 && credit.ledger_decay <= 1.0) {
            return Err(invalid(
                "credit.ledger_decay",
                credit.ledger_decay,
                "ledger_decay must be in (0.0, 1.0]",
            ));
        }
        if !(0.0..1.0).contains(&credit.min_share) {
            return Err(invalid(
                "credit.min_share",
                credit.min_share,
                "min_share must be in [0.0, 1.0)",
            ));
        }
        if credit.history_factor < 0.0 {
            return Err(invalid(
                "credit.history_factor",
                credit.history_factor,
                "history_factor must be non-negative",
            ));
        }

        if self.assignment.reference_completion_time <= 0.0 {
            return Err(invalid(
                "assignment.reference_completion_time",
                self.assignment.reference_completion_time,
                "reference_completion_time must be positive",
            ));
        }
        if self.assignment.stability_threshold < 0.0 {
            return Err(invalid(
                "assignment.stability_threshold",
                self.assignment.stability_threshold,
                "stability_threshold must be non-negative",
            ));
        }

        Ok(())
    }
}
