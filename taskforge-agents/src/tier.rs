//! Capability tiers

use serde::{Deserialize, Serialize};
use taskforge_core::{Agent, AutonomyLevel, Task, Tier};

/// Complexity above which a task needs a high-level agent.
pub const HIGH_COMPLEXITY: f64 = 0.7;
/// Complexity above which a task needs at least a mid-level agent.
pub const MID_COMPLEXITY: f64 = 0.4;

/// What a tier demands and grants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct TierRequirements {
    pub tier: Tier,
    /// Experience needed to qualify
    pub min_xp: f64,
    pub autonomy: AutonomyLevel,
    pub responsibilities: Vec<String>,
}

/// Static tier table.
#[derive(Debug, Clone, PartialEq)]
pub struct TierModel {
    /// Ordered from least to most demanding
    tiers: [TierRequirements; 3],
}

impl Default for TierModel {
    fn default() -> Self {
        fn duties(items: &[&str]) -> Vec<String> {
            items.iter().map(|s| s.to_string()).collect()
        }

        Self {
            tiers: [
                TierRequirements {
                    tier: Tier::LowLevel,
                    min_xp: 0.0,
                    autonomy: AutonomyLevel::Supervised,
                    responsibilities: duties(&["task_execution", "basic_reporting"]),
                },
                TierRequirements {
                    tier: Tier::MidLevel,
                    min_xp: 1000.0,
                    autonomy: AutonomyLevel::Guided,
                    responsibilities: duties(&[
                        "task_execution",
                        "task_planning",
                        "peer_review",
                    ]),
                },
                TierRequirements {
                    tier: Tier::HighLevel,
                    min_xp: 5000.0,
                    autonomy: AutonomyLevel::Autonomous,
                    responsibilities: duties(&[
                        "task_execution",
                        "task_planning",
                        "peer_review",
                        "delegation",
                        "mentoring",
                    ]),
                },
            ],
        }
    }
}

impl TierModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tier a task's complexity calls for.
    pub fn required_tier(&self, task: &Task) -> Tier {
        if task.complexity > HIGH_COMPLEXITY {
            Tier::HighLevel
        } else if task.complexity > MID_COMPLEXITY {
            Tier::MidLevel
        } else {
            Tier::LowLevel
        }
    }

    /// Whether the agent has enough experience for `tier`.
    pub fn is_qualified(&self, agent: &Agent, tier: Tier) -> bool {
        agent.xp >= self.requirements(tier).min_xp
    }

    /// Highest tier `xp` qualifies for.
    pub fn tier_for_xp(&self, xp: f64) -> Tier {
        self.tiers
            .iter()
            .rev()
            .find(|req| xp >= req.min_xp)
            .map(|req| req.tier)
            .unwrap_or(Tier::LowLevel)
    }

    pub fn requirements(&self, tier: Tier) -> &TierRequirements {
        match tier {
            Tier::LowLevel => &self.tiers[0],
            Tier::MidLevel => &self.tiers[1],
            Tier::HighLevel => &self.tiers[2],
        }
    }

    pub fn all(&self) -> &[TierRequirements] {
        &self.tiers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskforge_core::new_entity_id;

    fn task(complexity: f64) -> Task {
        Task::new(new_entity_id(), "t").with_complexity(complexity)
    }

    #[test]
    fn test_required_tier_boundaries() {
        let model = TierModel::new();
        assert_eq!(model.required_tier(&task(0.2)), Tier::LowLevel);
        assert_eq!(model.required_tier(&task(0.4)), Tier::LowLevel);
        assert_eq!(model.required_tier(&task(0.41)), Tier::MidLevel);
        assert_eq!(model.required_tier(&task(0.7)), Tier::MidLevel);
        assert_eq!(model.required_tier(&task(0.9)), Tier::HighLevel);
    }

    #[test]
    fn test_qualification_by_xp() {
        let model = TierModel::new();
        let junior = Agent::new(["rust"]).with_xp(999.0);
        let senior = Agent::new(["rust"]).with_xp(5000.0);
        assert!(model.is_qualified(&junior, Tier::LowLevel));
        assert!(!model.is_qualified(&junior, Tier::MidLevel));
        assert!(model.is_qualified(&senior, Tier::HighLevel));
    }

    #[test]
    fn test_tier_for_xp() {
        let model = TierModel::new();
        assert_eq!(model.tier_for_xp(0.0), Tier::LowLevel);
        assert_eq!(model.tier_for_xp(1000.0), Tier::MidLevel);
        assert_eq!(model.tier_for_xp(4999.9), Tier::MidLevel);
        assert_eq!(model.tier_for_xp(12000.0), Tier::HighLevel);
    }

    #[test]
    fn test_requirements_table() {
        let model = TierModel::new();
        let high = model.requirements(Tier::HighLevel);
        assert_eq!(high.min_xp, 5000.0);
        assert_eq!(high.autonomy, AutonomyLevel::Autonomous);
        assert_eq!(model.all().len(), 3);
    }
}
