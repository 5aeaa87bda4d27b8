//! Splitting task rewards among collaborators

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use taskforge_core::{AgentId, CreditConfig, CreditShare, Participant, ParticipantRole, TaskId};
use tracing::debug;

/// Divides a task's reward by contribution, role and contribution history.
#[derive(Debug, Clone)]
pub struct CreditApportioner {
    config: CreditConfig,
    /// Decayed accumulated contribution per task and agent
    ledgers: HashMap<TaskId, BTreeMap<AgentId, f64>>,
}

impl CreditApportioner {
    pub fn new(config: CreditConfig) -> Self {
        Self {
            config,
            ledgers: HashMap::new(),
        }
    }

    /// Split `total_reward` among `participants`.
    ///
    /// Shares always sum to `total_reward`. Duplicate agent ids are merged
    /// (contributions summed, highest-credit role kept). An empty participant
    /// list yields no shares.
    pub fn assign_credit(
        &mut self,
        task_id: TaskId,
        total_reward: f64,
        participants: &[Participant],
    ) -> Vec<CreditShare> {
        let total_reward = if total_reward.is_finite() {
            total_reward
        } else {
            0.0
        };
        let mut merged = merge_participants(participants);
        if merged.is_empty() {
            return Vec::new();
        }

        merged.sort_by(|a, b| {
            b.contribution
                .partial_cmp(&a.contribution)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.agent_id.cmp(&b.agent_id))
        });

        let count = merged.len();
        let total_contribution: f64 = merged.iter().map(|p| p.contribution).sum();
        let mut remaining = 1.0;
        let mut raw = Vec::with_capacity(count);
        for (i, participant) in merged.iter().enumerate() {
            let portion = if total_contribution <= 0.0 {
                1.0 / count as f64
            } else if i + 1 == count {
                remaining
            } else {
                remaining * (participant.contribution / total_contribution)
            };
            remaining -= portion;
            raw.push(portion.max(self.config.min_share));
        }

        let ledger = self.ledgers.entry(task_id).or_default();
        for value in ledger.values_mut() {
            *value *= self.config.ledger_decay;
        }
        for participant in &merged {
            *ledger.entry(participant.agent_id).or_insert(0.0) += participant.contribution;
        }

        let weighted: Vec<f64> = merged
            .iter()
            .zip(&raw)
            .map(|(participant, portion)| {
                let historical = ledger.get(&participant.agent_id).copied().unwrap_or(0.0);
                portion
                    * participant.role.credit_multiplier()
                    * (1.0 + self.config.history_factor * (1.0 + historical).ln())
            })
            .collect();

        let weight_sum: f64 = weighted.iter().sum();
        let fractions: Vec<f64> = if weight_sum > 0.0 && weight_sum.is_finite() {
            weighted.iter().map(|w| w / weight_sum).collect()
        } else {
            vec![1.0 / count as f64; count]
        };

        let mut shares: Vec<CreditShare> = merged
            .iter()
            .zip(&fractions)
            .map(|(participant, fraction)| {
                let contributed = if total_contribution > 0.0 {
                    participant.contribution / total_contribution
                } else {
                    1.0 / count as f64
                };
                CreditShare {
                    agent_id: participant.agent_id,
                    share: total_reward * fraction,
                    reason: contribution_reason(participant.role, contributed, *fraction),
                }
            })
            .collect();

        // Absorb rounding drift so the shares add up exactly
        let drift = total_reward - shares.iter().map(|s| s.share).sum::<f64>();
        if let Some(first) = shares.first_mut() {
            first.share += drift;
        }

        debug!(
            task_id = %task_id,
            total_reward,
            participants = count,
            "Credit assigned"
        );
        shares
    }

    /// Decayed contribution history for a task.
    pub fn ledger(&self, task_id: TaskId) -> Option<&BTreeMap<AgentId, f64>> {
        self.ledgers.get(&task_id)
    }

    /// Drop an agent from every ledger.
    pub fn remove_agent(&mut self, agent_id: AgentId) {
        for ledger in self.ledgers.values_mut() {
            ledger.remove(&agent_id);
        }
    }
}

/// `"<role> contributor (<contribution>% of contribution, <reward>% of reward)"`
pub(crate) fn contribution_reason(
    role: ParticipantRole,
    contributed: f64,
    rewarded: f64,
) -> String {
    format!(
        "{} contributor ({:.1}% of contribution, {:.1}% of reward)",
        role,
        contributed * 100.0,
        rewarded * 100.0
    )
}

fn merge_participants(participants: &[Participant]) -> Vec<Participant> {
    let mut merged: Vec<Participant> = Vec::with_capacity(participants.len());
    for participant in participants {
        let incoming = Participant::new(
            participant.agent_id,
            participant.contribution,
            participant.role,
        );
        match merged.iter_mut().find(|p| p.agent_id == incoming.agent_id) {
            Some(existing) => {
                existing.contribution += incoming.contribution;
                if incoming.role.credit_multiplier() > existing.role.credit_multiplier() {
                    existing.role = incoming.role;
                }
            }
            None => merged.push(incoming),
        }
    }
    merged
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;
    use taskforge_core::{new_entity_id, ParticipantRole};

    fn role() -> impl Strategy<Value = ParticipantRole> {
        prop::sample::select(vec![
            ParticipantRole::Primary,
            ParticipantRole::Helper,
            ParticipantRole::Reviewer,
        ])
    }

    proptest! {
        #[test]
        fn prop_shares_sum_to_total(
            total_reward in -100.0f64..1000.0,
            entries in prop::collection::vec((0.0f64..50.0, role()), 1..12),
        ) {
            let participants: Vec<Participant> = entries
                .into_iter()
                .map(|(c, r)| Participant::new(new_entity_id(), c, r))
                .collect();
            let mut credit = CreditApportioner::new(CreditConfig::default());
            let shares = credit.assign_credit(new_entity_id(), total_reward, &participants);
            let sum: f64 = shares.iter().map(|s| s.share).sum();
            prop_assert_eq!(shares.len(), participants.len());
            prop_assert!((sum - total_reward).abs() < 1e-6);
        }
    }
}
