//! Assignment Simulation Binary
//!
//! Runs a seeded simulation of an agent pool working through a backlog and
//! prints the final reward statistics as JSON to stdout. Engine events are
//! logged as JSON lines on stderr.
//!
//! Usage:
//!   TASKFORGE_SEED=7 cargo run -p taskforge-agents --bin taskforge-simulate --features simulate
//!
//! Optional arguments: `<rounds> <agents>` (defaults: 20 rounds, 6 agents).

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use taskforge_agents::{AssignmentCoordinator, TracingSink};
use taskforge_core::{
    new_entity_id, Agent, EngineConfig, Node, NodeType, Participant, ParticipantRole, Task,
    TaskPerformance, TaskStatus,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const SKILLS: [&str; 6] = ["rust", "sql", "frontend", "ops", "ml", "writing"];
const DEFAULT_SEED: u64 = 42;

fn init_tracing(debug: bool) -> Result<(), String> {
    let default_filter = if debug { "taskforge=debug" } else { "taskforge=info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
        .try_init()
        .map_err(|e| format!("Failed to init subscriber: {}", e))
}

fn arg_or(index: usize, default: usize) -> usize {
    std::env::args()
        .nth(index)
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn main() {
    let mut config = EngineConfig::from_env();
    let seed = *config.seed.get_or_insert(DEFAULT_SEED);

    if let Err(e) = init_tracing(config.debug) {
        eprintln!("{}", e);
        std::process::exit(1);
    }

    let rounds = arg_or(1, 20);
    let agent_count = arg_or(2, 6).max(1);

    let coordinator = match AssignmentCoordinator::new(config) {
        Ok(coordinator) => coordinator.with_event_sink(Arc::new(TracingSink)),
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };
    let mut rng = StdRng::seed_from_u64(seed.wrapping_add(1));

    let mut agent_ids = Vec::with_capacity(agent_count);
    for i in 0..agent_count {
        let skills = [SKILLS[i % SKILLS.len()], SKILLS[(i * 3 + 1) % SKILLS.len()]];
        let xp = [0.0, 1500.0, 6000.0][i % 3];
        let agent = Agent::new(skills).with_xp(xp);
        agent_ids.push(agent.id);
        coordinator.register_agent(agent);
    }

    let idea_id = new_entity_id();
    coordinator.with_graph_mut(|graph| {
        graph.add_node(Node::new(
            idea_id,
            NodeType::Idea,
            serde_json::json!({ "title": "simulated backlog" }),
        ))
    });

    let mut assigned = 0usize;
    for round in 0..rounds {
        let mut task = Task::new(idea_id, format!("task-{}", round))
            .with_complexity(rng.random_range(0.0..1.0))
            .with_required_skills([
                SKILLS[rng.random_range(0..SKILLS.len())],
                SKILLS[rng.random_range(0..SKILLS.len())],
            ])
            .with_xp(rng.random_range(10.0..60.0))
            .with_estimated_time(60.0);

        if !coordinator.assign_task(&mut task) {
            continue;
        }
        assigned += 1;

        if rng.random_bool(0.4) {
            let helper = agent_ids[rng.random_range(0..agent_ids.len())];
            if Some(helper) != task.assigned_agent_id {
                coordinator.record_contribution(
                    task.id,
                    Participant::new(helper, rng.random_range(0.1..0.5), ParticipantRole::Helper),
                );
            }
        }

        let status = if rng.random_bool(0.8) {
            TaskStatus::Completed
        } else {
            TaskStatus::Failed
        };
        let performance =
            TaskPerformance::new(rng.random_range(20.0..120.0), rng.random_range(0.3..1.0))
                .with_collaboration(rng.random_range(0.0..1.0))
                .with_innovation(rng.random_range(0.0..1.0));
        coordinator.update_task_status(task.id, status, performance);
    }

    tracing::info!(rounds, assigned, agents = agent_count, seed, "Simulation finished");

    let summary = serde_json::json!({
        "rounds": rounds,
        "assigned": assigned,
        "system": coordinator.get_system_reward_stats(),
        "agents": coordinator.agents(),
    });
    match serde_json::to_string_pretty(&summary) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Failed to serialize summary: {}", e);
            std::process::exit(1);
        }
    }
}
