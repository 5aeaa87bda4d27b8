//! Assignment flow through the public coordinator API.

use std::sync::Arc;
use std::thread;
use taskforge_agents::{
    AssignmentCoordinator, AssignmentFailure, CollectingSink, EngineEvent, SignalSource,
};
use taskforge_core::{
    named_node_id, AgentStatus, AssignmentStatus, EdgeType, NodeType, Task, TaskSignal,
    TaskStatus, Tier,
};
use taskforge_test_utils::{assertions::assert_config_error, fixtures};

fn coordinator() -> (AssignmentCoordinator, Arc<CollectingSink>) {
    let sink = Arc::new(CollectingSink::new());
    let coordinator = AssignmentCoordinator::new(fixtures::deterministic_config())
        .expect("valid config")
        .with_event_sink(sink.clone());
    (coordinator, sink)
}

fn last_failure(sink: &CollectingSink) -> Option<AssignmentFailure> {
    sink.events().into_iter().rev().find_map(|event| match event {
        EngineEvent::AssignmentFailed { reason, .. } => Some(reason),
        _ => None,
    })
}

#[test]
fn test_invalid_config_rejected() {
    let mut config = fixtures::deterministic_config();
    config.policy.epsilon = 2.0;
    assert_config_error(&AssignmentCoordinator::new(config));
}

#[test]
fn test_idle_novice_takes_simple_task() {
    let (coordinator, sink) = coordinator();
    let agent = fixtures::agent(Vec::<String>::new(), 0.0);
    let agent_id = agent.id;
    assert!(coordinator.register_agent(agent));

    let mut task = fixtures::task(fixtures::idea_node("idea").id, Vec::<String>::new(), 0.2);
    assert!(coordinator.assign_task(&mut task));

    assert_eq!(task.status, TaskStatus::Active);
    assert_eq!(task.assigned_agent_id, Some(agent_id));
    assert_eq!(coordinator.get_agent_status(agent_id), Some(AgentStatus::Busy));
    assert_eq!(coordinator.get_task(task.id), Some(task.clone()));

    let assignment = coordinator.active_assignment(task.id).expect("active assignment");
    assert_eq!(assignment.agent_id, agent_id);
    assert_eq!(assignment.status, AssignmentStatus::Accepted);

    assert_eq!(
        sink.event_types(),
        vec!["AgentRegistered", "TaskStatusChanged", "AssignmentSucceeded"]
    );
}

#[test]
fn test_complex_task_without_senior_agent_stays_pending() {
    let (coordinator, sink) = coordinator();
    coordinator.register_agent(fixtures::agent(["rust"], 0.0));
    coordinator.register_agent(fixtures::agent(["rust"], 1500.0));

    let mut task = fixtures::task(fixtures::idea_node("idea").id, ["rust"], 0.9);
    assert!(!coordinator.assign_task(&mut task));

    assert_eq!(task.status, TaskStatus::Pending);
    assert_eq!(task.assigned_agent_id, None);
    assert!(coordinator.active_assignment(task.id).is_none());
    assert_eq!(
        last_failure(&sink),
        Some(AssignmentFailure::NoEligibleAgents {
            tier: Tier::HighLevel
        })
    );
}

#[test]
fn test_only_qualified_tier_is_assigned() {
    let (coordinator, _) = coordinator();
    let novice = fixtures::agent(["rust"], 0.0);
    let senior = fixtures::agent(["rust"], 6000.0);
    let senior_id = senior.id;
    coordinator.register_agent(novice);
    coordinator.register_agent(senior);

    let mut task = fixtures::task(fixtures::idea_node("idea").id, ["rust"], 0.8);
    assert!(coordinator.assign_task(&mut task));
    assert_eq!(task.assigned_agent_id, Some(senior_id));

    let senior = coordinator.get_agent(senior_id).expect("registered");
    assert_eq!(senior.tier, Tier::HighLevel);
}

#[test]
fn test_busy_agent_gets_no_second_task() {
    let (coordinator, sink) = coordinator();
    coordinator.register_agent(fixtures::agent(Vec::<String>::new(), 0.0));
    let idea_id = fixtures::idea_node("idea").id;

    let mut first = fixtures::task(idea_id, Vec::<String>::new(), 0.2);
    let mut second = fixtures::task(idea_id, Vec::<String>::new(), 0.2);
    assert!(coordinator.assign_task(&mut first));
    assert!(!coordinator.assign_task(&mut second));

    assert_eq!(second.status, TaskStatus::Pending);
    assert_eq!(
        last_failure(&sink),
        Some(AssignmentFailure::NoEligibleAgents {
            tier: Tier::LowLevel
        })
    );
}

#[test]
fn test_assigned_task_cannot_be_reassigned() {
    let (coordinator, sink) = coordinator();
    coordinator.register_agent(fixtures::agent(Vec::<String>::new(), 0.0));
    coordinator.register_agent(fixtures::agent(Vec::<String>::new(), 0.0));

    let mut task = fixtures::task(fixtures::idea_node("idea").id, Vec::<String>::new(), 0.2);
    assert!(coordinator.assign_task(&mut task));
    let holder = task.assigned_agent_id;
    assert!(!coordinator.assign_task(&mut task));
    assert_eq!(task.assigned_agent_id, holder);

    match last_failure(&sink) {
        Some(AssignmentFailure::AlreadyAssigned { agent_id: held_by }) => {
            assert_eq!(Some(held_by), holder);
        }
        other => panic!("Expected AlreadyAssigned, got: {:?}", other),
    }
}

#[test]
fn test_finished_task_is_rejected() {
    let (coordinator, sink) = coordinator();
    coordinator.register_agent(fixtures::agent(Vec::<String>::new(), 0.0));

    let mut task = fixtures::task(fixtures::idea_node("idea").id, Vec::<String>::new(), 0.2);
    task.status = TaskStatus::Completed;
    assert!(!coordinator.assign_task(&mut task));
    assert_eq!(
        last_failure(&sink),
        Some(AssignmentFailure::TaskTerminal {
            status: TaskStatus::Completed
        })
    );
}

#[test]
fn test_urgent_hard_task_makes_novice_ask_for_help() {
    let sink = Arc::new(CollectingSink::new());
    let coordinator = AssignmentCoordinator::new(fixtures::deterministic_config())
        .expect("valid config")
        .with_event_sink(sink.clone())
        .with_signal_source(Arc::new(|_task: &Task| TaskSignal::new(1.0, 0.0)));
    coordinator.register_agent(fixtures::agent(Vec::<String>::new(), 0.0));

    let mut task = fixtures::task(fixtures::idea_node("idea").id, ["rust", "go"], 0.4);
    assert!(!coordinator.assign_task(&mut task));
    assert_eq!(
        last_failure(&sink),
        Some(AssignmentFailure::NoWillingAgents { eligible: 1 })
    );
}

struct Alarmed;

impl SignalSource for Alarmed {
    fn signal(&self, _task: &Task) -> TaskSignal {
        TaskSignal {
            urgency: 40.0,
            sentiment: -3.0,
        }
    }
}

#[test]
fn test_out_of_range_signal_is_clamped() {
    let coordinator = AssignmentCoordinator::new(fixtures::deterministic_config())
        .expect("valid config")
        .with_signal_source(Arc::new(Alarmed));
    let agent = fixtures::agent(["rust"], 0.0);
    let agent_id = agent.id;
    coordinator.register_agent(agent);

    // Urgency 1.0 keeps help (0.72) under accept (0.75) for this task
    let mut task = fixtures::task(fixtures::idea_node("idea").id, ["rust"], 0.2);
    assert!(coordinator.assign_task(&mut task));
    assert_eq!(task.assigned_agent_id, Some(agent_id));
}

#[test]
fn test_skilled_agent_preferred() {
    let (coordinator, _) = coordinator();
    let skilled = fixtures::agent(["rust"], 0.0);
    let skilled_id = skilled.id;
    coordinator.register_agent(fixtures::agent(Vec::<String>::new(), 0.0));
    coordinator.register_agent(skilled);

    let mut task = fixtures::task(fixtures::idea_node("idea").id, ["rust"], 0.2);
    assert!(coordinator.assign_task(&mut task));
    assert_eq!(task.assigned_agent_id, Some(skilled_id));
}

#[test]
fn test_equal_candidates_break_ties_by_id() {
    let (coordinator, sink) = coordinator();
    let a = fixtures::agent(["rust"], 0.0);
    let b = fixtures::agent(["rust"], 0.0);
    let expected = a.id.min(b.id);
    coordinator.register_agent(a);
    coordinator.register_agent(b);

    let mut task = fixtures::task(fixtures::idea_node("idea").id, ["rust"], 0.2);
    assert!(coordinator.assign_task(&mut task));
    assert_eq!(task.assigned_agent_id, Some(expected));

    let succeeded = sink
        .events()
        .into_iter()
        .find_map(|event| match event {
            EngineEvent::AssignmentSucceeded { margin, stable, .. } => Some((margin, stable)),
            _ => None,
        })
        .expect("success event");
    assert_eq!(succeeded.0, Some(0.0));
    assert!(!succeeded.1);
}

#[test]
fn test_graph_records_agents_and_assignments() {
    let (coordinator, sink) = coordinator();
    let agent = fixtures::agent(["rust"], 0.0);
    let agent_id = agent.id;
    coordinator.register_agent(agent);

    let idea = fixtures::idea_node("graph idea");
    let idea_id = idea.id;
    coordinator.with_graph_mut(|graph| graph.add_node(idea));

    let mut task = fixtures::task(idea_id, ["rust"], 0.2);
    assert!(coordinator.assign_task(&mut task));

    let score = sink
        .events()
        .into_iter()
        .find_map(|event| match event {
            EngineEvent::AssignmentSucceeded { score, .. } => Some(score),
            _ => None,
        })
        .expect("success event");
    let skill_id = named_node_id(NodeType::Skill, "rust");
    coordinator
        .with_graph(|graph| {
            assert!(graph.contains_node(agent_id));
            assert!(graph.contains_node(skill_id));
            assert!(graph.find_edge(agent_id, skill_id, EdgeType::HasSkill).is_some());
            assert!(graph.find_edge(task.id, idea_id, EdgeType::PartOf).is_some());

            let assigned = graph
                .find_edge(task.id, agent_id, EdgeType::AssignedTo)
                .expect("assigned_to edge");
            assert!((assigned.weight - score).abs() < 1e-12);

            let node = graph.get_node(agent_id).expect("agent node");
            assert_eq!(node.property("status"), Some(serde_json::json!("busy")));
        })
        .expect("graph readable");
}

#[test]
fn test_duplicate_registration_rejected() {
    let (coordinator, _) = coordinator();
    let agent = fixtures::agent(["rust"], 0.0);
    assert!(coordinator.register_agent(agent.clone()));
    assert!(!coordinator.register_agent(agent));
    assert_eq!(coordinator.agents().len(), 1);
}

#[test]
fn test_registration_derives_tier_from_xp() {
    let (coordinator, _) = coordinator();
    let mut agent = fixtures::agent(["rust"], 1200.0);
    agent.tier = Tier::HighLevel;
    let agent_id = agent.id;
    coordinator.register_agent(agent);
    assert_eq!(
        coordinator.get_agent(agent_id).map(|a| a.tier),
        Some(Tier::MidLevel)
    );
}

#[test]
fn test_remove_agent() {
    let (coordinator, sink) = coordinator();
    let agent = fixtures::agent(Vec::<String>::new(), 0.0);
    let agent_id = agent.id;
    coordinator.register_agent(agent);

    let mut task = fixtures::task(fixtures::idea_node("idea").id, Vec::<String>::new(), 0.2);
    assert!(coordinator.assign_task(&mut task));
    assert!(!coordinator.remove_agent(agent_id), "busy agents stay");

    assert!(coordinator.update_task_status(task.id, TaskStatus::Completed, fixtures::outcome(0.9)));
    assert!(coordinator.remove_agent(agent_id));
    assert!(!coordinator.remove_agent(agent_id));

    assert!(coordinator.get_agent(agent_id).is_none());
    assert!(coordinator.get_agent_reward_stats(agent_id).is_none());
    assert_eq!(
        coordinator.with_graph(|graph| graph.contains_node(agent_id)),
        Some(false)
    );
    assert_eq!(sink.event_types().last(), Some(&"AgentRemoved"));
}

#[test]
fn test_concurrent_assignment_of_one_task() {
    let (coordinator, _) = coordinator();
    for _ in 0..4 {
        coordinator.register_agent(fixtures::agent(["rust"], 0.0));
    }
    let coordinator = Arc::new(coordinator);
    let task = fixtures::task(fixtures::idea_node("idea").id, ["rust"], 0.2);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let coordinator = Arc::clone(&coordinator);
            let mut task = task.clone();
            thread::spawn(move || coordinator.assign_task(&mut task))
        })
        .collect();
    let successes = handles
        .into_iter()
        .map(|h| h.join().expect("thread"))
        .filter(|assigned| *assigned)
        .count();

    assert_eq!(successes, 1);
    let busy = coordinator
        .agents()
        .iter()
        .filter(|a| a.status == AgentStatus::Busy)
        .count();
    assert_eq!(busy, 1);
}

#[test]
fn test_concurrent_tasks_never_share_an_agent() {
    let (coordinator, _) = coordinator();
    for _ in 0..3 {
        coordinator.register_agent(fixtures::agent(["rust"], 0.0));
    }
    let coordinator = Arc::new(coordinator);
    let idea_id = fixtures::idea_node("idea").id;

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let coordinator = Arc::clone(&coordinator);
            thread::spawn(move || {
                let mut task = fixtures::task(idea_id, ["rust"], 0.2);
                coordinator.assign_task(&mut task);
                task.assigned_agent_id
            })
        })
        .collect();
    let mut holders: Vec<_> = handles
        .into_iter()
        .filter_map(|h| h.join().expect("thread"))
        .collect();

    assert_eq!(holders.len(), 3);
    holders.sort();
    holders.dedup();
    assert_eq!(holders.len(), 3);
}

#[test]
fn test_subscribers_see_events_in_commit_order() {
    let (coordinator, _) = coordinator();
    let mut rx = coordinator.events().subscribe();
    coordinator.register_agent(fixtures::agent(Vec::<String>::new(), 0.0));
    let mut task = fixtures::task(fixtures::idea_node("idea").id, Vec::<String>::new(), 0.2);
    coordinator.assign_task(&mut task);

    let mut types = Vec::new();
    while let Ok(event) = rx.try_recv() {
        types.push(event.event_type());
    }
    assert_eq!(
        types,
        vec!["AgentRegistered", "TaskStatusChanged", "AssignmentSucceeded"]
    );
}
