mod common;

use common::*;
use harvest_foreman::*;

const LATENCY: i32 = 2;

fn clock(frame: i32) -> FrameClock {
    FrameClock::new(frame, LATENCY)
}

struct Scenario {
    map: SimMap,
    agents: SimAgents,
    engine: AssignmentEngine,
    patch: NodeId,
    worker: AgentId,
}

fn approach_scenario() -> Scenario {
    let mut map = SimMap::new();
    let base = map.add_base(1, Position::new(1000, 1000), DepotState::Completed);
    let patch = map.add_patch(10, base, Position::new(1000, 800), 128);
    let mut agents = SimAgents::new(&map);
    let worker = agents.add_worker(1, Position::new(1000, 900));

    let mut engine = AssignmentEngine::new();
    engine.update_assignments(clock(5), &map, &map, &agents);
    assert_eq!(engine.assigned_patch(worker), Some(patch));

    Scenario {
        map,
        agents,
        engine,
        patch,
        worker,
    }
}

/// Drive the worker toward the patch at 5px/frame, arriving exactly at
/// `arrival_frame`, so the timer learns the sample taken at
/// `arrival_frame - latency - resend window`.
fn learn_approach(s: &mut Scenario, timer: &mut OrderTimer, arrival_frame: i32) -> PositionAndVelocity {
    let optimal_frame = arrival_frame - LATENCY - 11;

    for frame in (optimal_frame - 3)..arrival_frame {
        let position = Position::new(1000, 800 + (arrival_frame - frame) * 5);
        {
            let agent = s.agents.agent_mut(s.worker);
            agent.position = position;
            agent.velocity = (0.0, -5.0);
            agent.order = UnitOrder::MoveToMinerals;
            agent.order_target = Some(s.patch);
        }
        let snapshot = s.agents.agent(s.worker).unwrap();
        timer.optimize_start_of_mining(clock(frame), s.worker, &snapshot, s.patch, &mut s.agents);
    }

    // Arrival: distance zero, promotion happens, no command goes out.
    {
        let agent = s.agents.agent_mut(s.worker);
        agent.position = Position::new(1000, 800);
        agent.velocity = (0.0, 0.0);
    }
    let snapshot = s.agents.agent(s.worker).unwrap();
    let sent = timer.optimize_start_of_mining(
        clock(arrival_frame),
        s.worker,
        &snapshot,
        s.patch,
        &mut s.agents,
    );
    assert!(!sent);

    PositionAndVelocity::quantize(
        Position::new(1000, 800 + (arrival_frame - optimal_frame) * 5),
        (0.0, -5.0),
    )
}

#[test]
fn approach_learns_exactly_one_signature() {
    let mut s = approach_scenario();
    let mut timer = detached_order_timer();
    s.agents.clear_commands();

    learn_approach(&mut s, &mut timer, 100);

    assert_eq!(timer.learned_signatures(s.patch), 1);
    // Learning alone never issues commands.
    assert!(s.agents.commands.is_empty());
}

#[test]
fn learned_signature_resends_through_issue_orders_once() {
    let mut s = approach_scenario();
    let mut timer = detached_order_timer();
    learn_approach(&mut s, &mut timer, 100);

    // A later trip reaches the learned kinematic state.
    {
        let agent = s.agents.agent_mut(s.worker);
        agent.position = Position::new(1000, 800 + 13 * 5);
        agent.velocity = (0.0, -5.0);
        agent.order = UnitOrder::MoveToMinerals;
        agent.order_target = Some(s.patch);
        agent.last_command_frame = 150;
    }
    s.agents.clear_commands();
    s.engine
        .issue_orders(clock(200), &s.map, &s.map, &mut s.agents, &mut timer);

    // Exactly one gather: the optimizer's resend supersedes the default
    // path, so there is no double-send within the tick.
    assert_eq!(s.agents.commands, vec![Command::Gather(s.worker, s.patch)]);
}

#[test]
fn unmatched_state_falls_back_to_default_logic() {
    let mut s = approach_scenario();
    let mut timer = detached_order_timer();
    learn_approach(&mut s, &mut timer, 100);

    // Same spot but drifting sideways: not the learned signature. The
    // default path leaves a correctly-targeted move alone.
    {
        let agent = s.agents.agent_mut(s.worker);
        agent.position = Position::new(1000, 800 + 13 * 5);
        agent.velocity = (0.8, -4.9);
        agent.order = UnitOrder::MoveToMinerals;
        agent.order_target = Some(s.patch);
        agent.last_command_frame = 150;
    }
    s.agents.clear_commands();
    s.engine
        .issue_orders(clock(200), &s.map, &s.map, &mut s.agents, &mut timer);
    assert!(s.agents.commands.is_empty());
}

#[test]
fn learned_set_round_trips_through_disk() {
    let dir = std::env::temp_dir().join(format!("harvest-foreman-rt-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let config = PersistConfig {
        read_dirs: vec![dir.clone()],
        write_dir: dir,
        map_hash: "it".to_string(),
    };

    let mut s = approach_scenario();
    let mut timer = OrderTimer::new(config.clone());
    let learned = learn_approach(&mut s, &mut timer, 100);
    timer.store(&s.map).unwrap();

    let mut reloaded = OrderTimer::new(config);
    reloaded.load(&s.map);
    assert_eq!(reloaded.learned_signatures(s.patch), 1);

    // The reloaded set triggers the same resend.
    {
        let agent = s.agents.agent_mut(s.worker);
        agent.position = learned.position;
        agent.velocity = (0.0, -5.0);
        agent.order = UnitOrder::MoveToMinerals;
    }
    s.agents.clear_commands();
    let snapshot = s.agents.agent(s.worker).unwrap();
    let sent = reloaded.optimize_start_of_mining(
        clock(300),
        s.worker,
        &snapshot,
        s.patch,
        &mut s.agents,
    );
    assert!(sent);
    assert_eq!(s.agents.gathers_for(s.worker), vec![s.patch]);
}

#[test]
fn signatures_for_vanished_nodes_are_dropped_on_load() {
    let dir = std::env::temp_dir().join(format!("harvest-foreman-gone-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let config = PersistConfig {
        read_dirs: vec![dir.clone()],
        write_dir: dir.clone(),
        map_hash: "gone".to_string(),
    };
    // A signature whose tile matches no node in this catalog.
    std::fs::write(
        dir.join("gone_resourceOptimalOrderPositions.csv"),
        "99,99,3200,3200,0,-500\n",
    )
    .unwrap();

    let s = approach_scenario();
    let mut timer = OrderTimer::new(config);
    timer.load(&s.map);
    assert_eq!(timer.learned_signatures(s.patch), 0);
}
