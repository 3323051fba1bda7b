use stocknet::config::LayoutConfig;
use stocknet::dataset::{RelationRecord, Source, load_or_fallback, parse_records};
use stocknet::engine::LayoutEngine;
use stocknet::filter::filter_links;
use stocknet::graph::build;
use stocknet::interaction::DragEvents;
use stocknet::simulation::Phase;

fn scenario_a() -> Vec<RelationRecord> {
    vec![
        RelationRecord::new("A", "B", "sector", 0.9),
        RelationRecord::new("A", "C", "sector", 0.9),
        RelationRecord::new("B", "C", "sector", 0.5),
    ]
}

#[test]
fn scenario_a_groups_and_threshold() {
    let built = build(&scenario_a());

    assert_eq!(built.graph.node_count(), 3);
    for id in ["A", "B", "C"] {
        assert_eq!(built.graph.node(id).unwrap().group.as_deref(), Some("sector"));
    }
    let active: Vec<(String, String)> = filter_links(built.graph.links(), 0.6)
        .into_iter()
        .map(|l| (l.source_id, l.target_id))
        .collect();
    assert_eq!(
        active,
        vec![("A".into(), "B".into()), ("A".into(), "C".into())]
    );
}

#[test]
fn scenario_b_garbage_source_falls_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("garbage.csv");
    std::fs::write(&path, b"\xff\xfe\x00\x12").unwrap();

    let loaded = load_or_fallback(&path);
    assert_eq!(loaded.source, Source::Fallback);

    let mut engine = LayoutEngine::new(build(&loaded.records), LayoutConfig::default());
    engine.start();
    let frame = engine.step(1.0).unwrap();
    assert!(!frame.nodes.is_empty());
    assert!(!frame.links.is_empty());
}

#[test]
fn scenario_c_parameter_change_wakes_settled_engine() {
    let mut engine = LayoutEngine::new(build(&scenario_a()), LayoutConfig::default());
    engine.start();
    engine.run_to_convergence(2000);
    assert_eq!(engine.phase(), Phase::Settled);
    assert!(engine.state().alpha < engine.state().alpha_min);

    engine.controller().set_repulsion(-600.0);

    assert_eq!(engine.phase(), Phase::Running);
    assert_eq!(engine.state().alpha, engine.config().reheat_alpha);
    assert!(engine.step(1.0).is_some());
}

#[test]
fn layouts_are_reproducible() {
    let records = parse_records(
        "stock1,stock2,relation_type,weight\n\
         A,B,sector,1\nB,C,sector,1\nC,D,supplier,2\nD,A,supplier,0.3\nE,A,peer,1\n"
            .as_bytes(),
    )
    .unwrap()
    .0;
    let config = LayoutConfig {
        seed: 2024,
        ..LayoutConfig::default()
    };

    let run = || {
        let mut engine = LayoutEngine::new(build(&records), config.clone());
        engine.start();
        let mut frames = Vec::new();
        while let Some(frame) = engine.step(1.0) {
            frames.push(frame);
        }
        frames
    };

    let first = run();
    assert!(!first.is_empty());
    assert_eq!(first, run());
}

#[test]
fn cooling_is_monotonic_between_reheats() {
    let mut engine = LayoutEngine::new(build(&scenario_a()), LayoutConfig::default());
    engine.start();

    let mut previous = engine.state().alpha;
    for _ in 0..100 {
        let frame = engine.step(1.0).unwrap();
        assert!(frame.alpha < previous);
        previous = frame.alpha;
    }

    engine.controller().set_link_distance(250.0);
    assert!(engine.state().alpha > previous);
}

#[test]
fn drag_cycle_pins_then_releases() {
    let mut engine = LayoutEngine::new(build(&scenario_a()), LayoutConfig::default());
    engine.start();
    engine.run_to_convergence(2000);

    assert!(engine.controller().on_drag_start("B", [0.0, 0.0]));
    for step in 1..=30 {
        let pos = [step as f64 * 3.0, -(step as f64)];
        engine.controller().on_drag_move("B", pos);
        let frame = engine.step(1.0).unwrap();
        let b = frame.node("B").unwrap();
        assert_eq!([b.x, b.y], pos);
    }
    assert!(engine.controller().on_drag_end("B"));

    engine.run_to_convergence(2000);
    assert_eq!(engine.phase(), Phase::Settled);
    for node in engine.frame().nodes {
        assert!(node.x.is_finite() && node.y.is_finite());
    }
}

#[test]
fn larger_network_settles_with_finite_positions() {
    let records: Vec<RelationRecord> = (0..120)
        .map(|i| {
            let kind = ["sector", "supplier", "peer"][i % 3];
            RelationRecord::new(
                &format!("S{}", i % 60),
                &format!("S{}", (i * 7 + 3) % 60),
                kind,
                (i % 30) as f64 / 10.0,
            )
        })
        .collect();
    let built = build(&records);
    assert!(!built.groups.is_empty() && built.groups.len() <= 3);

    let mut engine = LayoutEngine::new(built, LayoutConfig::default());
    engine.start();
    let steps = engine.run_to_convergence(2000);

    assert!(steps < 2000);
    assert_eq!(engine.phase(), Phase::Settled);
    for node in engine.frame().nodes {
        assert!(node.x.is_finite() && node.y.is_finite());
    }
}
