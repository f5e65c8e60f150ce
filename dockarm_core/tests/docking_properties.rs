//! End-to-end properties of the docking core

use approx::assert_relative_eq;
use dockarm_core::ik::{orientation_error, CcdSolver, IkTarget};
use dockarm_core::prelude::*;
use nalgebra::{Isometry3, Point3, Quaternion, UnitQuaternion, Vector3};
use std::f64::consts::PI;

/// Two-link planar arm in the XY plane, both joints about Z
fn planar(l1: f64, l2: f64) -> (TransformGraph, KinematicChain, NodeId) {
    let mut graph = TransformGraph::new("world");
    let m1 = graph
        .add_node(graph.root(), "Motor1", Isometry3::identity())
        .unwrap();
    let m2 = graph
        .add_node(m1, "Motor2", Isometry3::translation(l1, 0.0, 0.0))
        .unwrap();
    let tip = graph
        .add_node(m2, "tip", Isometry3::translation(l2, 0.0, 0.0))
        .unwrap();

    let mut chain = KinematicChain::new(vec![
        JointSpec::new(JointId::Motor1, Vector3::z()),
        JointSpec::new(JointId::Motor2, Vector3::z()),
    ]);
    chain.set_end_effector(Some(tip));
    chain.attach(&mut graph, TransformGraph::ROOT);
    (graph, chain, tip)
}

fn tip_position(graph: &TransformGraph, tip: NodeId) -> Point3<f64> {
    graph.world_pose(tip).unwrap() * Point3::origin()
}

fn rel(distance: f64) -> RelativePose {
    RelativePose::from_position(Vector3::new(distance, 0.0, 0.0))
        .with_orientation(Quaternion::identity())
}

#[test]
fn stored_limits_take_precedence_over_static_bounds() {
    let mut graph = TransformGraph::new("world");
    let m1 = graph
        .add_node(graph.root(), "Motor1", Isometry3::identity())
        .unwrap();
    graph.add_node(m1, "Motor2", Isometry3::identity()).unwrap();

    let mut store = MemoryLimitStore::new();
    store.set_limits(JointId::Motor1, JointLimits::new(Some(-30.0), Some(80.0)));

    let mut chain = KinematicChain::new(vec![
        JointSpec::new(JointId::Motor1, Vector3::z()).with_bounds(-1.0, 1.0),
        JointSpec::new(JointId::Motor2, Vector3::z()).with_bounds(-0.5, 0.5),
    ])
    .with_limit_store(Box::new(store));
    chain.attach(&mut graph, TransformGraph::ROOT);

    let (lo, hi) = ((-30f64).to_radians(), 80f64.to_radians());
    for i in -40..=40 {
        let requested = i as f64 * 0.1;
        chain.set_joint_angle(&mut graph, JointId::Motor1, requested);
        chain.set_joint_angle(&mut graph, JointId::Motor2, requested);

        let angle = chain.angle(JointId::Motor1).unwrap();
        assert!(angle >= lo - 1e-12 && angle <= hi + 1e-12, "angle {}", angle);
        let angle = chain.angle(JointId::Motor2).unwrap();
        assert!((-0.5..=0.5).contains(&angle), "angle {}", angle);
    }

    // Store range is [-30, 80] deg and replaces the static [-1, 1] rad
    chain.set_joint_angle(&mut graph, JointId::Motor1, 10.0);
    assert_relative_eq!(chain.angle(JointId::Motor1).unwrap(), hi, epsilon = 1e-12);
    chain.set_joint_angle(&mut graph, JointId::Motor1, -10.0);
    assert_relative_eq!(chain.angle(JointId::Motor1).unwrap(), lo, epsilon = 1e-12);
}

#[test]
fn fk_is_a_function_of_angles_only() {
    let (mut a_graph, mut a, a_tip) = planar(1.0, 0.5);
    let (mut b_graph, mut b, b_tip) = planar(1.0, 0.5);

    // Different histories, same final angles
    a.set_joint_angle(&mut a_graph, JointId::Motor1, 0.7);
    a.set_joint_angle(&mut a_graph, JointId::Motor2, -0.2);

    for k in 0..25 {
        b.set_joint_angle(&mut b_graph, JointId::Motor1, k as f64 * 0.3);
        b.set_joint_angle(&mut b_graph, JointId::Motor2, -(k as f64) * 0.1);
    }
    b.set_joint_angle(&mut b_graph, JointId::Motor1, 0.7);
    b.set_joint_angle(&mut b_graph, JointId::Motor2, -0.2);

    a.apply_fk(&mut a_graph);
    b.apply_fk(&mut b_graph);
    b.apply_fk(&mut b_graph);

    let pa = a_graph.world_pose(a_tip).unwrap();
    let pb = b_graph.world_pose(b_tip).unwrap();
    assert_eq!(pa.translation.vector, pb.translation.vector);
    assert_eq!(pa.rotation.coords, pb.rotation.coords);
}

#[test]
fn ccd_converges_on_planar_chain() {
    let (mut graph, mut chain, tip) = planar(1.0, 1.0);
    let target = Point3::new(1.0, 1.0, 0.0);

    let report = CcdSolver::default()
        .solve(&mut chain, &mut graph, &IkTarget::Point(target))
        .unwrap();

    assert!(report.converged);
    assert!(report.iterations <= 10);
    assert!((tip_position(&graph, tip) - target).norm() < 1e-3);
}

#[test]
fn orientation_error_is_bounded_and_zero_on_identity() {
    let samples: Vec<UnitQuaternion<f64>> = (0..16)
        .map(|i| {
            let t = i as f64;
            UnitQuaternion::from_euler_angles(t * 0.41, -t * 0.29, t * 0.77)
        })
        .collect();

    for a in &samples {
        assert_relative_eq!(orientation_error(a, a).norm(), 0.0, epsilon = 1e-9);
        for b in &samples {
            let n = orientation_error(a, b).norm();
            assert!((0.0..=PI + 1e-9).contains(&n));
        }
    }
}

#[test]
fn task_phase_never_regresses() {
    let mut machine = TaskPhaseMachine::default();
    let socket = Point3::new(0.0, 0.0, 0.0);
    let distances = [0.5, 0.2, 0.02, 0.4, 0.01, 0.003, 0.9, 0.001];
    let rank = |p: TaskPhase| match p {
        TaskPhase::Approach => 0,
        TaskPhase::Insert { .. } => 1,
        TaskPhase::Done => 2,
    };

    let mut last = 0;
    let mut target = socket;
    for d in distances {
        target = machine.update(Point3::new(d, 0.0, 0.0), socket, target);
        let now = rank(machine.phase());
        assert!(now >= last);
        assert!(now - last <= 1);
        last = now;
    }
    assert!(machine.phase().is_done());
}

#[test]
fn policy_gating_with_identity_orientation() {
    let mut flags = InputFlags::default();

    for d in [0.05, 0.0998, 0.1002, 0.2] {
        let mut machine = PolicyPhaseMachine::default();
        assert_eq!(machine.update_phase(&rel(d), &mut flags), PolicyPhase::Ik);
        assert!(flags.direct_targeting);
    }

    let mut machine = PolicyPhaseMachine::default();
    assert_eq!(machine.update_phase(&rel(0.10005), &mut flags), PolicyPhase::Rl);
    assert!(!flags.direct_targeting);
}

#[test]
fn reset_scenario() {
    let mut machine = PolicyPhaseMachine::default();
    let mut flags = InputFlags::default();

    assert_eq!(machine.update_phase(&rel(0.10), &mut flags), PolicyPhase::Rl);
    assert_eq!(machine.update_phase(&rel(0.005), &mut flags), PolicyPhase::Done);

    machine.reset(&mut flags);
    assert_eq!(machine.phase(), PolicyPhase::Ik);
    assert!(flags.direct_targeting);
    assert!(machine.last_distance().is_none());
}

#[test]
fn limits_persist_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("limits").join("joint_limits.json");

    {
        let mut store = FileLimitStore::open(&path).unwrap();
        store.set_limits(JointId::Motor2, JointLimits::new(Some(-10.0), None));
    }

    let store = FileLimitStore::open(&path).unwrap();
    assert_eq!(
        store.limits(JointId::Motor2),
        Some(JointLimits::new(Some(-10.0), None))
    );

    let (mut graph, chain, _) = planar(1.0, 1.0);
    let mut chain = chain.with_limit_store(Box::new(store));
    chain.set_joint_angle(&mut graph, JointId::Motor2, -1.0);
    assert_relative_eq!(
        chain.angle(JointId::Motor2).unwrap(),
        (-10f64).to_radians(),
        epsilon = 1e-12
    );
}

#[test]
fn aliases_resolve_and_joints_sort_by_depth() {
    let mut graph = TransformGraph::new("world");
    let base = graph
        .add_node(graph.root(), "BASE", Isometry3::identity())
        .unwrap();
    // Mesh leaf sharing the alias name is listed first but must not win
    graph.add_node(base, "elbow", Isometry3::identity()).unwrap();
    let shoulder = graph
        .add_node(base, "Shoulder_2", Isometry3::identity())
        .unwrap();
    let elbow = graph
        .add_node(shoulder, "Elbow", Isometry3::identity())
        .unwrap();
    graph.add_node(elbow, "elbow_mesh", Isometry3::identity()).unwrap();

    let mut chain = KinematicChain::new(vec![
        JointSpec::new(JointId::Motor3, Vector3::z()),
        JointSpec::new(JointId::Motor1, Vector3::z()),
        JointSpec::new(JointId::Motor2, Vector3::y()),
        JointSpec::new(JointId::Motor4, Vector3::y()),
    ]);
    let resolved = chain.attach(&mut graph, TransformGraph::ROOT);

    assert_eq!(resolved, 3);
    assert_eq!(
        chain.joint_ids(),
        vec![JointId::Motor1, JointId::Motor2, JointId::Motor3]
    );
    assert_eq!(chain.joint(JointId::Motor3).unwrap().node(), elbow);
    assert!(!chain.is_resolved(JointId::Motor4));
    assert_eq!(chain.end_effector(), Some(elbow));
}

#[test]
fn session_hands_off_to_policy_and_applies_actions() {
    let (mut graph, chain, tip) = planar(1.0, 1.0);
    let config = SessionConfig {
        initial_angles_deg: Default::default(),
        ..Default::default()
    };
    let mut session = Session::with_chain(config, chain);
    session.attach(&mut graph, TransformGraph::ROOT);
    session.set_direct_targeting(false);

    let socket = Isometry3::translation(2.1, 0.0, 0.0);
    let report = session.tick(&mut graph, TickInput::with_socket(socket));
    assert_eq!(report.policy_transition, Some((PolicyPhase::Ik, PolicyPhase::Rl)));

    // +y action moves the TCP along its local -y
    let before = tip_position(&graph, tip);
    let action = [0.0, 1.0, 0.0];
    let report = session.tick(&mut graph, TickInput::with_socket(socket).action(&action));

    assert!(report.action.is_some());
    assert!(tip_position(&graph, tip).y < before.y);
    assert_eq!(report.telemetry.tick, 2);
    assert_eq!(report.telemetry.joints.len(), 2);
}

#[test]
fn command_json_drives_joint_deltas() {
    let (mut graph, mut chain, _) = planar(1.0, 1.0);
    let controller = Controller::default();

    assert!(controller.apply_command_json(
        &mut chain,
        &mut graph,
        r#"{"mode": "joint-delta", "delta": {"Motor1": 0.5, "Motor2": -0.01}}"#,
    ));

    assert_relative_eq!(chain.angle(JointId::Motor1).unwrap(), 0.03, epsilon = 1e-12);
    assert_relative_eq!(chain.angle(JointId::Motor2).unwrap(), -0.01, epsilon = 1e-12);
}
