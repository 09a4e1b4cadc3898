//! Three-step dual pivot strut assembly.

mod common;

use approx::assert_relative_eq;
use common::{started_pair, Links, SOURCE_PART, TARGET_PART};
use link_core::{LinkEvent, PeerId};
use link_physics::{ConstraintId, ConstraintKind, ConstraintLoad, ObjectId, PhysicsEngine};
use link_types::{BreakThresholds, JointConfig, LinkActor, LinkState, StrutConfig, Vector3};

const SEPARATION: f64 = 4.0;

fn strut_config() -> StrutConfig {
    StrutConfig::default()
        .with_breaks(BreakThresholds::new(100.0, 50.0))
        .with_spring(1000.0, 1.0)
}

/// Started pair whose parts are already coupled by the host.
fn coupled(config: StrutConfig) -> (Links, PeerId, PeerId, ConstraintId) {
    let (mut links, source, target) =
        started_pair(JointConfig::DualPivotStrut(config), SEPARATION);
    let host = links
        .couple_parts(SOURCE_PART, TARGET_PART, BreakThresholds::new(500.0, 500.0))
        .unwrap();
    (links, source, target, host)
}

fn counts(links: &Links) -> (usize, usize) {
    (
        links.engine().object_count(),
        links.engine().constraint_count(),
    )
}

fn sub_joints(links: &Links, peer: PeerId) -> Vec<ConstraintId> {
    links.joint(peer).unwrap().sub_joints()
}

fn owner(links: &Links, constraint: ConstraintId) -> ObjectId {
    links.engine().constraint_spec(constraint).unwrap().owner
}

fn assembled(config: StrutConfig) -> (Links, PeerId, PeerId) {
    let (mut links, source, target, _) = coupled(config);
    links.link(source, target).unwrap();
    for _ in 0..3 {
        links.step().unwrap();
    }
    assert!(links.joint(source).unwrap().is_assembled());
    links.drain_events();
    (links, source, target)
}

// ============================================================================
// Phases
// ============================================================================

#[test]
fn assembly_advances_one_phase_per_step() {
    let (mut links, source, target, host) = coupled(strut_config());
    links.link(source, target).unwrap();

    // Pivots only, host coupling frozen
    assert_eq!(sub_joints(&links, source).len(), 2);
    assert!(!links.joint(source).unwrap().is_assembled());
    assert!(links.engine().break_thresholds(host).unwrap().is_unbreakable());

    links.step().unwrap();
    let pivots = sub_joints(&links, source);
    assert_eq!(pivots.len(), 2);
    for pivot in &pivots {
        assert_eq!(links.engine().rest_pose(*pivot).unwrap().captured_at, 1);
    }

    links.step().unwrap();
    let joints = sub_joints(&links, source);
    assert_eq!(joints.len(), 3);
    let strut = joints[2];
    assert_eq!(links.engine().rest_pose(strut).unwrap().captured_at, 2);
    match links.engine().constraint_kind(strut).unwrap() {
        ConstraintKind::LinearSpring {
            spring,
            max_distance: Some(length),
            ..
        } => {
            assert_relative_eq!(spring, 1000.0);
            assert_relative_eq!(length, SEPARATION, epsilon = 1e-9);
        }
        other => panic!("strut should be a limited spring, got {other:?}"),
    }
    assert!(!links.joint(source).unwrap().is_assembled());

    links.step().unwrap();
    assert!(links.joint(source).unwrap().is_assembled());
    assert_eq!(links.state(source).unwrap(), LinkState::Linked);
    assert!(links.host_joint(SOURCE_PART, TARGET_PART).is_none());
}

#[test]
fn pivots_face_each_other() {
    let (links, source, _) = assembled(strut_config());
    let joints = sub_joints(&links, source);
    let source_pivot = links.engine().world_pose(owner(&links, joints[0])).unwrap();
    let target_pivot = links.engine().world_pose(owner(&links, joints[1])).unwrap();

    let forward = source_pivot.rotation * Vector3::z();
    let backward = target_pivot.rotation * Vector3::z();
    assert_relative_eq!(forward, Vector3::z(), epsilon = 1e-9);
    assert_relative_eq!(backward, -Vector3::z(), epsilon = 1e-9);
}

#[test]
fn completed_assembly_splits_break_axes() {
    let (links, source, _) = assembled(strut_config());
    let joints = sub_joints(&links, source);
    let engine = links.engine();

    for pivot in &joints[..2] {
        assert_eq!(
            engine.break_thresholds(*pivot).unwrap(),
            BreakThresholds::torque_only(50.0)
        );
        let object = owner(&links, *pivot);
        assert!(links.connector(object).is_some());
        assert_eq!(engine.parent(object).unwrap(), None);
        assert!(!engine.is_kinematic(object).unwrap());
    }
    assert_eq!(
        engine.break_thresholds(joints[2]).unwrap(),
        BreakThresholds::force_only(100.0)
    );
}

#[test]
fn strutless_assembly_has_pivots_only() {
    let config = StrutConfig::default().with_breaks(BreakThresholds::new(100.0, 50.0));
    let (links, source, _) = assembled(config);
    assert_eq!(sub_joints(&links, source).len(), 2);
}

#[test]
fn cone_limits_reach_the_pivots() {
    let mut config = strut_config();
    config.source_cone_limit = Some(30.0);
    let (mut links, source, target, _) = coupled(config);
    links.link(source, target).unwrap();

    let joints = sub_joints(&links, source);
    assert_eq!(
        links.engine().constraint_kind(joints[0]),
        Some(ConstraintKind::Pivot {
            cone_limit: Some(30.0)
        })
    );
    assert_eq!(
        links.engine().constraint_kind(joints[1]),
        Some(ConstraintKind::Pivot { cone_limit: None })
    );
}

// ============================================================================
// Cancellation
// ============================================================================

#[test]
fn cancelling_before_first_step_restores_everything() {
    let (mut links, source, target, host) = coupled(strut_config());
    let baseline = counts(&links);

    links.link(source, target).unwrap();
    assert_ne!(counts(&links), baseline);
    links.break_link(source, LinkActor::Manual).unwrap();

    assert_eq!(counts(&links), baseline);
    assert_eq!(
        links.engine().break_thresholds(host).unwrap(),
        BreakThresholds::new(500.0, 500.0)
    );

    // Nothing resumes after the assembly is gone
    links.step().unwrap();
    links.step().unwrap();
    assert_eq!(counts(&links), baseline);
    assert_eq!(links.state(target).unwrap(), LinkState::Available);
}

#[test]
fn cancelling_while_strut_settles_restores_everything() {
    let (mut links, source, target, host) = coupled(strut_config());
    let baseline = counts(&links);

    links.link(source, target).unwrap();
    links.step().unwrap();
    links.step().unwrap();
    assert_eq!(sub_joints(&links, source).len(), 3);

    links.break_link(target, LinkActor::Manual).unwrap();
    assert_eq!(counts(&links), baseline);
    assert_eq!(links.host_joint(SOURCE_PART, TARGET_PART), Some(host));

    links.step().unwrap();
    assert_eq!(counts(&links), baseline);
}

#[test]
fn vanished_pivot_aborts_the_assembly() {
    let (mut links, source, target, host) = coupled(strut_config());
    let baseline = counts(&links);
    links.link(source, target).unwrap();
    links.drain_events();

    let pivot = owner(&links, sub_joints(&links, source)[0]);
    links.engine_mut().destroy_object(pivot).unwrap();
    links.step().unwrap();
    links.step().unwrap();

    let events = links.drain_events();
    assert_eq!(events.len(), 1);
    assert!(events[0].is_broken_by(LinkActor::Api));
    assert_eq!(links.state(source).unwrap(), LinkState::Available);
    assert_eq!(links.state(target).unwrap(), LinkState::Available);
    assert_eq!(counts(&links), baseline);
    assert_eq!(
        links.engine().break_thresholds(host).unwrap(),
        BreakThresholds::new(500.0, 500.0)
    );
}

// ============================================================================
// Breaking
// ============================================================================

#[test]
fn torque_breaks_a_pivot_not_the_strut() {
    let (mut links, source, target) = assembled(strut_config());
    let joints = sub_joints(&links, source);
    let pivots = [owner(&links, joints[0]), owner(&links, joints[1])];

    let overload = ConstraintLoad::torque(60.0);
    links.engine_mut().apply_load(joints[0], overload).unwrap();
    links.engine_mut().apply_load(joints[2], overload).unwrap();
    links.step().unwrap();

    assert_eq!(
        links.drain_events(),
        vec![LinkEvent::Broken {
            source,
            target,
            actor: LinkActor::Physics,
            constraint: Some(joints[0]),
        }]
    );
    for pivot in pivots {
        assert!(!links.engine().contains_object(pivot));
        assert!(links.connector(pivot).is_none());
    }
}

#[test]
fn force_breaks_the_strut_not_the_pivots() {
    let (mut links, source, _) = assembled(strut_config());
    let joints = sub_joints(&links, source);

    let overload = ConstraintLoad::force(150.0);
    for joint in &joints {
        links.engine_mut().apply_load(*joint, overload).unwrap();
    }
    links.step().unwrap();

    let events = links.drain_events();
    assert_eq!(events.len(), 1);
    assert!(matches!(
        events[0],
        LinkEvent::Broken { constraint: Some(c), actor: LinkActor::Physics, .. } if c == joints[2]
    ));
    assert_eq!(links.state(source).unwrap(), LinkState::Available);
}

#[test]
fn unbreakable_adjustment_waits_for_completion() {
    let (mut links, source, target, _) = coupled(strut_config());
    links.link(source, target).unwrap();
    links.adjust_joint(source, true).unwrap();
    for _ in 0..3 {
        links.step().unwrap();
    }

    let joints = sub_joints(&links, source);
    for joint in &joints {
        assert!(links.engine().break_thresholds(*joint).unwrap().is_unbreakable());
    }
    links
        .engine_mut()
        .apply_load(joints[0], ConstraintLoad::new(1e6, 1e6))
        .unwrap();
    links.step().unwrap();
    assert_eq!(links.state(source).unwrap(), LinkState::Linked);

    links.adjust_joint(target, false).unwrap();
    assert_eq!(
        links.engine().break_thresholds(joints[0]).unwrap(),
        BreakThresholds::torque_only(50.0)
    );
}
