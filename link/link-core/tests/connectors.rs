//! Promoted connectors and vessel activation.

mod common;

use std::rc::Rc;

use approx::assert_relative_eq;
use common::{two_parts, Links, RecordingHighlighter, SOURCE_PART, VESSEL};
use link_physics::{ObjectId, PhysicsEngine};
use link_types::{Point3, Pose, Twist, Vector3, VesselId};

/// A plug mesh under the source part's model, one metre above it.
fn plug(links: &mut Links) -> ObjectId {
    let root = links.part(SOURCE_PART).unwrap().model_root;
    links
        .engine_mut()
        .create_object("plug", Some(root), Pose::from_position(Point3::new(0.0, 0.0, 1.0)))
        .unwrap()
}

#[test]
fn promote_and_demote_round_trip() {
    let mut links = two_parts(3.0);
    let plug = plug(&mut links);
    let part = links.part(SOURCE_PART).unwrap().object;
    let root = links.part(SOURCE_PART).unwrap().model_root;
    let drift = Twist::linear(Vector3::new(1.0, 0.0, 0.0));
    links.engine_mut().set_velocity(part, drift).unwrap();

    links.promote(SOURCE_PART, plug, 2.0, Some(0.5)).unwrap();
    {
        let engine = links.engine();
        assert_relative_eq!(engine.mass(plug).unwrap(), 2.0);
        assert_eq!(engine.trigger_volume(plug), Some(1.0));
        assert_eq!(engine.parent(plug).unwrap(), None);
        assert!(!engine.is_kinematic(plug).unwrap());
        assert_eq!(engine.velocity(plug).unwrap(), drift);
        assert_relative_eq!(
            engine.world_pose(plug).unwrap().position,
            Point3::new(0.0, 0.0, 1.0)
        );
    }
    assert_eq!(links.connector(plug).unwrap().owner, SOURCE_PART);

    assert!(links.demote(plug).unwrap());
    let engine = links.engine();
    assert_eq!(engine.parent(plug).unwrap(), Some(root));
    assert_relative_eq!(
        engine.world_pose(plug).unwrap().position,
        Point3::new(0.0, 0.0, 1.0),
        epsilon = 1e-12
    );
    assert!(!engine.has_rigid_body(plug));
    assert_eq!(engine.trigger_volume(plug), None);
    assert!(links.connector(plug).is_none());
}

#[test]
fn demoting_an_unpromoted_object_is_a_no_op() {
    let mut links = two_parts(3.0);
    let plug = plug(&mut links);

    assert!(!links.demote(plug).unwrap());
    assert_eq!(
        links.engine().parent(plug).unwrap(),
        Some(links.part(SOURCE_PART).unwrap().model_root)
    );
}

#[test]
fn promoting_twice_keeps_the_first_body() {
    let mut links = two_parts(3.0);
    let plug = plug(&mut links);

    links.promote(SOURCE_PART, plug, 2.0, None).unwrap();
    links.promote(SOURCE_PART, plug, 9.0, Some(4.0)).unwrap();

    assert_relative_eq!(links.engine().mass(plug).unwrap(), 2.0);
    assert_eq!(links.engine().trigger_volume(plug), None);
}

#[test]
fn packed_vessel_keeps_connectors_in_the_model() {
    let mut links = two_parts(3.0);
    let plug = plug(&mut links);
    let root = links.part(SOURCE_PART).unwrap().model_root;
    links.set_vessel_packed(VESSEL, true).unwrap();

    links.promote(SOURCE_PART, plug, 2.0, None).unwrap();

    assert_eq!(links.engine().parent(plug).unwrap(), Some(root));
    assert!(links.engine().is_kinematic(plug).unwrap());
}

#[test]
fn activation_changes_reparent_and_refresh_highlights() {
    let highlighter = RecordingHighlighter::default();
    let refreshed = Rc::clone(&highlighter.refreshed);
    let mut links = two_parts(3.0).with_highlighter(Box::new(highlighter));
    let plug = plug(&mut links);
    let root = links.part(SOURCE_PART).unwrap().model_root;
    links.promote(SOURCE_PART, plug, 2.0, None).unwrap();

    links.set_vessel_packed(VESSEL, true).unwrap();
    assert_eq!(links.engine().parent(plug).unwrap(), Some(root));
    assert!(links.engine().is_kinematic(plug).unwrap());
    assert_eq!(*refreshed.borrow(), vec![plug, root]);

    // No change, no refresh
    links.set_vessel_packed(VESSEL, true).unwrap();
    assert_eq!(refreshed.borrow().len(), 2);

    links.set_vessel_packed(VESSEL, false).unwrap();
    assert_eq!(links.engine().parent(plug).unwrap(), None);
    assert!(!links.engine().is_kinematic(plug).unwrap());
    assert_eq!(refreshed.borrow()[2..], [root, plug]);
}

#[test]
fn decoupled_part_takes_its_connectors_along() {
    let other = VesselId(2);
    let mut links = two_parts(3.0);
    links.add_vessel(other, true);
    let plug = plug(&mut links);
    let root = links.part(SOURCE_PART).unwrap().model_root;
    links.promote(SOURCE_PART, plug, 2.0, None).unwrap();

    links.decouple_part(SOURCE_PART, other).unwrap();
    assert_eq!(links.part(SOURCE_PART).unwrap().vessel, other);
    assert_eq!(links.engine().parent(plug).unwrap(), Some(root));

    // The old vessel no longer drives the plug
    links.set_vessel_packed(VESSEL, true).unwrap();
    links.set_vessel_packed(VESSEL, false).unwrap();
    assert_eq!(links.engine().parent(plug).unwrap(), Some(root));

    links.set_vessel_packed(other, false).unwrap();
    assert_eq!(links.engine().parent(plug).unwrap(), None);
}

#[test]
fn removing_a_part_destroys_its_connectors() {
    let mut links = two_parts(3.0);
    let plug = plug(&mut links);
    links.promote(SOURCE_PART, plug, 2.0, None).unwrap();
    let before = links.engine().object_count();

    links.remove_part(SOURCE_PART).unwrap();

    assert!(!links.engine().contains_object(plug));
    assert!(links.connector(plug).is_none());
    assert!(links.engine().object_count() < before);
}
