//! Shared fixtures for the link system integration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use link_core::{HighlightRefresher, LinkSystem, PartDesc, PeerId};
use link_physics::{HeadlessPhysics, ObjectId};
use link_types::{
    AttachNodeDef, JointConfig, LinkSystemConfig, PartId, PeerConfig, Point3, Pose, Vector3,
    VesselId,
};

pub const SOURCE_PART: PartId = PartId(1);
pub const TARGET_PART: PartId = PartId(2);
pub const VESSEL: VesselId = VesselId(1);
pub const NODE: &str = "side";
pub const LINK_TYPE: &str = "winch";

pub type Links = LinkSystem<HeadlessPhysics>;

/// A link system with two parts `separation` metres apart along z, each
/// carrying a node at its origin.
pub fn two_parts(separation: f64) -> Links {
    let mut links = LinkSystem::new(LinkSystemConfig::default(), HeadlessPhysics::new()).unwrap();
    links.add_vessel(VESSEL, false);
    for (part, z) in [(SOURCE_PART, 0.0), (TARGET_PART, separation)] {
        let pose = Pose::from_position(Point3::new(0.0, 0.0, z));
        links
            .add_part(PartDesc::new(part, VESSEL, 100.0).with_pose(pose))
            .unwrap();
        links.add_attach_node(part, NODE, node_def()).unwrap();
    }
    links
}

pub fn node_def() -> AttachNodeDef {
    AttachNodeDef::new(Point3::origin(), Vector3::z()).unwrap()
}

pub fn peer_config() -> PeerConfig {
    PeerConfig::new(LINK_TYPE, NODE)
}

/// Two parts with a source and a target peer, started.
pub fn started_pair(joint: JointConfig, separation: f64) -> (Links, PeerId, PeerId) {
    let mut links = two_parts(separation);
    let source = links.add_source(SOURCE_PART, peer_config(), joint).unwrap();
    let target = links.add_target(TARGET_PART, peer_config()).unwrap();
    links.start().unwrap();
    (links, source, target)
}

/// Two parts with a linked source and target.
pub fn linked_pair(joint: JointConfig, separation: f64) -> (Links, PeerId, PeerId) {
    let (mut links, source, target) = started_pair(joint, separation);
    links.link(source, target).unwrap();
    (links, source, target)
}

/// Records every hierarchy root it is asked to refresh.
#[derive(Debug, Clone, Default)]
pub struct RecordingHighlighter {
    pub refreshed: Rc<RefCell<Vec<ObjectId>>>,
}

impl HighlightRefresher for RecordingHighlighter {
    fn refresh(&mut self, root: ObjectId) {
        self.refreshed.borrow_mut().push(root);
    }
}
