//! Peer state machine and link negotiation through the link system.

mod common;

use std::cell::RefCell;
use std::rc::Rc;

use common::{
    linked_pair, peer_config, started_pair, two_parts, LINK_TYPE, NODE, SOURCE_PART, TARGET_PART,
};
use link_core::{
    LinkContext, LinkError, LinkEvent, LinkPeer, PeerBehavior, PeerId, PeerLink, PeerView,
};
use link_physics::{ConstraintLoad, PhysicsEngine};
use link_types::{
    BreakThresholds, JointConfig, LinkActor, LinkLimits, LinkState, PeerConfig, PeerRole,
};

/// Logs every hook it sees.
#[derive(Debug)]
struct Recorder {
    role: PeerRole,
    log: Rc<RefCell<Vec<String>>>,
    refuse_link: bool,
    fail_leave: bool,
}

impl Recorder {
    fn new(role: PeerRole, log: &Rc<RefCell<Vec<String>>>) -> Self {
        Self {
            role,
            log: Rc::clone(log),
            refuse_link: false,
            fail_leave: false,
        }
    }

    fn refusing(mut self) -> Self {
        self.refuse_link = true;
        self
    }

    fn failing_leave(mut self) -> Self {
        self.fail_leave = true;
        self
    }
}

impl PeerBehavior for Recorder {
    fn role(&self) -> PeerRole {
        self.role
    }

    fn on_state_leave(
        &mut self,
        _peer: &PeerView<'_>,
        state: LinkState,
        _ctx: &mut LinkContext<'_>,
    ) -> link_core::Result<()> {
        self.log.borrow_mut().push(format!("leave {state}"));
        if self.fail_leave {
            return Err(LinkError::aborted("teardown failed"));
        }
        Ok(())
    }

    fn on_state_enter(
        &mut self,
        _peer: &PeerView<'_>,
        state: LinkState,
        _ctx: &mut LinkContext<'_>,
    ) -> link_core::Result<()> {
        self.log.borrow_mut().push(format!("enter {state}"));
        if self.refuse_link && state == LinkState::Linked {
            return Err(LinkError::aborted("refused"));
        }
        Ok(())
    }

    fn on_peer_change(&mut self, peer: &PeerView<'_>, previous: Option<PeerLink>) {
        self.log.borrow_mut().push(format!(
            "peer {:?} -> {:?}",
            previous.map(|l| l.peer),
            peer.other.map(|l| l.peer)
        ));
    }
}

fn log() -> Rc<RefCell<Vec<String>>> {
    Rc::new(RefCell::new(Vec::new()))
}

// ============================================================================
// State machine
// ============================================================================

#[test]
fn reentering_a_state_runs_its_hooks() {
    let mut links = two_parts(3.0);
    let log = log();
    let id = links
        .add_peer(TARGET_PART, peer_config(), Box::new(Recorder::new(PeerRole::Target, &log)))
        .unwrap();
    links.start().unwrap();
    log.borrow_mut().clear();

    links.set_peer_state(id, LinkState::Available).unwrap();
    assert_eq!(*log.borrow(), vec!["leave Available", "enter Available"]);

    links.set_peer_state(id, LinkState::Linked).unwrap();
    links.set_peer_state(id, LinkState::Linked).unwrap();
    assert_eq!(
        log.borrow()[2..],
        ["leave Available", "enter Linked", "leave Linked", "enter Linked"]
    );
}

#[test]
fn transitions_outside_the_table_are_refused() {
    let mut links = two_parts(3.0);
    let log = log();
    let id = links
        .add_peer(TARGET_PART, peer_config(), Box::new(Recorder::new(PeerRole::Target, &log)))
        .unwrap();
    links.start().unwrap();
    links.set_peer_state(id, LinkState::Linked).unwrap();
    let before = log.borrow().len();

    let err = links.set_peer_state(id, LinkState::Locked).unwrap_err();
    assert_eq!(
        err,
        LinkError::InvalidTransition {
            peer: id,
            from: LinkState::Linked,
            to: LinkState::Locked,
        }
    );
    assert_eq!(links.state(id).unwrap(), LinkState::Linked);
    assert_eq!(log.borrow().len(), before);
}

#[test]
fn failing_leave_hook_still_releases_to_available() {
    let mut links = two_parts(3.0);
    let log = log();
    let behavior = Recorder::new(PeerRole::Target, &log).failing_leave();
    let id = links.add_peer(TARGET_PART, peer_config(), Box::new(behavior)).unwrap();
    links.start().unwrap();
    links.set_peer_state(id, LinkState::Linked).unwrap();

    // Re-entering Linked needs a clean teardown
    assert!(links.set_peer_state(id, LinkState::Linked).is_err());
    assert_eq!(links.state(id).unwrap(), LinkState::Linked);

    let err = links.set_peer_state(id, LinkState::Available).unwrap_err();
    assert_eq!(err, LinkError::aborted("teardown failed"));
    assert_eq!(links.state(id).unwrap(), LinkState::Available);
    assert_eq!(links.save_peer(id).unwrap().state, LinkState::Available);
    assert_eq!(log.borrow().last().unwrap(), "enter Available");
}

#[test]
fn transitions_before_start_are_refused() {
    let mut links = two_parts(3.0);
    let id = links.add_target(TARGET_PART, peer_config()).unwrap();

    let err = links.set_peer_state(id, LinkState::Locked).unwrap_err();
    assert_eq!(err, LinkError::MachineNotStarted(id));
    assert!(!links.peer(id).unwrap().is_started());
}

#[test]
fn peers_added_after_start_start_immediately() {
    let (mut links, _, _) = started_pair(JointConfig::default(), 3.0);
    let late = links.add_target(TARGET_PART, peer_config()).unwrap();
    assert!(links.peer(late).unwrap().is_started());
    assert!(links.start().is_ok());
}

#[test]
fn peer_change_hook_fires_when_nothing_changes() {
    let log = log();
    let mut peer = LinkPeer::new(
        PeerId(7),
        SOURCE_PART,
        peer_config(),
        Box::new(Recorder::new(PeerRole::Source, &log)),
    );

    peer.set_other_peer(None);
    peer.set_other_peer(None);
    assert_eq!(*log.borrow(), vec!["peer None -> None", "peer None -> None"]);

    let link = PeerLink {
        peer: PeerId(9),
        part: TARGET_PART,
    };
    peer.set_other_peer(Some(link));
    peer.set_other_peer(Some(link));
    assert_eq!(log.borrow().len(), 4);
    assert_eq!(peer.other_part(), Some(TARGET_PART));
}

// ============================================================================
// Linking
// ============================================================================

#[test]
fn linking_couples_the_parts() {
    let (mut links, source, target) = linked_pair(JointConfig::default(), 3.0);

    assert_eq!(links.state(source).unwrap(), LinkState::Linked);
    assert_eq!(links.state(target).unwrap(), LinkState::Linked);
    assert_eq!(links.peer(source).unwrap().other().unwrap().peer, target);
    assert_eq!(links.peer(target).unwrap().other().unwrap().peer, source);
    assert!(links.host_joint(SOURCE_PART, TARGET_PART).is_some());
    assert_eq!(links.drain_events(), vec![LinkEvent::Linked { source, target }]);
    assert!(links.drain_events().is_empty());
}

#[test]
fn breaking_from_the_target_releases_both_ends() {
    let (mut links, source, target) = linked_pair(JointConfig::default(), 3.0);
    links.drain_events();

    links.break_link(target, LinkActor::Manual).unwrap();

    assert_eq!(links.state(source).unwrap(), LinkState::Available);
    assert_eq!(links.state(target).unwrap(), LinkState::Available);
    assert!(links.peer(source).unwrap().other().is_none());
    assert!(links.peer(target).unwrap().other().is_none());
    assert!(links.host_joint(SOURCE_PART, TARGET_PART).is_none());
    assert_eq!(
        links.drain_events(),
        vec![LinkEvent::Broken {
            source,
            target,
            actor: LinkActor::Manual,
            constraint: None,
        }]
    );
}

#[test]
fn breaking_an_unlinked_peer_fails() {
    let (mut links, source, _) = started_pair(JointConfig::default(), 3.0);
    assert_eq!(
        links.break_link(source, LinkActor::Api),
        Err(LinkError::NotLinked(source))
    );
}

#[test]
fn existing_host_coupling_outlives_the_link() {
    let (mut links, source, target) = started_pair(JointConfig::default(), 3.0);
    let coupling = links
        .couple_parts(SOURCE_PART, TARGET_PART, BreakThresholds::unbreakable())
        .unwrap();

    links.link(source, target).unwrap();
    assert_eq!(links.host_joint(SOURCE_PART, TARGET_PART), Some(coupling));

    links.break_link(source, LinkActor::Api).unwrap();
    assert_eq!(links.host_joint(SOURCE_PART, TARGET_PART), Some(coupling));
}

#[test]
fn borrowed_host_coupling_gets_its_thresholds_back() {
    let host = BreakThresholds::new(500.0, 500.0);
    let joint = JointConfig::rigid(BreakThresholds::force_only(10.0));
    let (mut links, source, target) = started_pair(joint, 3.0);
    let coupling = links.couple_parts(SOURCE_PART, TARGET_PART, host).unwrap();

    links.link(source, target).unwrap();
    assert_eq!(
        links.engine().break_thresholds(coupling).unwrap(),
        BreakThresholds::force_only(10.0)
    );
    links.adjust_joint(source, true).unwrap();

    links.break_link(source, LinkActor::Manual).unwrap();
    assert_eq!(links.engine().break_thresholds(coupling).unwrap(), host);
}

#[test]
fn freeze_ends_with_the_link() {
    let breaks = BreakThresholds::new(300.0, 200.0);
    let (mut links, source, target) = linked_pair(JointConfig::rigid(breaks), 3.0);
    links.adjust_joint(source, true).unwrap();
    links.break_link(source, LinkActor::Manual).unwrap();

    links.link(source, target).unwrap();
    let coupling = links.host_joint(SOURCE_PART, TARGET_PART).unwrap();
    assert_eq!(links.engine().break_thresholds(coupling).unwrap(), breaks);
}

#[test]
fn link_refusals() {
    let (mut links, source, target) = started_pair(JointConfig::default(), 3.0);

    assert!(matches!(
        links.link(target, source),
        Err(LinkError::RoleMismatch {
            expected: PeerRole::Source,
            actual: PeerRole::Target,
            ..
        })
    ));

    let same_part = links.add_target(SOURCE_PART, peer_config()).unwrap();
    assert_eq!(
        links.link(source, same_part),
        Err(LinkError::SelfLink(SOURCE_PART))
    );

    let hose = links
        .add_target(TARGET_PART, PeerConfig::new("hose", NODE))
        .unwrap();
    assert!(matches!(
        links.link(source, hose),
        Err(LinkError::IncompatibleLinkType { .. })
    ));

    let nowhere = links
        .add_target(TARGET_PART, PeerConfig::new(LINK_TYPE, "nowhere"))
        .unwrap();
    assert!(links.peer(nowhere).unwrap().attach_node().is_none());
    assert_eq!(
        links.link(source, nowhere),
        Err(LinkError::MissingAttachNode(nowhere))
    );

    links.link(source, target).unwrap();
    let second = links.add_target(TARGET_PART, peer_config()).unwrap();
    assert_eq!(
        links.link(source, second),
        Err(LinkError::PeerNotAvailable {
            peer: source,
            state: LinkState::Linked,
        })
    );
    // Refusals never touch the peers
    assert_eq!(links.state(second).unwrap(), LinkState::Available);
    assert_eq!(links.state(target).unwrap(), LinkState::Linked);
}

#[test]
fn link_length_must_fit_the_source_limits() {
    let mut links = two_parts(3.0);
    let source = links
        .add_source(
            SOURCE_PART,
            peer_config().with_limits(LinkLimits::new(0.0, 1.0)),
            JointConfig::default(),
        )
        .unwrap();
    let target = links.add_target(TARGET_PART, peer_config()).unwrap();
    links.start().unwrap();

    match links.check_can_link(source, target) {
        Err(LinkError::LinkLengthOutOfRange { length, min, max }) => {
            assert!((length - 3.0).abs() < 1e-9);
            assert_eq!((min, max), (0.0, 1.0));
        }
        other => panic!("expected a length refusal, got {other:?}"),
    }
}

#[test]
fn linking_before_start_is_refused() {
    let mut links = two_parts(3.0);
    let source = links
        .add_source(SOURCE_PART, peer_config(), JointConfig::default())
        .unwrap();
    let target = links.add_target(TARGET_PART, peer_config()).unwrap();

    assert_eq!(
        links.link(source, target),
        Err(LinkError::MachineNotStarted(source))
    );
}

#[test]
fn failed_link_rolls_back_both_peers() {
    let mut links = two_parts(3.0);
    let log = log();
    let source = links
        .add_peer(
            SOURCE_PART,
            peer_config(),
            Box::new(Recorder::new(PeerRole::Source, &log).refusing()),
        )
        .unwrap();
    let target = links.add_target(TARGET_PART, peer_config()).unwrap();
    links.start().unwrap();

    let err = links.link(source, target).unwrap_err();
    assert!(err.is_aborted());
    for peer in [source, target] {
        assert_eq!(links.state(peer).unwrap(), LinkState::Available);
        assert!(links.peer(peer).unwrap().other().is_none());
    }
    assert!(links.drain_events().is_empty());
    assert!(log.borrow().iter().any(|entry| entry == "leave Linked"));
}

// ============================================================================
// Physical breaks and removal
// ============================================================================

#[test]
fn overloaded_coupling_breaks_the_link() {
    let (mut links, source, target) =
        linked_pair(JointConfig::rigid(BreakThresholds::force_only(10.0)), 3.0);
    links.drain_events();
    let coupling = links.host_joint(SOURCE_PART, TARGET_PART).unwrap();

    links
        .engine_mut()
        .apply_load(coupling, ConstraintLoad::force(20.0))
        .unwrap();
    links.step().unwrap();

    assert_eq!(
        links.drain_events(),
        vec![LinkEvent::Broken {
            source,
            target,
            actor: LinkActor::Physics,
            constraint: Some(coupling),
        }]
    );
    assert_eq!(links.state(source).unwrap(), LinkState::Available);
    assert_eq!(links.state(target).unwrap(), LinkState::Available);
    assert!(links.host_joint(SOURCE_PART, TARGET_PART).is_none());
}

#[test]
fn breaks_of_unlinked_constraints_are_ignored() {
    let (mut links, source, _) = started_pair(JointConfig::default(), 3.0);
    let coupling = links
        .couple_parts(SOURCE_PART, TARGET_PART, BreakThresholds::force_only(10.0))
        .unwrap();

    links
        .engine_mut()
        .apply_load(coupling, ConstraintLoad::force(20.0))
        .unwrap();
    links.step().unwrap();

    assert!(links.drain_events().is_empty());
    assert!(links.host_joint(SOURCE_PART, TARGET_PART).is_none());
    assert_eq!(links.state(source).unwrap(), LinkState::Available);
}

#[test]
fn adjusting_a_rigid_link_freezes_the_coupling() {
    let breaks = BreakThresholds::force_only(10.0);
    let (mut links, _, target) = linked_pair(JointConfig::rigid(breaks), 3.0);
    let coupling = links.host_joint(SOURCE_PART, TARGET_PART).unwrap();
    assert_eq!(links.engine().break_thresholds(coupling).unwrap(), breaks);

    links.adjust_joint(target, true).unwrap();
    assert!(links
        .engine()
        .break_thresholds(coupling)
        .unwrap()
        .is_unbreakable());

    links.adjust_joint(target, false).unwrap();
    assert_eq!(links.engine().break_thresholds(coupling).unwrap(), breaks);
}

#[test]
fn removing_a_part_severs_its_links() {
    let (mut links, source, target) = linked_pair(JointConfig::default(), 3.0);
    links.drain_events();
    let object = links.part(TARGET_PART).unwrap().object;

    links.remove_part(TARGET_PART).unwrap();

    let events = links.drain_events();
    assert_eq!(events.len(), 1);
    assert!(events[0].is_broken_by(LinkActor::Api));
    assert_eq!(links.state(source).unwrap(), LinkState::Available);
    assert!(links.peer(target).is_none());
    assert!(links.part(TARGET_PART).is_none());
    assert!(!links.engine().contains_object(object));
    assert!(links.peers_of(TARGET_PART).is_empty());
}
