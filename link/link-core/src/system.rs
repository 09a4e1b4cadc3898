//! The link system facade.
//!
//! [`LinkSystem`] owns the physics engine, the parts, the peers and every
//! collaborator a link needs, and is driven by one call to
//! [`LinkSystem::step`] per fixed physics step. Each step:
//!
//! 1. advances in-progress joint assemblies (aborted ones sever their link),
//! 2. steps the engine,
//! 3. routes constraint breaks to the link that owns the constraint.

use hashbrown::HashMap;
use link_physics::{ConstraintId, ObjectId, PhysicsEngine};
use link_types::{
    AttachNodeDef, BreakThresholds, JointConfig, LinkActor, LinkState, LinkSystemConfig, PartId,
    PeerConfig, PeerRole, Pose, VesselId,
};
use tracing::{debug, error, info, warn};

use crate::breakage::BreakageRouter;
use crate::connector::{ConnectorSet, HighlightRefresher, NoHighlight, PhysicalConnector, Reparent};
use crate::context::{LinkContext, PeerAnchor};
use crate::driver::SimulationDriver;
use crate::error::{LinkError, Result};
use crate::event::LinkEvent;
use crate::host::HostJoints;
use crate::joint::{self, build_assembly, JointAssembly};
use crate::node::AttachNode;
use crate::part::{Part, PartDesc, PartTable, MODEL_ROOT};
use crate::peer::{
    LinkPeer, PeerBehavior, PeerId, PeerLink, PeerSnapshot, SourceBehavior, TargetBehavior,
};

struct World<E> {
    config: LinkSystemConfig,
    engine: E,
    parts: PartTable,
    connectors: ConnectorSet,
    driver: SimulationDriver,
    router: BreakageRouter,
    host_joints: HostJoints,
    highlighter: Box<dyn HighlightRefresher>,
}

impl<E: PhysicsEngine> World<E> {
    fn context(&mut self, counterpart: Option<PeerAnchor>) -> LinkContext<'_> {
        LinkContext {
            engine: &mut self.engine,
            parts: &mut self.parts,
            connectors: &mut self.connectors,
            driver: &mut self.driver,
            router: &mut self.router,
            host_joints: &mut self.host_joints,
            config: &self.config,
            counterpart,
        }
    }

    fn refresh_highlights(&mut self, moves: &[Reparent]) {
        for reparent in moves {
            self.highlighter
                .refresh(reparent.old_parent.unwrap_or(reparent.object));
            self.highlighter
                .refresh(reparent.new_parent.unwrap_or(reparent.object));
        }
    }
}

/// Links between parts simulated by a physics engine.
///
/// # Example
///
/// ```
/// use link_core::{LinkSystem, PartDesc};
/// use link_physics::HeadlessPhysics;
/// use link_types::{
///     AttachNodeDef, JointConfig, LinkState, LinkSystemConfig, PartId, PeerConfig, Point3,
///     Pose, Vector3, VesselId,
/// };
///
/// let mut links = LinkSystem::new(LinkSystemConfig::default(), HeadlessPhysics::new()).unwrap();
/// links.add_vessel(VesselId(1), false);
/// links.add_part(PartDesc::new(PartId(1), VesselId(1), 100.0)).unwrap();
/// links
///     .add_part(
///         PartDesc::new(PartId(2), VesselId(1), 100.0)
///             .with_pose(Pose::from_position(Point3::new(0.0, 0.0, 2.0))),
///     )
///     .unwrap();
///
/// let node = AttachNodeDef::new(Point3::origin(), Vector3::z()).unwrap();
/// links.add_attach_node(PartId(1), "top", node).unwrap();
/// links.add_attach_node(PartId(2), "top", node).unwrap();
///
/// let source = links
///     .add_source(PartId(1), PeerConfig::new("dock", "top"), JointConfig::default())
///     .unwrap();
/// let target = links.add_target(PartId(2), PeerConfig::new("dock", "top")).unwrap();
/// links.start().unwrap();
///
/// links.link(source, target).unwrap();
/// assert_eq!(links.state(source).unwrap(), LinkState::Linked);
/// assert_eq!(links.state(target).unwrap(), LinkState::Linked);
/// ```
pub struct LinkSystem<E: PhysicsEngine> {
    world: World<E>,
    peers: HashMap<PeerId, LinkPeer>,
    events: Vec<LinkEvent>,
    next_peer: u64,
    started: bool,
}

impl<E: PhysicsEngine> LinkSystem<E> {
    /// Create a link system driving `engine`.
    pub fn new(config: LinkSystemConfig, engine: E) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            world: World {
                config,
                engine,
                parts: PartTable::new(),
                connectors: ConnectorSet::new(),
                driver: SimulationDriver::new(),
                router: BreakageRouter::new(),
                host_joints: HostJoints::new(),
                highlighter: Box::new(NoHighlight),
            },
            peers: HashMap::new(),
            events: Vec::new(),
            next_peer: 0,
            started: false,
        })
    }

    /// Route highlight refreshes to `highlighter`.
    #[must_use]
    pub fn with_highlighter(mut self, highlighter: Box<dyn HighlightRefresher>) -> Self {
        self.world.highlighter = highlighter;
        self
    }

    /// Configuration.
    #[must_use]
    pub fn config(&self) -> &LinkSystemConfig {
        &self.world.config
    }

    /// The physics engine.
    #[must_use]
    pub fn engine(&self) -> &E {
        &self.world.engine
    }

    /// The physics engine, mutably.
    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.world.engine
    }

    /// Whether [`start`](Self::start) has run.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.started
    }

    // ========================================================================
    // Vessels and parts
    // ========================================================================

    /// Register a vessel and its activation mode.
    pub fn add_vessel(&mut self, vessel: VesselId, packed: bool) {
        self.world.driver.add_vessel(vessel, packed);
    }

    /// Whether a vessel is in reduced simulation.
    #[must_use]
    pub fn is_vessel_packed(&self, vessel: VesselId) -> bool {
        self.world.driver.is_packed(vessel)
    }

    /// Switch a vessel between full and reduced simulation.
    ///
    /// Connectors subscribed to the vessel follow the change, and both
    /// hierarchies each of them moved between get a highlight refresh.
    pub fn set_vessel_packed(&mut self, vessel: VesselId, packed: bool) -> Result<()> {
        let objects = self.world.driver.set_packed(vessel, packed);
        let mut moves = Vec::with_capacity(objects.len());
        for object in objects {
            let w = &mut self.world;
            if let Some(reparent) =
                w.connectors
                    .on_activation_change(&mut w.engine, &w.parts, object, packed)?
            {
                moves.push(reparent);
            }
        }
        self.world.refresh_highlights(&moves);
        Ok(())
    }

    /// Instantiate a part: a rigid body with a model root.
    pub fn add_part(&mut self, desc: PartDesc) -> Result<()> {
        if self.world.parts.contains(desc.id) {
            return Err(LinkError::DuplicatePart(desc.id));
        }
        if !desc.mass.is_finite() || desc.mass <= 0.0 {
            return Err(link_types::ConfigError::invalid_value(
                "mass",
                format!("{} must be positive and finite", desc.mass),
            )
            .into());
        }

        let engine = &mut self.world.engine;
        let object = engine.create_object(&desc.name, None, desc.pose)?;
        engine.add_rigid_body(object, desc.mass)?;
        let model_root = engine.create_object(MODEL_ROOT, Some(object), Pose::identity())?;
        self.world
            .router
            .attach(&mut self.world.engine, object, desc.id)?;
        self.world
            .parts
            .insert(Part::new(desc.id, desc.vessel, object, model_root))?;
        debug!(part = %desc.id, vessel = %desc.vessel, "part added");
        Ok(())
    }

    /// Look up a part.
    #[must_use]
    pub fn part(&self, id: PartId) -> Option<&Part> {
        self.world.parts.get(id)
    }

    /// All parts.
    #[must_use]
    pub fn parts(&self) -> &PartTable {
        &self.world.parts
    }

    /// Give a part a named attach node.
    pub fn add_attach_node(
        &mut self,
        part: PartId,
        name: &str,
        definition: AttachNodeDef,
    ) -> Result<ObjectId> {
        let p = self.world.parts.part_mut(part)?;
        let object =
            self.world
                .engine
                .create_object(name, Some(p.model_root), definition.local_pose())?;
        p.register_node(AttachNode {
            name: name.to_string(),
            object,
            definition: Some(definition),
            dynamic: false,
        });
        Ok(object)
    }

    /// Remove a part, severing its links with [`LinkActor::Api`] and
    /// destroying its connectors and peers.
    pub fn remove_part(&mut self, part: PartId) -> Result<()> {
        self.world.parts.part(part)?;

        for id in self.peers_of(part) {
            if self.peers.get(&id).is_some_and(|p| p.state() == LinkState::Linked) {
                if let Err(err) = self.sever(id, LinkActor::Api, None) {
                    warn!(peer = %id, error = %err, "failed to sever link of removed part");
                }
            }
        }
        for object in self.world.connectors.owned_by(part) {
            self.world.context(None).release(object)?;
        }

        self.peers.retain(|_, p| p.part() != part);
        self.world.router.forget_part(part);
        self.world.host_joints.forget_part(part);
        if let Some(removed) = self.world.parts.remove(part) {
            if self.world.engine.contains_object(removed.object) {
                self.world.engine.destroy_object(removed.object)?;
            }
        }
        debug!(part = %part, "part removed");
        Ok(())
    }

    /// Move a part to another vessel.
    ///
    /// Synthesized attach nodes of its peers are unregistered, and its
    /// connectors follow the new vessel's activation mode.
    pub fn decouple_part(&mut self, part: PartId, vessel: VesselId) -> Result<()> {
        self.world.parts.part_mut(part)?.vessel = vessel;
        for id in self.peers_of(part) {
            self.with_peer(id, None, |peer, ctx| peer.on_decouple(ctx))?;
        }

        let moves = {
            let w = &mut self.world;
            w.connectors
                .rebind_owner(&mut w.engine, &w.parts, &mut w.driver, part)?
        };
        self.world.refresh_highlights(&moves);
        debug!(part = %part, vessel = %vessel, "part decoupled");
        Ok(())
    }

    /// Rigidly couple two parts the way the host does.
    pub fn couple_parts(
        &mut self,
        a: PartId,
        b: PartId,
        breaks: BreakThresholds,
    ) -> Result<ConstraintId> {
        let w = &mut self.world;
        w.host_joints.couple(&mut w.engine, &w.parts, a, b, breaks)
    }

    /// Live host coupling between two parts.
    #[must_use]
    pub fn host_joint(&self, a: PartId, b: PartId) -> Option<ConstraintId> {
        self.world.host_joints.find(&self.world.engine, a, b)
    }

    // ========================================================================
    // Peers
    // ========================================================================

    /// Add a source peer owning a joint assembly built from `joint`.
    pub fn add_source(
        &mut self,
        part: PartId,
        config: PeerConfig,
        joint: JointConfig,
    ) -> Result<PeerId> {
        joint.validate()?;
        let behavior = SourceBehavior::new(build_assembly(&joint));
        self.add_peer(part, config, Box::new(behavior))
    }

    /// Add a target peer.
    pub fn add_target(&mut self, part: PartId, config: PeerConfig) -> Result<PeerId> {
        self.add_peer(part, config, Box::new(TargetBehavior))
    }

    /// Add a peer with custom behaviour.
    ///
    /// The attach node is resolved immediately. Peers added after
    /// [`start`](Self::start) start their machine right away.
    pub fn add_peer(
        &mut self,
        part: PartId,
        config: PeerConfig,
        behavior: Box<dyn PeerBehavior>,
    ) -> Result<PeerId> {
        self.world.parts.part(part)?;
        config.validate()?;

        self.next_peer += 1;
        let id = PeerId(self.next_peer);
        let mut peer = LinkPeer::new(id, part, config, behavior);
        peer.resolve_attach_node(&mut self.world.context(None))?;
        if self.started {
            peer.start_machine()?;
        }
        debug!(peer = %id, part = %part, role = %peer.role(), "peer added");
        self.peers.insert(id, peer);
        Ok(id)
    }

    /// Look up a peer.
    #[must_use]
    pub fn peer(&self, id: PeerId) -> Option<&LinkPeer> {
        self.peers.get(&id)
    }

    /// Peers on a part, in creation order.
    #[must_use]
    pub fn peers_of(&self, part: PartId) -> Vec<PeerId> {
        let mut ids: Vec<_> = self
            .peers
            .values()
            .filter(|p| p.part() == part)
            .map(LinkPeer::id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Current state of a peer.
    pub fn state(&self, id: PeerId) -> Result<LinkState> {
        Ok(self.get_peer(id)?.state())
    }

    /// Load persisted peer state. Only valid before the peer starts.
    pub fn load_peer(&mut self, id: PeerId, snapshot: &PeerSnapshot) -> Result<()> {
        self.with_peer(id, None, |peer, ctx| peer.load(snapshot, ctx))
    }

    /// Persisted form of a peer.
    pub fn save_peer(&self, id: PeerId) -> Result<PeerSnapshot> {
        Ok(self.get_peer(id)?.save())
    }

    /// Transition a peer directly, running its hooks.
    ///
    /// Entering `Linked` builds against the peer's current counterpart.
    pub fn set_peer_state(&mut self, id: PeerId, next: LinkState) -> Result<()> {
        let counterpart = if next == LinkState::Linked {
            self.get_peer(id)?
                .other()
                .and_then(|o| self.anchor_of(o.peer).ok())
        } else {
            None
        };
        self.with_peer(id, counterpart, |peer, ctx| peer.set_state(next, ctx))
    }

    /// Start every peer and restore persisted links.
    ///
    /// Targets restore before sources, so a source re-entering `Linked`
    /// finds its target already linked and rebuilds the joint against it.
    /// A peer whose counterpart cannot be found falls back to `Available`.
    pub fn start(&mut self) -> Result<()> {
        if self.started {
            return Ok(());
        }
        let ids = self.sorted_peer_ids();
        for id in &ids {
            if let Some(peer) = self.peers.get_mut(id) {
                peer.start_machine()?;
            }
        }
        self.started = true;

        for role in [PeerRole::Target, PeerRole::Source] {
            for id in &ids {
                let restoring = self
                    .peers
                    .get(id)
                    .is_some_and(|p| p.role() == role && p.state() == LinkState::Linked);
                if restoring {
                    self.restore_link(*id);
                }
            }
        }
        self.check_restored_links();

        for id in &ids {
            self.with_peer(*id, None, |peer, ctx| peer.on_start_finished(ctx))?;
        }
        info!(peers = ids.len(), "link system started");
        Ok(())
    }

    fn restore_link(&mut self, id: PeerId) {
        let Some(other) = self.find_counterpart(id) else {
            let other_part = self.peers.get(&id).and_then(LinkPeer::other_part);
            warn!(peer = %id, other_part = ?other_part, "counterpart not found, link dropped");
            self.force_available(id);
            return;
        };

        let Some((link, other_node)) = self.link_to(other) else {
            return;
        };
        let counterpart = self.anchor_of(other).ok();
        let restored = self.with_peer(id, counterpart, |peer, ctx| {
            peer.set_other_peer(Some(link));
            peer.set_other_attach_node(Some(other_node));
            peer.set_state(LinkState::Linked, ctx)
        });
        match restored {
            Ok(()) => debug!(peer = %id, other = %other, "link restored"),
            Err(err) => {
                warn!(peer = %id, other = %other, error = %err, "failed to rebuild link, dropped");
                self.force_available(id);
            }
        }
    }

    /// The saved counterpart of a `Linked` peer.
    ///
    /// Both ends must name each other: part, role, link type and, when
    /// saved, each other's attach node. A candidate already restored
    /// against a different peer is taken.
    fn find_counterpart(&self, id: PeerId) -> Option<PeerId> {
        let peer = self.peers.get(&id)?;
        let other_part = peer.other_part()?;
        let own_node = peer.config().attach_node.as_str();
        self.sorted_peer_ids().into_iter().find(|candidate| {
            *candidate != id
                && !self.is_claimed(*candidate, id)
                && self.peers.get(candidate).is_some_and(|q| {
                    q.part() == other_part
                        && q.role() == peer.role().opposite()
                        && q.link_type() == peer.link_type()
                        && q.state() == LinkState::Linked
                        && q.other_part() == Some(peer.part())
                        && peer
                            .other_attach_node()
                            .map_or(true, |node| q.config().attach_node == node)
                        && q.other_attach_node().map_or(true, |node| node == own_node)
                        && q.other().map_or(true, |o| o.peer == id)
                })
        })
    }

    /// Whether a peer other than `by` already points at `candidate`.
    fn is_claimed(&self, candidate: PeerId, by: PeerId) -> bool {
        self.peers
            .values()
            .any(|p| p.id() != by && p.other().is_some_and(|o| o.peer == candidate))
    }

    /// Counterpart reference and attach node name of `other`.
    fn link_to(&self, other: PeerId) -> Option<(PeerLink, String)> {
        let peer = self.peers.get(&other)?;
        let link = PeerLink {
            peer: other,
            part: peer.part(),
        };
        Some((link, peer.config().attach_node.clone()))
    }

    /// Force every `Linked` peer whose counterpart does not link back.
    fn check_restored_links(&mut self) {
        for id in self.sorted_peer_ids() {
            let Some(peer) = self.peers.get(&id) else {
                continue;
            };
            if peer.state() != LinkState::Linked {
                continue;
            }
            let mirrored = peer
                .other()
                .and_then(|o| self.peers.get(&o.peer))
                .is_some_and(|q| {
                    q.state() == LinkState::Linked && q.other().map(|o| o.peer) == Some(id)
                });
            if !mirrored {
                warn!(peer = %id, "counterpart does not link back, link dropped");
                self.force_available(id);
            }
        }
    }

    fn force_available(&mut self, id: PeerId) {
        let result = self.with_peer(id, None, |peer, ctx| {
            if peer.state() != LinkState::Available {
                peer.set_state(LinkState::Available, ctx)?;
            }
            peer.set_other_peer(None);
            Ok(())
        });
        if let Err(err) = result {
            error!(peer = %id, error = %err, "failed to reset peer to Available");
        }
    }

    // ========================================================================
    // Linking
    // ========================================================================

    /// Check whether `source` may link to `target`.
    pub fn check_can_link(&self, source: PeerId, target: PeerId) -> Result<()> {
        let s = self.get_peer(source)?;
        let t = self.get_peer(target)?;

        for (peer, id, expected) in [(s, source, PeerRole::Source), (t, target, PeerRole::Target)] {
            if peer.role() != expected {
                return Err(LinkError::RoleMismatch {
                    peer: id,
                    expected,
                    actual: peer.role(),
                });
            }
            if !peer.is_started() {
                return Err(LinkError::MachineNotStarted(id));
            }
        }
        if s.part() == t.part() {
            return Err(LinkError::SelfLink(s.part()));
        }
        if !s.config().is_compatible_with(t.config()) {
            return Err(LinkError::IncompatibleLinkType {
                source_type: s.link_type().to_string(),
                target_type: t.link_type().to_string(),
            });
        }
        for (peer, id) in [(s, source), (t, target)] {
            if peer.state() != LinkState::Available {
                return Err(LinkError::PeerNotAvailable {
                    peer: id,
                    state: peer.state(),
                });
            }
        }

        let s_node = s.attach_node().ok_or(LinkError::MissingAttachNode(source))?;
        let t_node = t.attach_node().ok_or(LinkError::MissingAttachNode(target))?;
        let length = self
            .world
            .engine
            .world_pose(s_node.object)?
            .distance_to(&self.world.engine.world_pose(t_node.object)?);
        let limits = &s.config().limits;
        if !limits.contains(length) {
            return Err(LinkError::LinkLengthOutOfRange {
                length,
                min: limits.min_length,
                max: limits.max_length,
            });
        }
        Ok(())
    }

    /// Link a source to a target.
    ///
    /// Both peers lock while negotiating, then the target and finally the
    /// source enter `Linked`; the source builds the joint. Any failure
    /// returns both peers to `Available`.
    pub fn link(&mut self, source: PeerId, target: PeerId) -> Result<()> {
        self.check_can_link(source, target)?;
        let target_anchor = self.anchor_of(target)?;
        let source_part = self.get_peer(source)?.part();

        let negotiated = self.negotiate(
            PeerLink {
                peer: source,
                part: source_part,
            },
            target_anchor,
        );
        if let Err(err) = negotiated {
            warn!(source = %source, target = %target, error = %err, "link failed, rolling back");
            self.force_available(source);
            self.force_available(target);
            return Err(err);
        }

        info!(source = %source, target = %target, "link established");
        self.events.push(LinkEvent::Linked { source, target });
        Ok(())
    }

    fn negotiate(&mut self, source: PeerLink, target: PeerAnchor) -> Result<()> {
        for peer in [source.peer, target.peer] {
            self.with_peer(peer, None, |p, ctx| p.set_state(LinkState::Locked, ctx))?;
        }
        let source_node = self.get_peer(source.peer)?.config().attach_node.clone();
        let target_node = self.get_peer(target.peer)?.config().attach_node.clone();

        self.with_peer(source.peer, None, |p, _| {
            p.set_other_peer(Some(PeerLink {
                peer: target.peer,
                part: target.part,
            }));
            p.set_other_attach_node(Some(target_node));
            Ok(())
        })?;
        self.with_peer(target.peer, None, |p, ctx| {
            p.set_other_peer(Some(source));
            p.set_other_attach_node(Some(source_node));
            p.set_state(LinkState::Linked, ctx)
        })?;
        self.with_peer(source.peer, Some(target), |p, ctx| {
            p.set_state(LinkState::Linked, ctx)
        })
    }

    /// Sever the link a peer is part of.
    pub fn break_link(&mut self, peer: PeerId, actor: LinkActor) -> Result<()> {
        self.sever(peer, actor, None)
    }

    fn sever(&mut self, id: PeerId, actor: LinkActor, constraint: Option<ConstraintId>) -> Result<()> {
        let peer = self.get_peer(id)?;
        if peer.state() != LinkState::Linked {
            return Err(LinkError::NotLinked(id));
        }
        let other = peer.other().map(|o| o.peer);
        let (source, target) = match peer.role() {
            PeerRole::Source => (id, other),
            PeerRole::Target => match other {
                Some(source) => (source, Some(id)),
                None => (id, None),
            },
        };

        // The counterpart is only touched if it links back to this peer
        let counterpart = other.filter(|o| {
            self.peers
                .get(o)
                .is_some_and(|q| q.other().map(|l| l.peer) == Some(id))
        });
        let order: Vec<PeerId> = if peer.role() == PeerRole::Source {
            std::iter::once(id).chain(counterpart).collect()
        } else {
            counterpart.into_iter().chain(std::iter::once(id)).collect()
        };

        let mut first_error = None;
        for member in order {
            let result = self.with_peer(member, None, |p, ctx| {
                if p.state() == LinkState::Linked {
                    p.set_state(LinkState::Available, ctx)?;
                }
                p.set_other_peer(None);
                Ok(())
            });
            if let Err(err) = result {
                error!(peer = %member, error = %err, "failed to release link");
                first_error.get_or_insert(err);
            }
        }

        info!(source = %source, target = ?target, %actor, "link broken");
        self.events.push(LinkEvent::Broken {
            source,
            target: target.unwrap_or(id),
            actor,
            constraint,
        });
        first_error.map_or(Ok(()), Err)
    }

    /// Freeze a link's joint, or restore its configured thresholds.
    pub fn adjust_joint(&mut self, peer: PeerId, unbreakable: bool) -> Result<()> {
        self.with_joint(peer, |joint, ctx| joint.adjust_joint(unbreakable, ctx))
    }

    /// Change the length of a cable link.
    pub fn set_cable_length(&mut self, peer: PeerId, length: f64) -> Result<()> {
        self.with_joint(peer, |joint, ctx| joint.set_max_length(length, ctx))
    }

    /// Joint assembly of the link a peer is part of.
    #[must_use]
    pub fn joint(&self, peer: PeerId) -> Option<&dyn JointAssembly> {
        let source = self.source_of(peer).ok()?;
        self.peers.get(&source)?.joint()
    }

    /// Stretch ratio of the link a peer is part of, for cables.
    #[must_use]
    pub fn stretch_ratio(&self, peer: PeerId) -> Option<f64> {
        self.joint(peer)?.stretch_ratio()
    }

    /// Whether the link's cable is stretched past the configured epsilon.
    #[must_use]
    pub fn is_stretched(&self, peer: PeerId) -> bool {
        self.stretch_ratio(peer)
            .is_some_and(|ratio| joint::is_stretched(ratio, self.world.config.stretch_epsilon))
    }

    // ========================================================================
    // Connectors
    // ========================================================================

    /// Promote an object to an independently simulated body owned by `owner`.
    pub fn promote(
        &mut self,
        owner: PartId,
        object: ObjectId,
        mass: f64,
        interaction_distance: Option<f64>,
    ) -> Result<()> {
        self.world
            .context(None)
            .promote(owner, object, mass, interaction_distance)
    }

    /// Demote a promoted object. Returns `false` if it was never promoted.
    pub fn demote(&mut self, object: ObjectId) -> Result<bool> {
        self.world.context(None).demote(object)
    }

    /// Connector record of a promoted object.
    #[must_use]
    pub fn connector(&self, object: ObjectId) -> Option<&PhysicalConnector> {
        self.world.connectors.get(object)
    }

    // ========================================================================
    // Stepping
    // ========================================================================

    /// Run one fixed step.
    pub fn step(&mut self) -> Result<()> {
        let mut aborted = Vec::new();
        for id in self.sorted_peer_ids() {
            let Some(peer) = self.peers.get_mut(&id) else {
                continue;
            };
            if peer.role() != PeerRole::Source || peer.state() != LinkState::Linked {
                continue;
            }
            let Some(joint) = peer.joint_mut() else {
                continue;
            };
            if let Err(err) = joint.fixed_update(&mut self.world.context(None)) {
                error!(peer = %id, error = %err, "joint update failed, severing link");
                aborted.push(id);
            }
        }
        for id in aborted {
            if let Err(err) = self.sever(id, LinkActor::Api, None) {
                warn!(peer = %id, error = %err, "failed to sever aborted link");
            }
        }

        let timestep = self.world.config.timestep;
        self.world.engine.step(timestep)?;

        for event in self.world.engine.drain_break_events() {
            let Some(request) = self.world.router.route(&event) else {
                warn!(constraint = %event.constraint, owner = %event.owner, "break with no listener");
                continue;
            };
            match self.owner_of_constraint(request.constraint) {
                Some(source) => {
                    if let Err(err) = self.sever(source, request.actor, Some(request.constraint)) {
                        warn!(peer = %source, error = %err, "failed to sever broken link");
                    }
                }
                None => debug!(
                    constraint = %request.constraint,
                    part = %request.part,
                    "broken constraint belongs to no live link"
                ),
            }
        }
        Ok(())
    }

    /// Take the link events since the last call.
    pub fn drain_events(&mut self) -> Vec<LinkEvent> {
        std::mem::take(&mut self.events)
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn get_peer(&self, id: PeerId) -> Result<&LinkPeer> {
        self.peers.get(&id).ok_or(LinkError::UnknownPeer(id))
    }

    fn sorted_peer_ids(&self) -> Vec<PeerId> {
        let mut ids: Vec<_> = self.peers.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    fn with_peer<R>(
        &mut self,
        id: PeerId,
        counterpart: Option<PeerAnchor>,
        f: impl FnOnce(&mut LinkPeer, &mut LinkContext<'_>) -> Result<R>,
    ) -> Result<R> {
        let peer = self.peers.get_mut(&id).ok_or(LinkError::UnknownPeer(id))?;
        let mut ctx = self.world.context(counterpart);
        f(peer, &mut ctx)
    }

    fn with_joint<R>(
        &mut self,
        peer: PeerId,
        f: impl FnOnce(&mut dyn JointAssembly, &mut LinkContext<'_>) -> Result<R>,
    ) -> Result<R> {
        let source = self.source_of(peer)?;
        self.with_peer(source, None, |p, ctx| match p.joint_mut() {
            Some(joint) => f(joint, ctx),
            None => Err(LinkError::NotLinked(peer)),
        })
    }

    fn source_of(&self, id: PeerId) -> Result<PeerId> {
        let peer = self.get_peer(id)?;
        match peer.role() {
            PeerRole::Source => Ok(id),
            PeerRole::Target => peer
                .other()
                .filter(|_| peer.state() == LinkState::Linked)
                .map(|o| o.peer)
                .ok_or(LinkError::NotLinked(id)),
        }
    }

    fn anchor_of(&self, id: PeerId) -> Result<PeerAnchor> {
        let peer = self.get_peer(id)?;
        let node = peer
            .attach_node()
            .ok_or(LinkError::MissingAttachNode(id))?;
        Ok(PeerAnchor {
            peer: id,
            part: peer.part(),
            body: self.world.parts.part(peer.part())?.object,
            node: node.object,
        })
    }

    fn owner_of_constraint(&self, constraint: ConstraintId) -> Option<PeerId> {
        self.sorted_peer_ids().into_iter().find(|id| {
            self.peers.get(id).is_some_and(|p| {
                p.role() == PeerRole::Source
                    && p.state() == LinkState::Linked
                    && p.joint().is_some_and(|j| j.owns_constraint(constraint))
            })
        })
    }
}
