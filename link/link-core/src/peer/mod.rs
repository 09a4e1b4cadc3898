//! Link peers and their state machine.
//!
//! A peer is one end of a potential link. Its state lives in two places:
//! the persisted field, which is what a save file holds, and the live
//! [`LinkStateMachine`], which is authoritative once started. Every
//! transition goes through [`LinkPeer::set_state`]:
//!
//! 1. the transition is checked against [`LinkState::allowed_transitions`],
//! 2. the leave hook of the current state undoes everything that state set
//!    up,
//! 3. the machine and the persisted field take the new state,
//! 4. the enter hook of the new state sets it up from scratch.
//!
//! Re-entering the current state runs both hooks, which is how a restored
//! `Linked` peer rebuilds its joint.
//!
//! Role specific behaviour sits behind [`PeerBehavior`].

mod snapshot;
mod source;
mod target;

pub use snapshot::{JointSnapshot, PeerSnapshot};
pub use source::SourceBehavior;
pub use target::TargetBehavior;

use std::fmt;

use link_types::{LinkState, PartId, PeerConfig, PeerRole};
use tracing::{debug, warn};

use crate::context::LinkContext;
use crate::error::{LinkError, Result};
use crate::joint::JointAssembly;
use crate::node::{self, AttachNode};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Identifier of a peer within a link system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PeerId(pub u64);

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Peer({})", self.0)
    }
}

/// Reference to a counterpart peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerLink {
    /// The counterpart.
    pub peer: PeerId,
    /// Its part.
    pub part: PartId,
}

/// The live state machine of a started peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkStateMachine {
    current: LinkState,
}

impl LinkStateMachine {
    /// Start a machine in the given state.
    #[must_use]
    pub const fn new(initial: LinkState) -> Self {
        Self { current: initial }
    }

    /// Current state.
    #[must_use]
    pub const fn current(&self) -> LinkState {
        self.current
    }
}

/// Read-only view of a peer handed to its behaviour.
#[derive(Debug, Clone, Copy)]
pub struct PeerView<'a> {
    /// The peer.
    pub id: PeerId,
    /// Its part.
    pub part: PartId,
    /// Its configuration.
    pub config: &'a PeerConfig,
    /// Its counterpart.
    pub other: Option<PeerLink>,
    /// Its attach node.
    pub attach_node: Option<&'a AttachNode>,
}

/// Role specific hooks of a peer.
///
/// Hooks run after the peer's own bookkeeping on enter and before it on
/// leave.
pub trait PeerBehavior: fmt::Debug {
    /// Which end of a link this peer is.
    fn role(&self) -> PeerRole;

    /// Undo everything `state` set up.
    fn on_state_leave(
        &mut self,
        _peer: &PeerView<'_>,
        _state: LinkState,
        _ctx: &mut LinkContext<'_>,
    ) -> Result<()> {
        Ok(())
    }

    /// Set up `state` without assuming anything about the previous one.
    fn on_state_enter(
        &mut self,
        _peer: &PeerView<'_>,
        _state: LinkState,
        _ctx: &mut LinkContext<'_>,
    ) -> Result<()> {
        Ok(())
    }

    /// The counterpart reference was set, possibly to the same value.
    fn on_peer_change(&mut self, _peer: &PeerView<'_>, _previous: Option<PeerLink>) {}

    /// Joint assembly, for peers that own one.
    fn joint(&self) -> Option<&dyn JointAssembly> {
        None
    }

    /// Joint assembly, mutably.
    fn joint_mut(&mut self) -> Option<&mut dyn JointAssembly> {
        None
    }
}

/// One end of a potential link.
#[derive(Debug)]
pub struct LinkPeer {
    id: PeerId,
    part: PartId,
    config: PeerConfig,
    persisted_state: LinkState,
    machine: Option<LinkStateMachine>,
    other: Option<PeerLink>,
    other_part: Option<PartId>,
    other_attach_node: Option<String>,
    attach_node: Option<AttachNode>,
    behavior: Box<dyn PeerBehavior>,
}

impl LinkPeer {
    /// Create an available peer.
    #[must_use]
    pub fn new(
        id: PeerId,
        part: PartId,
        config: PeerConfig,
        behavior: Box<dyn PeerBehavior>,
    ) -> Self {
        Self {
            id,
            part,
            config,
            persisted_state: LinkState::Available,
            machine: None,
            other: None,
            other_part: None,
            other_attach_node: None,
            attach_node: None,
            behavior,
        }
    }

    /// Identifier.
    #[must_use]
    pub fn id(&self) -> PeerId {
        self.id
    }

    /// Owning part.
    #[must_use]
    pub fn part(&self) -> PartId {
        self.part
    }

    /// Configuration.
    #[must_use]
    pub fn config(&self) -> &PeerConfig {
        &self.config
    }

    /// Link type tag.
    #[must_use]
    pub fn link_type(&self) -> &str {
        &self.config.link_type
    }

    /// Role.
    #[must_use]
    pub fn role(&self) -> PeerRole {
        self.behavior.role()
    }

    /// Current state: the machine's once started, the persisted one before.
    #[must_use]
    pub fn state(&self) -> LinkState {
        self.machine
            .map_or(self.persisted_state, |m| m.current())
    }

    /// Persisted state.
    #[must_use]
    pub fn persisted_state(&self) -> LinkState {
        self.persisted_state
    }

    /// Whether the state machine is running.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.machine.is_some()
    }

    /// Counterpart reference.
    #[must_use]
    pub fn other(&self) -> Option<PeerLink> {
        self.other
    }

    /// Persisted part id of the counterpart.
    #[must_use]
    pub fn other_part(&self) -> Option<PartId> {
        self.other_part
    }

    /// Persisted attach node name of the counterpart.
    #[must_use]
    pub fn other_attach_node(&self) -> Option<&str> {
        self.other_attach_node.as_deref()
    }

    /// Resolved attach node.
    #[must_use]
    pub fn attach_node(&self) -> Option<&AttachNode> {
        self.attach_node.as_ref()
    }

    /// Joint assembly, for source peers.
    #[must_use]
    pub fn joint(&self) -> Option<&dyn JointAssembly> {
        self.behavior.joint()
    }

    pub(crate) fn joint_mut(&mut self) -> Option<&mut dyn JointAssembly> {
        self.behavior.joint_mut()
    }

    fn split(&mut self) -> (PeerView<'_>, &mut dyn PeerBehavior) {
        (
            PeerView {
                id: self.id,
                part: self.part,
                config: &self.config,
                other: self.other,
                attach_node: self.attach_node.as_ref(),
            },
            self.behavior.as_mut(),
        )
    }

    /// Start the live state machine from the persisted state.
    ///
    /// No hooks run; restoring re-applies the state explicitly.
    pub fn start_machine(&mut self) -> Result<()> {
        if self.machine.is_some() {
            return Err(LinkError::AlreadyStarted(self.id));
        }
        self.machine = Some(LinkStateMachine::new(self.persisted_state));
        Ok(())
    }

    /// Transition to `next`, running the leave and enter hooks.
    ///
    /// The state is committed before the enter hook runs; if the hook
    /// fails the peer is in `next` with a partial setup that the next
    /// transition's leave hook must clean up.
    ///
    /// A failing leave hook aborts the transition, except towards
    /// `Available`: there the peer still commits `Available` and the
    /// hook's error is returned afterwards.
    pub fn set_state(&mut self, next: LinkState, ctx: &mut LinkContext<'_>) -> Result<()> {
        let from = self
            .machine
            .map(|m| m.current())
            .ok_or(LinkError::MachineNotStarted(self.id))?;
        if !from.can_transition_to(next) {
            return Err(LinkError::InvalidTransition {
                peer: self.id,
                from,
                to: next,
            });
        }

        let left = self.leave_state(from, ctx);
        if let Err(err) = left {
            if next != LinkState::Available {
                return Err(err);
            }
            warn!(peer = %self.id, %from, error = %err, "leave hook failed, releasing anyway");
            self.commit(from, next);
            if let Err(enter) = self.enter_state(next, ctx) {
                warn!(peer = %self.id, error = %enter, "enter hook failed after release");
            }
            return Err(err);
        }
        self.commit(from, next);
        self.enter_state(next, ctx)
    }

    fn commit(&mut self, from: LinkState, next: LinkState) {
        self.machine = Some(LinkStateMachine::new(next));
        self.persisted_state = next;
        debug!(peer = %self.id, role = %self.role(), %from, to = %next, "state transition");
    }

    fn leave_state(&mut self, state: LinkState, ctx: &mut LinkContext<'_>) -> Result<()> {
        let (view, behavior) = self.split();
        let left = behavior.on_state_leave(&view, state, ctx);

        if state == LinkState::Linked {
            if let Some(node) = &self.attach_node {
                node::unregister_dynamic(ctx.parts.part_mut(self.part)?, node);
            }
        }
        left
    }

    fn enter_state(&mut self, state: LinkState, ctx: &mut LinkContext<'_>) -> Result<()> {
        if state == LinkState::Linked {
            if let Some(node) = &self.attach_node {
                node::ensure_registered(ctx.parts.part_mut(self.part)?, node, ctx.config.scene);
            }
        }

        let (view, behavior) = self.split();
        behavior.on_state_enter(&view, state, ctx)
    }

    /// Set the counterpart reference. The hook fires even when nothing
    /// changes.
    ///
    /// Clearing the counterpart also forgets its attach node name.
    pub fn set_other_peer(&mut self, other: Option<PeerLink>) {
        let previous = self.other;
        self.other = other;
        self.other_part = other.map(|o| o.part);
        if other.is_none() {
            self.other_attach_node = None;
        }
        let (view, behavior) = self.split();
        behavior.on_peer_change(&view, previous);
    }

    /// Record the attach node name of the counterpart, saved with the link.
    pub fn set_other_attach_node(&mut self, node: Option<String>) {
        self.other_attach_node = node;
    }

    /// Resolve the configured attach node if not resolved yet.
    pub fn resolve_attach_node(&mut self, ctx: &mut LinkContext<'_>) -> Result<Option<&AttachNode>> {
        let stale = self
            .attach_node
            .as_ref()
            .is_some_and(|n| n.name != self.config.attach_node);
        if self.attach_node.is_none() || stale {
            let part = ctx.parts.part_mut(self.part)?;
            self.attach_node =
                node::resolve_attach_node(ctx.engine, part, &self.config, ctx.config.scene)?;
        }
        Ok(self.attach_node.as_ref())
    }

    /// Load persisted state.
    ///
    /// Only allowed before the machine starts. A persisted `Locked` is a
    /// leftover of an interrupted negotiation and loads as `Available`.
    pub fn load(&mut self, snapshot: &PeerSnapshot, ctx: &mut LinkContext<'_>) -> Result<()> {
        if self.machine.is_some() {
            return Err(LinkError::AlreadyStarted(self.id));
        }
        if snapshot.state == LinkState::Locked {
            warn!(peer = %self.id, "persisted Locked state normalized to Available");
        } else if snapshot.state == LinkState::Linked && snapshot.other_part.is_none() {
            warn!(peer = %self.id, "persisted Linked state without counterpart, loading as Available");
        }
        let snapshot = snapshot.clone().normalized();

        self.persisted_state = snapshot.state;
        self.other_part = snapshot.other_part;
        self.other_attach_node = snapshot.other_attach_node;
        self.other = None;
        self.config.link_type = snapshot.link_type;
        self.config.attach_node = snapshot.attach_node;
        self.config.attach_node_definition = snapshot.attach_node_definition;

        match (snapshot.joint, self.behavior.joint_mut()) {
            (Some(saved), Some(joint)) if saved.variant == joint.variant() => joint.restore(&saved),
            (Some(saved), Some(joint)) => warn!(
                peer = %self.id,
                saved = %saved.variant,
                configured = %joint.variant(),
                "persisted joint variant differs from configuration, ignored"
            ),
            _ => {}
        }

        self.resolve_attach_node(ctx)?;
        Ok(())
    }

    /// Persisted form of the peer.
    #[must_use]
    pub fn save(&self) -> PeerSnapshot {
        let state = self.state().persisted();
        let linked = state == LinkState::Linked;
        PeerSnapshot {
            state,
            other_part: self.other_part.filter(|_| linked),
            other_attach_node: self.other_attach_node.clone().filter(|_| linked),
            link_type: self.config.link_type.clone(),
            attach_node: self.config.attach_node.clone(),
            attach_node_definition: self.config.attach_node_definition.clone(),
            joint: self.behavior.joint().map(|j| j.snapshot()),
        }
    }

    /// Startup is complete: drop a synthesized node nobody uses.
    pub fn on_start_finished(&mut self, ctx: &mut LinkContext<'_>) -> Result<()> {
        if self.state() != LinkState::Linked {
            if let Some(node) = &self.attach_node {
                node::unregister_dynamic(ctx.parts.part_mut(self.part)?, node);
            }
        }
        Ok(())
    }

    /// The part was decoupled from its vessel.
    pub fn on_decouple(&mut self, ctx: &mut LinkContext<'_>) -> Result<()> {
        if let Some(node) = &self.attach_node {
            node::unregister_dynamic(ctx.parts.part_mut(self.part)?, node);
        }
        Ok(())
    }
}
