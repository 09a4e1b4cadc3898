//! Source peer: the end that owns the joint.

use link_types::{LinkState, PeerRole};
use tracing::debug;

use super::{PeerBehavior, PeerView};
use crate::context::{LinkContext, PeerAnchor};
use crate::error::{LinkError, Result};
use crate::joint::JointAssembly;

/// Behaviour of a link source.
///
/// Entering `Linked` builds the joint against the counterpart anchor the
/// context carries; leaving `Linked` drops it.
#[derive(Debug)]
pub struct SourceBehavior {
    joint: Box<dyn JointAssembly>,
}

impl SourceBehavior {
    /// Create a source owning `joint`.
    #[must_use]
    pub fn new(joint: Box<dyn JointAssembly>) -> Self {
        Self { joint }
    }
}

impl PeerBehavior for SourceBehavior {
    fn role(&self) -> PeerRole {
        PeerRole::Source
    }

    fn on_state_leave(
        &mut self,
        peer: &PeerView<'_>,
        state: LinkState,
        ctx: &mut LinkContext<'_>,
    ) -> Result<()> {
        if state == LinkState::Linked {
            debug!(peer = %peer.id, variant = %self.joint.variant(), "dropping joint");
            self.joint.drop_joint(ctx)?;
        }
        Ok(())
    }

    fn on_state_enter(
        &mut self,
        peer: &PeerView<'_>,
        state: LinkState,
        ctx: &mut LinkContext<'_>,
    ) -> Result<()> {
        if state != LinkState::Linked {
            return Ok(());
        }
        let node = peer
            .attach_node
            .ok_or(LinkError::MissingAttachNode(peer.id))?;
        let source = PeerAnchor {
            peer: peer.id,
            part: peer.part,
            body: ctx.parts.part(peer.part)?.object,
            node: node.object,
        };
        let target = ctx
            .counterpart
            .ok_or_else(|| LinkError::aborted(format!("{} has no counterpart to build against", peer.id)))?;

        debug!(peer = %peer.id, target = %target.peer, variant = %self.joint.variant(), "creating joint");
        self.joint.create_joint(&source, &target, ctx)
    }

    fn joint(&self) -> Option<&dyn JointAssembly> {
        Some(self.joint.as_ref())
    }

    fn joint_mut(&mut self) -> Option<&mut dyn JointAssembly> {
        Some(self.joint.as_mut())
    }
}
