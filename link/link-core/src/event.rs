//! Notifications for whoever presents links.

use link_physics::ConstraintId;
use link_types::LinkActor;

use crate::PeerId;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Something happened to a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum LinkEvent {
    /// A source and a target became linked.
    Linked {
        /// The source peer.
        source: PeerId,
        /// The target peer.
        target: PeerId,
    },
    /// A link was severed.
    Broken {
        /// The source peer.
        source: PeerId,
        /// The target peer.
        target: PeerId,
        /// Who severed it.
        actor: LinkActor,
        /// The constraint whose break caused it, for physical breaks.
        constraint: Option<ConstraintId>,
    },
}

impl LinkEvent {
    /// Source peer of the link.
    #[must_use]
    pub const fn source(&self) -> PeerId {
        match self {
            Self::Linked { source, .. } | Self::Broken { source, .. } => *source,
        }
    }

    /// Whether the event is a break with the given actor.
    #[must_use]
    pub fn is_broken_by(&self, by: LinkActor) -> bool {
        matches!(self, Self::Broken { actor, .. } if *actor == by)
    }
}
