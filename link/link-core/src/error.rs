//! Error types for link operations.

use link_physics::PhysicsError;
use link_types::{ConfigError, JointVariant, LinkState, PartId, PeerRole};
use thiserror::Error;

use crate::PeerId;

/// Errors that can occur while coordinating links.
///
/// Expected control flow never surfaces here: a constraint breaking, an
/// optional attach node missing or a counterpart that cannot be restored
/// are logged and recovered. These variants describe requests that cannot
/// be honoured.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LinkError {
    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The physics engine rejected an operation.
    #[error(transparent)]
    Physics(#[from] PhysicsError),

    /// No peer with this id.
    #[error("unknown peer: {0}")]
    UnknownPeer(PeerId),

    /// No part with this id.
    #[error("unknown part: {0}")]
    UnknownPart(PartId),

    /// A part with this id already exists.
    #[error("duplicate part: {0}")]
    DuplicatePart(PartId),

    /// The transition table does not allow this state change.
    #[error("{peer}: transition {from} -> {to} not allowed")]
    InvalidTransition {
        /// Peer being transitioned.
        peer: PeerId,
        /// Current state.
        from: LinkState,
        /// Requested state.
        to: LinkState,
    },

    /// The peer's state machine has not been started yet.
    #[error("{0}: state machine not started")]
    MachineNotStarted(PeerId),

    /// The peer's state machine is already running.
    #[error("{0}: state machine already started")]
    AlreadyStarted(PeerId),

    /// The peer has the wrong role for this operation.
    #[error("{peer}: expected a {expected} peer, found a {actual}")]
    RoleMismatch {
        /// Offending peer.
        peer: PeerId,
        /// Role the operation needs.
        expected: PeerRole,
        /// Role the peer has.
        actual: PeerRole,
    },

    /// The two peers carry different link types.
    #[error("link type '{source_type}' cannot link to '{target_type}'")]
    IncompatibleLinkType {
        /// Link type of the source.
        source_type: String,
        /// Link type of the target.
        target_type: String,
    },

    /// The peer is not free to start a link.
    #[error("{peer} is {state}, not available")]
    PeerNotAvailable {
        /// Busy peer.
        peer: PeerId,
        /// Its current state.
        state: LinkState,
    },

    /// Source and target live on the same part.
    #[error("cannot link {0} to itself")]
    SelfLink(PartId),

    /// The peer has no resolved attach node.
    #[error("{0} has no attach node")]
    MissingAttachNode(PeerId),

    /// The attach nodes are too close together or too far apart.
    #[error("link length {length:.3} outside [{min}, {max}]")]
    LinkLengthOutOfRange {
        /// Distance between the attach nodes.
        length: f64,
        /// Minimum allowed.
        min: f64,
        /// Maximum allowed.
        max: f64,
    },

    /// The peer is not linked.
    #[error("{0} is not linked")]
    NotLinked(PeerId),

    /// The joint variant cannot do this.
    #[error("{variant} joint does not support {operation}")]
    Unsupported {
        /// Joint variant asked.
        variant: JointVariant,
        /// What was asked.
        operation: &'static str,
    },

    /// A joint assembly found its own structure inconsistent and gave up.
    #[error("joint assembly aborted: {reason}")]
    AssemblyAborted {
        /// What was inconsistent.
        reason: String,
    },
}

impl LinkError {
    /// Create an assembly aborted error.
    #[must_use]
    pub fn aborted(reason: impl Into<String>) -> Self {
        Self::AssemblyAborted {
            reason: reason.into(),
        }
    }

    /// Check if this error is a refused link request rather than a fault.
    #[must_use]
    pub fn is_link_refusal(&self) -> bool {
        matches!(
            self,
            Self::RoleMismatch { .. }
                | Self::IncompatibleLinkType { .. }
                | Self::PeerNotAvailable { .. }
                | Self::SelfLink(_)
                | Self::MissingAttachNode(_)
                | Self::LinkLengthOutOfRange { .. }
        )
    }

    /// Check if this error is an assembly abort.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::AssemblyAborted { .. })
    }
}

/// Result type for link operations.
pub type Result<T> = std::result::Result<T, LinkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refusals() {
        assert!(LinkError::SelfLink(PartId(1)).is_link_refusal());
        assert!(!LinkError::NotLinked(PeerId(1)).is_link_refusal());
        assert!(LinkError::aborted("pivot missing").is_aborted());
    }

    #[test]
    fn test_physics_error_converts() {
        let err: LinkError = PhysicsError::invalid_parameter("bad").into();
        assert!(matches!(err, LinkError::Physics(_)));
        assert_eq!(err.to_string(), "invalid parameter: bad");
    }
}
