//! Error types for physics engine operations.

use thiserror::Error;

use crate::{ConstraintId, ObjectId};

/// Errors reported by a [`PhysicsEngine`](crate::PhysicsEngine).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PhysicsError {
    /// The object does not exist (never created, or destroyed).
    #[error("unknown object: {0}")]
    UnknownObject(ObjectId),

    /// The constraint does not exist (never created, destroyed, or broken).
    #[error("unknown constraint: {0}")]
    UnknownConstraint(ConstraintId),

    /// The object has no rigid body.
    #[error("{0} has no rigid body")]
    NoRigidBody(ObjectId),

    /// Re-parenting would make an object its own ancestor.
    #[error("cannot parent {object} under {parent}: would create a cycle")]
    HierarchyCycle {
        /// Object being re-parented.
        object: ObjectId,
        /// Requested parent.
        parent: ObjectId,
    },

    /// A constraint or body parameter is out of range.
    #[error("invalid parameter: {reason}")]
    InvalidParameter {
        /// What is wrong.
        reason: String,
    },
}

impl PhysicsError {
    /// Create an invalid parameter error.
    #[must_use]
    pub fn invalid_parameter(reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            reason: reason.into(),
        }
    }

    /// Check if this error means a handle went stale.
    #[must_use]
    pub fn is_stale_handle(&self) -> bool {
        matches!(self, Self::UnknownObject(_) | Self::UnknownConstraint(_))
    }
}

/// Result type for physics operations.
pub type Result<T> = std::result::Result<T, PhysicsError>;
