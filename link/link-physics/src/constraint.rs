//! Handles and descriptions of scene objects and constraints.

use link_types::BreakThresholds;
use nalgebra::Point3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Handle of a scene object (a transform that may carry a rigid body).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ObjectId(pub u64);

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Object({})", self.0)
    }
}

/// Handle of a constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ConstraintId(pub u64);

impl std::fmt::Display for ConstraintId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Constraint({})", self.0)
    }
}

/// Kind of constraint primitive.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ConstraintKind {
    /// Free rotation, no translation relative to the anchor.
    Pivot {
        /// Maximum swing from the rest direction (degrees).
        cone_limit: Option<f64>,
    },
    /// Spring/damper along the separating axis with a distance limit.
    LinearSpring {
        /// Spring force.
        spring: f64,
        /// Spring damper.
        damper: f64,
        /// Maximum anchor separation (m).
        max_distance: Option<f64>,
    },
    /// No relative motion.
    Fixed,
}

impl ConstraintKind {
    /// A pivot without cone limit.
    #[must_use]
    pub const fn pivot() -> Self {
        Self::Pivot { cone_limit: None }
    }

    /// Check whether this is a pivot.
    #[must_use]
    pub const fn is_pivot(&self) -> bool {
        matches!(self, Self::Pivot { .. })
    }

    /// Check whether this is a linear spring.
    #[must_use]
    pub const fn is_linear(&self) -> bool {
        matches!(self, Self::LinearSpring { .. })
    }
}

/// Everything needed to create a constraint.
///
/// The constraint lives on `owner` and restricts its motion relative to
/// the rigid body of `connected`. Anchors are in the respective object's
/// local frame.
///
/// # Example
///
/// ```
/// use link_physics::{ConstraintKind, ConstraintSpec, ObjectId};
/// use link_types::BreakThresholds;
///
/// let spec = ConstraintSpec::new(ConstraintKind::pivot(), ObjectId(1), ObjectId(2))
///     .with_breaks(BreakThresholds::torque_only(30.0));
/// assert!(spec.breaks.force.is_infinite());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ConstraintSpec {
    /// Constraint primitive.
    pub kind: ConstraintKind,
    /// Object carrying the constraint (must have a rigid body).
    pub owner: ObjectId,
    /// Object whose rigid body the owner is constrained to.
    pub connected: ObjectId,
    /// Anchor in the owner's frame.
    pub anchor: Point3<f64>,
    /// Anchor in the connected object's frame.
    pub connected_anchor: Point3<f64>,
    /// Break thresholds.
    pub breaks: BreakThresholds,
}

impl ConstraintSpec {
    /// Create a spec with origin anchors and unbreakable thresholds.
    #[must_use]
    pub fn new(kind: ConstraintKind, owner: ObjectId, connected: ObjectId) -> Self {
        Self {
            kind,
            owner,
            connected,
            anchor: Point3::origin(),
            connected_anchor: Point3::origin(),
            breaks: BreakThresholds::unbreakable(),
        }
    }

    /// Set both anchors.
    #[must_use]
    pub fn with_anchors(mut self, anchor: Point3<f64>, connected_anchor: Point3<f64>) -> Self {
        self.anchor = anchor;
        self.connected_anchor = connected_anchor;
        self
    }

    /// Set break thresholds.
    #[must_use]
    pub fn with_breaks(mut self, breaks: BreakThresholds) -> Self {
        self.breaks = breaks;
        self
    }
}

/// Load carried by a constraint during one step.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ConstraintLoad {
    /// Linear force magnitude (N).
    pub force: f64,
    /// Torque magnitude (N·m).
    pub torque: f64,
}

impl ConstraintLoad {
    /// Create a load.
    #[must_use]
    pub const fn new(force: f64, torque: f64) -> Self {
        Self { force, torque }
    }

    /// Pure linear load.
    #[must_use]
    pub const fn force(force: f64) -> Self {
        Self { force, torque: 0.0 }
    }

    /// Pure rotational load.
    #[must_use]
    pub const fn torque(torque: f64) -> Self {
        Self { force: 0.0, torque }
    }

    /// Component-wise maximum.
    #[must_use]
    pub fn max(self, other: Self) -> Self {
        Self {
            force: self.force.max(other.force),
            torque: self.torque.max(other.torque),
        }
    }
}

/// Notification that a constraint broke and was removed.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ConstraintBreak {
    /// The constraint that broke (no longer valid).
    pub constraint: ConstraintId,
    /// Kind of the broken constraint.
    pub kind: ConstraintKind,
    /// Object that carried it.
    pub owner: ObjectId,
    /// Object it was connected to.
    pub connected: ObjectId,
    /// The load that broke it.
    pub load: ConstraintLoad,
}

/// Rest configuration captured by a constraint on its first step.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RestPose {
    /// Rotation of the owner relative to the connected body.
    pub relative_rotation: nalgebra::UnitQuaternion<f64>,
    /// World distance between the two anchors.
    pub length: f64,
    /// Step on which it was captured.
    pub captured_at: u64,
}
