//! The physics engine contract consumed by the link engine.

use link_types::{BreakThresholds, Pose, Twist};

use crate::constraint::{ConstraintBreak, ConstraintId, ConstraintSpec, ObjectId};
use crate::error::Result;

/// Operations the link engine needs from a rigid-body physics engine.
///
/// The engine owns a scene graph of objects. Any object may carry a rigid
/// body and constraints. The trait is object safe; the link engine drives
/// it through `&mut dyn PhysicsEngine`.
///
/// # Semantics an implementation must honour
///
/// - Destroying an object destroys its children, its rigid body, its
///   trigger volume and every constraint that touches it, without
///   reporting breaks.
/// - [`set_parent`](Self::set_parent) keeps the object's world pose.
/// - A new constraint captures its rest pose during the first
///   [`step`](Self::step) after creation. Reconfiguring the bodies before
///   that step changes what is captured.
/// - A constraint whose step load exceeds either of its
///   [`BreakThresholds`] is removed and reported by
///   [`drain_break_events`](Self::drain_break_events).
pub trait PhysicsEngine {
    // ------------------------------------------------------------------
    // Scene graph
    // ------------------------------------------------------------------

    /// Create an object under `parent` (or at the root) at a local pose.
    fn create_object(&mut self, name: &str, parent: Option<ObjectId>, local: Pose)
        -> Result<ObjectId>;

    /// Destroy an object and everything attached to it.
    fn destroy_object(&mut self, object: ObjectId) -> Result<()>;

    /// Check whether an object exists.
    fn contains_object(&self, object: ObjectId) -> bool;

    /// Name an object was created with.
    fn object_name(&self, object: ObjectId) -> Result<String>;

    /// Find a direct child by name.
    fn find_child(&self, parent: ObjectId, name: &str) -> Option<ObjectId>;

    /// Current parent of an object.
    fn parent(&self, object: ObjectId) -> Result<Option<ObjectId>>;

    /// Re-parent an object, keeping its world pose.
    fn set_parent(&mut self, object: ObjectId, parent: Option<ObjectId>) -> Result<()>;

    /// World pose of an object.
    fn world_pose(&self, object: ObjectId) -> Result<Pose>;

    /// Move an object to a world pose.
    fn set_world_pose(&mut self, object: ObjectId, pose: Pose) -> Result<()>;

    /// Pose of an object relative to its parent.
    fn local_pose(&self, object: ObjectId) -> Result<Pose>;

    // ------------------------------------------------------------------
    // Rigid bodies
    // ------------------------------------------------------------------

    /// Attach a rigid body. Does nothing if one is already attached.
    fn add_rigid_body(&mut self, object: ObjectId, mass: f64) -> Result<()>;

    /// Remove the rigid body and every constraint that touches it.
    fn remove_rigid_body(&mut self, object: ObjectId) -> Result<()>;

    /// Check whether an object carries a rigid body.
    fn has_rigid_body(&self, object: ObjectId) -> bool;

    /// Mass of a rigid body.
    fn mass(&self, object: ObjectId) -> Result<f64>;

    /// Whether a rigid body is kinematic (not simulated).
    fn is_kinematic(&self, object: ObjectId) -> Result<bool>;

    /// Switch a rigid body between kinematic and simulated.
    fn set_kinematic(&mut self, object: ObjectId, kinematic: bool) -> Result<()>;

    /// Velocity of a rigid body.
    fn velocity(&self, object: ObjectId) -> Result<Twist>;

    /// Set the velocity of a rigid body.
    fn set_velocity(&mut self, object: ObjectId, twist: Twist) -> Result<()>;

    /// Recompute inertia tensor and centre of mass from geometry.
    fn reset_mass_distribution(&mut self, object: ObjectId) -> Result<()>;

    /// Attach a non-physical trigger volume of the given size.
    fn add_trigger_volume(&mut self, object: ObjectId, size: f64) -> Result<()>;

    /// Remove the trigger volume, if any.
    fn remove_trigger_volume(&mut self, object: ObjectId) -> Result<()>;

    // ------------------------------------------------------------------
    // Constraints
    // ------------------------------------------------------------------

    /// Create a constraint.
    fn create_constraint(&mut self, spec: ConstraintSpec) -> Result<ConstraintId>;

    /// Destroy a constraint without reporting a break.
    fn destroy_constraint(&mut self, constraint: ConstraintId) -> Result<()>;

    /// Check whether a constraint exists.
    fn contains_constraint(&self, constraint: ConstraintId) -> bool;

    /// Current break thresholds of a constraint.
    fn break_thresholds(&self, constraint: ConstraintId) -> Result<BreakThresholds>;

    /// Replace the break thresholds of a constraint.
    fn set_break_thresholds(
        &mut self,
        constraint: ConstraintId,
        breaks: BreakThresholds,
    ) -> Result<()>;

    /// Change the distance limit of a linear spring constraint.
    fn set_linear_limit(&mut self, constraint: ConstraintId, max_distance: f64) -> Result<()>;

    /// Constraints owned by or connected to an object.
    fn constraints_of(&self, object: ObjectId) -> Vec<ConstraintId>;

    // ------------------------------------------------------------------
    // Stepping
    // ------------------------------------------------------------------

    /// Simulate one fixed step.
    fn step(&mut self, dt: f64) -> Result<()>;

    /// Number of steps simulated so far.
    fn step_count(&self) -> u64;

    /// Take the break notifications queued since the last call.
    fn drain_break_events(&mut self) -> Vec<ConstraintBreak>;
}
