//! In-memory physics engine.
//!
//! [`HeadlessPhysics`] implements the [`PhysicsEngine`] contract without a
//! solver. It keeps a transform hierarchy, rigid-body flags, constraints
//! and their break thresholds, which is everything the link engine
//! observes. Bodies that are simulated and unparented drift with their
//! velocity; constraints do not pull on anything.
//!
//! Loads are either injected with [`HeadlessPhysics::apply_load`] or, for
//! a linear spring with a distance limit, derived from how far the
//! anchors are stretched past the limit:
//!
//! ```text
//! F = spring · max(0, |a - b| - max_distance)
//! ```
//!
//! # Example
//!
//! ```
//! use link_physics::{ConstraintKind, ConstraintLoad, ConstraintSpec, HeadlessPhysics, PhysicsEngine};
//! use link_types::{BreakThresholds, Pose};
//!
//! let mut engine = HeadlessPhysics::new();
//! let a = engine.create_object("a", None, Pose::identity()).unwrap();
//! let b = engine.create_object("b", None, Pose::identity()).unwrap();
//! engine.add_rigid_body(a, 1.0).unwrap();
//! engine.add_rigid_body(b, 1.0).unwrap();
//!
//! let pivot = engine
//!     .create_constraint(
//!         ConstraintSpec::new(ConstraintKind::pivot(), a, b)
//!             .with_breaks(BreakThresholds::torque_only(10.0)),
//!     )
//!     .unwrap();
//!
//! engine.apply_load(pivot, ConstraintLoad::torque(11.0)).unwrap();
//! engine.step(0.02).unwrap();
//!
//! assert!(!engine.contains_constraint(pivot));
//! assert_eq!(engine.drain_break_events().len(), 1);
//! ```

use hashbrown::HashMap;
use link_types::{BreakThresholds, Pose, Twist};
use nalgebra::{Matrix3, Point3, UnitQuaternion};
use tracing::debug;

use crate::constraint::{
    ConstraintBreak, ConstraintId, ConstraintKind, ConstraintLoad, ConstraintSpec, ObjectId,
    RestPose,
};
use crate::engine::PhysicsEngine;
use crate::error::{PhysicsError, Result};

/// Rigid-body state tracked by the headless engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigidBody {
    /// Mass (kg).
    pub mass: f64,
    /// Kinematic bodies are moved by their transform, not simulated.
    pub kinematic: bool,
    /// Current velocity.
    pub velocity: Twist,
    /// Centre of mass in the object's frame.
    pub center_of_mass: Point3<f64>,
    /// Inertia tensor about the centre of mass.
    pub inertia: Matrix3<f64>,
}

impl RigidBody {
    fn new(mass: f64) -> Self {
        Self {
            mass,
            kinematic: false,
            velocity: Twist::zero(),
            center_of_mass: Point3::origin(),
            inertia: geometric_inertia(mass),
        }
    }
}

/// Inertia of the unit-diameter sphere every headless body is assumed to be.
fn geometric_inertia(mass: f64) -> Matrix3<f64> {
    Matrix3::identity() * (0.1 * mass)
}

#[derive(Debug, Clone)]
struct SceneObject {
    name: String,
    parent: Option<ObjectId>,
    children: Vec<ObjectId>,
    local: Pose,
    body: Option<RigidBody>,
    trigger: Option<f64>,
}

#[derive(Debug, Clone)]
struct Constraint {
    spec: ConstraintSpec,
    rest: Option<RestPose>,
    pending: ConstraintLoad,
}

/// A physics engine that only tracks state.
#[derive(Debug, Clone, Default)]
pub struct HeadlessPhysics {
    objects: HashMap<ObjectId, SceneObject>,
    constraints: HashMap<ConstraintId, Constraint>,
    next_object: u64,
    next_constraint: u64,
    steps: u64,
    breaks: Vec<ConstraintBreak>,
}

impl HeadlessPhysics {
    /// Create an empty engine.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn object(&self, id: ObjectId) -> Result<&SceneObject> {
        self.objects.get(&id).ok_or(PhysicsError::UnknownObject(id))
    }

    fn object_mut(&mut self, id: ObjectId) -> Result<&mut SceneObject> {
        self.objects
            .get_mut(&id)
            .ok_or(PhysicsError::UnknownObject(id))
    }

    fn body(&self, id: ObjectId) -> Result<&RigidBody> {
        self.object(id)?
            .body
            .as_ref()
            .ok_or(PhysicsError::NoRigidBody(id))
    }

    fn body_mut(&mut self, id: ObjectId) -> Result<&mut RigidBody> {
        self.object_mut(id)?
            .body
            .as_mut()
            .ok_or(PhysicsError::NoRigidBody(id))
    }

    fn constraint(&self, id: ConstraintId) -> Result<&Constraint> {
        self.constraints
            .get(&id)
            .ok_or(PhysicsError::UnknownConstraint(id))
    }

    fn constraint_mut(&mut self, id: ConstraintId) -> Result<&mut Constraint> {
        self.constraints
            .get_mut(&id)
            .ok_or(PhysicsError::UnknownConstraint(id))
    }

    /// The object and all its descendants, parents first.
    fn subtree(&self, root: ObjectId) -> Vec<ObjectId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if let Some(obj) = self.objects.get(&id) {
                out.push(id);
                stack.extend(obj.children.iter().copied());
            }
        }
        out
    }

    fn remove_constraints_touching(&mut self, objects: &[ObjectId]) {
        self.constraints.retain(|_, c| {
            !objects.contains(&c.spec.owner) && !objects.contains(&c.spec.connected)
        });
    }

    fn anchor_positions(&self, spec: &ConstraintSpec) -> Result<(Point3<f64>, Point3<f64>)> {
        let owner = self.world_pose(spec.owner)?;
        let connected = self.world_pose(spec.connected)?;
        Ok((
            owner.transform_point(&spec.anchor),
            connected.transform_point(&spec.connected_anchor),
        ))
    }

    fn capture_rest(&self, spec: &ConstraintSpec, step: u64) -> Result<RestPose> {
        let owner = self.world_pose(spec.owner)?;
        let connected = self.world_pose(spec.connected)?;
        let (a, b) = self.anchor_positions(spec)?;
        Ok(RestPose {
            relative_rotation: connected.rotation.inverse() * owner.rotation,
            length: (b - a).norm(),
            captured_at: step,
        })
    }

    fn step_load(&self, constraint: &Constraint) -> Result<ConstraintLoad> {
        let mut load = constraint.pending;
        if let ConstraintKind::LinearSpring {
            spring,
            max_distance: Some(max_distance),
            ..
        } = constraint.spec.kind
        {
            let (a, b) = self.anchor_positions(&constraint.spec)?;
            let stretch = (b - a).norm() - max_distance;
            if stretch > 0.0 && spring.is_finite() {
                load = load.max(ConstraintLoad::force(spring * stretch));
            }
        }
        Ok(load)
    }

    fn validate_kind(kind: &ConstraintKind) -> Result<()> {
        match *kind {
            ConstraintKind::Pivot {
                cone_limit: Some(angle),
            } if !(0.0..=180.0).contains(&angle) => Err(PhysicsError::invalid_parameter(
                format!("cone limit {angle} not in [0, 180] degrees"),
            )),
            ConstraintKind::LinearSpring {
                spring,
                damper,
                max_distance,
            } => {
                if spring.is_nan() || spring < 0.0 || damper.is_nan() || damper < 0.0 {
                    return Err(PhysicsError::invalid_parameter(format!(
                        "spring {spring} / damper {damper} must be non-negative"
                    )));
                }
                match max_distance {
                    Some(d) if !d.is_finite() || d < 0.0 => Err(PhysicsError::invalid_parameter(
                        format!("max distance {d} must be finite and non-negative"),
                    )),
                    _ => Ok(()),
                }
            }
            _ => Ok(()),
        }
    }

    // ------------------------------------------------------------------
    // Inspection and load injection
    // ------------------------------------------------------------------

    /// Add a load to a constraint for the next step.
    ///
    /// Loads applied several times before a step combine component-wise by
    /// maximum.
    pub fn apply_load(&mut self, constraint: ConstraintId, load: ConstraintLoad) -> Result<()> {
        let c = self.constraint_mut(constraint)?;
        c.pending = c.pending.max(load);
        Ok(())
    }

    /// Rest pose captured by a constraint, if a step has run since creation.
    #[must_use]
    pub fn rest_pose(&self, constraint: ConstraintId) -> Option<RestPose> {
        self.constraints.get(&constraint).and_then(|c| c.rest)
    }

    /// Spec of a live constraint.
    #[must_use]
    pub fn constraint_spec(&self, constraint: ConstraintId) -> Option<&ConstraintSpec> {
        self.constraints.get(&constraint).map(|c| &c.spec)
    }

    /// Kind of a live constraint, with its current parameters.
    #[must_use]
    pub fn constraint_kind(&self, constraint: ConstraintId) -> Option<ConstraintKind> {
        self.constraints.get(&constraint).map(|c| c.spec.kind)
    }

    /// Rigid body of an object.
    #[must_use]
    pub fn rigid_body(&self, object: ObjectId) -> Option<&RigidBody> {
        self.objects.get(&object).and_then(|o| o.body.as_ref())
    }

    /// Trigger volume size of an object.
    #[must_use]
    pub fn trigger_volume(&self, object: ObjectId) -> Option<f64> {
        self.objects.get(&object).and_then(|o| o.trigger)
    }

    /// Direct children of an object.
    #[must_use]
    pub fn children(&self, object: ObjectId) -> Vec<ObjectId> {
        self.objects
            .get(&object)
            .map(|o| o.children.clone())
            .unwrap_or_default()
    }

    /// Number of live objects.
    #[must_use]
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Number of live constraints.
    #[must_use]
    pub fn constraint_count(&self) -> usize {
        self.constraints.len()
    }

    /// All live constraints, in creation order.
    #[must_use]
    pub fn constraint_ids(&self) -> Vec<ConstraintId> {
        let mut ids: Vec<_> = self.constraints.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

impl PhysicsEngine for HeadlessPhysics {
    fn create_object(
        &mut self,
        name: &str,
        parent: Option<ObjectId>,
        local: Pose,
    ) -> Result<ObjectId> {
        if let Some(parent) = parent {
            self.object(parent)?;
        }
        if !local.is_finite() {
            return Err(PhysicsError::invalid_parameter(format!(
                "non-finite pose for '{name}'"
            )));
        }

        self.next_object += 1;
        let id = ObjectId(self.next_object);
        self.objects.insert(
            id,
            SceneObject {
                name: name.to_string(),
                parent,
                children: Vec::new(),
                local,
                body: None,
                trigger: None,
            },
        );
        if let Some(parent) = parent {
            self.object_mut(parent)?.children.push(id);
        }
        Ok(id)
    }

    fn destroy_object(&mut self, object: ObjectId) -> Result<()> {
        let parent = self.object(object)?.parent;
        let doomed = self.subtree(object);
        self.remove_constraints_touching(&doomed);
        for id in &doomed {
            self.objects.remove(id);
        }
        if let Some(parent) = parent {
            if let Some(p) = self.objects.get_mut(&parent) {
                p.children.retain(|c| *c != object);
            }
        }
        Ok(())
    }

    fn contains_object(&self, object: ObjectId) -> bool {
        self.objects.contains_key(&object)
    }

    fn object_name(&self, object: ObjectId) -> Result<String> {
        Ok(self.object(object)?.name.clone())
    }

    fn find_child(&self, parent: ObjectId, name: &str) -> Option<ObjectId> {
        self.objects.get(&parent)?.children.iter().copied().find(|c| {
            self.objects
                .get(c)
                .is_some_and(|child| child.name == name)
        })
    }

    fn parent(&self, object: ObjectId) -> Result<Option<ObjectId>> {
        Ok(self.object(object)?.parent)
    }

    fn set_parent(&mut self, object: ObjectId, parent: Option<ObjectId>) -> Result<()> {
        let world = self.world_pose(object)?;
        let parent_world = match parent {
            Some(p) => {
                let mut cursor = Some(p);
                while let Some(id) = cursor {
                    if id == object {
                        return Err(PhysicsError::HierarchyCycle { object, parent: p });
                    }
                    cursor = self.object(id)?.parent;
                }
                self.world_pose(p)?
            }
            None => Pose::identity(),
        };

        let old_parent = self.object(object)?.parent;
        if let Some(old) = old_parent {
            if let Some(o) = self.objects.get_mut(&old) {
                o.children.retain(|c| *c != object);
            }
        }
        if let Some(p) = parent {
            self.object_mut(p)?.children.push(object);
        }

        let obj = self.object_mut(object)?;
        obj.parent = parent;
        obj.local = parent_world.inverse().compose(&world);
        Ok(())
    }

    fn world_pose(&self, object: ObjectId) -> Result<Pose> {
        let obj = self.object(object)?;
        match obj.parent {
            Some(parent) => Ok(self.world_pose(parent)?.compose(&obj.local)),
            None => Ok(obj.local),
        }
    }

    fn set_world_pose(&mut self, object: ObjectId, pose: Pose) -> Result<()> {
        if !pose.is_finite() {
            return Err(PhysicsError::invalid_parameter("non-finite world pose"));
        }
        let parent_world = match self.object(object)?.parent {
            Some(parent) => self.world_pose(parent)?,
            None => Pose::identity(),
        };
        self.object_mut(object)?.local = parent_world.inverse().compose(&pose);
        Ok(())
    }

    fn local_pose(&self, object: ObjectId) -> Result<Pose> {
        Ok(self.object(object)?.local)
    }

    fn add_rigid_body(&mut self, object: ObjectId, mass: f64) -> Result<()> {
        if !mass.is_finite() || mass <= 0.0 {
            return Err(PhysicsError::invalid_parameter(format!(
                "mass {mass} must be positive and finite"
            )));
        }
        let obj = self.object_mut(object)?;
        if obj.body.is_none() {
            obj.body = Some(RigidBody::new(mass));
        }
        Ok(())
    }

    fn remove_rigid_body(&mut self, object: ObjectId) -> Result<()> {
        self.object_mut(object)?.body = None;
        self.remove_constraints_touching(&[object]);
        Ok(())
    }

    fn has_rigid_body(&self, object: ObjectId) -> bool {
        self.rigid_body(object).is_some()
    }

    fn mass(&self, object: ObjectId) -> Result<f64> {
        Ok(self.body(object)?.mass)
    }

    fn is_kinematic(&self, object: ObjectId) -> Result<bool> {
        Ok(self.body(object)?.kinematic)
    }

    fn set_kinematic(&mut self, object: ObjectId, kinematic: bool) -> Result<()> {
        self.body_mut(object)?.kinematic = kinematic;
        Ok(())
    }

    fn velocity(&self, object: ObjectId) -> Result<Twist> {
        Ok(self.body(object)?.velocity)
    }

    fn set_velocity(&mut self, object: ObjectId, twist: Twist) -> Result<()> {
        self.body_mut(object)?.velocity = twist;
        Ok(())
    }

    fn reset_mass_distribution(&mut self, object: ObjectId) -> Result<()> {
        let body = self.body_mut(object)?;
        body.center_of_mass = Point3::origin();
        body.inertia = geometric_inertia(body.mass);
        Ok(())
    }

    fn add_trigger_volume(&mut self, object: ObjectId, size: f64) -> Result<()> {
        if !size.is_finite() || size <= 0.0 {
            return Err(PhysicsError::invalid_parameter(format!(
                "trigger size {size} must be positive and finite"
            )));
        }
        self.object_mut(object)?.trigger = Some(size);
        Ok(())
    }

    fn remove_trigger_volume(&mut self, object: ObjectId) -> Result<()> {
        self.object_mut(object)?.trigger = None;
        Ok(())
    }

    fn create_constraint(&mut self, spec: ConstraintSpec) -> Result<ConstraintId> {
        self.body(spec.owner)?;
        self.body(spec.connected)?;
        Self::validate_kind(&spec.kind)?;
        spec.breaks
            .validate()
            .map_err(|e| PhysicsError::invalid_parameter(e.to_string()))?;

        self.next_constraint += 1;
        let id = ConstraintId(self.next_constraint);
        self.constraints.insert(
            id,
            Constraint {
                spec,
                rest: None,
                pending: ConstraintLoad::default(),
            },
        );
        Ok(id)
    }

    fn destroy_constraint(&mut self, constraint: ConstraintId) -> Result<()> {
        self.constraints
            .remove(&constraint)
            .map(|_| ())
            .ok_or(PhysicsError::UnknownConstraint(constraint))
    }

    fn contains_constraint(&self, constraint: ConstraintId) -> bool {
        self.constraints.contains_key(&constraint)
    }

    fn break_thresholds(&self, constraint: ConstraintId) -> Result<BreakThresholds> {
        Ok(self.constraint(constraint)?.spec.breaks)
    }

    fn set_break_thresholds(
        &mut self,
        constraint: ConstraintId,
        breaks: BreakThresholds,
    ) -> Result<()> {
        breaks
            .validate()
            .map_err(|e| PhysicsError::invalid_parameter(e.to_string()))?;
        self.constraint_mut(constraint)?.spec.breaks = breaks;
        Ok(())
    }

    fn set_linear_limit(&mut self, constraint: ConstraintId, max_distance: f64) -> Result<()> {
        if !max_distance.is_finite() || max_distance < 0.0 {
            return Err(PhysicsError::invalid_parameter(format!(
                "max distance {max_distance} must be finite and non-negative"
            )));
        }
        match &mut self.constraint_mut(constraint)?.spec.kind {
            ConstraintKind::LinearSpring {
                max_distance: limit,
                ..
            } => {
                *limit = Some(max_distance);
                Ok(())
            }
            other => Err(PhysicsError::invalid_parameter(format!(
                "{constraint} is not a linear spring ({other:?})"
            ))),
        }
    }

    fn constraints_of(&self, object: ObjectId) -> Vec<ConstraintId> {
        let mut ids: Vec<_> = self
            .constraints
            .iter()
            .filter(|(_, c)| c.spec.owner == object || c.spec.connected == object)
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        ids
    }

    fn step(&mut self, dt: f64) -> Result<()> {
        if !dt.is_finite() || dt <= 0.0 {
            return Err(PhysicsError::invalid_parameter(format!(
                "timestep {dt} must be positive and finite"
            )));
        }
        let step = self.steps + 1;

        // Free simulated bodies drift with their velocity
        for obj in self.objects.values_mut() {
            if obj.parent.is_some() {
                continue;
            }
            if let Some(body) = obj.body.as_ref().filter(|b| !b.kinematic) {
                obj.local.position += body.velocity.linear * dt;
                let spin = UnitQuaternion::from_scaled_axis(body.velocity.angular * dt);
                obj.local.rotation = spin * obj.local.rotation;
            }
        }

        let ids = self.constraint_ids();

        for id in &ids {
            let needs_capture = self.constraints.get(id).is_some_and(|c| c.rest.is_none());
            if needs_capture {
                let spec = self.constraint(*id)?.spec;
                let rest = self.capture_rest(&spec, step)?;
                self.constraint_mut(*id)?.rest = Some(rest);
            }
        }

        for id in ids {
            let load = self.step_load(self.constraint(id)?)?;
            let c = self.constraint_mut(id)?;
            c.pending = ConstraintLoad::default();
            if c.spec.breaks.is_exceeded_by(load.force, load.torque) {
                let spec = c.spec;
                self.constraints.remove(&id);
                debug!(
                    constraint = %id,
                    owner = %spec.owner,
                    force = load.force,
                    torque = load.torque,
                    "constraint broke"
                );
                self.breaks.push(ConstraintBreak {
                    constraint: id,
                    kind: spec.kind,
                    owner: spec.owner,
                    connected: spec.connected,
                    load,
                });
            }
        }

        self.steps = step;
        Ok(())
    }

    fn step_count(&self) -> u64 {
        self.steps
    }

    fn drain_break_events(&mut self) -> Vec<ConstraintBreak> {
        std::mem::take(&mut self.breaks)
    }
}
