//! Physics engine contract for link assemblies.
//!
//! The link engine never simulates anything itself. It drives a rigid-body
//! engine through the [`PhysicsEngine`] trait:
//!
//! - **Scene graph** - objects with parents and local poses
//! - **Rigid bodies** - mass, kinematic flag, velocity, trigger volumes
//! - **Constraints** - [`ConstraintKind::Pivot`], [`ConstraintKind::LinearSpring`]
//!   and [`ConstraintKind::Fixed`], each with [`BreakThresholds`]
//! - **Stepping** - fixed steps and [`ConstraintBreak`] notifications
//!
//! [`HeadlessPhysics`] implements the contract in memory. It is what the
//! link engine's tests run against, and it is enough for headless tools
//! that only care about link bookkeeping.
//!
//! # Rest poses
//!
//! Constraints capture their rest configuration during the first step
//! after they are created. Code that reorients bodies after creating a
//! constraint must therefore wait one step, or the constraint will treat
//! the reoriented pose as rest:
//!
//! ```
//! use link_physics::{ConstraintKind, ConstraintSpec, HeadlessPhysics, PhysicsEngine};
//! use link_types::Pose;
//!
//! let mut engine = HeadlessPhysics::new();
//! let a = engine.create_object("a", None, Pose::identity()).unwrap();
//! let b = engine.create_object("b", None, Pose::identity()).unwrap();
//! engine.add_rigid_body(a, 1.0).unwrap();
//! engine.add_rigid_body(b, 1.0).unwrap();
//!
//! let c = engine.create_constraint(ConstraintSpec::new(ConstraintKind::Fixed, a, b)).unwrap();
//! assert!(engine.rest_pose(c).is_none());
//! engine.step(0.02).unwrap();
//! assert_eq!(engine.rest_pose(c).unwrap().captured_at, 1);
//! ```

#![doc(html_root_url = "https://docs.rs/link-physics/0.1.0")]
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn, // Many methods can't be const due to nalgebra
    clippy::missing_errors_doc,   // Every engine call can fail on a stale handle
)]

mod constraint;
mod engine;
mod error;
mod headless;

pub use constraint::{
    ConstraintBreak, ConstraintId, ConstraintKind, ConstraintLoad, ConstraintSpec, ObjectId,
    RestPose,
};
pub use engine::PhysicsEngine;
pub use error::{PhysicsError, Result};
pub use headless::{HeadlessPhysics, RigidBody};

// Re-export the shared types the contract is expressed in
pub use link_types::{BreakThresholds, Pose, Twist};
