//! Joint assemblies.
//!
//! A joint assembly builds the constraint structure that makes a link
//! physical. It is created with its source peer and lives exactly as long
//! as the peer stays `Linked`: [`JointAssembly::create_joint`] runs when
//! the source enters `Linked` and [`JointAssembly::drop_joint`] when it
//! leaves.
//!
//! | Variant | Sub-joints | Intermediate objects |
//! |---------|------------|----------------------|
//! | [`RigidStock`] | 0 (reuses the host coupling) | none |
//! | [`DualPivotStrut`] | 2 pivots + optional strut | two pivots |
//! | [`SpringCable`] | spring + cable-end fixed joint | cable end |

mod cable;
mod rigid;
mod strut;

pub use cable::SpringCable;
pub use rigid::RigidStock;
pub use strut::{DualPivotStrut, StrutPhase};

use std::fmt::Debug;

use link_physics::ConstraintId;
use link_types::{BreakThresholds, JointConfig, JointVariant};

use crate::context::{LinkContext, PeerAnchor};
use crate::error::{LinkError, Result};
use crate::peer::JointSnapshot;

/// Strategy that builds and owns the constraints of one link.
pub trait JointAssembly: Debug {
    /// The strategy.
    fn variant(&self) -> JointVariant;

    /// Build the constraints between the two anchors.
    ///
    /// Multi-step strategies only start here and finish from
    /// [`fixed_update`](Self::fixed_update).
    fn create_joint(
        &mut self,
        source: &PeerAnchor,
        target: &PeerAnchor,
        ctx: &mut LinkContext<'_>,
    ) -> Result<()>;

    /// Release every constraint and intermediate object the assembly owns.
    ///
    /// Must succeed on a partly built or already broken structure, and
    /// tears down as much as it can before reporting the first failure.
    /// Ends any freeze set through [`adjust_joint`](Self::adjust_joint).
    fn drop_joint(&mut self, ctx: &mut LinkContext<'_>) -> Result<()>;

    /// Freeze the link (`true`) or restore the configured thresholds.
    ///
    /// The freeze holds until the joint is dropped.
    fn adjust_joint(&mut self, unbreakable: bool, ctx: &mut LinkContext<'_>) -> Result<()>;

    /// Advance once per fixed step, before the engine steps.
    ///
    /// An error aborts the assembly; the caller severs the link, which
    /// releases whatever was built.
    fn fixed_update(&mut self, _ctx: &mut LinkContext<'_>) -> Result<()> {
        Ok(())
    }

    /// Whether a constraint belongs to this link.
    fn owns_constraint(&self, constraint: ConstraintId) -> bool;

    /// Constraints owned by the assembly, in creation order.
    fn sub_joints(&self) -> Vec<ConstraintId>;

    /// Whether construction has finished.
    fn is_assembled(&self) -> bool;

    /// Configured break thresholds.
    fn breaks(&self) -> BreakThresholds;

    /// Replace the configured break thresholds.
    ///
    /// Takes effect on the next build or adjustment.
    fn set_breaks(&mut self, breaks: BreakThresholds);

    /// Current stretch ratio, for assemblies that stretch.
    fn stretch_ratio(&self) -> Option<f64> {
        None
    }

    /// Change the maximum length of the link at runtime.
    fn set_max_length(&mut self, _length: f64, _ctx: &mut LinkContext<'_>) -> Result<()> {
        Err(LinkError::Unsupported {
            variant: self.variant(),
            operation: "length control",
        })
    }

    /// Persisted configuration.
    fn snapshot(&self) -> JointSnapshot {
        JointSnapshot {
            variant: self.variant(),
            breaks: self.breaks(),
            cable_length: None,
        }
    }

    /// Apply persisted configuration.
    fn restore(&mut self, snapshot: &JointSnapshot) {
        self.set_breaks(snapshot.breaks);
    }
}

/// Build the assembly a joint configuration describes.
///
/// # Example
///
/// ```
/// use link_core::build_assembly;
/// use link_types::{CableConfig, JointConfig, JointVariant};
///
/// let joint = build_assembly(&JointConfig::SpringCable(CableConfig::with_length(20.0)));
/// assert_eq!(joint.variant(), JointVariant::SpringCable);
/// assert!(joint.sub_joints().is_empty());
/// ```
#[must_use]
pub fn build_assembly(config: &JointConfig) -> Box<dyn JointAssembly> {
    match config {
        JointConfig::RigidStock { breaks } => Box::new(RigidStock::new(*breaks)),
        JointConfig::DualPivotStrut(strut) => Box::new(DualPivotStrut::new(*strut)),
        JointConfig::SpringCable(cable) => Box::new(SpringCable::new(*cable)),
    }
}

/// Whether a stretch ratio counts as stretched.
#[must_use]
pub fn is_stretched(ratio: f64, epsilon: f64) -> bool {
    ratio - 1.0 > epsilon
}
