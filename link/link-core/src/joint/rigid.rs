//! Rigid link through the host's own coupling.

use link_physics::ConstraintId;
use link_types::{BreakThresholds, JointVariant, PartId};
use tracing::debug;

use super::JointAssembly;
use crate::context::{LinkContext, PeerAnchor};
use crate::error::Result;

/// Pass-through to the host's rigid coupling between the two parts.
///
/// The coupling is created when the parts are not coupled yet, and then
/// also released with the link. A coupling that already existed is left
/// to its owner with the thresholds it had before the link.
#[derive(Debug, Clone)]
pub struct RigidStock {
    breaks: BreakThresholds,
    unbreakable: bool,
    coupling: Option<Coupling>,
}

#[derive(Debug, Clone, Copy)]
struct Coupling {
    constraint: ConstraintId,
    parts: (PartId, PartId),
    owned: bool,
    previous: BreakThresholds,
}

impl RigidStock {
    /// Create with configured thresholds.
    #[must_use]
    pub fn new(breaks: BreakThresholds) -> Self {
        Self {
            breaks,
            unbreakable: false,
            coupling: None,
        }
    }

    fn effective_breaks(&self) -> BreakThresholds {
        if self.unbreakable {
            BreakThresholds::unbreakable()
        } else {
            self.breaks
        }
    }

    fn apply_breaks(&self, ctx: &mut LinkContext<'_>) -> Result<()> {
        if let Some(coupling) = self.coupling {
            if ctx.engine.contains_constraint(coupling.constraint) {
                ctx.engine
                    .set_break_thresholds(coupling.constraint, self.effective_breaks())?;
            }
        }
        Ok(())
    }
}

impl JointAssembly for RigidStock {
    fn variant(&self) -> JointVariant {
        JointVariant::RigidStock
    }

    fn create_joint(
        &mut self,
        source: &PeerAnchor,
        target: &PeerAnchor,
        ctx: &mut LinkContext<'_>,
    ) -> Result<()> {
        let existing = ctx.host_joints.find(&*ctx.engine, source.part, target.part);
        let coupling = match existing {
            Some(constraint) => Coupling {
                constraint,
                parts: (source.part, target.part),
                owned: false,
                previous: ctx.engine.break_thresholds(constraint)?,
            },
            None => Coupling {
                constraint: ctx.host_joints.couple(
                    ctx.engine,
                    ctx.parts,
                    source.part,
                    target.part,
                    self.effective_breaks(),
                )?,
                parts: (source.part, target.part),
                owned: true,
                previous: BreakThresholds::unbreakable(),
            },
        };
        debug!(constraint = %coupling.constraint, owned = coupling.owned, "rigid link bound to host coupling");
        self.coupling = Some(coupling);
        self.apply_breaks(ctx)
    }

    fn drop_joint(&mut self, ctx: &mut LinkContext<'_>) -> Result<()> {
        self.unbreakable = false;
        let Some(coupling) = self.coupling.take() else {
            return Ok(());
        };
        if coupling.owned {
            let (a, b) = coupling.parts;
            ctx.host_joints.remove(ctx.engine, a, b)?;
        } else if ctx.engine.contains_constraint(coupling.constraint) {
            ctx.engine
                .set_break_thresholds(coupling.constraint, coupling.previous)?;
        }
        Ok(())
    }

    fn adjust_joint(&mut self, unbreakable: bool, ctx: &mut LinkContext<'_>) -> Result<()> {
        self.unbreakable = unbreakable;
        self.apply_breaks(ctx)
    }

    fn owns_constraint(&self, constraint: ConstraintId) -> bool {
        self.coupling.is_some_and(|c| c.constraint == constraint)
    }

    fn sub_joints(&self) -> Vec<ConstraintId> {
        Vec::new()
    }

    fn is_assembled(&self) -> bool {
        self.coupling.is_some()
    }

    fn breaks(&self) -> BreakThresholds {
        self.breaks
    }

    fn set_breaks(&mut self, breaks: BreakThresholds) {
        self.breaks = breaks;
    }
}
