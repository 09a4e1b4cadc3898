//! Spring cable.
//!
//! A cable is a spring with a distance limit between the source node and
//! a free cable end, plus a fixed joint holding the cable end on the target
//! body. The cable end is a promoted connector owned by the source part;
//! its mass is the average of both bodies so the solver never has to join
//! bodies whose masses differ by orders of magnitude.
//!
//! Every fixed step the assembly measures the cable:
//!
//! ```text
//! stretch = max(1, distance / max_length)
//! ```

use link_physics::{ConstraintId, ConstraintKind, ConstraintSpec, ObjectId};
use link_types::{BreakThresholds, CableConfig, ConfigError, JointVariant, Point3, Pose};
use tracing::debug;

use super::JointAssembly;
use crate::context::{LinkContext, PeerAnchor};
use crate::error::Result;
use crate::peer::JointSnapshot;

const CABLE_END: &str = "CableEnd";

#[derive(Debug, Clone, Copy)]
struct CableRig {
    source: PeerAnchor,
    cable_end: ObjectId,
    spring: ConstraintId,
    end_joint: ConstraintId,
}

/// Spring with a distance limit and a fixed cable end.
#[derive(Debug, Clone)]
pub struct SpringCable {
    config: CableConfig,
    unbreakable: bool,
    rig: Option<CableRig>,
    stretch: f64,
}

impl SpringCable {
    /// Create a cable with the given configuration.
    #[must_use]
    pub fn new(config: CableConfig) -> Self {
        Self {
            config,
            unbreakable: false,
            rig: None,
            stretch: 1.0,
        }
    }

    /// Nominal length.
    #[must_use]
    pub fn max_length(&self) -> f64 {
        self.config.max_length
    }

    /// The free cable end, while linked.
    #[must_use]
    pub fn cable_end(&self) -> Option<ObjectId> {
        self.rig.map(|r| r.cable_end)
    }

    fn spring_breaks(&self) -> BreakThresholds {
        if self.unbreakable {
            BreakThresholds::unbreakable()
        } else {
            self.config.spring_breaks()
        }
    }

    fn end_breaks(&self) -> BreakThresholds {
        if self.unbreakable {
            BreakThresholds::unbreakable()
        } else {
            self.config.breaks
        }
    }

    fn build(
        &self,
        source: &PeerAnchor,
        target: &PeerAnchor,
        cable_end: ObjectId,
        ctx: &mut LinkContext<'_>,
    ) -> Result<CableRig> {
        let mass = 0.5 * (ctx.engine.mass(source.body)? + ctx.engine.mass(target.body)?);
        ctx.promote(source.part, cable_end, mass, self.config.interaction_distance)?;

        let anchor = ctx.node_in_body(source)?;
        let spring = ctx.engine.create_constraint(
            ConstraintSpec::new(
                ConstraintKind::LinearSpring {
                    spring: self.config.spring,
                    damper: self.config.damper,
                    max_distance: Some(self.config.max_length),
                },
                source.body,
                cable_end,
            )
            .with_anchors(anchor, Point3::origin())
            .with_breaks(self.spring_breaks()),
        )?;

        let end_anchor = ctx.node_in_body(target)?;
        let end_joint = ctx.engine.create_constraint(
            ConstraintSpec::new(ConstraintKind::Fixed, cable_end, target.body)
                .with_anchors(Point3::origin(), end_anchor)
                .with_breaks(self.end_breaks()),
        )?;
        ctx.router.attach(ctx.engine, cable_end, source.part)?;

        Ok(CableRig {
            source: *source,
            cable_end,
            spring,
            end_joint,
        })
    }

    fn release(rig: &CableRig, ctx: &mut LinkContext<'_>) -> Result<()> {
        let spring = if ctx.engine.contains_constraint(rig.spring) {
            ctx.engine.destroy_constraint(rig.spring).map_err(Into::into)
        } else {
            Ok(())
        };
        let end = ctx.release(rig.cable_end);
        spring.and(end)
    }
}

impl JointAssembly for SpringCable {
    fn variant(&self) -> JointVariant {
        JointVariant::SpringCable
    }

    fn create_joint(
        &mut self,
        source: &PeerAnchor,
        target: &PeerAnchor,
        ctx: &mut LinkContext<'_>,
    ) -> Result<()> {
        if self.rig.is_some() {
            self.drop_joint(ctx)?;
        }

        let cable_end = ctx
            .engine
            .create_object(CABLE_END, Some(target.node), Pose::identity())?;
        match self.build(source, target, cable_end, ctx) {
            Ok(rig) => {
                debug!(
                    spring = %rig.spring,
                    end = %rig.end_joint,
                    length = self.config.max_length,
                    "cable attached"
                );
                self.rig = Some(rig);
                self.stretch = 1.0;
                Ok(())
            }
            Err(err) => {
                // The spring, if created, hangs off the cable end and goes with it
                ctx.release(cable_end)?;
                Err(err)
            }
        }
    }

    fn drop_joint(&mut self, ctx: &mut LinkContext<'_>) -> Result<()> {
        self.unbreakable = false;
        self.stretch = 1.0;
        if let Some(rig) = self.rig.take() {
            Self::release(&rig, ctx)?;
            debug!(end = %rig.cable_end, "cable released");
        }
        Ok(())
    }

    fn adjust_joint(&mut self, unbreakable: bool, ctx: &mut LinkContext<'_>) -> Result<()> {
        self.unbreakable = unbreakable;
        if let Some(rig) = self.rig {
            if ctx.engine.contains_constraint(rig.spring) {
                ctx.engine
                    .set_break_thresholds(rig.spring, self.spring_breaks())?;
            }
            if ctx.engine.contains_constraint(rig.end_joint) {
                ctx.engine
                    .set_break_thresholds(rig.end_joint, self.end_breaks())?;
            }
        }
        Ok(())
    }

    fn fixed_update(&mut self, ctx: &mut LinkContext<'_>) -> Result<()> {
        let Some(rig) = self.rig else {
            return Ok(());
        };
        if !ctx.engine.contains_object(rig.cable_end) {
            return Ok(());
        }
        let node = ctx.node_pose(&rig.source)?;
        let end = ctx.engine.world_pose(rig.cable_end)?;
        let distance = node.distance_to(&end);
        self.stretch = (distance / self.config.max_length).max(1.0);
        Ok(())
    }

    fn owns_constraint(&self, constraint: ConstraintId) -> bool {
        self.rig
            .is_some_and(|r| r.spring == constraint || r.end_joint == constraint)
    }

    fn sub_joints(&self) -> Vec<ConstraintId> {
        self.rig
            .map(|r| vec![r.spring, r.end_joint])
            .unwrap_or_default()
    }

    fn is_assembled(&self) -> bool {
        self.rig.is_some()
    }

    fn breaks(&self) -> BreakThresholds {
        self.config.breaks
    }

    fn set_breaks(&mut self, breaks: BreakThresholds) {
        self.config.breaks = breaks;
    }

    fn stretch_ratio(&self) -> Option<f64> {
        Some(self.stretch)
    }

    fn set_max_length(&mut self, length: f64, ctx: &mut LinkContext<'_>) -> Result<()> {
        if !length.is_finite() || length <= 0.0 {
            return Err(ConfigError::invalid_value(
                "max_length",
                format!("{length} must be positive and finite"),
            )
            .into());
        }
        self.config.max_length = length;
        if let Some(rig) = self.rig {
            if ctx.engine.contains_constraint(rig.spring) {
                ctx.engine.set_linear_limit(rig.spring, length)?;
            }
        }
        debug!(length, "cable length changed");
        Ok(())
    }

    fn snapshot(&self) -> JointSnapshot {
        JointSnapshot {
            variant: JointVariant::SpringCable,
            breaks: self.config.breaks,
            cable_length: Some(self.config.max_length),
        }
    }

    fn restore(&mut self, snapshot: &JointSnapshot) {
        self.config.breaks = snapshot.breaks;
        if let Some(length) = snapshot.cable_length.filter(|l| l.is_finite() && *l > 0.0) {
            self.config.max_length = length;
        }
    }
}
