//! Dual pivot strut.
//!
//! Two pivots, one at each attach node, joined by an optional spring strut.
//! The engine captures a constraint's rest pose during the first step after
//! it is created, so construction is spread over three fixed steps:
//!
//! ```text
//! create_joint     pivots created at node pose, host coupling frozen
//!   (one step)     pivots capture their rest orientation
//! phase 1          pivots face each other, strut created at their separation
//!   (one step)     strut captures its rest length
//! phase 2          final thresholds, pivots promoted, host coupling removed
//! ```
//!
//! Final thresholds split the axes: pivots break by torque only, the strut
//! by force only.
//!
//! Dropping the joint at any point destroys the pivots, which takes every
//! constraint of the assembly with them. Before phase 2 the host coupling
//! gets its thresholds back.

use link_physics::{ConstraintId, ConstraintKind, ConstraintSpec, ObjectId};
use link_types::{BreakThresholds, JointVariant, PartId, Point3, Pose, StrutConfig};
use tracing::{debug, error};

use super::JointAssembly;
use crate::context::{LinkContext, PeerAnchor};
use crate::error::{LinkError, Result};

const SOURCE_PIVOT: &str = "StrutSourcePivot";
const TARGET_PIVOT: &str = "StrutTargetPivot";

/// Where an in-progress strut assembly is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrutPhase {
    /// Pivots exist; waiting for their rest orientation to be captured.
    AwaitingPoseCapture,
    /// Strut exists; waiting for its rest length to be captured.
    AwaitingStrutSettle,
    /// Fully assembled.
    Done,
}

#[derive(Debug, Clone, Copy)]
struct Pivot {
    object: ObjectId,
    joint: ConstraintId,
    part: PartId,
}

#[derive(Debug, Clone, Copy)]
struct FrozenHost {
    constraint: ConstraintId,
    previous: BreakThresholds,
}

#[derive(Debug, Clone, Copy)]
struct StrutBuild {
    phase: StrutPhase,
    resume_at: u64,
    cancelled: bool,
    source: PeerAnchor,
    target: PeerAnchor,
    source_pivot: Pivot,
    target_pivot: Pivot,
    strut: Option<ConstraintId>,
    host: Option<FrozenHost>,
}

/// Two pivots and a spring strut.
#[derive(Debug, Clone)]
pub struct DualPivotStrut {
    config: StrutConfig,
    unbreakable: bool,
    build: Option<StrutBuild>,
}

impl DualPivotStrut {
    /// Create an assembly with the given configuration.
    #[must_use]
    pub fn new(config: StrutConfig) -> Self {
        Self {
            config,
            unbreakable: false,
            build: None,
        }
    }

    /// Current phase, if an assembly exists.
    #[must_use]
    pub fn phase(&self) -> Option<StrutPhase> {
        self.build.map(|b| b.phase)
    }

    /// Source and target pivot objects.
    #[must_use]
    pub fn pivots(&self) -> Option<(ObjectId, ObjectId)> {
        self.build
            .map(|b| (b.source_pivot.object, b.target_pivot.object))
    }

    fn pivot_breaks(&self) -> BreakThresholds {
        if self.unbreakable {
            BreakThresholds::unbreakable()
        } else {
            BreakThresholds::torque_only(self.config.breaks.torque)
        }
    }

    fn strut_breaks(&self) -> BreakThresholds {
        if self.unbreakable {
            BreakThresholds::unbreakable()
        } else {
            BreakThresholds::force_only(self.config.breaks.force)
        }
    }

    fn apply_final_breaks(&self, build: &StrutBuild, ctx: &mut LinkContext<'_>) -> Result<()> {
        for pivot in [build.source_pivot, build.target_pivot] {
            ctx.engine
                .set_break_thresholds(pivot.joint, self.pivot_breaks())?;
        }
        if let Some(strut) = build.strut {
            ctx.engine.set_break_thresholds(strut, self.strut_breaks())?;
        }
        Ok(())
    }

    /// Phase 1: face the pivots at each other and build the strut.
    fn orient(&self, build: &mut StrutBuild, ctx: &mut LinkContext<'_>) -> Result<()> {
        check_pivots(build, ctx)?;

        let source = ctx.engine.world_pose(build.source_pivot.object)?;
        let target = ctx.engine.world_pose(build.target_pivot.object)?;
        ctx.engine.set_world_pose(
            build.source_pivot.object,
            Pose::looking_at(source.position, &target.position),
        )?;
        ctx.engine.set_world_pose(
            build.target_pivot.object,
            Pose::looking_at(target.position, &source.position),
        )?;

        if self.config.has_strut() {
            let length = source.distance_to(&target);
            let strut = ctx.engine.create_constraint(ConstraintSpec::new(
                ConstraintKind::LinearSpring {
                    spring: self.config.spring_force,
                    damper: self.config.spring_damper,
                    max_distance: Some(length),
                },
                build.source_pivot.object,
                build.target_pivot.object,
            ))?;
            debug!(constraint = %strut, length, "strut created");
            build.strut = Some(strut);
        }

        build.phase = StrutPhase::AwaitingStrutSettle;
        build.resume_at = ctx.engine.step_count() + 1;
        Ok(())
    }

    /// Phase 2: arm thresholds, release the pivots, drop the host coupling.
    fn finish(&self, build: &mut StrutBuild, ctx: &mut LinkContext<'_>) -> Result<()> {
        check_pivots(build, ctx)?;
        if let Some(strut) = build.strut {
            if !ctx.engine.contains_constraint(strut) {
                return Err(LinkError::aborted(format!("{strut} vanished before arming")));
            }
        }

        self.apply_final_breaks(build, ctx)?;
        let mass = ctx.config.pivot_mass;
        for pivot in [build.source_pivot, build.target_pivot] {
            ctx.promote(pivot.part, pivot.object, mass, None)?;
        }
        if build.host.take().is_some() {
            ctx.host_joints
                .remove(ctx.engine, build.source.part, build.target.part)?;
        }

        build.phase = StrutPhase::Done;
        debug!(source = %build.source.peer, target = %build.target.peer, "strut assembled");
        Ok(())
    }
}

fn check_pivots(build: &StrutBuild, ctx: &LinkContext<'_>) -> Result<()> {
    for pivot in [build.source_pivot, build.target_pivot] {
        if !ctx.engine.contains_object(pivot.object) || !ctx.engine.contains_constraint(pivot.joint)
        {
            return Err(LinkError::aborted(format!(
                "pivot {} of {} is gone",
                pivot.object, pivot.part
            )));
        }
    }
    Ok(())
}

fn create_pivot(
    ctx: &mut LinkContext<'_>,
    anchor: &PeerAnchor,
    name: &str,
    cone_limit: Option<f64>,
) -> Result<Pivot> {
    let object = ctx
        .engine
        .create_object(name, Some(anchor.node), Pose::identity())?;
    match attach_pivot(ctx, anchor, object, cone_limit) {
        Ok(joint) => Ok(Pivot {
            object,
            joint,
            part: anchor.part,
        }),
        Err(err) => {
            ctx.release(object)?;
            Err(err)
        }
    }
}

fn attach_pivot(
    ctx: &mut LinkContext<'_>,
    anchor: &PeerAnchor,
    object: ObjectId,
    cone_limit: Option<f64>,
) -> Result<ConstraintId> {
    ctx.engine.add_rigid_body(object, ctx.config.pivot_mass)?;
    ctx.engine.set_kinematic(object, true)?;
    let node = ctx.node_in_body(anchor)?;
    let joint = ctx.engine.create_constraint(
        ConstraintSpec::new(ConstraintKind::Pivot { cone_limit }, object, anchor.body)
            .with_anchors(Point3::origin(), node),
    )?;
    ctx.router.attach(ctx.engine, object, anchor.part)?;
    Ok(joint)
}

impl JointAssembly for DualPivotStrut {
    fn variant(&self) -> JointVariant {
        JointVariant::DualPivotStrut
    }

    fn create_joint(
        &mut self,
        source: &PeerAnchor,
        target: &PeerAnchor,
        ctx: &mut LinkContext<'_>,
    ) -> Result<()> {
        if self.build.is_some() {
            self.drop_joint(ctx)?;
        }

        let source_pivot = create_pivot(ctx, source, SOURCE_PIVOT, self.config.source_cone_limit)?;
        let target_pivot =
            match create_pivot(ctx, target, TARGET_PIVOT, self.config.target_cone_limit) {
                Ok(pivot) => pivot,
                Err(err) => {
                    ctx.release(source_pivot.object)?;
                    return Err(err);
                }
            };

        let host = match ctx.host_joints.find(&*ctx.engine, source.part, target.part) {
            Some(constraint) => {
                let previous = ctx.engine.break_thresholds(constraint)?;
                ctx.engine
                    .set_break_thresholds(constraint, BreakThresholds::unbreakable())?;
                Some(FrozenHost {
                    constraint,
                    previous,
                })
            }
            None => None,
        };

        self.build = Some(StrutBuild {
            phase: StrutPhase::AwaitingPoseCapture,
            resume_at: ctx.engine.step_count() + 1,
            cancelled: false,
            source: *source,
            target: *target,
            source_pivot,
            target_pivot,
            strut: None,
            host,
        });
        debug!(source = %source.peer, target = %target.peer, "strut pivots created");
        Ok(())
    }

    fn drop_joint(&mut self, ctx: &mut LinkContext<'_>) -> Result<()> {
        self.unbreakable = false;
        let Some(build) = self.build.take() else {
            return Ok(());
        };
        if build.phase != StrutPhase::Done {
            debug!(phase = ?build.phase, "strut assembly cancelled");
        }

        // Tear everything down even if one piece fails
        let mut result = Ok(());
        for pivot in [build.source_pivot, build.target_pivot] {
            if let Err(err) = ctx.release(pivot.object) {
                result = result.and(Err(err));
            }
        }
        if let Some(host) = build.host {
            if ctx.engine.contains_constraint(host.constraint) {
                if let Err(err) = ctx
                    .engine
                    .set_break_thresholds(host.constraint, host.previous)
                {
                    result = result.and(Err(err.into()));
                }
            }
        }
        result
    }

    fn adjust_joint(&mut self, unbreakable: bool, ctx: &mut LinkContext<'_>) -> Result<()> {
        self.unbreakable = unbreakable;
        match self.build {
            Some(build) if build.phase == StrutPhase::Done => self.apply_final_breaks(&build, ctx),
            // Thresholds are armed when assembly completes
            _ => Ok(()),
        }
    }

    fn fixed_update(&mut self, ctx: &mut LinkContext<'_>) -> Result<()> {
        let Some(mut build) = self.build else {
            return Ok(());
        };
        if build.cancelled
            || build.phase == StrutPhase::Done
            || ctx.engine.step_count() < build.resume_at
        {
            return Ok(());
        }

        let outcome = match build.phase {
            StrutPhase::AwaitingPoseCapture => self.orient(&mut build, ctx),
            StrutPhase::AwaitingStrutSettle => self.finish(&mut build, ctx),
            StrutPhase::Done => Ok(()),
        };
        if let Err(err) = &outcome {
            error!(phase = ?build.phase, error = %err, "strut assembly aborted");
            build.cancelled = true;
        }
        self.build = Some(build);
        outcome
    }

    fn owns_constraint(&self, constraint: ConstraintId) -> bool {
        self.sub_joints().contains(&constraint)
    }

    fn sub_joints(&self) -> Vec<ConstraintId> {
        self.build
            .map(|b| {
                let mut joints = vec![b.source_pivot.joint, b.target_pivot.joint];
                joints.extend(b.strut);
                joints
            })
            .unwrap_or_default()
    }

    fn is_assembled(&self) -> bool {
        self.phase() == Some(StrutPhase::Done)
    }

    fn breaks(&self) -> BreakThresholds {
        self.config.breaks
    }

    fn set_breaks(&mut self, breaks: BreakThresholds) {
        self.config.breaks = breaks;
    }
}
