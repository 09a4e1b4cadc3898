//! The host's native rigid couplings between parts.

use hashbrown::HashMap;
use link_physics::{ConstraintId, ConstraintKind, ConstraintSpec, PhysicsEngine};
use link_types::{BreakThresholds, PartId};
use tracing::debug;

use crate::error::Result;
use crate::part::PartTable;

/// Fixed couplings keyed by unordered part pair.
#[derive(Debug, Clone, Default)]
pub struct HostJoints {
    joints: HashMap<(PartId, PartId), ConstraintId>,
}

fn key(a: PartId, b: PartId) -> (PartId, PartId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

impl HostJoints {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rigidly couple two parts. An existing coupling is reused.
    pub fn couple(
        &mut self,
        engine: &mut dyn PhysicsEngine,
        parts: &PartTable,
        a: PartId,
        b: PartId,
        breaks: BreakThresholds,
    ) -> Result<ConstraintId> {
        if let Some(existing) = self.find(engine, a, b) {
            return Ok(existing);
        }
        let owner = parts.part(a)?.object;
        let connected = parts.part(b)?.object;
        let id = engine.create_constraint(
            ConstraintSpec::new(ConstraintKind::Fixed, owner, connected).with_breaks(breaks),
        )?;
        debug!(a = %a, b = %b, constraint = %id, "coupled parts");
        self.joints.insert(key(a, b), id);
        Ok(id)
    }

    /// Live coupling between two parts.
    ///
    /// Entries whose constraint broke or was destroyed are not returned.
    #[must_use]
    pub fn find(&self, engine: &dyn PhysicsEngine, a: PartId, b: PartId) -> Option<ConstraintId> {
        self.joints
            .get(&key(a, b))
            .copied()
            .filter(|id| engine.contains_constraint(*id))
    }

    /// Forget the coupling between two parts and destroy it if alive.
    pub fn remove(
        &mut self,
        engine: &mut dyn PhysicsEngine,
        a: PartId,
        b: PartId,
    ) -> Result<Option<ConstraintId>> {
        let Some(id) = self.joints.remove(&key(a, b)) else {
            return Ok(None);
        };
        if engine.contains_constraint(id) {
            engine.destroy_constraint(id)?;
        }
        Ok(Some(id))
    }

    /// Forget every coupling of a part.
    pub fn forget_part(&mut self, part: PartId) {
        self.joints.retain(|(a, b), _| *a != part && *b != part);
    }
}
