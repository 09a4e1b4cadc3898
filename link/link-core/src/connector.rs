//! Physical connectors.
//!
//! A connector is an object pulled out of its part's model hierarchy and
//! simulated on its own: a cable end, a strut pivot, a free plug. The
//! connector set owns the object's rigid body and trigger volume for as
//! long as it is promoted. The owning part is referenced by id only.
//!
//! # Activation
//!
//! A promoted connector mirrors its owner's vessel:
//!
//! | Owner vessel | Parent | Body |
//! |--------------|--------|------|
//! | fully simulated | none | dynamic |
//! | packed (on rails) | owner model root | kinematic |
//!
//! The mirror is applied on promotion and on every activation change
//! reported by the [`SimulationDriver`].

use hashbrown::HashMap;
use link_physics::{ObjectId, PhysicsEngine};
use link_types::{PartId, Twist};
use tracing::debug;

use crate::driver::{SimulationDriver, SubscriptionId};
use crate::error::Result;
use crate::part::{Part, PartTable};

/// Receives hierarchies whose highlight outline must be rebuilt.
pub trait HighlightRefresher {
    /// Rebuild the outline of the hierarchy rooted at `root`.
    fn refresh(&mut self, root: ObjectId);
}

/// A refresher that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHighlight;

impl HighlightRefresher for NoHighlight {
    fn refresh(&mut self, _root: ObjectId) {}
}

/// A promoted object.
#[derive(Debug, Clone, PartialEq)]
pub struct PhysicalConnector {
    /// The simulated object.
    pub object: ObjectId,
    /// Part the connector belongs to.
    pub owner: PartId,
    /// Size of the trigger volume, if one was attached.
    pub trigger_size: Option<f64>,
    subscription: SubscriptionId,
}

/// Result of mirroring an activation change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reparent {
    /// The connector object.
    pub object: ObjectId,
    /// Parent before the change.
    pub old_parent: Option<ObjectId>,
    /// Parent after the change.
    pub new_parent: Option<ObjectId>,
}

/// All promoted connectors, keyed by object.
#[derive(Debug, Clone, Default)]
pub struct ConnectorSet {
    connectors: HashMap<ObjectId, PhysicalConnector>,
}

impl ConnectorSet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a connector.
    #[must_use]
    pub fn get(&self, object: ObjectId) -> Option<&PhysicalConnector> {
        self.connectors.get(&object)
    }

    /// Check whether an object is promoted.
    #[must_use]
    pub fn is_promoted(&self, object: ObjectId) -> bool {
        self.connectors.contains_key(&object)
    }

    /// Number of promoted objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.connectors.len()
    }

    /// Check whether nothing is promoted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.connectors.is_empty()
    }

    /// Objects promoted on behalf of a part.
    #[must_use]
    pub fn owned_by(&self, owner: PartId) -> Vec<ObjectId> {
        let mut objects: Vec<_> = self
            .connectors
            .values()
            .filter(|c| c.owner == owner)
            .map(|c| c.object)
            .collect();
        objects.sort_unstable();
        objects
    }

    /// Turn an object into an independently simulated body.
    ///
    /// A rigid body of `mass` is attached unless one exists. The body
    /// inherits the owner's velocity, and a trigger volume of twice
    /// `interaction_distance` is attached when a distance is given.
    /// Promoting an already promoted object does nothing.
    #[allow(clippy::too_many_arguments)]
    pub fn promote(
        &mut self,
        engine: &mut dyn PhysicsEngine,
        parts: &PartTable,
        driver: &mut SimulationDriver,
        owner: PartId,
        object: ObjectId,
        mass: f64,
        interaction_distance: Option<f64>,
    ) -> Result<()> {
        if self.connectors.contains_key(&object) {
            return Ok(());
        }
        let part = parts.part(owner)?;

        engine.add_rigid_body(object, mass)?;
        let velocity = engine.velocity(part.object)?;
        engine.set_velocity(object, velocity)?;
        engine.reset_mass_distribution(object)?;

        let trigger_size = interaction_distance.map(|d| 2.0 * d);
        if let Some(size) = trigger_size {
            engine.add_trigger_volume(object, size)?;
        }

        let packed = driver.is_packed(part.vessel);
        apply_activation(engine, part, object, packed)?;
        let subscription = driver.subscribe(part.vessel, object);

        debug!(object = %object, owner = %owner, packed, "promoted connector");
        self.connectors.insert(
            object,
            PhysicalConnector {
                object,
                owner,
                trigger_size,
                subscription,
            },
        );
        Ok(())
    }

    /// Return a promoted object to its owner's model hierarchy.
    ///
    /// Returns `false` without touching anything if the object was never
    /// promoted. Otherwise the object is reparented under the owner's model
    /// root, stopped, and stripped of its rigid body and trigger volume.
    pub fn demote(
        &mut self,
        engine: &mut dyn PhysicsEngine,
        parts: &PartTable,
        driver: &mut SimulationDriver,
        object: ObjectId,
    ) -> Result<bool> {
        let Some(connector) = self.connectors.remove(&object) else {
            return Ok(false);
        };
        driver.unsubscribe(connector.subscription);

        if !engine.contains_object(object) {
            return Ok(true);
        }
        if let Some(part) = parts.get(connector.owner) {
            engine.set_parent(object, Some(part.model_root))?;
        }
        if engine.has_rigid_body(object) {
            engine.set_kinematic(object, true)?;
            engine.set_velocity(object, Twist::zero())?;
            engine.remove_rigid_body(object)?;
        }
        engine.remove_trigger_volume(object)?;

        debug!(object = %object, owner = %connector.owner, "demoted connector");
        Ok(true)
    }

    /// Drop the record of an object that is about to be destroyed.
    pub fn forget(&mut self, driver: &mut SimulationDriver, object: ObjectId) -> bool {
        match self.connectors.remove(&object) {
            Some(connector) => {
                driver.unsubscribe(connector.subscription);
                true
            }
            None => false,
        }
    }

    /// Move every connector of a part to the part's current vessel.
    ///
    /// Returns the reparenting each connector went through.
    pub fn rebind_owner(
        &mut self,
        engine: &mut dyn PhysicsEngine,
        parts: &PartTable,
        driver: &mut SimulationDriver,
        owner: PartId,
    ) -> Result<Vec<Reparent>> {
        let part = parts.part(owner)?;
        let packed = driver.is_packed(part.vessel);
        let mut moved = Vec::new();
        for object in self.owned_by(owner) {
            if let Some(connector) = self.connectors.get(&object) {
                driver.rebind(connector.subscription, part.vessel);
            }
            if let Some(reparent) = self.on_activation_change(engine, parts, object, packed)? {
                moved.push(reparent);
            }
        }
        Ok(moved)
    }

    /// Mirror an activation change of the owner's vessel.
    ///
    /// Returns `None` for objects that are not promoted or whose owner is
    /// gone.
    pub fn on_activation_change(
        &mut self,
        engine: &mut dyn PhysicsEngine,
        parts: &PartTable,
        object: ObjectId,
        packed: bool,
    ) -> Result<Option<Reparent>> {
        let Some(connector) = self.connectors.get(&object) else {
            return Ok(None);
        };
        let Some(part) = parts.get(connector.owner) else {
            return Ok(None);
        };
        if !engine.contains_object(object) {
            return Ok(None);
        }

        let old_parent = engine.parent(object)?;
        let new_parent = apply_activation(engine, part, object, packed)?;
        debug!(object = %object, packed, "connector followed vessel activation");
        Ok(Some(Reparent {
            object,
            old_parent,
            new_parent,
        }))
    }
}

fn apply_activation(
    engine: &mut dyn PhysicsEngine,
    part: &Part,
    object: ObjectId,
    packed: bool,
) -> Result<Option<ObjectId>> {
    let parent = packed.then_some(part.model_root);
    engine.set_parent(object, parent)?;
    engine.set_kinematic(object, packed)?;
    Ok(parent)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use link_physics::HeadlessPhysics;
    use link_types::{Point3, Pose, Vector3, VesselId};

    struct Fixture {
        engine: HeadlessPhysics,
        parts: PartTable,
        driver: SimulationDriver,
        connectors: ConnectorSet,
        mesh: ObjectId,
    }

    fn fixture(packed: bool) -> Fixture {
        let mut engine = HeadlessPhysics::new();
        let object = engine
            .create_object("part", None, Pose::from_position(Point3::new(1.0, 2.0, 3.0)))
            .unwrap();
        engine.add_rigid_body(object, 100.0).unwrap();
        engine
            .set_velocity(object, Twist::linear(Vector3::new(0.0, 5.0, 0.0)))
            .unwrap();
        let model = engine.create_object("model", Some(object), Pose::identity()).unwrap();
        let mesh = engine
            .create_object("plug", Some(model), Pose::from_position(Point3::new(0.0, 0.0, 1.0)))
            .unwrap();

        let mut parts = PartTable::new();
        parts
            .insert(Part::new(PartId(1), VesselId(1), object, model))
            .unwrap();
        let mut driver = SimulationDriver::new();
        driver.add_vessel(VesselId(1), packed);

        Fixture {
            engine,
            parts,
            driver,
            connectors: ConnectorSet::new(),
            mesh,
        }
    }

    impl Fixture {
        fn promote(&mut self, distance: Option<f64>) {
            self.connectors
                .promote(
                    &mut self.engine,
                    &self.parts,
                    &mut self.driver,
                    PartId(1),
                    self.mesh,
                    2.0,
                    distance,
                )
                .unwrap();
        }
    }

    #[test]
    fn test_promote_detaches_and_seeds_velocity() {
        let mut f = fixture(false);
        f.promote(Some(0.5));

        assert_eq!(f.engine.parent(f.mesh).unwrap(), None);
        assert!(!f.engine.is_kinematic(f.mesh).unwrap());
        assert_relative_eq!(f.engine.velocity(f.mesh).unwrap().linear.y, 5.0);
        assert_eq!(f.engine.trigger_volume(f.mesh), Some(1.0));
        assert_eq!(f.driver.subscriber_count(), 1);
    }

    #[test]
    fn test_promote_on_packed_vessel_stays_parented() {
        let mut f = fixture(true);
        f.promote(None);

        let model = f.parts.part(PartId(1)).unwrap().model_root;
        assert_eq!(f.engine.parent(f.mesh).unwrap(), Some(model));
        assert!(f.engine.is_kinematic(f.mesh).unwrap());
        assert_eq!(f.engine.trigger_volume(f.mesh), None);
    }

    #[test]
    fn test_promote_demote_round_trip() {
        let mut f = fixture(false);
        let parent = f.engine.parent(f.mesh).unwrap();
        let before = f.engine.world_pose(f.mesh).unwrap();

        f.promote(Some(0.5));
        let demoted = f
            .connectors
            .demote(&mut f.engine, &f.parts, &mut f.driver, f.mesh)
            .unwrap();

        assert!(demoted);
        assert_eq!(f.engine.parent(f.mesh).unwrap(), parent);
        assert_relative_eq!(
            f.engine.world_pose(f.mesh).unwrap().position,
            before.position,
            epsilon = 1e-12
        );
        assert!(!f.engine.has_rigid_body(f.mesh));
        assert_eq!(f.engine.trigger_volume(f.mesh), None);
        assert_eq!(f.driver.subscriber_count(), 0);
    }

    #[test]
    fn test_demote_never_promoted_is_noop() {
        let mut f = fixture(false);
        let parent = f.engine.parent(f.mesh).unwrap();

        let demoted = f
            .connectors
            .demote(&mut f.engine, &f.parts, &mut f.driver, f.mesh)
            .unwrap();
        assert!(!demoted);
        assert_eq!(f.engine.parent(f.mesh).unwrap(), parent);
    }

    #[test]
    fn test_activation_change_mirrors_vessel() {
        let mut f = fixture(false);
        f.promote(None);
        let model = f.parts.part(PartId(1)).unwrap().model_root;

        let notified = f.driver.set_packed(VesselId(1), true);
        assert_eq!(notified, vec![f.mesh]);
        let reparent = f
            .connectors
            .on_activation_change(&mut f.engine, &f.parts, f.mesh, true)
            .unwrap()
            .unwrap();

        assert_eq!(reparent.old_parent, None);
        assert_eq!(reparent.new_parent, Some(model));
        assert!(f.engine.is_kinematic(f.mesh).unwrap());
    }
}
