//! What peer hooks and joint assemblies get to touch.

use link_physics::{ObjectId, PhysicsEngine};
use link_types::{LinkSystemConfig, PartId, Pose};

use crate::breakage::BreakageRouter;
use crate::connector::ConnectorSet;
use crate::driver::SimulationDriver;
use crate::error::Result;
use crate::host::HostJoints;
use crate::part::PartTable;
use crate::PeerId;

/// One end of a link as seen by a joint assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerAnchor {
    /// The peer.
    pub peer: PeerId,
    /// Its part.
    pub part: PartId,
    /// The part's rigid body.
    pub body: ObjectId,
    /// The peer's attach node.
    pub node: ObjectId,
}

/// Mutable view of the link system handed to hooks and assemblies.
pub struct LinkContext<'a> {
    /// The physics engine.
    pub engine: &'a mut dyn PhysicsEngine,
    /// All parts.
    pub parts: &'a mut PartTable,
    /// Promoted objects.
    pub connectors: &'a mut ConnectorSet,
    /// Activation subscriptions.
    pub driver: &'a mut SimulationDriver,
    /// Break listeners.
    pub router: &'a mut BreakageRouter,
    /// Native part couplings.
    pub host_joints: &'a mut HostJoints,
    /// System configuration.
    pub config: &'a LinkSystemConfig,
    /// The other end of the link being entered, if any.
    pub counterpart: Option<PeerAnchor>,
}

impl LinkContext<'_> {
    /// Promote an object on behalf of a part.
    pub fn promote(
        &mut self,
        owner: PartId,
        object: ObjectId,
        mass: f64,
        interaction_distance: Option<f64>,
    ) -> Result<()> {
        self.connectors.promote(
            self.engine,
            self.parts,
            self.driver,
            owner,
            object,
            mass,
            interaction_distance,
        )
    }

    /// Demote a promoted object.
    pub fn demote(&mut self, object: ObjectId) -> Result<bool> {
        self.connectors
            .demote(self.engine, self.parts, self.driver, object)
    }

    /// Stop tracking a connector and destroy its object along with its
    /// listener and constraints.
    pub fn release(&mut self, object: ObjectId) -> Result<()> {
        self.connectors.forget(self.driver, object);
        self.router.detach(self.engine, object)?;
        if self.engine.contains_object(object) {
            self.engine.destroy_object(object)?;
        }
        Ok(())
    }

    /// World pose of an anchor's attach node.
    pub fn node_pose(&self, anchor: &PeerAnchor) -> Result<Pose> {
        Ok(self.engine.world_pose(anchor.node)?)
    }

    /// Position of an anchor's node in its body's frame.
    pub fn node_in_body(&self, anchor: &PeerAnchor) -> Result<link_types::Point3<f64>> {
        let node = self.engine.world_pose(anchor.node)?;
        let body = self.engine.world_pose(anchor.body)?;
        Ok(body.inverse_transform_point(&node.position))
    }
}
