//! Translation of constraint breaks into link break requests.
//!
//! Every object that owns a link constraint carries a small listener
//! sub-object. When the engine reports a break, the listener on the
//! constraint's owner names the part it reports to, and the break becomes
//! a request to sever whatever link owns that constraint, attributed to
//! [`LinkActor::Physics`].

use hashbrown::HashMap;
use link_physics::{ConstraintBreak, ConstraintId, ConstraintKind, ObjectId, PhysicsEngine};
use link_types::{LinkActor, PartId, Pose};
use tracing::debug;

use crate::error::Result;

/// Name of the listener sub-object.
pub const LISTENER_NAME: &str = "BrokenJointListener";

/// A listener attached to a constraint owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakListener {
    /// The listener sub-object.
    pub object: ObjectId,
    /// The object it listens on.
    pub host: ObjectId,
    /// Part it reports to.
    pub part: PartId,
}

/// Request to sever the link owning a broken constraint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BreakRequest {
    /// Part the listener reports to.
    pub part: PartId,
    /// The constraint that broke.
    pub constraint: ConstraintId,
    /// Its kind.
    pub kind: ConstraintKind,
    /// Who broke it.
    pub actor: LinkActor,
}

/// Listeners by the object they listen on.
#[derive(Debug, Clone, Default)]
pub struct BreakageRouter {
    listeners: HashMap<ObjectId, BreakListener>,
}

impl BreakageRouter {
    /// Create a router with no listeners.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a listener to `host` reporting to `part`.
    ///
    /// Attaching twice keeps the first listener.
    pub fn attach(
        &mut self,
        engine: &mut dyn PhysicsEngine,
        host: ObjectId,
        part: PartId,
    ) -> Result<ObjectId> {
        if let Some(listener) = self.listeners.get(&host) {
            return Ok(listener.object);
        }
        let object = engine.create_object(LISTENER_NAME, Some(host), Pose::identity())?;
        self.listeners.insert(host, BreakListener { object, host, part });
        Ok(object)
    }

    /// Remove the listener on `host`, destroying its sub-object if alive.
    pub fn detach(&mut self, engine: &mut dyn PhysicsEngine, host: ObjectId) -> Result<bool> {
        let Some(listener) = self.listeners.remove(&host) else {
            return Ok(false);
        };
        if engine.contains_object(listener.object) {
            engine.destroy_object(listener.object)?;
        }
        Ok(true)
    }

    /// Drop every listener reporting to a part.
    pub fn forget_part(&mut self, part: PartId) {
        self.listeners.retain(|_, l| l.part != part);
    }

    /// Listener on an object.
    #[must_use]
    pub fn listener(&self, host: ObjectId) -> Option<&BreakListener> {
        self.listeners.get(&host)
    }

    /// Turn a break notification into a sever request.
    ///
    /// Returns `None` when nothing listens on the constraint's owner.
    #[must_use]
    pub fn route(&self, event: &ConstraintBreak) -> Option<BreakRequest> {
        let listener = self.listeners.get(&event.owner)?;
        debug!(
            constraint = %event.constraint,
            owner = %event.owner,
            part = %listener.part,
            "routing constraint break"
        );
        Some(BreakRequest {
            part: listener.part,
            constraint: event.constraint,
            kind: event.kind,
            actor: LinkActor::Physics,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use link_physics::{ConstraintLoad, HeadlessPhysics};

    fn event(owner: ObjectId) -> ConstraintBreak {
        ConstraintBreak {
            constraint: ConstraintId(3),
            kind: ConstraintKind::pivot(),
            owner,
            connected: ObjectId(99),
            load: ConstraintLoad::torque(1.0),
        }
    }

    #[test]
    fn test_routes_to_listening_part() {
        let mut engine = HeadlessPhysics::new();
        let host = engine.create_object("pivot", None, Pose::identity()).unwrap();
        let mut router = BreakageRouter::new();
        let listener = router.attach(&mut engine, host, PartId(4)).unwrap();

        assert_eq!(engine.object_name(listener).unwrap(), LISTENER_NAME);
        assert_eq!(router.attach(&mut engine, host, PartId(5)).unwrap(), listener);

        let request = router.route(&event(host)).unwrap();
        assert_eq!(request.part, PartId(4));
        assert_eq!(request.actor, LinkActor::Physics);
        assert!(router.route(&event(ObjectId(1234))).is_none());
    }

    #[test]
    fn test_detach_destroys_listener() {
        let mut engine = HeadlessPhysics::new();
        let host = engine.create_object("pivot", None, Pose::identity()).unwrap();
        let mut router = BreakageRouter::new();
        let listener = router.attach(&mut engine, host, PartId(4)).unwrap();

        assert!(router.detach(&mut engine, host).unwrap());
        assert!(!engine.contains_object(listener));
        assert!(!router.detach(&mut engine, host).unwrap());
        assert!(router.route(&event(host)).is_none());
    }
}
