//! Vessel activation tracking and subscriptions.
//!
//! Vessels switch between full simulation (off rails) and reduced
//! simulation (packed, on rails). Objects that must follow those
//! transitions subscribe explicitly and unsubscribe when they go away;
//! [`SimulationDriver::set_packed`] reports who to notify.

use hashbrown::HashMap;
use link_physics::ObjectId;
use link_types::VesselId;
use tracing::debug;

/// Handle of an activation subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

#[derive(Debug, Clone, Copy)]
struct Subscription {
    vessel: VesselId,
    object: ObjectId,
}

/// Per-vessel activation flags and their subscribers.
#[derive(Debug, Clone, Default)]
pub struct SimulationDriver {
    packed: HashMap<VesselId, bool>,
    subscriptions: HashMap<SubscriptionId, Subscription>,
    next_subscription: u64,
}

impl SimulationDriver {
    /// Create a driver with no vessels.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a vessel with its initial activation mode.
    pub fn add_vessel(&mut self, vessel: VesselId, packed: bool) {
        self.packed.insert(vessel, packed);
    }

    /// Whether a vessel is in reduced simulation. Unknown vessels are
    /// fully simulated.
    #[must_use]
    pub fn is_packed(&self, vessel: VesselId) -> bool {
        self.packed.get(&vessel).copied().unwrap_or(false)
    }

    /// Change a vessel's activation mode.
    ///
    /// Returns the objects subscribed to the vessel, in subscription order,
    /// or nothing when the mode did not change.
    pub fn set_packed(&mut self, vessel: VesselId, packed: bool) -> Vec<ObjectId> {
        let previous = self.packed.insert(vessel, packed).unwrap_or(false);
        if previous == packed {
            return Vec::new();
        }
        debug!(vessel = %vessel, packed, "vessel activation changed");

        let mut subscribers: Vec<_> = self
            .subscriptions
            .iter()
            .filter(|(_, s)| s.vessel == vessel)
            .map(|(id, s)| (*id, s.object))
            .collect();
        subscribers.sort_unstable_by_key(|(id, _)| *id);
        subscribers.into_iter().map(|(_, object)| object).collect()
    }

    /// Subscribe an object to a vessel's activation changes.
    pub fn subscribe(&mut self, vessel: VesselId, object: ObjectId) -> SubscriptionId {
        self.next_subscription += 1;
        let id = SubscriptionId(self.next_subscription);
        self.subscriptions.insert(id, Subscription { vessel, object });
        id
    }

    /// Drop a subscription. Returns whether it existed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscriptions.remove(&id).is_some()
    }

    /// Move a subscription to another vessel.
    pub fn rebind(&mut self, id: SubscriptionId, vessel: VesselId) -> bool {
        match self.subscriptions.get_mut(&id) {
            Some(sub) => {
                sub.vessel = vessel;
                true
            }
            None => false,
        }
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscriptions.len()
    }
}
