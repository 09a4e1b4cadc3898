//! Parts: the rigid bodies links are made between.

use hashbrown::HashMap;
use link_physics::ObjectId;
use link_types::{PartId, Pose, VesselId};

use crate::error::{LinkError, Result};
use crate::node::AttachNode;

/// Name of the model root created under every part object.
pub const MODEL_ROOT: &str = "model";

/// Description of a part to instantiate.
///
/// # Example
///
/// ```
/// use link_core::PartDesc;
/// use link_types::{PartId, Point3, Pose, VesselId};
///
/// let desc = PartDesc::new(PartId(7), VesselId(1), 250.0)
///     .with_name("winch")
///     .with_pose(Pose::from_position(Point3::new(0.0, 1.0, 0.0)));
/// assert_eq!(desc.name, "winch");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct PartDesc {
    /// Stable identifier.
    pub id: PartId,
    /// Vessel the part belongs to.
    pub vessel: VesselId,
    /// Object name.
    pub name: String,
    /// Initial world pose.
    pub pose: Pose,
    /// Rigid-body mass (kg).
    pub mass: f64,
}

impl PartDesc {
    /// Describe a part at the origin.
    #[must_use]
    pub fn new(id: PartId, vessel: VesselId, mass: f64) -> Self {
        Self {
            id,
            vessel,
            name: format!("part-{}", id.raw()),
            pose: Pose::identity(),
            mass,
        }
    }

    /// Set the object name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the initial world pose.
    #[must_use]
    pub fn with_pose(mut self, pose: Pose) -> Self {
        self.pose = pose;
        self
    }
}

/// A live part.
#[derive(Debug, Clone)]
pub struct Part {
    /// Stable identifier.
    pub id: PartId,
    /// Vessel the part currently belongs to.
    pub vessel: VesselId,
    /// Scene object carrying the part's rigid body.
    pub object: ObjectId,
    /// Root of the part's model hierarchy. Attach nodes live under it.
    pub model_root: ObjectId,
    attach_nodes: Vec<AttachNode>,
}

impl Part {
    pub(crate) fn new(id: PartId, vessel: VesselId, object: ObjectId, model_root: ObjectId) -> Self {
        Self {
            id,
            vessel,
            object,
            model_root,
            attach_nodes: Vec::new(),
        }
    }

    /// Registered attach node by name.
    #[must_use]
    pub fn attach_node(&self, name: &str) -> Option<&AttachNode> {
        self.attach_nodes.iter().find(|n| n.name == name)
    }

    /// All registered attach nodes.
    #[must_use]
    pub fn attach_nodes(&self) -> &[AttachNode] {
        &self.attach_nodes
    }

    /// Register a node, replacing one with the same name.
    pub(crate) fn register_node(&mut self, node: AttachNode) {
        self.attach_nodes.retain(|n| n.name != node.name);
        self.attach_nodes.push(node);
    }

    /// Unregister a node by name.
    pub(crate) fn unregister_node(&mut self, name: &str) -> Option<AttachNode> {
        let index = self.attach_nodes.iter().position(|n| n.name == name)?;
        Some(self.attach_nodes.remove(index))
    }
}

/// All live parts by id.
#[derive(Debug, Clone, Default)]
pub struct PartTable {
    parts: HashMap<PartId, Part>,
}

impl PartTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a part.
    pub fn part(&self, id: PartId) -> Result<&Part> {
        self.parts.get(&id).ok_or(LinkError::UnknownPart(id))
    }

    /// Look up a part mutably.
    pub fn part_mut(&mut self, id: PartId) -> Result<&mut Part> {
        self.parts.get_mut(&id).ok_or(LinkError::UnknownPart(id))
    }

    /// Look up a part, if present.
    #[must_use]
    pub fn get(&self, id: PartId) -> Option<&Part> {
        self.parts.get(&id)
    }

    /// Check whether a part exists.
    #[must_use]
    pub fn contains(&self, id: PartId) -> bool {
        self.parts.contains_key(&id)
    }

    /// Number of parts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// Check whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub(crate) fn insert(&mut self, part: Part) -> Result<()> {
        if self.parts.contains_key(&part.id) {
            return Err(LinkError::DuplicatePart(part.id));
        }
        self.parts.insert(part.id, part);
        Ok(())
    }

    pub(crate) fn remove(&mut self, id: PartId) -> Option<Part> {
        self.parts.remove(&id)
    }
}
