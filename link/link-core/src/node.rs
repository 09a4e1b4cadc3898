//! Attach-node resolution.
//!
//! A peer anchors its constraints at a named node on its part. Resolution
//! tries, in order:
//!
//! 1. a node registered on the part,
//! 2. an unregistered transform of that name under the part's model root,
//! 3. a transform synthesized from the peer's node definition string.
//!
//! Nodes found through 2 or 3 are registered on the part only in
//! interactive scenes; background loading skips the bookkeeping. A node
//! that cannot be resolved leaves the peer without coupling support.

use link_physics::{ObjectId, PhysicsEngine};
use link_types::{AttachNodeDef, GameScene, PeerConfig};
use tracing::{debug, warn};

use crate::error::Result;
use crate::part::Part;

/// A resolved attach node.
#[derive(Debug, Clone, PartialEq)]
pub struct AttachNode {
    /// Node name.
    pub name: String,
    /// Transform of the node, a descendant of the part's model root.
    pub object: ObjectId,
    /// Definition the node was built from, if any.
    pub definition: Option<AttachNodeDef>,
    /// Whether the node was synthesized for a peer rather than shipped
    /// with the part.
    pub dynamic: bool,
}

/// Resolve the node a peer is configured to anchor at.
///
/// Returns `Ok(None)` when the node is missing and no usable definition
/// exists. Only engine failures are errors.
pub fn resolve_attach_node(
    engine: &mut dyn PhysicsEngine,
    part: &mut Part,
    config: &PeerConfig,
    scene: GameScene,
) -> Result<Option<AttachNode>> {
    let name = config.attach_node.as_str();
    if let Some(node) = part.attach_node(name) {
        return Ok(Some(node.clone()));
    }

    let definition = match config.parsed_node_definition() {
        Ok(def) => def,
        Err(err) => {
            warn!(part = %part.id, node = name, error = %err, "unusable attach node definition");
            None
        }
    };

    let node = if let Some(object) = engine.find_child(part.model_root, name) {
        AttachNode {
            name: name.to_string(),
            object,
            definition,
            dynamic: definition.is_some(),
        }
    } else if let Some(def) = definition {
        let object = engine.create_object(name, Some(part.model_root), def.local_pose())?;
        debug!(part = %part.id, node = name, "synthesized attach node");
        AttachNode {
            name: name.to_string(),
            object,
            definition: Some(def),
            dynamic: true,
        }
    } else {
        warn!(part = %part.id, node = name, "attach node not found, peer cannot couple");
        return Ok(None);
    };

    if scene.is_interactive() {
        part.register_node(node.clone());
    }
    Ok(Some(node))
}

/// Register a node on its part if the scene allows it and it is missing.
pub(crate) fn ensure_registered(part: &mut Part, node: &AttachNode, scene: GameScene) {
    if scene.is_interactive() && part.attach_node(&node.name).is_none() {
        part.register_node(node.clone());
    }
}

/// Unregister a synthesized node if the part still carries it.
///
/// Returns whether anything was removed. Nodes shipped with the part are
/// never unregistered.
pub(crate) fn unregister_dynamic(part: &mut Part, node: &AttachNode) -> bool {
    if !node.dynamic {
        return false;
    }
    let registered = part
        .attach_node(&node.name)
        .is_some_and(|n| n.object == node.object);
    if registered {
        part.unregister_node(&node.name);
        debug!(part = %part.id, node = %node.name, "unregistered dynamic attach node");
    }
    registered
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use link_physics::HeadlessPhysics;
    use link_types::{PartId, Pose, VesselId};

    fn part(engine: &mut HeadlessPhysics) -> Part {
        let object = engine.create_object("part", None, Pose::identity()).unwrap();
        let model = engine
            .create_object(crate::part::MODEL_ROOT, Some(object), Pose::identity())
            .unwrap();
        Part::new(PartId(1), VesselId(1), object, model)
    }

    #[test]
    fn test_synthesizes_from_definition() {
        let mut engine = HeadlessPhysics::new();
        let mut part = part(&mut engine);
        let config = PeerConfig::new("cable", "plug").with_node_definition("0, 0.5, 0, 0, 1, 0");

        let node = resolve_attach_node(&mut engine, &mut part, &config, GameScene::Flight)
            .unwrap()
            .unwrap();
        assert!(node.dynamic);
        assert_eq!(engine.parent(node.object).unwrap(), Some(part.model_root));
        assert_relative_eq!(engine.world_pose(node.object).unwrap().position.y, 0.5, epsilon = 1e-12);
        assert!(part.attach_node("plug").is_some());

        // Second resolve reuses the registered node
        let again = resolve_attach_node(&mut engine, &mut part, &config, GameScene::Flight)
            .unwrap()
            .unwrap();
        assert_eq!(again.object, node.object);
    }

    #[test]
    fn test_loading_scene_skips_registration() {
        let mut engine = HeadlessPhysics::new();
        let mut part = part(&mut engine);
        let config = PeerConfig::new("cable", "plug").with_node_definition("0, 0, 1, 0, 0, 1");

        let node = resolve_attach_node(&mut engine, &mut part, &config, GameScene::Loading)
            .unwrap()
            .unwrap();
        assert!(part.attach_nodes().is_empty());

        // The transform is found again instead of being created twice
        let again = resolve_attach_node(&mut engine, &mut part, &config, GameScene::Loading)
            .unwrap()
            .unwrap();
        assert_eq!(again.object, node.object);
        assert_eq!(engine.children(part.model_root).len(), 1);
    }

    #[test]
    fn test_missing_or_broken_definition_yields_none() {
        let mut engine = HeadlessPhysics::new();
        let mut part = part(&mut engine);

        let missing = PeerConfig::new("cable", "plug");
        assert!(resolve_attach_node(&mut engine, &mut part, &missing, GameScene::Flight)
            .unwrap()
            .is_none());

        let broken = PeerConfig::new("cable", "plug").with_node_definition("0, 0, zero");
        assert!(resolve_attach_node(&mut engine, &mut part, &broken, GameScene::Flight)
            .unwrap()
            .is_none());
        assert!(engine.children(part.model_root).is_empty());
    }

    #[test]
    fn test_unregister_only_dynamic_nodes() {
        let mut engine = HeadlessPhysics::new();
        let mut part = part(&mut engine);
        let shipped = AttachNode {
            name: "top".to_string(),
            object: engine.create_object("top", Some(part.model_root), Pose::identity()).unwrap(),
            definition: None,
            dynamic: false,
        };
        part.register_node(shipped.clone());

        assert!(!unregister_dynamic(&mut part, &shipped));
        assert!(part.attach_node("top").is_some());

        let dynamic = AttachNode {
            dynamic: true,
            ..shipped
        };
        assert!(unregister_dynamic(&mut part, &dynamic));
        assert!(part.attach_node("top").is_none());
    }
}
