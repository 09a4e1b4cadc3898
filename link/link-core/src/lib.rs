//! Link lifecycle and joint assembly.
//!
//! A link joins two parts through a pair of peers: a **source** that owns
//! the joint, and a **target** it attaches to. Each peer runs a small state
//! machine:
//!
//! ```text
//! Available ──► Locked ──► Linked
//!     ▲            │          │
//!     └────────────┴──────────┘
//! ```
//!
//! `Locked` only exists while a link is negotiated and is never persisted.
//! Every state may be re-entered, and re-entering runs the state's leave
//! and enter hooks again, so entering `Linked` always rebuilds the joint.
//!
//! # Joints
//!
//! The source's [`JointAssembly`] turns a link into constraints:
//!
//! - [`RigidStock`] - reuses the host coupling between the parts
//! - [`DualPivotStrut`] - two pivots and a spring strut, built over three
//!   fixed steps so the engine captures each rest pose before it is used
//! - [`SpringCable`] - a distance-limited spring and a free cable end
//!
//! # Breaking
//!
//! When a constraint exceeds its thresholds the engine reports it, the
//! [`BreakageRouter`] resolves which part heard it, and the link owning
//! the constraint is severed with [`LinkActor::Physics`].
//!
//! # Example
//!
//! ```
//! use link_core::{LinkEvent, LinkSystem, PartDesc};
//! use link_physics::HeadlessPhysics;
//! use link_types::{
//!     AttachNodeDef, JointConfig, LinkActor, LinkSystemConfig, PartId, PeerConfig, Point3, Pose,
//!     Vector3, VesselId,
//! };
//!
//! let mut links = LinkSystem::new(LinkSystemConfig::default(), HeadlessPhysics::new()).unwrap();
//! let node = AttachNodeDef::new(Point3::origin(), Vector3::z()).unwrap();
//! for (id, z) in [(1, 0.0), (2, 3.0)] {
//!     let pose = Pose::from_position(Point3::new(0.0, 0.0, z));
//!     links.add_part(PartDesc::new(PartId(id), VesselId(1), 50.0).with_pose(pose)).unwrap();
//!     links.add_attach_node(PartId(id), "side", node).unwrap();
//! }
//!
//! let source = links
//!     .add_source(PartId(1), PeerConfig::new("winch", "side"), JointConfig::default())
//!     .unwrap();
//! let target = links.add_target(PartId(2), PeerConfig::new("winch", "side")).unwrap();
//! links.start().unwrap();
//! links.link(source, target).unwrap();
//! links.break_link(target, LinkActor::Manual).unwrap();
//!
//! let events = links.drain_events();
//! assert_eq!(events.len(), 2);
//! assert!(events[1].is_broken_by(LinkActor::Manual));
//! assert!(matches!(events[0], LinkEvent::Linked { .. }));
//! ```
//!
//! [`LinkActor::Physics`]: link_types::LinkActor::Physics

#![doc(html_root_url = "https://docs.rs/link-core/0.1.0")]
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn, // Many methods can't be const due to trait objects
    clippy::missing_errors_doc,   // Most operations fail only on stale handles
    clippy::module_name_repetitions,
)]

mod breakage;
mod connector;
mod context;
mod driver;
mod error;
mod event;
mod host;
pub mod joint;
mod node;
mod part;
mod peer;
mod system;

pub use breakage::{BreakListener, BreakRequest, BreakageRouter};
pub use connector::{ConnectorSet, HighlightRefresher, NoHighlight, PhysicalConnector, Reparent};
pub use context::{LinkContext, PeerAnchor};
pub use driver::{SimulationDriver, SubscriptionId};
pub use error::{LinkError, Result};
pub use event::LinkEvent;
pub use host::HostJoints;
pub use joint::{
    build_assembly, is_stretched, DualPivotStrut, JointAssembly, RigidStock, SpringCable,
    StrutPhase,
};
pub use node::{resolve_attach_node, AttachNode};
pub use part::{Part, PartDesc, PartTable, MODEL_ROOT};
pub use peer::{
    JointSnapshot, LinkPeer, LinkStateMachine, PeerBehavior, PeerId, PeerLink, PeerSnapshot,
    PeerView, SourceBehavior, TargetBehavior,
};
pub use system::LinkSystem;
