//! Core types for rigid-body link coordination.
//!
//! This crate provides the data shared by the link engine and its
//! collaborators:
//!
//! - [`LinkState`] - Persisted peer state and its transition table
//! - [`PeerRole`] / [`LinkActor`] - Which end a peer is, who broke a link
//! - [`PartId`] / [`VesselId`] - Identifiers stable across save/load
//! - [`Pose`] / [`Twist`] - Transforms and velocities
//! - [`AttachNodeDef`] - Declarative attach-node definitions
//! - [`BreakThresholds`], [`JointConfig`], [`PeerConfig`], [`LinkSystemConfig`]
//!
//! # Design Philosophy
//!
//! These types are **pure data**. They carry validation but no physics and
//! no lifecycle. They are the common language between the link engine, the
//! physics engine contract and whatever persists parts to disk.
//!
//! # Example
//!
//! ```
//! use link_types::{BreakThresholds, JointConfig, LinkState, StrutConfig};
//!
//! let strut = JointConfig::DualPivotStrut(
//!     StrutConfig::default()
//!         .with_breaks(BreakThresholds::new(200.0, 50.0))
//!         .with_spring(1000.0, 5.0),
//! );
//! assert!(strut.validate().is_ok());
//!
//! assert!(LinkState::Available.can_transition_to(LinkState::Locked));
//! assert!(!LinkState::Linked.can_transition_to(LinkState::Locked));
//! ```

#![doc(html_root_url = "https://docs.rs/link-types/0.1.0")]
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn, // Many methods can't be const due to nalgebra
    clippy::missing_errors_doc,   // Error docs added where non-obvious
)]

mod config;
mod error;
mod ids;
mod node_def;
mod pose;
mod state;

pub use config::{
    BreakAxisMapping, BreakThresholds, CableConfig, GameScene, JointConfig, JointVariant,
    LinkLimits, LinkSystemConfig, PeerConfig, StrutConfig,
};
pub use error::ConfigError;
pub use ids::{PartId, VesselId};
pub use node_def::AttachNodeDef;
pub use pose::{Pose, Twist};
pub use state::{LinkActor, LinkState, PeerRole};

// Re-export math types for convenience
pub use nalgebra::{Point3, UnitQuaternion, Vector3};

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;
