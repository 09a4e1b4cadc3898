//! Declarative attach-node definitions.
//!
//! A node definition is a comma separated string:
//!
//! ```text
//! px, py, pz, dx, dy, dz [, size]
//! ```
//!
//! `p` is the node position and `d` the direction it faces, both in the
//! owning part's model frame. `size` is an optional integer hint for
//! coupling compatibility and defaults to 1.

use std::str::FromStr;

use nalgebra::{Point3, Vector3};

use crate::error::ConfigError;
use crate::pose::Pose;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A parsed attach-node definition.
///
/// # Example
///
/// ```
/// use link_types::AttachNodeDef;
///
/// let def: AttachNodeDef = "0, 0.5, 0, 0, 1, 0".parse().unwrap();
/// assert_eq!(def.size, 1);
/// assert_eq!(def.position.y, 0.5);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AttachNodeDef {
    /// Node position in the model frame.
    pub position: Point3<f64>,
    /// Facing direction in the model frame (unit length).
    pub orientation: Vector3<f64>,
    /// Size hint.
    pub size: u32,
}

impl AttachNodeDef {
    /// Create a definition, normalizing the orientation.
    ///
    /// Fails if the orientation has zero length.
    pub fn new(position: Point3<f64>, orientation: Vector3<f64>) -> crate::Result<Self> {
        let orientation = orientation
            .try_normalize(1e-9)
            .ok_or_else(|| ConfigError::invalid_node("orientation has zero length"))?;
        Ok(Self {
            position,
            orientation,
            size: 1,
        })
    }

    /// Set the size hint.
    #[must_use]
    pub fn with_size(mut self, size: u32) -> Self {
        self.size = size;
        self
    }

    /// The node's pose relative to the model root.
    #[must_use]
    pub fn local_pose(&self) -> Pose {
        Pose::facing(self.position, &self.orientation)
    }
}

impl FromStr for AttachNodeDef {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s.split(',').map(str::trim).collect();
        if fields.len() != 6 && fields.len() != 7 {
            return Err(ConfigError::InvalidNodeDefinition {
                definition: s.to_string(),
                reason: format!("expected 6 or 7 fields, got {}", fields.len()),
            });
        }

        let mut values = [0.0_f64; 6];
        for (slot, field) in values.iter_mut().zip(&fields) {
            *slot = field.parse().map_err(|_| ConfigError::InvalidNodeDefinition {
                definition: s.to_string(),
                reason: format!("'{field}' is not a number"),
            })?;
            if !slot.is_finite() {
                return Err(ConfigError::InvalidNodeDefinition {
                    definition: s.to_string(),
                    reason: format!("'{field}' is not finite"),
                });
            }
        }

        let size = match fields.get(6) {
            Some(field) => field.parse().map_err(|_| ConfigError::InvalidNodeDefinition {
                definition: s.to_string(),
                reason: format!("size '{field}' is not a non-negative integer"),
            })?,
            None => 1,
        };

        let def = Self::new(
            Point3::new(values[0], values[1], values[2]),
            Vector3::new(values[3], values[4], values[5]),
        )
        .map_err(|_| ConfigError::InvalidNodeDefinition {
            definition: s.to_string(),
            reason: "orientation has zero length".to_string(),
        })?;

        Ok(def.with_size(size))
    }
}

impl std::fmt::Display for AttachNodeDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}, {}, {}, {}, {}, {}, {}",
            self.position.x,
            self.position.y,
            self.position.z,
            self.orientation.x,
            self.orientation.y,
            self.orientation.z,
            self.size
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_parse_with_size() {
        let def: AttachNodeDef = " 1, 2, 3, 0, 0, 2, 3 ".parse().unwrap();
        assert_eq!(def.position, Point3::new(1.0, 2.0, 3.0));
        assert_relative_eq!(def.orientation.z, 1.0, epsilon = 1e-12);
        assert_eq!(def.size, 3);
    }

    #[test]
    fn test_parse_rejects_wrong_arity() {
        let err = "1, 2, 3".parse::<AttachNodeDef>().unwrap_err();
        assert!(err.to_string().contains("expected 6 or 7 fields"));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("1, 2, x, 0, 0, 1".parse::<AttachNodeDef>().is_err());
        assert!("1, 2, 3, 0, 0, 1, -1".parse::<AttachNodeDef>().is_err());
        assert!("1, 2, 3, 0, 0, inf".parse::<AttachNodeDef>().is_err());
    }

    #[test]
    fn test_parse_rejects_zero_orientation() {
        let err = "0, 0, 0, 0, 0, 0".parse::<AttachNodeDef>().unwrap_err();
        assert!(err.is_node_definition());
    }

    #[test]
    fn test_local_pose_faces_orientation() {
        let def: AttachNodeDef = "0, 0.5, 0, 0, 1, 0".parse().unwrap();
        let pose = def.local_pose();

        assert_relative_eq!(pose.position.y, 0.5, epsilon = 1e-12);
        assert_relative_eq!(pose.forward().y, 1.0, epsilon = 1e-10);
    }

    #[test]
    fn test_display_parses_back() {
        let def: AttachNodeDef = "0.25, 0, -1, 1, 0, 0, 2".parse().unwrap();
        let again: AttachNodeDef = def.to_string().parse().unwrap();
        assert_eq!(def, again);
    }
}
