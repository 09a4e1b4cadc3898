//! Persisted peer and joint state.

use link_types::{BreakThresholds, JointVariant, LinkState, PartId};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// What a peer writes to a save file.
///
/// Live constraint handles are never persisted; joints are rebuilt from
/// peer state on load.
///
/// # Example
///
/// ```
/// use link_core::PeerSnapshot;
/// use link_types::{LinkState, PartId};
///
/// let snapshot = PeerSnapshot::new("cable", "plug")
///     .with_state(LinkState::Locked)
///     .with_other_part(PartId(2));
/// assert_eq!(snapshot.normalized().state, LinkState::Available);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PeerSnapshot {
    /// Persisted state. Never `Locked` when written by a peer.
    pub state: LinkState,
    /// Part of the counterpart while linked.
    #[cfg_attr(feature = "serde", serde(default))]
    pub other_part: Option<PartId>,
    /// Attach node name of the counterpart while linked. Tells apart
    /// several links between the same two parts.
    #[cfg_attr(feature = "serde", serde(default))]
    pub other_attach_node: Option<String>,
    /// Link type tag.
    pub link_type: String,
    /// Attach node name.
    pub attach_node: String,
    /// Attach node definition.
    #[cfg_attr(feature = "serde", serde(default))]
    pub attach_node_definition: Option<String>,
    /// Joint configuration, for source peers.
    #[cfg_attr(feature = "serde", serde(default))]
    pub joint: Option<JointSnapshot>,
}

impl PeerSnapshot {
    /// Snapshot of an available peer.
    #[must_use]
    pub fn new(link_type: impl Into<String>, attach_node: impl Into<String>) -> Self {
        Self {
            state: LinkState::Available,
            other_part: None,
            other_attach_node: None,
            link_type: link_type.into(),
            attach_node: attach_node.into(),
            attach_node_definition: None,
            joint: None,
        }
    }

    /// Set the state.
    #[must_use]
    pub fn with_state(mut self, state: LinkState) -> Self {
        self.state = state;
        self
    }

    /// Set the counterpart part.
    #[must_use]
    pub fn with_other_part(mut self, part: PartId) -> Self {
        self.other_part = Some(part);
        self
    }

    /// Set the counterpart's attach node name.
    #[must_use]
    pub fn with_other_attach_node(mut self, node: impl Into<String>) -> Self {
        self.other_attach_node = Some(node.into());
        self
    }

    /// Set the joint snapshot.
    #[must_use]
    pub fn with_joint(mut self, joint: JointSnapshot) -> Self {
        self.joint = Some(joint);
        self
    }

    /// Bring a loaded snapshot back inside the persisted invariants.
    ///
    /// `Locked` becomes `Available`, and so does `Linked` without a
    /// counterpart. The counterpart and its node are cleared whenever the
    /// state is not `Linked`.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.state = self.state.persisted();
        if self.state == LinkState::Linked && self.other_part.is_none() {
            self.state = LinkState::Available;
        }
        if self.state != LinkState::Linked {
            self.other_part = None;
            self.other_attach_node = None;
        }
        self
    }
}

/// Persisted joint configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct JointSnapshot {
    /// Assembly strategy.
    pub variant: JointVariant,
    /// Configured break thresholds.
    pub breaks: BreakThresholds,
    /// Cable length, for cables.
    #[cfg_attr(feature = "serde", serde(default))]
    pub cable_length: Option<f64>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_linked_without_counterpart_normalizes() {
        let snapshot = PeerSnapshot::new("cable", "plug")
            .with_state(LinkState::Linked)
            .normalized();
        assert_eq!(snapshot.state, LinkState::Available);
    }

    #[test]
    fn test_available_drops_counterpart() {
        let snapshot = PeerSnapshot::new("cable", "plug")
            .with_other_part(PartId(3))
            .with_other_attach_node("socket")
            .normalized();
        assert_eq!(snapshot.other_part, None);
        assert_eq!(snapshot.other_attach_node, None);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_json_round_trip() {
        let snapshot = PeerSnapshot::new("strut", "top")
            .with_state(LinkState::Linked)
            .with_other_part(PartId(9))
            .with_other_attach_node("bottom")
            .with_joint(JointSnapshot {
                variant: JointVariant::DualPivotStrut,
                breaks: BreakThresholds::new(100.0, f64::INFINITY),
                cable_length: None,
            });

        let json = serde_json::to_string(&snapshot).unwrap();
        let back: PeerSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snapshot);
    }
}
