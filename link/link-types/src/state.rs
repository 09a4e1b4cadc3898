//! Link peer states, roles and breakage actors.
//!
//! # Transition Table
//!
//! ```text
//! Available ──► Available | Locked | Linked
//! Locked    ──► Locked | Available | Linked
//! Linked    ──► Linked | Available
//! ```
//!
//! Every state may transition to itself. Re-entering the current state is
//! how a peer forces its setup to be re-applied after a load.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Persisted state of a link peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum LinkState {
    /// Free to start a link.
    #[default]
    Available,
    /// Reserved by an in-progress coupling negotiation.
    Locked,
    /// Linked to a counterpart peer.
    Linked,
}

impl LinkState {
    /// All states, in declaration order.
    pub const ALL: [Self; 3] = [Self::Available, Self::Locked, Self::Linked];

    /// States reachable from `self`.
    #[must_use]
    pub fn allowed_transitions(self) -> &'static [Self] {
        match self {
            Self::Available => &[Self::Available, Self::Locked, Self::Linked],
            Self::Locked => &[Self::Locked, Self::Available, Self::Linked],
            Self::Linked => &[Self::Linked, Self::Available],
        }
    }

    /// Check whether `self -> next` is in the transition table.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        self.allowed_transitions().contains(&next)
    }

    /// Whether this state may be written to a save file as is.
    ///
    /// `Locked` only exists while a negotiation is running.
    #[must_use]
    pub const fn is_persistable(self) -> bool {
        !matches!(self, Self::Locked)
    }

    /// The state to write to a save file.
    #[must_use]
    pub const fn persisted(self) -> Self {
        match self {
            Self::Locked => Self::Available,
            other => other,
        }
    }
}

impl std::fmt::Display for LinkState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Available => "Available",
            Self::Locked => "Locked",
            Self::Linked => "Linked",
        };
        f.write_str(name)
    }
}

/// Which end of a link a peer is. Fixed per concrete peer type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PeerRole {
    /// Initiates links and owns the joint assembly.
    Source,
    /// Accepts links from sources.
    Target,
}

impl PeerRole {
    /// The role a counterpart must have.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Source => Self::Target,
            Self::Target => Self::Source,
        }
    }
}

impl std::fmt::Display for PeerRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Source => f.write_str("source"),
            Self::Target => f.write_str("target"),
        }
    }
}

/// The attributed cause of a link change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum LinkActor {
    /// A constraint broke in the simulation.
    Physics,
    /// A player asked for it.
    Manual,
    /// Script or system code asked for it (part removal, assembly abort).
    Api,
}

impl LinkActor {
    /// Whether the change was not requested by anyone.
    #[must_use]
    pub const fn is_accidental(self) -> bool {
        matches!(self, Self::Physics)
    }
}

impl std::fmt::Display for LinkActor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Physics => f.write_str("physics"),
            Self::Manual => f.write_str("manual"),
            Self::Api => f.write_str("api"),
        }
    }
}
