//! Target peer: the passive end.

use link_types::{LinkState, PeerRole};
use tracing::debug;

use super::{PeerBehavior, PeerLink, PeerView};
use crate::context::LinkContext;
use crate::error::Result;

/// Behaviour of a link target. The source builds everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct TargetBehavior;

impl PeerBehavior for TargetBehavior {
    fn role(&self) -> PeerRole {
        PeerRole::Target
    }

    fn on_peer_change(&mut self, peer: &PeerView<'_>, previous: Option<PeerLink>) {
        if previous != peer.other {
            debug!(peer = %peer.id, from = ?previous.map(|p| p.peer), to = ?peer.other.map(|p| p.peer), "target counterpart changed");
        }
    }

    fn on_state_enter(
        &mut self,
        peer: &PeerView<'_>,
        state: LinkState,
        _ctx: &mut LinkContext<'_>,
    ) -> Result<()> {
        if state == LinkState::Linked {
            debug!(peer = %peer.id, source = ?peer.other.map(|p| p.peer), "target linked");
        }
        Ok(())
    }
}
