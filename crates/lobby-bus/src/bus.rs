/// The `MessageBus` contract — everything the session layer needs from
/// a transport: point-to-point send, group broadcast, non-blocking
/// receive with a validated-sender flag, peer channels, and the group
/// leadership primitive that drives host selection and migration.
///
/// Slow operations (channel open, leadership handoff) are issued and
/// polled to completion across ticks; the bus never blocks the caller.
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::BusError;

// ── PeerId ───────────────────────────────────────────────────────────

/// Transport-level routable peer address.
///
/// Distinct from the session layer's stable machine identity: a peer id
/// is only meaningful while the peer is connected to a group.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct PeerId(pub u64);

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer-{:x}", self.0)
    }
}

// ── GroupHandle ──────────────────────────────────────────────────────

/// Opaque handle to a network group (e.g., "net-<uuid>").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupHandle(pub String);

impl GroupHandle {
    /// Create a new random group handle.
    pub fn new() -> Self {
        Self(format!("net-{}", uuid::Uuid::new_v4()))
    }
}

impl Default for GroupHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for GroupHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Async operations ─────────────────────────────────────────────────

/// Identifier of an in-flight bus operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OpId(pub u64);

/// Status of an in-flight bus operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpStatus {
    /// Still in progress; poll again next tick.
    Pending,
    /// Completed successfully.
    Complete,
    /// Failed, or the operation id is unknown.
    Failed,
}

// ── BusEvent ─────────────────────────────────────────────────────────

/// An inbound event drained from the bus.
#[derive(Debug, Clone, PartialEq)]
pub enum BusEvent {
    /// A message arrived from a peer.
    ///
    /// `validated` is true when the local endpoint has an open channel
    /// to the sender, i.e. the sender is a confirmed member rather than
    /// an unauthenticated bootstrap peer.
    Message {
        from: PeerId,
        bytes: Vec<u8>,
        validated: bool,
    },
    /// A peer dropped out of the group.
    PeerLost(PeerId),
}

// ── MessageBus ───────────────────────────────────────────────────────

/// Transport seam consumed by the session layer.
pub trait MessageBus {
    /// The local endpoint's routable address within the group.
    fn local_peer(&self) -> PeerId;

    /// Send bytes to a specific peer.
    fn send(&mut self, peer: PeerId, bytes: &[u8]) -> Result<(), BusError>;

    /// Send bytes to every other peer in the group.
    fn broadcast(&mut self, bytes: &[u8]) -> Result<(), BusError>;

    /// Non-blocking poll for the next inbound event.
    ///
    /// Transport errors are reported as a dropped receive (`None`).
    fn try_recv(&mut self) -> Option<BusEvent>;

    /// Begin opening a validated channel to a peer. Poll the returned
    /// operation to completion; the channel counts as open only once
    /// the operation completes.
    fn begin_open_channel(&mut self, peer: PeerId) -> Result<OpId, BusError>;

    /// Close the channel to a peer. Synchronous and idempotent.
    fn close_channel(&mut self, peer: PeerId);

    /// Whether a validated channel to the peer is currently open.
    fn channel_open(&self, peer: PeerId) -> bool;

    /// Identity of the peer currently owning group leadership, if any.
    ///
    /// Every member observes the same value — this is the primitive
    /// that decides "am I host" and resolves post-migration races.
    fn leader(&self) -> Option<PeerId>;

    /// Begin transferring group leadership away from the local peer.
    ///
    /// Fails when the local peer is not the leader or no other peer
    /// remains to take over.
    fn begin_host_handoff(&mut self) -> Result<OpId, BusError>;

    /// Poll an in-flight operation.
    fn poll_operation(&mut self, op: OpId) -> OpStatus;

    /// All peers currently in the group, excluding the local peer.
    fn peers(&self) -> Vec<PeerId>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peer_id_display() {
        assert_eq!(PeerId(0x2a).to_string(), "peer-2a");
    }

    #[test]
    fn group_handle_format() {
        let handle = GroupHandle::new();
        assert!(handle.0.starts_with("net-"));
        assert!(handle.0.len() > 10);
    }

    #[test]
    fn group_handles_are_unique() {
        assert_ne!(GroupHandle::new(), GroupHandle::new());
    }
}
