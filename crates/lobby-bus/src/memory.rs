/// In-process group transport with deterministic leadership.
///
/// `MemoryNetwork` is a switchboard of groups; each `MemoryBus` is one
/// peer's endpoint into a group. Leadership is "first surviving peer in
/// insertion order", so every endpoint observes the same leader and a
/// simulated lobby resolves host selection deterministically.
///
/// Channel opens and leadership handoffs complete after a configurable
/// number of polls, which lets callers exercise their pending-operation
/// machinery across ticks.
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::bus::{BusEvent, GroupHandle, MessageBus, OpId, OpStatus, PeerId};
use crate::error::BusError;

/// Default number of polls before an async operation completes.
const DEFAULT_OP_LATENCY: u32 = 1;

enum QueueItem {
    Message { from: PeerId, bytes: Vec<u8> },
    PeerLost(PeerId),
}

enum OpKind {
    OpenChannel { owner: PeerId, to: PeerId },
    Handoff { owner: PeerId },
}

struct PendingOp {
    group: GroupHandle,
    kind: OpKind,
    remaining: u32,
    done: bool,
    failed: bool,
}

struct Group {
    /// Insertion order; the first entry is the leader.
    order: Vec<PeerId>,
    queues: HashMap<PeerId, VecDeque<QueueItem>>,
    /// owner → peers the owner holds a validated channel to.
    channels: HashMap<PeerId, HashSet<PeerId>>,
}

impl Group {
    fn new() -> Self {
        Self {
            order: Vec::new(),
            queues: HashMap::new(),
            channels: HashMap::new(),
        }
    }

    fn contains(&self, peer: PeerId) -> bool {
        self.order.contains(&peer)
    }

    fn push(&mut self, to: PeerId, item: QueueItem) {
        if let Some(queue) = self.queues.get_mut(&to) {
            queue.push_back(item);
        }
    }
}

struct Shared {
    groups: HashMap<GroupHandle, Group>,
    ops: HashMap<u64, PendingOp>,
    next_peer: u64,
    next_op: u64,
    op_latency: u32,
}

// ── MemoryNetwork ────────────────────────────────────────────────────

/// Switchboard owning all in-process groups.
#[derive(Clone)]
pub struct MemoryNetwork {
    shared: Arc<Mutex<Shared>>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::with_op_latency(DEFAULT_OP_LATENCY)
    }

    /// Network whose async operations take `op_latency` polls to finish.
    pub fn with_op_latency(op_latency: u32) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared {
                groups: HashMap::new(),
                ops: HashMap::new(),
                next_peer: 1,
                next_op: 1,
                op_latency,
            })),
        }
    }

    /// Create a new group; the returned endpoint is its first member
    /// and therefore its initial leader.
    pub fn create_group(&self) -> MemoryBus {
        let handle = GroupHandle::new();
        let mut shared = self.shared.lock().unwrap();
        shared.groups.insert(handle.clone(), Group::new());
        let peer = Self::join(&mut shared, &handle);
        MemoryBus {
            shared: Arc::clone(&self.shared),
            handle,
            peer,
            departed: false,
        }
    }

    /// Connect to an existing group.
    pub fn connect(&self, handle: &GroupHandle) -> Result<MemoryBus, BusError> {
        let mut shared = self.shared.lock().unwrap();
        if !shared.groups.contains_key(handle) {
            debug!(%handle, "connect refused, unknown group");
            return Err(BusError::UnknownGroup {
                handle: handle.to_string(),
            });
        }
        let peer = Self::join(&mut shared, handle);
        Ok(MemoryBus {
            shared: Arc::clone(&self.shared),
            handle: handle.clone(),
            peer,
            departed: false,
        })
    }

    fn join(shared: &mut Shared, handle: &GroupHandle) -> PeerId {
        let peer = PeerId(shared.next_peer);
        shared.next_peer += 1;
        let group = shared.groups.get_mut(handle).expect("group exists");
        group.order.push(peer);
        group.queues.insert(peer, VecDeque::new());
        group.channels.insert(peer, HashSet::new());
        peer
    }
}

impl Default for MemoryNetwork {
    fn default() -> Self {
        Self::new()
    }
}

// ── MemoryBus ────────────────────────────────────────────────────────

/// One peer's endpoint into a `MemoryNetwork` group.
pub struct MemoryBus {
    shared: Arc<Mutex<Shared>>,
    handle: GroupHandle,
    peer: PeerId,
    departed: bool,
}

impl std::fmt::Debug for MemoryBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBus")
            .field("handle", &self.handle)
            .field("peer", &self.peer)
            .field("departed", &self.departed)
            .finish_non_exhaustive()
    }
}

impl MemoryBus {
    /// The group this endpoint belongs to.
    pub fn handle(&self) -> &GroupHandle {
        &self.handle
    }

    /// Leave the group, notifying the survivors. Idempotent.
    pub fn disconnect(&mut self) {
        if self.departed {
            return;
        }
        self.departed = true;

        let mut shared = self.shared.lock().unwrap();
        let Some(group) = shared.groups.get_mut(&self.handle) else {
            return;
        };
        group.order.retain(|p| *p != self.peer);
        group.queues.remove(&self.peer);
        group.channels.remove(&self.peer);
        for set in group.channels.values_mut() {
            set.remove(&self.peer);
        }
        let survivors: Vec<PeerId> = group.order.clone();
        for peer in survivors {
            group.push(peer, QueueItem::PeerLost(self.peer));
        }
        if group.order.is_empty() {
            shared.groups.remove(&self.handle);
        }
    }

    fn issue_op(&self, shared: &mut Shared, kind: OpKind) -> OpId {
        let id = shared.next_op;
        shared.next_op += 1;
        let remaining = shared.op_latency;
        shared.ops.insert(
            id,
            PendingOp {
                group: self.handle.clone(),
                kind,
                remaining,
                done: false,
                failed: false,
            },
        );
        OpId(id)
    }
}

impl Drop for MemoryBus {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl MessageBus for MemoryBus {
    fn local_peer(&self) -> PeerId {
        self.peer
    }

    fn send(&mut self, peer: PeerId, bytes: &[u8]) -> Result<(), BusError> {
        if self.departed {
            return Err(BusError::Departed);
        }
        let mut shared = self.shared.lock().unwrap();
        let group = shared
            .groups
            .get_mut(&self.handle)
            .ok_or(BusError::GroupDestroyed)?;
        if !group.contains(peer) {
            debug!(%peer, "send refused, peer not in group");
            return Err(BusError::PeerUnreachable {
                peer: peer.to_string(),
            });
        }
        group.push(
            peer,
            QueueItem::Message {
                from: self.peer,
                bytes: bytes.to_vec(),
            },
        );
        Ok(())
    }

    fn broadcast(&mut self, bytes: &[u8]) -> Result<(), BusError> {
        if self.departed {
            return Err(BusError::Departed);
        }
        let mut shared = self.shared.lock().unwrap();
        let group = shared
            .groups
            .get_mut(&self.handle)
            .ok_or(BusError::GroupDestroyed)?;
        let others: Vec<PeerId> = group
            .order
            .iter()
            .copied()
            .filter(|p| *p != self.peer)
            .collect();
        for peer in others {
            group.push(
                peer,
                QueueItem::Message {
                    from: self.peer,
                    bytes: bytes.to_vec(),
                },
            );
        }
        Ok(())
    }

    fn try_recv(&mut self) -> Option<BusEvent> {
        if self.departed {
            return None;
        }
        let mut shared = self.shared.lock().unwrap();
        let group = shared.groups.get_mut(&self.handle)?;
        let item = group.queues.get_mut(&self.peer)?.pop_front()?;
        Some(match item {
            QueueItem::Message { from, bytes } => {
                let validated = group
                    .channels
                    .get(&self.peer)
                    .map(|set| set.contains(&from))
                    .unwrap_or(false);
                BusEvent::Message {
                    from,
                    bytes,
                    validated,
                }
            }
            QueueItem::PeerLost(peer) => BusEvent::PeerLost(peer),
        })
    }

    fn begin_open_channel(&mut self, peer: PeerId) -> Result<OpId, BusError> {
        if self.departed {
            return Err(BusError::Departed);
        }
        let mut shared = self.shared.lock().unwrap();
        if !shared.groups.contains_key(&self.handle) {
            return Err(BusError::GroupDestroyed);
        }
        Ok(self.issue_op(
            &mut shared,
            OpKind::OpenChannel {
                owner: self.peer,
                to: peer,
            },
        ))
    }

    fn close_channel(&mut self, peer: PeerId) {
        let mut shared = self.shared.lock().unwrap();
        if let Some(group) = shared.groups.get_mut(&self.handle) {
            if let Some(set) = group.channels.get_mut(&self.peer) {
                set.remove(&peer);
            }
        }
    }

    fn channel_open(&self, peer: PeerId) -> bool {
        let shared = self.shared.lock().unwrap();
        shared
            .groups
            .get(&self.handle)
            .and_then(|g| g.channels.get(&self.peer))
            .map(|set| set.contains(&peer))
            .unwrap_or(false)
    }

    fn leader(&self) -> Option<PeerId> {
        let shared = self.shared.lock().unwrap();
        shared
            .groups
            .get(&self.handle)
            .and_then(|g| g.order.first().copied())
    }

    fn begin_host_handoff(&mut self) -> Result<OpId, BusError> {
        if self.departed {
            return Err(BusError::Departed);
        }
        let mut shared = self.shared.lock().unwrap();
        let group = shared
            .groups
            .get(&self.handle)
            .ok_or(BusError::GroupDestroyed)?;
        if group.order.first() != Some(&self.peer) {
            debug!(peer = %self.peer, "handoff refused, local peer is not the leader");
            return Err(BusError::HandoffUnavailable {
                reason: "local peer is not the leader".into(),
            });
        }
        if group.order.len() < 2 {
            debug!(peer = %self.peer, "handoff refused, no surviving peers");
            return Err(BusError::HandoffUnavailable {
                reason: "no surviving peers".into(),
            });
        }
        Ok(self.issue_op(&mut shared, OpKind::Handoff { owner: self.peer }))
    }

    fn poll_operation(&mut self, op: OpId) -> OpStatus {
        let mut shared = self.shared.lock().unwrap();
        let Shared { groups, ops, .. } = &mut *shared;
        let Some(pending) = ops.get_mut(&op.0) else {
            return OpStatus::Failed;
        };
        if pending.failed {
            return OpStatus::Failed;
        }
        if pending.done {
            return OpStatus::Complete;
        }
        if pending.remaining > 0 {
            pending.remaining -= 1;
        }
        if pending.remaining > 0 {
            return OpStatus::Pending;
        }

        // Latency elapsed — apply the operation's effect.
        let outcome = match (groups.get_mut(&pending.group), &pending.kind) {
            (None, _) => OpStatus::Failed,
            (Some(group), &OpKind::OpenChannel { owner, to }) => {
                if group.contains(to) {
                    group.channels.entry(owner).or_default().insert(to);
                    OpStatus::Complete
                } else {
                    OpStatus::Failed
                }
            }
            (Some(group), &OpKind::Handoff { owner }) => {
                if group.order.first() == Some(&owner) && group.order.len() >= 2 {
                    group.order.retain(|p| *p != owner);
                    group.order.push(owner);
                    OpStatus::Complete
                } else {
                    OpStatus::Failed
                }
            }
        };
        match outcome {
            OpStatus::Complete => pending.done = true,
            _ => {
                debug!(op = op.0, "operation failed");
                pending.failed = true;
            }
        }
        outcome
    }

    fn peers(&self) -> Vec<PeerId> {
        let shared = self.shared.lock().unwrap();
        shared
            .groups
            .get(&self.handle)
            .map(|g| {
                g.order
                    .iter()
                    .copied()
                    .filter(|p| *p != self.peer)
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn poll_done(bus: &mut MemoryBus, op: OpId) -> OpStatus {
        for _ in 0..8 {
            match bus.poll_operation(op) {
                OpStatus::Pending => continue,
                status => return status,
            }
        }
        OpStatus::Pending
    }

    #[test]
    fn create_and_connect() {
        let net = MemoryNetwork::new();
        let host = net.create_group();
        let client = net.connect(host.handle()).unwrap();
        assert_ne!(host.local_peer(), client.local_peer());
        assert_eq!(host.leader(), Some(host.local_peer()));
        assert_eq!(client.leader(), Some(host.local_peer()));
    }

    #[test]
    fn connect_unknown_group_fails() {
        let net = MemoryNetwork::new();
        let err = net.connect(&GroupHandle::new()).unwrap_err();
        assert!(matches!(err, BusError::UnknownGroup { .. }));
    }

    #[test]
    fn send_and_receive() {
        let net = MemoryNetwork::new();
        let mut host = net.create_group();
        let mut client = net.connect(host.handle()).unwrap();

        client.send(host.local_peer(), b"hello").unwrap();
        match host.try_recv() {
            Some(BusEvent::Message {
                from,
                bytes,
                validated,
            }) => {
                assert_eq!(from, client.local_peer());
                assert_eq!(bytes, b"hello");
                assert!(!validated, "no channel open yet");
            }
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(host.try_recv().is_none());
    }

    #[test]
    fn validated_after_channel_open_completes() {
        let net = MemoryNetwork::new();
        let mut host = net.create_group();
        let mut client = net.connect(host.handle()).unwrap();

        let op = host.begin_open_channel(client.local_peer()).unwrap();
        assert!(!host.channel_open(client.local_peer()));
        assert_eq!(poll_done(&mut host, op), OpStatus::Complete);
        assert!(host.channel_open(client.local_peer()));

        client.send(host.local_peer(), b"hi").unwrap();
        match host.try_recv() {
            Some(BusEvent::Message { validated, .. }) => assert!(validated),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn open_channel_to_departed_peer_fails() {
        let net = MemoryNetwork::new();
        let mut host = net.create_group();
        let mut client = net.connect(host.handle()).unwrap();
        let peer = client.local_peer();
        client.disconnect();

        let op = host.begin_open_channel(peer).unwrap();
        assert_eq!(poll_done(&mut host, op), OpStatus::Failed);
    }

    #[test]
    fn broadcast_excludes_sender() {
        let net = MemoryNetwork::new();
        let mut host = net.create_group();
        let mut a = net.connect(host.handle()).unwrap();
        let mut b = net.connect(host.handle()).unwrap();

        host.broadcast(b"all").unwrap();
        assert!(matches!(a.try_recv(), Some(BusEvent::Message { .. })));
        assert!(matches!(b.try_recv(), Some(BusEvent::Message { .. })));
        assert!(host.try_recv().is_none());
    }

    #[test]
    fn send_to_unknown_peer_fails() {
        let net = MemoryNetwork::new();
        let mut host = net.create_group();
        let err = host.send(PeerId(999), b"x").unwrap_err();
        assert!(matches!(err, BusError::PeerUnreachable { .. }));
    }

    #[test]
    fn disconnect_notifies_survivors() {
        let net = MemoryNetwork::new();
        let mut host = net.create_group();
        let mut client = net.connect(host.handle()).unwrap();
        let lost = client.local_peer();
        client.disconnect();

        assert_eq!(host.try_recv(), Some(BusEvent::PeerLost(lost)));
        assert!(host.peers().is_empty());
    }

    #[test]
    fn leadership_follows_insertion_order() {
        let net = MemoryNetwork::new();
        let mut host = net.create_group();
        let a = net.connect(host.handle()).unwrap();
        let b = net.connect(host.handle()).unwrap();

        assert_eq!(a.leader(), Some(host.local_peer()));
        host.disconnect();
        // First surviving peer in insertion order takes over.
        assert_eq!(b.leader(), Some(a.local_peer()));
    }

    #[test]
    fn handoff_moves_leadership() {
        let net = MemoryNetwork::new();
        let mut host = net.create_group();
        let a = net.connect(host.handle()).unwrap();

        let op = host.begin_host_handoff().unwrap();
        assert_eq!(poll_done(&mut host, op), OpStatus::Complete);
        assert_eq!(host.leader(), Some(a.local_peer()));
        // Old leader is still a member until it disconnects.
        assert!(a.peers().contains(&host.local_peer()));
    }

    #[test]
    fn handoff_requires_leadership_and_survivors() {
        let net = MemoryNetwork::new();
        let mut solo = net.create_group();
        assert!(matches!(
            solo.begin_host_handoff(),
            Err(BusError::HandoffUnavailable { .. })
        ));

        let mut client = net.connect(solo.handle()).unwrap();
        assert!(matches!(
            client.begin_host_handoff(),
            Err(BusError::HandoffUnavailable { .. })
        ));
        assert!(solo.begin_host_handoff().is_ok());
    }

    #[test]
    fn operations_respect_latency() {
        let net = MemoryNetwork::with_op_latency(3);
        let mut host = net.create_group();
        let client = net.connect(host.handle()).unwrap();

        let op = host.begin_open_channel(client.local_peer()).unwrap();
        assert_eq!(host.poll_operation(op), OpStatus::Pending);
        assert_eq!(host.poll_operation(op), OpStatus::Pending);
        assert_eq!(host.poll_operation(op), OpStatus::Complete);
        assert_eq!(host.poll_operation(op), OpStatus::Complete);
    }

    #[test]
    fn departed_endpoint_cannot_send() {
        let net = MemoryNetwork::new();
        let mut host = net.create_group();
        let mut client = net.connect(host.handle()).unwrap();
        client.disconnect();
        assert!(matches!(
            client.send(host.local_peer(), b"x"),
            Err(BusError::Departed)
        ));
        assert!(matches!(client.broadcast(b"x"), Err(BusError::Departed)));
    }
}
