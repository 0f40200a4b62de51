/// Tracking for asynchronous transport operations.
///
/// Channel opens and host handoffs complete over several update calls.
/// Each is tracked with a deadline; `poll` reports completions and
/// timeouts for the caller to act on. Operations moved to the
/// finalizing list are still polled so the transport can retire them,
/// but their outcomes are discarded.
use lobby_bus::{MessageBus, OpId, OpStatus};

use crate::types::PeerId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    ChannelOpen(PeerId),
    HostHandoff,
}

#[derive(Debug, Clone, Copy)]
pub struct PendingOperation {
    pub id: OpId,
    pub kind: OpKind,
    pub issued_at: u64,
    pub deadline: u64,
}

/// Outcome of one tracked operation, reported once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpOutcome {
    Complete(OpKind),
    Failed(OpKind),
    TimedOut(OpKind),
}

#[derive(Debug, Default)]
pub struct PendingOps {
    active: Vec<PendingOperation>,
    finalizing: Vec<PendingOperation>,
}

impl PendingOps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&mut self, id: OpId, kind: OpKind, now: u64, timeout_ms: u64) {
        self.active.push(PendingOperation {
            id,
            kind,
            issued_at: now,
            deadline: now + timeout_ms,
        });
    }

    /// Stop caring about outcomes. Used when the session is torn down:
    /// the transport still gets polled until each operation retires.
    pub fn cancel_all(&mut self) {
        self.finalizing.append(&mut self.active);
    }

    pub fn is_idle(&self) -> bool {
        self.active.is_empty() && self.finalizing.is_empty()
    }

    pub fn has_active(&self, kind: OpKind) -> bool {
        self.active.iter().any(|op| op.kind == kind)
    }

    /// Poll every tracked operation. Returns the outcomes of active
    /// operations that finished or timed out this call.
    pub fn poll(&mut self, bus: &mut impl MessageBus, now: u64) -> Vec<OpOutcome> {
        let mut outcomes = Vec::new();
        self.active.retain(|op| match bus.poll_operation(op.id) {
            OpStatus::Complete => {
                outcomes.push(OpOutcome::Complete(op.kind));
                false
            }
            OpStatus::Failed => {
                outcomes.push(OpOutcome::Failed(op.kind));
                false
            }
            OpStatus::Pending => {
                if now >= op.deadline {
                    outcomes.push(OpOutcome::TimedOut(op.kind));
                    false
                } else {
                    true
                }
            }
        });
        self.finalizing
            .retain(|op| bus.poll_operation(op.id) == OpStatus::Pending && now < op.deadline);
        outcomes
    }
}
