/// Wire protocol for session coordination.
///
/// Every frame on the group channel is one `SessionMessage`, encoded
/// with MessagePack. Structural messages (joins, kicks, migration) are
/// only honored when they arrive from the believed host over an open
/// channel; side-channel traffic (voice, mutelists, commands) flows
/// peer to peer.
use serde::{Deserialize, Serialize};

use crate::document::{Machine, SessionDocument, SettingsValue, VoiceState};
use crate::error::SessionError;
use crate::types::{MachineId, SessionIdentity, Xuid};

// ── Join admission ───────────────────────────────────────────────────

/// Why the host refused a join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinError {
    /// No free slot.
    Full,
    /// The session carries a non-empty lock; the lock reason is echoed.
    Locked(String),
    /// The requester is serving a kick ban.
    Kicked,
    /// A reservation ticket is live and the request did not present
    /// its key, or a key was presented with no open ticket.
    TeamReservation,
    /// A requested settings predicate did not hold.
    SoftCheck,
    /// Title-update version differs from the host's.
    BuildMismatch { required: String },
    /// The session requires DLC the requester does not have.
    DlcMissing { missing: u64 },
    /// The request could not be honored as presented (bad shape,
    /// missing private key, timeout on the requester's side).
    Malformed,
}

impl JoinError {
    /// Short reason string surfaced to the UI layer.
    pub fn reason(&self) -> &str {
        match self {
            JoinError::Full => "full",
            JoinError::Locked(reason) => reason,
            JoinError::Kicked => "kicked",
            JoinError::TeamReservation => "TeamResFail",
            JoinError::SoftCheck => "lock",
            JoinError::BuildMismatch { .. } => "turequired",
            JoinError::DlcMissing { .. } => "dlcrequired",
            JoinError::Malformed => "n/a",
        }
    }
}

/// The predicate a joiner insists must hold on the host's document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckExpect {
    /// Case-insensitive equality; `"#empty#"` and a missing field both
    /// read as the empty string.
    Equals(String),
    /// The field's value must appear in the list, matched exactly.
    OneOf(Vec<String>),
}

/// A settings predicate a joiner insists on, checked against the
/// host's document before admission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinCheck {
    /// Full settings path, e.g. `"game/mode"`.
    pub key: String,
    pub expect: CheckExpect,
}

// ── Commands ─────────────────────────────────────────────────────────

/// Routing scope for an application command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandTarget {
    All,
    Host,
    Clients,
    Machine(MachineId),
}

// ── SessionMessage ───────────────────────────────────────────────────

/// Everything that crosses the wire between session members.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SessionMessage {
    /// Client to host: request admission. Carries the requester's full
    /// machine record plus admission credentials.
    JoinRequest {
        machine: Machine,
        reservation_key: Option<u64>,
        join_checks: Vec<JoinCheck>,
        lock_key: Option<String>,
    },
    /// Host broadcast: a machine was admitted. The joiner replaces its
    /// document wholesale; everyone else diffs for new players.
    JoinAccepted {
        joiner: MachineId,
        document: SessionDocument,
        crypt: u64,
    },
    /// Host to requester: admission refused.
    JoinRejected { joiner: MachineId, error: JoinError },
    /// Host broadcast: settings delta. Applied in receive order.
    SettingsUpdate {
        update: Option<SettingsValue>,
        delete: Vec<String>,
    },
    /// A machine announces its own departure.
    Quit { machine: MachineId },
    /// Host broadcast: a player was kicked and its machine removed.
    PlayerKicked { xuid: Xuid },
    /// Broadcast by the new host once promotion completes, and by a
    /// gracefully departing host after ownership handoff. Machines not
    /// listed as survivors are dropped from every roster.
    HostMigrated {
        new_host: SessionIdentity,
        survivors: Vec<MachineId>,
    },
    /// Opaque application payload, delivered per the routing scope.
    Command {
        target: CommandTarget,
        payload: Vec<u8>,
    },
    /// One chunk of captured voice from a talker.
    VoiceFrame { xuid: Xuid, bytes: Vec<u8> },
    /// A player's voice hardware presence changed.
    VoiceStatus { xuid: Xuid, voice: VoiceState },
    /// A machine's full mute list, broadcast whenever it changes.
    VoiceMutelist {
        machine: MachineId,
        muted: Vec<MachineId>,
    },
    /// Client to host: hold slots for a keyed group of joiners.
    TeamReservation { key: u64, team_size: u32 },
    /// Host to requester: reservation outcome.
    TeamReservationResult { key: u64, accepted: bool },
}

impl SessionMessage {
    pub fn encode(&self) -> Result<Vec<u8>, SessionError> {
        Ok(rmp_serde::to_vec(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, SessionError> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}
