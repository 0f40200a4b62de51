use std::fmt;

use serde::{Deserialize, Serialize};

pub use lobby_bus::PeerId;

// ── Constants ────────────────────────────────────────────────────────

/// Most machines a session will admit.
pub const MAX_SESSION_MACHINES: usize = 32;

/// How long a kicked machine stays banned from re-joining (180 s).
pub const KICK_BAN_DURATION_MS: u64 = 180_000;

/// Team reservation tickets expire after this long (30 s).
pub const TEAM_RES_TIMEOUT_MS: u64 = 30_000;

/// How long a client waits for the host's join reply before failing.
pub const JOIN_RETRY_WINDOW_MS: u64 = 8_000;

/// Upper bound on a graceful host migration before it is declared failed.
pub const MIGRATION_WAIT_MS: u64 = 10_000;

/// Voice payloads are relayed in chunks of this many bytes.
pub const VOICE_CHUNK_BYTES: usize = 1024;

/// Minimum spacing between local headset status checks.
pub const HEADSET_CHECK_INTERVAL_MS: u64 = 1_000;

/// Reserved settings value that deletes a field on merge.
pub const DELETE_SENTINEL: &str = "#empty#";

// ── Identities ───────────────────────────────────────────────────────

/// Stable logical machine identity — survives host migration.
///
/// A machine id is the xuid of the machine's primary player; the join
/// admission pipeline enforces that equality.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct MachineId(pub u64);

impl fmt::Display for MachineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mach-{:x}", self.0)
    }
}

/// Player identity.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Xuid(pub u64);

impl fmt::Display for Xuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "xuid-{:x}", self.0)
    }
}

impl From<MachineId> for Xuid {
    fn from(id: MachineId) -> Self {
        Xuid(id.0)
    }
}

/// A machine's stable identity paired with its current routable address.
///
/// The peer id changes across reconnects; the machine id does not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionIdentity {
    pub machine_id: MachineId,
    pub peer_id: PeerId,
}

impl fmt::Display for SessionIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.machine_id, self.peer_id)
    }
}

// ── SessionId ────────────────────────────────────────────────────────

/// Unique session identifier (e.g., "ses-<uuid>").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    /// Create a new random session id.
    pub fn new() -> Self {
        Self(format!("ses-{}", uuid::Uuid::new_v4()))
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Time ─────────────────────────────────────────────────────────────

/// Milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system time before epoch")
        .as_millis() as u64
}
