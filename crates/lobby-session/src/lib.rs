//! Lobby session coordination layer.
//!
//! Implements host-authoritative membership, a replicated settings
//! document, join admission, host migration and the voice side-channel
//! on top of `lobby-bus` (group transport).
//!
//! Wire format: MessagePack (compact binary).

pub mod action;
pub mod document;
pub mod error;
pub mod event;
pub mod pending;
pub mod session;
pub mod types;
pub mod voice;
pub mod wire;

pub use action::SessionAction;
pub use document::{
    Machine, Members, Player, SessionDocument, SettingsValue, VoiceState, NETFLAG_NO_LEAVE,
    NETFLAG_TEAM_LOBBY,
};
pub use error::SessionError;
pub use event::{EventSink, SessionEvent, SessionFailure, VecSink};
pub use pending::{OpKind, OpOutcome, PendingOps};
pub use session::client::{ClientPhase, ClientSession, HostLossOutcome, PromotionState};
pub use session::host::{HostPhase, HostSession, ReservationTicket};
pub use session::manager::SessionManager;
pub use session::{Session, SessionRole, SessionState};
pub use types::{
    now_ms, MachineId, PeerId, SessionId, SessionIdentity, Xuid, DELETE_SENTINEL,
    HEADSET_CHECK_INTERVAL_MS, JOIN_RETRY_WINDOW_MS, KICK_BAN_DURATION_MS, MAX_SESSION_MACHINES,
    MIGRATION_WAIT_MS, TEAM_RES_TIMEOUT_MS, VOICE_CHUNK_BYTES,
};
pub use voice::{NullVoice, VoiceEndpoint, VoiceRelay};
pub use wire::{CheckExpect, CommandTarget, JoinCheck, JoinError, SessionMessage};
