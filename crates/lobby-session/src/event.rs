/// Events surfaced to the embedding application.
///
/// The session core never calls back into the application directly; it
/// pushes events into an `EventSink` during `update` and the caller
/// drains them afterwards.
use crate::types::{SessionId, SessionIdentity, Xuid};
use crate::wire::JoinError;

/// Why a session attempt or a live session failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionFailure {
    /// The session could not be created on the network.
    Create,
    /// Host migration did not complete.
    Migrate,
    /// The host refused our join.
    JoinDenied(JoinError),
    /// No join reply arrived within the retry window.
    JoinTimeout,
    /// We were kicked from the session.
    Kicked,
}

impl SessionFailure {
    /// Short reason string for the UI layer.
    pub fn reason(&self) -> &str {
        match self {
            SessionFailure::Create => "create",
            SessionFailure::Migrate => "migrate",
            SessionFailure::JoinDenied(error) => error.reason(),
            SessionFailure::JoinTimeout => "n/a",
            SessionFailure::Kicked => "kicked",
        }
    }
}

/// Notifications emitted by the session core.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The session exists on the network and can accept traffic.
    Created { id: SessionId },
    /// Local membership is established; the document is authoritative.
    Ready,
    PlayerJoined { xuid: Xuid, machine: SessionIdentity },
    PlayerRemoved { xuid: Xuid, machine: SessionIdentity },
    PlayerKicked { xuid: Xuid },
    /// The session host changed without a migration (initial sync).
    HostChanged { identity: SessionIdentity },
    MigrationStarted,
    MigrationFinished { new_host: SessionIdentity },
    /// Voice activity from a remote player reached the local machine.
    PlayerActivity { xuid: Xuid },
    /// The replicated settings document changed.
    SettingsChanged,
    TeamReservationResult { key: u64, accepted: bool },
    /// An application command addressed to this machine.
    Command { payload: Vec<u8> },
    Error { failure: SessionFailure },
}

/// Receives events during a session update.
pub trait EventSink {
    fn emit(&mut self, event: SessionEvent);
}

/// Collects events into a vector. The standard sink for tests and for
/// callers that drain events after each update.
#[derive(Debug, Default)]
pub struct VecSink {
    events: Vec<SessionEvent>,
}

impl VecSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn events(&self) -> &[SessionEvent] {
        &self.events
    }
}

impl EventSink for VecSink {
    fn emit(&mut self, event: SessionEvent) {
        self.events.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_reasons() {
        assert_eq!(SessionFailure::Create.reason(), "create");
        assert_eq!(SessionFailure::Migrate.reason(), "migrate");
        assert_eq!(SessionFailure::JoinTimeout.reason(), "n/a");
        assert_eq!(SessionFailure::Kicked.reason(), "kicked");
        assert_eq!(
            SessionFailure::JoinDenied(JoinError::Full).reason(),
            "full"
        );
    }

    #[test]
    fn vec_sink_drains() {
        let mut sink = VecSink::new();
        sink.emit(SessionEvent::SettingsChanged);
        assert_eq!(sink.events().len(), 1);
        assert_eq!(sink.drain(), vec![SessionEvent::SettingsChanged]);
        assert!(sink.events().is_empty());
    }
}
