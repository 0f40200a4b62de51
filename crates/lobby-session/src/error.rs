/// Session-level errors.
///
/// Wraps transport errors and adds protocol-specific variants. Join
/// admission failures are not errors — they are per-requester replies
/// carried in the wire protocol (`JoinError`).
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("transport error: {0}")]
    Bus(#[from] lobby_bus::BusError),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("deserialization error: {0}")]
    Deserialization(String),

    #[error("protocol violation: {reason}")]
    ProtocolViolation { reason: String },

    #[error("only the host may mutate session structure")]
    NotHost,

    #[error("session already destroyed")]
    Destroyed,

    #[error("host migration failed: {reason}")]
    MigrationFailed { reason: String },
}

impl From<rmp_serde::encode::Error> for SessionError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        SessionError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for SessionError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        SessionError::Deserialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_not_host() {
        assert_eq!(
            SessionError::NotHost.to_string(),
            "only the host may mutate session structure"
        );
    }

    #[test]
    fn display_protocol_violation() {
        let err = SessionError::ProtocolViolation {
            reason: "two machines in one join".into(),
        };
        assert_eq!(
            err.to_string(),
            "protocol violation: two machines in one join"
        );
    }

    #[test]
    fn bus_error_converts() {
        let err: SessionError = lobby_bus::BusError::GroupDestroyed.into();
        assert_eq!(err.to_string(), "transport error: group is gone");
    }
}
