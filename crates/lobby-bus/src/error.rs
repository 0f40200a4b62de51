/// Transport-level errors for the lobby bus.
///
/// The bus never blocks and never surfaces receive errors directly —
/// a failed receive is a dropped receive. Send-side and group-level
/// failures are reported through this enum.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("unknown group: {handle}")]
    UnknownGroup { handle: String },

    #[error("group is gone")]
    GroupDestroyed,

    #[error("peer unreachable: {peer}")]
    PeerUnreachable { peer: String },

    #[error("local peer has left the group")]
    Departed,

    #[error("leadership handoff unavailable: {reason}")]
    HandoffUnavailable { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_unknown_group() {
        let err = BusError::UnknownGroup {
            handle: "net-123".into(),
        };
        assert_eq!(err.to_string(), "unknown group: net-123");
    }

    #[test]
    fn display_peer_unreachable() {
        let err = BusError::PeerUnreachable {
            peer: "peer-2a".into(),
        };
        assert_eq!(err.to_string(), "peer unreachable: peer-2a");
    }

    #[test]
    fn display_handoff_unavailable() {
        let err = BusError::HandoffUnavailable {
            reason: "no surviving peers".into(),
        };
        assert_eq!(
            err.to_string(),
            "leadership handoff unavailable: no surviving peers"
        );
    }
}
