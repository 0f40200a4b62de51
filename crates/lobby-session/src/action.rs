/// Actions produced by the role state machines.
///
/// The host and client engines are pure: they consume messages and
/// clock ticks and return actions. The session driver executes them
/// against the transport and the event sink.
use crate::event::SessionEvent;
use crate::types::PeerId;
use crate::wire::SessionMessage;

#[derive(Debug, Clone, PartialEq)]
pub enum SessionAction {
    /// Unicast a message to one peer.
    Send { to: PeerId, message: SessionMessage },
    /// Send a message to every connected peer.
    Broadcast { message: SessionMessage },
    /// Start opening a direct channel to a peer.
    OpenChannel { peer: PeerId },
    /// Tear down the direct channel to a peer.
    CloseChannel { peer: PeerId },
    /// Surface an event to the application.
    Event(SessionEvent),
}
