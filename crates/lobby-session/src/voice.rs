/// Voice side-channel: talker registration, capture relay, playback
/// gating, mute lists and headset presence.
///
/// Voice frames never pass through the host; every machine broadcasts
/// its own captured audio and filters what it plays back. The relay is
/// pure in the same way the role engines are: it consumes document
/// state and endpoint callbacks and returns actions.
use std::collections::HashSet;

use tracing::{debug, trace};

use crate::action::SessionAction;
use crate::document::{SessionDocument, VoiceState};
use crate::event::SessionEvent;
use crate::types::{
    MachineId, PeerId, Xuid, HEADSET_CHECK_INTERVAL_MS, VOICE_CHUNK_BYTES,
};
use crate::wire::SessionMessage;

/// Platform voice hookup. The session core drives registration and
/// relaying; the endpoint owns the actual audio hardware and the
/// local player's mute preferences.
pub trait VoiceEndpoint {
    /// A remote player became audible; allocate playback resources.
    fn add_talker(&mut self, xuid: Xuid);
    /// A remote player left; release playback resources.
    fn remove_talker(&mut self, xuid: Xuid);
    /// Drain locally captured audio, if any.
    fn capture_local(&mut self) -> Option<Vec<u8>>;
    /// Feed received audio to the output for one talker.
    fn playback(&mut self, xuid: Xuid, bytes: &[u8]);
    /// Whether local policy (privileges, per-player mutes) allows
    /// hearing this talker.
    fn can_playback_talker(&self, xuid: Xuid) -> bool;
    /// Whether the local player has muted anyone on this machine.
    fn is_machine_muted(&self, machine: MachineId) -> bool;
    /// Whether voice hardware is currently attached.
    fn headset_present(&self) -> bool;
}

/// Endpoint for machines without voice hardware. Captures nothing,
/// plays nothing, mutes nobody.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullVoice;

impl VoiceEndpoint for NullVoice {
    fn add_talker(&mut self, _xuid: Xuid) {}
    fn remove_talker(&mut self, _xuid: Xuid) {}
    fn capture_local(&mut self) -> Option<Vec<u8>> {
        None
    }
    fn playback(&mut self, _xuid: Xuid, _bytes: &[u8]) {}
    fn can_playback_talker(&self, _xuid: Xuid) -> bool {
        true
    }
    fn is_machine_muted(&self, _machine: MachineId) -> bool {
        false
    }
    fn headset_present(&self) -> bool {
        false
    }
}

/// Per-session voice bookkeeping for the local machine.
pub struct VoiceRelay<V: VoiceEndpoint> {
    endpoint: V,
    local_machine: MachineId,
    registered: HashSet<Xuid>,
    last_mutelist: Vec<MachineId>,
    last_headset_check: u64,
    /// Capture keeps flowing during gameplay when set.
    pub relay_in_gameplay: bool,
}

impl<V: VoiceEndpoint> VoiceRelay<V> {
    pub fn new(endpoint: V, local_machine: MachineId) -> Self {
        Self {
            endpoint,
            local_machine,
            registered: HashSet::new(),
            last_mutelist: Vec::new(),
            last_headset_check: 0,
            relay_in_gameplay: false,
        }
    }

    pub fn endpoint(&self) -> &V {
        &self.endpoint
    }

    pub fn endpoint_mut(&mut self) -> &mut V {
        &mut self.endpoint
    }

    /// Reconcile registered talkers with the roster. Every remote
    /// player is a potential talker; players gone from the roster are
    /// released.
    pub fn sync_talkers(&mut self, doc: &SessionDocument) {
        let mut current: HashSet<Xuid> = HashSet::new();
        for machine in doc.members.machines() {
            if machine.id == self.local_machine {
                continue;
            }
            for player in &machine.players {
                current.insert(player.xuid);
            }
        }
        for xuid in current.difference(&self.registered) {
            trace!(%xuid, "registering remote talker");
            self.endpoint.add_talker(*xuid);
        }
        for xuid in self.registered.difference(&current) {
            trace!(%xuid, "releasing remote talker");
            self.endpoint.remove_talker(*xuid);
        }
        self.registered = current;
    }

    /// Drain local capture and chunk it into broadcastable frames.
    /// Suppressed during gameplay unless relaying is forced on, since
    /// in-game voice normally travels with game traffic instead.
    pub fn capture_and_relay(&mut self, local_xuid: Xuid, in_gameplay: bool) -> Vec<SessionAction> {
        if in_gameplay && !self.relay_in_gameplay {
            return Vec::new();
        }
        let Some(captured) = self.endpoint.capture_local() else {
            return Vec::new();
        };
        captured
            .chunks(VOICE_CHUNK_BYTES)
            .map(|chunk| SessionAction::Broadcast {
                message: SessionMessage::VoiceFrame {
                    xuid: local_xuid,
                    bytes: chunk.to_vec(),
                },
            })
            .collect()
    }

    /// Handle one received voice frame.
    ///
    /// The claimed talker must belong to the machine the frame actually
    /// arrived from; spoofed frames are dropped. Playback and the
    /// activity indicator are both gated on local mute policy.
    pub fn playback(
        &mut self,
        doc: &SessionDocument,
        xuid: Xuid,
        bytes: &[u8],
        sender: PeerId,
    ) -> Vec<SessionAction> {
        let Some((_, owner)) = doc.find_player(xuid) else {
            return Vec::new();
        };
        if owner.peer_id != sender {
            debug!(%xuid, %sender, "voice frame sender does not own claimed talker");
            return Vec::new();
        }
        if !self.endpoint.can_playback_talker(xuid) {
            return Vec::new();
        }
        self.endpoint.playback(xuid, bytes);
        vec![SessionAction::Event(SessionEvent::PlayerActivity { xuid })]
    }

    /// Recompute the local mute list against the roster and broadcast
    /// it when it changed since the last check.
    pub fn sync_mutelist(&mut self, doc: &SessionDocument) -> Option<SessionAction> {
        let muted: Vec<MachineId> = doc
            .members
            .machines()
            .iter()
            .filter(|m| m.id != self.local_machine && self.endpoint.is_machine_muted(m.id))
            .map(|m| m.id)
            .collect();
        if muted == self.last_mutelist {
            return None;
        }
        debug!(count = muted.len(), "mute list changed, broadcasting");
        self.last_mutelist = muted.clone();
        Some(SessionAction::Broadcast {
            message: SessionMessage::VoiceMutelist {
                machine: self.local_machine,
                muted,
            },
        })
    }

    /// Poll local headset presence, at most once per check interval,
    /// and broadcast a status change.
    pub fn update_headset_status(
        &mut self,
        doc: &SessionDocument,
        local_xuid: Xuid,
        now: u64,
    ) -> Option<SessionAction> {
        if now < self.last_headset_check + HEADSET_CHECK_INTERVAL_MS {
            return None;
        }
        self.last_headset_check = now;

        let current = if self.endpoint.headset_present() {
            VoiceState::Headset
        } else {
            VoiceState::None
        };
        let recorded = doc
            .find_player(local_xuid)
            .map(|(p, _)| p.voice)
            .unwrap_or_default();
        if current == recorded {
            return None;
        }
        Some(SessionAction::Broadcast {
            message: SessionMessage::VoiceStatus {
                xuid: local_xuid,
                voice: current,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Machine;

    #[derive(Default)]
    struct FakeEndpoint {
        talkers: HashSet<Xuid>,
        captured: Option<Vec<u8>>,
        played: Vec<(Xuid, usize)>,
        muted_machines: HashSet<MachineId>,
        blocked_talkers: HashSet<Xuid>,
        headset: bool,
    }

    impl VoiceEndpoint for FakeEndpoint {
        fn add_talker(&mut self, xuid: Xuid) {
            self.talkers.insert(xuid);
        }
        fn remove_talker(&mut self, xuid: Xuid) {
            self.talkers.remove(&xuid);
        }
        fn capture_local(&mut self) -> Option<Vec<u8>> {
            self.captured.take()
        }
        fn playback(&mut self, xuid: Xuid, bytes: &[u8]) {
            self.played.push((xuid, bytes.len()));
        }
        fn can_playback_talker(&self, xuid: Xuid) -> bool {
            !self.blocked_talkers.contains(&xuid)
        }
        fn is_machine_muted(&self, machine: MachineId) -> bool {
            self.muted_machines.contains(&machine)
        }
        fn headset_present(&self) -> bool {
            self.headset
        }
    }

    fn doc_with(seeds: &[u64]) -> SessionDocument {
        let mut doc = SessionDocument::new(8);
        for &seed in seeds {
            doc.members
                .append_machine(Machine::single(
                    MachineId(seed),
                    PeerId(seed + 100),
                    format!("p{seed}"),
                ))
                .unwrap();
        }
        doc
    }

    #[test]
    fn sync_registers_and_releases_remote_talkers() {
        let mut relay = VoiceRelay::new(FakeEndpoint::default(), MachineId(1));
        let mut doc = doc_with(&[1, 2, 3]);

        relay.sync_talkers(&doc);
        assert_eq!(relay.endpoint().talkers, HashSet::from([Xuid(2), Xuid(3)]));

        doc.members.remove_machine(MachineId(2));
        relay.sync_talkers(&doc);
        assert_eq!(relay.endpoint().talkers, HashSet::from([Xuid(3)]));
    }

    #[test]
    fn capture_chunks_frames() {
        let mut relay = VoiceRelay::new(FakeEndpoint::default(), MachineId(1));
        relay.endpoint_mut().captured = Some(vec![0u8; VOICE_CHUNK_BYTES + 200]);

        let actions = relay.capture_and_relay(Xuid(1), false);
        assert_eq!(actions.len(), 2);
        match &actions[1] {
            SessionAction::Broadcast {
                message: SessionMessage::VoiceFrame { xuid, bytes },
            } => {
                assert_eq!(*xuid, Xuid(1));
                assert_eq!(bytes.len(), 200);
            }
            other => panic!("unexpected action: {:?}", other),
        }
    }

    #[test]
    fn capture_suppressed_in_gameplay() {
        let mut relay = VoiceRelay::new(FakeEndpoint::default(), MachineId(1));
        relay.endpoint_mut().captured = Some(vec![0u8; 64]);
        assert!(relay.capture_and_relay(Xuid(1), true).is_empty());

        relay.relay_in_gameplay = true;
        relay.endpoint_mut().captured = Some(vec![0u8; 64]);
        assert_eq!(relay.capture_and_relay(Xuid(1), true).len(), 1);
    }

    #[test]
    fn playback_drops_spoofed_sender() {
        let mut relay = VoiceRelay::new(FakeEndpoint::default(), MachineId(1));
        let doc = doc_with(&[1, 2, 3]);

        // Machine 3 (peer 103) claims to be talker 2.
        assert!(relay.playback(&doc, Xuid(2), b"audio", PeerId(103)).is_empty());
        assert!(relay.endpoint().played.is_empty());

        // Legitimate frame plays and reports activity.
        let actions = relay.playback(&doc, Xuid(2), b"audio", PeerId(102));
        assert_eq!(
            actions,
            vec![SessionAction::Event(SessionEvent::PlayerActivity {
                xuid: Xuid(2)
            })]
        );
        assert_eq!(relay.endpoint().played, vec![(Xuid(2), 5)]);
    }

    #[test]
    fn playback_respects_local_mute() {
        let mut relay = VoiceRelay::new(FakeEndpoint::default(), MachineId(1));
        relay.endpoint_mut().blocked_talkers.insert(Xuid(2));
        let doc = doc_with(&[1, 2]);

        assert!(relay.playback(&doc, Xuid(2), b"audio", PeerId(102)).is_empty());
        assert!(relay.endpoint().played.is_empty());
    }

    #[test]
    fn mutelist_broadcasts_only_on_change() {
        let mut relay = VoiceRelay::new(FakeEndpoint::default(), MachineId(1));
        let doc = doc_with(&[1, 2, 3]);

        assert!(relay.sync_mutelist(&doc).is_none(), "empty list is the baseline");

        relay.endpoint_mut().muted_machines.insert(MachineId(2));
        match relay.sync_mutelist(&doc) {
            Some(SessionAction::Broadcast {
                message: SessionMessage::VoiceMutelist { machine, muted },
            }) => {
                assert_eq!(machine, MachineId(1));
                assert_eq!(muted, vec![MachineId(2)]);
            }
            other => panic!("unexpected action: {:?}", other),
        }
        // Unchanged list stays quiet.
        assert!(relay.sync_mutelist(&doc).is_none());
    }

    #[test]
    fn headset_check_is_rate_limited() {
        let mut relay = VoiceRelay::new(FakeEndpoint::default(), MachineId(1));
        let doc = doc_with(&[1]);

        relay.endpoint_mut().headset = true;
        let action = relay.update_headset_status(&doc, Xuid(1), 1_000);
        assert!(matches!(
            action,
            Some(SessionAction::Broadcast {
                message: SessionMessage::VoiceStatus {
                    voice: VoiceState::Headset,
                    ..
                }
            })
        ));

        // Within the interval nothing is checked, even if state changed.
        relay.endpoint_mut().headset = false;
        assert!(relay.update_headset_status(&doc, Xuid(1), 1_500).is_none());
        // After the interval the change is reported (doc still says None).
        relay.endpoint_mut().headset = true;
        assert!(relay.update_headset_status(&doc, Xuid(1), 2_100).is_some());
    }
}
