/// Client-side session engine.
///
/// A client holds a replica of the host's document. Structural
/// messages are applied in receive order; the joiner's own accept
/// replaces the replica wholesale. When the host disappears the client
/// either promotes itself (it is the transport's next leader) or waits
/// for the survivor that does.
use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::action::SessionAction;
use crate::document::{Machine, SessionDocument, SettingsValue, NETFLAG_NO_LEAVE};
use crate::error::SessionError;
use crate::event::{SessionEvent, SessionFailure};
use crate::types::{
    MachineId, PeerId, SessionIdentity, Xuid, JOIN_RETRY_WINDOW_MS, KICK_BAN_DURATION_MS,
    MIGRATION_WAIT_MS,
};
use crate::wire::{JoinCheck, JoinError, SessionMessage};

use super::host::HostPhase;

// ── Promotion ────────────────────────────────────────────────────────

/// Everything a promoted client seeds its host engine with.
///
/// Built from local knowledge only; the old host is gone and transfers
/// nothing. Kick bans observed by this client survive the migration.
#[derive(Debug, Clone)]
pub struct PromotionState {
    pub document: SessionDocument,
    pub phase: HostPhase,
    pub kicked: HashMap<Xuid, u64>,
    pub crypt: u64,
    pub private_key: Option<String>,
}

/// What the session driver should do about a lost peer.
#[derive(Debug)]
pub enum HostLossOutcome {
    /// Not the host; structural fallout arrives from the host.
    NotHost,
    /// The host is gone and another survivor will take over.
    Waiting,
    /// The host is gone and this machine is next in line.
    Promote(Box<PromotionState>),
}

// ── ClientPhase ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientPhase {
    Creating,
    /// Join request sent, waiting for the host's reply.
    RequestingJoinData,
    Idle,
    /// Host lost, waiting for a survivor to announce itself.
    Migrating,
    Failed,
}

// ── ClientSession ────────────────────────────────────────────────────

pub struct ClientSession {
    identity: SessionIdentity,
    local_machine: Machine,
    document: SessionDocument,
    phase: ClientPhase,
    believed_host: PeerId,
    join_sent_at: u64,
    migration_started_at: Option<u64>,
    reservation_key: Option<u64>,
    join_checks: Vec<JoinCheck>,
    lock_key: Option<String>,
    /// Kicks observed locally, kept so bans survive a promotion.
    kicked_seen: HashMap<Xuid, u64>,
    crypt: u64,
}

impl ClientSession {
    pub fn new(
        identity: SessionIdentity,
        local_machine: Machine,
        believed_host: PeerId,
        reservation_key: Option<u64>,
        join_checks: Vec<JoinCheck>,
        lock_key: Option<String>,
    ) -> Self {
        Self {
            identity,
            local_machine,
            document: SessionDocument::new(0),
            phase: ClientPhase::Creating,
            believed_host,
            join_sent_at: 0,
            migration_started_at: None,
            reservation_key,
            join_checks,
            lock_key,
            kicked_seen: HashMap::new(),
            crypt: 0,
        }
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn identity(&self) -> SessionIdentity {
        self.identity
    }

    pub fn document(&self) -> &SessionDocument {
        &self.document
    }

    pub fn phase(&self) -> ClientPhase {
        self.phase
    }

    pub fn believed_host(&self) -> PeerId {
        self.believed_host
    }

    pub fn crypt(&self) -> u64 {
        self.crypt
    }

    /// Clients never mutate session structure.
    pub fn update_settings(&self) -> Result<(), SessionError> {
        Err(SessionError::NotHost)
    }

    // ── Join handshake ───────────────────────────────────────────────

    pub fn send_join_request(&mut self, now: u64) -> Vec<SessionAction> {
        self.phase = ClientPhase::RequestingJoinData;
        self.join_sent_at = now;
        debug!(host = %self.believed_host, "requesting join");
        vec![SessionAction::Send {
            to: self.believed_host,
            message: SessionMessage::JoinRequest {
                machine: self.local_machine.clone(),
                reservation_key: self.reservation_key,
                join_checks: self.join_checks.clone(),
                lock_key: self.lock_key.clone(),
            },
        }]
    }

    pub fn handle_join_accepted(
        &mut self,
        joiner: MachineId,
        document: SessionDocument,
        crypt: u64,
    ) -> Vec<SessionAction> {
        if joiner == self.identity.machine_id {
            // Our admission: the host's document becomes ours wholesale.
            self.document = document;
            self.crypt = crypt;
            if self.phase == ClientPhase::RequestingJoinData {
                self.phase = ClientPhase::Idle;
                info!(session = %self.identity, "join accepted");
                let mut actions = vec![
                    SessionAction::OpenChannel {
                        peer: self.believed_host,
                    },
                    SessionAction::Event(SessionEvent::Ready),
                ];
                if let Some(host) = self.document.find_by_peer(self.believed_host) {
                    actions.push(SessionAction::Event(SessionEvent::HostChanged {
                        identity: host.identity(),
                    }));
                }
                return actions;
            }
            return Vec::new();
        }

        // Someone else joined. Nothing to do before our own admission;
        // the accept we are waiting for carries the full roster.
        if self.phase != ClientPhase::Idle {
            return Vec::new();
        }
        // Full sync, surfacing the new players.
        let mut actions = Vec::new();
        for machine in document.members.machines() {
            if self.document.find_machine(machine.id).is_none() {
                for player in &machine.players {
                    actions.push(SessionAction::Event(SessionEvent::PlayerJoined {
                        xuid: player.xuid,
                        machine: machine.identity(),
                    }));
                }
            }
        }
        self.document = document;
        self.crypt = crypt;
        actions
    }

    pub fn handle_join_rejected(
        &mut self,
        joiner: MachineId,
        error: JoinError,
    ) -> Vec<SessionAction> {
        if joiner != self.identity.machine_id {
            return Vec::new();
        }
        warn!(reason = error.reason(), "join rejected");
        self.phase = ClientPhase::Failed;
        vec![SessionAction::Event(SessionEvent::Error {
            failure: SessionFailure::JoinDenied(error),
        })]
    }

    // ── Replication ──────────────────────────────────────────────────

    pub fn handle_settings_update(
        &mut self,
        update: Option<&SettingsValue>,
        delete: &[String],
    ) -> Vec<SessionAction> {
        if let Some(delta) = update {
            self.document.merge_update(delta);
        }
        self.document.merge_delete(delete);
        vec![SessionAction::Event(SessionEvent::SettingsChanged)]
    }

    pub fn handle_player_kicked(&mut self, xuid: Xuid, now: u64) -> Vec<SessionAction> {
        self.kicked_seen.insert(xuid, now + KICK_BAN_DURATION_MS);

        let mut actions = vec![SessionAction::Event(SessionEvent::PlayerKicked { xuid })];
        let owner_id = self.document.find_player(xuid).map(|(_, m)| m.id);
        if let Some(owner_id) = owner_id {
            if let Some(removed) = self.document.members.remove_machine(owner_id) {
                for player in &removed.players {
                    actions.push(SessionAction::Event(SessionEvent::PlayerRemoved {
                        xuid: player.xuid,
                        machine: removed.identity(),
                    }));
                }
            }
        }
        if self.local_machine.has_player(xuid) {
            warn!(%xuid, "kicked from session");
            self.phase = ClientPhase::Failed;
            actions.push(SessionAction::Event(SessionEvent::Error {
                failure: SessionFailure::Kicked,
            }));
        }
        actions
    }

    pub fn handle_quit(&mut self, machine_id: MachineId) -> Vec<SessionAction> {
        let Some(removed) = self.document.members.remove_machine(machine_id) else {
            return Vec::new();
        };
        removed
            .players
            .iter()
            .map(|player| {
                SessionAction::Event(SessionEvent::PlayerRemoved {
                    xuid: player.xuid,
                    machine: removed.identity(),
                })
            })
            .collect()
    }

    pub fn handle_mutelist(&mut self, machine_id: MachineId, muted: Vec<MachineId>) {
        if let Some(machine) = self.document.members.find_machine_mut(machine_id) {
            machine.mutelist = muted;
        }
    }

    pub fn handle_voice_status(&mut self, xuid: Xuid, voice: crate::document::VoiceState) {
        let owner_id = self.document.find_player(xuid).map(|(_, m)| m.id);
        if let Some(owner_id) = owner_id {
            if let Some(machine) = self.document.members.find_machine_mut(owner_id) {
                for player in &mut machine.players {
                    if player.xuid == xuid {
                        player.voice = voice;
                    }
                }
            }
        }
    }

    // ── Migration ────────────────────────────────────────────────────

    /// A survivor announced itself as the new host.
    pub fn handle_host_migrated(
        &mut self,
        new_host: SessionIdentity,
        survivors: &[MachineId],
        now: u64,
    ) -> Vec<SessionAction> {
        self.believed_host = new_host.peer_id;
        self.migration_started_at = None;
        self.document
            .members
            .rebind_peer(new_host.machine_id, new_host.peer_id);

        let mut actions = Vec::new();
        let dropped = self
            .document
            .members
            .retain_machines(|m| survivors.contains(&m.id));
        for machine in &dropped {
            for player in &machine.players {
                actions.push(SessionAction::Event(SessionEvent::PlayerRemoved {
                    xuid: player.xuid,
                    machine: machine.identity(),
                }));
            }
        }

        if self.phase == ClientPhase::RequestingJoinData {
            // Mid-join when the old host died: start over with the new one.
            actions.extend(self.send_join_request(now));
            return actions;
        }

        if !survivors.contains(&self.identity.machine_id) {
            warn!("not listed as a migration survivor");
            self.phase = ClientPhase::Failed;
            actions.push(SessionAction::Event(SessionEvent::Error {
                failure: SessionFailure::Migrate,
            }));
            return actions;
        }

        info!(host = %new_host, "host migration observed");
        self.phase = ClientPhase::Idle;
        actions.push(SessionAction::OpenChannel {
            peer: new_host.peer_id,
        });
        actions.push(SessionAction::Event(SessionEvent::MigrationFinished {
            new_host,
        }));
        actions
    }

    /// The departing host appointed this machine. Trim the roster to
    /// the survivors and hand back the seed for the host engine.
    pub fn prepare_promotion(
        &mut self,
        survivors: &[MachineId],
    ) -> (Vec<SessionAction>, PromotionState) {
        let mut document = self.document.clone();
        let dropped = document
            .members
            .retain_machines(|m| m.id == self.identity.machine_id || survivors.contains(&m.id));
        let actions = dropped
            .iter()
            .flat_map(|machine| {
                machine.players.iter().map(move |player| {
                    SessionAction::Event(SessionEvent::PlayerRemoved {
                        xuid: player.xuid,
                        machine: machine.identity(),
                    })
                })
            })
            .collect();
        let promo = PromotionState {
            phase: phase_from_lock(document.lock()),
            document,
            kicked: self.kicked_seen.clone(),
            crypt: self.crypt,
            private_key: self.lock_key.clone(),
        };
        (actions, promo)
    }

    /// The transport lost a peer. Only the believed host matters here;
    /// other departures are announced by the host.
    pub fn handle_peer_lost(
        &mut self,
        peer: PeerId,
        leader: Option<PeerId>,
        now: u64,
    ) -> (Vec<SessionAction>, HostLossOutcome) {
        if peer != self.believed_host {
            return (Vec::new(), HostLossOutcome::NotHost);
        }
        if self.document.netflag() == NETFLAG_NO_LEAVE {
            debug!(%peer, "ignoring host loss under noleave");
            return (Vec::new(), HostLossOutcome::NotHost);
        }

        let actions = vec![SessionAction::Event(SessionEvent::MigrationStarted)];
        if self.phase != ClientPhase::Idle {
            // Not a full member yet; the join retry window decides the
            // outcome if no new host appears.
            self.migration_started_at = Some(now);
            return (actions, HostLossOutcome::Waiting);
        }
        if leader == Some(self.identity.peer_id) {
            let mut document = self.document.clone();
            if let Some(old_host) = document.find_by_peer(peer).map(|m| m.id) {
                document.members.remove_machine(old_host);
            }
            let promo = PromotionState {
                phase: phase_from_lock(document.lock()),
                document,
                kicked: self.kicked_seen.clone(),
                crypt: self.crypt,
                private_key: self.lock_key.clone(),
            };
            (actions, HostLossOutcome::Promote(Box::new(promo)))
        } else {
            self.phase = ClientPhase::Migrating;
            self.migration_started_at = Some(now);
            (actions, HostLossOutcome::Waiting)
        }
    }

    // ── Housekeeping ─────────────────────────────────────────────────

    pub fn tick(&mut self, now: u64) -> Vec<SessionAction> {
        match self.phase {
            ClientPhase::RequestingJoinData
                if now >= self.join_sent_at + JOIN_RETRY_WINDOW_MS =>
            {
                warn!("no join reply within the retry window");
                self.phase = ClientPhase::Failed;
                vec![SessionAction::Event(SessionEvent::Error {
                    failure: SessionFailure::JoinTimeout,
                })]
            }
            ClientPhase::Migrating
                if self
                    .migration_started_at
                    .is_some_and(|t| now >= t + MIGRATION_WAIT_MS) =>
            {
                warn!("no survivor claimed the session in time");
                self.phase = ClientPhase::Failed;
                vec![SessionAction::Event(SessionEvent::Error {
                    failure: SessionFailure::Migrate,
                })]
            }
            _ => Vec::new(),
        }
    }
}

/// Recover the host phase a promoted client should resume in.
fn phase_from_lock(lock: Option<&str>) -> HostPhase {
    match lock {
        Some("starting") => HostPhase::Starting,
        Some("matching") => HostPhase::Matching,
        Some("loading") => HostPhase::Loading,
        Some("endgame") => HostPhase::Ending,
        _ => HostPhase::Idle,
    }
}
