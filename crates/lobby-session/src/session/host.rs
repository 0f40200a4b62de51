/// Host-side session engine.
///
/// The host owns the document: every structural change (admission,
/// kicks, departures, settings) happens here and is broadcast to the
/// clients. The engine is pure; the session driver executes the
/// returned actions against the transport.
use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::action::SessionAction;
use crate::document::{Machine, SessionDocument, SettingsValue, NETFLAG_NO_LEAVE};
use crate::error::SessionError;
use crate::event::SessionEvent;
use crate::types::{
    MachineId, PeerId, SessionIdentity, Xuid, DELETE_SENTINEL, KICK_BAN_DURATION_MS,
    TEAM_RES_TIMEOUT_MS,
};
use crate::wire::{CheckExpect, JoinCheck, JoinError, SessionMessage};

use super::client::PromotionState;

// ── HostPhase ────────────────────────────────────────────────────────

/// Coarse host lifecycle. Every phase except `Idle` locks the session
/// against new joins with a matching reason string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostPhase {
    Creating,
    Idle,
    Starting,
    Matching,
    Loading,
    Ending,
}

impl HostPhase {
    /// The lock reason this phase imposes, if any.
    pub fn lock_reason(self) -> Option<&'static str> {
        match self {
            HostPhase::Creating | HostPhase::Idle => None,
            HostPhase::Starting => Some("starting"),
            HostPhase::Matching => Some("matching"),
            HostPhase::Loading => Some("loading"),
            HostPhase::Ending => Some("endgame"),
        }
    }
}

// ── Team reservation ─────────────────────────────────────────────────

/// Slots held for a keyed group of joiners.
#[derive(Debug, Clone, Copy)]
pub struct ReservationTicket {
    pub key: u64,
    pub remaining: u32,
    pub deadline: u64,
}

// ── HostSession ──────────────────────────────────────────────────────

pub struct HostSession {
    identity: SessionIdentity,
    document: SessionDocument,
    phase: HostPhase,
    /// Banned players and when each ban lifts.
    kicked: HashMap<Xuid, u64>,
    reservation: Option<ReservationTicket>,
    /// Shared secret handed to admitted machines.
    crypt: u64,
    /// When set, joins must present this key.
    private_key: Option<String>,
}

impl HostSession {
    /// A fresh session with the local machine as its only member.
    pub fn new(
        identity: SessionIdentity,
        local: Machine,
        num_slots: u32,
        private_key: Option<String>,
    ) -> Result<Self, SessionError> {
        let mut document = SessionDocument::new(num_slots);
        document.members.append_machine(local)?;
        Ok(Self {
            identity,
            document,
            phase: HostPhase::Idle,
            kicked: HashMap::new(),
            reservation: None,
            crypt: uuid::Uuid::new_v4().as_u128() as u64,
            private_key,
        })
    }

    /// Take over a session after the previous host went away. Machines
    /// whose peers did not survive the migration are dropped, and the
    /// survivor list is announced so every client converges.
    pub fn from_migration(
        identity: SessionIdentity,
        promo: PromotionState,
        surviving_peers: &[PeerId],
    ) -> (Self, Vec<SessionAction>) {
        let mut host = Self {
            identity,
            document: promo.document,
            phase: promo.phase,
            kicked: promo.kicked,
            reservation: None,
            crypt: promo.crypt,
            private_key: promo.private_key,
        };
        host.document
            .members
            .rebind_peer(identity.machine_id, identity.peer_id);

        let dropped = host.document.members.retain_machines(|m| {
            m.id == identity.machine_id || surviving_peers.contains(&m.peer_id)
        });

        let survivors: Vec<MachineId> = host
            .document
            .members
            .machines()
            .iter()
            .map(|m| m.id)
            .collect();
        info!(
            host = %identity,
            survivors = survivors.len(),
            dropped = dropped.len(),
            "promoted to session host"
        );

        let mut actions = vec![SessionAction::Broadcast {
            message: SessionMessage::HostMigrated {
                new_host: identity,
                survivors,
            },
        }];
        for machine in host.document.members.machines() {
            if machine.id != identity.machine_id {
                actions.push(SessionAction::OpenChannel {
                    peer: machine.peer_id,
                });
            }
        }
        for machine in &dropped {
            for player in &machine.players {
                actions.push(SessionAction::Event(SessionEvent::PlayerRemoved {
                    xuid: player.xuid,
                    machine: machine.identity(),
                }));
            }
        }
        actions.push(SessionAction::Event(SessionEvent::MigrationFinished {
            new_host: identity,
        }));
        (host, actions)
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn identity(&self) -> SessionIdentity {
        self.identity
    }

    pub fn document(&self) -> &SessionDocument {
        &self.document
    }

    pub fn phase(&self) -> HostPhase {
        self.phase
    }

    pub fn crypt(&self) -> u64 {
        self.crypt
    }

    pub fn reservation(&self) -> Option<&ReservationTicket> {
        self.reservation.as_ref()
    }

    pub fn is_banned(&self, xuid: Xuid, now: u64) -> bool {
        self.kicked.get(&xuid).is_some_and(|&until| now < until)
    }

    // ── Join admission ───────────────────────────────────────────────

    /// Run a join request through the admission pipeline.
    pub fn process_join_request(
        &mut self,
        from: PeerId,
        machine: Machine,
        reservation_key: Option<u64>,
        join_checks: &[JoinCheck],
        lock_key: Option<&str>,
        now: u64,
    ) -> Vec<SessionAction> {
        // A re-sent request from a member is answered, not re-admitted.
        if self.document.find_machine(machine.id).is_some() {
            debug!(machine = %machine.id, "duplicate join request, re-sending accept");
            return vec![SessionAction::Send {
                to: from,
                message: SessionMessage::JoinAccepted {
                    joiner: machine.id,
                    document: self.document.clone(),
                    crypt: self.crypt,
                },
            }];
        }

        // Malformed shape is dropped without a reply.
        if machine.players.len() != 1 || Xuid::from(machine.id) != machine.players[0].xuid {
            warn!(machine = %machine.id, "dropping join request with invalid shape");
            return Vec::new();
        }
        let joiner = machine.id;
        let xuid = machine.players[0].xuid;

        // While a reservation is live every join must present its key;
        // a matching key consumes a held slot and bypasses no other
        // checks. A key presented with no open ticket is refused too.
        self.expire_reservation(now);
        if self.reservation.is_some() || reservation_key.is_some() {
            match reservation_key {
                Some(key) if self.consume_reservation(key, now) => {}
                _ => return self.reject(from, joiner, JoinError::TeamReservation),
            }
        }

        if let Some(expected) = &self.private_key {
            if lock_key != Some(expected.as_str()) {
                return self.reject(from, joiner, JoinError::Malformed);
            }
        }

        if let Some(reason) = self.document.lock() {
            let reason = reason.to_string();
            return self.reject(from, joiner, JoinError::Locked(reason));
        }

        if !self.soft_checks_pass(join_checks) {
            return self.reject(from, joiner, JoinError::SoftCheck);
        }

        if self.is_banned(xuid, now) {
            return self.reject(from, joiner, JoinError::Kicked);
        }

        if self.document.members.num_players() + 1 > self.document.members.num_slots() {
            return self.reject(from, joiner, JoinError::Full);
        }

        let required_tu = self
            .document
            .find_machine(self.identity.machine_id)
            .map(|m| m.tu_version.clone())
            .unwrap_or_default();
        if machine.tu_version != required_tu {
            return self.reject(from, joiner, JoinError::BuildMismatch { required: required_tu });
        }

        let required_dlc = self.document.dlc_required();
        if required_dlc & machine.dlc_mask != required_dlc {
            let missing = required_dlc & !machine.dlc_mask;
            return self.reject(from, joiner, JoinError::DlcMissing { missing });
        }

        // Admitted.
        let machine_identity = machine.identity();
        if let Err(err) = self.document.members.append_machine(machine) {
            warn!(%err, "admission failed at roster append");
            return self.reject(from, joiner, JoinError::Malformed);
        }
        info!(machine = %machine_identity, "machine admitted");
        vec![
            SessionAction::OpenChannel { peer: from },
            SessionAction::Broadcast {
                message: SessionMessage::JoinAccepted {
                    joiner,
                    document: self.document.clone(),
                    crypt: self.crypt,
                },
            },
            SessionAction::Event(SessionEvent::PlayerJoined {
                xuid,
                machine: machine_identity,
            }),
        ]
    }

    fn reject(&self, to: PeerId, joiner: MachineId, error: JoinError) -> Vec<SessionAction> {
        debug!(machine = %joiner, reason = error.reason(), "join refused");
        vec![SessionAction::Send {
            to,
            message: SessionMessage::JoinRejected { joiner, error },
        }]
    }

    /// Equality is case-insensitive, with the delete sentinel and
    /// missing fields both reading as empty. Membership matches list
    /// entries exactly.
    fn soft_checks_pass(&self, checks: &[JoinCheck]) -> bool {
        checks.iter().all(|check| {
            let actual = self.document.lookup_text(&check.key);
            match &check.expect {
                CheckExpect::Equals(expect) => {
                    let expect = if expect == DELETE_SENTINEL {
                        ""
                    } else {
                        expect.as_str()
                    };
                    actual.eq_ignore_ascii_case(expect)
                }
                CheckExpect::OneOf(values) => values.iter().any(|v| v.as_str() == actual),
            }
        })
    }

    // ── Team reservation ─────────────────────────────────────────────

    /// Hold slots for a keyed group. Refused when another reservation
    /// is still live or the slots do not exist.
    pub fn handle_team_reservation(
        &mut self,
        from: PeerId,
        key: u64,
        team_size: u32,
        now: u64,
    ) -> Vec<SessionAction> {
        self.expire_reservation(now);
        let free = self
            .document
            .members
            .num_slots()
            .saturating_sub(self.document.members.num_players());
        let accepted = self.reservation.is_none() && team_size > 0 && team_size <= free;
        if accepted {
            info!(key, team_size, "team reservation placed");
            self.reservation = Some(ReservationTicket {
                key,
                remaining: team_size,
                deadline: now + TEAM_RES_TIMEOUT_MS,
            });
        } else {
            debug!(key, team_size, "team reservation refused");
        }
        vec![
            SessionAction::Send {
                to: from,
                message: SessionMessage::TeamReservationResult { key, accepted },
            },
            SessionAction::Event(SessionEvent::TeamReservationResult { key, accepted }),
        ]
    }

    fn consume_reservation(&mut self, key: u64, now: u64) -> bool {
        self.expire_reservation(now);
        match &mut self.reservation {
            Some(ticket) if ticket.key == key && ticket.remaining > 0 => {
                ticket.remaining -= 1;
                if ticket.remaining == 0 {
                    self.reservation = None;
                }
                true
            }
            _ => false,
        }
    }

    fn expire_reservation(&mut self, now: u64) {
        if self
            .reservation
            .is_some_and(|ticket| now >= ticket.deadline)
        {
            debug!("team reservation expired");
            self.reservation = None;
        }
    }

    // ── Structural changes ───────────────────────────────────────────

    /// Remove a player's machine and ban the player from re-joining.
    pub fn kick_player(&mut self, xuid: Xuid, now: u64) -> Vec<SessionAction> {
        let Some((_, owner)) = self.document.find_player(xuid) else {
            return Vec::new();
        };
        if owner.id == self.identity.machine_id {
            warn!(%xuid, "host cannot kick itself");
            return Vec::new();
        }
        let owner_id = owner.id;
        let removed = match self.document.members.remove_machine(owner_id) {
            Some(machine) => machine,
            None => return Vec::new(),
        };
        self.kicked.insert(xuid, now + KICK_BAN_DURATION_MS);
        info!(%xuid, machine = %owner_id, "player kicked");

        let mut actions = vec![
            SessionAction::Broadcast {
                message: SessionMessage::PlayerKicked { xuid },
            },
            SessionAction::CloseChannel {
                peer: removed.peer_id,
            },
            SessionAction::Event(SessionEvent::PlayerKicked { xuid }),
        ];
        for player in &removed.players {
            actions.push(SessionAction::Event(SessionEvent::PlayerRemoved {
                xuid: player.xuid,
                machine: removed.identity(),
            }));
        }
        actions
    }

    /// Merge and broadcast a settings delta.
    pub fn update_settings(
        &mut self,
        update: Option<SettingsValue>,
        delete: Vec<String>,
    ) -> Vec<SessionAction> {
        if let Some(delta) = &update {
            self.document.merge_update(delta);
        }
        self.document.merge_delete(&delete);
        vec![
            SessionAction::Broadcast {
                message: SessionMessage::SettingsUpdate { update, delete },
            },
            SessionAction::Event(SessionEvent::SettingsChanged),
        ]
    }

    /// Move to a new phase, updating the session lock to match.
    pub fn set_phase(&mut self, phase: HostPhase) -> Vec<SessionAction> {
        if phase == self.phase {
            return Vec::new();
        }
        self.phase = phase;
        let mut delta = SettingsValue::map();
        match phase.lock_reason() {
            Some(reason) => delta.set("system/lock", reason.into()),
            None => delta.set("system/lock", DELETE_SENTINEL.into()),
        }
        self.update_settings(Some(delta), Vec::new())
    }

    /// A member announced its own departure.
    pub fn handle_quit(&mut self, machine_id: MachineId) -> Vec<SessionAction> {
        let Some(removed) = self.document.members.remove_machine(machine_id) else {
            return Vec::new();
        };
        info!(machine = %machine_id, "machine quit");
        let mut actions = vec![
            SessionAction::Broadcast {
                message: SessionMessage::Quit { machine: machine_id },
            },
            SessionAction::CloseChannel {
                peer: removed.peer_id,
            },
        ];
        for player in &removed.players {
            actions.push(SessionAction::Event(SessionEvent::PlayerRemoved {
                xuid: player.xuid,
                machine: removed.identity(),
            }));
        }
        actions
    }

    /// The transport lost a peer. Ignored while the session carries the
    /// no-leave flag, since bulk server transitions drop links that are
    /// about to be re-established.
    pub fn handle_peer_lost(&mut self, peer: PeerId) -> Vec<SessionAction> {
        if self.document.netflag() == NETFLAG_NO_LEAVE {
            debug!(%peer, "ignoring peer loss under noleave");
            return Vec::new();
        }
        let Some(machine) = self.document.find_by_peer(peer) else {
            return Vec::new();
        };
        self.handle_quit(machine.id)
    }

    /// A member's mute list changed. Broadcasts reach every member
    /// directly, so this only applies the new list.
    pub fn handle_mutelist(&mut self, machine_id: MachineId, muted: Vec<MachineId>) {
        if let Some(machine) = self.document.members.find_machine_mut(machine_id) {
            machine.mutelist = muted;
        }
    }

    /// A player's headset presence changed.
    pub fn handle_voice_status(&mut self, xuid: Xuid, voice: crate::document::VoiceState) {
        let Some(owner_id) = self.document.find_player(xuid).map(|(_, m)| m.id) else {
            return;
        };
        if let Some(machine) = self.document.members.find_machine_mut(owner_id) {
            for player in &mut machine.players {
                if player.xuid == xuid {
                    player.voice = voice;
                }
            }
        }
    }

    /// Periodic housekeeping: lift expired bans and reservations.
    pub fn tick(&mut self, now: u64) {
        self.expire_reservation(now);
        self.kicked.retain(|_, &mut until| now < until);
    }

    /// State carried into a graceful handoff to a new host.
    pub fn promotion_state(&self) -> PromotionState {
        PromotionState {
            document: self.document.clone(),
            phase: self.phase,
            kicked: self.kicked.clone(),
            crypt: self.crypt,
            private_key: self.private_key.clone(),
        }
    }
}
