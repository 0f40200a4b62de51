/// The session driver: owns a transport endpoint, a role engine and
/// the voice relay, and turns role actions into transport calls.
///
/// `update` is the single pump. The embedding application calls it
/// every frame with the current time and an event sink; everything the
/// session wants the application to know arrives through the sink.
pub mod client;
pub mod host;
pub mod manager;

use lobby_bus::{BusEvent, MessageBus};
use tracing::{debug, info, warn};

use crate::action::SessionAction;
use crate::document::{Machine, SessionDocument};
use crate::error::SessionError;
use crate::event::{EventSink, SessionEvent, SessionFailure};
use crate::pending::{OpKind, OpOutcome, PendingOps};
use crate::types::{
    MachineId, PeerId, SessionId, SessionIdentity, Xuid, JOIN_RETRY_WINDOW_MS,
    MIGRATION_WAIT_MS,
};
use crate::voice::{VoiceEndpoint, VoiceRelay};
use crate::wire::{CommandTarget, JoinCheck, SessionMessage};

use client::{ClientPhase, ClientSession, HostLossOutcome, PromotionState};
use host::{HostPhase, HostSession};

// ── State ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Active,
    /// The host went away; membership is unsettled.
    Migrating,
    /// A graceful teardown is handing the session off.
    Closing,
    Failed,
    Destroyed,
}

/// Which side of the protocol this machine currently runs.
pub enum SessionRole {
    Host(HostSession),
    Client(ClientSession),
}

impl SessionRole {
    pub fn document(&self) -> &SessionDocument {
        match self {
            SessionRole::Host(h) => h.document(),
            SessionRole::Client(c) => c.document(),
        }
    }

    pub fn identity(&self) -> SessionIdentity {
        match self {
            SessionRole::Host(h) => h.identity(),
            SessionRole::Client(c) => c.identity(),
        }
    }

    pub fn is_host(&self) -> bool {
        matches!(self, SessionRole::Host(_))
    }
}

// ── Session ──────────────────────────────────────────────────────────

pub struct Session<B: MessageBus, V: VoiceEndpoint> {
    id: SessionId,
    bus: B,
    role: SessionRole,
    state: SessionState,
    voice: VoiceRelay<V>,
    pending: PendingOps,
    /// Role swap staged by a host loss, applied at the top of the next
    /// update so the current update finishes under one role.
    pending_promotion: Option<Box<PromotionState>>,
    in_gameplay: bool,
}

impl<B: MessageBus, V: VoiceEndpoint> Session<B, V> {
    /// Create a session with the local machine as host.
    pub fn new_host(
        bus: B,
        local: Machine,
        num_slots: u32,
        private_key: Option<String>,
        endpoint: V,
        sink: &mut dyn EventSink,
    ) -> Result<Self, SessionError> {
        let identity = SessionIdentity {
            machine_id: local.id,
            peer_id: bus.local_peer(),
        };
        let local_machine_id = local.id;
        let mut local = local;
        local.peer_id = identity.peer_id;
        let host = HostSession::new(identity, local, num_slots, private_key)?;

        let id = SessionId::new();
        info!(session = %id, host = %identity, "session created");
        sink.emit(SessionEvent::Created { id: id.clone() });
        sink.emit(SessionEvent::Ready);
        Ok(Self {
            id,
            bus,
            role: SessionRole::Host(host),
            state: SessionState::Active,
            voice: VoiceRelay::new(endpoint, local_machine_id),
            pending: PendingOps::new(),
            pending_promotion: None,
            in_gameplay: false,
        })
    }

    /// Join an existing session through a connected endpoint.
    pub fn new_client(
        bus: B,
        local: Machine,
        reservation_key: Option<u64>,
        join_checks: Vec<JoinCheck>,
        lock_key: Option<String>,
        endpoint: V,
        now: u64,
        sink: &mut dyn EventSink,
    ) -> Result<Self, SessionError> {
        let Some(host_peer) = bus.leader() else {
            sink.emit(SessionEvent::Error {
                failure: SessionFailure::Create,
            });
            return Err(SessionError::ProtocolViolation {
                reason: "group has no leader to join".into(),
            });
        };
        let identity = SessionIdentity {
            machine_id: local.id,
            peer_id: bus.local_peer(),
        };
        let local_machine_id = local.id;
        let mut local = local;
        local.peer_id = identity.peer_id;
        let mut client = ClientSession::new(
            identity,
            local,
            host_peer,
            reservation_key,
            join_checks,
            lock_key,
        );

        let id = SessionId::new();
        info!(session = %id, joiner = %identity, host = %host_peer, "joining session");
        sink.emit(SessionEvent::Created { id: id.clone() });
        let actions = client.send_join_request(now);
        let mut session = Self {
            id,
            bus,
            role: SessionRole::Client(client),
            state: SessionState::Active,
            voice: VoiceRelay::new(endpoint, local_machine_id),
            pending: PendingOps::new(),
            pending_promotion: None,
            in_gameplay: false,
        };
        session.execute(actions, now, sink)?;
        Ok(session)
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn role(&self) -> &SessionRole {
        &self.role
    }

    pub fn document(&self) -> &SessionDocument {
        self.role.document()
    }

    pub fn voice_endpoint_mut(&mut self) -> &mut V {
        self.voice.endpoint_mut()
    }

    /// Keep relaying lobby voice while in gameplay.
    pub fn set_voice_in_gameplay(&mut self, relay: bool) {
        self.voice.relay_in_gameplay = relay;
    }

    pub fn set_gameplay(&mut self, in_gameplay: bool) {
        self.in_gameplay = in_gameplay;
    }

    // ── The pump ─────────────────────────────────────────────────────

    /// Advance the session: apply a staged promotion, poll async
    /// operations, drain the transport, run housekeeping and pump the
    /// voice side-channel.
    pub fn update(&mut self, now: u64, sink: &mut dyn EventSink) -> Result<(), SessionError> {
        if self.state == SessionState::Destroyed {
            // Only retire leftover transport operations.
            self.pending.poll(&mut self.bus, now);
            return Ok(());
        }

        if let Some(promo) = self.pending_promotion.take() {
            self.apply_promotion(*promo, now, sink)?;
        }

        let outcomes = self.pending.poll(&mut self.bus, now);
        for outcome in outcomes {
            self.handle_op_outcome(outcome, now, sink)?;
        }
        if self.state == SessionState::Destroyed {
            return Ok(());
        }

        while let Some(event) = self.bus.try_recv() {
            match event {
                BusEvent::Message {
                    from,
                    bytes,
                    validated,
                } => self.dispatch_message(from, &bytes, validated, now, sink)?,
                BusEvent::PeerLost(peer) => self.handle_peer_lost(peer, now, sink)?,
            }
            if self.state == SessionState::Destroyed {
                return Ok(());
            }
        }

        // Role housekeeping.
        let actions = match &mut self.role {
            SessionRole::Host(host) => {
                host.tick(now);
                Vec::new()
            }
            SessionRole::Client(client) => client.tick(now),
        };
        self.execute(actions, now, sink)?;
        if let SessionRole::Client(client) = &self.role {
            if client.phase() == ClientPhase::Failed {
                self.state = SessionState::Failed;
            }
        }

        self.pump_voice(now, sink)?;
        Ok(())
    }

    /// Tear the session down. A host with other members hands the
    /// session off first; everyone else announces departure and stops.
    pub fn destroy(&mut self, now: u64, sink: &mut dyn EventSink) -> Result<(), SessionError> {
        match self.state {
            SessionState::Destroyed | SessionState::Closing => return Ok(()),
            _ => {}
        }
        if let SessionRole::Host(host) = &self.role {
            if host.document().members.num_machines() > 1 {
                match self.bus.begin_host_handoff() {
                    Ok(op) => {
                        info!(session = %self.id, "handing session off before leaving");
                        self.state = SessionState::Closing;
                        self.pending
                            .issue(op, OpKind::HostHandoff, now, MIGRATION_WAIT_MS);
                        sink.emit(SessionEvent::MigrationStarted);
                        return Ok(());
                    }
                    Err(err) => {
                        warn!(%err, "handoff unavailable, leaving outright");
                    }
                }
            }
        }
        self.teardown(true);
        Ok(())
    }

    // ── Host surface ─────────────────────────────────────────────────

    pub fn update_settings(
        &mut self,
        update: Option<crate::document::SettingsValue>,
        delete: Vec<String>,
        now: u64,
        sink: &mut dyn EventSink,
    ) -> Result<(), SessionError> {
        let actions = match &mut self.role {
            SessionRole::Host(host) => host.update_settings(update, delete),
            SessionRole::Client(client) => return client.update_settings(),
        };
        self.execute(actions, now, sink)
    }

    pub fn set_phase(
        &mut self,
        phase: HostPhase,
        now: u64,
        sink: &mut dyn EventSink,
    ) -> Result<(), SessionError> {
        let actions = match &mut self.role {
            SessionRole::Host(host) => host.set_phase(phase),
            SessionRole::Client(_) => return Err(SessionError::NotHost),
        };
        self.execute(actions, now, sink)
    }

    pub fn kick_player(
        &mut self,
        xuid: Xuid,
        now: u64,
        sink: &mut dyn EventSink,
    ) -> Result<(), SessionError> {
        let actions = match &mut self.role {
            SessionRole::Host(host) => host.kick_player(xuid, now),
            SessionRole::Client(_) => return Err(SessionError::NotHost),
        };
        self.execute(actions, now, sink)
    }

    // ── Client surface ───────────────────────────────────────────────

    /// Ask the host to hold slots for a keyed team.
    pub fn request_team_reservation(
        &mut self,
        key: u64,
        team_size: u32,
        now: u64,
        sink: &mut dyn EventSink,
    ) -> Result<(), SessionError> {
        let actions = match &mut self.role {
            SessionRole::Host(host) => {
                let local = host.identity().peer_id;
                host.handle_team_reservation(local, key, team_size, now)
            }
            SessionRole::Client(client) => vec![SessionAction::Send {
                to: client.believed_host(),
                message: SessionMessage::TeamReservation { key, team_size },
            }],
        };
        // A host answering itself: drop the loopback send.
        let local = self.bus.local_peer();
        let actions = actions
            .into_iter()
            .filter(|a| !matches!(a, SessionAction::Send { to, .. } if *to == local))
            .collect();
        self.execute(actions, now, sink)
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Send an opaque application payload to a scope of machines. The
    /// local machine receives it through the sink when in scope.
    pub fn send_command(
        &mut self,
        target: CommandTarget,
        payload: Vec<u8>,
        sink: &mut dyn EventSink,
    ) -> Result<(), SessionError> {
        let message = SessionMessage::Command {
            target,
            payload: payload.clone(),
        };
        let bytes = message.encode()?;
        match target {
            CommandTarget::All | CommandTarget::Host | CommandTarget::Clients => {
                self.bus.broadcast(&bytes)?;
            }
            CommandTarget::Machine(id) => {
                if id != self.role.identity().machine_id {
                    let Some(peer) = self.document().find_machine(id).map(|m| m.peer_id) else {
                        return Err(SessionError::ProtocolViolation {
                            reason: format!("command target {id} is not a member"),
                        });
                    };
                    self.bus.send(peer, &bytes)?;
                }
            }
        }
        if self.command_in_scope(target) {
            sink.emit(SessionEvent::Command { payload });
        }
        Ok(())
    }

    fn command_in_scope(&self, target: CommandTarget) -> bool {
        match target {
            CommandTarget::All => true,
            CommandTarget::Host => self.role.is_host(),
            CommandTarget::Clients => !self.role.is_host(),
            CommandTarget::Machine(id) => id == self.role.identity().machine_id,
        }
    }

    // ── Internals ────────────────────────────────────────────────────

    fn apply_promotion(
        &mut self,
        promo: PromotionState,
        now: u64,
        sink: &mut dyn EventSink,
    ) -> Result<(), SessionError> {
        let identity = SessionIdentity {
            machine_id: self.role.identity().machine_id,
            peer_id: self.bus.local_peer(),
        };
        let survivors = self.bus.peers();
        let (host, actions) = HostSession::from_migration(identity, promo, &survivors);
        self.role = SessionRole::Host(host);
        self.state = SessionState::Active;
        self.execute(actions, now, sink)
    }

    fn handle_op_outcome(
        &mut self,
        outcome: OpOutcome,
        now: u64,
        sink: &mut dyn EventSink,
    ) -> Result<(), SessionError> {
        match outcome {
            OpOutcome::Complete(OpKind::ChannelOpen(peer)) => {
                debug!(%peer, "channel open");
                Ok(())
            }
            OpOutcome::Failed(OpKind::ChannelOpen(peer))
            | OpOutcome::TimedOut(OpKind::ChannelOpen(peer)) => {
                // Treat an unreachable member like a lost peer.
                warn!(%peer, "channel open failed");
                self.handle_peer_lost(peer, now, sink)
            }
            OpOutcome::Complete(OpKind::HostHandoff) => {
                self.finish_handoff(now, sink)
            }
            OpOutcome::Failed(OpKind::HostHandoff) | OpOutcome::TimedOut(OpKind::HostHandoff) => {
                warn!("host handoff failed, leaving outright");
                sink.emit(SessionEvent::Error {
                    failure: SessionFailure::Migrate,
                });
                self.teardown(true);
                Ok(())
            }
        }
    }

    /// Ownership moved to the transport's new leader: announce it as
    /// the session host, then leave.
    fn finish_handoff(&mut self, now: u64, sink: &mut dyn EventSink) -> Result<(), SessionError> {
        let SessionRole::Host(host) = &self.role else {
            self.teardown(true);
            return Ok(());
        };
        let local_machine = host.identity().machine_id;
        let Some(new_leader) = self.bus.leader().filter(|p| *p != self.bus.local_peer()) else {
            self.teardown(true);
            return Ok(());
        };
        let Some(new_host) = host.document().find_by_peer(new_leader).map(|m| m.identity())
        else {
            warn!(%new_leader, "new leader is not a session member");
            self.teardown(true);
            return Ok(());
        };
        // Survivors are the members we still hold a live channel to.
        let survivors: Vec<MachineId> = host
            .document()
            .members
            .machines()
            .iter()
            .filter(|m| m.id != local_machine && self.bus.channel_open(m.peer_id))
            .map(|m| m.id)
            .collect();
        info!(new_host = %new_host, "session handed off");
        let actions = vec![SessionAction::Broadcast {
            message: SessionMessage::HostMigrated { new_host, survivors },
        }];
        self.execute(actions, now, sink)?;
        self.teardown(true);
        Ok(())
    }

    fn teardown(&mut self, announce: bool) {
        if self.state == SessionState::Destroyed {
            return;
        }
        if announce {
            let machine = self.role.identity().machine_id;
            if let Ok(bytes) = (SessionMessage::Quit { machine }).encode() {
                if let Err(err) = self.bus.broadcast(&bytes) {
                    debug!(%err, "departure announcement failed");
                }
            }
        }
        for peer in self.bus.peers() {
            self.bus.close_channel(peer);
        }
        self.pending.cancel_all();
        info!(session = %self.id, "session destroyed");
        self.state = SessionState::Destroyed;
    }

    fn handle_peer_lost(
        &mut self,
        peer: PeerId,
        now: u64,
        sink: &mut dyn EventSink,
    ) -> Result<(), SessionError> {
        match &mut self.role {
            SessionRole::Host(host) => {
                let actions = host.handle_peer_lost(peer);
                self.execute(actions, now, sink)
            }
            SessionRole::Client(client) => {
                let leader = self.bus.leader();
                let (actions, outcome) = client.handle_peer_lost(peer, leader, now);
                match outcome {
                    HostLossOutcome::NotHost => {}
                    HostLossOutcome::Waiting => self.state = SessionState::Migrating,
                    HostLossOutcome::Promote(promo) => {
                        self.state = SessionState::Migrating;
                        self.pending_promotion = Some(promo);
                    }
                }
                self.execute(actions, now, sink)
            }
        }
    }

    fn dispatch_message(
        &mut self,
        from: PeerId,
        bytes: &[u8],
        validated: bool,
        now: u64,
        sink: &mut dyn EventSink,
    ) -> Result<(), SessionError> {
        let message = match SessionMessage::decode(bytes) {
            Ok(message) => message,
            Err(err) => {
                debug!(%from, %err, "dropping undecodable frame");
                return Ok(());
            }
        };

        // Voice traffic bypasses the role engines.
        match message {
            SessionMessage::VoiceFrame { xuid, bytes } => {
                let actions = self.voice.playback(self.role.document(), xuid, &bytes, from);
                return self.execute(actions, now, sink);
            }
            SessionMessage::VoiceStatus { xuid, voice } => {
                if self.sender_owns_player(from, xuid) {
                    match &mut self.role {
                        SessionRole::Host(h) => h.handle_voice_status(xuid, voice),
                        SessionRole::Client(c) => c.handle_voice_status(xuid, voice),
                    }
                }
                return Ok(());
            }
            SessionMessage::VoiceMutelist { machine, muted } => {
                if self.sender_owns_machine(from, machine) {
                    match &mut self.role {
                        SessionRole::Host(h) => h.handle_mutelist(machine, muted),
                        SessionRole::Client(c) => c.handle_mutelist(machine, muted),
                    }
                }
                return Ok(());
            }
            SessionMessage::Command { target, payload } => {
                let member = self.document().find_by_peer(from).is_some();
                if member && self.command_in_scope(target) {
                    sink.emit(SessionEvent::Command { payload });
                }
                return Ok(());
            }
            _ => {}
        }

        let actions = match (&mut self.role, message) {
            // Join traffic reaches the host before any channel exists.
            (
                SessionRole::Host(host),
                SessionMessage::JoinRequest {
                    machine,
                    reservation_key,
                    join_checks,
                    lock_key,
                },
            ) => host.process_join_request(
                from,
                machine,
                reservation_key,
                &join_checks,
                lock_key.as_deref(),
                now,
            ),
            (SessionRole::Host(host), SessionMessage::TeamReservation { key, team_size }) => {
                host.handle_team_reservation(from, key, team_size, now)
            }
            (SessionRole::Host(host), SessionMessage::Quit { machine }) => {
                if host.document().find_machine(machine).map(|m| m.peer_id) == Some(from) {
                    host.handle_quit(machine)
                } else {
                    Vec::new()
                }
            }

            // Host-originated structure: only the believed host counts.
            // Join replies arrive before our channel to the host opens,
            // so those skip the validation flag.
            (
                SessionRole::Client(client),
                SessionMessage::JoinAccepted {
                    joiner,
                    document,
                    crypt,
                },
            ) if from == client.believed_host() => {
                client.handle_join_accepted(joiner, document, crypt)
            }
            (SessionRole::Client(client), SessionMessage::JoinRejected { joiner, error })
                if from == client.believed_host() =>
            {
                client.handle_join_rejected(joiner, error)
            }
            (SessionRole::Client(client), SessionMessage::SettingsUpdate { update, delete })
                if from == client.believed_host() && validated =>
            {
                client.handle_settings_update(update.as_ref(), &delete)
            }
            (SessionRole::Client(client), SessionMessage::PlayerKicked { xuid })
                if from == client.believed_host() && validated =>
            {
                client.handle_player_kicked(xuid, now)
            }
            (SessionRole::Client(client), SessionMessage::Quit { machine }) => {
                if client.document().find_machine(machine).map(|m| m.peer_id) == Some(from) {
                    client.handle_quit(machine)
                } else {
                    Vec::new()
                }
            }
            // Migration announcements come from the departing host
            // appointing its successor, or from the claimant itself.
            // A self-naming claim only counts when the transport agrees
            // the claimant leads the group.
            (
                SessionRole::Client(client),
                SessionMessage::HostMigrated { new_host, survivors },
            ) if from == client.believed_host()
                || (new_host.peer_id == from && self.bus.leader() == Some(from)) => {
                if new_host.machine_id == client.identity().machine_id {
                    let (actions, promo) = client.prepare_promotion(&survivors);
                    self.pending_promotion = Some(Box::new(promo));
                    self.state = SessionState::Migrating;
                    actions
                } else {
                    client.handle_host_migrated(new_host, &survivors, now)
                }
            }
            (SessionRole::Client(client), SessionMessage::TeamReservationResult { key, accepted })
                if from == client.believed_host() =>
            {
                vec![SessionAction::Event(SessionEvent::TeamReservationResult {
                    key,
                    accepted,
                })]
            }

            (_, other) => {
                debug!(%from, message = ?discriminant_name(&other), "dropping out-of-role frame");
                Vec::new()
            }
        };
        self.execute(actions, now, sink)?;

        if let SessionRole::Client(client) = &self.role {
            if client.phase() == ClientPhase::Failed {
                self.state = SessionState::Failed;
            } else if client.phase() == ClientPhase::Idle
                && self.state == SessionState::Migrating
                && self.pending_promotion.is_none()
            {
                self.state = SessionState::Active;
            }
        }
        Ok(())
    }

    fn sender_owns_player(&self, from: PeerId, xuid: Xuid) -> bool {
        self.document()
            .find_player(xuid)
            .is_some_and(|(_, machine)| machine.peer_id == from)
    }

    fn sender_owns_machine(&self, from: PeerId, machine: MachineId) -> bool {
        self.document()
            .find_machine(machine)
            .is_some_and(|m| m.peer_id == from)
    }

    fn pump_voice(&mut self, now: u64, sink: &mut dyn EventSink) -> Result<(), SessionError> {
        self.voice.sync_talkers(self.role.document());

        let local_xuid = Xuid::from(self.role.identity().machine_id);
        let mut actions = self
            .voice
            .capture_and_relay(local_xuid, self.in_gameplay);
        if let Some(action) = self.voice.sync_mutelist(self.role.document()) {
            // Apply our own list locally; broadcasts skip the sender.
            if let SessionAction::Broadcast {
                message: SessionMessage::VoiceMutelist { machine, ref muted },
            } = action
            {
                let muted = muted.clone();
                match &mut self.role {
                    SessionRole::Host(h) => h.handle_mutelist(machine, muted),
                    SessionRole::Client(c) => c.handle_mutelist(machine, muted),
                }
            }
            actions.push(action);
        }
        if let Some(action) =
            self.voice
                .update_headset_status(self.role.document(), local_xuid, now)
        {
            if let SessionAction::Broadcast {
                message: SessionMessage::VoiceStatus { xuid, voice },
            } = action
            {
                match &mut self.role {
                    SessionRole::Host(h) => h.handle_voice_status(xuid, voice),
                    SessionRole::Client(c) => c.handle_voice_status(xuid, voice),
                }
            }
            actions.push(action);
        }
        self.execute(actions, now, sink)
    }

    fn execute(
        &mut self,
        actions: Vec<SessionAction>,
        now: u64,
        sink: &mut dyn EventSink,
    ) -> Result<(), SessionError> {
        for action in actions {
            match action {
                SessionAction::Send { to, message } => {
                    let bytes = message.encode()?;
                    if let Err(err) = self.bus.send(to, &bytes) {
                        debug!(%to, %err, "unicast failed");
                    }
                }
                SessionAction::Broadcast { message } => {
                    let bytes = message.encode()?;
                    if let Err(err) = self.bus.broadcast(&bytes) {
                        debug!(%err, "broadcast failed");
                    }
                }
                SessionAction::OpenChannel { peer } => match self.bus.begin_open_channel(peer) {
                    Ok(op) => self.pending.issue(
                        op,
                        OpKind::ChannelOpen(peer),
                        now,
                        JOIN_RETRY_WINDOW_MS,
                    ),
                    Err(err) => warn!(%peer, %err, "channel open refused"),
                },
                SessionAction::CloseChannel { peer } => self.bus.close_channel(peer),
                SessionAction::Event(event) => sink.emit(event),
            }
        }
        Ok(())
    }
}

fn discriminant_name(message: &SessionMessage) -> &'static str {
    match message {
        SessionMessage::JoinRequest { .. } => "JoinRequest",
        SessionMessage::JoinAccepted { .. } => "JoinAccepted",
        SessionMessage::JoinRejected { .. } => "JoinRejected",
        SessionMessage::SettingsUpdate { .. } => "SettingsUpdate",
        SessionMessage::Quit { .. } => "Quit",
        SessionMessage::PlayerKicked { .. } => "PlayerKicked",
        SessionMessage::HostMigrated { .. } => "HostMigrated",
        SessionMessage::Command { .. } => "Command",
        SessionMessage::VoiceFrame { .. } => "VoiceFrame",
        SessionMessage::VoiceStatus { .. } => "VoiceStatus",
        SessionMessage::VoiceMutelist { .. } => "VoiceMutelist",
        SessionMessage::TeamReservation { .. } => "TeamReservation",
        SessionMessage::TeamReservationResult { .. } => "TeamReservationResult",
    }
}
