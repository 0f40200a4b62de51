//! End-to-end lobby simulations over the in-process transport.
//!
//! Each test drives several `Session` instances against one
//! `MemoryNetwork` group, pumping them in lockstep the way an embedding
//! application would.

use lobby_bus::{GroupHandle, MemoryBus, MemoryNetwork, MessageBus};
use lobby_session::{
    CommandTarget, JoinError, Machine, MachineId, NullVoice, PeerId, Session, SessionEvent,
    SessionFailure, SessionIdentity, SessionMessage, SessionState, SettingsValue, VecSink, Xuid,
    KICK_BAN_DURATION_MS,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn machine(seed: u64) -> Machine {
    Machine::single(MachineId(seed), PeerId(0), format!("player-{seed}"))
}

struct Peer {
    session: Session<MemoryBus, NullVoice>,
    sink: VecSink,
}

impl Peer {
    fn host(net: &MemoryNetwork, seed: u64, num_slots: u32) -> (Self, GroupHandle) {
        let bus = net.create_group();
        let handle = bus.handle().clone();
        let mut sink = VecSink::new();
        let session = Session::new_host(bus, machine(seed), num_slots, None, NullVoice, &mut sink)
            .expect("host session");
        (Self { session, sink }, handle)
    }

    fn join(net: &MemoryNetwork, handle: &GroupHandle, seed: u64, now: u64) -> Self {
        Self::join_with_key(net, handle, seed, None, now)
    }

    fn join_with_key(
        net: &MemoryNetwork,
        handle: &GroupHandle,
        seed: u64,
        reservation_key: Option<u64>,
        now: u64,
    ) -> Self {
        let bus = net.connect(handle).expect("connect");
        let mut sink = VecSink::new();
        let session = Session::new_client(
            bus,
            machine(seed),
            reservation_key,
            Vec::new(),
            None,
            NullVoice,
            now,
            &mut sink,
        )
        .expect("client session");
        Self { session, sink }
    }

    fn events(&mut self) -> Vec<SessionEvent> {
        self.sink.drain()
    }
}

/// Advance every peer `rounds` times, one millisecond per round.
fn pump(peers: &mut [&mut Peer], start: u64, rounds: u64) -> u64 {
    for round in 0..rounds {
        for peer in peers.iter_mut() {
            peer.session
                .update(start + round, &mut peer.sink)
                .expect("update");
        }
    }
    start + rounds
}

#[test]
fn three_machines_converge() {
    init_tracing();
    let net = MemoryNetwork::new();
    let (mut host, handle) = Peer::host(&net, 1, 8);
    let mut c2 = Peer::join(&net, &handle, 2, 0);
    let mut c3 = Peer::join(&net, &handle, 3, 0);

    pump(&mut [&mut host, &mut c2, &mut c3], 0, 10);

    for peer in [&host, &c2, &c3] {
        assert_eq!(peer.session.document().members.num_machines(), 3);
        assert_eq!(peer.session.document().members.num_players(), 3);
        assert!(peer.session.document().consistent());
        assert_eq!(peer.session.state(), SessionState::Active);
    }
    assert!(c2.events().iter().any(|e| matches!(e, SessionEvent::Ready)));
    assert!(c3.events().iter().any(|e| matches!(e, SessionEvent::Ready)));
    let host_events = host.events();
    assert_eq!(
        host_events
            .iter()
            .filter(|e| matches!(e, SessionEvent::PlayerJoined { .. }))
            .count(),
        2
    );
    // The earlier joiner learns about the later one.
    assert!(c2
        .session
        .document()
        .find_machine(MachineId(3))
        .is_some());
}

#[test]
fn session_full_rejects_at_the_boundary() {
    init_tracing();
    let net = MemoryNetwork::new();
    let (mut host, handle) = Peer::host(&net, 1, 2);
    let mut c2 = Peer::join(&net, &handle, 2, 0);
    let mut c3 = Peer::join(&net, &handle, 3, 0);

    pump(&mut [&mut host, &mut c2, &mut c3], 0, 10);

    assert_eq!(c2.session.state(), SessionState::Active);
    assert_eq!(c3.session.state(), SessionState::Failed);
    assert!(c3.events().iter().any(|e| matches!(
        e,
        SessionEvent::Error {
            failure: SessionFailure::JoinDenied(JoinError::Full),
        }
    )));
    assert_eq!(host.session.document().members.num_machines(), 2);
}

#[test]
fn kick_bans_until_the_window_lapses() {
    init_tracing();
    let net = MemoryNetwork::new();
    let (mut host, handle) = Peer::host(&net, 1, 8);
    let mut c2 = Peer::join(&net, &handle, 2, 0);
    let mut now = pump(&mut [&mut host, &mut c2], 0, 10);

    host.session
        .kick_player(Xuid(2), now, &mut host.sink)
        .expect("kick");
    now = pump(&mut [&mut host, &mut c2], now, 10);

    assert_eq!(c2.session.state(), SessionState::Failed);
    assert!(c2.events().iter().any(|e| matches!(
        e,
        SessionEvent::Error {
            failure: SessionFailure::Kicked,
        }
    )));
    assert_eq!(host.session.document().members.num_machines(), 1);

    // Re-joining inside the ban window is refused.
    let mut retry = Peer::join(&net, &handle, 2, now);
    now = pump(&mut [&mut host, &mut retry], now, 10);
    assert_eq!(retry.session.state(), SessionState::Failed);
    assert!(retry.events().iter().any(|e| matches!(
        e,
        SessionEvent::Error {
            failure: SessionFailure::JoinDenied(JoinError::Kicked),
        }
    )));

    // After the ban lapses the same machine gets back in.
    now += KICK_BAN_DURATION_MS;
    let mut again = Peer::join(&net, &handle, 2, now);
    pump(&mut [&mut host, &mut again], now, 10);
    assert_eq!(again.session.state(), SessionState::Active);
    assert_eq!(host.session.document().members.num_machines(), 2);
}

#[test]
fn graceful_destroy_hands_the_session_off() {
    init_tracing();
    let net = MemoryNetwork::new();
    let (mut host, handle) = Peer::host(&net, 1, 8);
    let mut c2 = Peer::join(&net, &handle, 2, 0);
    let mut c3 = Peer::join(&net, &handle, 3, 0);
    let now = pump(&mut [&mut host, &mut c2, &mut c3], 0, 10);

    host.session.destroy(now, &mut host.sink).expect("destroy");
    pump(&mut [&mut host, &mut c2, &mut c3], now, 10);

    assert_eq!(host.session.state(), SessionState::Destroyed);
    // Exactly one survivor runs the session now.
    assert!(c2.session.role().is_host());
    assert!(!c3.session.role().is_host());
    assert_eq!(c3.session.state(), SessionState::Active);
    for peer in [&c2, &c3] {
        assert_eq!(peer.session.document().members.num_machines(), 2);
        assert!(peer.session.document().find_machine(MachineId(1)).is_none());
        assert!(peer.session.document().consistent());
    }
    assert!(c3.events().iter().any(|e| matches!(
        e,
        SessionEvent::MigrationFinished { new_host } if new_host.machine_id == MachineId(2)
    )));
}

#[test]
fn host_crash_promotes_the_next_leader() {
    init_tracing();
    let net = MemoryNetwork::new();
    let (mut host, handle) = Peer::host(&net, 1, 8);
    let mut c2 = Peer::join(&net, &handle, 2, 0);
    let mut c3 = Peer::join(&net, &handle, 3, 0);
    let now = pump(&mut [&mut host, &mut c2, &mut c3], 0, 10);

    // The host vanishes without a handoff.
    drop(host);
    pump(&mut [&mut c2, &mut c3], now, 10);

    assert!(c2.session.role().is_host());
    assert_eq!(c3.session.state(), SessionState::Active);
    for peer in [&c2, &c3] {
        assert_eq!(peer.session.document().members.num_machines(), 2);
        assert!(peer.session.document().consistent());
    }
    assert!(c2
        .events()
        .iter()
        .any(|e| matches!(e, SessionEvent::MigrationStarted)));
    let c3_events = c3.events();
    assert!(c3_events
        .iter()
        .any(|e| matches!(e, SessionEvent::MigrationStarted)));
    assert!(c3_events.iter().any(|e| matches!(
        e,
        SessionEvent::MigrationFinished { new_host } if new_host.machine_id == MachineId(2)
    )));
}

#[test]
fn settings_replicate_in_order() {
    init_tracing();
    let net = MemoryNetwork::new();
    let (mut host, handle) = Peer::host(&net, 1, 8);
    let mut c2 = Peer::join(&net, &handle, 2, 0);
    let mut now = pump(&mut [&mut host, &mut c2], 0, 10);

    let mut delta = SettingsValue::map();
    delta.set("game/mode", "coop".into());
    delta.set("game/difficulty", SettingsValue::Uint(2));
    host.session
        .update_settings(Some(delta), Vec::new(), now, &mut host.sink)
        .expect("update settings");
    now = pump(&mut [&mut host, &mut c2], now, 5);

    assert_eq!(c2.session.document().game.get_text("mode"), Some("coop"));
    assert_eq!(c2.session.document().game.get_uint("difficulty"), Some(2));
    assert!(c2
        .events()
        .iter()
        .any(|e| matches!(e, SessionEvent::SettingsChanged)));

    // Deletes replicate too.
    host.session
        .update_settings(None, vec!["game/difficulty".into()], now, &mut host.sink)
        .expect("delete setting");
    pump(&mut [&mut host, &mut c2], now, 5);
    assert_eq!(c2.session.document().game.get_uint("difficulty"), None);
}

#[test]
fn clients_cannot_write_settings() {
    init_tracing();
    let net = MemoryNetwork::new();
    let (mut host, handle) = Peer::host(&net, 1, 8);
    let mut c2 = Peer::join(&net, &handle, 2, 0);
    pump(&mut [&mut host, &mut c2], 0, 10);

    let mut delta = SettingsValue::map();
    delta.set("game/mode", "versus".into());
    assert!(c2
        .session
        .update_settings(Some(delta), Vec::new(), 20, &mut c2.sink)
        .is_err());
}

#[test]
fn live_reservation_gates_every_join() {
    init_tracing();
    let net = MemoryNetwork::new();
    let (mut host, handle) = Peer::host(&net, 1, 8);
    let mut now = pump(&mut [&mut host], 0, 3);

    host.session
        .request_team_reservation(0xbeef, 2, now, &mut host.sink)
        .expect("reserve");
    assert!(host.events().iter().any(|e| matches!(
        e,
        SessionEvent::TeamReservationResult {
            key: 0xbeef,
            accepted: true,
        }
    )));

    // While the ticket is live a keyless join is refused outright,
    // free slots or not.
    let mut outsider = Peer::join(&net, &handle, 9, now);
    now = pump(&mut [&mut host, &mut outsider], now, 10);
    assert_eq!(outsider.session.state(), SessionState::Failed);
    assert!(outsider.events().iter().any(|e| matches!(
        e,
        SessionEvent::Error {
            failure: SessionFailure::JoinDenied(JoinError::TeamReservation),
        }
    )));

    // Keyed joiners consume the held slots.
    let mut teammate = Peer::join_with_key(&net, &handle, 2, Some(0xbeef), now);
    now = pump(&mut [&mut host, &mut teammate], now, 10);
    assert_eq!(teammate.session.state(), SessionState::Active);
    let mut teammate2 = Peer::join_with_key(&net, &handle, 3, Some(0xbeef), now);
    now = pump(&mut [&mut host, &mut teammate2], now, 10);
    assert_eq!(teammate2.session.state(), SessionState::Active);

    // Fully consumed: keyless joins flow again.
    let mut late = Peer::join(&net, &handle, 10, now);
    pump(&mut [&mut host, &mut late], now, 10);
    assert_eq!(late.session.state(), SessionState::Active);
    assert_eq!(host.session.document().members.num_machines(), 4);
}

#[test]
fn forged_migration_claim_is_ignored() {
    init_tracing();
    let net = MemoryNetwork::new();
    let (mut host, handle) = Peer::host(&net, 1, 8);
    let mut c2 = Peer::join(&net, &handle, 2, 0);
    let mut now = pump(&mut [&mut host, &mut c2], 0, 10);
    c2.events();

    // A connected endpoint that is not the leader crowns itself.
    let mut rogue = net.connect(&handle).expect("connect");
    let claim = SessionMessage::HostMigrated {
        new_host: SessionIdentity {
            machine_id: MachineId(9),
            peer_id: rogue.local_peer(),
        },
        survivors: vec![MachineId(9), MachineId(2)],
    };
    rogue
        .broadcast(&claim.encode().expect("encode"))
        .expect("broadcast");
    now = pump(&mut [&mut host, &mut c2], now, 10);

    assert!(!c2.events().iter().any(|e| matches!(
        e,
        SessionEvent::HostChanged { .. } | SessionEvent::MigrationFinished { .. }
    )));
    assert_eq!(c2.session.document().members.num_machines(), 2);

    // The real host still drives the replicated document.
    let mut delta = SettingsValue::map();
    delta.set("game/mode", "coop".into());
    host.session
        .update_settings(Some(delta), Vec::new(), now, &mut host.sink)
        .expect("update settings");
    pump(&mut [&mut host, &mut c2], now, 5);
    assert_eq!(c2.session.document().game.get_text("mode"), Some("coop"));
}

#[test]
fn commands_route_by_scope() {
    init_tracing();
    let net = MemoryNetwork::new();
    let (mut host, handle) = Peer::host(&net, 1, 8);
    let mut c2 = Peer::join(&net, &handle, 2, 0);
    let mut c3 = Peer::join(&net, &handle, 3, 0);
    let mut now = pump(&mut [&mut host, &mut c2, &mut c3], 0, 10);
    host.events();
    c2.events();
    c3.events();

    host.session
        .send_command(CommandTarget::Clients, b"go".to_vec(), &mut host.sink)
        .expect("command");
    now = pump(&mut [&mut host, &mut c2, &mut c3], now, 5);

    assert!(!host
        .events()
        .iter()
        .any(|e| matches!(e, SessionEvent::Command { .. })));
    for client in [&mut c2, &mut c3] {
        assert!(client.events().iter().any(|e| matches!(
            e,
            SessionEvent::Command { payload } if payload == b"go"
        )));
    }

    // Machine-addressed commands reach only that machine.
    c2.session
        .send_command(CommandTarget::Machine(MachineId(1)), b"ping".to_vec(), &mut c2.sink)
        .expect("command");
    pump(&mut [&mut host, &mut c2, &mut c3], now, 5);
    assert!(host.events().iter().any(|e| matches!(
        e,
        SessionEvent::Command { payload } if payload == b"ping"
    )));
    assert!(!c3
        .events()
        .iter()
        .any(|e| matches!(e, SessionEvent::Command { .. })));
}
