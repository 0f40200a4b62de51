/// The session roster: an ordered list of machines, each carrying its
/// players and voice bookkeeping, plus the slot/machine/player counters
/// the protocol replicates alongside the entries.
///
/// The counters are maintained by every mutating call and must always
/// equal the live entry counts.
use serde::{Deserialize, Serialize};

use crate::error::SessionError;
use crate::types::{MachineId, PeerId, SessionIdentity, Xuid};

// ── VoiceState ───────────────────────────────────────────────────────

/// Whether a player currently has voice hardware attached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoiceState {
    #[default]
    None,
    Headset,
}

// ── Player ───────────────────────────────────────────────────────────

/// A player slot on a machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub xuid: Xuid,
    pub name: String,
    pub voice: VoiceState,
}

impl Player {
    pub fn new(xuid: Xuid, name: impl Into<String>) -> Self {
        Self {
            xuid,
            name: name.into(),
            voice: VoiceState::None,
        }
    }
}

// ── Machine ──────────────────────────────────────────────────────────

/// One physical device in the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Machine {
    pub id: MachineId,
    pub peer_id: PeerId,
    pub flags: u64,
    /// Title-update version string; must match the host's on join.
    pub tu_version: String,
    /// Installed-DLC bitmask checked against the session requirement.
    pub dlc_mask: u64,
    pub players: Vec<Player>,
    /// Machines this machine has muted.
    pub mutelist: Vec<MachineId>,
}

impl Machine {
    /// A single-player machine record — the shape every join proposes.
    pub fn single(id: MachineId, peer_id: PeerId, name: impl Into<String>) -> Self {
        Self {
            id,
            peer_id,
            flags: 0,
            tu_version: String::new(),
            dlc_mask: 0,
            players: vec![Player::new(Xuid::from(id), name)],
            mutelist: Vec::new(),
        }
    }

    pub fn identity(&self) -> SessionIdentity {
        SessionIdentity {
            machine_id: self.id,
            peer_id: self.peer_id,
        }
    }

    pub fn has_player(&self, xuid: Xuid) -> bool {
        self.players.iter().any(|p| p.xuid == xuid)
    }
}

// ── Members ──────────────────────────────────────────────────────────

/// Ordered machine list with replicated counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Members {
    machines: Vec<Machine>,
    num_slots: u32,
    num_machines: u32,
    num_players: u32,
}

impl Members {
    pub fn new(num_slots: u32) -> Self {
        Self {
            machines: Vec::new(),
            num_slots,
            num_machines: 0,
            num_players: 0,
        }
    }

    pub fn machines(&self) -> &[Machine] {
        &self.machines
    }

    pub fn num_slots(&self) -> u32 {
        self.num_slots
    }

    pub fn num_machines(&self) -> u32 {
        self.num_machines
    }

    pub fn num_players(&self) -> u32 {
        self.num_players
    }

    pub fn find_machine(&self, id: MachineId) -> Option<&Machine> {
        self.machines.iter().find(|m| m.id == id)
    }

    pub fn find_machine_mut(&mut self, id: MachineId) -> Option<&mut Machine> {
        self.machines.iter_mut().find(|m| m.id == id)
    }

    pub fn find_by_peer(&self, peer: PeerId) -> Option<&Machine> {
        self.machines.iter().find(|m| m.peer_id == peer)
    }

    /// Find a player and the machine that owns it.
    pub fn find_player(&self, xuid: Xuid) -> Option<(&Player, &Machine)> {
        self.machines.iter().find_map(|m| {
            m.players
                .iter()
                .find(|p| p.xuid == xuid)
                .map(|p| (p, m))
        })
    }

    /// Append a machine record, enforcing the one-machine/one-player
    /// shape of a physical join and identity uniqueness.
    pub fn append_machine(&mut self, machine: Machine) -> Result<(), SessionError> {
        if machine.players.len() != 1 {
            return Err(SessionError::ProtocolViolation {
                reason: format!(
                    "a join contributes exactly one player, got {}",
                    machine.players.len()
                ),
            });
        }
        if self.find_machine(machine.id).is_some() {
            return Err(SessionError::ProtocolViolation {
                reason: format!("machine {} already present", machine.id),
            });
        }
        self.num_machines += 1;
        self.num_players += machine.players.len() as u32;
        self.machines.push(machine);
        Ok(())
    }

    /// Remove a machine and recount. Returns the removed record.
    pub fn remove_machine(&mut self, id: MachineId) -> Option<Machine> {
        let index = self.machines.iter().position(|m| m.id == id)?;
        let machine = self.machines.remove(index);
        self.num_machines -= 1;
        self.num_players -= machine.players.len() as u32;
        Some(machine)
    }

    /// Update a machine's routable address (post-migration rebind).
    pub fn rebind_peer(&mut self, id: MachineId, peer: PeerId) {
        if let Some(machine) = self.find_machine_mut(id) {
            machine.peer_id = peer;
        }
    }

    /// Whether the counters equal the live entry counts.
    pub fn counters_consistent(&self) -> bool {
        self.num_machines as usize == self.machines.len()
            && self.num_players as usize
                == self.machines.iter().map(|m| m.players.len()).sum::<usize>()
    }

    /// Players that would remain after keeping only `keep` machines.
    pub fn retain_machines(&mut self, keep: impl Fn(&Machine) -> bool) -> Vec<Machine> {
        let mut dropped = Vec::new();
        let mut kept = Vec::new();
        for machine in self.machines.drain(..) {
            if keep(&machine) {
                kept.push(machine);
            } else {
                dropped.push(machine);
            }
        }
        self.machines = kept;
        self.num_machines = self.machines.len() as u32;
        self.num_players = self.machines.iter().map(|m| m.players.len() as u32).sum();
        dropped
    }
}
