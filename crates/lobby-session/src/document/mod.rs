/// The replicated session document — the single shared source of truth.
///
/// Owned read-write by the current host; every client holds a copy that
/// is replaced wholesale on join replies and merged on settings deltas.
/// Structural changes (machines joining and leaving) happen only on the
/// host.
mod members;
mod value;

pub use members::{Machine, Members, Player, VoiceState};
pub use value::SettingsValue;

use serde::{Deserialize, Serialize};

use crate::types::{MachineId, PeerId, Xuid};

/// System netflag that marks a team-vs-team linking lobby.
pub const NETFLAG_TEAM_LOBBY: &str = "teamlobby";

/// System netflag that suppresses peer-loss handling during bulk
/// server transitions.
pub const NETFLAG_NO_LEAVE: &str = "noleave";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDocument {
    pub members: Members,
    /// Network kind, access policy, lock reason, netflags.
    pub system: SettingsValue,
    /// Title-specific payload; carried verbatim by the protocol.
    pub game: SettingsValue,
    pub options: SettingsValue,
    pub server: SettingsValue,
}

impl SessionDocument {
    pub fn new(num_slots: u32) -> Self {
        Self {
            members: Members::new(num_slots),
            system: SettingsValue::map(),
            game: SettingsValue::map(),
            options: SettingsValue::map(),
            server: SettingsValue::map(),
        }
    }

    // ── System accessors ─────────────────────────────────────────────

    /// The lock reason blocking new joins, if any. Empty lock = joinable.
    pub fn lock(&self) -> Option<&str> {
        match self.system.get_text("lock") {
            Some("") | None => None,
            Some(reason) => Some(reason),
        }
    }

    pub fn set_lock(&mut self, reason: &str) {
        self.system.set("lock", reason.into());
    }

    pub fn clear_lock(&mut self) {
        self.system.remove("lock");
    }

    pub fn netflag(&self) -> &str {
        self.system.get_text("netflag").unwrap_or("")
    }

    /// DLC bitmask every joining machine must carry.
    pub fn dlc_required(&self) -> u64 {
        self.game.get_uint("dlcrequired").unwrap_or(0)
    }

    // ── Path lookup across subtrees ──────────────────────────────────

    /// Look up a text value by full path, routing the first segment to
    /// the matching subtree (e.g. `"system/access"`, `"game/mode"`).
    /// Missing fields read as the empty string, matching the soft
    /// join-check semantics.
    pub fn lookup_text(&self, path: &str) -> &str {
        let Some((subtree, rest)) = path.split_once('/') else {
            return "";
        };
        let root = match subtree {
            "system" => &self.system,
            "game" => &self.game,
            "options" => &self.options,
            "server" => &self.server,
            _ => return "",
        };
        root.get_text(rest).unwrap_or("")
    }

    // ── Merging ──────────────────────────────────────────────────────

    /// Overlay a delta whose top-level keys are subtree names. The
    /// `members` roster is never touched by settings merges.
    pub fn merge_update(&mut self, delta: &SettingsValue) {
        let SettingsValue::Map(overlay) = delta else {
            return;
        };
        for (key, value) in overlay {
            match key.as_str() {
                "system" => self.system.merge_update(value),
                "game" => self.game.merge_update(value),
                "options" => self.options.merge_update(value),
                "server" => self.server.merge_update(value),
                _ => {}
            }
        }
    }

    /// Remove full paths (e.g. `"game/mission"`) from the subtrees.
    pub fn merge_delete(&mut self, paths: &[String]) {
        for path in paths {
            let Some((subtree, rest)) = path.split_once('/') else {
                continue;
            };
            match subtree {
                "system" => {
                    self.system.remove(rest);
                }
                "game" => {
                    self.game.remove(rest);
                }
                "options" => {
                    self.options.remove(rest);
                }
                "server" => {
                    self.server.remove(rest);
                }
                _ => {}
            }
        }
    }

    // ── Convenience ──────────────────────────────────────────────────

    pub fn find_machine(&self, id: MachineId) -> Option<&Machine> {
        self.members.find_machine(id)
    }

    pub fn find_by_peer(&self, peer: PeerId) -> Option<&Machine> {
        self.members.find_by_peer(peer)
    }

    pub fn find_player(&self, xuid: Xuid) -> Option<(&Player, &Machine)> {
        self.members.find_player(xuid)
    }

    /// Whether the replicated counters equal the live entry counts.
    pub fn consistent(&self) -> bool {
        self.members.counters_consistent()
    }
}
