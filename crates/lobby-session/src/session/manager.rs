/// One live session per machine.
///
/// The manager holds the current session, if any, and the event buffer
/// the application drains each frame. Starting a new session tears the
/// previous one down first; the protocol never runs two memberships on
/// one machine.
use lobby_bus::MessageBus;
use tracing::warn;

use crate::document::Machine;
use crate::error::SessionError;
use crate::event::{SessionEvent, VecSink};
use crate::types::SessionId;
use crate::voice::VoiceEndpoint;
use crate::wire::JoinCheck;

use super::{Session, SessionState};

pub struct SessionManager<B: MessageBus, V: VoiceEndpoint> {
    session: Option<Session<B, V>>,
    sink: VecSink,
}

impl<B: MessageBus, V: VoiceEndpoint> Default for SessionManager<B, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: MessageBus, V: VoiceEndpoint> SessionManager<B, V> {
    pub fn new() -> Self {
        Self {
            session: None,
            sink: VecSink::new(),
        }
    }

    pub fn session(&self) -> Option<&Session<B, V>> {
        self.session.as_ref()
    }

    pub fn session_mut(&mut self) -> Option<&mut Session<B, V>> {
        self.session.as_mut()
    }

    /// Create and take ownership of a new hosted session.
    pub fn host(
        &mut self,
        bus: B,
        local: Machine,
        num_slots: u32,
        private_key: Option<String>,
        endpoint: V,
        now: u64,
    ) -> Result<&SessionId, SessionError> {
        self.close_current(now);
        let session = Session::new_host(bus, local, num_slots, private_key, endpoint, &mut self.sink)?;
        Ok(self.session.insert(session).id())
    }

    /// Join the session hosted on the endpoint's group.
    pub fn join(
        &mut self,
        bus: B,
        local: Machine,
        reservation_key: Option<u64>,
        join_checks: Vec<JoinCheck>,
        lock_key: Option<String>,
        endpoint: V,
        now: u64,
    ) -> Result<&SessionId, SessionError> {
        self.close_current(now);
        let session = Session::new_client(
            bus,
            local,
            reservation_key,
            join_checks,
            lock_key,
            endpoint,
            now,
            &mut self.sink,
        )?;
        Ok(self.session.insert(session).id())
    }

    /// Pump the current session and drain its events. A session that
    /// failed is torn down here; failure never hands the session off.
    pub fn update(&mut self, now: u64) -> Vec<SessionEvent> {
        if let Some(session) = &mut self.session {
            if let Err(err) = session.update(now, &mut self.sink) {
                warn!(%err, "session update failed");
            }
            if session.state() == SessionState::Failed {
                if let Err(err) = session.destroy(now, &mut self.sink) {
                    warn!(%err, "failed session teardown failed");
                }
            }
            if session.state() == SessionState::Destroyed {
                self.session = None;
            }
        }
        self.sink.drain()
    }

    /// Begin tearing the current session down. The session stays until
    /// its pending handoff or departure completes in `update`.
    pub fn destroy(&mut self, now: u64) -> Vec<SessionEvent> {
        if let Some(session) = &mut self.session {
            if let Err(err) = session.destroy(now, &mut self.sink) {
                warn!(%err, "session destroy failed");
            }
        }
        self.sink.drain()
    }

    fn close_current(&mut self, now: u64) {
        if let Some(mut session) = self.session.take() {
            if let Err(err) = session.destroy(now, &mut self.sink) {
                warn!(%err, "closing previous session failed");
            }
            // Give a graceful handoff a bounded chance to finish.
            for tick in 0..32 {
                if session.state() == SessionState::Destroyed {
                    break;
                }
                let _ = session.update(now + tick, &mut self.sink);
            }
        }
    }
}
