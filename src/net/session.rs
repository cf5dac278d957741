//! Bot session state machine
//!
//! A `BotSession` owns one connection's keys, viewport and lifecycle flags.
//! It reacts to typed events and returns the actions the transport driver
//! must carry out, so it never touches a socket or a timer itself.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use crate::config::GameConfig;
use crate::game::policy::{self, PolicyInput};
use crate::game::viewport::Viewport;
use crate::protocol::cipher::{host_fragment, SessionCipher};
use crate::protocol::constants::session::{ERROR_CLOSE_DELAY_MS, FOLLOW_DWELL_SECS};
use crate::protocol::frames::{self, InnerFrame, ServerFrame};
use crate::swarm::SwarmShared;

/// Session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    /// Transport open, version frames sent
    HandshakeSent,
    /// Keys installed
    KeyExchanged,
    /// Waiting for a cell after a spawn request
    SpawnPending,
    Alive,
    /// Access blocked; never reconnects
    Blocked,
}

/// Events delivered to a session
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Opened,
    Frame(Vec<u8>),
    Errored(String),
    Closed,
    /// Shared movement tick
    Tick,
    FollowTimerElapsed { epoch: u64 },
    ForceCloseElapsed { epoch: u64 },
    /// Operator follow-mode on/off
    FollowSignal(bool),
}

/// Side effects requested by a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// Bytes ready for the wire (already ciphered)
    Send(Vec<u8>),
    /// Close the transport
    Close,
    ArmFollowTimer { epoch: u64, delay: Duration },
    CancelFollowTimer,
    ScheduleForceClose { epoch: u64, delay: Duration },
    /// Open a fresh transport
    Reconnect,
    /// First bot alive swarm-wide: start the movement tick
    StartSwarm,
    /// Blocked before any bot started: the whole run has failed
    FatalBlocked,
}

/// Lifecycle flags readable by the coordinator without entering the session
#[derive(Debug, Default)]
pub struct SessionFlags {
    alive: AtomicBool,
    follow_mouse: AtomicBool,
}

impl SessionFlags {
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    pub fn follow_mouse(&self) -> bool {
        self.follow_mouse.load(Ordering::Acquire)
    }

    fn set_alive(&self, value: bool) {
        self.alive.store(value, Ordering::Release);
    }

    fn set_follow_mouse(&self, value: bool) {
        self.follow_mouse.store(value, Ordering::Release);
    }
}

/// One bot connection
pub struct BotSession {
    id: usize,
    game: Arc<GameConfig>,
    shared: Arc<SwarmShared>,
    flags: Arc<SessionFlags>,
    state: SessionState,
    cipher: SessionCipher,
    viewport: Viewport,
    connected: bool,
    alive: bool,
    blocked: bool,
    follow_mouse: bool,
    follow_timer_armed: bool,
    /// Bumped on every reset; timers from older epochs are ignored
    epoch: u64,
    /// Bumped on every death and reset; guards the follow timer
    follow_epoch: u64,
    rng: StdRng,
}

impl BotSession {
    pub fn new(id: usize, game: Arc<GameConfig>, shared: Arc<SwarmShared>) -> Self {
        Self::with_rng(id, game, shared, StdRng::from_entropy())
    }

    pub fn with_rng(
        id: usize,
        game: Arc<GameConfig>,
        shared: Arc<SwarmShared>,
        rng: StdRng,
    ) -> Self {
        let cipher = SessionCipher::new(game.client_version);
        Self {
            id,
            game,
            shared,
            flags: Arc::new(SessionFlags::default()),
            state: SessionState::Disconnected,
            cipher,
            viewport: Viewport::new(),
            connected: false,
            alive: false,
            blocked: false,
            follow_mouse: false,
            follow_timer_armed: false,
            epoch: 0,
            follow_epoch: 0,
            rng,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn game(&self) -> &GameConfig {
        &self.game
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn flags(&self) -> Arc<SessionFlags> {
        self.flags.clone()
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn cipher(&self) -> &SessionCipher {
        &self.cipher
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn is_blocked(&self) -> bool {
        self.blocked
    }

    pub fn follow_mouse(&self) -> bool {
        self.follow_mouse
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn follow_epoch(&self) -> u64 {
        self.follow_epoch
    }

    /// Mark a transport attempt as started
    pub fn begin_connect(&mut self) {
        if !self.blocked {
            self.state = SessionState::Connecting;
        }
    }

    /// Return every per-connection field to its initial value
    ///
    /// Configuration and the blocked flag survive.
    pub fn reset(&mut self) {
        if self.alive {
            self.shared.metrics().bot_died();
        }
        self.epoch += 1;
        self.follow_epoch += 1;
        self.cipher.reset();
        self.viewport.reset();
        self.connected = false;
        self.alive = false;
        self.follow_mouse = false;
        self.follow_timer_armed = false;
        self.flags.set_alive(false);
        self.flags.set_follow_mouse(false);
        self.state = if self.blocked {
            SessionState::Blocked
        } else {
            SessionState::Disconnected
        };
    }

    pub fn handle(&mut self, event: SessionEvent) -> Vec<SessionAction> {
        let mut actions = Vec::new();
        match event {
            SessionEvent::Opened => self.on_open(&mut actions),
            SessionEvent::Frame(bytes) => self.on_frame(&bytes, &mut actions),
            SessionEvent::Errored(reason) => self.on_error(&reason, &mut actions),
            SessionEvent::Closed => self.on_close(&mut actions),
            SessionEvent::Tick => self.on_tick(&mut actions),
            SessionEvent::FollowTimerElapsed { epoch } => {
                if epoch == self.follow_epoch && self.follow_timer_armed && self.alive {
                    debug!("Bot {} is now follow-eligible", self.id);
                    self.follow_mouse = true;
                    self.flags.set_follow_mouse(true);
                }
            }
            SessionEvent::ForceCloseElapsed { epoch } => {
                if epoch == self.epoch && self.is_transport_live() {
                    actions.push(SessionAction::Close);
                }
            }
            SessionEvent::FollowSignal(enabled) => {
                if self.alive && self.follow_mouse && self.shared.follow_signals_allowed() {
                    self.send(frames::follow(enabled), &mut actions);
                }
            }
        }
        actions
    }

    fn is_transport_live(&self) -> bool {
        !matches!(
            self.state,
            SessionState::Disconnected | SessionState::Blocked
        )
    }

    fn send(&mut self, frame: Vec<u8>, actions: &mut Vec<SessionAction>) {
        actions.push(SessionAction::Send(self.cipher.encrypt(&frame)));
    }

    fn on_open(&mut self, actions: &mut Vec<SessionAction>) {
        self.send(frames::protocol_version(self.game.protocol_version), actions);
        self.send(frames::client_version(self.game.client_version), actions);
        self.connected = true;
        self.state = SessionState::HandshakeSent;
    }

    fn on_frame(&mut self, bytes: &[u8], actions: &mut Vec<SessionAction>) {
        let plain = self.cipher.decrypt(bytes);
        let frame = match ServerFrame::parse(&plain) {
            Ok(frame) => frame,
            Err(e) => {
                debug!("Bot {} dropped frame: {}", self.id, e);
                self.shared.metrics().record_dropped();
                return;
            }
        };

        match frame {
            ServerFrame::CellAssigned(id) => self.on_cell_assigned(id, actions),
            ServerFrame::AccessBlocked => self.on_blocked(actions),
            ServerFrame::KeyExchange { key, nonce } => {
                self.cipher
                    .install(key, host_fragment(&self.game.server_url), &nonce);
                self.state = SessionState::KeyExchanged;
            }
            ServerFrame::SpawnPrompt => {
                let spawn = frames::spawn(&self.game.bot_name);
                self.send(spawn, actions);
                if !self.alive {
                    self.state = SessionState::SpawnPending;
                }
            }
            ServerFrame::Envelope(InnerFrame::ViewportDelta(delta)) => {
                self.viewport.apply(delta);
                self.check_death(actions);
            }
            ServerFrame::Envelope(InnerFrame::Boundary(rect)) => {
                self.viewport.apply_boundary(&rect);
            }
            ServerFrame::Envelope(InnerFrame::Unknown(_))
            | ServerFrame::Leaderboard(_)
            | ServerFrame::Unknown(_) => {}
        }
    }

    fn on_cell_assigned(&mut self, id: u32, actions: &mut Vec<SessionAction>) {
        self.viewport.assign_cell(id);
        if self.alive {
            return;
        }

        self.alive = true;
        self.state = SessionState::Alive;
        self.flags.set_alive(true);
        self.shared.metrics().bot_became_alive();

        if self.shared.claim_start() {
            actions.push(SessionAction::StartSwarm);
        }
        if !self.follow_timer_armed {
            self.follow_timer_armed = true;
            actions.push(SessionAction::ArmFollowTimer {
                epoch: self.follow_epoch,
                delay: Duration::from_secs(FOLLOW_DWELL_SECS),
            });
        }
    }

    fn on_blocked(&mut self, actions: &mut Vec<SessionAction>) {
        if !self.shared.has_started() {
            actions.push(SessionAction::FatalBlocked);
        }
        warn!("Bot {} was blocked by the server", self.id);
        self.shared.metrics().bots_blocked.fetch_add(1, Ordering::Relaxed);
        self.blocked = true;
        self.state = SessionState::Blocked;
        actions.push(SessionAction::Close);
    }

    fn check_death(&mut self, actions: &mut Vec<SessionAction>) {
        if !self.alive || self.viewport.has_cells() {
            return;
        }

        self.alive = false;
        self.flags.set_alive(false);
        self.shared.metrics().bot_died();
        self.shared.metrics().respawns.fetch_add(1, Ordering::Relaxed);
        if self.follow_timer_armed {
            self.follow_timer_armed = false;
            actions.push(SessionAction::CancelFollowTimer);
        }
        self.follow_epoch += 1;
        self.follow_mouse = false;
        self.flags.set_follow_mouse(false);
        self.state = SessionState::SpawnPending;

        let spawn = frames::spawn(&self.game.bot_name);
        self.send(spawn, actions);
    }

    fn on_error(&mut self, reason: &str, actions: &mut Vec<SessionAction>) {
        debug!("Bot {} transport error: {}", self.id, reason);
        if self.is_transport_live() {
            actions.push(SessionAction::ScheduleForceClose {
                epoch: self.epoch,
                delay: Duration::from_millis(ERROR_CLOSE_DELAY_MS),
            });
        }
    }

    fn on_close(&mut self, actions: &mut Vec<SessionAction>) {
        let was_connected = self.connected;
        actions.push(SessionAction::CancelFollowTimer);
        self.reset();

        if was_connected && !self.blocked {
            info!("Bot {} disconnected, reconnecting", self.id);
            self.shared
                .metrics()
                .reconnects
                .fetch_add(1, Ordering::Relaxed);
            self.state = SessionState::Connecting;
            actions.push(SessionAction::Reconnect);
        }
    }

    fn on_tick(&mut self, actions: &mut Vec<SessionAction>) {
        if !self.alive {
            return;
        }

        let input = PolicyInput {
            viewport: &self.viewport,
            own_name: &self.game.bot_name,
            follow_cursor: self.shared.follow_cursor(self.follow_mouse),
        };
        let Some(steering) = policy::decide(&input, &mut self.rng) else {
            return;
        };

        let frame = frames::move_to(
            steering.target.x,
            steering.target.y,
            self.cipher.decryption_key(),
        );
        self.send(frame, actions);
        self.shared
            .metrics()
            .moves_sent
            .fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::entity::Entity;
    use crate::game::viewport::test_support::encode_delta;
    use crate::metrics::Metrics;
    use crate::protocol::cipher::{derive_encryption_key, transform};
    use crate::protocol::compression::build_envelope;
    use crate::protocol::cursor::FrameBuilder;

    fn game() -> Arc<GameConfig> {
        Arc::new(GameConfig {
            server_url: "wss://live-arena-1abc.agar.io:443".into(),
            protocol_version: 22,
            client_version: 5,
            operator_alive: false,
            bot_name: "swarm".into(),
            bot_count: 1,
        })
    }

    fn shared() -> Arc<SwarmShared> {
        Arc::new(SwarmShared::new(Arc::new(Metrics::new())))
    }

    fn session_with(shared: Arc<SwarmShared>) -> BotSession {
        BotSession::with_rng(1, game(), shared, StdRng::seed_from_u64(9))
    }

    fn open(session: &mut BotSession) {
        session.begin_connect();
        session.handle(SessionEvent::Opened);
    }

    fn cell_frame(id: u32) -> Vec<u8> {
        FrameBuilder::new().write_u8(32).write_u32(id).build()
    }

    fn delta_envelope(upserts: &[Entity], removals: &[u32]) -> Vec<u8> {
        let mut inner = vec![16];
        inner.extend(encode_delta(upserts, removals));
        build_envelope(&inner)
    }

    fn spawn_sends(actions: &[SessionAction]) -> usize {
        actions
            .iter()
            .filter(|a| matches!(a, SessionAction::Send(bytes) if bytes.first() == Some(&0)))
            .count()
    }

    #[test]
    fn test_open_sends_plain_handshake() {
        let mut session = session_with(shared());
        session.begin_connect();
        assert_eq!(session.state(), SessionState::Connecting);

        let actions = session.handle(SessionEvent::Opened);

        assert_eq!(
            actions,
            vec![
                SessionAction::Send(frames::protocol_version(22)),
                SessionAction::Send(frames::client_version(5)),
            ]
        );
        assert_eq!(session.state(), SessionState::HandshakeSent);
    }

    #[test]
    fn test_key_exchange_sets_inbound_key() {
        let mut session = session_with(shared());
        open(&mut session);

        let frame = FrameBuilder::new()
            .write_u8(241)
            .write_i32(7)
            .write_string("abc")
            .build();
        session.handle(SessionEvent::Frame(frame));

        assert_eq!(session.state(), SessionState::KeyExchanged);
        assert_eq!(session.cipher().inbound_key(), 7 ^ 5);
        assert_eq!(
            session.cipher().encryption_key(),
            derive_encryption_key("live-arena-1abc.agar.io", "abc")
        );

        // Later inbound frames are deciphered with 7 ^ 5
        let sealed = transform(&cell_frame(42), 7 ^ 5);
        session.handle(SessionEvent::Frame(sealed));
        assert_eq!(session.viewport().owned_cells(), &[42]);
    }

    #[test]
    fn test_spawn_prompt_sends_encrypted_spawn() {
        let mut session = session_with(shared());
        open(&mut session);
        session.handle(SessionEvent::Frame(
            FrameBuilder::new().write_u8(241).write_i32(7).write_string("abc").build(),
        ));
        let key = session.cipher().encryption_key();

        let actions = session.handle(SessionEvent::Frame(transform(&[242], 7 ^ 5)));

        assert_eq!(
            actions,
            vec![SessionAction::Send(transform(&frames::spawn("swarm"), key))]
        );
        assert_eq!(session.state(), SessionState::SpawnPending);
        assert_ne!(session.cipher().encryption_key(), key);
    }

    #[test]
    fn test_first_cell_starts_swarm_and_arms_timer_once() {
        let shared = shared();
        let mut session = session_with(shared.clone());
        open(&mut session);

        let actions = session.handle(SessionEvent::Frame(cell_frame(42)));

        assert_eq!(session.viewport().owned_cells(), &[42]);
        assert!(session.is_alive());
        assert!(session.flags().is_alive());
        assert!(shared.has_started());
        assert_eq!(
            actions,
            vec![
                SessionAction::StartSwarm,
                SessionAction::ArmFollowTimer {
                    epoch: session.follow_epoch(),
                    delay: Duration::from_secs(18),
                },
            ]
        );

        let actions = session.handle(SessionEvent::Frame(cell_frame(43)));
        assert!(actions.is_empty());
        assert_eq!(session.viewport().owned_cells(), &[42, 43]);
    }

    #[test]
    fn test_second_bot_does_not_restart_swarm() {
        let shared = shared();
        let mut first = session_with(shared.clone());
        let mut second = session_with(shared);
        open(&mut first);
        open(&mut second);

        first.handle(SessionEvent::Frame(cell_frame(1)));
        let actions = second.handle(SessionEvent::Frame(cell_frame(2)));

        assert!(!actions.contains(&SessionAction::StartSwarm));
        assert!(matches!(actions[0], SessionAction::ArmFollowTimer { .. }));
    }

    #[test]
    fn test_remove_unknown_id_in_envelope_is_noop() {
        let mut session = session_with(shared());
        open(&mut session);
        session.handle(SessionEvent::Frame(cell_frame(42)));
        session.handle(SessionEvent::Frame(delta_envelope(
            &[Entity { id: 42, size: 30, ..Default::default() }],
            &[],
        )));

        let actions = session.handle(SessionEvent::Frame(delta_envelope(&[], &[777])));

        assert!(actions.is_empty());
        assert!(session.is_alive());
        assert_eq!(session.viewport().len(), 1);
    }

    #[test]
    fn test_losing_last_cell_respawns_once() {
        let mut session = session_with(shared());
        open(&mut session);
        session.handle(SessionEvent::Frame(cell_frame(42)));
        let epoch = session.follow_epoch();
        session.handle(SessionEvent::FollowTimerElapsed { epoch });
        assert!(session.follow_mouse());

        let actions = session.handle(SessionEvent::Frame(delta_envelope(&[], &[42])));

        assert!(!session.is_alive());
        assert!(!session.follow_mouse());
        assert!(!session.flags().follow_mouse());
        assert_eq!(session.state(), SessionState::SpawnPending);
        assert!(actions.contains(&SessionAction::CancelFollowTimer));
        assert_eq!(spawn_sends(&actions), 1);

        // A second empty delta does not respawn again
        let actions = session.handle(SessionEvent::Frame(delta_envelope(&[], &[42])));
        assert_eq!(spawn_sends(&actions), 0);
    }

    #[test]
    fn test_follow_timer_ignored_while_dead() {
        let mut session = session_with(shared());
        open(&mut session);
        session.handle(SessionEvent::Frame(cell_frame(1)));
        let stale = session.follow_epoch();
        session.handle(SessionEvent::Frame(delta_envelope(&[], &[1])));

        session.handle(SessionEvent::FollowTimerElapsed { epoch: stale });
        assert!(!session.follow_mouse());
    }

    #[test]
    fn test_stale_follow_timer_cannot_skip_dwell_after_respawn() {
        let mut session = session_with(shared());
        open(&mut session);
        session.handle(SessionEvent::Frame(cell_frame(1)));
        let stale = session.follow_epoch();
        session.handle(SessionEvent::Frame(delta_envelope(&[], &[1])));

        // Respawn re-arms the timer under a new epoch
        let actions = session.handle(SessionEvent::Frame(cell_frame(2)));
        let fresh = session.follow_epoch();
        assert_ne!(fresh, stale);
        assert_eq!(
            actions,
            vec![SessionAction::ArmFollowTimer {
                epoch: fresh,
                delay: Duration::from_secs(18),
            }]
        );

        // Fired before the cancel landed, delivered after the respawn
        session.handle(SessionEvent::FollowTimerElapsed { epoch: stale });
        assert!(!session.follow_mouse());
        assert!(!session.flags().follow_mouse());

        session.handle(SessionEvent::FollowTimerElapsed { epoch: fresh });
        assert!(session.follow_mouse());
    }

    #[test]
    fn test_blocked_before_start_is_fatal() {
        let mut session = session_with(shared());
        open(&mut session);

        let actions = session.handle(SessionEvent::Frame(vec![85]));

        assert_eq!(actions, vec![SessionAction::FatalBlocked, SessionAction::Close]);
        assert_eq!(session.state(), SessionState::Blocked);

        // Never reconnects
        let actions = session.handle(SessionEvent::Closed);
        assert!(!actions.contains(&SessionAction::Reconnect));
        assert_eq!(session.state(), SessionState::Blocked);
    }

    #[test]
    fn test_blocked_after_start_retires_session_only() {
        let shared = shared();
        let mut other = session_with(shared.clone());
        open(&mut other);
        other.handle(SessionEvent::Frame(cell_frame(1)));

        let mut session = session_with(shared);
        open(&mut session);
        let actions = session.handle(SessionEvent::Frame(vec![85]));

        assert_eq!(actions, vec![SessionAction::Close]);
        assert!(session.is_blocked());
    }

    #[test]
    fn test_close_after_connect_resets_and_reconnects() {
        let mut session = session_with(shared());
        open(&mut session);
        session.handle(SessionEvent::Frame(
            FrameBuilder::new().write_u8(241).write_i32(7).write_string("abc").build(),
        ));
        session.handle(SessionEvent::Frame(transform(&cell_frame(42), 7 ^ 5)));
        let epoch = session.epoch();

        let actions = session.handle(SessionEvent::Closed);

        assert_eq!(
            actions,
            vec![SessionAction::CancelFollowTimer, SessionAction::Reconnect]
        );
        assert_eq!(session.state(), SessionState::Connecting);
        assert_eq!(session.epoch(), epoch + 1);
        assert!(!session.is_alive());
        assert!(session.viewport().owned_cells().is_empty());
        assert_eq!(session.cipher().encryption_key(), 0);
    }

    #[test]
    fn test_close_before_open_does_not_reconnect() {
        let mut session = session_with(shared());
        session.begin_connect();
        let actions = session.handle(SessionEvent::Closed);
        assert!(!actions.contains(&SessionAction::Reconnect));
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    #[test]
    fn test_error_schedules_debounced_close() {
        let mut session = session_with(shared());
        open(&mut session);
        let epoch = session.epoch();

        let actions = session.handle(SessionEvent::Errored("reset".into()));
        assert_eq!(
            actions,
            vec![SessionAction::ScheduleForceClose {
                epoch,
                delay: Duration::from_secs(1),
            }]
        );

        let actions = session.handle(SessionEvent::ForceCloseElapsed { epoch });
        assert_eq!(actions, vec![SessionAction::Close]);

        // A timer from an older connection does nothing
        session.handle(SessionEvent::Closed);
        session.begin_connect();
        let actions = session.handle(SessionEvent::ForceCloseElapsed { epoch });
        assert!(actions.is_empty());
    }

    #[test]
    fn test_malformed_frame_is_dropped() {
        let shared = shared();
        let mut session = session_with(shared.clone());
        open(&mut session);

        let actions = session.handle(SessionEvent::Frame(vec![32, 1]));
        assert!(actions.is_empty());
        assert!(!session.is_alive());

        let mut envelope = delta_envelope(&[], &[]);
        envelope.truncate(envelope.len() - 1);
        session.handle(SessionEvent::Frame(envelope));

        assert_eq!(shared.metrics().frames_dropped.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_boundary_sets_offset() {
        let mut session = session_with(shared());
        open(&mut session);
        let inner = FrameBuilder::new()
            .write_u8(64)
            .write_f64(-7071.0)
            .write_f64(-7071.0)
            .write_f64(7071.0)
            .write_f64(7071.0)
            .build();
        session.handle(SessionEvent::Frame(build_envelope(&inner)));
        assert_eq!(session.viewport().offset(), crate::util::vec2::Vec2::ZERO);

        let inner = FrameBuilder::new()
            .write_u8(64)
            .write_f64(0.0)
            .write_f64(0.0)
            .write_f64(14142.0)
            .write_f64(14142.0)
            .build();
        session.handle(SessionEvent::Frame(build_envelope(&inner)));
        assert_eq!(
            session.viewport().offset(),
            crate::util::vec2::Vec2::new(7071.0, 7071.0)
        );
    }

    #[test]
    fn test_tick_sends_move_only_when_alive() {
        let mut session = session_with(shared());
        open(&mut session);
        assert!(session.handle(SessionEvent::Tick).is_empty());

        session.handle(SessionEvent::Frame(cell_frame(1)));
        session.handle(SessionEvent::Frame(delta_envelope(
            &[
                Entity { id: 1, size: 50, ..Default::default() },
                Entity { id: 2, x: 30, y: 40, size: 5, is_pellet: true, ..Default::default() },
            ],
            &[],
        )));

        let actions = session.handle(SessionEvent::Tick);
        assert_eq!(actions, vec![SessionAction::Send(frames::move_to(30.0, 40.0, 0))]);
    }

    #[test]
    fn test_follow_signal_requires_eligibility() {
        let mut session = session_with(shared());
        open(&mut session);
        session.handle(SessionEvent::Frame(cell_frame(1)));

        assert!(session.handle(SessionEvent::FollowSignal(true)).is_empty());

        let epoch = session.follow_epoch();
        session.handle(SessionEvent::FollowTimerElapsed { epoch });
        assert_eq!(
            session.handle(SessionEvent::FollowSignal(true)),
            vec![SessionAction::Send(frames::follow(true))]
        );
    }
}
