//! Swarm coordinator
//!
//! Owns the bot handles, the operator's state and the process lifecycle:
//! ramp-up, the shared movement tick and the shutdown countdown.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::sync::{watch, RwLock as AsyncRwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::{GameConfig, SwarmConfig};
use crate::metrics::Metrics;
use crate::net::operator::OperatorCommand;
use crate::net::probe::ProbeSession;
use crate::net::session::{BotSession, SessionEvent, SessionFlags};
use crate::net::transport;
use crate::protocol::constants::operator::*;
use crate::protocol::constants::policy::TICK_INTERVAL_MS;
use crate::protocol::constants::session::EXIT_GRACE_MS;
use crate::util::vec2::Vec2;

/// Latest values reported by the operator
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OperatorState {
    pub alive: bool,
    pub cursor: Vec2,
    pub ai_override: bool,
}

/// State every session reads
#[derive(Debug)]
pub struct SwarmShared {
    operator: RwLock<OperatorState>,
    started: AtomicBool,
    stopping: AtomicBool,
    metrics: Arc<Metrics>,
}

impl SwarmShared {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self {
            operator: RwLock::new(OperatorState::default()),
            started: AtomicBool::new(false),
            stopping: AtomicBool::new(false),
            metrics,
        }
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// True for exactly one caller: the first bot to become alive
    pub fn claim_start(&self) -> bool {
        self.started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn has_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    pub fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::Acquire)
    }

    /// Returns false if the swarm was already stopping
    pub fn begin_stopping(&self) -> bool {
        !self.stopping.swap(true, Ordering::AcqRel)
    }

    pub fn operator(&self) -> OperatorState {
        *self.operator.read()
    }

    pub fn set_operator_alive(&self, alive: bool) {
        self.operator.write().alive = alive;
    }

    pub fn set_ai_override(&self, enabled: bool) {
        self.operator.write().ai_override = enabled;
    }

    pub fn set_cursor(&self, x: i32, y: i32) {
        self.operator.write().cursor = Vec2::new(f64::from(x), f64::from(y));
    }

    /// Operator cursor if a bot with this eligibility should follow it now
    pub fn follow_cursor(&self, follow_mouse: bool) -> Option<Vec2> {
        if !follow_mouse || !self.follow_signals_allowed() {
            return None;
        }
        let operator = self.operator();
        operator.alive.then_some(operator.cursor)
    }

    pub fn follow_signals_allowed(&self) -> bool {
        !self.is_stopping() && !self.operator.read().ai_override
    }
}

/// Why the process is exiting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// Operator stop command, countdown finished
    Stopped,
    /// Operator left after start, countdown finished
    OperatorLeft,
    /// Access blocked before any bot started
    StartupBlocked,
}

/// Coordinator's view of one bot task
#[derive(Debug)]
pub struct BotHandle {
    id: usize,
    inbox: UnboundedSender<SessionEvent>,
    flags: Arc<SessionFlags>,
}

impl BotHandle {
    pub fn new(id: usize, inbox: UnboundedSender<SessionEvent>, flags: Arc<SessionFlags>) -> Self {
        Self { id, inbox, flags }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn is_alive(&self) -> bool {
        self.flags.is_alive()
    }

    /// Fire-and-forget; false once the bot task has ended
    pub fn deliver(&self, event: SessionEvent) -> bool {
        self.inbox.send(event).is_ok()
    }
}

pub struct Swarm {
    config: SwarmConfig,
    shared: Arc<SwarmShared>,
    game: OnceLock<Arc<GameConfig>>,
    bots: AsyncRwLock<Vec<BotHandle>>,
    occupancy: Arc<AtomicUsize>,
    operator_tx: Mutex<Option<UnboundedSender<u8>>>,
    tick_task: Mutex<Option<JoinHandle<()>>>,
    shutdown: watch::Sender<Option<ShutdownReason>>,
}

impl Swarm {
    pub fn new(config: SwarmConfig, metrics: Arc<Metrics>) -> Self {
        let (shutdown, _) = watch::channel(None);
        Self {
            config,
            shared: Arc::new(SwarmShared::new(metrics)),
            game: OnceLock::new(),
            bots: AsyncRwLock::new(Vec::new()),
            occupancy: Arc::new(AtomicUsize::new(0)),
            operator_tx: Mutex::new(None),
            tick_task: Mutex::new(None),
            shutdown,
        }
    }

    pub fn shared(&self) -> &Arc<SwarmShared> {
        &self.shared
    }

    pub fn origin(&self) -> &str {
        &self.config.origin
    }

    pub fn game(&self) -> Option<&Arc<GameConfig>> {
        self.game.get()
    }

    pub fn occupancy(&self) -> usize {
        self.occupancy.load(Ordering::Acquire)
    }

    pub fn subscribe_shutdown(&self) -> watch::Receiver<Option<ShutdownReason>> {
        self.shutdown.subscribe()
    }

    pub fn attach_operator(&self, signals: UnboundedSender<u8>) {
        *self.operator_tx.lock() = Some(signals);
    }

    pub fn detach_operator(&self) {
        self.operator_tx.lock().take();
    }

    fn signal_operator(&self, signal: u8) {
        if let Some(tx) = self.operator_tx.lock().as_ref() {
            let _ = tx.send(signal);
        }
    }

    pub fn handle_command(self: &Arc<Self>, command: OperatorCommand) {
        match command {
            OperatorCommand::Start(game) => {
                self.start(game);
            }
            OperatorCommand::Stop => {
                self.begin_shutdown(true);
            }
            OperatorCommand::FollowOn => self.broadcast_follow(true),
            OperatorCommand::FollowOff => self.broadcast_follow(false),
            OperatorCommand::SetAi(enabled) => self.shared.set_ai_override(enabled),
            OperatorCommand::SetAlive(alive) => self.shared.set_operator_alive(alive),
            OperatorCommand::Mouse { x, y } => self.shared.set_cursor(x, y),
        }
    }

    /// Start the probe and ramp up bots; only the first call has any effect
    pub fn start(self: &Arc<Self>, game: GameConfig) -> bool {
        let game = Arc::new(game);
        if self.game.set(game.clone()).is_err() {
            debug!("Ignoring repeated start command");
            return false;
        }

        self.shared.set_operator_alive(game.operator_alive);
        info!(
            "Starting {} bots against {} as '{}'",
            game.bot_count, game.server_url, game.bot_name
        );

        let probe = ProbeSession::new(
            game.clone(),
            self.occupancy.clone(),
            self.shared.metrics().clone(),
        );
        tokio::spawn(transport::run_probe(
            probe,
            self.config.origin.clone(),
            self.shared.metrics().clone(),
        ));

        let swarm = self.clone();
        tokio::spawn(async move {
            let mut ticker = interval(swarm.config.ramp_interval);
            let mut index = 0usize;
            loop {
                ticker.tick().await;
                if !swarm.should_launch(index, game.bot_count) {
                    break;
                }
                swarm.spawn_bot(index, game.clone()).await;
                index += 1;
            }
            info!("Ramp-up finished with {} bots", index);
        });

        true
    }

    /// Ramp-up continues while the server has room and the swarm is running
    pub fn should_launch(&self, index: usize, bot_count: u8) -> bool {
        self.occupancy() < self.config.max_occupancy
            && index < usize::from(bot_count)
            && !self.shared.is_stopping()
    }

    async fn spawn_bot(self: &Arc<Self>, id: usize, game: Arc<GameConfig>) {
        let session = BotSession::new(id, game, self.shared.clone());
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        self.register(BotHandle::new(id, inbox_tx.clone(), session.flags()))
            .await;
        self.shared
            .metrics()
            .bots_spawned
            .fetch_add(1, Ordering::Relaxed);
        tokio::spawn(transport::run_bot(session, inbox_tx, inbox_rx, self.clone()));
    }

    pub async fn register(&self, handle: BotHandle) {
        self.bots.write().await.push(handle);
    }

    /// First bot alive: start the movement tick and tell the operator
    pub fn on_bots_started(self: &Arc<Self>) {
        let mut tick_task = self.tick_task.lock();
        if tick_task.is_some() {
            return;
        }

        let swarm = self.clone();
        *tick_task = Some(tokio::spawn(async move {
            let mut ticker = interval(Duration::from_millis(TICK_INTERVAL_MS));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                swarm.tick().await;
            }
        }));

        info!("Bots started");
        self.signal_operator(SIGNAL_STARTED);
    }

    /// Blocked before any bot started: fail the run
    pub fn on_startup_blocked(self: &Arc<Self>) {
        warn!("Access blocked before any bot started, exiting");
        self.signal_operator(SIGNAL_START_FAILED);

        let swarm = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(EXIT_GRACE_MS)).await;
            swarm.shutdown.send_replace(Some(ShutdownReason::StartupBlocked));
        });
    }

    /// Push a tick to every alive bot; returns how many were ticked
    pub async fn tick(&self) -> usize {
        self.shared.metrics().ticks.fetch_add(1, Ordering::Relaxed);
        let bots = self.bots.read().await;
        bots.iter()
            .filter(|bot| bot.is_alive())
            .filter(|bot| bot.deliver(SessionEvent::Tick))
            .count()
    }

    /// Relay a follow-mode signal to alive, follow-eligible bots
    pub fn broadcast_follow(self: &Arc<Self>, enabled: bool) {
        if !self.shared.follow_signals_allowed() {
            return;
        }
        let swarm = self.clone();
        tokio::spawn(async move {
            let bots = swarm.bots.read().await;
            for bot in bots.iter().filter(|bot| bot.is_alive() && bot.flags.follow_mouse()) {
                bot.deliver(SessionEvent::FollowSignal(enabled));
            }
        });
    }

    /// Begin the shutdown countdown
    ///
    /// Has no effect before bots started or once already stopping. With
    /// `notify`, the operator hears `1` now and `2` when the countdown ends.
    pub fn begin_shutdown(self: &Arc<Self>, notify: bool) -> bool {
        if !self.shared.has_started() || !self.shared.begin_stopping() {
            return false;
        }
        if notify {
            self.signal_operator(SIGNAL_STOPPING);
        }

        let swarm = self.clone();
        tokio::spawn(async move {
            for remaining in (1..=swarm.config.shutdown_countdown_secs).rev() {
                info!("Stopping bots in {} seconds", remaining);
                tokio::time::sleep(Duration::from_secs(1)).await;
            }

            let reason = if notify {
                swarm.signal_operator(SIGNAL_STOPPED);
                tokio::time::sleep(Duration::from_millis(EXIT_GRACE_MS)).await;
                ShutdownReason::Stopped
            } else {
                ShutdownReason::OperatorLeft
            };
            swarm.shutdown.send_replace(Some(reason));
        });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::cursor::FrameBuilder;

    fn swarm_with(config: SwarmConfig) -> Arc<Swarm> {
        Arc::new(Swarm::new(config, Arc::new(Metrics::new())))
    }

    fn game() -> Arc<GameConfig> {
        Arc::new(GameConfig {
            server_url: "wss://live-arena-1abc.agar.io:443".into(),
            protocol_version: 22,
            client_version: 5,
            operator_alive: true,
            bot_name: "swarm".into(),
            bot_count: 3,
        })
    }

    /// Handle backed by a real session's flags, plus its inbox
    fn bot_handle(
        swarm: &Arc<Swarm>,
        id: usize,
        alive: bool,
        follow: bool,
    ) -> (BotHandle, mpsc::UnboundedReceiver<SessionEvent>) {
        let mut session = BotSession::new(id, game(), swarm.shared().clone());
        session.begin_connect();
        session.handle(SessionEvent::Opened);
        if alive {
            let frame = FrameBuilder::new().write_u8(32).write_u32(id as u32).build();
            session.handle(SessionEvent::Frame(frame));
        }
        if follow {
            let epoch = session.follow_epoch();
            session.handle(SessionEvent::FollowTimerElapsed { epoch });
        }
        let (tx, rx) = mpsc::unbounded_channel();
        (BotHandle::new(id, tx, session.flags()), rx)
    }

    #[test]
    fn test_claim_start_once() {
        let shared = SwarmShared::new(Arc::new(Metrics::new()));
        assert!(!shared.has_started());
        assert!(shared.claim_start());
        assert!(!shared.claim_start());
        assert!(shared.has_started());
    }

    #[test]
    fn test_follow_cursor_gating() {
        let shared = SwarmShared::new(Arc::new(Metrics::new()));
        shared.set_cursor(10, -20);

        // Operator not alive
        assert_eq!(shared.follow_cursor(true), None);

        shared.set_operator_alive(true);
        assert_eq!(shared.follow_cursor(true), Some(Vec2::new(10.0, -20.0)));
        assert_eq!(shared.follow_cursor(false), None);

        shared.set_ai_override(true);
        assert_eq!(shared.follow_cursor(true), None);
        assert!(!shared.follow_signals_allowed());

        shared.set_ai_override(false);
        assert!(shared.begin_stopping());
        assert!(!shared.begin_stopping());
        assert_eq!(shared.follow_cursor(true), None);
    }

    #[test]
    fn test_should_launch_limits() {
        let swarm = swarm_with(SwarmConfig::default());
        assert!(swarm.should_launch(0, 3));
        assert!(!swarm.should_launch(3, 3));

        swarm.occupancy.store(199, Ordering::Release);
        assert!(!swarm.should_launch(0, 3));

        swarm.occupancy.store(10, Ordering::Release);
        swarm.shared().begin_stopping();
        assert!(!swarm.should_launch(0, 3));
    }

    #[tokio::test]
    async fn test_tick_reaches_only_alive_bots() {
        let swarm = swarm_with(SwarmConfig::default());
        let (alive, mut alive_rx) = bot_handle(&swarm, 1, true, false);
        let (dead, mut dead_rx) = bot_handle(&swarm, 2, false, false);
        swarm.register(alive).await;
        swarm.register(dead).await;

        assert_eq!(swarm.tick().await, 1);
        assert_eq!(alive_rx.try_recv(), Ok(SessionEvent::Tick));
        assert!(dead_rx.try_recv().is_err());
        assert_eq!(swarm.shared().metrics().ticks.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_tick_skips_finished_bot() {
        let swarm = swarm_with(SwarmConfig::default());
        let (handle, rx) = bot_handle(&swarm, 1, true, false);
        swarm.register(handle).await;
        drop(rx);

        assert_eq!(swarm.tick().await, 0);
        assert_eq!(swarm.bots.read().await.len(), 1);
    }

    #[tokio::test]
    async fn test_bots_started_signals_operator() {
        let swarm = swarm_with(SwarmConfig::default());
        let (tx, mut rx) = mpsc::unbounded_channel();
        swarm.attach_operator(tx);

        swarm.on_bots_started();
        swarm.on_bots_started();

        assert_eq!(rx.recv().await, Some(SIGNAL_STARTED));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_shutdown_requires_start() {
        let swarm = swarm_with(SwarmConfig::default());
        assert!(!swarm.begin_shutdown(true));
        assert!(!swarm.shared().is_stopping());
    }

    #[tokio::test]
    async fn test_operator_leaving_winds_down_silently() {
        let swarm = swarm_with(SwarmConfig {
            shutdown_countdown_secs: 0,
            ..Default::default()
        });
        let (tx, mut signals) = mpsc::unbounded_channel();
        swarm.attach_operator(tx);
        swarm.shared().claim_start();
        let mut shutdown = swarm.subscribe_shutdown();

        assert!(swarm.begin_shutdown(false));
        assert!(!swarm.begin_shutdown(true));

        shutdown.changed().await.unwrap();
        assert_eq!(*shutdown.borrow(), Some(ShutdownReason::OperatorLeft));
        assert!(signals.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_stop_command_signals_operator() {
        let swarm = swarm_with(SwarmConfig {
            shutdown_countdown_secs: 0,
            ..Default::default()
        });
        let (tx, mut signals) = mpsc::unbounded_channel();
        swarm.attach_operator(tx);
        swarm.shared().claim_start();

        swarm.handle_command(OperatorCommand::Stop);

        assert_eq!(signals.recv().await, Some(SIGNAL_STOPPING));
        assert_eq!(signals.recv().await, Some(SIGNAL_STOPPED));
        assert!(swarm.shared().is_stopping());
    }

    #[tokio::test]
    async fn test_operator_state_commands() {
        let swarm = swarm_with(SwarmConfig::default());
        swarm.handle_command(OperatorCommand::SetAlive(true));
        swarm.handle_command(OperatorCommand::SetAi(true));
        swarm.handle_command(OperatorCommand::Mouse { x: 5, y: 6 });

        assert_eq!(
            swarm.shared().operator(),
            OperatorState {
                alive: true,
                cursor: Vec2::new(5.0, 6.0),
                ai_override: true,
            }
        );
    }

    #[tokio::test]
    async fn test_follow_broadcast_reaches_eligible_bots() {
        let swarm = swarm_with(SwarmConfig::default());
        let (waiting, mut waiting_rx) = bot_handle(&swarm, 1, true, false);
        let (eligible, mut eligible_rx) = bot_handle(&swarm, 2, true, true);
        swarm.register(waiting).await;
        swarm.register(eligible).await;

        swarm.broadcast_follow(true);

        assert_eq!(eligible_rx.recv().await, Some(SessionEvent::FollowSignal(true)));
        assert!(waiting_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_follow_broadcast_suppressed_by_ai_override() {
        let swarm = swarm_with(SwarmConfig::default());
        let (eligible, mut rx) = bot_handle(&swarm, 1, true, true);
        swarm.register(eligible).await;
        swarm.shared().set_ai_override(true);

        swarm.broadcast_follow(false);
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(rx.try_recv().is_err());
    }
}
