//! WebSocket transport drivers
//!
//! Each driver owns one connection and feeds transport events into a pure
//! session, carrying out the actions it returns.

use std::sync::Arc;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use crate::metrics::Metrics;
use crate::net::probe::ProbeSession;
use crate::net::session::{BotSession, SessionAction, SessionEvent};
use crate::net::timer::Timer;
use crate::swarm::Swarm;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Items for the per-connection writer task
#[derive(Debug)]
enum Outgoing {
    Frame(Vec<u8>),
    Close,
}

/// Open a WebSocket to the game server presenting `origin`
pub async fn connect(url: &str, origin: &str) -> anyhow::Result<WsStream> {
    let mut request = url.into_client_request()?;
    request
        .headers_mut()
        .insert("Origin", HeaderValue::from_str(origin)?);
    let (stream, _) = connect_async(request).await?;
    Ok(stream)
}

async fn write_loop(
    mut sink: SplitSink<WsStream, Message>,
    mut outgoing: UnboundedReceiver<Outgoing>,
    metrics: Arc<Metrics>,
) {
    while let Some(item) = outgoing.recv().await {
        match item {
            Outgoing::Frame(bytes) => {
                let len = bytes.len();
                if let Err(e) = sink.send(Message::Binary(bytes.into())).await {
                    debug!("Write failed: {}", e);
                    break;
                }
                metrics.record_sent(len);
            }
            Outgoing::Close => {
                let _ = sink.close().await;
                break;
            }
        }
    }
}

/// Timers owned by one bot driver
#[derive(Debug, Default)]
struct SessionTimers {
    follow: Timer,
    force_close: Timer,
}

impl SessionTimers {
    fn cancel_all(&mut self) {
        self.follow.cancel();
        self.force_close.cancel();
    }
}

/// What the driver must do after a batch of actions
#[derive(Debug, Default, Clone, Copy)]
struct Flow {
    close: bool,
    reconnect: bool,
}

fn apply_actions(
    actions: Vec<SessionAction>,
    writer: &UnboundedSender<Outgoing>,
    inbox: &UnboundedSender<SessionEvent>,
    timers: &mut SessionTimers,
    swarm: &Arc<Swarm>,
) -> Flow {
    let mut flow = Flow::default();
    for action in actions {
        match action {
            SessionAction::Send(bytes) => {
                let _ = writer.send(Outgoing::Frame(bytes));
            }
            SessionAction::Close => flow.close = true,
            SessionAction::ArmFollowTimer { epoch, delay } => {
                timers.follow.schedule(
                    delay,
                    inbox.clone(),
                    SessionEvent::FollowTimerElapsed { epoch },
                );
            }
            SessionAction::CancelFollowTimer => timers.follow.cancel(),
            SessionAction::ScheduleForceClose { epoch, delay } => {
                timers.force_close.schedule(
                    delay,
                    inbox.clone(),
                    SessionEvent::ForceCloseElapsed { epoch },
                );
            }
            SessionAction::Reconnect => flow.reconnect = true,
            SessionAction::StartSwarm => swarm.on_bots_started(),
            SessionAction::FatalBlocked => swarm.on_startup_blocked(),
        }
    }
    flow
}

/// Drive one bot until it is blocked or cannot connect
pub async fn run_bot(
    mut session: BotSession,
    inbox_tx: UnboundedSender<SessionEvent>,
    mut inbox: UnboundedReceiver<SessionEvent>,
    swarm: Arc<Swarm>,
) {
    let id = session.id();
    let url = session.game().server_url.clone();
    let metrics = swarm.shared().metrics().clone();
    let mut timers = SessionTimers::default();

    loop {
        session.begin_connect();
        let stream = match connect(&url, swarm.origin()).await {
            Ok(stream) => stream,
            Err(e) => {
                warn!("Bot {} failed to connect: {}", id, e);
                break;
            }
        };

        let (sink, mut source) = stream.split();
        let (writer_tx, writer_rx) = mpsc::unbounded_channel();
        let writer = tokio::spawn(write_loop(sink, writer_rx, metrics.clone()));

        let actions = session.handle(SessionEvent::Opened);
        let mut flow = apply_actions(actions, &writer_tx, &inbox_tx, &mut timers, &swarm);

        while !flow.close {
            let event = tokio::select! {
                message = source.next() => match message {
                    Some(Ok(Message::Binary(data))) => {
                        metrics.record_received(data.len());
                        SessionEvent::Frame(data.to_vec())
                    }
                    Some(Ok(Message::Close(_))) | None => SessionEvent::Closed,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        // Read errors are terminal; the close below supersedes the debounced close
                        let actions = session.handle(SessionEvent::Errored(e.to_string()));
                        apply_actions(actions, &writer_tx, &inbox_tx, &mut timers, &swarm);
                        SessionEvent::Closed
                    }
                },
                Some(event) = inbox.recv() => event,
            };

            let closed = event == SessionEvent::Closed;
            let actions = session.handle(event);
            flow = apply_actions(actions, &writer_tx, &inbox_tx, &mut timers, &swarm);
            if closed {
                break;
            }
        }

        // A session-initiated close still needs its close handling
        if flow.close {
            let _ = writer_tx.send(Outgoing::Close);
            let actions = session.handle(SessionEvent::Closed);
            flow = apply_actions(actions, &writer_tx, &inbox_tx, &mut timers, &swarm);
        }

        timers.cancel_all();
        drop(writer_tx);
        let _ = writer.await;

        if !flow.reconnect {
            break;
        }
    }

    debug!("Bot {} driver finished", id);
}

/// Drive the occupancy probe for a single connection
pub async fn run_probe(mut probe: ProbeSession, origin: String, metrics: Arc<Metrics>) {
    let url = probe.server_url().to_string();
    let stream = match connect(&url, &origin).await {
        Ok(stream) => stream,
        Err(e) => {
            warn!("Probe failed to connect: {}", e);
            return;
        }
    };

    let (sink, mut source) = stream.split();
    let (writer_tx, writer_rx) = mpsc::unbounded_channel();
    let writer = tokio::spawn(write_loop(sink, writer_rx, metrics.clone()));

    for frame in probe.handle(SessionEvent::Opened) {
        let _ = writer_tx.send(Outgoing::Frame(frame));
    }

    while let Some(message) = source.next().await {
        match message {
            Ok(Message::Binary(data)) => {
                metrics.record_received(data.len());
                probe.handle(SessionEvent::Frame(data.to_vec()));
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!("Probe read error: {}", e);
                break;
            }
        }
    }

    probe.handle(SessionEvent::Closed);
    drop(writer_tx);
    let _ = writer.await;
}
