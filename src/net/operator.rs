//! Operator control link
//!
//! A WebSocket server accepting the operator's binary command frames and
//! relaying single-byte status signals back.

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::config::GameConfig;
use crate::protocol::constants::operator as op;
use crate::protocol::cursor::{ByteCursor, CursorError};
use crate::swarm::Swarm;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OperatorError {
    #[error("Empty command")]
    Empty,
    #[error("Unknown operator opcode {0}")]
    UnknownOpcode(u8),
    #[error("Truncated command: {0}")]
    Truncated(#[from] CursorError),
}

/// Decoded operator command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorCommand {
    Start(GameConfig),
    Stop,
    FollowOn,
    FollowOff,
    SetAi(bool),
    SetAlive(bool),
    Mouse { x: i32, y: i32 },
}

impl OperatorCommand {
    pub fn parse(frame: &[u8]) -> Result<Self, OperatorError> {
        let mut cursor = ByteCursor::new(frame);
        let opcode = cursor.read_u8().map_err(|_| OperatorError::Empty)?;

        let command = match opcode {
            op::START => Self::Start(GameConfig {
                server_url: cursor.read_string()?,
                protocol_version: cursor.read_u32()?,
                client_version: cursor.read_u32()?,
                operator_alive: cursor.read_u8()? != 0,
                bot_name: cursor.read_string()?,
                bot_count: cursor.read_u8()?,
            }),
            op::STOP => Self::Stop,
            op::FOLLOW_ON => Self::FollowOn,
            op::FOLLOW_OFF => Self::FollowOff,
            op::SET_AI => Self::SetAi(cursor.read_u8()? != 0),
            op::SET_ALIVE => Self::SetAlive(cursor.read_u8()? != 0),
            op::MOUSE => Self::Mouse {
                x: cursor.read_i32()?,
                y: cursor.read_i32()?,
            },
            other => return Err(OperatorError::UnknownOpcode(other)),
        };
        Ok(command)
    }
}

/// Accept operator connections until the process exits
pub async fn run_operator_server(swarm: Arc<Swarm>, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Operator link listening on ws://{}", addr);
    info!("Awaiting operator connection...");

    loop {
        let (socket, peer) = listener.accept().await?;
        let swarm = swarm.clone();

        tokio::spawn(async move {
            if let Err(e) = handle_operator(socket, peer, swarm).await {
                warn!("Operator connection error: {}", e);
            }
        });
    }
}

async fn handle_operator(socket: TcpStream, peer: SocketAddr, swarm: Arc<Swarm>) -> anyhow::Result<()> {
    let stream = tokio_tungstenite::accept_async(socket).await?;
    info!("Operator connected from {}", peer);

    let (mut sink, mut source) = stream.split();
    let (signal_tx, mut signal_rx) = mpsc::unbounded_channel::<u8>();
    swarm.attach_operator(signal_tx);

    let writer = tokio::spawn(async move {
        while let Some(signal) = signal_rx.recv().await {
            if let Err(e) = sink.send(Message::Binary(vec![signal].into())).await {
                debug!("Failed to signal operator: {}", e);
                break;
            }
        }
    });

    while let Some(message) = source.next().await {
        let data = match message {
            Ok(Message::Binary(data)) => data,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                debug!("Operator read error: {}", e);
                break;
            }
        };

        match OperatorCommand::parse(&data) {
            Ok(command) => swarm.handle_command(command),
            Err(e) => debug!("Ignoring operator frame: {}", e),
        }
    }

    swarm.detach_operator();
    writer.abort();
    info!("Operator disconnected");

    // Leaving after start winds the swarm down silently
    swarm.begin_shutdown(false);
    Ok(())
}
