//! Typed game-server frames
//!
//! Inbound frames are parsed after decryption. Outbound builders produce
//! plaintext; the session cipher is applied by the caller.

use crate::game::viewport::{BoundaryRect, ViewportDelta};
use crate::protocol::compression::{decompress_envelope, DecompressionError};
use crate::protocol::constants::opcode;
use crate::protocol::cursor::{ByteCursor, CursorError, FrameBuilder};

/// Errors that cause an inbound frame to be dropped
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("Empty frame")]
    Empty,
    #[error("Malformed frame: {0}")]
    Cursor(#[from] CursorError),
    #[error("Bad envelope: {0}")]
    Decompression(#[from] DecompressionError),
}

/// Frames sent by the game server
#[derive(Debug, Clone, PartialEq)]
pub enum ServerFrame {
    CellAssigned(u32),
    AccessBlocked,
    KeyExchange { key: i32, nonce: String },
    SpawnPrompt,
    /// Leaderboard entry count (occupancy)
    Leaderboard(usize),
    Envelope(InnerFrame),
    Unknown(u8),
}

/// Frames carried inside a compressed envelope
#[derive(Debug, Clone, PartialEq)]
pub enum InnerFrame {
    ViewportDelta(ViewportDelta),
    Boundary(BoundaryRect),
    Unknown(u8),
}

impl ServerFrame {
    pub fn parse(frame: &[u8]) -> Result<Self, FrameError> {
        let mut cursor = ByteCursor::new(frame);
        let op = cursor.read_u8().map_err(|_| FrameError::Empty)?;

        let parsed = match op {
            opcode::CELL_ASSIGNED => Self::CellAssigned(cursor.read_u32()?),
            opcode::ACCESS_BLOCKED => Self::AccessBlocked,
            opcode::KEY_EXCHANGE => Self::KeyExchange {
                key: cursor.read_i32()?,
                nonce: cursor.read_string()?,
            },
            opcode::SPAWN_PROMPT => Self::SpawnPrompt,
            opcode::LEADERBOARD => Self::Leaderboard(count_leaderboard(&mut cursor)?),
            opcode::COMPRESSED_ENVELOPE => {
                let inner = decompress_envelope(frame)?;
                Self::Envelope(InnerFrame::parse(&inner)?)
            }
            other => Self::Unknown(other),
        };
        Ok(parsed)
    }
}

impl InnerFrame {
    pub fn parse(frame: &[u8]) -> Result<Self, FrameError> {
        let mut cursor = ByteCursor::new(frame);
        let op = cursor.read_u8().map_err(|_| FrameError::Empty)?;

        let parsed = match op {
            opcode::VIEWPORT_DELTA => Self::ViewportDelta(ViewportDelta::decode(&mut cursor)?),
            opcode::BOUNDARY_RECT => Self::Boundary(BoundaryRect::decode(&mut cursor)?),
            other => Self::Unknown(other),
        };
        Ok(parsed)
    }
}

/// Count leaderboard entries (cursor past the opcode)
fn count_leaderboard(cursor: &mut ByteCursor<'_>) -> Result<usize, CursorError> {
    cursor.skip(2)?;
    let mut entries = 0;
    while cursor.has_remaining() {
        let flags = cursor.read_u8()?;
        if flags & 2 != 0 {
            cursor.read_string()?;
        }
        if flags & 4 != 0 {
            cursor.skip(4)?;
        }
        entries += 1;
    }
    Ok(entries)
}

/// Protocol version handshake frame
pub fn protocol_version(version: u32) -> Vec<u8> {
    FrameBuilder::with_capacity(5)
        .write_u8(opcode::PROTOCOL_VERSION)
        .write_u32(version)
        .build()
}

/// Client version handshake frame
pub fn client_version(version: u32) -> Vec<u8> {
    FrameBuilder::with_capacity(5)
        .write_u8(opcode::CLIENT_VERSION)
        .write_u32(version)
        .build()
}

/// Spawn request with display name
pub fn spawn(name: &str) -> Vec<u8> {
    FrameBuilder::with_capacity(name.len() + 2)
        .write_u8(opcode::SPAWN)
        .write_string(name)
        .build()
}

/// Move intent; the trailing key echoes the server-issued decryption key
pub fn move_to(x: f64, y: f64, decryption_key: i32) -> Vec<u8> {
    FrameBuilder::with_capacity(13)
        .write_u8(opcode::MOVE)
        .write_i32(x as i32)
        .write_i32(y as i32)
        .write_i32(decryption_key)
        .build()
}

/// Follow-mode on/off signal
pub fn follow(enabled: bool) -> Vec<u8> {
    vec![if enabled {
        opcode::FOLLOW_ON
    } else {
        opcode::FOLLOW_OFF
    }]
}
