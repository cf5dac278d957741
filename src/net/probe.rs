//! Occupancy probe
//!
//! A reduced session that completes the handshake and counts leaderboard
//! entries. It never spawns and never reconnects.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::GameConfig;
use crate::metrics::Metrics;
use crate::net::session::SessionEvent;
use crate::protocol::cipher::transform;
use crate::protocol::frames::{self, ServerFrame};

pub struct ProbeSession {
    game: Arc<GameConfig>,
    occupancy: Arc<AtomicUsize>,
    metrics: Arc<Metrics>,
    /// Applied to inbound frames once the key arrives
    inbound_key: i32,
    connected: bool,
}

impl ProbeSession {
    pub fn new(game: Arc<GameConfig>, occupancy: Arc<AtomicUsize>, metrics: Arc<Metrics>) -> Self {
        Self {
            game,
            occupancy,
            metrics,
            inbound_key: 0,
            connected: false,
        }
    }

    pub fn server_url(&self) -> &str {
        &self.game.server_url
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Last completed leaderboard count
    pub fn occupancy(&self) -> usize {
        self.occupancy.load(Ordering::Acquire)
    }

    /// Handle one transport event; returns frames to send (never ciphered)
    pub fn handle(&mut self, event: SessionEvent) -> Vec<Vec<u8>> {
        match event {
            SessionEvent::Opened => {
                self.connected = true;
                vec![
                    frames::protocol_version(self.game.protocol_version),
                    frames::client_version(self.game.client_version),
                ]
            }
            SessionEvent::Frame(bytes) => {
                self.on_frame(&bytes);
                Vec::new()
            }
            SessionEvent::Closed => {
                if self.connected {
                    self.connected = false;
                    info!("Probe disconnected");
                }
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    fn on_frame(&mut self, bytes: &[u8]) {
        let plain = if self.inbound_key != 0 {
            transform(bytes, self.inbound_key)
        } else {
            bytes.to_vec()
        };

        match ServerFrame::parse(&plain) {
            Ok(ServerFrame::KeyExchange { key, .. }) => {
                self.inbound_key = key ^ self.game.client_version as i32;
                info!("Probe connected");
            }
            Ok(ServerFrame::Leaderboard(count)) => {
                self.occupancy.store(count, Ordering::Release);
                self.metrics
                    .probe_occupancy
                    .store(count as u64, Ordering::Relaxed);
            }
            Ok(_) => {}
            Err(e) => {
                debug!("Probe dropped frame: {}", e);
                self.metrics.record_dropped();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::cursor::FrameBuilder;

    fn probe() -> ProbeSession {
        let game = Arc::new(GameConfig {
            server_url: "wss://live-arena-1abc.agar.io:443".into(),
            protocol_version: 22,
            client_version: 5,
            operator_alive: true,
            bot_name: "swarm".into(),
            bot_count: 10,
        });
        ProbeSession::new(game, Arc::new(AtomicUsize::new(0)), Arc::new(Metrics::new()))
    }

    fn leaderboard(entries: usize) -> Vec<u8> {
        let mut builder = FrameBuilder::new().write_u8(54).write_u16(0);
        for i in 0..entries {
            builder = builder.write_u8(2).write_string(&format!("player{}", i));
        }
        builder.build()
    }

    #[test]
    fn test_open_sends_handshake() {
        let mut probe = probe();
        let out = probe.handle(SessionEvent::Opened);
        assert_eq!(out, vec![frames::protocol_version(22), frames::client_version(5)]);
        assert!(probe.is_connected());
    }

    #[test]
    fn test_counts_leaderboard_after_key() {
        let mut probe = probe();
        probe.handle(SessionEvent::Opened);
        probe.handle(SessionEvent::Frame(leaderboard(3)));
        assert_eq!(probe.occupancy(), 3);

        let key = FrameBuilder::new().write_u8(241).write_i32(7).write_string("n").build();
        probe.handle(SessionEvent::Frame(key));

        probe.handle(SessionEvent::Frame(transform(&leaderboard(12), 7 ^ 5)));
        assert_eq!(probe.occupancy(), 12);
        assert_eq!(probe.metrics.probe_occupancy.load(Ordering::Relaxed), 12);
    }

    #[test]
    fn test_truncated_leaderboard_keeps_last_count() {
        let mut probe = probe();
        probe.handle(SessionEvent::Frame(leaderboard(4)));

        let mut broken = leaderboard(6);
        broken.pop();
        probe.handle(SessionEvent::Frame(broken));

        assert_eq!(probe.occupancy(), 4);
    }

    #[test]
    fn test_close_is_terminal() {
        let mut probe = probe();
        probe.handle(SessionEvent::Opened);
        assert!(probe.handle(SessionEvent::Closed).is_empty());
        assert!(!probe.is_connected());
    }
}
