//! Prometheus-compatible metrics endpoint
//!
//! Exposes swarm counters in Prometheus format.
//! Default endpoint: http://localhost:9090/metrics

use std::sync::atomic::{AtomicU64, Ordering};
#[cfg(feature = "metrics")]
use std::sync::Arc;
use std::time::Instant;
#[cfg(feature = "metrics")]
use tokio::io::{AsyncReadExt, AsyncWriteExt};
#[cfg(feature = "metrics")]
use tokio::net::TcpListener;
#[cfg(feature = "metrics")]
use tracing::{debug, info};

/// Metrics registry for the swarm
#[derive(Debug)]
pub struct Metrics {
    // Bot lifecycle
    pub bots_spawned: AtomicU64,
    pub bots_alive: AtomicU64,
    pub bots_blocked: AtomicU64,
    pub reconnects: AtomicU64,
    pub respawns: AtomicU64,

    // Frames
    pub frames_received: AtomicU64,
    pub frames_dropped: AtomicU64,
    pub frames_sent: AtomicU64,
    pub bytes_received: AtomicU64,
    pub bytes_sent: AtomicU64,

    // Movement
    pub ticks: AtomicU64,
    pub moves_sent: AtomicU64,

    // Server occupancy reported by the probe
    pub probe_occupancy: AtomicU64,

    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            bots_spawned: AtomicU64::new(0),
            bots_alive: AtomicU64::new(0),
            bots_blocked: AtomicU64::new(0),
            reconnects: AtomicU64::new(0),
            respawns: AtomicU64::new(0),
            frames_received: AtomicU64::new(0),
            frames_dropped: AtomicU64::new(0),
            frames_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            ticks: AtomicU64::new(0),
            moves_sent: AtomicU64::new(0),
            probe_occupancy: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_received(&self, bytes: usize) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_sent(&self, bytes: usize) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bot_became_alive(&self) {
        self.bots_alive.fetch_add(1, Ordering::Relaxed);
    }

    /// Saturates at zero
    pub fn bot_died(&self) {
        let _ = self
            .bots_alive
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    /// Get uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Generate Prometheus-format metrics output
    pub fn to_prometheus(&self) -> String {
        let mut output = String::with_capacity(2048);

        macro_rules! metric {
            ($name:expr, $help:expr, $type:expr, $value:expr) => {
                output.push_str(&format!(
                    "# HELP {} {}\n# TYPE {} {}\n{} {}\n",
                    $name, $help, $name, $type, $name, $value
                ));
            };
        }

        metric!("arena_swarm_bots_spawned_total", "Bot sessions launched", "counter",
            self.bots_spawned.load(Ordering::Relaxed));
        metric!("arena_swarm_bots_alive", "Bots with at least one owned cell", "gauge",
            self.bots_alive.load(Ordering::Relaxed));
        metric!("arena_swarm_bots_blocked_total", "Bots retired by an access block", "counter",
            self.bots_blocked.load(Ordering::Relaxed));
        metric!("arena_swarm_reconnects_total", "Automatic reconnects", "counter",
            self.reconnects.load(Ordering::Relaxed));
        metric!("arena_swarm_respawns_total", "Respawn requests after losing all cells", "counter",
            self.respawns.load(Ordering::Relaxed));

        metric!("arena_swarm_frames_received_total", "Frames received from the game server", "counter",
            self.frames_received.load(Ordering::Relaxed));
        metric!("arena_swarm_frames_dropped_total", "Inbound frames dropped as malformed", "counter",
            self.frames_dropped.load(Ordering::Relaxed));
        metric!("arena_swarm_frames_sent_total", "Frames sent to the game server", "counter",
            self.frames_sent.load(Ordering::Relaxed));
        metric!("arena_swarm_bytes_received_total", "Bytes received", "counter",
            self.bytes_received.load(Ordering::Relaxed));
        metric!("arena_swarm_bytes_sent_total", "Bytes sent", "counter",
            self.bytes_sent.load(Ordering::Relaxed));

        metric!("arena_swarm_ticks_total", "Movement ticks run", "counter",
            self.ticks.load(Ordering::Relaxed));
        metric!("arena_swarm_moves_sent_total", "Move frames sent", "counter",
            self.moves_sent.load(Ordering::Relaxed));
        metric!("arena_swarm_probe_occupancy", "Players on the server per the probe", "gauge",
            self.probe_occupancy.load(Ordering::Relaxed));
        metric!("arena_swarm_uptime_seconds", "Process uptime in seconds", "counter",
            self.uptime_seconds());

        output
    }

    /// Generate JSON format metrics
    pub fn to_json(&self) -> String {
        format!(r#"{{
  "bots": {{
    "spawned": {},
    "alive": {},
    "blocked": {},
    "reconnects": {},
    "respawns": {}
  }},
  "frames": {{
    "received": {},
    "dropped": {},
    "sent": {},
    "bytes_received": {},
    "bytes_sent": {}
  }},
  "movement": {{
    "ticks": {},
    "moves_sent": {}
  }},
  "probe_occupancy": {},
  "uptime_seconds": {}
}}"#,
            self.bots_spawned.load(Ordering::Relaxed),
            self.bots_alive.load(Ordering::Relaxed),
            self.bots_blocked.load(Ordering::Relaxed),
            self.reconnects.load(Ordering::Relaxed),
            self.respawns.load(Ordering::Relaxed),
            self.frames_received.load(Ordering::Relaxed),
            self.frames_dropped.load(Ordering::Relaxed),
            self.frames_sent.load(Ordering::Relaxed),
            self.bytes_received.load(Ordering::Relaxed),
            self.bytes_sent.load(Ordering::Relaxed),
            self.ticks.load(Ordering::Relaxed),
            self.moves_sent.load(Ordering::Relaxed),
            self.probe_occupancy.load(Ordering::Relaxed),
            self.uptime_seconds(),
        )
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Start the metrics HTTP server
#[cfg(feature = "metrics")]
pub async fn start_metrics_server(metrics: Arc<Metrics>, port: u16) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr).await?;

    info!("Metrics server listening on http://{}/metrics", addr);

    loop {
        let (mut socket, peer) = listener.accept().await?;
        let metrics = metrics.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 1024];

            match socket.read(&mut buffer).await {
                Ok(n) if n > 0 => {
                    let request = String::from_utf8_lossy(&buffer[..n]);
                    let response = render_response(&metrics, &request);

                    if let Err(e) = socket.write_all(response.as_bytes()).await {
                        debug!("Failed to write metrics response to {}: {}", peer, e);
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    debug!("Failed to read from metrics socket {}: {}", peer, e);
                }
            }
        });
    }
}

#[cfg(feature = "metrics")]
fn render_response(metrics: &Metrics, request: &str) -> String {
    let (content_type, body) = if request.starts_with("GET /metrics/json") {
        ("application/json", metrics.to_json())
    } else if request.starts_with("GET /metrics") {
        ("text/plain; version=0.0.4", metrics.to_prometheus())
    } else if request.starts_with("GET /health") {
        ("text/plain", "OK".to_string())
    } else {
        return "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_string();
    };

    format!(
        "HTTP/1.1 200 OK\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        content_type,
        body.len(),
        body
    )
}
