use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use crate::protocol::constants::session::DEFAULT_ORIGIN;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Port cannot be 0")]
    ZeroPort,
    #[error("Operator and metrics ports must differ ({0})")]
    PortClash(u16),
    #[error("max_occupancy must be at least 1")]
    ZeroOccupancy,
    #[error("ramp_interval must be non-zero")]
    ZeroRampInterval,
    #[error("Origin cannot be empty")]
    EmptyOrigin,
}

/// Process-level configuration
#[derive(Debug, Clone)]
pub struct SwarmConfig {
    /// Address the operator link binds to
    pub bind_address: IpAddr,
    /// Operator link port
    pub port: u16,
    /// Metrics endpoint port
    pub metrics_port: u16,
    /// Origin header presented to the game server
    pub origin: String,
    /// Stop ramping up once the probe reports this many players
    pub max_occupancy: usize,
    /// Delay between bot launches
    pub ramp_interval: Duration,
    /// Seconds between a stop request and process exit
    pub shutdown_countdown_secs: u64,
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
            port: 1337,
            metrics_port: 9090,
            origin: DEFAULT_ORIGIN.to_string(),
            max_occupancy: 199,
            ramp_interval: Duration::from_millis(50),
            shutdown_countdown_secs: 30,
        }
    }
}

impl SwarmConfig {
    /// Load config from environment or use defaults
    pub fn load_or_default() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("OPERATOR_BIND_ADDRESS") {
            if let Ok(parsed) = addr.parse() {
                config.bind_address = parsed;
            } else {
                tracing::warn!("Invalid OPERATOR_BIND_ADDRESS '{}', using default", addr);
            }
        }

        if let Some(port) = parse_port("OPERATOR_PORT") {
            config.port = port;
        }

        if let Some(port) = parse_port("METRICS_PORT") {
            config.metrics_port = port;
        }

        if let Ok(origin) = std::env::var("SERVER_ORIGIN") {
            if origin.is_empty() {
                tracing::warn!("SERVER_ORIGIN is empty, using default");
            } else {
                config.origin = origin;
            }
        }

        if let Ok(max) = std::env::var("MAX_OCCUPANCY") {
            match max.parse::<usize>() {
                Ok(parsed) if parsed > 0 => config.max_occupancy = parsed,
                _ => tracing::warn!("Invalid MAX_OCCUPANCY '{}', using default", max),
            }
        }

        if let Ok(ms) = std::env::var("RAMP_INTERVAL_MS") {
            match ms.parse::<u64>() {
                Ok(parsed) if parsed > 0 => config.ramp_interval = Duration::from_millis(parsed),
                _ => tracing::warn!("Invalid RAMP_INTERVAL_MS '{}', using default", ms),
            }
        }

        if let Ok(secs) = std::env::var("SHUTDOWN_COUNTDOWN_SECS") {
            if let Ok(parsed) = secs.parse::<u64>() {
                config.shutdown_countdown_secs = parsed;
            } else {
                tracing::warn!("Invalid SHUTDOWN_COUNTDOWN_SECS '{}', using default", secs);
            }
        }

        config
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 || self.metrics_port == 0 {
            return Err(ConfigError::ZeroPort);
        }
        if self.port == self.metrics_port {
            return Err(ConfigError::PortClash(self.port));
        }
        if self.max_occupancy == 0 {
            return Err(ConfigError::ZeroOccupancy);
        }
        if self.ramp_interval.is_zero() {
            return Err(ConfigError::ZeroRampInterval);
        }
        if self.origin.is_empty() {
            return Err(ConfigError::EmptyOrigin);
        }
        Ok(())
    }
}

fn parse_port(var: &str) -> Option<u16> {
    let value = std::env::var(var).ok()?;
    match value.parse::<u16>() {
        Ok(parsed) if parsed > 0 => Some(parsed),
        Ok(_) => {
            tracing::warn!("{} must be > 0, using default", var);
            None
        }
        Err(_) => {
            tracing::warn!("Invalid {} '{}', using default", var, value);
            None
        }
    }
}

/// Game session configuration, fixed by the operator's start command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameConfig {
    /// WebSocket url of the arena server
    pub server_url: String,
    pub protocol_version: u32,
    pub client_version: u32,
    /// Whether the operator's own player is alive at start
    pub operator_alive: bool,
    /// Display name every bot spawns with
    pub bot_name: String,
    /// Number of bots to launch
    pub bot_count: u8,
}
