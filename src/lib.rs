//! Arena Swarm Library
//!
//! Drives a swarm of bot sessions against a multiplayer arena server over
//! WebSocket, steered by a single operator link.
//!
//! # Features
//!
//! - `metrics` - Prometheus/JSON metrics endpoint (enabled by default)

pub mod config;
pub mod game;
pub mod metrics;
pub mod net;
pub mod protocol;
pub mod swarm;
pub mod util;
