//! # Runtime Configuration Module
//!
//! Environment variable-based configuration for the transport core.
//!
//! ## Environment Variables
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | `UPNP_LISTEN_PORT` | `0` | TCP port for `MiniServer` (0 = OS-assigned) |
//! | `UPNP_READ_TIMEOUT_SECS` | `30` | Per-read socket deadline |
//! | `UPNP_MAX_THREADS` | `13` | Worker-thread ceiling for the pool |
//! | `UPNP_LINGER_SECS` | `5` | Idle worker lifetime (0 disables reaping) |
//!
//! ## Usage
//!
//! ```rust
//! use upnpkit::config::ServerConfig;
//!
//! let config = ServerConfig::from_env();
//! println!("read timeout: {:?}", config.read_timeout);
//! ```
//!
//! **Why the read timeout matters:** a client that stops sending mid-message
//! would otherwise pin a pool worker forever. On expiry the connection is
//! closed silently, exactly as if the peer had disconnected.

use crate::thread_pool::ThreadPoolConfig;
use std::env;
use std::time::Duration;

/// Configuration for a [`MiniServer`](crate::server::MiniServer) instance and
/// the pool it schedules onto.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// TCP port to listen on (0 = let the OS assign one)
    pub listen_port: u16,
    /// Deadline applied to every blocking socket read
    pub read_timeout: Duration,
    /// Worker pool sizing and linger behavior
    pub pool: ThreadPoolConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let listen_port = env::var("UPNP_LISTEN_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);

        let read_timeout_secs: u64 = env::var("UPNP_READ_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(30);

        Self {
            listen_port,
            read_timeout: Duration::from_secs(read_timeout_secs),
            pool: ThreadPoolConfig::from_env(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_port: 0,
            read_timeout: Duration::from_secs(30),
            pool: ThreadPoolConfig::default(),
        }
    }
}
