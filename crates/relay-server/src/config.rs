//! Server configuration.

use std::path::PathBuf;
use std::time::Duration;

use relay_settings::RelaySettings;
use serde::{Deserialize, Serialize};

/// Configuration for the relay server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"0.0.0.0"`).
    pub host: String,
    /// Port to bind (default `3000`; `0` auto-assigns).
    pub port: u16,
    /// Directory served over HTTP.
    pub public_dir: PathBuf,
    /// Heartbeat ping interval in seconds.
    pub heartbeat_interval_secs: u64,
    /// Extra silence tolerated after a ping before the client is dropped.
    pub heartbeat_timeout_secs: u64,
    /// Max WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Per-connection outbound queue capacity.
    pub send_queue_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from_settings(&RelaySettings::default())
    }
}

impl ServerConfig {
    /// Build from loaded settings.
    pub fn from_settings(settings: &RelaySettings) -> Self {
        Self {
            host: settings.server.host.clone(),
            port: settings.server.port,
            public_dir: PathBuf::from(&settings.server.public_dir),
            heartbeat_interval_secs: settings.websocket.heartbeat_interval_secs,
            heartbeat_timeout_secs: settings.websocket.heartbeat_timeout_secs,
            max_message_size: settings.websocket.max_message_size,
            send_queue_capacity: settings.websocket.send_queue_capacity,
        }
    }

    /// `host:port` string for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Heartbeat interval as a `Duration`, never shorter than one second.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs.max(1))
    }

    /// Heartbeat timeout as a `Duration`.
    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_secs(self.heartbeat_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_binds_port_3000() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.port, 3000);
        assert_eq!(cfg.bind_addr(), "0.0.0.0:3000");
    }

    #[test]
    fn default_public_dir() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.public_dir, PathBuf::from("public"));
    }

    #[test]
    fn heartbeat_durations() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.heartbeat_interval(), Duration::from_secs(25));
        assert_eq!(cfg.heartbeat_timeout(), Duration::from_secs(20));
    }

    #[test]
    fn zero_interval_is_clamped() {
        let cfg = ServerConfig {
            heartbeat_interval_secs: 0,
            ..ServerConfig::default()
        };
        assert_eq!(cfg.heartbeat_interval(), Duration::from_secs(1));
    }

    #[test]
    fn from_settings_copies_every_field() {
        let mut settings = RelaySettings::default();
        settings.server.host = "127.0.0.1".into();
        settings.server.port = 9000;
        settings.server.public_dir = "/srv/app".into();
        settings.websocket.heartbeat_interval_secs = 3;
        settings.websocket.heartbeat_timeout_secs = 4;
        settings.websocket.max_message_size = 2048;
        settings.websocket.send_queue_capacity = 8;

        let cfg = ServerConfig::from_settings(&settings);
        assert_eq!(cfg.bind_addr(), "127.0.0.1:9000");
        assert_eq!(cfg.public_dir, PathBuf::from("/srv/app"));
        assert_eq!(cfg.heartbeat_interval_secs, 3);
        assert_eq!(cfg.heartbeat_timeout_secs, 4);
        assert_eq!(cfg.max_message_size, 2048);
        assert_eq!(cfg.send_queue_capacity, 8);
    }

    #[test]
    fn serde_roundtrip() {
        let cfg = ServerConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: ServerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.port, cfg.port);
        assert_eq!(back.public_dir, cfg.public_dir);
    }
}
