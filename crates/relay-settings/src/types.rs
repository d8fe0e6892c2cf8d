//! Settings types.
//!
//! Every struct uses `#[serde(default)]`, so a settings file only needs the
//! keys it overrides.

use relay_logging::LogFormat;
use serde::{Deserialize, Serialize};

/// Root settings object.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelaySettings {
    /// Listener and static asset settings.
    pub server: ServerSettings,
    /// WebSocket transport settings.
    pub websocket: WebSocketSettings,
    /// Log output settings.
    pub logging: LoggingSettings,
}

/// Listener and static asset settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Listening port.
    pub port: u16,
    /// Directory of front-end assets served over HTTP.
    pub public_dir: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            public_dir: "public".to_string(),
        }
    }
}

/// WebSocket transport settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WebSocketSettings {
    /// Seconds between server Ping frames.
    pub heartbeat_interval_secs: u64,
    /// Extra seconds of silence tolerated after a missed ping before disconnecting.
    pub heartbeat_timeout_secs: u64,
    /// Largest accepted frame in bytes.
    pub max_message_size: usize,
    /// Outbound frames buffered per connection before drops begin.
    pub send_queue_capacity: usize,
}

impl Default for WebSocketSettings {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: 25,
            heartbeat_timeout_secs: 20,
            max_message_size: 1_000_000,
            send_queue_capacity: 256,
        }
    }
}

/// Log output settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive. `RUST_LOG` wins when set.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_camel_case_keys() {
        let value = serde_json::to_value(RelaySettings::default()).unwrap();
        assert_eq!(value["server"]["publicDir"], "public");
        assert_eq!(value["websocket"]["heartbeatIntervalSecs"], 25);
        assert_eq!(value["websocket"]["sendQueueCapacity"], 256);
        assert_eq!(value["logging"]["format"], "pretty");
    }

    #[test]
    fn partial_object_fills_defaults() {
        let settings: RelaySettings =
            serde_json::from_str(r#"{"server": {"port": 8080}}"#).unwrap();
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.websocket.max_message_size, 1_000_000);
    }

    #[test]
    fn empty_object_is_default() {
        let settings: RelaySettings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings.server.port, 3000);
        assert_eq!(settings.logging.format, LogFormat::Pretty);
    }
}
