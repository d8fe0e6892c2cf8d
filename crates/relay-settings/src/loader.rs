//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`RelaySettings::default()`]
//! 2. If the settings file exists, deep-merge its values over defaults
//! 3. Apply `RELAY_*` environment variable overrides
//!
//! Rejected env values are returned alongside the settings rather than logged
//! on the spot, since loading runs before the subscriber is installed.
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use relay_logging::LogFormat;
use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::{Result, SettingsError};
use crate::types::RelaySettings;

/// File name looked up in the working directory.
pub const SETTINGS_FILE_NAME: &str = "relay.json";

/// Path of the default settings file (`./relay.json`).
pub fn settings_path() -> PathBuf {
    PathBuf::from(SETTINGS_FILE_NAME)
}

/// An env override that failed to parse and was ignored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RejectedEnvVar {
    /// Variable name.
    pub key: &'static str,
    /// Raw value as found in the environment.
    pub value: String,
}

/// Settings plus the env overrides that were ignored while loading them.
#[derive(Clone, Debug, Default)]
pub struct LoadedSettings {
    /// Effective settings.
    pub settings: RelaySettings,
    /// Overrides dropped for failing validation.
    pub rejected: Vec<RejectedEnvVar>,
}

impl LoadedSettings {
    /// Emit one warning per rejected override.
    pub fn log_rejected(&self) {
        for r in &self.rejected {
            warn!(key = r.key, value = %r.value, "invalid env var, ignoring");
        }
    }
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults; an unreadable file or invalid JSON is an
/// error.
pub fn load_settings_from_path(path: &Path) -> Result<LoadedSettings> {
    let mut settings = read_settings_file(path)?;
    let rejected = apply_env_overrides(&mut settings);
    Ok(LoadedSettings { settings, rejected })
}

fn read_settings_file(path: &Path) -> Result<RelaySettings> {
    let defaults = serde_json::to_value(RelaySettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `RELAY_*` environment variable overrides to loaded settings.
///
/// Invalid values are left out and returned.
pub fn apply_env_overrides(settings: &mut RelaySettings) -> Vec<RejectedEnvVar> {
    apply_overrides(settings, |key| std::env::var(key).ok())
}

/// Apply overrides from an arbitrary key lookup.
pub(crate) fn apply_overrides(
    settings: &mut RelaySettings,
    lookup: impl Fn(&str) -> Option<String>,
) -> Vec<RejectedEnvVar> {
    let read = |key: &str| lookup(key).filter(|v| !v.is_empty());
    let mut rejected = Vec::new();
    let rej = &mut rejected;

    // ── Server ──────────────────────────────────────────────────────
    if let Some(v) = read("RELAY_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = parsed(&read, rej, "RELAY_PORT", |v| parse_u16_range(v, 1, 65535)) {
        settings.server.port = v;
    }
    if let Some(v) = read("RELAY_PUBLIC_DIR") {
        settings.server.public_dir = v;
    }

    // ── WebSocket ───────────────────────────────────────────────────
    if let Some(v) = parsed(&read, rej, "RELAY_HEARTBEAT_INTERVAL_SECS", |v| {
        parse_u64_range(v, 1, 3600)
    }) {
        settings.websocket.heartbeat_interval_secs = v;
    }
    if let Some(v) = parsed(&read, rej, "RELAY_HEARTBEAT_TIMEOUT_SECS", |v| {
        parse_u64_range(v, 1, 3600)
    }) {
        settings.websocket.heartbeat_timeout_secs = v;
    }
    if let Some(v) = parsed(&read, rej, "RELAY_MAX_MESSAGE_SIZE", |v| {
        parse_usize_range(v, 1024, 1_073_741_824)
    }) {
        settings.websocket.max_message_size = v;
    }
    if let Some(v) = parsed(&read, rej, "RELAY_SEND_QUEUE_CAPACITY", |v| {
        parse_usize_range(v, 1, 1_000_000)
    }) {
        settings.websocket.send_queue_capacity = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = read("RELAY_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = parsed(&read, rej, "RELAY_LOG_FORMAT", |v| v.parse::<LogFormat>().ok()) {
        settings.logging.format = v;
    }
    rejected
}

fn parsed<T>(
    read: &impl Fn(&str) -> Option<String>,
    rejected: &mut Vec<RejectedEnvVar>,
    key: &'static str,
    parse: impl Fn(&str) -> Option<T>,
) -> Option<T> {
    let value = read(key)?;
    let result = parse(&value);
    if result.is_none() {
        rejected.push(RejectedEnvVar { key, value });
    }
    result
}

// ── Pure parsing functions ──────────────────────────────────────────────────

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}
