//! # relay-settings
//!
//! Configuration for the signal relay, loaded from three layers (in priority
//! order):
//! 1. **Compiled defaults**: [`RelaySettings::default()`], which bind
//!    `0.0.0.0:3000` and serve `./public`
//! 2. **Settings file**: `relay.json` in the working directory (deep-merged
//!    over defaults)
//! 3. **Environment variables**: `RELAY_*` overrides (highest priority)
//!
//! The binary applies CLI flags on top of the loaded value.
//!
//! # Usage
//!
//! ```no_run
//! use relay_settings::{load_settings_from_path, settings_path};
//!
//! let loaded = load_settings_from_path(&settings_path()).unwrap_or_default();
//! loaded.log_rejected();
//! println!("listening on port {}", loaded.settings.server.port);
//! ```

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    LoadedSettings, RejectedEnvVar, apply_env_overrides, deep_merge, load_settings_from_path,
    settings_path,
};
pub use types::{LoggingSettings, RelaySettings, ServerSettings, WebSocketSettings};
