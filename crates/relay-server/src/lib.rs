//! # relay-server
//!
//! Axum HTTP + `WebSocket` server for peer-to-peer signaling.
//!
//! - HTTP: every `GET` path not claimed by `/ws` is served from the static
//!   asset directory (404 when absent)
//! - `WebSocket` gateway at `/ws`: connection registry, heartbeat, and the
//!   single relay rule: a `signal` event from one client is forwarded verbatim
//!   to every other open client
//! - Graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod server;
pub mod shutdown;
pub mod static_files;
pub mod websocket;

pub use config::ServerConfig;
pub use error::{Result, ServerError};
pub use server::RelayServer;
