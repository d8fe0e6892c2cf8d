//! WebSocket connection management, heartbeat, envelope codec, and signal relay.

pub mod connection;
pub mod heartbeat;
pub mod protocol;
pub mod registry;
pub mod session;

pub use connection::{ClientConnection, ConnectionId};
pub use registry::ConnectionRegistry;
