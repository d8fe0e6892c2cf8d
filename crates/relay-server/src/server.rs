//! `RelayServer`: Axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::response::IntoResponse;
use axum::routing::get;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::error::{Result, ServerError};
use crate::shutdown::ShutdownCoordinator;
use crate::static_files::static_service;
use crate::websocket::registry::ConnectionRegistry;
use crate::websocket::session::{SessionSettings, run_ws_session};
use crate::websocket::ConnectionId;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Open connections.
    pub registry: Arc<ConnectionRegistry>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// Heartbeat and queue limits applied to each session.
    pub session: SessionSettings,
    /// Largest frame accepted from a client.
    pub max_message_size: usize,
}

/// The signal relay server.
pub struct RelayServer {
    config: ServerConfig,
    registry: Arc<ConnectionRegistry>,
    shutdown: Arc<ShutdownCoordinator>,
}

impl RelayServer {
    /// Create a new server.
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            registry: Arc::new(ConnectionRegistry::new()),
            shutdown: Arc::new(ShutdownCoordinator::new()),
        }
    }

    /// Build the Axum router: `/ws` for the relay, everything else static.
    pub fn router(&self) -> Router {
        let state = AppState {
            registry: self.registry.clone(),
            shutdown: self.shutdown.clone(),
            session: SessionSettings::from_config(&self.config),
            max_message_size: self.config.max_message_size,
        };

        Router::new()
            .route("/ws", get(ws_handler))
            .fallback_service(static_service(&self.config.public_dir))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Bind the configured address and start serving in the background.
    ///
    /// Returns the bound address (useful with port `0`) and the serve task.
    /// The task finishes once the shutdown coordinator fires and in-flight
    /// requests drain; pass it to [`ShutdownCoordinator::graceful_shutdown`]
    /// so relay sessions are drained too.
    pub async fn listen(&self) -> Result<(SocketAddr, JoinHandle<()>)> {
        let addr = self.config.bind_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let local_addr = listener.local_addr()?;

        if !self.config.public_dir.is_dir() {
            warn!(
                public_dir = %self.config.public_dir.display(),
                "public directory not found, every static request will 404"
            );
        }

        let router = self.router();
        let token = self.shutdown.token();
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(token.cancelled_owned())
                .await
            {
                warn!(error = %e, "server stopped with error");
            }
        });

        info!(
            "Server is running at http://{}:{}",
            self.config.host,
            local_addr.port()
        );
        Ok((local_addr, handle))
    }

    /// Get the connection registry.
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// GET /ws: upgrade and hand the socket to a tracked relay session.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    let id = ConnectionId::new();
    ws.max_message_size(state.max_message_size)
        .max_frame_size(state.max_message_size)
        .on_upgrade(move |socket| async move {
            let session = tokio::spawn(run_ws_session(
                socket,
                id,
                state.registry,
                state.session,
                state.shutdown.token(),
            ));
            state.shutdown.track_session(session);
        })
}
