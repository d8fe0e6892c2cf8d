//! WebSocket session lifecycle: handles a single connected client from
//! upgrade through disconnect.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{Sink, SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::connection::{ClientConnection, ConnectionId};
use super::heartbeat::{Heartbeat, HeartbeatResult};
use super::protocol::{self, InboundFrame};
use super::registry::ConnectionRegistry;
use crate::config::ServerConfig;

/// How long the writer gets to flush a close frame after the reader stops.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Per-session knobs derived from [`ServerConfig`].
#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    /// Ping cadence and silence tolerance.
    pub heartbeat: Heartbeat,
    /// Bound on queued outbound frames.
    pub send_queue_capacity: usize,
}

impl SessionSettings {
    /// Extract session settings from the server config.
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            heartbeat: Heartbeat::new(config.heartbeat_interval(), config.heartbeat_timeout()),
            send_queue_capacity: config.send_queue_capacity.max(1),
        }
    }
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Client sent a close frame or the stream ended.
    ClientClosed,
    /// The socket reported an error (includes oversized frames).
    TransportError,
    /// The client stayed silent past the heartbeat grace window.
    HeartbeatTimeout,
    /// The writer could no longer reach the socket.
    WriterClosed,
    /// The server is shutting down.
    Shutdown,
}

impl CloseReason {
    fn as_str(self) -> &'static str {
        match self {
            Self::ClientClosed => "client_closed",
            Self::TransportError => "transport_error",
            Self::HeartbeatTimeout => "heartbeat_timeout",
            Self::WriterClosed => "writer_closed",
            Self::Shutdown => "shutdown",
        }
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the outbound writer stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterExit {
    /// Every sender for the outbound queue was dropped.
    QueueClosed,
    /// Writing to the socket failed.
    SinkClosed,
    /// The session asked the writer to stop.
    Cancelled,
}

/// Run a WebSocket session for a connected client.
///
/// 1. Registers the connection so it receives peers' signals
/// 2. Relays inbound `signal` events to every other open connection
/// 3. Pings periodically and drops clients that stay silent
/// 4. Deregisters on disconnect or shutdown
///
/// Nothing is sent to the client except relayed signals and pings.
#[instrument(skip_all, fields(client_id = %id))]
pub async fn run_ws_session(
    ws: WebSocket,
    id: ConnectionId,
    registry: Arc<ConnectionRegistry>,
    settings: SessionSettings,
    shutdown: CancellationToken,
) {
    let (ws_tx, mut ws_rx) = ws.split();

    let (send_tx, send_rx) = mpsc::channel::<Arc<String>>(settings.send_queue_capacity);
    let connection = Arc::new(ClientConnection::new(id.clone(), send_tx));

    registry.register(connection.clone());
    info!(client_id = %id, peers = registry.count(), "client connected");

    let writer_cancel = shutdown.child_token();
    let mut writer = tokio::spawn(write_loop(
        ws_tx,
        send_rx,
        settings.heartbeat.interval,
        writer_cancel.clone(),
    ));
    let mut writer_done = false;

    let heartbeat = settings
        .heartbeat
        .run(connection.clone(), shutdown.child_token());
    tokio::pin!(heartbeat);

    let reason = loop {
        tokio::select! {
            result = &mut heartbeat => {
                break match result {
                    HeartbeatResult::TimedOut => {
                        warn!(
                            silent_ms = u64::try_from(connection.last_seen_elapsed().as_millis()).unwrap_or(u64::MAX),
                            "client unresponsive, disconnecting"
                        );
                        CloseReason::HeartbeatTimeout
                    }
                    HeartbeatResult::Cancelled => CloseReason::Shutdown,
                };
            }
            joined = &mut writer => {
                writer_done = true;
                debug!(exit = ?joined.ok(), "writer stopped");
                break CloseReason::WriterClosed;
            }
            msg = ws_rx.next() => {
                match msg {
                    None => break CloseReason::ClientClosed,
                    Some(Err(e)) => {
                        debug!(error = %e, "websocket read error");
                        break CloseReason::TransportError;
                    }
                    Some(Ok(msg)) => {
                        connection.mark_alive();
                        match msg {
                            Message::Text(text) => {
                                let _ = relay_text(&registry, &id, text.as_str());
                            }
                            Message::Binary(data) => {
                                let _ = relay_binary(&registry, &id, &data);
                            }
                            Message::Close(_) => break CloseReason::ClientClosed,
                            Message::Ping(_) | Message::Pong(_) => {}
                        }
                    }
                }
            }
        }
    };

    let _ = registry.unregister(&id);

    writer_cancel.cancel();
    if !writer_done && time::timeout(WRITER_DRAIN_TIMEOUT, &mut writer).await.is_err() {
        writer.abort();
    }

    info!(
        client_id = %id,
        reason = %reason,
        duration_ms = u64::try_from(connection.age().as_millis()).unwrap_or(u64::MAX),
        dropped = connection.drop_count(),
        "client disconnected"
    );
}

/// Relay one inbound text frame. Returns the number of peers reached, or
/// `None` when the frame was not a `signal` event.
pub(crate) fn relay_text(
    registry: &ConnectionRegistry,
    sender: &ConnectionId,
    text: &str,
) -> Option<usize> {
    match protocol::parse_inbound(text) {
        Ok(InboundFrame::Signal(data)) => match protocol::signal_frame(data.as_deref()) {
            Ok(frame) => Some(registry.broadcast_except(sender, &Arc::new(frame))),
            Err(e) => {
                warn!(error = %e, "failed to encode signal");
                None
            }
        },
        Ok(InboundFrame::Other(event_type)) => {
            debug!(event_type = %event_type, "ignoring non-signal event");
            None
        }
        Err(e) => {
            debug!(error = %e, len = text.len(), "ignoring malformed frame");
            None
        }
    }
}

/// Relay a binary frame whose bytes are a UTF-8 envelope. Anything else is
/// dropped with a warning.
pub(crate) fn relay_binary(
    registry: &ConnectionRegistry,
    sender: &ConnectionId,
    data: &[u8],
) -> Option<usize> {
    if let Ok(text) = std::str::from_utf8(data) {
        relay_text(registry, sender, text)
    } else {
        warn!(len = data.len(), "dropping non-UTF-8 binary frame");
        None
    }
}

/// Drain the outbound queue into `sink`, pinging every `ping_interval`.
///
/// On cancellation a close frame is sent before returning.
pub async fn write_loop<S>(
    mut sink: S,
    mut outbound: mpsc::Receiver<Arc<String>>,
    ping_interval: Duration,
    cancel: CancellationToken,
) -> WriterExit
where
    S: Sink<Message> + Unpin,
{
    let mut ping = time::interval(ping_interval);
    // First tick completes immediately.
    let _ = ping.tick().await;

    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                let _ = sink.send(Message::Close(None)).await;
                return WriterExit::Cancelled;
            }
            msg = outbound.recv() => {
                let Some(text) = msg else {
                    return WriterExit::QueueClosed;
                };
                if sink.send(Message::Text(text.as_str().into())).await.is_err() {
                    return WriterExit::SinkClosed;
                }
            }
            _ = ping.tick() => {
                if sink.send(Message::Ping(Vec::new().into())).await.is_err() {
                    return WriterExit::SinkClosed;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::channel::mpsc as fmpsc;
    use relay_logging::test_utils::capture_logs;
    use tracing::Level;

    fn make_connection_with_rx(id: &str) -> (Arc<ClientConnection>, mpsc::Receiver<Arc<String>>) {
        let (tx, rx) = mpsc::channel(32);
        (
            Arc::new(ClientConnection::new(ConnectionId::from_raw(id), tx)),
            rx,
        )
    }

    #[test]
    fn settings_from_config() {
        let settings = SessionSettings::from_config(&ServerConfig::default());
        assert_eq!(settings.heartbeat.interval, Duration::from_secs(25));
        assert_eq!(settings.heartbeat.timeout, Duration::from_secs(20));
        assert_eq!(settings.send_queue_capacity, 256);
    }

    #[test]
    fn settings_clamp_zero_capacity() {
        let config = ServerConfig {
            send_queue_capacity: 0,
            ..ServerConfig::default()
        };
        assert_eq!(SessionSettings::from_config(&config).send_queue_capacity, 1);
    }

    #[test]
    fn close_reason_display() {
        assert_eq!(CloseReason::HeartbeatTimeout.to_string(), "heartbeat_timeout");
        assert_eq!(CloseReason::ClientClosed.to_string(), "client_closed");
    }

    #[test]
    fn relay_text_forwards_signal_to_peers() {
        let registry = ConnectionRegistry::new();
        let (a, mut rx_a) = make_connection_with_rx("a");
        let (b, mut rx_b) = make_connection_with_rx("b");
        registry.register(a);
        registry.register(b);

        let n = relay_text(
            &registry,
            &ConnectionId::from_raw("a"),
            r#"{"type":"signal","data":{"type":"offer","sdp":"..."}}"#,
        );
        assert_eq!(n, Some(1));
        assert_eq!(
            *rx_b.try_recv().unwrap(),
            r#"{"type":"signal","data":{"type":"offer","sdp":"..."}}"#
        );
        assert!(rx_a.try_recv().is_err());
    }

    #[test]
    fn relay_text_ignores_other_events() {
        let (logs, _guard) = capture_logs();
        let registry = ConnectionRegistry::new();
        let (b, mut rx_b) = make_connection_with_rx("b");
        registry.register(b);

        let n = relay_text(&registry, &ConnectionId::from_raw("a"), r#"{"type":"chat"}"#);
        assert_eq!(n, None);
        assert!(rx_b.try_recv().is_err());
        assert!(logs.has_event(Level::DEBUG, "ignoring non-signal event"));
    }

    #[test]
    fn relay_text_ignores_garbage() {
        let registry = ConnectionRegistry::new();
        let (b, mut rx_b) = make_connection_with_rx("b");
        registry.register(b);

        assert_eq!(relay_text(&registry, &ConnectionId::from_raw("a"), "{oops"), None);
        assert!(rx_b.try_recv().is_err());
    }

    #[test]
    fn relay_text_signal_without_data_sends_null() {
        let registry = ConnectionRegistry::new();
        let (b, mut rx_b) = make_connection_with_rx("b");
        registry.register(b);

        let n = relay_text(&registry, &ConnectionId::from_raw("a"), r#"{"type":"signal"}"#);
        assert_eq!(n, Some(1));
        assert_eq!(*rx_b.try_recv().unwrap(), r#"{"type":"signal","data":null}"#);
    }

    #[test]
    fn relay_binary_forwards_utf8_envelope() {
        let registry = ConnectionRegistry::new();
        let (b, mut rx_b) = make_connection_with_rx("b");
        registry.register(b);

        let n = relay_binary(
            &registry,
            &ConnectionId::from_raw("a"),
            br#"{"type":"signal","data":[1]}"#,
        );
        assert_eq!(n, Some(1));
        assert_eq!(*rx_b.try_recv().unwrap(), r#"{"type":"signal","data":[1]}"#);
    }

    #[test]
    fn relay_binary_warns_on_invalid_utf8() {
        let (logs, _guard) = capture_logs();
        let registry = ConnectionRegistry::new();
        let (b, mut rx_b) = make_connection_with_rx("b");
        registry.register(b);

        let n = relay_binary(&registry, &ConnectionId::from_raw("a"), &[0xff, 0xfe, 0x00]);
        assert_eq!(n, None);
        assert!(rx_b.try_recv().is_err());
        assert!(logs.has_event(Level::WARN, "dropping non-UTF-8 binary frame"));
    }

    #[tokio::test]
    async fn write_loop_forwards_queued_text() {
        let (sink, frames) = fmpsc::unbounded::<Message>();
        let (tx, rx) = mpsc::channel(8);
        let handle = tokio::spawn(write_loop(
            sink,
            rx,
            Duration::from_secs(3600),
            CancellationToken::new(),
        ));

        tx.send(Arc::new("one".into())).await.unwrap();
        tx.send(Arc::new("two".into())).await.unwrap();
        drop(tx);

        assert_eq!(handle.await.unwrap(), WriterExit::QueueClosed);
        let got: Vec<Message> = frames.collect().await;
        assert_eq!(got, vec![Message::Text("one".into()), Message::Text("two".into())]);
    }

    #[tokio::test(start_paused = true)]
    async fn write_loop_pings_on_interval() {
        let (sink, frames) = fmpsc::unbounded::<Message>();
        let (_tx, rx) = mpsc::channel::<Arc<String>>(8);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(write_loop(sink, rx, Duration::from_secs(25), cancel.clone()));

        time::sleep(Duration::from_secs(51)).await;
        cancel.cancel();
        assert_eq!(handle.await.unwrap(), WriterExit::Cancelled);

        let got: Vec<Message> = frames.collect().await;
        let pings = got.iter().filter(|m| matches!(m, Message::Ping(_))).count();
        assert_eq!(pings, 2);
        assert!(matches!(got.last(), Some(Message::Close(None))));
    }

    #[tokio::test]
    async fn write_loop_stops_when_sink_closes() {
        let (sink, frames) = fmpsc::unbounded::<Message>();
        drop(frames);
        let (tx, rx) = mpsc::channel(8);
        let handle = tokio::spawn(write_loop(
            sink,
            rx,
            Duration::from_secs(3600),
            CancellationToken::new(),
        ));

        tx.send(Arc::new("lost".into())).await.unwrap();
        assert_eq!(handle.await.unwrap(), WriterExit::SinkClosed);
    }
}
