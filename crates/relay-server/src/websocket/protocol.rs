//! JSON event envelope carried in WebSocket text frames.
//!
//! Every frame in either direction is `{"type": <event>, "data": <any>}`.
//! The relay only inspects `type`; `data` is kept as raw bytes and echoed to
//! peers exactly as received. The server never originates frames of its own,
//! so peers learn nothing about connects or disconnects.

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

/// Event type for peer-to-peer signaling payloads.
pub const SIGNAL_EVENT: &str = "signal";

/// A decoded client frame.
#[derive(Debug)]
pub enum InboundFrame {
    /// A `signal` event. `None` when the client sent no `data`.
    Signal(Option<Box<RawValue>>),
    /// Any other event type; the relay ignores these.
    Other(String),
}

#[derive(Deserialize)]
struct InboundEnvelope {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    data: Option<Box<RawValue>>,
}

#[derive(Serialize)]
struct OutboundEnvelope<'a> {
    #[serde(rename = "type")]
    event_type: &'static str,
    data: Option<&'a RawValue>,
}

/// Decode a client frame.
///
/// Fails when `text` is not a JSON object carrying a string `type`.
pub fn parse_inbound(text: &str) -> Result<InboundFrame, serde_json::Error> {
    let envelope: InboundEnvelope = serde_json::from_str(text)?;
    if envelope.event_type == SIGNAL_EVENT {
        Ok(InboundFrame::Signal(envelope.data))
    } else {
        Ok(InboundFrame::Other(envelope.event_type))
    }
}

/// Encode the frame forwarded to peers. A missing payload becomes `null`.
pub fn signal_frame(data: Option<&RawValue>) -> Result<String, serde_json::Error> {
    serde_json::to_string(&OutboundEnvelope {
        event_type: SIGNAL_EVENT,
        data,
    })
}
