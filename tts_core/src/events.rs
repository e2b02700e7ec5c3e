//! Events delivered by a realtime synthesis session.
//!
//! The transport parses provider JSON into [`ServerEvent`] and forwards the
//! subset the synthesizer cares about as [`SessionEvent`]s to an [`EventSink`].
//!
//! Server events handled:
//! - `session.created` / `session.updated` - logged only
//! - `response.audio.delta` - base64 PCM fragment
//! - `response.done` - logged only
//! - `session.finished` - terminal
//! - `error` - terminal

use serde::Deserialize;
use serde_json::Value;

/// Event delivered to an [`EventSink`], in production order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The connection is established.
    Opened,
    /// One audio fragment, still base64 encoded as received on the wire.
    AudioDelta { delta: String },
    /// The remote session has produced all audio.
    SessionFinished,
    /// The remote session reported an error. Terminal.
    Error { message: String },
    /// The connection went away. `code` is absent when no close frame was received.
    Closed { code: Option<u16>, reason: String },
}

impl SessionEvent {
    /// Whether no further audio can follow this event.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionEvent::SessionFinished | SessionEvent::Error { .. } | SessionEvent::Closed { .. }
        )
    }
}

/// Receiver of session events. Called from the transport's task, so
/// implementations must be safe to share across threads.
pub trait EventSink: Send + Sync {
    fn on_event(&self, event: SessionEvent);
}

#[derive(Debug, Deserialize)]
pub(crate) struct SessionInfo {
    #[serde(default)]
    pub id: Option<String>,
}

/// Raw server event as sent by the realtime endpoint.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub(crate) enum ServerEvent {
    #[serde(rename = "session.created")]
    SessionCreated {
        #[serde(default)]
        session: Option<SessionInfo>,
    },
    #[serde(rename = "session.updated")]
    SessionUpdated {},
    #[serde(rename = "response.audio.delta")]
    AudioDelta { delta: String },
    #[serde(rename = "response.done")]
    ResponseDone {},
    #[serde(rename = "session.finished")]
    SessionFinished {},
    #[serde(rename = "error")]
    Error {
        #[serde(default)]
        error: Option<Value>,
    },
    #[serde(other)]
    Other,
}

impl ServerEvent {
    /// Map to the sink-facing event; `None` for bookkeeping events.
    pub(crate) fn into_session_event(self) -> Option<SessionEvent> {
        match self {
            ServerEvent::AudioDelta { delta } => Some(SessionEvent::AudioDelta { delta }),
            ServerEvent::SessionFinished {} => Some(SessionEvent::SessionFinished),
            ServerEvent::Error { error } => Some(SessionEvent::Error {
                message: error_message(error.as_ref()),
            }),
            ServerEvent::SessionCreated { session } => {
                let id = session.and_then(|s| s.id).unwrap_or_default();
                tracing::debug!("Realtime session created: {}", id);
                None
            }
            ServerEvent::SessionUpdated {} => {
                tracing::debug!("Realtime session updated");
                None
            }
            ServerEvent::ResponseDone {} => {
                tracing::debug!("Realtime response done");
                None
            }
            ServerEvent::Other => None,
        }
    }
}

/// Human-readable message for an `error` payload.
fn error_message(error: Option<&Value>) -> String {
    match error {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Object(o)) => match o.get("message").and_then(|m| m.as_str()) {
            Some(msg) if !msg.is_empty() => msg.to_string(),
            _ => Value::Object(o.clone()).to_string(),
        },
        Some(Value::Null) | None => "unknown error".to_string(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Option<SessionEvent> {
        serde_json::from_str::<ServerEvent>(json).unwrap().into_session_event()
    }

    #[test]
    fn test_audio_delta_keeps_encoded_payload() {
        let event = parse(r#"{"type":"response.audio.delta","event_id":"e1","delta":"AAEC"}"#);
        assert_eq!(event, Some(SessionEvent::AudioDelta { delta: "AAEC".into() }));
    }

    #[test]
    fn test_session_finished() {
        let event = parse(r#"{"type":"session.finished","event_id":"e9"}"#);
        assert_eq!(event, Some(SessionEvent::SessionFinished));
    }

    #[test]
    fn test_error_message_extracted() {
        let event = parse(r#"{"type":"error","error":{"code":"Throttling","message":"quota exceeded"}}"#);
        assert_eq!(event, Some(SessionEvent::Error { message: "quota exceeded".into() }));
    }

    #[test]
    fn test_error_without_message_falls_back_to_payload() {
        let event = parse(r#"{"type":"error","error":{"code":"X"}}"#);
        assert_eq!(event, Some(SessionEvent::Error { message: r#"{"code":"X"}"#.into() }));

        let event = parse(r#"{"type":"error"}"#);
        assert_eq!(event, Some(SessionEvent::Error { message: "unknown error".into() }));
    }

    #[test]
    fn test_bookkeeping_and_unknown_events_are_dropped() {
        assert_eq!(parse(r#"{"type":"session.created","session":{"id":"sess_1"}}"#), None);
        assert_eq!(parse(r#"{"type":"session.updated","session":{}}"#), None);
        assert_eq!(parse(r#"{"type":"response.done"}"#), None);
        assert_eq!(parse(r#"{"type":"response.audio.done"}"#), None);
    }

    #[test]
    fn test_terminal_classification() {
        assert!(SessionEvent::SessionFinished.is_terminal());
        assert!(SessionEvent::Error { message: String::new() }.is_terminal());
        assert!(SessionEvent::Closed { code: None, reason: String::new() }.is_terminal());
        assert!(!SessionEvent::Opened.is_terminal());
        assert!(!SessionEvent::AudioDelta { delta: String::new() }.is_terminal());
    }
}
