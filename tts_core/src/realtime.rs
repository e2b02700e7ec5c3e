//! DashScope (Qwen TTS) realtime transport.
//!
//! - Endpoint: `wss://dashscope.aliyuncs.com/api-ws/v1/realtime?model=<model>`
//! - Auth: `Authorization: Bearer <api key>`
//! - Protocol: WebSocket with JSON events in both directions
//! - Audio: PCM 16-bit, 24kHz, mono, base64 encoded in `response.audio.delta`
//!
//! Each opened session owns one background task that holds the socket. Client
//! events are queued on an mpsc channel and written by that task; server
//! events are parsed there and handed to the session's [`EventSink`]. When
//! the socket ends for any reason the sink receives exactly one
//! [`SessionEvent::Closed`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header::AUTHORIZATION, HeaderValue};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::events::{EventSink, ServerEvent, SessionEvent};
use crate::session::{CommitMode, SessionConnector, SessionParams, SessionState, SynthesisSession};
use crate::{TtsError, TtsResult};

/// Default DashScope realtime WebSocket endpoint.
pub const DASHSCOPE_REALTIME_URL: &str = "wss://dashscope.aliyuncs.com/api-ws/v1/realtime";

/// Channel capacity for outgoing client events.
const WS_CHANNEL_CAPACITY: usize = 64;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Serialize)]
struct SessionUpdate {
    voice: String,
    response_format: &'static str,
    sample_rate: u32,
    mode: CommitMode,
    language_type: String,
}

/// Client event sent to the realtime endpoint.
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum ClientEvent {
    #[serde(rename = "session.update")]
    SessionUpdate { event_id: String, session: SessionUpdate },
    #[serde(rename = "input_text_buffer.append")]
    AppendText { event_id: String, text: String },
    #[serde(rename = "input_text_buffer.commit")]
    Commit { event_id: String },
    #[serde(rename = "session.finish")]
    Finish { event_id: String },
}

fn event_id() -> String {
    format!("event_{}", uuid::Uuid::new_v4().simple())
}

/// Connector for the DashScope realtime endpoint.
#[derive(Debug, Clone)]
pub struct DashScopeRealtime {
    url: String,
    api_key: String,
}

impl DashScopeRealtime {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: api_key.into(),
        }
    }

    fn build_ws_url(&self, model: &str) -> String {
        let separator = if self.url.contains('?') { '&' } else { '?' };
        format!("{}{}model={}", self.url, separator, model)
    }
}

#[async_trait]
impl SessionConnector for DashScopeRealtime {
    async fn open(&self, model: &str, sink: Arc<dyn EventSink>) -> TtsResult<Box<dyn SynthesisSession>> {
        let url = self.build_ws_url(model);

        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| TtsError::Connection(e.to_string()))?;
        let auth = HeaderValue::from_str(&format!("Bearer {}", self.api_key))
            .map_err(|e| TtsError::Connection(format!("invalid credential header: {e}")))?;
        request.headers_mut().insert(AUTHORIZATION, auth);

        let (ws_stream, _response) = tokio::time::timeout(CONNECT_TIMEOUT, tokio_tungstenite::connect_async(request))
            .await
            .map_err(|_| TtsError::Connection(format!("timed out connecting to {}", self.url)))?
            .map_err(|e| TtsError::Connection(e.to_string()))?;

        info!("Connected to realtime endpoint for model {}", model);

        let (mut ws_sink, mut ws_stream) = ws_stream.split();
        let (tx, mut rx) = mpsc::channel::<ClientEvent>(WS_CHANNEL_CAPACITY);

        sink.on_event(SessionEvent::Opened);

        let event_sink = Arc::clone(&sink);
        let handle = tokio::spawn(async move {
            let mut close_code: Option<u16> = None;
            let mut close_reason = String::new();

            loop {
                tokio::select! {
                    outgoing = rx.recv() => {
                        let Some(event) = outgoing else {
                            // Session dropped its sender: close from our side.
                            let _ = ws_sink.send(Message::Close(None)).await;
                            close_reason = "closed by client".to_string();
                            break;
                        };
                        let json = match serde_json::to_string(&event) {
                            Ok(j) => j,
                            Err(e) => {
                                error!("Failed to serialize client event: {}", e);
                                continue;
                            }
                        };
                        if let Err(e) = ws_sink.send(Message::Text(json.into())).await {
                            error!("Failed to send WebSocket message: {}", e);
                            close_reason = e.to_string();
                            break;
                        }
                    }

                    incoming = ws_stream.next() => {
                        match incoming {
                            Some(Ok(Message::Text(text))) => {
                                match serde_json::from_str::<ServerEvent>(&text) {
                                    Ok(event) => {
                                        if let Some(event) = event.into_session_event() {
                                            event_sink.on_event(event);
                                        }
                                    }
                                    Err(e) => {
                                        warn!("Failed to parse server event: {} - {}", e, text.as_str());
                                    }
                                }
                            }
                            Some(Ok(Message::Ping(data))) => {
                                if let Err(e) = ws_sink.send(Message::Pong(data)).await {
                                    error!("Failed to send pong: {}", e);
                                }
                            }
                            Some(Ok(Message::Close(frame))) => {
                                if let Some(frame) = frame {
                                    close_code = Some(u16::from(frame.code));
                                    close_reason = frame.reason.as_str().to_string();
                                }
                                info!("WebSocket closed by server: code={:?}", close_code);
                                break;
                            }
                            Some(Ok(Message::Binary(data))) => {
                                debug!("Ignoring {} byte binary frame", data.len());
                            }
                            Some(Ok(_)) => {}
                            Some(Err(e)) => {
                                error!("WebSocket error: {}", e);
                                close_reason = e.to_string();
                                break;
                            }
                            None => {
                                close_reason = "stream ended".to_string();
                                break;
                            }
                        }
                    }
                }
            }

            event_sink.on_event(SessionEvent::Closed {
                code: close_code,
                reason: close_reason,
            });
        });

        Ok(Box::new(RealtimeSession {
            tx: Some(tx),
            task: Some(handle),
            state: SessionState::Opened,
            mode: CommitMode::default(),
        }))
    }
}

/// Session handle returned by [`DashScopeRealtime`].
pub struct RealtimeSession {
    tx: Option<mpsc::Sender<ClientEvent>>,
    task: Option<JoinHandle<()>>,
    state: SessionState,
    mode: CommitMode,
}

impl RealtimeSession {
    async fn send(&mut self, event: ClientEvent) -> Result<(), String> {
        let Some(tx) = self.tx.as_ref() else {
            return Err("session is closed".to_string());
        };
        tx.send(event).await.map_err(|_| "connection closed".to_string())
    }
}

#[async_trait]
impl SynthesisSession for RealtimeSession {
    async fn configure(&mut self, params: &SessionParams) -> TtsResult<()> {
        debug_assert_eq!(self.state, SessionState::Opened, "configure called out of order");
        let event = ClientEvent::SessionUpdate {
            event_id: event_id(),
            session: SessionUpdate {
                voice: params.voice.clone(),
                response_format: params.response_format.format,
                sample_rate: params.response_format.sample_rate,
                mode: params.mode,
                language_type: params.language_type.clone(),
            },
        };
        match self.send(event).await {
            Ok(()) => {
                debug!("Session configured: voice={} mode={}", params.voice, params.mode.as_str());
                self.mode = params.mode;
                self.state = SessionState::Configured;
                Ok(())
            }
            Err(e) => {
                self.state = SessionState::Error;
                Err(TtsError::Configuration(e))
            }
        }
    }

    async fn append_text(&mut self, text: &str) -> TtsResult<()> {
        debug_assert!(self.state.can_append(), "append_text called in state {:?}", self.state);
        let event = ClientEvent::AppendText {
            event_id: event_id(),
            text: text.to_string(),
        };
        match self.send(event).await {
            Ok(()) => {
                self.state = SessionState::Streaming;
                Ok(())
            }
            Err(e) => {
                self.state = SessionState::Error;
                Err(TtsError::Transport(e))
            }
        }
    }

    async fn finish(&mut self) -> TtsResult<()> {
        debug_assert!(self.state.can_finish(), "finish called in state {:?}", self.state);
        let mut result = Ok(());
        if self.mode == CommitMode::Commit {
            result = self.send(ClientEvent::Commit { event_id: event_id() }).await;
        }
        if result.is_ok() {
            result = self.send(ClientEvent::Finish { event_id: event_id() }).await;
        }
        match result {
            Ok(()) => {
                info!("Realtime session input finished");
                self.state = SessionState::Finished;
                Ok(())
            }
            Err(e) => {
                self.state = SessionState::Error;
                Err(TtsError::Transport(e))
            }
        }
    }

    async fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.tx.take();
        if let Some(mut task) = self.task.take() {
            if tokio::time::timeout(CLOSE_TIMEOUT, &mut task).await.is_err() {
                warn!("Realtime connection task did not stop in time, aborting");
                task.abort();
            }
        }
        self.state = SessionState::Closed;
        info!("Realtime session closed");
    }

    fn state(&self) -> SessionState {
        self.state
    }
}

impl Drop for RealtimeSession {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
