//! Common utilities for integration tests

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use base64::Engine;
use server::{build_router, config::ServerConfig, AppState};
use tempfile::TempDir;
use tts_core::{
    EventSink, SessionConnector, SessionEvent, SessionParams, SessionState, SynthesisSession, TtsResult,
};

/// What the fake provider does once input is finished.
#[derive(Clone)]
pub enum Reply {
    Audio(Vec<Vec<u8>>),
    Error(String),
    Silence,
}

/// Observations shared between the fake provider and the test.
#[derive(Default)]
pub struct Recorded {
    pub models: Vec<String>,
    pub params: Vec<SessionParams>,
    pub appended: Vec<String>,
    pub closed: usize,
}

/// In-process stand-in for the realtime endpoint.
pub struct FakeRealtime {
    reply: Reply,
    recorded: Arc<Mutex<Recorded>>,
}

impl FakeRealtime {
    pub fn new(reply: Reply) -> (Arc<Self>, Arc<Mutex<Recorded>>) {
        let recorded = Arc::new(Mutex::new(Recorded::default()));
        let connector = Arc::new(Self {
            reply,
            recorded: Arc::clone(&recorded),
        });
        (connector, recorded)
    }
}

#[async_trait]
impl SessionConnector for FakeRealtime {
    async fn open(&self, model: &str, sink: Arc<dyn EventSink>) -> TtsResult<Box<dyn SynthesisSession>> {
        self.recorded.lock().unwrap().models.push(model.to_string());
        sink.on_event(SessionEvent::Opened);
        Ok(Box::new(FakeSession {
            reply: self.reply.clone(),
            recorded: Arc::clone(&self.recorded),
            sink,
            state: SessionState::Opened,
        }))
    }
}

struct FakeSession {
    reply: Reply,
    recorded: Arc<Mutex<Recorded>>,
    sink: Arc<dyn EventSink>,
    state: SessionState,
}

#[async_trait]
impl SynthesisSession for FakeSession {
    async fn configure(&mut self, params: &SessionParams) -> TtsResult<()> {
        self.recorded.lock().unwrap().params.push(params.clone());
        self.state = SessionState::Configured;
        Ok(())
    }

    async fn append_text(&mut self, text: &str) -> TtsResult<()> {
        self.recorded.lock().unwrap().appended.push(text.to_string());
        self.state = SessionState::Streaming;
        Ok(())
    }

    async fn finish(&mut self) -> TtsResult<()> {
        self.state = SessionState::Finished;
        match &self.reply {
            Reply::Audio(fragments) => {
                for fragment in fragments {
                    self.sink.on_event(SessionEvent::AudioDelta {
                        delta: base64::engine::general_purpose::STANDARD.encode(fragment),
                    });
                }
                self.sink.on_event(SessionEvent::SessionFinished);
            }
            Reply::Error(message) => self.sink.on_event(SessionEvent::Error {
                message: message.clone(),
            }),
            Reply::Silence => {}
        }
        Ok(())
    }

    async fn close(&mut self) {
        if self.state != SessionState::Closed {
            self.recorded.lock().unwrap().closed += 1;
            self.state = SessionState::Closed;
        }
    }

    fn state(&self) -> SessionState {
        self.state
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub recorded: Arc<Mutex<Recorded>>,
    pub output_dir: TempDir,
}

/// Test configuration: fast pacing, short timeout, HTTP APIs at `http_api_url`.
pub fn test_config(http_api_url: &str, output_dir: &TempDir) -> ServerConfig {
    ServerConfig {
        api_key: "sk-test".to_string(),
        http_api_url: http_api_url.to_string(),
        output_dir: output_dir.path().to_path_buf(),
        index_page: concat!(env!("CARGO_MANIFEST_DIR"), "/../templates/index.html").into(),
        synthesis_timeout_secs: 1,
        text_pacing_ms: 1,
        ..ServerConfig::default()
    }
}

/// Create a test app instance
pub fn create_test_app(reply: Reply, http_api_url: &str) -> TestApp {
    let output_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let (connector, recorded) = FakeRealtime::new(reply);
    let state = AppState::with_connector(test_config(http_api_url, &output_dir), connector);

    TestApp {
        router: build_router(state.clone()),
        state,
        recorded,
        output_dir,
    }
}

/// Files currently in the output directory.
pub fn output_files(app: &TestApp) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(app.output_dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

pub const NO_UPSTREAM: &str = "http://127.0.0.1:9";
