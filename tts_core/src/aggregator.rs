//! Collects the audio of one realtime session.
//!
//! The transport task calls [`AudioEventAggregator::on_event`]; the request task
//! waits on [`AudioEventAggregator::wait_for_completion`] and then reads
//! [`AudioEventAggregator::collected_audio`]. Completion is published through a
//! `watch` channel so the waiter wakes without polling.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use base64::Engine;
use tokio::sync::watch;

use crate::events::{EventSink, SessionEvent};

/// Result of a bounded wait on the aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// A terminal event arrived before the deadline.
    Completed,
    /// The deadline passed without a terminal event.
    TimedOut,
}

#[derive(Debug, Default)]
struct AggregatorState {
    fragments: Vec<Vec<u8>>,
    error: Option<String>,
    complete: bool,
}

#[derive(Debug)]
pub struct AudioEventAggregator {
    state: Mutex<AggregatorState>,
    done: watch::Sender<bool>,
}

impl Default for AudioEventAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioEventAggregator {
    pub fn new() -> Self {
        let (done, _) = watch::channel(false);
        Self {
            state: Mutex::new(AggregatorState::default()),
            done,
        }
    }

    fn lock(&self) -> MutexGuard<'_, AggregatorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record one event. Never panics on malformed input: a bad delta is
    /// recorded as the session error and completes the aggregator.
    pub fn on_event(&self, event: SessionEvent) {
        let mut state = self.lock();
        if state.complete {
            // Fragments are frozen once a terminal event has been seen.
            tracing::debug!("Ignoring event after completion: {:?}", event_kind(&event));
            return;
        }

        let terminal = event.is_terminal();
        match event {
            SessionEvent::Opened => {
                tracing::debug!("Realtime session opened");
            }
            SessionEvent::AudioDelta { delta } => {
                match base64::engine::general_purpose::STANDARD.decode(delta.as_bytes()) {
                    Ok(bytes) => state.fragments.push(bytes),
                    Err(e) => {
                        tracing::warn!("Failed to decode audio delta: {}", e);
                        state.error = Some(format!("invalid audio delta: {e}"));
                        self.complete(&mut state);
                    }
                }
            }
            SessionEvent::SessionFinished => {}
            SessionEvent::Error { message } => {
                tracing::error!("Realtime session error: {}", message);
                state.error = Some(message);
            }
            SessionEvent::Closed { code, reason } => {
                tracing::debug!("Realtime connection closed: code={:?} reason={}", code, reason);
            }
        }

        if terminal {
            self.complete(&mut state);
        }
    }

    fn complete(&self, state: &mut AggregatorState) {
        state.complete = true;
        self.done.send_replace(true);
    }

    /// Wait until a terminal event arrives or `timeout` elapses.
    pub async fn wait_for_completion(&self, timeout: Duration) -> WaitOutcome {
        let mut rx = self.done.subscribe();
        let completed = tokio::time::timeout(timeout, rx.wait_for(|done| *done))
            .await
            .is_ok();
        if completed {
            WaitOutcome::Completed
        } else {
            WaitOutcome::TimedOut
        }
    }

    /// All fragments received so far, concatenated in arrival order.
    pub fn collected_audio(&self) -> Vec<u8> {
        self.lock().fragments.concat()
    }

    pub fn error(&self) -> Option<String> {
        self.lock().error.clone()
    }

    pub fn is_complete(&self) -> bool {
        self.lock().complete
    }
}

impl EventSink for AudioEventAggregator {
    fn on_event(&self, event: SessionEvent) {
        AudioEventAggregator::on_event(self, event);
    }
}

fn event_kind(event: &SessionEvent) -> &'static str {
    match event {
        SessionEvent::Opened => "opened",
        SessionEvent::AudioDelta { .. } => "audio_delta",
        SessionEvent::SessionFinished => "session_finished",
        SessionEvent::Error { .. } => "error",
        SessionEvent::Closed { .. } => "closed",
    }
}
