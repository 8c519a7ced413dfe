//! User-facing progress of a deploy or delete run.
//!
//! Separate from logging: the engine reports named stages here and the CLI
//! decides how to draw them.

use std::sync::{Arc, Mutex};

/// Receives stage events. Every method defaults to doing nothing.
pub trait StageReporter: Send + Sync {
    fn stage_started(&self, _name: &str) {}

    fn stage_finished(&self, _name: &str) {}

    fn stage_skipped(&self, _name: &str, _reason: &str) {}

    fn stage_failed(&self, _name: &str, _error: &str) {}

    /// A tolerated failure the user should know about
    fn warn(&self, _message: &str) {}

    /// The run is about to fail with `message`
    fn error(&self, _message: &str) {}
}

/// Reporter that discards everything
pub struct NoReporter;

impl StageReporter for NoReporter {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageEvent {
    Started(String),
    Finished(String),
    Skipped(String),
    Failed(String),
    Warning(String),
    Error(String),
}

/// Keeps every event, for assertions
#[derive(Debug, Clone, Default)]
pub struct RecordingReporter {
    events: Arc<Mutex<Vec<StageEvent>>>,
}

impl RecordingReporter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn events(&self) -> Vec<StageEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn warnings(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                StageEvent::Warning(message) => Some(message),
                _ => None,
            })
            .collect()
    }

    #[must_use]
    pub fn errors(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                StageEvent::Error(message) => Some(message),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: StageEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl StageReporter for RecordingReporter {
    fn stage_started(&self, name: &str) {
        self.push(StageEvent::Started(name.to_string()));
    }

    fn stage_finished(&self, name: &str) {
        self.push(StageEvent::Finished(name.to_string()));
    }

    fn stage_skipped(&self, name: &str, _reason: &str) {
        self.push(StageEvent::Skipped(name.to_string()));
    }

    fn stage_failed(&self, name: &str, _error: &str) {
        self.push(StageEvent::Failed(name.to_string()));
    }

    fn warn(&self, message: &str) {
        self.push(StageEvent::Warning(message.to_string()));
    }

    fn error(&self, message: &str) {
        self.push(StageEvent::Error(message.to_string()));
    }
}
