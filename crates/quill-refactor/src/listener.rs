//! Lifecycle notifications.

use serde::Serialize;

/// Sent before the tree is rewritten and again once the rewrite succeeded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RefactoringEvent {
    /// Unique per session.
    pub id: u64,
    /// `inline.local`, `inline.method`, ...
    pub refactoring: &'static str,
    /// Top-level declarations whose text may change.
    pub affected: Vec<String>,
}

pub trait RefactoringListener: Send + Sync {
    fn started(&self, _event: &RefactoringEvent) {}

    fn done(&self, _event: &RefactoringEvent) {}
}

/// Logs every event as JSON.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingListener;

impl TracingListener {
    fn log(phase: &str, event: &RefactoringEvent) {
        match serde_json::to_string(event) {
            Ok(json) => tracing::info!(target: "quill.refactor", phase, event = %json),
            Err(err) => {
                tracing::warn!(target: "quill.refactor", phase, %err, "failed to encode event")
            }
        }
    }
}

impl RefactoringListener for TracingListener {
    fn started(&self, event: &RefactoringEvent) {
        Self::log("started", event);
    }

    fn done(&self, event: &RefactoringEvent) {
        Self::log("done", event);
    }
}
