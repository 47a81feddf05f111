use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::InlineError;

/// Cooperative cancellation of the reference search.
///
/// Clones share the same flag, so a token handed to another thread can stop
/// a running search. Once the commit phase starts the token is ignored.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Clears a previous cancellation so the token can be reused.
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }

    pub fn check(&self) -> Result<(), InlineError> {
        if self.is_cancelled() {
            tracing::debug!(target: "quill.refactor", "search cancelled");
            Err(InlineError::Cancelled)
        } else {
            Ok(())
        }
    }
}
