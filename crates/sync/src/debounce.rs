//! Coalescing of field-level edits over a quiescence window.
//!
//! Text edits arrive per keystroke. Instead of applying each one, the
//! session parks the latest edit per field here and folds them into the
//! draft once input has been quiet for the window.

use std::time::Duration;

use modstudio_core::mutator::{DraftEdit, EditKey};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Default quiescence window.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Pending edits keyed by field, with a restartable deadline.
#[derive(Debug)]
pub struct EditDebouncer {
    window: Duration,
    /// Latest edit per key, in first-push order.
    pending: Vec<(EditKey, DraftEdit)>,
    deadline: Option<Instant>,
    cancel: CancellationToken,
}

impl Default for EditDebouncer {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

impl EditDebouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: Vec::new(),
            deadline: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn is_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Pending edits in the order they will be applied.
    pub fn pending(&self) -> impl Iterator<Item = &DraftEdit> {
        self.pending.iter().map(|(_, edit)| edit)
    }

    /// Token that stops [`ready`](Self::ready) from another task.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Park `edit` under `key`, replacing any pending edit for the same key,
    /// and restart the window. Ignored once cancelled.
    pub fn push(&mut self, key: EditKey, edit: DraftEdit) {
        if self.is_cancelled() {
            tracing::debug!(?key, "Debouncer cancelled, dropping edit");
            return;
        }
        match self.pending.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = edit,
            None => self.pending.push((key, edit)),
        }
        self.deadline = Some(Instant::now() + self.window);
    }

    /// Wait until the window has elapsed with edits pending.
    ///
    /// Returns the number of pending edits, or `None` once cancelled. With
    /// nothing pending this only completes on cancellation, so it is meant
    /// to sit in a `tokio::select!` next to the input source.
    pub async fn ready(&self) -> Option<usize> {
        let Some(deadline) = self.deadline else {
            self.cancel.cancelled().await;
            return None;
        };
        tokio::select! {
            _ = self.cancel.cancelled() => None,
            _ = tokio::time::sleep_until(deadline) => Some(self.pending.len()),
        }
    }

    /// Drain pending edits in order and disarm the timer.
    pub fn take(&mut self) -> Vec<DraftEdit> {
        self.deadline = None;
        self.pending.drain(..).map(|(_, edit)| edit).collect()
    }

    /// Drop pending edits and stop the timer for good.
    pub fn cancel(&mut self) {
        if !self.pending.is_empty() {
            tracing::debug!(dropped = self.pending.len(), "Debouncer cancelled with pending edits");
        }
        self.cancel.cancel();
        self.pending.clear();
        self.deadline = None;
    }

    /// Start over for a new draft identity.
    pub fn reset(&mut self) {
        self.cancel.cancel();
        self.cancel = CancellationToken::new();
        self.pending.clear();
        self.deadline = None;
    }
}
