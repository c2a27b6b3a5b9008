use std::fmt;

use modstudio_client::ServiceError;
use modstudio_core::error::CoreError;
use serde::Serialize;

/// Why a sync call failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Service(#[from] ServiceError),

    /// The caller holds no credentials; checked before any call.
    #[error("Not authorized to save module changes")]
    Unauthorized,
}

impl SyncError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Service(e) if e.is_transient())
    }
}

/// The logical step a sync pass was in when it stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStep {
    Preconditions,
    Module,
    SltDelete,
    SltCreate,
    SltUpdate,
    SltReorder,
    Assignment,
    Introduction,
    Lessons,
}

impl SyncStep {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Preconditions => "preconditions",
            Self::Module => "module",
            Self::SltDelete => "slt_delete",
            Self::SltCreate => "slt_create",
            Self::SltUpdate => "slt_update",
            Self::SltReorder => "slt_reorder",
            Self::Assignment => "assignment",
            Self::Introduction => "introduction",
            Self::Lessons => "lessons",
        }
    }
}

impl fmt::Display for SyncStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A sync pass that stopped early.
///
/// Everything committed before the failure stays committed, on the service
/// and in the draft. What was not reached keeps its dirty markers, so calling
/// save again picks up exactly the remainder.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Save failed at step {step} after {committed_calls} committed calls: {error}")]
pub struct SyncFailure {
    pub step: SyncStep,
    #[source]
    pub error: SyncError,
    pub committed_calls: usize,
}

impl SyncFailure {
    pub fn new(step: SyncStep, error: impl Into<SyncError>, committed_calls: usize) -> Self {
        Self {
            step,
            error: error.into(),
            committed_calls,
        }
    }

    /// Some server effects landed before the failure.
    pub fn is_partial(&self) -> bool {
        self.committed_calls > 0
    }
}

/// Failure of a module duplication.
#[derive(Debug, thiserror::Error)]
pub enum CloneFailure {
    /// Rejected before anything was sent.
    #[error(transparent)]
    Validation(#[from] CoreError),

    /// The existing module list could not be fetched.
    #[error("Could not check existing module codes: {0}")]
    Lookup(#[source] ServiceError),

    /// Failed before the new module was created; nothing to clean up.
    #[error(transparent)]
    Sync(SyncFailure),

    /// Failed after the new module was created.
    #[error(
        "Module {code} was created but not fully populated and may need manual cleanup: {failure}"
    )]
    Partial {
        code: String,
        #[source]
        failure: SyncFailure,
    },
}

/// Errors surfaced by a [`crate::DraftSession`].
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error(transparent)]
    Sync(#[from] SyncFailure),

    #[error(transparent)]
    Clone(#[from] CloneFailure),

    /// A resync would discard local edits.
    #[error("Draft has unsaved changes; save first or force the resync")]
    UnsavedChanges,

    /// The operation needs the module to exist on the service.
    #[error("Module has not been created yet")]
    NotCreated,

    /// Submission requires every required step to be complete.
    #[error("Step '{0}' is not complete")]
    Incomplete(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_message_names_step_and_cause() {
        let failure = SyncFailure::new(
            SyncStep::SltCreate,
            ServiceError::Transport("connection reset".to_string()),
            2,
        );
        let msg = failure.to_string();
        assert!(msg.contains("slt_create"));
        assert!(msg.contains("connection reset"));
        assert!(failure.is_partial());
        assert!(failure.error.is_transient());
    }

    #[test]
    fn partial_clone_mentions_cleanup() {
        let failure = CloneFailure::Partial {
            code: "102".to_string(),
            failure: SyncFailure::new(SyncStep::Lessons, SyncError::Unauthorized, 3),
        };
        assert!(failure.to_string().contains("manual cleanup"));
    }
}
