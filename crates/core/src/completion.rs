//! Draft-aware step completion.
//!
//! A step counts as complete when either the last known server state or the
//! live draft says so. Local edits therefore unlock later steps before the
//! save round-trip confirms them. Both inputs are plain values; nothing is
//! cached.

use serde::{Deserialize, Serialize};

use crate::draft::ModuleDraft;
use crate::module::ModuleSnapshot;
use crate::wizard::WizardStepId;

/// What the service reported the last time it was asked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerCompletion {
    pub has_title: bool,
    pub has_slts: bool,
    pub has_assignment: bool,
    pub has_introduction: bool,
}

impl ServerCompletion {
    /// Derive from a module snapshot. Titles must contain visible characters.
    pub fn from_snapshot(snapshot: &ModuleSnapshot) -> Self {
        Self {
            has_title: !snapshot.module.title.trim().is_empty(),
            has_slts: !snapshot.slts.is_empty(),
            has_assignment: snapshot
                .assignment
                .as_ref()
                .is_some_and(|a| !a.title.trim().is_empty()),
            has_introduction: snapshot
                .introduction
                .as_ref()
                .is_some_and(|i| !i.title.trim().is_empty()),
        }
    }

    /// Server state right after a fully successful sync of `draft`.
    pub fn from_synced(draft: &ModuleDraft) -> Self {
        Self {
            has_title: !draft.metadata().title.trim().is_empty(),
            has_slts: !draft.slts().is_empty(),
            has_assignment: draft
                .assignment()
                .is_some_and(|a| !a.data.title.trim().is_empty()),
            has_introduction: draft
                .introduction()
                .is_some_and(|i| !i.data.title.trim().is_empty()),
        }
    }

    /// Server state after a fully successful sync of `draft`, starting from
    /// what was known before it.
    ///
    /// The service has no delete for the assignment or the introduction, so
    /// clearing one locally leaves the stored copy in place.
    pub fn after_sync(self, draft: &ModuleDraft) -> Self {
        let synced = Self::from_synced(draft);
        Self {
            has_assignment: self.has_assignment || synced.has_assignment,
            has_introduction: self.has_introduction || synced.has_introduction,
            ..synced
        }
    }
}

/// Per-step completion, one flag per wizard step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepCompletion {
    pub credential: bool,
    pub slts: bool,
    pub assignment: bool,
    pub lessons: bool,
    pub introduction: bool,
    pub review: bool,
}

impl StepCompletion {
    /// Build from the four required steps; `lessons` is optional and
    /// `review` is their conjunction.
    pub fn from_required(credential: bool, slts: bool, assignment: bool, introduction: bool) -> Self {
        Self {
            credential,
            slts,
            assignment,
            lessons: true,
            introduction,
            review: credential && slts && assignment && introduction,
        }
    }

    pub fn is_complete(&self, step: WizardStepId) -> bool {
        match step {
            WizardStepId::Credential => self.credential,
            WizardStepId::Slts => self.slts,
            WizardStepId::Assignment => self.assignment,
            WizardStepId::Lessons => self.lessons,
            WizardStepId::Introduction => self.introduction,
            WizardStepId::Review => self.review,
        }
    }
}

/// Merge server state and draft content into per-step completion.
pub fn compute_completion(server: &ServerCompletion, draft: &ModuleDraft) -> StepCompletion {
    let credential = server.has_title || !draft.metadata().title.trim().is_empty();
    let slts = server.has_slts || !draft.slts().is_empty();
    let assignment = server.has_assignment
        || draft
            .assignment()
            .is_some_and(|a| !a.data.title.trim().is_empty());
    let introduction = server.has_introduction
        || draft
            .introduction()
            .is_some_and(|i| !i.data.title.trim().is_empty());

    StepCompletion::from_required(credential, slts, assignment, introduction)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
