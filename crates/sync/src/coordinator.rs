//! Drains a [`ModuleDraft`] against the module-content service.
//!
//! Call order matters because the service addresses learning targets by
//! position:
//!
//! 1. module create (or metadata update)
//! 2. SLT deletes (highest index first), creates (the service appends),
//!    text updates, then one reorder if positions still differ
//! 3. assignment, then introduction, each with a single create-conflict retry
//! 4. lessons, concurrently, once target positions are settled
//!
//! Each successful call is committed into the draft before the next one is
//! issued, so a failure leaves the draft describing exactly what remains.
//!
//! If a create lands at a position other than the expected one, or the
//! draft's order is not a permutation of the positions it knows, the reorder
//! is not sent and the divergence is reported. Such a pass is not a full
//! success: the draft stays dirty and is only usable after a resync.

use std::sync::Arc;

use futures::future::join_all;
use modstudio_client::{ModuleContentService, ServiceError};
use modstudio_core::draft::ModuleDraft;
use modstudio_core::module::{LessonContent, ModuleMetadata, NewModule};
use modstudio_core::reconcile::{diff_slts, is_full_permutation, SltDivergence};
use modstudio_core::types::{LocalId, SltIndex};
use serde::Serialize;

use crate::error::{SyncError, SyncFailure, SyncStep};

/// What a successful sync pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Service calls that succeeded and were committed.
    pub calls: usize,
    pub module_created: bool,
    /// Creates that hit a conflict and were retried as updates.
    pub conflicts_retried: usize,
    pub reordered: bool,
    /// Disagreements between the service's answers and the draft.
    pub divergence: Vec<SltDivergence>,
}

impl SyncReport {
    /// Nothing needed saving.
    pub fn is_noop(&self) -> bool {
        self.calls == 0 && !self.module_created && self.divergence.is_empty()
    }

    pub fn has_divergence(&self) -> bool {
        !self.divergence.is_empty()
    }

    /// The draft no longer matches the service and must be rebuilt from a
    /// fresh snapshot before it is saved again.
    pub fn needs_resync(&self) -> bool {
        self.has_divergence()
    }
}

/// Aggregate outcome of a save, for presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveStatus {
    Saved,
    /// Calls landed but the service disagrees with the draft; resync first.
    Diverged,
    /// Some calls were committed; the draft still holds the remainder.
    Partial,
    /// Nothing reached the service.
    Failed,
}

impl SaveStatus {
    pub fn of(result: &Result<SyncReport, SyncFailure>) -> Self {
        match result {
            Ok(report) if report.needs_resync() => Self::Diverged,
            Ok(_) => Self::Saved,
            Err(failure) if failure.is_partial() => Self::Partial,
            Err(_) => Self::Failed,
        }
    }
}

type StepResult = Result<(), (SyncStep, SyncError)>;

fn at(step: SyncStep) -> impl FnOnce(ServiceError) -> (SyncStep, SyncError) {
    move |e| (step, SyncError::Service(e))
}

enum LessonOp {
    Save { content: LessonContent, is_new: bool },
    Delete,
}

#[derive(Clone)]
pub struct SyncCoordinator {
    service: Arc<dyn ModuleContentService>,
}

impl SyncCoordinator {
    pub fn new(service: Arc<dyn ModuleContentService>) -> Self {
        Self { service }
    }

    /// Persist every dirty part of `draft` and clear its markers.
    ///
    /// A clean draft returns an empty report without touching the service.
    /// A report with [`SyncReport::needs_resync`] set leaves the draft dirty.
    /// Saving it again sends nothing further until it is rebuilt.
    pub async fn save_and_sync(&self, draft: &mut ModuleDraft) -> Result<SyncReport, SyncFailure> {
        if !draft.is_dirty() {
            tracing::debug!(module_code = %draft.module_code(), "Draft is clean, nothing to sync");
            return Ok(SyncReport::default());
        }
        if !self.service.is_authorized() {
            return Err(SyncFailure::new(
                SyncStep::Preconditions,
                SyncError::Unauthorized,
                0,
            ));
        }
        draft
            .validate_for_sync()
            .map_err(|e| SyncFailure::new(SyncStep::Preconditions, e, 0))?;

        let mut report = SyncReport::default();
        match self.run(draft, &mut report).await {
            Ok(()) if report.needs_resync() => {
                tracing::warn!(
                    course_id = %draft.course_id(),
                    module_code = %draft.module_code(),
                    calls = report.calls,
                    divergences = report.divergence.len(),
                    "Service SLT positions diverge from the draft, resync required",
                );
                Ok(report)
            }
            Ok(()) => {
                tracing::info!(
                    course_id = %draft.course_id(),
                    module_code = %draft.module_code(),
                    calls = report.calls,
                    conflicts_retried = report.conflicts_retried,
                    reordered = report.reordered,
                    "Module draft synced",
                );
                Ok(report)
            }
            Err((step, error)) => {
                tracing::error!(
                    course_id = %draft.course_id(),
                    module_code = %draft.module_code(),
                    step = %step,
                    committed_calls = report.calls,
                    error = %error,
                    "Module draft sync failed",
                );
                Err(SyncFailure::new(step, error, report.calls))
            }
        }
    }

    async fn run(&self, draft: &mut ModuleDraft, report: &mut SyncReport) -> StepResult {
        self.sync_module(draft, report).await?;
        self.sync_slts(draft, report).await?;
        self.sync_assignment(draft, report)
            .await
            .map_err(|e| (SyncStep::Assignment, e))?;
        self.sync_introduction(draft, report)
            .await
            .map_err(|e| (SyncStep::Introduction, e))?;
        self.sync_lessons(draft, report)
            .await
            .map_err(|e| (SyncStep::Lessons, e))
    }

    // ---------------------------------------------------------------------
    // Module record
    // ---------------------------------------------------------------------

    async fn sync_module(&self, draft: &mut ModuleDraft, report: &mut SyncReport) -> StepResult {
        let course_id = draft.course_id().to_string();
        let metadata = draft.metadata();

        if !draft.is_created() {
            let new_module = NewModule {
                code: draft.module_code().to_string(),
                title: metadata.title.clone(),
                description: metadata.description.clone(),
            };
            let record = self
                .service
                .create_module(&course_id, &new_module)
                .await
                .map_err(at(SyncStep::Module))?;
            if record.code != new_module.code {
                tracing::info!(
                    requested = %new_module.code,
                    assigned = %record.code,
                    "Service assigned a different module code",
                );
            }
            tracing::info!(course_id = %course_id, module_code = %record.code, "Module created");
            draft.mark_module_created(record.code);
            report.module_created = true;
            report.calls += 1;
        } else if metadata.flags.is_modified {
            let body = ModuleMetadata {
                title: metadata.title.clone(),
                description: metadata.description.clone(),
            };
            self.service
                .update_module(&course_id, draft.module_code(), &body)
                .await
                .map_err(at(SyncStep::Module))?;
            draft.mark_metadata_synced();
            report.calls += 1;
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Learning targets
    // ---------------------------------------------------------------------

    async fn sync_slts(&self, draft: &mut ModuleDraft, report: &mut SyncReport) -> StepResult {
        let course_id = draft.course_id().to_string();
        let code = draft.module_code().to_string();

        // Highest first, so pending indices stay valid as the service compacts.
        let mut deletions: Vec<(LocalId, SltIndex)> = draft
            .deleted_slts()
            .iter()
            .filter_map(|slt| slt.server_index.map(|index| (slt.id, index)))
            .collect();
        deletions.sort_by(|a, b| b.1.cmp(&a.1));

        for (id, index) in deletions {
            self.service
                .delete_slt(&course_id, &code, index)
                .await
                .map_err(at(SyncStep::SltDelete))?;
            tracing::debug!(module_code = %code, slt_index = index, "SLT deleted");
            draft.mark_slt_deleted(id);
            report.calls += 1;
        }

        let creations: Vec<(LocalId, String)> = draft
            .slts()
            .iter()
            .filter(|slt| slt.flags.is_new)
            .map(|slt| (slt.id, slt.text.clone()))
            .collect();
        let mut expected = draft.slts().iter().filter(|s| s.is_persisted()).count() as SltIndex;

        for (id, text) in creations {
            expected += 1;
            let record = self
                .service
                .create_slt(&course_id, &code, &text)
                .await
                .map_err(at(SyncStep::SltCreate))?;
            if record.index != expected {
                tracing::warn!(
                    module_code = %code,
                    expected,
                    actual = record.index,
                    "Service assigned an unexpected SLT index",
                );
                report.divergence.push(SltDivergence::IndexMismatch {
                    text,
                    expected,
                    actual: record.index,
                });
            }
            draft.mark_slt_created(id, record.index);
            report.calls += 1;
        }

        let updates: Vec<(LocalId, SltIndex, String)> = draft
            .slts()
            .iter()
            .filter(|slt| slt.flags.is_modified)
            .filter_map(|slt| slt.server_index.map(|index| (slt.id, index, slt.text.clone())))
            .collect();

        for (id, index, text) in updates {
            self.service
                .update_slt(&course_id, &code, index, &text)
                .await
                .map_err(at(SyncStep::SltUpdate))?;
            draft.mark_slt_updated(id);
            report.calls += 1;
        }

        // The service holds targets the draft does not know about, so the
        // draft's order cannot be expressed as a permutation of its indices.
        if report.has_divergence() {
            if draft.needs_reorder() {
                tracing::warn!(module_code = %code, "Skipping SLT reorder until the draft is resynced");
            }
            return Ok(());
        }

        if draft.needs_reorder() {
            let order: Vec<SltIndex> = draft.slts().iter().filter_map(|s| s.server_index).collect();
            if !is_full_permutation(&order) {
                tracing::warn!(
                    module_code = %code,
                    order = ?order,
                    "SLT order does not match known positions, not sending reorder",
                );
                report.divergence.push(SltDivergence::UnresolvedOrder { order });
                return Ok(());
            }
            let records = self
                .service
                .reorder_slts(&course_id, &code, &order)
                .await
                .map_err(at(SyncStep::SltReorder))?;
            tracing::debug!(module_code = %code, order = ?order, "SLTs reordered");
            draft.mark_slts_reordered();
            report.reordered = true;
            report.calls += 1;
            report.divergence.extend(diff_slts(draft, &records));
        }

        Ok(())
    }

    // ---------------------------------------------------------------------
    // Assignment and introduction
    // ---------------------------------------------------------------------

    async fn sync_assignment(
        &self,
        draft: &mut ModuleDraft,
        report: &mut SyncReport,
    ) -> Result<(), SyncError> {
        let Some(assignment) = draft.assignment().filter(|a| a.flags.is_dirty()) else {
            return Ok(());
        };
        let content = assignment.data.clone();
        let is_new = assignment.flags.is_new;
        let course_id = draft.course_id();
        let code = draft.module_code();

        if !is_new {
            self.service.update_assignment(course_id, code, &content).await?;
        } else {
            match self.service.create_assignment(course_id, code, &content).await {
                Ok(_) => {}
                Err(e) if e.is_conflict() => {
                    tracing::warn!(
                        module_code = %code,
                        error = %e,
                        "Assignment already exists, retrying as update",
                    );
                    let existing = self.service.get_assignment(course_id, code).await?;
                    report.calls += 1;
                    if existing.as_ref() != Some(&content) {
                        tracing::info!(module_code = %code, "Replacing server assignment with draft");
                    }
                    self.service.update_assignment(course_id, code, &content).await?;
                    report.conflicts_retried += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }

        draft.mark_assignment_synced();
        report.calls += 1;
        Ok(())
    }

    async fn sync_introduction(
        &self,
        draft: &mut ModuleDraft,
        report: &mut SyncReport,
    ) -> Result<(), SyncError> {
        let Some(introduction) = draft.introduction().filter(|i| i.flags.is_dirty()) else {
            return Ok(());
        };
        let content = introduction.data.clone();
        let is_new = introduction.flags.is_new;
        let course_id = draft.course_id();
        let code = draft.module_code();

        if !is_new {
            self.service
                .update_introduction(course_id, code, &content)
                .await?;
        } else {
            match self
                .service
                .create_introduction(course_id, code, &content)
                .await
            {
                Ok(_) => {}
                Err(e) if e.is_conflict() => {
                    tracing::warn!(
                        module_code = %code,
                        error = %e,
                        "Introduction already exists, retrying as update",
                    );
                    let existing = self.service.get_introduction(course_id, code).await?;
                    report.calls += 1;
                    if existing.as_ref() != Some(&content) {
                        tracing::info!(module_code = %code, "Replacing server introduction with draft");
                    }
                    self.service
                        .update_introduction(course_id, code, &content)
                        .await?;
                    report.conflicts_retried += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }

        draft.mark_introduction_synced();
        report.calls += 1;
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Lessons
    // ---------------------------------------------------------------------

    /// Issue all lesson calls at once. Successes are committed even when a
    /// sibling fails; the first failure in SLT order is returned.
    async fn sync_lessons(
        &self,
        draft: &mut ModuleDraft,
        report: &mut SyncReport,
    ) -> Result<(), SyncError> {
        let ops: Vec<(LocalId, SltIndex, LessonOp)> = draft
            .slts()
            .iter()
            .filter_map(|slt| {
                let lesson = slt.lesson.as_ref().filter(|l| l.flags.is_dirty())?;
                let index = slt.server_index?;
                let op = if lesson.flags.is_deleted {
                    LessonOp::Delete
                } else {
                    LessonOp::Save {
                        content: lesson.data.clone(),
                        is_new: lesson.flags.is_new,
                    }
                };
                Some((slt.id, index, op))
            })
            .collect();

        if ops.is_empty() {
            return Ok(());
        }

        let course_id = draft.course_id().to_string();
        let code = draft.module_code().to_string();

        let calls = ops.iter().map(|(_, index, op)| {
            let (course_id, code) = (&course_id, &code);
            async move {
                match op {
                    LessonOp::Save {
                        content,
                        is_new: true,
                    } => self
                        .service
                        .create_lesson(course_id, code, *index, content)
                        .await
                        .map(|_| ()),
                    LessonOp::Save { content, .. } => self
                        .service
                        .update_lesson(course_id, code, *index, content)
                        .await
                        .map(|_| ()),
                    LessonOp::Delete => self.service.delete_lesson(course_id, code, *index).await,
                }
            }
        });
        let results = join_all(calls).await;

        let mut first_error = None;
        for ((id, index, op), result) in ops.iter().zip(results) {
            match result {
                Ok(()) => {
                    match op {
                        LessonOp::Delete => draft.mark_lesson_deleted(*id),
                        LessonOp::Save { .. } => draft.mark_lesson_saved(*id),
                    }
                    report.calls += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        module_code = %code,
                        slt_index = *index,
                        error = %e,
                        "Lesson sync failed",
                    );
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }
}
