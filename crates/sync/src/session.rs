//! One open module in the studio.
//!
//! A [`DraftSession`] is the single owner of a module draft for as long as
//! the module is open. It holds the last known server completion, the wizard
//! position and the edit debouncer, and it is handed the service explicitly.

use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use modstudio_client::ModuleContentService;
use modstudio_core::completion::{compute_completion, ServerCompletion, StepCompletion};
use modstudio_core::draft::ModuleDraft;
use modstudio_core::error::CoreError;
use modstudio_core::module::{ModuleRecord, ModuleStatus};
use modstudio_core::mutator::DraftEdit;
use modstudio_core::wizard::{NavigationEngine, StepStatus, WizardStepId};
use tokio::task::JoinHandle;

use crate::cloner::{CloneResult, ModuleCloner};
use crate::coordinator::{SyncCoordinator, SyncReport};
use crate::debounce::EditDebouncer;
use crate::error::{SessionError, SyncFailure};

pub struct DraftSession {
    service: Arc<dyn ModuleContentService>,
    coordinator: SyncCoordinator,
    cloner: ModuleCloner,
    draft: ModuleDraft,
    server: ServerCompletion,
    status: ModuleStatus,
    navigation: NavigationEngine,
    debouncer: EditDebouncer,
    last_saved_at: Option<DateTime<Utc>>,
}

impl DraftSession {
    fn with_draft(
        service: Arc<dyn ModuleContentService>,
        draft: ModuleDraft,
        server: ServerCompletion,
        status: ModuleStatus,
        debounce: Duration,
    ) -> Self {
        Self {
            coordinator: SyncCoordinator::new(Arc::clone(&service)),
            cloner: ModuleCloner::new(Arc::clone(&service)),
            service,
            draft,
            server,
            status,
            navigation: NavigationEngine::new(),
            debouncer: EditDebouncer::new(debounce),
            last_saved_at: None,
        }
    }

    /// Open an existing module with a clean draft.
    pub async fn open(
        service: Arc<dyn ModuleContentService>,
        course_id: &str,
        module_code: &str,
        debounce: Duration,
    ) -> Result<Self, SessionError> {
        let snapshot = service.get_module(course_id, module_code).await?;
        tracing::info!(
            course_id = %course_id,
            module_code = %module_code,
            slts = snapshot.slts.len(),
            lessons = snapshot.lessons.len(),
            "Module opened",
        );
        Ok(Self::with_draft(
            service,
            ModuleDraft::from_snapshot(course_id, &snapshot),
            ServerCompletion::from_snapshot(&snapshot),
            snapshot.module.status,
            debounce,
        ))
    }

    /// Start a module that does not exist on the service yet.
    pub fn new_module(
        service: Arc<dyn ModuleContentService>,
        course_id: &str,
        debounce: Duration,
    ) -> Self {
        Self::with_draft(
            service,
            ModuleDraft::new_module(course_id),
            ServerCompletion::default(),
            ModuleStatus::Draft,
            debounce,
        )
    }

    // -- read access --

    /// The draft without edits still waiting in the debouncer.
    pub fn draft(&self) -> &ModuleDraft {
        &self.draft
    }

    pub fn status(&self) -> ModuleStatus {
        self.status
    }

    pub fn current_step(&self) -> WizardStepId {
        self.navigation.current()
    }

    pub fn navigation(&self) -> &NavigationEngine {
        &self.navigation
    }

    pub fn last_saved_at(&self) -> Option<DateTime<Utc>> {
        self.last_saved_at
    }

    pub fn has_pending_edits(&self) -> bool {
        self.debouncer.is_pending()
    }

    /// Unsaved work exists, either folded into the draft or still pending.
    pub fn has_unsaved_changes(&self) -> bool {
        self.draft.is_dirty() || self.debouncer.is_pending()
    }

    /// The draft as it will be once pending edits are folded in.
    fn effective_draft(&self) -> Cow<'_, ModuleDraft> {
        if !self.debouncer.is_pending() {
            return Cow::Borrowed(&self.draft);
        }
        let mut draft = self.draft.clone();
        for edit in self.debouncer.pending() {
            if let Err(e) = edit.clone().apply_to(&mut draft) {
                tracing::warn!(error = %e, "Pending edit no longer applies");
            }
        }
        Cow::Owned(draft)
    }

    // -- editing --

    /// Apply an edit. Text edits are parked in the debouncer; anything
    /// structural flushes pending edits and applies immediately.
    pub fn apply(&mut self, edit: DraftEdit) -> Result<(), SessionError> {
        match edit.coalesce_key() {
            Some(key) => {
                // Surface rejections now rather than when the window closes.
                self.effective_draft().with_edit(edit.clone())?;
                self.debouncer.push(key, edit);
            }
            None => {
                self.fold_pending();
                edit.apply_to(&mut self.draft)?;
            }
        }
        Ok(())
    }

    /// Wait until the debounce window closes with edits pending. `None`
    /// once the session is closing.
    pub async fn debounce_elapsed(&self) -> Option<usize> {
        self.debouncer.ready().await
    }

    /// Apply every pending edit to the draft. Returns how many were applied.
    ///
    /// An edit that no longer applies is logged and dropped; the ones after
    /// it are still applied.
    pub fn fold_pending(&mut self) -> usize {
        let mut applied = 0;
        for edit in self.debouncer.take() {
            match edit.apply_to(&mut self.draft) {
                Ok(()) => applied += 1,
                Err(e) => tracing::warn!(error = %e, "Dropping pending edit that no longer applies"),
            }
        }
        applied
    }

    // -- completion and navigation --

    pub fn completion(&self) -> StepCompletion {
        compute_completion(&self.server, &self.effective_draft())
    }

    pub fn step_status(&self, step: WizardStepId) -> StepStatus {
        self.navigation.status(step, &self.completion())
    }

    pub fn go_to_step(&mut self, step: WizardStepId) -> bool {
        let completion = self.completion();
        self.navigation.go_to_step(step, &completion)
    }

    pub fn go_next(&mut self) -> bool {
        let completion = self.completion();
        self.navigation.go_next(&completion)
    }

    pub fn go_previous(&mut self) -> bool {
        let completion = self.completion();
        self.navigation.go_previous(&completion)
    }

    /// Save, then move to `step` if it is unlocked.
    pub async fn save_and_go_to(&mut self, step: WizardStepId) -> Result<bool, SessionError> {
        self.save().await?;
        Ok(self.go_to_step(step))
    }

    // -- persistence --

    /// Fold pending edits and sync the draft.
    ///
    /// If the service's answers diverged from the draft, the draft is
    /// rebuilt from a fresh snapshot afterwards.
    pub async fn save(&mut self) -> Result<SyncReport, SessionError> {
        self.fold_pending();
        let report = self.coordinator.save_and_sync(&mut self.draft).await?;
        if report.is_noop() {
            return Ok(report);
        }

        self.server = self.server.after_sync(&self.draft);
        self.last_saved_at = Some(Utc::now());

        if report.needs_resync() {
            tracing::warn!(
                module_code = %self.draft.module_code(),
                divergences = report.divergence.len(),
                "Resyncing after divergence",
            );
            self.resync(true).await?;
        }
        Ok(report)
    }

    /// Replace the draft with the service's current state.
    ///
    /// Refuses while there are unsaved changes unless `force` is set.
    pub async fn resync(&mut self, force: bool) -> Result<(), SessionError> {
        if !self.draft.is_created() {
            return Err(SessionError::NotCreated);
        }
        if !force && self.has_unsaved_changes() {
            return Err(SessionError::UnsavedChanges);
        }

        let course_id = self.draft.course_id().to_string();
        let code = self.draft.module_code().to_string();
        let snapshot = self.service.get_module(&course_id, &code).await?;

        self.debouncer.reset();
        self.draft = ModuleDraft::from_snapshot(course_id, &snapshot);
        self.server = ServerCompletion::from_snapshot(&snapshot);
        self.status = snapshot.module.status;

        let completion = self.completion();
        if !NavigationEngine::unlocked(self.navigation.current(), &completion) {
            self.navigation = NavigationEngine::new();
        }
        tracing::info!(module_code = %code, "Draft rebuilt from service");
        Ok(())
    }

    /// Save, then move the module from draft to approved.
    pub async fn submit_for_approval(&mut self) -> Result<ModuleRecord, SessionError> {
        self.save().await?;

        let completion = self.completion();
        if let Some(step) = WizardStepId::ALL
            .into_iter()
            .find(|step| !completion.is_complete(*step))
        {
            return Err(SessionError::Incomplete(step.label()));
        }
        if !self.status.can_transition_to(ModuleStatus::Approved) {
            return Err(CoreError::Validation(format!(
                "Module in status '{}' cannot be submitted for approval",
                self.status.as_str()
            ))
            .into());
        }

        let record = self
            .service
            .set_module_status(
                self.draft.course_id(),
                self.draft.module_code(),
                ModuleStatus::Approved,
            )
            .await?;
        self.status = record.status;
        tracing::info!(
            course_id = %self.draft.course_id(),
            module_code = %record.code,
            "Module submitted for approval",
        );
        Ok(record)
    }

    /// Copy the module, including unsaved edits, under `new_code`.
    pub async fn duplicate(&mut self, new_code: &str) -> Result<CloneResult, SessionError> {
        self.fold_pending();
        Ok(self.cloner.duplicate(&self.draft, new_code).await?)
    }

    /// Stop the debouncer and, if anything is unsaved, save a copy of the
    /// draft in the background. Must be called from within a Tokio runtime.
    pub fn close(mut self) -> Option<JoinHandle<Result<SyncReport, SyncFailure>>> {
        self.fold_pending();
        self.debouncer.cancel();

        if !self.draft.is_dirty() {
            return None;
        }

        let coordinator = self.coordinator.clone();
        let mut draft = self.draft;
        Some(tokio::spawn(async move {
            let result = coordinator.save_and_sync(&mut draft).await;
            match &result {
                Ok(report) if report.needs_resync() => tracing::warn!(
                    module_code = %draft.module_code(),
                    divergences = report.divergence.len(),
                    "Saved on close, but the service diverges from the draft",
                ),
                Ok(_) => {}
                Err(failure) => tracing::error!(
                    module_code = %draft.module_code(),
                    error = %failure,
                    "Save on close failed",
                ),
            }
            result
        }))
    }
}

#[cfg(test)]
mod tests {
    use modstudio_client::InMemoryModuleService;
    use modstudio_core::module::{ModuleSnapshot, SltRecord};

    use super::*;

    const WINDOW: Duration = Duration::from_millis(500);

    fn update_slt(index: u32, text: &str) -> DraftEdit {
        DraftEdit::UpdateSlt {
            index,
            text: text.to_string(),
        }
    }

    fn park(session: &mut DraftSession, edit: DraftEdit) {
        let key = edit.coalesce_key().unwrap();
        session.debouncer.push(key, edit);
    }

    async fn open_seeded() -> DraftSession {
        let service = Arc::new(InMemoryModuleService::new());
        let snapshot = ModuleSnapshot {
            module: ModuleRecord {
                code: "101".to_string(),
                title: "Plutus Basics".to_string(),
                description: String::new(),
                status: ModuleStatus::Draft,
            },
            slts: vec![SltRecord {
                index: 1,
                text: "S1".to_string(),
            }],
            assignment: None,
            introduction: None,
            lessons: Vec::new(),
        };
        service.seed_module("course-1", snapshot).await;
        DraftSession::open(service, "course-1", "101", WINDOW)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn fold_keeps_edits_after_one_that_no_longer_applies() {
        let mut session = open_seeded().await;
        park(&mut session, update_slt(9, "gone"));
        park(&mut session, update_slt(1, "S1 revised"));

        assert_eq!(session.fold_pending(), 1);
        assert!(!session.has_pending_edits());
        assert_eq!(session.draft().slt(1).unwrap().text, "S1 revised");
    }

    #[tokio::test]
    async fn resync_cancels_the_debounce_timer() {
        let mut session = open_seeded().await;
        session.apply(update_slt(1, "S1 revised")).unwrap();
        let token = session.debouncer.cancellation_token();

        session.resync(true).await.unwrap();

        assert!(token.is_cancelled());
        assert!(!session.has_pending_edits());
        assert_eq!(session.draft().slt(1).unwrap().text, "S1");

        // The new draft accepts edits on a fresh timer.
        session.apply(update_slt(1, "S1 again")).unwrap();
        assert!(session.has_pending_edits());
        assert!(!session.debouncer.is_cancelled());
    }
}
