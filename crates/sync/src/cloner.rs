//! Duplicate a module under a new code.

use std::sync::Arc;

use modstudio_client::ModuleContentService;
use modstudio_core::draft::ModuleDraft;
use modstudio_core::error::CoreError;
use modstudio_core::validation::validate_module_code;

use crate::coordinator::{SyncCoordinator, SyncReport};
use crate::error::CloneFailure;

/// The newly created module.
#[derive(Debug, Clone)]
pub struct CloneResult {
    /// Clean draft of the copy.
    pub draft: ModuleDraft,
    pub report: SyncReport,
}

pub struct ModuleCloner {
    service: Arc<dyn ModuleContentService>,
    coordinator: SyncCoordinator,
}

impl ModuleCloner {
    pub fn new(service: Arc<dyn ModuleContentService>) -> Self {
        Self {
            coordinator: SyncCoordinator::new(Arc::clone(&service)),
            service,
        }
    }

    /// Create `new_code` in the source's course with a copy of the source's
    /// live content.
    ///
    /// The code is checked locally and against the course's module list
    /// before anything is created. If a failure happens after the new module
    /// exists it is left in place and reported as [`CloneFailure::Partial`].
    pub async fn duplicate(
        &self,
        source: &ModuleDraft,
        new_code: &str,
    ) -> Result<CloneResult, CloneFailure> {
        validate_module_code(new_code)?;
        if new_code == source.module_code() {
            return Err(CoreError::Validation(format!(
                "New module code must differ from the source code '{new_code}'"
            ))
            .into());
        }

        let existing = self
            .service
            .list_modules(source.course_id())
            .await
            .map_err(CloneFailure::Lookup)?;
        if existing.iter().any(|m| m.code == new_code) {
            return Err(CoreError::Validation(format!(
                "Module code '{new_code}' already exists in this course"
            ))
            .into());
        }

        let mut draft = source.clone_as_new(new_code);
        tracing::info!(
            course_id = %source.course_id(),
            source_code = %source.module_code(),
            new_code = %new_code,
            slts = draft.slts().len(),
            "Duplicating module",
        );

        match self.coordinator.save_and_sync(&mut draft).await {
            Ok(report) => Ok(CloneResult { draft, report }),
            Err(failure) if draft.is_created() => {
                tracing::error!(
                    new_code = %draft.module_code(),
                    step = %failure.step,
                    "Duplicate left a partially populated module",
                );
                Err(CloneFailure::Partial {
                    code: draft.module_code().to_string(),
                    failure,
                })
            }
            Err(failure) => Err(CloneFailure::Sync(failure)),
        }
    }
}
