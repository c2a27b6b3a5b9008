//! Draft mutation operations.
//!
//! Every operation is synchronous and either applies completely or leaves
//! the draft untouched and returns the reason. Nothing here talks to the
//! network; the sync layer picks up the dirty markers later.

use serde::{Deserialize, Serialize};

use crate::draft::{ModuleDraft, SlotDraft, SltDraft};
use crate::error::CoreError;
use crate::module::{AssignmentContent, IntroductionContent, LessonContent};
use crate::types::SltIndex;
use crate::validation::{require_text, validate_module_code};

impl ModuleDraft {
    /// Replace the module title and description.
    pub fn set_metadata(&mut self, title: impl Into<String>, description: impl Into<String>) {
        let title = title.into();
        let description = description.into();
        if self.metadata.title == title && self.metadata.description == description {
            return;
        }
        self.metadata.title = title;
        self.metadata.description = description;
        self.metadata.flags.mark_modified();
    }

    /// Choose the module code. Only allowed before the module is created.
    pub fn set_module_code(&mut self, code: &str) -> Result<(), CoreError> {
        if self.is_created() {
            return Err(CoreError::Validation(format!(
                "Module code '{}' cannot change after the module is created",
                self.module_code()
            )));
        }
        validate_module_code(code)?;
        self.set_module_code_unchecked(code.to_string());
        Ok(())
    }

    /// Append a learning target. Returns its index.
    pub fn add_slt(&mut self, text: &str) -> Result<SltIndex, CoreError> {
        require_text("SLT text", text)?;
        let index = self.slts.len() as SltIndex + 1;
        self.slts.push(SltDraft::created(index, text.to_string()));
        Ok(index)
    }

    /// Replace the text of the live target at `index`.
    pub fn update_slt(&mut self, index: SltIndex, text: &str) -> Result<(), CoreError> {
        require_text("SLT text", text)?;
        let slt = self.slt_mut(index).ok_or(CoreError::NotFound {
            entity: "slt",
            index,
        })?;
        if slt.text != text {
            slt.text = text.to_string();
            slt.flags.mark_modified();
        }
        Ok(())
    }

    /// Remove the live target at `index` and renumber the rest to `1..N`.
    ///
    /// A target the service already knows is kept as a tombstone until the
    /// delete is synced; one it never saw is dropped. Its lesson goes with it.
    pub fn delete_slt(&mut self, index: SltIndex) -> Result<(), CoreError> {
        if self.slt(index).is_none() {
            return Err(CoreError::NotFound {
                entity: "slt",
                index,
            });
        }
        let mut removed = self.slts.remove(index as usize - 1);
        if removed.is_persisted() {
            removed.flags.is_deleted = true;
            removed.flags.is_modified = false;
            removed.lesson = None;
            self.tombstones.push(removed);
        }
        self.reindex();
        Ok(())
    }

    /// Reorder live targets. `order[i]` is the current index of the target
    /// that should end up at position `i + 1`.
    pub fn reorder_slts(&mut self, order: &[SltIndex]) -> Result<(), CoreError> {
        let count = self.slts.len();
        let mut seen = vec![false; count];
        let is_permutation = order.len() == count
            && order.iter().all(|&index| {
                let valid = index >= 1 && (index as usize) <= count && !seen[index as usize - 1];
                if valid {
                    seen[index as usize - 1] = true;
                }
                valid
            });
        if !is_permutation {
            return Err(CoreError::Validation(format!(
                "Reorder must be a permutation of 1..={count}, got {order:?}"
            )));
        }

        let mut previous: Vec<Option<SltDraft>> = self.slts.drain(..).map(Some).collect();
        for &index in order {
            if let Some(slt) = previous[index as usize - 1].take() {
                self.slts.push(slt);
            }
        }
        self.reindex();
        Ok(())
    }

    /// Fill or clear the assignment slot.
    ///
    /// Clearing only forgets the local value; the service has no assignment
    /// delete. Setting it again afterwards creates it anew.
    pub fn set_assignment(&mut self, content: Option<AssignmentContent>) {
        match (content, self.assignment.as_mut()) {
            (Some(content), Some(existing)) => {
                if existing.data != content {
                    existing.data = content;
                    existing.flags.mark_modified();
                }
            }
            (Some(content), None) => self.assignment = Some(SlotDraft::created(content)),
            (None, _) => self.assignment = None,
        }
    }

    /// Fill or clear the introduction slot. Same rules as the assignment.
    pub fn set_introduction(&mut self, content: Option<IntroductionContent>) {
        match (content, self.introduction.as_mut()) {
            (Some(content), Some(existing)) => {
                if existing.data != content {
                    existing.data = content;
                    existing.flags.mark_modified();
                }
            }
            (Some(content), None) => self.introduction = Some(SlotDraft::created(content)),
            (None, _) => self.introduction = None,
        }
    }

    /// Insert, update, or remove the lesson on the target at `slt_index`.
    pub fn set_lesson(
        &mut self,
        slt_index: SltIndex,
        content: Option<LessonContent>,
    ) -> Result<(), CoreError> {
        let slt = self.slt_mut(slt_index).ok_or(CoreError::NotFound {
            entity: "slt",
            index: slt_index,
        })?;

        match (content, slt.lesson.as_mut()) {
            (Some(content), Some(existing)) if existing.flags.is_deleted => {
                existing.data = content;
                existing.flags.is_deleted = false;
                existing.flags.is_modified = true;
            }
            (Some(content), Some(existing)) => {
                if existing.data != content {
                    existing.data = content;
                    existing.flags.mark_modified();
                }
            }
            (Some(content), None) => slt.lesson = Some(SlotDraft::created(content)),
            (None, Some(existing)) if existing.flags.is_new => slt.lesson = None,
            (None, Some(existing)) => {
                existing.flags.is_deleted = true;
                existing.flags.is_modified = false;
            }
            (None, None) => {}
        }
        Ok(())
    }

    /// Value-producing form of [`DraftEdit::apply_to`].
    pub fn with_edit(&self, edit: DraftEdit) -> Result<ModuleDraft, CoreError> {
        let mut next = self.clone();
        edit.apply_to(&mut next)?;
        Ok(next)
    }
}

// ---------------------------------------------------------------------------
// Edit commands
// ---------------------------------------------------------------------------

/// A draft mutation as a value, so edits can be queued and coalesced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DraftEdit {
    SetMetadata {
        title: String,
        description: String,
    },
    SetModuleCode {
        code: String,
    },
    AddSlt {
        text: String,
    },
    UpdateSlt {
        index: SltIndex,
        text: String,
    },
    DeleteSlt {
        index: SltIndex,
    },
    ReorderSlts {
        order: Vec<SltIndex>,
    },
    SetAssignment {
        content: Option<AssignmentContent>,
    },
    SetIntroduction {
        content: Option<IntroductionContent>,
    },
    SetLesson {
        slt_index: SltIndex,
        content: Option<LessonContent>,
    },
}

/// The field a text edit targets. Later edits to the same key replace
/// earlier pending ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EditKey {
    Metadata,
    SltText(SltIndex),
    Assignment,
    Introduction,
    Lesson(SltIndex),
}

impl DraftEdit {
    pub fn apply_to(self, draft: &mut ModuleDraft) -> Result<(), CoreError> {
        match self {
            Self::SetMetadata { title, description } => {
                draft.set_metadata(title, description);
                Ok(())
            }
            Self::SetModuleCode { code } => draft.set_module_code(&code),
            Self::AddSlt { text } => draft.add_slt(&text).map(|_| ()),
            Self::UpdateSlt { index, text } => draft.update_slt(index, &text),
            Self::DeleteSlt { index } => draft.delete_slt(index),
            Self::ReorderSlts { order } => draft.reorder_slts(&order),
            Self::SetAssignment { content } => {
                draft.set_assignment(content);
                Ok(())
            }
            Self::SetIntroduction { content } => {
                draft.set_introduction(content);
                Ok(())
            }
            Self::SetLesson { slt_index, content } => draft.set_lesson(slt_index, content),
        }
    }

    /// Key for debouncing, or `None` for edits that must apply immediately
    /// (anything that changes structure or clears a slot).
    pub fn coalesce_key(&self) -> Option<EditKey> {
        match self {
            Self::SetMetadata { .. } => Some(EditKey::Metadata),
            Self::UpdateSlt { index, .. } => Some(EditKey::SltText(*index)),
            Self::SetAssignment { content: Some(_) } => Some(EditKey::Assignment),
            Self::SetIntroduction { content: Some(_) } => Some(EditKey::Introduction),
            Self::SetLesson {
                slt_index,
                content: Some(_),
            } => Some(EditKey::Lesson(*slt_index)),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
