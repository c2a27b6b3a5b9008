//! Editable module draft and its dirty markers.
//!
//! A [`ModuleDraft`] is the client-held copy of one module's content. It is
//! built either from a [`ModuleSnapshot`] (existing module, everything clean)
//! or empty via [`ModuleDraft::new_module`] (module not yet created). Edits go
//! through the mutation methods in [`crate::mutator`]; the `mark_*` methods at
//! the bottom of this file are how the sync layer records what the service
//! has accepted.
//!
//! Live learning targets are kept in display order with `module_index` equal
//! to their 1-based position. Persisted targets that were deleted locally move
//! to a separate tombstone list until the service confirms the delete.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::module::{
    AssignmentContent, IntroductionContent, LessonContent, ModuleSnapshot, SltRecord,
};
use crate::types::{LocalId, SltIndex};
use crate::validation::{require_text, validate_module_code, validate_title};

// ---------------------------------------------------------------------------
// Dirty markers
// ---------------------------------------------------------------------------

/// Why an entity differs from the last known server state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirtyFlags {
    /// No server-assigned identity yet.
    pub is_new: bool,
    /// Exists on the server but has local edits.
    pub is_modified: bool,
    /// Tombstoned locally, pending removal on sync.
    pub is_deleted: bool,
}

impl DirtyFlags {
    pub const CLEAN: Self = Self {
        is_new: false,
        is_modified: false,
        is_deleted: false,
    };

    pub const NEW: Self = Self {
        is_new: true,
        is_modified: false,
        is_deleted: false,
    };

    pub fn is_dirty(&self) -> bool {
        self.is_new || self.is_modified || self.is_deleted
    }

    /// Record a local edit. New entities stay new.
    pub fn mark_modified(&mut self) {
        if !self.is_new {
            self.is_modified = true;
        }
    }

    pub fn clear(&mut self) {
        *self = Self::CLEAN;
    }
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

/// A single-value slot (assignment, introduction, lesson) with its markers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotDraft<T> {
    pub data: T,
    pub flags: DirtyFlags,
}

impl<T> SlotDraft<T> {
    pub(crate) fn created(data: T) -> Self {
        Self {
            data,
            flags: DirtyFlags::NEW,
        }
    }

    pub(crate) fn clean(data: T) -> Self {
        Self {
            data,
            flags: DirtyFlags::CLEAN,
        }
    }

    pub fn is_live(&self) -> bool {
        !self.flags.is_deleted
    }
}

pub type AssignmentDraft = SlotDraft<AssignmentContent>;
pub type IntroductionDraft = SlotDraft<IntroductionContent>;
pub type LessonDraft = SlotDraft<LessonContent>;

/// Title and description of the module record.
///
/// `flags.is_new` doubles as the "module not yet created" sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataDraft {
    pub title: String,
    pub description: String,
    pub flags: DirtyFlags,
}

/// One learning target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SltDraft {
    pub id: LocalId,
    /// 1-based position among live targets. Stale for tombstones.
    pub module_index: SltIndex,
    pub text: String,
    /// Position on the service as last confirmed. `None` until created.
    pub server_index: Option<SltIndex>,
    pub flags: DirtyFlags,
    /// The lesson teaching this target, if any. Follows the target through
    /// re-indexing and reordering.
    pub lesson: Option<LessonDraft>,
}

impl SltDraft {
    pub(crate) fn created(module_index: SltIndex, text: String) -> Self {
        Self {
            id: LocalId::new(),
            module_index,
            text,
            server_index: None,
            flags: DirtyFlags::NEW,
            lesson: None,
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.server_index.is_some()
    }

    /// Persisted, but the service holds it at a different position.
    pub fn is_out_of_place(&self) -> bool {
        !self.flags.is_deleted
            && self
                .server_index
                .is_some_and(|server| server != self.module_index)
    }

    /// The lesson on this target, excluding tombstones.
    pub fn live_lesson(&self) -> Option<&LessonDraft> {
        self.lesson.as_ref().filter(|l| l.is_live())
    }
}

// ---------------------------------------------------------------------------
// ModuleDraft
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDraft {
    course_id: String,
    module_code: String,
    pub(crate) metadata: MetadataDraft,
    /// Live targets in display order; `module_index == position + 1`.
    pub(crate) slts: Vec<SltDraft>,
    /// Persisted targets deleted locally, awaiting the service delete.
    pub(crate) tombstones: Vec<SltDraft>,
    pub(crate) assignment: Option<AssignmentDraft>,
    pub(crate) introduction: Option<IntroductionDraft>,
}

impl ModuleDraft {
    /// Empty draft for a module that does not exist on the service yet.
    pub fn new_module(course_id: impl Into<String>) -> Self {
        Self {
            course_id: course_id.into(),
            module_code: String::new(),
            metadata: MetadataDraft {
                title: String::new(),
                description: String::new(),
                flags: DirtyFlags::NEW,
            },
            slts: Vec::new(),
            tombstones: Vec::new(),
            assignment: None,
            introduction: None,
        }
    }

    /// Clean draft mirroring the service's view of an existing module.
    pub fn from_snapshot(course_id: impl Into<String>, snapshot: &ModuleSnapshot) -> Self {
        let mut records: Vec<&SltRecord> = snapshot.slts.iter().collect();
        records.sort_by_key(|r| r.index);

        let mut slts: Vec<SltDraft> = records
            .into_iter()
            .enumerate()
            .map(|(pos, record)| SltDraft {
                id: LocalId::new(),
                module_index: pos as SltIndex + 1,
                text: record.text.clone(),
                server_index: Some(record.index),
                flags: DirtyFlags::CLEAN,
                lesson: None,
            })
            .collect();

        for lesson in &snapshot.lessons {
            if let Some(slt) = slts
                .iter_mut()
                .find(|s| s.server_index == Some(lesson.slt_index))
            {
                slt.lesson = Some(SlotDraft::clean(lesson.content.clone()));
            }
        }

        Self {
            course_id: course_id.into(),
            module_code: snapshot.module.code.clone(),
            metadata: MetadataDraft {
                title: snapshot.module.title.clone(),
                description: snapshot.module.description.clone(),
                flags: DirtyFlags::CLEAN,
            },
            slts,
            tombstones: Vec::new(),
            assignment: snapshot.assignment.clone().map(SlotDraft::clean),
            introduction: snapshot.introduction.clone().map(SlotDraft::clean),
        }
    }

    /// Copy of the live content under a new module code, every entity new.
    ///
    /// Tombstones and pending lesson removals are not carried over.
    pub fn clone_as_new(&self, new_code: impl Into<String>) -> Self {
        let slts = self
            .slts
            .iter()
            .map(|slt| SltDraft {
                id: LocalId::new(),
                module_index: slt.module_index,
                text: slt.text.clone(),
                server_index: None,
                flags: DirtyFlags::NEW,
                lesson: slt
                    .live_lesson()
                    .map(|lesson| SlotDraft::created(lesson.data.clone())),
            })
            .collect();

        Self {
            course_id: self.course_id.clone(),
            module_code: new_code.into(),
            metadata: MetadataDraft {
                title: self.metadata.title.clone(),
                description: self.metadata.description.clone(),
                flags: DirtyFlags::NEW,
            },
            slts,
            tombstones: Vec::new(),
            assignment: self
                .assignment
                .as_ref()
                .map(|a| SlotDraft::created(a.data.clone())),
            introduction: self
                .introduction
                .as_ref()
                .map(|i| SlotDraft::created(i.data.clone())),
        }
    }

    // -- read access --

    pub fn course_id(&self) -> &str {
        &self.course_id
    }

    pub fn module_code(&self) -> &str {
        &self.module_code
    }

    pub fn metadata(&self) -> &MetadataDraft {
        &self.metadata
    }

    /// `false` while the module has not been created on the service.
    pub fn is_created(&self) -> bool {
        !self.metadata.flags.is_new
    }

    /// Live learning targets in order.
    pub fn slts(&self) -> &[SltDraft] {
        &self.slts
    }

    pub fn slt(&self, index: SltIndex) -> Option<&SltDraft> {
        index
            .checked_sub(1)
            .and_then(|pos| self.slts.get(pos as usize))
    }

    pub fn find_slt(&self, id: LocalId) -> Option<&SltDraft> {
        self.slts
            .iter()
            .chain(self.tombstones.iter())
            .find(|s| s.id == id)
    }

    /// Persisted targets deleted locally and not yet removed on the service.
    pub fn deleted_slts(&self) -> &[SltDraft] {
        &self.tombstones
    }

    pub fn assignment(&self) -> Option<&AssignmentDraft> {
        self.assignment.as_ref()
    }

    pub fn introduction(&self) -> Option<&IntroductionDraft> {
        self.introduction.as_ref()
    }

    /// Live lessons keyed by the index of the target they teach.
    pub fn lessons(&self) -> BTreeMap<SltIndex, &LessonDraft> {
        self.slts
            .iter()
            .filter_map(|slt| slt.live_lesson().map(|l| (slt.module_index, l)))
            .collect()
    }

    pub fn lesson(&self, slt_index: SltIndex) -> Option<&LessonDraft> {
        self.slt(slt_index).and_then(SltDraft::live_lesson)
    }

    /// Live targets whose service position differs from their draft position.
    pub fn needs_reorder(&self) -> bool {
        self.slts.iter().any(SltDraft::is_out_of_place)
    }

    /// Whether anything would be sent on the next sync.
    pub fn is_dirty(&self) -> bool {
        self.metadata.flags.is_dirty()
            || !self.tombstones.is_empty()
            || self.needs_reorder()
            || self.slts.iter().any(|slt| {
                slt.flags.is_dirty() || slt.lesson.as_ref().is_some_and(|l| l.flags.is_dirty())
            })
            || self.assignment.as_ref().is_some_and(|a| a.flags.is_dirty())
            || self.introduction.as_ref().is_some_and(|i| i.flags.is_dirty())
    }

    /// Validate everything that would be sent on the next sync.
    ///
    /// Runs before any network call; a failure here means nothing was sent.
    pub fn validate_for_sync(&self) -> Result<(), CoreError> {
        require_text("Course id", &self.course_id)?;
        validate_module_code(&self.module_code)?;
        validate_title(&self.metadata.title)?;

        for slt in &self.slts {
            require_text(&format!("SLT {} text", slt.module_index), &slt.text)?;
            if let Some(lesson) = slt.lesson.as_ref().filter(|l| l.is_live() && l.flags.is_dirty()) {
                require_text(
                    &format!("Lesson title for SLT {}", slt.module_index),
                    &lesson.data.title,
                )?;
            }
        }
        if let Some(assignment) = self.assignment.as_ref().filter(|a| a.flags.is_dirty()) {
            require_text("Assignment title", &assignment.data.title)?;
        }
        if let Some(introduction) = self.introduction.as_ref().filter(|i| i.flags.is_dirty()) {
            require_text("Introduction title", &introduction.data.title)?;
        }
        Ok(())
    }

    // -- internal helpers --

    pub(crate) fn set_module_code_unchecked(&mut self, code: String) {
        self.module_code = code;
    }

    /// Restore the dense `1..N` numbering of live targets.
    pub(crate) fn reindex(&mut self) {
        for (pos, slt) in self.slts.iter_mut().enumerate() {
            slt.module_index = pos as SltIndex + 1;
        }
    }

    pub(crate) fn slt_mut(&mut self, index: SltIndex) -> Option<&mut SltDraft> {
        index
            .checked_sub(1)
            .and_then(|pos| self.slts.get_mut(pos as usize))
    }

    fn persisted_mut(&mut self) -> impl Iterator<Item = &mut SltDraft> {
        self.slts
            .iter_mut()
            .chain(self.tombstones.iter_mut())
            .filter(|s| s.server_index.is_some())
    }

    // -----------------------------------------------------------------------
    // Sync commits
    // -----------------------------------------------------------------------

    /// The service created the module; adopt the code it assigned.
    pub fn mark_module_created(&mut self, code: impl Into<String>) {
        self.module_code = code.into();
        self.metadata.flags.clear();
    }

    pub fn mark_metadata_synced(&mut self) {
        self.metadata.flags.clear();
    }

    /// The service deleted the target; later positions shift down by one.
    pub fn mark_slt_deleted(&mut self, id: LocalId) {
        let Some(pos) = self.tombstones.iter().position(|s| s.id == id) else {
            return;
        };
        let removed = self.tombstones.remove(pos);
        if let Some(deleted_at) = removed.server_index {
            for slt in self.persisted_mut() {
                if let Some(server) = slt.server_index.as_mut() {
                    if *server > deleted_at {
                        *server -= 1;
                    }
                }
            }
        }
    }

    /// The service created the target at `server_index`.
    pub fn mark_slt_created(&mut self, id: LocalId, server_index: SltIndex) {
        if let Some(slt) = self.slts.iter_mut().find(|s| s.id == id) {
            slt.server_index = Some(server_index);
            slt.flags.clear();
        }
    }

    pub fn mark_slt_updated(&mut self, id: LocalId) {
        if let Some(slt) = self.slts.iter_mut().find(|s| s.id == id) {
            slt.flags.is_modified = false;
        }
    }

    /// The service accepted the draft order.
    pub fn mark_slts_reordered(&mut self) {
        for slt in &mut self.slts {
            if slt.server_index.is_some() {
                slt.server_index = Some(slt.module_index);
            }
        }
    }

    pub fn mark_assignment_synced(&mut self) {
        if let Some(assignment) = self.assignment.as_mut() {
            assignment.flags.clear();
        }
    }

    pub fn mark_introduction_synced(&mut self) {
        if let Some(introduction) = self.introduction.as_mut() {
            introduction.flags.clear();
        }
    }

    /// The lesson on target `id` was created or updated.
    pub fn mark_lesson_saved(&mut self, id: LocalId) {
        if let Some(lesson) = self
            .slts
            .iter_mut()
            .find(|s| s.id == id)
            .and_then(|s| s.lesson.as_mut())
        {
            lesson.flags.clear();
        }
    }

    /// The lesson on target `id` was removed on the service.
    pub fn mark_lesson_deleted(&mut self, id: LocalId) {
        if let Some(slt) = self.slts.iter_mut().find(|s| s.id == id) {
            if slt.lesson.as_ref().is_some_and(|l| l.flags.is_deleted) {
                slt.lesson = None;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
