//! The protocol the studio speaks to the remote module-content service.
//!
//! Every operation is addressed by course id and module code. Learning
//! targets and lessons are addressed by the 1-based SLT index the service
//! currently holds, which is why the sync layer orders its calls carefully.

use async_trait::async_trait;
use modstudio_core::module::{
    AssignmentContent, IntroductionContent, LessonContent, LessonRecord, ModuleMetadata,
    ModuleRecord, ModuleSnapshot, ModuleStatus, ModuleSummary, NewModule, SltRecord,
};
use modstudio_core::types::SltIndex;

use crate::error::ServiceError;

pub type ServiceResult<T> = Result<T, ServiceError>;

#[async_trait]
pub trait ModuleContentService: Send + Sync {
    /// Whether the caller holds credentials that allow mutation. No I/O.
    fn is_authorized(&self) -> bool;

    async fn list_modules(&self, course_id: &str) -> ServiceResult<Vec<ModuleSummary>>;

    async fn get_module(&self, course_id: &str, code: &str) -> ServiceResult<ModuleSnapshot>;

    /// The returned record carries the code the service actually stored.
    async fn create_module(&self, course_id: &str, module: &NewModule)
        -> ServiceResult<ModuleRecord>;

    async fn update_module(
        &self,
        course_id: &str,
        code: &str,
        metadata: &ModuleMetadata,
    ) -> ServiceResult<ModuleRecord>;

    async fn set_module_status(
        &self,
        course_id: &str,
        code: &str,
        status: ModuleStatus,
    ) -> ServiceResult<ModuleRecord>;

    // -- learning targets --

    /// Appends; the record carries the index the service assigned.
    async fn create_slt(&self, course_id: &str, code: &str, text: &str)
        -> ServiceResult<SltRecord>;

    async fn update_slt(
        &self,
        course_id: &str,
        code: &str,
        index: SltIndex,
        text: &str,
    ) -> ServiceResult<SltRecord>;

    /// Later indices shift down by one and the target's lesson is removed.
    async fn delete_slt(&self, course_id: &str, code: &str, index: SltIndex) -> ServiceResult<()>;

    /// `order[i]` is the current index of the target that becomes `i + 1`.
    async fn reorder_slts(
        &self,
        course_id: &str,
        code: &str,
        order: &[SltIndex],
    ) -> ServiceResult<Vec<SltRecord>>;

    // -- assignment --

    async fn get_assignment(
        &self,
        course_id: &str,
        code: &str,
    ) -> ServiceResult<Option<AssignmentContent>>;

    async fn create_assignment(
        &self,
        course_id: &str,
        code: &str,
        assignment: &AssignmentContent,
    ) -> ServiceResult<AssignmentContent>;

    async fn update_assignment(
        &self,
        course_id: &str,
        code: &str,
        assignment: &AssignmentContent,
    ) -> ServiceResult<AssignmentContent>;

    // -- introduction --

    async fn get_introduction(
        &self,
        course_id: &str,
        code: &str,
    ) -> ServiceResult<Option<IntroductionContent>>;

    async fn create_introduction(
        &self,
        course_id: &str,
        code: &str,
        introduction: &IntroductionContent,
    ) -> ServiceResult<IntroductionContent>;

    async fn update_introduction(
        &self,
        course_id: &str,
        code: &str,
        introduction: &IntroductionContent,
    ) -> ServiceResult<IntroductionContent>;

    // -- lessons --

    async fn create_lesson(
        &self,
        course_id: &str,
        code: &str,
        slt_index: SltIndex,
        lesson: &LessonContent,
    ) -> ServiceResult<LessonRecord>;

    async fn update_lesson(
        &self,
        course_id: &str,
        code: &str,
        slt_index: SltIndex,
        lesson: &LessonContent,
    ) -> ServiceResult<LessonRecord>;

    async fn delete_lesson(&self, course_id: &str, code: &str, slt_index: SltIndex)
        -> ServiceResult<()>;
}
