//! In-memory module-content service for development and testing.
//!
//! Behaves like the real service where the sync layer depends on it: SLT
//! creates append, deletes compact later indices and drop the target's
//! lesson, reorders carry lessons along, and creating something that already
//! exists is a conflict. Every call is recorded, and faults can be queued
//! against specific calls.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use modstudio_core::module::{
    AssignmentContent, IntroductionContent, LessonContent, LessonRecord, ModuleMetadata,
    ModuleRecord, ModuleSnapshot, ModuleStatus, ModuleSummary, NewModule, SltRecord,
};
use modstudio_core::types::SltIndex;
use tokio::sync::{Mutex, MutexGuard};

use crate::error::ServiceError;
use crate::service::{ModuleContentService, ServiceResult};

/// One recorded call, with the arguments tests usually assert on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceCall {
    ListModules,
    GetModule,
    CreateModule { code: String },
    UpdateModule,
    SetModuleStatus(ModuleStatus),
    CreateSlt { text: String },
    UpdateSlt { index: SltIndex },
    DeleteSlt { index: SltIndex },
    ReorderSlts { order: Vec<SltIndex> },
    GetAssignment,
    CreateAssignment,
    UpdateAssignment,
    GetIntroduction,
    CreateIntroduction,
    UpdateIntroduction,
    CreateLesson { slt_index: SltIndex },
    UpdateLesson { slt_index: SltIndex },
    DeleteLesson { slt_index: SltIndex },
}

impl ServiceCall {
    /// Reads do not change service state.
    pub fn is_mutation(&self) -> bool {
        !matches!(
            self,
            Self::ListModules | Self::GetModule | Self::GetAssignment | Self::GetIntroduction
        )
    }
}

#[derive(Debug, Clone)]
struct StoredSlt {
    text: String,
    lesson: Option<LessonContent>,
}

#[derive(Debug, Clone)]
struct StoredModule {
    record: ModuleRecord,
    slts: Vec<StoredSlt>,
    assignment: Option<AssignmentContent>,
    introduction: Option<IntroductionContent>,
}

impl StoredModule {
    fn snapshot(&self) -> ModuleSnapshot {
        ModuleSnapshot {
            module: self.record.clone(),
            slts: self.slt_records(),
            assignment: self.assignment.clone(),
            introduction: self.introduction.clone(),
            lessons: self
                .slts
                .iter()
                .enumerate()
                .filter_map(|(pos, slt)| {
                    slt.lesson.clone().map(|content| LessonRecord {
                        slt_index: pos as SltIndex + 1,
                        content,
                    })
                })
                .collect(),
        }
    }

    fn slt_records(&self) -> Vec<SltRecord> {
        self.slts
            .iter()
            .enumerate()
            .map(|(pos, slt)| SltRecord {
                index: pos as SltIndex + 1,
                text: slt.text.clone(),
            })
            .collect()
    }

    fn slt_mut(&mut self, index: SltIndex) -> ServiceResult<&mut StoredSlt> {
        index
            .checked_sub(1)
            .and_then(|pos| self.slts.get_mut(pos as usize))
            .ok_or_else(|| ServiceError::NotFound(format!("SLT {index}")))
    }
}

#[derive(Debug, Default)]
struct State {
    modules: BTreeMap<(String, String), StoredModule>,
    calls: Vec<ServiceCall>,
    faults: Vec<(ServiceCall, ServiceError)>,
}

impl State {
    fn module(&self, course_id: &str, code: &str) -> ServiceResult<&StoredModule> {
        self.modules
            .get(&(course_id.to_string(), code.to_string()))
            .ok_or_else(|| ServiceError::NotFound(format!("Module {code} in course {course_id}")))
    }

    fn module_mut(&mut self, course_id: &str, code: &str) -> ServiceResult<&mut StoredModule> {
        self.modules
            .get_mut(&(course_id.to_string(), code.to_string()))
            .ok_or_else(|| ServiceError::NotFound(format!("Module {code} in course {course_id}")))
    }
}

/// Service double backed by a [`Mutex`]-guarded map of modules.
#[derive(Debug)]
pub struct InMemoryModuleService {
    authorized: AtomicBool,
    state: Mutex<State>,
}

impl Default for InMemoryModuleService {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryModuleService {
    /// An empty, authorized service.
    pub fn new() -> Self {
        Self {
            authorized: AtomicBool::new(true),
            state: Mutex::new(State::default()),
        }
    }

    pub fn set_authorized(&self, authorized: bool) {
        self.authorized.store(authorized, Ordering::SeqCst);
    }

    /// Record the call, then fail it if a fault is queued for it or the
    /// caller may not mutate.
    async fn begin(&self, call: ServiceCall) -> ServiceResult<MutexGuard<'_, State>> {
        let mut state = self.state.lock().await;
        state.calls.push(call.clone());
        if let Some(pos) = state.faults.iter().position(|(c, _)| *c == call) {
            let (_, error) = state.faults.remove(pos);
            return Err(error);
        }
        if call.is_mutation() && !self.is_authorized() {
            return Err(ServiceError::Unauthorized);
        }
        Ok(state)
    }

    /// Store a module as if another writer had created it.
    pub async fn seed_module(&self, course_id: &str, snapshot: ModuleSnapshot) {
        let mut records = snapshot.slts;
        records.sort_by_key(|r| r.index);
        let slts = records
            .into_iter()
            .map(|record| StoredSlt {
                lesson: snapshot
                    .lessons
                    .iter()
                    .find(|l| l.slt_index == record.index)
                    .map(|l| l.content.clone()),
                text: record.text,
            })
            .collect();
        let key = (course_id.to_string(), snapshot.module.code.clone());
        self.state.lock().await.modules.insert(
            key,
            StoredModule {
                record: snapshot.module,
                slts,
                assignment: snapshot.assignment,
                introduction: snapshot.introduction,
            },
        );
    }

    /// Write an assignment behind the client's back.
    pub async fn seed_assignment(&self, course_id: &str, code: &str, assignment: AssignmentContent) {
        if let Ok(module) = self.state.lock().await.module_mut(course_id, code) {
            module.assignment = Some(assignment);
        }
    }

    /// Fail the next call equal to `call` with `error`.
    pub async fn inject_fault(&self, call: ServiceCall, error: ServiceError) {
        self.state.lock().await.faults.push((call, error));
    }

    pub async fn snapshot(&self, course_id: &str, code: &str) -> Option<ModuleSnapshot> {
        self.state
            .lock()
            .await
            .module(course_id, code)
            .ok()
            .map(StoredModule::snapshot)
    }

    pub async fn calls(&self) -> Vec<ServiceCall> {
        self.state.lock().await.calls.clone()
    }

    pub async fn clear_calls(&self) {
        self.state.lock().await.calls.clear();
    }
}

#[async_trait]
impl ModuleContentService for InMemoryModuleService {
    fn is_authorized(&self) -> bool {
        self.authorized.load(Ordering::SeqCst)
    }

    async fn list_modules(&self, course_id: &str) -> ServiceResult<Vec<ModuleSummary>> {
        let state = self.begin(ServiceCall::ListModules).await?;
        Ok(state
            .modules
            .iter()
            .filter(|((course, _), _)| course == course_id)
            .map(|(_, m)| ModuleSummary {
                code: m.record.code.clone(),
                title: m.record.title.clone(),
                status: m.record.status,
            })
            .collect())
    }

    async fn get_module(&self, course_id: &str, code: &str) -> ServiceResult<ModuleSnapshot> {
        let state = self.begin(ServiceCall::GetModule).await?;
        state.module(course_id, code).map(StoredModule::snapshot)
    }

    async fn create_module(
        &self,
        course_id: &str,
        module: &NewModule,
    ) -> ServiceResult<ModuleRecord> {
        let mut state = self
            .begin(ServiceCall::CreateModule {
                code: module.code.clone(),
            })
            .await?;
        let key = (course_id.to_string(), module.code.clone());
        if state.modules.contains_key(&key) {
            return Err(ServiceError::Conflict(format!(
                "Module {} already exists",
                module.code
            )));
        }
        let record = ModuleRecord {
            code: module.code.clone(),
            title: module.title.clone(),
            description: module.description.clone(),
            status: ModuleStatus::Draft,
        };
        state.modules.insert(
            key,
            StoredModule {
                record: record.clone(),
                slts: Vec::new(),
                assignment: None,
                introduction: None,
            },
        );
        Ok(record)
    }

    async fn update_module(
        &self,
        course_id: &str,
        code: &str,
        metadata: &ModuleMetadata,
    ) -> ServiceResult<ModuleRecord> {
        let mut state = self.begin(ServiceCall::UpdateModule).await?;
        let module = state.module_mut(course_id, code)?;
        module.record.title = metadata.title.clone();
        module.record.description = metadata.description.clone();
        Ok(module.record.clone())
    }

    async fn set_module_status(
        &self,
        course_id: &str,
        code: &str,
        status: ModuleStatus,
    ) -> ServiceResult<ModuleRecord> {
        let mut state = self.begin(ServiceCall::SetModuleStatus(status)).await?;
        let module = state.module_mut(course_id, code)?;
        if !module.record.status.can_transition_to(status) {
            return Err(ServiceError::Validation(format!(
                "Cannot move module from {} to {}",
                module.record.status.as_str(),
                status.as_str()
            )));
        }
        module.record.status = status;
        Ok(module.record.clone())
    }

    async fn create_slt(
        &self,
        course_id: &str,
        code: &str,
        text: &str,
    ) -> ServiceResult<SltRecord> {
        let mut state = self
            .begin(ServiceCall::CreateSlt {
                text: text.to_string(),
            })
            .await?;
        let module = state.module_mut(course_id, code)?;
        module.slts.push(StoredSlt {
            text: text.to_string(),
            lesson: None,
        });
        Ok(SltRecord {
            index: module.slts.len() as SltIndex,
            text: text.to_string(),
        })
    }

    async fn update_slt(
        &self,
        course_id: &str,
        code: &str,
        index: SltIndex,
        text: &str,
    ) -> ServiceResult<SltRecord> {
        let mut state = self.begin(ServiceCall::UpdateSlt { index }).await?;
        let slt = state.module_mut(course_id, code)?.slt_mut(index)?;
        slt.text = text.to_string();
        Ok(SltRecord {
            index,
            text: text.to_string(),
        })
    }

    async fn delete_slt(&self, course_id: &str, code: &str, index: SltIndex) -> ServiceResult<()> {
        let mut state = self.begin(ServiceCall::DeleteSlt { index }).await?;
        let module = state.module_mut(course_id, code)?;
        module.slt_mut(index)?;
        module.slts.remove(index as usize - 1);
        Ok(())
    }

    async fn reorder_slts(
        &self,
        course_id: &str,
        code: &str,
        order: &[SltIndex],
    ) -> ServiceResult<Vec<SltRecord>> {
        let mut state = self
            .begin(ServiceCall::ReorderSlts {
                order: order.to_vec(),
            })
            .await?;
        let module = state.module_mut(course_id, code)?;

        let mut sorted = order.to_vec();
        sorted.sort_unstable();
        let expected: Vec<SltIndex> = (1..=module.slts.len() as SltIndex).collect();
        if sorted != expected {
            return Err(ServiceError::Validation(format!(
                "Order {order:?} is not a permutation of 1..={}",
                module.slts.len()
            )));
        }

        let previous = std::mem::take(&mut module.slts);
        module.slts = order
            .iter()
            .map(|&index| previous[index as usize - 1].clone())
            .collect();
        Ok(module.slt_records())
    }

    async fn get_assignment(
        &self,
        course_id: &str,
        code: &str,
    ) -> ServiceResult<Option<AssignmentContent>> {
        let state = self.begin(ServiceCall::GetAssignment).await?;
        Ok(state.module(course_id, code)?.assignment.clone())
    }

    async fn create_assignment(
        &self,
        course_id: &str,
        code: &str,
        assignment: &AssignmentContent,
    ) -> ServiceResult<AssignmentContent> {
        let mut state = self.begin(ServiceCall::CreateAssignment).await?;
        let module = state.module_mut(course_id, code)?;
        if module.assignment.is_some() {
            return Err(ServiceError::Conflict(format!(
                "Assignment for module {code} already exists"
            )));
        }
        module.assignment = Some(assignment.clone());
        Ok(assignment.clone())
    }

    async fn update_assignment(
        &self,
        course_id: &str,
        code: &str,
        assignment: &AssignmentContent,
    ) -> ServiceResult<AssignmentContent> {
        let mut state = self.begin(ServiceCall::UpdateAssignment).await?;
        let module = state.module_mut(course_id, code)?;
        let slot = module
            .assignment
            .as_mut()
            .ok_or_else(|| ServiceError::NotFound(format!("Assignment for module {code}")))?;
        *slot = assignment.clone();
        Ok(assignment.clone())
    }

    async fn get_introduction(
        &self,
        course_id: &str,
        code: &str,
    ) -> ServiceResult<Option<IntroductionContent>> {
        let state = self.begin(ServiceCall::GetIntroduction).await?;
        Ok(state.module(course_id, code)?.introduction.clone())
    }

    async fn create_introduction(
        &self,
        course_id: &str,
        code: &str,
        introduction: &IntroductionContent,
    ) -> ServiceResult<IntroductionContent> {
        let mut state = self.begin(ServiceCall::CreateIntroduction).await?;
        let module = state.module_mut(course_id, code)?;
        if module.introduction.is_some() {
            return Err(ServiceError::Conflict(format!(
                "Introduction for module {code} already exists"
            )));
        }
        module.introduction = Some(introduction.clone());
        Ok(introduction.clone())
    }

    async fn update_introduction(
        &self,
        course_id: &str,
        code: &str,
        introduction: &IntroductionContent,
    ) -> ServiceResult<IntroductionContent> {
        let mut state = self.begin(ServiceCall::UpdateIntroduction).await?;
        let module = state.module_mut(course_id, code)?;
        let slot = module
            .introduction
            .as_mut()
            .ok_or_else(|| ServiceError::NotFound(format!("Introduction for module {code}")))?;
        *slot = introduction.clone();
        Ok(introduction.clone())
    }

    async fn create_lesson(
        &self,
        course_id: &str,
        code: &str,
        slt_index: SltIndex,
        lesson: &LessonContent,
    ) -> ServiceResult<LessonRecord> {
        let mut state = self.begin(ServiceCall::CreateLesson { slt_index }).await?;
        let slt = state.module_mut(course_id, code)?.slt_mut(slt_index)?;
        if slt.lesson.is_some() {
            return Err(ServiceError::Conflict(format!(
                "Lesson for SLT {slt_index} already exists"
            )));
        }
        slt.lesson = Some(lesson.clone());
        Ok(LessonRecord {
            slt_index,
            content: lesson.clone(),
        })
    }

    async fn update_lesson(
        &self,
        course_id: &str,
        code: &str,
        slt_index: SltIndex,
        lesson: &LessonContent,
    ) -> ServiceResult<LessonRecord> {
        let mut state = self.begin(ServiceCall::UpdateLesson { slt_index }).await?;
        let slt = state.module_mut(course_id, code)?.slt_mut(slt_index)?;
        let slot = slt
            .lesson
            .as_mut()
            .ok_or_else(|| ServiceError::NotFound(format!("Lesson for SLT {slt_index}")))?;
        *slot = lesson.clone();
        Ok(LessonRecord {
            slt_index,
            content: lesson.clone(),
        })
    }

    async fn delete_lesson(
        &self,
        course_id: &str,
        code: &str,
        slt_index: SltIndex,
    ) -> ServiceResult<()> {
        let mut state = self.begin(ServiceCall::DeleteLesson { slt_index }).await?;
        let slt = state.module_mut(course_id, code)?.slt_mut(slt_index)?;
        if slt.lesson.take().is_none() {
            return Err(ServiceError::NotFound(format!("Lesson for SLT {slt_index}")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    const COURSE: &str = "course-1";

    async fn service_with_module() -> InMemoryModuleService {
        let service = InMemoryModuleService::new();
        service
            .create_module(
                COURSE,
                &NewModule {
                    code: "101".to_string(),
                    title: "Plutus".to_string(),
                    description: String::new(),
                },
            )
            .await
            .unwrap();
        for text in ["A", "B", "C"] {
            service.create_slt(COURSE, "101", text).await.unwrap();
        }
        service
    }

    fn lesson(title: &str) -> LessonContent {
        LessonContent {
            title: title.to_string(),
            ..LessonContent::default()
        }
    }

    #[tokio::test]
    async fn create_slt_appends() {
        let service = service_with_module().await;
        let record = service.create_slt(COURSE, "101", "D").await.unwrap();
        assert_eq!(record.index, 4);
    }

    #[tokio::test]
    async fn delete_slt_compacts_and_cascades_lesson() {
        let service = service_with_module().await;
        service.create_lesson(COURSE, "101", 1, &lesson("LA")).await.unwrap();
        service.create_lesson(COURSE, "101", 3, &lesson("LC")).await.unwrap();

        service.delete_slt(COURSE, "101", 1).await.unwrap();

        let snapshot = service.snapshot(COURSE, "101").await.unwrap();
        let texts: Vec<_> = snapshot.slts.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["B", "C"]);
        assert_eq!(snapshot.lessons.len(), 1);
        assert_eq!(snapshot.lessons[0].slt_index, 2);
    }

    #[tokio::test]
    async fn reorder_moves_lessons_and_rejects_bad_orders() {
        let service = service_with_module().await;
        service.create_lesson(COURSE, "101", 3, &lesson("LC")).await.unwrap();

        let records = service.reorder_slts(COURSE, "101", &[3, 1, 2]).await.unwrap();
        assert_eq!(records[0].text, "C");
        let snapshot = service.snapshot(COURSE, "101").await.unwrap();
        assert_eq!(snapshot.lessons[0].slt_index, 1);

        assert_matches!(
            service.reorder_slts(COURSE, "101", &[1, 1, 2]).await,
            Err(ServiceError::Validation(_))
        );
    }

    #[tokio::test]
    async fn second_create_is_a_conflict() {
        let service = service_with_module().await;
        let assignment = AssignmentContent {
            title: "Faucet".to_string(),
            content: String::new(),
        };
        service.create_assignment(COURSE, "101", &assignment).await.unwrap();
        assert_matches!(
            service.create_assignment(COURSE, "101", &assignment).await,
            Err(ServiceError::Conflict(_))
        );
    }

    #[tokio::test]
    async fn injected_fault_fires_once() {
        let service = service_with_module().await;
        service
            .inject_fault(
                ServiceCall::UpdateSlt { index: 2 },
                ServiceError::Transport("reset".to_string()),
            )
            .await;

        assert_matches!(
            service.update_slt(COURSE, "101", 2, "B2").await,
            Err(ServiceError::Transport(_))
        );
        assert!(service.update_slt(COURSE, "101", 2, "B2").await.is_ok());
    }

    #[tokio::test]
    async fn unauthorized_caller_cannot_mutate() {
        let service = service_with_module().await;
        service.set_authorized(false);
        assert!(!service.is_authorized());
        assert_matches!(
            service.create_slt(COURSE, "101", "D").await,
            Err(ServiceError::Unauthorized)
        );
        assert!(service.get_module(COURSE, "101").await.is_ok());
    }

    #[tokio::test]
    async fn status_only_moves_forward() {
        let service = service_with_module().await;
        service
            .set_module_status(COURSE, "101", ModuleStatus::Approved)
            .await
            .unwrap();
        assert_matches!(
            service
                .set_module_status(COURSE, "101", ModuleStatus::Draft)
                .await,
            Err(ServiceError::Validation(_))
        );
    }
}
