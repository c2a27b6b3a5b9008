#![allow(dead_code)]

use std::sync::Arc;

use modstudio_client::{InMemoryModuleService, ModuleContentService};
use modstudio_core::draft::ModuleDraft;
use modstudio_core::module::{
    AssignmentContent, IntroductionContent, LessonContent, LessonRecord, ModuleRecord,
    ModuleSnapshot, ModuleStatus, SltRecord,
};
use modstudio_sync::SyncCoordinator;

pub const COURSE: &str = "course-plutus";
pub const CODE: &str = "101";

pub fn lesson(title: &str) -> LessonContent {
    LessonContent {
        title: title.to_string(),
        content: format!("{title} body"),
        video_url: None,
    }
}

pub fn assignment(title: &str) -> AssignmentContent {
    AssignmentContent {
        title: title.to_string(),
        content: "Submit a transaction hash".to_string(),
    }
}

pub fn introduction(title: &str) -> IntroductionContent {
    IntroductionContent {
        title: title.to_string(),
        content: "Welcome".to_string(),
    }
}

/// Module `101` with targets `S1..S3`, a lesson on `S1`, an introduction
/// and no assignment.
pub fn base_snapshot() -> ModuleSnapshot {
    ModuleSnapshot {
        module: ModuleRecord {
            code: CODE.to_string(),
            title: "Plutus Basics".to_string(),
            description: "First steps".to_string(),
            status: ModuleStatus::Draft,
        },
        slts: (1..=3)
            .map(|index| SltRecord {
                index,
                text: format!("S{index}"),
            })
            .collect(),
        assignment: None,
        introduction: Some(introduction("Getting started")),
        lessons: vec![LessonRecord {
            slt_index: 1,
            content: lesson("L1"),
        }],
    }
}

pub async fn seeded_service() -> Arc<InMemoryModuleService> {
    seeded_with(base_snapshot()).await
}

pub async fn seeded_with(snapshot: ModuleSnapshot) -> Arc<InMemoryModuleService> {
    let service = Arc::new(InMemoryModuleService::new());
    service.seed_module(COURSE, snapshot).await;
    service
}

/// Load a clean draft of `101` and forget the read.
pub async fn open_draft(service: &Arc<InMemoryModuleService>) -> ModuleDraft {
    let snapshot = service.get_module(COURSE, CODE).await.unwrap();
    service.clear_calls().await;
    ModuleDraft::from_snapshot(COURSE, &snapshot)
}

pub fn coordinator(service: &Arc<InMemoryModuleService>) -> SyncCoordinator {
    SyncCoordinator::new(service.clone())
}

pub async fn server_slt_texts(service: &InMemoryModuleService, code: &str) -> Vec<String> {
    service
        .snapshot(COURSE, code)
        .await
        .unwrap()
        .slts
        .into_iter()
        .map(|s| s.text)
        .collect()
}
