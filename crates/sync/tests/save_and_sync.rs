//! Integration tests for `SyncCoordinator::save_and_sync` against the
//! in-memory module-content service.
//!
//! Each test opens a clean draft of the seeded module, edits it the way the
//! wizard would, and asserts both the exact call sequence the service saw
//! and the state left behind on either side.

mod common;

use assert_matches::assert_matches;
use common::{
    assignment, coordinator, introduction, lesson, open_draft, seeded_service, server_slt_texts,
    CODE, COURSE,
};
use modstudio_client::{ModuleContentService, ServiceCall, ServiceError};
use modstudio_core::draft::ModuleDraft;
use modstudio_core::error::CoreError;
use modstudio_core::reconcile::SltDivergence;
use modstudio_sync::{SaveStatus, SyncError, SyncStep};

// ---------------------------------------------------------------------------
// Test: a clean draft never reaches the service
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_clean_draft_makes_no_calls() {
    let service = seeded_service().await;
    let mut draft = open_draft(&service).await;

    let report = coordinator(&service).save_and_sync(&mut draft).await.unwrap();

    assert!(report.is_noop());
    assert!(service.calls().await.is_empty());
}

// ---------------------------------------------------------------------------
// Test: a brand-new module is created in dependency order
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_new_module_full_save() {
    let service = seeded_service().await;
    let sync = coordinator(&service);

    let mut draft = ModuleDraft::new_module(COURSE);
    draft.set_module_code("201").unwrap();
    draft.set_metadata("Marlowe Contracts", "Financial contracts on Cardano");
    draft.add_slt("I can read a Marlowe contract").unwrap();
    draft.add_slt("I can deploy a Marlowe contract").unwrap();
    draft.set_lesson(2, Some(lesson("Deploying"))).unwrap();
    draft.set_assignment(Some(assignment("Deploy an escrow")));
    draft.set_introduction(Some(introduction("Why Marlowe")));

    let report = sync.save_and_sync(&mut draft).await.unwrap();

    assert!(report.module_created);
    assert_eq!(report.calls, 6);
    assert_eq!(
        service.calls().await,
        vec![
            ServiceCall::CreateModule {
                code: "201".to_string()
            },
            ServiceCall::CreateSlt {
                text: "I can read a Marlowe contract".to_string()
            },
            ServiceCall::CreateSlt {
                text: "I can deploy a Marlowe contract".to_string()
            },
            ServiceCall::CreateAssignment,
            ServiceCall::CreateIntroduction,
            ServiceCall::CreateLesson { slt_index: 2 },
        ]
    );
    assert!(draft.is_created());
    assert!(!draft.is_dirty());

    let stored = service.snapshot(COURSE, "201").await.unwrap();
    assert_eq!(stored.module.title, "Marlowe Contracts");
    assert_eq!(stored.lessons.len(), 1);
    assert_eq!(stored.lessons[0].slt_index, 2);
    assert_eq!(stored.assignment, Some(assignment("Deploy an escrow")));
}

// ---------------------------------------------------------------------------
// Test: saving twice sends nothing the second time
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_second_save_is_noop() {
    let service = seeded_service().await;
    let sync = coordinator(&service);
    let mut draft = open_draft(&service).await;
    draft.update_slt(2, "S2 revised").unwrap();
    draft.set_assignment(Some(assignment("Mint a token")));

    sync.save_and_sync(&mut draft).await.unwrap();
    service.clear_calls().await;
    let report = sync.save_and_sync(&mut draft).await.unwrap();

    assert!(report.is_noop());
    assert!(service.calls().await.is_empty());
}

// ---------------------------------------------------------------------------
// Test: deletes run highest-first, then creates, updates and one reorder
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_slt_calls_follow_position_rules() {
    let service = seeded_service().await;
    // A fourth target carrying a lesson, so the reorder has something to move.
    service.create_slt(COURSE, CODE, "S4").await.unwrap();
    service
        .create_lesson(COURSE, CODE, 4, &lesson("L4"))
        .await
        .unwrap();
    let mut draft = open_draft(&service).await;

    draft.delete_slt(1).unwrap(); // S1; live [S2, S3, S4]
    draft.delete_slt(2).unwrap(); // S3; live [S2, S4]
    draft.add_slt("S5").unwrap(); // live [S2, S4, S5]
    draft.update_slt(1, "S2 revised").unwrap();
    draft.reorder_slts(&[3, 1, 2]).unwrap(); // live [S5, S2, S4]

    let report = coordinator(&service).save_and_sync(&mut draft).await.unwrap();

    assert_eq!(
        service.calls().await,
        vec![
            ServiceCall::DeleteSlt { index: 3 },
            ServiceCall::DeleteSlt { index: 1 },
            ServiceCall::CreateSlt {
                text: "S5".to_string()
            },
            ServiceCall::UpdateSlt { index: 1 },
            ServiceCall::ReorderSlts {
                order: vec![3, 1, 2]
            },
        ]
    );
    assert!(report.reordered);
    assert!(!report.has_divergence());
    assert!(!draft.is_dirty());

    assert_eq!(
        server_slt_texts(&service, CODE).await,
        vec!["S5", "S2 revised", "S4"]
    );
    let stored = service.snapshot(COURSE, CODE).await.unwrap();
    assert_eq!(stored.lessons.len(), 1);
    assert_eq!(stored.lessons[0].slt_index, 3);
    assert_eq!(stored.lessons[0].content.title, "L4");
}

// ---------------------------------------------------------------------------
// Test: lesson calls use positions settled by the SLT phase
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_lessons_follow_compacted_indices() {
    let service = seeded_service().await;
    let mut draft = open_draft(&service).await;

    draft.delete_slt(1).unwrap(); // takes L1 with it
    draft.set_lesson(2, Some(lesson("L3"))).unwrap(); // S3, now second

    coordinator(&service).save_and_sync(&mut draft).await.unwrap();

    assert_eq!(
        service.calls().await,
        vec![
            ServiceCall::DeleteSlt { index: 1 },
            ServiceCall::CreateLesson { slt_index: 2 },
        ]
    );
    let stored = service.snapshot(COURSE, CODE).await.unwrap();
    assert_eq!(stored.lessons.len(), 1);
    assert_eq!(stored.lessons[0].slt_index, 2);
    assert_eq!(stored.lessons[0].content.title, "L3");
}

#[tokio::test]
async fn test_lesson_removal_is_synced() {
    let service = seeded_service().await;
    let mut draft = open_draft(&service).await;
    draft.set_lesson(1, None).unwrap();

    coordinator(&service).save_and_sync(&mut draft).await.unwrap();

    assert_eq!(
        service.calls().await,
        vec![ServiceCall::DeleteLesson { slt_index: 1 }]
    );
    assert!(draft.lesson(1).is_none());
    assert!(service.snapshot(COURSE, CODE).await.unwrap().lessons.is_empty());
}

// ---------------------------------------------------------------------------
// Test: a create conflict is retried exactly once as get + update
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_assignment_conflict_retried_as_update() {
    let service = seeded_service().await;
    let mut draft = open_draft(&service).await;
    draft.set_assignment(Some(assignment("Draft task")));
    service
        .seed_assignment(COURSE, CODE, assignment("Written elsewhere"))
        .await;

    let report = coordinator(&service).save_and_sync(&mut draft).await.unwrap();

    assert_eq!(report.conflicts_retried, 1);
    assert_eq!(
        service.calls().await,
        vec![
            ServiceCall::CreateAssignment,
            ServiceCall::GetAssignment,
            ServiceCall::UpdateAssignment,
        ]
    );
    let stored = service.snapshot(COURSE, CODE).await.unwrap();
    assert_eq!(stored.assignment, Some(assignment("Draft task")));
    assert!(!draft.is_dirty());
}

#[tokio::test]
async fn test_conflict_retry_is_bounded() {
    let service = seeded_service().await;
    let mut draft = open_draft(&service).await;
    draft.set_assignment(Some(assignment("Draft task")));
    service
        .seed_assignment(COURSE, CODE, assignment("Written elsewhere"))
        .await;
    service
        .inject_fault(
            ServiceCall::UpdateAssignment,
            ServiceError::Conflict("still racing".to_string()),
        )
        .await;

    let failure = coordinator(&service)
        .save_and_sync(&mut draft)
        .await
        .unwrap_err();

    assert_eq!(failure.step, SyncStep::Assignment);
    assert_matches!(failure.error, SyncError::Service(ServiceError::Conflict(_)));
    let calls = service.calls().await;
    assert_eq!(
        calls
            .iter()
            .filter(|c| **c == ServiceCall::CreateAssignment)
            .count(),
        1
    );
    assert_eq!(
        calls
            .iter()
            .filter(|c| **c == ServiceCall::UpdateAssignment)
            .count(),
        1
    );
    assert!(draft.assignment().unwrap().flags.is_new);
}

#[tokio::test]
async fn test_introduction_conflict_retried_as_update() {
    let service = seeded_service().await;
    let mut draft = open_draft(&service).await;
    // Cleared locally, then set again: the draft treats it as new.
    draft.set_introduction(None);
    draft.set_introduction(Some(introduction("Fresh start")));

    let report = coordinator(&service).save_and_sync(&mut draft).await.unwrap();

    assert_eq!(report.conflicts_retried, 1);
    assert_eq!(
        service.calls().await,
        vec![
            ServiceCall::CreateIntroduction,
            ServiceCall::GetIntroduction,
            ServiceCall::UpdateIntroduction,
        ]
    );
}

// ---------------------------------------------------------------------------
// Test: a failure keeps committed work and a second save finishes the rest
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_partial_failure_then_retry_completes() {
    let service = seeded_service().await;
    let sync = coordinator(&service);
    let mut draft = open_draft(&service).await;
    draft.update_slt(1, "S1 revised").unwrap();
    draft.set_assignment(Some(assignment("Mint a token")));
    draft.set_introduction(Some(introduction("Updated welcome")));
    service
        .inject_fault(
            ServiceCall::CreateAssignment,
            ServiceError::Api {
                status: 500,
                body: "boom".to_string(),
            },
        )
        .await;

    let result = sync.save_and_sync(&mut draft).await;

    assert_eq!(SaveStatus::of(&result), SaveStatus::Partial);
    let failure = result.unwrap_err();
    assert_eq!(failure.step, SyncStep::Assignment);
    assert_eq!(failure.committed_calls, 1);
    assert!(failure.error.is_transient());
    assert!(!draft.slt(1).unwrap().flags.is_dirty());
    assert!(draft.assignment().unwrap().flags.is_dirty());
    assert!(draft.introduction().unwrap().flags.is_dirty());

    service.clear_calls().await;
    let report = sync.save_and_sync(&mut draft).await.unwrap();

    assert_eq!(report.calls, 2);
    assert_eq!(
        service.calls().await,
        vec![
            ServiceCall::CreateAssignment,
            ServiceCall::UpdateIntroduction
        ]
    );
    assert!(!draft.is_dirty());
    assert_eq!(
        server_slt_texts(&service, CODE).await,
        vec!["S1 revised", "S2", "S3"]
    );
}

#[tokio::test]
async fn test_lesson_failure_keeps_sibling_successes() {
    let service = seeded_service().await;
    let sync = coordinator(&service);
    let mut draft = open_draft(&service).await;
    draft.set_lesson(1, Some(lesson("L1 revised"))).unwrap();
    draft.set_lesson(2, Some(lesson("L2"))).unwrap();
    draft.set_lesson(3, Some(lesson("L3"))).unwrap();
    service
        .inject_fault(
            ServiceCall::CreateLesson { slt_index: 2 },
            ServiceError::Transport("connection reset".to_string()),
        )
        .await;

    let failure = sync.save_and_sync(&mut draft).await.unwrap_err();

    assert_eq!(failure.step, SyncStep::Lessons);
    assert_eq!(failure.committed_calls, 2);
    assert!(!draft.lesson(1).unwrap().flags.is_dirty());
    assert!(draft.lesson(2).unwrap().flags.is_new);
    assert!(!draft.lesson(3).unwrap().flags.is_dirty());

    service.clear_calls().await;
    sync.save_and_sync(&mut draft).await.unwrap();

    assert_eq!(
        service.calls().await,
        vec![ServiceCall::CreateLesson { slt_index: 2 }]
    );
    assert_eq!(service.snapshot(COURSE, CODE).await.unwrap().lessons.len(), 3);
}

// ---------------------------------------------------------------------------
// Test: preconditions fail before anything is sent
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_unauthorized_fails_before_any_call() {
    let service = seeded_service().await;
    let mut draft = open_draft(&service).await;
    draft.update_slt(1, "S1 revised").unwrap();
    service.set_authorized(false);

    let result = coordinator(&service).save_and_sync(&mut draft).await;

    assert_eq!(SaveStatus::of(&result), SaveStatus::Failed);
    let failure = result.unwrap_err();
    assert_eq!(failure.step, SyncStep::Preconditions);
    assert_eq!(failure.error, SyncError::Unauthorized);
    assert_eq!(failure.committed_calls, 0);
    assert!(service.calls().await.is_empty());
    assert!(draft.slt(1).unwrap().flags.is_modified);
}

#[tokio::test]
async fn test_invalid_draft_fails_before_any_call() {
    let service = seeded_service().await;
    let mut draft = open_draft(&service).await;
    draft.update_slt(1, "S1 revised").unwrap();
    draft.set_assignment(Some(assignment("   ")));

    let failure = coordinator(&service)
        .save_and_sync(&mut draft)
        .await
        .unwrap_err();

    assert_eq!(failure.step, SyncStep::Preconditions);
    assert_matches!(failure.error, SyncError::Core(CoreError::Validation(_)));
    assert!(service.calls().await.is_empty());
}

// ---------------------------------------------------------------------------
// Test: the service placing a target elsewhere is reported as divergence
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_concurrent_append_reported_as_divergence() {
    let service = seeded_service().await;
    let mut draft = open_draft(&service).await;
    service
        .create_slt(COURSE, CODE, "Added by a co-author")
        .await
        .unwrap();
    draft.add_slt("S4").unwrap();

    let report = coordinator(&service).save_and_sync(&mut draft).await.unwrap();

    assert_eq!(
        report.divergence,
        vec![SltDivergence::IndexMismatch {
            text: "S4".to_string(),
            expected: 4,
            actual: 5,
        }]
    );
    assert_eq!(draft.slt(4).unwrap().server_index, Some(5));
    assert!(!report.reordered);
    assert!(draft.needs_reorder());
    assert!(!service
        .calls()
        .await
        .iter()
        .any(|c| matches!(c, ServiceCall::ReorderSlts { .. })));
}

#[tokio::test]
async fn test_save_after_divergence_sends_no_reorder() {
    let service = seeded_service().await;
    let sync = coordinator(&service);
    let mut draft = open_draft(&service).await;
    service
        .create_slt(COURSE, CODE, "Added by a co-author")
        .await
        .unwrap();
    draft.add_slt("S4").unwrap();

    let first = sync.save_and_sync(&mut draft).await;
    assert_eq!(SaveStatus::of(&first), SaveStatus::Diverged);
    assert!(first.unwrap().needs_resync());
    assert!(draft.is_dirty());

    service.clear_calls().await;
    let second = sync.save_and_sync(&mut draft).await;

    assert_eq!(SaveStatus::of(&second), SaveStatus::Diverged);
    let report = second.unwrap();
    assert!(!report.is_noop());
    assert_eq!(report.calls, 0);
    assert_eq!(
        report.divergence,
        vec![SltDivergence::UnresolvedOrder {
            order: vec![1, 2, 3, 5]
        }]
    );
    assert!(service.calls().await.is_empty());
    assert_eq!(
        server_slt_texts(&service, CODE).await,
        vec!["S1", "S2", "S3", "Added by a co-author", "S4"]
    );
}
