//! Server-side module records.
//!
//! These are the shapes the module-content service hands back and accepts.
//! They live in `core` so the draft model, the HTTP client, and the sync
//! layer all agree on one representation.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::SltIndex;

// ---------------------------------------------------------------------------
// Module status
// ---------------------------------------------------------------------------

/// Lifecycle of a module on the service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleStatus {
    #[default]
    Draft,
    Approved,
    OnChain,
}

impl ModuleStatus {
    /// Parse a status string as reported by the service.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "draft" => Ok(Self::Draft),
            "approved" => Ok(Self::Approved),
            "on_chain" => Ok(Self::OnChain),
            _ => Err(CoreError::Validation(format!(
                "Invalid module status '{s}'. Must be one of: draft, approved, on_chain"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Approved => "approved",
            Self::OnChain => "on_chain",
        }
    }

    /// Only forward moves are allowed: draft -> approved -> on_chain.
    pub fn can_transition_to(self, next: ModuleStatus) -> bool {
        matches!(
            (self, next),
            (Self::Draft, Self::Approved) | (Self::Approved, Self::OnChain)
        )
    }
}

// ---------------------------------------------------------------------------
// Content payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentContent {
    pub title: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntroductionContent {
    pub title: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonContent {
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Module metadata as stored on the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleRecord {
    pub code: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: ModuleStatus,
}

/// One row of a course's module listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleSummary {
    pub code: String,
    pub title: String,
    #[serde(default)]
    pub status: ModuleStatus,
}

/// Body of a module-create call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewModule {
    pub code: String,
    pub title: String,
    pub description: String,
}

/// Body of a metadata update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleMetadata {
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SltRecord {
    pub index: SltIndex,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonRecord {
    pub slt_index: SltIndex,
    #[serde(flatten)]
    pub content: LessonContent,
}

/// Everything the service knows about one module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleSnapshot {
    pub module: ModuleRecord,
    #[serde(default)]
    pub slts: Vec<SltRecord>,
    #[serde(default)]
    pub assignment: Option<AssignmentContent>,
    #[serde(default)]
    pub introduction: Option<IntroductionContent>,
    #[serde(default)]
    pub lessons: Vec<LessonRecord>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
