use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Learning targets are addressed by a 1-based position within their module.
pub type SltIndex = u32;

/// Stable client-side identity of a draft entity.
///
/// Survives re-indexing and reordering, unlike [`SltIndex`]. Never sent to
/// the module-content service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalId(Uuid);

impl LocalId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for LocalId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for LocalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}
