use crate::types::SltIndex;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} at index {index}")]
    NotFound {
        entity: &'static str,
        index: SltIndex,
    },

    #[error("Validation failed: {0}")]
    Validation(String),
}
