/// Errors returned by a [`crate::ModuleContentService`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    /// Missing or rejected credentials.
    #[error("Not authorized to modify this module")]
    Unauthorized,

    #[error("Not found: {0}")]
    NotFound(String),

    /// The resource already exists (HTTP 409).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The service rejected a learning-target index that is already taken.
    #[error("Duplicate index: {0}")]
    DuplicateIndex(String),

    /// The service rejected the payload.
    #[error("Rejected by service: {0}")]
    Validation(String),

    /// Any other non-2xx response.
    #[error("Module service error ({status}): {body}")]
    Api { status: u16, body: String },

    /// The request never produced a response (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Transport(String),
}

impl ServiceError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    /// Worth retrying later without changing the request.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e.to_string())
    }
}
