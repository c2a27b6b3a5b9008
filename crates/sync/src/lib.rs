//! Draft-and-sync engine for the module studio.
//!
//! Sits between the pure draft model in `modstudio-core` and the
//! module-content service in `modstudio-client`:
//!
//! - [`SyncCoordinator`] drains a draft against the service in dependency
//!   order and commits each accepted call back into the draft.
//! - [`ModuleCloner`] copies a module under a new code.
//! - [`EditDebouncer`] coalesces keystroke-level edits.
//! - [`DraftSession`] ties these together for one open module.

pub mod cloner;
pub mod config;
pub mod coordinator;
pub mod debounce;
pub mod error;
pub mod session;

pub use cloner::{CloneResult, ModuleCloner};
pub use config::{ConfigError, StudioConfig};
pub use coordinator::{SaveStatus, SyncCoordinator, SyncReport};
pub use debounce::EditDebouncer;
pub use error::{CloneFailure, SessionError, SyncError, SyncFailure, SyncStep};
pub use session::DraftSession;
