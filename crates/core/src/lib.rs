//! Module studio domain core.
//!
//! Pure, synchronous building blocks for authoring a course module:
//!
//! - [`ModuleDraft`] with dirty markers and its mutation operations.
//! - [`compute_completion`] merging server state with the live draft.
//! - [`NavigationEngine`] over the fixed wizard step order.
//! - [`diff_slts`] for detecting index divergence after a sync.
//!
//! Nothing in this crate performs I/O.

pub mod completion;
pub mod draft;
pub mod error;
pub mod module;
pub mod mutator;
pub mod reconcile;
pub mod types;
pub mod validation;
pub mod wizard;

pub use completion::{compute_completion, ServerCompletion, StepCompletion};
pub use draft::{DirtyFlags, ModuleDraft, SltDraft};
pub use error::CoreError;
pub use mutator::{DraftEdit, EditKey};
pub use reconcile::{diff_slts, SltDivergence};
pub use types::{LocalId, SltIndex};
pub use wizard::{Direction, NavigationEngine, StepStatus, WizardStepId};
