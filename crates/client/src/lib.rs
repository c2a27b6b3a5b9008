//! Client side of the module-content service protocol.
//!
//! - [`ModuleContentService`]: the async operations the studio relies on.
//! - [`HttpModuleClient`]: the REST implementation.
//! - [`InMemoryModuleService`]: a faithful in-process double with a call
//!   log and fault injection, used by the sync layer's tests.

pub mod error;
pub mod http;
pub mod memory;
pub mod service;

pub use error::ServiceError;
pub use http::HttpModuleClient;
pub use memory::{InMemoryModuleService, ServiceCall};
pub use service::{ModuleContentService, ServiceResult};
