//! Core domain model, validation, and traits.
//! No async and no IO within this crate.

pub mod errors;
pub mod model;
pub mod project;
pub mod traits;
pub mod validate;

pub use crate::errors::{CoreError, ValidationError};
pub use crate::model::{
    format_timestamp, now_millis, ProjectMetadata, ProjectSource, ProjectSummary,
};
pub use crate::project::{sanitize_storage_key, StorageKey};
pub use crate::traits::ProjectStore;
pub use crate::validate::{require_sources, validate_project_name, CollisionPolicy};
