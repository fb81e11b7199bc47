use crate::{
    errors::CoreError,
    model::{ProjectMetadata, ProjectSource, ProjectSummary},
};

/// Name-addressed persistence of project triples.
///
/// Every method takes the display name and derives the storage key itself.
/// No async in core; callers should use spawn_blocking when invoking from async contexts.
pub trait ProjectStore {
    type Error: std::error::Error + Into<CoreError> + Send + Sync + 'static;

    /// Overwrite the sources stored under `name`'s key and stamp fresh metadata.
    fn save(&self, name: &str, source: &ProjectSource) -> Result<ProjectMetadata, Self::Error>;

    /// All projects, newest first.
    fn list(&self) -> Result<Vec<ProjectSummary>, Self::Error>;

    fn load(&self, name: &str) -> Result<ProjectSource, Self::Error>;

    /// Remove the project. Deleting something that is not there succeeds.
    fn delete(&self, name: &str) -> Result<(), Self::Error>;
}
