use std::collections::HashMap;

use playground_core::{
    model::{ProjectMetadata, ProjectSource, ProjectSummary},
    project::{sanitize_storage_key, StorageKey},
    traits::ProjectStore,
    validate::{validate_project_name, CollisionPolicy},
    CoreError, ValidationError,
};
use parking_lot::RwLock;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EphemeralError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("key already holds project '{0}'")]
    Conflict(String),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl From<EphemeralError> for CoreError {
    fn from(err: EphemeralError) -> Self {
        match err {
            EphemeralError::NotFound(name) => CoreError::NotFound(name),
            EphemeralError::Conflict(existing) => CoreError::Conflict(existing),
            EphemeralError::Validation(v) => CoreError::Validation(v),
        }
    }
}

/// Keeps projects in a map keyed the same way the filesystem store names its
/// folders, so collisions behave identically.
pub struct EphemeralStorage {
    map: RwLock<HashMap<StorageKey, (ProjectMetadata, ProjectSource)>>,
    policy: CollisionPolicy,
}

impl EphemeralStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_policy(policy: CollisionPolicy) -> Self {
        Self {
            map: RwLock::new(HashMap::new()),
            policy,
        }
    }
}

impl Default for EphemeralStorage {
    fn default() -> Self {
        Self::with_policy(CollisionPolicy::default())
    }
}

impl ProjectStore for EphemeralStorage {
    type Error = EphemeralError;

    fn save(&self, name: &str, source: &ProjectSource) -> Result<ProjectMetadata, Self::Error> {
        validate_project_name(name)?;
        let key = sanitize_storage_key(name);
        let mut map = self.map.write();
        let existing = map.get(&key).map(|(meta, _)| meta.name.as_str());
        if self.policy.rejects(existing, name) {
            let existing = existing.unwrap_or_default().to_owned();
            return Err(EphemeralError::Conflict(existing));
        }
        let metadata = ProjectMetadata::new(name);
        map.insert(key, (metadata.clone(), source.clone()));
        Ok(metadata)
    }

    fn list(&self) -> Result<Vec<ProjectSummary>, Self::Error> {
        let map = self.map.read();
        let mut rows: Vec<(&StorageKey, &ProjectMetadata)> =
            map.iter().map(|(key, (meta, _))| (key, meta)).collect();
        // equal timestamps fall back to key order so listings are repeatable
        rows.sort_by(|(ka, a), (kb, b)| {
            b.last_modified
                .cmp(&a.last_modified)
                .then_with(|| ka.cmp(kb))
        });
        Ok(rows
            .into_iter()
            .map(|(_, meta)| ProjectSummary::from(meta.clone()))
            .collect())
    }

    fn load(&self, name: &str) -> Result<ProjectSource, Self::Error> {
        let map = self.map.read();
        map.get(&sanitize_storage_key(name))
            .map(|(_, source)| source.clone())
            .ok_or_else(|| EphemeralError::NotFound(name.to_owned()))
    }

    fn delete(&self, name: &str) -> Result<(), Self::Error> {
        validate_project_name(name)?;
        self.map.write().remove(&sanitize_storage_key(name));
        Ok(())
    }
}
