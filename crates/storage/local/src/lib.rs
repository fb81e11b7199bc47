use chrono::{DateTime, SubsecRound, Utc};
use std::{
    fs::{self, File},
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

use playground_core::{
    model::{ProjectMetadata, ProjectSource, ProjectSummary},
    project::{sanitize_storage_key, StorageKey},
    traits::ProjectStore,
    validate::{validate_project_name, CollisionPolicy},
    CoreError, ValidationError,
};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

pub const MARKUP_FILE: &str = "index.html";
pub const STYLE_FILE: &str = "style.css";
pub const SCRIPT_FILE: &str = "script.js";
pub const METADATA_FILE: &str = "metadata.json";

#[derive(Debug, Error)]
pub enum LocalError {
    #[error("io error: {0}")]
    Io(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("serde error: {0}")]
    Serde(String),
    #[error("key '{key}' already holds project '{existing}'")]
    Conflict { key: StorageKey, existing: String },
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl From<LocalError> for CoreError {
    fn from(err: LocalError) -> Self {
        match err {
            LocalError::Io(msg) | LocalError::Serde(msg) => CoreError::StorageIo(msg),
            LocalError::NotFound(name) => CoreError::NotFound(name),
            LocalError::Conflict { existing, .. } => CoreError::Conflict(existing),
            LocalError::Validation(v) => CoreError::Validation(v),
        }
    }
}

/// Sidecar as found on disk. Fields are optional so a partially written or
/// hand-edited file still contributes what it can to a listing.
#[derive(Default, Deserialize)]
struct SidecarFields {
    #[serde(default)]
    name: Option<String>,
    #[serde(default, rename = "lastModified")]
    last_modified: Option<String>,
}

/// Projects stored as `<root>/<storage key>/{index.html,style.css,script.js,metadata.json}`.
///
/// Requests do not lock one another: two saves to the same key race and the
/// last rename wins, and a delete racing a load can make the load report
/// not found.
pub struct LocalStorage {
    root: PathBuf,
    policy: CollisionPolicy,
}

impl LocalStorage {
    /// Open the store, creating `root` if needed. Nothing else may touch the
    /// store until this has succeeded.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self, LocalError> {
        Self::with_policy(root, CollisionPolicy::default())
    }

    pub fn with_policy<P: AsRef<Path>>(root: P, policy: CollisionPolicy) -> Result<Self, LocalError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(|e| LocalError::Io(e.to_string()))?;
        debug!(root = %root.display(), %policy, "local store ready");
        Ok(Self { root, policy })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn policy(&self) -> CollisionPolicy {
        self.policy
    }

    pub fn project_dir(&self, name: &str) -> PathBuf {
        self.root.join(sanitize_storage_key(name))
    }

    fn read_sidecar(dir: &Path) -> Result<Option<SidecarFields>, LocalError> {
        let raw = match fs::read_to_string(dir.join(METADATA_FILE)) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(LocalError::Io(e.to_string())),
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| LocalError::Serde(e.to_string()))
    }

    fn stored_name(dir: &Path) -> Option<String> {
        Self::read_sidecar(dir)
            .ok()
            .flatten()
            .and_then(|fields| fields.name)
    }

    /// Build a listing row, falling back to the directory name and mtime for
    /// whatever the sidecar cannot supply. Returns `None` only when the
    /// directory itself can no longer be stat'ed.
    fn summarize(dir: &Path, dir_name: &str) -> Option<ProjectSummary> {
        let fields = match Self::read_sidecar(dir) {
            Ok(Some(fields)) => fields,
            Ok(None) => {
                warn!(project = dir_name, "metadata not found; falling back to folder name and mtime");
                SidecarFields::default()
            }
            Err(e) => {
                warn!(project = dir_name, error = %e, "unreadable metadata; falling back to folder name and mtime");
                SidecarFields::default()
            }
        };
        let name = fields
            .name
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| dir_name.to_owned());
        let parsed = fields
            .last_modified
            .as_deref()
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|dt| dt.with_timezone(&Utc));
        let last_modified = match parsed {
            Some(ts) => ts,
            None => dir_mtime(dir)?,
        };
        Some(ProjectSummary {
            name,
            last_modified,
        })
    }
}

impl ProjectStore for LocalStorage {
    type Error = LocalError;

    fn save(&self, name: &str, source: &ProjectSource) -> Result<ProjectMetadata, Self::Error> {
        validate_project_name(name)?;
        let key = sanitize_storage_key(name);
        let dir = self.root.join(&key);
        if self.policy == CollisionPolicy::Reject {
            if let Some(existing) = Self::stored_name(&dir) {
                if self.policy.rejects(Some(&existing), name) {
                    debug!(project = name, key = %key, existing = %existing, "local save refused: key collision");
                    return Err(LocalError::Conflict { key, existing });
                }
            }
        }
        debug!(project = name, key = %key, "local save start");
        fs::create_dir_all(&dir).map_err(|e| LocalError::Io(e.to_string()))?;
        write_atomic(&dir, MARKUP_FILE, source.markup.as_bytes())?;
        write_atomic(&dir, STYLE_FILE, source.style.as_bytes())?;
        write_atomic(&dir, SCRIPT_FILE, source.script.as_bytes())?;

        let metadata = ProjectMetadata::new(name);
        let data =
            serde_json::to_vec_pretty(&metadata).map_err(|e| LocalError::Serde(e.to_string()))?;
        write_atomic(&dir, METADATA_FILE, &data)?;
        debug!(project = name, key = %key, "local save committed");
        Ok(metadata)
    }

    fn list(&self) -> Result<Vec<ProjectSummary>, Self::Error> {
        let entries = fs::read_dir(&self.root).map_err(|e| LocalError::Io(e.to_string()))?;
        let mut projects = Vec::new();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "unreadable entry skipped during listing");
                    continue;
                }
            };
            if !entry.file_type().map(|ft| ft.is_dir()).unwrap_or(false) {
                continue;
            }
            let dir_name = entry.file_name().to_string_lossy().into_owned();
            match Self::summarize(&entry.path(), &dir_name) {
                Some(summary) => projects.push(summary),
                None => warn!(project = %dir_name, "project folder vanished during listing"),
            }
        }
        projects.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));
        debug!(returned = projects.len(), "local list returning");
        Ok(projects)
    }

    fn load(&self, name: &str) -> Result<ProjectSource, Self::Error> {
        let key = sanitize_storage_key(name);
        let dir = self.root.join(&key);
        debug!(project = name, key = %key, "local load requested");
        if !dir.is_dir() {
            return Err(LocalError::NotFound(name.to_owned()));
        }
        let read = |file: &str| match fs::read_to_string(dir.join(file)) {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(project = name, file, "local load miss");
                Err(LocalError::NotFound(name.to_owned()))
            }
            Err(e) => Err(LocalError::Io(e.to_string())),
        };
        Ok(ProjectSource {
            markup: read(MARKUP_FILE)?,
            style: read(STYLE_FILE)?,
            script: read(SCRIPT_FILE)?,
        })
    }

    fn delete(&self, name: &str) -> Result<(), Self::Error> {
        // an empty name would resolve to the root itself
        validate_project_name(name)?;
        let key = sanitize_storage_key(name);
        let dir = self.root.join(&key);
        match fs::remove_dir_all(&dir) {
            Ok(()) => {
                debug!(project = name, key = %key, "local delete removed folder");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(project = name, key = %key, "local delete: nothing to remove");
                Ok(())
            }
            Err(e) => Err(LocalError::Io(e.to_string())),
        }
    }
}

fn dir_mtime(dir: &Path) -> Option<DateTime<Utc>> {
    let modified = fs::metadata(dir).and_then(|m| m.modified()).ok()?;
    Some(DateTime::<Utc>::from(modified).trunc_subsecs(3))
}

/// Write `data` to `dir/file` through a temp file and a rename, so readers see
/// either the old or the new contents.
fn write_atomic(dir: &Path, file: &str, data: &[u8]) -> Result<(), LocalError> {
    let tmp = dir.join(format!(".{file}.tmp-{}", uuid::Uuid::new_v4().simple()));
    let final_path = dir.join(file);
    {
        let mut f = File::create(&tmp).map_err(|e| LocalError::Io(e.to_string()))?;
        f.write_all(data)
            .map_err(|e| LocalError::Io(e.to_string()))?;
        f.sync_all().map_err(|e| LocalError::Io(e.to_string()))?;
    }
    if let Err(e) = fs::rename(&tmp, &final_path) {
        let _ = fs::remove_file(&tmp);
        return Err(LocalError::Io(e.to_string()));
    }
    #[cfg(unix)]
    {
        let dir_file = File::open(dir).map_err(|e| LocalError::Io(e.to_string()))?;
        dir_file
            .sync_all()
            .map_err(|e| LocalError::Io(e.to_string()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn store() -> (TempDir, LocalStorage) {
        let tmp = tempfile::tempdir().unwrap();
        let store = LocalStorage::open(tmp.path().join("saved_projects")).unwrap();
        (tmp, store)
    }

    fn source(tag: &str) -> ProjectSource {
        ProjectSource::new(
            format!("<h1>{tag}</h1>"),
            format!("h1 {{ content: \"{tag}\"; }}"),
            format!("console.log('{tag}');"),
        )
    }

    fn write_sidecar(store: &LocalStorage, key: &str, body: &str) {
        fs::write(store.root().join(key).join(METADATA_FILE), body).unwrap();
    }

    #[test]
    fn open_creates_root() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("nested").join("projects");
        let store = LocalStorage::open(&root).unwrap();
        assert!(root.is_dir());
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn open_fails_when_root_is_a_file() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("taken");
        fs::write(&root, "not a directory").unwrap();
        assert!(matches!(LocalStorage::open(&root), Err(LocalError::Io(_))));
    }

    #[test]
    fn save_load_roundtrip_is_byte_exact() {
        let (_tmp, store) = store();
        let src = ProjectSource::new(
            "<p>\r\n  tabs\there ünïcødé</p>\n",
            "",
            "const s = `${1 + 1}`;\n\n",
        );
        store.save("demo", &src).unwrap();
        assert_eq!(store.load("demo").unwrap(), src);
    }

    #[test]
    fn save_writes_the_documented_layout() {
        let (_tmp, store) = store();
        let meta = store.save("My Project!", &source("a")).unwrap();
        let dir = store.root().join("My_Project_");
        for file in [MARKUP_FILE, STYLE_FILE, SCRIPT_FILE, METADATA_FILE] {
            assert!(dir.join(file).is_file(), "{file} missing");
        }
        let sidecar: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.join(METADATA_FILE)).unwrap()).unwrap();
        assert_eq!(sidecar["name"], "My Project!");
        assert_eq!(
            sidecar["lastModified"],
            playground_core::format_timestamp(meta.last_modified)
        );
        let leftovers: Vec<_> = fs::read_dir(&dir)
            .unwrap()
            .flatten()
            .filter(|e| e.file_name().to_string_lossy().starts_with('.'))
            .collect();
        assert!(leftovers.is_empty(), "temp files left behind");
    }

    #[test]
    fn sanitized_name_loads_and_lists_with_display_name() {
        let (_tmp, store) = store();
        store.save("My Project!", &source("a")).unwrap();
        assert_eq!(store.load("My Project!").unwrap(), source("a"));
        let listed = store.list().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "My Project!");
    }

    #[test]
    fn colliding_names_overwrite_by_default() {
        let (_tmp, store) = store();
        store.save("a/b", &source("first")).unwrap();
        store.save("a_b", &source("second")).unwrap();
        let listed = store.list().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "a_b");
        assert_eq!(store.load("a/b").unwrap(), source("second"));
    }

    #[test]
    fn reject_policy_refuses_a_different_name_on_the_same_key() {
        let tmp = tempfile::tempdir().unwrap();
        let store = LocalStorage::with_policy(tmp.path(), CollisionPolicy::Reject).unwrap();
        store.save("a/b", &source("first")).unwrap();
        let err = store.save("a_b", &source("second")).unwrap_err();
        assert!(matches!(err, LocalError::Conflict { ref existing, .. } if existing == "a/b"));
        assert_eq!(store.load("a_b").unwrap(), source("first"));
        // resaving under the original name is still allowed
        store.save("a/b", &source("third")).unwrap();
        assert_eq!(store.load("a/b").unwrap(), source("third"));
    }

    #[test]
    fn empty_name_writes_nothing() {
        let (_tmp, store) = store();
        let err = store.save("", &source("a")).unwrap_err();
        assert!(matches!(err, LocalError::Validation(ValidationError::EmptyName)));
        assert_eq!(fs::read_dir(store.root()).unwrap().count(), 0);
    }

    #[test]
    fn load_missing_project_or_file_is_not_found() {
        let (_tmp, store) = store();
        assert!(matches!(store.load("ghost"), Err(LocalError::NotFound(_))));

        store.save("partial", &source("p")).unwrap();
        fs::remove_file(store.project_dir("partial").join(STYLE_FILE)).unwrap();
        assert!(matches!(store.load("partial"), Err(LocalError::NotFound(_))));
    }

    #[test]
    fn delete_is_idempotent() {
        let (_tmp, store) = store();
        store.save("gone", &source("g")).unwrap();
        store.delete("gone").unwrap();
        assert!(!store.project_dir("gone").exists());
        store.delete("gone").unwrap();
        store.delete("never-existed").unwrap();
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn delete_with_empty_name_leaves_the_store_intact() {
        let (_tmp, store) = store();
        store.save("keep me", &source("k")).unwrap();
        assert!(matches!(
            store.delete(""),
            Err(LocalError::Validation(ValidationError::EmptyName))
        ));
        assert!(store.root().is_dir());
        assert!(store.project_dir("keep me").is_dir());
        assert_eq!(store.list().unwrap()[0].name, "keep me");
    }

    #[test]
    fn list_falls_back_when_metadata_is_missing() {
        let (_tmp, store) = store();
        store.save("stripped one", &source("s")).unwrap();
        let dir = store.project_dir("stripped one");
        fs::remove_file(dir.join(METADATA_FILE)).unwrap();
        let expected = dir_mtime(&dir).unwrap();

        let listed = store.list().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "stripped_one");
        assert_eq!(listed[0].last_modified, expected);
    }

    #[test]
    fn list_falls_back_per_field_and_on_corruption() {
        let (_tmp, store) = store();
        store.save("corrupt", &source("c")).unwrap();
        store.save("nameless", &source("n")).unwrap();
        store.save("undated", &source("u")).unwrap();
        write_sidecar(&store, "corrupt", "{ not json");
        write_sidecar(&store, "nameless", r#"{"lastModified":"2001-01-01T00:00:00.000Z"}"#);
        write_sidecar(&store, "undated", r#"{"name":"Undated Project"}"#);

        let listed = store.list().unwrap();
        let names: Vec<_> = listed.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(listed.len(), 3);
        assert!(names.contains(&"corrupt"));
        assert!(names.contains(&"Undated Project"));
        // the explicit 2001 date sorts last
        assert_eq!(listed[2].name, "nameless");
        assert_eq!(
            listed[2].last_modified,
            Utc.with_ymd_and_hms(2001, 1, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn list_sorts_newest_first_and_ignores_files() {
        let (_tmp, store) = store();
        for (name, ts) in [
            ("middle", "2023-06-01T00:00:00.000Z"),
            ("oldest", "2020-01-01T00:00:00.000Z"),
            ("newest", "2024-12-31T23:59:59.999Z"),
        ] {
            store.save(name, &source(name)).unwrap();
            write_sidecar(&store, name, &format!(r#"{{"name":"{name}","lastModified":"{ts}"}}"#));
        }
        fs::write(store.root().join("stray.txt"), "ignored").unwrap();

        let names: Vec<_> = store.list().unwrap().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["newest", "middle", "oldest"]);
    }
}
