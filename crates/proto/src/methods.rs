use serde::{Deserialize, Serialize};

pub const ROUTE_SAVE_PROJECT: &str = "/api/save-project";
pub const ROUTE_LIST_PROJECTS: &str = "/api/list-projects";
pub const ROUTE_LOAD_PROJECT: &str = "/api/load-project/:projectName";
pub const ROUTE_DELETE_PROJECT: &str = "/api/delete-project/:projectName";
pub const ROUTE_PREVIEW_PROJECT: &str = "/preview/:projectName";
pub const ROUTE_HEALTHZ: &str = "/healthz";

pub const MSG_MISSING_FIELDS: &str = "Missing project data: name, html, css, or js";
pub const MSG_SAVE_FAILED: &str = "Error saving project.";
pub const MSG_LIST_FAILED: &str = "Error listing projects.";
pub const MSG_NOT_FOUND: &str = "Project not found.";
pub const MSG_LOAD_FAILED: &str = "Error loading project.";
pub const MSG_DELETE_FAILED: &str = "Error deleting project.";
pub const MSG_INVALID_NAME: &str = "Project name must not be empty.";

pub fn saved_message(name: &str) -> String {
    format!("Project \"{name}\" saved successfully!")
}

pub fn deleted_message(name: &str) -> String {
    format!("Project \"{name}\" deleted successfully.")
}

pub fn conflict_message(name: &str, existing: &str) -> String {
    format!("Project \"{name}\" would overwrite existing project \"{existing}\".")
}

/// Body of `POST /api/save-project`. Every field is optional on the wire so
/// that a missing field surfaces as a validation failure instead of a parse
/// failure; `null` counts as missing.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SaveProjectRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub html: Option<String>,
    #[serde(default)]
    pub css: Option<String>,
    #[serde(default)]
    pub js: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectListItem {
    pub name: String,
    #[serde(rename = "lastModified")]
    pub last_modified: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoadProjectResponse {
    pub html: String,
    pub css: String,
    pub js: String,
}
