use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{errors::ValidationError, model::ProjectSource};

pub fn validate_project_name(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() {
        Err(ValidationError::EmptyName)
    } else {
        Ok(())
    }
}

/// Assemble a triple from optional request fields. Empty strings are valid content.
pub fn require_sources(
    markup: Option<String>,
    style: Option<String>,
    script: Option<String>,
) -> Result<ProjectSource, ValidationError> {
    Ok(ProjectSource {
        markup: markup.ok_or(ValidationError::MissingField("html"))?,
        style: style.ok_or(ValidationError::MissingField("css"))?,
        script: script.ok_or(ValidationError::MissingField("js"))?,
    })
}

/// What a save does when its key already belongs to a project with a different
/// display name.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollisionPolicy {
    /// Last writer wins.
    #[default]
    Overwrite,
    /// Refuse the save with a conflict.
    Reject,
}

impl CollisionPolicy {
    /// True when saving `incoming` over a key whose sidecar names `existing`
    /// must be refused.
    pub fn rejects(self, existing: Option<&str>, incoming: &str) -> bool {
        match self {
            CollisionPolicy::Overwrite => false,
            CollisionPolicy::Reject => existing.is_some_and(|name| name != incoming),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CollisionPolicy::Overwrite => "overwrite",
            CollisionPolicy::Reject => "reject",
        }
    }
}

impl FromStr for CollisionPolicy {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "overwrite" => Ok(CollisionPolicy::Overwrite),
            "reject" => Ok(CollisionPolicy::Reject),
            other => Err(ValidationError::UnknownPolicy(other.to_owned())),
        }
    }
}

impl fmt::Display for CollisionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_strings_are_valid_sources() {
        let src = require_sources(Some(String::new()), Some(String::new()), Some(String::new()))
            .unwrap();
        assert_eq!(src, ProjectSource::default());
    }

    #[test]
    fn each_missing_source_is_named() {
        let s = || Some("x".to_string());
        assert_eq!(
            require_sources(None, s(), s()),
            Err(ValidationError::MissingField("html"))
        );
        assert_eq!(
            require_sources(s(), None, s()),
            Err(ValidationError::MissingField("css"))
        );
        assert_eq!(
            require_sources(s(), s(), None),
            Err(ValidationError::MissingField("js"))
        );
    }

    #[test]
    fn empty_name_is_rejected() {
        assert_eq!(validate_project_name(""), Err(ValidationError::EmptyName));
        assert!(validate_project_name(" ").is_ok());
    }

    #[test]
    fn reject_policy_only_fires_on_a_different_name() {
        let policy = CollisionPolicy::Reject;
        assert!(policy.rejects(Some("a/b"), "a_b"));
        assert!(!policy.rejects(Some("a_b"), "a_b"));
        assert!(!policy.rejects(None, "a_b"));
        assert!(!CollisionPolicy::Overwrite.rejects(Some("a/b"), "a_b"));
    }

    #[test]
    fn policy_parses_case_insensitively() {
        assert_eq!("Reject".parse::<CollisionPolicy>(), Ok(CollisionPolicy::Reject));
        assert!("merge".parse::<CollisionPolicy>().is_err());
    }
}
