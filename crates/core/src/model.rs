use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// The three source texts that make up a project.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProjectSource {
    pub markup: String,
    pub style: String,
    pub script: String,
}

impl ProjectSource {
    pub fn new(
        markup: impl Into<String>,
        style: impl Into<String>,
        script: impl Into<String>,
    ) -> Self {
        Self {
            markup: markup.into(),
            style: style.into(),
            script: script.into(),
        }
    }
}

/// Sidecar record kept next to a project's sources. It is the only place the
/// unsanitized display name survives.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectMetadata {
    pub name: String,
    #[serde(rename = "lastModified", with = "iso_millis")]
    pub last_modified: DateTime<Utc>,
}

impl ProjectMetadata {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            last_modified: now_millis(),
        }
    }
}

/// One row of a project listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProjectSummary {
    pub name: String,
    pub last_modified: DateTime<Utc>,
}

impl From<ProjectMetadata> for ProjectSummary {
    fn from(meta: ProjectMetadata) -> Self {
        Self {
            name: meta.name,
            last_modified: meta.last_modified,
        }
    }
}

/// Current time truncated to whole milliseconds, the precision the sidecar keeps.
pub fn now_millis() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// ISO-8601 in UTC with millisecond precision and a `Z` suffix.
pub fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

mod iso_millis {
    use chrono::{DateTime, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format_timestamp(*dt))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(de::Error::custom)
    }
}
