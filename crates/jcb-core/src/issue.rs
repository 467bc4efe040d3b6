//! Jira issue model: the raw `search` payload and the domain `Issue`.

use std::fmt;

use serde::Deserialize;

use crate::domain::IssueKey;

/// Body of a Jira `search` response. Only `issues` is used.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub issues: Vec<RawIssue>,
}

/// One issue record as returned by the Jira REST API.
#[derive(Clone, Debug, Deserialize)]
pub struct RawIssue {
    pub key: String,
    pub fields: RawFields,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RawFields {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub assignee: Option<RawUser>,
    #[serde(default)]
    pub reporter: Option<RawUser>,
    pub status: Named,
    pub priority: Named,
    #[serde(default)]
    pub labels: Option<Vec<String>>,
    #[serde(default)]
    pub versions: Option<Vec<Named>>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RawUser {
    #[serde(rename = "displayName")]
    pub display_name: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Named {
    pub name: String,
}

/// Priority class. Only exact `P0` / `P1` names are recognized.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Priority {
    P0,
    P1,
    Other(String),
}

impl Priority {
    pub fn from_name(name: &str) -> Self {
        match name {
            "P0" => Priority::P0,
            "P1" => Priority::P1,
            other => Priority::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Priority::P0 => "P0",
            Priority::P1 => "P1",
            Priority::Other(name) => name,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A Jira issue, built fresh from each poll and never mutated afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Issue {
    pub key: IssueKey,
    pub summary: String,
    /// Markdown-ish rich text; empty when Jira has none.
    pub description: String,
    pub assignee: Option<String>,
    pub reporter: Option<String>,
    pub status: String,
    pub priority: Priority,
    pub labels: Vec<String>,
    /// First affected version, or empty.
    pub affected_version: String,
}

impl Issue {
    pub fn to_summary(&self) -> String {
        format!("{}: {}", self.key, self.summary)
    }
}

impl From<RawIssue> for Issue {
    fn from(raw: RawIssue) -> Self {
        let f = raw.fields;
        let affected_version = f
            .versions
            .and_then(|v| v.into_iter().next())
            .map(|v| v.name)
            .unwrap_or_default();

        Self {
            key: IssueKey(raw.key),
            summary: f.summary,
            description: f.description.unwrap_or_default(),
            assignee: f.assignee.map(|u| u.display_name),
            reporter: f.reporter.map(|u| u.display_name),
            status: f.status.name,
            priority: Priority::from_name(&f.priority.name),
            labels: f.labels.unwrap_or_default(),
            affected_version,
        }
    }
}
