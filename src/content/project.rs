use serde::{Deserialize, Serialize, Serializer};

use super::{require_text, require_web_url};
use crate::sync::{Entry, SyncRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProjectStatus {
    #[default]
    InProgress,
    Completed,
    Shelved,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default)]
    pub status: ProjectStatus,
}

/// Fields to change on an existing project; `None` leaves a field as it is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// A blank link clears the stored one.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "blank_link_as_null"
    )]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ProjectStatus>,
}

fn blank_link_as_null<S: Serializer>(link: &Option<String>, s: S) -> Result<S::Ok, S::Error> {
    match link.as_deref().map(str::trim) {
        Some("") | None => s.serialize_none(),
        Some(link) => s.serialize_str(link),
    }
}

impl SyncRecord for Project {
    const COLLECTION: &'static str = "projects";
    type Patch = ProjectPatch;

    fn normalize(&mut self) {
        if self.link.as_deref().is_some_and(|l| l.trim().is_empty()) {
            self.link = None;
        }
    }

    fn validate(&self) -> Result<(), String> {
        require_text("Title", &self.title, 200)?;
        require_text("Description", &self.description, 5_000)?;
        if let Some(link) = &self.link {
            require_web_url("Link", link)?;
        }
        Ok(())
    }

    fn validate_patch(patch: &ProjectPatch) -> Result<(), String> {
        if let Some(title) = &patch.title {
            require_text("Title", title, 200)?;
        }
        if let Some(description) = &patch.description {
            require_text("Description", description, 5_000)?;
        }
        if let Some(link) = patch.link.as_deref().filter(|l| !l.trim().is_empty()) {
            require_web_url("Link", link)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCounts {
    pub in_progress: usize,
    pub completed: usize,
    pub shelved: usize,
}

impl StatusCounts {
    pub fn tally(entries: &[Entry<Project>]) -> Self {
        entries.iter().fold(Self::default(), |mut counts, e| {
            match e.record.status {
                ProjectStatus::InProgress => counts.in_progress += 1,
                ProjectStatus::Completed => counts.completed += 1,
                ProjectStatus::Shelved => counts.shelved += 1,
            }
            counts
        })
    }
}

pub fn with_status(entries: &[Entry<Project>], status: ProjectStatus) -> Vec<&Entry<Project>> {
    entries.iter().filter(|e| e.record.status == status).collect()
}
