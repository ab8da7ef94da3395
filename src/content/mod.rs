// Site content kinds and the pure helpers views use to render them
pub mod knowledge;
pub mod post;
pub mod profile;
pub mod project;

use chrono::{DateTime, Utc};

pub use knowledge::{group_by_category, KnowledgeLink, DEFAULT_CATEGORY};
pub use post::{MediaKind, Post};
pub use profile::{Contact, Profile};
pub use project::{with_status, Project, ProjectPatch, ProjectStatus, StatusCounts};

/// Reject blank strings and strings over `max` characters.
pub(crate) fn require_text(field: &str, value: &str, max: usize) -> Result<(), String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(format!("{} cannot be empty", field));
    }
    if trimmed.chars().count() > max {
        return Err(format!("{} must be {} characters or less", field, max));
    }
    Ok(())
}

/// Accept only absolute http(s) URLs.
pub(crate) fn require_web_url(field: &str, value: &str) -> Result<url::Url, String> {
    let parsed =
        url::Url::parse(value.trim()).map_err(|e| format!("{} is not a valid URL: {}", field, e))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(format!("{} must use http or https, not {}", field, other)),
    }
}

pub fn format_relative_time(dt: &DateTime<Utc>) -> String {
    let diff = Utc::now().signed_duration_since(*dt);

    let seconds = diff.num_seconds();
    if seconds < 60 {
        return "just now".to_string();
    }

    let minutes = diff.num_minutes();
    if minutes < 60 {
        return format!("{}m ago", minutes);
    }

    let hours = diff.num_hours();
    if hours < 24 {
        return format!("{}h ago", hours);
    }

    let days = diff.num_days();
    if days < 7 {
        return format!("{}d ago", days);
    }

    dt.format("%b %-d, %Y").to_string()
}
