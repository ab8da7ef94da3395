use serde::{Deserialize, Serialize};

use super::{require_text, require_web_url};
use crate::sync::{Entry, Immutable, SyncRecord};

pub const DEFAULT_CATEGORY: &str = "uncategorized";

fn default_category() -> String {
    DEFAULT_CATEGORY.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeLink {
    pub title: String,
    pub url: String,
    #[serde(default = "default_category")]
    pub category: String,
}

impl SyncRecord for KnowledgeLink {
    const COLLECTION: &'static str = "knowledge";
    type Patch = Immutable;

    fn normalize(&mut self) {
        let trimmed = self.category.trim();
        self.category = if trimmed.is_empty() {
            default_category()
        } else {
            trimmed.to_string()
        };
    }

    fn validate(&self) -> Result<(), String> {
        require_text("Title", &self.title, 200)?;
        require_web_url("URL", &self.url)?;
        Ok(())
    }
}

/// Group links by category. Groups appear in order of their first link;
/// links keep their mirror order inside each group.
pub fn group_by_category(
    entries: &[Entry<KnowledgeLink>],
) -> Vec<(String, Vec<&Entry<KnowledgeLink>>)> {
    let mut groups: Vec<(String, Vec<&Entry<KnowledgeLink>>)> = Vec::new();
    for entry in entries {
        let category = &entry.record.category;
        match groups.iter_mut().find(|(name, _)| name == category) {
            Some((_, links)) => links.push(entry),
            None => groups.push((category.clone(), vec![entry])),
        }
    }
    groups
}
