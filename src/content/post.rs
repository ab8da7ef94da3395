use serde::{Deserialize, Serialize};

use super::{require_text, require_web_url};
use crate::sync::{Immutable, SyncRecord};

const MAX_TITLE: usize = 200;
const MAX_CONTENT: usize = 20_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub title: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
}

impl SyncRecord for Post {
    const COLLECTION: &'static str = "posts";
    type Patch = Immutable;

    fn normalize(&mut self) {
        if self.media_url.as_deref().is_some_and(|u| u.trim().is_empty()) {
            self.media_url = None;
        }
    }

    fn validate(&self) -> Result<(), String> {
        require_text("Title", &self.title, MAX_TITLE)?;
        require_text("Content", &self.content, MAX_CONTENT)?;
        if let Some(url) = &self.media_url {
            require_web_url("Media URL", url)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Other,
}

impl Post {
    /// How the attached media should be embedded, guessed from the URL's extension.
    pub fn media_kind(&self) -> Option<MediaKind> {
        let raw = self.media_url.as_deref()?;
        let path = url::Url::parse(raw)
            .map(|u| u.path().to_string())
            .unwrap_or_else(|_| raw.to_string());

        let kind = match mime_guess::from_path(&path).first() {
            Some(mime) if mime.type_() == mime_guess::mime::IMAGE => MediaKind::Image,
            Some(mime) if mime.type_() == mime_guess::mime::VIDEO => MediaKind::Video,
            _ => MediaKind::Other,
        };
        Some(kind)
    }
}
