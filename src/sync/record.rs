use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::remote::DocumentId;

/// A record kind that lives in its own remote collection.
pub trait SyncRecord: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Collection name under the app namespace.
    const COLLECTION: &'static str;

    /// Partial update payload. Use [`Immutable`] for kinds that only support create/delete.
    type Patch: Serialize + Send + Sync;

    /// Fill defaults before validation (e.g. a blank category).
    fn normalize(&mut self) {}

    fn validate(&self) -> Result<(), String>;

    fn validate_patch(_patch: &Self::Patch) -> Result<(), String> {
        Ok(())
    }
}

/// Patch type for records that cannot be updated in place. Has no values.
#[derive(Debug, Clone, Copy, Serialize)]
pub enum Immutable {}

/// A mirrored document: store-assigned metadata plus the record's own fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry<T> {
    pub id: DocumentId,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_id: Option<String>,
    #[serde(flatten)]
    pub record: T,
}
