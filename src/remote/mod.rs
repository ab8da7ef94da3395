// Remote document store contract - the sync layer only ever talks to this trait
#[cfg(test)]
pub(crate) mod fake;
pub mod path;
pub mod sqlite;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;

pub use path::{CollectionPath, Direction, DocumentId, DocumentPath, Namespace, OrderBy};
pub use sqlite::SqliteDocumentStore;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    /// Transport or service failure.
    #[error("Remote unavailable: {0}")]
    Unavailable(String),

    /// The service refused the operation (its own rules, missing document, bad data).
    #[error("Remote rejected: {0}")]
    Rejected(String),
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// A stored document as delivered by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: DocumentId,
    pub fields: Map<String, Value>,
}

impl Document {
    /// Decode into a record, exposing the key as an `id` field.
    pub fn decode<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        let mut fields = self.fields.clone();
        fields.insert("id".to_string(), Value::String(self.id.0.clone()));
        serde_json::from_value(Value::Object(fields))
    }
}

/// A single field in a write. `ServerTimestamp` is resolved by the store's clock.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Value(Value),
    ServerTimestamp,
}

/// The payload of a write.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentData(BTreeMap<String, FieldValue>);

impl DocumentData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialize a record into top-level fields. The record must serialize to an object.
    pub fn from_record<T: Serialize>(record: &T) -> RemoteResult<Self> {
        match serde_json::to_value(record) {
            Ok(Value::Object(map)) => Ok(Self(
                map.into_iter()
                    .map(|(k, v)| (k, FieldValue::Value(v)))
                    .collect(),
            )),
            Ok(other) => Err(RemoteError::Rejected(format!(
                "document must be an object, got {}",
                other
            ))),
            Err(e) => Err(RemoteError::Rejected(format!("unencodable document: {}", e))),
        }
    }

    pub fn with(mut self, field: impl Into<String>, value: Value) -> Self {
        self.0.insert(field.into(), FieldValue::Value(value));
        self
    }

    pub fn with_server_timestamp(mut self, field: impl Into<String>) -> Self {
        self.0.insert(field.into(), FieldValue::ServerTimestamp);
        self
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.0.get(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Resolve sentinels against `now` and produce plain JSON fields.
    pub fn resolve(self, now: &str) -> Map<String, Value> {
        self.0
            .into_iter()
            .map(|(k, v)| match v {
                FieldValue::Value(v) => (k, v),
                FieldValue::ServerTimestamp => (k, Value::String(now.to_string())),
            })
            .collect()
    }
}

/// Full ordered snapshots of a collection, one per remote change.
pub type SnapshotStream = BoxStream<'static, RemoteResult<Vec<Document>>>;

/// Current state of a single document, one per remote change.
pub type DocumentStream = BoxStream<'static, RemoteResult<Option<Document>>>;

/// The hosted database's client surface.
#[async_trait]
pub trait RemoteCollectionClient: Send + Sync {
    /// Live ordered query. The first item is the current state.
    async fn subscribe(&self, path: &CollectionPath, order: &OrderBy)
        -> RemoteResult<SnapshotStream>;

    /// Live single-document watch. The first item is the current state.
    async fn subscribe_document(&self, path: &DocumentPath) -> RemoteResult<DocumentStream>;

    async fn add(&self, path: &CollectionPath, data: DocumentData) -> RemoteResult<DocumentId>;

    /// Merge fields into an existing document. Missing documents are rejected.
    async fn update(&self, path: &DocumentPath, data: DocumentData) -> RemoteResult<()>;

    /// Overwrite (or create) a document in full.
    async fn set(&self, path: &DocumentPath, data: DocumentData) -> RemoteResult<()>;

    async fn delete(&self, path: &DocumentPath) -> RemoteResult<()>;

    async fn get(&self, path: &DocumentPath) -> RemoteResult<Option<Document>>;
}
