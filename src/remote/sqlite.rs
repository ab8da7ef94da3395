// SQLite-backed document store - local stand-in for the hosted database
use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use futures::future::ready;
use futures::stream::{self, StreamExt};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use super::{
    CollectionPath, Document, DocumentData, DocumentId, DocumentPath, DocumentStream, OrderBy,
    RemoteCollectionClient, RemoteError, RemoteResult, SnapshotStream,
};
use crate::db::{self, DbPool};

const CHANGE_BUFFER: usize = 256;

/// Store-side rules, checked before any write touches the database.
#[derive(Debug, Clone, Copy, Default)]
pub struct WriteRules {
    pub read_only: bool,
}

#[derive(Clone)]
pub struct SqliteDocumentStore {
    pool: DbPool,
    rules: WriteRules,
    changes: broadcast::Sender<String>,
    clock: Arc<Mutex<DateTime<Utc>>>,
}

impl SqliteDocumentStore {
    pub fn new(pool: DbPool, rules: WriteRules) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_BUFFER);
        Self {
            pool,
            rules,
            changes,
            clock: Arc::new(Mutex::new(DateTime::<Utc>::MIN_UTC)),
        }
    }

    /// A private in-memory store with migrations applied.
    pub fn open_in_memory() -> anyhow::Result<Self> {
        let manager = SqliteConnectionManager::memory();
        // Every in-memory connection is its own database, so keep exactly one.
        let pool = Pool::builder().max_size(1).build(manager)?;
        db::run_migrations(&pool)?;
        Ok(Self::new(pool, WriteRules::default()))
    }

    /// Strictly increasing server clock, formatted so lexical order is time order.
    fn server_now(&self) -> String {
        let mut last = self.clock.lock().unwrap_or_else(|p| p.into_inner());
        let mut now = Utc::now();
        if now <= *last {
            now = *last + Duration::microseconds(1);
        }
        *last = now;
        now.to_rfc3339_opts(SecondsFormat::Nanos, true)
    }

    fn check_writable(&self, path: &dyn std::fmt::Display) -> RemoteResult<()> {
        if self.rules.read_only {
            tracing::warn!("Write to {} refused: store is read-only", path);
            return Err(RemoteError::Rejected("store is read-only".into()));
        }
        Ok(())
    }

    fn notify(&self, collection: &CollectionPath) {
        // No receivers is fine: nobody is watching this store yet.
        let _ = self.changes.send(collection.as_str().to_string());
    }

    fn query_collection(
        &self,
        path: &CollectionPath,
        order: &OrderBy,
    ) -> RemoteResult<Vec<Document>> {
        if !is_valid_field(&order.field) {
            return Err(RemoteError::Rejected(format!(
                "invalid order field: {}",
                order.field
            )));
        }

        let conn = self.pool.get().map_err(unavailable)?;
        let dir = order.direction.as_sql();
        let sql = format!(
            "SELECT id, data FROM documents WHERE collection = ?1
             ORDER BY json_extract(data, ?2) {dir}, rowid {dir}"
        );
        let mut stmt = conn.prepare(&sql).map_err(unavailable)?;
        let rows = stmt
            .query_map(params![path.as_str(), format!("$.{}", order.field)], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(unavailable)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(unavailable)?;

        rows.into_iter()
            .map(|(id, data)| parse_document(id, &data))
            .collect()
    }

    fn load(&self, path: &DocumentPath) -> RemoteResult<Option<Document>> {
        let conn = self.pool.get().map_err(unavailable)?;
        let data: Option<String> = conn
            .query_row(
                "SELECT data FROM documents WHERE collection = ?1 AND id = ?2",
                params![path.collection.as_str(), path.id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(unavailable)?;

        data.map(|d| parse_document(path.id.0.clone(), &d))
            .transpose()
    }

    /// Stream of `()` ticks, one per change to `collection` (and one per lag).
    fn change_ticks(&self, collection: &CollectionPath) -> stream::BoxStream<'static, ()> {
        let wanted = collection.as_str().to_string();
        BroadcastStream::new(self.changes.subscribe())
            .filter_map(move |msg| {
                // A lagged receiver missed events; requerying recovers the full state.
                let relevant = match msg {
                    Ok(changed) => changed == wanted,
                    Err(_) => true,
                };
                ready(relevant.then_some(()))
            })
            .boxed()
    }
}

#[async_trait]
impl RemoteCollectionClient for SqliteDocumentStore {
    async fn subscribe(
        &self,
        path: &CollectionPath,
        order: &OrderBy,
    ) -> RemoteResult<SnapshotStream> {
        // Subscribe to changes before the first query so nothing falls in between.
        let ticks = self.change_ticks(path);
        let initial = self.query_collection(path, order)?;

        let store = self.clone();
        let path = path.clone();
        let order = order.clone();
        let updates = ticks.map(move |_| store.query_collection(&path, &order));

        Ok(stream::once(ready(Ok(initial))).chain(updates).boxed())
    }

    async fn subscribe_document(&self, path: &DocumentPath) -> RemoteResult<DocumentStream> {
        let ticks = self.change_ticks(&path.collection);
        let initial = self.load(path)?;

        let store = self.clone();
        let path = path.clone();
        let updates = ticks.map(move |_| store.load(&path));

        Ok(stream::once(ready(Ok(initial))).chain(updates).boxed())
    }

    async fn add(&self, path: &CollectionPath, data: DocumentData) -> RemoteResult<DocumentId> {
        self.check_writable(path)?;

        let id = DocumentId::generate();
        let fields = data.resolve(&self.server_now());
        let json = encode_fields(fields)?;

        {
            let conn = self.pool.get().map_err(unavailable)?;
            conn.execute(
                "INSERT INTO documents (collection, id, data) VALUES (?1, ?2, ?3)",
                params![path.as_str(), id.as_str(), json],
            )
            .map_err(rejected_or_unavailable)?;
        }

        tracing::debug!(collection = %path, id = %id, "Document added");
        self.notify(path);
        Ok(id)
    }

    async fn update(&self, path: &DocumentPath, data: DocumentData) -> RemoteResult<()> {
        self.check_writable(path)?;
        let changes = data.resolve(&self.server_now());

        {
            let mut conn = self.pool.get().map_err(unavailable)?;
            let tx = conn.transaction().map_err(unavailable)?;

            let existing: Option<String> = tx
                .query_row(
                    "SELECT data FROM documents WHERE collection = ?1 AND id = ?2",
                    params![path.collection.as_str(), path.id.as_str()],
                    |row| row.get(0),
                )
                .optional()
                .map_err(unavailable)?;

            let existing =
                existing.ok_or_else(|| RemoteError::Rejected(format!("no document at {}", path)))?;
            let mut fields = parse_document(path.id.0.clone(), &existing)?.fields;
            fields.extend(changes);

            tx.execute(
                "UPDATE documents SET data = ?3 WHERE collection = ?1 AND id = ?2",
                params![
                    path.collection.as_str(),
                    path.id.as_str(),
                    encode_fields(fields)?
                ],
            )
            .map_err(rejected_or_unavailable)?;
            tx.commit().map_err(unavailable)?;
        }

        tracing::debug!(path = %path, "Document updated");
        self.notify(&path.collection);
        Ok(())
    }

    async fn set(&self, path: &DocumentPath, data: DocumentData) -> RemoteResult<()> {
        self.check_writable(path)?;
        let json = encode_fields(data.resolve(&self.server_now()))?;

        {
            let conn = self.pool.get().map_err(unavailable)?;
            conn.execute(
                "INSERT INTO documents (collection, id, data) VALUES (?1, ?2, ?3)
                 ON CONFLICT(collection, id) DO UPDATE SET data = excluded.data",
                params![path.collection.as_str(), path.id.as_str(), json],
            )
            .map_err(rejected_or_unavailable)?;
        }

        tracing::debug!(path = %path, "Document overwritten");
        self.notify(&path.collection);
        Ok(())
    }

    async fn delete(&self, path: &DocumentPath) -> RemoteResult<()> {
        self.check_writable(path)?;

        let removed = {
            let conn = self.pool.get().map_err(unavailable)?;
            conn.execute(
                "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
                params![path.collection.as_str(), path.id.as_str()],
            )
            .map_err(unavailable)?
        };

        tracing::debug!(path = %path, removed, "Document deleted");
        if removed > 0 {
            self.notify(&path.collection);
        }
        Ok(())
    }

    async fn get(&self, path: &DocumentPath) -> RemoteResult<Option<Document>> {
        self.load(path)
    }
}

fn is_valid_field(field: &str) -> bool {
    !field.is_empty() && field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn parse_document(id: String, data: &str) -> RemoteResult<Document> {
    match serde_json::from_str::<Value>(data) {
        Ok(Value::Object(fields)) => Ok(Document {
            id: DocumentId(id),
            fields,
        }),
        Ok(_) => Err(RemoteError::Unavailable(format!(
            "stored document {} is not an object",
            id
        ))),
        Err(e) => Err(RemoteError::Unavailable(format!(
            "stored document {} is corrupt: {}",
            id, e
        ))),
    }
}

fn encode_fields(fields: Map<String, Value>) -> RemoteResult<String> {
    serde_json::to_string(&Value::Object(fields))
        .map_err(|e| RemoteError::Rejected(format!("unencodable document: {}", e)))
}

fn unavailable(e: impl std::fmt::Display) -> RemoteError {
    tracing::error!("Document store error: {}", e);
    RemoteError::Unavailable(e.to_string())
}

fn rejected_or_unavailable(e: rusqlite::Error) -> RemoteError {
    match e {
        rusqlite::Error::SqliteFailure(ref err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            RemoteError::Rejected(e.to_string())
        }
        other => unavailable(other),
    }
}
