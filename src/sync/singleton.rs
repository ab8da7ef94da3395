use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;

use super::collection::ensure_permitted;
use super::{SubscriptionHandle, SyncError, SyncResult};
use crate::context::ClientContext;
use crate::remote::{Document, DocumentData, DocumentId, DocumentPath, RemoteCollectionClient};
use crate::session::Permission;

type Sanitizer<T> = Arc<dyn Fn(T) -> T + Send + Sync>;

#[derive(Debug, Clone, Serialize)]
pub struct SingletonView<T> {
    pub value: T,
    /// False until the document has been read at least once.
    pub loaded: bool,
    pub error: Option<String>,
}

/// Read-then-cache-then-write access to exactly one document.
pub struct SingletonDocSync<T> {
    remote: Arc<dyn RemoteCollectionClient>,
    path: DocumentPath,
    default: T,
    sanitize: Sanitizer<T>,
    cache: Arc<watch::Sender<SingletonView<T>>>,
}

impl<T> SingletonDocSync<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// `default` stands in for an absent document; `sanitize` runs on every save.
    pub fn new(
        ctx: &ClientContext,
        collection: &str,
        doc_id: &str,
        default: T,
        sanitize: impl Fn(T) -> T + Send + Sync + 'static,
    ) -> Self {
        let path = ctx.collection(collection).doc(&DocumentId::new(doc_id));
        let (cache, _) = watch::channel(SingletonView {
            value: default.clone(),
            loaded: false,
            error: None,
        });
        Self {
            remote: Arc::clone(&ctx.remote),
            path,
            default,
            sanitize: Arc::new(sanitize),
            cache: Arc::new(cache),
        }
    }

    pub fn path(&self) -> &DocumentPath {
        &self.path
    }

    pub fn current(&self) -> T {
        self.cache.borrow().value.clone()
    }

    pub fn watch(&self) -> watch::Receiver<SingletonView<T>> {
        self.cache.subscribe()
    }

    /// Read the document once. An absent document yields the default.
    pub async fn fetch_once(&self) -> SyncResult<T> {
        let doc = self.remote.get(&self.path).await?;
        let value = resolve(doc.as_ref(), &self.default)
            .map_err(|e| SyncError::RemoteUnavailable(format!("{}: {}", self.path, e)))?;

        self.cache.send_replace(SingletonView {
            value: value.clone(),
            loaded: true,
            error: None,
        });
        Ok(value)
    }

    /// Sanitize and overwrite the whole document. Fields left out are gone afterwards.
    pub async fn save(&self, record: T, permission: &Permission) -> SyncResult<()> {
        ensure_permitted(permission, "save", &self.path)?;

        let record = (self.sanitize)(record);
        let data = DocumentData::from_record(&record)
            .map_err(|e| SyncError::ValidationFailed(e.to_string()))?;

        self.remote.set(&self.path, data).await?;
        tracing::info!(path = %self.path, "Saved document");

        self.cache.send_replace(SingletonView {
            value: record,
            loaded: true,
            error: None,
        });
        Ok(())
    }

    /// Optional live mirror of the document, same semantics as a collection subscription.
    pub async fn subscribe(&self) -> SyncResult<SubscriptionHandle> {
        let mut updates = self.remote.subscribe_document(&self.path).await?;

        let cache = Arc::clone(&self.cache);
        let default = self.default.clone();
        let label = self.path.to_string();
        let task = tokio::spawn(async move {
            while let Some(event) = updates.next().await {
                let decoded = event
                    .map_err(|e| e.to_string())
                    .and_then(|doc| resolve(doc.as_ref(), &default).map_err(|e| e.to_string()));
                match decoded {
                    Ok(value) => {
                        cache.send_replace(SingletonView {
                            value,
                            loaded: true,
                            error: None,
                        });
                    }
                    Err(e) => {
                        tracing::error!("{}: update failed: {}", label, e);
                        cache.send_modify(|v| v.error = Some(e));
                    }
                }
            }
        });

        tracing::info!("Subscribed to {}", self.path);
        Ok(SubscriptionHandle::new(task, self.path.to_string()))
    }

    pub fn unsubscribe(&self, handle: &mut SubscriptionHandle) -> bool {
        handle.unsubscribe()
    }
}

fn resolve<T: DeserializeOwned + Clone>(doc: Option<&Document>, default: &T) -> serde_json::Result<T> {
    match doc {
        Some(doc) => doc.decode(),
        None => Ok(default.clone()),
    }
}
