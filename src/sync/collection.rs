use futures::StreamExt;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::watch;

use super::{Entry, SubscriptionHandle, SyncError, SyncRecord, SyncResult};
use crate::context::ClientContext;
use crate::remote::{
    CollectionPath, Document, DocumentData, DocumentId, OrderBy, RemoteCollectionClient,
};
use crate::session::Permission;

/// What a view renders: the mirrored entries in remote order.
#[derive(Debug, Clone, Serialize)]
pub struct CollectionView<T> {
    pub entries: Vec<Entry<T>>,
    /// True until the first snapshot arrives.
    pub loading: bool,
    /// Last snapshot failure; cleared by the next good snapshot.
    pub error: Option<String>,
}

impl<T> Default for CollectionView<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            loading: true,
            error: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,
    /// Not confirmed; nothing was sent.
    Cancelled,
}

/// Mirrors one remote collection and brokers writes to it.
pub struct CollectionSync<T: SyncRecord> {
    remote: Arc<dyn RemoteCollectionClient>,
    path: CollectionPath,
    view: Arc<watch::Sender<CollectionView<T>>>,
}

impl<T: SyncRecord> CollectionSync<T> {
    pub fn new(ctx: &ClientContext) -> Self {
        Self::at(ctx, ctx.collection(T::COLLECTION))
    }

    pub fn at(ctx: &ClientContext, path: CollectionPath) -> Self {
        let (view, _) = watch::channel(CollectionView::default());
        Self {
            remote: Arc::clone(&ctx.remote),
            path,
            view: Arc::new(view),
        }
    }

    pub fn path(&self) -> &CollectionPath {
        &self.path
    }

    /// Receiver that wakes on every applied snapshot.
    pub fn watch(&self) -> watch::Receiver<CollectionView<T>> {
        self.view.subscribe()
    }

    pub fn view(&self) -> CollectionView<T> {
        self.view.borrow().clone()
    }

    pub fn entries(&self) -> Vec<Entry<T>> {
        self.view.borrow().entries.clone()
    }

    /// Start mirroring. Each snapshot replaces the local entries wholesale.
    pub async fn subscribe(&self, order: OrderBy) -> SyncResult<SubscriptionHandle> {
        let mut snapshots = self.remote.subscribe(&self.path, &order).await.map_err(|e| {
            tracing::warn!("Subscribe to {} failed: {}", self.path, e);
            SyncError::from(e)
        })?;

        let view = Arc::clone(&self.view);
        let label = self.path.to_string();
        let task = tokio::spawn(async move {
            while let Some(event) = snapshots.next().await {
                match event {
                    Ok(docs) => {
                        let entries = decode_entries::<T>(&docs, &label);
                        tracing::debug!("{}: applied snapshot of {}", label, entries.len());
                        view.send_replace(CollectionView {
                            entries,
                            loading: false,
                            error: None,
                        });
                    }
                    Err(e) => {
                        tracing::error!("{}: snapshot failed: {}", label, e);
                        view.send_modify(|v| {
                            v.loading = false;
                            v.error = Some(e.to_string());
                        });
                    }
                }
            }
            tracing::debug!("{}: snapshot stream ended", label);
        });

        tracing::info!("Subscribed to {}", self.path);
        Ok(SubscriptionHandle::new(task, self.path.to_string()))
    }

    /// Release a subscription. Safe to call more than once.
    pub fn unsubscribe(&self, handle: &mut SubscriptionHandle) -> bool {
        handle.unsubscribe()
    }

    /// Submit a new record with a server-assigned `createdAt` and the author's identity.
    /// Local state only changes when the resulting snapshot arrives.
    pub async fn create(&self, record: &T, permission: &Permission) -> SyncResult<()> {
        ensure_permitted(permission, "create", &self.path)?;

        let mut record = record.clone();
        record.normalize();
        record.validate().map_err(SyncError::ValidationFailed)?;

        let mut data = DocumentData::from_record(&record)
            .map_err(|e| SyncError::ValidationFailed(e.to_string()))?
            .with_server_timestamp("createdAt");
        if let Some(author) = permission.author_id() {
            data = data.with("authorId", Value::String(author.to_string()));
        }

        let id = self.remote.add(&self.path, data).await?;
        tracing::info!(collection = %self.path, id = %id, "Created document");
        Ok(())
    }

    /// Merge `patch` into an existing document and stamp a server `updatedAt`.
    pub async fn update(
        &self,
        id: &DocumentId,
        patch: &T::Patch,
        permission: &Permission,
    ) -> SyncResult<()> {
        ensure_permitted(permission, "update", &self.path)?;
        T::validate_patch(patch).map_err(SyncError::ValidationFailed)?;

        let data = DocumentData::from_record(patch)
            .map_err(|e| SyncError::ValidationFailed(e.to_string()))?
            .with_server_timestamp("updatedAt");

        self.remote.update(&self.path.doc(id), data).await?;
        tracing::info!(collection = %self.path, id = %id, "Updated document");
        Ok(())
    }

    /// Delete a document. Without confirmation nothing is sent.
    pub async fn remove(
        &self,
        id: &DocumentId,
        permission: &Permission,
        confirmed: bool,
    ) -> SyncResult<RemoveOutcome> {
        ensure_permitted(permission, "remove", &self.path)?;
        if !confirmed {
            tracing::debug!(collection = %self.path, id = %id, "Removal not confirmed");
            return Ok(RemoveOutcome::Cancelled);
        }

        self.remote.delete(&self.path.doc(id)).await?;
        tracing::info!(collection = %self.path, id = %id, "Removed document");
        Ok(RemoveOutcome::Removed)
    }
}

pub(crate) fn ensure_permitted(
    permission: &Permission,
    action: &str,
    target: &dyn std::fmt::Display,
) -> SyncResult<()> {
    if permission.can_edit() {
        Ok(())
    } else {
        tracing::debug!("Refused {} on {}: not permitted", action, target);
        Err(SyncError::PermissionDenied)
    }
}

fn decode_entries<T: SyncRecord>(docs: &[Document], label: &str) -> Vec<Entry<T>> {
    docs.iter()
        .filter_map(|doc| match doc.decode::<Entry<T>>() {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!("{}: skipping undecodable document {}: {}", label, doc.id, e);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{Post, Project, ProjectPatch, ProjectStatus};
    use crate::remote::fake::{doc, Call, FakeRemote, Feeds};
    use crate::remote::{FieldValue, RemoteError};
    use serde_json::json;
    use std::time::Duration;

    fn setup<T: SyncRecord>() -> (Arc<FakeRemote>, Feeds, CollectionSync<T>) {
        let (remote, feeds) = FakeRemote::new();
        let ctx = ClientContext::new(remote.clone(), "test-app");
        (remote, feeds, CollectionSync::new(&ctx))
    }

    fn owner() -> Permission {
        Permission::granted("owner")
    }

    fn post(title: &str, content: &str) -> Post {
        Post {
            title: title.into(),
            content: content.into(),
            media_url: None,
        }
    }

    async fn settle<T: SyncRecord>(
        rx: &mut watch::Receiver<CollectionView<T>>,
        pred: impl FnMut(&CollectionView<T>) -> bool,
    ) -> CollectionView<T> {
        tokio::time::timeout(Duration::from_secs(2), rx.wait_for(pred))
            .await
            .expect("view did not settle")
            .expect("view sender dropped")
            .clone()
    }

    #[tokio::test]
    async fn mirror_equals_latest_snapshot() {
        let (_remote, feeds, sync) = setup::<Post>();
        let mut rx = sync.watch();
        assert!(rx.borrow().loading);
        let _handle = sync.subscribe(OrderBy::newest_first()).await.unwrap();

        feeds
            .snapshots
            .send(Ok(vec![
                doc("b", json!({"title": "B", "content": "2"})),
                doc("a", json!({"title": "A", "content": "1"})),
            ]))
            .unwrap();
        feeds
            .snapshots
            .send(Ok(vec![doc("c", json!({"title": "C", "content": "3"}))]))
            .unwrap();

        let view = settle(&mut rx, |v| v.entries.first().is_some_and(|e| e.id.as_str() == "c")).await;
        assert!(!view.loading);
        assert_eq!(view.entries.len(), 1);
        assert_eq!(view.entries[0].record.title, "C");
    }

    #[tokio::test]
    async fn snapshot_order_is_kept_as_delivered() {
        let (_remote, feeds, sync) = setup::<Post>();
        let mut rx = sync.watch();
        let _handle = sync.subscribe(OrderBy::newest_first()).await.unwrap();

        feeds
            .snapshots
            .send(Ok(vec![
                doc("new", json!({"title": "new", "content": "x", "createdAt": "2026-01-02T00:00:00Z"})),
                doc("old", json!({"title": "old", "content": "x", "createdAt": "2026-01-01T00:00:00Z"})),
            ]))
            .unwrap();

        let view = settle(&mut rx, |v| !v.loading).await;
        let ids: Vec<_> = view.entries.iter().map(|e| e.id.as_str().to_string()).collect();
        assert_eq!(ids, vec!["new", "old"]);
    }

    #[tokio::test]
    async fn undecodable_documents_are_skipped() {
        let (_remote, feeds, sync) = setup::<Post>();
        let mut rx = sync.watch();
        let _handle = sync.subscribe(OrderBy::newest_first()).await.unwrap();

        feeds
            .snapshots
            .send(Ok(vec![
                doc("ok", json!({"title": "fine", "content": "x"})),
                doc("bad", json!({"title": 42})),
            ]))
            .unwrap();

        let view = settle(&mut rx, |v| !v.loading).await;
        assert_eq!(view.entries.len(), 1);
        assert_eq!(view.entries[0].id.as_str(), "ok");
    }

    #[tokio::test]
    async fn snapshot_error_keeps_previous_entries() {
        let (_remote, feeds, sync) = setup::<Post>();
        let mut rx = sync.watch();
        let _handle = sync.subscribe(OrderBy::newest_first()).await.unwrap();

        feeds
            .snapshots
            .send(Ok(vec![doc("a", json!({"title": "A", "content": "1"}))]))
            .unwrap();
        feeds
            .snapshots
            .send(Err(RemoteError::Unavailable("offline".into())))
            .unwrap();

        let view = settle(&mut rx, |v| v.error.is_some()).await;
        assert_eq!(view.entries.len(), 1);
        assert!(view.error.unwrap().contains("offline"));
    }

    #[tokio::test]
    async fn subscribe_failure_is_surfaced() {
        let (remote, _feeds, sync) = setup::<Post>();
        remote.fail_with(RemoteError::Unavailable("no route".into()));

        let err = sync.subscribe(OrderBy::newest_first()).await.unwrap_err();
        assert_eq!(err, SyncError::RemoteUnavailable("no route".into()));
        assert!(sync.view().loading);
    }

    #[tokio::test]
    async fn unsubscribe_stops_applying_snapshots() {
        let (_remote, feeds, sync) = setup::<Post>();
        let mut rx = sync.watch();
        let mut handle = sync.subscribe(OrderBy::newest_first()).await.unwrap();

        feeds
            .snapshots
            .send(Ok(vec![doc("a", json!({"title": "A", "content": "1"}))]))
            .unwrap();
        settle(&mut rx, |v| v.entries.len() == 1).await;

        assert!(sync.unsubscribe(&mut handle));
        assert!(!sync.unsubscribe(&mut handle));
        tokio::task::yield_now().await;

        // The forwarding task is gone, so the feed has no reader.
        let _ = feeds.snapshots.send(Ok(vec![]));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(sync.entries().len(), 1);
    }

    #[tokio::test]
    async fn create_without_permission_never_calls_remote() {
        let (remote, _feeds, sync) = setup::<Post>();
        let err = sync
            .create(&post("Hi", "World"), &Permission::denied())
            .await
            .unwrap_err();
        assert_eq!(err, SyncError::PermissionDenied);
        assert!(remote.calls().is_empty());
    }

    #[tokio::test]
    async fn create_rejects_invalid_record_locally() {
        let (remote, _feeds, sync) = setup::<Post>();
        let err = sync.create(&post("  ", "World"), &owner()).await.unwrap_err();
        assert!(matches!(err, SyncError::ValidationFailed(_)));
        assert!(remote.calls().is_empty());
    }

    #[tokio::test]
    async fn create_sends_one_add_with_server_timestamp() {
        let (remote, feeds, sync) = setup::<Post>();
        let mut rx = sync.watch();
        let _handle = sync.subscribe(OrderBy::newest_first()).await.unwrap();
        feeds.snapshots.send(Ok(vec![])).unwrap();
        settle(&mut rx, |v| !v.loading).await;

        sync.create(&post("Hi", "World"), &owner()).await.unwrap();

        let adds: Vec<_> = remote
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Add(path, data) => Some((path, data)),
                _ => None,
            })
            .collect();
        assert_eq!(adds.len(), 1);
        let (path, data) = &adds[0];
        assert_eq!(path, "artifacts/test-app/public/data/posts");
        assert_eq!(data.get("createdAt"), Some(&FieldValue::ServerTimestamp));
        assert_eq!(
            data.get("authorId"),
            Some(&FieldValue::Value(json!("owner")))
        );
        assert_eq!(data.get("title"), Some(&FieldValue::Value(json!("Hi"))));

        // No optimistic insert: the mirror waits for the store.
        assert!(sync.entries().is_empty());

        feeds
            .snapshots
            .send(Ok(vec![doc(
                "p1",
                json!({"title": "Hi", "content": "World", "createdAt": "2026-10-16T08:00:00Z", "authorId": "owner"}),
            )]))
            .unwrap();
        let view = settle(&mut rx, |v| v.entries.len() == 1).await;
        assert_eq!(view.entries[0].record, post("Hi", "World"));
        assert_eq!(view.entries[0].author_id.as_deref(), Some("owner"));
    }

    #[tokio::test]
    async fn remote_failure_on_create_is_surfaced_and_state_untouched() {
        let (remote, feeds, sync) = setup::<Post>();
        let mut rx = sync.watch();
        let _handle = sync.subscribe(OrderBy::newest_first()).await.unwrap();
        feeds
            .snapshots
            .send(Ok(vec![doc("a", json!({"title": "A", "content": "1"}))]))
            .unwrap();
        settle(&mut rx, |v| v.entries.len() == 1).await;

        remote.fail_with(RemoteError::Rejected("rules".into()));
        let err = sync.create(&post("Hi", "World"), &owner()).await.unwrap_err();
        assert_eq!(err, SyncError::RemoteRejected("rules".into()));
        assert_eq!(sync.entries().len(), 1);
    }

    #[tokio::test]
    async fn remove_without_confirmation_never_calls_remote() {
        let (remote, _feeds, sync) = setup::<Post>();
        let outcome = sync
            .remove(&DocumentId::new("p1"), &owner(), false)
            .await
            .unwrap();
        assert_eq!(outcome, RemoveOutcome::Cancelled);
        assert!(remote.calls().is_empty());
    }

    #[tokio::test]
    async fn remove_checks_permission_first() {
        let (remote, _feeds, sync) = setup::<Post>();
        let err = sync
            .remove(&DocumentId::new("p1"), &Permission::denied(), true)
            .await
            .unwrap_err();
        assert_eq!(err, SyncError::PermissionDenied);
        assert!(remote.calls().is_empty());
    }

    #[tokio::test]
    async fn confirmed_remove_deletes_document() {
        let (remote, _feeds, sync) = setup::<Post>();
        let outcome = sync
            .remove(&DocumentId::new("p1"), &owner(), true)
            .await
            .unwrap();
        assert_eq!(outcome, RemoveOutcome::Removed);
        assert_eq!(
            remote.calls(),
            vec![Call::Delete("artifacts/test-app/public/data/posts/p1".into())]
        );
    }

    #[tokio::test]
    async fn update_merges_patch_with_updated_stamp() {
        let (remote, _feeds, sync) = setup::<Project>();
        let patch = ProjectPatch {
            status: Some(ProjectStatus::Completed),
            ..Default::default()
        };
        sync.update(&DocumentId::new("p1"), &patch, &owner())
            .await
            .unwrap();

        let calls = remote.calls();
        let Call::Update(path, data) = &calls[0] else {
            panic!("expected update, got {:?}", calls);
        };
        assert_eq!(path, "artifacts/test-app/public/data/projects/p1");
        assert_eq!(data.get("status"), Some(&FieldValue::Value(json!("completed"))));
        assert_eq!(data.get("updatedAt"), Some(&FieldValue::ServerTimestamp));
        assert!(data.get("title").is_none());
    }

    #[tokio::test]
    async fn update_without_permission_is_denied() {
        let (remote, _feeds, sync) = setup::<Project>();
        let err = sync
            .update(
                &DocumentId::new("p1"),
                &ProjectPatch::default(),
                &Permission::denied(),
            )
            .await
            .unwrap_err();
        assert_eq!(err, SyncError::PermissionDenied);
        assert!(remote.calls().is_empty());
    }

    #[tokio::test]
    async fn concurrent_updates_mirror_last_snapshot() {
        let (_remote, feeds, sync) = setup::<Project>();
        let mut rx = sync.watch();
        let _handle = sync.subscribe(OrderBy::newest_first()).await.unwrap();

        let to = |status: ProjectStatus| ProjectPatch {
            status: Some(status),
            ..Default::default()
        };
        let (id, perm) = (DocumentId::new("p1"), owner());
        let (completed, shelved) = (to(ProjectStatus::Completed), to(ProjectStatus::Shelved));
        let (a, b) = tokio::join!(
            sync.update(&id, &completed, &perm),
            sync.update(&id, &shelved, &perm),
        );
        a.unwrap();
        b.unwrap();

        let project = |status: &str| {
            doc(
                "p1",
                json!({"title": "Site", "description": "d", "status": status}),
            )
        };
        feeds.snapshots.send(Ok(vec![project("completed")])).unwrap();
        feeds.snapshots.send(Ok(vec![project("shelved")])).unwrap();

        let view = settle(&mut rx, |v| {
            v.entries
                .first()
                .is_some_and(|e| e.record.status == ProjectStatus::Shelved)
        })
        .await;
        assert_eq!(view.entries.len(), 1);
        assert_eq!(view.entries[0].record.status, ProjectStatus::Shelved);
    }
}
