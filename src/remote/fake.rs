// Scriptable remote for unit tests: records every call, replays pushed snapshots
use async_trait::async_trait;
use futures::stream::StreamExt;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use super::*;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Subscribe(String),
    SubscribeDocument(String),
    Add(String, DocumentData),
    Update(String, DocumentData),
    Set(String, DocumentData),
    Delete(String),
    Get(String),
}

type Feed<T> = Mutex<Option<mpsc::UnboundedReceiver<RemoteResult<T>>>>;

pub struct FakeRemote {
    calls: Mutex<Vec<Call>>,
    failure: Mutex<Option<RemoteError>>,
    docs: Mutex<HashMap<String, Document>>,
    snapshots: Feed<Vec<Document>>,
    document: Feed<Option<Document>>,
}

pub struct Feeds {
    pub snapshots: mpsc::UnboundedSender<RemoteResult<Vec<Document>>>,
    pub document: mpsc::UnboundedSender<RemoteResult<Option<Document>>>,
}

impl FakeRemote {
    pub fn new() -> (Arc<Self>, Feeds) {
        let (snap_tx, snap_rx) = mpsc::unbounded_channel();
        let (doc_tx, doc_rx) = mpsc::unbounded_channel();
        let remote = Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            failure: Mutex::new(None),
            docs: Mutex::new(HashMap::new()),
            snapshots: Mutex::new(Some(snap_rx)),
            document: Mutex::new(Some(doc_rx)),
        });
        (
            remote,
            Feeds {
                snapshots: snap_tx,
                document: doc_tx,
            },
        )
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Every following call fails with `err`.
    pub fn fail_with(&self, err: RemoteError) {
        *self.failure.lock().unwrap() = Some(err);
    }

    pub fn put(&self, path: &DocumentPath, fields: serde_json::Value) {
        let doc = Document {
            id: path.id.clone(),
            fields: fields.as_object().cloned().unwrap_or_default(),
        };
        self.docs.lock().unwrap().insert(path.to_string(), doc);
    }

    fn record(&self, call: Call) -> RemoteResult<()> {
        self.calls.lock().unwrap().push(call);
        match self.failure.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

pub fn doc(id: &str, fields: serde_json::Value) -> Document {
    Document {
        id: DocumentId::new(id),
        fields: fields.as_object().cloned().unwrap_or_default(),
    }
}

#[async_trait]
impl RemoteCollectionClient for FakeRemote {
    async fn subscribe(
        &self,
        path: &CollectionPath,
        _order: &OrderBy,
    ) -> RemoteResult<SnapshotStream> {
        self.record(Call::Subscribe(path.to_string()))?;
        let rx = self
            .snapshots
            .lock()
            .unwrap()
            .take()
            .expect("fake supports one collection subscription");
        Ok(UnboundedReceiverStream::new(rx).boxed())
    }

    async fn subscribe_document(&self, path: &DocumentPath) -> RemoteResult<DocumentStream> {
        self.record(Call::SubscribeDocument(path.to_string()))?;
        let rx = self
            .document
            .lock()
            .unwrap()
            .take()
            .expect("fake supports one document subscription");
        Ok(UnboundedReceiverStream::new(rx).boxed())
    }

    async fn add(&self, path: &CollectionPath, data: DocumentData) -> RemoteResult<DocumentId> {
        self.record(Call::Add(path.to_string(), data))?;
        Ok(DocumentId::generate())
    }

    async fn update(&self, path: &DocumentPath, data: DocumentData) -> RemoteResult<()> {
        self.record(Call::Update(path.to_string(), data))
    }

    async fn set(&self, path: &DocumentPath, data: DocumentData) -> RemoteResult<()> {
        self.record(Call::Set(path.to_string(), data))
    }

    async fn delete(&self, path: &DocumentPath) -> RemoteResult<()> {
        self.record(Call::Delete(path.to_string()))
    }

    async fn get(&self, path: &DocumentPath) -> RemoteResult<Option<Document>> {
        self.record(Call::Get(path.to_string()))?;
        Ok(self.docs.lock().unwrap().get(&path.to_string()).cloned())
    }
}
