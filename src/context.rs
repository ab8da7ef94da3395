use std::sync::Arc;

use crate::remote::{CollectionPath, Namespace, RemoteCollectionClient};

/// Handles every sync component needs, built once at startup and passed down.
#[derive(Clone)]
pub struct ClientContext {
    pub remote: Arc<dyn RemoteCollectionClient>,
    pub namespace: Namespace,
}

impl ClientContext {
    pub fn new(remote: Arc<dyn RemoteCollectionClient>, app_id: &str) -> Self {
        Self {
            remote,
            namespace: Namespace::for_app(app_id),
        }
    }

    pub fn collection(&self, name: &str) -> CollectionPath {
        self.namespace.collection(name)
    }
}
