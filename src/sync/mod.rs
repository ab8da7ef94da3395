//! Live mirrors of remote documents.
//!
//! [`CollectionSync`] keeps an ordered collection in local state and brokers
//! writes; [`SingletonDocSync`] does the same for a single document. Neither
//! mutates local state on write: the store's own push is the only update path.

pub mod collection;
pub mod record;
pub mod singleton;

use thiserror::Error;

use crate::remote::RemoteError;

pub use collection::{CollectionSync, CollectionView, RemoveOutcome};
pub use record::{Entry, Immutable, SyncRecord};
pub use singleton::{SingletonDocSync, SingletonView};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SyncError {
    /// The local permission gate failed; nothing was sent.
    #[error("Permission denied")]
    PermissionDenied,

    /// A required field was missing or malformed; nothing was sent.
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Remote unavailable: {0}")]
    RemoteUnavailable(String),

    /// The store refused the write even though the local gate passed.
    #[error("Remote rejected: {0}")]
    RemoteRejected(String),
}

impl From<RemoteError> for SyncError {
    fn from(e: RemoteError) -> Self {
        match e {
            RemoteError::Unavailable(msg) => SyncError::RemoteUnavailable(msg),
            RemoteError::Rejected(msg) => SyncError::RemoteRejected(msg),
        }
    }
}

pub type SyncResult<T> = Result<T, SyncError>;

/// Releases a live subscription. Dropping the handle releases it too.
#[derive(Debug)]
pub struct SubscriptionHandle {
    task: Option<tokio::task::JoinHandle<()>>,
    label: String,
}

impl SubscriptionHandle {
    pub(crate) fn new(task: tokio::task::JoinHandle<()>, label: String) -> Self {
        Self {
            task: Some(task),
            label,
        }
    }

    /// Stop receiving snapshots. Returns `false` if already released.
    pub fn unsubscribe(&mut self) -> bool {
        match self.task.take() {
            Some(task) => {
                task.abort();
                tracing::debug!("Unsubscribed from {}", self.label);
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
