// Session state and the single permission rule derived from it
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub is_authenticated: bool,
    pub is_anonymous: bool,
    pub identity_id: Option<String>,
}

impl Session {
    pub fn signed_out() -> Self {
        Self {
            is_authenticated: false,
            is_anonymous: false,
            identity_id: None,
        }
    }

    pub fn anonymous(identity_id: impl Into<String>) -> Self {
        Self {
            is_authenticated: true,
            is_anonymous: true,
            identity_id: Some(identity_id.into()),
        }
    }

    pub fn credentialed(identity_id: impl Into<String>) -> Self {
        Self {
            is_authenticated: true,
            is_anonymous: false,
            identity_id: Some(identity_id.into()),
        }
    }

    /// The only authorization rule: a signed-in, non-anonymous identity may edit.
    pub fn can_edit(&self) -> bool {
        self.is_authenticated && !self.is_anonymous
    }

    pub fn permission(&self) -> Permission {
        Permission {
            can_edit: self.can_edit(),
            author_id: self.identity_id.clone(),
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::signed_out()
    }
}

/// What a write operation checks before touching the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Permission {
    can_edit: bool,
    author_id: Option<String>,
}

impl Permission {
    pub fn denied() -> Self {
        Self {
            can_edit: false,
            author_id: None,
        }
    }

    pub fn granted(author_id: impl Into<String>) -> Self {
        Self {
            can_edit: true,
            author_id: Some(author_id.into()),
        }
    }

    pub fn can_edit(&self) -> bool {
        self.can_edit
    }

    /// Identity recorded as `authorId` on created documents.
    pub fn author_id(&self) -> Option<&str> {
        self.author_id.as_deref()
    }
}

/// Process-wide current session for code that embeds the library without the
/// HTTP shell (the shell resolves a session per request instead).
///
/// Whoever signs in through [`crate::auth::LocalIdentityProvider`] hands the
/// resulting session to [`SessionProvider::set`] and passes
/// [`SessionProvider::permission`] to writes. Everyone else holds a read-only
/// [`PermissionWatch`].
#[derive(Clone)]
pub struct SessionProvider {
    tx: Arc<watch::Sender<Session>>,
}

impl SessionProvider {
    pub fn new(initial: Session) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    /// Replace the session. Subscribers only wake when it actually changed.
    pub fn set(&self, session: Session) {
        self.tx.send_if_modified(|current| {
            if *current == session {
                return false;
            }
            tracing::info!(
                identity = session.identity_id.as_deref().unwrap_or("-"),
                can_edit = session.can_edit(),
                "Session changed"
            );
            *current = session;
            true
        });
    }

    pub fn current(&self) -> Session {
        self.tx.borrow().clone()
    }

    pub fn permission(&self) -> Permission {
        self.tx.borrow().permission()
    }

    pub fn watch(&self) -> PermissionWatch {
        PermissionWatch {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for SessionProvider {
    fn default() -> Self {
        Self::new(Session::signed_out())
    }
}

/// Read-only view of the session that recomputes the permission on every change.
#[derive(Clone)]
pub struct PermissionWatch {
    rx: watch::Receiver<Session>,
}

impl PermissionWatch {
    pub fn current(&self) -> Permission {
        self.rx.borrow().permission()
    }

    /// Wait for the next session change and return the recomputed permission.
    /// Returns `None` once the provider is gone.
    pub async fn changed(&mut self) -> Option<Permission> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().permission())
    }
}
