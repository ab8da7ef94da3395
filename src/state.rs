use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;

use crate::auth::LocalIdentityProvider;
use crate::config::Config;
use crate::site::Site;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub identity: LocalIdentityProvider,
    pub site: Site,
    pub shutdown: Shutdown,
}

/// Server-wide stop signal. Long-lived responses end when it fires.
#[derive(Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<bool>>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once [`Shutdown::trigger`] has been called.
    pub fn wait(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut rx = self.tx.subscribe();
        async move {
            // An error means every sender is gone, which is a shutdown too.
            let _ = rx.wait_for(|stopped| *stopped).await;
        }
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
