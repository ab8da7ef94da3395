// The four content areas, each a sync over its own path
use std::sync::Arc;

use crate::content::{KnowledgeLink, Post, Profile, Project};
use crate::context::ClientContext;
use crate::remote::OrderBy;
use crate::sync::{CollectionSync, SingletonDocSync, SubscriptionHandle, SyncResult};

#[derive(Clone)]
pub struct Site {
    pub posts: Arc<CollectionSync<Post>>,
    pub knowledge: Arc<CollectionSync<KnowledgeLink>>,
    pub projects: Arc<CollectionSync<Project>>,
    pub profile: Arc<SingletonDocSync<Profile>>,
}

/// Live subscriptions held while the site is active. Released on drop.
pub struct Subscriptions(Vec<SubscriptionHandle>);

impl Subscriptions {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Release every live subscription; returns how many were still active.
    pub fn release(&mut self) -> usize {
        let released = self
            .0
            .iter_mut()
            .map(|h| h.unsubscribe())
            .filter(|released| *released)
            .count();
        tracing::info!("Released {} subscriptions", released);
        released
    }
}

impl Site {
    pub fn new(ctx: &ClientContext) -> Self {
        Self {
            posts: Arc::new(CollectionSync::new(ctx)),
            knowledge: Arc::new(CollectionSync::new(ctx)),
            projects: Arc::new(CollectionSync::new(ctx)),
            profile: Arc::new(SingletonDocSync::new(
                ctx,
                Profile::COLLECTION,
                Profile::DOCUMENT,
                Profile::default(),
                Profile::sanitized,
            )),
        }
    }

    /// Start every mirror, newest first. If one fails, the ones already
    /// started are released as the partial set drops.
    pub async fn activate(&self) -> SyncResult<Subscriptions> {
        let mut handles = Vec::with_capacity(4);
        handles.push(self.posts.subscribe(OrderBy::newest_first()).await?);
        handles.push(self.knowledge.subscribe(OrderBy::newest_first()).await?);
        handles.push(self.projects.subscribe(OrderBy::newest_first()).await?);
        handles.push(self.profile.subscribe().await?);
        Ok(Subscriptions(handles))
    }
}
