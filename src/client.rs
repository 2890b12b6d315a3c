use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::auth::IdentityProvider;
use crate::cache::{CacheEvent, PageCache};
use crate::content::ContentTree;
use crate::pages::{CreatePageInput, Page, PageBackend, PageGateway, PageSummary, StoreError};
use crate::sync::{SyncEngine, SyncHandle};

/// Composition root for the sync core.
///
/// Builds one gateway/cache pair and shares it with every page session.
/// Presentation code talks only to this type and to the [`SyncHandle`]s it
/// returns; it never reaches into the gateway or the cache directly.
pub struct PageClient {
    identity: Arc<dyn IdentityProvider>,
    gateway: PageGateway,
    cache: PageCache,
    engine: SyncEngine,
}

impl PageClient {
    /// Wire the core together. Call from within a tokio runtime: a watcher
    /// task clears the cache on sign-out so one user's pages never leak
    /// into the next session.
    pub fn new(identity: Arc<dyn IdentityProvider>, backend: Arc<dyn PageBackend>) -> Self {
        let gateway = PageGateway::new(identity.clone(), backend);
        let cache = PageCache::new();
        let engine = SyncEngine::new(gateway.clone(), cache.clone());

        let mut identity_changes = identity.subscribe();
        let session_cache = cache.clone();
        tokio::spawn(async move {
            while identity_changes.changed().await.is_ok() {
                if identity_changes.borrow_and_update().is_none() {
                    session_cache.clear();
                }
            }
        });

        PageClient {
            identity,
            gateway,
            cache,
            engine,
        }
    }

    /// Override the debounce window, mainly for tests and demos
    pub fn with_quiet_period(mut self, quiet_period: Duration) -> Self {
        self.engine = self.engine.with_quiet_period(quiet_period);
        self
    }

    /// Recency-ordered page summaries for the current user, optionally
    /// narrowed by a case-insensitive title search
    pub async fn pages(&self, title_filter: Option<&str>) -> Result<Vec<PageSummary>, StoreError> {
        self.cache.list(&self.gateway, title_filter).await
    }

    /// A single page by id
    pub async fn page(&self, id: &str) -> Result<Page, StoreError> {
        self.cache.page(&self.gateway, id).await
    }

    /// Create a page with an empty body and surface it in later listings
    pub async fn create_page(&self, title: impl Into<String>) -> Result<Page, StoreError> {
        let input = CreatePageInput {
            title: title.into(),
            content: Some(ContentTree::empty()),
        };
        let page = self.gateway.create(input).await?;
        self.cache.note_created(&page.owner_id);
        Ok(page)
    }

    /// Delete a page and evict it everywhere
    pub async fn delete_page(&self, id: &str) -> Result<(), StoreError> {
        let owner = self.gateway.owner()?;
        self.gateway.delete(id).await?;
        self.cache.note_deleted(&owner, id);
        Ok(())
    }

    /// Begin an editing session on a page
    pub fn open(&self, page: &Page) -> SyncHandle {
        self.engine.open(&page.id)
    }

    /// Cache invalidation feed for presentation-layer refresh
    pub fn events(&self) -> broadcast::Receiver<CacheEvent> {
        self.cache.subscribe()
    }

    pub fn identity(&self) -> &Arc<dyn IdentityProvider> {
        &self.identity
    }
}
