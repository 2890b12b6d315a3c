use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, RwLock};

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::broadcast;
use tracing::debug;

use crate::pages::{Page, PageGateway, PageSummary, StoreError};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Key for a cached value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Recency-ordered listing for one owner under one title filter
    List { owner_id: String, filter: String },
    /// A single page by id
    Page { id: String },
}

impl CacheKey {
    pub fn list(owner_id: &str, title_filter: Option<&str>) -> Self {
        CacheKey::List {
            owner_id: owner_id.to_string(),
            // The store matches titles case-insensitively, so "Groceries"
            // and "groceries" are the same listing
            filter: title_filter.unwrap_or("").to_lowercase(),
        }
    }

    pub fn page(id: &str) -> Self {
        CacheKey::Page { id: id.to_string() }
    }
}

/// Invalidation feed entry; presentation layers subscribe to these instead
/// of hooking a rendering framework into the cache.
#[derive(Debug, Clone)]
pub enum CacheEvent {
    /// Entry refreshed with a new value
    Updated(CacheKey),
    /// Entry is stale or gone; the next read refetches
    Invalidated(CacheKey),
    /// Everything dropped, e.g. on sign-out
    Cleared,
}

#[derive(Debug, Clone)]
enum CachedValue {
    Page(Page),
    List(Vec<PageSummary>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: CachedValue,
    fresh: bool,
}

type SharedFetch<T> = Shared<BoxFuture<'static, Result<T, StoreError>>>;

/// Process-wide cache of pages and page listings.
///
/// Values carry a freshness flag: mutations mark affected entries stale
/// rather than dropping them, and the next read refetches. Concurrent reads
/// of the same key share one in-flight store call. Nothing here is durable;
/// the cache is rebuilt from the gateway on demand.
///
/// Locks guard only map access and are never held across an await.
#[derive(Clone)]
pub struct PageCache {
    entries: Arc<RwLock<HashMap<CacheKey, Entry>>>,
    list_fetches: Arc<Mutex<HashMap<CacheKey, SharedFetch<Vec<PageSummary>>>>>,
    page_fetches: Arc<Mutex<HashMap<CacheKey, SharedFetch<Page>>>>,
    events: broadcast::Sender<CacheEvent>,
}

impl PageCache {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        PageCache {
            entries: Arc::new(RwLock::new(HashMap::new())),
            list_fetches: Arc::new(Mutex::new(HashMap::new())),
            page_fetches: Arc::new(Mutex::new(HashMap::new())),
            events,
        }
    }

    /// Listen for invalidations and refreshes
    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.events.subscribe()
    }

    /// Page summaries for the current user, served from cache when fresh
    pub async fn list(
        &self,
        gateway: &PageGateway,
        title_filter: Option<&str>,
    ) -> Result<Vec<PageSummary>, StoreError> {
        let owner = gateway.owner()?;
        let key = CacheKey::list(&owner, title_filter);

        if let Some(pages) = self.fresh_list(&key) {
            return Ok(pages);
        }

        debug!(?key, "list cache miss");
        let gateway = gateway.clone();
        let filter = title_filter.map(str::to_string);
        let fetch = async move { gateway.list(filter.as_deref()).await };

        self.join_or_start(&self.list_fetches, key, fetch, CachedValue::List)
            .await
    }

    /// A single page, served from cache when fresh
    pub async fn page(&self, gateway: &PageGateway, id: &str) -> Result<Page, StoreError> {
        // Reads are scoped to a session even when they would hit the cache
        gateway.owner()?;
        let key = CacheKey::page(id);

        if let Some(page) = self.fresh_page(&key) {
            return Ok(page);
        }

        debug!(?key, "page cache miss");
        let gateway = gateway.clone();
        let id = id.to_string();
        let fetch = async move { gateway.get(&id).await };

        self.join_or_start(&self.page_fetches, key, fetch, CachedValue::Page)
            .await
    }

    /// Record a successful create: every listing for the owner is stale
    pub fn note_created(&self, owner_id: &str) {
        self.invalidate_lists(owner_id);
    }

    /// Record a successful update: write the result through to the page
    /// entry and mark the owner's listings stale, since recency ordering
    /// changed.
    pub fn note_updated(&self, page: &Page) {
        let key = CacheKey::page(&page.id);
        self.entries.write().unwrap().insert(
            key.clone(),
            Entry {
                value: CachedValue::Page(page.clone()),
                fresh: true,
            },
        );
        let _ = self.events.send(CacheEvent::Updated(key));
        self.invalidate_lists(&page.owner_id);
    }

    /// Record a successful delete: evict the page and stale the listings
    pub fn note_deleted(&self, owner_id: &str, id: &str) {
        let key = CacheKey::page(id);
        self.entries.write().unwrap().remove(&key);
        let _ = self.events.send(CacheEvent::Invalidated(key));
        self.invalidate_lists(owner_id);
    }

    /// Drop everything, e.g. when the session ends
    pub fn clear(&self) {
        self.entries.write().unwrap().clear();
        let _ = self.events.send(CacheEvent::Cleared);
    }

    fn fresh_list(&self, key: &CacheKey) -> Option<Vec<PageSummary>> {
        let entries = self.entries.read().unwrap();
        match entries.get(key) {
            Some(Entry {
                value: CachedValue::List(pages),
                fresh: true,
            }) => Some(pages.clone()),
            _ => None,
        }
    }

    fn fresh_page(&self, key: &CacheKey) -> Option<Page> {
        let entries = self.entries.read().unwrap();
        match entries.get(key) {
            Some(Entry {
                value: CachedValue::Page(page),
                fresh: true,
            }) => Some(page.clone()),
            _ => None,
        }
    }

    fn invalidate_lists(&self, owner_id: &str) {
        let mut entries = self.entries.write().unwrap();
        for (key, entry) in entries.iter_mut() {
            if let CacheKey::List { owner_id: o, .. } = key {
                if o == owner_id && entry.fresh {
                    entry.fresh = false;
                    let _ = self.events.send(CacheEvent::Invalidated(key.clone()));
                }
            }
        }
    }

    /// Join an in-flight fetch for `key`, or start one. The winning future
    /// refreshes the entry on success and unregisters itself either way;
    /// every waiter receives the same result.
    fn join_or_start<T, F>(
        &self,
        fetches: &Arc<Mutex<HashMap<CacheKey, SharedFetch<T>>>>,
        key: CacheKey,
        fetch: F,
        wrap: fn(T) -> CachedValue,
    ) -> SharedFetch<T>
    where
        T: Clone + Send + Sync + 'static,
        F: Future<Output = Result<T, StoreError>> + Send + 'static,
    {
        let mut in_flight = fetches.lock().unwrap();
        if let Some(existing) = in_flight.get(&key) {
            return existing.clone();
        }

        let entries = self.entries.clone();
        let events = self.events.clone();
        let fetches = fetches.clone();
        let fetch_key = key.clone();

        let shared: SharedFetch<T> = async move {
            let result = fetch.await;
            if let Ok(value) = &result {
                entries.write().unwrap().insert(
                    fetch_key.clone(),
                    Entry {
                        value: wrap(value.clone()),
                        fresh: true,
                    },
                );
                let _ = events.send(CacheEvent::Updated(fetch_key.clone()));
            }
            fetches.lock().unwrap().remove(&fetch_key);
            result
        }
        .boxed()
        .shared();

        in_flight.insert(key, shared.clone());
        shared
    }
}

impl Default for PageCache {
    fn default() -> Self {
        PageCache::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::SessionIdentity;
    use crate::pages::{CreatePageInput, InMemoryPageBackend, PageBackend, UpdatePageInput};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Counts store traffic and can slow `list` down to widen race windows
    struct CountingBackend {
        inner: InMemoryPageBackend,
        list_calls: AtomicUsize,
        get_calls: AtomicUsize,
        list_delay: Option<Duration>,
    }

    impl CountingBackend {
        fn new() -> Self {
            CountingBackend {
                inner: InMemoryPageBackend::new(),
                list_calls: AtomicUsize::new(0),
                get_calls: AtomicUsize::new(0),
                list_delay: None,
            }
        }

        fn with_list_delay(delay: Duration) -> Self {
            CountingBackend {
                list_delay: Some(delay),
                ..CountingBackend::new()
            }
        }
    }

    #[async_trait]
    impl PageBackend for CountingBackend {
        async fn list(
            &self,
            owner_id: &str,
            title_filter: Option<&str>,
        ) -> Result<Vec<PageSummary>, StoreError> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.list_delay {
                tokio::time::sleep(delay).await;
            }
            self.inner.list(owner_id, title_filter).await
        }

        async fn get(&self, owner_id: &str, id: &str) -> Result<Page, StoreError> {
            self.get_calls.fetch_add(1, Ordering::SeqCst);
            self.inner.get(owner_id, id).await
        }

        async fn create(
            &self,
            owner_id: &str,
            input: CreatePageInput,
        ) -> Result<Page, StoreError> {
            self.inner.create(owner_id, input).await
        }

        async fn update(
            &self,
            owner_id: &str,
            id: &str,
            input: UpdatePageInput,
        ) -> Result<Page, StoreError> {
            self.inner.update(owner_id, id, input).await
        }

        async fn delete(&self, owner_id: &str, id: &str) -> Result<(), StoreError> {
            self.inner.delete(owner_id, id).await
        }
    }

    fn wire(backend: CountingBackend) -> (Arc<CountingBackend>, PageGateway, PageCache) {
        let backend = Arc::new(backend);
        let gateway = PageGateway::new(
            Arc::new(SessionIdentity::signed_in("user-1")),
            backend.clone(),
        );
        (backend, gateway, PageCache::new())
    }

    #[tokio::test]
    async fn test_repeat_list_served_from_cache() {
        let (backend, gateway, cache) = wire(CountingBackend::new());

        cache.list(&gateway, None).await.unwrap();
        cache.list(&gateway, None).await.unwrap();

        assert_eq!(backend.list_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_create_invalidates_listings() {
        let (backend, gateway, cache) = wire(CountingBackend::new());

        assert!(cache.list(&gateway, None).await.unwrap().is_empty());

        let page = gateway
            .create(CreatePageInput {
                title: "Untitled".to_string(),
                content: None,
            })
            .await
            .unwrap();
        cache.note_created(&page.owner_id);

        // The reader just asks again; the refetch is the cache's business
        let listed = cache.list(&gateway, None).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, page.id);
        assert_eq!(backend.list_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_reads_share_one_fetch() {
        let (backend, gateway, cache) =
            wire(CountingBackend::with_list_delay(Duration::from_millis(50)));

        let (a, b) = tokio::join!(cache.list(&gateway, None), cache.list(&gateway, None));
        assert!(a.is_ok() && b.is_ok());
        assert_eq!(backend.list_calls.load(Ordering::SeqCst), 1);

        // A later read misses the (settled) flight and fetches again
        cache.note_created("user-1");
        cache.list(&gateway, None).await.unwrap();
        assert_eq!(backend.list_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_update_writes_through_and_stales_listings() {
        let (backend, gateway, cache) = wire(CountingBackend::new());

        let page = gateway
            .create(CreatePageInput {
                title: "Before".to_string(),
                content: None,
            })
            .await
            .unwrap();
        cache.note_created(&page.owner_id);
        cache.list(&gateway, None).await.unwrap();

        let updated = gateway
            .update(
                &page.id,
                UpdatePageInput {
                    title: Some("After".to_string()),
                    content: None,
                },
            )
            .await
            .unwrap();
        cache.note_updated(&updated);

        // The page entry came from the write, not a fetch
        let cached = cache.page(&gateway, &page.id).await.unwrap();
        assert_eq!(cached.title, "After");
        assert_eq!(backend.get_calls.load(Ordering::SeqCst), 0);

        // Listings reorder on update, so they refetch
        let before = backend.list_calls.load(Ordering::SeqCst);
        cache.list(&gateway, None).await.unwrap();
        assert_eq!(backend.list_calls.load(Ordering::SeqCst), before + 1);
    }

    #[tokio::test]
    async fn test_delete_evicts_page_entry() {
        let (backend, gateway, cache) = wire(CountingBackend::new());

        let page = gateway
            .create(CreatePageInput {
                title: "Temp".to_string(),
                content: None,
            })
            .await
            .unwrap();
        cache.page(&gateway, &page.id).await.unwrap();
        assert_eq!(backend.get_calls.load(Ordering::SeqCst), 1);

        gateway.delete(&page.id).await.unwrap();
        cache.note_deleted(&page.owner_id, &page.id);

        assert_eq!(
            cache.page(&gateway, &page.id).await,
            Err(StoreError::NotFound)
        );
        assert_eq!(backend.get_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unauthenticated_reads_never_touch_cache_or_store() {
        let backend = Arc::new(CountingBackend::new());
        let gateway = PageGateway::new(Arc::new(SessionIdentity::anonymous()), backend.clone());
        let cache = PageCache::new();

        assert_eq!(
            cache.list(&gateway, None).await,
            Err(StoreError::Unauthenticated)
        );
        assert_eq!(
            cache.page(&gateway, "some-id").await,
            Err(StoreError::Unauthenticated)
        );
        assert_eq!(backend.list_calls.load(Ordering::SeqCst), 0);
        assert_eq!(backend.get_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_events_reach_subscribers() {
        let (_backend, gateway, cache) = wire(CountingBackend::new());
        let mut events = cache.subscribe();

        cache.list(&gateway, None).await.unwrap();
        assert!(matches!(
            events.recv().await.unwrap(),
            CacheEvent::Updated(CacheKey::List { .. })
        ));

        cache.note_created("user-1");
        assert!(matches!(
            events.recv().await.unwrap(),
            CacheEvent::Invalidated(CacheKey::List { .. })
        ));

        cache.clear();
        assert!(matches!(events.recv().await.unwrap(), CacheEvent::Cleared));
    }
}
