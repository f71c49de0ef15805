//! Cover Art Cache
//!
//! Two-tier image cache keyed by `(content id, size)`.
//!
//! ## Lookup order
//!
//! 1. LRU memory tier
//! 2. Persistent store (a hit is copied back into memory)
//! 3. `MusicService::cover_art`, only while online content may be loaded
//!
//! A successful fetch fills both tiers and clears any stale error for the
//! key. A failed fetch is remembered so the UI can show a placeholder
//! instead of spinning. Being offline is not an error.
//!
//! ## Usage
//!
//! ```ignore
//! use core_metadata::CoverArtCache;
//!
//! let cache = CoverArtCache::new(music_service, settings)
//!     .with_persistent_store(disk_store);
//! cache.configure_availability(offline_coordinator);
//!
//! if let Some(bytes) = cache.load_image("al-1", 300).await {
//!     // decode and display
//! }
//! ```

use bytes::Bytes;
use core_library::{ContentAvailability, MusicService};
use core_runtime::config::ArtworkSettings;
use lru::LruCache;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::artwork_store::{ImageStoreStats, PersistentImageStore};

/// Cache key: content id at one pixel size
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtworkKey {
    pub content_id: String,
    pub size: u32,
}

impl ArtworkKey {
    pub fn new(content_id: impl Into<String>, size: u32) -> Self {
        Self {
            content_id: content_id.into(),
            size,
        }
    }
}

/// Snapshot for diagnostics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoverArtStats {
    pub memory_entries: usize,
    pub memory_capacity: usize,
    pub loading: usize,
    pub errors: usize,
    pub disk: Option<ImageStoreStats>,
}

/// Counts one in-flight fetch for `key` until dropped.
///
/// Overlapping fetches of the same key each hold a guard, so the key stays
/// loading until the last one finishes.
struct LoadingGuard<'a> {
    loading: &'a Mutex<HashMap<ArtworkKey, usize>>,
    key: ArtworkKey,
}

impl<'a> LoadingGuard<'a> {
    fn enter(loading: &'a Mutex<HashMap<ArtworkKey, usize>>, key: ArtworkKey) -> Self {
        *loading.lock().entry(key.clone()).or_insert(0) += 1;
        Self { loading, key }
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        let mut loading = self.loading.lock();
        if let Some(count) = loading.get_mut(&self.key) {
            *count -= 1;
            if *count == 0 {
                loading.remove(&self.key);
            }
        }
    }
}

pub struct CoverArtCache {
    service: Arc<dyn MusicService>,
    availability: RwLock<Option<Arc<dyn ContentAvailability>>>,
    persistent: Option<Arc<dyn PersistentImageStore>>,
    memory: Mutex<LruCache<ArtworkKey, Bytes>>,
    loading: Mutex<HashMap<ArtworkKey, usize>>,
    errors: Mutex<HashMap<ArtworkKey, String>>,
    settings: ArtworkSettings,
}

impl CoverArtCache {
    pub fn new(service: Arc<dyn MusicService>, settings: ArtworkSettings) -> Self {
        let capacity = NonZeroUsize::new(settings.memory_capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            service,
            availability: RwLock::new(None),
            persistent: None,
            memory: Mutex::new(LruCache::new(capacity)),
            loading: Mutex::new(HashMap::new()),
            errors: Mutex::new(HashMap::new()),
            settings,
        }
    }

    pub fn with_persistent_store(mut self, store: Arc<dyn PersistentImageStore>) -> Self {
        self.persistent = Some(store);
        self
    }

    /// Attach the offline coordinator. Until this is called no network
    /// fetch is attempted.
    pub fn configure_availability(&self, availability: Arc<dyn ContentAvailability>) {
        *self.availability.write() = Some(availability);
    }

    pub fn settings(&self) -> &ArtworkSettings {
        &self.settings
    }

    fn can_fetch(&self) -> bool {
        self.availability
            .read()
            .as_ref()
            .map(|a| a.can_load_online_content())
            .unwrap_or(false)
    }

    fn report_timeout(&self) {
        if let Some(availability) = self.availability.read().as_ref() {
            availability.report_timeout();
        }
    }

    /// Memory-tier peek; never touches disk or network.
    pub fn get_image(&self, content_id: &str, size: u32) -> Option<Bytes> {
        self.memory
            .lock()
            .get(&ArtworkKey::new(content_id, size))
            .cloned()
    }

    pub fn is_loading(&self, content_id: &str, size: u32) -> bool {
        self.loading
            .lock()
            .contains_key(&ArtworkKey::new(content_id, size))
    }

    /// Last fetch failure for this key, cleared by the next success
    pub fn get_error(&self, content_id: &str, size: u32) -> Option<String> {
        self.errors
            .lock()
            .get(&ArtworkKey::new(content_id, size))
            .cloned()
    }

    #[instrument(skip(self))]
    pub async fn load_image(&self, content_id: &str, size: u32) -> Option<Bytes> {
        if content_id.is_empty() {
            return None;
        }
        let key = ArtworkKey::new(content_id, size);

        if let Some(bytes) = self.memory.lock().get(&key).cloned() {
            return Some(bytes);
        }

        if let Some(store) = &self.persistent {
            match store.get(content_id, size).await {
                Ok(Some(bytes)) => {
                    debug!("Cover art served from disk");
                    self.memory.lock().put(key, bytes.clone());
                    return Some(bytes);
                }
                Ok(None) => {}
                Err(e) => warn!(error = %e, "Persistent artwork lookup failed"),
            }
        }

        if !self.can_fetch() {
            debug!("Offline, skipping cover art fetch");
            return None;
        }

        let _guard = LoadingGuard::enter(&self.loading, key.clone());

        match self.service.cover_art(content_id, size).await {
            Ok(bytes) => {
                self.memory.lock().put(key.clone(), bytes.clone());
                self.errors.lock().remove(&key);

                if let Some(store) = &self.persistent {
                    if let Err(e) = store.put(content_id, size, bytes.clone()).await {
                        warn!(error = %e, "Failed to persist cover art");
                    }
                }
                debug!(bytes = bytes.len(), "Cover art fetched");
                Some(bytes)
            }
            Err(e) => {
                warn!(error = %e, "Cover art fetch failed");
                if e.is_timeout() {
                    self.report_timeout();
                }
                self.errors.lock().insert(key, e.to_string());
                None
            }
        }
    }

    /// Wait `delay`, then [`load_image`](Self::load_image).
    pub async fn load_image_staggered(
        &self,
        content_id: &str,
        size: u32,
        delay: Duration,
    ) -> Option<Bytes> {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.load_image(content_id, size).await
    }

    /// Warm every size in `sizes`, spacing requests by `stagger`.
    /// Returns how many sizes are now cached.
    pub async fn prime(&self, content_id: &str, sizes: &[u32], stagger: Duration) -> usize {
        let mut loaded = 0;
        for (i, size) in sizes.iter().enumerate() {
            let delay = if i == 0 { Duration::ZERO } else { stagger };
            if self
                .load_image_staggered(content_id, *size, delay)
                .await
                .is_some()
            {
                loaded += 1;
            }
        }
        debug!(content_id, loaded, requested = sizes.len(), "Primed cover art");
        loaded
    }

    pub async fn stats(&self) -> CoverArtStats {
        let (memory_entries, memory_capacity) = {
            let memory = self.memory.lock();
            (memory.len(), memory.cap().get())
        };
        let loading = self.loading.lock().len();
        let errors = self.errors.lock().len();

        let disk = match &self.persistent {
            Some(store) => Some(store.stats().await),
            None => None,
        };

        CoverArtStats {
            memory_entries,
            memory_capacity,
            loading,
            errors,
            disk,
        }
    }

    /// Drop the memory tier and recorded errors; disk is untouched.
    pub fn clear_memory(&self) {
        self.memory.lock().clear();
        self.errors.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use core_library::{AlbumDetails, Result as ServiceResult, ServiceError};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct FakeService {
        calls: AtomicUsize,
        fail_with: Mutex<Option<ServiceError>>,
    }

    impl FakeService {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_with: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl MusicService for FakeService {
        async fn get_album(&self, album_id: &str) -> ServiceResult<AlbumDetails> {
            Err(ServiceError::Generic(format!("no album {}", album_id)))
        }

        async fn stream_url(&self, _song_id: &str) -> ServiceResult<Option<String>> {
            Ok(None)
        }

        async fn cover_art(&self, cover_art_id: &str, size: u32) -> ServiceResult<Bytes> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(err) = self.fail_with.lock().clone() {
                return Err(err);
            }
            Ok(Bytes::from(format!("{}:{}", cover_art_id, size)))
        }
    }

    struct Availability {
        online: AtomicBool,
        timeouts: AtomicUsize,
    }

    impl Availability {
        fn new(online: bool) -> Arc<Self> {
            Arc::new(Self {
                online: AtomicBool::new(online),
                timeouts: AtomicUsize::new(0),
            })
        }
    }

    impl ContentAvailability for Availability {
        fn can_load_online_content(&self) -> bool {
            self.online.load(Ordering::SeqCst)
        }

        fn report_timeout(&self) {
            self.timeouts.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct MemoryStore {
        images: Mutex<HashMap<ArtworkKey, Bytes>>,
    }

    #[async_trait]
    impl PersistentImageStore for MemoryStore {
        async fn put(&self, content_id: &str, size: u32, data: Bytes) -> crate::Result<()> {
            self.images
                .lock()
                .insert(ArtworkKey::new(content_id, size), data);
            Ok(())
        }

        async fn get(&self, content_id: &str, size: u32) -> crate::Result<Option<Bytes>> {
            Ok(self
                .images
                .lock()
                .get(&ArtworkKey::new(content_id, size))
                .cloned())
        }

        async fn stats(&self) -> ImageStoreStats {
            let images = self.images.lock();
            ImageStoreStats {
                entries: images.len(),
                total_bytes: images.values().map(|b| b.len() as u64).sum(),
            }
        }
    }

    fn cache_with(
        service: Arc<FakeService>,
        store: Arc<MemoryStore>,
        availability: Arc<Availability>,
    ) -> CoverArtCache {
        let cache = CoverArtCache::new(service, ArtworkSettings::default())
            .with_persistent_store(store);
        cache.configure_availability(availability);
        cache
    }

    #[tokio::test]
    async fn test_fetch_fills_both_tiers() {
        let service = Arc::new(FakeService::new());
        let store = Arc::new(MemoryStore::default());
        let cache = cache_with(service.clone(), store.clone(), Availability::new(true));

        let bytes = cache.load_image("al-1", 300).await.unwrap();
        assert_eq!(&bytes[..], b"al-1:300");
        assert_eq!(cache.get_image("al-1", 300), Some(bytes));
        assert_eq!(store.stats().await.entries, 1);
        assert!(!cache.is_loading("al-1", 300));

        cache.load_image("al-1", 300).await.unwrap();
        assert_eq!(service.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_disk_hit_backfills_memory_offline() {
        let service = Arc::new(FakeService::new());
        let store = Arc::new(MemoryStore::default());
        store
            .put("al-1", 100, Bytes::from_static(b"cached"))
            .await
            .unwrap();
        let cache = cache_with(service.clone(), store, Availability::new(false));

        assert_eq!(
            cache.load_image("al-1", 100).await,
            Some(Bytes::from_static(b"cached"))
        );
        assert!(cache.get_image("al-1", 100).is_some());
        assert_eq!(service.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_offline_miss_is_not_an_error() {
        let service = Arc::new(FakeService::new());
        let cache = cache_with(
            service.clone(),
            Arc::new(MemoryStore::default()),
            Availability::new(false),
        );

        assert!(cache.load_image("al-1", 300).await.is_none());
        assert!(cache.get_error("al-1", 300).is_none());
        assert_eq!(service.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unconfigured_availability_fails_closed() {
        let service = Arc::new(FakeService::new());
        let cache = CoverArtCache::new(service.clone(), ArtworkSettings::default());

        assert!(cache.load_image("al-1", 300).await.is_none());
        assert_eq!(service.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failure_is_recorded_and_cleared_by_success() {
        let service = Arc::new(FakeService::new());
        *service.fail_with.lock() = Some(ServiceError::Generic("HTTP 500".into()));
        let availability = Availability::new(true);
        let cache = cache_with(
            service.clone(),
            Arc::new(MemoryStore::default()),
            availability.clone(),
        );

        assert!(cache.load_image("al-1", 300).await.is_none());
        assert!(cache.get_error("al-1", 300).unwrap().contains("HTTP 500"));
        assert!(!cache.is_loading("al-1", 300));
        assert_eq!(availability.timeouts.load(Ordering::SeqCst), 0);

        *service.fail_with.lock() = None;
        assert!(cache.load_image("al-1", 300).await.is_some());
        assert!(cache.get_error("al-1", 300).is_none());
    }

    #[tokio::test]
    async fn test_timeout_is_reported() {
        let service = Arc::new(FakeService::new());
        *service.fail_with.lock() = Some(ServiceError::Timeout("read".into()));
        let availability = Availability::new(true);
        let cache = cache_with(service, Arc::new(MemoryStore::default()), availability.clone());

        assert!(cache.load_image("al-1", 300).await.is_none());
        assert_eq!(availability.timeouts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_prime_loads_every_size() {
        let service = Arc::new(FakeService::new());
        let cache = cache_with(
            service.clone(),
            Arc::new(MemoryStore::default()),
            Availability::new(true),
        );

        let loaded = cache
            .prime("al-1", &[100, 300, 500], Duration::from_millis(1))
            .await;

        assert_eq!(loaded, 3);
        assert_eq!(service.calls.load(Ordering::SeqCst), 3);

        let stats = cache.stats().await;
        assert_eq!(stats.memory_entries, 3);
        assert_eq!(stats.disk.unwrap().entries, 3);

        cache.clear_memory();
        assert_eq!(cache.stats().await.memory_entries, 0);
    }

    #[tokio::test]
    async fn test_empty_content_id_is_ignored() {
        let service = Arc::new(FakeService::new());
        let cache = cache_with(
            service.clone(),
            Arc::new(MemoryStore::default()),
            Availability::new(true),
        );

        assert!(cache.load_image("", 300).await.is_none());
        assert_eq!(service.calls.load(Ordering::SeqCst), 0);
    }

    /// Each `cover_art` call waits for its own permit.
    struct GatedService {
        calls: AtomicUsize,
        gate: tokio::sync::Semaphore,
    }

    #[async_trait]
    impl MusicService for GatedService {
        async fn get_album(&self, album_id: &str) -> ServiceResult<AlbumDetails> {
            Err(ServiceError::Generic(format!("no album {}", album_id)))
        }

        async fn stream_url(&self, _song_id: &str) -> ServiceResult<Option<String>> {
            Ok(None)
        }

        async fn cover_art(&self, cover_art_id: &str, size: u32) -> ServiceResult<Bytes> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.gate
                .acquire()
                .await
                .map_err(|e| ServiceError::Generic(e.to_string()))?
                .forget();
            Ok(Bytes::from(format!("{}:{}", cover_art_id, size)))
        }
    }

    #[tokio::test]
    async fn test_overlapping_fetches_stay_loading_until_last_finishes() {
        let service = Arc::new(GatedService {
            calls: AtomicUsize::new(0),
            gate: tokio::sync::Semaphore::new(0),
        });
        let cache = Arc::new(CoverArtCache::new(service.clone(), ArtworkSettings::default()));
        cache.configure_availability(Availability::new(true));

        let spawn_load = |cache: Arc<CoverArtCache>| {
            tokio::spawn(async move { cache.load_image("al-1", 300).await })
        };

        let first = spawn_load(cache.clone());
        while service.calls.load(Ordering::SeqCst) < 1 {
            tokio::task::yield_now().await;
        }
        let second = spawn_load(cache.clone());
        while service.calls.load(Ordering::SeqCst) < 2 {
            tokio::task::yield_now().await;
        }
        assert!(cache.is_loading("al-1", 300));
        assert_eq!(cache.stats().await.loading, 1);

        service.gate.add_permits(1);
        assert!(first.await.unwrap().is_some());
        assert!(cache.is_loading("al-1", 300));

        service.gate.add_permits(1);
        assert!(second.await.unwrap().is_some());
        assert!(!cache.is_loading("al-1", 300));
        assert_eq!(cache.stats().await.loading, 0);
    }
}
