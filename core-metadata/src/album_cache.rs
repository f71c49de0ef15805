//! In-memory album metadata cache
//!
//! Filled from server responses and by the download orchestrator before a
//! download starts. There is no eviction and no network fallback: a miss
//! means the metadata was never seen.

use core_library::AlbumMetadata;
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Default)]
pub struct AlbumMetadataCache {
    albums: RwLock<HashMap<String, AlbumMetadata>>,
}

impl AlbumMetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the entry for `metadata.id`
    pub fn cache_album(&self, metadata: AlbumMetadata) {
        debug!(album_id = %metadata.id, "Caching album metadata");
        self.albums.write().insert(metadata.id.clone(), metadata);
    }

    pub fn cache_albums(&self, albums: impl IntoIterator<Item = AlbumMetadata>) {
        let mut map = self.albums.write();
        for metadata in albums {
            map.insert(metadata.id.clone(), metadata);
        }
    }

    pub fn get_album(&self, album_id: &str) -> Option<AlbumMetadata> {
        self.albums.read().get(album_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.albums.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.albums.read().is_empty()
    }

    pub fn clear(&self) {
        self.albums.write().clear();
    }
}
