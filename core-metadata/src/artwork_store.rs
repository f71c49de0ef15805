//! Persistent tier of the cover art cache
//!
//! [`DiskImageStore`] writes one file per `(content id, size)` pair under the
//! artwork cache directory. File names are SHA-256 hashes so arbitrary ids
//! are safe on every file system. Once the total size passes the cap, the
//! oldest files are removed first.

use async_trait::async_trait;
use bridge_traits::storage::FileSystemAccess;
use bytes::Bytes;
use core_runtime::logging::strip_path;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{MetadataError, Result};

const FILE_EXTENSION: &str = "img";

/// Snapshot of a persistent store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImageStoreStats {
    pub entries: usize,
    pub total_bytes: u64,
}

/// Durable image storage that outlives the process
#[async_trait]
pub trait PersistentImageStore: Send + Sync {
    async fn put(&self, content_id: &str, size: u32, data: Bytes) -> Result<()>;

    /// `Ok(None)` on a miss
    async fn get(&self, content_id: &str, size: u32) -> Result<Option<Bytes>>;

    async fn stats(&self) -> ImageStoreStats;
}

#[derive(Debug, Default)]
struct DiskIndex {
    /// Oldest first
    entries: VecDeque<(PathBuf, u64)>,
    total_bytes: u64,
}

impl DiskIndex {
    fn remove(&mut self, path: &Path) {
        if let Some(pos) = self.entries.iter().position(|(p, _)| p == path) {
            if let Some((_, size)) = self.entries.remove(pos) {
                self.total_bytes = self.total_bytes.saturating_sub(size);
            }
        }
    }

    fn push(&mut self, path: PathBuf, size: u64) {
        self.remove(&path);
        self.entries.push_back((path, size));
        self.total_bytes += size;
    }

    /// Pop entries until the total fits under `max_bytes`
    fn evict_to(&mut self, max_bytes: u64) -> Vec<PathBuf> {
        let mut victims = Vec::new();
        while self.total_bytes > max_bytes {
            match self.entries.pop_front() {
                Some((path, size)) => {
                    self.total_bytes = self.total_bytes.saturating_sub(size);
                    victims.push(path);
                }
                None => break,
            }
        }
        victims
    }
}

/// Size-capped image store on top of [`FileSystemAccess`]
pub struct DiskImageStore {
    fs: Arc<dyn FileSystemAccess>,
    directory: PathBuf,
    max_bytes: u64,
    index: Mutex<DiskIndex>,
}

impl DiskImageStore {
    /// Create the directory if needed and index what is already there.
    pub async fn open(
        fs: Arc<dyn FileSystemAccess>,
        directory: impl Into<PathBuf>,
        max_bytes: u64,
    ) -> Result<Self> {
        let directory = directory.into();
        if max_bytes == 0 {
            return Err(MetadataError::InvalidSettings(
                "Disk cache size must be greater than 0".to_string(),
            ));
        }

        fs.create_dir_all(&directory).await?;

        let mut existing = Vec::new();
        for path in fs.list_directory(&directory).await? {
            if path.extension().and_then(|e| e.to_str()) != Some(FILE_EXTENSION) {
                continue;
            }
            match fs.metadata(&path).await {
                Ok(meta) if !meta.is_directory => {
                    existing.push((meta.modified_at.unwrap_or(0), path, meta.size))
                }
                Ok(_) => {}
                Err(e) => warn!(file = %strip_path(&path.to_string_lossy()), error = %e, "Skipping unreadable artwork file"),
            }
        }
        existing.sort();

        let mut index = DiskIndex::default();
        for (_, path, size) in existing {
            index.push(path, size);
        }
        info!(
            directory = %directory.display(),
            entries = index.entries.len(),
            total_bytes = index.total_bytes,
            "Opened artwork disk cache"
        );

        let store = Self {
            fs,
            directory,
            max_bytes,
            index: Mutex::new(index),
        };
        store.enforce_cap().await;
        Ok(store)
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn path_for(&self, content_id: &str, size: u32) -> PathBuf {
        let mut hasher = Sha256::new();
        hasher.update(format!("{}@{}", content_id, size).as_bytes());
        let name = format!("{:x}.{}", hasher.finalize(), FILE_EXTENSION);
        self.directory.join(name)
    }

    async fn enforce_cap(&self) {
        let victims = self.index.lock().evict_to(self.max_bytes);
        for path in victims {
            debug!(file = %strip_path(&path.to_string_lossy()), "Evicting artwork from disk cache");
            if let Err(e) = self.fs.delete_file(&path).await {
                warn!(file = %strip_path(&path.to_string_lossy()), error = %e, "Failed to evict artwork file");
            }
        }
    }
}

#[async_trait]
impl PersistentImageStore for DiskImageStore {
    async fn put(&self, content_id: &str, size: u32, data: Bytes) -> Result<()> {
        let path = self.path_for(content_id, size);
        let len = data.len() as u64;

        self.fs.write_file_atomic(&path, data).await?;
        self.index.lock().push(path, len);
        self.enforce_cap().await;
        Ok(())
    }

    async fn get(&self, content_id: &str, size: u32) -> Result<Option<Bytes>> {
        let path = self.path_for(content_id, size);
        if !self.fs.exists(&path).await? {
            return Ok(None);
        }

        match self.fs.read_file(&path).await {
            Ok(bytes) if !bytes.is_empty() => Ok(Some(bytes)),
            Ok(_) => Ok(None),
            Err(e) => {
                warn!(content_id, size, error = %e, "Dropping unreadable artwork file");
                self.index.lock().remove(&path);
                let _ = self.fs.delete_file(&path).await;
                Ok(None)
            }
        }
    }

    async fn stats(&self) -> ImageStoreStats {
        let index = self.index.lock();
        ImageStoreStats {
            entries: index.entries.len(),
            total_bytes: index.total_bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_desktop::TokioFileSystem;
    use tempfile::TempDir;

    async fn open_store(dir: &TempDir, max_bytes: u64) -> DiskImageStore {
        let fs = Arc::new(TokioFileSystem::with_directories(
            dir.path().to_path_buf(),
            dir.path().to_path_buf(),
        ));
        DiskImageStore::open(fs, dir.path().join("artwork"), max_bytes)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir, 1024).await;

        store.put("al-1", 300, Bytes::from_static(b"jpeg")).await.unwrap();

        assert_eq!(
            store.get("al-1", 300).await.unwrap(),
            Some(Bytes::from_static(b"jpeg"))
        );
        assert_eq!(store.get("al-1", 100).await.unwrap(), None);
        assert_eq!(
            store.stats().await,
            ImageStoreStats {
                entries: 1,
                total_bytes: 4
            }
        );
    }

    #[tokio::test]
    async fn test_file_names_are_hashed() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir, 1024).await;

        let path = store.path_for("../../etc/passwd", 100);
        assert_eq!(path.parent(), Some(store.directory()));
        assert_eq!(path.file_name().unwrap().len(), 64 + 4);
    }

    #[tokio::test]
    async fn test_file_name_is_lowercase_sha256_of_key() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir, 1024).await;

        assert_eq!(
            store.path_for("al-1", 300),
            store
                .directory()
                .join("0ebe817c6d6f64e1a401312260209c9c33990ccf3e3159c6a52a165f024dd3ff.img")
        );
    }

    #[tokio::test]
    async fn test_oldest_entries_are_evicted_over_cap() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir, 10).await;

        store.put("a", 100, Bytes::from(vec![0u8; 4])).await.unwrap();
        store.put("b", 100, Bytes::from(vec![0u8; 4])).await.unwrap();
        store.put("c", 100, Bytes::from(vec![0u8; 4])).await.unwrap();

        assert_eq!(store.get("a", 100).await.unwrap(), None);
        assert!(store.get("b", 100).await.unwrap().is_some());
        assert!(store.get("c", 100).await.unwrap().is_some());
        assert_eq!(store.stats().await.total_bytes, 8);
    }

    #[tokio::test]
    async fn test_reopen_indexes_existing_files() {
        let dir = TempDir::new().unwrap();
        {
            let store = open_store(&dir, 1024).await;
            store.put("a", 100, Bytes::from_static(b"abc")).await.unwrap();
        }

        let store = open_store(&dir, 1024).await;
        assert_eq!(store.stats().await.entries, 1);
        assert!(store.get("a", 100).await.unwrap().is_some());
    }

    #[test]
    fn test_rejects_zero_cap() {
        let dir = TempDir::new().unwrap();
        let fs = Arc::new(TokioFileSystem::with_directories(
            dir.path().to_path_buf(),
            dir.path().to_path_buf(),
        ));
        let result = tokio::runtime::Runtime::new()
            .unwrap()
            .block_on(DiskImageStore::open(fs, dir.path().join("artwork"), 0));
        assert!(matches!(result, Err(MetadataError::InvalidSettings(_))));
    }
}
