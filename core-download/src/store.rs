//! # Download Store
//!
//! Source of truth for what is available offline.
//!
//! The whole collection lives in memory and is written to
//! `Downloads/downloaded_albums.json` after every mutation. Mutations are
//! serialized by an async mutex that is held across the save, and the
//! in-memory view is only replaced after the save succeeded, so memory and
//! disk never diverge.
//!
//! Reads are synchronous and served from a snapshot with a derived set of
//! song ids for O(1) membership checks.

use bridge_traits::storage::FileSystemAccess;
use bytes::Bytes;
use core_library::{DownloadedAlbum, DownloadedSong};
use core_runtime::logging::strip_path;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::error::{DownloadError, Result};
use crate::naming::{format_megabytes, legacy_file_name};

/// Index file name inside the downloads root
pub const INDEX_FILE: &str = "downloaded_albums.json";

#[derive(Debug, Default, Clone)]
struct Snapshot {
    albums: Vec<DownloadedAlbum>,
    song_ids: HashSet<String>,
}

impl Snapshot {
    fn new(albums: Vec<DownloadedAlbum>) -> Self {
        let song_ids = albums
            .iter()
            .flat_map(|album| album.all_song_ids().map(str::to_string))
            .collect();
        Self { albums, song_ids }
    }

    fn find(&self, album_id: &str) -> Option<&DownloadedAlbum> {
        self.albums.iter().find(|album| album.id == album_id)
    }
}

pub struct DownloadStore {
    fs: Arc<dyn FileSystemAccess>,
    root: PathBuf,
    snapshot: RwLock<Snapshot>,
    write_lock: Mutex<()>,
}

impl DownloadStore {
    /// Create the downloads root if needed and load the index once.
    ///
    /// An unreadable index is moved aside and the store starts empty.
    #[instrument(skip(fs))]
    pub async fn open(fs: Arc<dyn FileSystemAccess>, root: PathBuf) -> Result<Self> {
        fs.create_dir_all(&root).await?;

        let index_path = root.join(INDEX_FILE);
        let albums = if fs.exists(&index_path).await? {
            let raw = fs.read_file(&index_path).await?;
            match serde_json::from_slice::<Vec<DownloadedAlbum>>(&raw) {
                Ok(albums) => albums,
                Err(e) => {
                    warn!(error = %e, "Downloaded albums index is corrupt, starting empty");
                    let aside = root.join(format!("{}.corrupt", INDEX_FILE));
                    if let Err(e) = fs.rename(&index_path, &aside).await {
                        warn!(error = %e, "Failed to move corrupt index aside");
                    }
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        let albums = migrate(albums);
        info!(albums = albums.len(), root = %root.display(), "Opened download store");

        Ok(Self {
            fs,
            root,
            snapshot: RwLock::new(Snapshot::new(albums)),
            write_lock: Mutex::new(()),
        })
    }

    pub fn downloads_root(&self) -> &Path {
        &self.root
    }

    /// `Downloads/<albumId>/`
    ///
    /// Album ids come from the server and must name a single folder directly
    /// under the root.
    pub fn album_folder(&self, album_id: &str) -> Result<PathBuf> {
        if !is_plain_folder_name(album_id) {
            return Err(DownloadError::InvalidAlbumId(album_id.to_string()));
        }
        Ok(self.root.join(album_id))
    }

    /// `true` for `Downloads/<name>` where `<name>` is a plain folder name.
    fn owns_folder(&self, folder: &Path) -> bool {
        folder
            .strip_prefix(&self.root)
            .ok()
            .and_then(|rest| rest.to_str())
            .map(is_plain_folder_name)
            .unwrap_or(false)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn is_album_downloaded(&self, album_id: &str) -> bool {
        self.snapshot.read().find(album_id).is_some()
    }

    pub fn is_song_downloaded(&self, song_id: &str) -> bool {
        self.snapshot.read().song_ids.contains(song_id)
    }

    pub fn downloaded_albums(&self) -> Vec<DownloadedAlbum> {
        self.snapshot.read().albums.clone()
    }

    pub fn get_album(&self, album_id: &str) -> Option<DownloadedAlbum> {
        self.snapshot.read().find(album_id).cloned()
    }

    /// Songs of a downloaded album in track order; empty when not downloaded
    pub fn get_downloaded_songs(&self, album_id: &str) -> Vec<DownloadedSong> {
        self.snapshot
            .read()
            .find(album_id)
            .map(DownloadedAlbum::songs_in_track_order)
            .unwrap_or_default()
    }

    /// Song ids stored without per-song records
    pub fn legacy_song_ids(&self, album_id: &str) -> Vec<String> {
        self.snapshot
            .read()
            .find(album_id)
            .map(|album| album.song_ids.clone())
            .unwrap_or_default()
    }

    /// Where the audio for `song_id` lives on disk.
    ///
    /// Checks the owning album's folder first, then the legacy flat file.
    pub async fn get_local_file_path(&self, song_id: &str) -> Option<PathBuf> {
        let candidate = {
            let snapshot = self.snapshot.read();
            snapshot.albums.iter().find_map(|album| {
                album
                    .songs
                    .iter()
                    .find(|song| song.id == song_id)
                    .map(|song| album.folder_path.join(&song.file_name))
            })
        };

        if let Some(path) = candidate {
            if self.fs.exists(&path).await.unwrap_or(false) {
                return Some(path);
            }
            debug!(song_id, file = %strip_path(&path.to_string_lossy()), "Recorded file is missing");
        }

        let legacy = self.root.join(legacy_file_name(song_id));
        if self.fs.exists(&legacy).await.unwrap_or(false) {
            return Some(legacy);
        }
        None
    }

    pub fn total_download_bytes(&self) -> u64 {
        self.snapshot
            .read()
            .albums
            .iter()
            .map(DownloadedAlbum::total_bytes)
            .sum()
    }

    /// Human-readable total, e.g. `"2.9 MB"`
    pub fn total_download_size(&self) -> String {
        format_megabytes(self.total_download_bytes())
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Insert or replace the record for `album.id`, then save.
    #[instrument(skip(self, album), fields(album_id = %album.id, songs = album.songs.len()))]
    pub async fn upsert_album(&self, album: DownloadedAlbum) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut albums = self.snapshot.read().albums.clone();
        match albums.iter_mut().find(|existing| existing.id == album.id) {
            Some(existing) => *existing = album,
            None => albums.push(album),
        }

        self.commit(albums).await?;
        info!("Saved downloaded album");
        Ok(())
    }

    /// Remove the record and its folder. Returns whether a record existed.
    ///
    /// Folder removal is best effort.
    #[instrument(skip(self))]
    pub async fn delete_album(&self, album_id: &str) -> Result<bool> {
        let _guard = self.write_lock.lock().await;

        let mut albums = self.snapshot.read().albums.clone();
        let Some(pos) = albums.iter().position(|album| album.id == album_id) else {
            debug!("Album not downloaded, nothing to delete");
            return Ok(false);
        };
        let removed = albums.remove(pos);

        self.commit(albums).await?;

        let folder = if removed.folder_path.as_os_str().is_empty() {
            self.album_folder(album_id).ok()
        } else {
            Some(removed.folder_path)
        };
        match folder {
            Some(folder) if self.owns_folder(&folder) => {
                if let Err(e) = self.fs.delete_dir_all(&folder).await {
                    warn!(folder = %folder.display(), error = %e, "Failed to remove album folder");
                }
            }
            Some(folder) => {
                warn!(folder = %folder.display(), "Album folder is outside the downloads root, leaving it");
            }
            None => warn!("Album id is not a folder name, no folder to remove"),
        }

        info!("Deleted downloaded album");
        Ok(true)
    }

    /// Remove everything under the downloads root and start over. Idempotent.
    #[instrument(skip(self))]
    pub async fn delete_all_downloads(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        if self.fs.exists(&self.root).await.unwrap_or(false) {
            if let Err(e) = self.fs.delete_dir_all(&self.root).await {
                warn!(error = %e, "Failed to remove downloads root");
            }
        }
        self.fs.create_dir_all(&self.root).await?;

        self.commit(Vec::new()).await?;
        info!("Deleted all downloads");
        Ok(())
    }

    /// Save `albums`, then publish them. Caller holds `write_lock`.
    async fn commit(&self, albums: Vec<DownloadedAlbum>) -> Result<()> {
        let json = serde_json::to_vec_pretty(&albums)?;
        self.fs
            .write_file_atomic(&self.root.join(INDEX_FILE), Bytes::from(json))
            .await?;

        *self.snapshot.write() = Snapshot::new(albums);
        Ok(())
    }
}

fn is_plain_folder_name(name: &str) -> bool {
    if name.is_empty() || name.contains(['/', '\\', '\0']) {
        return false;
    }
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// Hook for future index format changes; records are currently read as-is.
fn migrate(albums: Vec<DownloadedAlbum>) -> Vec<DownloadedAlbum> {
    albums
}
