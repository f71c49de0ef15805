//! # Download Orchestrator
//!
//! Drives one album at a time per id through:
//!
//! 1. precondition checks (cached metadata, not already downloading)
//! 2. album folder creation
//! 3. cover art priming in a detached task
//! 4. sequential song transfers
//! 5. the download store update
//!
//! A missing stream URL or a non-success status skips that song. A transport
//! failure aborts the album. Songs written before an abort stay on disk but
//! no record is saved for them.

use bridge_traits::http::{HttpClient, HttpRequest};
use bridge_traits::storage::FileSystemAccess;
use bridge_traits::time::{Clock, SystemClock};
use core_library::{AlbumMetadata, DownloadedAlbum, DownloadedSong, MusicService, Song};
use core_metadata::{AlbumMetadataCache, CoverArtCache};
use core_runtime::config::DownloadSettings;
use core_runtime::events::{CoreEvent, DownloadEvent, EventBus};
use core_runtime::logging::redact_url;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::error::{DownloadError, Result};
use crate::naming::song_file_name;
use crate::state::{AlbumProgress, DownloadState};
use crate::store::DownloadStore;

#[derive(Default)]
struct Bookkeeping {
    states: HashMap<String, DownloadState>,
    progress: HashMap<String, AlbumProgress>,
    tokens: HashMap<String, (u64, CancellationToken)>,
    generation: u64,
}

pub struct DownloadOrchestrator {
    store: Arc<DownloadStore>,
    metadata: Arc<AlbumMetadataCache>,
    cover_art: Arc<CoverArtCache>,
    service: Arc<dyn MusicService>,
    http_client: Arc<dyn HttpClient>,
    fs: Arc<dyn FileSystemAccess>,
    settings: DownloadSettings,
    clock: Arc<dyn Clock>,
    event_bus: Option<EventBus>,
    book: Arc<RwLock<Bookkeeping>>,
}

impl DownloadOrchestrator {
    pub fn new(
        store: Arc<DownloadStore>,
        metadata: Arc<AlbumMetadataCache>,
        cover_art: Arc<CoverArtCache>,
        service: Arc<dyn MusicService>,
        http_client: Arc<dyn HttpClient>,
        fs: Arc<dyn FileSystemAccess>,
        settings: DownloadSettings,
    ) -> Self {
        Self {
            store,
            metadata,
            cover_art,
            service,
            http_client,
            fs,
            settings,
            clock: Arc::new(SystemClock),
            event_bus: None,
            book: Arc::new(RwLock::new(Bookkeeping::default())),
        }
    }

    /// Set event bus for progress events.
    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &Arc<DownloadStore> {
        &self.store
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Current state; albums with no live state report `Downloaded` when the
    /// store has them.
    pub fn state(&self, album_id: &str) -> DownloadState {
        if let Some(state) = self.book.read().states.get(album_id) {
            if *state != DownloadState::Idle {
                return state.clone();
            }
        }
        if self.store.is_album_downloaded(album_id) {
            DownloadState::Downloaded
        } else {
            DownloadState::Idle
        }
    }

    pub fn progress(&self, album_id: &str) -> Option<AlbumProgress> {
        self.book.read().progress.get(album_id).cloned()
    }

    pub fn active_downloads(&self) -> Vec<AlbumProgress> {
        self.book.read().progress.values().cloned().collect()
    }

    pub fn is_downloading(&self, album_id: &str) -> bool {
        matches!(
            self.book.read().states.get(album_id),
            Some(DownloadState::Downloading)
        )
    }

    // ========================================================================
    // Download
    // ========================================================================

    /// Download `songs` into `Downloads/<album_id>/`.
    ///
    /// The outcome is also reflected in [`state`](Self::state).
    #[instrument(skip(self, songs), fields(songs = songs.len()))]
    pub async fn start_download(&self, album_id: &str, songs: &[Song]) -> Result<()> {
        let folder = self.store.album_folder(album_id).map_err(|e| {
            warn!("Refusing album id that is not a folder name");
            e
        })?;
        let metadata = self
            .metadata
            .get_album(album_id)
            .ok_or_else(|| DownloadError::MissingMetadata(album_id.to_string()))?;

        let total_songs = songs.len() as u32;
        let now = self.clock.now();
        let token = CancellationToken::new();
        let generation = {
            let mut book = self.book.write();
            if book
                .states
                .get(album_id)
                .map(DownloadState::is_active)
                .unwrap_or(false)
            {
                warn!("Download already in progress");
                return Err(DownloadError::AlreadyInProgress(album_id.to_string()));
            }
            book.generation += 1;
            let generation = book.generation;
            book.states
                .insert(album_id.to_string(), DownloadState::Downloading);
            book.progress
                .insert(album_id.to_string(), AlbumProgress::new(album_id, total_songs, now));
            book.tokens
                .insert(album_id.to_string(), (generation, token.clone()));
            generation
        };

        info!(total_songs, "Starting album download");
        self.emit(DownloadEvent::Started {
            album_id: album_id.to_string(),
            total_songs,
        });

        let result = self.run(album_id, &metadata, songs, folder, &token).await;

        // A saved album counts as downloaded even if a cancel raced the save.
        let cancelled = result.is_err() && token.is_cancelled();
        {
            let mut book = self.book.write();
            let ours = book
                .tokens
                .get(album_id)
                .map(|(g, _)| *g == generation)
                .unwrap_or(false);
            if ours {
                book.tokens.remove(album_id);
                book.progress.remove(album_id);
            }
            if !cancelled {
                let next = match &result {
                    Ok(_) => DownloadState::Downloaded,
                    Err(e) => DownloadState::Error(e.to_string()),
                };
                book.states.insert(album_id.to_string(), next);
            }
        }

        match result {
            Ok(album) => {
                info!(songs = album.songs.len(), "Album download completed");
                self.emit(DownloadEvent::Completed {
                    album_id: album_id.to_string(),
                    songs_downloaded: album.songs.len() as u32,
                    total_bytes: album.total_bytes(),
                });
                Ok(())
            }
            Err(_) if cancelled => {
                info!("Album download stopped after cancel");
                Err(DownloadError::Cancelled(album_id.to_string()))
            }
            Err(e) => {
                error!(error = %e, "Album download failed");
                self.emit(DownloadEvent::Failed {
                    album_id: album_id.to_string(),
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        album_id: &str,
        metadata: &AlbumMetadata,
        songs: &[Song],
        folder: PathBuf,
        token: &CancellationToken,
    ) -> Result<DownloadedAlbum> {
        self.fs
            .create_dir_all(&folder)
            .await
            .map_err(|source| DownloadError::FolderCreationFailed {
                path: folder.clone(),
                source,
            })?;

        self.spawn_cover_art_priming(metadata);

        let mut records = Vec::with_capacity(songs.len());
        for (index, song) in songs.iter().enumerate() {
            if token.is_cancelled() {
                return Err(DownloadError::Cancelled(album_id.to_string()));
            }

            let song = fill_album_fields(song, metadata);
            let written = self.download_song(album_id, &song, index + 1, &folder).await?;

            let bytes = written.as_ref().map(|r| r.file_size).unwrap_or(0);
            if let Some(record) = written {
                records.push(record);
            }
            self.advance(album_id, bytes);
        }

        if records.is_empty() {
            return Err(DownloadError::NoSongsDownloaded(album_id.to_string()));
        }
        if token.is_cancelled() {
            return Err(DownloadError::Cancelled(album_id.to_string()));
        }

        let album = DownloadedAlbum::new(metadata, records, folder, self.clock.now());
        self.store.upsert_album(album.clone()).await?;
        Ok(album)
    }

    /// `Ok(None)` means the song was skipped.
    async fn download_song(
        &self,
        album_id: &str,
        song: &Song,
        position: usize,
        folder: &Path,
    ) -> Result<Option<DownloadedSong>> {
        let url = match self.service.stream_url(&song.id).await {
            Ok(Some(url)) => url,
            Ok(None) => {
                self.skip(album_id, song, "no stream URL".to_string());
                return Ok(None);
            }
            Err(e) => {
                self.skip(album_id, song, format!("stream URL lookup failed: {}", e));
                return Ok(None);
            }
        };

        debug!(song_id = %song.id, url = %redact_url(&url), "Fetching song");
        let mut request = HttpRequest::get(url);
        if let Some(timeout) = self.settings.transfer_timeout {
            request = request.timeout(timeout);
        }

        let title = song.display_title().to_string();
        let response = self.http_client.execute(request).await.map_err(|source| {
            DownloadError::SongDownloadFailed {
                title: title.clone(),
                source,
            }
        })?;

        if !response.is_success() {
            self.skip(album_id, song, format!("HTTP {}", response.status));
            return Ok(None);
        }

        let file_name = song_file_name(song, position);
        let path: PathBuf = folder.join(&file_name);
        let file_size = response.body.len() as u64;
        self.fs
            .write_file_atomic(&path, response.body)
            .await
            .map_err(|source| DownloadError::SongDownloadFailed { title, source })?;

        debug!(song_id = %song.id, file_name = %file_name, file_size, "Song written");
        Ok(Some(DownloadedSong::from_song(
            song,
            file_name,
            file_size,
            self.clock.now(),
        )))
    }

    fn spawn_cover_art_priming(&self, metadata: &AlbumMetadata) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            debug!("No runtime for cover art priming");
            return;
        };

        let cache = self.cover_art.clone();
        let sizes = cache.settings().prime_sizes.clone();
        let stagger = cache.settings().prime_stagger;
        let album_art = metadata.cover_art_id().to_string();
        let artist_art = metadata.artist_id.clone();

        handle.spawn(async move {
            cache.prime(&album_art, &sizes, stagger).await;
            if let Some(artist_id) = artist_art {
                cache.prime(&artist_id, &sizes, stagger).await;
            }
        });
    }

    fn skip(&self, album_id: &str, song: &Song, reason: String) {
        warn!(song_id = %song.id, reason = %reason, "Skipping song");
        self.emit(DownloadEvent::SongSkipped {
            album_id: album_id.to_string(),
            song_id: song.id.clone(),
            reason,
        });
    }

    fn advance(&self, album_id: &str, bytes: u64) {
        let now = self.clock.now();
        let snapshot = {
            let mut book = self.book.write();
            book.progress.get_mut(album_id).map(|progress| {
                progress.advance(bytes, now);
                (progress.songs_completed, progress.total_songs)
            })
        };

        if let Some((songs_completed, total_songs)) = snapshot {
            self.emit(DownloadEvent::Progress {
                album_id: album_id.to_string(),
                songs_completed,
                total_songs,
            });
        }
    }

    // ========================================================================
    // Cancel / delete
    // ========================================================================

    /// Best-effort cancel. The running transfer finishes; the loop stops at
    /// the next song. The album returns to `Idle` after the reset delay.
    #[instrument(skip(self))]
    pub fn cancel(&self, album_id: &str) {
        let token = {
            let mut book = self.book.write();
            let Some((_, token)) = book.tokens.remove(album_id) else {
                debug!("Nothing to cancel");
                return;
            };
            book.progress.remove(album_id);
            book.states
                .insert(album_id.to_string(), DownloadState::Cancelling);
            token
        };
        token.cancel();
        info!("Album download cancelled");

        self.emit(DownloadEvent::Cancelled {
            album_id: album_id.to_string(),
        });

        let book = self.book.clone();
        let album_id = album_id.to_string();
        let delay = self.settings.cancel_reset_delay;
        let reset = move || {
            let mut book = book.write();
            if book.states.get(&album_id) == Some(&DownloadState::Cancelling) {
                book.states.insert(album_id, DownloadState::Idle);
            }
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    tokio::time::sleep(delay).await;
                    reset();
                });
            }
            Err(_) => reset(),
        }
    }

    /// Remove a downloaded album and reset its state.
    #[instrument(skip(self))]
    pub async fn delete_album(&self, album_id: &str) -> Result<bool> {
        if self.is_downloading(album_id) {
            return Err(DownloadError::AlreadyInProgress(album_id.to_string()));
        }

        let removed = self.store.delete_album(album_id).await?;
        self.book
            .write()
            .states
            .insert(album_id.to_string(), DownloadState::Idle);

        if removed {
            self.emit(DownloadEvent::Deleted {
                album_id: album_id.to_string(),
            });
        }
        Ok(removed)
    }

    /// Remove every download. Running downloads are cancelled first.
    #[instrument(skip(self))]
    pub async fn delete_all_downloads(&self) -> Result<()> {
        let running: Vec<String> = self.book.read().tokens.keys().cloned().collect();
        for album_id in running {
            self.cancel(&album_id);
        }

        self.store.delete_all_downloads().await?;
        self.book.write().states.retain(|_, state| state.is_active());
        self.emit(DownloadEvent::AllDeleted);
        Ok(())
    }

    fn emit(&self, event: DownloadEvent) {
        if let Some(bus) = &self.event_bus {
            let _ = bus.emit(CoreEvent::Download(event));
        }
    }
}

/// Fill album fields the server omitted so the stored record is self-contained.
fn fill_album_fields(song: &Song, metadata: &AlbumMetadata) -> Song {
    let mut song = song.clone();
    song.album_id.get_or_insert_with(|| metadata.id.clone());
    song.album.get_or_insert_with(|| metadata.name.clone());
    song.artist.get_or_insert_with(|| metadata.artist.clone());
    if song.year.is_none() {
        song.year = metadata.year;
    }
    if song.genre.is_none() {
        song.genre = metadata.genre.clone();
    }
    song
}
