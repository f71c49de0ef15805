//! Core service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations (HTTP, filesystem,
//! network monitor) and a [`MusicService`] into the offline caching core.
//! Desktop apps typically enable the `desktop-shims` feature (which pulls in
//! the `bridge-desktop` defaults) and call [`bootstrap_desktop`].
//!
//! Every component is built once here and shared by `Arc`:
//!
//! ```text
//! CoreService
//!  ├─ OfflineModeCoordinator ── NetworkMonitor
//!  ├─ AlbumMetadataCache
//!  ├─ CoverArtCache ─────────── DiskImageStore
//!  ├─ DownloadStore
//!  ├─ DownloadOrchestrator
//!  └─ SongCacheCoordinator
//! ```

pub mod error;

pub use error::{CoreError, Result};

use std::sync::Arc;
use std::time::Duration;

use core_download::{DownloadOrchestrator, DownloadStore};
use core_library::{ContentAvailability, MusicService, OfflineModeCoordinator, Song};
use core_metadata::{AlbumMetadataCache, CoverArtCache, DiskImageStore, PersistentImageStore};
use core_runtime::config::CoreConfig;
use core_runtime::events::{EventBus, EventStream};
use core_sync::SongCacheCoordinator;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

#[cfg(feature = "desktop-shims")]
use provider_subsonic::{SubsonicConnector, SubsonicCredentials};

/// Primary façade exposed to host applications.
pub struct CoreService {
    config: CoreConfig,
    event_bus: EventBus,
    offline: Arc<OfflineModeCoordinator>,
    metadata: Arc<AlbumMetadataCache>,
    cover_art: Arc<CoverArtCache>,
    store: Arc<DownloadStore>,
    downloads: Arc<DownloadOrchestrator>,
    songs: Arc<SongCacheCoordinator>,
    shutdown: CancellationToken,
}

impl CoreService {
    /// Build every component from `config` around `music_service`.
    #[instrument(skip_all)]
    pub async fn new(config: CoreConfig, music_service: Arc<dyn MusicService>) -> Result<Self> {
        config.validate()?;

        let event_bus = EventBus::default();
        let fs = config.file_system.clone();

        let monitor = if config.features.enable_network_awareness {
            config.network_monitor.clone()
        } else {
            None
        };
        let offline = Arc::new(
            OfflineModeCoordinator::new(monitor).with_event_bus(event_bus.clone()),
        );
        let availability: Arc<dyn ContentAvailability> = offline.clone();

        let metadata = Arc::new(AlbumMetadataCache::new());

        let mut cover_art = CoverArtCache::new(music_service.clone(), config.artwork.clone());
        if config.features.enable_artwork_disk_cache {
            match DiskImageStore::open(
                fs.clone(),
                config.artwork_dir(),
                config.artwork.disk_cache_bytes(),
            )
            .await
            {
                Ok(disk) => {
                    let disk: Arc<dyn PersistentImageStore> = Arc::new(disk);
                    cover_art = cover_art.with_persistent_store(disk);
                }
                Err(e) => warn!(error = %e, "Artwork disk cache unavailable, using memory only"),
            }
        }
        let cover_art = Arc::new(cover_art);
        cover_art.configure_availability(availability.clone());

        let store = Arc::new(DownloadStore::open(fs.clone(), config.downloads_root.clone()).await?);

        let downloads = Arc::new(
            DownloadOrchestrator::new(
                store.clone(),
                metadata.clone(),
                cover_art.clone(),
                music_service.clone(),
                config.http_client.clone(),
                fs,
                config.downloads.clone(),
            )
            .with_event_bus(event_bus.clone()),
        );

        let songs = Arc::new(SongCacheCoordinator::new(
            store.clone(),
            metadata.clone(),
            music_service,
            availability,
        ));

        info!(
            downloads_root = %config.downloads_root.display(),
            downloaded_albums = store.downloaded_albums().len(),
            "Core service ready"
        );

        Ok(Self {
            config,
            event_bus,
            offline,
            metadata,
            cover_art,
            store,
            downloads,
            songs,
            shutdown: CancellationToken::new(),
        })
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn subscribe_events(&self) -> EventStream {
        EventStream::new(self.event_bus.subscribe())
    }

    pub fn offline_mode(&self) -> &Arc<OfflineModeCoordinator> {
        &self.offline
    }

    pub fn metadata_cache(&self) -> &Arc<AlbumMetadataCache> {
        &self.metadata
    }

    pub fn cover_art_cache(&self) -> &Arc<CoverArtCache> {
        &self.cover_art
    }

    pub fn download_store(&self) -> &Arc<DownloadStore> {
        &self.store
    }

    pub fn downloads(&self) -> &Arc<DownloadOrchestrator> {
        &self.downloads
    }

    pub fn song_cache(&self) -> &Arc<SongCacheCoordinator> {
        &self.songs
    }

    /// Songs for an album from whichever tier can answer
    pub async fn load_songs(&self, album_id: &str) -> Arc<Vec<Song>> {
        self.songs.load_songs(album_id).await
    }

    /// Resolve the album's songs, then download them.
    ///
    /// Resolving through the song cache also fills the metadata cache when
    /// the songs come from the server.
    #[instrument(skip(self))]
    pub async fn download_album(&self, album_id: &str) -> Result<()> {
        let songs = self.songs.load_songs(album_id).await;
        self.downloads.start_download(album_id, &songs).await?;
        self.songs.invalidate(album_id);
        Ok(())
    }

    /// Poll the network monitor every `interval` until [`shutdown`](Self::shutdown).
    ///
    /// Returns `None` when network awareness is disabled.
    pub fn start_network_monitoring(&self, interval: Duration) -> Option<JoinHandle<()>> {
        if !self.config.features.enable_network_awareness {
            return None;
        }
        Some(
            self.offline
                .clone()
                .spawn_monitor(interval, self.shutdown.child_token()),
        )
    }

    /// Stop background tasks started by this service.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        info!("Core service shut down");
    }
}

/// Convenience bootstrapper for desktop hosts talking to a Subsonic server.
///
/// ```ignore
/// use core_runtime::config::CoreConfig;
/// use provider_subsonic::SubsonicCredentials;
///
/// let config = CoreConfig::builder()
///     .downloads_root("/home/me/Music/Downloads")
///     .cache_dir("/home/me/.cache/subsonic-offline")
///     .build()?;
/// let creds = SubsonicCredentials::new("https://music.example.com", "me", "secret")?;
/// let core = core_service::bootstrap_desktop(config, creds).await?;
/// ```
#[cfg(feature = "desktop-shims")]
pub async fn bootstrap_desktop(
    config: CoreConfig,
    credentials: SubsonicCredentials,
) -> Result<CoreService> {
    let connector = SubsonicConnector::new(config.http_client.clone(), credentials);
    let service: Arc<dyn MusicService> = Arc::new(connector);
    CoreService::new(config, service).await
}
