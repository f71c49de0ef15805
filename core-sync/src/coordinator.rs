//! # Song Cache Coordinator
//!
//! Resolves the song list of an album through a fixed sequence of tiers.
//!
//! ## Workflow
//!
//! 1. Non-empty list already in memory: return it
//! 2. Resolution already running for the album: join it and get the same `Arc`
//! 3. Album is in the download store: read its songs (works offline)
//! 4. Online: `MusicService::get_album`, caching the album metadata on the way
//! 5. Otherwise: placeholder songs built from legacy song ids and cached
//!    metadata, returned but never cached so a later call retries
//!
//! Nothing here returns an error; failures degrade to the next tier and, at
//! worst, to an empty list.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_sync::SongCacheCoordinator;
//!
//! let coordinator = SongCacheCoordinator::new(store, metadata, service, offline);
//! let songs = coordinator.load_songs("al-1").await;
//! ```

use core_download::DownloadStore;
use core_library::{
    AlbumMetadata, ContentAvailability, MusicService, Song, UNKNOWN_ARTIST,
};
use core_metadata::AlbumMetadataCache;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

type SongLoad = Shared<BoxFuture<'static, Arc<Vec<Song>>>>;

struct InFlight {
    id: u64,
    future: SongLoad,
    token: CancellationToken,
}

#[derive(Default)]
struct CacheState {
    resolved: HashMap<String, Arc<Vec<Song>>>,
    in_flight: HashMap<String, InFlight>,
    next_id: u64,
}

struct Sources {
    store: Arc<DownloadStore>,
    metadata: Arc<AlbumMetadataCache>,
    service: Arc<dyn MusicService>,
    availability: Arc<dyn ContentAvailability>,
}

/// Where a resolved list came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tier {
    Downloads,
    Network,
    Placeholder,
    Cancelled,
}

impl Tier {
    fn cacheable(self) -> bool {
        matches!(self, Tier::Downloads | Tier::Network)
    }
}

pub struct SongCacheCoordinator {
    sources: Arc<Sources>,
    state: Arc<Mutex<CacheState>>,
}

impl SongCacheCoordinator {
    pub fn new(
        store: Arc<DownloadStore>,
        metadata: Arc<AlbumMetadataCache>,
        service: Arc<dyn MusicService>,
        availability: Arc<dyn ContentAvailability>,
    ) -> Self {
        Self {
            sources: Arc::new(Sources {
                store,
                metadata,
                service,
                availability,
            }),
            state: Arc::new(Mutex::new(CacheState::default())),
        }
    }

    /// Songs of `album_id`. Concurrent callers share one resolution.
    #[instrument(skip(self))]
    pub async fn load_songs(&self, album_id: &str) -> Arc<Vec<Song>> {
        let future = {
            let mut state = self.state.lock();

            if let Some(songs) = state.resolved.get(album_id) {
                if !songs.is_empty() {
                    return songs.clone();
                }
            }

            match state.in_flight.get(album_id) {
                Some(entry) => {
                    debug!("Joining in-flight resolution");
                    entry.future.clone()
                }
                None => {
                    state.next_id += 1;
                    let id = state.next_id;
                    let token = CancellationToken::new();
                    let future = resolve_and_settle(
                        self.sources.clone(),
                        self.state.clone(),
                        album_id.to_string(),
                        id,
                        token.clone(),
                    )
                    .boxed()
                    .shared();

                    state.in_flight.insert(
                        album_id.to_string(),
                        InFlight {
                            id,
                            future: future.clone(),
                            token,
                        },
                    );
                    future
                }
            }
        };

        future.await
    }

    pub fn is_loading(&self, album_id: &str) -> bool {
        self.state.lock().in_flight.contains_key(album_id)
    }

    /// Peek at the memory tier
    pub fn cached_songs(&self, album_id: &str) -> Option<Arc<Vec<Song>>> {
        self.state.lock().resolved.get(album_id).cloned()
    }

    /// Forget the cached list so the next call resolves again
    pub fn invalidate(&self, album_id: &str) {
        self.state.lock().resolved.remove(album_id);
    }

    /// Stop an in-flight resolution. Waiters get an empty list.
    pub fn cancel(&self, album_id: &str) {
        if let Some(entry) = self.state.lock().in_flight.remove(album_id) {
            entry.token.cancel();
            info!(album_id, "Cancelled song resolution");
        }
    }

    /// Drop every cached list and cancel every resolution
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.resolved.clear();
        for (_, entry) in state.in_flight.drain() {
            entry.token.cancel();
        }
    }
}

async fn resolve_and_settle(
    sources: Arc<Sources>,
    state: Arc<Mutex<CacheState>>,
    album_id: String,
    id: u64,
    token: CancellationToken,
) -> Arc<Vec<Song>> {
    let (songs, tier) = resolve(&sources, &album_id, &token).await;
    let songs = Arc::new(songs);

    let mut state = state.lock();
    let current = state
        .in_flight
        .get(&album_id)
        .map(|entry| entry.id == id)
        .unwrap_or(false);
    if current {
        state.in_flight.remove(&album_id);
        if tier.cacheable() && !songs.is_empty() && !token.is_cancelled() {
            state.resolved.insert(album_id.clone(), songs.clone());
        }
    }
    debug!(album_id, ?tier, songs = songs.len(), "Song resolution settled");
    songs
}

async fn resolve(sources: &Sources, album_id: &str, token: &CancellationToken) -> (Vec<Song>, Tier) {
    if token.is_cancelled() {
        return (Vec::new(), Tier::Cancelled);
    }

    if sources.store.is_album_downloaded(album_id) {
        let songs: Vec<Song> = sources
            .store
            .get_downloaded_songs(album_id)
            .iter()
            .map(|song| song.to_song())
            .collect();
        if !songs.is_empty() {
            debug!(album_id, "Serving songs from downloads");
            return (songs, Tier::Downloads);
        }
    }

    if token.is_cancelled() {
        return (Vec::new(), Tier::Cancelled);
    }

    if sources.availability.can_load_online_content() {
        match sources.service.get_album(album_id).await {
            Ok(details) => {
                if token.is_cancelled() {
                    return (Vec::new(), Tier::Cancelled);
                }
                sources.metadata.cache_album(details.album.metadata());
                if !details.songs.is_empty() {
                    return (details.songs, Tier::Network);
                }
            }
            Err(e) => {
                warn!(album_id, error = %e, "Album fetch failed");
                if e.is_timeout() {
                    sources.availability.report_timeout();
                }
            }
        }
    } else {
        debug!(album_id, "Offline, skipping network");
    }

    if token.is_cancelled() {
        return (Vec::new(), Tier::Cancelled);
    }
    (placeholder_songs(sources, album_id), Tier::Placeholder)
}

/// One entry per legacy song id the store knows for the album.
///
/// Titles come from the id when it reads like a file name, `Track N` otherwise.
fn placeholder_songs(sources: &Sources, album_id: &str) -> Vec<Song> {
    let ids = sources.store.legacy_song_ids(album_id);
    if ids.is_empty() {
        return Vec::new();
    }

    let metadata: Option<AlbumMetadata> = sources
        .metadata
        .get_album(album_id)
        .or_else(|| sources.store.get_album(album_id).map(|album| album.metadata()));

    let artist = metadata
        .as_ref()
        .map(|m| m.artist.clone())
        .unwrap_or_else(|| UNKNOWN_ARTIST.to_string());

    ids.into_iter()
        .enumerate()
        .map(|(index, id)| {
            let position = index as u32 + 1;
            let (track, title) = match title_from_id(&id) {
                Some((track, title)) => (track.unwrap_or(position), title),
                None => (position, format!("Track {}", position)),
            };
            Song {
                id,
                title,
                artist: Some(artist.clone()),
                artist_id: metadata.as_ref().and_then(|m| m.artist_id.clone()),
                album: metadata.as_ref().map(|m| m.name.clone()),
                album_id: Some(album_id.to_string()),
                track: Some(track),
                year: metadata.as_ref().and_then(|m| m.year),
                genre: metadata.as_ref().and_then(|m| m.genre.clone()),
                cover_art: Some(
                    metadata
                        .as_ref()
                        .map(|m| m.cover_art_id().to_string())
                        .unwrap_or_else(|| album_id.to_string()),
                ),
                ..Default::default()
            }
        })
        .collect()
}

const AUDIO_EXTENSIONS: &[&str] = &["mp3", "flac", "m4a", "ogg", "opus"];

/// Track number and title readable from ids like `"03 - So_What.mp3"`.
///
/// Opaque ids (hashes, `tr-12`, `x1`) give `None`.
fn title_from_id(id: &str) -> Option<(Option<u32>, String)> {
    let (stem, had_extension) = match id.rsplit_once('.') {
        Some((stem, ext)) if AUDIO_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()) => {
            (stem, true)
        }
        _ => (id, false),
    };
    let stem = stem.replace('_', " ");
    let stem = stem.trim();

    let (track, title) = match stem.split_once(" - ") {
        Some((number, rest))
            if !number.trim().is_empty() && number.trim().chars().all(|c| c.is_ascii_digit()) =>
        {
            (number.trim().parse::<u32>().ok(), rest.trim())
        }
        _ => (None, stem),
    };

    let readable = title.chars().any(char::is_alphabetic)
        && (had_extension || track.is_some() || title.split_whitespace().count() > 1);
    readable.then(|| (track, title.to_string()))
}
