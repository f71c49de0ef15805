//! Song cache tier behaviour against a real download store in a temp dir.

use async_trait::async_trait;
use bridge_desktop::TokioFileSystem;
use bytes::Bytes;
use chrono::Utc;
use core_download::DownloadStore;
use core_library::{
    Album, AlbumDetails, AlbumMetadata, ContentAvailability, DownloadedAlbum, DownloadedSong,
    MusicService, Result as ServiceResult, ServiceError, Song,
};
use core_metadata::AlbumMetadataCache;
use core_sync::SongCacheCoordinator;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::Semaphore;

struct FakeService {
    calls: AtomicUsize,
    gate: Option<Arc<Semaphore>>,
    fail_with: Mutex<Option<ServiceError>>,
}

impl FakeService {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            gate: None,
            fail_with: Mutex::new(None),
        }
    }

    fn gated(gate: Arc<Semaphore>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::new()
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MusicService for FakeService {
    async fn get_album(&self, album_id: &str) -> ServiceResult<AlbumDetails> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            let _permit = gate
                .acquire()
                .await
                .map_err(|e| ServiceError::Generic(e.to_string()))?;
        }
        if let Some(err) = self.fail_with.lock().clone() {
            return Err(err);
        }

        Ok(AlbumDetails {
            album: Album {
                id: album_id.to_string(),
                name: "Remote Album".to_string(),
                artist: Some("Remote Artist".to_string()),
                ..Default::default()
            },
            songs: vec![
                Song {
                    id: "r1".into(),
                    title: "Remote One".into(),
                    track: Some(1),
                    ..Default::default()
                },
                Song {
                    id: "r2".into(),
                    title: "Remote Two".into(),
                    track: Some(2),
                    ..Default::default()
                },
            ],
        })
    }

    async fn stream_url(&self, _song_id: &str) -> ServiceResult<Option<String>> {
        Ok(None)
    }

    async fn cover_art(&self, _cover_art_id: &str, _size: u32) -> ServiceResult<Bytes> {
        Err(ServiceError::Generic("no art".into()))
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
        self.online.store(false, Ordering::SeqCst);
    }
}

struct Fixture {
    _dir: TempDir,
    store: Arc<DownloadStore>,
    metadata: Arc<AlbumMetadataCache>,
    service: Arc<FakeService>,
    availability: Arc<Availability>,
    coordinator: SongCacheCoordinator,
}

async fn fixture(service: FakeService, online: bool) -> Fixture {
    let dir = TempDir::new().unwrap();
    let fs = Arc::new(TokioFileSystem::with_directories(
        dir.path().to_path_buf(),
        dir.path().to_path_buf(),
    ));
    let store = Arc::new(
        DownloadStore::open(fs, dir.path().join("Downloads"))
            .await
            .unwrap(),
    );
    let metadata = Arc::new(AlbumMetadataCache::new());
    let service = Arc::new(service);
    let availability = Availability::new(online);

    let coordinator = SongCacheCoordinator::new(
        store.clone(),
        metadata.clone(),
        service.clone(),
        availability.clone(),
    );

    Fixture {
        _dir: dir,
        store,
        metadata,
        service,
        availability,
        coordinator,
    }
}

async fn store_album(store: &DownloadStore, album_id: &str) {
    let songs = [(2u32, 2000u64), (1, 1000)]
        .iter()
        .map(|(track, size)| {
            let song = Song {
                id: format!("S{}", track),
                title: format!("Local {}", track),
                album_id: Some(album_id.to_string()),
                track: Some(*track),
                duration: Some(200),
                year: Some(1999),
                genre: Some("Jazz".into()),
                content_type: Some("audio/mpeg".into()),
                ..Default::default()
            };
            DownloadedSong::from_song(&song, format!("{:02} - Local.mp3", track), *size, Utc::now())
        })
        .collect();

    store
        .upsert_album(DownloadedAlbum::new(
            &AlbumMetadata::new(album_id, "Local Album", "Local Artist"),
            songs,
            store.album_folder(album_id).unwrap(),
            Utc::now(),
        ))
        .await
        .unwrap();
}

#[tokio::test]
async fn offline_downloaded_album_never_touches_network() {
    let f = fixture(FakeService::new(), false).await;
    store_album(&f.store, "A1").await;

    let songs = f.coordinator.load_songs("A1").await;

    assert_eq!(songs.len(), 2);
    assert_eq!(songs[0].id, "S1");
    assert_eq!(songs[0].title, "Local 1");
    assert_eq!(songs[0].duration, Some(200));
    assert_eq!(songs[0].genre.as_deref(), Some("Jazz"));
    assert_eq!(songs[0].cover_art.as_deref(), Some("A1"));
    assert_eq!(f.service.calls(), 0);
    assert!(f.coordinator.cached_songs("A1").is_some());
}

#[tokio::test]
async fn downloaded_album_wins_even_when_online() {
    let f = fixture(FakeService::new(), true).await;
    store_album(&f.store, "A1").await;

    let songs = f.coordinator.load_songs("A1").await;
    assert_eq!(songs[0].title, "Local 1");
    assert_eq!(f.service.calls(), 0);
}

#[tokio::test]
async fn offline_unknown_album_is_empty_and_not_loading() {
    let f = fixture(FakeService::new(), false).await;

    let songs = f.coordinator.load_songs("A2").await;

    assert!(songs.is_empty());
    assert!(!f.coordinator.is_loading("A2"));
    assert!(f.coordinator.cached_songs("A2").is_none());
    assert_eq!(f.service.calls(), 0);
}

#[tokio::test]
async fn concurrent_callers_share_one_resolution() {
    let gate = Arc::new(Semaphore::new(0));
    let f = fixture(FakeService::gated(gate.clone()), true).await;

    let first = f.coordinator.load_songs("A3");
    let second = f.coordinator.load_songs("A3");
    let release = async {
        while !f.coordinator.is_loading("A3") || f.service.calls() == 0 {
            tokio::task::yield_now().await;
        }
        gate.add_permits(1);
    };

    let (a, b, _) = tokio::join!(first, second, release);

    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(a.len(), 2);
    assert_eq!(f.service.calls(), 1);
    assert!(!f.coordinator.is_loading("A3"));

    let again = f.coordinator.load_songs("A3").await;
    assert!(Arc::ptr_eq(&a, &again));
    assert_eq!(f.service.calls(), 1);
}

#[tokio::test]
async fn network_result_caches_album_metadata() {
    let f = fixture(FakeService::new(), true).await;

    let songs = f.coordinator.load_songs("A4").await;

    assert_eq!(songs.len(), 2);
    let metadata = f.metadata.get_album("A4").unwrap();
    assert_eq!(metadata.name, "Remote Album");
    assert_eq!(metadata.artist, "Remote Artist");
}

#[tokio::test]
async fn timeout_is_reported_and_falls_back() {
    let f = fixture(FakeService::new(), true).await;
    *f.service.fail_with.lock() = Some(ServiceError::Timeout("read timed out".into()));

    let songs = f.coordinator.load_songs("A5").await;

    assert!(songs.is_empty());
    assert_eq!(f.availability.timeouts.load(Ordering::SeqCst), 1);
    assert!(!f.availability.can_load_online_content());
}

#[tokio::test]
async fn placeholders_from_legacy_ids_are_not_cached() {
    let f = fixture(FakeService::new(), false).await;
    let record: DownloadedAlbum = serde_json::from_str(
        r#"{"id":"A6","name":"Old Album","artist":"Old Artist","folderPath":"",
            "downloadedAt":"2022-05-01T00:00:00Z","songIds":["x1","x2"]}"#,
    )
    .unwrap();
    f.store.upsert_album(record).await.unwrap();
    f.metadata
        .cache_album(AlbumMetadata::new("A6", "Old Album", "Cached Artist").with_cover_art("al-A6"));

    let songs = f.coordinator.load_songs("A6").await;

    assert_eq!(songs.len(), 2);
    assert_eq!(songs[0].title, "Track 1");
    assert_eq!(songs[1].title, "Track 2");
    assert_eq!(songs[1].id, "x2");
    assert_eq!(songs[0].artist.as_deref(), Some("Cached Artist"));
    assert_eq!(songs[0].album.as_deref(), Some("Old Album"));
    assert_eq!(songs[0].cover_art.as_deref(), Some("al-A6"));
    assert!(f.coordinator.cached_songs("A6").is_none());

    // Back online, the real tier replaces the placeholders
    f.availability.online.store(true, Ordering::SeqCst);
    let songs = f.coordinator.load_songs("A6").await;
    assert_eq!(songs[0].title, "Remote One");
    assert!(f.coordinator.cached_songs("A6").is_some());
}

#[tokio::test]
async fn placeholder_titles_come_from_readable_ids() {
    let f = fixture(FakeService::new(), false).await;
    let record: DownloadedAlbum = serde_json::from_str(
        r#"{"id":"A8","name":"Kind of Blue","artist":"Miles Davis",
            "downloadedAt":"2021-03-01T00:00:00Z",
            "songIds":["a9f3c2d1e0","03 - Blue_in_Green.mp3"]}"#,
    )
    .unwrap();
    f.store.upsert_album(record).await.unwrap();

    let songs = f.coordinator.load_songs("A8").await;

    assert_eq!(songs.len(), 2);
    assert_eq!(songs[0].title, "Track 1");
    assert_eq!(songs[0].track, Some(1));
    assert_eq!(songs[1].title, "Blue in Green");
    assert_eq!(songs[1].track, Some(3));
    assert_eq!(songs[1].id, "03 - Blue_in_Green.mp3");
    assert_eq!(songs[1].artist.as_deref(), Some("Miles Davis"));
    assert_eq!(songs[1].album.as_deref(), Some("Kind of Blue"));
}

#[tokio::test]
async fn cancel_returns_empty_and_caches_nothing() {
    let gate = Arc::new(Semaphore::new(0));
    let f = fixture(FakeService::gated(gate.clone()), true).await;

    let load = f.coordinator.load_songs("A7");
    let cancel = async {
        while f.service.calls() == 0 {
            tokio::task::yield_now().await;
        }
        f.coordinator.cancel("A7");
        gate.add_permits(1);
    };

    let (songs, _) = tokio::join!(load, cancel);

    assert!(songs.is_empty());
    assert!(!f.coordinator.is_loading("A7"));
    assert!(f.coordinator.cached_songs("A7").is_none());
}

#[tokio::test]
async fn invalidate_forces_a_new_resolution() {
    let f = fixture(FakeService::new(), true).await;

    f.coordinator.load_songs("A8").await;
    f.coordinator.load_songs("A8").await;
    assert_eq!(f.service.calls(), 1);

    f.coordinator.invalidate("A8");
    f.coordinator.load_songs("A8").await;
    assert_eq!(f.service.calls(), 2);

    f.coordinator.clear();
    assert!(f.coordinator.cached_songs("A8").is_none());
}
