//! Façade wiring: downloads, offline fallback and network monitoring.

use async_trait::async_trait;
use bridge_desktop::TokioFileSystem;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
use bridge_traits::network::{NetworkInfo, NetworkMonitor};
use bytes::Bytes;
use core_download::DownloadState;
use core_library::{
    Album, AlbumDetails, MusicService, Result as ServiceResult, ServiceError, Song,
};
use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, DownloadEvent, NetworkEvent};
use core_service::CoreService;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

struct FakeService {
    album_calls: AtomicUsize,
}

#[async_trait]
impl MusicService for FakeService {
    async fn get_album(&self, album_id: &str) -> ServiceResult<AlbumDetails> {
        self.album_calls.fetch_add(1, Ordering::SeqCst);
        if album_id != "A1" {
            return Err(ServiceError::Generic(format!("unknown album {}", album_id)));
        }
        Ok(AlbumDetails {
            album: Album {
                id: "A1".into(),
                name: "Blue Train".into(),
                artist: Some("John Coltrane".into()),
                cover_art: Some("al-A1".into()),
                ..Default::default()
            },
            songs: vec![
                Song {
                    id: "s1".into(),
                    title: "Blue Train".into(),
                    album_id: Some("A1".into()),
                    track: Some(1),
                    ..Default::default()
                },
                Song {
                    id: "s2".into(),
                    title: "Moment's Notice".into(),
                    album_id: Some("A1".into()),
                    track: Some(2),
                    ..Default::default()
                },
            ],
        })
    }

    async fn stream_url(&self, song_id: &str) -> ServiceResult<Option<String>> {
        Ok(Some(format!("https://music.test/stream/{}", song_id)))
    }

    async fn cover_art(&self, cover_art_id: &str, size: u32) -> ServiceResult<Bytes> {
        Ok(Bytes::from(format!("{}@{}", cover_art_id, size)))
    }
}

struct FakeHttp;

#[async_trait]
impl HttpClient for FakeHttp {
    async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
        let size = if request.url.ends_with("s1") { 1000 } else { 2000 };
        Ok(HttpResponse {
            status: 200,
            headers: HashMap::new(),
            body: Bytes::from(vec![0u8; size]),
        })
    }
}

struct Disconnected;

#[async_trait]
impl NetworkMonitor for Disconnected {
    async fn get_network_info(&self) -> BridgeResult<NetworkInfo> {
        Ok(NetworkInfo::disconnected())
    }
}

async fn service(dir: &TempDir, network_awareness: bool) -> (CoreService, Arc<FakeService>) {
    let fs = Arc::new(TokioFileSystem::with_directories(
        dir.path().join("cache"),
        dir.path().join("data"),
    ));
    let config = CoreConfig::builder()
        .downloads_root(dir.path().join("Downloads"))
        .cache_dir(dir.path().join("cache"))
        .http_client(Arc::new(FakeHttp))
        .file_system(fs)
        .network_monitor(Arc::new(Disconnected))
        .enable_network_awareness(network_awareness)
        .build()
        .unwrap();

    let music = Arc::new(FakeService {
        album_calls: AtomicUsize::new(0),
    });
    let core = CoreService::new(config, music.clone()).await.unwrap();
    (core, music)
}

#[tokio::test]
async fn download_album_then_play_offline() {
    let dir = TempDir::new().unwrap();
    let (core, music) = service(&dir, false).await;
    let mut events = core
        .subscribe_events()
        .filter(|event| matches!(event, CoreEvent::Download(_)));

    core.download_album("A1").await.unwrap();

    assert_eq!(core.downloads().state("A1"), DownloadState::Downloaded);
    assert!(core.download_store().is_album_downloaded("A1"));
    assert_eq!(core.download_store().total_download_size(), "0.003 MB");
    assert_eq!(
        core.metadata_cache().get_album("A1").unwrap().name,
        "Blue Train"
    );

    let first = events.recv().await.unwrap();
    assert!(matches!(
        first,
        CoreEvent::Download(DownloadEvent::Started { total_songs: 2, .. })
    ));

    core.offline_mode().set_manual_offline(true);
    let songs = core.load_songs("A1").await;
    assert_eq!(songs.len(), 2);
    assert_eq!(songs[0].title, "Blue Train");
    assert_eq!(music.album_calls.load(Ordering::SeqCst), 1);

    let path = core.download_store().get_local_file_path("s2").await;
    assert!(path.unwrap().ends_with("02 - Moment's Notice.mp3"));
}

#[tokio::test]
async fn download_of_unknown_album_reports_missing_metadata() {
    let dir = TempDir::new().unwrap();
    let (core, _) = service(&dir, false).await;

    let err = core.download_album("A2").await.unwrap_err();

    assert!(matches!(
        err,
        core_service::CoreError::Download(core_download::DownloadError::MissingMetadata(_))
    ));
    assert_eq!(core.downloads().state("A2"), DownloadState::Idle);
}

#[tokio::test]
async fn artwork_disk_cache_lives_under_cache_dir() {
    let dir = TempDir::new().unwrap();
    let (core, _) = service(&dir, false).await;

    let image = core.cover_art_cache().load_image("al-A1", 300).await;

    assert_eq!(image.unwrap(), Bytes::from("al-A1@300"));
    assert!(dir.path().join("cache").join("artwork").exists());
    let stats = core.cover_art_cache().stats().await;
    assert_eq!(stats.disk.map(|disk| disk.entries), Some(1));
}

#[tokio::test]
async fn network_monitor_switches_to_offline() {
    let dir = TempDir::new().unwrap();
    let (core, _) = service(&dir, true).await;
    let mut events = core
        .subscribe_events()
        .filter(|event| matches!(event, CoreEvent::Network(_)));

    let handle = core
        .start_network_monitoring(Duration::from_millis(10))
        .unwrap();

    let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(
        event,
        CoreEvent::Network(NetworkEvent::OfflineModeChanged { offline: true, .. })
    ));
    assert!(core.offline_mode().is_offline());

    core.shutdown();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn monitoring_disabled_without_network_awareness() {
    let dir = TempDir::new().unwrap();
    let (core, _) = service(&dir, false).await;

    assert!(core
        .start_network_monitoring(Duration::from_millis(10))
        .is_none());
}
