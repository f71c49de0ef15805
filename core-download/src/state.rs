//! Per-album download state and progress

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of one album's download.
///
/// ```text
/// Idle/Error ──start──> Downloading ──> Downloaded
///                            │     └──> Error
///                            └─cancel─> Cancelling ──> Idle
/// Downloaded ──delete──> Idle
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", content = "message", rename_all = "snake_case")]
pub enum DownloadState {
    #[default]
    Idle,
    Downloading,
    Downloaded,
    Error(String),
    Cancelling,
}

impl DownloadState {
    pub fn is_active(&self) -> bool {
        matches!(self, DownloadState::Downloading | DownloadState::Cancelling)
    }

    /// Whether a new download may start from this state
    pub fn can_start(&self) -> bool {
        !self.is_active()
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            DownloadState::Error(message) => Some(message),
            _ => None,
        }
    }
}

/// Progress of an album currently downloading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlbumProgress {
    pub album_id: String,

    /// Songs processed so far, skipped ones included
    pub songs_completed: u32,

    pub total_songs: u32,

    /// Bytes written for this album
    pub bytes_downloaded: u64,

    /// Download started, Unix seconds
    pub started_at: i64,

    /// Last update, Unix seconds
    pub updated_at: i64,
}

impl AlbumProgress {
    pub fn new(album_id: impl Into<String>, total_songs: u32, now: DateTime<Utc>) -> Self {
        let now = now.timestamp();
        Self {
            album_id: album_id.into(),
            songs_completed: 0,
            total_songs,
            bytes_downloaded: 0,
            started_at: now,
            updated_at: now,
        }
    }

    /// Record one more processed song
    pub fn advance(&mut self, bytes: u64, now: DateTime<Utc>) {
        self.songs_completed = (self.songs_completed + 1).min(self.total_songs);
        self.bytes_downloaded += bytes;
        self.updated_at = now.timestamp();
    }

    /// Fraction in `0.0..=1.0`
    pub fn fraction(&self) -> f64 {
        if self.total_songs == 0 {
            return 0.0;
        }
        self.songs_completed as f64 / self.total_songs as f64
    }

    pub fn is_complete(&self) -> bool {
        self.songs_completed >= self.total_songs
    }
}
