//! Domain models for the remote library and the local download store
//!
//! `Song` and `Album` mirror what the Subsonic API returns. `AlbumMetadata`
//! is the small record the metadata cache keeps per album. `DownloadedAlbum`
//! and `DownloadedSong` are the persisted records written to
//! `downloaded_albums.json`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Artist name used when neither the server nor the cache supplied one.
pub const UNKNOWN_ARTIST: &str = "Unknown Artist";

// =============================================================================
// Remote library
// =============================================================================

/// A song as delivered by the music server
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Song {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub artist_id: Option<String>,
    #[serde(default)]
    pub album: Option<String>,
    #[serde(default)]
    pub album_id: Option<String>,
    #[serde(default)]
    pub track: Option<u32>,
    /// Duration in seconds
    #[serde(default)]
    pub duration: Option<u32>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub cover_art: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub suffix: Option<String>,
    /// Size of the original file in bytes
    #[serde(default)]
    pub size: Option<u64>,
}

impl Song {
    /// Title to show and to derive a file name from
    pub fn display_title(&self) -> &str {
        if self.title.trim().is_empty() {
            &self.id
        } else {
            &self.title
        }
    }
}

/// An album as delivered by the music server
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Album {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub artist_id: Option<String>,
    #[serde(default)]
    pub cover_art: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub song_count: Option<u32>,
    /// Total duration in seconds
    #[serde(default)]
    pub duration: Option<u32>,
}

impl Album {
    /// Project the album onto the record the metadata cache keeps
    pub fn metadata(&self) -> AlbumMetadata {
        AlbumMetadata {
            id: self.id.clone(),
            name: self.name.clone(),
            artist: self
                .artist
                .clone()
                .unwrap_or_else(|| UNKNOWN_ARTIST.to_string()),
            artist_id: self.artist_id.clone(),
            year: self.year,
            genre: self.genre.clone(),
            cover_art: self.cover_art.clone(),
        }
    }
}

/// Last-known metadata for an album.
///
/// Downloads receive only an album id and a song list; the name, artist and
/// year written into the download record come from here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlbumMetadata {
    pub id: String,
    pub name: String,
    pub artist: String,
    #[serde(default)]
    pub artist_id: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub cover_art: Option<String>,
}

impl AlbumMetadata {
    pub fn new(id: impl Into<String>, name: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            artist: artist.into(),
            artist_id: None,
            year: None,
            genre: None,
            cover_art: None,
        }
    }

    pub fn with_artist_id(mut self, artist_id: impl Into<String>) -> Self {
        self.artist_id = Some(artist_id.into());
        self
    }

    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    pub fn with_genre(mut self, genre: impl Into<String>) -> Self {
        self.genre = Some(genre.into());
        self
    }

    pub fn with_cover_art(mut self, cover_art: impl Into<String>) -> Self {
        self.cover_art = Some(cover_art.into());
        self
    }

    /// Cover art id to request, falling back to the album id
    pub fn cover_art_id(&self) -> &str {
        self.cover_art.as_deref().unwrap_or(&self.id)
    }
}

// =============================================================================
// Download store records
// =============================================================================

/// One transferred audio file.
///
/// Immutable once written; removed together with its album.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadedSong {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub album: Option<String>,
    #[serde(default)]
    pub album_id: Option<String>,
    #[serde(default)]
    pub track: Option<u32>,
    #[serde(default)]
    pub duration: Option<u32>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
    /// File name relative to the album folder
    pub file_name: String,
    pub file_size: u64,
    pub downloaded_at: DateTime<Utc>,
}

impl DownloadedSong {
    /// Build the record for a song that was just written to `file_name`
    pub fn from_song(
        song: &Song,
        file_name: impl Into<String>,
        file_size: u64,
        downloaded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: song.id.clone(),
            title: song.display_title().to_string(),
            artist: song.artist.clone(),
            album: song.album.clone(),
            album_id: song.album_id.clone(),
            track: song.track,
            duration: song.duration,
            year: song.year,
            genre: song.genre.clone(),
            content_type: song.content_type.clone(),
            file_name: file_name.into(),
            file_size,
            downloaded_at,
        }
    }

    /// Convert back into the general song model used by playback and UI
    pub fn to_song(&self) -> Song {
        let suffix = Path::new(&self.file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_string);

        Song {
            id: self.id.clone(),
            title: self.title.clone(),
            artist: self.artist.clone(),
            artist_id: None,
            album: self.album.clone(),
            album_id: self.album_id.clone(),
            track: self.track,
            duration: self.duration,
            year: self.year,
            genre: self.genre.clone(),
            // Navidrome serves album art under the album id
            cover_art: self.album_id.clone(),
            content_type: self.content_type.clone(),
            suffix,
            size: Some(self.file_size),
        }
    }
}

/// A fully downloaded album.
///
/// Written only when at least one song transferred; replaced wholesale on
/// re-download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadedAlbum {
    pub id: String,
    pub name: String,
    pub artist: String,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub songs: Vec<DownloadedSong>,
    /// Empty for records written before folders were tracked
    #[serde(default)]
    pub folder_path: PathBuf,
    pub downloaded_at: DateTime<Utc>,
    /// Song ids from records that predate per-song metadata
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub song_ids: Vec<String>,
}

impl DownloadedAlbum {
    pub fn new(
        metadata: &AlbumMetadata,
        songs: Vec<DownloadedSong>,
        folder_path: PathBuf,
        downloaded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: metadata.id.clone(),
            name: metadata.name.clone(),
            artist: metadata.artist.clone(),
            year: metadata.year,
            genre: metadata.genre.clone(),
            songs,
            folder_path,
            downloaded_at,
            song_ids: Vec::new(),
        }
    }

    /// Every song id this record vouches for, legacy ids included
    pub fn all_song_ids(&self) -> impl Iterator<Item = &str> {
        self.songs
            .iter()
            .map(|song| song.id.as_str())
            .chain(self.song_ids.iter().map(String::as_str))
    }

    pub fn contains_song(&self, song_id: &str) -> bool {
        self.all_song_ids().any(|id| id == song_id)
    }

    /// Songs ordered by track number; untracked songs keep their relative order at the end
    pub fn songs_in_track_order(&self) -> Vec<DownloadedSong> {
        let mut songs = self.songs.clone();
        songs.sort_by_key(|song| song.track.unwrap_or(u32::MAX));
        songs
    }

    pub fn total_bytes(&self) -> u64 {
        self.songs.iter().map(|song| song.file_size).sum()
    }

    pub fn metadata(&self) -> AlbumMetadata {
        AlbumMetadata {
            id: self.id.clone(),
            name: self.name.clone(),
            artist: self.artist.clone(),
            artist_id: None,
            year: self.year,
            genre: self.genre.clone(),
            cover_art: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn song(id: &str, track: u32) -> Song {
        Song {
            id: id.to_string(),
            title: format!("Song {}", track),
            artist: Some("Artist".to_string()),
            album: Some("Album".to_string()),
            album_id: Some("A1".to_string()),
            track: Some(track),
            duration: Some(200 + track),
            year: Some(2001),
            genre: Some("Rock".to_string()),
            content_type: Some("audio/mpeg".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_song_deserializes_subsonic_json() {
        let json = r#"{
            "id": "tr-1",
            "title": "Intro",
            "albumId": "al-1",
            "artistId": "ar-1",
            "coverArt": "al-1",
            "contentType": "audio/flac",
            "track": 1,
            "duration": 61,
            "year": 1999,
            "isDir": false
        }"#;

        let song: Song = serde_json::from_str(json).unwrap();
        assert_eq!(song.album_id.as_deref(), Some("al-1"));
        assert_eq!(song.artist_id.as_deref(), Some("ar-1"));
        assert_eq!(song.content_type.as_deref(), Some("audio/flac"));
        assert_eq!(song.track, Some(1));
        assert_eq!(song.genre, None);
    }

    #[test]
    fn test_downloaded_song_round_trip() {
        let original = song("S1", 3);
        let at = Utc::now();

        let downloaded = DownloadedSong::from_song(&original, "03 - Song 3.mp3", 1000, at);
        let restored = downloaded.to_song();
        let again = DownloadedSong::from_song(&restored, "03 - Song 3.mp3", 1000, at);

        assert_eq!(restored.id, original.id);
        assert_eq!(restored.title, original.title);
        assert_eq!(restored.duration, original.duration);
        assert_eq!(restored.track, original.track);
        assert_eq!(restored.year, original.year);
        assert_eq!(restored.genre, original.genre);
        assert_eq!(restored.content_type, original.content_type);
        assert_eq!(restored.suffix.as_deref(), Some("mp3"));
        assert_eq!(again, downloaded);
    }

    #[test]
    fn test_album_metadata_falls_back_to_unknown_artist() {
        let album = Album {
            id: "al-1".to_string(),
            name: "Nameless".to_string(),
            ..Default::default()
        };

        let metadata = album.metadata();
        assert_eq!(metadata.artist, UNKNOWN_ARTIST);
        assert_eq!(metadata.cover_art_id(), "al-1");
    }

    #[test]
    fn test_downloaded_album_track_order_and_size() {
        let metadata = AlbumMetadata::new("A1", "Album", "Artist").with_year(2001);
        let at = Utc::now();
        let album = DownloadedAlbum::new(
            &metadata,
            vec![
                DownloadedSong::from_song(&song("S2", 2), "02 - Song 2.mp3", 2000, at),
                DownloadedSong::from_song(&song("S1", 1), "01 - Song 1.mp3", 1000, at),
            ],
            PathBuf::from("/Downloads/A1"),
            at,
        );

        let ordered: Vec<_> = album
            .songs_in_track_order()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ordered, vec!["S1", "S2"]);
        assert_eq!(album.total_bytes(), 3000);
        assert!(album.contains_song("S2"));
        assert!(!album.contains_song("S3"));
    }

    #[test]
    fn test_legacy_record_without_songs_deserializes() {
        let json = r#"{
            "id": "A9",
            "name": "Old Album",
            "artist": "Someone",
            "folderPath": "/Downloads/A9",
            "downloadedAt": "2023-01-02T03:04:05Z",
            "songIds": ["x1", "x2"]
        }"#;

        let album: DownloadedAlbum = serde_json::from_str(json).unwrap();
        assert!(album.songs.is_empty());
        assert_eq!(album.all_song_ids().collect::<Vec<_>>(), vec!["x1", "x2"]);
    }
}
