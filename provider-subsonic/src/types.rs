//! Subsonic API response types

use core_library::{Album, Song};
use serde::Deserialize;

/// Every JSON response is wrapped in a `subsonic-response` object
#[derive(Debug, Clone, Deserialize)]
pub struct SubsonicEnvelope {
    #[serde(rename = "subsonic-response")]
    pub response: SubsonicResponse,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubsonicResponse {
    pub status: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub error: Option<SubsonicApiError>,
    #[serde(default)]
    pub album: Option<AlbumWithSongs>,
}

impl SubsonicResponse {
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubsonicApiError {
    pub code: u32,
    #[serde(default)]
    pub message: String,
}

/// `getAlbum` payload: the album fields plus a `song` array
#[derive(Debug, Clone, Deserialize)]
pub struct AlbumWithSongs {
    #[serde(flatten)]
    pub album: Album,
    #[serde(default)]
    pub song: Vec<Song>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_get_album() {
        let json = r#"{
            "subsonic-response": {
                "status": "ok",
                "version": "1.16.1",
                "album": {
                    "id": "A1",
                    "name": "Blue Train",
                    "artist": "John Coltrane",
                    "artistId": "AR1",
                    "coverArt": "al-A1",
                    "songCount": 2,
                    "year": 1957,
                    "song": [
                        {"id": "s1", "title": "Blue Train", "track": 1, "albumId": "A1", "size": 1000},
                        {"id": "s2", "title": "Moment's Notice", "track": 2, "albumId": "A1"}
                    ]
                }
            }
        }"#;

        let envelope: SubsonicEnvelope = serde_json::from_str(json).unwrap();
        assert!(envelope.response.is_ok());

        let album = envelope.response.album.unwrap();
        assert_eq!(album.album.id, "A1");
        assert_eq!(album.album.cover_art.as_deref(), Some("al-A1"));
        assert_eq!(album.album.year, Some(1957));
        assert_eq!(album.song.len(), 2);
        assert_eq!(album.song[0].size, Some(1000));
        assert_eq!(album.song[1].track, Some(2));
    }

    #[test]
    fn test_parse_failed_response() {
        let json = r#"{"subsonic-response": {"status": "failed", "version": "1.16.1",
            "error": {"code": 70, "message": "Album not found"}}}"#;

        let envelope: SubsonicEnvelope = serde_json::from_str(json).unwrap();
        assert!(!envelope.response.is_ok());
        assert_eq!(envelope.response.error.unwrap().code, 70);
    }
}
