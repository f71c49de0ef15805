//! Network service boundary
//!
//! The caches never speak HTTP to the music server themselves. They go
//! through [`MusicService`], which a provider crate implements (see
//! `provider-subsonic`) and tests replace with fakes.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;
use crate::models::{Album, Song};

/// An album together with its ordered song list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlbumDetails {
    pub album: Album,
    pub songs: Vec<Song>,
}

/// Remote music library operations needed by the caching layer.
///
/// Every call is fallible; a [`ServiceError::Timeout`](crate::ServiceError::Timeout)
/// is the signal callers use to switch into offline mode.
#[async_trait]
pub trait MusicService: Send + Sync {
    /// Album record and its songs in server order
    async fn get_album(&self, album_id: &str) -> Result<AlbumDetails>;

    /// Authenticated URL the audio for `song_id` can be fetched from.
    ///
    /// `Ok(None)` means the server has no stream for this song.
    async fn stream_url(&self, song_id: &str) -> Result<Option<String>>;

    /// Encoded image bytes for a cover art id scaled to `size` pixels
    async fn cover_art(&self, cover_art_id: &str, size: u32) -> Result<Bytes>;
}
