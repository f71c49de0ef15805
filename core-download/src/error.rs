//! # Download Error Types

use bridge_traits::error::BridgeError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while downloading or managing offline albums.
#[derive(Error, Debug)]
pub enum DownloadError {
    // ========================================================================
    // Preconditions
    // ========================================================================
    /// A download for this album is already running.
    #[error("Album {0} is already downloading")]
    AlreadyInProgress(String),

    /// The metadata cache has no entry for this album.
    #[error("No cached metadata for album {0}")]
    MissingMetadata(String),

    /// The album id cannot be used as a folder name under the downloads root.
    #[error("Album id {0:?} is not a valid folder name")]
    InvalidAlbumId(String),

    // ========================================================================
    // Transfer
    // ========================================================================
    /// The album folder could not be created.
    #[error("Failed to create folder {path}: {source}")]
    FolderCreationFailed {
        path: PathBuf,
        #[source]
        source: BridgeError,
    },

    /// A transfer failed at the transport level; the album is aborted.
    #[error("Failed to download '{title}': {source}")]
    SongDownloadFailed {
        title: String,
        #[source]
        source: BridgeError,
    },

    /// Every song was skipped.
    #[error("No songs could be downloaded for album {0}")]
    NoSongsDownloaded(String),

    /// The download was cancelled before it finished.
    #[error("Download of album {0} was cancelled")]
    Cancelled(String),

    // ========================================================================
    // Persistence
    // ========================================================================
    /// The downloaded albums index could not be read or written.
    #[error("Download store error: {0}")]
    Store(String),

    /// File system failure outside a transfer.
    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

impl DownloadError {
    /// Returns `true` when the request was refused before any work started.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            DownloadError::AlreadyInProgress(_)
                | DownloadError::MissingMetadata(_)
                | DownloadError::InvalidAlbumId(_)
        )
    }
}

impl From<serde_json::Error> for DownloadError {
    fn from(err: serde_json::Error) -> Self {
        DownloadError::Store(err.to_string())
    }
}

/// Result type for download operations.
pub type Result<T> = std::result::Result<T, DownloadError>;
