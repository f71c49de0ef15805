//! # Library Module
//!
//! Shared vocabulary of the caching layer.
//!
//! ## Overview
//!
//! This module provides:
//! - Domain models for the remote library (`Song`, `Album`, `AlbumMetadata`)
//! - Persisted download records (`DownloadedAlbum`, `DownloadedSong`)
//! - The [`MusicService`] boundary to the music server
//! - The [`OfflineModeCoordinator`] consulted before every online fetch

pub mod connectivity;
pub mod error;
pub mod models;
pub mod service;

pub use connectivity::{ContentAvailability, OfflineModeCoordinator};
pub use error::{Result, ServiceError, ServiceErrorKind};
pub use models::{Album, AlbumMetadata, DownloadedAlbum, DownloadedSong, Song, UNKNOWN_ARTIST};
pub use service::{AlbumDetails, MusicService};
