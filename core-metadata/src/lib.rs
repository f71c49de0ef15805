//! # Metadata & Artwork Caches
//!
//! Keeps what the offline layer needs to know about albums and their art.
//!
//! ## Overview
//!
//! This module handles:
//! - Album metadata cache (id → `AlbumMetadata`, last write wins)
//! - Two-tier cover art cache (LRU memory tier over a persistent store)
//! - Disk-backed image store with a size cap

pub mod album_cache;
pub mod artwork;
pub mod artwork_store;
pub mod error;

pub use album_cache::AlbumMetadataCache;
pub use artwork::{ArtworkKey, CoverArtCache, CoverArtStats};
pub use artwork_store::{DiskImageStore, ImageStoreStats, PersistentImageStore};
pub use error::{MetadataError, Result};
