//! # Subsonic Provider
//!
//! Implements the `MusicService` boundary for Subsonic-compatible servers
//! (Navidrome, Airsonic, Gonic).
//!
//! ## Overview
//!
//! This module provides:
//! - Token authentication (`t = md5(password + salt)`, fresh salt per request)
//! - `getAlbum` mapping into `AlbumDetails`
//! - Authenticated stream URLs for the download orchestrator
//! - `getCoverArt` fetches for the cover art cache
//! - Error classification (timeout / unauthorized / generic) so callers can
//!   fall back to offline mode

pub mod auth;
pub mod connector;
pub mod error;
pub mod types;

pub use auth::SubsonicCredentials;
pub use connector::SubsonicConnector;
pub use error::{Result, SubsonicError};
