//! # Album Downloads
//!
//! Durable offline copies of whole albums.
//!
//! ## Overview
//!
//! - [`DownloadStore`] owns `Downloads/` and its `downloaded_albums.json`
//!   index. Every mutation is saved before the call returns.
//! - [`DownloadOrchestrator`] drives one album through metadata checks,
//!   cover art priming, per-song transfer and the final store update,
//!   tracking a [`DownloadState`] per album.
//!
//! ## Layout
//!
//! ```text
//! Downloads/
//!   downloaded_albums.json
//!   <albumId>/
//!     01 - First Song.mp3
//!     02 - Second Song.mp3
//!   <songId>.mp3            (legacy flat files)
//! ```

pub mod error;
pub mod naming;
pub mod orchestrator;
pub mod state;
pub mod store;

pub use error::{DownloadError, Result};
pub use orchestrator::DownloadOrchestrator;
pub use state::{AlbumProgress, DownloadState};
pub use store::DownloadStore;
