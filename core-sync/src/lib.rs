//! # Song Cache
//!
//! Answers "what songs are on this album?" without ever failing.
//!
//! ## Components
//!
//! - **Song Cache Coordinator** (`coordinator`): memory cache, in-flight
//!   de-duplication, offline-first reads from the download store, network
//!   fetch while online, and placeholder songs as the last resort

pub mod coordinator;

pub use coordinator::SongCacheCoordinator;
