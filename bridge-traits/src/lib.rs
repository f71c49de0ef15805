//! # Host Bridge Traits
//!
//! Platform abstraction traits that the host application implements for the
//! offline caching core.
//!
//! ## Overview
//!
//! The caches, the download store and the download orchestrator never talk
//! to the operating system directly. Everything that touches the disk, the
//! network or the clock goes through one of the traits below so that hosts
//! (desktop, mobile, tests) can supply their own adapters.
//!
//! ## Traits
//!
//! ### Networking & I/O
//! - [`HttpClient`](http::HttpClient) - Async HTTP requests (audio transfers, API calls)
//! - [`FileSystemAccess`](storage::FileSystemAccess) - File I/O for downloads and the artwork disk tier
//!
//! ### Platform Integration
//! - [`NetworkMonitor`](network::NetworkMonitor) - Connectivity detection
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//!
//! ## Platform Requirements
//!
//! | Platform | Implementation Crate | Status |
//! |----------|---------------------|--------|
//! | Desktop  | `bridge-desktop`    | ✅ Available |
//! | iOS      | TBD                 | 📋 Planned |
//!
//! ## Fail-Fast Strategy
//!
//! The core fails fast with descriptive errors when a required capability is
//! missing:
//!
//! ```ignore
//! let http_client = config.http_client
//!     .ok_or_else(|| RuntimeError::CapabilityMissing {
//!         capability: "HttpClient".to_string(),
//!         message: "No HTTP client implementation provided.".to_string(),
//!     })?;
//! ```
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so adapters can be shared behind
//! `Arc` across async tasks.

pub mod error;
pub mod http;
pub mod network;
pub mod storage;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
pub use network::{NetworkInfo, NetworkMonitor, NetworkStatus, NetworkType};
pub use storage::{FileMetadata, FileSystemAccess};
pub use time::{Clock, FixedClock, SystemClock};
