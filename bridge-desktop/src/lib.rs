//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest`
//! - `FileSystemAccess` using `tokio::fs`
//! - `NetworkMonitor` using a TCP reachability probe against the music server
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{DesktopNetworkMonitor, ReqwestHttpClient, TokioFileSystem};
//!
//! #[tokio::main]
//! async fn main() {
//!     let http_client = ReqwestHttpClient::new()?;
//!     let fs = TokioFileSystem::new();
//!     let monitor = DesktopNetworkMonitor::for_server("music.example.com:4533");
//!
//!     // Use in core configuration
//! }
//! ```

mod filesystem;
mod http;
mod network;

pub use filesystem::TokioFileSystem;
pub use http::ReqwestHttpClient;
pub use network::DesktopNetworkMonitor;
