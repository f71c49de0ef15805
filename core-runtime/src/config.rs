//! # Core Configuration Module
//!
//! Provides configuration management for the offline caching core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance that holds all necessary dependencies and settings. It enforces
//! fail-fast validation so that a missing bridge is reported at startup
//! instead of on the first download.
//!
//! ## Required Dependencies
//!
//! - `HttpClient` - Audio transfers and API calls
//! - `FileSystemAccess` - Download store and artwork disk tier
//!
//! ## Optional Dependencies
//!
//! - `NetworkMonitor` - Connectivity detection for the offline-mode coordinator
//!
//! When the `desktop-shims` feature is enabled, desktop-ready defaults for all
//! three are injected automatically if not provided.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .downloads_root("/path/to/Downloads")
//!     .cache_dir("/path/to/cache")
//!     .http_client(Arc::new(MyHttpClient))
//!     .file_system(Arc::new(MyFileSystem))
//!     .artwork(ArtworkSettings::default().with_memory_capacity(512))
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use bridge_traits::{FileSystemAccess, HttpClient, NetworkMonitor};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Core configuration for the offline caching core.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Root folder that owns `downloaded_albums.json` and one folder per album
    pub downloads_root: PathBuf,

    /// Directory for regenerable files (the artwork disk tier lives here)
    pub cache_dir: PathBuf,

    /// HTTP client for API calls and audio transfers
    pub http_client: Arc<dyn HttpClient>,

    /// File system access abstraction
    pub file_system: Arc<dyn FileSystemAccess>,

    /// Network connectivity monitor (optional)
    pub network_monitor: Option<Arc<dyn NetworkMonitor>>,

    /// Cover art cache tuning
    pub artwork: ArtworkSettings,

    /// Download orchestrator tuning
    pub downloads: DownloadSettings,

    /// Features flags
    pub features: FeatureFlags,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("downloads_root", &self.downloads_root)
            .field("cache_dir", &self.cache_dir)
            .field("http_client", &"HttpClient { ... }")
            .field("file_system", &"FileSystemAccess { ... }")
            .field(
                "network_monitor",
                &self
                    .network_monitor
                    .as_ref()
                    .map(|_| "NetworkMonitor { ... }"),
            )
            .field("artwork", &self.artwork)
            .field("downloads", &self.downloads)
            .field("features", &self.features)
            .finish()
    }
}

/// Feature flags control optional functionality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureFlags {
    /// Keep fetched cover art on disk between runs
    pub enable_artwork_disk_cache: bool,

    /// Consult the `NetworkMonitor` before online fetches (requires NetworkMonitor)
    pub enable_network_awareness: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            enable_artwork_disk_cache: true,
            enable_network_awareness: false,
        }
    }
}

/// Settings for the two-tier cover art cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtworkSettings {
    /// Number of decoded images kept in the memory tier
    pub memory_capacity: usize,

    /// Upper bound for the disk tier in megabytes
    pub disk_cache_mb: usize,

    /// Resolutions requested when priming art for a download
    pub prime_sizes: Vec<u32>,

    /// Delay between primed requests
    pub prime_stagger: Duration,
}

impl Default for ArtworkSettings {
    fn default() -> Self {
        Self {
            memory_capacity: 256,
            disk_cache_mb: 200,
            prime_sizes: vec![100, 300, 500],
            prime_stagger: Duration::from_millis(50),
        }
    }
}

impl ArtworkSettings {
    pub fn with_memory_capacity(mut self, capacity: usize) -> Self {
        self.memory_capacity = capacity;
        self
    }

    pub fn with_disk_cache_mb(mut self, size_mb: usize) -> Self {
        self.disk_cache_mb = size_mb;
        self
    }

    pub fn with_prime_sizes(mut self, sizes: Vec<u32>) -> Self {
        self.prime_sizes = sizes;
        self
    }

    pub fn with_prime_stagger(mut self, stagger: Duration) -> Self {
        self.prime_stagger = stagger;
        self
    }

    /// Disk tier budget in bytes
    pub fn disk_cache_bytes(&self) -> u64 {
        self.disk_cache_mb as u64 * 1024 * 1024
    }

    pub fn validate(&self) -> Result<()> {
        if self.memory_capacity == 0 {
            return Err(Error::Config(
                "Artwork memory capacity must be greater than 0".to_string(),
            ));
        }

        if self.disk_cache_mb > 10_000 {
            return Err(Error::Config(
                "Artwork disk cache exceeds maximum of 10GB (10,000 MB)".to_string(),
            ));
        }

        if self.prime_sizes.iter().any(|size| *size == 0) {
            return Err(Error::Config(
                "Artwork prime sizes must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Settings for the download orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadSettings {
    /// How long a cancelled album stays in `Cancelling` before returning to `Idle`
    pub cancel_reset_delay: Duration,

    /// Per-song transfer timeout handed to the HTTP client
    pub transfer_timeout: Option<Duration>,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            cancel_reset_delay: Duration::from_millis(500),
            transfer_timeout: Some(Duration::from_secs(120)),
        }
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Paths are not empty
    /// - Artwork settings are sane
    /// - Feature flags are consistent with available bridges
    pub fn validate(&self) -> Result<()> {
        if self.downloads_root.as_os_str().is_empty() {
            return Err(Error::Config(
                "Downloads root cannot be empty".to_string(),
            ));
        }

        if self.cache_dir.as_os_str().is_empty() {
            return Err(Error::Config("Cache directory cannot be empty".to_string()));
        }

        self.artwork.validate()?;

        if self.features.enable_network_awareness && self.network_monitor.is_none() {
            return Err(Error::Config(
                "Network awareness enabled but no NetworkMonitor provided. \
                 Disable the feature or inject a NetworkMonitor implementation."
                    .to_string(),
            ));
        }

        Ok(())
    }

    /// Folder used by the artwork disk tier
    pub fn artwork_dir(&self) -> PathBuf {
        self.cache_dir.join("artwork")
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn http_client_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: "HttpClient implementation is required for downloads and API calls. \
                 Desktop: ensure the 'desktop-shims' feature is enabled to use the default ReqwestHttpClient. \
                 Mobile: inject a platform-native HTTP adapter."
            .to_string(),
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn file_system_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "FileSystemAccess".to_string(),
        message: "FileSystemAccess implementation is required for the download store. \
                 Desktop: ensure the 'desktop-shims' feature is enabled to use the default TokioFileSystem. \
                 Mobile: inject a sandbox-aware filesystem adapter."
            .to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    use bridge_desktop::ReqwestHttpClient;

    let client = ReqwestHttpClient::new().map_err(|e| Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: format!("Failed to create default ReqwestHttpClient: {}", e),
    })?;
    let client: Arc<dyn HttpClient> = Arc::new(client);
    Ok(client)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    Err(http_client_missing_error())
}

#[cfg(feature = "desktop-shims")]
fn provide_default_file_system(
    downloads_root: &std::path::Path,
    cache_dir: &std::path::Path,
) -> Result<Arc<dyn FileSystemAccess>> {
    use bridge_desktop::TokioFileSystem;

    let data_dir = downloads_root
        .parent()
        .map(|parent| parent.to_path_buf())
        .unwrap_or_else(|| downloads_root.to_path_buf());
    let fs: Arc<dyn FileSystemAccess> = Arc::new(TokioFileSystem::with_directories(
        cache_dir.to_path_buf(),
        data_dir,
    ));
    Ok(fs)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_file_system(
    _downloads_root: &std::path::Path,
    _cache_dir: &std::path::Path,
) -> Result<Arc<dyn FileSystemAccess>> {
    Err(file_system_missing_error())
}

#[cfg(feature = "desktop-shims")]
fn provide_default_network_monitor() -> Option<Arc<dyn NetworkMonitor>> {
    use bridge_desktop::DesktopNetworkMonitor;

    let monitor: Arc<dyn NetworkMonitor> = Arc::new(DesktopNetworkMonitor::new());
    Some(monitor)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_network_monitor() -> Option<Arc<dyn NetworkMonitor>> {
    None
}

/// Builder for constructing [`CoreConfig`] instances.
///
/// Call [`build()`](CoreConfigBuilder::build) to validate and create the
/// final config.
#[derive(Default)]
pub struct CoreConfigBuilder {
    downloads_root: Option<PathBuf>,
    cache_dir: Option<PathBuf>,
    http_client: Option<Arc<dyn HttpClient>>,
    file_system: Option<Arc<dyn FileSystemAccess>>,
    network_monitor: Option<Arc<dyn NetworkMonitor>>,
    artwork: Option<ArtworkSettings>,
    downloads: Option<DownloadSettings>,
    features: FeatureFlags,
}

impl CoreConfigBuilder {
    /// Sets the downloads root.
    ///
    /// ```
    /// use core_runtime::config::CoreConfig;
    ///
    /// let builder = CoreConfig::builder()
    ///     .downloads_root("/path/to/Downloads");
    /// ```
    pub fn downloads_root<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.downloads_root = Some(path.into());
        self
    }

    /// Sets the cache directory.
    pub fn cache_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.cache_dir = Some(path.into());
        self
    }

    /// Sets the HTTP client implementation.
    ///
    /// If not provided, the desktop default (reqwest-based) will be used when
    /// the `desktop-shims` feature is enabled.
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Sets the file system access implementation.
    ///
    /// If not provided, the desktop default (tokio fs-based) will be used when
    /// the `desktop-shims` feature is enabled.
    pub fn file_system(mut self, fs: Arc<dyn FileSystemAccess>) -> Self {
        self.file_system = Some(fs);
        self
    }

    /// Sets the network monitor implementation (optional).
    pub fn network_monitor(mut self, monitor: Arc<dyn NetworkMonitor>) -> Self {
        self.network_monitor = Some(monitor);
        self
    }

    pub fn artwork(mut self, settings: ArtworkSettings) -> Self {
        self.artwork = Some(settings);
        self
    }

    pub fn downloads(mut self, settings: DownloadSettings) -> Self {
        self.downloads = Some(settings);
        self
    }

    /// Enables or disables the artwork disk tier.
    ///
    /// Default: true
    pub fn enable_artwork_disk_cache(mut self, enabled: bool) -> Self {
        self.features.enable_artwork_disk_cache = enabled;
        self
    }

    /// Enables or disables network awareness.
    ///
    /// Requires a `NetworkMonitor` to be provided.
    ///
    /// Default: false
    pub fn enable_network_awareness(mut self, enabled: bool) -> Self {
        self.features.enable_network_awareness = enabled;
        self
    }

    /// Sets all feature flags at once.
    pub fn features(mut self, features: FeatureFlags) -> Self {
        self.features = features;
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// Returns an error if:
    /// - Required paths or bridges are missing
    /// - Configuration values are invalid
    /// - Feature flags are inconsistent with available bridges
    pub fn build(self) -> Result<CoreConfig> {
        let downloads_root = self.downloads_root.ok_or_else(|| {
            Error::Config(
                "Downloads root is required. Use .downloads_root() to set it.".to_string(),
            )
        })?;

        let cache_dir = self.cache_dir.ok_or_else(|| {
            Error::Config("Cache directory is required. Use .cache_dir() to set it.".to_string())
        })?;

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client()?,
        };

        let file_system = match self.file_system {
            Some(fs) => fs,
            None => provide_default_file_system(&downloads_root, &cache_dir)?,
        };

        let network_monitor = self
            .network_monitor
            .or_else(provide_default_network_monitor);

        let config = CoreConfig {
            downloads_root,
            cache_dir,
            http_client,
            file_system,
            network_monitor,
            artwork: self.artwork.unwrap_or_default(),
            downloads: self.downloads.unwrap_or_default(),
            features: self.features,
        };

        config.validate()?;

        Ok(config)
    }
}
