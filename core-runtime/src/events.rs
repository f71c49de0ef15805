//! # Event Bus System
//!
//! Typed event channel built on `tokio::sync::broadcast`. Components publish
//! download and connectivity changes here instead of relying on stringly-keyed
//! notifications, so hosts can react (refresh a download button, show an
//! offline banner) without polling.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────┐  emit   ┌───────────┐
//! │ DownloadOrchestrator ├────────>│           │  subscribe  ┌────────────┐
//! └──────────────────────┘         │ EventBus  ├────────────>│ UI manager │
//!                                  │ (broadcast│             └────────────┘
//! ┌──────────────────────┐  emit   │  channel) │  subscribe  ┌────────────┐
//! │ OfflineModeCoordinator├───────>│           ├────────────>│ Subscriber │
//! └──────────────────────┘         └───────────┘             └────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, DownloadEvent, EventBus};
//!
//! let event_bus = EventBus::new(100);
//! let mut subscriber = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Download(DownloadEvent::Started {
//!         album_id: "al-1".to_string(),
//!         total_songs: 12,
//!     }))
//!     .ok();
//!
//! assert!(subscriber.try_recv().is_ok());
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: Subscriber was too slow and missed `n` events.
//!   This is non-fatal; the subscriber can continue receiving new events.
//! - **`RecvError::Closed`**: All senders have been dropped. This indicates shutdown.
//!
//! Publishers ignore the "no subscribers" error: events are advisory and a
//! host without listeners is a valid configuration.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

// Re-export commonly used types
pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Album download lifecycle
    Download(DownloadEvent),
    /// Connectivity and offline-mode changes
    Network(NetworkEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Download(e) => e.description(),
            CoreEvent::Network(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Download(DownloadEvent::Failed { .. }) => EventSeverity::Error,
            CoreEvent::Download(DownloadEvent::SongSkipped { .. }) => EventSeverity::Warning,
            CoreEvent::Network(NetworkEvent::OfflineModeChanged { offline: true, .. }) => {
                EventSeverity::Warning
            }
            CoreEvent::Download(DownloadEvent::Completed { .. }) => EventSeverity::Info,
            CoreEvent::Download(DownloadEvent::Deleted { .. })
            | CoreEvent::Download(DownloadEvent::AllDeleted) => EventSeverity::Info,
            CoreEvent::Network(_) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    /// Debug-level events (verbose)
    Debug,
    /// Informational events
    Info,
    /// Warning events
    Warning,
    /// Error events
    Error,
}

// ============================================================================
// Download Events
// ============================================================================

/// Events emitted by the download orchestrator and download store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum DownloadEvent {
    /// Album download started.
    Started {
        album_id: String,
        total_songs: u32,
    },
    /// One more song was written to disk.
    Progress {
        album_id: String,
        songs_completed: u32,
        total_songs: u32,
    },
    /// A song was skipped (missing stream URL or non-success status).
    SongSkipped {
        album_id: String,
        song_id: String,
        reason: String,
    },
    /// Album persisted to the download store.
    Completed {
        album_id: String,
        songs_downloaded: u32,
        total_bytes: u64,
    },
    /// Album download ended in the error state.
    Failed { album_id: String, message: String },
    /// Album download was cancelled by the user.
    Cancelled { album_id: String },
    /// Downloaded album removed.
    Deleted { album_id: String },
    /// Every download removed.
    AllDeleted,
}

impl DownloadEvent {
    fn description(&self) -> &str {
        match self {
            DownloadEvent::Started { .. } => "Album download started",
            DownloadEvent::Progress { .. } => "Album download in progress",
            DownloadEvent::SongSkipped { .. } => "Song skipped during download",
            DownloadEvent::Completed { .. } => "Album downloaded",
            DownloadEvent::Failed { .. } => "Album download failed",
            DownloadEvent::Cancelled { .. } => "Album download cancelled",
            DownloadEvent::Deleted { .. } => "Downloaded album deleted",
            DownloadEvent::AllDeleted => "All downloads deleted",
        }
    }

    /// Album the event refers to, if any.
    pub fn album_id(&self) -> Option<&str> {
        match self {
            DownloadEvent::Started { album_id, .. }
            | DownloadEvent::Progress { album_id, .. }
            | DownloadEvent::SongSkipped { album_id, .. }
            | DownloadEvent::Completed { album_id, .. }
            | DownloadEvent::Failed { album_id, .. }
            | DownloadEvent::Cancelled { album_id }
            | DownloadEvent::Deleted { album_id } => Some(album_id),
            DownloadEvent::AllDeleted => None,
        }
    }
}

// ============================================================================
// Network Events
// ============================================================================

/// Why the core entered or left offline mode.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OfflineReason {
    /// The user toggled offline mode.
    Manual,
    /// A server request timed out.
    Timeout,
    /// The network monitor reported the connection state changed.
    Connectivity,
}

/// Events emitted by the offline-mode coordinator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum NetworkEvent {
    OfflineModeChanged {
        offline: bool,
        reason: OfflineReason,
    },
}

impl NetworkEvent {
    fn description(&self) -> &str {
        match self {
            NetworkEvent::OfflineModeChanged { offline: true, .. } => "Entered offline mode",
            NetworkEvent::OfflineModeChanged { offline: false, .. } => "Left offline mode",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central broadcast channel for core events.
///
/// Cloning an `EventBus` yields another handle to the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// Subscribers falling behind by more than `capacity` events receive
    /// `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an
    /// error if there are no active subscribers.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    ///
    /// ```rust
    /// use core_runtime::events::EventBus;
    ///
    /// let event_bus = EventBus::new(100);
    /// assert_eq!(event_bus.subscriber_count(), 0);
    ///
    /// let _subscriber = event_bus.subscribe();
    /// assert_eq!(event_bus.subscriber_count(), 1);
    /// ```
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

/// Type alias for event filter functions.
type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with filtering.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let event_bus = EventBus::new(100);
/// let downloads_only = EventStream::new(event_bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Download(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    /// Creates a new event stream from a receiver.
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` will be returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Receives the next event that passes the filter (if any).
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n` events.
    /// Returns `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;

            let Some(filter) = &self.filter else {
                return Ok(event);
            };

            if filter(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive an event without blocking.
    ///
    /// Returns `None` if no events are currently available.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    let Some(filter) = &self.filter else {
                        return Some(Ok(event));
                    };

                    if filter(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
