//! Offline mode coordination
//!
//! Decides whether online fetches should be attempted at all. Three inputs
//! feed the decision:
//!
//! - the user's manual offline toggle,
//! - automatic offline mode, entered when a server request times out,
//! - the last status reported by the host's [`NetworkMonitor`].
//!
//! Caches only see the [`ContentAvailability`] trait, so tests can swap in a
//! fixed answer.

use bridge_traits::network::{NetworkMonitor, NetworkStatus};
use core_runtime::events::{CoreEvent, EventBus, NetworkEvent, OfflineReason};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Answers "may we go to the network right now?"
pub trait ContentAvailability: Send + Sync {
    fn can_load_online_content(&self) -> bool;

    /// A server call timed out. Implementations may switch to offline mode.
    fn report_timeout(&self) {}
}

#[derive(Debug)]
struct OfflineState {
    manual: bool,
    auto_offline_since: Option<Instant>,
    network: NetworkStatus,
}

impl OfflineState {
    fn is_offline(&self) -> bool {
        self.manual
            || self.auto_offline_since.is_some()
            || self.network == NetworkStatus::Disconnected
    }
}

/// Default [`ContentAvailability`] implementation.
pub struct OfflineModeCoordinator {
    monitor: Option<Arc<dyn NetworkMonitor>>,
    state: RwLock<OfflineState>,
    auto_offline_cooldown: Duration,
    event_bus: Option<EventBus>,
}

impl OfflineModeCoordinator {
    /// Without a monitor the network is assumed reachable until a timeout says otherwise.
    pub fn new(monitor: Option<Arc<dyn NetworkMonitor>>) -> Self {
        Self {
            monitor,
            state: RwLock::new(OfflineState {
                manual: false,
                auto_offline_since: None,
                network: NetworkStatus::Indeterminate,
            }),
            auto_offline_cooldown: Duration::from_secs(60),
            event_bus: None,
        }
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// How long automatic offline mode lasts before online fetches are retried
    pub fn with_auto_offline_cooldown(mut self, cooldown: Duration) -> Self {
        self.auto_offline_cooldown = cooldown;
        self
    }

    pub fn is_offline(&self) -> bool {
        self.state.read().is_offline()
    }

    pub fn is_manual_offline(&self) -> bool {
        self.state.read().manual
    }

    pub fn is_auto_offline(&self) -> bool {
        self.state.read().auto_offline_since.is_some()
    }

    pub fn set_manual_offline(&self, offline: bool) {
        self.transition(OfflineReason::Manual, |state| state.manual = offline);
        info!(offline, "Manual offline mode set");
    }

    /// Leave automatic offline mode immediately (e.g. user tapped "retry")
    pub fn reset_auto_offline(&self) {
        self.transition(OfflineReason::Connectivity, |state| {
            state.auto_offline_since = None
        });
    }

    /// Re-read the network monitor and expire automatic offline mode.
    pub async fn refresh(&self) -> NetworkStatus {
        let status = match &self.monitor {
            Some(monitor) => match monitor.get_network_info().await {
                Ok(info) => info.status,
                Err(e) => {
                    warn!(error = %e, "Network monitor failed");
                    NetworkStatus::Indeterminate
                }
            },
            None => NetworkStatus::Indeterminate,
        };

        let cooldown = self.auto_offline_cooldown;
        self.transition(OfflineReason::Connectivity, |state| {
            let reconnected = state.network == NetworkStatus::Disconnected
                && status == NetworkStatus::Connected;
            let cooled_down = state
                .auto_offline_since
                .map(|since| since.elapsed() >= cooldown)
                .unwrap_or(false);

            // An unknown status still lets the cooldown expire; only a
            // positive disconnect keeps automatic offline mode alive.
            if reconnected || (status != NetworkStatus::Disconnected && cooled_down) {
                state.auto_offline_since = None;
            }
            state.network = status;
        });

        debug!(?status, "Refreshed network status");
        status
    }

    /// Poll the monitor every `interval` until `token` is cancelled.
    pub fn spawn_monitor(
        self: Arc<Self>,
        interval: Duration,
        token: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        self.refresh().await;
                    }
                }
            }
            debug!("Network monitor loop stopped");
        })
    }

    /// Drop automatic offline mode once its cooldown has passed, unless the
    /// monitor last reported a disconnect.
    fn expire_auto_offline(&self) {
        let expired = {
            let state = self.state.read();
            state.network != NetworkStatus::Disconnected
                && state
                    .auto_offline_since
                    .map(|since| since.elapsed() >= self.auto_offline_cooldown)
                    .unwrap_or(false)
        };

        if expired {
            self.transition(OfflineReason::Connectivity, |state| {
                state.auto_offline_since = None
            });
        }
    }

    fn transition(&self, reason: OfflineReason, update: impl FnOnce(&mut OfflineState)) {
        let (before, after) = {
            let mut state = self.state.write();
            let before = state.is_offline();
            update(&mut state);
            (before, state.is_offline())
        };

        if before != after {
            info!(offline = after, ?reason, "Offline mode changed");
            if let Some(bus) = &self.event_bus {
                let _ = bus.emit(CoreEvent::Network(NetworkEvent::OfflineModeChanged {
                    offline: after,
                    reason,
                }));
            }
        }
    }
}

impl ContentAvailability for OfflineModeCoordinator {
    fn can_load_online_content(&self) -> bool {
        self.expire_auto_offline();
        !self.is_offline()
    }

    fn report_timeout(&self) {
        warn!("Server request timed out, switching to offline mode");
        self.transition(OfflineReason::Timeout, |state| {
            if state.auto_offline_since.is_none() {
                state.auto_offline_since = Some(Instant::now());
            }
        });
    }
}
