//! Background connection monitoring.
//!
//! Polls the configured server once per second and keeps a shared
//! connected/disconnected flag current. Checks are single-flight: a slow
//! probe causes later ticks to be skipped, never queued. Polling is also
//! suppressed while a foreground operation holds the loading flag, so a
//! user-triggered connection test is never raced by the poller.

use crate::models::ConnectionProfile;
use crate::services::connectivity::ConnectivityProbe;
use crate::services::ticker::{spawn_ticker, TickerHandle};

use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// How often the monitor polls the server.
pub const MONITOR_PERIOD: Duration = Duration::from_secs(1);

/// Periodic connectivity watcher.
///
/// Cheap to clone; clones share the same flags and ticker.
#[derive(Clone)]
pub struct ConnectionMonitor {
    probe: Arc<dyn ConnectivityProbe>,
    profile: Arc<RwLock<ConnectionProfile>>,
    is_connected: Arc<AtomicBool>,
    /// Set by foreground operations to pause background polling.
    is_loading: Arc<AtomicBool>,
    /// Single-flight latch; held for the duration of one probe.
    is_checking: Arc<AtomicBool>,
    ticker: Arc<Mutex<Option<TickerHandle>>>,
}

impl ConnectionMonitor {
    pub fn new(
        probe: Arc<dyn ConnectivityProbe>,
        profile: Arc<RwLock<ConnectionProfile>>,
        is_connected: Arc<AtomicBool>,
        is_loading: Arc<AtomicBool>,
        is_checking: Arc<AtomicBool>,
    ) -> Self {
        Self {
            probe,
            profile,
            is_connected,
            is_loading,
            is_checking,
            ticker: Arc::new(Mutex::new(None)),
        }
    }

    /// Start polling. A monitor that is already running is restarted.
    pub fn start(&self) {
        self.start_with_period(MONITOR_PERIOD);
    }

    fn start_with_period(&self, period: Duration) {
        let mut guard = self.ticker.lock();
        if let Some(old) = guard.take() {
            old.stop();
        }

        let monitor = self.clone();
        *guard = Some(spawn_ticker("connection-monitor", period, move || {
            let monitor = monitor.clone();
            async move { monitor.check_now().await }
        }));
        tracing::info!("Connection monitor started");
    }

    /// Stop polling. A probe that is already in flight completes and its
    /// result is still applied.
    pub fn stop(&self) {
        if let Some(handle) = self.ticker.lock().take() {
            handle.stop();
            tracing::info!("Connection monitor stopped");
        }
    }

    /// Current connectivity as of the last completed probe.
    pub fn is_connected(&self) -> bool {
        self.is_connected.load(Ordering::SeqCst)
    }

    /// Run one probe now, unless one is already running or a foreground
    /// operation has polling paused.
    pub async fn check_now(&self) {
        if self.is_loading.load(Ordering::SeqCst) {
            return;
        }
        if self
            .is_checking
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        let probe = self.probe.clone();
        let snapshot = self.profile.read().clone();

        let report = match tokio::task::spawn_blocking(move || probe.check(&snapshot)).await {
            Ok(report) => report,
            Err(e) => {
                tracing::warn!(error = %e, "Connectivity probe task failed");
                self.is_checking.store(false, Ordering::SeqCst);
                return;
            }
        };

        let connected = report.is_connected();
        let was_connected = self.is_connected.swap(connected, Ordering::SeqCst);
        if was_connected != connected {
            match &report.error_message {
                Some(message) => {
                    tracing::info!(connected, error = %message, "Connection status changed")
                }
                None => tracing::info!(connected, "Connection status changed"),
            }
        }

        self.is_checking.store(false, Ordering::SeqCst);
    }
}
