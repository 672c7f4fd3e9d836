//! Shared agent state and command methods.
//!
//! `FinbackState` is the one container the binary builds at startup. It
//! owns the settings store, the typed models behind locks, and the
//! latches the background services coordinate through. All mutation goes
//! through explicit command methods here; nothing persists implicitly.

use crate::error::FinbackError;
use crate::models::{
    keys, BackupFrequency, BackupSettings, ConnectionProfile, EngineKind, RunStatus,
    SystemPreferences,
};
use crate::services::connectivity::{ConnectivityProbe, MysqlProbe, ProbeReport};
use crate::services::engine::EngineRouter;
use crate::services::executor::BackupExecutor;
use crate::services::monitor::ConnectionMonitor;
use crate::services::notify::Notifier;
use crate::services::scheduler::BackupScheduler;
use crate::services::autostart;
use crate::services::settings::SettingsStore;

use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Get the default data directory for the agent.
///
/// Debug builds use `./finback_data`, release builds use the platform
/// data directory.
pub fn default_data_dir() -> PathBuf {
    #[cfg(debug_assertions)]
    {
        PathBuf::from("./finback_data")
    }

    #[cfg(not(debug_assertions))]
    {
        dirs::data_dir()
            .map(|d| {
                #[cfg(target_os = "macos")]
                {
                    d.join("dev.finback.Finback")
                }
                #[cfg(target_os = "windows")]
                {
                    d.join("finback").join("Finback")
                }
                #[cfg(target_os = "linux")]
                {
                    d.join("finback")
                }
                #[cfg(not(any(target_os = "macos", target_os = "windows", target_os = "linux")))]
                {
                    d.join("finback")
                }
            })
            .unwrap_or_else(|| PathBuf::from("./finback_data"))
    }
}

/// Create the data directory if it does not exist.
pub fn init_data_dir(path: &Path) -> Result<(), FinbackError> {
    if path.exists() {
        if !path.is_dir() {
            return Err(FinbackError::storage(
                format!("Data path exists but is not a directory: {}", path.display()),
                Some("Select a different location or remove the existing file"),
            ));
        }
        return Ok(());
    }

    std::fs::create_dir_all(path).map_err(|e| {
        FinbackError::storage(
            format!("Failed to create data directory '{}': {}", path.display(), e),
            Some("Check permissions or select a different location"),
        )
    })?;

    tracing::info!(path = %path.display(), "Created data directory");
    Ok(())
}

/// Agent-level state container.
///
/// This struct holds all runtime state for the Finback agent.
pub struct FinbackState {
    /// Settings persistence (and through it, credential obfuscation).
    pub settings: Arc<SettingsStore>,

    /// The MySQL server and schema this agent backs up.
    pub profile: Arc<RwLock<ConnectionProfile>>,

    /// Backup destination, cadence, and retention configuration.
    pub backup_settings: Arc<RwLock<BackupSettings>>,

    /// Desktop-facing preferences.
    pub preferences: Arc<RwLock<SystemPreferences>>,

    /// Progress of the current (or most recent) backup run.
    pub run_status: Arc<RwLock<RunStatus>>,

    /// Whether the last completed probe reached the server and found the
    /// schema.
    pub is_connected: Arc<AtomicBool>,

    /// Held while a foreground operation wants background polling paused.
    pub is_loading: Arc<AtomicBool>,

    /// Held while a connectivity probe is in flight.
    pub is_checking: Arc<AtomicBool>,

    /// Held while a backup run is in flight.
    pub is_backing_up: Arc<AtomicBool>,

    probe: Arc<dyn ConnectivityProbe>,
}

impl FinbackState {
    /// Create state over an already-opened settings store, probing real
    /// MySQL servers.
    pub fn new(settings: SettingsStore) -> Self {
        Self::with_probe(settings, Arc::new(MysqlProbe))
    }

    /// Create state with a custom connectivity probe.
    pub fn with_probe(settings: SettingsStore, probe: Arc<dyn ConnectivityProbe>) -> Self {
        Self {
            settings: Arc::new(settings),
            profile: Arc::new(RwLock::new(ConnectionProfile::default())),
            backup_settings: Arc::new(RwLock::new(BackupSettings::default())),
            preferences: Arc::new(RwLock::new(SystemPreferences::default())),
            run_status: Arc::new(RwLock::new(RunStatus::default())),
            is_connected: Arc::new(AtomicBool::new(false)),
            is_loading: Arc::new(AtomicBool::new(false)),
            is_checking: Arc::new(AtomicBool::new(false)),
            is_backing_up: Arc::new(AtomicBool::new(false)),
            probe,
        }
    }

    /// Initialize state from a data directory, creating it when missing.
    pub fn open(data_dir: &Path) -> Result<Self, FinbackError> {
        init_data_dir(data_dir)?;
        let settings = SettingsStore::open_sqlite(data_dir.join("settings.db"))?;
        tracing::info!("Settings store initialized");
        Ok(Self::new(settings))
    }

    // ========== Command Methods ==========

    /// One startup pass over everything persisted.
    ///
    /// Unreadable values fall back to their defaults; a stored connection
    /// URL that does not parse is logged and ignored.
    pub fn load_settings(&self) {
        let url = self.settings.get::<String>(keys::CONNECTION_URL, String::new());
        if !url.is_empty() {
            match ConnectionProfile::from_connection_url(&url) {
                Ok(profile) => *self.profile.write() = profile,
                Err(e) => {
                    tracing::warn!(error = %e, "Stored connection URL did not parse, keeping defaults");
                }
            }
        }

        let defaults = BackupSettings::default();
        let frequency = BackupFrequency::parse(
            &self
                .settings
                .get::<String>(keys::BACKUP_FREQUENCY, defaults.frequency.as_str().to_string()),
        );
        let engine = EngineKind::parse(
            &self
                .settings
                .get::<String>(keys::BACKUP_ENGINE, defaults.engine.as_str().to_string()),
        );
        *self.backup_settings.write() = BackupSettings {
            path: self.settings.get(keys::BACKUP_PATH, defaults.path),
            auto: self.settings.get(keys::BACKUP_AUTO, defaults.auto),
            frequency,
            keep_days: self.settings.get(keys::BACKUP_KEEP_DAYS, defaults.keep_days),
            engine,
        };

        self.run_status.write().last_backup_time =
            self.settings.get(keys::LAST_BACKUP_TIME, String::new());

        let pref_defaults = SystemPreferences::default();
        let mut preferences = SystemPreferences {
            dark_mode: self.settings.get(keys::DARK_MODE, pref_defaults.dark_mode),
            minimize_to_tray: self
                .settings
                .get(keys::MINIMIZE_TO_TRAY, pref_defaults.minimize_to_tray),
            auto_start: pref_defaults.auto_start,
        };
        // The OS registration is the record for auto-start, not the store
        match autostart::is_enabled() {
            Ok(enabled) => preferences.auto_start = enabled,
            Err(e) => tracing::warn!(error = %e, "Could not read start-at-login state"),
        }
        *self.preferences.write() = preferences;

        tracing::info!("Settings loaded");
    }

    /// Replace the connection profile and persist it as an obfuscated URL.
    pub fn update_connection_profile(
        &self,
        profile: ConnectionProfile,
    ) -> Result<(), FinbackError> {
        let url = profile.connection_url();
        self.settings.set(keys::CONNECTION_URL, &url)?;
        tracing::info!(url = %profile.redacted_url(), "Connection profile updated");
        *self.profile.write() = profile;
        Ok(())
    }

    /// Replace the backup settings and persist every key.
    pub fn update_backup_settings(&self, settings: BackupSettings) -> Result<(), FinbackError> {
        self.settings.set(keys::BACKUP_PATH, &settings.path)?;
        self.settings.set(keys::BACKUP_AUTO, &settings.auto)?;
        self.settings.set(keys::BACKUP_FREQUENCY, &settings.frequency.as_str())?;
        self.settings.set(keys::BACKUP_KEEP_DAYS, &settings.keep_days)?;
        self.settings.set(keys::BACKUP_ENGINE, &settings.engine.as_str())?;
        tracing::info!(
            auto = settings.auto,
            frequency = settings.frequency.as_str(),
            keep_days = settings.keep_days,
            "Backup settings updated"
        );
        *self.backup_settings.write() = settings;
        Ok(())
    }

    /// Update the persisted desktop preferences.
    ///
    /// Auto-start is deliberately not part of this: it lives in the OS
    /// and changes through [`FinbackState::update_auto_start`].
    pub fn update_system_preferences(
        &self,
        dark_mode: bool,
        minimize_to_tray: bool,
    ) -> Result<(), FinbackError> {
        self.settings.set(keys::DARK_MODE, &dark_mode)?;
        self.settings.set(keys::MINIMIZE_TO_TRAY, &minimize_to_tray)?;

        let mut preferences = self.preferences.write();
        preferences.dark_mode = dark_mode;
        preferences.minimize_to_tray = minimize_to_tray;
        Ok(())
    }

    /// Register or unregister start-at-login, then mirror the OS state.
    ///
    /// When the OS write fails, the in-memory flag is refreshed from the
    /// OS so it never claims a registration that did not happen.
    pub fn update_auto_start(&self, enabled: bool) -> Result<(), FinbackError> {
        let result = if enabled { autostart::enable() } else { autostart::disable() };

        match result {
            Ok(()) => {
                self.preferences.write().auto_start = enabled;
                Ok(())
            }
            Err(e) => {
                match autostart::is_enabled() {
                    Ok(actual) => self.preferences.write().auto_start = actual,
                    Err(read_err) => {
                        tracing::warn!(error = %read_err, "Could not re-read start-at-login state");
                    }
                }
                Err(e)
            }
        }
    }

    /// Manual connection test.
    ///
    /// Pauses background polling for its duration, updates the shared
    /// connected flag, and hands the full report back to the caller.
    pub async fn test_connection(&self) -> ProbeReport {
        self.is_loading.store(true, Ordering::SeqCst);

        let probe = self.probe.clone();
        let snapshot = self.profile.read().clone();
        let report = match tokio::task::spawn_blocking(move || probe.check(&snapshot)).await {
            Ok(report) => report,
            Err(e) => {
                tracing::warn!(error = %e, "Connection test task failed");
                ProbeReport::failure("Connection test did not finish")
            }
        };

        self.is_connected.store(report.is_connected(), Ordering::SeqCst);
        self.is_loading.store(false, Ordering::SeqCst);
        report
    }

    /// Record a finished backup in state and in the store.
    pub fn record_backup_success(&self, timestamp: &str) -> Result<(), FinbackError> {
        self.settings.set(keys::LAST_BACKUP_TIME, &timestamp)?;
        self.run_status.write().last_backup_time = timestamp.to_string();
        Ok(())
    }

    // ========== Service Wiring ==========

    /// Build the connection monitor over this state's flags.
    pub fn monitor(&self) -> ConnectionMonitor {
        ConnectionMonitor::new(
            self.probe.clone(),
            self.profile.clone(),
            self.is_connected.clone(),
            self.is_loading.clone(),
            self.is_checking.clone(),
        )
    }

    /// Build the backup scheduler over this state's flags.
    pub fn scheduler(&self) -> BackupScheduler {
        BackupScheduler::new(
            self.backup_settings.clone(),
            self.run_status.clone(),
            self.is_connected.clone(),
            self.is_backing_up.clone(),
        )
    }

    /// Build the backup executor over this state's flags.
    pub fn executor(&self, router: Arc<EngineRouter>, notifier: Arc<dyn Notifier>) -> BackupExecutor {
        BackupExecutor::new(
            router,
            self.settings.clone(),
            notifier,
            self.profile.clone(),
            self.backup_settings.clone(),
            self.run_status.clone(),
            self.is_connected.clone(),
            self.is_backing_up.clone(),
        )
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    struct StubProbe {
        report: ProbeReport,
    }

    impl ConnectivityProbe for StubProbe {
        fn check(&self, _profile: &ConnectionProfile) -> ProbeReport {
            self.report.clone()
        }
    }

    fn state_in(dir: &Path) -> FinbackState {
        let settings = SettingsStore::open_sqlite(dir.join("settings.db")).unwrap();
        FinbackState::with_probe(settings, Arc::new(StubProbe { report: ProbeReport::ok(true) }))
    }

    #[test]
    fn test_profile_round_trips_through_the_store() {
        let dir = tempdir().unwrap();

        let profile = ConnectionProfile {
            host: "db.internal".to_string(),
            port: 3307,
            username: "backup".to_string(),
            password: "p@ss:w/ord".to_string(),
            database: "shop".to_string(),
        };
        state_in(dir.path()).update_connection_profile(profile.clone()).unwrap();

        let reopened = state_in(dir.path());
        reopened.load_settings();
        assert_eq!(*reopened.profile.read(), profile);
    }

    #[test]
    fn test_stored_url_is_not_plaintext() {
        let dir = tempdir().unwrap();
        let state = state_in(dir.path());

        let profile = ConnectionProfile { password: "hunter2".to_string(), ..Default::default() };
        state.update_connection_profile(profile).unwrap();

        let raw = state.settings.raw_value(keys::CONNECTION_URL).unwrap();
        assert!(!raw.contains("hunter2"));
        assert!(!raw.contains("mysql://"));
    }

    #[test]
    fn test_bad_stored_url_keeps_defaults() {
        let dir = tempdir().unwrap();
        let state = state_in(dir.path());
        state.settings.set(keys::CONNECTION_URL, &"not a url at all").unwrap();

        state.load_settings();
        assert_eq!(*state.profile.read(), ConnectionProfile::default());
    }

    #[test]
    fn test_backup_settings_round_trip() {
        let dir = tempdir().unwrap();

        let settings = BackupSettings {
            path: "/var/backups".to_string(),
            auto: true,
            frequency: BackupFrequency::Weekly,
            keep_days: 30,
            engine: EngineKind::Builtin,
        };
        state_in(dir.path()).update_backup_settings(settings.clone()).unwrap();

        let reopened = state_in(dir.path());
        reopened.load_settings();
        assert_eq!(*reopened.backup_settings.read(), settings);
    }

    #[test]
    fn test_unknown_frequency_falls_back_to_daily() {
        let dir = tempdir().unwrap();
        let state = state_in(dir.path());
        state.settings.set(keys::BACKUP_FREQUENCY, &"fortnightly").unwrap();

        state.load_settings();
        assert_eq!(state.backup_settings.read().frequency, BackupFrequency::Daily);
    }

    #[test]
    fn test_system_preferences_persist_without_auto_start() {
        let dir = tempdir().unwrap();
        let state = state_in(dir.path());

        state.update_system_preferences(true, false).unwrap();

        let reopened = state_in(dir.path());
        reopened.load_settings();
        let preferences = reopened.preferences.read().clone();
        assert!(preferences.dark_mode);
        assert!(!preferences.minimize_to_tray);

        // The store must know nothing about auto-start
        assert!(!state.settings.get_all().keys().any(|k| k.to_lowercase().contains("autostart")));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_connection_test_updates_flags() {
        let dir = tempdir().unwrap();
        let state = state_in(dir.path());

        let report = state.test_connection().await;
        assert!(report.is_connected());
        assert!(state.is_connected.load(Ordering::SeqCst));
        assert!(!state.is_loading.load(Ordering::SeqCst));
    }

    #[test]
    fn test_record_backup_success_updates_both_copies() {
        let dir = tempdir().unwrap();
        let state = state_in(dir.path());

        let stamp = chrono::Local::now().to_rfc3339();
        state.record_backup_success(&stamp).unwrap();

        assert_eq!(state.run_status.read().last_backup_time, stamp);
        assert_eq!(state.settings.get::<String>(keys::LAST_BACKUP_TIME, String::new()), stamp);
    }
}
