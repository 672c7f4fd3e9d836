//! Backup run orchestration.
//!
//! A run goes through fixed stages: gate checks, latch acquisition,
//! artifact naming, progress relay setup, engine dispatch on a blocking
//! thread, then bookkeeping. Exactly one run can be in flight; callers
//! that lose the race get a clean no-op, not an error. Retention and
//! notifications ride on the end of a successful run and are never
//! allowed to fail it.

use crate::error::FinbackError;
use crate::models::{keys, BackupProgress, BackupSettings, ConnectionProfile, RunStatus};
use crate::services::engine::{DumpRequest, EngineRouter, ProgressSink};
use crate::services::notify::{Notification, Notifier};
use crate::services::retention::{self, ARCHIVE_PREFIX, ARCHIVE_SUFFIX};
use crate::services::settings::SettingsStore;

use chrono::{DateTime, Local};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Archive file name for a run started at `now`, minute resolution.
pub fn artifact_name(now: DateTime<Local>) -> String {
    format!("{}{}{}", ARCHIVE_PREFIX, now.format("%Y-%m-%d_%H-%M"), ARCHIVE_SUFFIX)
}

/// Destination path for a run's archive.
///
/// The folder is taken as the user typed it: backslashes become forward
/// slashes and trailing separators are trimmed before the file name is
/// appended.
pub fn artifact_path(backup_dir: &str, now: DateTime<Local>) -> String {
    format!("{}/{}", normalize_dir(backup_dir), artifact_name(now))
}

fn normalize_dir(backup_dir: &str) -> String {
    backup_dir.replace('\\', "/").trim_end_matches('/').to_string()
}

/// Clears the single-flight latch on every exit path, panics included.
struct RunGuard {
    latch: Arc<AtomicBool>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.latch.store(false, Ordering::SeqCst);
    }
}

/// Runs backups one at a time and keeps the shared run state current.
///
/// Cheap to clone; clones share the same state and latch.
#[derive(Clone)]
pub struct BackupExecutor {
    router: Arc<EngineRouter>,
    settings_store: Arc<SettingsStore>,
    notifier: Arc<dyn Notifier>,
    profile: Arc<RwLock<ConnectionProfile>>,
    backup_settings: Arc<RwLock<BackupSettings>>,
    run_status: Arc<RwLock<RunStatus>>,
    is_connected: Arc<AtomicBool>,
    is_backing_up: Arc<AtomicBool>,
}

impl BackupExecutor {
    pub fn new(
        router: Arc<EngineRouter>,
        settings_store: Arc<SettingsStore>,
        notifier: Arc<dyn Notifier>,
        profile: Arc<RwLock<ConnectionProfile>>,
        backup_settings: Arc<RwLock<BackupSettings>>,
        run_status: Arc<RwLock<RunStatus>>,
        is_connected: Arc<AtomicBool>,
        is_backing_up: Arc<AtomicBool>,
    ) -> Self {
        Self {
            router,
            settings_store,
            notifier,
            profile,
            backup_settings,
            run_status,
            is_connected,
            is_backing_up,
        }
    }

    /// Run one backup now.
    ///
    /// Returns `Ok(Some(path))` with the archive path on success and
    /// `Ok(None)` when the run was skipped because another run is in
    /// flight or the server is not connected. A missing backup folder
    /// setting is an error, not a skip.
    pub async fn run(&self) -> Result<Option<String>, FinbackError> {
        if self.is_backing_up.load(Ordering::SeqCst) {
            tracing::debug!("Backup already in progress, nothing to do");
            return Ok(None);
        }
        if !self.is_connected.load(Ordering::SeqCst) {
            tracing::debug!("Database not connected, backup skipped");
            return Ok(None);
        }

        let settings = self.backup_settings.read().clone();
        if settings.path.trim().is_empty() {
            return Err(FinbackError::config("No backup folder configured"));
        }

        if self
            .is_backing_up
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("Another backup run won the race, nothing to do");
            return Ok(None);
        }
        let _guard = RunGuard { latch: self.is_backing_up.clone() };
        self.run_status.write().apply(&BackupProgress::new(0, "preparing", None));

        let run_id = Uuid::new_v4();
        let started_at = Local::now();
        let backup_dir = normalize_dir(&settings.path);
        let archive = format!("{}/{}", backup_dir, artifact_name(started_at));
        tracing::info!(run_id = %run_id, archive = %archive, "Backup run starting");

        // The relay must be listening before the engine can emit anything.
        let (tx, mut rx) = mpsc::unbounded_channel::<BackupProgress>();
        let relay_status = self.run_status.clone();
        let relay = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if event.percent > 100 {
                    tracing::warn!(
                        percent = event.percent,
                        "Ignoring out-of-range progress event"
                    );
                    continue;
                }
                tracing::debug!(percent = event.percent, status = %event.status, "Backup progress");
                relay_status.write().apply(&event);
            }
        });

        let sink = ProgressSink::new(tx);
        let request = {
            let profile = self.profile.read().clone();
            DumpRequest {
                host: profile.host,
                port: profile.port,
                username: profile.username,
                password: profile.password,
                database: profile.database,
                output_path: archive,
                engine: Some(settings.engine),
            }
        };

        let outcome = {
            let router = self.router.clone();
            let sink = sink.clone();
            let request = request.clone();
            tokio::task::spawn_blocking(move || {
                let engine = router.select(request.engine)?;
                tracing::info!(engine = engine.name(), database = %request.database, "Dump engine selected");
                engine.dump(&request, &sink)
            })
            .await
        };
        let outcome = match outcome {
            Ok(result) => result,
            Err(join_err) => Err(FinbackError::from(join_err)),
        };

        // Close the channel and let the relay drain what the engine sent.
        drop(sink);
        if let Err(e) = relay.await {
            tracing::warn!(error = %e, "Progress relay task failed");
        }

        match outcome {
            Ok(archive_path) => {
                self.run_status.write().apply(&BackupProgress::new(100, "complete", None));

                let timestamp = Local::now().to_rfc3339();
                self.run_status.write().last_backup_time = timestamp.clone();
                if let Err(e) = self.settings_store.set(keys::LAST_BACKUP_TIME, &timestamp) {
                    tracing::warn!(error = %e, "Failed to persist last backup time");
                }

                self.apply_retention(&backup_dir, settings.keep_days).await;
                self.send_note(Notification::new(
                    "Backup complete",
                    format!("Database backup saved to {archive_path}"),
                ));

                tracing::info!(run_id = %run_id, archive = %archive_path, "Backup run finished");
                Ok(Some(archive_path))
            }
            Err(e) => {
                let message = format!("Backup failed: {e}");
                let wrapped = FinbackError::engine_with_source(message.clone(), e);

                self.run_status.write().apply(&BackupProgress::new(0, "error", None));
                self.send_note(Notification::new("Backup failed", message));

                tracing::error!(run_id = %run_id, error = %wrapped, "Backup run failed");
                Err(wrapped)
            }
        }
    }

    /// Best-effort retention pass after a successful run.
    async fn apply_retention(&self, backup_dir: &str, keep_days: i32) {
        let dir = backup_dir.to_string();
        match tokio::task::spawn_blocking(move || retention::cleanup_old_backups(&dir, keep_days))
            .await
        {
            Ok(Ok(0)) => {}
            Ok(Ok(deleted)) => tracing::info!(deleted, "Expired backups removed"),
            Ok(Err(e)) => tracing::warn!(error = %e, "Retention cleanup failed"),
            Err(e) => tracing::warn!(error = %e, "Retention task failed"),
        }
    }

    /// Best-effort notification.
    fn send_note(&self, note: Notification) {
        if let Err(e) = self.notifier.notify(&note) {
            tracing::warn!(error = %e, "Failed to send notification");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
