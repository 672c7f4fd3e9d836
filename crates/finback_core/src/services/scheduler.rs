//! Automatic backup scheduling.
//!
//! A coarse ticker (every ten minutes, plus once at startup) asks a simple
//! question: has enough time passed since the last successful backup for
//! the configured frequency? The answer only matters when auto backup is
//! on, the server is reachable, nothing is currently backing up, and a
//! destination folder is configured. Runner failures are logged and the
//! schedule keeps going.

use crate::error::FinbackError;
use crate::models::{BackupFrequency, BackupSettings, RunStatus};
use crate::services::ticker::{spawn_ticker, TickerHandle};

use chrono::{DateTime, Local};
use parking_lot::{Mutex, RwLock};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// How often the scheduler re-evaluates whether a backup is due.
pub const SCHEDULER_PERIOD: Duration = Duration::from_secs(600);

/// Whether a backup is due, given when the last one finished.
///
/// An empty or unreadable timestamp counts as due: losing the marker must
/// never silently disable backups.
pub fn backup_due(last_backup_time: &str, frequency: BackupFrequency, now: DateTime<Local>) -> bool {
    if last_backup_time.trim().is_empty() {
        tracing::info!("No previous backup recorded, backup is due");
        return true;
    }

    match DateTime::parse_from_rfc3339(last_backup_time) {
        Ok(last) => {
            let elapsed = now.signed_duration_since(last.with_timezone(&Local));
            let due = elapsed >= frequency.threshold();
            tracing::debug!(
                frequency = frequency.as_str(),
                elapsed_hours = elapsed.num_hours(),
                due,
                "Evaluated backup schedule"
            );
            due
        }
        Err(e) => {
            tracing::warn!(
                last_backup_time,
                error = %e,
                "Unreadable last backup timestamp, treating backup as due"
            );
            true
        }
    }
}

/// Periodic auto-backup driver.
///
/// Cheap to clone; clones share the same flags and ticker.
#[derive(Clone)]
pub struct BackupScheduler {
    backup_settings: Arc<RwLock<BackupSettings>>,
    run_status: Arc<RwLock<RunStatus>>,
    is_connected: Arc<AtomicBool>,
    is_backing_up: Arc<AtomicBool>,
    ticker: Arc<Mutex<Option<TickerHandle>>>,
}

impl BackupScheduler {
    pub fn new(
        backup_settings: Arc<RwLock<BackupSettings>>,
        run_status: Arc<RwLock<RunStatus>>,
        is_connected: Arc<AtomicBool>,
        is_backing_up: Arc<AtomicBool>,
    ) -> Self {
        Self {
            backup_settings,
            run_status,
            is_connected,
            is_backing_up,
            ticker: Arc::new(Mutex::new(None)),
        }
    }

    /// Start scheduling, running `run_backup` whenever a backup comes due.
    ///
    /// The first evaluation happens immediately, so a machine that was off
    /// past its backup window catches up at startup. A scheduler that is
    /// already running is restarted.
    pub fn start<F, Fut>(&self, run_backup: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Option<String>, FinbackError>> + Send,
    {
        self.start_with_period(SCHEDULER_PERIOD, run_backup);
    }

    fn start_with_period<F, Fut>(&self, period: Duration, mut run_backup: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Option<String>, FinbackError>> + Send,
    {
        let mut guard = self.ticker.lock();
        if let Some(old) = guard.take() {
            old.stop();
        }

        let scheduler = self.clone();
        *guard = Some(spawn_ticker("backup-scheduler", period, move || {
            // Gate at tick time; the run itself happens in the returned
            // future so a slow backup blocks later ticks instead of
            // stacking.
            let due_run = scheduler.should_back_up(Local::now()).then(&mut run_backup);
            async move {
                let Some(run) = due_run else { return };
                match run.await {
                    Ok(Some(archive_path)) => {
                        tracing::info!(archive = %archive_path, "Scheduled backup completed");
                    }
                    Ok(None) => {
                        tracing::debug!("Scheduled backup was skipped");
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Scheduled backup failed");
                    }
                }
            }
        }));
        tracing::info!("Backup scheduler started");
    }

    /// Stop scheduling. A backup that is already running is not interrupted.
    pub fn stop(&self) {
        if let Some(handle) = self.ticker.lock().take() {
            handle.stop();
            tracing::info!("Backup scheduler stopped");
        }
    }

    /// All four gates plus the due-time policy.
    fn should_back_up(&self, now: DateTime<Local>) -> bool {
        let settings = self.backup_settings.read().clone();

        if !settings.auto {
            tracing::trace!("Auto backup is disabled");
            return false;
        }
        if !self.is_connected.load(Ordering::SeqCst) {
            tracing::debug!("Database not connected, skipping scheduled backup");
            return false;
        }
        if self.is_backing_up.load(Ordering::SeqCst) {
            tracing::debug!("Backup already in progress, skipping scheduled backup");
            return false;
        }
        if settings.path.trim().is_empty() {
            tracing::debug!("No backup folder configured, skipping scheduled backup");
            return false;
        }

        let last = self.run_status.read().last_backup_time.clone();
        backup_due(&last, settings.frequency, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[test]
    fn test_due_when_never_backed_up() {
        assert!(backup_due("", BackupFrequency::Daily, Local::now()));
        assert!(backup_due("   ", BackupFrequency::Monthly, Local::now()));
    }

    #[test]
    fn test_due_when_timestamp_unreadable() {
        assert!(backup_due("last tuesday", BackupFrequency::Daily, Local::now()));
        assert!(backup_due("2024-13-45", BackupFrequency::Weekly, Local::now()));
    }

    #[test]
    fn test_daily_window() {
        let now = Local::now();
        let recent = (now - chrono::Duration::hours(23)).to_rfc3339();
        let stale = (now - chrono::Duration::hours(25)).to_rfc3339();

        assert!(!backup_due(&recent, BackupFrequency::Daily, now));
        assert!(backup_due(&stale, BackupFrequency::Daily, now));
    }

    #[test]
    fn test_weekly_window() {
        let now = Local::now();
        let recent = (now - chrono::Duration::hours(167)).to_rfc3339();
        let stale = (now - chrono::Duration::hours(169)).to_rfc3339();

        assert!(!backup_due(&recent, BackupFrequency::Weekly, now));
        assert!(backup_due(&stale, BackupFrequency::Weekly, now));
    }

    #[test]
    fn test_monthly_window() {
        let now = Local::now();
        let recent = (now - chrono::Duration::hours(719)).to_rfc3339();
        let stale = (now - chrono::Duration::hours(721)).to_rfc3339();

        assert!(!backup_due(&recent, BackupFrequency::Monthly, now));
        assert!(backup_due(&stale, BackupFrequency::Monthly, now));
    }

    #[test]
    fn test_future_timestamp_is_not_due() {
        let now = Local::now();
        let future = (now + chrono::Duration::hours(2)).to_rfc3339();
        assert!(!backup_due(&future, BackupFrequency::Daily, now));
    }

    fn ready_scheduler() -> BackupScheduler {
        let settings = BackupSettings {
            path: "/backups".to_string(),
            auto: true,
            ..Default::default()
        };
        BackupScheduler::new(
            Arc::new(RwLock::new(settings)),
            Arc::new(RwLock::new(RunStatus::default())),
            Arc::new(AtomicBool::new(true)),
            Arc::new(AtomicBool::new(false)),
        )
    }

    #[test]
    fn test_gates_all_pass() {
        let scheduler = ready_scheduler();
        assert!(scheduler.should_back_up(Local::now()));
    }

    #[test]
    fn test_gate_auto_disabled() {
        let scheduler = ready_scheduler();
        scheduler.backup_settings.write().auto = false;
        assert!(!scheduler.should_back_up(Local::now()));
    }

    #[test]
    fn test_gate_not_connected() {
        let scheduler = ready_scheduler();
        scheduler.is_connected.store(false, Ordering::SeqCst);
        assert!(!scheduler.should_back_up(Local::now()));
    }

    #[test]
    fn test_gate_backup_in_progress() {
        let scheduler = ready_scheduler();
        scheduler.is_backing_up.store(true, Ordering::SeqCst);
        assert!(!scheduler.should_back_up(Local::now()));
    }

    #[test]
    fn test_gate_no_backup_path() {
        let scheduler = ready_scheduler();
        scheduler.backup_settings.write().path = "  ".to_string();
        assert!(!scheduler.should_back_up(Local::now()));
    }

    #[test]
    fn test_fresh_backup_stops_rescheduling() {
        let scheduler = ready_scheduler();
        scheduler.run_status.write().last_backup_time = Local::now().to_rfc3339();
        assert!(!scheduler.should_back_up(Local::now()));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_runner_invoked_when_due_and_errors_do_not_stop_the_loop() {
        let scheduler = ready_scheduler();
        let runs = Arc::new(AtomicU32::new(0));
        let run_counter = runs.clone();

        scheduler.start_with_period(Duration::from_millis(10), move || {
            let run_counter = run_counter.clone();
            async move {
                let n = run_counter.fetch_add(1, Ordering::SeqCst);
                if n % 2 == 0 {
                    Err(FinbackError::config("induced failure"))
                } else {
                    Ok(Some("/backups/BACKUP_test.zip".to_string()))
                }
            }
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        scheduler.stop();
        assert!(runs.load(Ordering::SeqCst) >= 2, "runner should keep firing after errors");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_runner_not_invoked_when_gated() {
        let scheduler = ready_scheduler();
        scheduler.backup_settings.write().auto = false;
        let runs = Arc::new(AtomicU32::new(0));
        let run_counter = runs.clone();

        scheduler.start_with_period(Duration::from_millis(10), move || {
            let run_counter = run_counter.clone();
            async move {
                run_counter.fetch_add(1, Ordering::SeqCst);
                Ok(None)
            }
        });

        tokio::time::sleep(Duration::from_millis(60)).await;
        scheduler.stop();
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }
}
