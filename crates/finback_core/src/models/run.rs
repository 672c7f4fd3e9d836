//! Backup run progress models.

use serde::{Deserialize, Serialize};

/// Name of the event stream a run's progress is published on.
pub const PROGRESS_EVENT: &str = "backup-progress";

/// A single progress event emitted by a dump engine.
///
/// Events are forwarded to observers exactly as the engine produced them;
/// consumers must tolerate repeated or non-monotonic percentages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupProgress {
    /// Completion percentage in 0..=100.
    pub percent: u8,
    /// Short human-readable phase description.
    pub status: String,
    /// Table currently being dumped, when the engine knows it.
    pub current_table: Option<String>,
}

impl BackupProgress {
    /// Create a progress event.
    pub fn new(percent: u8, status: impl Into<String>, current_table: Option<&str>) -> Self {
        Self { percent, status: status.into(), current_table: current_table.map(String::from) }
    }
}

/// Snapshot of the current (or most recent) backup run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunStatus {
    /// Completion percentage of the run in progress, 100 after success,
    /// reset to 0 after a failure.
    pub progress: u8,
    /// Last reported phase description.
    pub status: String,
    /// Table currently being dumped, if any.
    pub current_table: Option<String>,
    /// RFC 3339 timestamp of the last successful backup; empty until the
    /// first success.
    pub last_backup_time: String,
}

impl Default for RunStatus {
    fn default() -> Self {
        Self {
            progress: 0,
            status: "idle".to_string(),
            current_table: None,
            last_backup_time: String::new(),
        }
    }
}

impl RunStatus {
    /// Apply one progress event to the snapshot.
    pub fn apply(&mut self, event: &BackupProgress) {
        self.progress = event.percent;
        self.status = event.status.clone();
        self.current_table = event.current_table.clone();
    }
}
