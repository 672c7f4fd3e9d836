//! Backup settings and system preference models.

use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Dotted keys under which settings persist.
pub mod keys {
    /// Obfuscated connection URL carrying the whole profile.
    pub const CONNECTION_URL: &str = "database.connectionUrl";
    /// Backup destination directory.
    pub const BACKUP_PATH: &str = "backup.path";
    /// Whether automatic backups are enabled.
    pub const BACKUP_AUTO: &str = "backup.auto";
    /// Automatic backup frequency.
    pub const BACKUP_FREQUENCY: &str = "backup.frequency";
    /// Retention window in days.
    pub const BACKUP_KEEP_DAYS: &str = "backup.keepDays";
    /// Preferred dump engine.
    pub const BACKUP_ENGINE: &str = "backup.engine";
    /// Dark mode preference.
    pub const DARK_MODE: &str = "system.darkMode";
    /// Minimize-to-tray preference.
    pub const MINIMIZE_TO_TRAY: &str = "system.minimizeToTray";
    /// Timestamp of the last successful backup.
    pub const LAST_BACKUP_TIME: &str = "lastBackupTime";
}

/// How often automatic backups run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupFrequency {
    /// Once every 24 hours (default)
    #[default]
    Daily,
    /// Once every 7 days
    Weekly,
    /// Once every 30 days
    Monthly,
}

impl BackupFrequency {
    /// Convert to string representation for storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }

    /// Parse from string representation. Unknown values fall back to daily.
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "weekly" => Self::Weekly,
            "monthly" => Self::Monthly,
            _ => Self::Daily,
        }
    }

    /// Minimum elapsed time before the next automatic backup is due.
    pub fn threshold(&self) -> Duration {
        match self {
            Self::Daily => Duration::hours(24),
            Self::Weekly => Duration::hours(7 * 24),
            Self::Monthly => Duration::hours(30 * 24),
        }
    }
}

/// Which dump engine a backup should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// The system `mysqldump` binary (default)
    #[default]
    Mysqldump,
    /// An engine registered by the embedding application
    Builtin,
}

impl EngineKind {
    /// Convert to string representation for storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mysqldump => "mysqldump",
            Self::Builtin => "builtin",
        }
    }

    /// Parse from string representation. Unknown values fall back to mysqldump.
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "builtin" => Self::Builtin,
            _ => Self::Mysqldump,
        }
    }
}

/// User-configured backup behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupSettings {
    /// Destination directory as entered by the user; may contain backslashes.
    pub path: String,
    /// Whether the scheduler triggers backups automatically.
    pub auto: bool,
    /// How often automatic backups run.
    pub frequency: BackupFrequency,
    /// Artifacts older than this many days are deleted after a successful
    /// run; zero or negative keeps everything.
    pub keep_days: i32,
    /// Preferred dump engine.
    pub engine: EngineKind,
}

impl Default for BackupSettings {
    fn default() -> Self {
        Self {
            path: String::new(),
            auto: false,
            frequency: BackupFrequency::Daily,
            keep_days: 0,
            engine: EngineKind::Mysqldump,
        }
    }
}

/// Desktop-level preferences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemPreferences {
    /// Dark UI theme.
    pub dark_mode: bool,
    /// Launch at login. Mirrors the OS login item registration and is never
    /// persisted in the settings store.
    pub auto_start: bool,
    /// Keep running in the tray when the window closes.
    pub minimize_to_tray: bool,
}

impl Default for SystemPreferences {
    fn default() -> Self {
        Self { dark_mode: false, auto_start: false, minimize_to_tray: true }
    }
}
