//! Data models for the Finback backup agent.
//!
//! This module contains all core data structures:
//! - `profile` - ConnectionProfile and connection URL handling
//! - `settings` - BackupSettings, BackupFrequency, SystemPreferences
//! - `run` - BackupProgress events and run status

pub mod profile;
pub mod run;
pub mod settings;

pub use profile::ConnectionProfile;
pub use run::{BackupProgress, RunStatus, PROGRESS_EVENT};
pub use settings::{keys, BackupFrequency, BackupSettings, EngineKind, SystemPreferences};
