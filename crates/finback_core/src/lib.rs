//! Core services for the Finback MySQL backup agent.
//!
//! This crate provides the backend service layer for Finback:
//!
//! - **error**: Error handling with MySQL-specific details
//! - **models**: Data structures for the connection profile, settings, and runs
//! - **services**: Vault, settings store, probing, scheduling, backup execution
//! - **state**: Agent state management and command methods
//! - **logging**: Structured logging setup

pub mod error;
pub mod logging;
pub mod models;
pub mod services;
pub mod state;

pub use error::FinbackError;
pub use models::{
    keys, BackupFrequency, BackupProgress, BackupSettings, ConnectionProfile, EngineKind,
    RunStatus, SystemPreferences, PROGRESS_EVENT,
};
pub use services::{
    BackupExecutor, BackupScheduler, ConnectionMonitor, ConnectivityProbe, DumpEngine,
    DumpRequest, EngineRouter, LogNotifier, MysqlProbe, MysqldumpEngine, Notification, Notifier,
    ProbeReport, ProgressSink, SettingsStore,
};
pub use state::FinbackState;
