//! Backend services for the Finback backup agent.
//!
//! This module contains all service layer abstractions:
//! - `vault` - Reversible obfuscation for stored credentials
//! - `settings` - Typed settings persistence over SQLite or a JSON file
//! - `connectivity` - MySQL reachability and schema probing
//! - `monitor` - Periodic connection watching
//! - `scheduler` - Automatic backup scheduling
//! - `engine` - Dump engines and engine selection
//! - `executor` - Single-flight backup orchestration
//! - `retention` - Expired archive cleanup
//! - `ticker` - Shared periodic task driver
//! - `autostart` - Start-at-login registration
//! - `notify` - Backup outcome notifications

pub mod autostart;
pub mod connectivity;
pub mod engine;
pub mod executor;
pub mod monitor;
pub mod notify;
pub mod retention;
pub mod scheduler;
pub mod settings;
pub mod ticker;
pub mod vault;

pub use connectivity::{ConnectivityProbe, MysqlProbe, ProbeReport};
pub use engine::{DumpEngine, DumpRequest, EngineRouter, MysqldumpEngine, ProgressSink};
pub use executor::BackupExecutor;
pub use monitor::ConnectionMonitor;
pub use notify::{LogNotifier, Notification, Notifier};
pub use scheduler::BackupScheduler;
pub use settings::{FileBackend, SettingsBackend, SettingsStore, SqliteBackend};
pub use ticker::TickerHandle;
