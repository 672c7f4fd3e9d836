//! Backup engines and engine selection.
//!
//! An engine turns one [`DumpRequest`] into a zip archive on disk,
//! reporting progress along the way. The crate ships the mysqldump
//! engine; embedders can register an additional engine under the
//! `builtin` preference. Engines are blocking by contract, so callers
//! run them on a blocking thread.

use crate::error::FinbackError;
use crate::models::{BackupProgress, EngineKind};

use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::Command;
use std::sync::Arc;
use tokio::sync::mpsc;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Name of the SQL file inside every backup archive.
const ARCHIVE_SQL_ENTRY: &str = "mysqldump_backup.sql";

// ============================================================================
// Request and Progress Plumbing
// ============================================================================

/// Everything an engine needs for one dump run.
#[derive(Debug, Clone)]
pub struct DumpRequest {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,
    /// Destination path of the zip archive.
    pub output_path: String,
    /// Engine preference. `None` lets the router auto-select.
    pub engine: Option<EngineKind>,
}

/// Sends progress events into the run's channel.
///
/// Emitting never blocks and never fails the dump; events sent after the
/// receiver is gone are dropped.
#[derive(Clone)]
pub struct ProgressSink {
    tx: mpsc::UnboundedSender<BackupProgress>,
}

impl ProgressSink {
    pub fn new(tx: mpsc::UnboundedSender<BackupProgress>) -> Self {
        Self { tx }
    }

    pub fn emit(&self, percent: u8, status: &str, current_table: Option<&str>) {
        let event = BackupProgress::new(percent, status, current_table);
        if self.tx.send(event).is_err() {
            tracing::trace!(percent, status, "Progress receiver gone, event dropped");
        }
    }
}

/// A blocking dump implementation.
pub trait DumpEngine: Send + Sync {
    /// Engine name for logs and error messages.
    fn name(&self) -> &'static str;

    /// Whether this engine can run on this machine right now.
    fn is_available(&self) -> bool;

    /// Produce the archive at `request.output_path`, returning its path.
    fn dump(&self, request: &DumpRequest, progress: &ProgressSink)
        -> Result<String, FinbackError>;
}

// ============================================================================
// MysqldumpEngine
// ============================================================================

/// Engine that shells out to the `mysqldump` binary on PATH and packages
/// its output into a zip archive.
pub struct MysqldumpEngine;

impl MysqldumpEngine {
    fn build_command(request: &DumpRequest, result_file: &Path) -> Command {
        let mut cmd = Command::new("mysqldump");

        // CREATE_NO_WINDOW, keeps a console from flashing up
        #[cfg(target_os = "windows")]
        {
            use std::os::windows::process::CommandExt;
            cmd.creation_flags(0x0800_0000);
        }

        cmd.arg(format!("--host={}", request.host))
            .arg(format!("--port={}", request.port))
            .arg(format!("--user={}", request.username));

        if !request.password.is_empty() {
            cmd.arg(format!("--password={}", request.password));
        }

        cmd.arg("--add-drop-database")
            .arg("--add-drop-table")
            .arg("--triggers")
            .arg("--routines")
            .arg("--events")
            .arg("--single-transaction")
            .arg("--databases")
            .arg(&request.database)
            .arg("--result-file")
            .arg(result_file);

        cmd
    }

    /// Put the SQL dump into the destination zip.
    fn package_sql(sql_path: &Path, output_path: &str) -> Result<(), FinbackError> {
        let archive = fs::File::create(output_path).map_err(|e| {
            FinbackError::engine(format!("Failed to create archive '{output_path}': {e}"))
        })?;

        let mut zip = ZipWriter::new(archive);
        let options = SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated)
            .unix_permissions(0o755);

        zip.start_file(ARCHIVE_SQL_ENTRY, options)
            .map_err(|e| FinbackError::engine(format!("Failed to start archive entry: {e}")))?;

        let sql = fs::read(sql_path)
            .map_err(|e| FinbackError::engine(format!("Failed to read dump file: {e}")))?;
        zip.write_all(&sql)
            .map_err(|e| FinbackError::engine(format!("Failed to write archive: {e}")))?;

        zip.finish()
            .map_err(|e| FinbackError::engine(format!("Failed to finish archive: {e}")))?;
        Ok(())
    }
}

impl DumpEngine for MysqldumpEngine {
    fn name(&self) -> &'static str {
        "mysqldump"
    }

    fn is_available(&self) -> bool {
        #[cfg(target_os = "windows")]
        let result = {
            use std::os::windows::process::CommandExt;
            let mut cmd = Command::new("where");
            cmd.creation_flags(0x0800_0000);
            cmd.arg("mysqldump").output()
        };

        #[cfg(not(target_os = "windows"))]
        let result = Command::new("which").arg("mysqldump").output();

        match result {
            Ok(output) => output.status.success(),
            Err(_) => false,
        }
    }

    fn dump(
        &self,
        request: &DumpRequest,
        progress: &ProgressSink,
    ) -> Result<String, FinbackError> {
        progress.emit(5, "Preparing mysqldump backup", None);

        if let Some(parent) = Path::new(&request.output_path).parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| {
                    FinbackError::engine(format!(
                        "Failed to create backup folder '{}': {e}",
                        parent.display()
                    ))
                })?;
            }
        }

        let temp_dir = tempfile::tempdir()
            .map_err(|e| FinbackError::engine(format!("Failed to create temp directory: {e}")))?;
        let sql_path = temp_dir.path().join("full_backup.sql");

        progress.emit(10, "Starting mysqldump", None);
        let mut cmd = Self::build_command(request, &sql_path);

        progress.emit(20, "Exporting database", None);
        let output = cmd
            .output()
            .map_err(|e| FinbackError::engine(format!("Failed to run mysqldump: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FinbackError::engine(format!(
                "mysqldump exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        progress.emit(60, "Dump finished, creating archive", None);
        progress.emit(70, "Compressing dump", None);
        Self::package_sql(&sql_path, &request.output_path)?;
        progress.emit(90, "Archive compressed", None);

        progress.emit(100, "Backup complete", None);
        tracing::info!(archive = %request.output_path, "mysqldump backup written");
        Ok(request.output_path.clone())
    }
}

// ============================================================================
// EngineRouter
// ============================================================================

/// Picks the engine for a run based on the configured preference.
pub struct EngineRouter {
    mysqldump: Arc<dyn DumpEngine>,
    builtin: Option<Arc<dyn DumpEngine>>,
}

impl EngineRouter {
    pub fn new() -> Self {
        Self { mysqldump: Arc::new(MysqldumpEngine), builtin: None }
    }

    /// Install an embedder-provided engine behind the `builtin` preference.
    pub fn register_builtin(&mut self, engine: Arc<dyn DumpEngine>) {
        tracing::info!(engine = engine.name(), "Builtin backup engine registered");
        self.builtin = Some(engine);
    }

    /// Resolve a preference to a runnable engine.
    pub fn select(
        &self,
        preference: Option<EngineKind>,
    ) -> Result<Arc<dyn DumpEngine>, FinbackError> {
        match preference {
            Some(EngineKind::Mysqldump) => {
                if self.mysqldump.is_available() {
                    Ok(self.mysqldump.clone())
                } else {
                    Err(FinbackError::engine(
                        "mysqldump was requested but no mysqldump binary is on PATH",
                    ))
                }
            }
            Some(EngineKind::Builtin) => self.builtin.clone().ok_or_else(|| {
                FinbackError::engine("builtin engine was requested but none is registered")
            }),
            None => {
                if self.mysqldump.is_available() {
                    Ok(self.mysqldump.clone())
                } else if let Some(builtin) = &self.builtin {
                    Ok(builtin.clone())
                } else {
                    Err(FinbackError::engine(
                        "No backup engine available: mysqldump is not on PATH and no builtin engine is registered",
                    ))
                }
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn with_engines(
        mysqldump: Arc<dyn DumpEngine>,
        builtin: Option<Arc<dyn DumpEngine>>,
    ) -> Self {
        Self { mysqldump, builtin }
    }
}

impl Default for EngineRouter {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================
