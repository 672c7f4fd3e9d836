//! Command implementations for the Finback binary.

use std::path::Path;
use std::sync::Arc;

use finback_core::error::FinbackError;
use finback_core::services::{EngineRouter, LogNotifier};
use finback_core::state::FinbackState;

/// Long-running agent loop.
///
/// Polls connectivity in the background and runs backups on the stored
/// schedule until the process receives ctrl-c.
pub async fn run(data_dir: &Path) -> Result<(), FinbackError> {
    let state = FinbackState::open(data_dir)?;
    state.load_settings();

    let monitor = state.monitor();
    let scheduler = state.scheduler();
    let executor = state.executor(Arc::new(EngineRouter::new()), Arc::new(LogNotifier));

    // The schedule ticks immediately on start, so settle the connected
    // flag first or the opening tick always skips.
    monitor.check_now().await;
    monitor.start();
    scheduler.start(move || {
        let executor = executor.clone();
        async move { executor.run().await }
    });
    tracing::info!("Agent running, press ctrl-c to stop");

    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutting down");
    scheduler.stop();
    monitor.stop();
    Ok(())
}

/// One manual backup pass, independent of the schedule.
pub async fn backup(data_dir: &Path) -> Result<(), FinbackError> {
    let state = FinbackState::open(data_dir)?;
    state.load_settings();

    let report = state.test_connection().await;
    if !report.is_connected() {
        let message = report.error_message.unwrap_or_else(|| {
            "The configured database was not found on the server".to_string()
        });
        return Err(FinbackError::connectivity(message));
    }

    let executor = state.executor(Arc::new(EngineRouter::new()), Arc::new(LogNotifier));
    match executor.run().await? {
        Some(path) => println!("Backup written to {path}"),
        None => println!("Backup skipped: another backup is already running"),
    }
    Ok(())
}

/// Connection test with a human-readable report.
pub async fn check(data_dir: &Path) -> Result<(), FinbackError> {
    let state = FinbackState::open(data_dir)?;
    state.load_settings();

    let profile = state.profile.read().clone();
    println!(
        "Testing {}@{}:{}/{} ...",
        profile.username, profile.host, profile.port, profile.database
    );

    let report = state.test_connection().await;
    if report.is_connected() {
        println!("Connection OK, database \"{}\" exists", profile.database);
        return Ok(());
    }

    if report.success {
        println!("Server reachable, but database \"{}\" was not found", profile.database);
    } else if let Some(message) = &report.error_message {
        println!("{message}");
    }
    Err(FinbackError::connectivity("Connection check failed"))
}
