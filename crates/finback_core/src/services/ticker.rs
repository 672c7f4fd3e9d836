//! Periodic background task driver.
//!
//! Both the connection monitor and the backup scheduler are "run this every
//! N, stop on demand" loops. This module owns that shape once: a tokio
//! interval that skips missed ticks, raced against a cancellation token.
//! Cancellation only interrupts the wait between runs; a task body that is
//! already executing always runs to completion.

use std::future::Future;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Handle to a running periodic task.
///
/// Dropping the handle does not stop the task; call [`TickerHandle::stop`].
pub struct TickerHandle {
    name: &'static str,
    cancel_token: CancellationToken,
}

impl TickerHandle {
    /// Signal the loop to exit.
    ///
    /// Returns immediately. A task body that is mid-run finishes normally;
    /// no further runs start afterwards.
    pub fn stop(&self) {
        tracing::debug!(ticker = self.name, "Stopping ticker");
        self.cancel_token.cancel();
    }

    /// Whether the loop has been told to exit.
    pub fn is_stopped(&self) -> bool {
        self.cancel_token.is_cancelled()
    }
}

/// Spawn a loop that runs `task` immediately and then once per `period`.
///
/// Ticks that elapse while a run is still in progress are skipped rather
/// than bursted, so a slow run never causes back-to-back executions.
pub fn spawn_ticker<F, Fut>(name: &'static str, period: Duration, mut task: F) -> TickerHandle
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send,
{
    let cancel_token = CancellationToken::new();
    let loop_token = cancel_token.clone();

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::debug!(ticker = name, period_secs = period.as_secs(), "Ticker started");

        loop {
            tokio::select! {
                _ = loop_token.cancelled() => break,
                _ = interval.tick() => {}
            }
            // Deliberately outside the select: stop() must not abort a run
            // that has already started.
            task().await;
        }

        tracing::debug!(ticker = name, "Ticker exited");
    });

    TickerHandle { name, cancel_token }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_first_run_is_immediate() {
        let count = Arc::new(AtomicU32::new(0));
        let task_count = count.clone();

        let handle = spawn_ticker("test", Duration::from_secs(60), move || {
            let task_count = task_count.clone();
            async move {
                task_count.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        handle.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_once_per_period() {
        let count = Arc::new(AtomicU32::new(0));
        let task_count = count.clone();

        let handle = spawn_ticker("test", Duration::from_secs(1), move || {
            let task_count = task_count.clone();
            async move {
                task_count.fetch_add(1, Ordering::SeqCst);
            }
        });

        // Immediate run plus one per elapsed second
        tokio::time::sleep(Duration::from_millis(3_010)).await;
        assert_eq!(count.load(Ordering::SeqCst), 4);
        handle.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_prevents_further_runs() {
        let count = Arc::new(AtomicU32::new(0));
        let task_count = count.clone();

        let handle = spawn_ticker("test", Duration::from_secs(1), move || {
            let task_count = task_count.clone();
            async move {
                task_count.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.stop();
        assert!(handle.is_stopped());

        let before = count.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(count.load(Ordering::SeqCst), before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_lets_in_flight_run_finish() {
        let started = Arc::new(AtomicU32::new(0));
        let finished = Arc::new(AtomicU32::new(0));
        let task_started = started.clone();
        let task_finished = finished.clone();

        let handle = spawn_ticker("test", Duration::from_secs(60), move || {
            let task_started = task_started.clone();
            let task_finished = task_finished.clone();
            async move {
                task_started.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(5)).await;
                task_finished.fetch_add(1, Ordering::SeqCst);
            }
        });

        // Let the immediate run start, then stop mid-run
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(started.load(Ordering::SeqCst), 1);
        assert_eq!(finished.load(Ordering::SeqCst), 0);
        handle.stop();

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 1);
        assert_eq!(started.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_runs_skip_missed_ticks() {
        let count = Arc::new(AtomicU32::new(0));
        let task_count = count.clone();

        let handle = spawn_ticker("test", Duration::from_secs(1), move || {
            let task_count = task_count.clone();
            async move {
                task_count.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(2_500)).await;
            }
        });

        // Runs start at t=0, t=3, t=6: the ticks at 1, 2, 4, 5 are skipped,
        // not queued up.
        tokio::time::sleep(Duration::from_millis(6_100)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
        handle.stop();
    }
}
