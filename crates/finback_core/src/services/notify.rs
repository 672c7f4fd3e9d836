//! Backup outcome notifications.
//!
//! The executor announces finished and failed runs through this seam.
//! The shipped implementation writes to the log; a desktop shell can
//! plug in a toast or system-notification implementation instead.

use crate::error::FinbackError;

/// A user-facing notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub body: String,
    /// Icon name or path, when the renderer supports one.
    pub icon: Option<String>,
}

impl Notification {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self { title: title.into(), body: body.into(), icon: None }
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notification: &Notification) -> Result<(), FinbackError>;
}

/// Notifier that writes notifications to the log.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: &Notification) -> Result<(), FinbackError> {
        tracing::info!(
            title = %notification.title,
            body = %notification.body,
            "Notification"
        );
        Ok(())
    }
}
