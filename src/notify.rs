//! User-facing notifications emitted by query and mutation services

use std::sync::{Mutex, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);

    fn success(&self, message: &str) {
        self.notify(Notification {
            level: NotificationLevel::Success,
            message: message.to_string(),
        });
    }

    fn error(&self, message: &str) {
        self.notify(Notification {
            level: NotificationLevel::Error,
            message: message.to_string(),
        });
    }
}

/// On error, log the cause and show one "Failed to …" notification.
/// The result is passed through unchanged.
pub fn report_failure<T>(
    notifier: &dyn Notifier,
    failure: &str,
    result: crate::error::Result<T>,
) -> crate::error::Result<T> {
    if let Err(ref e) = result {
        tracing::error!("{}: {}", failure, e);
        notifier.error(failure);
    }
    result
}

/// Routes notifications into the log
#[derive(Debug, Default, Clone)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) {
        match notification.level {
            NotificationLevel::Success => tracing::info!("{}", notification.message),
            NotificationLevel::Error => tracing::error!("{}", notification.message),
        }
    }
}

/// Keeps every notification in memory
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    seen: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn messages(&self, level: NotificationLevel) -> Vec<String> {
        self.notifications()
            .into_iter()
            .filter(|n| n.level == level)
            .map(|n| n.message)
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notification);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_notifier_filters_by_level() {
        let notifier = RecordingNotifier::new();
        notifier.success("Draft updated");
        notifier.error("Failed to send email");
        notifier.success("Email sent successfully");

        assert_eq!(notifier.notifications().len(), 3);
        assert_eq!(
            notifier.messages(NotificationLevel::Error),
            vec!["Failed to send email".to_string()]
        );
        assert_eq!(notifier.messages(NotificationLevel::Success).len(), 2);
    }

    #[test]
    fn test_report_failure_only_notifies_on_error() {
        let notifier = RecordingNotifier::new();
        let ok: crate::error::Result<u32> = Ok(1);
        assert_eq!(report_failure(&notifier, "Failed to sync emails", ok).unwrap(), 1);
        assert!(notifier.notifications().is_empty());

        let err: crate::error::Result<u32> =
            Err(crate::error::ReplyDeskError::NetworkError("offline".to_string()));
        assert!(report_failure(&notifier, "Failed to sync emails", err).is_err());
        assert_eq!(
            notifier.messages(NotificationLevel::Error),
            vec!["Failed to sync emails".to_string()]
        );
    }
}
