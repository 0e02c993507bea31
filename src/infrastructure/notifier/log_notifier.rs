use crate::domain::{Notification, NotificationLevel, Notifier};

/// Notifier that writes notifications to the log.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: Notification) {
        // ---
        match notification.level {
            NotificationLevel::Success => tracing::info!("{}", notification.message),
            NotificationLevel::Error => tracing::warn!("{}", notification.message),
        }
    }
}
