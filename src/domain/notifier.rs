use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Success,
    Error,
}

/// A transient, user-facing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    // ---
    pub level: NotificationLevel,
    pub message: String,
}

impl Notification {
    // ---
    pub fn success(message: impl Into<String>) -> Self {
        // ---
        Self {
            level: NotificationLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        // ---
        Self {
            level: NotificationLevel::Error,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.level == NotificationLevel::Error
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // ---
        let level = match self.level {
            NotificationLevel::Success => "success",
            NotificationLevel::Error => "error",
        };
        write!(f, "[{level}] {}", self.message)
    }
}

/// Sink for user-visible notifications.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Type alias for any backend that implements Notifier.
pub type NotifierPtr = Arc<dyn Notifier>;
