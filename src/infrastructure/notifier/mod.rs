mod channel_notifier;
mod log_notifier;

pub use channel_notifier::ChannelNotifier;
pub use log_notifier::LogNotifier;

use crate::domain::{Notification, NotifierPtr};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;

/// Creates a notifier that only writes to the tracing log.
///
/// Suitable for headless use where nobody is watching for toasts.
pub fn create_log_notifier() -> NotifierPtr {
    // ---
    Arc::new(LogNotifier)
}

/// Creates a notifier that forwards every notification to the returned receiver.
///
/// This is how a view layer consumes notifications.
pub fn create_channel_notifier() -> (NotifierPtr, UnboundedReceiver<Notification>) {
    // ---
    let (notifier, rx) = ChannelNotifier::new();
    (Arc::new(notifier), rx)
}
