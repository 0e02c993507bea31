use crate::domain::{Notification, Notifier};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Notifier that hands notifications to a consumer over an unbounded channel.
pub struct ChannelNotifier {
    // ---
    tx: UnboundedSender<Notification>,
}

impl ChannelNotifier {
    // ---
    pub fn new() -> (Self, UnboundedReceiver<Notification>) {
        // ---
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, notification: Notification) {
        // ---
        tracing::debug!("Notify {}", notification);
        if self.tx.send(notification).is_err() {
            tracing::debug!("Notification receiver dropped");
        }
    }
}
