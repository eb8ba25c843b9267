//! Broadcast Notifier - UI Event Fan-out
//!
//! Publishes `UiEvent`s on a tokio broadcast channel for any number of
//! UI collaborators, and logs each one. Sending never blocks and never
//! fails the caller; events are dropped when nobody listens.

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::ports::notifier::{Notifier, UiEvent};

/// Notifier backed by a broadcast channel.
///
/// A front end attaches by calling `subscribe` on this instance or any
/// clone of it; clones share one channel. Events published before the
/// first subscription are not replayed.
#[derive(Debug, Clone)]
pub struct BroadcastNotifier {
    /// Broadcast sender for UI events.
    tx: broadcast::Sender<UiEvent>,
}

impl BroadcastNotifier {
    /// Create a notifier buffering up to `capacity` events per receiver.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Get a receiver for UI events.
    pub fn subscribe(&self) -> broadcast::Receiver<UiEvent> {
        self.tx.subscribe()
    }

    fn publish(&self, event: UiEvent) {
        // Ignore if no receivers
        let _ = self.tx.send(event);
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(256)
    }
}

impl Notifier for BroadcastNotifier {
    fn toast_success(&self, message: &str) {
        info!(message, "Toast");
        self.publish(UiEvent::ToastSuccess(message.to_string()));
    }

    fn toast_error(&self, message: &str) {
        warn!(message, "Error toast");
        self.publish(UiEvent::ToastError(message.to_string()));
    }

    fn hide_modal(&self) {
        self.publish(UiEvent::HideModal);
    }

    fn set_page_title(&self, title: &str) {
        debug!(title, "Page title");
        self.publish(UiEvent::PageTitle(title.to_string()));
    }
}
