//! Notifier Port - Fire-and-forget UI side effects
//!
//! The client never renders anything. It emits events that a UI
//! collaborator turns into toasts, modal changes and page titles.

use serde::Serialize;

/// Event published to the UI collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum UiEvent {
  /// Success toast.
  ToastSuccess(String),
  /// Error toast.
  ToastError(String),
  /// Dismiss the open modal.
  HideModal,
  /// Replace the page title.
  PageTitle(String),
}

/// Trait for UI notification sinks.
pub trait Notifier: Send + Sync + 'static {
  /// Show a success toast.
  fn toast_success(&self, message: &str);

  /// Show an error toast.
  fn toast_error(&self, message: &str);

  /// Dismiss the open modal.
  fn hide_modal(&self);

  /// Update the page title.
  fn set_page_title(&self, title: &str);
}
