//! UI Adapters - Notification Delivery

pub mod notifier;

pub use notifier::BroadcastNotifier;
