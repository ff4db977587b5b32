//! # cp-notifications
//!
//! Notification collaborator used by the completion workflow. Delivery is
//! fire-and-forget: callers never fail because a notification failed.

pub mod notification;
pub mod notifier;

pub use notification::{Notification, NotificationType, Recipient};
pub use notifier::{LogNotifier, MemoryNotifier, Notifier, NotifyError, NotifyResult};
