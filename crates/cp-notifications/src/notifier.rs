//! Delivery contract and built-in notifiers

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::notification::{Notification, Recipient};

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Notifications are disabled")]
    Disabled,
    #[error("Delivery failed: {0}")]
    Delivery(String),
}

pub type NotifyResult<T> = Result<T, NotifyError>;

/// Fire-and-forget delivery. Callers log failures and carry on.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: Notification) -> NotifyResult<()>;
}

/// Writes notifications to the trace log
pub struct LogNotifier {
    enabled: bool,
}

impl Default for LogNotifier {
    fn default() -> Self {
        Self::new(true)
    }
}

impl LogNotifier {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: Notification) -> NotifyResult<()> {
        if !self.enabled {
            return Err(NotifyError::Disabled);
        }
        tracing::info!(
            id = %notification.id,
            recipient = ?notification.recipient,
            kind = notification.notification_type.as_str(),
            entity_type = %notification.entity_type,
            entity_id = notification.entity_id,
            "{}",
            notification.title
        );
        Ok(())
    }
}

/// Records notifications in memory
#[derive(Default)]
pub struct MemoryNotifier {
    sent: RwLock<Vec<Notification>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<Notification> {
        self.sent.read().await.clone()
    }

    pub async fn sent_to(&self, recipient: &Recipient) -> Vec<Notification> {
        self.sent
            .read()
            .await
            .iter()
            .filter(|n| &n.recipient == recipient)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Notifier for MemoryNotifier {
    async fn notify(&self, notification: Notification) -> NotifyResult<()> {
        self.sent.write().await.push(notification);
        Ok(())
    }
}
