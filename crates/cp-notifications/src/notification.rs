//! Notification value

use chrono::{DateTime, Utc};
use cp_core::traits::Id;
use cp_core::types::EntityKind;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    TaskSubmitted,
    TaskApproved,
    TaskRejected,
    CompanyAssigned,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TaskSubmitted => "task_submitted",
            Self::TaskApproved => "task_approved",
            Self::TaskRejected => "task_rejected",
            Self::CompanyAssigned => "company_assigned",
        }
    }
}

/// Who receives the notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum Recipient {
    /// Every user of a company
    Company(Id),
    /// A single user, by email
    User(String),
    /// Consultants and admins who review submissions
    Reviewers,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub recipient: Recipient,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub entity_type: EntityKind,
    pub entity_id: Id,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        recipient: Recipient,
        notification_type: NotificationType,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            recipient,
            title: title.into(),
            message: message.into(),
            notification_type,
            entity_type: EntityKind::Task,
            entity_id: 0,
            metadata: None,
            created_at: Utc::now(),
        }
    }

    pub fn about(mut self, entity_type: EntityKind, entity_id: Id) -> Self {
        self.entity_type = entity_type;
        self.entity_id = entity_id;
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}
