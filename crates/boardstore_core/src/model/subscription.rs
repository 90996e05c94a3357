//! Block subscriptions and pending notification hints.
//!
//! # Invariants
//! - One subscription per `(block_id, subscriber_id)`; deletion is soft.
//! - One notification hint per block; a hint is consumed at most once.

use super::block::BlockType;
use super::{require_non_empty, ValidationError};
use serde::{Deserialize, Serialize};

/// Kind of entity watching a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriberType {
    User,
    Channel,
}

impl SubscriberType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Channel => "channel",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(Self::User),
            "channel" => Some(Self::Channel),
            _ => None,
        }
    }
}

/// Record that a subscriber watches a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub block_type: BlockType,
    pub block_id: String,
    pub subscriber_type: SubscriberType,
    pub subscriber_id: String,
    #[serde(default)]
    pub notified_at: i64,
    #[serde(default)]
    pub create_at: i64,
    #[serde(default)]
    pub delete_at: i64,
}

impl Subscription {
    pub fn new(
        block_type: BlockType,
        block_id: impl Into<String>,
        subscriber_type: SubscriberType,
        subscriber_id: impl Into<String>,
    ) -> Self {
        Self {
            block_type,
            block_id: block_id.into(),
            subscriber_type,
            subscriber_id: subscriber_id.into(),
            notified_at: 0,
            create_at: 0,
            delete_at: 0,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty("subscription", "block_id", &self.block_id)?;
        require_non_empty("subscription", "subscriber_id", &self.subscriber_id)?;
        Ok(())
    }
}

/// Subscriber view of a subscription, as listed per block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscriber {
    pub subscriber_type: SubscriberType,
    pub subscriber_id: String,
    pub notified_at: i64,
}

/// Pending-notification bookkeeping for one block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationHint {
    pub block_type: BlockType,
    pub block_id: String,
    #[serde(default)]
    pub modified_by_id: String,
    #[serde(default)]
    pub create_at: i64,
    /// Epoch ms at which the notification becomes due.
    #[serde(default)]
    pub notify_at: i64,
}

impl NotificationHint {
    pub fn new(
        block_type: BlockType,
        block_id: impl Into<String>,
        modified_by_id: impl Into<String>,
    ) -> Self {
        Self {
            block_type,
            block_id: block_id.into(),
            modified_by_id: modified_by_id.into(),
            create_at: 0,
            notify_at: 0,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty("notification_hint", "block_id", &self.block_id)
    }
}
