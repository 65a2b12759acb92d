//! Push Token Entity
//!
//! Device push-notification token registered by a client. The token value is
//! globally unique; a device re-registering supplies its old value so the
//! stale row can be swapped out in the same transaction.

use chrono::{DateTime, Utc};
use kernel::id::{PushTokenId, UserId};

/// Push token entity
#[derive(Debug, Clone)]
pub struct PushToken {
    /// Row identifier
    pub id: PushTokenId,
    /// Provider-issued token value (unique)
    pub token: String,
    /// Owning user
    pub user_id: UserId,
    /// Push provider, e.g. "fcm"
    pub provider: String,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
    /// Updated timestamp
    pub updated_at: DateTime<Utc>,
}

impl PushToken {
    pub fn new(
        user_id: UserId,
        token: impl Into<String>,
        provider: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: PushTokenId::new(),
            token: token.into(),
            user_id,
            provider: provider.into(),
            created_at: now,
            updated_at: now,
        }
    }
}
