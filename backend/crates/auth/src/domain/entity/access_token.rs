//! Access Token Entity
//!
//! Short-lived opaque bearer credential, resolved against storage on every
//! gated request. A token past `valid_until` is invalid even while the row
//! still exists.

use chrono::{DateTime, Utc};
use kernel::id::UserId;
use uuid::Uuid;

/// Access token entity
#[derive(Debug, Clone)]
pub struct AccessToken {
    /// Opaque token value (UUID v4, unique)
    pub token: Uuid,
    /// Owning user
    pub user_id: UserId,
    /// Expiry instant
    pub valid_until: DateTime<Utc>,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
}

impl AccessToken {
    /// Mint a new access token valid until `valid_until`.
    pub fn new(user_id: UserId, valid_until: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        Self {
            token: Uuid::new_v4(),
            user_id,
            valid_until,
            created_at: now,
        }
    }

    /// Whether the token is expired at `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.valid_until
    }
}
