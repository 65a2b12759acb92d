//! Confirmation Token Entity
//!
//! Proves control of a registration in progress. Only relevant while the
//! owning user still requires confirmation; deleted once consumed.

use chrono::{DateTime, Utc};
use kernel::id::UserId;
use uuid::Uuid;

/// Confirmation token entity
#[derive(Debug, Clone)]
pub struct ConfirmationToken {
    /// Opaque token value (UUID v4, unique)
    pub token: Uuid,
    /// Owning user
    pub user_id: UserId,
    /// Expiry instant
    pub valid_until: DateTime<Utc>,
    /// Created timestamp, drives the re-issue debounce window
    pub created_at: DateTime<Utc>,
}

impl ConfirmationToken {
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
