//! Password Reset Token Entity
//!
//! Proves control of an account for password recovery. `created_at` drives
//! two windows: the debounce window (no re-issue shortly after a send) and
//! the reuse window (a still-valid young token is handed back instead of
//! minting a new secret). Consumed tokens are deleted.

use chrono::{DateTime, Utc};
use kernel::id::UserId;
use uuid::Uuid;

/// Password reset token entity
#[derive(Debug, Clone)]
pub struct PasswordResetToken {
    /// Opaque token value (UUID v4, unique)
    pub token: Uuid,
    /// Owning user
    pub user_id: UserId,
    /// Expiry instant
    pub valid_until: DateTime<Utc>,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
}

impl PasswordResetToken {
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
