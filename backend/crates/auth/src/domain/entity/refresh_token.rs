//! Refresh Token Entity
//!
//! Long-lived credential paired 1:1 with an authentication event. Exchanging
//! it deletes the old value and issues a brand-new access/refresh pair
//! (rotation); a rotated token can never be used again.

use chrono::{DateTime, Utc};
use kernel::id::UserId;
use uuid::Uuid;

/// Refresh token entity
#[derive(Debug, Clone)]
pub struct RefreshToken {
    /// Opaque token value (UUID v4, unique)
    pub token: Uuid,
    /// Owning user
    pub user_id: UserId,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
}

impl RefreshToken {
    pub fn new(user_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            token: Uuid::new_v4(),
            user_id,
            created_at: now,
        }
    }
}
