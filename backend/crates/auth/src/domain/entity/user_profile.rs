//! App User Profile Entity
//!
//! 1:1 auxiliary profile data, created alongside the user at registration
//! and removed with it.

use chrono::{DateTime, Utc};
use kernel::id::UserId;

/// App user profile entity
#[derive(Debug, Clone)]
pub struct AppUserProfile {
    /// Owning user (primary key)
    pub user_id: UserId,
    /// When the user accepted the current legal terms
    pub legal_accepted_at: Option<DateTime<Utc>>,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
    /// Updated timestamp
    pub updated_at: DateTime<Utc>,
}

impl AppUserProfile {
    pub fn new(user_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            legal_accepted_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}
