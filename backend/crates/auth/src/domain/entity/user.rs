//! User Entity

use chrono::{DateTime, Utc};
use kernel::id::UserId;

use crate::domain::value_object::Username;

/// User entity
///
/// A user without a password hash is a non-local (federated) identity and can
/// never authenticate with a password; every password-mutating operation must
/// reject such users.
#[derive(Debug, Clone)]
pub struct User {
    /// Internal UUID identifier
    pub id: UserId,
    /// Login identifier, unique case-insensitively
    pub username: Option<Username>,
    /// Argon2id PHC hash; absent for federated identities
    pub password_hash: Option<String>,
    /// Deactivated users are rejected everywhere, including gate mode `try`
    pub is_active: bool,
    /// Set while a registration awaits confirmation
    pub requires_confirmation: bool,
    /// Granted scope strings
    pub scopes: Vec<String>,
    /// Last successful authentication event
    pub last_authenticated_at: Option<DateTime<Utc>>,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
    /// Updated timestamp
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new local-credential user.
    ///
    /// The caller supplies `now` so user creation stays on the injected
    /// clock. An unconfirmed user starts inactive.
    pub fn new_local(
        username: Username,
        password_hash: String,
        scopes: Vec<String>,
        requires_confirmation: bool,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: UserId::new(),
            username: Some(username),
            password_hash: Some(password_hash),
            is_active: !requires_confirmation,
            requires_confirmation,
            scopes,
            last_authenticated_at: Some(now),
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether this user carries a local password credential
    pub fn is_local(&self) -> bool {
        self.password_hash.is_some()
    }

    /// Whether the user's scope set intersects the required set.
    ///
    /// An empty requirement always passes.
    pub fn has_any_scope(&self, required: &[String]) -> bool {
        if required.is_empty() {
            return true;
        }
        required
            .iter()
            .any(|scope| self.scopes.iter().any(|granted| granted == scope))
    }
}
