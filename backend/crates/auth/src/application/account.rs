//! Account Use Case
//!
//! Account deletion and profile reads.

use std::sync::Arc;

use kernel::id::UserId;
use platform::clock::Clock;
use platform::password::compare_password_and_hash;

use crate::application::config::AuthConfig;
use crate::domain::entity::{AppUserProfile, User};
use crate::domain::repository::{AuthStore, AuthStoreTx};
use crate::error::{AuthError, AuthResult};

/// Account use case
pub struct AccountUseCase<S>
where
    S: AuthStore,
{
    store: Arc<S>,
    #[allow(dead_code)]
    config: Arc<AuthConfig>,
    #[allow(dead_code)]
    clock: Arc<dyn Clock>,
}

impl<S> AccountUseCase<S>
where
    S: AuthStore,
{
    pub fn new(store: Arc<S>, config: Arc<AuthConfig>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            config,
            clock,
        }
    }

    /// Delete the user account and everything attached to it.
    ///
    /// Same preconditions as a password change: active account, local
    /// credential, matching current password. The user row, profile and all
    /// token kinds disappear in one transaction - partial deletion is never
    /// observable.
    pub async fn delete(&self, user: &User, current_password: &str) -> AuthResult<()> {
        if !user.is_active {
            tracing::debug!(user_id = %user.id, "User is deactivated, rejecting deletion");
            return Err(AuthError::UserDeactivated);
        }

        let hash = user.password_hash.as_deref().ok_or_else(|| {
            tracing::debug!(user_id = %user.id, "User is missing password, rejecting deletion");
            AuthError::NotLocalUser
        })?;

        let matches = compare_password_and_hash(current_password, hash).map_err(|e| {
            tracing::debug!(error = %e, "Failed to compare password with stored hash");
            AuthError::Unauthorized
        })?;

        if !matches {
            tracing::debug!(user_id = %user.id, "Provided password does not match stored hash");
            return Err(AuthError::Unauthorized);
        }

        let mut tx = self.store.begin().await?;
        tx.delete_user(user.id).await?;
        tx.commit().await?;

        tracing::info!(user_id = %user.id, "User account deleted");

        Ok(())
    }

    /// Fetch the 1:1 app user profile.
    pub async fn profile(&self, user_id: UserId) -> AuthResult<AppUserProfile> {
        self.store
            .find_app_user_profile(user_id)
            .await?
            .ok_or_else(|| {
                tracing::debug!(user_id = %user_id, "AppUserProfile not found");
                AuthError::ProfileNotFound
            })
    }
}
