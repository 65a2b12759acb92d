//! Login Use Case
//!
//! Password login, refresh token rotation, and logout.

use std::sync::Arc;

use platform::clock::Clock;
use platform::password::compare_password_and_hash;
use uuid::Uuid;

use crate::application::authenticate::{LoginResult, authenticate_user};
use crate::application::config::AuthConfig;
use crate::domain::repository::{AuthStore, AuthStoreTx};
use crate::domain::value_object::Username;
use crate::error::{AuthError, AuthResult};

/// Login use case
pub struct LoginUseCase<S>
where
    S: AuthStore,
{
    store: Arc<S>,
    config: Arc<AuthConfig>,
    clock: Arc<dyn Clock>,
}

impl<S> LoginUseCase<S>
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

    /// Authenticate with username and password.
    ///
    /// Unknown username, missing password credential and wrong password all
    /// produce the same `Unauthorized` - callers must not be able to tell
    /// which one happened.
    pub async fn execute(&self, username: &str, password: &str) -> AuthResult<LoginResult> {
        let username = Username::new(username).map_err(|_| AuthError::Unauthorized)?;

        let user = self
            .store
            .find_user_by_username(&username)
            .await?
            .ok_or_else(|| {
                tracing::debug!("User not found");
                AuthError::Unauthorized
            })?;

        if !user.is_active {
            tracing::debug!(user_id = %user.id, "User is deactivated, rejecting authentication");
            return Err(AuthError::UserDeactivated);
        }

        let hash = user.password_hash.as_deref().ok_or_else(|| {
            tracing::debug!(user_id = %user.id, "User is missing password, forbidding authentication");
            AuthError::Unauthorized
        })?;

        let matches = compare_password_and_hash(password, hash).map_err(|e| {
            tracing::debug!(error = %e, "Failed to compare password with stored hash");
            AuthError::Unauthorized
        })?;

        if !matches {
            tracing::debug!(user_id = %user.id, "Provided password does not match stored hash");
            return Err(AuthError::Unauthorized);
        }

        let now = self.clock.now();
        let mut tx = self.store.begin().await?;
        let result = authenticate_user(&mut tx, &user, false, &self.config, now).await?;
        tx.commit().await?;

        tracing::info!(user_id = %user.id, "User logged in");

        Ok(result)
    }

    /// Exchange a refresh token for a new token pair.
    ///
    /// Rotation: the presented token is deleted and can never be used again;
    /// the user's other token pairs stay untouched. A stale (already
    /// rotated) token is simply unknown - plain `Unauthorized`.
    pub async fn refresh(&self, refresh_token: Uuid) -> AuthResult<LoginResult> {
        let (old_token, user) = self
            .store
            .find_refresh_token(refresh_token)
            .await?
            .ok_or_else(|| {
                tracing::debug!("Refresh token not found");
                AuthError::Unauthorized
            })?;

        if !user.is_active {
            tracing::debug!(user_id = %user.id, "User is deactivated, rejecting token refresh");
            return Err(AuthError::UserDeactivated);
        }

        let now = self.clock.now();
        let mut tx = self.store.begin().await?;
        tx.delete_refresh_token(old_token.token).await?;
        let result = authenticate_user(&mut tx, &user, false, &self.config, now).await?;
        tx.commit().await?;

        tracing::info!(user_id = %user.id, "Refresh token rotated");

        Ok(result)
    }

    /// Delete the presented access token and, if supplied, the refresh
    /// token. Idempotent - deleting tokens that are already gone succeeds.
    pub async fn logout(
        &self,
        access_token: Uuid,
        refresh_token: Option<Uuid>,
    ) -> AuthResult<()> {
        let mut tx = self.store.begin().await?;
        tx.delete_access_token(access_token).await?;
        if let Some(token) = refresh_token {
            tx.delete_refresh_token(token).await?;
        }
        tx.commit().await?;

        tracing::info!("User logged out");

        Ok(())
    }
}
