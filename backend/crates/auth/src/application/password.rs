//! Password Use Case
//!
//! Password change, reset initiation (debounced, reusable), and reset
//! completion.

use std::sync::Arc;

use platform::clock::Clock;
use platform::password::{compare_password_and_hash, hash_password};
use uuid::Uuid;

use crate::application::authenticate::{LoginResult, authenticate_user, chrono_duration};
use crate::application::config::AuthConfig;
use crate::domain::entity::{PasswordResetToken, User};
use crate::domain::repository::{AuthStore, AuthStoreTx};
use crate::domain::value_object::Username;
use crate::error::{AuthError, AuthResult};

/// Init password reset output
///
/// Always "successful". The token is `None` for unknown/inactive/
/// passwordless users and inside the debounce window - externally these
/// cases are indistinguishable from a sent reset mail.
#[derive(Debug)]
pub struct InitPasswordResetOutcome {
    /// Token to hand to the mailer, if one is live
    pub reset_token: Option<Uuid>,
}

/// Password use case
pub struct PasswordUseCase<S>
where
    S: AuthStore,
{
    store: Arc<S>,
    config: Arc<AuthConfig>,
    clock: Arc<dyn Clock>,
}

impl<S> PasswordUseCase<S>
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

    /// Change the user's password.
    ///
    /// Unless `skip_verification`, the current password must match. Success
    /// invalidates every existing token pair and issues a fresh one.
    pub async fn update(
        &self,
        user: &User,
        current_password: &str,
        new_password: &str,
        skip_verification: bool,
    ) -> AuthResult<LoginResult> {
        if !user.is_active {
            tracing::debug!(user_id = %user.id, "User is deactivated, rejecting password change");
            return Err(AuthError::UserDeactivated);
        }

        let hash = user.password_hash.as_deref().ok_or_else(|| {
            tracing::debug!(user_id = %user.id, "User is missing password, rejecting password change");
            AuthError::NotLocalUser
        })?;

        if !skip_verification {
            let matches = compare_password_and_hash(current_password, hash)
                .map_err(|e| AuthError::Internal(format!("password comparison failed: {e}")))?;
            if !matches {
                tracing::debug!(user_id = %user.id, "Current password does not match stored hash");
                return Err(AuthError::Unauthorized);
            }
        }

        self.apply_password_change(user, new_password, None).await
    }

    /// Start a password reset.
    ///
    /// Never confirms whether the username exists. Within the debounce
    /// window nothing is issued; within the reuse window the existing token
    /// comes back instead of a new secret.
    pub async fn init_reset(&self, username: &str) -> AuthResult<InitPasswordResetOutcome> {
        let empty = InitPasswordResetOutcome { reset_token: None };

        let Ok(username) = Username::new(username) else {
            return Ok(empty);
        };

        let Some(user) = self.store.find_user_by_username(&username).await? else {
            tracing::debug!("User not found, skipping password reset");
            return Ok(empty);
        };

        if !user.is_active {
            tracing::debug!(user_id = %user.id, "User is deactivated, skipping password reset");
            return Ok(empty);
        }

        if user.password_hash.is_none() {
            tracing::debug!(user_id = %user.id, "User is missing password, skipping password reset");
            return Ok(empty);
        }

        let now = self.clock.now();

        if !self.config.password_reset_token_debounce.is_zero() {
            let debounce = chrono_duration(self.config.password_reset_token_debounce)?;
            let in_debounce = self
                .store
                .password_reset_token_in_window_exists(user.id, now - debounce, now)
                .await?;
            if in_debounce {
                tracing::debug!(
                    user_id = %user.id,
                    "Password reset token within debounce window, not issuing a new one"
                );
                return Ok(empty);
            }
        }

        let reuse = chrono_duration(self.config.password_reset_token_reuse)?;

        let mut tx = self.store.begin().await?;
        let token = match tx
            .find_reusable_password_reset_token(user.id, now - reuse, now)
            .await?
        {
            Some(existing) => {
                tracing::debug!(user_id = %user.id, "Reusing live password reset token");
                existing.token
            }
            None => {
                let validity = chrono_duration(self.config.password_reset_token_validity)?;
                let minted = PasswordResetToken::new(user.id, now + validity, now);
                tx.insert_password_reset_token(&minted).await?;
                tracing::info!(user_id = %user.id, "Password reset token issued");
                minted.token
            }
        };
        tx.commit().await?;

        Ok(InitPasswordResetOutcome {
            reset_token: Some(token),
        })
    }

    /// Complete a password reset with a previously issued token.
    ///
    /// The token is consumed in the same transaction as the password write.
    pub async fn reset(&self, reset_token: Uuid, new_password: &str) -> AuthResult<LoginResult> {
        let (token, user) = self
            .store
            .find_password_reset_token(reset_token)
            .await?
            .ok_or_else(|| {
                tracing::debug!("Password reset token not found");
                AuthError::TokenNotFound
            })?;

        let now = self.clock.now();
        if token.is_expired(now) {
            tracing::debug!(
                valid_until = %token.valid_until,
                "Password reset token is no longer valid, rejecting password reset"
            );
            return Err(AuthError::TokenExpired);
        }

        if !user.is_active {
            tracing::debug!(user_id = %user.id, "User is deactivated, rejecting password reset");
            return Err(AuthError::UserDeactivated);
        }

        if user.password_hash.is_none() {
            tracing::debug!(user_id = %user.id, "User is missing password, rejecting password reset");
            return Err(AuthError::NotLocalUser);
        }

        self.apply_password_change(&user, new_password, Some(token.token))
            .await
    }

    /// Write the new hash, optionally consume a reset token, and re-issue
    /// tokens with full invalidation - all in one transaction.
    async fn apply_password_change(
        &self,
        user: &User,
        new_password: &str,
        consume_reset_token: Option<Uuid>,
    ) -> AuthResult<LoginResult> {
        let new_hash = hash_password(new_password, &self.config.hashing_params).map_err(|e| {
            tracing::debug!(error = %e, "Failed to hash new password");
            AuthError::InvalidPassword
        })?;

        let now = self.clock.now();
        let mut tx = self.store.begin().await?;
        tx.update_user_password(user.id, &new_hash, now).await?;
        if let Some(token) = consume_reset_token {
            tx.delete_password_reset_token(token).await?;
        }
        let result = authenticate_user(&mut tx, user, true, &self.config, now).await?;
        tx.commit().await?;

        tracing::info!(user_id = %user.id, "Password changed");

        Ok(result)
    }
}
