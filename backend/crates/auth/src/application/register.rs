//! Register Use Case
//!
//! Creates new accounts and completes pending registrations.

use std::sync::Arc;

use platform::clock::Clock;
use platform::password::hash_password;
use uuid::Uuid;

use crate::application::authenticate::{LoginResult, authenticate_user, chrono_duration};
use crate::application::config::AuthConfig;
use crate::domain::entity::{AppUserProfile, ConfirmationToken, User};
use crate::domain::repository::{AuthStore, AuthStoreTx};
use crate::domain::value_object::Username;
use crate::error::{AuthError, AuthResult};

/// Register output
///
/// When confirmation is required, the token is handed to the caller for the
/// mailer; it is never part of an HTTP response.
#[derive(Debug)]
pub struct RegisterOutcome {
    /// Whether the account still awaits confirmation
    pub requires_confirmation: bool,
    /// Newly minted confirmation token, if one was issued by this call
    pub confirmation_token: Option<Uuid>,
}

/// Register use case
pub struct RegisterUseCase<S>
where
    S: AuthStore,
{
    store: Arc<S>,
    config: Arc<AuthConfig>,
    clock: Arc<dyn Clock>,
}

impl<S> RegisterUseCase<S>
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

    /// Register a new user.
    ///
    /// Re-registering an unconfirmed username re-issues the confirmation
    /// token, debounced; a confirmed username is a conflict.
    pub async fn execute(&self, username: &str, password: &str) -> AuthResult<RegisterOutcome> {
        let username = Username::new(username).map_err(|e| {
            tracing::debug!(error = %e, "Rejected invalid username at registration");
            AuthError::InvalidUsername
        })?;

        let now = self.clock.now();

        if let Some(user) = self.store.find_user_by_username(&username).await? {
            if !user.requires_confirmation {
                tracing::debug!(user_id = %user.id, "Username already registered and confirmed");
                return Err(AuthError::UserAlreadyExists);
            }
            return self.reissue_confirmation(&user, now).await;
        }

        let hash = hash_password(password, &self.config.hashing_params).map_err(|e| {
            tracing::debug!(error = %e, "Failed to hash password at registration");
            AuthError::InvalidPassword
        })?;

        let requires_confirmation = self.config.registration_requires_confirmation;
        let user = User::new_local(
            username,
            hash,
            self.config.default_user_scopes.clone(),
            requires_confirmation,
            now,
        );

        let mut tx = self.store.begin().await?;
        tx.insert_user(&user).await?;
        tx.insert_app_user_profile(&AppUserProfile::new(user.id, now))
            .await?;

        let mut confirmation_token = None;
        if requires_confirmation {
            let validity = chrono_duration(self.config.confirmation_token_validity)?;
            let token = ConfirmationToken::new(user.id, now + validity, now);
            tx.insert_confirmation_token(&token).await?;
            confirmation_token = Some(token.token);
        }
        tx.commit().await?;

        tracing::info!(
            user_id = %user.id,
            requires_confirmation,
            "User registered"
        );

        Ok(RegisterOutcome {
            requires_confirmation,
            confirmation_token,
        })
    }

    /// Complete a pending registration.
    ///
    /// Idempotent: confirming an already-active user still authenticates so
    /// the response shape stays the same.
    pub async fn complete(&self, confirmation_token: Uuid) -> AuthResult<LoginResult> {
        let now = self.clock.now();

        let mut tx = self.store.begin().await?;
        let (token, user) = tx
            .find_valid_confirmation_token(confirmation_token, now)
            .await?
            .ok_or_else(|| {
                tracing::debug!("Confirmation token not found or expired");
                AuthError::TokenNotFound
            })?;

        if user.is_active && !user.requires_confirmation {
            tracing::debug!(user_id = %user.id, "User already active, skipping confirmation");
            let result = authenticate_user(&mut tx, &user, false, &self.config, now).await?;
            tx.commit().await?;
            return Ok(result);
        }

        tx.update_user_activation(user.id, true, false, now).await?;
        tx.delete_confirmation_token(token.token).await?;
        let result = authenticate_user(&mut tx, &user, false, &self.config, now).await?;
        tx.commit().await?;

        tracing::info!(user_id = %user.id, "Registration confirmed");

        Ok(result)
    }

    /// Debounced confirmation-token re-issue for an unconfirmed user.
    async fn reissue_confirmation(
        &self,
        user: &User,
        now: chrono::DateTime<chrono::Utc>,
    ) -> AuthResult<RegisterOutcome> {
        let debounce = chrono_duration(self.config.confirmation_token_debounce)?;
        let in_debounce = self
            .store
            .confirmation_token_in_window_exists(user.id, now - debounce, now)
            .await?;

        if in_debounce {
            tracing::debug!(
                user_id = %user.id,
                "Confirmation token within debounce window, not issuing a new one"
            );
            return Ok(RegisterOutcome {
                requires_confirmation: true,
                confirmation_token: None,
            });
        }

        let validity = chrono_duration(self.config.confirmation_token_validity)?;
        let token = ConfirmationToken::new(user.id, now + validity, now);

        let mut tx = self.store.begin().await?;
        tx.insert_confirmation_token(&token).await?;
        tx.commit().await?;

        tracing::info!(user_id = %user.id, "Confirmation token re-issued");

        Ok(RegisterOutcome {
            requires_confirmation: true,
            confirmation_token: Some(token.token),
        })
    }
}
