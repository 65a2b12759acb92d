//! Push Token Use Case
//!
//! Registers and swaps device push-notification tokens.

use std::sync::Arc;

use platform::clock::Clock;

use crate::application::config::AuthConfig;
use crate::domain::entity::{PushToken, User};
use crate::domain::repository::{AuthStore, AuthStoreTx};
use crate::error::{AuthError, AuthResult};

/// Push token use case
pub struct PushTokenUseCase<S>
where
    S: AuthStore,
{
    store: Arc<S>,
    #[allow(dead_code)]
    config: Arc<AuthConfig>,
    clock: Arc<dyn Clock>,
}

impl<S> PushTokenUseCase<S>
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

    /// Register a new push token, optionally replacing an old one.
    ///
    /// The new value must be globally unused. When the device names its old
    /// token, that row must exist and belong to this user - otherwise the
    /// whole operation rolls back.
    pub async fn update(
        &self,
        user: &User,
        new_token: &str,
        provider: &str,
        old_token: Option<&str>,
    ) -> AuthResult<()> {
        let now = self.clock.now();

        let mut tx = self.store.begin().await?;

        if tx.push_token_exists(new_token).await? {
            tracing::debug!(user_id = %user.id, "Push token already exists");
            return Err(AuthError::PushTokenInUse);
        }

        tx.insert_push_token(&PushToken::new(user.id, new_token, provider, now))
            .await?;

        if let Some(old) = old_token {
            let deleted = tx.delete_push_token_of_user(user.id, old).await?;
            if !deleted {
                tracing::debug!(user_id = %user.id, "Existing push token not found");
                return Err(AuthError::TokenNotFound);
            }
        }

        tx.commit().await?;

        tracing::info!(user_id = %user.id, provider, "Push token updated");

        Ok(())
    }
}
