//! Shared Authentication Step
//!
//! Every operation that ends in a signed-in state (login, registration
//! confirmation, refresh, password change/reset) funnels through
//! [`authenticate_user`], inside the caller's transaction.

use chrono::{DateTime, Utc};

use crate::application::config::AuthConfig;
use crate::domain::entity::{AccessToken, RefreshToken, User};
use crate::domain::repository::AuthStoreTx;
use crate::error::{AuthError, AuthResult};

/// Token type reported in every token pair
pub const TOKEN_TYPE_BEARER: &str = "bearer";

/// A freshly issued token pair
#[derive(Debug, Clone)]
pub struct LoginResult {
    /// New access token value
    pub access_token: uuid::Uuid,
    /// New refresh token value
    pub refresh_token: uuid::Uuid,
    /// Always [`TOKEN_TYPE_BEARER`]
    pub token_type: &'static str,
    /// Access token lifetime in seconds
    pub expires_in: i64,
}

/// Issue a fresh access/refresh token pair for the user.
///
/// With `invalidate_existing`, every access and refresh token the user holds
/// is deleted first (password change forces re-login everywhere). Refresh
/// rotation passes `false`: only the rotated token disappears, siblings stay.
pub(crate) async fn authenticate_user<T>(
    tx: &mut T,
    user: &User,
    invalidate_existing: bool,
    config: &AuthConfig,
    now: DateTime<Utc>,
) -> AuthResult<LoginResult>
where
    T: AuthStoreTx,
{
    let validity = chrono_duration(config.access_token_validity)?;

    if invalidate_existing {
        let access = tx.delete_access_tokens_by_user(user.id).await?;
        let refresh = tx.delete_refresh_tokens_by_user(user.id).await?;
        tracing::debug!(
            user_id = %user.id,
            access_tokens_deleted = access,
            refresh_tokens_deleted = refresh,
            "Invalidated existing tokens"
        );
    }

    let access_token = AccessToken::new(user.id, now + validity, now);
    tx.insert_access_token(&access_token).await?;

    let refresh_token = RefreshToken::new(user.id, now);
    tx.insert_refresh_token(&refresh_token).await?;

    tx.update_user_last_authenticated_at(user.id, now).await?;

    Ok(LoginResult {
        access_token: access_token.token,
        refresh_token: refresh_token.token,
        token_type: TOKEN_TYPE_BEARER,
        expires_in: config.access_token_validity_secs(),
    })
}

/// Config durations are `std::time::Duration`; timestamp arithmetic needs
/// the chrono flavor.
pub(crate) fn chrono_duration(d: std::time::Duration) -> AuthResult<chrono::Duration> {
    chrono::Duration::from_std(d).map_err(|e| AuthError::Internal(format!("invalid duration: {e}")))
}
