//! HTTP Handlers
//!
//! Thin bindings from DTOs onto the use cases. Handlers behind the gate
//! receive the [`AuthPrincipal`] through request extensions.

use axum::Extension;
use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use std::sync::Arc;
use uuid::Uuid;

use platform::clock::Clock;

use crate::application::config::AuthConfig;
use crate::application::{
    AccountUseCase, LoginUseCase, PasswordUseCase, PushTokenUseCase, RegisterUseCase,
};
use crate::domain::repository::AuthStore;
use crate::error::{AuthError, AuthResult};
use crate::presentation::dto::{
    ChangePasswordRequest, CompleteRegisterRequest, DeleteAccountRequest,
    ForgotPasswordCompleteRequest, ForgotPasswordRequest, LoginRequest, LoginResponse,
    LogoutRequest, RefreshRequest, RegisterRequest, RegisterResponse, UpdatePushTokenRequest,
    UserInfoResponse,
};
use crate::presentation::middleware::AuthPrincipal;

/// Shared state for auth handlers
#[derive(Clone)]
pub struct AuthAppState<S>
where
    S: AuthStore,
{
    pub store: Arc<S>,
    pub config: Arc<AuthConfig>,
    pub clock: Arc<dyn Clock>,
}

impl<S> AuthAppState<S>
where
    S: AuthStore,
{
    pub fn new(store: S, config: AuthConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            store: Arc::new(store),
            config: Arc::new(config),
            clock,
        }
    }
}

// ============================================================================
// Register
// ============================================================================

/// POST /register
pub async fn register<S>(
    State(state): State<AuthAppState<S>>,
    Json(req): Json<RegisterRequest>,
) -> AuthResult<Json<RegisterResponse>>
where
    S: AuthStore,
{
    let use_case = RegisterUseCase::new(
        Arc::clone(&state.store),
        Arc::clone(&state.config),
        Arc::clone(&state.clock),
    );

    let outcome = use_case.execute(&req.username, &req.password).await?;

    if outcome.confirmation_token.is_some() {
        // Mailer hand-off point: a confirmation mail would carry the token
        tracing::debug!("Confirmation token issued, handing off to mailer");
    }

    Ok(Json(RegisterResponse {
        requires_confirmation: outcome.requires_confirmation,
    }))
}

/// POST /register/confirm
pub async fn complete_register<S>(
    State(state): State<AuthAppState<S>>,
    Json(req): Json<CompleteRegisterRequest>,
) -> AuthResult<Json<LoginResponse>>
where
    S: AuthStore,
{
    let token = Uuid::parse_str(&req.token).map_err(|_| AuthError::TokenNotFound)?;

    let use_case = RegisterUseCase::new(
        Arc::clone(&state.store),
        Arc::clone(&state.config),
        Arc::clone(&state.clock),
    );

    let result = use_case.complete(token).await?;

    Ok(Json(result.into()))
}

// ============================================================================
// Login / Refresh / Logout
// ============================================================================

/// POST /login
pub async fn login<S>(
    State(state): State<AuthAppState<S>>,
    Json(req): Json<LoginRequest>,
) -> AuthResult<Json<LoginResponse>>
where
    S: AuthStore,
{
    let use_case = LoginUseCase::new(
        Arc::clone(&state.store),
        Arc::clone(&state.config),
        Arc::clone(&state.clock),
    );

    let result = use_case.execute(&req.username, &req.password).await?;

    Ok(Json(result.into()))
}

/// POST /refresh
pub async fn refresh<S>(
    State(state): State<AuthAppState<S>>,
    Json(req): Json<RefreshRequest>,
) -> AuthResult<Json<LoginResponse>>
where
    S: AuthStore,
{
    // An unparseable refresh token is as unknown as a missing one
    let token = Uuid::parse_str(&req.refresh_token).map_err(|_| AuthError::Unauthorized)?;

    let use_case = LoginUseCase::new(
        Arc::clone(&state.store),
        Arc::clone(&state.config),
        Arc::clone(&state.clock),
    );

    let result = use_case.refresh(token).await?;

    Ok(Json(result.into()))
}

/// POST /logout
pub async fn logout<S>(
    State(state): State<AuthAppState<S>>,
    Extension(principal): Extension<AuthPrincipal>,
    body: Result<Json<LogoutRequest>, JsonRejection>,
) -> AuthResult<StatusCode>
where
    S: AuthStore,
{
    // The body is optional; a missing or empty one means "access token only"
    let refresh_token = body
        .ok()
        .and_then(|Json(req)| req.refresh_token)
        .and_then(|raw| Uuid::parse_str(&raw).ok());

    let use_case = LoginUseCase::new(
        Arc::clone(&state.store),
        Arc::clone(&state.config),
        Arc::clone(&state.clock),
    );

    use_case.logout(principal.token, refresh_token).await?;

    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Password change / reset
// ============================================================================

/// POST /change-password
pub async fn change_password<S>(
    State(state): State<AuthAppState<S>>,
    Extension(principal): Extension<AuthPrincipal>,
    Json(req): Json<ChangePasswordRequest>,
) -> AuthResult<Json<LoginResponse>>
where
    S: AuthStore,
{
    let use_case = PasswordUseCase::new(
        Arc::clone(&state.store),
        Arc::clone(&state.config),
        Arc::clone(&state.clock),
    );

    let result = use_case
        .update(&principal.user, &req.current_password, &req.new_password, false)
        .await?;

    Ok(Json(result.into()))
}

/// POST /forgot-password
///
/// Always 204: the response never tells whether the username exists.
pub async fn forgot_password<S>(
    State(state): State<AuthAppState<S>>,
    Json(req): Json<ForgotPasswordRequest>,
) -> AuthResult<StatusCode>
where
    S: AuthStore,
{
    let use_case = PasswordUseCase::new(
        Arc::clone(&state.store),
        Arc::clone(&state.config),
        Arc::clone(&state.clock),
    );

    let outcome = use_case.init_reset(&req.username).await?;

    if outcome.reset_token.is_some() {
        // Mailer hand-off point: a reset mail would carry the token
        tracing::debug!("Password reset token live, handing off to mailer");
    }

    Ok(StatusCode::NO_CONTENT)
}

/// POST /forgot-password/complete
pub async fn forgot_password_complete<S>(
    State(state): State<AuthAppState<S>>,
    Json(req): Json<ForgotPasswordCompleteRequest>,
) -> AuthResult<Json<LoginResponse>>
where
    S: AuthStore,
{
    let token = Uuid::parse_str(&req.token).map_err(|_| AuthError::TokenNotFound)?;

    let use_case = PasswordUseCase::new(
        Arc::clone(&state.store),
        Arc::clone(&state.config),
        Arc::clone(&state.clock),
    );

    let result = use_case.reset(token, &req.password).await?;

    Ok(Json(result.into()))
}

// ============================================================================
// Account
// ============================================================================

/// DELETE /account
pub async fn delete_account<S>(
    State(state): State<AuthAppState<S>>,
    Extension(principal): Extension<AuthPrincipal>,
    Json(req): Json<DeleteAccountRequest>,
) -> AuthResult<StatusCode>
where
    S: AuthStore,
{
    let use_case = AccountUseCase::new(
        Arc::clone(&state.store),
        Arc::clone(&state.config),
        Arc::clone(&state.clock),
    );

    use_case.delete(&principal.user, &req.current_password).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// GET /userinfo
pub async fn userinfo<S>(
    State(state): State<AuthAppState<S>>,
    Extension(principal): Extension<AuthPrincipal>,
) -> AuthResult<Json<UserInfoResponse>>
where
    S: AuthStore,
{
    let use_case = AccountUseCase::new(
        Arc::clone(&state.store),
        Arc::clone(&state.config),
        Arc::clone(&state.clock),
    );

    let profile = use_case.profile(principal.user.id).await?;
    let user = &principal.user;

    Ok(Json(UserInfoResponse {
        sub: user.id.to_string(),
        username: user.username.as_ref().map(|u| u.as_str().to_string()),
        scopes: user.scopes.clone(),
        last_authenticated_at: user.last_authenticated_at.map(|t| t.timestamp_millis()),
        legal_accepted_at: profile.legal_accepted_at.map(|t| t.timestamp_millis()),
        updated_at: user.updated_at.timestamp_millis(),
    }))
}

// ============================================================================
// Push tokens
// ============================================================================

/// PUT /token (mounted under the push prefix)
pub async fn update_push_token<S>(
    State(state): State<AuthAppState<S>>,
    Extension(principal): Extension<AuthPrincipal>,
    Json(req): Json<UpdatePushTokenRequest>,
) -> AuthResult<StatusCode>
where
    S: AuthStore,
{
    let use_case = PushTokenUseCase::new(
        Arc::clone(&state.store),
        Arc::clone(&state.config),
        Arc::clone(&state.clock),
    );

    use_case
        .update(
            &principal.user,
            &req.new_token,
            &req.provider,
            req.old_token.as_deref(),
        )
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
