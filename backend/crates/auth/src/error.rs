//! Auth Error Types
//!
//! A closed set of error kinds for every auth operation, integrated with the
//! unified `kernel::error::AppError` system. The variants double as the
//! transport mapping table: each one knows its HTTP status and `ErrorKind`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use kernel::error::{app_error::AppError, kind::ErrorKind};
use thiserror::Error;

/// Auth-specific result type alias
pub type AuthResult<T> = Result<T, AuthError>;

/// Auth-specific error variants
///
/// `Unauthorized` is deliberately generic: unknown user, missing password
/// credential and wrong password all collapse into it so that responses
/// cannot be used to enumerate accounts.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Bad credentials, unknown or rotated refresh token, unknown access token
    #[error("Invalid credentials")]
    Unauthorized,

    /// Authentication is too old for this operation, re-login required
    #[error("Re-authentication required")]
    AuthenticationExpired,

    /// Principal resolved, but the account is deactivated
    #[error("User account is deactivated")]
    UserDeactivated,

    /// Operation needs a local password credential the user does not have
    #[error("User has no local password credential")]
    NotLocalUser,

    /// User lacks the scopes the route requires
    #[error("User is missing required scopes")]
    MissingScopes,

    /// New password failed hashing/policy
    #[error("Password was rejected")]
    InvalidPassword,

    /// Username failed normalization/validation
    #[error("Username is invalid")]
    InvalidUsername,

    /// Presented token does not even parse
    #[error("Auth token is malformed")]
    MalformedToken,

    /// Registration collision with a fully-confirmed account
    #[error("User with this username already exists")]
    UserAlreadyExists,

    /// Push token value is already registered
    #[error("Push token is already in use")]
    PushTokenInUse,

    /// Confirmation/reset token found but past its validity
    #[error("Token is expired")]
    TokenExpired,

    /// Confirmation/reset/old-push token not found
    #[error("Token not found")]
    TokenNotFound,

    /// App user profile missing for an existing user
    #[error("App user profile not found")]
    ProfileNotFound,

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.kind().status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Get the ErrorKind for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::Unauthorized | AuthError::AuthenticationExpired => ErrorKind::Unauthorized,
            AuthError::UserDeactivated | AuthError::NotLocalUser | AuthError::MissingScopes => {
                ErrorKind::Forbidden
            }
            AuthError::InvalidPassword
            | AuthError::InvalidUsername
            | AuthError::MalformedToken => ErrorKind::BadRequest,
            AuthError::UserAlreadyExists
            | AuthError::PushTokenInUse
            | AuthError::TokenExpired => ErrorKind::Conflict,
            AuthError::TokenNotFound | AuthError::ProfileNotFound => ErrorKind::NotFound,
            AuthError::Database(_) | AuthError::Internal(_) => ErrorKind::InternalServerError,
        }
    }

    /// Convert to AppError
    ///
    /// Server-side failures are rendered with a generic message; the detail
    /// stays in the logs and never reaches a client payload.
    pub fn to_app_error(&self) -> AppError {
        let kind = self.kind();
        if kind.is_server_error() {
            AppError::new(kind, kind.as_str())
        } else {
            AppError::new(kind, self.to_string())
        }
    }

    /// Log the error with appropriate level
    fn log(&self) {
        match self {
            AuthError::Database(e) => {
                tracing::error!(error = %e, "Auth database error");
            }
            AuthError::Internal(msg) => {
                tracing::error!(message = %msg, "Auth internal error");
            }
            AuthError::Unauthorized => {
                tracing::warn!("Rejected authentication attempt");
            }
            AuthError::UserDeactivated => {
                tracing::warn!("Request on deactivated account");
            }
            _ => {
                tracing::debug!(error = %self, "Auth error");
            }
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        self.log();
        self.to_app_error().into_response()
    }
}

impl From<AppError> for AuthError {
    fn from(err: AppError) -> Self {
        AuthError::Internal(err.to_string())
    }
}
