//! API DTOs (Data Transfer Objects)

use serde::{Deserialize, Serialize};

use crate::application::authenticate::LoginResult;

// ============================================================================
// Register
// ============================================================================

/// Register request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
}

/// Register response
///
/// The confirmation token itself travels by mail, never in this payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub requires_confirmation: bool,
}

/// Complete register request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteRegisterRequest {
    pub token: String,
}

// ============================================================================
// Login / Refresh / Logout
// ============================================================================

/// Login request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Token pair response, shared by every operation that signs the user in
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

impl From<LoginResult> for LoginResponse {
    fn from(result: LoginResult) -> Self {
        Self {
            access_token: result.access_token.to_string(),
            refresh_token: result.refresh_token.to_string(),
            token_type: result.token_type.to_string(),
            expires_in: result.expires_in,
        }
    }
}

/// Refresh request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Logout request (body is optional)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

// ============================================================================
// Password change / reset
// ============================================================================

/// Change password request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Forgot password request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForgotPasswordRequest {
    pub username: String,
}

/// Forgot password completion request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForgotPasswordCompleteRequest {
    pub token: String,
    pub password: String,
}

// ============================================================================
// Account
// ============================================================================

/// Delete account request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteAccountRequest {
    pub current_password: String,
}

/// Current user info response
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfoResponse {
    /// Subject: the user id
    pub sub: String,
    pub username: Option<String>,
    pub scopes: Vec<String>,
    pub last_authenticated_at: Option<i64>,
    pub legal_accepted_at: Option<i64>,
    pub updated_at: i64,
}

// ============================================================================
// Push tokens
// ============================================================================

/// Update push token request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePushTokenRequest {
    pub new_token: String,
    pub provider: String,
    #[serde(default)]
    pub old_token: Option<String>,
}
