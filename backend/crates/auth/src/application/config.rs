//! Application Configuration
//!
//! Configuration for the auth application layer. Plain values injected into
//! the use-case constructors - no globals, so tests can run any combination
//! of windows and validities.

use std::time::Duration;

use platform::password::Argon2Params;

/// Auth application configuration
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Lifetime of issued access tokens
    pub access_token_validity: Duration,
    /// Lifetime of password reset tokens
    pub password_reset_token_validity: Duration,
    /// No new reset token is issued while a valid one is younger than this
    pub password_reset_token_debounce: Duration,
    /// A valid reset token younger than this is handed back instead of
    /// minting a new secret
    pub password_reset_token_reuse: Duration,
    /// Lifetime of registration confirmation tokens
    pub confirmation_token_validity: Duration,
    /// No new confirmation token is issued while a valid one is younger
    /// than this
    pub confirmation_token_debounce: Duration,
    /// Maximum age of `last_authenticated_at` accepted by gate mode `secure`
    pub last_authenticated_at_threshold: Duration,
    /// Scopes granted to newly registered users
    pub default_user_scopes: Vec<String>,
    /// Whether registration requires a confirmation step
    pub registration_requires_confirmation: bool,
    /// Argon2id parameters for password hashing
    pub hashing_params: Argon2Params,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            access_token_validity: Duration::from_secs(86_400),
            password_reset_token_validity: Duration::from_secs(900),
            password_reset_token_debounce: Duration::from_secs(60),
            password_reset_token_reuse: Duration::from_secs(600),
            confirmation_token_validity: Duration::from_secs(86_400),
            confirmation_token_debounce: Duration::from_secs(60),
            last_authenticated_at_threshold: Duration::from_secs(900),
            default_user_scopes: vec!["app".to_string()],
            registration_requires_confirmation: false,
            hashing_params: Argon2Params::default(),
        }
    }
}

impl AuthConfig {
    /// Access token lifetime in whole seconds, as reported to clients
    pub fn access_token_validity_secs(&self) -> i64 {
        self.access_token_validity.as_secs() as i64
    }
}
