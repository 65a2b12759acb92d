//! Server Configuration
//!
//! Environment-variable driven configuration, collected once at startup and
//! passed by value into the components that need it. Every value has a
//! default suitable for local development except `DATABASE_URL`.

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use auth::AuthConfig;

/// Full server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen address (SERVER_BIND_ADDR)
    pub bind_addr: SocketAddr,
    /// Postgres connection string (DATABASE_URL)
    pub database_url: String,
    /// Connection pool size (SERVER_DB_MAX_CONNECTIONS)
    pub db_max_connections: u32,
    /// Allowed CORS origins, comma separated (FRONTEND_ORIGINS)
    pub frontend_origins: Vec<String>,
    /// Auth core configuration (SERVER_AUTH_*)
    pub auth: AuthConfig,
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set in environment"))?;

        let defaults = AuthConfig::default();

        Ok(Self {
            bind_addr: get_env("SERVER_BIND_ADDR", "0.0.0.0:8080").parse()?,
            database_url,
            db_max_connections: get_env_as_u32("SERVER_DB_MAX_CONNECTIONS", 5),
            frontend_origins: get_env_as_list(
                "FRONTEND_ORIGINS",
                "http://localhost:3000,http://127.0.0.1:3000",
            ),
            auth: AuthConfig {
                access_token_validity: get_env_as_duration_secs(
                    "SERVER_AUTH_ACCESS_TOKEN_VALIDITY",
                    86_400,
                ),
                password_reset_token_validity: get_env_as_duration_secs(
                    "SERVER_AUTH_PASSWORD_RESET_TOKEN_VALIDITY",
                    900,
                ),
                password_reset_token_debounce: get_env_as_duration_secs(
                    "SERVER_AUTH_PASSWORD_RESET_TOKEN_DEBOUNCE_DURATION",
                    60,
                ),
                password_reset_token_reuse: get_env_as_duration_secs(
                    "SERVER_AUTH_PASSWORD_RESET_TOKEN_REUSE_DURATION",
                    600,
                ),
                confirmation_token_validity: get_env_as_duration_secs(
                    "SERVER_AUTH_CONFIRMATION_TOKEN_VALIDITY",
                    86_400,
                ),
                confirmation_token_debounce: get_env_as_duration_secs(
                    "SERVER_AUTH_CONFIRMATION_TOKEN_DEBOUNCE_DURATION",
                    60,
                ),
                last_authenticated_at_threshold: get_env_as_duration_secs(
                    "SERVER_AUTH_LAST_AUTHENTICATED_AT_THRESHOLD",
                    900,
                ),
                default_user_scopes: get_env_as_list("SERVER_AUTH_DEFAULT_USER_SCOPES", "app"),
                registration_requires_confirmation: get_env_as_bool(
                    "SERVER_AUTH_REGISTRATION_REQUIRES_CONFIRMATION",
                    false,
                ),
                hashing_params: defaults.hashing_params,
            },
        })
    }
}

// ============================================================================
// Env helpers
// ============================================================================

fn get_env(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn get_env_as_u32(key: &str, default: u32) -> u32 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn get_env_as_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn get_env_as_duration_secs(key: &str, default_secs: u64) -> Duration {
    Duration::from_secs(
        env::var(key)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default_secs),
    )
}

fn get_env_as_list(key: &str, default: &str) -> Vec<String> {
    get_env(key, default)
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
