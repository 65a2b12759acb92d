//! Auth Gate Middleware
//!
//! Per-route-group authentication with a configurable mode, failure
//! response, token source and scope requirement. The processing order per
//! request:
//!
//! 1. Mode `none` and skip-listed routes pass straight through.
//! 2. A principal placed by an earlier gate is only re-checked for
//!    freshness and scopes.
//! 3. The token string is extracted from the configured source; a missing
//!    token is decided per mode.
//! 4. The token format is validated (v4 UUID by default); malformed tokens
//!    are rejected in every mode except `try`.
//! 5. The token is resolved against storage. Unknown token degrades under
//!    `try`; a store error is always a 500 regardless of mode.
//! 6. An expired token is rejected (tolerated under `try`).
//! 7. A deactivated user is rejected in every mode, `try` included.
//! 8. Freshness (`secure`) and scope membership are checked.
//! 9. On success the request extensions carry the [`AuthPrincipal`].

use std::fmt;
use std::sync::Arc;

use axum::body::{Body, to_bytes};
use axum::extract::State;
use axum::http::{Request, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use platform::clock::Clock;
use uuid::Uuid;

use crate::application::CheckTokenUseCase;
use crate::application::config::AuthConfig;
use crate::domain::entity::User;
use crate::domain::repository::AuthStore;
use crate::error::AuthError;
use kernel::error::app_error::AppError;

/// Maximum form body the gate is willing to buffer when the token source is
/// a form field
const FORM_BODY_LIMIT: usize = 1 << 20;

// ============================================================================
// Configuration
// ============================================================================

/// Controls the type of authentication check performed for a route group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMode {
    /// A valid token must be present
    #[default]
    Required,
    /// Like `Required`, plus the authentication must be recent
    Secure,
    /// A token is not required, but a presented one must be valid
    Optional,
    /// Best effort: invalid tokens are tolerated and the request proceeds
    /// unauthenticated. A deactivated user is still always rejected.
    Try,
    /// No authentication processing at all
    None,
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AuthMode::Required => "required",
            AuthMode::Secure => "secure",
            AuthMode::Optional => "optional",
            AuthMode::Try => "try",
            AuthMode::None => "none",
        };
        f.write_str(s)
    }
}

/// Controls the response on authentication failure
///
/// `NotFound` makes gated endpoints indistinguishable from nonexistent
/// routes to unauthenticated callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthFailureMode {
    #[default]
    Unauthorized,
    NotFound,
}

impl AuthFailureMode {
    fn response(self) -> Response {
        match self {
            AuthFailureMode::Unauthorized => {
                AppError::unauthorized("Authentication required").into_response()
            }
            AuthFailureMode::NotFound => AppError::not_found("Not Found").into_response(),
        }
    }
}

/// Where the gate looks for the token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthTokenSource {
    /// A header, named by `token_source_key` (default `Authorization`)
    #[default]
    Header,
    /// A query parameter
    Query,
    /// A form field in an urlencoded body
    Form,
}

/// Route skip predicate
pub type Skipper = Arc<dyn Fn(&Request<Body>) -> bool + Send + Sync>;

/// Pluggable token format check
pub type AuthTokenFormatValidator = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Default format check: the token must parse as a v4 UUID
pub fn default_token_format_validator(token: &str) -> bool {
    matches!(Uuid::try_parse(token), Ok(uuid) if uuid.get_version_num() == 4)
}

/// Gate configuration for one route group
#[derive(Clone)]
pub struct AuthGateConfig {
    pub mode: AuthMode,
    pub failure_mode: AuthFailureMode,
    pub token_source: AuthTokenSource,
    /// Header name / query parameter / form field carrying the token
    pub token_source_key: String,
    /// Required scheme prefix; empty means the raw value is the token
    pub scheme: String,
    /// Scopes required by this route group; empty means none required
    pub scopes: Vec<String>,
    pub skipper: Option<Skipper>,
    pub format_validator: Option<AuthTokenFormatValidator>,
}

impl Default for AuthGateConfig {
    fn default() -> Self {
        Self {
            mode: AuthMode::Required,
            failure_mode: AuthFailureMode::Unauthorized,
            token_source: AuthTokenSource::Header,
            token_source_key: header::AUTHORIZATION.as_str().to_string(),
            scheme: "Bearer".to_string(),
            scopes: vec!["app".to_string()],
            skipper: None,
            format_validator: None,
        }
    }
}

impl AuthGateConfig {
    pub fn with_mode(mode: AuthMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }
}

/// Gate state shared across requests
#[derive(Clone)]
pub struct AuthGateState<S>
where
    S: AuthStore,
{
    pub store: Arc<S>,
    pub config: Arc<AuthConfig>,
    pub clock: Arc<dyn Clock>,
    pub gate: Arc<AuthGateConfig>,
}

/// Authenticated principal placed in request extensions
#[derive(Debug, Clone)]
pub struct AuthPrincipal {
    pub user: User,
    /// Raw access token value the request presented
    pub token: Uuid,
}

// ============================================================================
// Middleware
// ============================================================================

/// The gate middleware, for `axum::middleware::from_fn_with_state`
pub async fn auth_gate<S>(
    State(state): State<AuthGateState<S>>,
    req: Request<Body>,
    next: Next,
) -> Response
where
    S: AuthStore,
{
    let gate = Arc::clone(&state.gate);

    if gate.mode == AuthMode::None {
        return next.run(req).await;
    }

    if let Some(skipper) = &gate.skipper {
        if skipper(&req) {
            tracing::trace!(auth_mode = %gate.mode, "Skipping auth gate, allowing request");
            return next.run(req).await;
        }
    }

    // An earlier gate in the chain already authenticated this request -
    // only the freshness and scope requirements of this group apply.
    if let Some(principal) = req.extensions().get::<AuthPrincipal>().cloned() {
        if !check_last_authenticated_at(&principal.user, gate.mode, &state.config, &*state.clock) {
            return AuthError::AuthenticationExpired.into_response();
        }
        if !principal.user.has_any_scope(&gate.scopes) {
            return AuthError::MissingScopes.into_response();
        }
        return next.run(req).await;
    }

    let (req, raw, exists) = match extract_token(req, &gate).await {
        Ok(extracted) => extracted,
        Err(response) => return response,
    };

    if raw.is_empty() {
        let reject = matches!(gate.mode, AuthMode::Required | AuthMode::Secure)
            || (exists && gate.mode == AuthMode::Optional);
        if reject {
            tracing::trace!(
                auth_mode = %gate.mode,
                token_exists = exists,
                "Request has missing or malformed token, rejecting"
            );
            return gate.failure_mode.response();
        }
        return next.run(req).await;
    }

    let format_ok = match &gate.format_validator {
        Some(validator) => validator(&raw),
        None => default_token_format_validator(&raw),
    };
    if !format_ok {
        if matches!(
            gate.mode,
            AuthMode::Required | AuthMode::Secure | AuthMode::Optional
        ) {
            tracing::trace!(auth_mode = %gate.mode, "Request has malformed token, rejecting");
            return AuthError::MalformedToken.into_response();
        }
        return next.run(req).await;
    }

    let token = match Uuid::parse_str(&raw) {
        Ok(token) => token,
        Err(_) => {
            // A custom format validator may accept values storage cannot
            // resolve; treat them like unknown tokens.
            if gate.mode == AuthMode::Try {
                return next.run(req).await;
            }
            return gate.failure_mode.response();
        }
    };

    let resolved = match CheckTokenUseCase::new(Arc::clone(&state.store))
        .resolve(token)
        .await
    {
        Ok(Some(resolved)) => resolved,
        Ok(None) => {
            if gate.mode == AuthMode::Try {
                tracing::trace!("Token not found, but auth mode permits access, allowing request");
                return next.run(req).await;
            }
            tracing::trace!("Token not found, rejecting request");
            return gate.failure_mode.response();
        }
        Err(err) => {
            // A store failure is not an authentication decision - it always
            // surfaces, whatever the mode.
            return err.into_response();
        }
    };

    let now = state.clock.now();
    if resolved.token.is_expired(now) {
        if gate.mode == AuthMode::Try {
            tracing::trace!(
                valid_until = %resolved.token.valid_until,
                "Token is expired, but auth mode permits access, allowing request"
            );
            return next.run(req).await;
        }
        tracing::trace!(valid_until = %resolved.token.valid_until, "Token is expired, rejecting request");
        return gate.failure_mode.response();
    }

    // Deactivation is absolute - no mode lets a deactivated user through
    if !resolved.user.is_active {
        tracing::trace!(user_id = %resolved.user.id, "User is deactivated, rejecting request");
        return AuthError::UserDeactivated.into_response();
    }

    if !check_last_authenticated_at(&resolved.user, gate.mode, &state.config, &*state.clock) {
        tracing::trace!(
            user_id = %resolved.user.id,
            "Last authentication exceeds threshold, rejecting request"
        );
        return AuthError::AuthenticationExpired.into_response();
    }

    if !resolved.user.has_any_scope(&gate.scopes) {
        tracing::trace!(
            user_id = %resolved.user.id,
            required_scopes = ?gate.scopes,
            "User does not have required scopes, rejecting request"
        );
        return AuthError::MissingScopes.into_response();
    }

    tracing::debug!(user_id = %resolved.user.id, "Authenticated request");

    let mut req = req;
    req.extensions_mut().insert(AuthPrincipal {
        user: resolved.user,
        token: resolved.token.token,
    });

    next.run(req).await
}

// ============================================================================
// Helpers
// ============================================================================

/// Pull the raw token string out of the configured source.
///
/// Returns `(request, token, exists)`: `exists` is true when the source
/// carried *something*, even if the scheme made it unusable - `Optional`
/// mode rejects present-but-malformed credentials while allowing absence.
async fn extract_token(
    req: Request<Body>,
    gate: &AuthGateConfig,
) -> Result<(Request<Body>, String, bool), Response> {
    match gate.token_source {
        AuthTokenSource::Header => {
            let raw = req
                .headers()
                .get(&gate.token_source_key)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            let (token, exists) = strip_scheme(&raw, &gate.scheme);
            Ok((req, token, exists))
        }
        AuthTokenSource::Query => {
            let raw = req
                .uri()
                .query()
                .and_then(|query| {
                    serde_urlencoded::from_str::<Vec<(String, String)>>(query).ok()
                })
                .and_then(|pairs| {
                    pairs
                        .into_iter()
                        .find(|(key, _)| key == &gate.token_source_key)
                        .map(|(_, value)| value)
                })
                .unwrap_or_default();
            let (token, exists) = strip_scheme(&raw, &gate.scheme);
            Ok((req, token, exists))
        }
        AuthTokenSource::Form => {
            let (parts, body) = req.into_parts();
            let bytes = to_bytes(body, FORM_BODY_LIMIT)
                .await
                .map_err(|_| AppError::bad_request("Failed to read request body").into_response())?;

            let raw = serde_urlencoded::from_bytes::<Vec<(String, String)>>(&bytes)
                .ok()
                .and_then(|pairs| {
                    pairs
                        .into_iter()
                        .find(|(key, _)| key == &gate.token_source_key)
                        .map(|(_, value)| value)
                })
                .unwrap_or_default();

            // Hand the buffered body back to the handler chain
            let req = Request::from_parts(parts, Body::from(bytes));
            let (token, exists) = strip_scheme(&raw, &gate.scheme);
            Ok((req, token, exists))
        }
    }
}

/// Strip the scheme prefix off a raw source value.
///
/// An empty raw value is "nothing presented". A present value that is too
/// short or carries the wrong scheme yields an empty token with
/// `exists = true`.
fn strip_scheme(raw: &str, scheme: &str) -> (String, bool) {
    if raw.is_empty() {
        return (String::new(), false);
    }

    if scheme.is_empty() {
        return (raw.to_string(), true);
    }

    match raw.strip_prefix(scheme) {
        Some(rest) => match rest.get(1..) {
            Some(token) => (token.to_string(), true),
            None => (String::new(), true),
        },
        None => (String::new(), true),
    }
}

fn check_last_authenticated_at(
    user: &User,
    mode: AuthMode,
    config: &AuthConfig,
    clock: &dyn Clock,
) -> bool {
    if mode != AuthMode::Secure {
        return true;
    }

    let Some(last_authenticated_at) = user.last_authenticated_at else {
        return false;
    };

    let Ok(threshold) = chrono::Duration::from_std(config.last_authenticated_at_threshold) else {
        return false;
    };

    clock.now().signed_duration_since(last_authenticated_at) <= threshold
}
