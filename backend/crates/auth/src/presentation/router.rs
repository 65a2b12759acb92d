//! Auth Router

use axum::{
    Router, middleware,
    routing::{delete, get, post, put},
};
use std::sync::Arc;

use crate::domain::repository::AuthStore;
use crate::presentation::handlers::{self, AuthAppState};
use crate::presentation::middleware::{AuthGateConfig, AuthGateState, AuthMode, auth_gate};

/// Create the auth router.
///
/// Public routes carry no gate; token-bearing routes run behind `required`;
/// account deletion runs behind `secure` (recent authentication enforced).
pub fn auth_router<S>(state: AuthAppState<S>) -> Router
where
    S: AuthStore,
{
    let required = gate_state(&state, AuthGateConfig::default());
    let secure = gate_state(&state, AuthGateConfig::with_mode(AuthMode::Secure));

    let public = Router::new()
        .route("/register", post(handlers::register::<S>))
        .route("/register/confirm", post(handlers::complete_register::<S>))
        .route("/login", post(handlers::login::<S>))
        .route("/refresh", post(handlers::refresh::<S>))
        .route("/forgot-password", post(handlers::forgot_password::<S>))
        .route(
            "/forgot-password/complete",
            post(handlers::forgot_password_complete::<S>),
        );

    let protected = Router::new()
        .route("/logout", post(handlers::logout::<S>))
        .route("/change-password", post(handlers::change_password::<S>))
        .route("/userinfo", get(handlers::userinfo::<S>))
        .layer(middleware::from_fn_with_state(required, auth_gate::<S>));

    let account = Router::new()
        .route("/account", delete(handlers::delete_account::<S>))
        .layer(middleware::from_fn_with_state(secure, auth_gate::<S>));

    Router::new()
        .merge(public)
        .merge(protected)
        .merge(account)
        .with_state(state)
}

/// Create the push-token router (everything behind `required`).
pub fn push_router<S>(state: AuthAppState<S>) -> Router
where
    S: AuthStore,
{
    let required = gate_state(&state, AuthGateConfig::default());

    Router::new()
        .route("/token", put(handlers::update_push_token::<S>))
        .layer(middleware::from_fn_with_state(required, auth_gate::<S>))
        .with_state(state)
}

fn gate_state<S>(state: &AuthAppState<S>, gate: AuthGateConfig) -> AuthGateState<S>
where
    S: AuthStore,
{
    AuthGateState {
        store: Arc::clone(&state.store),
        config: Arc::clone(&state.config),
        clock: Arc::clone(&state.clock),
        gate: Arc::new(gate),
    }
}
