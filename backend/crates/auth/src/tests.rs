//! Service and gate test suite
//!
//! Runs against the in-memory store with a manually driven clock, so every
//! debounce/reuse/expiry window is exercised under simulated time.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use kernel::id::UserId;
use uuid::Uuid;

use platform::clock::{Clock, ManualClock};
use platform::password::Argon2Params;

use crate::application::authenticate::LoginResult;
use crate::application::{
    AccountUseCase, AuthConfig, LoginUseCase, PasswordUseCase, PushTokenUseCase, RegisterUseCase,
};
use crate::domain::entity::{AccessToken, User};
use crate::domain::repository::{AuthStore, AuthStoreTx};
use crate::domain::value_object::Username;
use crate::error::AuthError;
use crate::infra::memory::MemAuthStore;

const USERNAME: &str = "a@example.com";
const PASSWORD: &str = "correct horse battery staple";

fn test_config() -> AuthConfig {
    AuthConfig {
        access_token_validity: StdDuration::from_secs(86_400),
        password_reset_token_validity: StdDuration::from_secs(900),
        password_reset_token_debounce: StdDuration::from_secs(60),
        password_reset_token_reuse: StdDuration::from_secs(600),
        confirmation_token_validity: StdDuration::from_secs(86_400),
        confirmation_token_debounce: StdDuration::from_secs(60),
        last_authenticated_at_threshold: StdDuration::from_secs(900),
        default_user_scopes: vec!["app".to_string()],
        registration_requires_confirmation: false,
        // Lightweight parameters keep the suite fast
        hashing_params: Argon2Params {
            memory_kib: 1024,
            time_cost: 1,
            parallelism: 1,
            key_length: 32,
            salt_length: 16,
        },
    }
}

struct TestEnv {
    store: Arc<MemAuthStore>,
    config: Arc<AuthConfig>,
    clock: Arc<ManualClock>,
}

impl TestEnv {
    fn new() -> Self {
        Self::with_config(test_config())
    }

    fn with_config(config: AuthConfig) -> Self {
        Self {
            store: Arc::new(MemAuthStore::new()),
            config: Arc::new(config),
            clock: Arc::new(ManualClock::new(Utc::now())),
        }
    }

    fn clock_dyn(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock) as Arc<dyn Clock>
    }

    fn register(&self) -> RegisterUseCase<MemAuthStore> {
        RegisterUseCase::new(
            Arc::clone(&self.store),
            Arc::clone(&self.config),
            self.clock_dyn(),
        )
    }

    fn login(&self) -> LoginUseCase<MemAuthStore> {
        LoginUseCase::new(
            Arc::clone(&self.store),
            Arc::clone(&self.config),
            self.clock_dyn(),
        )
    }

    fn password(&self) -> PasswordUseCase<MemAuthStore> {
        PasswordUseCase::new(
            Arc::clone(&self.store),
            Arc::clone(&self.config),
            self.clock_dyn(),
        )
    }

    fn account(&self) -> AccountUseCase<MemAuthStore> {
        AccountUseCase::new(
            Arc::clone(&self.store),
            Arc::clone(&self.config),
            self.clock_dyn(),
        )
    }

    fn push(&self) -> PushTokenUseCase<MemAuthStore> {
        PushTokenUseCase::new(
            Arc::clone(&self.store),
            Arc::clone(&self.config),
            self.clock_dyn(),
        )
    }

    async fn user_id(&self, username: &str) -> UserId {
        self.store
            .find_user_by_username(&Username::new(username).unwrap())
            .await
            .unwrap()
            .expect("user should exist")
            .id
    }

    async fn register_and_login(&self) -> (UserId, LoginResult) {
        self.register().execute(USERNAME, PASSWORD).await.unwrap();
        let result = self.login().execute(USERNAME, PASSWORD).await.unwrap();
        (self.user_id(USERNAME).await, result)
    }

    async fn deactivate(&self, user_id: UserId) {
        let mut tx = self.store.begin().await.unwrap();
        tx.update_user_activation(user_id, false, false, self.clock.now())
            .await
            .unwrap();
        tx.commit().await.unwrap();
    }

    /// Insert a user without a password credential (federated identity)
    async fn insert_passwordless_user(&self, username: &str) -> UserId {
        let now = self.clock.now();
        let user = User {
            id: UserId::new(),
            username: Some(Username::new(username).unwrap()),
            password_hash: None,
            is_active: true,
            requires_confirmation: false,
            scopes: vec!["app".to_string()],
            last_authenticated_at: None,
            created_at: now,
            updated_at: now,
        };
        let mut tx = self.store.begin().await.unwrap();
        tx.insert_user(&user).await.unwrap();
        tx.commit().await.unwrap();
        user.id
    }
}

// ============================================================================
// Registration
// ============================================================================

mod register_tests {
    use super::*;

    #[tokio::test]
    async fn test_register_then_login_round_trip() {
        let env = TestEnv::new();

        let outcome = env.register().execute(USERNAME, "pw1-long-enough").await.unwrap();
        assert!(!outcome.requires_confirmation);
        assert!(outcome.confirmation_token.is_none());

        let result = env.login().execute(USERNAME, "pw1-long-enough").await.unwrap();
        assert_eq!(result.token_type, "bearer");
        assert_eq!(result.expires_in, env.config.access_token_validity_secs());

        // The stored access token expires exactly at now + validity
        let user_id = env.user_id(USERNAME).await;
        let tokens = env.store.access_tokens_of(user_id);
        assert_eq!(tokens.len(), 1);
        assert_eq!(
            tokens[0].valid_until,
            env.clock.now() + Duration::seconds(86_400)
        );
        assert_eq!(env.store.refresh_tokens_of(user_id).len(), 1);
    }

    #[tokio::test]
    async fn test_register_creates_profile() {
        let env = TestEnv::new();
        env.register().execute(USERNAME, PASSWORD).await.unwrap();

        let user_id = env.user_id(USERNAME).await;
        assert!(env.store.profile_exists(user_id));
        assert!(env.account().profile(user_id).await.is_ok());
    }

    #[tokio::test]
    async fn test_register_conflict_for_confirmed_user() {
        let env = TestEnv::new();
        env.register().execute(USERNAME, PASSWORD).await.unwrap();

        let err = env
            .register()
            .execute("A@EXAMPLE.COM", "other-password")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::UserAlreadyExists));
    }

    #[tokio::test]
    async fn test_register_with_confirmation_flow() {
        let mut config = test_config();
        config.registration_requires_confirmation = true;
        let env = TestEnv::with_config(config);

        let outcome = env.register().execute(USERNAME, PASSWORD).await.unwrap();
        assert!(outcome.requires_confirmation);
        let token = outcome.confirmation_token.expect("token should be issued");

        // Unconfirmed users cannot log in
        let user_id = env.user_id(USERNAME).await;
        assert!(matches!(
            env.login().execute(USERNAME, PASSWORD).await.unwrap_err(),
            AuthError::UserDeactivated
        ));

        let result = env.register().complete(token).await.unwrap();
        assert_eq!(result.token_type, "bearer");

        let user = env.store.user(user_id).unwrap();
        assert!(user.is_active);
        assert!(!user.requires_confirmation);
        // Consumed token is gone
        assert!(env.store.confirmation_tokens_of(user_id).is_empty());

        env.login().execute(USERNAME, PASSWORD).await.unwrap();
    }

    #[tokio::test]
    async fn test_complete_register_unknown_token() {
        let env = TestEnv::new();
        let err = env.register().complete(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AuthError::TokenNotFound));
    }

    #[tokio::test]
    async fn test_complete_register_expired_token() {
        let mut config = test_config();
        config.registration_requires_confirmation = true;
        let env = TestEnv::with_config(config);

        let outcome = env.register().execute(USERNAME, PASSWORD).await.unwrap();
        let token = outcome.confirmation_token.unwrap();

        env.clock.advance(Duration::seconds(86_401));

        let err = env.register().complete(token).await.unwrap_err();
        assert!(matches!(err, AuthError::TokenNotFound));
    }

    #[tokio::test]
    async fn test_confirmation_debounce_and_reissue() {
        let mut config = test_config();
        config.registration_requires_confirmation = true;
        let env = TestEnv::with_config(config);

        env.register().execute(USERNAME, PASSWORD).await.unwrap();
        let user_id = env.user_id(USERNAME).await;
        assert_eq!(env.store.confirmation_tokens_of(user_id).len(), 1);

        // Re-register inside the debounce window: pending state, no new token
        env.clock.advance(Duration::seconds(30));
        let outcome = env.register().execute(USERNAME, PASSWORD).await.unwrap();
        assert!(outcome.requires_confirmation);
        assert!(outcome.confirmation_token.is_none());
        assert_eq!(env.store.confirmation_tokens_of(user_id).len(), 1);

        // Past the debounce window a fresh token is minted
        env.clock.advance(Duration::seconds(31));
        let outcome = env.register().execute(USERNAME, PASSWORD).await.unwrap();
        assert!(outcome.confirmation_token.is_some());
        assert_eq!(env.store.confirmation_tokens_of(user_id).len(), 2);
    }

    #[tokio::test]
    async fn test_complete_register_idempotent_for_active_user() {
        let mut config = test_config();
        config.registration_requires_confirmation = true;
        let env = TestEnv::with_config(config);

        let outcome = env.register().execute(USERNAME, PASSWORD).await.unwrap();
        env.register()
            .complete(outcome.confirmation_token.unwrap())
            .await
            .unwrap();

        // A leftover valid token for the now-active user still authenticates
        let user_id = env.user_id(USERNAME).await;
        let leftover = crate::domain::entity::ConfirmationToken::new(
            user_id,
            env.clock.now() + Duration::seconds(3600),
            env.clock.now(),
        );
        let mut tx = env.store.begin().await.unwrap();
        tx.insert_confirmation_token(&leftover).await.unwrap();
        tx.commit().await.unwrap();

        let result = env.register().complete(leftover.token).await.unwrap();
        assert_eq!(result.token_type, "bearer");
    }
}

// ============================================================================
// Login / refresh / logout
// ============================================================================

mod login_tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_user_and_wrong_password_are_identical() {
        let env = TestEnv::new();
        env.register().execute(USERNAME, PASSWORD).await.unwrap();

        let unknown = env
            .login()
            .execute("nobody@example.com", PASSWORD)
            .await
            .unwrap_err();
        let wrong = env
            .login()
            .execute(USERNAME, "wrong password entirely")
            .await
            .unwrap_err();

        assert!(matches!(unknown, AuthError::Unauthorized));
        assert!(matches!(wrong, AuthError::Unauthorized));
        assert_eq!(unknown.to_string(), wrong.to_string());
    }

    #[tokio::test]
    async fn test_passwordless_user_cannot_login() {
        let env = TestEnv::new();
        env.insert_passwordless_user("sso@example.com").await;

        let err = env
            .login()
            .execute("sso@example.com", "anything at all")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Unauthorized));
    }

    #[tokio::test]
    async fn test_deactivated_user_cannot_login() {
        let env = TestEnv::new();
        let (user_id, _) = env.register_and_login().await;
        env.deactivate(user_id).await;

        let err = env.login().execute(USERNAME, PASSWORD).await.unwrap_err();
        assert!(matches!(err, AuthError::UserDeactivated));
    }

    #[tokio::test]
    async fn test_login_is_case_insensitive_on_username() {
        let env = TestEnv::new();
        env.register().execute(USERNAME, PASSWORD).await.unwrap();
        env.login()
            .execute("  A@Example.COM  ", PASSWORD)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_refresh_rotation() {
        let env = TestEnv::new();
        let (user_id, first) = env.register_and_login().await;

        let result = env.login().refresh(first.refresh_token).await.unwrap();
        assert_ne!(result.refresh_token, first.refresh_token);

        // The rotated refresh token is gone, exactly one new one exists
        let refresh = env.store.refresh_tokens_of(user_id);
        assert_eq!(refresh.len(), 1);
        assert_eq!(refresh[0].token, result.refresh_token);

        // The old access token survives rotation
        let access: Vec<Uuid> = env
            .store
            .access_tokens_of(user_id)
            .iter()
            .map(|t| t.token)
            .collect();
        assert_eq!(access.len(), 2);
        assert!(access.contains(&first.access_token));
        assert!(access.contains(&result.access_token));
    }

    #[tokio::test]
    async fn test_rotated_refresh_token_cannot_be_reused() {
        let env = TestEnv::new();
        let (_, first) = env.register_and_login().await;

        env.login().refresh(first.refresh_token).await.unwrap();

        let err = env.login().refresh(first.refresh_token).await.unwrap_err();
        assert!(matches!(err, AuthError::Unauthorized));
    }

    #[tokio::test]
    async fn test_refresh_rejected_for_deactivated_user() {
        let env = TestEnv::new();
        let (user_id, first) = env.register_and_login().await;
        env.deactivate(user_id).await;

        let err = env.login().refresh(first.refresh_token).await.unwrap_err();
        assert!(matches!(err, AuthError::UserDeactivated));
    }

    #[tokio::test]
    async fn test_logout_deletes_tokens_and_is_idempotent() {
        let env = TestEnv::new();
        let (user_id, result) = env.register_and_login().await;

        env.login()
            .logout(result.access_token, Some(result.refresh_token))
            .await
            .unwrap();
        assert!(env.store.access_tokens_of(user_id).is_empty());
        assert!(env.store.refresh_tokens_of(user_id).is_empty());

        // Logging out again with the same values still succeeds
        env.login()
            .logout(result.access_token, Some(result.refresh_token))
            .await
            .unwrap();
    }
}

// ============================================================================
// Password change / reset
// ============================================================================

mod password_tests {
    use super::*;

    #[tokio::test]
    async fn test_password_change_invalidates_every_token() {
        let env = TestEnv::new();
        let (user_id, _) = env.register_and_login().await;
        env.login().execute(USERNAME, PASSWORD).await.unwrap();
        assert_eq!(env.store.access_tokens_of(user_id).len(), 2);

        let user = env.store.user(user_id).unwrap();
        let result = env
            .password()
            .update(&user, PASSWORD, "brand new password 42", false)
            .await
            .unwrap();

        // Exactly one fresh pair remains
        let access = env.store.access_tokens_of(user_id);
        let refresh = env.store.refresh_tokens_of(user_id);
        assert_eq!(access.len(), 1);
        assert_eq!(refresh.len(), 1);
        assert_eq!(access[0].token, result.access_token);
        assert_eq!(refresh[0].token, result.refresh_token);

        // Only the new password logs in
        assert!(matches!(
            env.login().execute(USERNAME, PASSWORD).await.unwrap_err(),
            AuthError::Unauthorized
        ));
        env.login()
            .execute(USERNAME, "brand new password 42")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_password_change_rejects_wrong_current_password() {
        let env = TestEnv::new();
        let (user_id, _) = env.register_and_login().await;
        let user = env.store.user(user_id).unwrap();

        let err = env
            .password()
            .update(&user, "not the password", "whatever new", false)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Unauthorized));
    }

    #[tokio::test]
    async fn test_password_change_skip_verification() {
        let env = TestEnv::new();
        let (user_id, _) = env.register_and_login().await;
        let user = env.store.user(user_id).unwrap();

        env.password()
            .update(&user, "ignored", "administratively set", true)
            .await
            .unwrap();
        env.login()
            .execute(USERNAME, "administratively set")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_password_change_rejects_non_local_user() {
        let env = TestEnv::new();
        let user_id = env.insert_passwordless_user("sso@example.com").await;
        let user = env.store.user(user_id).unwrap();

        let err = env
            .password()
            .update(&user, "", "new password", false)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::NotLocalUser));
    }

    #[tokio::test]
    async fn test_reset_debounce() {
        let env = TestEnv::new();
        let (user_id, _) = env.register_and_login().await;

        let first = env.password().init_reset(USERNAME).await.unwrap();
        assert!(first.reset_token.is_some());

        // Within the debounce window: no token, no send signal
        env.clock.advance(Duration::seconds(30));
        let second = env.password().init_reset(USERNAME).await.unwrap();
        assert!(second.reset_token.is_none());
        assert_eq!(env.store.password_reset_tokens_of(user_id).len(), 1);
    }

    #[tokio::test]
    async fn test_reset_reuse_window_returns_same_token() {
        let env = TestEnv::new();
        let (user_id, _) = env.register_and_login().await;

        let first = env.password().init_reset(USERNAME).await.unwrap();
        let first_token = first.reset_token.unwrap();

        // Past debounce, within reuse: the same secret comes back
        env.clock.advance(Duration::seconds(120));
        let third = env.password().init_reset(USERNAME).await.unwrap();
        assert_eq!(third.reset_token, Some(first_token));
        assert_eq!(env.store.password_reset_tokens_of(user_id).len(), 1);

        // Past the reuse window a new secret is minted
        env.clock.advance(Duration::seconds(600));
        let fourth = env.password().init_reset(USERNAME).await.unwrap();
        assert_ne!(fourth.reset_token, Some(first_token));
        assert_eq!(env.store.password_reset_tokens_of(user_id).len(), 2);
    }

    #[tokio::test]
    async fn test_init_reset_is_enumeration_resistant() {
        let env = TestEnv::new();
        let (user_id, _) = env.register_and_login().await;

        // Unknown user: empty success
        let unknown = env
            .password()
            .init_reset("unknown@example.com")
            .await
            .unwrap();
        assert!(unknown.reset_token.is_none());

        // Passwordless user: empty success
        env.insert_passwordless_user("sso@example.com").await;
        let passwordless = env.password().init_reset("sso@example.com").await.unwrap();
        assert!(passwordless.reset_token.is_none());

        // Deactivated user: empty success
        env.deactivate(user_id).await;
        let deactivated = env.password().init_reset(USERNAME).await.unwrap();
        assert!(deactivated.reset_token.is_none());

        // Invalid username input: still empty success
        let invalid = env.password().init_reset("   ").await.unwrap();
        assert!(invalid.reset_token.is_none());
    }

    #[tokio::test]
    async fn test_reset_password_flow_consumes_token() {
        let env = TestEnv::new();
        let (user_id, _) = env.register_and_login().await;

        let token = env
            .password()
            .init_reset(USERNAME)
            .await
            .unwrap()
            .reset_token
            .unwrap();

        let result = env
            .password()
            .reset(token, "recovered password 9")
            .await
            .unwrap();
        assert_eq!(result.token_type, "bearer");

        // Token consumed, prior sessions invalidated, new password active
        assert!(env.store.password_reset_tokens_of(user_id).is_empty());
        assert_eq!(env.store.access_tokens_of(user_id).len(), 1);
        env.login()
            .execute(USERNAME, "recovered password 9")
            .await
            .unwrap();

        let err = env
            .password()
            .reset(token, "again different")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::TokenNotFound));
    }

    #[tokio::test]
    async fn test_reset_password_expired_token() {
        let env = TestEnv::new();
        env.register_and_login().await;

        let token = env
            .password()
            .init_reset(USERNAME)
            .await
            .unwrap()
            .reset_token
            .unwrap();

        env.clock.advance(Duration::seconds(901));

        let err = env
            .password()
            .reset(token, "too late password")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::TokenExpired));
    }

    #[tokio::test]
    async fn test_reset_password_unknown_token() {
        let env = TestEnv::new();
        let err = env
            .password()
            .reset(Uuid::new_v4(), "whatever")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::TokenNotFound));
    }
}

// ============================================================================
// Account deletion / push tokens
// ============================================================================

mod account_tests {
    use super::*;

    #[tokio::test]
    async fn test_delete_account_cascades_everything() {
        let env = TestEnv::new();
        let (user_id, _) = env.register_and_login().await;
        let user = env.store.user(user_id).unwrap();

        env.push()
            .update(&user, "device-token-1", "fcm", None)
            .await
            .unwrap();
        env.password().init_reset(USERNAME).await.unwrap();

        env.account().delete(&user, PASSWORD).await.unwrap();

        assert!(env.store.user(user_id).is_none());
        assert!(!env.store.profile_exists(user_id));
        assert!(env.store.access_tokens_of(user_id).is_empty());
        assert!(env.store.refresh_tokens_of(user_id).is_empty());
        assert!(env.store.password_reset_tokens_of(user_id).is_empty());
        assert!(env.store.push_tokens_of(user_id).is_empty());
    }

    #[tokio::test]
    async fn test_delete_account_wrong_password_deletes_nothing() {
        let env = TestEnv::new();
        let (user_id, _) = env.register_and_login().await;
        let user = env.store.user(user_id).unwrap();

        let err = env.account().delete(&user, "wrong").await.unwrap_err();
        assert!(matches!(err, AuthError::Unauthorized));

        assert!(env.store.user(user_id).is_some());
        assert!(env.store.profile_exists(user_id));
        assert!(!env.store.access_tokens_of(user_id).is_empty());
    }

    #[tokio::test]
    async fn test_push_token_register_and_swap() {
        let env = TestEnv::new();
        let (user_id, _) = env.register_and_login().await;
        let user = env.store.user(user_id).unwrap();

        env.push()
            .update(&user, "device-token-1", "fcm", None)
            .await
            .unwrap();

        // The same value cannot be registered twice
        let err = env
            .push()
            .update(&user, "device-token-1", "fcm", None)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::PushTokenInUse));

        // Swap replaces the old row in one transaction
        env.push()
            .update(&user, "device-token-2", "fcm", Some("device-token-1"))
            .await
            .unwrap();
        let tokens = env.store.push_tokens_of(user_id);
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].token, "device-token-2");
    }

    #[tokio::test]
    async fn test_push_token_swap_with_unknown_old_token_rolls_back() {
        let env = TestEnv::new();
        let (user_id, _) = env.register_and_login().await;
        let user = env.store.user(user_id).unwrap();

        let err = env
            .push()
            .update(&user, "device-token-9", "fcm", Some("never-registered"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::TokenNotFound));

        // The failed swap must not leave the new token behind
        assert!(env.store.push_tokens_of(user_id).is_empty());
    }
}

// ============================================================================
// Auth gate
// ============================================================================

mod gate_tests {
    use super::*;

    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use axum::routing::get;
    use axum::{Router, middleware};
    use tower::ServiceExt;

    use crate::presentation::middleware::{
        AuthFailureMode, AuthGateConfig, AuthGateState, AuthMode, AuthPrincipal, AuthTokenSource,
        auth_gate,
    };

    async fn probe(req: Request<Body>) -> String {
        match req.extensions().get::<AuthPrincipal>() {
            Some(principal) => format!("user:{}", principal.user.id),
            None => "anonymous".to_string(),
        }
    }

    fn gate_router(env: &TestEnv, gate: AuthGateConfig) -> Router {
        let state = AuthGateState {
            store: Arc::clone(&env.store),
            config: Arc::clone(&env.config),
            clock: env.clock_dyn(),
            gate: Arc::new(gate),
        };

        Router::new()
            .route("/probe", get(probe).post(probe))
            .layer(middleware::from_fn_with_state(
                state,
                auth_gate::<MemAuthStore>,
            ))
    }

    fn bearer_request(token: &str) -> Request<Body> {
        Request::builder()
            .uri("/probe")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap()
    }

    fn anonymous_request() -> Request<Body> {
        Request::builder()
            .uri("/probe")
            .body(Body::empty())
            .unwrap()
    }

    async fn body_string(response: axum::response::Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), 1 << 16)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_required_rejects_missing_token() {
        let env = TestEnv::new();
        let router = gate_router(&env, AuthGateConfig::default());

        let response = router.oneshot(anonymous_request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_required_accepts_valid_token_and_sets_principal() {
        let env = TestEnv::new();
        let (user_id, result) = env.register_and_login().await;
        let router = gate_router(&env, AuthGateConfig::default());

        let response = router
            .oneshot(bearer_request(&result.access_token.to_string()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, format!("user:{user_id}"));
    }

    #[tokio::test]
    async fn test_failure_mode_not_found() {
        let env = TestEnv::new();
        let gate = AuthGateConfig {
            failure_mode: AuthFailureMode::NotFound,
            ..AuthGateConfig::default()
        };
        let router = gate_router(&env, gate);

        let response = router.oneshot(anonymous_request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unknown_token_rejected_but_tolerated_under_try() {
        let env = TestEnv::new();
        let token = Uuid::new_v4().to_string();

        let required = gate_router(&env, AuthGateConfig::default());
        let response = required.oneshot(bearer_request(&token)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let tried = gate_router(&env, AuthGateConfig::with_mode(AuthMode::Try));
        let response = tried.oneshot(bearer_request(&token)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "anonymous");
    }

    #[tokio::test]
    async fn test_malformed_token_rejected_except_under_try() {
        let env = TestEnv::new();

        for mode in [AuthMode::Required, AuthMode::Secure, AuthMode::Optional] {
            let router = gate_router(&env, AuthGateConfig::with_mode(mode));
            let response = router.oneshot(bearer_request("not-a-uuid")).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "mode {mode}");
        }

        let tried = gate_router(&env, AuthGateConfig::with_mode(AuthMode::Try));
        let response = tried.oneshot(bearer_request("not-a-uuid")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_expired_token_rejected_but_tolerated_under_try() {
        let env = TestEnv::new();
        let (_, result) = env.register_and_login().await;
        let token = result.access_token.to_string();

        env.clock.advance(Duration::seconds(86_401));

        let required = gate_router(&env, AuthGateConfig::default());
        let response = required.oneshot(bearer_request(&token)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let tried = gate_router(&env, AuthGateConfig::with_mode(AuthMode::Try));
        let response = tried.oneshot(bearer_request(&token)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "anonymous");
    }

    #[tokio::test]
    async fn test_deactivated_user_rejected_in_every_mode() {
        let env = TestEnv::new();
        let (user_id, result) = env.register_and_login().await;
        let token = result.access_token.to_string();
        env.deactivate(user_id).await;

        for mode in [
            AuthMode::Required,
            AuthMode::Secure,
            AuthMode::Optional,
            AuthMode::Try,
        ] {
            let router = gate_router(&env, AuthGateConfig::with_mode(mode));
            let response = router.oneshot(bearer_request(&token)).await.unwrap();
            assert_eq!(response.status(), StatusCode::FORBIDDEN, "mode {mode}");
        }
    }

    #[tokio::test]
    async fn test_optional_allows_absence_but_not_malformed_scheme() {
        let env = TestEnv::new();
        let router = gate_router(&env, AuthGateConfig::with_mode(AuthMode::Optional));

        let response = router.clone().oneshot(anonymous_request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "anonymous");

        // Present header with the wrong scheme: credential exists, reject
        let request = Request::builder()
            .uri("/probe")
            .header(header::AUTHORIZATION, "Basic dXNlcjpwYXNz")
            .body(Body::empty())
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_secure_mode_enforces_freshness() {
        let env = TestEnv::new();
        let (_, result) = env.register_and_login().await;
        let token = result.access_token.to_string();

        let router = gate_router(&env, AuthGateConfig::with_mode(AuthMode::Secure));
        let response = router.clone().oneshot(bearer_request(&token)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        // Stale authentication: within token validity but past the threshold
        env.clock.advance(Duration::seconds(901));
        let response = router.oneshot(bearer_request(&token)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_scope_membership() {
        let env = TestEnv::new();
        let (_, result) = env.register_and_login().await;
        let token = result.access_token.to_string();

        // Users hold the default "app" scope, not "admin"
        let admin_gate = AuthGateConfig {
            scopes: vec!["admin".to_string()],
            ..AuthGateConfig::default()
        };
        let router = gate_router(&env, admin_gate);
        let response = router.oneshot(bearer_request(&token)).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        // An empty requirement always passes
        let open_gate = AuthGateConfig {
            scopes: vec![],
            ..AuthGateConfig::default()
        };
        let router = gate_router(&env, open_gate);
        let response = router.oneshot(bearer_request(&token)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_query_token_source() {
        let env = TestEnv::new();
        let (user_id, result) = env.register_and_login().await;

        let gate = AuthGateConfig {
            token_source: AuthTokenSource::Query,
            token_source_key: "access_token".to_string(),
            scheme: String::new(),
            ..AuthGateConfig::default()
        };
        let router = gate_router(&env, gate);

        let request = Request::builder()
            .uri(format!("/probe?access_token={}", result.access_token))
            .body(Body::empty())
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, format!("user:{user_id}"));
    }

    #[tokio::test]
    async fn test_form_token_source() {
        let env = TestEnv::new();
        let (user_id, result) = env.register_and_login().await;

        let gate = AuthGateConfig {
            token_source: AuthTokenSource::Form,
            token_source_key: "access_token".to_string(),
            scheme: String::new(),
            ..AuthGateConfig::default()
        };
        let router = gate_router(&env, gate);

        let request = Request::builder()
            .uri("/probe")
            .method("POST")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(format!("access_token={}", result.access_token)))
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, format!("user:{user_id}"));
    }

    #[tokio::test]
    async fn test_skipper_bypasses_gate() {
        let env = TestEnv::new();
        let gate = AuthGateConfig {
            skipper: Some(Arc::new(|req: &Request<Body>| {
                req.uri().path() == "/probe"
            })),
            ..AuthGateConfig::default()
        };
        let router = gate_router(&env, gate);

        let response = router.oneshot(anonymous_request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "anonymous");
    }

    #[tokio::test]
    async fn test_mode_none_passes_through() {
        let env = TestEnv::new();
        let router = gate_router(&env, AuthGateConfig::with_mode(AuthMode::None));

        let response = router
            .oneshot(bearer_request("complete garbage, never inspected"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "anonymous");
    }

    #[tokio::test]
    async fn test_seeded_token_without_user_is_unknown() {
        let env = TestEnv::new();

        // An access token whose user vanished resolves to nothing
        let orphan = AccessToken::new(
            UserId::new(),
            env.clock.now() + Duration::seconds(3600),
            env.clock.now(),
        );
        let mut tx = env.store.begin().await.unwrap();
        tx.insert_access_token(&orphan).await.unwrap();
        tx.commit().await.unwrap();

        let router = gate_router(&env, AuthGateConfig::default());
        let response = router
            .oneshot(bearer_request(&orphan.token.to_string()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
