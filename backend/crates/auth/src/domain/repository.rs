//! Store Traits
//!
//! Interfaces for data persistence. Implementations live in the
//! infrastructure layer.
//!
//! The split follows the transaction boundary: [`AuthStore`] carries the
//! read paths that run outside transactions plus `begin()`, and
//! [`AuthStoreTx`] carries every mutation (and the reads that must observe
//! uncommitted state). Dropping an uncommitted transaction rolls it back;
//! a panic inside a transaction body therefore rolls back and propagates.
//!
//! Every "currently valid" read takes the caller's `now` - the store itself
//! never consults a clock, which keeps the whole service testable under
//! simulated time.

use chrono::{DateTime, Utc};
use kernel::id::UserId;
use uuid::Uuid;

use crate::domain::entity::{
    AccessToken, AppUserProfile, ConfirmationToken, PasswordResetToken, PushToken, RefreshToken,
    User,
};
use crate::domain::value_object::Username;
use crate::error::AuthResult;

/// Store trait: transaction entry point and pool-level reads
#[trait_variant::make(AuthStore: Send)]
pub trait LocalAuthStore: Clone + Send + Sync + 'static {
    type Tx: AuthStoreTx;

    /// Begin a transaction
    async fn begin(&self) -> AuthResult<Self::Tx>;

    /// Find a user by canonical username
    async fn find_user_by_username(&self, username: &Username) -> AuthResult<Option<User>>;

    /// Find a user by id
    async fn find_user_by_id(&self, user_id: UserId) -> AuthResult<Option<User>>;

    /// Find an access token with its owning user
    async fn find_access_token(&self, token: Uuid) -> AuthResult<Option<(AccessToken, User)>>;

    /// Find a refresh token with its owning user
    async fn find_refresh_token(&self, token: Uuid) -> AuthResult<Option<(RefreshToken, User)>>;

    /// Find a password reset token with its owning user
    async fn find_password_reset_token(
        &self,
        token: Uuid,
    ) -> AuthResult<Option<(PasswordResetToken, User)>>;

    /// Whether a still-valid confirmation token created after `created_after`
    /// exists for the user (debounce check)
    async fn confirmation_token_in_window_exists(
        &self,
        user_id: UserId,
        created_after: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AuthResult<bool>;

    /// Whether a still-valid password reset token created after
    /// `created_after` exists for the user (debounce check)
    async fn password_reset_token_in_window_exists(
        &self,
        user_id: UserId,
        created_after: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AuthResult<bool>;

    /// Find the app user profile for a user
    async fn find_app_user_profile(&self, user_id: UserId) -> AuthResult<Option<AppUserProfile>>;
}

/// Transaction trait: mutations and in-transaction reads
#[trait_variant::make(AuthStoreTx: Send)]
pub trait LocalAuthStoreTx: Sized + Send {
    /// Commit the transaction. Dropping without committing rolls back.
    async fn commit(self) -> AuthResult<()>;

    // ------------------------------------------------------------------
    // Users / profiles
    // ------------------------------------------------------------------

    async fn insert_user(&mut self, user: &User) -> AuthResult<()>;

    async fn update_user_password(
        &mut self,
        user_id: UserId,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> AuthResult<()>;

    async fn update_user_activation(
        &mut self,
        user_id: UserId,
        is_active: bool,
        requires_confirmation: bool,
        now: DateTime<Utc>,
    ) -> AuthResult<()>;

    async fn update_user_last_authenticated_at(
        &mut self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> AuthResult<()>;

    /// Delete the user row; cascades to the profile and every token kind
    async fn delete_user(&mut self, user_id: UserId) -> AuthResult<()>;

    async fn insert_app_user_profile(&mut self, profile: &AppUserProfile) -> AuthResult<()>;

    // ------------------------------------------------------------------
    // Access / refresh tokens
    // ------------------------------------------------------------------

    async fn insert_access_token(&mut self, token: &AccessToken) -> AuthResult<()>;

    async fn delete_access_token(&mut self, token: Uuid) -> AuthResult<()>;

    async fn delete_access_tokens_by_user(&mut self, user_id: UserId) -> AuthResult<u64>;

    async fn insert_refresh_token(&mut self, token: &RefreshToken) -> AuthResult<()>;

    async fn delete_refresh_token(&mut self, token: Uuid) -> AuthResult<()>;

    async fn delete_refresh_tokens_by_user(&mut self, user_id: UserId) -> AuthResult<u64>;

    // ------------------------------------------------------------------
    // Confirmation tokens
    // ------------------------------------------------------------------

    async fn insert_confirmation_token(&mut self, token: &ConfirmationToken) -> AuthResult<()>;

    /// Find a non-expired confirmation token with its owning user
    async fn find_valid_confirmation_token(
        &mut self,
        token: Uuid,
        now: DateTime<Utc>,
    ) -> AuthResult<Option<(ConfirmationToken, User)>>;

    async fn delete_confirmation_token(&mut self, token: Uuid) -> AuthResult<()>;

    // ------------------------------------------------------------------
    // Password reset tokens
    // ------------------------------------------------------------------

    async fn insert_password_reset_token(&mut self, token: &PasswordResetToken) -> AuthResult<()>;

    /// Find a still-valid reset token created after `created_after`
    /// (reuse-window lookup)
    async fn find_reusable_password_reset_token(
        &mut self,
        user_id: UserId,
        created_after: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AuthResult<Option<PasswordResetToken>>;

    async fn delete_password_reset_token(&mut self, token: Uuid) -> AuthResult<()>;

    // ------------------------------------------------------------------
    // Push tokens
    // ------------------------------------------------------------------

    /// Whether any user already registered this push token value
    async fn push_token_exists(&mut self, token: &str) -> AuthResult<bool>;

    async fn insert_push_token(&mut self, token: &PushToken) -> AuthResult<()>;

    /// Delete the user's push token by value; returns whether a row existed
    async fn delete_push_token_of_user(
        &mut self,
        user_id: UserId,
        token: &str,
    ) -> AuthResult<bool>;
}
