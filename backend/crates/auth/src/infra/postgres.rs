//! PostgreSQL Store Implementation

use chrono::{DateTime, Utc};
use kernel::id::UserId;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::entity::{
    AccessToken, AppUserProfile, ConfirmationToken, PasswordResetToken, PushToken, RefreshToken,
    User,
};
use crate::domain::repository::{AuthStore, AuthStoreTx};
use crate::domain::value_object::Username;
use crate::error::AuthResult;

/// PostgreSQL-backed auth store
#[derive(Clone)]
pub struct PgAuthStore {
    pool: PgPool,
}

impl PgAuthStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Remove expired access, confirmation and password reset tokens.
    ///
    /// Run at startup; refresh tokens have no expiry and survive until
    /// rotated or invalidated.
    pub async fn cleanup_expired(&self) -> AuthResult<(u64, u64, u64)> {
        let now = Utc::now();

        let access = sqlx::query("DELETE FROM access_tokens WHERE valid_until < $1")
            .bind(now)
            .execute(&self.pool)
            .await?
            .rows_affected();

        let confirmation = sqlx::query("DELETE FROM confirmation_tokens WHERE valid_until < $1")
            .bind(now)
            .execute(&self.pool)
            .await?
            .rows_affected();

        let reset = sqlx::query("DELETE FROM password_reset_tokens WHERE valid_until < $1")
            .bind(now)
            .execute(&self.pool)
            .await?
            .rows_affected();

        tracing::info!(
            access_tokens_deleted = access,
            confirmation_tokens_deleted = confirmation,
            password_reset_tokens_deleted = reset,
            "Cleaned up expired auth tokens"
        );

        Ok((access, confirmation, reset))
    }

    async fn find_user(&self, user_id: Uuid) -> AuthResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT
                id,
                username,
                password_hash,
                is_active,
                requires_confirmation,
                scopes,
                last_authenticated_at,
                created_at,
                updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(UserRow::into_user))
    }
}

// ============================================================================
// Store Implementation
// ============================================================================

impl AuthStore for PgAuthStore {
    type Tx = PgAuthTx;

    async fn begin(&self) -> AuthResult<PgAuthTx> {
        let tx = self.pool.begin().await?;
        Ok(PgAuthTx { tx })
    }

    async fn find_user_by_username(&self, username: &Username) -> AuthResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT
                id,
                username,
                password_hash,
                is_active,
                requires_confirmation,
                scopes,
                last_authenticated_at,
                created_at,
                updated_at
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(UserRow::into_user))
    }

    async fn find_user_by_id(&self, user_id: UserId) -> AuthResult<Option<User>> {
        self.find_user(user_id.into_uuid()).await
    }

    async fn find_access_token(&self, token: Uuid) -> AuthResult<Option<(AccessToken, User)>> {
        let row = sqlx::query_as::<_, AccessTokenRow>(
            r#"
            SELECT token, user_id, valid_until, created_at
            FROM access_tokens
            WHERE token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let user = self.find_user(row.user_id).await?;
        Ok(user.map(|user| (row.into_token(), user)))
    }

    async fn find_refresh_token(&self, token: Uuid) -> AuthResult<Option<(RefreshToken, User)>> {
        let row = sqlx::query_as::<_, RefreshTokenRow>(
            r#"
            SELECT token, user_id, created_at
            FROM refresh_tokens
            WHERE token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let user = self.find_user(row.user_id).await?;
        Ok(user.map(|user| (row.into_token(), user)))
    }

    async fn find_password_reset_token(
        &self,
        token: Uuid,
    ) -> AuthResult<Option<(PasswordResetToken, User)>> {
        let row = sqlx::query_as::<_, TimedTokenRow>(
            r#"
            SELECT token, user_id, valid_until, created_at
            FROM password_reset_tokens
            WHERE token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let user = self.find_user(row.user_id).await?;
        Ok(user.map(|user| (row.into_password_reset_token(), user)))
    }

    async fn confirmation_token_in_window_exists(
        &self,
        user_id: UserId,
        created_after: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AuthResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM confirmation_tokens
                WHERE user_id = $1 AND created_at > $2 AND valid_until > $3
            )
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(created_after)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn password_reset_token_in_window_exists(
        &self,
        user_id: UserId,
        created_after: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AuthResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM password_reset_tokens
                WHERE user_id = $1 AND created_at > $2 AND valid_until > $3
            )
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(created_after)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn find_app_user_profile(&self, user_id: UserId) -> AuthResult<Option<AppUserProfile>> {
        let row = sqlx::query_as::<_, AppUserProfileRow>(
            r#"
            SELECT user_id, legal_accepted_at, created_at, updated_at
            FROM app_user_profiles
            WHERE user_id = $1
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(AppUserProfileRow::into_profile))
    }
}

// ============================================================================
// Transaction Implementation
// ============================================================================

/// PostgreSQL transaction handle. Dropping without commit rolls back.
pub struct PgAuthTx {
    tx: Transaction<'static, Postgres>,
}

impl AuthStoreTx for PgAuthTx {
    async fn commit(self) -> AuthResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn insert_user(&mut self, user: &User) -> AuthResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (
                id,
                username,
                password_hash,
                is_active,
                requires_confirmation,
                scopes,
                last_authenticated_at,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(user.username.as_ref().map(|u| u.as_str()))
        .bind(user.password_hash.as_deref())
        .bind(user.is_active)
        .bind(user.requires_confirmation)
        .bind(&user.scopes)
        .bind(user.last_authenticated_at)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn update_user_password(
        &mut self,
        user_id: UserId,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> AuthResult<()> {
        sqlx::query("UPDATE users SET password_hash = $2, updated_at = $3 WHERE id = $1")
            .bind(user_id.as_uuid())
            .bind(password_hash)
            .bind(now)
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    async fn update_user_activation(
        &mut self,
        user_id: UserId,
        is_active: bool,
        requires_confirmation: bool,
        now: DateTime<Utc>,
    ) -> AuthResult<()> {
        sqlx::query(
            r#"
            UPDATE users SET
                is_active = $2,
                requires_confirmation = $3,
                updated_at = $4
            WHERE id = $1
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(is_active)
        .bind(requires_confirmation)
        .bind(now)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn update_user_last_authenticated_at(
        &mut self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> AuthResult<()> {
        sqlx::query("UPDATE users SET last_authenticated_at = $2, updated_at = $2 WHERE id = $1")
            .bind(user_id.as_uuid())
            .bind(now)
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    async fn delete_user(&mut self, user_id: UserId) -> AuthResult<()> {
        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id.as_uuid())
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    async fn insert_app_user_profile(&mut self, profile: &AppUserProfile) -> AuthResult<()> {
        sqlx::query(
            r#"
            INSERT INTO app_user_profiles (user_id, legal_accepted_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(profile.user_id.as_uuid())
        .bind(profile.legal_accepted_at)
        .bind(profile.created_at)
        .bind(profile.updated_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn insert_access_token(&mut self, token: &AccessToken) -> AuthResult<()> {
        sqlx::query(
            r#"
            INSERT INTO access_tokens (token, user_id, valid_until, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(token.token)
        .bind(token.user_id.as_uuid())
        .bind(token.valid_until)
        .bind(token.created_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn delete_access_token(&mut self, token: Uuid) -> AuthResult<()> {
        sqlx::query("DELETE FROM access_tokens WHERE token = $1")
            .bind(token)
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    async fn delete_access_tokens_by_user(&mut self, user_id: UserId) -> AuthResult<u64> {
        let deleted = sqlx::query("DELETE FROM access_tokens WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .execute(&mut *self.tx)
            .await?
            .rows_affected();

        Ok(deleted)
    }

    async fn insert_refresh_token(&mut self, token: &RefreshToken) -> AuthResult<()> {
        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (token, user_id, created_at)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(token.token)
        .bind(token.user_id.as_uuid())
        .bind(token.created_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn delete_refresh_token(&mut self, token: Uuid) -> AuthResult<()> {
        sqlx::query("DELETE FROM refresh_tokens WHERE token = $1")
            .bind(token)
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    async fn delete_refresh_tokens_by_user(&mut self, user_id: UserId) -> AuthResult<u64> {
        let deleted = sqlx::query("DELETE FROM refresh_tokens WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .execute(&mut *self.tx)
            .await?
            .rows_affected();

        Ok(deleted)
    }

    async fn insert_confirmation_token(&mut self, token: &ConfirmationToken) -> AuthResult<()> {
        sqlx::query(
            r#"
            INSERT INTO confirmation_tokens (token, user_id, valid_until, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(token.token)
        .bind(token.user_id.as_uuid())
        .bind(token.valid_until)
        .bind(token.created_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn find_valid_confirmation_token(
        &mut self,
        token: Uuid,
        now: DateTime<Utc>,
    ) -> AuthResult<Option<(ConfirmationToken, User)>> {
        let row = sqlx::query_as::<_, TimedTokenRow>(
            r#"
            SELECT token, user_id, valid_until, created_at
            FROM confirmation_tokens
            WHERE token = $1 AND valid_until > $2
            "#,
        )
        .bind(token)
        .bind(now)
        .fetch_optional(&mut *self.tx)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let user = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT
                id,
                username,
                password_hash,
                is_active,
                requires_confirmation,
                scopes,
                last_authenticated_at,
                created_at,
                updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(row.user_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(user.map(|user| (row.into_confirmation_token(), user.into_user())))
    }

    async fn delete_confirmation_token(&mut self, token: Uuid) -> AuthResult<()> {
        sqlx::query("DELETE FROM confirmation_tokens WHERE token = $1")
            .bind(token)
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    async fn insert_password_reset_token(
        &mut self,
        token: &PasswordResetToken,
    ) -> AuthResult<()> {
        sqlx::query(
            r#"
            INSERT INTO password_reset_tokens (token, user_id, valid_until, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(token.token)
        .bind(token.user_id.as_uuid())
        .bind(token.valid_until)
        .bind(token.created_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn find_reusable_password_reset_token(
        &mut self,
        user_id: UserId,
        created_after: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AuthResult<Option<PasswordResetToken>> {
        let row = sqlx::query_as::<_, TimedTokenRow>(
            r#"
            SELECT token, user_id, valid_until, created_at
            FROM password_reset_tokens
            WHERE user_id = $1 AND created_at > $2 AND valid_until > $3
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(created_after)
        .bind(now)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(TimedTokenRow::into_password_reset_token))
    }

    async fn delete_password_reset_token(&mut self, token: Uuid) -> AuthResult<()> {
        sqlx::query("DELETE FROM password_reset_tokens WHERE token = $1")
            .bind(token)
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    async fn push_token_exists(&mut self, token: &str) -> AuthResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM push_tokens WHERE token = $1)",
        )
        .bind(token)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(exists)
    }

    async fn insert_push_token(&mut self, token: &PushToken) -> AuthResult<()> {
        sqlx::query(
            r#"
            INSERT INTO push_tokens (id, token, user_id, provider, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(token.id.as_uuid())
        .bind(&token.token)
        .bind(token.user_id.as_uuid())
        .bind(&token.provider)
        .bind(token.created_at)
        .bind(token.updated_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn delete_push_token_of_user(
        &mut self,
        user_id: UserId,
        token: &str,
    ) -> AuthResult<bool> {
        let deleted = sqlx::query("DELETE FROM push_tokens WHERE user_id = $1 AND token = $2")
            .bind(user_id.as_uuid())
            .bind(token)
            .execute(&mut *self.tx)
            .await?
            .rows_affected();

        Ok(deleted > 0)
    }
}

// ============================================================================
// Row Types for sqlx mapping
// ============================================================================

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    username: Option<String>,
    password_hash: Option<String>,
    is_active: bool,
    requires_confirmation: bool,
    scopes: Vec<String>,
    last_authenticated_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    fn into_user(self) -> User {
        User {
            id: UserId::from_uuid(self.id),
            username: self.username.map(Username::from_db),
            password_hash: self.password_hash,
            is_active: self.is_active,
            requires_confirmation: self.requires_confirmation,
            scopes: self.scopes,
            last_authenticated_at: self.last_authenticated_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct AccessTokenRow {
    token: Uuid,
    user_id: Uuid,
    valid_until: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl AccessTokenRow {
    fn into_token(self) -> AccessToken {
        AccessToken {
            token: self.token,
            user_id: UserId::from_uuid(self.user_id),
            valid_until: self.valid_until,
            created_at: self.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct RefreshTokenRow {
    token: Uuid,
    user_id: Uuid,
    created_at: DateTime<Utc>,
}

impl RefreshTokenRow {
    fn into_token(self) -> RefreshToken {
        RefreshToken {
            token: self.token,
            user_id: UserId::from_uuid(self.user_id),
            created_at: self.created_at,
        }
    }
}

/// Shared row shape for confirmation and password reset tokens
#[derive(sqlx::FromRow)]
struct TimedTokenRow {
    token: Uuid,
    user_id: Uuid,
    valid_until: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl TimedTokenRow {
    fn into_confirmation_token(self) -> ConfirmationToken {
        ConfirmationToken {
            token: self.token,
            user_id: UserId::from_uuid(self.user_id),
            valid_until: self.valid_until,
            created_at: self.created_at,
        }
    }

    fn into_password_reset_token(self) -> PasswordResetToken {
        PasswordResetToken {
            token: self.token,
            user_id: UserId::from_uuid(self.user_id),
            valid_until: self.valid_until,
            created_at: self.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct AppUserProfileRow {
    user_id: Uuid,
    legal_accepted_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl AppUserProfileRow {
    fn into_profile(self) -> AppUserProfile {
        AppUserProfile {
            user_id: UserId::from_uuid(self.user_id),
            legal_accepted_at: self.legal_accepted_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}
