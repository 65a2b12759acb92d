//! In-Memory Store Implementation
//!
//! Backs the test suite and local demos. A transaction clones the whole
//! state, mutates the clone, and swaps it back on commit - dropping an
//! uncommitted transaction therefore rolls back, matching the Postgres
//! semantics the service relies on.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use kernel::id::UserId;
use uuid::Uuid;

use crate::domain::entity::{
    AccessToken, AppUserProfile, ConfirmationToken, PasswordResetToken, PushToken, RefreshToken,
    User,
};
use crate::domain::repository::{AuthStore, AuthStoreTx};
use crate::domain::value_object::Username;
use crate::error::{AuthError, AuthResult};

#[derive(Debug, Default, Clone)]
struct MemState {
    users: HashMap<Uuid, User>,
    profiles: HashMap<Uuid, AppUserProfile>,
    access_tokens: HashMap<Uuid, AccessToken>,
    refresh_tokens: HashMap<Uuid, RefreshToken>,
    confirmation_tokens: HashMap<Uuid, ConfirmationToken>,
    password_reset_tokens: HashMap<Uuid, PasswordResetToken>,
    push_tokens: HashMap<String, PushToken>,
}

impl MemState {
    fn user_by_username(&self, username: &Username) -> Option<User> {
        self.users
            .values()
            .find(|u| u.username.as_ref() == Some(username))
            .cloned()
    }
}

/// In-memory auth store
#[derive(Clone, Default)]
pub struct MemAuthStore {
    state: Arc<Mutex<MemState>>,
}

impl MemAuthStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemState> {
        self.state.lock().expect("store mutex poisoned")
    }

    // ------------------------------------------------------------------
    // Inspection helpers for tests
    // ------------------------------------------------------------------

    pub fn user(&self, user_id: UserId) -> Option<User> {
        self.lock().users.get(user_id.as_uuid()).cloned()
    }

    pub fn profile_exists(&self, user_id: UserId) -> bool {
        self.lock().profiles.contains_key(user_id.as_uuid())
    }

    pub fn access_tokens_of(&self, user_id: UserId) -> Vec<AccessToken> {
        self.lock()
            .access_tokens
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn refresh_tokens_of(&self, user_id: UserId) -> Vec<RefreshToken> {
        self.lock()
            .refresh_tokens
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn confirmation_tokens_of(&self, user_id: UserId) -> Vec<ConfirmationToken> {
        self.lock()
            .confirmation_tokens
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn password_reset_tokens_of(&self, user_id: UserId) -> Vec<PasswordResetToken> {
        self.lock()
            .password_reset_tokens
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn push_tokens_of(&self, user_id: UserId) -> Vec<PushToken> {
        self.lock()
            .push_tokens
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect()
    }
}

// ============================================================================
// Store Implementation
// ============================================================================

impl AuthStore for MemAuthStore {
    type Tx = MemAuthTx;

    async fn begin(&self) -> AuthResult<MemAuthTx> {
        let work = self.lock().clone();
        Ok(MemAuthTx {
            state: Arc::clone(&self.state),
            work,
        })
    }

    async fn find_user_by_username(&self, username: &Username) -> AuthResult<Option<User>> {
        Ok(self.lock().user_by_username(username))
    }

    async fn find_user_by_id(&self, user_id: UserId) -> AuthResult<Option<User>> {
        Ok(self.lock().users.get(user_id.as_uuid()).cloned())
    }

    async fn find_access_token(&self, token: Uuid) -> AuthResult<Option<(AccessToken, User)>> {
        let state = self.lock();
        Ok(state.access_tokens.get(&token).and_then(|t| {
            state
                .users
                .get(t.user_id.as_uuid())
                .map(|u| (t.clone(), u.clone()))
        }))
    }

    async fn find_refresh_token(&self, token: Uuid) -> AuthResult<Option<(RefreshToken, User)>> {
        let state = self.lock();
        Ok(state.refresh_tokens.get(&token).and_then(|t| {
            state
                .users
                .get(t.user_id.as_uuid())
                .map(|u| (t.clone(), u.clone()))
        }))
    }

    async fn find_password_reset_token(
        &self,
        token: Uuid,
    ) -> AuthResult<Option<(PasswordResetToken, User)>> {
        let state = self.lock();
        Ok(state.password_reset_tokens.get(&token).and_then(|t| {
            state
                .users
                .get(t.user_id.as_uuid())
                .map(|u| (t.clone(), u.clone()))
        }))
    }

    async fn confirmation_token_in_window_exists(
        &self,
        user_id: UserId,
        created_after: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AuthResult<bool> {
        Ok(self.lock().confirmation_tokens.values().any(|t| {
            t.user_id == user_id && t.created_at > created_after && t.valid_until > now
        }))
    }

    async fn password_reset_token_in_window_exists(
        &self,
        user_id: UserId,
        created_after: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AuthResult<bool> {
        Ok(self.lock().password_reset_tokens.values().any(|t| {
            t.user_id == user_id && t.created_at > created_after && t.valid_until > now
        }))
    }

    async fn find_app_user_profile(&self, user_id: UserId) -> AuthResult<Option<AppUserProfile>> {
        Ok(self.lock().profiles.get(user_id.as_uuid()).cloned())
    }
}

// ============================================================================
// Transaction Implementation
// ============================================================================

/// In-memory transaction handle working on a cloned state
pub struct MemAuthTx {
    state: Arc<Mutex<MemState>>,
    work: MemState,
}

impl AuthStoreTx for MemAuthTx {
    async fn commit(self) -> AuthResult<()> {
        *self.state.lock().expect("store mutex poisoned") = self.work;
        Ok(())
    }

    async fn insert_user(&mut self, user: &User) -> AuthResult<()> {
        if let Some(username) = &user.username {
            if self.work.user_by_username(username).is_some() {
                return Err(AuthError::Internal(
                    "unique violation: users.username".into(),
                ));
            }
        }
        self.work.users.insert(user.id.into_uuid(), user.clone());
        Ok(())
    }

    async fn update_user_password(
        &mut self,
        user_id: UserId,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> AuthResult<()> {
        if let Some(user) = self.work.users.get_mut(user_id.as_uuid()) {
            user.password_hash = Some(password_hash.to_string());
            user.updated_at = now;
        }
        Ok(())
    }

    async fn update_user_activation(
        &mut self,
        user_id: UserId,
        is_active: bool,
        requires_confirmation: bool,
        now: DateTime<Utc>,
    ) -> AuthResult<()> {
        if let Some(user) = self.work.users.get_mut(user_id.as_uuid()) {
            user.is_active = is_active;
            user.requires_confirmation = requires_confirmation;
            user.updated_at = now;
        }
        Ok(())
    }

    async fn update_user_last_authenticated_at(
        &mut self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> AuthResult<()> {
        if let Some(user) = self.work.users.get_mut(user_id.as_uuid()) {
            user.last_authenticated_at = Some(now);
            user.updated_at = now;
        }
        Ok(())
    }

    async fn delete_user(&mut self, user_id: UserId) -> AuthResult<()> {
        let uuid = user_id.into_uuid();
        self.work.users.remove(&uuid);
        // ON DELETE CASCADE
        self.work.profiles.remove(&uuid);
        self.work.access_tokens.retain(|_, t| t.user_id != user_id);
        self.work.refresh_tokens.retain(|_, t| t.user_id != user_id);
        self.work
            .confirmation_tokens
            .retain(|_, t| t.user_id != user_id);
        self.work
            .password_reset_tokens
            .retain(|_, t| t.user_id != user_id);
        self.work.push_tokens.retain(|_, t| t.user_id != user_id);
        Ok(())
    }

    async fn insert_app_user_profile(&mut self, profile: &AppUserProfile) -> AuthResult<()> {
        self.work
            .profiles
            .insert(profile.user_id.into_uuid(), profile.clone());
        Ok(())
    }

    async fn insert_access_token(&mut self, token: &AccessToken) -> AuthResult<()> {
        self.work.access_tokens.insert(token.token, token.clone());
        Ok(())
    }

    async fn delete_access_token(&mut self, token: Uuid) -> AuthResult<()> {
        self.work.access_tokens.remove(&token);
        Ok(())
    }

    async fn delete_access_tokens_by_user(&mut self, user_id: UserId) -> AuthResult<u64> {
        let before = self.work.access_tokens.len();
        self.work.access_tokens.retain(|_, t| t.user_id != user_id);
        Ok((before - self.work.access_tokens.len()) as u64)
    }

    async fn insert_refresh_token(&mut self, token: &RefreshToken) -> AuthResult<()> {
        self.work.refresh_tokens.insert(token.token, token.clone());
        Ok(())
    }

    async fn delete_refresh_token(&mut self, token: Uuid) -> AuthResult<()> {
        self.work.refresh_tokens.remove(&token);
        Ok(())
    }

    async fn delete_refresh_tokens_by_user(&mut self, user_id: UserId) -> AuthResult<u64> {
        let before = self.work.refresh_tokens.len();
        self.work.refresh_tokens.retain(|_, t| t.user_id != user_id);
        Ok((before - self.work.refresh_tokens.len()) as u64)
    }

    async fn insert_confirmation_token(&mut self, token: &ConfirmationToken) -> AuthResult<()> {
        self.work
            .confirmation_tokens
            .insert(token.token, token.clone());
        Ok(())
    }

    async fn find_valid_confirmation_token(
        &mut self,
        token: Uuid,
        now: DateTime<Utc>,
    ) -> AuthResult<Option<(ConfirmationToken, User)>> {
        Ok(self
            .work
            .confirmation_tokens
            .get(&token)
            .filter(|t| t.valid_until > now)
            .and_then(|t| {
                self.work
                    .users
                    .get(t.user_id.as_uuid())
                    .map(|u| (t.clone(), u.clone()))
            }))
    }

    async fn delete_confirmation_token(&mut self, token: Uuid) -> AuthResult<()> {
        self.work.confirmation_tokens.remove(&token);
        Ok(())
    }

    async fn insert_password_reset_token(
        &mut self,
        token: &PasswordResetToken,
    ) -> AuthResult<()> {
        self.work
            .password_reset_tokens
            .insert(token.token, token.clone());
        Ok(())
    }

    async fn find_reusable_password_reset_token(
        &mut self,
        user_id: UserId,
        created_after: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AuthResult<Option<PasswordResetToken>> {
        let mut candidates: Vec<_> = self
            .work
            .password_reset_tokens
            .values()
            .filter(|t| {
                t.user_id == user_id && t.created_at > created_after && t.valid_until > now
            })
            .cloned()
            .collect();
        candidates.sort_by_key(|t| t.created_at);
        Ok(candidates.pop())
    }

    async fn delete_password_reset_token(&mut self, token: Uuid) -> AuthResult<()> {
        self.work.password_reset_tokens.remove(&token);
        Ok(())
    }

    async fn push_token_exists(&mut self, token: &str) -> AuthResult<bool> {
        Ok(self.work.push_tokens.contains_key(token))
    }

    async fn insert_push_token(&mut self, token: &PushToken) -> AuthResult<()> {
        self.work
            .push_tokens
            .insert(token.token.clone(), token.clone());
        Ok(())
    }

    async fn delete_push_token_of_user(
        &mut self,
        user_id: UserId,
        token: &str,
    ) -> AuthResult<bool> {
        match self.work.push_tokens.get(token) {
            Some(existing) if existing.user_id == user_id => {
                self.work.push_tokens.remove(token);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
