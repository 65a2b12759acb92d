//! Check Token Use Case
//!
//! Resolves a bearer access token against storage for the gate. Expiry and
//! account-status policy stay in the gate; this only answers "which token
//! and user, if any".

use std::sync::Arc;

use uuid::Uuid;

use crate::domain::entity::{AccessToken, User};
use crate::domain::repository::AuthStore;
use crate::error::AuthResult;

/// A resolved access token with its owning user
#[derive(Debug, Clone)]
pub struct ResolvedToken {
    pub token: AccessToken,
    pub user: User,
}

/// Check token use case
pub struct CheckTokenUseCase<S>
where
    S: AuthStore,
{
    store: Arc<S>,
}

impl<S> CheckTokenUseCase<S>
where
    S: AuthStore,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Look up the token and its user.
    ///
    /// `Ok(None)` means the token is unknown - a distinct outcome from a
    /// store error, which always surfaces.
    pub async fn resolve(&self, token: Uuid) -> AuthResult<Option<ResolvedToken>> {
        Ok(self
            .store
            .find_access_token(token)
            .await?
            .map(|(token, user)| ResolvedToken { token, user }))
    }
}
