//! Auth (Authentication) Backend Module
//!
//! Clean Architecture structure:
//! - `domain/` - Entities, value objects, store traits
//! - `application/` - Use cases and application services
//! - `infra/` - Postgres and in-memory store implementations
//! - `presentation/` - HTTP handlers, DTOs, middleware, router
//!
//! ## Features
//! - Registration with optional confirmation step (debounced re-issue)
//! - Login with opaque bearer access/refresh token pairs stored server-side
//! - Refresh token rotation, logout, bulk invalidation on password change
//! - Password reset with debounce and reuse windows
//! - Push-notification token management
//! - Configurable per-route authentication gate
//!   (required / secure / optional / try / none)
//!
//! ## Security Model
//! - Passwords hashed with Argon2id, parameters embedded in the hash
//! - Unknown user and wrong password are indistinguishable to callers
//! - Password reset never confirms whether an account exists
//! - Deactivated accounts are rejected in every gate mode

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;
pub mod presentation;

#[cfg(test)]
mod tests;

// Re-exports for convenience
pub use application::config::AuthConfig;
pub use error::{AuthError, AuthResult};
pub use infra::postgres::PgAuthStore;
pub use presentation::router::{auth_router, push_router};

// Re-export kernel error types for unified error handling
pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};

// Convenience re-exports
pub mod config {
    pub use crate::application::config::*;
}

pub mod models {
    pub use crate::domain::entity::*;
    pub use crate::domain::value_object::*;
    pub use crate::presentation::dto::*;
}

pub mod handlers {
    pub use crate::presentation::handlers::*;
}

pub mod store {
    pub use crate::domain::repository::{AuthStore, AuthStoreTx};
    pub use crate::infra::memory::MemAuthStore;
    pub use crate::infra::postgres::PgAuthStore;
}

pub mod router {
    pub use crate::presentation::router::*;
}

pub mod middleware {
    pub use crate::presentation::middleware::*;
}
