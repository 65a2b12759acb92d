//! Value Objects

pub mod username;

pub use username::{Username, UsernameError};
