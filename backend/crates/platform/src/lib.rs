//! Platform Crate - Technical Infrastructure
//!
//! This crate provides shared technical foundations:
//! - Password hashing (Argon2id, self-describing PHC strings)
//! - Clock abstraction for simulated time in tests

pub mod clock;
pub mod password;
