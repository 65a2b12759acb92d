//! Password Hashing and Verification
//!
//! Argon2id (memory-hard, recommended by OWASP) with every parameter
//! embedded in the produced hash string, so verification is fully
//! self-describing:
//!
//! ```text
//! $argon2id$v=19$m=19456,t=2,p=1$<salt-b64>$<key-b64>
//! ```
//!
//! A fresh random salt is drawn from the system CSPRNG on every call -
//! two hashes of the same password are never equal.

use argon2::password_hash::{Error as PhcError, PasswordHash, SaltString};
use argon2::{Algorithm, Argon2, Params, PasswordHasher, PasswordVerifier, Version};
use rand::RngCore;
use rand::rngs::OsRng;
use thiserror::Error;

// ============================================================================
// Parameters
// ============================================================================

/// Argon2id derivation parameters.
///
/// All values end up embedded in the hash string, so they can be tuned
/// without invalidating previously stored hashes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Argon2Params {
    /// Memory cost in KiB
    pub memory_kib: u32,
    /// Number of passes
    pub time_cost: u32,
    /// Degree of parallelism
    pub parallelism: u32,
    /// Derived key length in bytes
    pub key_length: u32,
    /// Salt length in bytes
    pub salt_length: u32,
}

impl Default for Argon2Params {
    /// OWASP-recommended baseline: m=19456 (19 MiB), t=2, p=1.
    fn default() -> Self {
        Self {
            memory_kib: 19_456,
            time_cost: 2,
            parallelism: 1,
            key_length: 32,
            salt_length: 16,
        }
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Password hashing/verification errors.
///
/// Decode failures are deliberately distinct from a mismatch: a mismatch is
/// `Ok(false)` from [`compare_password_and_hash`], never an error.
#[derive(Debug, Error)]
pub enum PasswordHashError {
    /// Hash string is malformed or uses an unknown algorithm tag
    #[error("invalid argon2id hash")]
    InvalidHash,

    /// Hash was produced by an incompatible argon2 version
    #[error("incompatible argon2 version")]
    IncompatibleVersion,

    /// Key derivation itself failed (bad params, CSPRNG failure)
    #[error("password hashing failed: {0}")]
    HashingFailed(String),
}

// ============================================================================
// Hashing / Verification
// ============================================================================

/// Hash a password with Argon2id.
///
/// Draws a fresh `params.salt_length`-byte salt from the system CSPRNG and
/// returns the PHC-formatted hash string for storage.
pub fn hash_password(password: &str, params: &Argon2Params) -> Result<String, PasswordHashError> {
    let mut salt_bytes = vec![0u8; params.salt_length as usize];
    OsRng.fill_bytes(&mut salt_bytes);

    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| PasswordHashError::HashingFailed(e.to_string()))?;

    let argon2 = derive_context(params)?;

    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordHashError::HashingFailed(e.to_string()))?;

    Ok(hash.to_string())
}

/// Verify a password against a stored hash.
///
/// Re-derives the key using the parameters and salt embedded in the hash
/// string and compares in constant time. Returns `Ok(false)` on a plain
/// mismatch; returns an error when the hash string cannot be interpreted.
pub fn compare_password_and_hash(
    password: &str,
    hash: &str,
) -> Result<bool, PasswordHashError> {
    let parsed = PasswordHash::new(hash).map_err(|_| PasswordHashError::InvalidHash)?;

    if parsed.algorithm != Algorithm::Argon2id.ident() {
        return Err(PasswordHashError::InvalidHash);
    }

    match parsed.version {
        Some(v) if v == Version::V0x13 as u32 => {}
        Some(_) => return Err(PasswordHashError::IncompatibleVersion),
        None => return Err(PasswordHashError::InvalidHash),
    }

    // Argon2 uses constant-time comparison internally
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(PhcError::Password) => Ok(false),
        Err(_) => Err(PasswordHashError::InvalidHash),
    }
}

fn derive_context(params: &Argon2Params) -> Result<Argon2<'static>, PasswordHashError> {
    let inner = Params::new(
        params.memory_kib,
        params.time_cost,
        params.parallelism,
        Some(params.key_length as usize),
    )
    .map_err(|e| PasswordHashError::HashingFailed(e.to_string()))?;

    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, inner))
}

// ============================================================================
// Tests
// ============================================================================
