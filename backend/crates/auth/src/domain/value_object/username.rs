//! Username Value Object
//!
//! Usernames are email-style identifiers. Uniqueness is case-insensitive, so
//! the canonical form stored and compared everywhere is the NFKC-normalized,
//! trimmed, lowercased rendition of the input. Two inputs that normalize to
//! the same canonical form are the same username.

use serde::{Deserialize, Serialize};
use std::fmt;
use unicode_normalization::UnicodeNormalization;

/// Maximum length for a username (in characters, after normalization)
pub const USERNAME_MAX_LENGTH: usize = 255;

// ============================================================================
// Error Types
// ============================================================================

/// Error returned when username validation fails
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UsernameError {
    /// Username is empty after normalization
    Empty,

    /// Username is too long
    TooLong { length: usize, max: usize },

    /// Username contains whitespace or control characters
    InvalidCharacter { char: char },
}

impl fmt::Display for UsernameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "Username cannot be empty"),
            Self::TooLong { length, max } => {
                write!(f, "Username is too long ({length} chars, maximum {max})")
            }
            Self::InvalidCharacter { char } => {
                write!(f, "Username contains invalid character {char:?}")
            }
        }
    }
}

impl std::error::Error for UsernameError {}

// ============================================================================
// Username Value Object
// ============================================================================

/// Validated, canonicalized username
///
/// # Invariants
/// - Non-empty after normalization
/// - At most [`USERNAME_MAX_LENGTH`] characters
/// - No interior whitespace, no control characters
/// - Always lowercase (canonical form)
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Username(String);

impl Username {
    /// Create a new Username from raw input
    ///
    /// Applies NFKC normalization, trims surrounding whitespace, and
    /// lowercases before validating.
    pub fn new(input: impl AsRef<str>) -> Result<Self, UsernameError> {
        let canonical: String = input
            .as_ref()
            .nfkc()
            .collect::<String>()
            .trim()
            .to_lowercase();

        if canonical.is_empty() {
            return Err(UsernameError::Empty);
        }

        let length = canonical.chars().count();
        if length > USERNAME_MAX_LENGTH {
            return Err(UsernameError::TooLong {
                length,
                max: USERNAME_MAX_LENGTH,
            });
        }

        for ch in canonical.chars() {
            if ch.is_whitespace() || ch.is_control() {
                return Err(UsernameError::InvalidCharacter { char: ch });
            }
        }

        Ok(Self(canonical))
    }

    /// Create from a stored value (already canonical)
    pub fn from_db(stored: impl Into<String>) -> Self {
        Self(stored.into())
    }

    /// Get the canonical username
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Convert to owned String (canonical form)
    #[inline]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Debug for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Username").field(&self.0).finish()
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Username {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Username {
    type Error = UsernameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for Username {
    type Error = UsernameError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Username> for String {
    fn from(username: Username) -> Self {
        username.0
    }
}

// ============================================================================
// Tests
// ============================================================================
