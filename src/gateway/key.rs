//! Lookup key validation.

use std::fmt;

use thiserror::Error;

/// Longest accepted key, in bytes.
pub const MAX_KEY_LEN: usize = 128;

/// Why a raw key was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidKey {
    #[error("key is empty")]
    Empty,

    #[error("key is longer than {MAX_KEY_LEN} bytes")]
    TooLong,

    #[error("key contains a forbidden character")]
    ForbiddenChar,

    #[error("key is a relative path segment")]
    DotSegment,
}

/// An opaque resource id (e.g. a card id) that is safe to use in cache keys and origin URLs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LookupKey(String);

impl LookupKey {
    pub fn parse(raw: &str) -> Result<Self, InvalidKey> {
        if raw.is_empty() {
            return Err(InvalidKey::Empty);
        }
        if raw.len() > MAX_KEY_LEN {
            return Err(InvalidKey::TooLong);
        }
        if raw.chars().any(|c| c.is_whitespace() || c.is_control() || c == '/') {
            return Err(InvalidKey::ForbiddenChar);
        }
        // URL path building drops these instead of encoding them.
        if raw == "." || raw == ".." {
            return Err(InvalidKey::DotSegment);
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LookupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
