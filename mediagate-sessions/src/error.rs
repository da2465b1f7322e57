//! Error types for session lookup and use.

use std::fmt;

/// The `Display` text of each variant is what clients see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    NotFound,
    Expired,
    SuiteMismatch,
    NotAuthenticated,
    /// A ratchet step could not be derived.
    Ratchet,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "register a key first"),
            Self::Expired => write!(f, "your key has expired"),
            Self::SuiteMismatch => write!(f, "cipher suite mismatch"),
            Self::NotAuthenticated => write!(f, "authenticate first"),
            Self::Ratchet => write!(f, "ratchet derivation failed"),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<mediagate_protocol::EncodingError> for SessionError {
    fn from(_: mediagate_protocol::EncodingError) -> Self {
        Self::Ratchet
    }
}
