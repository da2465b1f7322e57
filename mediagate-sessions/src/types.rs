//! Core types: SessionId, AuthenticatedClient.

use chrono::{DateTime, Utc};
use rand_core::RngCore;
use std::fmt;

/// Unique session identifier (hex-encoded random bytes).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    /// Create a new random SessionId.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 16];
        rand_core::OsRng.fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Client identity recorded by a successful `/auth`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthenticatedClient {
    pub subject: String,
    /// Hex SHA-256 of the certificate DER.
    pub fingerprint: String,
    pub authenticated_at: DateTime<Utc>,
}
