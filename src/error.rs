//! Unified error types for the MediaGate protocol core.

use core::fmt;

/// Every integrity, decryption and padding failure collapses into this one
/// value so no failure class is distinguishable by a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticationFailure;

impl fmt::Display for AuthenticationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "authentication failed")
    }
}

impl std::error::Error for AuthenticationFailure {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodingError;

impl fmt::Display for EncodingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "encoding error")
    }
}

impl std::error::Error for EncodingError {}

/// Normalize encode errors into authentication failures (oracle discipline).
impl From<EncodingError> for AuthenticationFailure {
    fn from(_: EncodingError) -> Self {
        AuthenticationFailure
    }
}

/// Failures while parsing handshake material or using long-term keys.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("unknown {kind} index {index}")]
    UnknownAlgorithm { kind: &'static str, index: u8 },

    #[error("malformed {0}")]
    Malformed(&'static str),

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("invalid certificate: {0}")]
    InvalidCertificate(String),

    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("certificate does not match private key")]
    KeyMismatch,

    #[error("signature verification failed")]
    BadSignature,

    #[error("signing failed: {0}")]
    Signing(String),

    #[error(transparent)]
    Encoding(#[from] EncodingError),

    #[error(transparent)]
    Authentication(#[from] AuthenticationFailure),
}
