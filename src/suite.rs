//! Cipher suite registry.
//!
//! A suite is a (cipher, mode, hash) triple. On the wire each component is
//! addressed by a small index (`suite_cipher`, `suite_mode`, `suite_hash`
//! headers); in a handshake a suite is named by an underscore-separated
//! string whose last three parts are the component tokens, e.g.
//! `TLS_AES_CBC_SHA256`.

use core::fmt;

use sha2::Sha256;
use sha3::{Digest, Sha3_256};

use crate::error::ProtocolError;

/// Minimum number of `_`-separated parts in a suite name.
pub const SUITE_NAME_MIN_PARTS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CipherAlgorithm {
    Aes256,
    Camellia256,
}

impl CipherAlgorithm {
    pub const ALL: [Self; 2] = [Self::Aes256, Self::Camellia256];

    pub fn index(self) -> u8 {
        match self {
            Self::Aes256 => 0,
            Self::Camellia256 => 1,
        }
    }

    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.index() == index)
    }

    pub fn token(self) -> &'static str {
        match self {
            Self::Aes256 => "AES",
            Self::Camellia256 => "CAMELLIA",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.token() == token)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockMode {
    Cbc,
    Ctr,
}

impl BlockMode {
    pub const ALL: [Self; 2] = [Self::Cbc, Self::Ctr];

    pub fn index(self) -> u8 {
        match self {
            Self::Cbc => 0,
            Self::Ctr => 1,
        }
    }

    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.index() == index)
    }

    pub fn token(self) -> &'static str {
        match self {
            Self::Cbc => "CBC",
            Self::Ctr => "CTR",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.token() == token)
    }
}

/// Hash used for HKDF, HMAC tags and PSS signatures. Both registered
/// hashes produce 32-byte digests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    Sha256,
    Sha3_256,
}

impl HashAlgorithm {
    pub const ALL: [Self; 2] = [Self::Sha256, Self::Sha3_256];

    pub const OUTPUT_BYTES: usize = 32;

    pub fn index(self) -> u8 {
        match self {
            Self::Sha256 => 0,
            Self::Sha3_256 => 1,
        }
    }

    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|h| h.index() == index)
    }

    pub fn token(self) -> &'static str {
        match self {
            Self::Sha256 => "SHA256",
            Self::Sha3_256 => "SHA3-256",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|h| h.token() == token)
    }

    pub fn digest(self, data: &[u8]) -> [u8; 32] {
        match self {
            Self::Sha256 => Sha256::digest(data).into(),
            Self::Sha3_256 => Sha3_256::digest(data).into(),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CipherSuite {
    pub cipher: CipherAlgorithm,
    pub mode: BlockMode,
    pub hash: HashAlgorithm,
}

impl CipherSuite {
    pub fn new(cipher: CipherAlgorithm, mode: BlockMode, hash: HashAlgorithm) -> Self {
        Self { cipher, mode, hash }
    }

    /// Resolve header indices to a suite.
    pub fn from_indices(cipher: u8, mode: u8, hash: u8) -> Result<Self, ProtocolError> {
        Ok(Self {
            cipher: CipherAlgorithm::from_index(cipher)
                .ok_or(ProtocolError::UnknownAlgorithm { kind: "cipher", index: cipher })?,
            mode: BlockMode::from_index(mode)
                .ok_or(ProtocolError::UnknownAlgorithm { kind: "mode", index: mode })?,
            hash: HashAlgorithm::from_index(hash)
                .ok_or(ProtocolError::UnknownAlgorithm { kind: "hash", index: hash })?,
        })
    }

    /// Parse a handshake suite name. Names with fewer than four parts or
    /// with any unregistered token are rejected. Tokens are case-sensitive.
    pub fn parse_name(name: &str) -> Option<Self> {
        let parts: Vec<&str> = name.split('_').collect();
        if parts.len() < SUITE_NAME_MIN_PARTS {
            return None;
        }
        let tail = &parts[parts.len() - 3..];
        Some(Self {
            cipher: CipherAlgorithm::from_token(tail[0])?,
            mode: BlockMode::from_token(tail[1])?,
            hash: HashAlgorithm::from_token(tail[2])?,
        })
    }

    /// Build a handshake name with the given leading label, e.g.
    /// `name_with_prefix("TLS")` -> `TLS_AES_CBC_SHA256`.
    pub fn name_with_prefix(&self, prefix: &str) -> String {
        format!("{}_{}", prefix, self)
    }

    /// Every registered combination.
    pub fn all() -> impl Iterator<Item = Self> {
        CipherAlgorithm::ALL.into_iter().flat_map(|cipher| {
            BlockMode::ALL.into_iter().flat_map(move |mode| {
                HashAlgorithm::ALL
                    .into_iter()
                    .map(move |hash| Self::new(cipher, mode, hash))
            })
        })
    }
}

impl fmt::Display for CipherSuite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}_{}",
            self.cipher.token(),
            self.mode.token(),
            self.hash.token()
        )
    }
}
