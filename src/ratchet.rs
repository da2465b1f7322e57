//! HKDF chain ratchet.
//!
//! Each step expands the current chain key into 80 bytes:
//!
//!   okm = HKDF-H(chain_key, salt=session_salt, info="", len=80)
//!   next_chain_key = okm[0..32] || message_key = okm[32..64] || iv = okm[64..80]
//!
//! A session keeps two independent chains, one per direction. Both peers
//! step their copy of a chain exactly once per protected message, so
//! message keys are never reused and the old chain key is gone after use.

use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::EncodingError;
use crate::kdf;
use crate::suite::HashAlgorithm;

pub const CHAIN_KEY_BYTES: usize = 32;
pub const MESSAGE_KEY_BYTES: usize = 32;
pub const MESSAGE_IV_BYTES: usize = 16;

const STEP_OUTPUT_BYTES: usize = CHAIN_KEY_BYTES + MESSAGE_KEY_BYTES + MESSAGE_IV_BYTES;

/// Key and IV for exactly one protected message.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MessageKey {
    key: [u8; MESSAGE_KEY_BYTES],
    iv: [u8; MESSAGE_IV_BYTES],
}

impl MessageKey {
    pub fn key(&self) -> &[u8; MESSAGE_KEY_BYTES] {
        &self.key
    }

    pub fn iv(&self) -> &[u8; MESSAGE_IV_BYTES] {
        &self.iv
    }
}

impl core::fmt::Debug for MessageKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("MessageKey(..)")
    }
}

/// One ratchet step: derive the next chain key and a message key/IV.
pub fn advance(
    chain_key: &[u8; CHAIN_KEY_BYTES],
    hash: HashAlgorithm,
    salt: &[u8],
) -> Result<([u8; CHAIN_KEY_BYTES], MessageKey), EncodingError> {
    let okm = Zeroizing::new(kdf::hkdf::<STEP_OUTPUT_BYTES>(hash, chain_key, salt)?);

    let mut next = [0u8; CHAIN_KEY_BYTES];
    next.copy_from_slice(&okm[..CHAIN_KEY_BYTES]);

    let mut message = MessageKey {
        key: [0u8; MESSAGE_KEY_BYTES],
        iv: [0u8; MESSAGE_IV_BYTES],
    };
    message
        .key
        .copy_from_slice(&okm[CHAIN_KEY_BYTES..CHAIN_KEY_BYTES + MESSAGE_KEY_BYTES]);
    message
        .iv
        .copy_from_slice(&okm[CHAIN_KEY_BYTES + MESSAGE_KEY_BYTES..]);

    Ok((next, message))
}

/// A single-direction chain.
///
/// The chain key is overwritten on every [`step`](Self::step); `steps`
/// counts how many message keys have been handed out.
pub struct Ratchet {
    chain_key: [u8; CHAIN_KEY_BYTES],
    steps: u64,
}

impl Ratchet {
    pub fn new(seed: [u8; CHAIN_KEY_BYTES]) -> Self {
        Self { chain_key: seed, steps: 0 }
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn chain_key(&self) -> &[u8; CHAIN_KEY_BYTES] {
        &self.chain_key
    }

    /// Advance once and return the message key for this step.
    pub fn step(&mut self, hash: HashAlgorithm, salt: &[u8]) -> Result<MessageKey, EncodingError> {
        let (mut next, message) = advance(&self.chain_key, hash, salt)?;

        self.chain_key.zeroize();
        self.chain_key = next;
        next.zeroize();
        self.steps = self.steps.saturating_add(1);

        Ok(message)
    }
}

impl Drop for Ratchet {
    fn drop(&mut self) {
        self.chain_key.zeroize();
    }
}

impl core::fmt::Debug for Ratchet {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Ratchet").field("steps", &self.steps).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SALT: [u8; 32] = [0x5a; 32];

    fn seed() -> [u8; 32] {
        let mut seed = [0u8; 32];
        for (i, byte) in seed.iter_mut().enumerate() {
            *byte = i as u8;
        }
        seed
    }

    #[test]
    fn advance_is_deterministic() {
        let (c1, m1) = advance(&seed(), HashAlgorithm::Sha256, &SALT).unwrap();
        let (c2, m2) = advance(&seed(), HashAlgorithm::Sha256, &SALT).unwrap();
        assert_eq!(c1, c2);
        assert_eq!(m1.key(), m2.key());
        assert_eq!(m1.iv(), m2.iv());
    }

    #[test]
    fn advance_splits_hkdf_output() {
        let okm: [u8; 80] = kdf::hkdf(HashAlgorithm::Sha3_256, &seed(), &SALT).unwrap();
        let (next, message) = advance(&seed(), HashAlgorithm::Sha3_256, &SALT).unwrap();
        assert_eq!(&next[..], &okm[..32]);
        assert_eq!(&message.key()[..], &okm[32..64]);
        assert_eq!(&message.iv()[..], &okm[64..]);
    }

    #[test]
    fn step_replaces_chain_key() {
        let mut ratchet = Ratchet::new(seed());
        let (expected_next, expected_message) =
            advance(&seed(), HashAlgorithm::Sha256, &SALT).unwrap();

        let message = ratchet.step(HashAlgorithm::Sha256, &SALT).unwrap();
        assert_eq!(ratchet.chain_key(), &expected_next);
        assert_eq!(message.key(), expected_message.key());
        assert_eq!(ratchet.steps(), 1);
    }

    #[test]
    fn steps_never_repeat_keys() {
        let mut ratchet = Ratchet::new(seed());
        let mut seen = std::collections::HashSet::new();
        for _ in 0..64 {
            let message = ratchet.step(HashAlgorithm::Sha256, &SALT).unwrap();
            assert!(seen.insert(*message.key()));
        }
        assert_eq!(ratchet.steps(), 64);
    }

    #[test]
    fn unserialized_read_then_write_repeats_keys() {
        // Two writers that both read the same chain key before either
        // stores its successor hand out the same message key twice.
        let shared = Ratchet::new(seed());
        let (_, first) = advance(shared.chain_key(), HashAlgorithm::Sha256, &SALT).unwrap();
        let (_, second) = advance(shared.chain_key(), HashAlgorithm::Sha256, &SALT).unwrap();
        assert_eq!(first.key(), second.key());

        let mut serialized = Ratchet::new(seed());
        let a = serialized.step(HashAlgorithm::Sha256, &SALT).unwrap();
        let b = serialized.step(HashAlgorithm::Sha256, &SALT).unwrap();
        assert_ne!(a.key(), b.key());
    }

    #[test]
    fn mirrored_chains_stay_in_lockstep() {
        let mut sender = Ratchet::new(seed());
        let mut receiver = Ratchet::new(seed());
        for _ in 0..10 {
            let a = sender.step(HashAlgorithm::Sha3_256, &SALT).unwrap();
            let b = receiver.step(HashAlgorithm::Sha3_256, &SALT).unwrap();
            assert_eq!(a.key(), b.key());
            assert_eq!(a.iv(), b.iv());
        }
    }

    #[test]
    fn salt_and_hash_separate_chains() {
        let (a, _) = advance(&seed(), HashAlgorithm::Sha256, &SALT).unwrap();
        let (b, _) = advance(&seed(), HashAlgorithm::Sha256, &[0u8; 32]).unwrap();
        let (c, _) = advance(&seed(), HashAlgorithm::Sha3_256, &SALT).unwrap();
        assert_ne!(a, b);
        assert_ne!(a, c);
    }
}
