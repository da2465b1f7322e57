//! Encrypt-then-MAC framing.
//!
//! sealed = E(key, iv, pad32(plaintext)) || HMAC-H(key, ciphertext)
//!
//! The same message key drives the cipher and the tag. Padding is PKCS#7
//! over a 32-byte block (1..=32 pad bytes), applied for both CBC and CTR.

use cbc::cipher::{
    block_padding::NoPadding, BlockDecryptMut, BlockEncryptMut, KeyIvInit, StreamCipher,
};
use subtle::ConstantTimeEq;

use crate::error::{AuthenticationFailure, EncodingError};
use crate::kdf;
use crate::ratchet::MessageKey;
use crate::suite::{BlockMode, CipherAlgorithm, CipherSuite};

pub const PADDING_BLOCK_BYTES: usize = 32;
pub const TAG_BYTES: usize = 32;

/// Bind `$C` to the block cipher type for `$cipher` and evaluate `$body`.
macro_rules! with_block_cipher {
    ($cipher:expr, $C:ident => $body:expr) => {
        match $cipher {
            CipherAlgorithm::Aes256 => {
                type $C = aes::Aes256;
                $body
            }
            CipherAlgorithm::Camellia256 => {
                type $C = camellia::Camellia256;
                $body
            }
        }
    };
}

/// Ciphertext and tag of one sealed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sealed {
    pub ciphertext: Vec<u8>,
    pub tag: [u8; TAG_BYTES],
}

impl Sealed {
    pub fn into_bytes(self) -> Vec<u8> {
        let mut out = self.ciphertext;
        out.extend_from_slice(&self.tag);
        out
    }
}

pub fn pad(data: &[u8]) -> Vec<u8> {
    let pad_len = PADDING_BLOCK_BYTES - data.len() % PADDING_BLOCK_BYTES;
    let mut out = Vec::with_capacity(data.len() + pad_len);
    out.extend_from_slice(data);
    out.resize(data.len() + pad_len, pad_len as u8);
    out
}

pub fn unpad(data: &[u8]) -> Result<&[u8], AuthenticationFailure> {
    if data.is_empty() || data.len() % PADDING_BLOCK_BYTES != 0 {
        return Err(AuthenticationFailure);
    }
    let last = data[data.len() - 1];
    let pad_len = last as usize;
    if pad_len == 0 || pad_len > PADDING_BLOCK_BYTES {
        return Err(AuthenticationFailure);
    }
    let (body, padding) = data.split_at(data.len() - pad_len);
    if padding.iter().any(|&b| b != last) {
        return Err(AuthenticationFailure);
    }
    Ok(body)
}

fn encrypt(suite: &CipherSuite, key: &MessageKey, padded: &[u8]) -> Result<Vec<u8>, EncodingError> {
    with_block_cipher!(suite.cipher, C => match suite.mode {
        BlockMode::Cbc => {
            let enc = cbc::Encryptor::<C>::new_from_slices(key.key(), key.iv())
                .map_err(|_| EncodingError)?;
            Ok(enc.encrypt_padded_vec_mut::<NoPadding>(padded))
        }
        BlockMode::Ctr => {
            let mut cipher = ctr::Ctr128BE::<C>::new_from_slices(key.key(), key.iv())
                .map_err(|_| EncodingError)?;
            let mut buf = padded.to_vec();
            cipher.apply_keystream(&mut buf);
            Ok(buf)
        }
    })
}

fn decrypt(
    suite: &CipherSuite,
    key: &MessageKey,
    ciphertext: &[u8],
) -> Result<Vec<u8>, AuthenticationFailure> {
    with_block_cipher!(suite.cipher, C => match suite.mode {
        BlockMode::Cbc => {
            let dec = cbc::Decryptor::<C>::new_from_slices(key.key(), key.iv())
                .map_err(|_| AuthenticationFailure)?;
            dec.decrypt_padded_vec_mut::<NoPadding>(ciphertext)
                .map_err(|_| AuthenticationFailure)
        }
        BlockMode::Ctr => {
            let mut cipher = ctr::Ctr128BE::<C>::new_from_slices(key.key(), key.iv())
                .map_err(|_| AuthenticationFailure)?;
            let mut buf = ciphertext.to_vec();
            cipher.apply_keystream(&mut buf);
            Ok(buf)
        }
    })
}

/// Pad and encrypt without a tag.
pub fn encrypt_padded(
    plaintext: &[u8],
    suite: &CipherSuite,
    key: &MessageKey,
) -> Result<Vec<u8>, EncodingError> {
    encrypt(suite, key, &pad(plaintext))
}

/// Decrypt and unpad a tagless ciphertext.
pub fn decrypt_padded(
    ciphertext: &[u8],
    suite: &CipherSuite,
    key: &MessageKey,
) -> Result<Vec<u8>, AuthenticationFailure> {
    let padded = decrypt(suite, key, ciphertext)?;
    Ok(unpad(&padded)?.to_vec())
}

pub fn seal(
    plaintext: &[u8],
    suite: &CipherSuite,
    key: &MessageKey,
) -> Result<Sealed, EncodingError> {
    let ciphertext = encrypt_padded(plaintext, suite, key)?;
    let tag = kdf::hmac(suite.hash, key.key(), &ciphertext)?;
    Ok(Sealed { ciphertext, tag })
}

/// Verify the trailing tag, then decrypt and unpad. Every failure is the
/// same [`AuthenticationFailure`].
pub fn open(
    sealed: &[u8],
    suite: &CipherSuite,
    key: &MessageKey,
) -> Result<Vec<u8>, AuthenticationFailure> {
    if sealed.len() < TAG_BYTES {
        return Err(AuthenticationFailure);
    }
    let (ciphertext, tag) = sealed.split_at(sealed.len() - TAG_BYTES);
    let expected = kdf::hmac(suite.hash, key.key(), ciphertext)?;
    if !bool::from(expected.ct_eq(tag)) {
        return Err(AuthenticationFailure);
    }
    decrypt_padded(ciphertext, suite, key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratchet::Ratchet;
    use crate::suite::HashAlgorithm;

    fn key(hash: HashAlgorithm) -> MessageKey {
        Ratchet::new([7u8; 32]).step(hash, &[1u8; 32]).unwrap()
    }

    #[test]
    fn pad_always_adds_between_one_and_a_block() {
        assert_eq!(pad(b"").len(), 32);
        assert_eq!(pad(&[0u8; 31]).len(), 32);
        assert_eq!(pad(&[0u8; 32]).len(), 64);
        assert_eq!(pad(&[0u8; 32])[32..], [32u8; 32]);
        assert_eq!(unpad(&pad(b"abc")).unwrap(), b"abc");
    }

    #[test]
    fn unpad_rejects_bad_padding() {
        assert!(unpad(&[]).is_err());
        assert!(unpad(&[1u8; 31]).is_err());
        assert!(unpad(&[0u8; 32]).is_err());
        assert!(unpad(&[33u8; 32]).is_err());
        let mut block = [4u8; 32];
        block[29] = 9;
        assert!(unpad(&block).is_err());
    }

    #[test]
    fn seal_open_every_suite() {
        for suite in CipherSuite::all() {
            let k = key(suite.hash);
            let sealed = seal(b"media chunk payload", &suite, &k).unwrap();
            assert_eq!(sealed.ciphertext.len() % PADDING_BLOCK_BYTES, 0);
            let bytes = sealed.into_bytes();
            assert_eq!(open(&bytes, &suite, &k).unwrap(), b"media chunk payload");
        }
    }

    #[test]
    fn suites_produce_distinct_ciphertexts() {
        let k = key(HashAlgorithm::Sha256);
        let mut outputs = std::collections::HashSet::new();
        for suite in CipherSuite::all().filter(|s| s.hash == HashAlgorithm::Sha256) {
            outputs.insert(seal(b"x", &suite, &k).unwrap().ciphertext);
        }
        assert_eq!(outputs.len(), 4);
    }

    #[test]
    fn tampering_fails_uniformly() {
        let suite =
            CipherSuite::new(CipherAlgorithm::Aes256, BlockMode::Cbc, HashAlgorithm::Sha256);
        let k = key(suite.hash);
        let bytes = seal(b"hello", &suite, &k).unwrap().into_bytes();

        for i in 0..bytes.len() {
            let mut bad = bytes.clone();
            bad[i] ^= 0x01;
            assert_eq!(open(&bad, &suite, &k), Err(AuthenticationFailure));
        }
        assert_eq!(open(&bytes[..31], &suite, &k), Err(AuthenticationFailure));
        assert_eq!(open(&[], &suite, &k), Err(AuthenticationFailure));
    }

    #[test]
    fn wrong_key_fails() {
        let suite =
            CipherSuite::new(CipherAlgorithm::Camellia256, BlockMode::Ctr, HashAlgorithm::Sha3_256);
        let bytes = seal(b"hello", &suite, &key(suite.hash)).unwrap().into_bytes();
        let other = Ratchet::new([8u8; 32]).step(suite.hash, &[1u8; 32]).unwrap();
        assert!(open(&bytes, &suite, &other).is_err());
    }

    #[test]
    fn tag_only_input_fails_padding() {
        let suite =
            CipherSuite::new(CipherAlgorithm::Aes256, BlockMode::Ctr, HashAlgorithm::Sha256);
        let k = key(suite.hash);
        let tag = kdf::hmac(suite.hash, k.key(), &[]).unwrap();
        assert_eq!(open(&tag, &suite, &k), Err(AuthenticationFailure));
    }

    #[test]
    fn tagless_round_trip() {
        let suite =
            CipherSuite::new(CipherAlgorithm::Aes256, BlockMode::Cbc, HashAlgorithm::Sha256);
        let k = key(suite.hash);
        let ct = encrypt_padded(b"-----BEGIN CERTIFICATE-----", &suite, &k).unwrap();
        assert_eq!(decrypt_padded(&ct, &suite, &k).unwrap(), b"-----BEGIN CERTIFICATE-----");
    }
}
