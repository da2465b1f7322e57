//! HKDF and HMAC dispatch over the negotiated hash.
//!
//! okm = HKDF-H(ikm, salt=salt, info="", len=N)
//! tag = HMAC-H(key, data)

use hkdf::Hkdf;
use hmac::{digest::KeyInit, Hmac, Mac};
use sha2::Sha256;
use sha3::Sha3_256;

use crate::error::EncodingError;
use crate::suite::HashAlgorithm;

pub fn hkdf<const N: usize>(
    hash: HashAlgorithm,
    ikm: &[u8],
    salt: &[u8],
) -> Result<[u8; N], EncodingError> {
    let mut out = [0u8; N];
    match hash {
        HashAlgorithm::Sha256 => Hkdf::<Sha256>::new(Some(salt), ikm)
            .expand(&[], &mut out)
            .map_err(|_| EncodingError)?,
        HashAlgorithm::Sha3_256 => Hkdf::<Sha3_256>::new(Some(salt), ikm)
            .expand(&[], &mut out)
            .map_err(|_| EncodingError)?,
    }
    Ok(out)
}

pub fn hmac(hash: HashAlgorithm, key: &[u8], data: &[u8]) -> Result<[u8; 32], EncodingError> {
    match hash {
        HashAlgorithm::Sha256 => mac::<Hmac<Sha256>>(key, data),
        HashAlgorithm::Sha3_256 => mac::<Hmac<Sha3_256>>(key, data),
    }
}

fn mac<M: Mac + KeyInit>(key: &[u8], data: &[u8]) -> Result<[u8; 32], EncodingError> {
    let mut m = <M as Mac>::new_from_slice(key).map_err(|_| EncodingError)?;
    m.update(data);
    let out = m.finalize().into_bytes();
    let mut tag = [0u8; 32];
    if out.len() != tag.len() {
        return Err(EncodingError);
    }
    tag.copy_from_slice(&out);
    Ok(tag)
}
