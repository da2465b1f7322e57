//! Ephemeral P-384 key agreement for `/key`.
//!
//!   shared  = ECDH(server_ephemeral, client_public)
//!   receive = HKDF-H(shared,  salt, len=32)   server receive / client send
//!   send    = HKDF-H(receive, salt, len=32)   server send / client receive

use p384::{
    ecdh::EphemeralSecret,
    pkcs8::{DecodePublicKey, EncodePublicKey, LineEnding},
    PublicKey,
};
use rand_core::CryptoRngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{EncodingError, ProtocolError};
use crate::kdf;
use crate::ratchet::CHAIN_KEY_BYTES;
use crate::suite::HashAlgorithm;
use crate::wire::SALT_BYTES;

/// Initial chain keys, named from the server's point of view.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct RatchetSeeds {
    pub receive: [u8; CHAIN_KEY_BYTES],
    pub send: [u8; CHAIN_KEY_BYTES],
}

impl core::fmt::Debug for RatchetSeeds {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("RatchetSeeds(..)")
    }
}

pub fn derive_seeds(
    hash: HashAlgorithm,
    shared_secret: &[u8],
    salt: &[u8; SALT_BYTES],
) -> Result<RatchetSeeds, EncodingError> {
    let receive = kdf::hkdf::<CHAIN_KEY_BYTES>(hash, shared_secret, salt)?;
    let send = kdf::hkdf::<CHAIN_KEY_BYTES>(hash, &receive, salt)?;
    Ok(RatchetSeeds { receive, send })
}

#[derive(Debug, Clone)]
pub struct KeyRequest {
    pub salt: [u8; SALT_BYTES],
    pub client_public: PublicKey,
}

impl KeyRequest {
    pub fn parse(body: &[u8]) -> Result<Self, ProtocolError> {
        if body.len() < SALT_BYTES {
            return Err(ProtocolError::Malformed("key request"));
        }
        let (salt_bytes, pem) = body.split_at(SALT_BYTES);
        let client_public = parse_public_pem(pem)?;

        let mut salt = [0u8; SALT_BYTES];
        salt.copy_from_slice(salt_bytes);
        Ok(Self { salt, client_public })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ProtocolError> {
        let pem = public_pem(&self.client_public)?;
        let mut out = Vec::with_capacity(SALT_BYTES + pem.len());
        out.extend_from_slice(&self.salt);
        out.extend_from_slice(pem.as_bytes());
        Ok(out)
    }
}

pub fn parse_public_pem(pem: &[u8]) -> Result<PublicKey, ProtocolError> {
    let pem = core::str::from_utf8(pem).map_err(|_| ProtocolError::InvalidPublicKey)?;
    PublicKey::from_public_key_pem(pem.trim()).map_err(|_| ProtocolError::InvalidPublicKey)
}

pub fn public_pem(key: &PublicKey) -> Result<String, ProtocolError> {
    key.to_public_key_pem(LineEnding::LF)
        .map_err(|_| ProtocolError::InvalidPublicKey)
}

pub struct ServerAgreement {
    pub server_public_pem: String,
    pub seeds: RatchetSeeds,
}

/// Server side of the exchange: fresh ephemeral key, ECDH, seed derivation.
pub fn agree<R: CryptoRngCore>(
    request: &KeyRequest,
    hash: HashAlgorithm,
    rng: &mut R,
) -> Result<ServerAgreement, ProtocolError> {
    let secret = EphemeralSecret::random(rng);
    let server_public_pem = public_pem(&secret.public_key())?;
    let shared = secret.diffie_hellman(&request.client_public);
    let seeds = derive_seeds(hash, shared.raw_secret_bytes(), &request.salt)?;

    Ok(ServerAgreement { server_public_pem, seeds })
}
