//! Long-term RSA identities and X.509 certificates.
//!
//! The server signs handshake replies with RSA-PSS (MGF1 with the negotiated
//! hash, maximum salt length). Clients sign their session id with
//! RSA PKCS#1 v1.5 over SHA-256.

use rand_core::CryptoRngCore;
use rsa::{
    pkcs1::DecodeRsaPrivateKey,
    pkcs8::{DecodePrivateKey, DecodePublicKey},
    traits::PublicKeyParts,
    Pkcs1v15Sign, Pss, RsaPrivateKey, RsaPublicKey,
};
use sha2::{Digest, Sha256};
use sha3::Sha3_256;
use x509_cert::{
    der::{DecodePem, Encode},
    Certificate,
};

use crate::error::ProtocolError;
use crate::suite::HashAlgorithm;

/// Largest PSS salt the key admits: emLen - hLen - 2. Both suite hashes
/// are 32 bytes wide.
pub fn pss_max_salt_len(modulus_bits: usize) -> usize {
    let em_len = (modulus_bits.saturating_sub(1) + 7) / 8;
    em_len.saturating_sub(HashAlgorithm::OUTPUT_BYTES + 2)
}

fn pss(hash: HashAlgorithm, salt_len: usize) -> Pss {
    match hash {
        HashAlgorithm::Sha256 => Pss::new_with_salt::<Sha256>(salt_len),
        HashAlgorithm::Sha3_256 => Pss::new_with_salt::<Sha3_256>(salt_len),
    }
}

fn trim_end(pem: &[u8]) -> &[u8] {
    let end = pem
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(0, |i| i + 1);
    &pem[..end]
}

/// A parsed certificate carrying an RSA public key.
#[derive(Clone, Debug)]
pub struct PeerCertificate {
    public_key: RsaPublicKey,
    subject: String,
    fingerprint: [u8; 32],
}

impl PeerCertificate {
    pub fn from_pem(pem: &[u8]) -> Result<Self, ProtocolError> {
        let cert = Certificate::from_pem(trim_end(pem))
            .map_err(|e| ProtocolError::InvalidCertificate(e.to_string()))?;
        let spki = cert
            .tbs_certificate
            .subject_public_key_info
            .to_der()
            .map_err(|e| ProtocolError::InvalidCertificate(e.to_string()))?;
        let public_key = RsaPublicKey::from_public_key_der(&spki)
            .map_err(|e| ProtocolError::InvalidCertificate(e.to_string()))?;
        let der = cert
            .to_der()
            .map_err(|e| ProtocolError::InvalidCertificate(e.to_string()))?;

        Ok(Self {
            public_key,
            subject: cert.tbs_certificate.subject.to_string(),
            fingerprint: Sha256::digest(&der).into(),
        })
    }

    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public_key
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// SHA-256 over the certificate DER.
    pub fn fingerprint(&self) -> &[u8; 32] {
        &self.fingerprint
    }

    pub fn signature_len(&self) -> usize {
        self.public_key.size()
    }

    pub fn verify_pss(
        &self,
        hash: HashAlgorithm,
        message: &[u8],
        signature: &[u8],
    ) -> Result<(), ProtocolError> {
        let salt_len = pss_max_salt_len(self.public_key.n().bits());
        self.public_key
            .verify(pss(hash, salt_len), &hash.digest(message), signature)
            .map_err(|_| ProtocolError::BadSignature)
    }

    pub fn verify_pkcs1v15_sha256(
        &self,
        message: &[u8],
        signature: &[u8],
    ) -> Result<(), ProtocolError> {
        let digest = Sha256::digest(message);
        self.public_key
            .verify(Pkcs1v15Sign::new::<Sha256>(), &digest, signature)
            .map_err(|_| ProtocolError::BadSignature)
    }
}

/// Certificate plus matching private key.
pub struct Identity {
    certificate_pem: Vec<u8>,
    certificate: PeerCertificate,
    private_key: RsaPrivateKey,
}

impl Identity {
    /// Load from PEM. The private key may be PKCS#8 or PKCS#1 and must
    /// match the certificate's public key.
    pub fn from_pem(certificate_pem: &[u8], private_key_pem: &str) -> Result<Self, ProtocolError> {
        let certificate = PeerCertificate::from_pem(certificate_pem)?;
        let private_key = RsaPrivateKey::from_pkcs8_pem(private_key_pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(private_key_pem))
            .map_err(|e| ProtocolError::InvalidPrivateKey(e.to_string()))?;

        if RsaPublicKey::from(&private_key) != certificate.public_key {
            return Err(ProtocolError::KeyMismatch);
        }

        Ok(Self {
            certificate_pem: certificate_pem.to_vec(),
            certificate,
            private_key,
        })
    }

    pub fn certificate_pem(&self) -> &[u8] {
        &self.certificate_pem
    }

    pub fn certificate(&self) -> &PeerCertificate {
        &self.certificate
    }

    pub fn signature_len(&self) -> usize {
        self.private_key.size()
    }

    pub fn sign_pss<R: CryptoRngCore + ?Sized>(
        &self,
        hash: HashAlgorithm,
        message: &[u8],
        rng: &mut R,
    ) -> Result<Vec<u8>, ProtocolError> {
        let salt_len = pss_max_salt_len(self.private_key.n().bits());
        self.private_key
            .sign_with_rng(&mut &mut *rng, pss(hash, salt_len), &hash.digest(message))
            .map_err(|e| ProtocolError::Signing(e.to_string()))
    }

    pub fn sign_pkcs1v15_sha256(&self, message: &[u8]) -> Result<Vec<u8>, ProtocolError> {
        let digest = Sha256::digest(message);
        self.private_key
            .sign(Pkcs1v15Sign::new::<Sha256>(), &digest)
            .map_err(|e| ProtocolError::Signing(e.to_string()))
    }
}

impl core::fmt::Debug for Identity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Identity")
            .field("subject", &self.certificate.subject)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_core::OsRng;

    const SERVER_CERT: &[u8] = include_bytes!("../fixtures/server.crt");
    const SERVER_KEY: &str = include_str!("../fixtures/server.key");
    const CLIENT_CERT: &[u8] = include_bytes!("../fixtures/client.crt");
    const CLIENT_KEY: &str = include_str!("../fixtures/client.key");

    #[test]
    fn max_salt_for_rsa_3072() {
        assert_eq!(pss_max_salt_len(3072), 350);
        assert_eq!(pss_max_salt_len(2048), 222);
    }

    #[test]
    fn loads_fixture_identity() {
        let id = Identity::from_pem(SERVER_CERT, SERVER_KEY).unwrap();
        assert_eq!(id.signature_len(), 384);
        assert!(id.certificate().subject().contains("127.0.0.1"));
        assert_eq!(id.certificate_pem(), SERVER_CERT);
    }

    #[test]
    fn rejects_mismatched_key() {
        let err = Identity::from_pem(SERVER_CERT, CLIENT_KEY).unwrap_err();
        assert!(matches!(err, ProtocolError::KeyMismatch));
    }

    #[test]
    fn rejects_garbage() {
        assert!(PeerCertificate::from_pem(b"not a certificate").is_err());
        assert!(Identity::from_pem(SERVER_CERT, "nope").is_err());
    }

    #[test]
    fn pss_round_trip_both_hashes() {
        let id = Identity::from_pem(SERVER_CERT, SERVER_KEY).unwrap();
        let peer = PeerCertificate::from_pem(SERVER_CERT).unwrap();
        for hash in HashAlgorithm::ALL {
            let sig = id.sign_pss(hash, &[0u8; 32], &mut OsRng).unwrap();
            assert_eq!(sig.len(), 384);
            peer.verify_pss(hash, &[0u8; 32], &sig).unwrap();
            assert!(peer.verify_pss(hash, &[1u8; 32], &sig).is_err());
        }
    }

    #[test]
    fn pkcs1v15_binds_message() {
        let client = Identity::from_pem(CLIENT_CERT, CLIENT_KEY).unwrap();
        let sig = client.sign_pkcs1v15_sha256(b"session-id").unwrap();
        let peer = PeerCertificate::from_pem(CLIENT_CERT).unwrap();
        peer.verify_pkcs1v15_sha256(b"session-id", &sig).unwrap();
        assert!(peer.verify_pkcs1v15_sha256(b"other-id", &sig).is_err());
    }

    #[test]
    fn fingerprints_differ() {
        let a = PeerCertificate::from_pem(SERVER_CERT).unwrap();
        let b = PeerCertificate::from_pem(CLIENT_CERT).unwrap();
        assert_ne!(a.fingerprint(), b.fingerprint());
    }
}
