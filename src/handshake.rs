//! Suite negotiation for `/protocols`.
//!
//! The client offers a random nonce and a list of suite names. The server
//! picks one registered suite uniformly at random and signs the client
//! random with RSA-PSS under the chosen suite's hash, proving possession of
//! the key behind the certificate it returns.

use rand::seq::SliceRandom;
use rand_core::CryptoRngCore;

use crate::error::ProtocolError;
use crate::identity::{Identity, PeerCertificate};
use crate::suite::{CipherSuite, HashAlgorithm};
use crate::wire::{split_line, CLIENT_RANDOM_BYTES, NO_AVAILABLE_PROTOCOL};

const PEM_END_CERTIFICATE: &[u8] = b"-----END CERTIFICATE-----";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientHello {
    pub client_random: [u8; CLIENT_RANDOM_BYTES],
    pub candidates: Vec<String>,
}

impl ClientHello {
    pub fn parse(body: &[u8]) -> Result<Self, ProtocolError> {
        if body.len() < CLIENT_RANDOM_BYTES {
            return Err(ProtocolError::Malformed("client hello"));
        }
        let (random, list) = body.split_at(CLIENT_RANDOM_BYTES);
        let candidates: Vec<String> =
            serde_json::from_slice(list).map_err(|_| ProtocolError::Malformed("suite list"))?;

        let mut client_random = [0u8; CLIENT_RANDOM_BYTES];
        client_random.copy_from_slice(random);
        Ok(Self { client_random, candidates })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = self.client_random.to_vec();
        // A Vec<String> always serializes.
        if let Ok(list) = serde_json::to_vec(&self.candidates) {
            out.extend_from_slice(&list);
        }
        out
    }
}

/// Outcome of matching the client's offer against the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Negotiation {
    Selected { name: String, suite: CipherSuite },
    Unavailable,
}

impl Negotiation {
    /// Text placed on the first line of the reply.
    pub fn label(&self) -> &str {
        match self {
            Self::Selected { name, .. } => name,
            Self::Unavailable => NO_AVAILABLE_PROTOCOL,
        }
    }

    pub fn suite(&self) -> Option<CipherSuite> {
        match self {
            Self::Selected { suite, .. } => Some(*suite),
            Self::Unavailable => None,
        }
    }

    /// The sentinel reply is signed with SHA-256.
    pub fn signature_hash(&self) -> HashAlgorithm {
        self.suite().map_or(HashAlgorithm::Sha256, |s| s.hash)
    }

    /// Recover the outcome from a reply label.
    pub fn from_label(label: &str) -> Self {
        match CipherSuite::parse_name(label) {
            Some(suite) => Self::Selected { name: label.to_string(), suite },
            None => Self::Unavailable,
        }
    }
}

/// Pick uniformly among the registered candidates.
pub fn negotiate<R: CryptoRngCore + ?Sized>(candidates: &[String], rng: &mut R) -> Negotiation {
    let valid: Vec<(&String, CipherSuite)> = candidates
        .iter()
        .filter_map(|name| CipherSuite::parse_name(name).map(|suite| (name, suite)))
        .collect();

    match valid.choose(rng) {
        Some((name, suite)) => Negotiation::Selected {
            name: (*name).clone(),
            suite: *suite,
        },
        None => Negotiation::Unavailable,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerHello {
    pub protocol: String,
    pub certificate_pem: Vec<u8>,
    pub signature: Vec<u8>,
}

impl ServerHello {
    pub fn to_bytes(&self) -> Vec<u8> {
        let len =
            self.protocol.len() + 1 + self.certificate_pem.len() + self.signature.len();
        let mut out = Vec::with_capacity(len);
        out.extend_from_slice(self.protocol.as_bytes());
        out.push(b'\n');
        out.extend_from_slice(&self.certificate_pem);
        out.extend_from_slice(&self.signature);
        out
    }

    /// Split a reply into its parts. The signature length is the modulus
    /// size of the certificate's key.
    pub fn parse(body: &[u8]) -> Result<(Self, PeerCertificate), ProtocolError> {
        let (label, rest) = split_line(body).ok_or(ProtocolError::Malformed("server hello"))?;
        let protocol = core::str::from_utf8(label)
            .map_err(|_| ProtocolError::Malformed("protocol label"))?
            .to_string();

        let pem_end = rest
            .windows(PEM_END_CERTIFICATE.len())
            .position(|w| w == PEM_END_CERTIFICATE)
            .map(|at| at + PEM_END_CERTIFICATE.len())
            .ok_or(ProtocolError::Malformed("server certificate"))?;
        let certificate = PeerCertificate::from_pem(&rest[..pem_end])?;

        let sig_at = rest
            .len()
            .checked_sub(certificate.signature_len())
            .filter(|&at| at >= pem_end)
            .ok_or(ProtocolError::Malformed("server signature"))?;

        Ok((
            Self {
                protocol,
                certificate_pem: rest[..sig_at].to_vec(),
                signature: rest[sig_at..].to_vec(),
            },
            certificate,
        ))
    }

    /// Check the signature over `client_random` with the hash implied by
    /// the reply label.
    pub fn verify(
        &self,
        certificate: &PeerCertificate,
        client_random: &[u8; CLIENT_RANDOM_BYTES],
    ) -> Result<Negotiation, ProtocolError> {
        let negotiation = Negotiation::from_label(&self.protocol);
        certificate.verify_pss(negotiation.signature_hash(), client_random, &self.signature)?;
        Ok(negotiation)
    }
}

/// Negotiate and sign the reply to a [`ClientHello`].
pub fn respond<R: CryptoRngCore + ?Sized>(
    hello: &ClientHello,
    identity: &Identity,
    rng: &mut R,
) -> Result<(ServerHello, Negotiation), ProtocolError> {
    let negotiation = negotiate(&hello.candidates, rng);
    let signature = identity.sign_pss(negotiation.signature_hash(), &hello.client_random, rng)?;

    Ok((
        ServerHello {
            protocol: negotiation.label().to_string(),
            certificate_pem: identity.certificate_pem().to_vec(),
            signature,
        },
        negotiation,
    ))
}
