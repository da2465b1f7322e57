//! Reference client.
//!
//! Mirrors the server side of every exchange: builds `/protocols` and `/key`
//! bodies, verifies the server hello, and keeps the client's copy of both
//! ratchet chains so it can seal requests and open responses.

use p384::ecdh::EphemeralSecret;
use rand_core::CryptoRngCore;

use crate::agreement::{derive_seeds, parse_public_pem, KeyRequest};
use crate::error::{AuthenticationFailure, EncodingError, ProtocolError};
use crate::framer;
use crate::handshake::{ClientHello, Negotiation, ServerHello};
use crate::identity::{Identity, PeerCertificate};
use crate::ratchet::Ratchet;
use crate::suite::CipherSuite;
use crate::wire::{
    split_line, CLIENT_RANDOM_BYTES, CLIENT_SIGNATURE_BYTES, HEADER_SESSION_ID,
    HEADER_SUITE_CIPHER, HEADER_SUITE_HASH, HEADER_SUITE_MODE, SALT_BYTES,
};

pub fn client_hello<R: CryptoRngCore + ?Sized>(
    candidates: Vec<String>,
    rng: &mut R,
) -> ClientHello {
    let mut client_random = [0u8; CLIENT_RANDOM_BYTES];
    rng.fill_bytes(&mut client_random);
    ClientHello { client_random, candidates }
}

/// Parse and verify a `/protocols` reply against the hello that caused it.
pub fn accept_server_hello(
    hello: &ClientHello,
    reply: &[u8],
) -> Result<(Negotiation, PeerCertificate), ProtocolError> {
    let (server_hello, certificate) = ServerHello::parse(reply)?;
    let negotiation = server_hello.verify(&certificate, &hello.client_random)?;
    Ok((negotiation, certificate))
}

/// Client half of `/key` before the server has answered.
pub struct PendingKey {
    secret: EphemeralSecret,
    salt: [u8; SALT_BYTES],
    suite: CipherSuite,
}

impl PendingKey {
    pub fn new<R: CryptoRngCore>(suite: CipherSuite, rng: &mut R) -> Self {
        let mut salt = [0u8; SALT_BYTES];
        rng.fill_bytes(&mut salt);
        Self {
            secret: EphemeralSecret::random(rng),
            salt,
            suite,
        }
    }

    pub fn request_body(&self) -> Result<Vec<u8>, ProtocolError> {
        KeyRequest {
            salt: self.salt,
            client_public: self.secret.public_key(),
        }
        .to_bytes()
    }

    /// Value for the `suite_hash` header of the `/key` request.
    pub fn hash_header(&self) -> String {
        self.suite.hash.index().to_string()
    }

    /// Complete the exchange from the server's `id "\n" PEM` reply.
    pub fn finish(self, response: &[u8]) -> Result<ClientSession, ProtocolError> {
        let (id, pem) = split_line(response).ok_or(ProtocolError::Malformed("key response"))?;
        let session_id = core::str::from_utf8(id)
            .map_err(|_| ProtocolError::Malformed("session id"))?
            .to_string();
        let server_public = parse_public_pem(pem)?;

        let shared = self.secret.diffie_hellman(&server_public);
        let seeds = derive_seeds(self.suite.hash, shared.raw_secret_bytes(), &self.salt)?;

        Ok(ClientSession {
            session_id,
            suite: self.suite,
            salt: self.salt,
            send: Ratchet::new(seeds.receive),
            receive: Ratchet::new(seeds.send),
        })
    }
}

/// Established client state. `send` mirrors the server's receive chain and
/// `receive` mirrors its send chain.
pub struct ClientSession {
    session_id: String,
    suite: CipherSuite,
    salt: [u8; SALT_BYTES],
    send: Ratchet,
    receive: Ratchet,
}

impl ClientSession {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn suite(&self) -> CipherSuite {
        self.suite
    }

    /// Header name/value pairs for protected requests.
    pub fn headers(&self) -> [(&'static str, String); 4] {
        [
            (HEADER_SESSION_ID, self.session_id.clone()),
            (HEADER_SUITE_CIPHER, self.suite.cipher.index().to_string()),
            (HEADER_SUITE_MODE, self.suite.mode.index().to_string()),
            (HEADER_SUITE_HASH, self.suite.hash.index().to_string()),
        ]
    }

    pub fn seal(&mut self, plaintext: &[u8]) -> Result<Vec<u8>, EncodingError> {
        let key = self.send.step(self.suite.hash, &self.salt)?;
        Ok(framer::seal(plaintext, &self.suite, &key)?.into_bytes())
    }

    pub fn open(&mut self, sealed: &[u8]) -> Result<Vec<u8>, AuthenticationFailure> {
        let key = self.receive.step(self.suite.hash, &self.salt)?;
        framer::open(sealed, &self.suite, &key)
    }

    /// `/auth` body: the certificate encrypted under the next send key,
    /// followed by a PKCS#1 v1.5 signature over the session id.
    pub fn auth_body(&mut self, identity: &Identity) -> Result<Vec<u8>, ProtocolError> {
        let signature = identity.sign_pkcs1v15_sha256(self.session_id.as_bytes())?;
        if signature.len() != CLIENT_SIGNATURE_BYTES {
            return Err(ProtocolError::Malformed("client signature length"));
        }
        let key = self.send.step(self.suite.hash, &self.salt)?;
        let mut body = framer::encrypt_padded(identity.certificate_pem(), &self.suite, &key)?;
        body.extend_from_slice(&signature);
        Ok(body)
    }

    pub fn send_steps(&self) -> u64 {
        self.send.steps()
    }

    pub fn receive_steps(&self) -> u64 {
        self.receive.steps()
    }
}
