//! Per-client session state.

use chrono::{DateTime, Duration, Utc};
use mediagate_protocol::{
    BlockMode, CipherAlgorithm, CipherSuite, HashAlgorithm, MessageKey, Ratchet, RatchetSeeds,
};
use mediagate_protocol::wire::SALT_BYTES;
use zeroize::Zeroize;

use crate::error::SessionError;
use crate::types::{AuthenticatedClient, SessionId};

/// Two ratchet chains plus the parameters fixed at `/key`.
///
/// `receive` decrypts client requests and `send` encrypts responses. The
/// hash is chosen at `/key`; cipher and mode are bound by the first
/// protected request and must not change afterwards.
pub struct Session {
    id: SessionId,
    receive: Ratchet,
    send: Ratchet,
    salt: [u8; SALT_BYTES],
    hash: HashAlgorithm,
    bound: Option<(CipherAlgorithm, BlockMode)>,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    client: Option<AuthenticatedClient>,
}

impl Session {
    pub fn new(
        id: SessionId,
        seeds: RatchetSeeds,
        salt: [u8; SALT_BYTES],
        hash: HashAlgorithm,
        created_at: DateTime<Utc>,
        lifetime: Duration,
    ) -> Self {
        Self {
            id,
            receive: Ratchet::new(seeds.receive),
            send: Ratchet::new(seeds.send),
            salt,
            hash,
            bound: None,
            created_at,
            expires_at: created_at + lifetime,
            client: None,
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn hash(&self) -> HashAlgorithm {
        self.hash
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Check a request's suite against the session. The first call binds
    /// cipher and mode; the hash must always equal the one from `/key`.
    pub fn bind_suite(&mut self, suite: &CipherSuite) -> Result<(), SessionError> {
        if suite.hash != self.hash {
            return Err(SessionError::SuiteMismatch);
        }
        match self.bound {
            None => {
                self.bound = Some((suite.cipher, suite.mode));
                Ok(())
            }
            Some(bound) if bound == (suite.cipher, suite.mode) => Ok(()),
            Some(_) => Err(SessionError::SuiteMismatch),
        }
    }

    pub fn bound_suite(&self) -> Option<CipherSuite> {
        self.bound
            .map(|(cipher, mode)| CipherSuite::new(cipher, mode, self.hash))
    }

    /// Key for the next client request.
    pub fn advance_receive(&mut self) -> Result<MessageKey, SessionError> {
        Ok(self.receive.step(self.hash, &self.salt)?)
    }

    /// Key for the next server response.
    pub fn advance_send(&mut self) -> Result<MessageKey, SessionError> {
        Ok(self.send.step(self.hash, &self.salt)?)
    }

    pub fn receive_steps(&self) -> u64 {
        self.receive.steps()
    }

    pub fn send_steps(&self) -> u64 {
        self.send.steps()
    }

    pub fn authenticate(&mut self, client: AuthenticatedClient) {
        self.client = Some(client);
    }

    pub fn client(&self) -> Option<&AuthenticatedClient> {
        self.client.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.client.is_some()
    }

    #[cfg(test)]
    pub(crate) fn chain_keys(&self) -> (&[u8; 32], &[u8; 32]) {
        (self.receive.chain_key(), self.send.chain_key())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.salt.zeroize();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("hash", &self.hash)
            .field("bound", &self.bound)
            .field("expires_at", &self.expires_at)
            .field("authenticated", &self.client.is_some())
            .finish_non_exhaustive()
    }
}
