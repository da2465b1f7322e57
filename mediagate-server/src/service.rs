//! Endpoint semantics, independent of HTTP plumbing.

use std::sync::Arc;

use axum::http::HeaderMap;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use mediagate_protocol::agreement::{self, KeyRequest, ServerAgreement};
use mediagate_protocol::wire::{
    self, CHUNK_SIZE, HEADER_SESSION_ID, HEADER_SUITE_CIPHER, HEADER_SUITE_HASH, HEADER_SUITE_MODE,
};
use mediagate_protocol::{
    framer, handshake, CipherSuite, ClientHello, HashAlgorithm, Identity, PeerCertificate,
};
use mediagate_sessions::{AuthenticatedClient, SessionLease, SessionStore};
use rand_core::OsRng;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;

use crate::catalog::{ChunkReader, MediaCatalog};
use crate::error::ApiError;

/// Session and suite headers of one request, parsed but not yet validated.
#[derive(Debug, Clone, Default)]
pub struct SuiteHeaders {
    pub session_id: Option<String>,
    pub cipher: Option<u8>,
    pub mode: Option<u8>,
    pub hash: Option<u8>,
}

impl SuiteHeaders {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let index = |name: &str| {
            headers
                .get(name)
                .and_then(|v| wire::parse_suite_index(v.as_bytes()))
        };
        Self {
            session_id: headers
                .get(HEADER_SESSION_ID)
                .and_then(|v| v.to_str().ok())
                .map(|s| s.trim().to_string()),
            cipher: index(HEADER_SUITE_CIPHER),
            mode: index(HEADER_SUITE_MODE),
            hash: index(HEADER_SUITE_HASH),
        }
    }

    fn session_id(&self) -> Result<&str, ApiError> {
        self.session_id.as_deref().ok_or(ApiError::SessionNotFound)
    }

    fn hash(&self) -> Result<HashAlgorithm, ApiError> {
        self.hash
            .and_then(HashAlgorithm::from_index)
            .ok_or(ApiError::BadRequest("invalid cipher suite"))
    }

    fn suite(&self) -> Result<CipherSuite, ApiError> {
        let (Some(cipher), Some(mode), Some(hash)) = (self.cipher, self.mode, self.hash) else {
            return Err(ApiError::BadRequest("invalid cipher suite"));
        };
        CipherSuite::from_indices(cipher, mode, hash)
            .map_err(|_| ApiError::BadRequest("invalid cipher suite"))
    }
}

#[derive(Serialize)]
struct ChunkPayload<'a> {
    media_id: &'a str,
    chunk: u64,
    data: String,
}

fn to_pretty_json<T: Serialize>(value: &T) -> Result<Vec<u8>, ApiError> {
    let mut out = Vec::new();
    {
        let mut ser =
            serde_json::Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(b"    "));
        value.serialize(&mut ser).map_err(ApiError::internal)?;
    }
    Ok(out)
}

pub struct MediaService {
    identity: Identity,
    sessions: SessionStore,
    catalog: MediaCatalog,
    reader: Arc<dyn ChunkReader>,
    require_auth: bool,
}

impl MediaService {
    pub fn new(
        identity: Identity,
        sessions: SessionStore,
        catalog: MediaCatalog,
        reader: Arc<dyn ChunkReader>,
    ) -> Self {
        Self {
            identity,
            sessions,
            catalog,
            reader,
            require_auth: true,
        }
    }

    pub fn with_require_auth(mut self, require_auth: bool) -> Self {
        self.require_auth = require_auth;
        self
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn catalog(&self) -> &MediaCatalog {
        &self.catalog
    }

    /// `POST /api/protocols`
    pub fn protocols(&self, body: &[u8]) -> Result<Vec<u8>, ApiError> {
        let hello =
            ClientHello::parse(body).map_err(|_| ApiError::BadRequest("invalid protocol request"))?;
        let (reply, negotiation) =
            handshake::respond(&hello, &self.identity, &mut OsRng).map_err(ApiError::internal)?;

        let offered = hello.candidates.len();
        match negotiation.suite() {
            Some(suite) => tracing::info!(%suite, offered, "protocol negotiated"),
            None => tracing::warn!(offered, "no acceptable protocol offered"),
        }
        Ok(reply.to_bytes())
    }

    /// `POST /api/key`
    pub async fn key(&self, headers: &SuiteHeaders, body: &[u8]) -> Result<Vec<u8>, ApiError> {
        let hash = headers.hash()?;
        let request =
            KeyRequest::parse(body).map_err(|_| ApiError::BadRequest("invalid key request"))?;
        let ServerAgreement { server_public_pem, seeds } =
            agreement::agree(&request, hash, &mut OsRng).map_err(ApiError::internal)?;

        let id = self.sessions.create(seeds, request.salt, hash).await;
        tracing::info!(session_id = %id, %hash, "session established");

        let mut out = Vec::with_capacity(id.as_str().len() + 1 + server_public_pem.len());
        out.extend_from_slice(id.as_bytes());
        out.push(b'\n');
        out.extend_from_slice(server_public_pem.as_bytes());
        Ok(out)
    }

    /// Lease the request's session and check its suite headers.
    async fn open_session(
        &self,
        headers: &SuiteHeaders,
    ) -> Result<(SessionLease, CipherSuite), ApiError> {
        let mut session = self.sessions.lease(headers.session_id()?).await?;
        let suite = headers.suite()?;
        session.bind_suite(&suite)?;
        Ok((session, suite))
    }

    async fn protected_session(
        &self,
        headers: &SuiteHeaders,
    ) -> Result<(SessionLease, CipherSuite), ApiError> {
        let (session, suite) = self.open_session(headers).await?;
        if self.require_auth && !session.is_authenticated() {
            return Err(ApiError::NotAuthenticated);
        }
        Ok((session, suite))
    }

    /// `POST /api/auth`
    pub async fn auth(&self, headers: &SuiteHeaders, body: &[u8]) -> Result<(), ApiError> {
        let (mut session, suite) = self.open_session(headers).await?;
        let key = session.advance_receive()?;

        let (encrypted, signature) =
            wire::split_client_auth(body).ok_or(ApiError::InvalidCertificate)?;
        let pem = framer::decrypt_padded(encrypted, &suite, &key)
            .map_err(|_| ApiError::InvalidCertificate)?;
        let certificate =
            PeerCertificate::from_pem(&pem).map_err(|_| ApiError::InvalidCertificate)?;

        if certificate
            .verify_pkcs1v15_sha256(session.id().as_bytes(), signature)
            .is_err()
        {
            tracing::warn!(
                session_id = %session.id(),
                subject = certificate.subject(),
                "client signature rejected"
            );
            return Err(ApiError::ClientAuthFailed);
        }

        let client = AuthenticatedClient {
            subject: certificate.subject().to_string(),
            fingerprint: hex::encode(certificate.fingerprint()),
            authenticated_at: self.sessions.clock().now(),
        };
        tracing::info!(
            session_id = %session.id(),
            subject = %client.subject,
            "client authenticated"
        );
        session.authenticate(client);
        Ok(())
    }

    /// `GET /api/list`
    pub async fn list(&self, headers: &SuiteHeaders) -> Result<Vec<u8>, ApiError> {
        let (mut session, suite) = self.protected_session(headers).await?;

        let listing = to_pretty_json(&self.catalog.listing())?;
        let key = session.advance_send()?;
        let sealed = framer::seal(&listing, &suite, &key).map_err(ApiError::internal)?;

        tracing::debug!(session_id = %session.id(), items = self.catalog.len(), "catalog listed");
        Ok(sealed.into_bytes())
    }

    /// `GET /api/download`
    ///
    /// Once the session checks pass, both receive steps (media id, then
    /// chunk index) are taken before either parameter is examined, so a
    /// rejected download leaves the session in step with the client. The
    /// send step happens only when a chunk is returned.
    pub async fn download(
        &self,
        headers: &SuiteHeaders,
        sealed_media_id: &[u8],
        sealed_chunk: &[u8],
    ) -> Result<Vec<u8>, ApiError> {
        let (mut session, suite) = self.protected_session(headers).await?;
        let media_key = session.advance_receive()?;
        let chunk_key = session.advance_receive()?;

        let media_id = framer::open(sealed_media_id, &suite, &media_key)
            .map_err(|_| ApiError::InvalidMediaIdHmac)?;
        let item = core::str::from_utf8(&media_id)
            .ok()
            .and_then(|id| self.catalog.get(id))
            .ok_or(ApiError::MediaNotFound)?;

        let chunk_raw = framer::open(sealed_chunk, &suite, &chunk_key)
            .map_err(|_| ApiError::InvalidChunkHmac)?;
        let chunk = wire::parse_chunk_index(&chunk_raw, item.chunk_count())
            .ok_or(ApiError::InvalidChunkId)?;

        let data = self
            .reader
            .read_chunk(item, chunk * CHUNK_SIZE, CHUNK_SIZE as usize)
            .await
            .map_err(|e| ApiError::internal(format!("read {}: {e}", item.file_name)))?;

        let payload = to_pretty_json(&ChunkPayload {
            media_id: &item.id,
            chunk,
            data: BASE64.encode(&data),
        })?;
        let key = session.advance_send()?;
        let sealed = framer::seal(&payload, &suite, &key).map_err(ApiError::internal)?;

        tracing::debug!(
            session_id = %session.id(),
            media_id = %item.id,
            chunk,
            bytes = data.len(),
            "chunk served"
        );
        Ok(sealed.into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{FsChunkReader, MediaItem};
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone, Utc};
    use mediagate_protocol::client::{ClientSession, PendingKey};
    use mediagate_protocol::{BlockMode, CipherAlgorithm};
    use mediagate_sessions::ManualClock;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const SERVER_CERT: &[u8] = include_bytes!("../../fixtures/server.crt");
    const SERVER_KEY: &str = include_str!("../../fixtures/server.key");
    const CLIENT_CERT: &[u8] = include_bytes!("../../fixtures/client.crt");
    const CLIENT_KEY: &str = include_str!("../../fixtures/client.key");
    const CATALOG: &[u8] = include_bytes!("../../fixtures/catalog.json");
    const MEDIA_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../fixtures/catalog");
    const TRACK: &str = "c19ff1694db1b86fa115c116b6481bc40bd2a1af";

    struct CountingReader {
        inner: FsChunkReader,
        reads: AtomicUsize,
    }

    #[async_trait]
    impl ChunkReader for CountingReader {
        async fn read_chunk(
            &self,
            item: &MediaItem,
            offset: u64,
            max_len: usize,
        ) -> std::io::Result<Vec<u8>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.inner.read_chunk(item, offset, max_len).await
        }
    }

    struct Fixture {
        service: MediaService,
        reader: Arc<CountingReader>,
        clock: Arc<ManualClock>,
    }

    fn fixture(require_auth: bool) -> Fixture {
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let clock = Arc::new(ManualClock::new(start));
        let reader = Arc::new(CountingReader {
            inner: FsChunkReader::new(MEDIA_DIR),
            reads: AtomicUsize::new(0),
        });
        let service = MediaService::new(
            Identity::from_pem(SERVER_CERT, SERVER_KEY).unwrap(),
            SessionStore::with_clock(clock.clone()),
            MediaCatalog::from_json(CATALOG).unwrap(),
            reader.clone(),
        )
        .with_require_auth(require_auth);
        Fixture { service, reader, clock }
    }

    fn aes_cbc() -> CipherSuite {
        CipherSuite::new(CipherAlgorithm::Aes256, BlockMode::Cbc, HashAlgorithm::Sha256)
    }

    fn headers_for(client: &ClientSession) -> SuiteHeaders {
        let suite = client.suite();
        SuiteHeaders {
            session_id: Some(client.session_id().to_string()),
            cipher: Some(suite.cipher.index()),
            mode: Some(suite.mode.index()),
            hash: Some(suite.hash.index()),
        }
    }

    async fn establish(service: &MediaService, suite: CipherSuite) -> ClientSession {
        let pending = PendingKey::new(suite, &mut OsRng);
        let headers = SuiteHeaders { hash: Some(suite.hash.index()), ..Default::default() };
        let reply = service.key(&headers, &pending.request_body().unwrap()).await.unwrap();
        pending.finish(&reply).unwrap()
    }

    async fn authenticated(service: &MediaService, suite: CipherSuite) -> ClientSession {
        let mut client = establish(service, suite).await;
        let identity = Identity::from_pem(CLIENT_CERT, CLIENT_KEY).unwrap();
        let body = client.auth_body(&identity).unwrap();
        service.auth(&headers_for(&client), &body).await.unwrap();
        client
    }

    async fn download(
        service: &MediaService,
        client: &mut ClientSession,
        media_id: &[u8],
        chunk: &[u8],
    ) -> Result<Vec<u8>, ApiError> {
        let id = client.seal(media_id).unwrap();
        let chunk = client.seal(chunk).unwrap();
        service.download(&headers_for(client), &id, &chunk).await
    }

    fn open_json(client: &mut ClientSession, sealed: &[u8]) -> serde_json::Value {
        serde_json::from_slice(&client.open(sealed).unwrap()).unwrap()
    }

    async fn receive_steps(service: &MediaService, client: &ClientSession) -> u64 {
        service.sessions().lease(client.session_id()).await.unwrap().receive_steps()
    }

    #[tokio::test]
    async fn auth_records_client_identity() {
        let f = fixture(true);
        let client = authenticated(&f.service, aes_cbc()).await;
        let session = f.service.sessions().lease(client.session_id()).await.unwrap();
        let recorded = session.client().unwrap();
        assert!(recorded.subject.contains("mediagate-client"));
        assert_eq!(recorded.fingerprint.len(), 64);
        assert_eq!(session.receive_steps(), 1);
    }

    #[tokio::test]
    async fn auth_rejects_bad_signature() {
        let f = fixture(true);
        let mut client = establish(&f.service, aes_cbc()).await;
        let identity = Identity::from_pem(CLIENT_CERT, CLIENT_KEY).unwrap();
        let mut body = client.auth_body(&identity).unwrap();
        let last = body.len() - 1;
        body[last] ^= 0x01;
        let err = f.service.auth(&headers_for(&client), &body).await.unwrap_err();
        assert!(matches!(err, ApiError::ClientAuthFailed));
    }

    #[tokio::test]
    async fn auth_rejects_garbage_certificate() {
        let f = fixture(true);
        let client = establish(&f.service, aes_cbc()).await;
        let err = f.service.auth(&headers_for(&client), &[0u8; 500]).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidCertificate));
        let err = f.service.auth(&headers_for(&client), &[0u8; 10]).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidCertificate));
    }

    #[tokio::test]
    async fn list_requires_authentication() {
        let f = fixture(true);
        let client = establish(&f.service, aes_cbc()).await;
        let err = f.service.list(&headers_for(&client)).await.unwrap_err();
        assert!(matches!(err, ApiError::NotAuthenticated));
    }

    #[tokio::test]
    async fn list_without_auth_when_permissive() {
        let f = fixture(false);
        let mut client = establish(&f.service, aes_cbc()).await;
        let sealed = f.service.list(&headers_for(&client)).await.unwrap();
        let listing = open_json(&mut client, &sealed);
        assert_eq!(listing[0]["id"], TRACK);
        assert_eq!(listing[0]["chunks"], 3);
    }

    #[tokio::test]
    async fn out_of_range_chunks_never_touch_the_file() {
        let f = fixture(true);
        let mut client = authenticated(&f.service, aes_cbc()).await;

        for chunk in [&b"-1"[..], b"3", b"abc"] {
            let err = download(&f.service, &mut client, TRACK.as_bytes(), chunk).await.unwrap_err();
            assert!(matches!(err, ApiError::InvalidChunkId));
        }
        assert_eq!(f.reader.reads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unknown_media_is_not_found() {
        let f = fixture(true);
        let mut client = authenticated(&f.service, aes_cbc()).await;
        let err = download(&f.service, &mut client, b"0000", b"0").await.unwrap_err();
        assert!(matches!(err, ApiError::MediaNotFound));
        assert_eq!(err.to_string(), "media file not found");
        assert_eq!(f.reader.reads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn session_stays_in_step_after_unknown_media() {
        let f = fixture(true);
        let mut client = authenticated(&f.service, aes_cbc()).await;

        let err = download(&f.service, &mut client, b"unknown", b"0").await.unwrap_err();
        assert!(matches!(err, ApiError::MediaNotFound));
        assert_eq!(receive_steps(&f.service, &client).await, client.send_steps());

        let sealed = download(&f.service, &mut client, TRACK.as_bytes(), b"1").await.unwrap();
        assert_eq!(open_json(&mut client, &sealed)["chunk"], 1);
    }

    #[tokio::test]
    async fn download_serves_last_chunk() {
        let f = fixture(true);
        let mut client = authenticated(&f.service, aes_cbc()).await;
        let sealed = download(&f.service, &mut client, TRACK.as_bytes(), b"2").await.unwrap();

        let payload = open_json(&mut client, &sealed);
        assert_eq!(payload["media_id"], TRACK);
        assert_eq!(payload["chunk"], 2);
        let data = BASE64.decode(payload["data"].as_str().unwrap()).unwrap();
        assert_eq!(data.len(), 10_000 - 8192);
        assert_eq!(f.reader.reads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn tampered_media_id_fails_hmac() {
        let f = fixture(true);
        let mut client = authenticated(&f.service, aes_cbc()).await;
        let mut id = client.seal(TRACK.as_bytes()).unwrap();
        id[0] ^= 0x80;
        let chunk = client.seal(b"0").unwrap();
        let err = f.service.download(&headers_for(&client), &id, &chunk).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidMediaIdHmac));
        assert_eq!(receive_steps(&f.service, &client).await, client.send_steps());

        let sealed = download(&f.service, &mut client, TRACK.as_bytes(), b"0").await.unwrap();
        assert_eq!(open_json(&mut client, &sealed)["media_id"], TRACK);
    }

    #[tokio::test]
    async fn download_checks_expiry() {
        let f = fixture(true);
        let mut client = authenticated(&f.service, aes_cbc()).await;
        f.clock.advance(Duration::hours(24));
        let err = download(&f.service, &mut client, TRACK.as_bytes(), b"0").await.unwrap_err();
        assert!(matches!(err, ApiError::SessionExpired));
        assert!(!f.service.sessions().contains(client.session_id()).await);
    }

    #[tokio::test]
    async fn suite_mismatch_consumes_no_step() {
        let f = fixture(true);
        let mut client = authenticated(&f.service, aes_cbc()).await;

        let mut wrong = headers_for(&client);
        wrong.mode = Some(BlockMode::Ctr.index());
        let err = f.service.list(&wrong).await.unwrap_err();
        assert!(matches!(err, ApiError::SuiteMismatch));

        let sealed = f.service.list(&headers_for(&client)).await.unwrap();
        assert!(client.open(&sealed).is_ok());
    }

    #[tokio::test]
    async fn missing_or_unknown_session() {
        let f = fixture(true);
        let err = f.service.list(&SuiteHeaders::default()).await.unwrap_err();
        assert!(matches!(err, ApiError::SessionNotFound));

        let headers = SuiteHeaders { session_id: Some("deadbeef".into()), ..Default::default() };
        let err = f.service.auth(&headers, &[]).await.unwrap_err();
        assert!(matches!(err, ApiError::SessionNotFound));
    }

    #[tokio::test]
    async fn key_rejects_unknown_hash() {
        let f = fixture(true);
        let pending = PendingKey::new(aes_cbc(), &mut OsRng);
        let headers = SuiteHeaders { hash: Some(9), ..Default::default() };
        let err = f.service.key(&headers, &pending.request_body().unwrap()).await.unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
        let err = f.service.key(&SuiteHeaders::default(), b"short").await.unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[test]
    fn headers_parse_ascii_indices() {
        let mut map = HeaderMap::new();
        map.insert(HEADER_SESSION_ID, "abc".parse().unwrap());
        map.insert(HEADER_SUITE_CIPHER, "1".parse().unwrap());
        map.insert(HEADER_SUITE_MODE, "0".parse().unwrap());
        map.insert(HEADER_SUITE_HASH, "x".parse().unwrap());
        let h = SuiteHeaders::from_headers(&map);
        assert_eq!(h.session_id.as_deref(), Some("abc"));
        assert_eq!((h.cipher, h.mode, h.hash), (Some(1), Some(0), None));
        assert!(h.suite().is_err());
    }
}
