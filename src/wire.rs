//! Wire constants and small framing helpers.
//!
//! /protocols  request:  client_random[32] || JSON array of suite names
//!             response: protocol "\n" || server certificate PEM || PSS signature
//! /key        request:  salt[32] || client P-384 public key (PEM SPKI)
//!             response: session id "\n" || server P-384 public key (PEM SPKI)
//! /auth       request:  E(pad32(client certificate PEM)) || PKCS#1 v1.5 signature[384]
//!
//! Suite headers carry component indices as ASCII decimal strings.

/// Length of the client random that prefixes a /protocols body.
pub const CLIENT_RANDOM_BYTES: usize = 32;

/// Length of the per-session salt that prefixes a /key body.
pub const SALT_BYTES: usize = 32;

/// Client signature size: RSA-3072 PKCS#1 v1.5.
pub const CLIENT_SIGNATURE_BYTES: usize = 384;

/// Media files are served in fixed-size chunks; the last one may be short.
pub const CHUNK_SIZE: u64 = 4096;

/// Label returned when no offered suite is acceptable.
pub const NO_AVAILABLE_PROTOCOL: &str = "No available protocol";

pub const HEADER_SESSION_ID: &str = "id";
pub const HEADER_SUITE_CIPHER: &str = "suite_cipher";
pub const HEADER_SUITE_MODE: &str = "suite_mode";
pub const HEADER_SUITE_HASH: &str = "suite_hash";

pub fn chunk_count(file_size: u64) -> u64 {
    file_size.div_ceil(CHUNK_SIZE)
}

/// Parse a suite header value (ASCII decimal, surrounding whitespace allowed).
pub fn parse_suite_index(raw: &[u8]) -> Option<u8> {
    core::str::from_utf8(raw).ok()?.trim().parse().ok()
}

/// Parse a decrypted chunk index and check it against `chunks`.
pub fn parse_chunk_index(raw: &[u8], chunks: u64) -> Option<u64> {
    let index: i64 = core::str::from_utf8(raw).ok()?.trim().parse().ok()?;
    u64::try_from(index).ok().filter(|&i| i < chunks)
}

/// Split at the first `\n`.
pub fn split_line(body: &[u8]) -> Option<(&[u8], &[u8])> {
    let at = body.iter().position(|&b| b == b'\n')?;
    Some((&body[..at], &body[at + 1..]))
}

/// Split an /auth body into the encrypted certificate and the trailing
/// client signature.
pub fn split_client_auth(body: &[u8]) -> Option<(&[u8], &[u8])> {
    let at = body.len().checked_sub(CLIENT_SIGNATURE_BYTES)?;
    Some(body.split_at(at))
}
