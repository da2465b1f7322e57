//! # MediaGate protocol core
//!
//! Session cryptography for a media distribution server.
//!
//! ## Quick Start
//!
//! ```rust
//! use mediagate_protocol::{framer, Ratchet, CipherSuite};
//!
//! let suite = CipherSuite::parse_name("TLS_AES_CBC_SHA256").unwrap();
//! let salt = [0u8; 32];
//!
//! // Both peers start a chain from the same seed and step it once per message.
//! let mut sender = Ratchet::new([1u8; 32]);
//! let mut receiver = Ratchet::new([1u8; 32]);
//!
//! let key = sender.step(suite.hash, &salt).unwrap();
//! let sealed = framer::seal(b"chunk", &suite, &key).unwrap().into_bytes();
//!
//! let key = receiver.step(suite.hash, &salt).unwrap();
//! assert_eq!(framer::open(&sealed, &suite, &key).unwrap(), b"chunk");
//! ```
//!
//! ## Properties
//!
//! - **Negotiated suites**: AES-256 or Camellia-256, CBC or CTR, SHA-256 or SHA3-256
//! - **Forward-moving keys**: every message consumes one ratchet step per direction
//! - **Encrypt-then-MAC**: tags are checked in constant time before decryption
//! - **Uniform errors**: every open failure is the same [`AuthenticationFailure`]
//!
//! ## What's NOT Provided
//!
//! - HTTP transport (see `mediagate-server`)
//! - Session storage (see `mediagate-sessions`)
//! - Certificate chain validation

#![deny(unsafe_code)]

mod error;
mod kdf;

pub mod agreement;
pub mod client;
pub mod framer;
pub mod handshake;
pub mod identity;
pub mod ratchet;
pub mod suite;
pub mod wire;

pub use agreement::{RatchetSeeds, ServerAgreement};
pub use error::{AuthenticationFailure, EncodingError, ProtocolError};
pub use handshake::{ClientHello, Negotiation, ServerHello};
pub use identity::{Identity, PeerCertificate};
pub use ratchet::{MessageKey, Ratchet};
pub use suite::{BlockMode, CipherAlgorithm, CipherSuite, HashAlgorithm};

#[doc(hidden)]
pub use kdf::{hkdf, hmac};
