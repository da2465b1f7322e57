//! # MediaGate Sessions
//!
//! Server-side session state for the MediaGate protocol.
//!
//! A session is created by `/key` and holds the two ratchet chains, the
//! salt and hash fixed at creation, the suite bound by the first protected
//! request and the authenticated client, if any. Sessions expire one day
//! after creation; expiry is enforced lazily on lookup and by
//! [`SessionStore::purge_expired`].
//!
//! ## Quick Start
//!
//! ```ignore
//! use mediagate_sessions::SessionStore;
//!
//! let store = SessionStore::new();
//! let id = store.create(seeds, salt, HashAlgorithm::Sha256).await;
//!
//! let mut session = store.lease(id.as_str()).await?;
//! let key = session.advance_receive()?;
//! ```

pub mod clock;
pub mod error;
pub mod session;
pub mod store;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::SessionError;
pub use session::Session;
pub use store::{SessionLease, SessionStore, SESSION_LIFETIME_SECS};
pub use types::{AuthenticatedClient, SessionId};

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
