//! Authentication module for managing the client-held session.
//!
//! This module provides:
//! - `codec`: unverified decoding of access-token claims
//! - `store`: durable credential persistence (`FileStore`, `MemoryStore`)
//! - `SessionManager`: observable session state with transparent renewal
//! - `AuthGuard` / `AdminGuard`: navigation policies
//! - `CredentialStore`: OS keychain storage for a remembered login secret
//!
//! Access tokens are short-lived; an expired token is renewed once, with all
//! concurrent callers sharing the same renewal attempt.

pub mod codec;
pub mod credentials;
pub mod guard;
pub mod refresh;
pub mod roles;
pub mod session;
pub mod state;
pub mod store;

pub use codec::{Claims, DecodeError};
pub use credentials::CredentialStore;
pub use guard::{AdminGuard, AuthGuard, Denial, Guard, Navigator, Surface};
pub use refresh::{RefreshPhase, RenewalError};
pub use roles::Role;
pub use session::{ListenerId, SessionManager};
pub use state::SessionState;
pub use store::{FileStore, MemoryStore, SessionStore, StoreKey};
