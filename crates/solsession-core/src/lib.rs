//! Client-held authentication and session management for the Sol Solution API.
//!
//! The crate is organized leaf-first:
//! - `auth::codec`: reads the claims embedded in a bearer token
//! - `auth::store`: durable key/value persistence for credentials
//! - `auth::session`: the `SessionManager` hub, its observable state and the
//!   single-flight renewal protocol
//! - `auth::guard`: navigation policies built on top of the session
//! - `api`: the HTTP backend client and the request augmenter that attaches
//!   the current credential to every outbound call

pub mod api;
pub mod auth;
pub mod config;
pub mod models;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{ApiClient, ApiError, AuthBackend, RequestAugmenter};
pub use auth::{
    AdminGuard, AuthGuard, Claims, CredentialStore, Denial, FileStore, Guard, ListenerId,
    MemoryStore, Navigator, RefreshPhase, Role, SessionManager, SessionState, SessionStore,
    StoreKey, Surface,
};
pub use config::Config;
pub use models::{NewUser, TokenResponse, UserAction, UserProfile};
