//! REST API client module for the Sol Solution backend.
//!
//! This module provides the `ApiClient` used by the session manager to log
//! in, renew tokens and fetch the user profile, plus the account operations
//! (registration, access codes, password reset) that surround them.
//!
//! Every request passes through the `RequestAugmenter`, which attaches the
//! current bearer token read fresh from the session store.

pub mod augmenter;
pub mod backend;
pub mod client;
pub mod error;

pub use augmenter::{RequestAugmenter, RENEWAL_PATH};
pub use backend::AuthBackend;
pub use client::ApiClient;
pub use error::ApiError;
