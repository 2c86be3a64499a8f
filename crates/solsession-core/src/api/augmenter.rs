//! Attaches the current access token to outbound requests.

use std::sync::Arc;

use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::Request;
use tracing::{trace, warn};

use crate::auth::{SessionStore, StoreKey};

/// The renewal endpoint never carries the access token it exists to replace.
pub const RENEWAL_PATH: &str = "/auth/refresh-token";

#[derive(Clone)]
pub struct RequestAugmenter {
    store: Arc<dyn SessionStore>,
}

impl RequestAugmenter {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    pub fn is_exempt(request: &Request) -> bool {
        request.url().path().contains(RENEWAL_PATH)
    }

    /// Add `Authorization: Bearer <token>` using the token stored right now.
    /// Without a stored token the request passes through unchanged.
    pub fn augment(&self, mut request: Request) -> Request {
        if Self::is_exempt(&request) {
            trace!(url = %request.url(), "Renewal request, not attaching token");
            return request;
        }
        let Some(token) = self.store.get(StoreKey::AuthToken) else {
            return request;
        };
        match HeaderValue::from_str(&format!("Bearer {}", token)) {
            Ok(mut value) => {
                value.set_sensitive(true);
                request.headers_mut().insert(AUTHORIZATION, value);
            }
            Err(_) => warn!("Stored access token is not a valid header value, sending without it"),
        }
        request
    }
}
