use anyhow::Result;
use async_trait::async_trait;

use crate::models::{TokenResponse, UserProfile};

/// Backend calls the session manager depends on.
///
/// Implemented over HTTP by [`ApiClient`](super::ApiClient). Errors are not
/// classified: the session treats every failure the same way.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    async fn authenticate(&self, email: &str, password: &str) -> Result<TokenResponse>;

    async fn authenticate_with_code(&self, email: &str, code: &str) -> Result<TokenResponse>;

    /// Exchange a renewal token for a new credential pair
    async fn renew(&self, refresh_token: &str) -> Result<TokenResponse>;

    /// Profile of whoever the stored access token belongs to
    async fn fetch_profile(&self) -> Result<UserProfile>;

    /// Server-side invalidation. `access_token` is the token that was current
    /// before the local session was cleared.
    async fn logout(&self, access_token: Option<&str>) -> Result<()>;
}
