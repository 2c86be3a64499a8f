//! API client for the Sol Solution authentication endpoints.
//!
//! Requests are built with reqwest, run through the [`RequestAugmenter`]
//! and executed on a shared connection pool.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::{ApiError, AuthBackend, RequestAugmenter, RENEWAL_PATH};
use crate::auth::Role;
use crate::config::Config;
use crate::models::{
    ApiMessage, EmailRequest, LoginRequest, NewUser, PasswordChangeRequest, PasswordResetRequest,
    ProfileUpdate, RegisterRequest, RenewRequest, RoleUpdate, TokenResponse, UserAction,
    UserProfile,
};

/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    augmenter: RequestAugmenter,
}

impl ApiClient {
    pub fn new(config: &Config, augmenter: RequestAugmenter) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.api_url().to_string(),
            augmenter,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: Response) -> Result<Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body).into())
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        let request = builder.build().context("Failed to build request")?;
        let method = request.method().clone();
        let url = request.url().clone();
        let request = self.augmenter.augment(request);

        debug!(%method, %url, "Sending request");
        let response = self
            .client
            .execute(request)
            .await
            .map_err(ApiError::from)
            .with_context(|| format!("Failed to send {} request to {}", method, url))?;
        Self::check_response(response).await
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let response = self.send(builder).await?;
        let url = response.url().clone();
        response
            .json()
            .await
            .with_context(|| format!("Failed to parse JSON response from {}", url))
    }

    /// For endpoints that may answer with an empty or non-JSON body.
    async fn send_ack(&self, builder: RequestBuilder) -> Result<ApiMessage> {
        let response = self.send(builder).await?;
        let body = response.text().await.unwrap_or_default();
        if body.trim().is_empty() {
            return Ok(ApiMessage::default());
        }
        Ok(serde_json::from_str(&body).unwrap_or(ApiMessage {
            message: Some(body),
        }))
    }

    async fn login(&self, path: &str, request: &LoginRequest) -> Result<TokenResponse> {
        self.send_json(self.client.post(self.url(path)).json(request))
            .await
            .context("Authentication request failed")
    }

    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
        role: Option<Role>,
    ) -> Result<ApiMessage> {
        let body = RegisterRequest {
            name: name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            role,
        };
        self.send_ack(self.client.post(self.url("/auth/register")).json(&body))
            .await
    }

    /// Ask the backend to email a one-time access code
    pub async fn generate_access_code(&self, email: &str) -> Result<ApiMessage> {
        let body = EmailRequest { email: email.to_string() };
        self.send_ack(self.client.post(self.url("/auth/generate-access-code")).json(&body))
            .await
    }

    pub async fn request_password_reset(&self, email: &str) -> Result<ApiMessage> {
        let body = EmailRequest { email: email.to_string() };
        self.send_ack(self.client.post(self.url("/auth/password-reset/request")).json(&body))
            .await
    }

    pub async fn validate_reset_token(&self, token: &str) -> Result<ApiMessage> {
        let mut url = reqwest::Url::parse(&self.url("/auth/password-reset/validate"))
            .context("Invalid API base URL")?;
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("API base URL cannot hold a path"))?
            .push(token);
        self.send_ack(self.client.get(url)).await
    }

    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<ApiMessage> {
        let body = PasswordResetRequest {
            token: token.to_string(),
            new_password: new_password.to_string(),
        };
        self.send_ack(self.client.post(self.url("/auth/password-reset/reset")).json(&body))
            .await
    }

    /// Change the password of the logged-in user
    pub async fn update_password(&self, current: &str, new_password: &str) -> Result<ApiMessage> {
        let body = PasswordChangeRequest {
            current_password: current.to_string(),
            new_password: new_password.to_string(),
        };
        self.send_ack(self.client.put(self.url("/auth/reset-password")).json(&body))
            .await
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<UserProfile> {
        self.send_json(self.client.put(self.url("/users/profile")).json(update))
            .await
    }

    /// Activity log of the logged-in user
    pub async fn user_actions(&self) -> Result<Vec<UserAction>> {
        self.send_json(self.client.get(self.url("/users/actions")))
            .await
            .context("Failed to fetch user actions")
    }

    // Admin endpoints. The backend enforces the role; callers gate them
    // behind `AdminGuard`.

    pub async fn list_users(&self) -> Result<Vec<UserProfile>> {
        self.send_json(self.client.get(self.url("/admin/users")))
            .await
            .context("Failed to fetch users")
    }

    pub async fn create_user(&self, user: &NewUser) -> Result<UserProfile> {
        self.send_json(self.client.post(self.url("/admin/users")).json(user))
            .await
            .with_context(|| format!("Failed to create user {}", user.email))
    }

    pub async fn update_user_role(&self, user_id: i64, role: Role) -> Result<UserProfile> {
        let url = self.url(&format!("/admin/users/{}/role", user_id));
        self.send_json(self.client.put(url).json(&RoleUpdate { role }))
            .await
            .with_context(|| format!("Failed to update role of user {}", user_id))
    }

    /// Issue a new access code, mailed to the user by the backend
    pub async fn reset_user_code(&self, user_id: i64) -> Result<ApiMessage> {
        let url = self.url(&format!("/admin/users/{}/access-code", user_id));
        self.send_ack(self.client.put(url).json(&serde_json::json!({})))
            .await
    }

    /// Flip a user between active and inactive
    pub async fn toggle_user_status(&self, user_id: i64) -> Result<UserProfile> {
        let url = self.url(&format!("/admin/users/{}/status", user_id));
        self.send_json(self.client.put(url).json(&serde_json::json!({})))
            .await
            .with_context(|| format!("Failed to toggle status of user {}", user_id))
    }

    pub async fn list_actions(&self) -> Result<Vec<UserAction>> {
        self.send_json(self.client.get(self.url("/admin/actions")))
            .await
            .context("Failed to fetch activity log")
    }
}

#[async_trait]
impl AuthBackend for ApiClient {
    async fn authenticate(&self, email: &str, password: &str) -> Result<TokenResponse> {
        let request = LoginRequest {
            email: email.to_string(),
            password: Some(password.to_string()),
            access_code: None,
        };
        self.login("/auth/authenticate", &request).await
    }

    async fn authenticate_with_code(&self, email: &str, code: &str) -> Result<TokenResponse> {
        let request = LoginRequest {
            email: email.to_string(),
            password: None,
            access_code: Some(code.to_string()),
        };
        self.login("/auth/authenticate-user-code", &request).await
    }

    async fn renew(&self, refresh_token: &str) -> Result<TokenResponse> {
        let body = RenewRequest {
            refresh_token: refresh_token.to_string(),
        };
        self.send_json(self.client.post(self.url(RENEWAL_PATH)).json(&body))
            .await
            .context("Token renewal failed")
    }

    async fn fetch_profile(&self) -> Result<UserProfile> {
        self.send_json(self.client.get(self.url("/users/profile")))
            .await
            .context("Failed to fetch user profile")
    }

    async fn logout(&self, access_token: Option<&str>) -> Result<()> {
        let mut builder = self
            .client
            .post(self.url("/auth/logout"))
            .json(&serde_json::json!({}));
        if let Some(token) = access_token {
            builder = builder.bearer_auth(token);
        }
        self.send(builder).await?;
        Ok(())
    }
}
