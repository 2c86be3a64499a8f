use serde::{Deserialize, Serialize};

use crate::auth::Role;

use super::UserProfile;

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// One-time access code, field name fixed by the backend
    #[serde(rename = "codeAcces", skip_serializing_if = "Option::is_none")]
    pub access_code: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenewRequest {
    pub refresh_token: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    #[serde(rename = "nom")]
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmailRequest {
    pub email: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordResetRequest {
    pub token: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordChangeRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfileUpdate {
    #[serde(rename = "nom", skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Generic acknowledgement body; the backend is loose about what it returns.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiMessage {
    #[serde(default)]
    pub message: Option<String>,
}

/// Credential pair issued by login and by renewal.
///
/// Login always fills the identity fields; renewal may omit them.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default, alias = "type")]
    pub token_type: Option<String>,
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default, rename = "nom")]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl TokenResponse {
    /// Build a best-effort profile from the identity fields of the response.
    /// Used when the profile endpoint cannot be reached right after issuance.
    pub fn profile_hint(&self) -> Option<UserProfile> {
        let role = self
            .roles
            .iter()
            .find_map(|r| Role::parse(r))
            .unwrap_or(Role::User);

        Some(UserProfile {
            id: self.id?,
            display_name: self.display_name.clone()?,
            email: self.email.clone()?,
            role,
            active: true,
            date_creation: None,
            date_modification: None,
        })
    }
}
