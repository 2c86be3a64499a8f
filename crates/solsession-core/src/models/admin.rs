use serde::{Deserialize, Serialize};

use crate::auth::Role;

/// Body of `POST /admin/users`. The backend mails the new user an access code.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct NewUser {
    #[serde(rename = "nom")]
    pub display_name: String,
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoleUpdate {
    pub role: Role,
}

/// An entry of the backend's user activity log.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct UserAction {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub type_action: String,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub date_action: Option<String>,
}
