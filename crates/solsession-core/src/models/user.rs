use serde::{Deserialize, Serialize};

use crate::auth::Role;

/// Profile of the logged-in user as reported by the backend.
///
/// Display-only: authorization decisions read the roles embedded in the
/// access token, never `role` here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: i64,
    #[serde(rename = "nom")]
    pub display_name: String,
    pub email: String,
    pub role: Role,
    #[serde(rename = "actif", default = "default_active")]
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_creation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_modification: Option<String>,
}

fn default_active() -> bool {
    true
}
