//! Observable session state and the pure authorization checks over it.

use chrono::Utc;
use serde::Serialize;

use super::{Claims, Role};
use crate::models::UserProfile;

/// Snapshot of the current session.
///
/// `current_user` is only ever set alongside claims that were unexpired at
/// that moment; staleness is discovered by re-checking, never pushed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct SessionState {
    pub claims: Option<Claims>,
    pub current_user: Option<UserProfile>,
}

impl SessionState {
    pub fn new(claims: Claims, current_user: Option<UserProfile>) -> Self {
        Self {
            claims: Some(claims),
            current_user,
        }
    }

    /// Claims are present and unexpired. Does not attempt renewal.
    pub fn has_fresh_claims(&self) -> bool {
        self.has_fresh_claims_at(Utc::now().timestamp())
    }

    pub fn has_fresh_claims_at(&self, now: i64) -> bool {
        self.claims.as_ref().is_some_and(|c| c.is_valid_at(now))
    }

    /// Role names from the last decoded token, in token order
    pub fn roles(&self) -> &[String] {
        self.claims
            .as_ref()
            .map(|c| c.granted_roles.as_slice())
            .unwrap_or_default()
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.claims
            .as_ref()
            .is_some_and(|c| c.roles().any(|r| r == role))
    }

    /// True when `required` is empty or shares at least one role with the token
    pub fn has_any_role(&self, required: &[Role]) -> bool {
        required.is_empty() || required.iter().any(|r| self.has_role(*r))
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }

    pub fn is_manager(&self) -> bool {
        self.has_role(Role::Manager)
    }

    pub fn is_user(&self) -> bool {
        self.has_role(Role::User)
    }

    pub fn is_admin_or_manager(&self) -> bool {
        self.is_admin() || self.is_manager()
    }
}
