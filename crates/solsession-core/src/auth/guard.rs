//! Navigation guards.
//!
//! A guard is consulted before a navigation completes. It renews the session
//! if needed, then either allows the transition or redirects through the
//! [`Navigator`]. Failures inside the check always read as "not
//! authenticated"; nothing escapes to the navigation layer.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info};

use super::{Role, SessionManager};

/// Where a denied navigation is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    UserLogin,
    AdminLogin,
    Unauthorized,
}

impl Surface {
    pub fn path(&self) -> &'static str {
        match self {
            Surface::UserLogin => "/user-login",
            Surface::AdminLogin => "/admin-login",
            Surface::Unauthorized => "/unauthorized",
        }
    }
}

/// The navigation layer, as seen by guards.
pub trait Navigator: Send + Sync {
    fn navigate(&self, surface: Surface);
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Denial {
    #[error("not authenticated")]
    NotAuthenticated,

    /// Valid session, insufficient role. Never ends the session.
    #[error("authorization denied: requires one of {required:?}")]
    AuthorizationDenied { required: Vec<Role> },
}

#[async_trait]
pub trait Guard: Send + Sync {
    /// Decide a navigation, redirecting on denial.
    async fn can_activate(&self, required_roles: &[Role]) -> bool;
}

/// Any authenticated user, optionally restricted to a set of roles.
pub struct AuthGuard {
    session: SessionManager,
    navigator: Arc<dyn Navigator>,
}

impl AuthGuard {
    pub fn new(session: SessionManager, navigator: Arc<dyn Navigator>) -> Self {
        Self { session, navigator }
    }

    /// Decision without side effects on denial. May renew the session.
    pub async fn check(&self, required_roles: &[Role]) -> Result<(), Denial> {
        if !self.session.is_authenticated().await {
            return Err(Denial::NotAuthenticated);
        }
        if !self.session.has_any_role(required_roles) {
            return Err(Denial::AuthorizationDenied {
                required: required_roles.to_vec(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Guard for AuthGuard {
    async fn can_activate(&self, required_roles: &[Role]) -> bool {
        match self.check(required_roles).await {
            Ok(()) => {
                debug!(?required_roles, "AuthGuard: allowed");
                true
            }
            Err(Denial::NotAuthenticated) => {
                info!("AuthGuard: not authenticated, redirecting to user login");
                self.session.clear_session();
                self.navigator.navigate(Surface::UserLogin);
                false
            }
            Err(denial) => {
                info!(%denial, "AuthGuard: redirecting to unauthorized");
                self.navigator.navigate(Surface::Unauthorized);
                false
            }
        }
    }
}

/// Admins and managers only. The required-role list is ignored; the policy is fixed.
pub struct AdminGuard {
    session: SessionManager,
    navigator: Arc<dyn Navigator>,
}

impl AdminGuard {
    pub fn new(session: SessionManager, navigator: Arc<dyn Navigator>) -> Self {
        Self { session, navigator }
    }

    pub async fn check(&self) -> Result<(), Denial> {
        if !self.session.is_authenticated().await {
            return Err(Denial::NotAuthenticated);
        }
        if !self.session.is_admin_or_manager() {
            return Err(Denial::AuthorizationDenied {
                required: vec![Role::Admin, Role::Manager],
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Guard for AdminGuard {
    async fn can_activate(&self, _required_roles: &[Role]) -> bool {
        match self.check().await {
            Ok(()) => {
                debug!("AdminGuard: allowed");
                true
            }
            Err(denial) => {
                info!(%denial, "AdminGuard: redirecting to admin login");
                self.session.clear_session();
                self.navigator.navigate(Surface::AdminLogin);
                false
            }
        }
    }
}
