//! Data models for the Sol Solution authentication API.
//!
//! - `user`: the profile returned by `/users/profile`
//! - `auth`: request bodies and the token response shared by login and renewal
//! - `admin`: user management and the activity log

pub mod admin;
pub mod auth;
pub mod user;

pub use admin::{NewUser, RoleUpdate, UserAction};
pub use auth::{
    ApiMessage, EmailRequest, LoginRequest, PasswordChangeRequest, PasswordResetRequest,
    ProfileUpdate, RegisterRequest, RenewRequest, TokenResponse,
};
pub use user::UserProfile;
