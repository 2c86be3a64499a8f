//! Access-token claim decoding.
//!
//! Tokens are read, not verified: signature checks belong to the backend that
//! issued them. A token that cannot be read is treated by callers as if no
//! token were present.

use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use base64::Engine;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::Role;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("token does not have three dot-separated segments")]
    Malformed,

    #[error("token payload is not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("token payload is not a valid claims object: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Claims read from an access token payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Claims {
    pub subject: String,
    /// Role names in the order the token lists them, recognized or not
    pub granted_roles: Vec<String>,
    pub email: Option<String>,
    /// Expiry as Unix seconds; a token without one is always expired
    pub expires_at: Option<i64>,
}

impl Claims {
    /// True when the token expires strictly after `now` (Unix seconds)
    pub fn is_valid_at(&self, now: i64) -> bool {
        self.expires_at.is_some_and(|exp| exp > now)
    }

    pub fn is_expired(&self) -> bool {
        !self.is_valid_at(Utc::now().timestamp())
    }

    /// Recognized roles, in token order
    pub fn roles(&self) -> impl Iterator<Item = Role> + '_ {
        self.granted_roles.iter().filter_map(|r| Role::parse(r))
    }
}

#[derive(Debug, Deserialize)]
struct RawClaims {
    #[serde(default)]
    sub: String,
    #[serde(default, alias = "roles", alias = "authorities")]
    role: Option<RoleClaim>,
    #[serde(default)]
    email: Option<String>,
    /// NumericDate may carry a fractional part
    #[serde(default)]
    exp: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RoleClaim {
    Many(Vec<RoleEntry>),
    One(String),
}

/// Spring-style tokens wrap each role as `{"authority": "ADMIN"}`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RoleEntry {
    Name(String),
    Authority { authority: String },
}

impl From<RawClaims> for Claims {
    fn from(raw: RawClaims) -> Self {
        let granted_roles = match raw.role {
            Some(RoleClaim::Many(entries)) => entries
                .into_iter()
                .map(|e| match e {
                    RoleEntry::Name(name) => name,
                    RoleEntry::Authority { authority } => authority,
                })
                .collect(),
            Some(RoleClaim::One(name)) => vec![name],
            None => Vec::new(),
        };

        Self {
            subject: raw.sub,
            granted_roles,
            email: raw.email,
            expires_at: raw.exp.filter(|e| e.is_finite()).map(|e| e.floor() as i64),
        }
    }
}

/// Decode the payload segment of a `header.payload.signature` token.
pub fn decode(raw: &str) -> Result<Claims, DecodeError> {
    let mut segments = raw.trim().split('.');
    let payload = match (segments.next(), segments.next(), segments.next(), segments.next()) {
        (Some(_), Some(payload), Some(_), None) if !payload.is_empty() => payload,
        _ => return Err(DecodeError::Malformed),
    };

    let payload = payload.trim_end_matches('=');
    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .or_else(|_| STANDARD_NO_PAD.decode(payload))?;
    let raw: RawClaims = serde_json::from_slice(&bytes)?;
    Ok(raw.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::mint_token_with_payload;

    #[test]
    fn test_decode_authority_objects_keeps_order() {
        let token = mint_token_with_payload(serde_json::json!({
            "sub": "a@b.com",
            "role": [{"authority": "MANAGER"}, {"authority": "USER"}],
            "exp": 4_102_444_800i64,
        }));
        let claims = decode(&token).unwrap();
        assert_eq!(claims.subject, "a@b.com");
        assert_eq!(claims.granted_roles, vec!["MANAGER", "USER"]);
        assert_eq!(claims.expires_at, Some(4_102_444_800));
        assert!(!claims.is_expired());
    }

    #[test]
    fn test_decode_plain_role_list_and_single_role() {
        let token = mint_token_with_payload(serde_json::json!({
            "sub": "x", "roles": ["ADMIN", "AUDITOR"], "exp": 10
        }));
        let claims = decode(&token).unwrap();
        assert_eq!(claims.granted_roles, vec!["ADMIN", "AUDITOR"]);
        assert_eq!(claims.roles().collect::<Vec<_>>(), vec![Role::Admin]);

        let token = mint_token_with_payload(serde_json::json!({"sub": "x", "role": "USER"}));
        assert_eq!(decode(&token).unwrap().granted_roles, vec!["USER"]);
    }

    #[test]
    fn test_fractional_exp_is_floored() {
        let token = mint_token_with_payload(serde_json::json!({
            "sub": "a@b.com",
            "role": "USER",
            "exp": 1_700_000_000.5,
        }));
        let claims = decode(&token).unwrap();
        assert_eq!(claims.expires_at, Some(1_700_000_000));
        assert!(claims.is_valid_at(1_699_999_999));
        assert!(!claims.is_valid_at(1_700_000_000));
    }

    #[test]
    fn test_missing_exp_is_expired() {
        let token = mint_token_with_payload(serde_json::json!({"sub": "x"}));
        let claims = decode(&token).unwrap();
        assert_eq!(claims.expires_at, None);
        assert!(claims.is_expired());
        assert!(claims.granted_roles.is_empty());
    }

    #[test]
    fn test_expiry_boundary_is_strict() {
        let claims = Claims {
            subject: "x".to_string(),
            granted_roles: vec![],
            email: None,
            expires_at: Some(100),
        };
        assert!(claims.is_valid_at(99));
        assert!(!claims.is_valid_at(100));
        assert!(!claims.is_valid_at(101));
    }

    #[test]
    fn test_padded_standard_alphabet_payload() {
        let payload = STANDARD_NO_PAD.encode(br#"{"sub":"p","exp":5}"#);
        let token = format!("h.{}==.s", payload);
        assert_eq!(decode(&token).unwrap().subject, "p");
    }

    #[test]
    fn test_malformed_tokens() {
        assert!(matches!(decode(""), Err(DecodeError::Malformed)));
        assert!(matches!(decode("only.two"), Err(DecodeError::Malformed)));
        assert!(matches!(decode("a..c"), Err(DecodeError::Malformed)));
        assert!(matches!(decode("a.b.c.d"), Err(DecodeError::Malformed)));
        assert!(matches!(decode("a.!!!.c"), Err(DecodeError::Encoding(_))));

        let not_json = URL_SAFE_NO_PAD.encode(b"hello");
        assert!(matches!(
            decode(&format!("a.{}.c", not_json)),
            Err(DecodeError::Payload(_))
        ));
    }
}
