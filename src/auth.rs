//! Session token decoding and role normalization.
//!
//! The backend hands out HS256 JWTs whose `roles` claim may list role names
//! as plain strings or as `{ "name": ... }` objects. Both shapes stop here:
//! everything past this module only ever sees an [`Identity`] carrying a
//! canonical list of role names.

use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::config::Auth as AuthConfig;
use crate::error::{Error, Result};

const MIN_SECRET_LENGTH: usize = 32;

fn validate_secret(config: &AuthConfig) -> Result<()> {
    if config.jwt_secret.len() < MIN_SECRET_LENGTH {
        return Err(Error::Config(format!(
            "JWT secret must be at least {MIN_SECRET_LENGTH} bytes"
        )));
    }
    Ok(())
}

/// A role as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RoleRef {
    Name(String),
    Object { name: String },
}

impl RoleRef {
    fn name(&self) -> &str {
        match self {
            RoleRef::Name(name) | RoleRef::Object { name } => name,
        }
    }
}

/// Collapse wire roles into trimmed, non-empty, de-duplicated names.
///
/// First occurrence wins, so the order the backend sent is preserved.
pub fn normalize_roles<'a>(roles: impl IntoIterator<Item = &'a RoleRef>) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for role in roles {
        let name = role.name().trim();
        if !name.is_empty() && !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}

/// JWT claims structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (typically user ID)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    #[serde(default)]
    pub roles: Vec<RoleRef>,
}

/// The signed-in user as seen by the access engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub subject: String,
    pub roles: Vec<String>,
    /// Raw bearer token, forwarded to the page-access endpoint.
    pub token: Option<String>,
}

impl Identity {
    pub fn new<I, S>(subject: impl Into<String>, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let wire: Vec<RoleRef> = roles.into_iter().map(|r| RoleRef::Name(r.into())).collect();
        Self {
            subject: subject.into(),
            roles: normalize_roles(&wire),
            token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Same user with the same roles, regardless of token rotation.
    pub fn same_principal(&self, other: &Identity) -> bool {
        self.subject == other.subject && self.roles == other.roles
    }
}

/// Create a session token for a user with the given roles, valid for
/// `token_expiry_days`.
pub fn create_token(config: &AuthConfig, user_id: &str, roles: &[RoleRef]) -> Result<String> {
    validate_secret(config)?;
    let now = jiff::Timestamp::now();
    let exp = jiff::Span::new()
        .try_hours(i64::from(config.token_expiry_days) * 24)
        .and_then(|span| now.checked_add(span))
        .map_err(|e| Error::Config(format!("Invalid token expiry: {e}")))?;

    let claims = Claims {
        sub: user_id.to_string(),
        exp: exp.as_second(),
        iat: now.as_second(),
        roles: roles.to_vec(),
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| Error::Internal(format!("Token creation failed: {e}")))?;

    Ok(token)
}

/// Verify and decode a session token.
///
/// # Returns
/// - `Ok(Claims)` if the token is valid
/// - `Err(Error::TokenExpired)` if the token has expired
/// - `Err(Error::Unauthorized)` for any other validation failure
pub fn verify_token(config: &AuthConfig, token: &str) -> Result<Claims> {
    validate_secret(config)?;
    let mut validation = Validation::default();
    validation.leeway = config.leeway_secs;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &validation,
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => Error::TokenExpired,
        _ => Error::Unauthorized,
    })?;

    Ok(token_data.claims)
}

/// Verify a token and turn it into an [`Identity`].
pub fn identity_from_token(config: &AuthConfig, token: &str) -> Result<Identity> {
    let claims = verify_token(config, token)?;
    Ok(Identity {
        subject: claims.sub,
        roles: normalize_roles(&claims.roles),
        token: Some(token.to_string()),
    })
}

/// Extract the token from an `Authorization: Bearer <token>` value.
pub fn bearer_token(header: &str) -> Result<&str> {
    header
        .get(..7)
        .filter(|p| p.eq_ignore_ascii_case("bearer "))
        .map(|_| header[7..].trim())
        .filter(|t| !t.is_empty())
        .ok_or(Error::Unauthorized)
}
