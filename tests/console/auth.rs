//! Session token tests.
//!
//! The roles inside a token decide every permission downstream, so a token
//! whose claims were edited must never produce an identity.

use adminkit::auth::{self, Claims, RoleRef};
use adminkit::config::Auth as AuthConfig;
use adminkit::Error;
use base64::Engine;

fn config() -> AuthConfig {
    AuthConfig {
        jwt_secret: "real_secret_that_is_at_least_32b!".to_string(),
        token_expiry_days: 30,
        leeway_secs: 0,
    }
}

/// `Validation::default()` in jsonwebtoken 9.x restricts to HS256,
/// so a token forged with `"alg":"none"` must be rejected.
#[test]
fn rejects_none_algorithm_token() {
    let engine = base64::engine::general_purpose::URL_SAFE_NO_PAD;
    let header = engine.encode(r#"{"alg":"none","typ":"JWT"}"#);
    let payload = engine.encode(
        serde_json::json!({
            "sub": "admin",
            "exp": 9999999999i64,
            "iat": 1700000000,
            "roles": ["ROLE_ADMIN"]
        })
        .to_string(),
    );
    let forged = format!("{header}.{payload}.");

    assert!(matches!(
        auth::identity_from_token(&config(), &forged),
        Err(Error::Unauthorized)
    ));
}

/// Swapping in a payload with extra roles breaks the signature.
#[test]
fn rejects_escalated_roles() {
    let token = auth::create_token(&config(), "user-1", &[RoleRef::Name("ROLE_USER".into())])
        .unwrap();
    let parts: Vec<&str> = token.split('.').collect();
    assert_eq!(parts.len(), 3);

    let engine = base64::engine::general_purpose::URL_SAFE_NO_PAD;
    let mut claims: serde_json::Value =
        serde_json::from_slice(&engine.decode(parts[1]).unwrap()).unwrap();
    claims["roles"] = serde_json::json!(["ROLE_USER", "ROLE_ADMIN"]);
    let tampered = format!(
        "{}.{}.{}",
        parts[0],
        engine.encode(claims.to_string()),
        parts[2]
    );

    assert!(auth::verify_token(&config(), &tampered).is_err());
}

#[test]
fn expired_token_is_reported_as_expired() {
    let now = jiff::Timestamp::now().as_second();
    let claims = Claims {
        sub: "user-1".into(),
        exp: now - 3600,
        iat: now - 7200,
        roles: vec![RoleRef::Name("ROLE_ADMIN".into())],
    };
    let token = jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(config().jwt_secret.as_bytes()),
    )
    .unwrap();

    let err = auth::identity_from_token(&config(), &token).unwrap_err();
    assert!(matches!(err, Error::TokenExpired));
    assert!(err.is_client_error());
}

/// Rotating the signing key invalidates all outstanding tokens.
#[test]
fn key_rotation_invalidates_old_tokens() {
    let old = config();
    let new = AuthConfig {
        jwt_secret: "new_secret_key_production_32byte!".to_string(),
        ..config()
    };
    let token = auth::create_token(&old, "user-1", &[]).unwrap();
    assert!(auth::verify_token(&new, &token).is_err());
}

#[test]
fn short_secret_is_rejected() {
    let config = AuthConfig {
        jwt_secret: "x".to_string(),
        ..config()
    };
    assert!(matches!(
        auth::create_token(&config, "user-1", &[]),
        Err(Error::Config(_))
    ));
}

/// RFC 7235 says the auth-scheme is case-insensitive.
#[test]
fn bearer_scheme_is_case_insensitive() {
    let token = auth::create_token(&config(), "user-1", &[]).unwrap();
    let header = format!("bEaReR {token}");
    let extracted = auth::bearer_token(&header).unwrap();
    assert_eq!(auth::verify_token(&config(), extracted).unwrap().sub, "user-1");
}
