//! Signing fixtures for tests. Enabled with the `test-util` feature.
//!
//! The RSA keys under `fixtures/` were generated with
//! `openssl genpkey -algorithm RSA -pkeyopt rsa_keygen_bits:2048` and are
//! only good for tests.

#![allow(clippy::missing_panics_doc)]

use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde_json::{Value, json};

use crate::cookie::{COOKIE_PREFIX, last_user_cookie_name, token_cookie_name};
use crate::keys::{KeyStore, SigningKey};

pub const TEST_REGION: &str = "us-east-1";
pub const TEST_POOL: &str = "us-east-1_TestPool";
pub const TEST_KID: &str = "test-kid-1";
pub const TEST_CLIENT_ID: &str = "3n4b5urk1ft4fl3mg5e62d9ado";

pub const TRUSTED_PUBLIC_PEM: &str = include_str!("../fixtures/trusted_public.pem");
pub const TRUSTED_PRIVATE_PEM: &str = include_str!("../fixtures/trusted_private.pem");
pub const ROGUE_PRIVATE_PEM: &str = include_str!("../fixtures/rogue_private.pem");

pub fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
}

pub fn issuer() -> String {
    format!("https://cognito-idp.{TEST_REGION}.amazonaws.com/{TEST_POOL}")
}

/// Key file contents trusting the fixture key.
pub fn key_store_json() -> String {
    json!({ TEST_REGION: { TEST_POOL: { TEST_KID: TRUSTED_PUBLIC_PEM } } }).to_string()
}

pub fn key_store() -> KeyStore {
    let mut store = KeyStore::default();
    store.insert(
        TEST_REGION,
        TEST_POOL,
        SigningKey::from_pem(TEST_KID, TRUSTED_PUBLIC_PEM).expect("fixture public key"),
    );
    store
}

/// Identity token payload valid for an hour.
pub fn id_claims(username: &str) -> Value {
    let now = now();
    json!({
        "sub": format!("sub-{username}"),
        "aud": TEST_CLIENT_ID,
        "cognito:username": username,
        "email": format!("{username}@example.com"),
        "email_verified": true,
        "iss": issuer(),
        "auth_time": now,
        "iat": now,
        "exp": now + 3600,
        "token_use": "id",
        "event_id": "8d1f7c7e-0000-4000-8000-000000000001",
    })
}

/// Access token payload valid for an hour.
pub fn access_claims(username: &str) -> Value {
    let now = now();
    json!({
        "sub": format!("sub-{username}"),
        "scope": "openid profile email",
        "client_id": TEST_CLIENT_ID,
        "username": username,
        "iss": issuer(),
        "auth_time": now,
        "iat": now,
        "exp": now + 3600,
        "token_use": "access",
        "jti": format!("jti-{username}-{now}"),
        "version": 2,
    })
}

pub fn trusted_encoding_key() -> EncodingKey {
    EncodingKey::from_rsa_pem(TRUSTED_PRIVATE_PEM.as_bytes()).expect("fixture private key")
}

pub fn sign(claims: &Value) -> String {
    sign_with_kid(claims, TEST_KID)
}

pub fn sign_with_kid(claims: &Value, kid: &str) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(kid.to_string());
    jsonwebtoken::encode(&header, claims, &trusted_encoding_key()).expect("sign fixture token")
}

/// Signed with a key that is not in [`key_store`] but reusing its kid.
pub fn sign_with_rogue_key(claims: &Value) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(TEST_KID.to_string());
    let key = EncodingKey::from_rsa_pem(ROGUE_PRIVATE_PEM.as_bytes()).expect("rogue private key");
    jsonwebtoken::encode(&header, claims, &key).expect("sign rogue token")
}

/// Cookie header as the browser would send it after the identity provider
/// client stored the given tokens.
pub fn cookie_header(username: &str, id_token: Option<&str>, access_token: Option<&str>) -> String {
    let mut parts = vec![
        "theme=dark".to_string(),
        format!(
            "{}={}",
            last_user_cookie_name(TEST_CLIENT_ID),
            urlencoding::encode(username)
        ),
    ];
    if let Some(token) = id_token {
        parts.push(format!(
            "{}={token}",
            token_cookie_name(TEST_CLIENT_ID, username, "idToken")
        ));
    }
    if let Some(token) = access_token {
        parts.push(format!(
            "{}={token}",
            token_cookie_name(TEST_CLIENT_ID, username, "accessToken")
        ));
    }
    parts.push(format!("{COOKIE_PREFIX}.{TEST_CLIENT_ID}.clockDrift=0"));
    parts.join("; ")
}

/// Cookie header carrying a freshly signed, valid session for `username`.
pub fn session_cookie_header(username: &str) -> String {
    let id = sign(&id_claims(username));
    let access = sign(&access_claims(username));
    cookie_header(username, Some(&id), Some(&access))
}
