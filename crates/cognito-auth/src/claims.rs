//! Typed Cognito token payloads.
//!
//! A token missing any required field fails to deserialize and is treated
//! like any other unverifiable token.

use serde::{Deserialize, Serialize};

/// The `token_use` discriminant Cognito puts in every token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenUse {
    Id,
    Access,
}

/// Fields the verifier needs from any Cognito token.
pub trait CognitoClaims: serde::de::DeserializeOwned {
    /// The discriminant this schema accepts.
    const TOKEN_USE: TokenUse;

    fn token_use(&self) -> TokenUse;
}

/// Payload of an identity token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityClaims {
    pub sub: String,
    /// App client id.
    pub aud: String,
    #[serde(rename = "cognito:username")]
    pub username: String,
    pub email: String,
    pub email_verified: bool,
    pub iss: String,
    pub auth_time: i64,
    pub iat: i64,
    pub exp: i64,
    pub token_use: TokenUse,
    #[serde(rename = "cognito:groups", default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_jti: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
}

impl CognitoClaims for IdentityClaims {
    const TOKEN_USE: TokenUse = TokenUse::Id;

    fn token_use(&self) -> TokenUse {
        self.token_use
    }
}

/// Payload of an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: String,
    pub scope: String,
    pub client_id: String,
    pub iss: String,
    pub auth_time: i64,
    pub iat: i64,
    pub exp: i64,
    pub token_use: TokenUse,
    pub jti: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(rename = "cognito:groups", default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_jti: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
}

impl AccessClaims {
    /// Scopes granted to the session.
    pub fn scopes(&self) -> impl Iterator<Item = &str> {
        self.scope.split_whitespace()
    }
}

impl CognitoClaims for AccessClaims {
    const TOKEN_USE: TokenUse = TokenUse::Access;

    fn token_use(&self) -> TokenUse {
        self.token_use
    }
}

/// Region and user pool encoded in a Cognito issuer URL
/// (`https://cognito-idp.<region>.amazonaws.com/<userPoolId>`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserPool {
    pub region: String,
    pub user_pool_id: String,
}

impl UserPool {
    pub fn from_issuer(iss: &str) -> Option<Self> {
        let rest = iss.strip_prefix("https://cognito-idp.")?;
        let (region, user_pool_id) = rest.split_once(".amazonaws.com/")?;
        if region.is_empty() || user_pool_id.is_empty() || user_pool_id.contains('/') {
            return None;
        }
        Some(Self {
            region: region.to_string(),
            user_pool_id: user_pool_id.to_string(),
        })
    }

    pub fn issuer(&self) -> String {
        format!(
            "https://cognito-idp.{}.amazonaws.com/{}",
            self.region, self.user_pool_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issuer_round_trip() {
        let pool = UserPool::from_issuer(
            "https://cognito-idp.eu-central-1.amazonaws.com/eu-central-1_Abc123",
        )
        .unwrap();
        assert_eq!(pool.region, "eu-central-1");
        assert_eq!(pool.user_pool_id, "eu-central-1_Abc123");
        assert_eq!(
            pool.issuer(),
            "https://cognito-idp.eu-central-1.amazonaws.com/eu-central-1_Abc123"
        );
    }

    #[test]
    fn foreign_issuers_are_rejected() {
        assert!(UserPool::from_issuer("https://accounts.google.com").is_none());
        assert!(UserPool::from_issuer("https://cognito-idp.us-east-1.amazonaws.com/").is_none());
        assert!(UserPool::from_issuer("https://cognito-idp.us-east-1.amazonaws.com/a/b").is_none());
    }

    #[test]
    fn id_claims_need_username() {
        let json = serde_json::json!({
            "sub": "s", "aud": "c", "email": "e@x", "email_verified": true,
            "iss": "i", "auth_time": 1, "iat": 1, "exp": 2, "token_use": "id"
        });
        assert!(serde_json::from_value::<IdentityClaims>(json).is_err());
    }

    #[test]
    fn access_scopes_split_on_whitespace() {
        let claims: AccessClaims = serde_json::from_value(serde_json::json!({
            "sub": "s", "scope": "openid profile  email", "client_id": "c",
            "iss": "i", "auth_time": 1, "iat": 1, "exp": 2,
            "token_use": "access", "jti": "j"
        }))
        .unwrap();
        assert_eq!(claims.scopes().collect::<Vec<_>>(), ["openid", "profile", "email"]);
    }
}
