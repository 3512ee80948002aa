//! Token verification against the key store.

use base64::Engine;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, Validation};
use serde::Deserialize;
use thiserror::Error;

use crate::claims::{CognitoClaims, TokenUse, UserPool};
use crate::keys::KeyStore;

/// The only signature algorithm Cognito user pools use.
pub const ALLOWED_ALGORITHM: Algorithm = Algorithm::RS256;

/// Why a token did not verify.
///
/// Every variant means "no session" to callers. The reason is only kept for
/// logs and the CLI.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("no token")]
    Empty,
    #[error("malformed header")]
    MalformedHeader,
    #[error("header has no kid")]
    MissingKeyId,
    #[error("algorithm {0:?} is not allowed")]
    DisallowedAlgorithm(Algorithm),
    #[error("issuer is not a Cognito user pool")]
    MalformedIssuer,
    #[error("no key {kid} for {region}/{user_pool_id}")]
    UnknownKey {
        region: String,
        user_pool_id: String,
        kid: String,
    },
    #[error("token expired")]
    Expired,
    #[error("invalid token: {0}")]
    Invalid(String),
    #[error("token_use is {found:?}, expected {expected:?}")]
    WrongTokenUse { expected: TokenUse, found: TokenUse },
    #[error("claim check failed")]
    ClaimMismatch,
}

#[derive(Deserialize)]
struct UnverifiedIssuer {
    iss: String,
}

/// Verifies Cognito tokens with keys from a [`KeyStore`].
#[derive(Debug, Clone, Default)]
pub struct TokenVerifier {
    leeway_seconds: u64,
}

impl TokenVerifier {
    /// Allow `exp` to lag behind the local clock by this many seconds.
    pub fn with_leeway(mut self, leeway_seconds: u64) -> Self {
        self.leeway_seconds = leeway_seconds;
        self
    }

    /// Verify and decode a token, returning `None` for anything that does not
    /// check out.
    pub fn verify<C: CognitoClaims>(
        &self,
        store: &KeyStore,
        token: Option<&str>,
        expected: impl Fn(&C) -> bool,
    ) -> Option<C> {
        match self.verify_detailed(store, token, expected) {
            Ok(claims) => Some(claims),
            Err(Rejection::Empty) => None,
            Err(Rejection::Expired) => {
                tracing::debug!(token_use = ?C::TOKEN_USE, "token expired");
                None
            }
            Err(reason) => {
                tracing::debug!(token_use = ?C::TOKEN_USE, %reason, "token rejected");
                None
            }
        }
    }

    /// Like [`TokenVerifier::verify`], but reports why a token was rejected.
    pub fn verify_detailed<C: CognitoClaims>(
        &self,
        store: &KeyStore,
        token: Option<&str>,
        expected: impl Fn(&C) -> bool,
    ) -> Result<C, Rejection> {
        let token = token.filter(|t| !t.is_empty()).ok_or(Rejection::Empty)?;

        let header = jsonwebtoken::decode_header(token).map_err(|_| Rejection::MalformedHeader)?;
        if header.alg != ALLOWED_ALGORITHM {
            return Err(Rejection::DisallowedAlgorithm(header.alg));
        }
        let kid = header
            .kid
            .filter(|k| !k.is_empty())
            .ok_or(Rejection::MissingKeyId)?;

        let pool = unverified_user_pool(token).ok_or(Rejection::MalformedIssuer)?;
        let key = store
            .lookup(&pool.region, &pool.user_pool_id, &kid)
            .ok_or_else(|| Rejection::UnknownKey {
                region: pool.region.clone(),
                user_pool_id: pool.user_pool_id.clone(),
                kid: kid.clone(),
            })?;

        let mut validation = Validation::new(ALLOWED_ALGORITHM);
        validation.leeway = self.leeway_seconds;
        validation.validate_exp = true;
        validation.validate_nbf = true;
        // Identity tokens carry `aud`, access tokens carry `client_id`; both are
        // checked by the caller's predicate instead.
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp", "iss"]);
        validation.set_issuer(&[pool.issuer()]);

        let data = jsonwebtoken::decode::<C>(token, key.decoding_key(), &validation).map_err(
            |e| match e.kind() {
                ErrorKind::ExpiredSignature => Rejection::Expired,
                ErrorKind::InvalidAlgorithm => Rejection::DisallowedAlgorithm(header.alg),
                _ => Rejection::Invalid(e.to_string()),
            },
        )?;
        let claims = data.claims;

        if claims.token_use() != C::TOKEN_USE {
            return Err(Rejection::WrongTokenUse {
                expected: C::TOKEN_USE,
                found: claims.token_use(),
            });
        }

        if !expected(&claims) {
            return Err(Rejection::ClaimMismatch);
        }

        Ok(claims)
    }
}

/// Read the user pool from the payload before the signature is checked, so
/// the right key can be picked.
fn unverified_user_pool(token: &str) -> Option<UserPool> {
    let payload = token.split('.').nth(1)?;
    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(payload)
        .ok()?;
    let unverified: UnverifiedIssuer = serde_json::from_slice(&bytes).ok()?;
    UserPool::from_issuer(&unverified.iss)
}
