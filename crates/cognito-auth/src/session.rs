//! Cookie header to verified session.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::claims::{AccessClaims, IdentityClaims};
use crate::cookie::locate;
use crate::jwt::TokenVerifier;
use crate::keys::KeyStore;
use crate::{Error, Result};

/// A signed-in user whose identity and access tokens both verified.
///
/// "Signed out" is `Option::<Session>::None`; there is no partially valid
/// session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id_token: IdentityClaims,
    pub access_token: AccessClaims,
    pub raw_id_token: String,
    pub raw_access_token: String,
}

impl Session {
    pub fn subject(&self) -> &str {
        &self.id_token.sub
    }

    pub fn username(&self) -> &str {
        &self.id_token.username
    }

    pub fn email(&self) -> &str {
        &self.id_token.email
    }

    /// Unix time at which the first of the two tokens expires.
    pub fn expires_at(&self) -> i64 {
        self.id_token.exp.min(self.access_token.exp)
    }

    /// True when both sessions were built from the same raw tokens.
    pub fn same_tokens(&self, other: &Session) -> bool {
        self.raw_id_token == other.raw_id_token && self.raw_access_token == other.raw_access_token
    }
}

/// Turns cookie headers into sessions for one app client.
///
/// Server request handlers and the browser-side hook use the same resolver so
/// that a server-rendered page and its first client render agree.
#[derive(Debug, Clone)]
pub struct SessionResolver {
    keys: Arc<KeyStore>,
    client_id: String,
    verifier: TokenVerifier,
}

impl SessionResolver {
    /// Fails when `client_id` is empty.
    pub fn new(keys: Arc<KeyStore>, client_id: impl Into<String>) -> Result<Self> {
        let client_id = client_id.into();
        if client_id.trim().is_empty() {
            return Err(Error::MissingClientId);
        }
        Ok(Self {
            keys,
            client_id,
            verifier: TokenVerifier::default(),
        })
    }

    pub fn with_verifier(mut self, verifier: TokenVerifier) -> Self {
        self.verifier = verifier;
        self
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn keys(&self) -> &KeyStore {
        &self.keys
    }

    /// Resolve a raw `Cookie` header (or `document.cookie`) into a session.
    pub fn resolve(&self, cookie_header: Option<&str>) -> Option<Session> {
        let cookies = locate(cookie_header, &self.client_id);
        let raw_id_token = cookies.id_token?;
        let raw_access_token = cookies.access_token?;

        let id_token = self.verifier.verify(
            &self.keys,
            Some(raw_id_token.as_str()),
            |claims: &IdentityClaims| claims.aud == self.client_id,
        )?;
        let access_token = self.verifier.verify(
            &self.keys,
            Some(raw_access_token.as_str()),
            |claims: &AccessClaims| claims.client_id == self.client_id,
        )?;

        Some(Session {
            id_token,
            access_token,
            raw_id_token,
            raw_access_token,
        })
    }
}
