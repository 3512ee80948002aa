//! cognito-auth
//!
//! Server- and client-side verification of AWS Cognito sessions stored in
//! cookies by the identity provider's browser client.
//!
//! - **Locating cookies** for an app client, with the exact name escaping the
//!   cookie-writing library uses
//! - **Verifying tokens** against a static key store (`kid` selection, RS256
//!   only, expiry, `token_use`, caller-supplied claim check)
//! - **Resolving sessions**: both the identity and the access token must
//!   verify, or there is no session
//!
//! ## Quick start
//! ```no_run
//! use std::sync::Arc;
//! use cognito_auth::{KeyStore, SessionResolver};
//!
//! # fn demo(cookie_header: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
//! let keys = Arc::new(KeyStore::from_file("keys.json".as_ref())?);
//! let resolver = SessionResolver::new(keys, "3n4b5urk1ft4fl3mg5e62d9ado")?;
//!
//! match resolver.resolve(cookie_header) {
//!     Some(session) => println!("signed in as {}", session.username()),
//!     None => println!("signed out"),
//! }
//! # Ok(()) }
//! ```

#![forbid(unsafe_code)]

mod claims;
mod cookie;
mod error;
mod jwt;
mod keys;
mod session;

#[cfg(any(test, feature = "test-util"))]
pub mod test_util;

pub use claims::{AccessClaims, CognitoClaims, IdentityClaims, TokenUse, UserPool};
pub use cookie::{
    COOKIE_PREFIX, CognitoCookies, encode_cookie_key, last_user_cookie_name, locate,
    parse_cookie_header, token_cookie_name,
};
pub use error::{Error, Result};
pub use jwt::{ALLOWED_ALGORITHM, Rejection, TokenVerifier};
pub use keys::{KeyStore, SigningKey};
pub use session::{Session, SessionResolver};
