//! Error types.

use thiserror::Error;

/// Crate result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by this crate.
///
/// Token problems never show up here: a token that fails verification is
/// reported as an absent session, not as an error.
#[derive(Debug, Error)]
pub enum Error {
    /// The key collection is malformed or holds an unusable key.
    #[error("key store error: {0}")]
    KeyStore(String),

    /// No client id was configured.
    #[error("client id is not configured")]
    MissingClientId,

    /// The key file is not valid JSON of the expected shape.
    #[error("invalid key file: {0}")]
    Json(#[from] serde_json::Error),

    /// Reading the key file failed.
    #[error("failed to read key file: {0}")]
    Io(#[from] std::io::Error),
}
