//! Trusted signing keys.
//!
//! The key file is produced ahead of time from each user pool's JWKS and is
//! shaped `region -> userPoolId -> keyId -> PEM`:
//!
//! ```json
//! { "us-east-1": { "us-east-1_AbCdEf": { "kid-1": "-----BEGIN PUBLIC KEY-----\n..." } } }
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use jsonwebtoken::DecodingKey;

use crate::{Error, Result};

type RawKeys = BTreeMap<String, BTreeMap<String, BTreeMap<String, String>>>;

/// A public key able to verify one key id's signatures.
#[derive(Clone)]
pub struct SigningKey {
    /// Key id as it appears in token headers.
    pub key_id: String,
    /// PEM-encoded RSA public key.
    pub public_key: String,
    decoding: DecodingKey,
}

impl SigningKey {
    /// Parse a PEM public key.
    pub fn from_pem(key_id: impl Into<String>, public_key: impl Into<String>) -> Result<Self> {
        let key_id = key_id.into();
        let public_key = public_key.into();
        let decoding = DecodingKey::from_rsa_pem(public_key.as_bytes())
            .map_err(|e| Error::KeyStore(format!("invalid public key for kid {key_id}: {e}")))?;
        Ok(Self {
            key_id,
            public_key,
            decoding,
        })
    }

    pub(crate) fn decoding_key(&self) -> &DecodingKey {
        &self.decoding
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

/// Read-only map of `(region, user pool, key id)` to signing keys.
#[derive(Debug, Clone, Default)]
pub struct KeyStore {
    regions: BTreeMap<String, BTreeMap<String, BTreeMap<String, SigningKey>>>,
}

impl KeyStore {
    /// Parse the serialized key collection.
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: RawKeys = serde_json::from_str(json)?;

        let mut store = KeyStore::default();
        for (region, pools) in raw {
            for (pool, keys) in pools {
                for (kid, pem) in keys {
                    store.insert(&region, &pool, SigningKey::from_pem(kid, pem)?);
                }
            }
        }
        Ok(store)
    }

    /// Read and parse a key file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Add a key. Only used while building a store.
    pub fn insert(&mut self, region: &str, user_pool_id: &str, key: SigningKey) {
        self.regions
            .entry(region.to_string())
            .or_default()
            .entry(user_pool_id.to_string())
            .or_default()
            .insert(key.key_id.clone(), key);
    }

    /// Find the key for a token. A missing entry is normal during key rotation.
    pub fn lookup(&self, region: &str, user_pool_id: &str, key_id: &str) -> Option<&SigningKey> {
        self.regions.get(region)?.get(user_pool_id)?.get(key_id)
    }

    /// Number of keys across all pools.
    pub fn len(&self) -> usize {
        self.regions
            .values()
            .flat_map(BTreeMap::values)
            .map(BTreeMap::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate `(region, user pool, key)` entries in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &SigningKey)> {
        self.regions.iter().flat_map(|(region, pools)| {
            pools.iter().flat_map(move |(pool, keys)| {
                keys.values()
                    .map(move |key| (region.as_str(), pool.as_str(), key))
            })
        })
    }
}
