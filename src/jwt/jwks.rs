//! JSON Web Key Sets
//!
//! [`JwksCache`] holds the parsed keys used for asymmetric verification. It is
//! read on every verification and replaced wholesale by [`JwksCache::refresh`];
//! readers take an `Arc` snapshot, so a refresh never blocks them for longer than
//! a pointer swap. Fetching is someone else's job (see [`super::fetch`]).

use super::TokenError;
use jsonwebtoken::{Algorithm, DecodingKey};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Key material errors
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Missing key parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Invalid key: {0}")]
    Invalid(String),

    #[error("Unsupported key type: {0}")]
    UnsupportedKeyType(String),
}

/// A single JSON Web Key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Jwk {
    /// Key type (e.g., "RSA", "EC", "OKP")
    pub kty: String,

    /// Key ID
    #[serde(default)]
    pub kid: Option<String>,

    /// Intended use ("sig" for signature)
    #[serde(default, rename = "use")]
    pub key_use: Option<String>,

    /// Algorithm (e.g., "RS256", "ES256")
    #[serde(default)]
    pub alg: Option<String>,

    // RSA parameters
    /// RSA modulus (base64url encoded)
    #[serde(default)]
    pub n: Option<String>,

    /// RSA exponent (base64url encoded)
    #[serde(default)]
    pub e: Option<String>,

    // EC / OKP parameters
    /// Curve (e.g., "P-256", "Ed25519")
    #[serde(default)]
    pub crv: Option<String>,

    /// x coordinate (base64url encoded)
    #[serde(default)]
    pub x: Option<String>,

    /// EC y coordinate (base64url encoded)
    #[serde(default)]
    pub y: Option<String>,
}

impl Jwk {
    /// Convert JWK to DecodingKey
    pub fn to_decoding_key(&self) -> Result<DecodingKey, KeyError> {
        match self.kty.as_str() {
            "RSA" => {
                let n = self.n.as_ref().ok_or(KeyError::MissingParameter("n"))?;
                let e = self.e.as_ref().ok_or(KeyError::MissingParameter("e"))?;
                DecodingKey::from_rsa_components(n, e)
                    .map_err(|e| KeyError::Invalid(format!("RSA: {}", e)))
            }
            "EC" => {
                let x = self.x.as_ref().ok_or(KeyError::MissingParameter("x"))?;
                let y = self.y.as_ref().ok_or(KeyError::MissingParameter("y"))?;
                DecodingKey::from_ec_components(x, y)
                    .map_err(|e| KeyError::Invalid(format!("EC: {}", e)))
            }
            "OKP" => {
                let x = self.x.as_ref().ok_or(KeyError::MissingParameter("x"))?;
                DecodingKey::from_ed_components(x)
                    .map_err(|e| KeyError::Invalid(format!("OKP: {}", e)))
            }
            other => Err(KeyError::UnsupportedKeyType(other.to_string())),
        }
    }

    /// Declared algorithm, if any and if recognised
    pub fn algorithm(&self) -> Option<Algorithm> {
        self.alg.as_deref().and_then(|alg| alg.parse().ok())
    }
}

/// JSON Web Key Set
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Jwks {
    pub keys: Vec<Jwk>,
}

impl Jwks {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

struct KeyEntry {
    kid: String,
    algorithm: Option<Algorithm>,
    key: DecodingKey,
}

struct Snapshot {
    keys: Vec<KeyEntry>,
    fetched_at: Option<Instant>,
}

/// Key-id indexed cache of verification keys with an application-chosen TTL
///
/// The TTL is advisory: [`JwksCache::is_stale`] reports it, the refresher acts
/// on it. Verification always uses whatever keys are present.
pub struct JwksCache {
    state: RwLock<Arc<Snapshot>>,
    ttl: Duration,
}

impl std::fmt::Debug for JwksCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwksCache")
            .field("keys", &self.len())
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl JwksCache {
    /// Empty cache; stale until the first refresh
    pub fn new(ttl: Duration) -> Self {
        Self {
            state: RwLock::new(Arc::new(Snapshot {
                keys: Vec::new(),
                fetched_at: None,
            })),
            ttl,
        }
    }

    pub fn from_jwks(jwks: Jwks, ttl: Duration) -> Self {
        let cache = Self::new(ttl);
        cache.refresh(jwks);
        cache
    }

    /// Replace the cached key set, returning how many keys are usable.
    ///
    /// Keys without a `kid`, with unusable material or marked for encryption are
    /// skipped.
    pub fn refresh(&self, jwks: Jwks) -> usize {
        let keys: Vec<KeyEntry> = jwks
            .keys
            .iter()
            .filter_map(|jwk| {
                if jwk.key_use.as_deref().is_some_and(|u| u != "sig") {
                    return None;
                }
                let Some(kid) = jwk.kid.clone() else {
                    tracing::warn!(kty = %jwk.kty, "Skipping JWK without kid");
                    return None;
                };
                match jwk.to_decoding_key() {
                    Ok(key) => Some(KeyEntry {
                        kid,
                        algorithm: jwk.algorithm(),
                        key,
                    }),
                    Err(e) => {
                        tracing::warn!(kid = %kid, error = %e, "Skipping unusable JWK");
                        None
                    }
                }
            })
            .collect();

        let count = keys.len();
        *self.state.write() = Arc::new(Snapshot {
            keys,
            fetched_at: Some(Instant::now()),
        });
        tracing::debug!(keys = count, "JWKS cache refreshed");
        count
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Time since the last refresh; `None` if never refreshed
    pub fn age(&self) -> Option<Duration> {
        self.snapshot().fetched_at.map(|t| t.elapsed())
    }

    pub fn is_stale(&self) -> bool {
        self.age().map_or(true, |age| age > self.ttl)
    }

    pub fn len(&self) -> usize {
        self.snapshot().keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, kid: &str) -> bool {
        self.snapshot().keys.iter().any(|k| k.kid == kid)
    }

    /// Key for `kid` usable with `algorithm`
    pub(crate) fn find(&self, kid: &str, algorithm: Algorithm) -> Result<DecodingKey, TokenError> {
        self.snapshot()
            .keys
            .iter()
            .find(|k| k.kid == kid && k.algorithm.map_or(true, |a| a == algorithm))
            .map(|k| k.key.clone())
            .ok_or(TokenError::UnknownKey)
    }

    fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.state.read())
    }
}
