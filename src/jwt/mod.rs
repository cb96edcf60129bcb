//! JWT verification
//!
//! Supports a shared secret (HS256/384/512), a static public key, or a JWKS
//! cache selected by the token's `kid`. Verification performs no I/O: a `kid`
//! missing from the cache is reported as [`TokenError::UnknownKey`] and the
//! application decides whether to refresh and retry.
//!
//! # Example
//!
//! ```
//! use jsonwebtoken::Algorithm;
//! use portcullis::jwt::JwtVerifier;
//!
//! let verifier = JwtVerifier::with_secret(b"my-secret", Algorithm::HS256)
//!     .unwrap()
//!     .with_issuer("https://auth.example.com");
//! ```

pub mod fetch;
pub mod jwks;

pub use fetch::{JwksError, JwksFetcher};
pub use jwks::{Jwk, Jwks, JwksCache, KeyError};

use crate::config::ConfigError;
use crate::result::FailureReason;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;

/// Verification failures
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    #[error("Token malformed")]
    Malformed,

    #[error("Token expired")]
    Expired,

    #[error("Invalid signature")]
    SignatureInvalid,

    #[error("Unknown signing key")]
    UnknownKey,

    #[error("Claims rejected")]
    ClaimsInvalid,
}

impl From<TokenError> for FailureReason {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Malformed => FailureReason::TokenMalformed,
            TokenError::Expired => FailureReason::TokenExpired,
            TokenError::SignatureInvalid => FailureReason::TokenSignatureInvalid,
            TokenError::UnknownKey => FailureReason::UnknownSigningKey,
            TokenError::ClaimsInvalid => FailureReason::CredentialsInvalid,
        }
    }
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                TokenError::SignatureInvalid
            }
            ErrorKind::InvalidIssuer
            | ErrorKind::InvalidAudience
            | ErrorKind::InvalidSubject
            | ErrorKind::ImmatureSignature
            | ErrorKind::MissingRequiredClaim(_) => TokenError::ClaimsInvalid,
            _ => TokenError::Malformed,
        }
    }
}

enum KeySource {
    Static { key: DecodingKey, algorithm: Algorithm },
    Jwks { cache: Arc<JwksCache>, algorithm: Algorithm },
}

/// Decodes a token, resolves its key, checks the signature and validates claims
pub struct JwtVerifier {
    source: KeySource,
    issuer: Option<String>,
    audience: Option<String>,
    leeway: u64,
}

impl std::fmt::Debug for JwtVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let source = match &self.source {
            KeySource::Static { algorithm, .. } => format!("static({:?})", algorithm),
            KeySource::Jwks { cache, algorithm } => {
                format!("jwks({:?}, {} keys)", algorithm, cache.len())
            }
        };
        f.debug_struct("JwtVerifier")
            .field("source", &source)
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("leeway", &self.leeway)
            .finish()
    }
}

pub(crate) fn is_hmac(algorithm: Algorithm) -> bool {
    matches!(
        algorithm,
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
    )
}

impl JwtVerifier {
    /// Shared-secret verifier; `algorithm` must be in the HS family.
    pub fn with_secret(secret: &[u8], algorithm: Algorithm) -> Result<Self, ConfigError> {
        if !is_hmac(algorithm) {
            return Err(ConfigError::ValidationError(format!(
                "Algorithm {:?} cannot be used with a shared secret",
                algorithm
            )));
        }
        if secret.is_empty() {
            return Err(ConfigError::ValidationError(
                "JWT secret must not be empty".into(),
            ));
        }
        Ok(Self::from_source(KeySource::Static {
            key: DecodingKey::from_secret(secret),
            algorithm,
        }))
    }

    /// Verifier for a single PEM-encoded RSA or EC public key
    pub fn with_public_key_pem(pem: &str, algorithm: Algorithm) -> Result<Self, ConfigError> {
        let key = match algorithm {
            Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512 => DecodingKey::from_rsa_pem(pem.as_bytes()),
            Algorithm::ES256 | Algorithm::ES384 => DecodingKey::from_ec_pem(pem.as_bytes()),
            Algorithm::EdDSA => DecodingKey::from_ed_pem(pem.as_bytes()),
            _ => {
                return Err(ConfigError::ValidationError(format!(
                    "Algorithm {:?} needs a shared secret, not a public key",
                    algorithm
                )))
            }
        }
        .map_err(|e| ConfigError::ValidationError(format!("Invalid public key: {}", e)))?;

        Ok(Self::from_source(KeySource::Static { key, algorithm }))
    }

    /// Verifier selecting keys from a JWKS cache by `kid`. Tokens must be
    /// signed with `algorithm`, which cannot be in the HS family.
    pub fn with_jwks(cache: Arc<JwksCache>, algorithm: Algorithm) -> Result<Self, ConfigError> {
        if is_hmac(algorithm) {
            return Err(ConfigError::ValidationError(format!(
                "Algorithm {:?} cannot be used with a JWKS",
                algorithm
            )));
        }
        Ok(Self::from_source(KeySource::Jwks { cache, algorithm }))
    }

    fn from_source(source: KeySource) -> Self {
        Self {
            source,
            issuer: None,
            audience: None,
            leeway: 0,
        }
    }

    /// Set the required issuer (`iss` claim)
    #[must_use]
    pub fn with_issuer(mut self, issuer: &str) -> Self {
        self.issuer = Some(issuer.to_string());
        self
    }

    /// Set the required audience (`aud` claim)
    #[must_use]
    pub fn with_audience(mut self, audience: &str) -> Self {
        self.audience = Some(audience.to_string());
        self
    }

    /// Clock skew tolerated on `exp`/`nbf`, in seconds
    #[must_use]
    pub fn with_leeway(mut self, seconds: u64) -> Self {
        self.leeway = seconds;
        self
    }

    /// The JWKS cache, when verifying against one
    pub fn key_set(&self) -> Option<&Arc<JwksCache>> {
        match &self.source {
            KeySource::Jwks { cache, .. } => Some(cache),
            KeySource::Static { .. } => None,
        }
    }

    /// Replace the key set. Returns the number of usable keys, or `None` when
    /// this verifier uses a static key.
    pub fn refresh_key_set(&self, jwks: Jwks) -> Option<usize> {
        self.key_set().map(|cache| cache.refresh(jwks))
    }

    /// Verify `token` and return its claims.
    ///
    /// `exp` is enforced when present; other claims pass through untouched unless
    /// an issuer or audience was configured.
    pub fn verify(&self, token: &str) -> Result<Map<String, Value>, TokenError> {
        let header = decode_header(token).map_err(|_| TokenError::Malformed)?;

        let (key, algorithm) = match &self.source {
            KeySource::Static { key, algorithm } => (key.clone(), *algorithm),
            KeySource::Jwks { cache, algorithm } => {
                if header.alg != *algorithm {
                    return Err(TokenError::SignatureInvalid);
                }
                let kid = header.kid.as_deref().ok_or(TokenError::UnknownKey)?;
                (cache.find(kid, *algorithm)?, *algorithm)
            }
        };

        let data = decode::<Map<String, Value>>(token, &key, &self.validation(algorithm))?;
        Ok(data.claims)
    }

    fn validation(&self, algorithm: Algorithm) -> Validation {
        let mut validation = Validation::new(algorithm);
        validation.required_spec_claims = HashSet::new();
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.leeway = self.leeway;

        if let Some(issuer) = &self.issuer {
            validation.set_issuer(&[issuer]);
        }

        // Only validate aud when explicitly set
        if let Some(audience) = &self.audience {
            validation.set_audience(&[audience]);
            validation.validate_aud = true;
        } else {
            validation.validate_aud = false;
        }

        validation
    }
}
