//! HTTP Digest authentication (RFC 7616)
//!
//! Nonces are stateless: `base64(expiry ":" hex(HMAC-SHA256(secret, expiry ":" secret)))`.
//! A nonce with a valid signature but a past expiry earns a challenge with
//! `stale=true`, so clients retry without prompting the user again.
//!
//! The identity record stores HA1 = `H(username:realm:password)` in the mapped
//! password field; see [`HttpDigestAuthenticator::password`].

use super::http_basic::realm_for;
use super::{FieldMap, Outcome};
use crate::config::ConfigError;
use crate::identifier::IdentifierCollection;
use crate::identity::Credentials;
use crate::request::AuthRequest;
use crate::result::Challenge;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use md5::Md5;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Digest hash algorithm
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DigestAlgorithm {
    #[default]
    #[serde(rename = "MD5")]
    Md5,
    #[serde(rename = "SHA-256")]
    Sha256,
}

impl DigestAlgorithm {
    pub fn as_str(self) -> &'static str {
        match self {
            DigestAlgorithm::Md5 => "MD5",
            DigestAlgorithm::Sha256 => "SHA-256",
        }
    }

    /// Lower-case hex digest of `data`
    pub fn hash(self, data: &str) -> String {
        match self {
            DigestAlgorithm::Md5 => hex::encode(Md5::digest(data.as_bytes())),
            DigestAlgorithm::Sha256 => hex::encode(Sha256::digest(data.as_bytes())),
        }
    }

    /// `H(username:realm:password)`
    pub fn ha1(self, username: &str, password: &str, realm: &str) -> String {
        self.hash(&format!("{}:{}:{}", username, realm, password))
    }
}

/// Parsed `Authorization: Digest ...` parameters
#[derive(Debug, Default, PartialEq, Eq)]
struct DigestResponse {
    username: String,
    realm: String,
    nonce: String,
    uri: String,
    response: String,
    qop: Option<String>,
    nc: Option<String>,
    cnonce: Option<String>,
}

enum NonceState {
    Valid,
    Stale,
    Invalid,
}

/// HTTP Digest authenticator
pub struct HttpDigestAuthenticator {
    secret: String,
    realm: Option<String>,
    qop: String,
    nonce_lifetime: i64,
    opaque: Option<String>,
    algorithm: DigestAlgorithm,
    fields: FieldMap,
}

impl fmt::Debug for HttpDigestAuthenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpDigestAuthenticator")
            .field("realm", &self.realm)
            .field("qop", &self.qop)
            .field("nonce_lifetime", &self.nonce_lifetime)
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

impl HttpDigestAuthenticator {
    /// `secret` signs nonces; it must not be empty.
    pub fn new(secret: &str) -> Result<Self, ConfigError> {
        if secret.is_empty() {
            return Err(ConfigError::ValidationError(
                "Digest nonce secret must not be empty".into(),
            ));
        }
        Ok(Self {
            secret: secret.to_string(),
            realm: None,
            qop: "auth".to_string(),
            nonce_lifetime: 300,
            opaque: None,
            algorithm: DigestAlgorithm::Md5,
            fields: FieldMap::credentials(),
        })
    }

    /// HA1 for storage under the default (MD5) algorithm
    pub fn password(username: &str, password: &str, realm: &str) -> String {
        DigestAlgorithm::Md5.ha1(username, password, realm)
    }

    #[must_use]
    pub fn with_realm(mut self, realm: &str) -> Self {
        self.realm = Some(realm.to_string());
        self
    }

    #[must_use]
    pub fn with_qop(mut self, qop: &str) -> Self {
        self.qop = qop.to_string();
        self
    }

    #[must_use]
    pub fn with_nonce_lifetime(mut self, seconds: u64) -> Self {
        self.nonce_lifetime = i64::try_from(seconds).unwrap_or(i64::MAX);
        self
    }

    #[must_use]
    pub fn with_opaque(mut self, opaque: &str) -> Self {
        self.opaque = Some(opaque.to_string());
        self
    }

    #[must_use]
    pub fn with_algorithm(mut self, algorithm: DigestAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    #[must_use]
    pub fn with_fields(mut self, fields: FieldMap) -> Self {
        self.fields = fields;
        self
    }

    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    pub async fn authenticate(
        &self,
        request: &AuthRequest,
        identifiers: &IdentifierCollection,
    ) -> Outcome {
        let Some(digest) = request.header("authorization").and_then(parse_digest) else {
            tracing::debug!("Digest credentials missing");
            return Outcome::Challenge(self.challenge(request, false));
        };

        if digest.realm != realm_for(self.realm.as_deref(), request) {
            tracing::debug!("Digest realm mismatch");
            return Outcome::Challenge(self.challenge(request, false));
        }

        if digest.uri != request.target() {
            tracing::debug!("Digest uri does not match the request target");
            return Outcome::Challenge(self.challenge(request, false));
        }

        let stale = match self.check_nonce(&digest.nonce, now()) {
            NonceState::Valid => false,
            NonceState::Stale => true,
            NonceState::Invalid => {
                tracing::debug!("Digest nonce signature invalid");
                return Outcome::Challenge(self.challenge(request, false));
            }
        };

        let Some(resolved) = identifiers
            .identify(&Credentials::username(digest.username.as_str()))
            .await
        else {
            return Outcome::Challenge(self.challenge(request, false));
        };

        let Some(ha1) = resolved.identity.get_str(self.fields.password()) else {
            tracing::debug!(field = %self.fields.password(), "Identity has no digest hash");
            return Outcome::Challenge(self.challenge(request, false));
        };

        let Some(expected) = self.expected_response(&ha1, &request.method, &digest) else {
            tracing::debug!("Digest answer lacks the advertised qop");
            return Outcome::Challenge(self.challenge(request, false));
        };
        if !bool::from(expected.as_bytes().ct_eq(digest.response.as_bytes())) {
            tracing::debug!("Digest response mismatch");
            return Outcome::Challenge(self.challenge(request, false));
        }

        if stale {
            return Outcome::Challenge(self.challenge(request, true));
        }

        Outcome::identified(resolved)
    }

    /// `401` carrying a fresh nonce
    pub fn challenge(&self, request: &AuthRequest, stale: bool) -> Challenge {
        let realm = realm_for(self.realm.as_deref(), request);
        let opaque = self
            .opaque
            .clone()
            .unwrap_or_else(|| self.algorithm.hash(&realm));

        let mut value = format!("Digest realm=\"{}\"", realm);
        if !self.qop.is_empty() {
            value.push_str(&format!(",qop=\"{}\"", self.qop));
        }
        value.push_str(&format!(
            ",nonce=\"{}\",opaque=\"{}\"",
            self.generate_nonce(now()),
            opaque
        ));
        if self.algorithm != DigestAlgorithm::Md5 {
            value.push_str(&format!(",algorithm={}", self.algorithm.as_str()));
        }
        if stale {
            value.push_str(",stale=true");
        }
        Challenge::unauthorized(value)
    }

    fn generate_nonce(&self, now: i64) -> String {
        let expiry = now.saturating_add(self.nonce_lifetime);
        let value = format!("{}:{}", expiry, self.sign_expiry(expiry));
        STANDARD.encode(value)
    }

    fn sign_expiry(&self, expiry: i64) -> String {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .expect("HMAC accepts any key length");
        mac.update(format!("{}:{}", expiry, self.secret).as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    fn check_nonce(&self, nonce: &str, now: i64) -> NonceState {
        let Some((expiry, signature)) = STANDARD
            .decode(nonce)
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok())
            .and_then(|text| {
                let (expiry, signature) = text.split_once(':')?;
                Some((expiry.parse::<i64>().ok()?, signature.to_string()))
            })
        else {
            return NonceState::Invalid;
        };

        let expected = self.sign_expiry(expiry);
        if !bool::from(expected.as_bytes().ct_eq(signature.as_bytes())) {
            return NonceState::Invalid;
        }
        if expiry < now {
            NonceState::Stale
        } else {
            NonceState::Valid
        }
    }

    /// The response the client should have sent. `None` when a qop is advertised
    /// but the answer does not use one of the advertised values with `nc` and
    /// `cnonce`; the RFC 2069 form is only accepted when no qop is configured.
    fn expected_response(
        &self,
        ha1: &str,
        method: &str,
        digest: &DigestResponse,
    ) -> Option<String> {
        let ha2 = self.algorithm.hash(&format!("{}:{}", method, digest.uri));
        if self.qop.is_empty() {
            return Some(
                self.algorithm
                    .hash(&format!("{}:{}:{}", ha1, digest.nonce, ha2)),
            );
        }

        let (Some(qop), Some(nc), Some(cnonce)) = (&digest.qop, &digest.nc, &digest.cnonce)
        else {
            return None;
        };
        if !self.qop.split(',').any(|offered| offered.trim() == qop) {
            return None;
        }
        Some(self.algorithm.hash(&format!(
            "{}:{}:{}:{}:{}:{}",
            ha1, digest.nonce, nc, cnonce, qop, ha2
        )))
    }
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Parse `Digest k="v", k=v, ...`. Returns `None` when a required parameter is missing.
fn parse_digest(header: &str) -> Option<DigestResponse> {
    let (scheme, rest) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("digest") {
        return None;
    }

    let mut params = parse_params(rest);
    let mut take = |key: &str| params.remove(key).filter(|v| !v.is_empty());

    Some(DigestResponse {
        username: take("username")?,
        realm: take("realm")?,
        nonce: take("nonce")?,
        uri: take("uri")?,
        response: take("response")?,
        qop: take("qop"),
        nc: take("nc"),
        cnonce: take("cnonce"),
    })
}

fn parse_params(input: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    let mut chars = input.chars().peekable();

    loop {
        while chars.next_if(|c| c.is_whitespace() || *c == ',').is_some() {}

        let key: String = std::iter::from_fn(|| chars.next_if(|c| *c != '=' && *c != ','))
            .collect();
        if key.trim().is_empty() {
            break;
        }
        if chars.next_if_eq(&'=').is_none() {
            continue;
        }

        let mut value = String::new();
        if chars.next_if_eq(&'"').is_some() {
            while let Some(c) = chars.next() {
                match c {
                    '\\' => value.extend(chars.next()),
                    '"' => break,
                    c => value.push(c),
                }
            }
        } else {
            value.extend(std::iter::from_fn(|| chars.next_if(|c| *c != ',')));
        }

        params.insert(key.trim().to_ascii_lowercase(), value.trim().to_string());
    }

    params
}
