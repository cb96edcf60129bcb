//! Remember-me cookie tokens
//!
//! A cookie carries `{username, hashed_token}` where
//!
//! ```text
//! salted:   hashed_token = hex(SHA-256(username ‖ password ‖ hex(HMAC-SHA256(salt, username ‖ password))))
//! unsalted: hashed_token = hex(SHA-256(username ‖ password))
//! ```
//!
//! `password` is whatever the user record stores (normally a password hash),
//! never a plaintext password taken from a request. Rotating the salt
//! invalidates every cookie issued under the old one.

mod set_cookie;

pub use set_cookie::{CookieAttributes, SameSite, SetCookie};

use crate::config::ConfigError;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Salt policy as configured
///
/// In YAML: `false` → no salt, `true` → the application salt, a string → that
/// string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SaltConfig {
    NoSalt,
    Fixed(String),
    #[default]
    AppDefault,
}

impl SaltConfig {
    /// Resolve against the application salt. `AppDefault` without one is an error.
    pub fn resolve(&self, app_salt: Option<&str>) -> Result<Salt, ConfigError> {
        match self {
            SaltConfig::NoSalt => Ok(Salt::none()),
            SaltConfig::Fixed(value) => Ok(Salt::new(value.as_bytes())),
            SaltConfig::AppDefault => app_salt.map(|s| Salt::new(s.as_bytes())).ok_or_else(|| {
                ConfigError::ValidationError(
                    "Cookie salt is enabled but no application salt is configured".into(),
                )
            }),
        }
    }
}

#[derive(Deserialize, Serialize)]
#[serde(untagged)]
enum SaltSetting {
    Enabled(bool),
    Fixed(String),
}

impl<'de> Deserialize<'de> for SaltConfig {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match SaltSetting::deserialize(deserializer)? {
            SaltSetting::Enabled(true) => SaltConfig::AppDefault,
            SaltSetting::Enabled(false) => SaltConfig::NoSalt,
            SaltSetting::Fixed(value) => SaltConfig::Fixed(value),
        })
    }
}

impl Serialize for SaltConfig {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            SaltConfig::NoSalt => SaltSetting::Enabled(false).serialize(serializer),
            SaltConfig::AppDefault => SaltSetting::Enabled(true).serialize(serializer),
            SaltConfig::Fixed(value) => SaltSetting::Fixed(value.clone()).serialize(serializer),
        }
    }
}

/// Resolved salt bytes
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Salt(Option<Vec<u8>>);

impl std::fmt::Debug for Salt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Salt")
            .field(&self.0.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Salt {
    pub fn none() -> Self {
        Self(None)
    }

    pub fn new(bytes: &[u8]) -> Self {
        Self(Some(bytes.to_vec()))
    }

    pub fn is_salted(&self) -> bool {
        self.0.is_some()
    }
}

/// Derive the hashed token for a username and stored password
pub fn derive(username: &str, password: &str, salt: &Salt) -> String {
    let value = format!("{}{}", username, password);
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());

    if let Some(salt) = &salt.0 {
        let mut mac = HmacSha256::new_from_slice(salt).expect("HMAC accepts any key length");
        mac.update(value.as_bytes());
        hasher.update(hex::encode(mac.finalize().into_bytes()).as_bytes());
    }

    hex::encode(hasher.finalize())
}

/// Recompute the token and compare in constant time
pub fn verify(presented: &str, username: &str, password: &str, salt: &Salt) -> bool {
    let expected = derive(username, password, salt);
    presented.as_bytes().ct_eq(expected.as_bytes()).into()
}

/// Decoded cookie payload
#[derive(Clone, PartialEq, Eq)]
pub struct CookieToken {
    pub username: String,
    pub hashed_token: String,
}

impl std::fmt::Debug for CookieToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CookieToken")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl CookieToken {
    /// Token for a user record's username and stored password
    pub fn issue(username: &str, password: &str, salt: &Salt) -> Self {
        Self {
            username: username.to_string(),
            hashed_token: derive(username, password, salt),
        }
    }

    /// Cookie value: base64url of the JSON array `[username, hashed_token]`
    pub fn encode(&self) -> String {
        let json = serde_json::json!([self.username, self.hashed_token]).to_string();
        URL_SAFE_NO_PAD.encode(json)
    }

    /// Parse a cookie value; `None` if it is not a well-formed token.
    pub fn decode(value: &str) -> Option<Self> {
        let bytes = URL_SAFE_NO_PAD.decode(value.trim()).ok()?;
        let [username, hashed_token]: [String; 2] = serde_json::from_slice(&bytes).ok()?;
        if username.is_empty() || hashed_token.is_empty() {
            return None;
        }
        Some(Self {
            username,
            hashed_token,
        })
    }

    pub fn verify(&self, password: &str, salt: &Salt) -> bool {
        verify(&self.hashed_token, &self.username, password, salt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_is_deterministic_and_salt_dependent() {
        let a = derive("mariano", "$2y$10$hash", &Salt::new(b"salt-1"));
        let b = derive("mariano", "$2y$10$hash", &Salt::new(b"salt-1"));
        let c = derive("mariano", "$2y$10$hash", &Salt::new(b"salt-2"));
        let unsalted = derive("mariano", "$2y$10$hash", &Salt::none());

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, unsalted);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_unsalted_matches_plain_sha256() {
        let expected = hex::encode(Sha256::digest(b"marianopassword"));
        assert_eq!(derive("mariano", "password", &Salt::none()), expected);
    }

    #[test]
    fn test_token_does_not_embed_password() {
        let token = CookieToken::issue("mariano", "s3cr3t-hash", &Salt::new(b"salt"));
        let decoded = URL_SAFE_NO_PAD.decode(token.encode()).unwrap();
        assert!(!String::from_utf8(decoded).unwrap().contains("s3cr3t-hash"));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(CookieToken::decode("not base64 !!").is_none());
        assert!(CookieToken::decode(&URL_SAFE_NO_PAD.encode(r#"["only-one"]"#)).is_none());
        assert!(CookieToken::decode(&URL_SAFE_NO_PAD.encode(r#"{"a":1}"#)).is_none());
        assert!(CookieToken::decode(&URL_SAFE_NO_PAD.encode(r#"["", "x"]"#)).is_none());
    }

    #[test]
    fn test_verify_rejects_length_mismatch() {
        assert!(!verify("abc", "mariano", "password", &Salt::none()));
    }

    #[test]
    fn test_salt_config_from_yaml() {
        assert_eq!(
            serde_yaml::from_str::<SaltConfig>("true").unwrap(),
            SaltConfig::AppDefault
        );
        assert_eq!(
            serde_yaml::from_str::<SaltConfig>("false").unwrap(),
            SaltConfig::NoSalt
        );
        assert_eq!(
            serde_yaml::from_str::<SaltConfig>("pepper").unwrap(),
            SaltConfig::Fixed("pepper".into())
        );
    }

    #[test]
    fn test_app_default_salt_requires_app_salt() {
        assert!(SaltConfig::AppDefault.resolve(None).is_err());
        assert!(SaltConfig::AppDefault
            .resolve(Some("app"))
            .unwrap()
            .is_salted());
        assert!(!SaltConfig::NoSalt.resolve(None).unwrap().is_salted());
    }
}
