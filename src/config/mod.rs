//! Configuration module for Portcullis
//!
//! Handles loading and parsing of YAML configuration files with support for
//! environment variable expansion and validation. Every optional key has an
//! explicit default; the configuration is resolved once, when the service is
//! built, and never re-read per request.

use crate::auth::DigestAlgorithm;
use crate::cookie::{CookieAttributes, SaltConfig};
use crate::identifier::{PasswordFields, TokenHash};
use crate::jwt::Jwks;
use crate::url_checker::{LoginUrls, UrlCheckOptions};
use lazy_static::lazy_static;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use thiserror::Error;

mod build;
mod loader;

pub use build::Collaborators;
pub use loader::ConfigLoader;

// ============================================================================
// Environment Variable Expansion
// ============================================================================

lazy_static! {
    static ref ENV_VAR: Regex = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]*))?\}")
        .expect("static regex is valid");
}

/// Expand environment variables in a string.
///
/// Supports two syntaxes:
/// - `${VAR_NAME}` - Simple expansion, keeps placeholder if var not found
/// - `${VAR_NAME:-default}` - Expansion with default value
///
/// Variable names must start with a letter or underscore and contain only
/// uppercase letters, digits, and underscores.
fn expand_env_vars(s: &str) -> String {
    let mut last_match = 0;
    let mut result = String::with_capacity(s.len());

    for cap in ENV_VAR.captures_iter(s) {
        let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
            continue;
        };

        result.push_str(&s[last_match..full_match.start()]);

        let value = match std::env::var(var_name.as_str()) {
            Ok(val) => val,
            Err(_) => match cap.get(2) {
                Some(default) => default.as_str().to_string(),
                // No env var and no default. Keep the original placeholder.
                None => full_match.as_str().to_string(),
            },
        };
        result.push_str(&value);

        last_match = full_match.end();
    }

    result.push_str(&s[last_match..]);
    result
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub identifiers: Vec<IdentifierConfig>,
    #[serde(default)]
    pub authenticators: Vec<AuthenticatorConfig>,
}

impl Config {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        ConfigLoader::load(path)
    }

    /// Validate the configuration
    ///
    /// Structural checks only; collaborator-dependent checks happen when the
    /// service is built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.authenticators.is_empty() {
            return Err(ConfigError::ValidationError(
                "At least one authenticator must be configured".into(),
            ));
        }

        let mut names = HashSet::new();
        for authenticator in &self.authenticators {
            let name = authenticator.name();
            if !names.insert(name.to_string()) {
                return Err(ConfigError::ValidationError(format!(
                    "Duplicate authenticator name '{}'",
                    name
                )));
            }
            if let AuthenticatorConfig::Jwt(jwt) = authenticator {
                jwt.validate()?;
            }
        }

        let mut names = HashSet::new();
        for identifier in &self.identifiers {
            if !names.insert(identifier.name().to_string()) {
                return Err(ConfigError::ValidationError(format!(
                    "Duplicate identifier name '{}'",
                    identifier.name()
                )));
            }
        }

        if let Some(redirect) = &self.service.unauthenticated_redirect {
            if !redirect.starts_with('/') {
                return Err(ConfigError::ValidationError(format!(
                    "unauthenticated_redirect '{}' must be a local path",
                    redirect
                )));
            }
        }

        Ok(())
    }
}

/// Application-wide security settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Application salt, used by Cookie (`salt: true`) and as Digest nonce secret
    #[serde(default)]
    pub salt: Option<String>,
}

/// Service-level behaviour
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Where unauthenticated requests should be sent
    #[serde(default)]
    pub unauthenticated_redirect: Option<String>,
    /// Query parameter carrying the original target on that redirect
    #[serde(default)]
    pub query_param: Option<String>,
}

// ============================================================================
// Identifiers
// ============================================================================

/// Identifier configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IdentifierConfig {
    Password(PasswordIdentifierConfig),
    Token(TokenIdentifierConfig),
    JwtSubject(JwtSubjectIdentifierConfig),
}

impl IdentifierConfig {
    pub fn name(&self) -> &str {
        match self {
            IdentifierConfig::Password(c) => c.name.as_deref().unwrap_or("Password"),
            IdentifierConfig::Token(c) => c.name.as_deref().unwrap_or("Token"),
            IdentifierConfig::JwtSubject(c) => c.name.as_deref().unwrap_or("JwtSubject"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PasswordIdentifierConfig {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub fields: PasswordFields,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenIdentifierConfig {
    #[serde(default)]
    pub name: Option<String>,
    /// Record field holding the token
    #[serde(default = "default_token_field")]
    pub token_field: String,
    /// Credential key carrying the presented token
    #[serde(default = "default_token_field")]
    pub data_field: String,
    #[serde(default)]
    pub hash_algorithm: Option<TokenHash>,
}

impl Default for TokenIdentifierConfig {
    fn default() -> Self {
        Self {
            name: None,
            token_field: default_token_field(),
            data_field: default_token_field(),
            hash_algorithm: None,
        }
    }
}

fn default_token_field() -> String {
    "token".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtSubjectIdentifierConfig {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_subject_token_field")]
    pub token_field: String,
    #[serde(default = "default_subject_key")]
    pub data_field: String,
}

impl Default for JwtSubjectIdentifierConfig {
    fn default() -> Self {
        Self {
            name: None,
            token_field: default_subject_token_field(),
            data_field: default_subject_key(),
        }
    }
}

fn default_subject_token_field() -> String {
    "id".to_string()
}

fn default_subject_key() -> String {
    "sub".to_string()
}

// ============================================================================
// Authenticators
// ============================================================================

/// Authenticator configuration, in pipeline order
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthenticatorConfig {
    Session(SessionSettings),
    Form(FormSettings),
    Token(TokenSettings),
    Jwt(JwtSettings),
    HttpBasic(HttpBasicSettings),
    HttpDigest(HttpDigestSettings),
    Cookie(CookieSettings),
}

impl AuthenticatorConfig {
    pub fn name(&self) -> &str {
        match self {
            AuthenticatorConfig::Session(c) => c.name.as_deref().unwrap_or("Session"),
            AuthenticatorConfig::Form(c) => c.name.as_deref().unwrap_or("Form"),
            AuthenticatorConfig::Token(c) => c.name.as_deref().unwrap_or("Token"),
            AuthenticatorConfig::Jwt(c) => c.name.as_deref().unwrap_or("Jwt"),
            AuthenticatorConfig::HttpBasic(c) => c.name.as_deref().unwrap_or("HttpBasic"),
            AuthenticatorConfig::HttpDigest(c) => c.name.as_deref().unwrap_or("HttpDigest"),
            AuthenticatorConfig::Cookie(c) => c.name.as_deref().unwrap_or("Cookie"),
        }
    }
}

/// Route scoping shared by Form and Cookie
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UrlScopeSettings {
    /// Unset means every URL
    #[serde(default)]
    pub login_url: Option<LoginUrls>,
    #[serde(default)]
    pub use_regex: bool,
    #[serde(default)]
    pub check_full_url: bool,
}

impl UrlScopeSettings {
    pub fn options(&self) -> UrlCheckOptions {
        UrlCheckOptions {
            use_regex: self.use_regex,
            check_full_url: self.check_full_url,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_session_key")]
    pub session_key: String,
    /// Re-run stored credentials through the identifiers instead of trusting them
    #[serde(default)]
    pub identify: bool,
    /// Logical (`username`, `password`) to identity record field
    #[serde(default)]
    pub fields: HashMap<String, String>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            name: None,
            session_key: default_session_key(),
            identify: false,
            fields: HashMap::new(),
        }
    }
}

fn default_session_key() -> String {
    "Auth".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FormSettings {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(flatten)]
    pub scope: UrlScopeSettings,
    /// Logical (`username`, `password`) to request body field
    #[serde(default)]
    pub fields: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenSettings {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub header: Option<String>,
    #[serde(default)]
    pub query_param: Option<String>,
    /// Expected as `"<prefix> <token>"` in the header
    #[serde(default)]
    pub token_prefix: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtSettings {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_jwt_header")]
    pub header: Option<String>,
    #[serde(default = "default_jwt_query_param")]
    pub query_param: Option<String>,
    #[serde(default = "default_jwt_prefix")]
    pub token_prefix: Option<String>,
    #[serde(default = "default_jwt_algorithm")]
    pub algorithm: String,
    /// Shared secret for HS* algorithms
    #[serde(default)]
    pub secret_key: Option<String>,
    /// PEM public key for a single asymmetric key
    #[serde(default)]
    pub public_key: Option<String>,
    /// Inline key set
    #[serde(default)]
    pub jwks: Option<Jwks>,
    /// Remote key set, fetched by the application's refresher
    #[serde(default)]
    pub jwks_url: Option<String>,
    #[serde(default = "default_jwks_cache_ttl")]
    pub jwks_cache_ttl_seconds: u64,
    /// Use the payload as the identity instead of resolving it
    #[serde(default = "default_true")]
    pub return_payload: bool,
    /// Claim holding the subject
    #[serde(default = "default_subject_key")]
    pub subject_key: String,
    #[serde(default)]
    pub issuer: Option<String>,
    #[serde(default)]
    pub audience: Option<String>,
    #[serde(default)]
    pub leeway_seconds: u64,
}

impl Default for JwtSettings {
    fn default() -> Self {
        Self {
            name: None,
            header: default_jwt_header(),
            query_param: default_jwt_query_param(),
            token_prefix: default_jwt_prefix(),
            algorithm: default_jwt_algorithm(),
            secret_key: None,
            public_key: None,
            jwks: None,
            jwks_url: None,
            jwks_cache_ttl_seconds: default_jwks_cache_ttl(),
            return_payload: true,
            subject_key: default_subject_key(),
            issuer: None,
            audience: None,
            leeway_seconds: 0,
        }
    }
}

impl JwtSettings {
    /// Shared-secret settings with every other key at its default
    pub fn with_secret(secret: &str) -> Self {
        Self {
            secret_key: Some(secret.to_string()),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.algorithm
            .parse::<jsonwebtoken::Algorithm>()
            .map_err(|_| {
                ConfigError::ValidationError(format!(
                    "Unknown JWT algorithm '{}'",
                    self.algorithm
                ))
            })?;

        if self.secret_key.is_none()
            && self.public_key.is_none()
            && self.jwks.is_none()
            && self.jwks_url.is_none()
        {
            return Err(ConfigError::ValidationError(
                "JWT authenticator needs secret_key, public_key, jwks or jwks_url".into(),
            ));
        }

        if let Some(url) = &self.jwks_url {
            if !is_valid_http_url(url) {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid jwks_url '{}': must start with http:// or https://",
                    url
                )));
            }
        }

        Ok(())
    }
}

fn default_jwt_header() -> Option<String> {
    Some("Authorization".to_string())
}

fn default_jwt_query_param() -> Option<String> {
    Some("token".to_string())
}

fn default_jwt_prefix() -> Option<String> {
    Some("Bearer".to_string())
}

fn default_jwt_algorithm() -> String {
    "HS256".to_string()
}

fn default_jwks_cache_ttl() -> u64 {
    3600
}

fn default_true() -> bool {
    true
}

/// Validate that a URL starts with http:// or https://
fn is_valid_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HttpBasicSettings {
    #[serde(default)]
    pub name: Option<String>,
    /// Defaults to the request's Host header
    #[serde(default)]
    pub realm: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpDigestSettings {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub realm: Option<String>,
    #[serde(default = "default_qop")]
    pub qop: String,
    #[serde(default = "default_nonce_lifetime")]
    pub nonce_lifetime_seconds: u64,
    /// Nonce signing secret; falls back to the application salt
    #[serde(default)]
    pub secret: Option<String>,
    #[serde(default)]
    pub opaque: Option<String>,
    #[serde(default)]
    pub algorithm: DigestAlgorithm,
    /// Logical (`username`, `password`) to identity record field; the password
    /// field holds the HA1 digest
    #[serde(default)]
    pub fields: HashMap<String, String>,
}

impl Default for HttpDigestSettings {
    fn default() -> Self {
        Self {
            name: None,
            realm: None,
            qop: default_qop(),
            nonce_lifetime_seconds: default_nonce_lifetime(),
            secret: None,
            opaque: None,
            algorithm: DigestAlgorithm::default(),
            fields: HashMap::new(),
        }
    }
}

fn default_qop() -> String {
    "auth".to_string()
}

fn default_nonce_lifetime() -> u64 {
    300
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CookieSettings {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub cookie: CookieAttributes,
    /// Form field that opts a login into the remember-me cookie
    #[serde(default = "default_remember_me_field")]
    pub remember_me_field: String,
    #[serde(default)]
    pub salt: SaltConfig,
    #[serde(flatten)]
    pub scope: UrlScopeSettings,
    /// Logical (`username`, `password`) to identity record field
    #[serde(default)]
    pub fields: HashMap<String, String>,
}

impl Default for CookieSettings {
    fn default() -> Self {
        Self {
            name: None,
            cookie: CookieAttributes::default(),
            remember_me_field: default_remember_me_field(),
            salt: SaltConfig::default(),
            scope: UrlScopeSettings::default(),
            fields: HashMap::new(),
        }
    }
}

fn default_remember_me_field() -> String {
    "remember_me".to_string()
}
