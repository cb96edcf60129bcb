//! HTTP Basic authentication (RFC 7617)

use super::Outcome;
use crate::identifier::IdentifierCollection;
use crate::identity::Credentials;
use crate::request::AuthRequest;
use crate::result::Challenge;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Realm used when neither a realm nor a Host header is available
pub(crate) const FALLBACK_REALM: &str = "localhost";

/// Realm from configuration, else the request's Host header
pub(crate) fn realm_for(configured: Option<&str>, request: &AuthRequest) -> String {
    configured
        .or_else(|| request.header("host"))
        .unwrap_or(FALLBACK_REALM)
        .to_string()
}

/// Reads `Authorization: Basic base64(user:pass)`
///
/// Missing or rejected credentials halt the pipeline with a `401` challenge.
#[derive(Debug, Clone, Default)]
pub struct HttpBasicAuthenticator {
    realm: Option<String>,
}

impl HttpBasicAuthenticator {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_realm(mut self, realm: &str) -> Self {
        self.realm = Some(realm.to_string());
        self
    }

    pub async fn authenticate(
        &self,
        request: &AuthRequest,
        identifiers: &IdentifierCollection,
    ) -> Outcome {
        let Some((username, password)) = parse_basic(request) else {
            tracing::debug!("Basic credentials missing");
            return Outcome::Challenge(self.challenge(request));
        };

        match identifiers
            .identify(&Credentials::password(username, password))
            .await
        {
            Some(resolved) => Outcome::identified(resolved),
            None => Outcome::Challenge(self.challenge(request)),
        }
    }

    /// `401` with `WWW-Authenticate: Basic realm="..."`
    pub fn challenge(&self, request: &AuthRequest) -> Challenge {
        let realm = realm_for(self.realm.as_deref(), request);
        Challenge::unauthorized(format!("Basic realm=\"{}\"", realm))
    }
}

fn parse_basic(request: &AuthRequest) -> Option<(String, String)> {
    let header = request.header("authorization")?;
    let (scheme, encoded) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    if username.is_empty() || password.is_empty() {
        return None;
    }
    Some((username.to_string(), password.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basic(user_pass: &str) -> String {
        format!("Basic {}", STANDARD.encode(user_pass))
    }

    #[test]
    fn test_parse_basic() {
        let request = AuthRequest::builder("GET", "/")
            .header("Authorization", &basic("mariano:pa:ss"))
            .build();
        assert_eq!(
            parse_basic(&request),
            Some(("mariano".to_string(), "pa:ss".to_string()))
        );
    }

    #[test]
    fn test_parse_rejects_other_schemes_and_blanks() {
        let values = vec![
            "Bearer abc".to_string(),
            "Basic !!!".to_string(),
            basic("mariano"),
            basic(":pw"),
            basic("user:"),
        ];
        for value in values {
            let request = AuthRequest::builder("GET", "/")
                .header("Authorization", &value)
                .build();
            assert!(parse_basic(&request).is_none(), "{}", value);
        }
    }

    #[test]
    fn test_realm_defaults_to_host() {
        let request = AuthRequest::builder("GET", "/")
            .header("Host", "api.example.com")
            .build();
        let challenge = HttpBasicAuthenticator::new().challenge(&request);
        assert_eq!(
            challenge.header("WWW-Authenticate"),
            Some("Basic realm=\"api.example.com\"")
        );

        let challenge = HttpBasicAuthenticator::new()
            .with_realm("admin")
            .challenge(&request);
        assert_eq!(
            challenge.header("WWW-Authenticate"),
            Some("Basic realm=\"admin\"")
        );
    }
}
