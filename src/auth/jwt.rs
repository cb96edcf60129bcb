//! JWT Authentication
//!
//! Extracts a bearer token like [`TokenAuthenticator`](super::TokenAuthenticator)
//! and verifies it with a [`JwtVerifier`]. Verification failures never halt the
//! pipeline; they are reported as the matching [`FailureReason`].

use super::{Outcome, TokenLocation};
use crate::identifier::IdentifierCollection;
use crate::identity::{Credentials, Identity};
use crate::jwt::JwtVerifier;
use crate::metrics;
use crate::request::AuthRequest;
use crate::result::FailureReason;
use std::sync::Arc;

/// JWT Authenticator
///
/// # Example
///
/// ```
/// use jsonwebtoken::Algorithm;
/// use portcullis::auth::JwtAuthenticator;
/// use portcullis::jwt::JwtVerifier;
///
/// let verifier = JwtVerifier::with_secret(b"my-secret", Algorithm::HS256).unwrap();
///
/// // Resolve the `sub` claim through the identifier chain instead of
/// // trusting the payload
/// let auth = JwtAuthenticator::new(verifier).with_return_payload(false);
/// ```
#[derive(Debug)]
pub struct JwtAuthenticator {
    verifier: Arc<JwtVerifier>,
    location: TokenLocation,
    return_payload: bool,
    subject_key: String,
}

impl JwtAuthenticator {
    pub fn new(verifier: JwtVerifier) -> Self {
        Self::with_shared_verifier(Arc::new(verifier))
    }

    pub fn with_shared_verifier(verifier: Arc<JwtVerifier>) -> Self {
        Self {
            verifier,
            location: TokenLocation::bearer(),
            return_payload: true,
            subject_key: "sub".to_string(),
        }
    }

    #[must_use]
    pub fn with_location(mut self, location: TokenLocation) -> Self {
        self.location = location;
        self
    }

    /// `true` (default): the payload is the identity. `false`: forward
    /// `{payload}` to the identifier chain.
    #[must_use]
    pub fn with_return_payload(mut self, return_payload: bool) -> Self {
        self.return_payload = return_payload;
        self
    }

    #[must_use]
    pub fn with_subject_key(mut self, key: &str) -> Self {
        self.subject_key = key.to_string();
        self
    }

    pub fn verifier(&self) -> &Arc<JwtVerifier> {
        &self.verifier
    }

    pub async fn authenticate(
        &self,
        request: &AuthRequest,
        identifiers: &IdentifierCollection,
    ) -> Outcome {
        let Some(token) = self.location.extract(request) else {
            return Outcome::Skip;
        };

        let claims = match self.verifier.verify(&token) {
            Ok(claims) => {
                metrics::record_jwt_verification("accepted");
                claims
            }
            Err(e) => {
                tracing::debug!(error = %e, "JWT rejected");
                metrics::record_jwt_verification(FailureReason::from(e).as_str());
                return Outcome::Failure(e.into());
            }
        };

        if !claims.contains_key(&self.subject_key) {
            tracing::debug!(subject_key = %self.subject_key, "JWT payload has no subject");
            return Outcome::Failure(FailureReason::MissingCredentials);
        }

        if self.return_payload {
            return Outcome::trusted(Identity::new(claims));
        }

        match identifiers.identify(&Credentials::payload(claims)).await {
            Some(resolved) => Outcome::identified(resolved),
            None => Outcome::Failure(FailureReason::IdentityNotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
    use serde_json::json;

    const SECRET: &[u8] = b"unit-test-secret";

    fn authenticator() -> JwtAuthenticator {
        JwtAuthenticator::new(JwtVerifier::with_secret(SECRET, Algorithm::HS256).unwrap())
    }

    fn sign(claims: serde_json::Value) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_payload_returned_as_identity() {
        let request = AuthRequest::builder("GET", "/api")
            .header("Authorization", &format!("Bearer {}", sign(json!({"sub": "7", "role": "admin"}))))
            .build();

        match authenticator()
            .authenticate(&request, &IdentifierCollection::new())
            .await
        {
            Outcome::Success { identity, identifier } => {
                assert_eq!(identity.get_str("role").as_deref(), Some("admin"));
                assert!(identifier.is_none());
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_subject() {
        let request = AuthRequest::builder("GET", "/api")
            .header("Authorization", &format!("Bearer {}", sign(json!({"role": "admin"}))))
            .build();

        let outcome = authenticator()
            .authenticate(&request, &IdentifierCollection::new())
            .await;
        assert!(matches!(
            outcome,
            Outcome::Failure(FailureReason::MissingCredentials)
        ));
    }

    #[tokio::test]
    async fn test_garbage_token_is_malformed() {
        let request = AuthRequest::builder("GET", "/api?token=not.a.jwt").build();

        let outcome = authenticator()
            .authenticate(&request, &IdentifierCollection::new())
            .await;
        assert!(matches!(
            outcome,
            Outcome::Failure(FailureReason::TokenMalformed)
        ));
    }

    #[tokio::test]
    async fn test_no_token_skips() {
        let request = AuthRequest::builder("GET", "/api").build();
        let outcome = authenticator()
            .authenticate(&request, &IdentifierCollection::new())
            .await;
        assert!(matches!(outcome, Outcome::Skip));
    }
}
