//! Login form authentication

use super::{FieldMap, Outcome};
use crate::identifier::IdentifierCollection;
use crate::identity::Credentials;
use crate::request::AuthRequest;
use crate::result::FailureReason;
use crate::url_checker::{DefaultUrlChecker, UrlChecker};
use serde_json::Value;
use std::sync::Arc;

/// Reads `username`/`password` from the body of requests to the login URL(s)
#[derive(Debug, Clone)]
pub struct FormAuthenticator {
    fields: FieldMap,
    url_checker: Arc<dyn UrlChecker>,
}

impl Default for FormAuthenticator {
    fn default() -> Self {
        Self::new()
    }
}

impl FormAuthenticator {
    /// Applies to every URL until a checker is set
    pub fn new() -> Self {
        Self {
            fields: FieldMap::credentials(),
            url_checker: Arc::new(DefaultUrlChecker::any()),
        }
    }

    #[must_use]
    pub fn with_fields(mut self, fields: FieldMap) -> Self {
        self.fields = fields;
        self
    }

    #[must_use]
    pub fn with_url_checker(mut self, checker: Arc<dyn UrlChecker>) -> Self {
        self.url_checker = checker;
        self
    }

    pub fn fields(&self) -> &FieldMap {
        &self.fields
    }

    pub async fn authenticate(
        &self,
        request: &AuthRequest,
        identifiers: &IdentifierCollection,
    ) -> Outcome {
        if !self.url_checker.matches(request) {
            tracing::debug!(path = %request.path, "Login URL does not match");
            return Outcome::Skip;
        }

        let Some(credentials) = self.credentials(request) else {
            return Outcome::Failure(FailureReason::MissingCredentials);
        };

        match identifiers.identify(&credentials).await {
            Some(resolved) => Outcome::identified(resolved),
            None => Outcome::Failure(FailureReason::IdentityNotFound),
        }
    }

    /// Every mapped field must be present and non-empty
    fn credentials(&self, request: &AuthRequest) -> Option<Credentials> {
        let mut credentials = Credentials::new();
        for (logical, physical) in self.fields.iter() {
            let value = request.form_field(physical).filter(|v| !v.is_empty())?;
            credentials = credentials.with(logical, Value::String(value.to_string()));
        }
        Some(credentials)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifier::{CallbackIdentifier, Identifier};
    use crate::identity::Identity;
    use crate::url_checker::UrlCheckOptions;
    use serde_json::json;
    use std::collections::HashMap;

    fn identifiers() -> IdentifierCollection {
        let mut chain = IdentifierCollection::new();
        chain
            .push(Identifier::Callback(CallbackIdentifier::from_fn(|c| {
                match (c.get_str("username"), c.get_str("password")) {
                    (Some("mariano"), Some("password")) => Identity::from_value(json!({"id": 1})),
                    _ => None,
                }
            })))
            .unwrap();
        chain
    }

    fn scoped() -> FormAuthenticator {
        let checker =
            DefaultUrlChecker::new(Some(vec!["/login".into()]), UrlCheckOptions::default())
                .unwrap();
        FormAuthenticator::new().with_url_checker(Arc::new(checker))
    }

    #[tokio::test]
    async fn test_login_success() {
        let request = AuthRequest::builder("POST", "/login")
            .form("username", "mariano")
            .form("password", "password")
            .build();
        let outcome = scoped().authenticate(&request, &identifiers()).await;
        assert!(matches!(outcome, Outcome::Success { .. }));
    }

    #[tokio::test]
    async fn test_other_url_skips() {
        let request = AuthRequest::builder("POST", "/logins")
            .form("username", "mariano")
            .form("password", "password")
            .build();
        let outcome = scoped().authenticate(&request, &identifiers()).await;
        assert!(matches!(outcome, Outcome::Skip));
    }

    #[tokio::test]
    async fn test_missing_field() {
        let request = AuthRequest::builder("POST", "/login")
            .form("username", "mariano")
            .form("password", "")
            .build();
        let outcome = scoped().authenticate(&request, &identifiers()).await;
        assert!(matches!(
            outcome,
            Outcome::Failure(FailureReason::MissingCredentials)
        ));
    }

    #[tokio::test]
    async fn test_wrong_password() {
        let request = AuthRequest::builder("POST", "/login")
            .form("username", "mariano")
            .form("password", "nope")
            .build();
        let outcome = scoped().authenticate(&request, &identifiers()).await;
        assert!(matches!(
            outcome,
            Outcome::Failure(FailureReason::IdentityNotFound)
        ));
    }

    #[tokio::test]
    async fn test_mapped_fields() {
        let fields = FieldMap::credentials()
            .with_overrides(&HashMap::from([("username".to_string(), "user".to_string())]))
            .unwrap();
        let request = AuthRequest::builder("POST", "/login")
            .form("user", "mariano")
            .form("password", "password")
            .build();
        let outcome = scoped()
            .with_fields(fields)
            .authenticate(&request, &identifiers())
            .await;
        assert!(matches!(outcome, Outcome::Success { .. }));
    }
}
