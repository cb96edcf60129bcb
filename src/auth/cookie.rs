//! Remember-me cookie authentication

use super::{FieldMap, Outcome};
use crate::cookie::{self, CookieAttributes, CookieToken, Salt, SetCookie};
use crate::identifier::IdentifierCollection;
use crate::identity::{Credentials, Identity};
use crate::request::AuthRequest;
use crate::result::FailureReason;
use crate::url_checker::{DefaultUrlChecker, UrlChecker};
use std::fmt;
use std::sync::Arc;

/// Re-authenticates from a `{username, hashed_token}` cookie
///
/// The user is looked up by the cookie's username alone; the token is then
/// recomputed from the record's own username and stored password and compared
/// in constant time.
pub struct CookieAuthenticator {
    attributes: CookieAttributes,
    remember_me_field: String,
    salt: Salt,
    fields: FieldMap,
    url_checker: Arc<dyn UrlChecker>,
}

impl fmt::Debug for CookieAuthenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CookieAuthenticator")
            .field("cookie", &self.attributes.name)
            .field("remember_me_field", &self.remember_me_field)
            .field("salt", &self.salt)
            .field("url_checker", &self.url_checker)
            .finish_non_exhaustive()
    }
}

impl CookieAuthenticator {
    pub fn new(salt: Salt) -> Self {
        Self {
            attributes: CookieAttributes::default(),
            remember_me_field: "remember_me".to_string(),
            salt,
            fields: FieldMap::credentials(),
            url_checker: Arc::new(DefaultUrlChecker::any()),
        }
    }

    #[must_use]
    pub fn with_attributes(mut self, attributes: CookieAttributes) -> Self {
        self.attributes = attributes;
        self
    }

    #[must_use]
    pub fn with_remember_me_field(mut self, field: &str) -> Self {
        self.remember_me_field = field.to_string();
        self
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

    pub fn attributes(&self) -> &CookieAttributes {
        &self.attributes
    }

    pub async fn authenticate(
        &self,
        request: &AuthRequest,
        identifiers: &IdentifierCollection,
    ) -> Outcome {
        if !self.url_checker.matches(request) {
            return Outcome::Skip;
        }
        let Some(value) = request.cookie(&self.attributes.name) else {
            return Outcome::Skip;
        };

        let Some(token) = CookieToken::decode(value) else {
            tracing::debug!(cookie = %self.attributes.name, "Remember-me cookie malformed");
            return Outcome::Failure(FailureReason::CredentialsInvalid);
        };

        let Some(resolved) = identifiers
            .identify(&Credentials::username(token.username.as_str()))
            .await
        else {
            return Outcome::Failure(FailureReason::IdentityNotFound);
        };

        let (Some(username), Some(password)) = (
            resolved.identity.get_str(self.fields.username()),
            resolved.identity.get_str(self.fields.password()),
        ) else {
            return Outcome::Failure(FailureReason::CredentialsInvalid);
        };

        // Derived from the record, exactly as `issue` does, never from the cookie
        if cookie::verify(&token.hashed_token, &username, &password, &self.salt) {
            Outcome::identified(resolved)
        } else {
            tracing::debug!("Remember-me token mismatch");
            Outcome::Failure(FailureReason::CredentialsInvalid)
        }
    }

    /// Issue a cookie for `identity` when the login asked to be remembered
    ///
    /// Requires the URL scope to match and the remember-me form field to be truthy.
    pub fn persist(&self, request: &AuthRequest, identity: &Identity) -> Option<SetCookie> {
        if !self.url_checker.matches(request) || !self.wants_remember_me(request) {
            return None;
        }
        self.issue(identity)
    }

    /// Cookie for `identity` regardless of request; `None` if the record lacks
    /// the mapped username or password
    pub fn issue(&self, identity: &Identity) -> Option<SetCookie> {
        let username = identity.get_str(self.fields.username())?;
        let password = identity.get_str(self.fields.password())?;
        let token = CookieToken::issue(&username, &password, &self.salt);
        Some(SetCookie::new(token.encode(), self.attributes.clone()))
    }

    /// Expiring cookie that removes the remember-me token
    pub fn clear(&self) -> SetCookie {
        SetCookie::expired(self.attributes.clone())
    }

    fn wants_remember_me(&self, request: &AuthRequest) -> bool {
        request
            .form_field(&self.remember_me_field)
            .map(|v| !matches!(v.trim(), "" | "0" | "false" | "off"))
            .unwrap_or(false)
    }
}
