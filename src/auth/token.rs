//! Opaque token authentication

use super::Outcome;
use crate::identifier::IdentifierCollection;
use crate::identity::Credentials;
use crate::request::AuthRequest;
use crate::result::FailureReason;

/// Where a bearer token is read from
///
/// The header wins when both locations carry a token. With a prefix set, the
/// header must read exactly `"<prefix> <token>"`; any other header value is
/// ignored and the query parameter is tried instead.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenLocation {
    pub header: Option<String>,
    pub query_param: Option<String>,
    pub token_prefix: Option<String>,
}

impl TokenLocation {
    /// `Authorization: Bearer <token>` or `?token=<token>`
    pub fn bearer() -> Self {
        Self {
            header: Some("Authorization".to_string()),
            query_param: Some("token".to_string()),
            token_prefix: Some("Bearer".to_string()),
        }
    }

    pub fn extract(&self, request: &AuthRequest) -> Option<String> {
        self.from_header(request).or_else(|| self.from_query(request))
    }

    fn from_header(&self, request: &AuthRequest) -> Option<String> {
        let value = request.header(self.header.as_deref()?)?.trim();
        let token = match &self.token_prefix {
            Some(prefix) => value.strip_prefix(prefix.as_str())?.strip_prefix(' ')?,
            None => value,
        };
        (!token.is_empty() && !token.starts_with(char::is_whitespace)).then(|| token.to_string())
    }

    fn from_query(&self, request: &AuthRequest) -> Option<String> {
        let token = request.query_param(self.query_param.as_deref()?)?;
        (!token.is_empty()).then_some(token)
    }
}

/// Forwards `{token}` to the identifier chain
#[derive(Debug, Clone)]
pub struct TokenAuthenticator {
    location: TokenLocation,
}

impl TokenAuthenticator {
    pub fn new(location: TokenLocation) -> Self {
        Self { location }
    }

    pub fn location(&self) -> &TokenLocation {
        &self.location
    }

    pub async fn authenticate(
        &self,
        request: &AuthRequest,
        identifiers: &IdentifierCollection,
    ) -> Outcome {
        let Some(token) = self.location.extract(request) else {
            return Outcome::Skip;
        };

        match identifiers.identify(&Credentials::token(token)).await {
            Some(resolved) => Outcome::identified(resolved),
            None => Outcome::Failure(FailureReason::IdentityNotFound),
        }
    }
}
