//! Authenticators
//!
//! Each authenticator extracts candidate credentials from a request and either
//! produces an identity, reports a failure, skips, or (Basic/Digest) halts the
//! pipeline with a challenge. The set is closed: new strategies extend
//! [`Authenticator`].
//!
//! | Kind       | Stateless | Persistent | Halting |
//! |------------|-----------|------------|---------|
//! | Session    |           | yes        |         |
//! | Form       |           |            |         |
//! | Token      | yes       |            |         |
//! | Jwt        | yes       |            |         |
//! | HttpBasic  | yes       |            | yes     |
//! | HttpDigest | yes       |            | yes     |
//! | Cookie     |           |            |         |

pub mod cookie;
pub mod fields;
pub mod form;
pub mod http_basic;
pub mod http_digest;
pub mod jwt;
pub mod session;
pub mod token;

pub use cookie::CookieAuthenticator;
pub use fields::FieldMap;
pub use form::FormAuthenticator;
pub use http_basic::HttpBasicAuthenticator;
pub use http_digest::{DigestAlgorithm, HttpDigestAuthenticator};
pub use jwt::JwtAuthenticator;
pub use session::SessionAuthenticator;
pub use token::{TokenAuthenticator, TokenLocation};

use crate::identifier::{IdentifierCollection, Resolved};
use crate::identity::Identity;
use crate::request::AuthRequest;
use crate::result::{Challenge, FailureReason};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Authenticator variant tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AuthenticatorKind {
    Session,
    Form,
    Token,
    Jwt,
    HttpBasic,
    HttpDigest,
    Cookie,
}

impl AuthenticatorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AuthenticatorKind::Session => "Session",
            AuthenticatorKind::Form => "Form",
            AuthenticatorKind::Token => "Token",
            AuthenticatorKind::Jwt => "Jwt",
            AuthenticatorKind::HttpBasic => "HttpBasic",
            AuthenticatorKind::HttpDigest => "HttpDigest",
            AuthenticatorKind::Cookie => "Cookie",
        }
    }

    /// Re-derives identity from every request
    pub fn is_stateless(self) -> bool {
        matches!(
            self,
            AuthenticatorKind::Token
                | AuthenticatorKind::Jwt
                | AuthenticatorKind::HttpBasic
                | AuthenticatorKind::HttpDigest
        )
    }

    /// Restores identity established by an earlier request
    pub fn is_persistent(self) -> bool {
        matches!(self, AuthenticatorKind::Session)
    }

    /// A failure stops the pipeline and demands a challenge response
    pub fn is_halting(self) -> bool {
        matches!(
            self,
            AuthenticatorKind::HttpBasic | AuthenticatorKind::HttpDigest
        )
    }
}

impl fmt::Display for AuthenticatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Names an authenticator in a service's chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatorRef {
    pub kind: AuthenticatorKind,
    pub name: Arc<str>,
}

impl AuthenticatorRef {
    pub fn new(kind: AuthenticatorKind, name: &str) -> Self {
        Self {
            kind,
            name: Arc::from(name),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for AuthenticatorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Result of running one authenticator
#[derive(Debug, Clone)]
pub enum Outcome {
    /// Identity established; `identifier` is set when the identifier chain resolved it
    Success {
        identity: Identity,
        identifier: Option<Arc<str>>,
    },
    /// Credentials were present but not accepted; the pipeline continues
    Failure(FailureReason),
    /// Not applicable to this request
    Skip,
    /// Halting failure; the caller must emit the challenge
    Challenge(Challenge),
}

impl Outcome {
    pub(crate) fn identified(resolved: Resolved) -> Self {
        Outcome::Success {
            identity: resolved.identity,
            identifier: Some(resolved.identifier),
        }
    }

    pub(crate) fn trusted(identity: Identity) -> Self {
        Outcome::Success {
            identity,
            identifier: None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Success { .. } => "success",
            Outcome::Failure(_) => "failure",
            Outcome::Skip => "skip",
            Outcome::Challenge(_) => "challenge",
        }
    }
}

/// Authentication strategies
#[derive(Debug)]
pub enum Authenticator {
    Session(SessionAuthenticator),
    Form(FormAuthenticator),
    Token(TokenAuthenticator),
    Jwt(JwtAuthenticator),
    HttpBasic(HttpBasicAuthenticator),
    HttpDigest(HttpDigestAuthenticator),
    Cookie(CookieAuthenticator),
}

impl Authenticator {
    pub fn kind(&self) -> AuthenticatorKind {
        match self {
            Authenticator::Session(_) => AuthenticatorKind::Session,
            Authenticator::Form(_) => AuthenticatorKind::Form,
            Authenticator::Token(_) => AuthenticatorKind::Token,
            Authenticator::Jwt(_) => AuthenticatorKind::Jwt,
            Authenticator::HttpBasic(_) => AuthenticatorKind::HttpBasic,
            Authenticator::HttpDigest(_) => AuthenticatorKind::HttpDigest,
            Authenticator::Cookie(_) => AuthenticatorKind::Cookie,
        }
    }

    pub fn is_stateless(&self) -> bool {
        self.kind().is_stateless()
    }

    pub fn is_persistent(&self) -> bool {
        self.kind().is_persistent()
    }

    pub fn is_halting(&self) -> bool {
        self.kind().is_halting()
    }

    pub async fn authenticate(
        &self,
        request: &AuthRequest,
        identifiers: &IdentifierCollection,
    ) -> Outcome {
        match self {
            Authenticator::Session(a) => a.authenticate(request, identifiers).await,
            Authenticator::Form(a) => a.authenticate(request, identifiers).await,
            Authenticator::Token(a) => a.authenticate(request, identifiers).await,
            Authenticator::Jwt(a) => a.authenticate(request, identifiers).await,
            Authenticator::HttpBasic(a) => a.authenticate(request, identifiers).await,
            Authenticator::HttpDigest(a) => a.authenticate(request, identifiers).await,
            Authenticator::Cookie(a) => a.authenticate(request, identifiers).await,
        }
    }
}
