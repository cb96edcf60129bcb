//! Authentication outcome model

use crate::auth::AuthenticatorRef;
use crate::identity::Identity;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

/// Closed failure taxonomy
///
/// Callers branch on these; there is no free-text failure at the result boundary.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    #[error("Credentials missing")]
    MissingCredentials,

    #[error("Identity not found")]
    IdentityNotFound,

    #[error("Credentials invalid")]
    CredentialsInvalid,

    #[error("Token malformed")]
    TokenMalformed,

    #[error("Token expired")]
    TokenExpired,

    #[error("Token signature invalid")]
    TokenSignatureInvalid,

    #[error("Unknown signing key")]
    UnknownSigningKey,

    #[error("URL not applicable")]
    UrlNotApplicable,

    #[error("No authenticator matched")]
    NoAuthenticatorMatched,

    #[error("Challenge required")]
    ChallengeRequired,
}

impl FailureReason {
    /// Rank used when aggregating failures across the chain; higher is more specific.
    pub fn specificity(self) -> u8 {
        match self {
            FailureReason::UrlNotApplicable | FailureReason::NoAuthenticatorMatched => 0,
            FailureReason::MissingCredentials => 1,
            FailureReason::IdentityNotFound => 2,
            FailureReason::CredentialsInvalid | FailureReason::TokenMalformed => 3,
            FailureReason::TokenExpired
            | FailureReason::TokenSignatureInvalid
            | FailureReason::UnknownSigningKey => 4,
            FailureReason::ChallengeRequired => 5,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FailureReason::MissingCredentials => "missing_credentials",
            FailureReason::IdentityNotFound => "identity_not_found",
            FailureReason::CredentialsInvalid => "credentials_invalid",
            FailureReason::TokenMalformed => "token_malformed",
            FailureReason::TokenExpired => "token_expired",
            FailureReason::TokenSignatureInvalid => "token_signature_invalid",
            FailureReason::UnknownSigningKey => "unknown_signing_key",
            FailureReason::UrlNotApplicable => "url_not_applicable",
            FailureReason::NoAuthenticatorMatched => "no_authenticator_matched",
            FailureReason::ChallengeRequired => "challenge_required",
        }
    }
}

/// Response the caller must emit after a halting failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    pub status: u16,
    pub headers: Vec<(String, String)>,
}

impl Challenge {
    /// `401` with a single `WWW-Authenticate` header
    pub fn unauthorized(www_authenticate: String) -> Self {
        Self {
            status: 401,
            headers: vec![("WWW-Authenticate".to_string(), www_authenticate)],
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Terminal result of one authentication attempt
#[derive(Debug, Clone)]
pub enum AuthenticationResult {
    Success {
        identity: Identity,
        authenticator: AuthenticatorRef,
        identifier: Option<Arc<str>>,
    },
    Failure {
        reason: FailureReason,
        authenticator: Option<AuthenticatorRef>,
        challenge: Option<Challenge>,
    },
}

impl AuthenticationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, AuthenticationResult::Success { .. })
    }

    pub fn identity(&self) -> Option<&Identity> {
        match self {
            AuthenticationResult::Success { identity, .. } => Some(identity),
            AuthenticationResult::Failure { .. } => None,
        }
    }

    pub fn reason(&self) -> Option<FailureReason> {
        match self {
            AuthenticationResult::Success { .. } => None,
            AuthenticationResult::Failure { reason, .. } => Some(*reason),
        }
    }

    /// Authenticator that produced the identity; `None` on failure
    pub fn authentication_provider(&self) -> Option<&AuthenticatorRef> {
        match self {
            AuthenticationResult::Success { authenticator, .. } => Some(authenticator),
            AuthenticationResult::Failure { .. } => None,
        }
    }

    /// Identifier that resolved the identity; `None` on failure or when the
    /// authenticator produced the identity itself (JWT payload, trusted session data)
    pub fn identification_provider(&self) -> Option<&str> {
        match self {
            AuthenticationResult::Success { identifier, .. } => identifier.as_deref(),
            AuthenticationResult::Failure { .. } => None,
        }
    }

    /// Authenticator whose failure was reported, if any
    pub fn failed_authenticator(&self) -> Option<&AuthenticatorRef> {
        match self {
            AuthenticationResult::Failure { authenticator, .. } => authenticator.as_ref(),
            AuthenticationResult::Success { .. } => None,
        }
    }

    pub fn challenge(&self) -> Option<&Challenge> {
        match self {
            AuthenticationResult::Failure { challenge, .. } => challenge.as_ref(),
            AuthenticationResult::Success { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_specificity_ordering() {
        assert!(
            FailureReason::TokenExpired.specificity()
                > FailureReason::MissingCredentials.specificity()
        );
        assert!(
            FailureReason::CredentialsInvalid.specificity()
                > FailureReason::IdentityNotFound.specificity()
        );
        assert_eq!(FailureReason::UrlNotApplicable.specificity(), 0);
    }

    #[test]
    fn test_challenge_header_lookup() {
        let challenge = Challenge::unauthorized("Basic realm=\"localhost\"".into());
        assert_eq!(challenge.status, 401);
        assert_eq!(
            challenge.header("www-authenticate"),
            Some("Basic realm=\"localhost\"")
        );
    }

    #[test]
    fn test_failure_accessors() {
        let result = AuthenticationResult::Failure {
            reason: FailureReason::NoAuthenticatorMatched,
            authenticator: None,
            challenge: None,
        };
        assert!(!result.is_valid());
        assert!(result.identity().is_none());
        assert!(result.authentication_provider().is_none());
        assert!(result.identification_provider().is_none());
        assert_eq!(result.reason(), Some(FailureReason::NoAuthenticatorMatched));
    }
}
