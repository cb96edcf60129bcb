//! Authentication service
//!
//! Owns the authenticator chain and the identifier chain and turns one request
//! into one [`AuthenticationResult`]:
//!
//! - authenticators run strictly in order, one at a time
//! - the first success wins; later authenticators are not consulted
//! - a halting failure (Basic/Digest challenge) stops the chain immediately
//! - otherwise the most specific failure seen is reported, ties going to the
//!   earliest; if everything skipped the reason is `NoAuthenticatorMatched`
//!
//! # Example
//!
//! ```
//! use portcullis::auth::{Authenticator, TokenAuthenticator, TokenLocation};
//! use portcullis::identifier::{Identifier, MemoryResolver, TokenIdentifier};
//! use portcullis::service::AuthenticationService;
//! use portcullis::AuthRequest;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let users = Arc::new(MemoryResolver::from_values([json!({"id": 1, "token": "abc123"})]));
//! let service = AuthenticationService::builder()
//!     .identifier(Identifier::Token(TokenIdentifier::new(users)))
//!     .authenticator(Authenticator::Token(TokenAuthenticator::new(TokenLocation {
//!         header: Some("Authorization".into()),
//!         query_param: None,
//!         token_prefix: Some("Token".into()),
//!     })))
//!     .build()
//!     .unwrap();
//!
//! let request = AuthRequest::builder("GET", "/").header("Authorization", "Token abc123").build();
//! assert!(service.authenticate(&request).await.is_valid());
//! # }
//! ```

mod builder;
pub mod listener;
pub mod redirect;

pub use builder::AuthenticationServiceBuilder;
pub use listener::{ChannelListener, Identified, IdentifiedEvent, IdentityListener};
pub use redirect::{sanitize_redirect, RedirectConfig};

use crate::auth::{Authenticator, AuthenticatorRef, Outcome};
use crate::cookie::SetCookie;
use crate::identifier::IdentifierCollection;
use crate::identity::Identity;
use crate::jwt::{JwksCache, JwksError, JwksFetcher};
use crate::metrics;
use crate::request::AuthRequest;
use crate::result::{AuthenticationResult, FailureReason};
use crate::session::SessionError;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;

/// A JWKS cache and the endpoint that refills it
#[derive(Debug, Clone)]
pub struct RemoteKeySet {
    pub fetcher: JwksFetcher,
    pub cache: Arc<JwksCache>,
}

/// Runs the authentication pipeline
pub struct AuthenticationService {
    authenticators: Vec<(AuthenticatorRef, Authenticator)>,
    identifiers: IdentifierCollection,
    listeners: Vec<Arc<dyn IdentityListener>>,
    redirect: Option<RedirectConfig>,
    remote_key_sets: Vec<RemoteKeySet>,
}

impl fmt::Debug for AuthenticationService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticationService")
            .field(
                "authenticators",
                &self.authenticators.iter().map(|(r, _)| r.name()).collect::<Vec<_>>(),
            )
            .field("identifiers", &self.identifiers.names().collect::<Vec<_>>())
            .field("listeners", &self.listeners.len())
            .field("redirect", &self.redirect)
            .finish_non_exhaustive()
    }
}

impl AuthenticationService {
    pub fn builder() -> AuthenticationServiceBuilder {
        AuthenticationServiceBuilder::default()
    }

    /// Authenticate `request`
    pub async fn authenticate(&self, request: &AuthRequest) -> AuthenticationResult {
        let span = tracing::info_span!(
            "auth.pipeline",
            http.method = %request.method,
            http.path = %request.path,
            authenticators = self.authenticators.len(),
        );
        self.run(request).instrument(span).await
    }

    async fn run(&self, request: &AuthRequest) -> AuthenticationResult {
        let mut reported: Option<(FailureReason, &AuthenticatorRef)> = None;

        for (authenticator_ref, authenticator) in &self.authenticators {
            let outcome = authenticator.authenticate(request, &self.identifiers).await;
            metrics::record_auth_attempt(authenticator_ref.name(), outcome.label());
            tracing::debug!(
                authenticator = %authenticator_ref,
                outcome = outcome.label(),
                "Authenticator finished"
            );

            match outcome {
                Outcome::Success {
                    identity,
                    identifier,
                } => {
                    tracing::info!(
                        authenticator = %authenticator_ref,
                        identifier = identifier.as_deref().unwrap_or("-"),
                        "Request authenticated"
                    );
                    if !authenticator.is_stateless() && !authenticator.is_persistent() {
                        self.notify(authenticator_ref, &identity);
                    }
                    return AuthenticationResult::Success {
                        identity,
                        authenticator: authenticator_ref.clone(),
                        identifier,
                    };
                }
                Outcome::Challenge(challenge) => {
                    return AuthenticationResult::Failure {
                        reason: FailureReason::ChallengeRequired,
                        authenticator: Some(authenticator_ref.clone()),
                        challenge: Some(challenge),
                    };
                }
                Outcome::Failure(reason) => {
                    let more_specific = reported
                        .map(|(current, _)| reason.specificity() > current.specificity())
                        .unwrap_or(true);
                    if more_specific {
                        reported = Some((reason, authenticator_ref));
                    }
                }
                Outcome::Skip => {}
            }
        }

        match reported {
            Some((reason, authenticator_ref)) => AuthenticationResult::Failure {
                reason,
                authenticator: Some(authenticator_ref.clone()),
                challenge: None,
            },
            None => AuthenticationResult::Failure {
                reason: FailureReason::NoAuthenticatorMatched,
                authenticator: None,
                challenge: None,
            },
        }
    }

    fn notify(&self, authenticator: &AuthenticatorRef, identity: &Identity) {
        metrics::record_identified(authenticator.name());
        let event = IdentifiedEvent {
            authenticator,
            identity,
            service: self,
        };
        for listener in &self.listeners {
            listener.identified(&event);
        }
    }

    /// Store `identity` in every Session authenticator and issue remember-me
    /// cookies where the login asked for one
    pub async fn persist_identity(
        &self,
        request: &AuthRequest,
        identity: &Identity,
    ) -> Result<Vec<SetCookie>, SessionError> {
        let mut cookies = Vec::new();
        for (_, authenticator) in &self.authenticators {
            match authenticator {
                Authenticator::Session(session) => session.persist(request, identity).await?,
                Authenticator::Cookie(cookie) => cookies.extend(cookie.persist(request, identity)),
                _ => {}
            }
        }
        Ok(cookies)
    }

    /// Remove session data and expire remember-me cookies
    pub async fn clear_identity(&self, request: &AuthRequest) -> Result<Vec<SetCookie>, SessionError> {
        let mut cookies = Vec::new();
        for (_, authenticator) in &self.authenticators {
            match authenticator {
                Authenticator::Session(session) => session.clear(request).await?,
                Authenticator::Cookie(cookie) => cookies.push(cookie.clear()),
                _ => {}
            }
        }
        Ok(cookies)
    }

    /// Redirect URL for an unauthenticated request, when one is configured
    pub fn unauthenticated_redirect_url(&self, request: &AuthRequest) -> Option<String> {
        self.redirect
            .as_ref()
            .map(|redirect| redirect.unauthenticated_url(request))
    }

    /// Local post-login target carried by the request; `None` if absent or unsafe
    pub fn login_redirect(&self, request: &AuthRequest) -> Option<String> {
        self.redirect.as_ref()?.login_redirect(request)
    }

    pub fn authenticators(&self) -> impl Iterator<Item = (&AuthenticatorRef, &Authenticator)> {
        self.authenticators.iter().map(|(r, a)| (r, a))
    }

    pub fn authenticator(&self, name: &str) -> Option<&Authenticator> {
        self.authenticators
            .iter()
            .find(|(r, _)| r.name() == name)
            .map(|(_, a)| a)
    }

    pub fn identifiers(&self) -> &IdentifierCollection {
        &self.identifiers
    }

    pub fn remote_key_sets(&self) -> &[RemoteKeySet] {
        &self.remote_key_sets
    }

    /// Fetch every remote JWKS now
    pub async fn refresh_key_sets(&self) -> Result<usize, JwksError> {
        let mut total = 0;
        for key_set in &self.remote_key_sets {
            total += key_set.fetcher.refresh(&key_set.cache).await?;
        }
        Ok(total)
    }

    /// Start one background refresher per remote JWKS
    pub fn spawn_jwks_refresh(&self, interval: Duration) -> Vec<tokio::task::JoinHandle<()>> {
        self.remote_key_sets
            .iter()
            .map(|key_set| {
                key_set
                    .fetcher
                    .clone()
                    .spawn_refresh_task(Arc::clone(&key_set.cache), interval)
            })
            .collect()
    }
}
