//! Service construction

use super::{AuthenticationService, IdentityListener, RedirectConfig, RemoteKeySet};
use crate::auth::{Authenticator, AuthenticatorRef};
use crate::config::ConfigError;
use crate::identifier::{Identifier, IdentifierCollection};
use std::collections::HashSet;
use std::sync::Arc;

/// Collects chain members; everything is validated once, in [`build`](Self::build).
#[derive(Default)]
pub struct AuthenticationServiceBuilder {
    authenticators: Vec<(Option<String>, Authenticator)>,
    identifiers: Vec<(Option<String>, Identifier)>,
    listeners: Vec<Arc<dyn IdentityListener>>,
    redirect: Option<RedirectConfig>,
    remote_key_sets: Vec<RemoteKeySet>,
}

impl AuthenticationServiceBuilder {
    /// Append an authenticator under its kind's name (`Form`, `Jwt`, ...)
    #[must_use]
    pub fn authenticator(mut self, authenticator: Authenticator) -> Self {
        self.authenticators.push((None, authenticator));
        self
    }

    #[must_use]
    pub fn named_authenticator(mut self, name: &str, authenticator: Authenticator) -> Self {
        self.authenticators
            .push((Some(name.to_string()), authenticator));
        self
    }

    /// Append an identifier under its default name (`Password`, `Token`, ...)
    #[must_use]
    pub fn identifier(mut self, identifier: Identifier) -> Self {
        self.identifiers.push((None, identifier));
        self
    }

    #[must_use]
    pub fn named_identifier(mut self, name: &str, identifier: Identifier) -> Self {
        self.identifiers.push((Some(name.to_string()), identifier));
        self
    }

    #[must_use]
    pub fn listener(mut self, listener: Arc<dyn IdentityListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    #[must_use]
    pub fn unauthenticated_redirect(mut self, url: &str, query_param: Option<&str>) -> Self {
        self.redirect = Some(RedirectConfig {
            url: url.to_string(),
            query_param: query_param.map(str::to_string),
        });
        self
    }

    #[must_use]
    pub fn remote_key_set(mut self, key_set: RemoteKeySet) -> Self {
        self.remote_key_sets.push(key_set);
        self
    }

    pub fn build(self) -> Result<AuthenticationService, ConfigError> {
        if self.authenticators.is_empty() {
            return Err(ConfigError::ValidationError(
                "At least one authenticator must be configured".into(),
            ));
        }

        let mut names = HashSet::new();
        let mut authenticators = Vec::with_capacity(self.authenticators.len());
        for (name, authenticator) in self.authenticators {
            let kind = authenticator.kind();
            let name = name.unwrap_or_else(|| kind.as_str().to_string());
            if !names.insert(name.clone()) {
                return Err(ConfigError::ValidationError(format!(
                    "Duplicate authenticator name '{}'",
                    name
                )));
            }
            authenticators.push((AuthenticatorRef::new(kind, &name), authenticator));
        }

        let mut identifiers = IdentifierCollection::new();
        for (name, identifier) in self.identifiers {
            match name {
                Some(name) => identifiers.push_named(&name, identifier)?,
                None => identifiers.push(identifier)?,
            }
        }

        tracing::debug!(
            authenticators = authenticators.len(),
            identifiers = identifiers.len(),
            "Authentication service built"
        );

        Ok(AuthenticationService {
            authenticators,
            identifiers,
            listeners: self.listeners,
            redirect: self.redirect,
            remote_key_sets: self.remote_key_sets,
        })
    }
}
