//! Identifier chain
//!
//! An identifier turns a credential bundle into an [`Identity`]. The service
//! owns one ordered [`IdentifierCollection`]; the first identifier to resolve
//! wins and the rest are not consulted.

pub mod callback;
pub mod hasher;
pub mod jwt_subject;
pub mod password;
pub mod resolver;
pub mod token;

pub use callback::{CallbackIdentifier, CustomIdentifier};
pub use hasher::PasswordHasher;
pub use jwt_subject::JwtSubjectIdentifier;
pub use password::{PasswordFields, PasswordIdentifier};
pub use resolver::{IdentityResolver, Lookup, MemoryResolver, ResolverError};
pub use token::{TokenHash, TokenIdentifier};

use crate::config::ConfigError;
use crate::identity::{Credentials, Identity};
use std::sync::Arc;

/// Identification strategies
#[derive(Debug)]
pub enum Identifier {
    Password(PasswordIdentifier),
    Token(TokenIdentifier),
    JwtSubject(JwtSubjectIdentifier),
    Callback(CallbackIdentifier),
}

impl Identifier {
    /// Name used when none is given explicitly
    pub fn default_name(&self) -> &'static str {
        match self {
            Identifier::Password(_) => "Password",
            Identifier::Token(_) => "Token",
            Identifier::JwtSubject(_) => "JwtSubject",
            Identifier::Callback(_) => "Callback",
        }
    }

    pub async fn identify(&self, credentials: &Credentials) -> Option<Identity> {
        match self {
            Identifier::Password(i) => i.identify(credentials).await,
            Identifier::Token(i) => i.identify(credentials).await,
            Identifier::JwtSubject(i) => i.identify(credentials).await,
            Identifier::Callback(i) => i.identify(credentials).await,
        }
    }
}

/// Identity plus the name of the identifier that produced it
#[derive(Debug, Clone)]
pub struct Resolved {
    pub identity: Identity,
    pub identifier: Arc<str>,
}

/// Ordered, uniquely named identifiers
#[derive(Debug, Default)]
pub struct IdentifierCollection {
    identifiers: Vec<(Arc<str>, Identifier)>,
}

impl IdentifierCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append under the identifier's default name
    pub fn push(&mut self, identifier: Identifier) -> Result<(), ConfigError> {
        let name = identifier.default_name();
        self.push_named(name, identifier)
    }

    /// Append under an explicit name; names must be unique.
    pub fn push_named(&mut self, name: &str, identifier: Identifier) -> Result<(), ConfigError> {
        if self.get(name).is_some() {
            return Err(ConfigError::ValidationError(format!(
                "Duplicate identifier name '{}'",
                name
            )));
        }
        self.identifiers.push((Arc::from(name), identifier));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Identifier> {
        self.identifiers
            .iter()
            .find(|(n, _)| n.as_ref() == name)
            .map(|(_, i)| i)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.identifiers.iter().map(|(n, _)| n.as_ref())
    }

    pub fn len(&self) -> usize {
        self.identifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identifiers.is_empty()
    }

    /// Try each identifier in order; the first hit wins.
    pub async fn identify(&self, credentials: &Credentials) -> Option<Resolved> {
        for (name, identifier) in &self.identifiers {
            if let Some(identity) = identifier.identify(credentials).await {
                tracing::debug!(identifier = %name, "Credentials identified");
                return Some(Resolved {
                    identity,
                    identifier: Arc::clone(name),
                });
            }
        }
        None
    }
}
