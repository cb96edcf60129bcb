//! Opaque token identifier

use super::resolver::{find_identity, IdentityResolver, Lookup};
use crate::identity::{Credentials, Identity, CREDENTIAL_TOKEN};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;

/// Digest applied to a presented token before lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenHash {
    Sha256,
}

/// Resolves `{token}` credentials by matching a record field
pub struct TokenIdentifier {
    token_field: String,
    data_field: String,
    hash: Option<TokenHash>,
    resolver: Arc<dyn IdentityResolver>,
}

impl fmt::Debug for TokenIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenIdentifier")
            .field("token_field", &self.token_field)
            .field("data_field", &self.data_field)
            .field("hash", &self.hash)
            .finish_non_exhaustive()
    }
}

impl TokenIdentifier {
    pub fn new(resolver: Arc<dyn IdentityResolver>) -> Self {
        Self {
            token_field: CREDENTIAL_TOKEN.to_string(),
            data_field: CREDENTIAL_TOKEN.to_string(),
            hash: None,
            resolver,
        }
    }

    /// Record field holding the (possibly hashed) token
    #[must_use]
    pub fn with_token_field(mut self, field: &str) -> Self {
        self.token_field = field.to_string();
        self
    }

    /// Credential key carrying the presented token
    #[must_use]
    pub fn with_data_field(mut self, field: &str) -> Self {
        self.data_field = field.to_string();
        self
    }

    #[must_use]
    pub fn with_hash(mut self, hash: Option<TokenHash>) -> Self {
        self.hash = hash;
        self
    }

    pub async fn identify(&self, credentials: &Credentials) -> Option<Identity> {
        let token = credentials.get_str(&self.data_field)?;
        let value = match self.hash {
            Some(TokenHash::Sha256) => hex::encode(Sha256::digest(token.as_bytes())),
            None => token.to_string(),
        };
        find_identity(
            self.resolver.as_ref(),
            &Lookup::new(std::slice::from_ref(&self.token_field), value),
        )
        .await
    }
}
