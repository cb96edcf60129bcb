//! Resolves a verified JWT payload's subject to a full identity record

use super::resolver::{find_identity, IdentityResolver, Lookup};
use crate::identity::{value_as_string, Credentials, Identity, CREDENTIAL_PAYLOAD};
use std::fmt;
use std::sync::Arc;

pub struct JwtSubjectIdentifier {
    token_field: String,
    data_field: String,
    resolver: Arc<dyn IdentityResolver>,
}

impl fmt::Debug for JwtSubjectIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtSubjectIdentifier")
            .field("token_field", &self.token_field)
            .field("data_field", &self.data_field)
            .finish_non_exhaustive()
    }
}

impl JwtSubjectIdentifier {
    /// Looks up `id = payload.sub` by default
    pub fn new(resolver: Arc<dyn IdentityResolver>) -> Self {
        Self {
            token_field: "id".to_string(),
            data_field: "sub".to_string(),
            resolver,
        }
    }

    #[must_use]
    pub fn with_token_field(mut self, field: &str) -> Self {
        self.token_field = field.to_string();
        self
    }

    #[must_use]
    pub fn with_data_field(mut self, field: &str) -> Self {
        self.data_field = field.to_string();
        self
    }

    pub async fn identify(&self, credentials: &Credentials) -> Option<Identity> {
        let subject = credentials
            .get(CREDENTIAL_PAYLOAD)?
            .as_object()?
            .get(&self.data_field)
            .and_then(value_as_string)?;
        find_identity(
            self.resolver.as_ref(),
            &Lookup::new(std::slice::from_ref(&self.token_field), subject),
        )
        .await
    }
}
