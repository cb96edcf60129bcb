//! Username/password identifier

use super::hasher::PasswordHasher;
use super::resolver::{find_identity, IdentityResolver, Lookup};
use crate::identity::{Credentials, Identity, CREDENTIAL_PASSWORD, CREDENTIAL_USERNAME};
use crate::url_checker::LoginUrls;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Physical record fields used by [`PasswordIdentifier`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordFields {
    /// Record fields the username may match (any of them)
    #[serde(default = "default_username_fields", with = "one_or_many")]
    pub username: Vec<String>,
    #[serde(default = "default_password_field")]
    pub password: String,
}

impl Default for PasswordFields {
    fn default() -> Self {
        Self {
            username: default_username_fields(),
            password: default_password_field(),
        }
    }
}

fn default_username_fields() -> Vec<String> {
    vec![CREDENTIAL_USERNAME.to_string()]
}

fn default_password_field() -> String {
    CREDENTIAL_PASSWORD.to_string()
}

mod one_or_many {
    use super::LoginUrls;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &[String], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
        Ok(LoginUrls::deserialize(deserializer)?.into_vec())
    }
}

/// Resolves `{username[, password]}` credentials
///
/// The password is checked only when the credentials carry one; Cookie and
/// Digest authenticators look users up by username and verify secrets themselves.
pub struct PasswordIdentifier {
    fields: PasswordFields,
    resolver: Arc<dyn IdentityResolver>,
    hasher: Arc<dyn PasswordHasher>,
}

impl fmt::Debug for PasswordIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordIdentifier")
            .field("fields", &self.fields)
            .finish_non_exhaustive()
    }
}

impl PasswordIdentifier {
    pub fn new(resolver: Arc<dyn IdentityResolver>, hasher: Arc<dyn PasswordHasher>) -> Self {
        Self {
            fields: PasswordFields::default(),
            resolver,
            hasher,
        }
    }

    #[must_use]
    pub fn with_fields(mut self, fields: PasswordFields) -> Self {
        self.fields = fields;
        self
    }

    pub fn fields(&self) -> &PasswordFields {
        &self.fields
    }

    pub async fn identify(&self, credentials: &Credentials) -> Option<Identity> {
        let username = credentials.get_str(CREDENTIAL_USERNAME)?;
        let found = find_identity(
            self.resolver.as_ref(),
            &Lookup::new(&self.fields.username, username),
        )
        .await;

        let Some(password) = credentials.get(CREDENTIAL_PASSWORD) else {
            return found;
        };
        let password = password.as_str()?;

        let Some(identity) = found else {
            // Hash anyway so a missing user costs the same as a wrong password.
            self.hasher.verify(password, "");
            return None;
        };

        let stored = identity.get_str(&self.fields.password)?;
        if self.hasher.verify(password, &stored) {
            Some(identity)
        } else {
            tracing::debug!("Password mismatch");
            None
        }
    }
}
