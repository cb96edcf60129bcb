//! Session authentication

use super::{FieldMap, Outcome};
use crate::identifier::IdentifierCollection;
use crate::identity::{Credentials, Identity};
use crate::request::AuthRequest;
use crate::result::FailureReason;
use crate::session::{SessionError, SessionStore};
use std::fmt;
use std::sync::Arc;

/// Restores the identity an earlier login stored in the session
///
/// With `identify` set, the stored record is not trusted: its mapped fields are
/// run through the identifier chain again and the fresh identity is returned.
pub struct SessionAuthenticator {
    store: Arc<dyn SessionStore>,
    session_key: String,
    identify: bool,
    fields: FieldMap,
}

impl fmt::Debug for SessionAuthenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionAuthenticator")
            .field("session_key", &self.session_key)
            .field("identify", &self.identify)
            .field("fields", &self.fields)
            .finish_non_exhaustive()
    }
}

impl SessionAuthenticator {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self {
            store,
            session_key: "Auth".to_string(),
            identify: false,
            fields: FieldMap::username_only(),
        }
    }

    #[must_use]
    pub fn with_session_key(mut self, key: &str) -> Self {
        self.session_key = key.to_string();
        self
    }

    #[must_use]
    pub fn with_identify(mut self, identify: bool) -> Self {
        self.identify = identify;
        self
    }

    #[must_use]
    pub fn with_fields(mut self, fields: FieldMap) -> Self {
        self.fields = fields;
        self
    }

    pub fn session_key(&self) -> &str {
        &self.session_key
    }

    pub async fn authenticate(
        &self,
        request: &AuthRequest,
        identifiers: &IdentifierCollection,
    ) -> Outcome {
        let Some(stored) = self.store.read(request, &self.session_key).await else {
            return Outcome::Skip;
        };

        if !self.identify {
            return Outcome::trusted(stored);
        }

        let mut credentials = Credentials::new();
        for (logical, physical) in self.fields.iter() {
            let Some(value) = stored.get(physical) else {
                return Outcome::Failure(FailureReason::CredentialsInvalid);
            };
            credentials = credentials.with(logical, value.clone());
        }

        match identifiers.identify(&credentials).await {
            Some(resolved) => Outcome::identified(resolved),
            None => Outcome::Failure(FailureReason::CredentialsInvalid),
        }
    }

    /// Store `identity` for the request's session
    pub async fn persist(&self, request: &AuthRequest, identity: &Identity) -> Result<(), SessionError> {
        self.store.write(request, &self.session_key, identity).await
    }

    pub async fn clear(&self, request: &AuthRequest) -> Result<(), SessionError> {
        self.store.delete(request, &self.session_key).await
    }
}
