//! Identities and credentials
//!
//! [`Credentials`] is what an authenticator pulled out of a request;
//! [`Identity`] is what an identifier resolved those credentials to. Both are
//! immutable once built.

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

pub const CREDENTIAL_USERNAME: &str = "username";
pub const CREDENTIAL_PASSWORD: &str = "password";
pub const CREDENTIAL_TOKEN: &str = "token";
pub const CREDENTIAL_PAYLOAD: &str = "payload";

/// Field holding the unique id of an identity
pub const IDENTITY_ID_FIELD: &str = "id";

/// Read-only view over a resolved user record
///
/// Cloning is cheap; every clone shares the same record.
#[derive(Debug, Clone, PartialEq)]
pub struct Identity(Arc<Map<String, Value>>);

impl Identity {
    pub fn new(record: Map<String, Value>) -> Self {
        Self(Arc::new(record))
    }

    /// Build an identity from a JSON object. Returns `None` for any other JSON type.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self::new(map)),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Get a field as a string. Numbers and booleans are rendered, other types are `None`.
    pub fn get_str(&self, key: &str) -> Option<String> {
        value_as_string(self.0.get(key)?)
    }

    /// The identity's unique identifier (`id` field)
    pub fn id(&self) -> Option<&Value> {
        self.get(IDENTITY_ID_FIELD)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn to_value(&self) -> Value {
        Value::Object((*self.0).clone())
    }
}

impl Serialize for Identity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

/// Credential bundle extracted from a request
///
/// Shape depends on the source: `{username, password}`, `{token}` or
/// `{payload}`. The `Debug` output lists field names only.
#[derive(Clone, Default, PartialEq)]
pub struct Credentials(BTreeMap<String, Value>);

impl Credentials {
    pub fn new() -> Self {
        Self::default()
    }

    /// `{username, password}`
    pub fn password(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::new()
            .with(CREDENTIAL_USERNAME, Value::String(username.into()))
            .with(CREDENTIAL_PASSWORD, Value::String(password.into()))
    }

    /// `{username}` only, for lookups that verify the secret themselves
    pub fn username(username: impl Into<String>) -> Self {
        Self::new().with(CREDENTIAL_USERNAME, Value::String(username.into()))
    }

    /// `{token}`
    pub fn token(token: impl Into<String>) -> Self {
        Self::new().with(CREDENTIAL_TOKEN, Value::String(token.into()))
    }

    /// `{payload}` carrying decoded JWT claims
    pub fn payload(claims: Map<String, Value>) -> Self {
        Self::new().with(CREDENTIAL_PAYLOAD, Value::Object(claims))
    }

    #[must_use]
    pub fn with(mut self, key: &str, value: Value) -> Self {
        self.0.insert(key.to_string(), value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("fields", &self.0.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

pub(crate) fn value_as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
