//! User lookup collaborator
//!
//! Identifiers never read user storage themselves; they hand a [`Lookup`] to an
//! [`IdentityResolver`]. Retries and connection handling belong to the resolver.

use crate::identity::Identity;
use async_trait::async_trait;
use thiserror::Error;

/// Resolver failure, reported by the collaborator
#[derive(Error, Debug)]
#[error("Identity lookup failed: {0}")]
pub struct ResolverError(pub String);

/// Find the record where any of `fields` equals `value`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lookup {
    pub fields: Vec<String>,
    pub value: String,
}

impl Lookup {
    pub fn new(fields: &[String], value: impl Into<String>) -> Self {
        Self {
            fields: fields.to_vec(),
            value: value.into(),
        }
    }
}

/// Identity lookup collaborator
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn find(&self, lookup: &Lookup) -> Result<Option<Identity>, ResolverError>;
}

/// Run a lookup, logging and swallowing collaborator errors
pub(crate) async fn find_identity(
    resolver: &dyn IdentityResolver,
    lookup: &Lookup,
) -> Option<Identity> {
    match resolver.find(lookup).await {
        Ok(found) => found,
        Err(e) => {
            tracing::warn!(error = %e, fields = ?lookup.fields, "Identity resolver failed");
            None
        }
    }
}

/// In-memory user table
///
/// Field values are compared as strings, so `{"id": 42}` is found by `"42"`.
#[derive(Debug, Clone, Default)]
pub struct MemoryResolver {
    records: Vec<Identity>,
}

impl MemoryResolver {
    pub fn new(records: Vec<Identity>) -> Self {
        Self { records }
    }

    /// Build from JSON objects; non-object values are skipped.
    pub fn from_values(values: impl IntoIterator<Item = serde_json::Value>) -> Self {
        Self::new(values.into_iter().filter_map(Identity::from_value).collect())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl IdentityResolver for MemoryResolver {
    async fn find(&self, lookup: &Lookup) -> Result<Option<Identity>, ResolverError> {
        Ok(self
            .records
            .iter()
            .find(|record| {
                lookup
                    .fields
                    .iter()
                    .any(|field| record.get_str(field).as_deref() == Some(lookup.value.as_str()))
            })
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_memory_resolver_any_field() {
        let resolver = MemoryResolver::from_values([
            json!({"id": 1, "username": "mariano", "email": "m@example.com"}),
            json!({"id": 2, "username": "larry", "email": "l@example.com"}),
        ]);
        let fields = vec!["username".to_string(), "email".to_string()];

        let found = resolver
            .find(&Lookup::new(&fields, "l@example.com"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id(), Some(&json!(2)));

        let by_id = resolver
            .find(&Lookup::new(&["id".to_string()], "1"))
            .await
            .unwrap();
        assert!(by_id.is_some());

        let missing = resolver.find(&Lookup::new(&fields, "nobody")).await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_find_identity_swallows_errors() {
        let mut resolver = MockIdentityResolver::new();
        resolver
            .expect_find()
            .returning(|_| Err(ResolverError("connection refused".into())));

        let found = find_identity(&resolver, &Lookup::new(&["id".to_string()], "1")).await;
        assert!(found.is_none());
    }
}
