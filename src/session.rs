//! Server-side session storage collaborator
//!
//! The Session authenticator reads identity data that an earlier login stored;
//! session id management belongs to the store.

use crate::identity::Identity;
use crate::request::AuthRequest;
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashMap;
use thiserror::Error;

/// Session errors
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Request has no session")]
    NoSession,

    #[error("Session store error: {0}")]
    Store(String),
}

/// Session storage scoped to the session the request belongs to
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn read(&self, request: &AuthRequest, key: &str) -> Option<Identity>;

    async fn write(
        &self,
        request: &AuthRequest,
        key: &str,
        identity: &Identity,
    ) -> Result<(), SessionError>;

    async fn delete(&self, request: &AuthRequest, key: &str) -> Result<(), SessionError>;
}

/// Sessions kept in process memory, keyed by a session-id cookie
#[derive(Debug)]
pub struct MemorySessionStore {
    cookie_name: String,
    sessions: DashMap<String, HashMap<String, Identity>>,
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new("sessionid")
    }
}

impl MemorySessionStore {
    pub fn new(cookie_name: &str) -> Self {
        Self {
            cookie_name: cookie_name.to_string(),
            sessions: DashMap::new(),
        }
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// Start an empty session and return its id
    pub fn create_session(&self) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        self.sessions.insert(id.clone(), HashMap::new());
        id
    }

    pub fn destroy_session(&self, id: &str) {
        self.sessions.remove(id);
    }

    fn session_id<'a>(&self, request: &'a AuthRequest) -> Option<&'a str> {
        request.cookie(&self.cookie_name)
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn read(&self, request: &AuthRequest, key: &str) -> Option<Identity> {
        let id = self.session_id(request)?;
        self.sessions.get(id)?.get(key).cloned()
    }

    async fn write(
        &self,
        request: &AuthRequest,
        key: &str,
        identity: &Identity,
    ) -> Result<(), SessionError> {
        let id = self.session_id(request).ok_or(SessionError::NoSession)?;
        let mut session = self.sessions.get_mut(id).ok_or(SessionError::NoSession)?;
        session.insert(key.to_string(), identity.clone());
        Ok(())
    }

    async fn delete(&self, request: &AuthRequest, key: &str) -> Result<(), SessionError> {
        let id = self.session_id(request).ok_or(SessionError::NoSession)?;
        if let Some(mut session) = self.sessions.get_mut(id) {
            session.remove(key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_write_read_delete() {
        let store = MemorySessionStore::default();
        let sid = store.create_session();
        let request = AuthRequest::builder("GET", "/")
            .cookie("sessionid", &sid)
            .build();
        let identity = Identity::from_value(json!({"id": 1})).unwrap();

        store.write(&request, "Auth", &identity).await.unwrap();
        assert_eq!(store.read(&request, "Auth").await, Some(identity));

        store.delete(&request, "Auth").await.unwrap();
        assert!(store.read(&request, "Auth").await.is_none());
    }

    #[tokio::test]
    async fn test_unknown_session() {
        let store = MemorySessionStore::default();
        let request = AuthRequest::builder("GET", "/")
            .cookie("sessionid", "forged")
            .build();
        let identity = Identity::from_value(json!({"id": 1})).unwrap();

        assert!(store.read(&request, "Auth").await.is_none());
        assert!(matches!(
            store.write(&request, "Auth", &identity).await,
            Err(SessionError::NoSession)
        ));
    }
}
