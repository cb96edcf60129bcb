//! Application-supplied identifiers

use crate::identity::{Credentials, Identity};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Custom identification strategy
#[async_trait]
pub trait CustomIdentifier: Send + Sync {
    async fn identify(&self, credentials: &Credentials) -> Option<Identity>;
}

struct FnIdentifier<F>(F);

#[async_trait]
impl<F> CustomIdentifier for FnIdentifier<F>
where
    F: Fn(&Credentials) -> Option<Identity> + Send + Sync,
{
    async fn identify(&self, credentials: &Credentials) -> Option<Identity> {
        (self.0)(credentials)
    }
}

#[derive(Clone)]
pub struct CallbackIdentifier {
    inner: Arc<dyn CustomIdentifier>,
}

impl fmt::Debug for CallbackIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackIdentifier").finish_non_exhaustive()
    }
}

impl CallbackIdentifier {
    pub fn new(inner: Arc<dyn CustomIdentifier>) -> Self {
        Self { inner }
    }

    /// Wrap a synchronous closure
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&Credentials) -> Option<Identity> + Send + Sync + 'static,
    {
        Self::new(Arc::new(FnIdentifier(f)))
    }

    pub async fn identify(&self, credentials: &Credentials) -> Option<Identity> {
        self.inner.identify(credentials).await
    }
}
