//! Portcullis Library
//!
//! Pluggable request-authentication pipeline.
//!
//! # Features
//!
//! - **Ordered Chain**: Session, Form, Token, JWT, HTTP Basic/Digest and remember-me Cookie
//!   authenticators, first success wins
//! - **Identifier Chain**: Password, Token, JWT subject and custom identity resolution
//! - **JWT**: shared secret, public key or rotatable JWKS with a TTL cache
//! - **Remember Me**: salted, constant-time verified cookie tokens
//! - **Typed Results**: closed failure taxonomy, challenges for Basic/Digest
//!
//! # Example
//!
//! ```no_run
//! use portcullis::config::{Collaborators, Config};
//! use portcullis::identifier::MemoryResolver;
//! use portcullis::AuthRequest;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("portcullis.yaml")?;
//!     let service = config.build_service(
//!         Collaborators::new().with_resolver(Arc::new(MemoryResolver::default())),
//!     )?;
//!
//!     let request = AuthRequest::builder("GET", "/api/me")
//!         .header("Authorization", "Bearer eyJ...")
//!         .build();
//!     let result = service.authenticate(&request).await;
//!     println!("authenticated: {}", result.is_valid());
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod config;
pub mod cookie;
pub mod identifier;
pub mod identity;
pub mod jwt;
pub mod logging;
pub mod metrics;
pub mod request;
pub mod result;
pub mod service;
pub mod session;
pub mod url_checker;

// Re-export commonly used types
pub use config::Config;
pub use identity::{Credentials, Identity};
pub use request::AuthRequest;
pub use result::{AuthenticationResult, Challenge, FailureReason};
pub use service::AuthenticationService;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
