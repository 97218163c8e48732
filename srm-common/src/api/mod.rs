//! API module for shared HTTP API functionality
//!
//! Contains ONLY framework-free code (pure functions, sqlx queries, shared
//! types). The service wraps these with its own axum middleware.

pub mod auth;

pub use auth::{parse_bearer, ApiAuthError, Claims, CredentialVerifier, SharedSecretVerifier};

#[cfg(feature = "sqlx")]
pub use auth::{initialize_shared_secret, load_shared_secret};
