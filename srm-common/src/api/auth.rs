//! Bearer token issuing and verification
//!
//! # Architecture
//!
//! Credential checking sits behind the [`CredentialVerifier`] trait so the
//! HTTP layer never depends on a concrete scheme. The default implementation,
//! [`SharedSecretVerifier`], signs a small claims document with a shared
//! secret kept in the database `settings` table:
//!
//! ```text
//! token = base64url(claims JSON) "." hex(SHA-256(payload || secret))
//! ```
//!
//! The claims carry a subject and an expiry (Unix seconds). A shared secret of
//! `0` disables verification entirely (development mode).
//!
//! This module holds no HTTP framework code; the service wraps it in
//! middleware.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[cfg(feature = "sqlx")]
use sqlx::SqlitePool;

// ========================================
// Error Types
// ========================================

/// Authentication error types
#[derive(Debug, Clone, PartialEq)]
pub enum ApiAuthError {
    /// No credential supplied with the request
    MissingToken,

    /// Credential present but not in `<payload>.<signature>` form
    Malformed(String),

    /// Signature does not match the payload
    InvalidSignature,

    /// Token expiry is in the past
    Expired { exp: i64, now: i64 },

    /// Database error loading shared secret
    DatabaseError(String),

    /// Claims could not be encoded
    Internal(String),
}

impl std::fmt::Display for ApiAuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiAuthError::MissingToken => write!(f, "Token required"),
            ApiAuthError::Malformed(reason) => write!(f, "Malformed token: {}", reason),
            ApiAuthError::InvalidSignature => write!(f, "Invalid token"),
            ApiAuthError::Expired { exp, now } => {
                write!(f, "Token expired {}s ago", now - exp)
            }
            ApiAuthError::DatabaseError(err) => write!(f, "Database error: {}", err),
            ApiAuthError::Internal(err) => write!(f, "Internal error: {}", err),
        }
    }
}

impl std::error::Error for ApiAuthError {}

// ========================================
// Verifier Interface
// ========================================

/// Claims carried by a bearer token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject the token was issued for
    pub sub: String,
    /// Expiry as Unix epoch seconds
    pub exp: i64,
}

/// Pluggable credential scheme used by the HTTP layer
pub trait CredentialVerifier: Send + Sync {
    /// Issue a bearer token for `subject`
    fn issue(&self, subject: &str) -> Result<String, ApiAuthError>;

    /// Verify a bearer token and return its claims
    fn verify(&self, token: &str) -> Result<Claims, ApiAuthError>;

    /// When false, the HTTP layer skips verification entirely
    fn is_enabled(&self) -> bool {
        true
    }
}

// ========================================
// Shared Secret Scheme
// ========================================

/// Default verifier: SHA-256 signature over the claims with a shared secret
#[derive(Debug, Clone)]
pub struct SharedSecretVerifier {
    shared_secret: i64,
    ttl_secs: i64,
}

impl SharedSecretVerifier {
    pub fn new(shared_secret: i64, ttl_secs: u64) -> Self {
        Self {
            shared_secret,
            ttl_secs: i64::try_from(ttl_secs).unwrap_or(i64::MAX),
        }
    }

    fn sign(&self, payload: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(payload.as_bytes());
        hasher.update(self.shared_secret.to_string().as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Issue a token that expires at an explicit instant
    pub fn issue_with_expiry(&self, subject: &str, exp: i64) -> Result<String, ApiAuthError> {
        let claims = Claims {
            sub: subject.to_string(),
            exp,
        };
        let json =
            serde_json::to_vec(&claims).map_err(|e| ApiAuthError::Internal(e.to_string()))?;
        let payload = URL_SAFE_NO_PAD.encode(json);
        let signature = self.sign(&payload);
        Ok(format!("{}.{}", payload, signature))
    }
}

impl CredentialVerifier for SharedSecretVerifier {
    fn issue(&self, subject: &str) -> Result<String, ApiAuthError> {
        let exp = now_secs().saturating_add(self.ttl_secs);
        self.issue_with_expiry(subject, exp)
    }

    fn verify(&self, token: &str) -> Result<Claims, ApiAuthError> {
        let (payload, signature) = token
            .split_once('.')
            .ok_or_else(|| ApiAuthError::Malformed("missing signature".to_string()))?;

        if self.sign(payload) != signature {
            return Err(ApiAuthError::InvalidSignature);
        }

        let json = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|e| ApiAuthError::Malformed(e.to_string()))?;
        let claims: Claims =
            serde_json::from_slice(&json).map_err(|e| ApiAuthError::Malformed(e.to_string()))?;

        let now = now_secs();
        if claims.exp <= now {
            return Err(ApiAuthError::Expired {
                exp: claims.exp,
                now,
            });
        }

        Ok(claims)
    }

    fn is_enabled(&self) -> bool {
        self.shared_secret != 0
    }
}

fn now_secs() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Extract the token from an `Authorization` header value
///
/// Accepts `Bearer <token>` (scheme is case-insensitive).
pub fn parse_bearer(header_value: &str) -> Result<&str, ApiAuthError> {
    let (scheme, token) = header_value
        .trim()
        .split_once(' ')
        .ok_or_else(|| ApiAuthError::Malformed("expected 'Bearer <token>'".to_string()))?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(ApiAuthError::Malformed(format!(
            "unsupported scheme '{}'",
            scheme
        )));
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(ApiAuthError::MissingToken);
    }
    Ok(token)
}

// ========================================
// Shared Secret Management
// ========================================

/// Load shared secret from database settings
///
/// - Key: `api_shared_secret`
/// - Value: i64
/// - Special value 0: Disables auth checking
///
/// A missing key generates and stores a fresh secret.
#[cfg(feature = "sqlx")]
pub async fn load_shared_secret(db: &SqlitePool) -> Result<i64, ApiAuthError> {
    let result: Option<(String,)> =
        sqlx::query_as("SELECT value FROM settings WHERE key = 'api_shared_secret'")
            .fetch_optional(db)
            .await
            .map_err(|e| ApiAuthError::DatabaseError(e.to_string()))?;

    match result {
        Some((value,)) => value
            .parse::<i64>()
            .map_err(|e| ApiAuthError::DatabaseError(format!("Invalid i64: {}", e))),
        None => initialize_shared_secret(db).await,
    }
}

/// Generate a random non-zero secret and store it
#[cfg(feature = "sqlx")]
pub async fn initialize_shared_secret(db: &SqlitePool) -> Result<i64, ApiAuthError> {
    use rand::Rng;

    // ThreadRng is !Send; keep it out of scope across the await below
    let secret: i64 = {
        let mut rng = rand::thread_rng();
        loop {
            let val = rng.gen::<i64>();
            if val != 0 {
                break val;
            }
        }
    };

    sqlx::query("INSERT OR REPLACE INTO settings (key, value) VALUES ('api_shared_secret', ?)")
        .bind(secret.to_string())
        .execute(db)
        .await
        .map_err(|e| ApiAuthError::DatabaseError(e.to_string()))?;

    Ok(secret)
}

// ========================================
// Tests
// ========================================
