//! Credential handling.
//!
//! Token issuance (service-principal flows, caching, refresh) is an external
//! collaborator. The pipeline consumes an opaque bearer token with an expiry
//! through the `CredentialProvider` seam and never embeds or persists secret
//! material itself.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("credential acquisition failed: {0}")]
    Acquisition(String),

    #[error("credential expired at {0}")]
    Expired(DateTime<Utc>),
}

/// An opaque bearer token with a bounded lifetime.
#[derive(Clone)]
pub struct AuthToken {
    secret: String,
    pub expires_at: DateTime<Utc>,
}

impl AuthToken {
    pub fn new(secret: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            secret: secret.into(),
            expires_at,
        }
    }

    /// The raw bearer value for the `Authorization` header.
    pub fn secret(&self) -> &str {
        &self.secret
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

// The secret must never leak through debug/log formatting.
impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthToken")
            .field("secret", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Supplies bearer tokens to the store client. Implementations own caching
/// and refresh; the pipeline only asks for a currently-valid token.
pub trait CredentialProvider {
    fn bearer_token(&self) -> Result<AuthToken, CredentialError>;
}

/// Provider wrapping a token handed in by the embedding caller (the common
/// case for function-style deployments, and for tests).
pub struct StaticTokenProvider {
    token: AuthToken,
}

impl StaticTokenProvider {
    pub fn new(token: AuthToken) -> Self {
        Self { token }
    }

    /// A token valid for one hour from now, for wrappers that freshly
    /// acquired a token right before constructing the pipeline.
    pub fn fresh(secret: impl Into<String>) -> Self {
        Self::new(AuthToken::new(secret, Utc::now() + Duration::hours(1)))
    }
}

impl CredentialProvider for StaticTokenProvider {
    fn bearer_token(&self) -> Result<AuthToken, CredentialError> {
        if self.token.is_expired(Utc::now()) {
            return Err(CredentialError::Expired(self.token.expires_at));
        }
        Ok(self.token.clone())
    }
}
