//! Document store access.
//!
//! The external list and file store are reached through the `ListStore` and
//! `FileStore` traits in [`types`]; [`client`] implements them over
//! Graph-shaped HTTP endpoints and [`mock`] provides an in-memory double for
//! tests.

pub mod client;
pub mod mock;
pub mod types;

use thiserror::Error;

use crate::auth::CredentialError;

/// Errors surfaced by store implementations.
///
/// The class of an error decides its handling: connection and credential
/// failures abort the whole run, while 403/404 and unexpected API responses
/// stay contained at strategy or item level.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Transport-level failure (connect, timeout). Run-fatal.
    #[error("connection error: {0}")]
    Connection(String),

    /// 401-class response: the credential has expired. Run-fatal; retrying
    /// other strategies with the same token cannot succeed.
    #[error("authentication rejected (401): {0}")]
    Unauthorized(String),

    /// 403-class response: forbidden with the current scope; do not retry.
    #[error("access forbidden (403): {0}")]
    Forbidden(String),

    /// 404-class response: the addressed item does not exist.
    #[error("not found (404): {0}")]
    NotFound(String),

    /// Any other non-success API response.
    #[error("unexpected API response ({status}): {body}")]
    Api { status: u16, body: String },

    /// The response arrived but could not be decoded.
    #[error("failed to parse store response: {0}")]
    ResponseParsing(String),

    #[error(transparent)]
    Credential(#[from] CredentialError),
}

impl StoreError {
    /// Whether this error must abort the run rather than the current item.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            StoreError::Connection(_) | StoreError::Unauthorized(_) | StoreError::Credential(_)
        )
    }

    /// Whether a retry of the same call can plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Connection(_) => true,
            StoreError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
