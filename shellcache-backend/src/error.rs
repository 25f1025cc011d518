//! Error types for store operations.

use smol_str::SmolStr;
use thiserror::Error;

/// Error type for store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The namespace cannot hold another entry.
    #[error("storage quota exceeded for namespace {namespace}")]
    QuotaExceeded {
        /// Namespace the write targeted.
        namespace: SmolStr,
    },

    /// Internal store error, state or I/O failure.
    #[error(transparent)]
    Internal(Box<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    /// Wraps any error as [`StoreError::Internal`].
    pub fn internal<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        StoreError::Internal(Box::new(error))
    }

    /// Builds an [`StoreError::Internal`] from a message.
    pub fn message(message: impl Into<String>) -> Self {
        StoreError::Internal(Box::new(std::io::Error::other(message.into())))
    }
}
