//! Error types for lambda-deploy-api

use thiserror::Error;

/// Errors surfaced by a [`crate::LambdaApi`] implementation.
///
/// Implementations classify provider errors into exactly two buckets: the
/// addressed resource does not exist, or anything else went wrong.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The named function, layer or alias does not exist
    #[error("resource not found: {resource}: {message}")]
    NotFound { resource: String, message: String },

    /// Any other service or transport failure
    #[error("remote call {operation} failed: {message}")]
    Remote { operation: String, message: String },
}

impl ApiError {
    pub fn not_found(resource: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError::NotFound {
            resource: resource.into(),
            message: message.into(),
        }
    }

    pub fn remote(operation: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError::Remote {
            operation: operation.into(),
            message: message.into(),
        }
    }
}
