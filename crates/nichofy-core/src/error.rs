//! Domain-level error types.

use thiserror::Error;

/// Domain errors - input that cannot become a valid post or query.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Missing owner identity")]
    Unauthorized,
}

/// Errors surfaced by the document store and passed through the repository unchanged.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepoError {
    #[error("Post not found: {id}")]
    NotFound { id: String },

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Store unavailable: {0}")]
    Connection(String),

    /// The store cannot execute the requested filter/sort/cursor combination.
    #[error("Query rejected: {0}")]
    Query(String),
}

impl RepoError {
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }
}
