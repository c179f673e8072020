//! Domain error types.
//!
//! These errors represent validation failures in the domain layer. They
//! are distinct from fetch/IO errors.

use super::InvalidSignature;

/// Domain-level errors for validation and data consistency.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DomainError {
    /// A train has neither an advertised nor an operational identifier
    #[error("train has no advertised or operational identifier")]
    MissingIdentifier,

    /// A location signature failed validation
    #[error(transparent)]
    InvalidSignature(#[from] InvalidSignature),
}
