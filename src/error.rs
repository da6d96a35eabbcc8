//! Error types for the indexed write batch.

use crate::merge::MergeError;
use crate::store::StoreError;
use thiserror::Error;

/// The result type used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type for batch operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Serialized batch data is malformed.
    #[error("Data corruption: {0}")]
    Corruption(String),

    /// An invalid argument was provided.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The batch is in a state that does not permit the operation.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// A merge operator rejected an operand chain.
    #[error("Merge failure in operator '{operator}': {message}")]
    MergeFailure {
        /// Name of the operator that failed.
        operator: String,
        /// Reason reported by the operator.
        message: String,
    },

    /// The base store reported an error while reading.
    #[error("Store read failure: {0}")]
    StoreRead(#[source] StoreError),

    /// An internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Creates a new corruption error.
    pub fn corruption(msg: impl Into<String>) -> Self {
        Error::Corruption(msg.into())
    }

    /// Creates a new invalid argument error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    /// Creates a new invalid state error.
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Error::InvalidState(msg.into())
    }

    /// Creates a new internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Error::Internal(msg.into())
    }

    /// Wraps a merge operator failure, tagging it with the operator name.
    pub fn merge_failure(operator: &str, err: MergeError) -> Self {
        Error::MergeFailure { operator: operator.to_string(), message: err.to_string() }
    }
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        Error::StoreRead(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_error_display() {
        let err = Error::corruption("bad tag");
        assert_eq!(err.to_string(), "Data corruption: bad tag");

        let err = Error::invalid_state("no save point");
        assert_eq!(err.to_string(), "Invalid state: no save point");

        let err = Error::merge_failure("uint64add", MergeError::new("operand is 3 bytes"));
        assert!(err.to_string().contains("uint64add"));
        assert!(err.to_string().contains("operand is 3 bytes"));
    }

    #[test]
    fn test_store_error_keeps_source() {
        let err: Error = StoreError::new("disk on fire").into();
        assert!(matches!(err, Error::StoreRead(_)));
        assert_eq!(err.source().map(|s| s.to_string()), Some("disk on fire".to_string()));
    }
}
