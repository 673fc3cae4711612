//! Ledger Store Errors

use crate::domain::DomainError;

pub type StoreResult<T> = Result<T, StoreError>;

/// SQLSTATE serialization_failure
const SERIALIZATION_FAILURE: &str = "40001";

/// SQLSTATE deadlock_detected
const DEADLOCK_DETECTED: &str = "40P01";

/// Errors that can occur in the ledger store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Ledger rule rejected the operation; nothing was written
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Stored row could not be mapped back into the domain
    #[error("Corrupt ledger data: {0}")]
    Corrupt(String),

    /// Transient conflicts persisted through every attempt
    #[error("Maximum retries exceeded for ledger transaction")]
    MaxRetriesExceeded,
}

impl StoreError {
    /// Serialization failures and deadlocks abort the whole transaction, so
    /// running it again from the start is safe.
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::Database(sqlx::Error::Database(db)) => matches!(
                db.code().as_deref(),
                Some(SERIALIZATION_FAILURE) | Some(DEADLOCK_DETECTED)
            ),
            StoreError::Database(sqlx::Error::PoolTimedOut) => true,
            _ => false,
        }
    }

    pub fn domain(&self) -> Option<&DomainError> {
        match self {
            StoreError::Domain(err) => Some(err),
            _ => None,
        }
    }
}
