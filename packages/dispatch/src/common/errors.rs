use std::time::Duration;
use thiserror::Error;

use super::{DispatchId, DonorId, RequestId};

/// Failures of the supporting store (geo index, registry, ledger, records).
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store operation '{operation}' timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

impl StoreError {
    /// Whether retrying the whole round may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Unavailable(_) => true,
            Self::Database(e) => match e {
                sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::WorkerCrashed => true,
                sqlx::Error::Database(db) => db
                    .code()
                    .is_some_and(|code| is_transient_sqlstate(&code)),
                _ => false,
            },
            Self::Corrupt(_) => false,
        }
    }
}

/// Serialization failures, deadlocks, connection exceptions (class 08) and
/// server shutdown or overload. Constraint violations are permanent.
fn is_transient_sqlstate(code: &str) -> bool {
    code.starts_with("08") || matches!(code, "40001" | "40P01" | "53300" | "57P01" | "57P03")
}

/// Errors surfaced to callers of the dispatch actions.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Blood request not found: {0}")]
    RequestNotFound(RequestId),

    #[error("Dispatch round not found: {0}")]
    DispatchNotFound(DispatchId),

    #[error("Blood donor not found: {0}")]
    DonorNotFound(DonorId),

    #[error("Blood request {0} is inactive")]
    Conflict(RequestId),

    #[error("Dispatch round {0} already exists")]
    DuplicateDispatch(DispatchId),

    #[error("Invalid position: longitude={longitude}, latitude={latitude}")]
    InvalidPosition { longitude: f64, latitude: f64 },

    #[error("Invalid radius: {0} meters")]
    InvalidRadius(f64),

    #[error("Store failure after {attempts} attempt(s): {source}")]
    Transient {
        attempts: u32,
        #[source]
        source: StoreError,
    },

    #[error(transparent)]
    Store(StoreError),
}

impl DispatchError {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transient { .. } => true,
            Self::Store(e) => e.is_transient(),
            _ => false,
        }
    }
}

impl From<StoreError> for DispatchError {
    fn from(error: StoreError) -> Self {
        if error.is_transient() {
            Self::Transient {
                attempts: 1,
                source: error,
            }
        } else {
            Self::Store(error)
        }
    }
}
