//! Task and ensurer errors.

use std::fmt;
use thiserror::Error;

use crate::address::AddressError;
use crate::nsx::{ClientError, StatusCode};

/// Remote operation kind, used to label status errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Listing,
    Reading,
    Creating,
    Updating,
    Deleting,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operation::Listing => "listing",
            Operation::Reading => "reading",
            Operation::Creating => "creating",
            Operation::Updating => "updating",
            Operation::Deleting => "deleting",
        };
        f.write_str(s)
    }
}

/// Errors of a single task.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("listing failed: {0}")]
    Listing(#[source] ClientError),

    #[error("reading failed: {0}")]
    Reading(#[source] ClientError),

    #[error("creating failed: {0}")]
    Creating(#[source] ClientError),

    #[error("updating failed: {0}")]
    Updating(#[source] ClientError),

    #[error("deleting failed: {0}")]
    Deleting(#[source] ClientError),

    #[error("{operation} failed with unexpected HTTP status code {status}")]
    UnexpectedStatus {
        operation: Operation,
        status: StatusCode,
    },

    #[error("{operation} response carries no object id")]
    MissingObjectId { operation: Operation },

    #[error("{what}: {source}")]
    AddressComputation {
        what: &'static str,
        #[source]
        source: AddressError,
    },

    #[error("not found: {0}")]
    LookupNotFound(String),

    #[error("{0} is not known yet")]
    MissingDependency(&'static str),
}

impl TaskError {
    /// True if a later pass with the same spec may succeed.
    ///
    /// Remote failures are retryable. Address, lookup and ordering failures need
    /// a changed spec or externally provisioned objects first.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            TaskError::AddressComputation { .. }
                | TaskError::LookupNotFound(_)
                | TaskError::MissingDependency(_)
        )
    }
}

/// Error of a pass: the failing task's label and its error.
#[derive(Debug, Error)]
#[error("{task} failed: {source}")]
pub struct EnsureError {
    pub task: &'static str,
    #[source]
    pub source: TaskError,
}

impl EnsureError {
    pub fn is_retryable(&self) -> bool {
        self.source.is_retryable()
    }
}

/// Fail with `UnexpectedStatus` unless `status` is the expected one.
pub(crate) fn expect_status(
    operation: Operation,
    status: StatusCode,
    expected: StatusCode,
) -> Result<(), TaskError> {
    if status != expected {
        return Err(TaskError::UnexpectedStatus { operation, status });
    }
    Ok(())
}
