//! Domain error types with caller-facing classification.
//!
//! Distinguishes validation failures, authorization rejections and state
//! preconditions so transports can surface them differently. A lost
//! compare-and-set race is never represented here: it is a silent no-op.

use thiserror::Error;

/// Broad class of an [`Error`], used to pick a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or malformed input
    Validation,
    /// Actor lacks the role, capability or relationship
    Authorization,
    /// Record is not in the state the action requires
    Precondition,
    /// Referenced record does not exist
    NotFound,
    /// Concurrent writer changed the record first
    Conflict,
    /// Persistence failure
    Storage,
}

/// Errors returned by engine operations.
#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Task is already finalized")]
    AlreadyFinalized,

    #[error("Task is not pending verification (current status: {0})")]
    NotPendingVerification(String),

    #[error("A rejection reason is required")]
    MissingReason,

    #[error("Report for {0} is already submitted")]
    ReportLocked(String),

    #[error("Report cutoff for {0} has passed")]
    CutoffPassed(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) | Error::MissingReason => ErrorKind::Validation,
            Error::Forbidden(_) => ErrorKind::Authorization,
            Error::InvalidTransition { .. }
            | Error::AlreadyFinalized
            | Error::NotPendingVerification(_)
            | Error::ReportLocked(_)
            | Error::CutoffPassed(_) => ErrorKind::Precondition,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Conflict(_) => ErrorKind::Conflict,
            Error::Storage(_) => ErrorKind::Storage,
        }
    }
}

impl From<String> for Error {
    fn from(message: String) -> Self {
        Error::Storage(message)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
