//! Result and error types for the core library

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Core library error type
///
/// Variants carry a human readable message. Business failures
/// (`Validation`, `InsufficientFunds`, `NotFound`) are the caller's concern;
/// `Persistence` and `Commit` come from the storage engine; the remaining
/// variants flag wiring mistakes.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Commit error: {0}")]
    Commit(String),

    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    #[error("Handler already registered for event '{0}'")]
    DuplicateHandler(String),

    #[error("Repository not registered: {0}")]
    NotRegistered(String),

    #[error("Event dispatch failed: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create an insufficient funds error
    pub fn insufficient_funds(msg: impl Into<String>) -> Self {
        Self::InsufficientFunds(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a persistence error
    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    /// Create a commit error
    pub fn commit(msg: impl Into<String>) -> Self {
        Self::Commit(msg.into())
    }

    /// Create a cancellation error
    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::Cancelled(msg.into())
    }

    /// HTTP status an outer web layer should answer with for this error
    pub fn http_status(&self) -> u16 {
        match self {
            Error::Validation(_) | Error::Json(_) => 400,
            Error::NotFound(_) => 404,
            Error::InsufficientFunds(_) => 422,
            Error::Cancelled(_) => 503,
            Error::Persistence(_)
            | Error::Commit(_)
            | Error::DuplicateHandler(_)
            | Error::NotRegistered(_)
            | Error::Dispatch(_)
            | Error::Config(_)
            | Error::Io(_) => 500,
        }
    }

    /// True for errors caused by the request itself rather than the system
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.http_status())
    }
}

impl From<duckdb::Error> for Error {
    fn from(err: duckdb::Error) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Core library result type
pub type Result<T> = std::result::Result<T, Error>;

/// One handler that failed while an event was being dispatched
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerFailure {
    pub handler: String,
    pub message: String,
    /// True when the handler panicked instead of returning an error
    pub panicked: bool,
}

/// Aggregated handler failures for a single dispatched event
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{} handler(s) failed for '{event}'", failures.len())]
pub struct DispatchError {
    pub event: String,
    pub failures: Vec<HandlerFailure>,
}

/// Operation result with optional context (for JSON output)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationResult<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub context: Option<HashMap<String, serde_json::Value>>,
}

impl<T> OperationResult<T> {
    /// Create a successful result
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            context: None,
        }
    }

    /// Create a failed result
    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            context: None,
        }
    }

    /// Create a failed result with context
    pub fn fail_with_context(
        error: impl Into<String>,
        context: HashMap<String, serde_json::Value>,
    ) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            context: Some(context),
        }
    }
}

impl<T> OperationResult<T> {
    /// Failed result for a ledger error, with its HTTP status as context
    pub fn from_error(error: &Error) -> Self {
        let mut context = HashMap::new();
        context.insert("status".to_string(), serde_json::json!(error.http_status()));
        Self::fail_with_context(error.to_string(), context)
    }
}

impl<T> From<Result<T>> for OperationResult<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self::from_error(&e),
        }
    }
}
