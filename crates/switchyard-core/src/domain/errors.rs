//! Errors - エラー型と分類
//!
//! 二層構造:
//! - **ApiError**: バックエンド API クライアント（REST / in-memory）が返す低レベルのエラー
//! - **DispatchError**: Provider / Dispatcher が呼び出し側へ返すエラー。
//!   service・operation・resource の文脈を必ず保持する

use std::fmt;

use thiserror::Error;

use super::job::JobConfig;
use super::tier::AssignedService;

/// Operational classification of a [`DispatchError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing/invalid settings. Fatal, never retried.
    Configuration,
    /// Backend rejected job creation.
    Submission,
    /// Resource path unknown to the backend.
    NotFound,
    /// No provider for the requested tier in this deployment.
    NotRegistered,
    /// Network / timeout / overload. Eligible for caller-level retry.
    Transient,
    /// Any other permanent backend failure.
    Backend,
}

/// The provider operation an error happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// `step` names the backend call inside a (possibly multi-step) submission.
    Submit { step: &'static str },
    Status,
    Cancel,
    List,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Submit { step } => write!(f, "submit[{step}]"),
            Operation::Status => f.write_str("status"),
            Operation::Cancel => f.write_str("cancel"),
            Operation::List => f.write_str("list"),
        }
    }
}

/// Errors reported by a backend API client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("rejected (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("transient failure: {0}")]
    Transient(String),

    #[error("undecodable response: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound(_))
    }
}

fn or_none(resource: &Option<String>) -> &str {
    resource.as_deref().unwrap_or("none")
}

/// Errors surfaced by providers and the dispatcher.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("{service} {operation} rejected (resource: {}): {source}", or_none(.resource))]
    Submission {
        service: &'static str,
        operation: Operation,
        resource: Option<String>,
        #[source]
        source: ApiError,
    },

    /// Refused before any backend call.
    #[error("{service} submit refused: {field} must not be empty")]
    InvalidJob {
        service: &'static str,
        field: &'static str,
    },

    #[error("{service} {operation}: resource not found: {resource}")]
    NotFound {
        service: &'static str,
        operation: Operation,
        resource: String,
        #[source]
        source: ApiError,
    },

    #[error("no provider registered for tier {0}: this tier is unsupported in this deployment")]
    NotRegistered(AssignedService),

    #[error("{service} {operation} failed transiently (resource: {}): {source}", or_none(.resource))]
    BackendTransient {
        service: &'static str,
        operation: Operation,
        resource: Option<String>,
        #[source]
        source: ApiError,
    },

    #[error("{service} {operation} failed (resource: {}): {source}", or_none(.resource))]
    Backend {
        service: &'static str,
        operation: Operation,
        resource: Option<String>,
        #[source]
        source: ApiError,
    },
}

impl DispatchError {
    /// Refuses a job whose required fields are blank.
    pub fn check_job(service: &'static str, config: &JobConfig) -> Result<(), Self> {
        match config.blank_field() {
            Some(field) => Err(DispatchError::InvalidJob { service, field }),
            None => Ok(()),
        }
    }

    /// Lifts a backend client error into the caller-facing taxonomy.
    ///
    /// During submission a permanent rejection is a `Submission` error; for
    /// every other operation it is `Backend`.
    pub fn from_api(
        service: &'static str,
        operation: Operation,
        resource: Option<&str>,
        err: ApiError,
    ) -> Self {
        let resource = resource.map(str::to_string);
        match err {
            ApiError::NotFound(path) => DispatchError::NotFound {
                service,
                operation,
                resource: resource.unwrap_or_else(|| path.clone()),
                source: ApiError::NotFound(path),
            },
            ApiError::Transient(_) => DispatchError::BackendTransient {
                service,
                operation,
                resource,
                source: err,
            },
            ApiError::Rejected { .. } | ApiError::Decode(_) => match operation {
                Operation::Submit { .. } => DispatchError::Submission {
                    service,
                    operation,
                    resource,
                    source: err,
                },
                _ => DispatchError::Backend {
                    service,
                    operation,
                    resource,
                    source: err,
                },
            },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DispatchError::Configuration(_) => ErrorKind::Configuration,
            DispatchError::Submission { .. } | DispatchError::InvalidJob { .. } => {
                ErrorKind::Submission
            }
            DispatchError::NotFound { .. } => ErrorKind::NotFound,
            DispatchError::NotRegistered(_) => ErrorKind::NotRegistered,
            DispatchError::BackendTransient { .. } => ErrorKind::Transient,
            DispatchError::Backend { .. } => ErrorKind::Backend,
        }
    }

    /// Only transient backend failures are worth retrying by the caller.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }

    /// Resource handle attached to the error, if any.
    pub fn resource(&self) -> Option<&str> {
        match self {
            DispatchError::Submission { resource, .. }
            | DispatchError::BackendTransient { resource, .. }
            | DispatchError::Backend { resource, .. } => resource.as_deref(),
            DispatchError::NotFound { resource, .. } => Some(resource),
            DispatchError::Configuration(_)
            | DispatchError::InvalidJob { .. }
            | DispatchError::NotRegistered(_) => None,
        }
    }
}
