//! Unified catalog error model and mapping helpers.
//! Every fallible catalog path returns `AppError`; the HTTP surface maps it to a
//! status code and the snapshot path decides which kinds are swallowed.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

use crate::metastore::MetastoreError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    UserInput { code: String, message: String },
    NotFound { code: String, message: String },
    Conflict { code: String, message: String },
    LoadFailure { code: String, message: String },
    Inconsistent { code: String, message: String },
    Fatal { code: String, message: String },
    Config { code: String, message: String },
    Io { code: String, message: String },
    Internal { code: String, message: String },
}

impl AppError {
    pub fn code_str(&self) -> &str {
        match self {
            AppError::UserInput { code, .. }
            | AppError::NotFound { code, .. }
            | AppError::Conflict { code, .. }
            | AppError::LoadFailure { code, .. }
            | AppError::Inconsistent { code, .. }
            | AppError::Fatal { code, .. }
            | AppError::Config { code, .. }
            | AppError::Io { code, .. }
            | AppError::Internal { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::UserInput { message, .. }
            | AppError::NotFound { message, .. }
            | AppError::Conflict { message, .. }
            | AppError::LoadFailure { message, .. }
            | AppError::Inconsistent { message, .. }
            | AppError::Fatal { message, .. }
            | AppError::Config { message, .. }
            | AppError::Io { message, .. }
            | AppError::Internal { message, .. } => message.as_str(),
        }
    }

    pub fn user<S: Into<String>>(code: S, msg: S) -> Self { AppError::UserInput { code: code.into(), message: msg.into() } }
    pub fn not_found<S: Into<String>>(code: S, msg: S) -> Self { AppError::NotFound { code: code.into(), message: msg.into() } }
    pub fn conflict<S: Into<String>>(code: S, msg: S) -> Self { AppError::Conflict { code: code.into(), message: msg.into() } }
    pub fn load_failure<S: Into<String>>(code: S, msg: S) -> Self { AppError::LoadFailure { code: code.into(), message: msg.into() } }
    pub fn inconsistent<S: Into<String>>(code: S, msg: S) -> Self { AppError::Inconsistent { code: code.into(), message: msg.into() } }
    pub fn fatal<S: Into<String>>(code: S, msg: S) -> Self { AppError::Fatal { code: code.into(), message: msg.into() } }
    pub fn config<S: Into<String>>(code: S, msg: S) -> Self { AppError::Config { code: code.into(), message: msg.into() } }
    pub fn io<S: Into<String>>(code: S, msg: S) -> Self { AppError::Io { code: code.into(), message: msg.into() } }
    pub fn internal<S: Into<String>>(code: S, msg: S) -> Self { AppError::Internal { code: code.into(), message: msg.into() } }

    pub fn is_load_failure(&self) -> bool { matches!(self, AppError::LoadFailure { .. }) }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            AppError::UserInput { .. } => 400,
            AppError::NotFound { .. } => 404,
            AppError::Conflict { .. } => 409,
            AppError::LoadFailure { .. } => 503,
            AppError::Inconsistent { .. } => 500,
            AppError::Fatal { .. } => 500,
            AppError::Config { .. } => 500,
            AppError::Io { .. } => 503,
            AppError::Internal { .. } => 500,
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code_str(), self.message())
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        // Default mapping: treat as Internal unless downcasted elsewhere
        match err.downcast::<AppError>() {
            Ok(app) => app,
            Err(err) => AppError::Internal { code: "internal_error".into(), message: err.to_string() },
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io { code: "io_error".into(), message: err.to_string() }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::UserInput { code: "invalid_json".into(), message: err.to_string() }
    }
}

impl From<bincode::Error> for AppError {
    fn from(err: bincode::Error) -> Self {
        AppError::Internal { code: "wire_codec".into(), message: err.to_string() }
    }
}

/// Metastore failures surface as load failures; the code keeps the typed kind.
impl From<MetastoreError> for AppError {
    fn from(err: MetastoreError) -> Self {
        let code = match &err {
            MetastoreError::NotFound(_) => "metastore_not_found",
            MetastoreError::Transient(_) => "metastore_transient",
            MetastoreError::Schema(_) => "metastore_schema",
        };
        AppError::LoadFailure { code: code.into(), message: err.to_string() }
    }
}
