use serde::{Deserialize, Serialize};

use crate::result::AuditStage;

/// Failures an audit can run into.
///
/// Only `NavigationFailure` on the initial visit aborts an audit; every other
/// variant is recorded on the result and the run carries on.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AuditError {
    #[error("navigation to {url} failed: {reason}")]
    NavigationFailure { url: String, reason: String },
    #[error("element \"{0}\" not found")]
    ElementNotFound(String),
    #[error("element \"{0}\" is not visible")]
    ElementNotVisible(String),
    #[error("script execution failed: {0}")]
    ScriptExecutionFailure(String),
    #[error("malformed performance log entry: {0}")]
    LogParseFailure(String),
    #[error("cannot parse domain \"{0}\"")]
    DomainParseFailure(String),
    #[error("browser session reset failed: {0}")]
    SessionResetFailure(String),
    #[error("timed out after {after_ms}ms waiting for {what}")]
    Timeout { what: String, after_ms: u64 },
    #[error("state capture failed: {0}")]
    Capture(String),
}

impl AuditError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuditError::NavigationFailure { .. } => ErrorKind::NavigationFailure,
            AuditError::ElementNotFound(_) => ErrorKind::ElementNotFound,
            AuditError::ElementNotVisible(_) => ErrorKind::ElementNotVisible,
            AuditError::ScriptExecutionFailure(_) => ErrorKind::ScriptExecutionFailure,
            AuditError::LogParseFailure(_) => ErrorKind::LogParseFailure,
            AuditError::DomainParseFailure(_) => ErrorKind::DomainParseFailure,
            AuditError::SessionResetFailure(_) => ErrorKind::SessionResetFailure,
            AuditError::Timeout { .. } => ErrorKind::Timeout,
            AuditError::Capture(_) => ErrorKind::Capture,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NavigationFailure,
    ElementNotFound,
    ElementNotVisible,
    ScriptExecutionFailure,
    LogParseFailure,
    DomainParseFailure,
    SessionResetFailure,
    Timeout,
    Capture,
}

/// An error as recorded on an audit result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorInfo {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(default)]
    pub fatal: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<AuditStage>,
    pub timestamp: String,
}

impl ErrorInfo {
    pub fn recoverable(err: &AuditError, stage: AuditStage) -> Self {
        Self::build(err, Some(stage), false)
    }

    pub fn fatal(err: &AuditError, stage: AuditStage) -> Self {
        Self::build(err, Some(stage), true)
    }

    fn build(err: &AuditError, stage: Option<AuditStage>, fatal: bool) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
            fatal,
            stage,
            timestamp: crate::now_rfc3339(),
        }
    }
}

/// Errors raised while registering provider signatures.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("provider \"{provider}\": invalid pattern {pattern:?}: {source}")]
    InvalidPattern {
        provider: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("provider \"{0}\" declares no banner element ids")]
    NoBannerIds(String),
    #[error("provider \"{0}\" declares no domains")]
    NoDomains(String),
}
