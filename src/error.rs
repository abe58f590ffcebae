use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::dom::ElementHandle;

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, AgentError>;

/// A single parameter that failed schema validation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldViolation {
    /// Parameter name (`"<params>"` when the whole object is wrong)
    pub field: String,

    /// What is wrong with it
    pub message: String,
}

impl FieldViolation {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn join_violations(fields: &[FieldViolation]) -> String {
    fields
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors raised by the registry, the element index, the orchestrator and the
/// browser collaborator
#[derive(Error, Debug, Clone)]
pub enum AgentError {
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Action '{0}' is already registered")]
    DuplicateAction(String),

    #[error("Invalid parameters for '{action}': {}", join_violations(.fields))]
    Validation {
        action: String,
        fields: Vec<FieldViolation>,
    },

    #[error("Element index is stale: {0}")]
    StaleIndex(String),

    #[error("Element handle {handle} is stale (current generation is {current})")]
    StaleHandle { handle: ElementHandle, current: u64 },

    #[error("Label '{label}' is ambiguous, matches: {}", .candidates.join(", "))]
    AmbiguousLabel {
        label: String,
        candidates: Vec<String>,
    },

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Malformed decision: {0}")]
    DecisionMalformed(String),

    #[error("Browser operation failed: {0}")]
    BrowserOperation(String),

    #[error("Run limit exceeded: {0}")]
    RunLimitExceeded(String),

    #[error("History append out of order: expected sequence {expected}, got {got}")]
    OutOfOrder { expected: u64, got: u64 },

    #[error("Collaborator unavailable: {0}")]
    CollaboratorUnavailable(String),

    #[error("Action '{action}' failed: {reason}")]
    ActionFailed { action: String, reason: String },

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Run cancelled")]
    Cancelled,

    #[error("Serialization failed: {0}")]
    Serialization(String),

    #[error("Failed to launch browser: {0}")]
    LaunchFailed(String),

    #[error("Failed to connect to browser: {0}")]
    ConnectionFailed(String),

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),
}

/// Serializable discriminant of [`AgentError`], stored in history records
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UnknownAction,
    DuplicateAction,
    Validation,
    StaleIndex,
    StaleHandle,
    AmbiguousLabel,
    ElementNotFound,
    DecisionMalformed,
    BrowserOperation,
    RunLimitExceeded,
    OutOfOrder,
    CollaboratorUnavailable,
    ActionFailed,
    Timeout,
    Cancelled,
    Serialization,
}

impl AgentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AgentError::UnknownAction(_) => ErrorKind::UnknownAction,
            AgentError::DuplicateAction(_) => ErrorKind::DuplicateAction,
            AgentError::Validation { .. } => ErrorKind::Validation,
            AgentError::StaleIndex(_) => ErrorKind::StaleIndex,
            AgentError::StaleHandle { .. } => ErrorKind::StaleHandle,
            AgentError::AmbiguousLabel { .. } => ErrorKind::AmbiguousLabel,
            AgentError::ElementNotFound(_) => ErrorKind::ElementNotFound,
            AgentError::DecisionMalformed(_) => ErrorKind::DecisionMalformed,
            AgentError::BrowserOperation(_)
            | AgentError::NavigationFailed(_)
            | AgentError::LaunchFailed(_)
            | AgentError::ConnectionFailed(_) => ErrorKind::BrowserOperation,
            AgentError::RunLimitExceeded(_) => ErrorKind::RunLimitExceeded,
            AgentError::OutOfOrder { .. } => ErrorKind::OutOfOrder,
            AgentError::CollaboratorUnavailable(_) => ErrorKind::CollaboratorUnavailable,
            AgentError::ActionFailed { .. } => ErrorKind::ActionFailed,
            AgentError::Timeout(_) => ErrorKind::Timeout,
            AgentError::Cancelled => ErrorKind::Cancelled,
            AgentError::Serialization(_) => ErrorKind::Serialization,
        }
    }

    /// True when the collaborator that produced the error can no longer be used
    pub fn is_fatal(&self) -> bool {
        matches!(self, AgentError::CollaboratorUnavailable(_))
    }

    /// Message fed back to the decision maker for a recoverable failure
    pub fn feedback(&self) -> String {
        match self {
            AgentError::ElementNotFound(_) | AgentError::StaleHandle { .. } => {
                format!("{}. Element not found, re-observe the page and use a current index.", self)
            }
            AgentError::StaleIndex(_) => {
                format!("{}. The page was still changing, observe it again.", self)
            }
            _ => self.to_string(),
        }
    }
}

impl From<serde_json::Error> for AgentError {
    fn from(e: serde_json::Error) -> Self {
        AgentError::Serialization(e.to_string())
    }
}
