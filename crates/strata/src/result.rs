//! Result and error types for Strata.
//!
//! Every failure the engine can produce is one `StrataError`. The recovery
//! engine never inspects variants directly; it asks [`StrataError::class`].

use crate::driver::{BackendError, BackendErrorKind};
use crate::structure::NodeId;
use std::fmt;
use thiserror::Error;

/// Result type for Strata operations
pub type StrataResult<T> = Result<T, StrataError>;

/// Transient failure kinds that are eligible for bounded retry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecoverableKind {
    /// A resolved handle no longer refers to a live element
    StaleHandle,
    /// The interaction scope vanished underneath the engine
    ScopeInvalidated,
    /// The element was not found inside the synchronization window
    NotFound,
    /// The backend reported a transient inconsistency
    TransientInconsistency,
}

impl RecoverableKind {
    /// Whether recovery must also invalidate the enclosing scope
    #[must_use]
    pub const fn is_scope_related(&self) -> bool {
        matches!(self, Self::ScopeInvalidated)
    }
}

impl fmt::Display for RecoverableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::StaleHandle => "stale handle",
            Self::ScopeInvalidated => "scope invalidated",
            Self::NotFound => "not found",
            Self::TransientInconsistency => "transient inconsistency",
        };
        f.write_str(name)
    }
}

/// Classification consulted by the recovery engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Modeling or declaration defect, never retried
    Structural,
    /// Execution-stability failure, retried within budget
    Recoverable,
    /// Backend or caller failure, surfaced immediately
    NonRecoverable,
    /// Verification failure from the test layer, never intercepted
    Assertion,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Structural => "structural",
            Self::Recoverable => "recoverable",
            Self::NonRecoverable => "non-recoverable",
            Self::Assertion => "assertion",
        };
        f.write_str(name)
    }
}

/// Errors that can occur in Strata
#[derive(Debug, Error)]
pub enum StrataError {
    /// Declaration missing a required branch, or node outside a realized tree
    #[error("Structural error at {path}: {message}")]
    Structural {
        /// Structural path of the offending node
        path: String,
        /// Error message
        message: String,
    },

    /// Transient execution failure
    #[error("Recoverable failure ({kind}) at {path}: {message}")]
    Recoverable {
        /// What kind of instability occurred
        kind: RecoverableKind,
        /// Node at which the failure occurred
        node: NodeId,
        /// Context boundary whose scope is affected, if any
        scope: Option<NodeId>,
        /// Structural path of the failing node
        path: String,
        /// Error message
        message: String,
    },

    /// Backend error not classified as transient, or caller-raised error
    #[error("Execution failed at {path}: {message}")]
    NonRecoverable {
        /// Structural path of the failing node
        path: String,
        /// Error message
        message: String,
    },

    /// Assertion failed in the verification layer
    #[error("Assertion failed: {message}")]
    AssertionFailed {
        /// Error message
        message: String,
    },

    /// Operation timed out
    #[error("Operation timed out after {ms}ms")]
    Timeout {
        /// Timeout in milliseconds
        ms: u64,
    },

    /// Invalid engine configuration
    #[error("Invalid configuration: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl StrataError {
    /// Create a structural error
    #[must_use]
    pub fn structural(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Structural {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a recoverable error at a node
    #[must_use]
    pub fn recoverable(
        kind: RecoverableKind,
        node: NodeId,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Recoverable {
            kind,
            node,
            scope: None,
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a non-recoverable error
    #[must_use]
    pub fn non_recoverable(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::NonRecoverable {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an assertion failure
    #[must_use]
    pub fn assertion(message: impl Into<String>) -> Self {
        Self::AssertionFailed {
            message: message.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Classify a backend failure observed while working on `node`
    ///
    /// `scope` names the boundary whose scope is affected when the backend
    /// reports that the scope itself vanished.
    #[must_use]
    pub fn from_backend(
        err: BackendError,
        node: NodeId,
        path: impl Into<String>,
        scope: Option<NodeId>,
    ) -> Self {
        let kind = match err.kind {
            BackendErrorKind::Stale => RecoverableKind::StaleHandle,
            BackendErrorKind::ScopeGone => RecoverableKind::ScopeInvalidated,
            BackendErrorKind::Transient => RecoverableKind::TransientInconsistency,
            BackendErrorKind::Fatal => return Self::non_recoverable(path, err.message),
        };
        let scope = if kind.is_scope_related() { scope } else { None };
        Self::recoverable(kind, node, path, err.message).with_scope(scope)
    }

    /// Attach the affected context boundary to a recoverable error
    #[must_use]
    pub fn with_scope(self, boundary: Option<NodeId>) -> Self {
        match self {
            Self::Recoverable {
                kind,
                node,
                path,
                message,
                ..
            } => Self::Recoverable {
                kind,
                node,
                scope: boundary,
                path,
                message,
            },
            other => other,
        }
    }

    /// Classify the error for the recovery engine
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::Structural { .. } | Self::Config { .. } => ErrorClass::Structural,
            Self::Recoverable { .. } => ErrorClass::Recoverable,
            Self::AssertionFailed { .. } => ErrorClass::Assertion,
            Self::NonRecoverable { .. }
            | Self::Timeout { .. }
            | Self::Io(_)
            | Self::Json(_)
            | Self::Yaml(_) => ErrorClass::NonRecoverable,
        }
    }

    /// Whether the recovery engine may retry this error
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self.class(), ErrorClass::Recoverable)
    }

    /// Node at which a recoverable failure occurred
    #[must_use]
    pub const fn failing_node(&self) -> Option<NodeId> {
        match self {
            Self::Recoverable { node, .. } => Some(*node),
            _ => None,
        }
    }

    /// Kind of a recoverable failure
    #[must_use]
    pub const fn recoverable_kind(&self) -> Option<RecoverableKind> {
        match self {
            Self::Recoverable { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Context boundary a recoverable failure affects
    #[must_use]
    pub const fn affected_scope(&self) -> Option<NodeId> {
        match self {
            Self::Recoverable { scope, .. } => *scope,
            _ => None,
        }
    }

    /// Structural path the error is annotated with, if any
    #[must_use]
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::Structural { path, .. }
            | Self::Recoverable { path, .. }
            | Self::NonRecoverable { path, .. } => Some(path),
            _ => None,
        }
    }
}
