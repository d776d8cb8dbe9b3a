use thiserror::Error;

use crate::core::link::LinkParseError;
use crate::core::types::{ErrorKind, Failure};

/// Typed failures raised while dispatching a key or following a link.
///
/// Every variant leaves the session untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("key '{key}' is misconfigured: {reason}")]
    Configuration { key: String, reason: String },
    #[error("document '{path}' not found")]
    DocumentNotFound { path: String },
    #[error("entry point '{block}' not found in '{path}'")]
    BlockNotFound { path: String, block: String },
    #[error("key '{key}' not found in block '{block}'")]
    KeyNotFound { block: String, key: String },
    #[error("access to '{target}' denied ({predicate})")]
    PermissionDenied { target: String, predicate: String },
    #[error(transparent)]
    InvalidLink(#[from] LinkParseError),
    #[error("failed to load '{path}': {message}")]
    Load { path: String, message: String },
    #[error("no document is open")]
    NoDocument,
}

impl DispatchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DispatchError::Configuration { .. }
            | DispatchError::Load { .. }
            | DispatchError::NoDocument => ErrorKind::Configuration,
            DispatchError::DocumentNotFound { .. }
            | DispatchError::BlockNotFound { .. }
            | DispatchError::KeyNotFound { .. } => ErrorKind::NotFound,
            DispatchError::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            DispatchError::InvalidLink(_) => ErrorKind::Validation,
        }
    }

    /// Whether an owning loop can report the error and keep going.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            DispatchError::Load { .. } | DispatchError::NoDocument
        )
    }
}

impl From<&DispatchError> for Failure {
    fn from(err: &DispatchError) -> Self {
        Failure::new(err.kind(), err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_stable() {
        let cases = [
            (
                DispatchError::Configuration {
                    key: "k".into(),
                    reason: "r".into(),
                },
                "configuration",
            ),
            (
                DispatchError::BlockNotFound {
                    path: "/a".into(),
                    block: "B".into(),
                },
                "not_found",
            ),
            (
                DispatchError::PermissionDenied {
                    target: "/a".into(),
                    predicate: "admin".into(),
                },
                "permission_denied",
            ),
            (DispatchError::InvalidLink(LinkParseError::Empty), "validation"),
        ];
        for (err, kind) in cases {
            assert_eq!(err.kind().as_str(), kind, "{err}");
        }
    }

    #[test]
    fn converts_into_failure() {
        let err = DispatchError::DocumentNotFound {
            path: "/missing".into(),
        };
        let failure = Failure::from(&err);
        assert_eq!(failure.kind, ErrorKind::NotFound);
        assert_eq!(failure.message, "document '/missing' not found");
        assert!(err.is_recoverable());
    }
}
