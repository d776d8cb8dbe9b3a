//! Shared deterministic types for the dispatch core.
//!
//! These types define the stable contract between the engine, its
//! collaborators, and remote clients. Serialized forms are part of the wire
//! format and must not change shape.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::link::Location;
use crate::core::menu::MenuView;

/// How the engine waits for user input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Interactive: the engine blocks on the prompter and owns navigation.
    #[default]
    Blocking,
    /// Remote/client-driven: input boundaries return `Outcome::Pending`.
    NonBlocking,
}

/// Stable error classification exposed to programmatic callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Configuration,
    NotFound,
    PermissionDenied,
    Validation,
    /// A collaborator ran the action and reported failure.
    Action,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::NotFound => "not_found",
            ErrorKind::PermissionDenied => "permission_denied",
            ErrorKind::Validation => "validation",
            ErrorKind::Action => "action",
        }
    }
}

/// Structured failure carried inside an [`Outcome`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub kind: ErrorKind,
    pub message: String,
}

impl Failure {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// A suspended menu waiting for client input (non-blocking mode).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prompt {
    /// Bare key whose command opened the menu.
    pub key: String,
    pub view: MenuView,
}

/// Result of dispatching or launching a command.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// Valid no-op, or an action with nothing to report.
    Empty,
    /// Action completed with a value.
    Done { value: Value },
    /// Action or input failed; recoverable.
    Failed { error: Failure },
    /// Sentinel: return to the caller (auto-return, back item).
    Back,
    /// Deliberate control-flow exit from a required loop or input.
    Abort,
    /// Waiting on client input.
    Pending { prompt: Prompt },
    /// Session moved to a new location.
    Relocated { location: Location },
}

impl Outcome {
    pub fn failed(kind: ErrorKind, message: impl Into<String>) -> Self {
        Outcome::Failed {
            error: Failure::new(kind, message),
        }
    }

    pub fn done(value: Value) -> Self {
        if value.is_null() {
            return Outcome::Empty;
        }
        Outcome::Done { value }
    }

    /// True when the action reported failure (required-retry trigger).
    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failed { .. })
    }

    /// True when a composite sequence must stop after this outcome.
    pub fn interrupts(&self) -> bool {
        !matches!(self, Outcome::Empty | Outcome::Done { .. })
    }
}

/// What a collaborator reports after running an action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reply", content = "value", rename_all = "snake_case")]
pub enum Reply {
    Ok(Value),
    Failed(String),
    /// Distinguished abort response; breaks required-retry loops.
    Abort,
}

/// Structured payload handed to the display collaborator.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "body", rename_all = "snake_case")]
pub enum Payload {
    Text(String),
    Table(Vec<Value>),
    Structured(Value),
    /// Inline engine message (failures, re-prompt hints).
    Message(String),
}

impl Payload {
    /// Pick the payload shape for a display value.
    ///
    /// Strings are text, arrays of records are tables, anything else is
    /// passed through as structured data.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::String(text) => Payload::Text(text),
            Value::Array(rows) if !rows.is_empty() && rows.iter().all(Value::is_object) => {
                Payload::Table(rows)
            }
            other => Payload::Structured(other),
        }
    }

    /// JSON form used when the payload is returned to a remote client.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn outcome_serializes_with_stable_status_tag() {
        let failed = Outcome::failed(ErrorKind::PermissionDenied, "nope");
        let value = serde_json::to_value(&failed).expect("serialize");
        assert_eq!(
            value,
            json!({"status": "failed", "error": {"kind": "permission_denied", "message": "nope"}})
        );
        assert_eq!(
            serde_json::to_value(Outcome::Back).expect("serialize"),
            json!({"status": "back"})
        );
    }

    #[test]
    fn done_with_null_collapses_to_empty() {
        assert_eq!(Outcome::done(Value::Null), Outcome::Empty);
        assert_eq!(
            Outcome::done(json!(1)),
            Outcome::Done { value: json!(1) }
        );
    }

    #[test]
    fn payload_shape_follows_value() {
        assert_eq!(
            Payload::from_value(json!("hi")),
            Payload::Text("hi".to_string())
        );
        assert!(matches!(
            Payload::from_value(json!([{"a": 1}, {"a": 2}])),
            Payload::Table(rows) if rows.len() == 2
        ));
        assert!(matches!(
            Payload::from_value(json!([1, 2])),
            Payload::Structured(_)
        ));
    }
}
