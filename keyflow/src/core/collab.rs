//! Collaborator seams and the in-memory document model.
//!
//! The engine performs no I/O itself. Loading, display, input, authorization
//! and every action side effect go through the traits below; `keyflow::io`
//! provides the reference implementations and `test_support` scripted ones.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::core::menu::MenuView;
use crate::core::modifiers::parse_key;
use crate::core::session::{AuthContext, Session};
use crate::core::types::{Payload, Reply};

/// A loaded declarative document: named blocks of ordered key/command pairs.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    path: String,
    blocks: Map<String, Value>,
}

impl Document {
    pub fn new(path: impl Into<String>, blocks: Map<String, Value>) -> Self {
        Self {
            path: path.into(),
            blocks,
        }
    }

    /// Build a document from a JSON object whose values are block objects.
    pub fn from_value(path: impl Into<String>, value: Value) -> Result<Self, LoadError> {
        let path = path.into();
        let Value::Object(blocks) = value else {
            return Err(LoadError::Invalid {
                path,
                message: "document root must be an object".to_string(),
            });
        };
        if let Some((name, _)) = blocks.iter().find(|(_, block)| !block.is_object()) {
            return Err(LoadError::Invalid {
                message: format!("block '{name}' must be an object"),
                path,
            });
        }
        Ok(Self { path, blocks })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn block(&self, name: &str) -> Option<&Map<String, Value>> {
        self.blocks.get(name).and_then(Value::as_object)
    }

    pub fn has_block(&self, name: &str) -> bool {
        self.block(name).is_some()
    }

    pub fn block_names(&self) -> impl Iterator<Item = &str> {
        self.blocks.keys().map(String::as_str)
    }

    /// `preferred` when present, otherwise the first block in document order.
    pub fn default_block<'a>(&'a self, preferred: &'a str) -> Option<&'a str> {
        if self.has_block(preferred) {
            return Some(preferred);
        }
        self.block_names().next()
    }

    /// Find `key` in `block`, matching decorated entries by their bare key.
    ///
    /// Returns the key as written in the document with its command.
    pub fn lookup_key(&self, block: &str, key: &str) -> Option<(&str, &Value)> {
        let entries = self.block(block)?;
        if let Some((written, command)) = entries.get_key_value(key) {
            return Some((written.as_str(), command));
        }
        let (bare, _) = parse_key(key);
        entries
            .iter()
            .find(|(written, _)| parse_key(written).0 == bare)
            .map(|(written, command)| (written.as_str(), command))
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("document '{0}' not found")]
    NotFound(String),
    #[error("document '{path}' is invalid: {message}")]
    Invalid { path: String, message: String },
}

pub trait Loader {
    fn load(&self, path: &str) -> Result<Document, LoadError>;
}

/// Output side of the user interface.
pub trait Display {
    fn render(&self, view: &MenuView);
    fn show(&self, payload: &Payload);
}

pub trait Authorizer {
    fn check(&self, predicate: &str, auth: &AuthContext) -> bool;
}

/// Blocking line input. `None` means end of input.
pub trait Prompter {
    fn prompt(&self, message: &str) -> Option<String>;
}

/// A single request to an action collaborator.
#[derive(Debug, Clone, Copy)]
pub struct InvokeRequest<'a> {
    /// Function name, workflow label, data action, dialog or resource verb.
    pub name: &'a str,
    pub args: &'a Value,
    pub session: &'a Session,
}

/// Functions, workflows, data, dialogs and resources all answer through this.
pub trait Invoke {
    fn invoke(&self, request: &InvokeRequest<'_>) -> anyhow::Result<Reply>;
}

/// Everything the engine talks to while dispatching.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub loader: &'a dyn Loader,
    pub display: &'a dyn Display,
    pub auth: &'a dyn Authorizer,
    pub prompter: &'a dyn Prompter,
    pub functions: &'a dyn Invoke,
    pub workflows: &'a dyn Invoke,
    pub data: &'a dyn Invoke,
    pub dialogs: &'a dyn Invoke,
    pub resources: &'a dyn Invoke,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc() -> Document {
        Document::from_value(
            "/app",
            json!({
                "intro": {"hello": "call(greet)"},
                "main": {"^start*": ["A", "B"], "plain": "x"}
            }),
        )
        .expect("document")
    }

    #[test]
    fn lookup_matches_decorated_entries_by_bare_key() {
        let doc = doc();
        let (written, command) = doc.lookup_key("main", "start").expect("found");
        assert_eq!(written, "^start*");
        assert_eq!(command, &json!(["A", "B"]));
        assert_eq!(doc.lookup_key("main", "^start*").expect("found").0, "^start*");
        assert_eq!(doc.lookup_key("main", "~start").expect("found").0, "^start*");
        assert!(doc.lookup_key("main", "missing").is_none());
        assert!(doc.lookup_key("nowhere", "plain").is_none());
    }

    #[test]
    fn default_block_prefers_configured_name() {
        let doc = doc();
        assert_eq!(doc.default_block("main"), Some("main"));
        assert_eq!(doc.default_block("other"), Some("intro"));
    }

    #[test]
    fn rejects_non_object_blocks() {
        let err = Document::from_value("/bad", json!({"main": [1, 2]})).unwrap_err();
        assert!(matches!(err, LoadError::Invalid { message, .. } if message.contains("main")));
        assert!(Document::from_value("/bad", json!("text")).is_err());
    }
}
