//! Scripted collaborators for driving the engine in tests.
//!
//! Everything here is single-threaded and records what the engine asked
//! for, so tests can assert on call counts, rendered menus and shown
//! payloads.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeSet, HashMap, VecDeque};

use anyhow::anyhow;
use serde_json::Value;

use crate::core::collab::{
    Authorizer, Collaborators, Display, Document, InvokeRequest, Invoke, LoadError, Loader,
    Prompter,
};
use crate::core::menu::MenuView;
use crate::core::session::AuthContext;
use crate::core::types::{Payload, Reply};

/// Build a document, panicking on malformed fixtures.
pub fn doc(path: &str, blocks: Value) -> Document {
    Document::from_value(path, blocks).expect("valid test document")
}

#[derive(Default)]
pub struct MemoryLoader {
    docs: RefCell<HashMap<String, Document>>,
    loads: Cell<usize>,
}

impl MemoryLoader {
    pub fn insert(&self, doc: Document) {
        self.docs.borrow_mut().insert(doc.path().to_string(), doc);
    }

    pub fn loads(&self) -> usize {
        self.loads.get()
    }
}

impl Loader for MemoryLoader {
    fn load(&self, path: &str) -> Result<Document, LoadError> {
        self.loads.set(self.loads.get() + 1);
        self.docs
            .borrow()
            .get(path)
            .cloned()
            .ok_or_else(|| LoadError::NotFound(path.to_string()))
    }
}

#[derive(Default)]
pub struct RecordingDisplay {
    rendered: RefCell<Vec<MenuView>>,
    shown: RefCell<Vec<Payload>>,
}

impl RecordingDisplay {
    pub fn rendered(&self) -> Vec<MenuView> {
        self.rendered.borrow().clone()
    }

    pub fn shown(&self) -> Vec<Payload> {
        self.shown.borrow().clone()
    }
}

impl Display for RecordingDisplay {
    fn render(&self, view: &MenuView) {
        self.rendered.borrow_mut().push(view.clone());
    }

    fn show(&self, payload: &Payload) {
        self.shown.borrow_mut().push(payload.clone());
    }
}

/// Answers prompts from a queue; an empty queue is end of input.
#[derive(Default)]
pub struct ScriptedPrompter {
    inputs: RefCell<VecDeque<String>>,
    prompts: RefCell<Vec<String>>,
}

impl ScriptedPrompter {
    pub fn push(&self, input: &str) {
        self.inputs.borrow_mut().push_back(input.to_string());
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.borrow().clone()
    }
}

impl Prompter for ScriptedPrompter {
    fn prompt(&self, message: &str) -> Option<String> {
        self.prompts.borrow_mut().push(message.to_string());
        self.inputs.borrow_mut().pop_front()
    }
}

#[derive(Debug, Clone)]
enum Scripted {
    Reply(Reply),
    Error(String),
}

/// Replies per name in order; the last scripted reply repeats.
/// Unscripted names answer `Reply::Ok(null)`.
#[derive(Default)]
pub struct ScriptedInvoker {
    scripts: RefCell<HashMap<String, VecDeque<Scripted>>>,
    calls: RefCell<HashMap<String, usize>>,
    requests: RefCell<Vec<(String, Value)>>,
}

impl ScriptedInvoker {
    pub fn script(&self, name: &str, replies: impl IntoIterator<Item = Reply>) {
        self.scripts
            .borrow_mut()
            .entry(name.to_string())
            .or_default()
            .extend(replies.into_iter().map(Scripted::Reply));
    }

    pub fn script_error(&self, name: &str, message: &str) {
        self.scripts
            .borrow_mut()
            .entry(name.to_string())
            .or_default()
            .push_back(Scripted::Error(message.to_string()));
    }

    pub fn calls(&self, name: &str) -> usize {
        self.calls.borrow().get(name).copied().unwrap_or(0)
    }

    /// Every `(name, args)` pair received, in order.
    pub fn requests(&self) -> Vec<(String, Value)> {
        self.requests.borrow().clone()
    }
}

impl Invoke for ScriptedInvoker {
    fn invoke(&self, request: &InvokeRequest<'_>) -> anyhow::Result<Reply> {
        *self
            .calls
            .borrow_mut()
            .entry(request.name.to_string())
            .or_default() += 1;
        self.requests
            .borrow_mut()
            .push((request.name.to_string(), request.args.clone()));

        let mut scripts = self.scripts.borrow_mut();
        let next = match scripts.get_mut(request.name) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        };
        match next {
            Some(Scripted::Reply(reply)) => Ok(reply),
            Some(Scripted::Error(message)) => Err(anyhow!(message)),
            None => Ok(Reply::Ok(Value::Null)),
        }
    }
}

/// Grants exactly the predicates it was given.
#[derive(Default)]
pub struct StaticAuthorizer {
    granted: RefCell<BTreeSet<String>>,
}

impl StaticAuthorizer {
    pub fn grant(&self, predicate: &str) {
        self.granted.borrow_mut().insert(predicate.to_string());
    }
}

impl Authorizer for StaticAuthorizer {
    fn check(&self, predicate: &str, _auth: &AuthContext) -> bool {
        self.granted.borrow().contains(predicate)
    }
}

/// One of each scripted collaborator.
#[derive(Default)]
pub struct Harness {
    pub loader: MemoryLoader,
    pub display: RecordingDisplay,
    pub auth: StaticAuthorizer,
    pub prompter: ScriptedPrompter,
    pub functions: ScriptedInvoker,
    pub workflows: ScriptedInvoker,
    pub data: ScriptedInvoker,
    pub dialogs: ScriptedInvoker,
    pub resources: ScriptedInvoker,
}

impl Harness {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(self, doc: Document) -> Self {
        self.loader.insert(doc);
        self
    }

    pub fn with_granted<'a>(self, predicates: impl IntoIterator<Item = &'a str>) -> Self {
        for predicate in predicates {
            self.auth.grant(predicate);
        }
        self
    }

    pub fn collab(&self) -> Collaborators<'_> {
        Collaborators {
            loader: &self.loader,
            display: &self.display,
            auth: &self.auth,
            prompter: &self.prompter,
            functions: &self.functions,
            workflows: &self.workflows,
            data: &self.data,
            dialogs: &self.dialogs,
            resources: &self.resources,
        }
    }
}
