//! Named Rust functions callable from documents via `call(name, ...)`.

use anyhow::Result;
use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::core::collab::{Invoke, InvokeRequest};
use crate::core::session::Session;
use crate::core::types::Reply;

pub type Function = Box<dyn Fn(&[Value], &Session) -> Result<Reply> + Send + Sync>;

/// Functions in registration order.
pub struct FunctionRegistry {
    functions: IndexMap<String, Function>,
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl FunctionRegistry {
    pub fn empty() -> Self {
        Self {
            functions: IndexMap::new(),
        }
    }

    /// `echo`, `fail` and `env`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register("echo", |args, _| {
            Ok(Reply::Ok(match args {
                [] => Value::Null,
                [single] => single.clone(),
                many => Value::Array(many.to_vec()),
            }))
        });
        registry.register("fail", |args, _| {
            let message = args
                .first()
                .and_then(Value::as_str)
                .unwrap_or("function failed");
            Ok(Reply::Failed(message.to_string()))
        });
        registry.register("env", |args, _| {
            let Some(name) = args.first().and_then(Value::as_str) else {
                return Ok(Reply::Failed("env needs a variable name".to_string()));
            };
            Ok(Reply::Ok(
                std::env::var(name).map_or(Value::Null, Value::String),
            ))
        });
        registry
    }

    /// Add or replace a function.
    pub fn register<F>(&mut self, name: impl Into<String>, function: F)
    where
        F: Fn(&[Value], &Session) -> Result<Reply> + Send + Sync + 'static,
    {
        self.functions.insert(name.into(), Box::new(function));
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }
}

impl Invoke for FunctionRegistry {
    #[instrument(skip_all, fields(function = request.name))]
    fn invoke(&self, request: &InvokeRequest<'_>) -> Result<Reply> {
        let Some(function) = self.functions.get(request.name) else {
            debug!("unknown function");
            return Ok(Reply::Failed(format!(
                "unknown function '{}'",
                request.name
            )));
        };
        let args = match request.args {
            Value::Array(args) => args.as_slice(),
            Value::Null => &[],
            other => std::slice::from_ref(other),
        };
        function(args, request.session)
    }
}
