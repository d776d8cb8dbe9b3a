//! Console dialogs answered through the prompter.
//!
//! `{"confirm": "Delete row?"}` asks yes/no and yields a boolean;
//! `{"input": "Name"}` yields the entered line. A bare string is a
//! confirmation.

use anyhow::Result;
use serde_json::Value;
use tracing::debug;

use crate::core::collab::{Display, Invoke, InvokeRequest, Prompter};
use crate::core::types::{Payload, Reply};

pub struct ConsoleDialogs<'a> {
    prompter: &'a dyn Prompter,
    display: &'a dyn Display,
}

impl<'a> ConsoleDialogs<'a> {
    pub fn new(prompter: &'a dyn Prompter, display: &'a dyn Display) -> Self {
        Self { prompter, display }
    }

    fn confirm(&self, question: &str) -> Reply {
        loop {
            let Some(answer) = self.prompter.prompt(&format!("{question} [y/n]")) else {
                return Reply::Abort;
            };
            match answer.trim().to_ascii_lowercase().as_str() {
                "y" | "yes" => return Reply::Ok(Value::Bool(true)),
                "n" | "no" => return Reply::Ok(Value::Bool(false)),
                _ => self
                    .display
                    .show(&Payload::Message("answer y or n".to_string())),
            }
        }
    }
}

impl Invoke for ConsoleDialogs<'_> {
    fn invoke(&self, request: &InvokeRequest<'_>) -> Result<Reply> {
        debug!(dialog = %request.args, "opening dialog");
        let spec = request.args;
        if let Some(question) = spec.as_str() {
            return Ok(self.confirm(question));
        }
        if let Some(question) = spec.get("confirm").and_then(Value::as_str) {
            return Ok(self.confirm(question));
        }
        if let Some(label) = spec.get("input").and_then(Value::as_str) {
            return Ok(match self.prompter.prompt(label) {
                Some(line) => Reply::Ok(Value::String(line)),
                None => Reply::Abort,
            });
        }
        Ok(Reply::Failed(format!("unsupported dialog {spec}")))
    }
}
