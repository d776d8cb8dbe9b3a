//! Collaborators for hosts without a terminal (the HTTP server).
//!
//! Non-blocking dispatch never renders or prompts; these only log when a
//! caller reaches them anyway.

use anyhow::Result;
use tracing::{debug, warn};

use crate::core::collab::{Display, Invoke, InvokeRequest, Prompter};
use crate::core::menu::MenuView;
use crate::core::types::{Payload, Reply};

#[derive(Debug, Clone, Copy, Default)]
pub struct Detached;

impl Display for Detached {
    fn render(&self, view: &MenuView) {
        debug!(items = view.model.items.len(), "menu render on detached display");
    }

    fn show(&self, payload: &Payload) {
        debug!(payload = %payload.to_value(), "payload on detached display");
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoInput;

impl Prompter for NoInput {
    fn prompt(&self, message: &str) -> Option<String> {
        warn!(message, "prompt without an input source");
        None
    }
}

/// Answers every request with a failed reply naming the missing capability.
#[derive(Debug, Clone, Copy)]
pub struct Unsupported(pub &'static str);

impl Invoke for Unsupported {
    fn invoke(&self, request: &InvokeRequest<'_>) -> Result<Reply> {
        warn!(capability = self.0, name = request.name, "unsupported request");
        Ok(Reply::Failed(format!(
            "{} are not available here",
            self.0
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::session::Session;
    use crate::core::types::Mode;
    use serde_json::json;

    #[test]
    fn detached_collaborators_never_block() {
        assert_eq!(NoInput.prompt("Select"), None);
        let session = Session::new(Mode::NonBlocking);
        let reply = Unsupported("dialogs")
            .invoke(&InvokeRequest {
                name: "dialog",
                args: &json!({"confirm": "ok?"}),
                session: &session,
            })
            .expect("invoke");
        assert_eq!(reply, Reply::Failed("dialogs are not available here".to_string()));
    }
}
