//! Command dispatch: modifiers, launching, menus and navigation.
//!
//! The engine holds only immutable configuration. All state lives in the
//! [`Session`] passed to each call, and every side effect goes through
//! [`Collaborators`].

use anyhow::anyhow;
use serde_json::{Map, Value, json};
use tracing::{debug, info, instrument, warn};

use crate::core::breadcrumbs::Back;
use crate::core::collab::{Collaborators, Document, Invoke, InvokeRequest};
use crate::core::command::{Command, MenuSpec, classify};
use crate::core::error::DispatchError;
use crate::core::link::Location;
use crate::core::menu::{
    Density, MenuError, MenuItem, MenuOptions, MenuSource, MenuView, Selection, build_menu,
    resolve,
};
use crate::core::modifiers::{Modifiers, PostAction, process};
use crate::core::session::{Pending, PendingMenu, PendingRetry, Session};
use crate::core::types::{ErrorKind, Mode, Outcome, Payload, Reply};
use crate::io::config::EngineConfig;
use crate::links;
use crate::templates::render_display;

const SELECT_PROMPT: &str = "Select";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Engine {
    density: Density,
    retry_limit: u32,
    default_block: String,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

impl Engine {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            density: config.density,
            retry_limit: config.required_retry_limit,
            default_block: config.default_block.clone(),
        }
    }

    pub fn default_block(&self) -> &str {
        &self.default_block
    }

    /// Open `path` at its default entry point in a scope named after it.
    #[instrument(skip_all, fields(path = %path))]
    pub fn start(
        &self,
        session: &mut Session,
        path: &str,
        collab: &Collaborators<'_>,
    ) -> Result<Location, DispatchError> {
        let doc = links::load_document(collab.loader, path)?;
        let block = doc
            .default_block(&self.default_block)
            .ok_or_else(|| DispatchError::BlockNotFound {
                path: path.to_string(),
                block: self.default_block.clone(),
            })?;
        let location = Location::new(doc.path(), block);
        session.clear_pending();
        session.enter_scope(doc.path());
        session.relocate(location.clone(), "start");
        info!(at = %location, "session started");
        Ok(location)
    }

    /// Entries of the session's current block, in document order.
    pub fn current_block(
        &self,
        session: &Session,
        collab: &Collaborators<'_>,
    ) -> Result<Map<String, Value>, DispatchError> {
        let (doc, block) = self.current_document(session, collab)?;
        doc.block(&block)
            .cloned()
            .ok_or_else(|| DispatchError::BlockNotFound {
                path: doc.path().to_string(),
                block,
            })
    }

    /// Dispatch a key of the current block by its bare or decorated name.
    pub fn dispatch_key(
        &self,
        session: &mut Session,
        key: &str,
        collab: &Collaborators<'_>,
    ) -> Result<Outcome, DispatchError> {
        let (doc, block) = self.current_document(session, collab)?;
        let Some((written, command)) = doc.lookup_key(&block, key) else {
            return Err(DispatchError::KeyNotFound {
                block,
                key: key.to_string(),
            });
        };
        let written = written.to_string();
        let command = command.clone();
        self.dispatch(session, &written, &command, collab)
    }

    /// Run one decorated key and its command.
    ///
    /// The command is classified before anything is mutated. A dispatch
    /// that returns an error leaves the session as it found it.
    #[instrument(skip_all, fields(key = %key))]
    pub fn dispatch(
        &self,
        session: &mut Session,
        key: &str,
        command: &Value,
        collab: &Collaborators<'_>,
    ) -> Result<Outcome, DispatchError> {
        let processed = process(key, command, session);
        let post = processed.post;

        let menu = post
            .auto_menu()
            .then(|| MenuSpec::from_auto(&processed.command))
            .flatten();
        let command = match menu {
            Some(spec) => Command::Menu(spec),
            None => classify(&processed.command).map_err(|err| {
                warn!(key = %processed.key, error = %err, "misconfigured key");
                DispatchError::Configuration {
                    key: processed.key.clone(),
                    reason: err.to_string(),
                }
            })?,
        };

        let before = session.clone();
        session.clear_pending();
        if post.anchor() && session.checkpoint() {
            debug!(key = %processed.key, "anchored current location");
        }

        let launched = if post.required() {
            self.launch_required(session, &processed.key, &command, post, collab)
        } else {
            self.launch_with(session, &processed.key, &command, post, collab)
        };
        match launched {
            Ok(outcome) => Ok(post.finish(outcome)),
            Err(err) => {
                debug!(key = %processed.key, error = %err, "dispatch failed; session restored");
                *session = before;
                Err(err)
            }
        }
    }

    /// Launch an already classified command without key decorations.
    pub fn launch(
        &self,
        session: &mut Session,
        command: &Command,
        collab: &Collaborators<'_>,
    ) -> Result<Outcome, DispatchError> {
        let post = plain_post(session);
        self.launch_with(session, "", command, post, collab)
    }

    /// Answer the menu or required retry left pending by a non-blocking
    /// dispatch.
    ///
    /// Bad menu input is a validation failure and the menu stays pending.
    /// A pending retry ignores the input and launches the action again.
    #[instrument(skip_all)]
    pub fn resume(
        &self,
        session: &mut Session,
        input: &str,
        collab: &Collaborators<'_>,
    ) -> Result<Outcome, DispatchError> {
        let pending = match session.take_pending() {
            Some(Pending::Menu(menu)) => menu,
            Some(Pending::Retry(retry)) => return self.retry(session, retry, collab),
            None => {
                return Ok(Outcome::failed(
                    ErrorKind::Validation,
                    "nothing is waiting for input",
                ));
            }
        };

        let selection = match resolve(&pending.view.model, input) {
            Ok(selection) => selection,
            Err(err) => {
                debug!(error = %err, "rejected menu input");
                session.set_pending(pending);
                return Ok(Outcome::failed(ErrorKind::Validation, err.to_string()));
            }
        };

        if let Selection::Narrowed(model) = selection {
            let mut narrowed = pending;
            narrowed.view.model = model;
            let prompt = narrowed.prompt();
            session.set_pending(narrowed);
            return Ok(Outcome::Pending { prompt });
        }

        let outcome = match self.launch_selection(session, selection, collab) {
            Ok(outcome) => outcome,
            Err(err) => {
                session.set_pending(pending);
                return Err(err);
            }
        };
        if pending.post.required() && outcome.is_failure() {
            debug!(key = %pending.key, "required selection failed; menu stays pending");
            session.set_pending(pending);
            return Ok(outcome);
        }
        Ok(pending.post.finish(outcome))
    }

    /// Step back along the active breadcrumb trail.
    pub fn go_back(&self, session: &mut Session) -> Outcome {
        if let Some(pending) = session.take_pending() {
            debug!(key = pending.key(), "pending input dropped");
        }
        match session.step_back() {
            Back::To(location) => {
                info!(to = %location, "navigated back");
                Outcome::Relocated { location }
            }
            Back::NoPrior => {
                debug!(scope = session.scope(), "no prior location");
                Outcome::Empty
            }
        }
    }

    fn current_document(
        &self,
        session: &Session,
        collab: &Collaborators<'_>,
    ) -> Result<(Document, String), DispatchError> {
        let location = session
            .current_location()
            .ok_or(DispatchError::NoDocument)?;
        let doc = links::load_document(collab.loader, &location.path)?;
        Ok((doc, location.block))
    }

    fn launch_required(
        &self,
        session: &mut Session,
        key: &str,
        command: &Command,
        post: PostAction,
        collab: &Collaborators<'_>,
    ) -> Result<Outcome, DispatchError> {
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            let outcome = self.launch_with(session, key, command, post, collab)?;
            let Outcome::Failed { error } = &outcome else {
                return Ok(outcome);
            };
            if self.retries_exhausted(attempts) {
                warn!(key, attempts, "required action still failing; giving up");
                return Ok(outcome);
            }
            if post.mode == Mode::NonBlocking {
                debug!(key, attempts, error = %error.message, "required action failed; waiting for retry");
                session.set_pending(PendingRetry {
                    key: key.to_string(),
                    command: command.clone(),
                    post,
                    attempts,
                });
                return Ok(outcome);
            }
            debug!(key, attempts, error = %error.message, "required action failed; retrying");
            collab.display.show(&Payload::Message(error.message.clone()));
        }
    }

    /// One more launch of a required action suspended in non-blocking mode.
    fn retry(
        &self,
        session: &mut Session,
        retry: PendingRetry,
        collab: &Collaborators<'_>,
    ) -> Result<Outcome, DispatchError> {
        let before = session.clone();
        let launched = self.launch_with(session, &retry.key, &retry.command, retry.post, collab);
        let outcome = match launched {
            Ok(outcome) => outcome,
            Err(err) => {
                *session = before;
                session.set_pending(retry);
                return Err(err);
            }
        };
        if !outcome.is_failure() {
            return Ok(retry.post.finish(outcome));
        }
        let attempts = retry.attempts + 1;
        if self.retries_exhausted(attempts) {
            warn!(key = %retry.key, attempts, "required action still failing; giving up");
            return Ok(outcome);
        }
        debug!(key = %retry.key, attempts, "required action failed again; waiting for retry");
        session.set_pending(PendingRetry { attempts, ..retry });
        Ok(outcome)
    }

    fn retries_exhausted(&self, attempts: u32) -> bool {
        self.retry_limit != 0 && attempts >= self.retry_limit
    }

    fn launch_with(
        &self,
        session: &mut Session,
        key: &str,
        command: &Command,
        post: PostAction,
        collab: &Collaborators<'_>,
    ) -> Result<Outcome, DispatchError> {
        let blocking = is_blocking(session);
        match command {
            Command::Empty => Ok(Outcome::Empty),
            Command::Call { name, args } => Ok(invoke(
                collab.functions,
                name,
                &Value::Array(args.clone()),
                session,
            )),
            Command::Link(expr) => {
                let location = links::resolve(expr, session, collab, &self.default_block)?;
                Ok(Outcome::Relocated { location })
            }
            Command::Open(target) => {
                let outcome = invoke(collab.resources, "open", &json!(target), session);
                Ok(self.present(outcome, blocking, collab))
            }
            Command::Read(target) => Ok(invoke(collab.resources, "read", &json!(target), session)),
            Command::Workflow(spec) => {
                let name = spec.get("name").and_then(Value::as_str).unwrap_or("run");
                Ok(invoke(collab.workflows, name, spec, session))
            }
            Command::Display(value) => {
                let payload = display_payload(value, session);
                if blocking {
                    collab.display.show(&payload);
                    Ok(Outcome::Empty)
                } else {
                    Ok(Outcome::done(json!({ "display": payload.to_value() })))
                }
            }
            Command::Dialog(spec) => {
                if blocking {
                    Ok(invoke(collab.dialogs, "dialog", spec, session))
                } else {
                    Ok(Outcome::done(json!({ "dialog": spec })))
                }
            }
            Command::Menu(spec) => self.open_menu(session, key, spec, post, collab),
            Command::Data(record) => {
                let action = record
                    .get("action")
                    .and_then(Value::as_str)
                    .unwrap_or("list");
                Ok(invoke(
                    collab.data,
                    action,
                    &Value::Object(record.clone()),
                    session,
                ))
            }
            Command::Sequence(items) => self.launch_sequence(session, key, items, collab),
            Command::Plain(text) => {
                if blocking {
                    return Ok(Outcome::Empty);
                }
                Ok(Outcome::done(self.plain_value(text, session, collab)))
            }
            Command::Malformed { text, reason } => {
                warn!(key, instruction = %text, reason = %reason, "malformed instruction");
                Ok(Outcome::failed(
                    ErrorKind::Validation,
                    format!("malformed instruction '{text}': {reason}"),
                ))
            }
        }
    }

    fn launch_sequence(
        &self,
        session: &mut Session,
        key: &str,
        items: &[Value],
        collab: &Collaborators<'_>,
    ) -> Result<Outcome, DispatchError> {
        let post = plain_post(session);
        let mut values = Vec::new();
        for (idx, item) in items.iter().enumerate() {
            let command = classify(item).map_err(|err| {
                warn!(key, idx, error = %err, "misconfigured sequence element");
                DispatchError::Configuration {
                    key: format!("{key}[{idx}]"),
                    reason: err.to_string(),
                }
            })?;
            let outcome = self.launch_with(session, key, &command, post, collab)?;
            if outcome.interrupts() {
                debug!(key, idx, "sequence interrupted");
                return Ok(outcome);
            }
            if let Outcome::Done { value } = outcome {
                values.push(value);
            }
        }
        if values.is_empty() {
            return Ok(Outcome::Empty);
        }
        Ok(Outcome::Done {
            value: Value::Array(values),
        })
    }

    /// Non-blocking value of a plain string: a key of the current block, a
    /// block of the current document, or a display wrapper.
    fn plain_value(&self, text: &str, session: &Session, collab: &Collaborators<'_>) -> Value {
        if let Ok((doc, block)) = self.current_document(session, collab) {
            if let Some((_, command)) = doc.lookup_key(&block, text) {
                return command.clone();
            }
            if let Some(entries) = doc.block(text) {
                return Value::Object(entries.clone());
            }
        }
        json!({ "display": text })
    }

    fn present(&self, outcome: Outcome, blocking: bool, collab: &Collaborators<'_>) -> Outcome {
        match outcome {
            Outcome::Done { value } if blocking => {
                collab.display.show(&Payload::from_value(value));
                Outcome::Empty
            }
            other => other,
        }
    }

    fn open_menu(
        &self,
        session: &mut Session,
        key: &str,
        spec: &MenuSpec,
        post: PostAction,
        collab: &Collaborators<'_>,
    ) -> Result<Outcome, DispatchError> {
        let options = MenuOptions {
            title: spec.title.clone(),
            allow_back: spec.allow_back && post.allows_back(),
            multi: spec.multi,
        };
        let model = match build_menu(menu_source(&spec.items, session, collab), &options) {
            Ok(model) => model,
            Err(err) => {
                warn!(key, error = %err, "menu could not be built");
                let kind = match err {
                    MenuError::Source(_) => ErrorKind::Action,
                    MenuError::Empty => ErrorKind::Validation,
                };
                return Ok(Outcome::failed(kind, err.to_string()));
            }
        };
        let view = MenuView {
            model,
            density: self.density,
            banner: session
                .breadcrumbs()
                .trail(session.scope())
                .iter()
                .map(ToString::to_string)
                .collect(),
        };

        if is_blocking(session) {
            return self.interact(session, view, collab);
        }
        let pending = PendingMenu {
            key: key.to_string(),
            view,
            post,
        };
        let prompt = pending.prompt();
        session.set_pending(pending);
        Ok(Outcome::Pending { prompt })
    }

    /// Blocking render/prompt loop. Bad input re-prompts; end of input aborts.
    fn interact(
        &self,
        session: &mut Session,
        mut view: MenuView,
        collab: &Collaborators<'_>,
    ) -> Result<Outcome, DispatchError> {
        loop {
            collab.display.render(&view);
            let Some(input) = collab.prompter.prompt(SELECT_PROMPT) else {
                debug!("input closed at menu");
                return Ok(Outcome::Abort);
            };
            match resolve(&view.model, &input) {
                Ok(Selection::Narrowed(model)) => view.model = model,
                Ok(selection) => return self.launch_selection(session, selection, collab),
                Err(err) => collab.display.show(&Payload::Message(err.to_string())),
            }
        }
    }

    fn launch_selection(
        &self,
        session: &mut Session,
        selection: Selection,
        collab: &Collaborators<'_>,
    ) -> Result<Outcome, DispatchError> {
        match selection {
            Selection::Single(item) => self.launch_item(session, &item, collab),
            Selection::Multi(items) => {
                let mut values = Vec::new();
                for item in &items {
                    let outcome = self.launch_item(session, item, collab)?;
                    if outcome.interrupts() {
                        return Ok(outcome);
                    }
                    if let Outcome::Done { value } = outcome {
                        values.push(value);
                    }
                }
                if values.is_empty() {
                    return Ok(Outcome::Empty);
                }
                Ok(Outcome::Done {
                    value: Value::Array(values),
                })
            }
            Selection::Narrowed(_) => Ok(Outcome::failed(
                ErrorKind::Validation,
                "selection is still ambiguous",
            )),
        }
    }

    /// Launch what a menu item points at: a key of the current block, a
    /// block of the current document, or the target as a command itself.
    fn launch_item(
        &self,
        session: &mut Session,
        item: &MenuItem,
        collab: &Collaborators<'_>,
    ) -> Result<Outcome, DispatchError> {
        if item.back {
            return Ok(Outcome::Back);
        }
        debug!(label = %item.label, target = %item.target, "menu selection");

        if let Some(location) = session.current_location() {
            let doc = links::load_document(collab.loader, &location.path)?;
            if let Some((written, command)) = doc.lookup_key(&location.block, &item.target) {
                let written = written.to_string();
                let command = command.clone();
                return self.dispatch(session, &written, &command, collab);
            }
            if doc.has_block(&item.target) {
                let to = Location::new(location.path, item.target.clone());
                session.relocate(to.clone(), "jump");
                info!(to = %to, "jumped to block");
                return Ok(Outcome::Relocated { location: to });
            }
        }

        let target = Value::String(item.target.clone());
        match classify(&target) {
            Ok(Command::Plain(_)) => Ok(Outcome::done(target)),
            Ok(command) => {
                let post = plain_post(session);
                self.launch_with(session, &item.target, &command, post, collab)
            }
            Err(err) => Err(DispatchError::Configuration {
                key: item.target.clone(),
                reason: err.to_string(),
            }),
        }
    }
}

fn is_blocking(session: &Session) -> bool {
    session.mode() == Mode::Blocking
}

fn plain_post(session: &Session) -> PostAction {
    PostAction {
        modifiers: Modifiers::default(),
        mode: session.mode(),
    }
}

fn display_payload(value: &Value, session: &Session) -> Payload {
    match value {
        Value::String(text) => Payload::Text(render_display(text, session)),
        other => Payload::from_value(other.clone()),
    }
}

/// Menu items from a spec: a `call(..)` instruction becomes a dynamic
/// source answered by the function collaborator.
fn menu_source<'a>(
    items: &Value,
    session: &'a Session,
    collab: &'a Collaborators<'a>,
) -> MenuSource<'a> {
    if let Value::String(text) = items
        && let Ok(Command::Call { name, args }) = classify(items)
    {
        debug!(function = %name, instruction = %text, "dynamic menu source");
        return MenuSource::Dynamic(Box::new(move || {
            let request = InvokeRequest {
                name: &name,
                args: &Value::Array(args),
                session,
            };
            match collab.functions.invoke(&request)? {
                Reply::Ok(value) => Ok(value),
                Reply::Failed(message) => Err(anyhow!(message)),
                Reply::Abort => Err(anyhow!("menu source aborted")),
            }
        }));
    }
    MenuSource::from_value(items.clone())
}

#[instrument(skip_all, fields(name = %name))]
fn invoke(target: &dyn Invoke, name: &str, args: &Value, session: &Session) -> Outcome {
    let request = InvokeRequest {
        name,
        args,
        session,
    };
    match target.invoke(&request) {
        Ok(Reply::Ok(value)) => Outcome::done(value),
        Ok(Reply::Failed(message)) => {
            debug!(name, message = %message, "collaborator reported failure");
            Outcome::failed(ErrorKind::Action, message)
        }
        Ok(Reply::Abort) => Outcome::Abort,
        Err(err) => {
            warn!(name, error = %format!("{err:#}"), "collaborator call failed");
            Outcome::failed(ErrorKind::Action, format!("{err:#}"))
        }
    }
}
