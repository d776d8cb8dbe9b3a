//! Per-user navigation state.
//!
//! A session is owned by exactly one caller at a time and threaded through
//! every engine call as `&mut Session`. Fields are private; the persisted
//! shape is `{current_path, current_block, scope, breadcrumbs, history}`.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::core::breadcrumbs::{Back, Breadcrumbs};
use crate::core::command::Command;
use crate::core::history::History;
use crate::core::link::Location;
use crate::core::menu::MenuView;
use crate::core::modifiers::PostAction;
use crate::core::types::{Mode, Prompt};

/// Scope used until a document opens its own.
pub const ROOT_SCOPE: &str = "root";

/// Identity handed to the authorizer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub roles: BTreeSet<String>,
}

impl AuthContext {
    pub fn with_roles<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            user: None,
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some() || !self.roles.is_empty()
    }
}

/// Menu suspended in non-blocking mode until the client answers.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingMenu {
    pub key: String,
    pub view: MenuView,
    pub post: PostAction,
}

impl PendingMenu {
    pub fn prompt(&self) -> Prompt {
        Prompt {
            key: self.key.clone(),
            view: self.view.clone(),
        }
    }
}

/// Required action that failed in non-blocking mode; `resume` runs it again.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingRetry {
    pub key: String,
    pub command: Command,
    pub post: PostAction,
    /// Launches so far, counted against the retry limit.
    pub attempts: u32,
}

/// Work suspended until the client answers.
#[derive(Debug, Clone, PartialEq)]
pub enum Pending {
    Menu(PendingMenu),
    Retry(PendingRetry),
}

impl Pending {
    pub fn key(&self) -> &str {
        match self {
            Pending::Menu(menu) => &menu.key,
            Pending::Retry(retry) => &retry.key,
        }
    }
}

impl From<PendingMenu> for Pending {
    fn from(menu: PendingMenu) -> Self {
        Pending::Menu(menu)
    }
}

impl From<PendingRetry> for Pending {
    fn from(retry: PendingRetry) -> Self {
        Pending::Retry(retry)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    current_path: Option<String>,
    current_block: Option<String>,
    scope: String,
    #[serde(default)]
    breadcrumbs: Breadcrumbs,
    #[serde(default)]
    history: History,
    #[serde(skip)]
    pending: Option<Pending>,
    #[serde(skip)]
    mode: Mode,
    #[serde(skip)]
    auth: AuthContext,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(Mode::default())
    }
}

impl Session {
    pub fn new(mode: Mode) -> Self {
        Self {
            current_path: None,
            current_block: None,
            scope: ROOT_SCOPE.to_string(),
            breadcrumbs: Breadcrumbs::new(),
            history: History::new(),
            pending: None,
            mode,
            auth: AuthContext::default(),
        }
    }

    /// Re-attach runtime-only settings after loading a persisted session.
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn current_path(&self) -> Option<&str> {
        self.current_path.as_deref()
    }

    pub fn current_block(&self) -> Option<&str> {
        self.current_block.as_deref()
    }

    pub fn current_location(&self) -> Option<Location> {
        match (&self.current_path, &self.current_block) {
            (Some(path), Some(block)) => Some(Location::new(path.clone(), block.clone())),
            _ => None,
        }
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn breadcrumbs(&self) -> &Breadcrumbs {
        &self.breadcrumbs
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn auth(&self) -> &AuthContext {
        &self.auth
    }

    pub fn set_auth(&mut self, auth: AuthContext) {
        self.auth = auth;
    }

    /// Make `location` current: breadcrumb push, history entry, then the move.
    ///
    /// Callers perform every check before calling this; it never fails.
    pub fn relocate(&mut self, location: Location, context: &str) {
        self.breadcrumbs.push(&self.scope, location.clone());
        self.history.record(location.clone(), context);
        self.current_path = Some(location.path);
        self.current_block = Some(location.block);
    }

    /// Drop the trail tail of the active scope and move to the new tail.
    pub fn step_back(&mut self) -> Back {
        let back = self.breadcrumbs.back(&self.scope);
        if let Back::To(location) = &back {
            self.history.record(location.clone(), "back");
            self.current_path = Some(location.path.clone());
            self.current_block = Some(location.block.clone());
        }
        back
    }

    /// Switch the active breadcrumb scope. Existing trails are kept.
    pub fn enter_scope(&mut self, scope: impl Into<String>) {
        self.scope = scope.into();
    }

    /// Remove a scope's trail; the active scope falls back to the root.
    pub fn teardown_scope(&mut self, scope: &str) {
        self.breadcrumbs.teardown(scope);
        if self.scope == scope {
            self.scope = ROOT_SCOPE.to_string();
        }
    }

    /// Push the current location unless it is already the trail tail.
    ///
    /// Only changes the trail after `step_back` emptied it or the scope
    /// switched without a relocation.
    pub fn checkpoint(&mut self) -> bool {
        match self.current_location() {
            Some(location) => self.breadcrumbs.push(&self.scope, location),
            None => false,
        }
    }

    pub fn pending(&self) -> Option<&Pending> {
        self.pending.as_ref()
    }

    pub fn set_pending(&mut self, pending: impl Into<Pending>) {
        self.pending = Some(pending.into());
    }

    pub fn take_pending(&mut self) -> Option<Pending> {
        self.pending.take()
    }

    pub fn clear_pending(&mut self) {
        self.pending = None;
    }
}
