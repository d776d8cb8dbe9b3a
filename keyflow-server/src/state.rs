//! Shared application state for the session server.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Result;
use tokio::sync::Mutex;
use tokio::task::{self, JoinError};

use keyflow::core::collab::Collaborators;
use keyflow::core::session::Session;
use keyflow::core::types::Mode;
use keyflow::engine::Engine;
use keyflow::io::config::EngineConfig;
use keyflow::io::detached::{Detached, NoInput, Unsupported};
use keyflow::io::services::Services;

pub type SessionId = u64;

/// One live session; its lock is held for a whole dispatch.
pub type SharedSession = Arc<Mutex<Session>>;

/// Shared state accessible from all request handlers.
#[derive(Clone)]
pub struct AppState {
    engine: Arc<Engine>,
    services: Arc<Services>,
    /// Live sessions; the map lock only covers lookup and insertion.
    sessions: Arc<Mutex<HashMap<SessionId, SharedSession>>>,
    next_id: Arc<AtomicU64>,
}

impl AppState {
    /// `config` directories must already be resolved against `project_dir`.
    pub fn new(config: &EngineConfig, project_dir: &Path) -> Result<Self> {
        Ok(Self {
            engine: Arc::new(Engine::new(config)),
            services: Arc::new(Services::from_config(config, project_dir)?),
            sessions: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(1)),
        })
    }

    pub fn next_id(&self) -> SessionId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn new_session(&self) -> Session {
        Session::new(Mode::NonBlocking)
    }

    pub async fn session(&self, id: SessionId) -> Option<SharedSession> {
        self.sessions.lock().await.get(&id).cloned()
    }

    pub async fn insert(&self, id: SessionId, session: SharedSession) {
        self.sessions.lock().await.insert(id, session);
    }

    pub async fn remove(&self, id: SessionId) -> Option<SharedSession> {
        self.sessions.lock().await.remove(&id)
    }

    /// Run `f` against one session on the blocking pool.
    ///
    /// Dispatch is synchronous and may wait on a workflow process.
    pub async fn run_blocking<R, F>(&self, session: SharedSession, f: F) -> Result<R, JoinError>
    where
        R: Send + 'static,
        F: FnOnce(&Engine, &Collaborators<'_>, &mut Session) -> R + Send + 'static,
    {
        let state = self.clone();
        task::spawn_blocking(move || {
            let mut session = session.blocking_lock();
            state.with_collab(|engine, collab| f(engine, collab, &mut *session))
        })
        .await
    }

    /// Run `f` against the detached collaborator set.
    fn with_collab<R>(&self, f: impl FnOnce(&Engine, &Collaborators<'_>) -> R) -> R {
        let dialogs = Unsupported("dialogs");
        let collab = self.services.collab(&Detached, &NoInput, &dialogs);
        f(&self.engine, &collab)
    }
}
