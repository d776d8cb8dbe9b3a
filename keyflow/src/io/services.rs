//! The filesystem-backed collaborator set shared by the CLI and the server.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;

use crate::core::collab::{Collaborators, Display, Invoke, Prompter};
use crate::io::auth::RoleAuthorizer;
use crate::io::config::EngineConfig;
use crate::io::datastore::JsonTableStore;
use crate::io::documents::FsLoader;
use crate::io::functions::FunctionRegistry;
use crate::io::resources::FsResources;
use crate::io::workflows::ProcessWorkflows;

/// Thread-safe collaborators; the host adds display, prompter and dialogs.
pub struct Services {
    pub loader: FsLoader,
    pub auth: RoleAuthorizer,
    pub functions: FunctionRegistry,
    pub workflows: ProcessWorkflows,
    pub data: JsonTableStore,
    pub resources: FsResources,
}

impl Services {
    /// Build from a config whose directories are already resolved
    /// against `root`.
    pub fn from_config(config: &EngineConfig, root: &Path) -> Result<Self> {
        Ok(Self {
            loader: FsLoader::new(&config.documents_dir)?,
            auth: RoleAuthorizer,
            functions: FunctionRegistry::with_builtins(),
            workflows: ProcessWorkflows::new(
                root,
                Duration::from_secs(config.workflow_timeout_secs),
                config.workflow_output_limit_bytes,
            ),
            data: JsonTableStore::new(&config.data_dir),
            resources: FsResources::new(root),
        })
    }

    pub fn collab<'a>(
        &'a self,
        display: &'a dyn Display,
        prompter: &'a dyn Prompter,
        dialogs: &'a dyn Invoke,
    ) -> Collaborators<'a> {
        Collaborators {
            loader: &self.loader,
            display,
            auth: &self.auth,
            prompter,
            functions: &self.functions,
            workflows: &self.workflows,
            data: &self.data,
            dialogs,
            resources: &self.resources,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::session::Session;
    use crate::core::types::{Mode, Outcome};
    use crate::engine::Engine;
    use crate::io::detached::{Detached, NoInput, Unsupported};
    use crate::io::init::{InitOptions, init_project};
    use serde_json::json;

    #[test]
    fn scaffolded_project_dispatches_non_blocking() {
        let temp = tempfile::tempdir().expect("tempdir");
        init_project(temp.path(), &InitOptions { force: false }).expect("init");
        let config = EngineConfig {
            mode: Mode::NonBlocking,
            ..EngineConfig::default()
        }
        .resolve_paths(temp.path());
        let services = Services::from_config(&config, temp.path()).expect("services");
        let dialogs = Unsupported("dialogs");
        let collab = services.collab(&Detached, &NoInput, &dialogs);

        let engine = Engine::new(&config);
        let mut session = Session::new(Mode::NonBlocking);
        engine.start(&mut session, "/main", &collab).expect("start");
        engine
            .dispatch_key(&mut session, "start", &collab)
            .expect("menu");
        let outcome = engine
            .resume(&mut session, "Greet", &collab)
            .expect("select");
        assert!(matches!(outcome, Outcome::Relocated { .. }));

        let outcome = engine
            .dispatch_key(&mut session, "hello", &collab)
            .expect("hello");
        assert_eq!(outcome, Outcome::done(json!("hello from keyflow")));
    }
}
