//! Project scaffolding for `keyflow init`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};

use super::config::{CONFIG_FILE, EngineConfig, write_config};

/// Canonical paths of a scaffolded project.
#[derive(Debug, Clone)]
pub struct ProjectPaths {
    pub root: PathBuf,
    pub config_path: PathBuf,
    pub documents_dir: PathBuf,
    pub data_dir: PathBuf,
    pub main_document: PathBuf,
}

impl ProjectPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let config = EngineConfig::default();
        let documents_dir = root.join(&config.documents_dir);
        Self {
            config_path: root.join(CONFIG_FILE),
            data_dir: root.join(&config.data_dir),
            main_document: documents_dir.join("main.json"),
            documents_dir,
            root,
        }
    }
}

/// Options for `init_project`.
#[derive(Debug, Clone)]
pub struct InitOptions {
    /// If true, overwrite an existing config and demo document.
    pub force: bool,
}

/// Create `keyflow.toml`, `documents/main.json` and `data/` in `root`.
///
/// Fails if `keyflow.toml` already exists unless `options.force` is set.
pub fn init_project(root: &Path, options: &InitOptions) -> Result<ProjectPaths> {
    let paths = ProjectPaths::new(root);
    if paths.config_path.exists() && !options.force {
        return Err(anyhow!(
            "keyflow init: {CONFIG_FILE} already exists (use --force to overwrite)"
        ));
    }

    create_dir(&paths.documents_dir)?;
    create_dir(&paths.data_dir)?;
    write_config(&paths.config_path, &EngineConfig::default())?;
    fs::write(&paths.main_document, DEMO_DOCUMENT)
        .with_context(|| format!("write file {}", paths.main_document.display()))?;
    Ok(paths)
}

fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).with_context(|| format!("create directory {}", path.display()))
}

const DEMO_DOCUMENT: &str = r#"{
  "main": {
    "welcome": {"display": "Welcome to keyflow, {{ user or \"guest\" }}."},
    "start*": ["Greet", "Users"]
  },
  "Greet": {
    "hello": "call(echo, \"hello from keyflow\")"
  },
  "Users": {
    "list": {"action": "list", "table": "users"}
  }
}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::check_document;
    use crate::core::collab::Loader;
    use crate::io::config::load_config;
    use crate::io::documents::FsLoader;

    #[test]
    fn init_creates_expected_layout() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = init_project(temp.path(), &InitOptions { force: false }).expect("init");

        assert!(paths.config_path.is_file());
        assert!(paths.documents_dir.is_dir());
        assert!(paths.data_dir.is_dir());
        assert_eq!(
            load_config(&paths.config_path).expect("config"),
            EngineConfig::default()
        );

        let doc = FsLoader::new(&paths.documents_dir)
            .expect("loader")
            .load("/main")
            .expect("demo document loads");
        assert!(check_document(&doc).is_empty());
    }

    #[test]
    fn init_without_force_refuses_existing_project() {
        let temp = tempfile::tempdir().expect("tempdir");
        init_project(temp.path(), &InitOptions { force: false }).expect("init");
        let err = init_project(temp.path(), &InitOptions { force: false }).unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn init_with_force_restores_the_demo_document() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = init_project(temp.path(), &InitOptions { force: false }).expect("init");
        fs::write(&paths.main_document, "custom").expect("write custom");

        init_project(temp.path(), &InitOptions { force: true }).expect("re-init");
        assert_eq!(
            fs::read_to_string(&paths.main_document).expect("read"),
            DEMO_DOCUMENT
        );
    }
}
