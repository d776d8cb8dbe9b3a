//! Text resources relative to a project root (`open(..)` and `read(..)`).

use std::fs;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::core::collab::{Invoke, InvokeRequest};
use crate::core::types::Reply;

pub struct FsResources {
    root: PathBuf,
}

impl FsResources {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `None` for absolute paths or paths leaving the root.
    fn resolve(&self, target: &str) -> Option<PathBuf> {
        let rel = Path::new(target);
        rel.components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
            .then(|| self.root.join(rel))
    }
}

impl Invoke for FsResources {
    #[instrument(skip_all, fields(verb = request.name))]
    fn invoke(&self, request: &InvokeRequest<'_>) -> Result<Reply> {
        let Some(target) = request.args.as_str() else {
            return Ok(Reply::Failed("resource target must be a string".to_string()));
        };
        let Some(path) = self.resolve(target) else {
            return Ok(Reply::Failed(format!("resource '{target}' is outside the project")));
        };
        if !path.is_file() {
            return Ok(Reply::Failed(format!("resource '{target}' not found")));
        }
        debug!(path = %path.display(), "reading resource");
        let contents =
            fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
        Ok(Reply::Ok(Value::String(contents)))
    }
}
