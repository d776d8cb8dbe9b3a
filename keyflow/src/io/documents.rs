//! Filesystem document loader with schema validation.
//!
//! A logical path `/app/settings` maps to `<documents_dir>/app/settings.json`
//! or, failing that, `<documents_dir>/app/settings.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use jsonschema::{Validator, validator_for};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::core::collab::{Document, LoadError, Loader};

const DOCUMENT_SCHEMA: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../schemas/document/v1.schema.json"
));

pub struct FsLoader {
    root: PathBuf,
    schema: Validator,
}

impl FsLoader {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let schema_value: Value =
            serde_json::from_str(DOCUMENT_SCHEMA).context("parse bundled document schema")?;
        let schema =
            validator_for(&schema_value).map_err(|err| anyhow!("invalid schema: {}", err))?;
        Ok(Self {
            root: root.into(),
            schema,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Candidate files for a logical path, JSON first.
    fn candidates(&self, path: &str) -> Option<[PathBuf; 2]> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        if segments.is_empty() || segments.iter().any(|s| *s == "." || *s == "..") {
            return None;
        }
        let base = segments.iter().fold(self.root.clone(), |acc, s| acc.join(s));
        Some([base.with_extension("json"), base.with_extension("toml")])
    }

    fn parse(&self, file: &Path) -> Result<Value> {
        let contents =
            fs::read_to_string(file).with_context(|| format!("read {}", file.display()))?;
        let value: Value = if file.extension().is_some_and(|ext| ext == "toml") {
            toml::from_str(&contents).with_context(|| format!("parse {}", file.display()))?
        } else {
            serde_json::from_str(&contents).with_context(|| format!("parse {}", file.display()))?
        };
        self.validate(&value)?;
        Ok(value)
    }

    fn validate(&self, value: &Value) -> Result<()> {
        if !self.schema.is_valid(value) {
            let messages = self
                .schema
                .iter_errors(value)
                .map(|err| err.to_string())
                .collect::<Vec<_>>();
            return Err(anyhow!(
                "document schema validation failed: {}",
                messages.join("; ")
            ));
        }
        Ok(())
    }
}

impl Loader for FsLoader {
    #[instrument(skip_all, fields(path = %path))]
    fn load(&self, path: &str) -> Result<Document, LoadError> {
        let Some(candidates) = self.candidates(path) else {
            return Err(LoadError::NotFound(path.to_string()));
        };
        let Some(file) = candidates.into_iter().find(|file| file.is_file()) else {
            debug!("no document file");
            return Err(LoadError::NotFound(path.to_string()));
        };
        let invalid = |err: anyhow::Error| LoadError::Invalid {
            path: path.to_string(),
            message: format!("{err:#}"),
        };
        let value = self.parse(&file).map_err(invalid)?;
        debug!(file = %file.display(), "loaded document");
        Document::from_value(path, value)
    }
}
