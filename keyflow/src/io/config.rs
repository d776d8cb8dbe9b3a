//! Engine configuration stored in `keyflow.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::menu::Density;
use crate::core::types::Mode;

pub const CONFIG_FILE: &str = "keyflow.toml";

/// Engine configuration (TOML).
///
/// Intended to be edited by humans. Missing fields fall back to defaults;
/// relative directories are resolved against the config file's directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    pub mode: Mode,
    pub density: Density,

    /// Attempts allowed for a `!` key before its failure is reported.
    /// `0` retries until success or abort.
    pub required_retry_limit: u32,

    /// Entry point used when a link names no block.
    pub default_block: String,

    pub documents_dir: PathBuf,
    pub data_dir: PathBuf,

    pub workflow_timeout_secs: u64,
    /// Truncate captured workflow output beyond this many bytes.
    pub workflow_output_limit_bytes: usize,

    /// Roles granted to the local CLI user.
    pub roles: Vec<String>,

    /// Keys dispatched by one `keyflow run` before it stops. `0` = unbounded.
    pub max_steps: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Blocking,
            density: Density::Full,
            required_retry_limit: 25,
            default_block: "main".to_string(),
            documents_dir: PathBuf::from("documents"),
            data_dir: PathBuf::from("data"),
            workflow_timeout_secs: 30,
            workflow_output_limit_bytes: 100_000,
            roles: Vec::new(),
            max_steps: 1_000,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.default_block.trim().is_empty() {
            return Err(anyhow!("default_block must be non-empty"));
        }
        if self.default_block.contains(['.', '/']) {
            return Err(anyhow!("default_block must not contain '.' or '/'"));
        }
        if self.workflow_timeout_secs == 0 {
            return Err(anyhow!("workflow_timeout_secs must be > 0"));
        }
        if self.workflow_output_limit_bytes == 0 {
            return Err(anyhow!("workflow_output_limit_bytes must be > 0"));
        }
        if self.roles.iter().any(|role| role.trim().is_empty()) {
            return Err(anyhow!("roles must not contain empty names"));
        }
        Ok(())
    }

    /// Make relative directories absolute against `root`.
    pub fn resolve_paths(mut self, root: &Path) -> Self {
        if self.documents_dir.is_relative() {
            self.documents_dir = root.join(&self.documents_dir);
        }
        if self.data_dir.is_relative() {
            self.data_dir = root.join(&self.data_dir);
        }
        self
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `EngineConfig::default()`.
pub fn load_config(path: &Path) -> Result<EngineConfig> {
    if !path.exists() {
        let cfg = EngineConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: EngineConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &EngineConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

pub(crate) fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp file {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}
