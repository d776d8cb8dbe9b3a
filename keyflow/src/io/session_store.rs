//! Session persistence between `keyflow run` invocations.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use crate::core::session::Session;
use crate::core::types::Mode;
use crate::io::config::write_atomic;

/// Load a saved session, re-attaching the runtime `mode`.
///
/// Returns `None` when the file does not exist yet.
pub fn load_session(path: &Path, mode: Mode) -> Result<Option<Session>> {
    if !path.exists() {
        debug!(path = %path.display(), "no saved session");
        return Ok(None);
    }
    let contents =
        fs::read_to_string(path).with_context(|| format!("read session {}", path.display()))?;
    let session: Session = serde_json::from_str(&contents)
        .with_context(|| format!("parse session {}", path.display()))?;
    debug!(
        path = %path.display(),
        at = ?session.current_location().map(|loc| loc.to_string()),
        history = session.history().len(),
        "session loaded"
    );
    Ok(Some(session.with_mode(mode)))
}

/// Atomically write a session to disk (temp file + rename).
pub fn write_session(path: &Path, session: &Session) -> Result<()> {
    debug!(path = %path.display(), scope = session.scope(), "writing session");
    let mut buf = serde_json::to_string_pretty(session)?;
    buf.push('\n');
    write_atomic(path, &buf)
}
