//! Link expressions and document locations.
//!
//! Textual form: `<path>[.<Block>][?<predicate>]`, where `<path>` is one of
//! `/abs/doc`, `./doc`, `../doc` (any depth), a bare `doc` (same directory),
//! or empty for a same-document jump written `.Block`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// A named entry point inside a document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Location {
    pub path: String,
    pub block: String,
}

impl Location {
    pub fn new(path: impl Into<String>, block: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            block: block.into(),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.path, self.block)
    }
}

impl FromStr for Location {
    type Err = LinkParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (path, block) = split_block(s);
        let block = block.ok_or_else(|| LinkParseError::MissingBlock(s.to_string()))?;
        if path.is_empty() {
            return Err(LinkParseError::MissingDocument(s.to_string()));
        }
        validate_block(block)?;
        Ok(Location::new(path, block))
    }
}

impl Serialize for Location {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Location {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkParseError {
    #[error("empty link expression")]
    Empty,
    #[error("link '{0}' does not name a document")]
    MissingDocument(String),
    #[error("location '{0}' has no entry point")]
    MissingBlock(String),
    #[error("invalid entry point '{0}'")]
    InvalidBlock(String),
    #[error("empty permission predicate in '{0}'")]
    EmptyPredicate(String),
}

/// How the document part of a link is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathRef {
    /// `/app/doc`
    Absolute(String),
    /// `./doc`
    Here(String),
    /// `doc`, resolved like `./doc`
    Bare(String),
    /// `../doc`, `../../doc`, ...
    Up { levels: usize, rest: String },
    /// `.Block` with no document part
    SameDocument,
}

/// Parsed cross-document navigation target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkExpr {
    pub target: PathRef,
    /// `None` means the target document's default entry point.
    pub block: Option<String>,
    /// `None` means publicly navigable.
    pub permission: Option<String>,
}

impl LinkExpr {
    pub fn parse(expr: &str) -> Result<Self, LinkParseError> {
        let expr = expr.trim();
        if expr.is_empty() {
            return Err(LinkParseError::Empty);
        }

        let (body, permission) = match expr.rsplit_once('?') {
            Some((body, predicate)) => {
                let predicate = predicate.trim();
                if predicate.is_empty() {
                    return Err(LinkParseError::EmptyPredicate(expr.to_string()));
                }
                (body.trim(), Some(predicate.to_string()))
            }
            None => (expr, None),
        };

        if let Some(block) = same_document_block(body) {
            validate_block(block)?;
            return Ok(LinkExpr {
                target: PathRef::SameDocument,
                block: Some(block.to_string()),
                permission,
            });
        }

        let (path, block) = split_block(body);
        if let Some(block) = block {
            validate_block(block)?;
        }
        let target = parse_path(path).ok_or_else(|| LinkParseError::MissingDocument(expr.to_string()))?;
        Ok(LinkExpr {
            target,
            block: block.map(str::to_string),
            permission,
        })
    }

    /// Absolute document path for this link, relative to `current_path`.
    pub fn resolve_path(&self, current_path: &str) -> String {
        match &self.target {
            PathRef::Absolute(path) => normalize(segments(path)),
            PathRef::SameDocument => normalize(segments(current_path)),
            PathRef::Here(rest) | PathRef::Bare(rest) => {
                let mut base = parent_segments(current_path);
                base.extend(segments(rest));
                normalize(base)
            }
            PathRef::Up { levels, rest } => {
                let mut base = parent_segments(current_path);
                let keep = base.len().saturating_sub(*levels);
                base.truncate(keep);
                base.extend(segments(rest));
                normalize(base)
            }
        }
    }
}

impl fmt::Display for LinkExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.target {
            PathRef::Absolute(path) => write!(f, "{path}")?,
            PathRef::Here(rest) => write!(f, "./{rest}")?,
            PathRef::Bare(rest) => write!(f, "{rest}")?,
            PathRef::Up { levels, rest } => write!(f, "{}{rest}", "../".repeat(*levels))?,
            PathRef::SameDocument => {}
        }
        if let Some(block) = &self.block {
            write!(f, ".{block}")?;
        }
        if let Some(predicate) = &self.permission {
            write!(f, "?{predicate}")?;
        }
        Ok(())
    }
}

impl FromStr for LinkExpr {
    type Err = LinkParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LinkExpr::parse(s)
    }
}

/// Split `path.Block` at the last `.` that follows the last `/`.
fn split_block(body: &str) -> (&str, Option<&str>) {
    let name_start = body.rfind('/').map(|idx| idx + 1).unwrap_or(0);
    match body[name_start..].rfind('.') {
        // A leading dot belongs to `.`/`..` path segments, not to a block.
        Some(0) => (body, None),
        Some(offset) => {
            let dot = name_start + offset;
            (&body[..dot], Some(&body[dot + 1..]))
        }
        None => (body, None),
    }
}

fn same_document_block(body: &str) -> Option<&str> {
    let rest = body.strip_prefix('.')?;
    if rest.starts_with('.') || rest.starts_with('/') || rest.contains('/') {
        return None;
    }
    Some(rest)
}

fn parse_path(path: &str) -> Option<PathRef> {
    if path.is_empty() {
        return None;
    }
    if path.starts_with('/') {
        return (!segments(path).is_empty()).then(|| PathRef::Absolute(path.to_string()));
    }
    if let Some(rest) = path.strip_prefix("./") {
        return (!rest.is_empty()).then(|| PathRef::Here(rest.to_string()));
    }
    if path.starts_with("../") {
        let mut levels = 0;
        let mut rest = path;
        while let Some(stripped) = rest.strip_prefix("../") {
            levels += 1;
            rest = stripped;
        }
        if rest.is_empty() || rest == ".." {
            return None;
        }
        return Some(PathRef::Up {
            levels,
            rest: rest.to_string(),
        });
    }
    if path == "." || path == ".." {
        return None;
    }
    Some(PathRef::Bare(path.to_string()))
}

fn validate_block(block: &str) -> Result<(), LinkParseError> {
    if block.is_empty() || block.chars().any(|c| c.is_whitespace() || c == '/') {
        return Err(LinkParseError::InvalidBlock(block.to_string()));
    }
    Ok(())
}

fn segments(path: &str) -> Vec<&str> {
    path.split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect()
}

fn parent_segments(path: &str) -> Vec<&str> {
    let mut parts = segments(path);
    parts.pop();
    parts
}

fn normalize(parts: Vec<&str>) -> String {
    let mut out: Vec<&str> = Vec::with_capacity(parts.len());
    for part in parts {
        if part == ".." {
            out.pop();
        } else {
            out.push(part);
        }
    }
    format!("/{}", out.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sibling_link_resolves_against_current_document() {
        let current: Location = "/app/docs/current.Start".parse().expect("location");
        let link = LinkExpr::parse("../siblingDoc.Entry").expect("parse");
        assert_eq!(link.resolve_path(&current.path), "/app/siblingDoc");
        assert_eq!(link.block.as_deref(), Some("Entry"));
        assert_eq!(link.permission, None);
    }

    #[test]
    fn path_styles_resolve() {
        let current = "/app/docs/current";
        let cases = [
            ("/abs/doc", "/abs/doc"),
            ("./here", "/app/docs/here"),
            ("bare", "/app/docs/bare"),
            ("../up", "/app/up"),
            ("../../top", "/top"),
            ("../../../../past_root", "/past_root"),
            ("./nested/deeper", "/app/docs/nested/deeper"),
        ];
        for (expr, expected) in cases {
            let link = LinkExpr::parse(expr).expect("parse");
            assert_eq!(link.resolve_path(current), expected, "expr {expr}");
            assert_eq!(link.block, None, "expr {expr}");
        }
    }

    #[test]
    fn same_document_jump() {
        let link = LinkExpr::parse(".Settings").expect("parse");
        assert_eq!(link.target, PathRef::SameDocument);
        assert_eq!(link.resolve_path("/app/main"), "/app/main");
        assert_eq!(link.block.as_deref(), Some("Settings"));
    }

    #[test]
    fn permission_predicate_is_split_off() {
        let link = LinkExpr::parse("/admin/panel.Users?role:admin").expect("parse");
        assert_eq!(link.permission.as_deref(), Some("role:admin"));
        assert_eq!(link.block.as_deref(), Some("Users"));
        assert_eq!(link.resolve_path("/"), "/admin/panel");
    }

    #[test]
    fn round_trips_every_path_style() {
        for expr in [
            "/app/doc",
            "/app/doc.Entry",
            "./doc.Entry",
            "../doc",
            "../doc.Entry?admin",
            "../../doc.Entry",
            "doc.Entry",
            ".Entry",
        ] {
            let link = LinkExpr::parse(expr).expect("parse");
            assert_eq!(link.to_string(), expr);
            assert_eq!(LinkExpr::parse(&link.to_string()).expect("reparse"), link);
        }
    }

    #[test]
    fn malformed_links_are_rejected() {
        assert_eq!(LinkExpr::parse("  "), Err(LinkParseError::Empty));
        assert!(matches!(
            LinkExpr::parse("doc?"),
            Err(LinkParseError::EmptyPredicate(_))
        ));
        assert!(matches!(
            LinkExpr::parse("../"),
            Err(LinkParseError::MissingDocument(_))
        ));
        assert!(matches!(
            LinkExpr::parse("doc."),
            Err(LinkParseError::InvalidBlock(_))
        ));
        assert!(matches!(
            LinkExpr::parse("/"),
            Err(LinkParseError::MissingDocument(_))
        ));
    }

    #[test]
    fn location_round_trips_through_serde() {
        let location = Location::new("/app/docs/current", "Start");
        let json = serde_json::to_string(&location).expect("serialize");
        assert_eq!(json, "\"/app/docs/current.Start\"");
        let back: Location = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, location);
        assert!("/app/docs/current".parse::<Location>().is_err());
    }
}
