//! Static document checks for `keyflow check`.
//!
//! Every command of every block is classified without executing anything.

use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::core::collab::Document;
use crate::core::command::{Command, MenuSpec, classify};
use crate::core::link::{LinkExpr, PathRef};
use crate::core::modifiers::parse_key;

/// A single problem found in a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Problem {
    pub block: String,
    pub key: String,
    pub message: String,
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}: {}", self.block, self.key, self.message)
    }
}

pub fn check_document(doc: &Document) -> Vec<Problem> {
    let mut problems = Vec::new();
    if doc.block_names().next().is_none() {
        problems.push(Problem {
            block: String::new(),
            key: String::new(),
            message: "document has no blocks".to_string(),
        });
    }
    for block in doc.block_names() {
        let Some(entries) = doc.block(block) else {
            continue;
        };
        for (key, command) in entries {
            let mut report = |message: String| {
                problems.push(Problem {
                    block: block.to_string(),
                    key: key.clone(),
                    message,
                });
            };
            let (_, modifiers) = parse_key(key);
            if modifiers.auto_menu()
                && let Some(spec) = MenuSpec::from_auto(command)
            {
                check_menu(&spec, &mut report);
                continue;
            }
            check_command(doc, command, &mut report);
        }
    }
    problems
}

fn check_command(doc: &Document, command: &Value, report: &mut impl FnMut(String)) {
    match classify(command) {
        Err(err) => report(err.to_string()),
        Ok(Command::Malformed { text, reason }) => {
            report(format!("malformed instruction '{text}': {reason}"));
        }
        Ok(Command::Link(expr)) => check_link(doc, &expr, report),
        Ok(Command::Menu(spec)) => check_menu(&spec, report),
        Ok(Command::Sequence(items)) => {
            for item in &items {
                check_command(doc, item, report);
            }
        }
        Ok(_) => {}
    }
}

fn check_link(doc: &Document, expr: &str, report: &mut impl FnMut(String)) {
    match LinkExpr::parse(expr) {
        Err(err) => report(err.to_string()),
        Ok(link) => {
            if link.target == PathRef::SameDocument
                && let Some(block) = &link.block
                && !doc.has_block(block)
            {
                report(format!("link '{expr}' names missing block '{block}'"));
            }
        }
    }
}

fn check_menu(spec: &MenuSpec, report: &mut impl FnMut(String)) {
    let empty = match &spec.items {
        Value::Null => true,
        Value::String(text) => text.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    };
    if empty {
        report("menu has no items".to_string());
    }
}
