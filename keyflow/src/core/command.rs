//! Classification of raw command values into a closed [`Command`] enum.
//!
//! A command is either an instruction string (`verb(argument)` or the
//! `@name(args)` shorthand), a structured record with exactly one action
//! key, a data record, an array sequence, a plain value, or the no-op.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;

/// Record keys that select an action. Keys starting with `@` also count.
pub const ACTION_KEYS: &[&str] = &[
    "function", "link", "display", "dialog", "workflow", "read", "open", "menu",
];

/// Keys that mark a data-CRUD record when no action key is present.
pub const DATA_KEYS: &[&str] = &["action", "table", "model"];

static INSTRUCTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(@[A-Za-z_][\w.\-]*|call|link|open|read|run)\s*\(").expect("valid regex")
});

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// `null`, `""`, `{}` or `[]`.
    Empty,
    /// `call(name, args..)`, `@name(args..)`, `{"function": ..}` or `{"@name": ..}`.
    Call { name: String, args: Vec<Value> },
    Link(String),
    Open(String),
    Read(String),
    Workflow(Value),
    Display(Value),
    Dialog(Value),
    Menu(MenuSpec),
    Data(Map<String, Value>),
    Sequence(Vec<Value>),
    /// A string that is not an instruction (or a bare number/bool).
    Plain(String),
    /// A known verb whose argument could not be parsed.
    Malformed { text: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("record has several action keys: {}", .0.join(", "))]
    Ambiguous(Vec<String>),
    #[error("record has no recognized action key: {}", .0.join(", "))]
    Unrecognized(Vec<String>),
    #[error("invalid '{key}' value: {reason}")]
    Invalid { key: String, reason: String },
}

/// Menu requested by a `menu` record or produced by the auto-menu suffix.
#[derive(Debug, Clone, PartialEq)]
pub struct MenuSpec {
    /// List, map, scalar, or a `call(..)` instruction producing one of those.
    pub items: Value,
    pub title: Option<String>,
    pub allow_back: bool,
    pub multi: bool,
}

impl MenuSpec {
    pub fn new(items: Value) -> Self {
        Self {
            items,
            title: None,
            allow_back: true,
            multi: false,
        }
    }

    fn from_record(record: &Map<String, Value>) -> Self {
        Self {
            items: record.get("menu").cloned().unwrap_or(Value::Null),
            title: record.get("title").and_then(Value::as_str).map(str::to_string),
            allow_back: record
                .get("allow_back")
                .and_then(Value::as_bool)
                .unwrap_or(true),
            multi: record.get("multi").and_then(Value::as_bool).unwrap_or(false),
        }
    }

    /// Menu implied by a command under the `*` suffix, if the command is
    /// menu-shaped (list, plain map, menu record or plain value).
    pub fn from_auto(command: &Value) -> Option<Self> {
        match command {
            Value::Array(items) if !items.is_empty() => Some(Self::new(command.clone())),
            Value::Object(record) if record.contains_key("menu") => Some(Self::from_record(record)),
            Value::Object(record) => {
                let instruction = record
                    .keys()
                    .any(|key| is_action_key(key) || DATA_KEYS.contains(&key.as_str()));
                (!record.is_empty() && !instruction).then(|| Self::new(command.clone()))
            }
            Value::String(text) => {
                (!text.trim().is_empty() && !is_instruction(text)).then(|| Self::new(command.clone()))
            }
            _ => None,
        }
    }
}

pub fn is_action_key(key: &str) -> bool {
    ACTION_KEYS.contains(&key) || (key.len() > 1 && key.starts_with('@'))
}

pub fn is_instruction(text: &str) -> bool {
    INSTRUCTION_RE.is_match(text)
}

/// Classify a raw command value.
///
/// Record shape problems are configuration errors; a malformed instruction
/// string is reported as [`Command::Malformed`] so the caller can surface
/// it as a validation failure.
pub fn classify(value: &Value) -> Result<Command, CommandError> {
    match value {
        Value::Null => Ok(Command::Empty),
        Value::Bool(_) | Value::Number(_) => Ok(Command::Plain(value.to_string())),
        Value::String(text) if text.trim().is_empty() => Ok(Command::Empty),
        Value::String(text) => Ok(classify_text(text)),
        Value::Array(items) if items.is_empty() => Ok(Command::Empty),
        Value::Array(items) => Ok(Command::Sequence(items.clone())),
        Value::Object(record) if record.is_empty() => Ok(Command::Empty),
        Value::Object(record) => classify_record(record),
    }
}

fn classify_text(text: &str) -> Command {
    let Some(caps) = INSTRUCTION_RE.captures(text) else {
        return Command::Plain(text.to_string());
    };
    let verb = caps.get(1).map_or("", |m| m.as_str());
    let open = caps.get(0).map_or(0, |m| m.end());
    let inner = match instruction_body(text, open) {
        Ok(inner) => inner,
        Err(reason) => return malformed(text, reason),
    };
    let args = match split_args(inner) {
        Ok(args) => args,
        Err(reason) => return malformed(text, reason),
    };

    if let Some(name) = verb.strip_prefix('@') {
        return Command::Call {
            name: name.to_string(),
            args: args.iter().map(|arg| arg_value(arg)).collect(),
        };
    }

    match verb {
        "call" => {
            let mut parts = args.iter();
            match parts.next().map(|name| unquote(name)) {
                Some(name) if !name.is_empty() => Command::Call {
                    name,
                    args: parts.map(|arg| arg_value(arg)).collect(),
                },
                _ => malformed(text, "missing function name"),
            }
        }
        "run" if !inner.trim().is_empty() => Command::Workflow(Value::String(inner.trim().to_string())),
        "link" | "open" | "read" => {
            let target = unquote(inner.trim());
            if target.is_empty() {
                return malformed(text, "missing argument");
            }
            match verb {
                "link" => Command::Link(target),
                "open" => Command::Open(target),
                _ => Command::Read(target),
            }
        }
        _ => malformed(text, "missing argument"),
    }
}

fn malformed(text: &str, reason: &str) -> Command {
    Command::Malformed {
        text: text.to_string(),
        reason: reason.to_string(),
    }
}

/// Text between the verb's `(` and the matching final `)`.
fn instruction_body(text: &str, open: usize) -> Result<&str, &'static str> {
    let trimmed = text.trim_end();
    let Some(body) = trimmed.get(open..).and_then(|rest| rest.strip_suffix(')')) else {
        return Err("unbalanced parentheses");
    };
    check_balance(body)?;
    Ok(body)
}

fn check_balance(body: &str) -> Result<(), &'static str> {
    let mut depth: i32 = 0;
    let mut quote: Option<char> = None;
    for c in body.chars() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '(' | '[' | '{') => depth += 1,
            (None, ')' | ']' | '}') => {
                depth -= 1;
                if depth < 0 {
                    return Err("unbalanced parentheses");
                }
            }
            (None, _) => {}
        }
    }
    if quote.is_some() {
        return Err("unterminated quote");
    }
    if depth != 0 {
        return Err("unbalanced parentheses");
    }
    Ok(())
}

/// Split on top-level commas, respecting quotes and nesting.
fn split_args(body: &str) -> Result<Vec<String>, &'static str> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }
    let mut args = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    for c in body.chars() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '(' | '[' | '{') => depth += 1,
            (None, ')' | ']' | '}') => depth = depth.saturating_sub(1),
            (None, ',') if depth == 0 => {
                args.push(current.trim().to_string());
                current.clear();
                continue;
            }
            (None, _) => {}
        }
        current.push(c);
    }
    args.push(current.trim().to_string());
    if args.iter().any(String::is_empty) {
        return Err("empty argument");
    }
    Ok(args)
}

fn unquote(raw: &str) -> String {
    let raw = raw.trim();
    for q in ['"', '\''] {
        if raw.len() >= 2 && raw.starts_with(q) && raw.ends_with(q) {
            return raw[1..raw.len() - 1].to_string();
        }
    }
    raw.to_string()
}

/// Quoted text stays a string; JSON literals are parsed; anything else is text.
fn arg_value(raw: &str) -> Value {
    if raw.starts_with('\'') || raw.starts_with('"') {
        return Value::String(unquote(raw));
    }
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn classify_record(record: &Map<String, Value>) -> Result<Command, CommandError> {
    let action_keys: Vec<&String> = record.keys().filter(|key| is_action_key(key)).collect();
    match action_keys.as_slice() {
        [] => {
            if record.keys().any(|key| DATA_KEYS.contains(&key.as_str())) {
                Ok(Command::Data(record.clone()))
            } else {
                Err(CommandError::Unrecognized(record.keys().cloned().collect()))
            }
        }
        [key] => record_command(key, &record[key.as_str()], record),
        many => Err(CommandError::Ambiguous(
            many.iter().map(|key| (*key).clone()).collect(),
        )),
    }
}

fn record_command(key: &str, value: &Value, record: &Map<String, Value>) -> Result<Command, CommandError> {
    if let Some(name) = key.strip_prefix('@') {
        return Ok(Command::Call {
            name: name.to_string(),
            args: positional(value),
        });
    }
    let text = || {
        value
            .as_str()
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(str::to_string)
            .ok_or_else(|| CommandError::Invalid {
                key: key.to_string(),
                reason: "expected a non-empty string".to_string(),
            })
    };
    match key {
        "function" => function_record(value, record),
        "link" => text().map(Command::Link),
        "open" => text().map(Command::Open),
        "read" => text().map(Command::Read),
        "workflow" => Ok(Command::Workflow(value.clone())),
        "display" => Ok(Command::Display(value.clone())),
        "dialog" => Ok(Command::Dialog(value.clone())),
        "menu" => Ok(Command::Menu(MenuSpec::from_record(record))),
        other => Err(CommandError::Invalid {
            key: other.to_string(),
            reason: "unsupported action".to_string(),
        }),
    }
}

fn function_record(value: &Value, record: &Map<String, Value>) -> Result<Command, CommandError> {
    let invalid = |reason: &str| CommandError::Invalid {
        key: "function".to_string(),
        reason: reason.to_string(),
    };
    match value {
        Value::String(text) if is_instruction(text) => match classify_text(text) {
            call @ Command::Call { .. } => Ok(call),
            _ => Err(invalid("expected a function name or call(..)")),
        },
        Value::String(name) if !name.trim().is_empty() => Ok(Command::Call {
            name: name.trim().to_string(),
            args: record.get("args").map(positional).unwrap_or_default(),
        }),
        Value::Object(spec) => {
            let name = spec
                .get("name")
                .and_then(Value::as_str)
                .filter(|name| !name.trim().is_empty())
                .ok_or_else(|| invalid("missing name"))?;
            Ok(Command::Call {
                name: name.trim().to_string(),
                args: spec.get("args").map(positional).unwrap_or_default(),
            })
        }
        _ => Err(invalid("expected a function name")),
    }
}

fn positional(value: &Value) -> Vec<Value> {
    match value {
        Value::Null => Vec::new(),
        Value::Array(items) => items.clone(),
        other => vec![other.clone()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(name: &str, args: Vec<Value>) -> Command {
        Command::Call {
            name: name.to_string(),
            args,
        }
    }

    #[test]
    fn no_op_values() {
        for value in [json!(null), json!(""), json!("   "), json!({}), json!([])] {
            assert_eq!(classify(&value), Ok(Command::Empty), "{value}");
        }
    }

    #[test]
    fn instruction_verbs() {
        assert_eq!(classify(&json!("call(greet)")), Ok(call("greet", vec![])));
        assert_eq!(
            classify(&json!("call(add, 1, 'two, three', true)")),
            Ok(call("add", vec![json!(1), json!("two, three"), json!(true)]))
        );
        assert_eq!(
            classify(&json!("link(../other.Entry)")),
            Ok(Command::Link("../other.Entry".to_string()))
        );
        assert_eq!(
            classify(&json!("open(\"notes/readme.txt\")")),
            Ok(Command::Open("notes/readme.txt".to_string()))
        );
        assert_eq!(
            classify(&json!("read(data.txt)")),
            Ok(Command::Read("data.txt".to_string()))
        );
        assert_eq!(
            classify(&json!("run(echo hello)")),
            Ok(Command::Workflow(json!("echo hello")))
        );
    }

    #[test]
    fn shorthand_routine_marker() {
        assert_eq!(
            classify(&json!("@audit.log(login, 3)")),
            Ok(call("audit.log", vec![json!("login"), json!(3)]))
        );
        assert_eq!(classify(&json!("@ping()")), Ok(call("ping", vec![])));
    }

    #[test]
    fn unknown_verbs_are_plain_values() {
        assert_eq!(
            classify(&json!("jump(somewhere)")),
            Ok(Command::Plain("jump(somewhere)".to_string()))
        );
        assert_eq!(
            classify(&json!("Settings")),
            Ok(Command::Plain("Settings".to_string()))
        );
        assert_eq!(classify(&json!(42)), Ok(Command::Plain("42".to_string())));
    }

    #[test]
    fn malformed_instructions_are_reported() {
        for raw in ["call(greet", "call(greet))", "link('unterminated)", "call()", "call(a,,b)"] {
            assert!(
                matches!(classify(&json!(raw)), Ok(Command::Malformed { .. })),
                "{raw}"
            );
        }
    }

    #[test]
    fn records_with_one_action_key() {
        assert_eq!(
            classify(&json!({"function": "greet", "args": ["bob"]})),
            Ok(call("greet", vec![json!("bob")]))
        );
        assert_eq!(
            classify(&json!({"function": {"name": "sum", "args": [1, 2]}})),
            Ok(call("sum", vec![json!(1), json!(2)]))
        );
        assert_eq!(
            classify(&json!({"@notify": "done"})),
            Ok(call("notify", vec![json!("done")]))
        );
        assert_eq!(
            classify(&json!({"display": "hi"})),
            Ok(Command::Display(json!("hi")))
        );
        assert_eq!(
            classify(&json!({"menu": ["a"], "title": "Pick", "allow_back": false})),
            Ok(Command::Menu(MenuSpec {
                items: json!(["a"]),
                title: Some("Pick".to_string()),
                allow_back: false,
                multi: false,
            }))
        );
    }

    #[test]
    fn data_records_without_action_keys() {
        let record = json!({"action": "list", "table": "users"});
        assert!(matches!(classify(&record), Ok(Command::Data(map)) if map.len() == 2));
    }

    #[test]
    fn ambiguous_and_unrecognized_records_are_errors() {
        assert_eq!(
            classify(&json!({"function": "a", "link": "b"})),
            Err(CommandError::Ambiguous(vec![
                "function".to_string(),
                "link".to_string()
            ]))
        );
        assert!(matches!(
            classify(&json!({"@one": 1, "@two": 2})),
            Err(CommandError::Ambiguous(keys)) if keys.len() == 2
        ));
        assert_eq!(
            classify(&json!({"colour": "red"})),
            Err(CommandError::Unrecognized(vec!["colour".to_string()]))
        );
        assert!(matches!(
            classify(&json!({"link": 3})),
            Err(CommandError::Invalid { key, .. }) if key == "link"
        ));
    }

    #[test]
    fn sequences_keep_their_elements() {
        assert_eq!(
            classify(&json!(["call(a)", {"display": "x"}])),
            Ok(Command::Sequence(vec![json!("call(a)"), json!({"display": "x"})]))
        );
    }

    #[test]
    fn auto_menu_shapes() {
        assert_eq!(
            MenuSpec::from_auto(&json!(["A", "B"])),
            Some(MenuSpec::new(json!(["A", "B"])))
        );
        assert_eq!(
            MenuSpec::from_auto(&json!({"One": "k1", "Two": "k2"})),
            Some(MenuSpec::new(json!({"One": "k1", "Two": "k2"})))
        );
        assert_eq!(
            MenuSpec::from_auto(&json!({"menu": "call(list_users)", "multi": true}))
                .map(|spec| (spec.items, spec.multi)),
            Some((json!("call(list_users)"), true))
        );
        assert_eq!(MenuSpec::from_auto(&json!({"display": "x"})), None);
        assert_eq!(MenuSpec::from_auto(&json!("call(x)")), None);
        assert_eq!(
            MenuSpec::from_auto(&json!("only")),
            Some(MenuSpec::new(json!("only")))
        );
        assert_eq!(MenuSpec::from_auto(&json!(null)), None);
    }
}
