//! Line-oriented terminal display and prompter.

use std::cell::RefCell;
use std::io::{self, BufRead, Write};

use minijinja::{Environment, context};
use serde_json::Value;
use tracing::warn;

use crate::core::collab::{Display, Prompter};
use crate::core::menu::{MenuView, render_text};
use crate::core::types::Payload;

const TABLE_TEMPLATE: &str = include_str!("templates/table.txt");
const MESSAGE_TEMPLATE: &str = include_str!("templates/message.txt");

/// Writes menus and payloads as plain text to `W`.
pub struct TerminalDisplay<W: Write> {
    out: RefCell<W>,
    env: Environment<'static>,
}

impl TerminalDisplay<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> TerminalDisplay<W> {
    pub fn new(out: W) -> Self {
        let mut env = Environment::new();
        env.add_template("table", TABLE_TEMPLATE)
            .expect("table template should be valid");
        env.add_template("message", MESSAGE_TEMPLATE)
            .expect("message template should be valid");
        Self {
            out: RefCell::new(out),
            env,
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }

    fn write(&self, text: &str) {
        let mut out = self.out.borrow_mut();
        if let Err(err) = out.write_all(text.as_bytes()).and_then(|()| out.flush()) {
            warn!(error = %err, "terminal write failed");
        }
    }

    fn format(&self, payload: &Payload) -> String {
        let rendered = match payload {
            Payload::Text(text) => return format!("{text}\n"),
            Payload::Structured(value) => {
                return serde_json::to_string_pretty(value)
                    .map(|json| format!("{json}\n"))
                    .unwrap_or_default();
            }
            Payload::Message(message) => self
                .env
                .get_template("message")
                .and_then(|t| t.render(context! { message => message })),
            Payload::Table(rows) => {
                let (columns, cells) = table_cells(rows);
                let rule = "-".repeat(columns.join(" | ").len());
                self.env.get_template("table").and_then(|t| {
                    t.render(context! { columns => columns, rule => rule, rows => cells })
                })
            }
        };
        let mut text = rendered.unwrap_or_else(|err| {
            warn!(error = %err, "display template failed");
            payload.to_value().to_string()
        });
        if !text.ends_with('\n') {
            text.push('\n');
        }
        text
    }
}

impl<W: Write> Display for TerminalDisplay<W> {
    fn render(&self, view: &MenuView) {
        self.write(&render_text(view));
    }

    fn show(&self, payload: &Payload) {
        let text = self.format(payload);
        self.write(&text);
    }
}

/// Column names in first-seen order, and each row's cells in that order.
fn table_cells(rows: &[Value]) -> (Vec<String>, Vec<Vec<String>>) {
    let mut columns: Vec<String> = Vec::new();
    for row in rows {
        if let Value::Object(map) = row {
            for key in map.keys() {
                if !columns.contains(key) {
                    columns.push(key.clone());
                }
            }
        }
    }
    let cells = rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .map(|column| match row.get(column) {
                    None | Some(Value::Null) => String::new(),
                    Some(Value::String(text)) => text.clone(),
                    Some(other) => other.to_string(),
                })
                .collect()
        })
        .collect();
    (columns, cells)
}

/// Reads one line per prompt from `R`; end of input is `None`.
pub struct LinePrompter<R: BufRead, W: Write> {
    input: RefCell<R>,
    echo: RefCell<W>,
}

pub type StdinPrompter = LinePrompter<io::StdinLock<'static>, io::Stderr>;

impl StdinPrompter {
    pub fn stdin() -> Self {
        LinePrompter::new(io::stdin().lock(), io::stderr())
    }
}

impl<R: BufRead, W: Write> LinePrompter<R, W> {
    pub fn new(input: R, echo: W) -> Self {
        Self {
            input: RefCell::new(input),
            echo: RefCell::new(echo),
        }
    }
}

impl<R: BufRead, W: Write> Prompter for LinePrompter<R, W> {
    fn prompt(&self, message: &str) -> Option<String> {
        {
            let mut echo = self.echo.borrow_mut();
            let _ = write!(echo, "{message}> ");
            let _ = echo.flush();
        }
        let mut line = String::new();
        match self.input.borrow_mut().read_line(&mut line) {
            Ok(0) => None,
            Ok(_) => Some(line.trim_end_matches(['\r', '\n']).to_string()),
            Err(err) => {
                warn!(error = %err, "prompt read failed");
                None
            }
        }
    }
}
