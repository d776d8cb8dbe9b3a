//! Data actions over JSON tables.
//!
//! Each table is `<data_dir>/<table>.json`, an array of records keyed by
//! `id`. A data record names the action and the table:
//! `{"action": "insert", "table": "users", "row": {"name": "ada"}}`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::{Map, Value, json};
use tracing::{debug, info, instrument};

use crate::core::collab::{Invoke, InvokeRequest};
use crate::core::types::Reply;
use crate::io::config::write_atomic;

pub struct JsonTableStore {
    root: PathBuf,
}

impl JsonTableStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn table_path(&self, table: &str) -> Option<PathBuf> {
        let valid = !table.is_empty()
            && table
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        valid.then(|| self.root.join(format!("{table}.json")))
    }

    pub fn list(&self, table: &str) -> Result<Vec<Value>> {
        let path = self.require_path(table)?;
        read_rows(&path)
    }

    pub fn get(&self, table: &str, id: &Value) -> Result<Option<Value>> {
        Ok(self
            .list(table)?
            .into_iter()
            .find(|row| row.get("id") == Some(id)))
    }

    /// Append a row, assigning the next numeric `id` when it has none.
    pub fn insert(&self, table: &str, mut row: Map<String, Value>) -> Result<Value> {
        let path = self.require_path(table)?;
        let mut rows = read_rows(&path)?;
        if !row.contains_key("id") {
            let next = rows
                .iter()
                .filter_map(|row| row.get("id").and_then(Value::as_u64))
                .max()
                .map_or(1, |max| max + 1);
            row.insert("id".to_string(), json!(next));
        }
        let row = Value::Object(row);
        rows.push(row.clone());
        write_rows(&path, &rows)?;
        Ok(row)
    }

    /// Remove every row with `id`; returns how many were removed.
    pub fn delete(&self, table: &str, id: &Value) -> Result<usize> {
        let path = self.require_path(table)?;
        let mut rows = read_rows(&path)?;
        let before = rows.len();
        rows.retain(|row| row.get("id") != Some(id));
        let removed = before - rows.len();
        if removed > 0 {
            write_rows(&path, &rows)?;
        }
        Ok(removed)
    }

    fn require_path(&self, table: &str) -> Result<PathBuf> {
        self.table_path(table)
            .with_context(|| format!("invalid table name '{table}'"))
    }
}

fn read_rows(path: &Path) -> Result<Vec<Value>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parse {}", path.display()))
}

fn write_rows(path: &Path, rows: &[Value]) -> Result<()> {
    let mut buf = serde_json::to_string_pretty(rows)?;
    buf.push('\n');
    write_atomic(path, &buf)
}

impl Invoke for JsonTableStore {
    #[instrument(skip_all, fields(action = request.name))]
    fn invoke(&self, request: &InvokeRequest<'_>) -> Result<Reply> {
        let record = request.args;
        let Some(table) = record
            .get("table")
            .or_else(|| record.get("model"))
            .and_then(Value::as_str)
        else {
            return Ok(Reply::Failed("data action needs a 'table'".to_string()));
        };
        let id = record.get("id").unwrap_or(&Value::Null);
        debug!(table, "data action");
        let reply = match request.name {
            "list" => Reply::Ok(Value::Array(self.list(table)?)),
            "get" => match self.get(table, id)? {
                Some(row) => Reply::Ok(row),
                None => Reply::Failed(format!("no row {id} in '{table}'")),
            },
            "insert" => {
                let Some(Value::Object(row)) = record.get("row") else {
                    return Ok(Reply::Failed("insert needs a 'row' object".to_string()));
                };
                let row = self.insert(table, row.clone())?;
                info!(table, "row inserted");
                Reply::Ok(row)
            }
            "delete" => {
                let removed = self.delete(table, id)?;
                info!(table, removed, "rows deleted");
                Reply::Ok(json!({ "deleted": removed }))
            }
            other => Reply::Failed(format!("unknown data action '{other}'")),
        };
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::session::Session;
    use crate::core::types::Mode;

    fn run(store: &JsonTableStore, record: Value) -> Reply {
        let session = Session::new(Mode::Blocking);
        let name = record["action"].as_str().unwrap_or("list").to_string();
        store
            .invoke(&InvokeRequest {
                name: &name,
                args: &record,
                session: &session,
            })
            .expect("invoke")
    }

    #[test]
    fn crud_over_a_table_file() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = JsonTableStore::new(temp.path());

        assert_eq!(
            run(&store, json!({"action": "list", "table": "users"})),
            Reply::Ok(json!([]))
        );
        assert_eq!(
            run(&store, json!({"action": "insert", "table": "users", "row": {"name": "ada"}})),
            Reply::Ok(json!({"name": "ada", "id": 1}))
        );
        run(&store, json!({"action": "insert", "table": "users", "row": {"name": "bob"}}));
        assert_eq!(
            run(&store, json!({"action": "get", "table": "users", "id": 2})),
            Reply::Ok(json!({"name": "bob", "id": 2}))
        );
        assert_eq!(
            run(&store, json!({"action": "delete", "table": "users", "id": 1})),
            Reply::Ok(json!({"deleted": 1}))
        );
        assert_eq!(
            run(&store, json!({"action": "list", "table": "users"})),
            Reply::Ok(json!([{"name": "bob", "id": 2}]))
        );
        assert!(temp.path().join("users.json").is_file());
    }

    #[test]
    fn missing_rows_and_bad_records_fail() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = JsonTableStore::new(temp.path());

        assert_eq!(
            run(&store, json!({"action": "get", "table": "users", "id": 9})),
            Reply::Failed("no row 9 in 'users'".to_string())
        );
        assert!(matches!(run(&store, json!({"action": "list"})), Reply::Failed(_)));
        assert!(matches!(
            run(&store, json!({"action": "purge", "table": "users"})),
            Reply::Failed(message) if message.contains("unknown data action")
        ));
    }

    #[test]
    fn rejects_path_like_table_names() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = JsonTableStore::new(temp.path());
        assert!(store.list("../etc").is_err());
    }
}
