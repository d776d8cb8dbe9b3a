//! Menu construction, text rendering and selection resolution.
//!
//! Models are built fresh from a [`MenuSource`] on every call and never
//! mutated afterwards; narrowing a menu produces a new model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Label (and target) of the implicit back item.
pub const BACK_LABEL: &str = "zBack";

/// How much chrome a rendered menu carries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Density {
    /// Title, breadcrumb banner and numbered items.
    #[default]
    Full,
    /// Numbered items only.
    Simple,
    /// Single line, space separated.
    Compact,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    List,
    Map,
    Scalar,
    Dynamic,
}

/// Where menu items come from.
pub enum MenuSource<'a> {
    /// Ordered, unlabeled options.
    List(Vec<Value>),
    /// Label to target pairs in insertion order.
    Map(Map<String, Value>),
    /// A single option.
    Scalar(Value),
    /// Invoked once to produce a list, map or scalar.
    Dynamic(Box<dyn FnOnce() -> anyhow::Result<Value> + 'a>),
}

impl MenuSource<'_> {
    pub fn kind(&self) -> SourceKind {
        match self {
            MenuSource::List(_) => SourceKind::List,
            MenuSource::Map(_) => SourceKind::Map,
            MenuSource::Scalar(_) => SourceKind::Scalar,
            MenuSource::Dynamic(_) => SourceKind::Dynamic,
        }
    }

    /// Classify a plain JSON value as a static source.
    pub fn from_value(value: Value) -> MenuSource<'static> {
        match value {
            Value::Array(items) => MenuSource::List(items),
            Value::Object(map) => MenuSource::Map(map),
            other => MenuSource::Scalar(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MenuOptions {
    pub title: Option<String>,
    pub allow_back: bool,
    pub multi: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MenuItem {
    pub label: String,
    pub target: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub back: bool,
}

impl MenuItem {
    fn new(label: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            target: target.into(),
            back: false,
        }
    }

    fn back_item() -> Self {
        Self {
            label: BACK_LABEL.to_string(),
            target: BACK_LABEL.to_string(),
            back: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MenuMeta {
    pub built_at: DateTime<Utc>,
    pub source_kind: SourceKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MenuModel {
    pub items: Vec<MenuItem>,
    pub title: Option<String>,
    pub allow_back: bool,
    pub multi: bool,
    pub metadata: MenuMeta,
}

impl MenuModel {
    /// Items excluding the implicit back item.
    pub fn options(&self) -> impl Iterator<Item = &MenuItem> {
        self.items.iter().filter(|item| !item.back)
    }

    pub fn labels(&self) -> Vec<&str> {
        self.items.iter().map(|item| item.label.as_str()).collect()
    }
}

/// A model plus the presentation choices handed to the display collaborator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MenuView {
    pub model: MenuModel,
    pub density: Density,
    /// Breadcrumb trail shown by the full density, oldest first.
    pub banner: Vec<String>,
}

#[derive(Debug, Error)]
pub enum MenuError {
    #[error("menu source failed: {0}")]
    Source(String),
    #[error("menu has no options")]
    Empty,
}

/// Build a menu model from `source`.
///
/// Dynamic sources are invoked here; their errors surface as
/// [`MenuError::Source`]. The implicit back item is appended unless
/// `options.allow_back` is false.
pub fn build_menu(source: MenuSource<'_>, options: &MenuOptions) -> Result<MenuModel, MenuError> {
    let source_kind = source.kind();
    let mut items = match source {
        MenuSource::List(values) => list_items(values),
        MenuSource::Map(map) => map_items(map),
        MenuSource::Scalar(value) => scalar_items(value),
        MenuSource::Dynamic(produce) => {
            match produce().map_err(|err| MenuError::Source(format!("{err:#}")))? {
                Value::Array(values) => list_items(values),
                Value::Object(map) => map_items(map),
                other => scalar_items(other),
            }
        }
    };
    if items.is_empty() {
        return Err(MenuError::Empty);
    }
    if options.allow_back {
        items.push(MenuItem::back_item());
    }
    Ok(MenuModel {
        items,
        title: options.title.clone(),
        allow_back: options.allow_back,
        multi: options.multi,
        metadata: MenuMeta {
            built_at: Utc::now(),
            source_kind,
        },
    })
}

fn list_items(values: Vec<Value>) -> Vec<MenuItem> {
    values.into_iter().filter_map(value_item).collect()
}

fn map_items(map: Map<String, Value>) -> Vec<MenuItem> {
    map.into_iter()
        .map(|(label, target)| match target {
            Value::String(target) if !target.trim().is_empty() => MenuItem::new(label, target),
            _ => MenuItem::new(label.clone(), label),
        })
        .collect()
}

fn scalar_items(value: Value) -> Vec<MenuItem> {
    value_item(value).into_iter().collect()
}

fn value_item(value: Value) -> Option<MenuItem> {
    match value {
        Value::Null => None,
        Value::String(text) if text.trim().is_empty() => None,
        Value::String(text) => Some(MenuItem::new(text.clone(), text)),
        Value::Object(map) => {
            let label = map.get("label").and_then(Value::as_str)?;
            let target = map
                .get("target")
                .and_then(Value::as_str)
                .unwrap_or(label);
            Some(MenuItem::new(label, target))
        }
        other => {
            let text = other.to_string();
            Some(MenuItem::new(text.clone(), text))
        }
    }
}

/// Plain-text rendering used by text displays.
pub fn render_text(view: &MenuView) -> String {
    let model = &view.model;
    match view.density {
        Density::Full => {
            let mut out = String::new();
            if let Some(title) = &model.title {
                out.push_str(title);
                out.push('\n');
            }
            if !view.banner.is_empty() {
                out.push_str(&view.banner.join(" > "));
                out.push('\n');
            }
            for (idx, item) in model.items.iter().enumerate() {
                out.push_str(&format!("  {}. {}\n", idx + 1, item.label));
            }
            out
        }
        Density::Simple => model
            .items
            .iter()
            .enumerate()
            .map(|(idx, item)| format!("{}. {}\n", idx + 1, item.label))
            .collect(),
        Density::Compact => {
            let line = model
                .items
                .iter()
                .enumerate()
                .map(|(idx, item)| format!("{}:{}", idx + 1, item.label))
                .collect::<Vec<_>>()
                .join(" ");
            format!("{line}\n")
        }
    }
}

/// Resolved user input against a model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Single(MenuItem),
    Multi(Vec<MenuItem>),
    /// Filter input that left several candidates; prompt again with this model.
    Narrowed(MenuModel),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("no selection entered")]
    EmptyInput,
    #[error("selection {index} is out of range (1-{len})")]
    OutOfRange { index: usize, len: usize },
    #[error("no option matches '{0}'")]
    NoMatch(String),
    #[error("'{input}' matches several options: {}", candidates.join(", "))]
    Ambiguous {
        input: String,
        candidates: Vec<String>,
    },
    #[error("this menu accepts a single selection")]
    MultiNotAllowed,
}

/// Resolve raw input against `model`.
///
/// Accepts a 1-based index, a label (case-insensitive), or a unique label
/// substring. `/needle` narrows the model; comma-separated entries select
/// several items when the menu allows it. Never falls back to a default.
pub fn resolve(model: &MenuModel, raw: &str) -> Result<Selection, SelectionError> {
    let input = raw.trim();
    if input.is_empty() {
        return Err(SelectionError::EmptyInput);
    }

    if let Some(needle) = input.strip_prefix('/') {
        let narrowed = filter(model, needle);
        let mut options: Vec<MenuItem> = narrowed.options().take(2).cloned().collect();
        return match options.len() {
            0 => Err(SelectionError::NoMatch(needle.trim().to_string())),
            1 => Ok(Selection::Single(options.remove(0))),
            _ => Ok(Selection::Narrowed(narrowed)),
        };
    }

    if input.contains(',') {
        if !model.multi {
            return Err(SelectionError::MultiNotAllowed);
        }
        let items = input
            .split(',')
            .map(|part| resolve_one(model, part.trim()))
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(Selection::Multi(items));
    }

    resolve_one(model, input).map(Selection::Single)
}

fn resolve_one(model: &MenuModel, input: &str) -> Result<MenuItem, SelectionError> {
    if input.is_empty() {
        return Err(SelectionError::EmptyInput);
    }
    if let Ok(index) = input.parse::<usize>() {
        let len = model.items.len();
        return match index.checked_sub(1).and_then(|idx| model.items.get(idx)) {
            Some(item) => Ok(item.clone()),
            None => Err(SelectionError::OutOfRange { index, len }),
        };
    }

    let lowered = input.to_lowercase();
    if let Some(item) = model
        .items
        .iter()
        .find(|item| item.label.to_lowercase() == lowered)
    {
        return Ok(item.clone());
    }

    let matches: Vec<&MenuItem> = model
        .items
        .iter()
        .filter(|item| item.label.to_lowercase().contains(&lowered))
        .collect();
    match matches.as_slice() {
        [] => Err(SelectionError::NoMatch(input.to_string())),
        [only] => Ok((*only).clone()),
        many => Err(SelectionError::Ambiguous {
            input: input.to_string(),
            candidates: many.iter().map(|item| item.label.clone()).collect(),
        }),
    }
}

/// New model holding only options whose label contains `needle`.
///
/// The back item is kept whenever the source model allows back.
pub fn filter(model: &MenuModel, needle: &str) -> MenuModel {
    let needle = needle.trim().to_lowercase();
    let items = model
        .items
        .iter()
        .filter(|item| item.back || item.label.to_lowercase().contains(&needle))
        .cloned()
        .collect();
    MenuModel {
        items,
        title: model.title.clone(),
        allow_back: model.allow_back,
        multi: model.multi,
        metadata: MenuMeta {
            built_at: Utc::now(),
            source_kind: model.metadata.source_kind,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use serde_json::json;

    fn opts(allow_back: bool) -> MenuOptions {
        MenuOptions {
            title: Some("Main".to_string()),
            allow_back,
            multi: false,
        }
    }

    fn list(items: Value, allow_back: bool) -> MenuModel {
        let Value::Array(values) = items else {
            panic!("expected array");
        };
        build_menu(MenuSource::List(values), &opts(allow_back)).expect("build")
    }

    #[test]
    fn list_source_appends_back_item() {
        let model = list(json!(["A", "B", "C"]), true);
        assert_eq!(model.labels(), vec!["A", "B", "C", BACK_LABEL]);
        assert!(model.items[3].back);
        assert_eq!(model.metadata.source_kind, SourceKind::List);
    }

    #[test]
    fn back_item_is_omitted_when_disallowed() {
        let model = list(json!(["A", "B"]), false);
        assert_eq!(model.labels(), vec!["A", "B"]);
        assert!(!model.allow_back);
    }

    #[test]
    fn map_source_preserves_insertion_order() {
        let Value::Object(map) = json!({"Zeta": "z_key", "Alpha": "a_key", "Mid": {"function": "x"}})
        else {
            panic!("expected object");
        };
        let model = build_menu(MenuSource::Map(map), &opts(false)).expect("build");
        let pairs: Vec<(&str, &str)> = model
            .items
            .iter()
            .map(|item| (item.label.as_str(), item.target.as_str()))
            .collect();
        assert_eq!(
            pairs,
            vec![("Zeta", "z_key"), ("Alpha", "a_key"), ("Mid", "Mid")]
        );
    }

    #[test]
    fn scalar_source_is_a_one_item_menu() {
        let model = build_menu(MenuSource::Scalar(json!("only")), &opts(true)).expect("build");
        assert_eq!(model.labels(), vec!["only", BACK_LABEL]);
    }

    #[test]
    fn dynamic_source_is_invoked_and_errors_are_captured() {
        let model = build_menu(
            MenuSource::Dynamic(Box::new(|| Ok(json!(["x", "y"])))),
            &opts(false),
        )
        .expect("build");
        assert_eq!(model.labels(), vec!["x", "y"]);
        assert_eq!(model.metadata.source_kind, SourceKind::Dynamic);

        let err = build_menu(
            MenuSource::Dynamic(Box::new(|| Err(anyhow!("database offline")))),
            &opts(true),
        )
        .unwrap_err();
        assert!(matches!(err, MenuError::Source(msg) if msg.contains("database offline")));
    }

    #[test]
    fn empty_source_is_an_error() {
        assert!(matches!(
            build_menu(MenuSource::List(Vec::new()), &opts(true)),
            Err(MenuError::Empty)
        ));
    }

    #[test]
    fn renders_three_densities() {
        let model = list(json!(["A", "B"]), true);
        let mut view = MenuView {
            model,
            density: Density::Full,
            banner: vec!["/app.main".to_string(), "/app.sub".to_string()],
        };
        assert_eq!(
            render_text(&view),
            "Main\n/app.main > /app.sub\n  1. A\n  2. B\n  3. zBack\n"
        );
        view.density = Density::Simple;
        assert_eq!(render_text(&view), "1. A\n2. B\n3. zBack\n");
        view.density = Density::Compact;
        assert_eq!(render_text(&view), "1:A 2:B 3:zBack\n");
    }

    #[test]
    fn resolves_index_label_and_substring() {
        let model = list(json!(["Apple", "Banana", "Cherry"]), true);
        assert_eq!(
            resolve(&model, "2"),
            Ok(Selection::Single(MenuItem::new("Banana", "Banana")))
        );
        assert_eq!(
            resolve(&model, "cherry"),
            Ok(Selection::Single(MenuItem::new("Cherry", "Cherry")))
        );
        assert_eq!(
            resolve(&model, "nan"),
            Ok(Selection::Single(MenuItem::new("Banana", "Banana")))
        );
        assert_eq!(
            resolve(&model, "4"),
            Ok(Selection::Single(MenuItem::back_item()))
        );
    }

    #[test]
    fn rejects_bad_input_without_defaulting() {
        let model = list(json!(["Apple", "Apricot"]), false);
        assert_eq!(
            resolve(&model, "9"),
            Err(SelectionError::OutOfRange { index: 9, len: 2 })
        );
        assert_eq!(
            resolve(&model, "0"),
            Err(SelectionError::OutOfRange { index: 0, len: 2 })
        );
        assert_eq!(resolve(&model, "  "), Err(SelectionError::EmptyInput));
        assert_eq!(
            resolve(&model, "kiwi"),
            Err(SelectionError::NoMatch("kiwi".to_string()))
        );
        assert!(matches!(
            resolve(&model, "ap"),
            Err(SelectionError::Ambiguous { candidates, .. }) if candidates.len() == 2
        ));
        assert_eq!(
            resolve(&model, "1,2"),
            Err(SelectionError::MultiNotAllowed)
        );
    }

    #[test]
    fn multi_selection_uses_commas() {
        let Value::Array(values) = json!(["A", "B", "C"]) else {
            panic!("expected array");
        };
        let model = build_menu(
            MenuSource::List(values),
            &MenuOptions {
                title: None,
                allow_back: false,
                multi: true,
            },
        )
        .expect("build");
        let Ok(Selection::Multi(items)) = resolve(&model, "1, 3") else {
            panic!("expected multi selection");
        };
        let labels: Vec<&str> = items.iter().map(|item| item.label.as_str()).collect();
        assert_eq!(labels, vec!["A", "C"]);
        assert_eq!(
            resolve(&model, "1,7"),
            Err(SelectionError::OutOfRange { index: 7, len: 3 })
        );
    }

    #[test]
    fn filter_narrows_into_a_new_model() {
        let model = list(json!(["Red", "Green", "Grey", "Blue"]), true);
        let Ok(Selection::Narrowed(narrowed)) = resolve(&model, "/gr") else {
            panic!("expected narrowed model");
        };
        assert_eq!(narrowed.labels(), vec!["Green", "Grey", BACK_LABEL]);
        assert_eq!(model.items.len(), 5);
        assert_eq!(
            resolve(&narrowed, "2"),
            Ok(Selection::Single(MenuItem::new("Grey", "Grey")))
        );
        assert_eq!(
            resolve(&model, "/blu"),
            Ok(Selection::Single(MenuItem::new("Blue", "Blue")))
        );
        assert_eq!(
            resolve(&model, "/purple"),
            Err(SelectionError::NoMatch("purple".to_string()))
        );
    }

    #[test]
    fn filter_counts_only_real_options() {
        let model = list(json!(["Alpha", "Beta"]), true);
        assert_eq!(
            resolve(&model, "/back"),
            Err(SelectionError::NoMatch("back".to_string()))
        );
        assert_eq!(
            resolve(&model, "/alp"),
            Ok(Selection::Single(MenuItem::new("Alpha", "Alpha")))
        );
        let Ok(Selection::Narrowed(narrowed)) = resolve(&model, "/a") else {
            panic!("expected narrowed model");
        };
        assert_eq!(narrowed.labels(), vec!["Alpha", "Beta", BACK_LABEL]);
    }
}
