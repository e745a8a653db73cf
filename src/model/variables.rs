use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::trace;

/// Separator recognized inside raw string values when inferring a list
/// (e.g. `"red;green;blue"`), and used when a list is rendered back into a
/// single cell of a table row.
pub const LIST_SEPARATOR: char = ';';

/// Optional type hint for [`VariableStore::set`]. Without a hint the type is
/// inferred from the raw value.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VarHint {
    Text,
    Number,
    Boolean,
    List,
}

/// A typed variable cell. A variable has exactly one active type at a time;
/// any mutator that changes the type resets the value to that type's zero
/// value unless an explicit value is supplied.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum VarValue {
    Text(String),
    Number(i64),
    Boolean(bool),
    List(Vec<String>),
}

impl VarValue {
    /// Render the value for display and interpolation.
    /// Lists render one item per line (table rows are list items).
    pub fn display(&self) -> String {
        match self {
            VarValue::Text(s) => s.clone(),
            VarValue::Number(n) => n.to_string(),
            VarValue::Boolean(b) => b.to_string(),
            VarValue::List(items) => items.join("\n"),
        }
    }

    /// Truthiness used by `Loop` while-conditions and `If` `IsTrue`.
    pub fn is_truthy(&self) -> bool {
        match self {
            VarValue::Text(s) => !s.is_empty() && !s.eq_ignore_ascii_case("false") && s != "0",
            VarValue::Number(n) => *n != 0,
            VarValue::Boolean(b) => *b,
            VarValue::List(items) => !items.is_empty(),
        }
    }
}

/// Sequence-scoped mapping from name (unique, case-sensitive) to a typed cell.
///
/// The store is owned by exactly one sequence at a time and mutated only by
/// the executor thread; variables are created lazily on first write and live
/// until the owning sequence is dropped.
#[derive(Debug, Clone, Default)]
pub struct VariableStore {
    vars: BTreeMap<String, VarValue>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a variable by exact name.
    pub fn find(&self, name: &str) -> Option<&VarValue> {
        self.vars.get(name)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &VarValue)> {
        self.vars.iter()
    }

    /// Create-or-overwrite a variable from a raw string value.
    ///
    /// With no hint the type is inferred: boolean-like tokens become
    /// `Boolean`, integer-parseable values become `Number`, values containing
    /// the list separator become `List`, anything else stays `Text`.
    pub fn set(&mut self, name: &str, value: &str, hint: Option<VarHint>) {
        let cell = match hint {
            Some(VarHint::Text) => VarValue::Text(value.to_string()),
            Some(VarHint::Number) => VarValue::Number(value.trim().parse().unwrap_or(0)),
            Some(VarHint::Boolean) => {
                VarValue::Boolean(value.trim().eq_ignore_ascii_case("true") || value.trim() == "1")
            }
            Some(VarHint::List) => VarValue::List(split_list(value)),
            None => infer(value),
        };
        trace!(target: "replaykit::vars", %name, cell = ?cell, "set");
        self.vars.insert(name.to_string(), cell);
    }

    /// Overwrite a variable with an already-typed value.
    pub fn set_value(&mut self, name: &str, value: VarValue) {
        self.vars.insert(name.to_string(), value);
    }

    /// Add `delta` to an existing `Number` variable.
    ///
    /// Succeeds only if the variable exists and is a `Number`; returns false
    /// otherwise so callers can fall back to create-or-convert logic.
    pub fn increment(&mut self, name: &str, delta: i64) -> bool {
        match self.vars.get_mut(name) {
            Some(VarValue::Number(n)) => {
                *n = n.saturating_add(delta);
                true
            }
            _ => false,
        }
    }

    /// Append one item to a list variable, converting (and resetting) the
    /// cell to an empty list first if it currently holds another type.
    pub fn append_item(&mut self, name: &str, item: &str) {
        let list = self.ensure_list(name);
        list.push(item.to_string());
    }

    /// Remove the item at `index`. Returns false if the variable is missing,
    /// not a list, or the index is out of bounds.
    pub fn remove_at(&mut self, name: &str, index: usize) -> bool {
        match self.vars.get_mut(name) {
            Some(VarValue::List(items)) if index < items.len() => {
                items.remove(index);
                true
            }
            _ => false,
        }
    }

    /// Reset a variable to an empty list.
    pub fn clear(&mut self, name: &str) {
        self.vars.insert(name.to_string(), VarValue::List(Vec::new()));
    }

    /// Append one table row to a list variable. Each row is stored as a
    /// single list item with cells joined by the list separator; rows render
    /// newline-joined via [`VarValue::display`].
    pub fn append_table_row(&mut self, name: &str, cells: &[String]) {
        let row = cells.join(&LIST_SEPARATOR.to_string());
        let list = self.ensure_list(name);
        list.push(row);
    }

    /// Seed initial values (file-level `variables`) without clobbering
    /// anything already set for this run.
    pub fn seed(&mut self, initial: &BTreeMap<String, String>) {
        for (name, value) in initial {
            if !self.vars.contains_key(name) {
                self.set(name, value, None);
            }
        }
    }

    fn ensure_list(&mut self, name: &str) -> &mut Vec<String> {
        let entry = self
            .vars
            .entry(name.to_string())
            .or_insert_with(|| VarValue::List(Vec::new()));
        if !matches!(entry, VarValue::List(_)) {
            // Type change resets the cell; stale text is never reinterpreted.
            *entry = VarValue::List(Vec::new());
        }
        match entry {
            VarValue::List(items) => items,
            _ => unreachable!("entry was just set to a list"),
        }
    }
}

fn infer(value: &str) -> VarValue {
    let trimmed = value.trim();
    if trimmed.eq_ignore_ascii_case("true") {
        return VarValue::Boolean(true);
    }
    if trimmed.eq_ignore_ascii_case("false") {
        return VarValue::Boolean(false);
    }
    if let Ok(n) = trimmed.parse::<i64>() {
        return VarValue::Number(n);
    }
    if value.contains(LIST_SEPARATOR) {
        return VarValue::List(split_list(value));
    }
    VarValue::Text(value.to_string())
}

fn split_list(value: &str) -> Vec<String> {
    if value.is_empty() {
        return Vec::new();
    }
    value.split(LIST_SEPARATOR).map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_infers_types() {
        let mut store = VariableStore::new();
        store.set("b", "TRUE", None);
        store.set("n", "-42", None);
        store.set("l", "a;b;c", None);
        store.set("t", "hello world", None);

        assert_eq!(store.find("b"), Some(&VarValue::Boolean(true)));
        assert_eq!(store.find("n"), Some(&VarValue::Number(-42)));
        assert_eq!(
            store.find("l"),
            Some(&VarValue::List(vec!["a".into(), "b".into(), "c".into()]))
        );
        assert_eq!(store.find("t"), Some(&VarValue::Text("hello world".into())));
    }

    #[test]
    fn test_set_hint_overrides_inference() {
        let mut store = VariableStore::new();
        store.set("x", "true", Some(VarHint::Text));
        assert_eq!(store.find("x"), Some(&VarValue::Text("true".into())));

        // Unparseable with an explicit Number hint falls back to zero.
        store.set("y", "not a number", Some(VarHint::Number));
        assert_eq!(store.find("y"), Some(&VarValue::Number(0)));
    }

    #[test]
    fn test_increment_is_strict() {
        let mut store = VariableStore::new();
        assert!(!store.increment("missing", 5));

        store.set("t", "abc", None);
        assert!(!store.increment("t", 5));

        store.set("n", "10", None);
        assert!(store.increment("n", 5));
        assert_eq!(store.find("n"), Some(&VarValue::Number(15)));
    }

    #[test]
    fn test_append_item_converts_and_resets() {
        let mut store = VariableStore::new();
        store.set("x", "some text", None);
        store.append_item("x", "first");
        // The old text value is discarded, not turned into a list element.
        assert_eq!(store.find("x"), Some(&VarValue::List(vec!["first".into()])));
    }

    #[test]
    fn test_remove_at_bounds() {
        let mut store = VariableStore::new();
        store.append_item("l", "a");
        store.append_item("l", "b");
        assert!(store.remove_at("l", 1));
        assert!(!store.remove_at("l", 1));
        assert!(!store.remove_at("missing", 0));
        assert_eq!(store.find("l"), Some(&VarValue::List(vec!["a".into()])));
    }

    #[test]
    fn test_table_rows_render_newline_joined() {
        let mut store = VariableStore::new();
        store.append_table_row("t", &["a".into(), "b".into()]);
        store.append_table_row("t", &["c".into(), "d".into()]);
        assert_eq!(store.find("t").unwrap().display(), "a;b\nc;d");
    }

    #[test]
    fn test_seed_does_not_clobber() {
        let mut store = VariableStore::new();
        store.set("kept", "runtime", None);
        let initial = BTreeMap::from_iter([
            ("kept".to_string(), "file".to_string()),
            ("added".to_string(), "7".to_string()),
        ]);
        store.seed(&initial);
        assert_eq!(store.find("kept"), Some(&VarValue::Text("runtime".into())));
        assert_eq!(store.find("added"), Some(&VarValue::Number(7)));
    }
}
