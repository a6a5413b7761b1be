// Typed column values and the weak relation reference

use crate::naming::format_name;
use crate::store::Database;
use crate::table::{Row, Table};
use chrono::NaiveDate;
use serde_yaml::value::{Tag, TaggedValue};
use std::fmt;

/// YAML tag marking a relation sequence in a row header.
pub const RELATION_TAG: &str = "relation";

/// Date columns are written as plain `YYYY-MM-DD` strings.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A single column value held by a row.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Text(String),
    Number(f64),
    Bool(bool),
    Date(NaiveDate),
    List(Vec<String>),
    Relation(Relation),
}

/// The native kind of a value, used to decide whether coercion is needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Null,
    Text,
    Number,
    Bool,
    Date,
    List,
    Relation,
}

impl ValueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueKind::Null => "null",
            ValueKind::Text => "text",
            ValueKind::Number => "number",
            ValueKind::Bool => "boolean",
            ValueKind::Date => "date",
            ValueKind::List => "list",
            ValueKind::Relation => "relation",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Text(_) => ValueKind::Text,
            Value::Number(_) => ValueKind::Number,
            Value::Bool(_) => ValueKind::Bool,
            Value::Date(_) => ValueKind::Date,
            Value::List(_) => ValueKind::List,
            Value::Relation(_) => ValueKind::Relation,
        }
    }

    /// Interpret raw text heuristically: `true`/`false` (any case) become booleans,
    /// numeric-looking strings become numbers, anything else stays text.
    pub fn from_text(raw: &str) -> Value {
        let trimmed = raw.trim();
        if trimmed.eq_ignore_ascii_case("true") {
            return Value::Bool(true);
        }
        if trimmed.eq_ignore_ascii_case("false") {
            return Value::Bool(false);
        }
        match trimmed.parse::<f64>() {
            Ok(n) if n.is_finite() => Value::Number(n),
            _ => Value::Text(raw.to_string()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_relation(&self) -> Option<&Relation> {
        match self {
            Value::Relation(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_relation_mut(&mut self) -> Option<&mut Relation> {
        match self {
            Value::Relation(r) => Some(r),
            _ => None,
        }
    }

    /// Render a scalar value as text. Lists, relations and null have no scalar form.
    pub fn render_scalar(&self) -> Option<String> {
        match self {
            Value::Text(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Date(d) => Some(d.format(DATE_FORMAT).to_string()),
            Value::Null | Value::List(_) | Value::Relation(_) => None,
        }
    }

    /// Convert to the YAML representation written into row headers.
    pub fn to_yaml(&self) -> serde_yaml::Value {
        match self {
            Value::Null => serde_yaml::Value::Null,
            Value::Text(s) => serde_yaml::Value::String(s.clone()),
            Value::Number(n) => serde_yaml::Value::Number((*n).into()),
            Value::Bool(b) => serde_yaml::Value::Bool(*b),
            Value::Date(d) => serde_yaml::Value::String(d.format(DATE_FORMAT).to_string()),
            Value::List(items) => string_sequence(items),
            Value::Relation(r) => serde_yaml::Value::Tagged(Box::new(TaggedValue {
                tag: Tag::new(RELATION_TAG),
                value: string_sequence(&r.items),
            })),
        }
    }

    /// Convert a decoded header value. Relations come back untargeted; the owning
    /// property supplies the target when the row is built.
    pub fn from_yaml(value: &serde_yaml::Value) -> Value {
        match value {
            serde_yaml::Value::Null => Value::Null,
            serde_yaml::Value::Bool(b) => Value::Bool(*b),
            serde_yaml::Value::Number(n) => match n.as_f64() {
                Some(f) => Value::Number(f),
                None => Value::Text(n.to_string()),
            },
            serde_yaml::Value::String(s) => Value::Text(s.clone()),
            serde_yaml::Value::Sequence(seq) => Value::List(sequence_strings(seq)),
            serde_yaml::Value::Mapping(_) => Value::Text(
                serde_yaml::to_string(value)
                    .map(|s| s.trim_end().to_string())
                    .unwrap_or_default(),
            ),
            serde_yaml::Value::Tagged(tagged) => {
                if tagged.tag == Tag::new(RELATION_TAG) {
                    let items = match &tagged.value {
                        serde_yaml::Value::Sequence(seq) => sequence_strings(seq),
                        _ => Vec::new(),
                    };
                    Value::Relation(Relation::with_items("", items))
                } else {
                    Value::from_yaml(&tagged.value)
                }
            }
        }
    }
}

fn string_sequence(items: &[String]) -> serde_yaml::Value {
    serde_yaml::Value::Sequence(
        items
            .iter()
            .map(|s| serde_yaml::Value::String(s.clone()))
            .collect(),
    )
}

fn sequence_strings(seq: &[serde_yaml::Value]) -> Vec<String> {
    seq.iter()
        .filter_map(|v| Value::from_yaml(v).render_scalar())
        .collect()
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d)
    }
}

impl<T: Into<String>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl From<Relation> for Value {
    fn from(r: Relation) -> Self {
        Value::Relation(r)
    }
}

/// A set of row names pointing into a target table.
///
/// Members are weak: they are looked up by name in the target table whenever they
/// are resolved, and a member whose row has gone away simply resolves to nothing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Relation {
    target: String,
    items: Vec<String>,
}

impl Relation {
    pub fn new(target: &str) -> Self {
        Relation {
            target: format_name(target),
            items: Vec::new(),
        }
    }

    /// Build a relation from raw names. Names are formatted and duplicates dropped.
    pub fn with_items<I, S>(target: &str, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut relation = Relation::new(target);
        for item in items {
            relation.push(item.as_ref());
        }
        relation
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub(crate) fn retarget(&mut self, target: &str) {
        self.target = format_name(target);
    }

    pub fn items(&self) -> &[String] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, item_name: &str) -> bool {
        let item_name = format_name(item_name);
        self.items.iter().any(|i| *i == item_name)
    }

    /// Insert without checking the target table.
    pub(crate) fn push(&mut self, item_name: &str) -> bool {
        let item_name = format_name(item_name);
        if item_name.is_empty() || self.items.contains(&item_name) {
            return false;
        }
        self.items.push(item_name);
        true
    }

    /// Add a member. Succeeds only if `target` is this relation's target table and
    /// currently holds a row with that name.
    pub fn add(&mut self, item_name: &str, target: &Table) -> bool {
        if target.name() != self.target {
            log::debug!(
                "Relation targets '{}', refusing member from table '{}'",
                self.target,
                target.name()
            );
            return false;
        }
        if target.get_row(item_name).is_none() {
            return false;
        }
        self.push(item_name)
    }

    pub fn delete(&mut self, item_name: &str) -> bool {
        let item_name = format_name(item_name);
        match self.items.iter().position(|i| *i == item_name) {
            Some(index) => {
                self.items.remove(index);
                true
            }
            None => false,
        }
    }

    /// Resolve every member that still exists in the target table.
    pub fn resolve<'a>(&'a self, db: &'a Database) -> impl Iterator<Item = &'a Row> + 'a {
        db.table(&self.target)
            .into_iter()
            .flat_map(move |table| self.items.iter().filter_map(move |name| table.get_row(name)))
    }

    /// Resolve one member by name. Names that are not members resolve to nothing,
    /// even if the target table has such a row.
    pub fn get<'a>(&self, item_name: &str, db: &'a Database) -> Option<&'a Row> {
        if !self.contains(item_name) {
            return None;
        }
        db.table(&self.target)?.get_row(item_name)
    }
}

impl<'a> IntoIterator for &'a Relation {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
