use crate::naming::format_name;
use crate::schema::{CONTENT_PROPERTY, NAME_PROPERTY};
use crate::value::{Relation, Value};

/// One record of a table: a filesystem-safe name, an ordered set of columns and
/// the free-form content body.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    name: String,
    content: String,
    cols: Vec<(String, Value)>,
}

impl Row {
    pub(crate) fn new(name: &str) -> Self {
        Row {
            name: format_name(name),
            content: String::new(),
            cols: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub(crate) fn set_content(&mut self, content: &str) {
        self.content = content.trim().to_string();
    }

    /// Column value by property name
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.cols.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Owned value of a column, or of the reserved `name` and `content` fields.
    pub fn field(&self, key: &str) -> Option<Value> {
        match key {
            NAME_PROPERTY => Some(Value::Text(self.name.clone())),
            CONTENT_PROPERTY => Some(Value::Text(self.content.clone())),
            _ => self.get(key).cloned(),
        }
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.cols.iter_mut().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn relation(&self, key: &str) -> Option<&Relation> {
        self.get(key).and_then(Value::as_relation)
    }

    pub fn relation_mut(&mut self, key: &str) -> Option<&mut Relation> {
        self.get_mut(key).and_then(Value::as_relation_mut)
    }

    /// Columns in property order
    pub fn columns(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.cols.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.cols.iter().map(|(k, _)| k.as_str())
    }

    /// Replace an existing column. Returns false if the row has no such column.
    pub(crate) fn set(&mut self, key: &str, value: Value) -> bool {
        match self.get_mut(key) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Append a column, or replace it if already present.
    pub(crate) fn insert(&mut self, key: &str, value: Value) {
        match self.get_mut(key) {
            Some(slot) => *slot = value,
            None => self.cols.push((key.to_string(), value)),
        }
    }

    pub(crate) fn remove(&mut self, key: &str) -> Option<Value> {
        let index = self.cols.iter().position(|(k, _)| k == key)?;
        Some(self.cols.remove(index).1)
    }

    /// Rename a column in place, keeping its position.
    pub(crate) fn rename(&mut self, from: &str, to: &str) -> bool {
        match self.cols.iter_mut().find(|(k, _)| k == from) {
            Some((key, _)) => {
                *key = to.to_string();
                true
            }
            None => false,
        }
    }

    /// The header block written above the content
    pub fn header(&self) -> serde_yaml::Mapping {
        self.cols
            .iter()
            .map(|(k, v)| (serde_yaml::Value::String(k.clone()), v.to_yaml()))
            .collect()
    }
}
