mod row;

pub use row::Row;

use crate::document::RawDocument;
use crate::error::{Result, TextDbError};
use crate::naming::format_name;
use crate::schema::{is_reserved, ColumnType, Property, CONTENT_PROPERTY, NAME_PROPERTY};
use crate::value::Value;

/// Keyed lookup shared by rows, tables and the database.
///
/// A miss is an ordinary `None`; operations that mutate a missing target return
/// an error instead.
///
/// Lookups borrow stored items. A row's `name` and `content` are plain strings
/// rather than column values, so `Keyed` on a [`Row`] only sees columns; use
/// [`Row::field`] for an owned value that covers both.
pub trait Keyed {
    type Item;

    fn get(&self, key: &str) -> Option<&Self::Item>;
}

impl Keyed for Row {
    type Item = Value;

    fn get(&self, key: &str) -> Option<&Value> {
        Row::get(self, key)
    }
}

impl Keyed for Table {
    type Item = Row;

    fn get(&self, key: &str) -> Option<&Row> {
        self.get_row(key)
    }
}

/// Changes applied by [`Table::edit_property`]. Unset fields stay as they are.
#[derive(Debug, Clone, Default)]
pub struct PropertyEdit {
    pub name: Option<String>,
    pub column_type: Option<String>,
    pub structure: Option<serde_yaml::Value>,
}

impl PropertyEdit {
    pub fn rename(name: &str) -> Self {
        PropertyEdit {
            name: Some(name.to_string()),
            ..Default::default()
        }
    }

    pub fn retype(column_type: &str) -> Self {
        PropertyEdit {
            column_type: Some(column_type.to_string()),
            ..Default::default()
        }
    }

    pub fn with_structure(mut self, structure: serde_yaml::Value) -> Self {
        self.structure = Some(structure);
        self
    }
}

/// An ordered set of uniquely named rows sharing one property list.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    name: String,
    properties: Vec<Property>,
    rows: Vec<Row>,
}

impl Table {
    pub fn new(name: &str) -> Self {
        Table {
            name: format_name(name),
            properties: Vec::new(),
            rows: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    // ── Properties ──────────────────────────────────────────────

    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    pub fn get_property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name() == name)
    }

    pub fn property_names(&self) -> Vec<&str> {
        self.properties.iter().map(|p| p.name()).collect()
    }

    fn property_index(&self, name: &str) -> Option<usize> {
        self.properties.iter().position(|p| p.name() == name)
    }

    /// Add a property and give every existing row its default value.
    /// Returns false for reserved or already defined names.
    pub fn add_property(
        &mut self,
        name: &str,
        type_name: &str,
        structure: Option<serde_yaml::Value>,
    ) -> Result<bool> {
        let column_type = ColumnType::resolve(type_name)?;
        Ok(self.insert_property(Property::new(name, column_type, structure)))
    }

    /// Add a relation property named after the table it points to.
    pub fn add_relation(&mut self, target_table: &str) -> Result<bool> {
        let target = format_name(target_table);
        self.add_property(
            &target,
            ColumnType::Relation.name(),
            Some(serde_yaml::Value::String(target.clone())),
        )
    }

    pub(crate) fn insert_property(&mut self, property: Property) -> bool {
        if is_reserved(property.name()) {
            log::debug!(
                "Refusing to add reserved property '{}' to '{}'",
                property.name(),
                self.name
            );
            return false;
        }
        if self.property_index(property.name()).is_some() {
            return false;
        }
        self.properties.push(property);
        self.update_rows();
        true
    }

    /// Rename and/or retype a property. A rename moves the column in every row
    /// without changing its position. A retype does not touch existing values.
    pub fn edit_property(&mut self, name: &str, edit: PropertyEdit) -> Result<bool> {
        if is_reserved(name) {
            return Ok(false);
        }
        let index = self
            .property_index(name)
            .ok_or_else(|| TextDbError::PropertyNotFound {
                table: self.name.clone(),
                property: name.to_string(),
            })?;

        let new_type = edit
            .column_type
            .as_deref()
            .map(ColumnType::resolve)
            .transpose()?;

        if let Some(new_name) = edit.name.as_deref() {
            if new_name != name && (is_reserved(new_name) || self.property_index(new_name).is_some())
            {
                return Ok(false);
            }
        }

        let property = &mut self.properties[index];
        if new_type.is_some() || edit.structure.is_some() {
            let column_type = new_type.unwrap_or(property.column_type());
            let structure = match edit.structure {
                Some(structure) => Some(structure),
                None if column_type == property.column_type() => property.structure().cloned(),
                None => None,
            };
            property.set_type(column_type, structure);
        }

        if let Some(new_name) = edit.name.as_deref() {
            if new_name != name {
                property.set_name(new_name);
                for row in &mut self.rows {
                    row.rename(name, new_name);
                }
            }
        }

        Ok(true)
    }

    /// Remove a property and its column from every row.
    pub fn del_property(&mut self, name: &str) -> Result<bool> {
        if is_reserved(name) {
            return Ok(false);
        }
        let index = self
            .property_index(name)
            .ok_or_else(|| TextDbError::PropertyNotFound {
                table: self.name.clone(),
                property: name.to_string(),
            })?;
        self.properties.remove(index);
        self.update_rows();
        Ok(true)
    }

    /// Bring every row's columns in line with the property list: drop columns
    /// that are no longer defined, then add missing ones at their default.
    fn update_rows(&mut self) {
        for row in &mut self.rows {
            let delete_queue: Vec<String> = row
                .column_names()
                .filter(|col| !self.properties.iter().any(|p| p.name() == *col))
                .map(str::to_string)
                .collect();
            let add_queue: Vec<&Property> = self
                .properties
                .iter()
                .filter(|p| row.get(p.name()).is_none())
                .collect();

            for col in &delete_queue {
                row.remove(col);
            }
            for property in add_queue {
                row.insert(property.name(), property.default_value());
            }
        }
    }

    // ── Rows ────────────────────────────────────────────────────

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Row> {
        self.rows.iter()
    }

    pub fn row_names(&self) -> Vec<&str> {
        self.rows.iter().map(|r| r.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Add a row from named values. A `name` value is required; `content` fills
    /// the body; keys that are not properties are ignored.
    ///
    /// Returns `Ok(false)` without inserting if a row with the same formatted
    /// name already exists.
    pub fn add_row<I, K, V>(&mut self, values: I) -> Result<bool>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let values = values
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.insert_row(values)
    }

    /// Add a row from positional values: the name first, then each property in
    /// order, then the content.
    pub fn add_row_positional<I, V>(&mut self, values: I) -> Result<bool>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let mut keys: Vec<String> = Vec::with_capacity(self.properties.len() + 2);
        keys.push(NAME_PROPERTY.to_string());
        keys.extend(self.properties.iter().map(|p| p.name().to_string()));
        keys.push(CONTENT_PROPERTY.to_string());

        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        if values.len() > keys.len() {
            return Err(TextDbError::Other(format!(
                "Table '{}' takes at most {} positional values, got {}",
                self.name,
                keys.len(),
                values.len()
            )));
        }
        self.insert_row(keys.into_iter().zip(values).collect())
    }

    fn insert_row(&mut self, mut values: Vec<(String, Value)>) -> Result<bool> {
        let name_index = values
            .iter()
            .position(|(k, _)| k == NAME_PROPERTY)
            .ok_or(TextDbError::MissingName)?;
        let (_, name_value) = values.remove(name_index);
        let name = name_value
            .render_scalar()
            .ok_or(TextDbError::MissingName)?;

        let mut row = Row::new(&name);
        if row.name().is_empty() {
            return Err(TextDbError::MissingName);
        }
        if self.get_row(row.name()).is_some() {
            log::debug!("Row '{}' already exists in '{}'", row.name(), self.name);
            return Ok(false);
        }

        for property in &self.properties {
            row.insert(property.name(), property.default_value());
        }

        for (key, value) in values {
            if key == CONTENT_PROPERTY {
                row.set_content(&content_text(&value)?);
                continue;
            }

            let property = match self.get_property(&key) {
                Some(p) => p,
                None => {
                    log::debug!("Ignoring unknown property '{key}' for '{}'", self.name);
                    continue;
                }
            };
            row.set(&key, property.prepare(value)?);
        }

        self.rows.push(row);
        Ok(true)
    }

    /// Build a row from a file read off disk, through the same path as `add_row`.
    pub(crate) fn insert_document(&mut self, doc: RawDocument) -> Result<bool> {
        let mut values: Vec<(String, Value)> = Vec::with_capacity(doc.header.len() + 2);
        for (key, value) in &doc.header {
            let key = match key.as_str() {
                Some(k) if !is_reserved(k) => k,
                _ => {
                    log::warn!("Ignoring header key {key:?} in {}/{}", self.name, doc.name);
                    continue;
                }
            };
            if self.get_property(key).is_none() {
                log::warn!(
                    "Ignoring undeclared property '{key}' in {}/{}",
                    self.name,
                    doc.name
                );
                continue;
            }
            values.push((key.to_string(), Value::from_yaml(value)));
        }
        values.push((NAME_PROPERTY.to_string(), Value::Text(doc.name)));
        values.push((CONTENT_PROPERTY.to_string(), Value::Text(doc.content)));
        self.insert_row(values)
    }

    /// Get a row by name. The name is formatted before matching.
    pub fn get_row(&self, name: &str) -> Option<&Row> {
        let name = format_name(name);
        self.rows.iter().find(|r| r.name() == name)
    }

    pub fn get_row_mut(&mut self, name: &str) -> Option<&mut Row> {
        let name = format_name(name);
        self.rows.iter_mut().find(|r| r.name() == name)
    }

    /// Get the first row whose `property` equals `value`.
    pub fn get_row_by(&self, property: &str, value: &Value) -> Option<&Row> {
        match property {
            NAME_PROPERTY => value.as_str().and_then(|name| self.get_row(name)),
            CONTENT_PROPERTY => {
                let content = value.as_str()?;
                self.rows.iter().find(|r| r.content() == content)
            }
            _ => self.rows.iter().find(|r| r.get(property) == Some(value)),
        }
    }

    /// Replace column values of an existing row. `content` is trimmed; other keys
    /// replace the column as given, without type checks. Unknown keys are ignored.
    pub fn edit_row<I, K, V>(&mut self, name: &str, values: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let table = self.name.clone();
        let row = self
            .get_row_mut(name)
            .ok_or_else(|| TextDbError::RowNotFound {
                table: table.clone(),
                row: format_name(name),
            })?;

        let values: Vec<(String, Value)> = values
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        // Content is checked up front so a rejected edit leaves the row untouched.
        let mut content = None;
        for (key, value) in &values {
            if key == CONTENT_PROPERTY {
                content = Some(content_text(value)?);
            }
        }

        for (key, value) in values {
            if key == CONTENT_PROPERTY {
                continue;
            }
            if !row.set(&key, value) {
                log::debug!("Ignoring unknown property '{key}' for {table}/{}", row.name());
            }
        }
        if let Some(content) = content {
            row.set_content(&content);
        }
        Ok(())
    }

    /// Remove a row. Returns whether anything was removed.
    pub fn delete_row(&mut self, name: &str) -> bool {
        let name = format_name(name);
        match self.rows.iter().position(|r| r.name() == name) {
            Some(index) => {
                self.rows.remove(index);
                true
            }
            None => false,
        }
    }
}

impl<'a> IntoIterator for &'a Table {
    type Item = &'a Row;
    type IntoIter = std::slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

/// Body text of a row. Null clears it; lists and relations have no body form.
fn content_text(value: &Value) -> Result<String> {
    match value {
        Value::Null => Ok(String::new()),
        other => other.render_scalar().ok_or_else(|| TextDbError::TypeMismatch {
            property: CONTENT_PROPERTY.to_string(),
            expected: "text".to_string(),
            actual: other.kind().to_string(),
        }),
    }
}
