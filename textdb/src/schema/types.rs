use crate::error::{Result, TextDbError};
use crate::naming::format_name;
use crate::value::{Relation, Value, ValueKind, DATE_FORMAT};
use chrono::NaiveDate;

/// Row identifier, used as the file name. Never stored as a column.
pub const NAME_PROPERTY: &str = "name";

/// Free-form body text below the header block. Never stored as a column.
pub const CONTENT_PROPERTY: &str = "content";

/// Whether a property name is reserved and cannot be added, edited or removed.
pub fn is_reserved(name: &str) -> bool {
    name == NAME_PROPERTY || name == CONTENT_PROPERTY
}

/// Column type enumeration. Parameterized kinds carry their parameters in the
/// owning property's structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Number,
    Date,
    Checkbox,
    Select,
    MultiSelect,
    Relation,
}

/// Name-to-type registry. Closed: anything not listed here is rejected.
const REGISTRY: &[(&str, ColumnType)] = &[
    ("text", ColumnType::Text),
    ("number", ColumnType::Number),
    ("date", ColumnType::Date),
    ("checkbox", ColumnType::Checkbox),
    ("select", ColumnType::Select),
    ("multiselect", ColumnType::MultiSelect),
    ("relation", ColumnType::Relation),
];

impl ColumnType {
    /// Look up a type by its registered name.
    pub fn resolve(name: &str) -> Result<Self> {
        REGISTRY
            .iter()
            .find(|(registered, _)| *registered == name)
            .map(|(_, column_type)| *column_type)
            .ok_or_else(|| TextDbError::UnknownType {
                name: name.to_string(),
                valid: Self::valid_names().collect::<Vec<_>>().join(", "),
            })
    }

    pub fn valid_names() -> impl Iterator<Item = &'static str> {
        REGISTRY.iter().map(|(name, _)| *name)
    }

    pub fn name(&self) -> &'static str {
        REGISTRY
            .iter()
            .find(|(_, column_type)| column_type == self)
            .map(|(name, _)| *name)
            .unwrap_or("text")
    }

    pub fn is_parameterized(&self) -> bool {
        matches!(
            self,
            ColumnType::Select | ColumnType::MultiSelect | ColumnType::Relation
        )
    }

    /// The native value kind stored in columns of this type.
    pub fn kind(&self) -> ValueKind {
        match self {
            ColumnType::Text | ColumnType::Select => ValueKind::Text,
            ColumnType::Number => ValueKind::Number,
            ColumnType::Date => ValueKind::Date,
            ColumnType::Checkbox => ValueKind::Bool,
            ColumnType::MultiSelect => ValueKind::List,
            ColumnType::Relation => ValueKind::Relation,
        }
    }

    /// A fresh zero value. Relations come back untargeted.
    pub fn default_value(&self) -> Value {
        match self {
            ColumnType::Text | ColumnType::Select => Value::Text(String::new()),
            ColumnType::Number => Value::Number(0.0),
            ColumnType::Date => Value::Null,
            ColumnType::Checkbox => Value::Bool(false),
            ColumnType::MultiSelect => Value::List(Vec::new()),
            ColumnType::Relation => Value::Relation(Relation::default()),
        }
    }

    /// Coerce a value whose kind differs from this type's kind.
    /// Text that does not read as this type is kept unchanged. Returns `None`
    /// when a non-text value cannot be placed into this type.
    pub fn coerce(&self, value: Value) -> Option<Value> {
        match self {
            ColumnType::Text | ColumnType::Select => value.render_scalar().map(Value::Text),
            ColumnType::Number | ColumnType::Checkbox => match value {
                Value::Text(raw) => match Value::from_text(&raw) {
                    parsed if parsed.kind() == self.kind() => Some(parsed),
                    _ => Some(Value::Text(raw)),
                },
                _ => None,
            },
            ColumnType::Date => match value {
                Value::Text(raw) => match NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT) {
                    Ok(date) => Some(Value::Date(date)),
                    Err(_) => Some(Value::Text(raw)),
                },
                _ => None,
            },
            ColumnType::MultiSelect => match value {
                Value::Text(s) => Some(Value::List(vec![s])),
                Value::Relation(r) => Some(Value::List(r.items().to_vec())),
                _ => None,
            },
            ColumnType::Relation => match value {
                Value::List(items) => Some(Value::Relation(Relation::with_items("", items))),
                Value::Text(s) => Some(Value::Relation(Relation::with_items("", [s]))),
                Value::Relation(r) => Some(Value::Relation(r)),
                _ => None,
            },
        }
    }
}

/// A named, typed column definition.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    name: String,
    column_type: ColumnType,
    structure: Option<serde_yaml::Value>,
}

impl Property {
    /// Create a property. A relation without a structure targets the table named
    /// like the property.
    pub fn new(name: &str, column_type: ColumnType, structure: Option<serde_yaml::Value>) -> Self {
        let structure = normalize_structure(name, column_type, structure);
        Property {
            name: name.to_string(),
            column_type,
            structure,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn column_type(&self) -> ColumnType {
        self.column_type
    }

    pub fn structure(&self) -> Option<&serde_yaml::Value> {
        self.structure.as_ref()
    }

    pub(crate) fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    pub(crate) fn set_type(&mut self, column_type: ColumnType, structure: Option<serde_yaml::Value>) {
        self.structure = normalize_structure(&self.name, column_type, structure);
        self.column_type = column_type;
    }

    /// Target table of a relation property.
    pub fn relation_target(&self) -> Option<&str> {
        match self.column_type {
            ColumnType::Relation => self.structure.as_ref().and_then(|s| s.as_str()),
            _ => None,
        }
    }

    /// Allowed options of a select or multiselect property. Empty means unrestricted.
    pub fn options(&self) -> Vec<String> {
        match (&self.column_type, &self.structure) {
            (
                ColumnType::Select | ColumnType::MultiSelect,
                Some(serde_yaml::Value::Sequence(seq)),
            ) => seq
                .iter()
                .filter_map(|v| Value::from_yaml(v).render_scalar())
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn default_value(&self) -> Value {
        match self.column_type {
            ColumnType::Relation => {
                Value::Relation(Relation::new(self.relation_target().unwrap_or_default()))
            }
            other => other.default_value(),
        }
    }

    /// Place a provided value into this column. Coercion only runs when the value's
    /// kind differs from the declared kind; null keeps the default.
    pub fn prepare(&self, value: Value) -> Result<Value> {
        if value.is_null() {
            return Ok(self.default_value());
        }

        let actual = value.kind();
        let prepared = if actual == self.column_type.kind() {
            Some(value)
        } else {
            self.column_type.coerce(value)
        };

        match prepared {
            Some(Value::Relation(mut relation)) => {
                relation.retarget(self.relation_target().unwrap_or_default());
                Ok(Value::Relation(relation))
            }
            Some(value) => Ok(value),
            None => Err(TextDbError::TypeMismatch {
                property: self.name.clone(),
                expected: self.column_type.name().to_string(),
                actual: actual.to_string(),
            }),
        }
    }
}

fn normalize_structure(
    name: &str,
    column_type: ColumnType,
    structure: Option<serde_yaml::Value>,
) -> Option<serde_yaml::Value> {
    match column_type {
        ColumnType::Relation => {
            let target = structure
                .as_ref()
                .and_then(|s| s.as_str())
                .unwrap_or(name);
            Some(serde_yaml::Value::String(format_name(target)))
        }
        _ if column_type.is_parameterized() => structure,
        _ => None,
    }
}
