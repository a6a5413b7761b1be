use super::types::{is_reserved, ColumnType, Property};
use crate::error::{Result, TextDbError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Prefix of the older single-string relation entry, e.g. `relation:tasks`.
const LEGACY_RELATION_PREFIX: &str = "relation:";

/// One value in a property descriptor: either a bare type name or a type with
/// its structure payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum DescriptorEntry {
    Plain(String),
    Structured {
        #[serde(rename = "type")]
        type_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        structure: Option<serde_yaml::Value>,
    },
}

/// Parse a table's property descriptor file into its ordered property list.
/// A missing file is reported as `DescriptorMissing` so the caller can recover.
pub fn parse_descriptor(path: &Path, table: &str) -> Result<Vec<Property>> {
    if !path.is_file() {
        return Err(TextDbError::DescriptorMissing {
            table: table.to_string(),
        });
    }
    let content = std::fs::read_to_string(path)?;
    parse_descriptor_str(&content)
}

/// Parse a property descriptor YAML string
pub fn parse_descriptor_str(content: &str) -> Result<Vec<Property>> {
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }

    let document: serde_yaml::Value = serde_yaml::from_str(content)?;
    let mapping = match document {
        serde_yaml::Value::Null => return Ok(Vec::new()),
        serde_yaml::Value::Mapping(m) => m,
        _ => {
            return Err(TextDbError::Other(
                "Property descriptor must be a YAML mapping".into(),
            ))
        }
    };

    let mut properties: Vec<Property> = Vec::new();
    for (key, value) in mapping {
        let name = match key {
            serde_yaml::Value::String(s) => s,
            other => {
                return Err(TextDbError::Other(format!(
                    "Property names must be strings, got {other:?}"
                )))
            }
        };
        if is_reserved(&name) {
            log::warn!("Ignoring reserved property '{name}' in descriptor");
            continue;
        }
        if properties.iter().any(|p| p.name() == name) {
            log::warn!("Ignoring duplicate property '{name}' in descriptor");
            continue;
        }

        let property = match serde_yaml::from_value::<DescriptorEntry>(value)? {
            DescriptorEntry::Plain(type_name) => {
                match type_name.strip_prefix(LEGACY_RELATION_PREFIX) {
                    Some(target) => Property::new(
                        &name,
                        ColumnType::Relation,
                        Some(serde_yaml::Value::String(target.to_string())),
                    ),
                    None => Property::new(&name, ColumnType::resolve(&type_name)?, None),
                }
            }
            DescriptorEntry::Structured {
                type_name,
                structure,
            } => Property::new(&name, ColumnType::resolve(&type_name)?, structure),
        };
        properties.push(property);
    }

    Ok(properties)
}

/// Render a property list as descriptor YAML, keeping property order.
pub fn render_descriptor(properties: &[Property]) -> Result<String> {
    let mut mapping = serde_yaml::Mapping::new();
    for property in properties {
        let type_name = property.column_type().name().to_string();
        let entry = match property.structure() {
            Some(structure) => DescriptorEntry::Structured {
                type_name,
                structure: Some(structure.clone()),
            },
            None => DescriptorEntry::Plain(type_name),
        };
        mapping.insert(
            serde_yaml::Value::String(property.name().to_string()),
            serde_yaml::to_value(entry)?,
        );
    }
    Ok(serde_yaml::to_string(&mapping)?)
}
