use crate::schema::{ColumnType, Property};
use crate::store::Database;
use crate::table::{Row, Table};
use crate::value::Value;

/// A single problem found in a stored value
#[derive(Debug, Clone, PartialEq)]
pub struct Issue {
    pub table: String,
    pub row: String,
    pub property: String,
    pub message: String,
}

/// Result of validating a database
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub issues: Vec<Issue>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Check every row against its table's properties and every relation against
/// its target table. Nothing is rejected; problems are only reported.
pub fn validate(db: &Database) -> ValidationReport {
    let mut report = ValidationReport::default();
    for table in db.tables() {
        for row in table {
            for property in table.properties() {
                if let Some(value) = row.get(property.name()) {
                    validate_value(db, table, row, property, value, &mut report);
                }
            }
        }
    }
    report
}

fn validate_value(
    db: &Database,
    table: &Table,
    row: &Row,
    property: &Property,
    value: &Value,
    report: &mut ValidationReport,
) {
    let mut add_issue = |message: String| {
        report.issues.push(Issue {
            table: table.name().to_string(),
            row: row.name().to_string(),
            property: property.name().to_string(),
            message,
        });
    };

    let expected = property.column_type();
    if !value.is_null() && value.kind() != expected.kind() {
        add_issue(format!(
            "expected {}, got {}",
            expected.name(),
            value.kind()
        ));
        return;
    }

    match (expected, value) {
        (ColumnType::Select, Value::Text(choice)) => {
            let options = property.options();
            if !choice.is_empty() && !options.is_empty() && !options.contains(choice) {
                add_issue(format!("value '{choice}' is not one of: {}", options.join(", ")));
            }
        }
        (ColumnType::MultiSelect, Value::List(choices)) => {
            let options = property.options();
            if options.is_empty() {
                return;
            }
            for choice in choices.iter().filter(|c| !options.contains(c)) {
                add_issue(format!("value '{choice}' is not one of: {}", options.join(", ")));
            }
        }
        (ColumnType::Relation, Value::Relation(relation)) => {
            let target = match db.table(relation.target()) {
                Some(t) => t,
                None => {
                    add_issue(format!("target table '{}' does not exist", relation.target()));
                    return;
                }
            };
            for member in relation.iter().filter(|m| target.get_row(m).is_none()) {
                add_issue(format!(
                    "references missing row '{}/{member}'",
                    relation.target()
                ));
            }
        }
        _ => {}
    }
}
