use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::process;
use textdb::{validation, Database, PropertyEdit, Row, Table, Value};

/// textdb CLI: inspect and edit a textdb directory from the command line
#[derive(Parser)]
#[command(name = "textdb", version, about)]
struct Cli {
    /// Path to the database directory (default: current directory)
    #[arg(long, default_value = ".")]
    data_dir: String,

    /// Output format
    #[arg(long, default_value = "yaml")]
    format: OutputFormat,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Yaml,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// List table names
    Tables,

    /// Show a table's properties
    Schema {
        /// Table name
        table: String,
    },

    /// List rows of a table
    List {
        /// Table name
        table: String,
    },

    /// Get a single row by name
    Get {
        /// Table name
        table: String,
        /// Row name
        row: String,
    },

    /// Create an empty table
    AddTable {
        /// Table name
        table: String,
    },

    /// Delete a table and all of its rows
    DropTable {
        /// Table name
        table: String,
    },

    /// Add a property to a table
    AddProperty {
        /// Table name
        table: String,
        /// Property name
        name: String,
        /// Property type (text, number, date, checkbox, select, multiselect, relation)
        #[arg(long = "type", default_value = "text")]
        type_name: String,
        /// Structure payload as YAML (e.g. --structure '[low, high]' or a target table)
        #[arg(long)]
        structure: Option<String>,
    },

    /// Rename or retype a property
    EditProperty {
        /// Table name
        table: String,
        /// Property name
        name: String,
        /// New property name
        #[arg(long)]
        rename: Option<String>,
        /// New property type
        #[arg(long = "type")]
        type_name: Option<String>,
        /// New structure payload as YAML
        #[arg(long)]
        structure: Option<String>,
    },

    /// Remove a property from a table
    DelProperty {
        /// Table name
        table: String,
        /// Property name
        name: String,
    },

    /// Insert a new row
    Insert {
        /// Table name
        table: String,
        /// Row name
        name: String,
        /// Field values (e.g. --field done=true)
        #[arg(long = "field", value_parser = parse_key_value)]
        fields: Vec<(String, String)>,
        /// Read body content from a file
        #[arg(long)]
        content_file: Option<String>,
        /// Read body content from stdin
        #[arg(long)]
        content_stdin: bool,
    },

    /// Update fields of an existing row
    Update {
        /// Table name
        table: String,
        /// Row name
        row: String,
        /// Field values to update (e.g. --field url=https://example.com)
        #[arg(long = "field", value_parser = parse_key_value)]
        fields: Vec<(String, String)>,
        /// Replace body content from a file
        #[arg(long)]
        content_file: Option<String>,
        /// Replace body content from stdin
        #[arg(long)]
        content_stdin: bool,
    },

    /// Delete a row
    Delete {
        /// Table name
        table: String,
        /// Row name
        row: String,
        /// Show what would be deleted without actually deleting
        #[arg(long)]
        dry_run: bool,
    },

    /// Add a target row to a relation column
    Link {
        table: String,
        row: String,
        /// Relation property name
        property: String,
        /// Row name in the relation's target table
        target: String,
    },

    /// Remove a target row from a relation column
    Unlink {
        table: String,
        row: String,
        /// Relation property name
        property: String,
        /// Row name in the relation's target table
        target: String,
    },

    /// Report values that do not match their properties
    Validate,

    /// Reload and rewrite every file, normalising hand edits
    Fix,
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let pos = s.find('=').ok_or_else(|| {
        format!("Invalid key=value pair: no '=' found in '{s}'")
    })?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if let Err(e) = run(cli) {
        eprintln!("ERROR:{e}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut db = Database::open(&cli.data_dir)?;

    match cli.command {
        Command::Tables => {
            let names: Vec<serde_json::Value> = db
                .table_names()
                .into_iter()
                .map(|n| serde_json::Value::String(n.to_string()))
                .collect();
            print_output(&serde_json::Value::Array(names), &cli.format)?;
        }

        Command::Schema { table } => {
            let table = find_table(&db, &table)?;
            print_output(&schema_to_json(table), &cli.format)?;
        }

        Command::List { table } => {
            let table = find_table(&db, &table)?;
            let rows: Vec<serde_json::Value> = table.iter().map(row_to_json).collect();
            print_output(&serde_json::Value::Array(rows), &cli.format)?;
        }

        Command::Get { table, row } => {
            let row = find_row(&db, &table, &row)?;
            print_output(&row_to_json(row), &cli.format)?;
        }

        Command::AddTable { table } => {
            let created = db.add_table(&table);
            db.save()?;
            print_output(&serde_json::json!({ "ok": created, "table": table }), &cli.format)?;
        }

        Command::DropTable { table } => {
            let deleted = db.delete_table(&table);
            db.save()?;
            print_output(&serde_json::json!({ "ok": deleted, "deleted": table }), &cli.format)?;
        }

        Command::AddProperty {
            table,
            name,
            type_name,
            structure,
        } => {
            let structure = parse_structure(structure.as_deref())?;
            let added = find_table_mut(&mut db, &table)?.add_property(&name, &type_name, structure)?;
            db.save()?;
            print_output(&serde_json::json!({ "ok": added, "property": name }), &cli.format)?;
        }

        Command::EditProperty {
            table,
            name,
            rename,
            type_name,
            structure,
        } => {
            let edit = PropertyEdit {
                name: rename,
                column_type: type_name,
                structure: parse_structure(structure.as_deref())?,
            };
            let edited = find_table_mut(&mut db, &table)?.edit_property(&name, edit)?;
            db.save()?;
            print_output(&serde_json::json!({ "ok": edited, "property": name }), &cli.format)?;
        }

        Command::DelProperty { table, name } => {
            let deleted = find_table_mut(&mut db, &table)?.del_property(&name)?;
            db.save()?;
            print_output(&serde_json::json!({ "ok": deleted, "deleted": name }), &cli.format)?;
        }

        Command::Insert {
            table,
            name,
            fields,
            content_file,
            content_stdin,
        } => {
            let mut values = fields_to_values(&fields);
            values.push(("name".to_string(), Value::Text(name.clone())));
            if let Some(content) = read_content(content_file, content_stdin)? {
                values.push(("content".to_string(), Value::Text(content)));
            }
            let added = find_table_mut(&mut db, &table)?.add_row(values)?;
            if !added {
                return Err(format!("Row '{name}' already exists in '{table}'").into());
            }
            db.save()?;
            print_output(&serde_json::json!({ "ok": true, "name": name }), &cli.format)?;
        }

        Command::Update {
            table,
            row,
            fields,
            content_file,
            content_stdin,
        } => {
            let target = find_table_mut(&mut db, &table)?;
            let mut values = Vec::with_capacity(fields.len() + 1);
            for (key, raw) in &fields {
                // edit_row stores values as given, so type them here
                let value = match target.get_property(key) {
                    Some(property) => property.prepare(Value::Text(raw.clone()))?,
                    None => Value::Text(raw.clone()),
                };
                values.push((key.clone(), value));
            }
            if let Some(content) = read_content(content_file, content_stdin)? {
                values.push(("content".to_string(), Value::Text(content)));
            }
            target.edit_row(&row, values)?;
            db.save()?;
            print_output(&serde_json::json!({ "ok": true, "name": row }), &cli.format)?;
        }

        Command::Delete {
            table,
            row,
            dry_run,
        } => {
            if dry_run {
                let existing = find_row(&db, &table, &row)?;
                print_output(
                    &serde_json::json!({
                        "dry_run": true,
                        "would_delete": { "table": table, "row": existing.name() },
                        "row": row_to_json(existing),
                    }),
                    &cli.format,
                )?;
            } else {
                let deleted = find_table_mut(&mut db, &table)?.delete_row(&row);
                db.save()?;
                print_output(&serde_json::json!({ "ok": deleted, "deleted": row }), &cli.format)?;
            }
        }

        Command::Link {
            table,
            row,
            property,
            target,
        } => {
            let linked = db.link(&table, &row, &property, &target)?;
            db.save()?;
            print_output(&serde_json::json!({ "ok": linked, "linked": target }), &cli.format)?;
        }

        Command::Unlink {
            table,
            row,
            property,
            target,
        } => {
            let unlinked = db.unlink(&table, &row, &property, &target)?;
            db.save()?;
            print_output(&serde_json::json!({ "ok": unlinked, "unlinked": target }), &cli.format)?;
        }

        Command::Validate => {
            let report = validation::validate(&db);
            let issues: Vec<serde_json::Value> = report
                .issues
                .iter()
                .map(|i| {
                    serde_json::json!({
                        "table": i.table,
                        "row": i.row,
                        "property": i.property,
                        "message": i.message,
                    })
                })
                .collect();
            print_output(
                &serde_json::json!({ "ok": report.is_ok(), "issues": issues }),
                &cli.format,
            )?;
        }

        Command::Fix => {
            db.fix()?;
            print_output(
                &serde_json::json!({ "ok": true, "tables": db.table_names() }),
                &cli.format,
            )?;
        }
    }

    Ok(())
}

fn find_table<'a>(db: &'a Database, name: &str) -> Result<&'a Table, Box<dyn std::error::Error>> {
    db.table(name)
        .ok_or_else(|| textdb::TextDbError::TableNotFound(name.to_string()).into())
}

fn find_table_mut<'a>(
    db: &'a mut Database,
    name: &str,
) -> Result<&'a mut Table, Box<dyn std::error::Error>> {
    db.table_mut(name)
        .ok_or_else(|| textdb::TextDbError::TableNotFound(name.to_string()).into())
}

fn find_row<'a>(
    db: &'a Database,
    table: &str,
    row: &str,
) -> Result<&'a Row, Box<dyn std::error::Error>> {
    let found = find_table(db, table)?;
    found.get_row(row).ok_or_else(|| {
        textdb::TextDbError::RowNotFound {
            table: found.name().to_string(),
            row: row.to_string(),
        }
        .into()
    })
}

fn print_output(
    value: &serde_json::Value,
    format: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(value)?),
    }
    Ok(())
}

fn parse_structure(
    raw: Option<&str>,
) -> Result<Option<serde_yaml::Value>, Box<dyn std::error::Error>> {
    Ok(raw
        .map(|s| serde_yaml::from_str::<serde_yaml::Value>(s))
        .transpose()?)
}

fn fields_to_values(fields: &[(String, String)]) -> Vec<(String, Value)> {
    fields
        .iter()
        .map(|(key, raw)| (key.clone(), field_value(raw)))
        .collect()
}

/// Comma-separated lists in brackets become lists; everything else is passed as
/// text and left to the column's coercion.
fn field_value(raw: &str) -> Value {
    let trimmed = raw.trim();
    match trimmed.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        Some(inner) => Value::List(
            inner
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        ),
        None => Value::Text(raw.to_string()),
    }
}

fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Text(s) => serde_json::Value::String(s.clone()),
        Value::Number(n) => serde_json::Number::from_f64(*n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Date(_) => value
            .render_scalar()
            .map(serde_json::Value::String)
            .unwrap_or_default(),
        Value::List(items) => serde_json::json!(items),
        Value::Relation(r) => serde_json::json!({
            "target": r.target(),
            "items": r.items(),
        }),
    }
}

fn row_to_json(row: &Row) -> serde_json::Value {
    let mut obj = serde_json::Map::new();
    obj.insert("name".into(), serde_json::Value::String(row.name().to_string()));
    for (key, value) in row.columns() {
        obj.insert(key.to_string(), value_to_json(value));
    }
    obj.insert(
        "content".into(),
        serde_json::Value::String(row.content().to_string()),
    );
    serde_json::Value::Object(obj)
}

fn schema_to_json(table: &Table) -> serde_json::Value {
    let properties: Vec<serde_json::Value> = table
        .properties()
        .iter()
        .map(|p| {
            let structure = p
                .structure()
                .and_then(|s| serde_json::to_value(s).ok())
                .unwrap_or(serde_json::Value::Null);
            serde_json::json!({
                "name": p.name(),
                "type": p.column_type().name(),
                "structure": structure,
            })
        })
        .collect();
    serde_json::json!({ "table": table.name(), "properties": properties })
}

fn read_content(
    content_file: Option<String>,
    content_stdin: bool,
) -> Result<Option<String>, Box<dyn std::error::Error>> {
    if let Some(path) = content_file {
        let content = std::fs::read_to_string(&path)
            .map_err(|e| format!("Failed to read content file '{path}': {e}"))?;
        Ok(Some(content))
    } else if content_stdin {
        use std::io::Read;
        let mut content = String::new();
        std::io::stdin().read_to_string(&mut content)?;
        Ok(Some(content))
    } else {
        Ok(None)
    }
}
