use crate::document;
use crate::error::{Result, TextDbError};
use crate::naming::{format_name, is_hidden};
use crate::schema::{parse_descriptor, render_descriptor};
use crate::table::{Keyed, Row, Table};
use crate::value::Relation;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Directory under the root holding one property descriptor per table.
pub const PROPERTIES_DIR: &str = ".properties";

/// Extension of property descriptor files.
pub const DESCRIPTOR_EXTENSION: &str = "yaml";

/// Extension of row files.
pub const ROW_EXTENSION: &str = "md";

/// The main entry point for textdb.
///
/// Holds every table of a root directory in memory. Nothing touches the disk
/// between [`Database::load`] and [`Database::save`]; `save` writes the whole
/// model and deletes any table or row that is no longer part of it.
#[derive(Debug, Clone)]
pub struct Database {
    root: PathBuf,
    tables: Vec<Table>,
}

impl Database {
    /// Open a database at the given root directory and load whatever is stored
    /// there. A missing directory yields an empty database.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let mut db = Database {
            root: path.into(),
            tables: Vec::new(),
        };
        db.load()?;
        Ok(db)
    }

    /// Get the root data directory path
    pub fn root(&self) -> &Path {
        &self.root
    }

    // ── Tables ──────────────────────────────────────────────────

    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    pub fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.name()).collect()
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        let name = format_name(name);
        self.tables.iter().find(|t| t.name() == name)
    }

    pub fn table_mut(&mut self, name: &str) -> Option<&mut Table> {
        let name = format_name(name);
        self.tables.iter_mut().find(|t| t.name() == name)
    }

    /// Add an empty table. Returns false if a table with that name already exists.
    pub fn add_table(&mut self, name: &str) -> bool {
        let table = Table::new(name);
        if table.name().is_empty() || self.table(table.name()).is_some() {
            return false;
        }
        self.tables.push(table);
        true
    }

    /// Remove a table from the model. Its files go away on the next save.
    pub fn delete_table(&mut self, name: &str) -> bool {
        let name = format_name(name);
        match self.tables.iter().position(|t| t.name() == name) {
            Some(index) => {
                self.tables.remove(index);
                true
            }
            None => false,
        }
    }

    // ── Paths ───────────────────────────────────────────────────

    pub fn table_path(&self, table: &str) -> PathBuf {
        self.root.join(format_name(table))
    }

    pub fn descriptor_path(&self, table: &str) -> PathBuf {
        self.root
            .join(PROPERTIES_DIR)
            .join(format!("{}.{DESCRIPTOR_EXTENSION}", format_name(table)))
    }

    pub fn row_path(&self, table: &str, row: &str) -> PathBuf {
        self.table_path(table)
            .join(format!("{}.{ROW_EXTENSION}", format_name(row)))
    }

    /// Non-hidden directories directly under the root, sorted.
    fn table_dirs(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_hidden(&name) {
                continue;
            }
            names.push(name);
        }
        names.sort();
        Ok(names)
    }

    // ── Load ────────────────────────────────────────────────────

    /// Replace the in-memory model with what is stored under the root.
    pub fn load(&mut self) -> Result<()> {
        self.tables.clear();

        if !self.root.is_dir() {
            log::debug!("No database at {}, starting empty", self.root.display());
            return Ok(());
        }

        for dir_name in self.table_dirs()? {
            let name = format_name(&dir_name);
            let index = match self.tables.iter().position(|t| t.name() == name) {
                Some(index) => index,
                None => {
                    let table = self.load_table(&dir_name)?;
                    self.tables.push(table);
                    self.tables.len() - 1
                }
            };
            if dir_name != name {
                log::warn!("Table directory '{dir_name}' will be saved as '{name}'");
            }
            let files = row_files(&self.root.join(&dir_name))?;
            load_rows(&mut self.tables[index], files)?;
        }

        log::debug!(
            "Loaded {} table(s) from {}",
            self.tables.len(),
            self.root.display()
        );
        Ok(())
    }

    /// A table with the properties of its descriptor. `dir_name` is the name of
    /// the table directory as found on disk.
    fn load_table(&self, dir_name: &str) -> Result<Table> {
        let mut table = Table::new(dir_name);

        let mut descriptor = self.descriptor_path(dir_name);
        let unformatted = self
            .root
            .join(PROPERTIES_DIR)
            .join(format!("{dir_name}.{DESCRIPTOR_EXTENSION}"));
        if !descriptor.is_file() && unformatted.is_file() {
            descriptor = unformatted;
        }

        match parse_descriptor(&descriptor, table.name()) {
            Ok(properties) => {
                for property in properties {
                    table.insert_property(property);
                }
            }
            Err(TextDbError::DescriptorMissing { table: missing }) => {
                log::warn!("No property descriptor for table '{missing}', loading it without properties");
            }
            Err(e) => return Err(e),
        }

        Ok(table)
    }

    // ── Save ────────────────────────────────────────────────────

    /// Write the whole model to disk, deleting tables and rows that are no
    /// longer present in memory.
    pub fn save(&self) -> Result<()> {
        fs::create_dir_all(self.root.join(PROPERTIES_DIR))?;

        self.prune_tables()?;
        for table in &self.tables {
            self.prune_rows(table)?;
        }
        for table in &self.tables {
            self.write_table(table)?;
        }

        log::debug!(
            "Saved {} table(s) to {}",
            self.tables.len(),
            self.root.display()
        );
        Ok(())
    }

    /// Delete table directories and descriptors with no in-memory table.
    fn prune_tables(&self) -> Result<()> {
        let known: HashSet<&str> = self.tables.iter().map(|t| t.name()).collect();

        for name in self.table_dirs()? {
            let formatted = format_name(&name);
            if known.contains(formatted.as_str()) {
                if formatted != name {
                    self.relocate_table_dir(&name, &formatted)?;
                }
                continue;
            }
            log::info!("Deleting table '{name}'");
            fs::remove_dir_all(self.root.join(&name))?;
            let descriptor = self.descriptor_path(&name);
            if descriptor.is_file() {
                fs::remove_file(descriptor)?;
            }
        }

        for entry in fs::read_dir(self.root.join(PROPERTIES_DIR))? {
            let path = entry?.path();
            if !path.is_file()
                || path.extension().and_then(|e| e.to_str()) != Some(DESCRIPTOR_EXTENSION)
            {
                continue;
            }
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            if !known.contains(stem.as_str()) {
                log::info!("Deleting orphaned descriptor {}", path.display());
                fs::remove_file(&path)?;
            }
        }

        Ok(())
    }

    /// Move the entries of a table directory whose name is not formatted into
    /// the formatted one. Entries whose target already exists stay behind, and
    /// so does the old directory unless it ends up empty.
    fn relocate_table_dir(&self, from: &str, to: &str) -> Result<()> {
        let source = self.root.join(from);
        let target = self.root.join(to);
        fs::create_dir_all(&target)?;

        let mut kept = 0;
        for entry in fs::read_dir(&source)? {
            let entry = entry?;
            let destination = target.join(entry.file_name());
            if destination.exists() {
                kept += 1;
                continue;
            }
            fs::rename(entry.path(), destination)?;
        }

        if kept == 0 {
            fs::remove_dir(&source)?;
            log::info!("Moved table directory '{from}' to '{to}'");
        } else {
            log::warn!("Kept {kept} entries of '{from}' that already exist in '{to}'");
        }
        Ok(())
    }

    /// Delete row files of a retained table that have no in-memory row.
    fn prune_rows(&self, table: &Table) -> Result<()> {
        let known: HashSet<&str> = table.iter().map(|r| r.name()).collect();

        for path in row_files(&self.table_path(table.name()))? {
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            if !known.contains(stem.as_str()) {
                log::info!("Deleting row {}/{}", table.name(), stem);
                fs::remove_file(&path)?;
            }
        }
        Ok(())
    }

    fn write_table(&self, table: &Table) -> Result<()> {
        fs::create_dir_all(self.table_path(table.name()))?;
        fs::write(
            self.descriptor_path(table.name()),
            render_descriptor(table.properties())?,
        )?;

        for row in table {
            let path = self.row_path(table.name(), row.name());
            log::debug!("Writing {}", path.display());
            document::write_document(&path, &row.header(), row.content())?;
        }
        Ok(())
    }

    /// Reload from disk and save straight back, normalising hand-edited files.
    pub fn fix(&mut self) -> Result<()> {
        self.load()?;
        self.save()
    }

    // ── Relations ───────────────────────────────────────────────

    /// Target table of a relation property.
    pub fn relation_target(&self, table: &str, property: &str) -> Result<String> {
        let source = self
            .table(table)
            .ok_or_else(|| TextDbError::TableNotFound(format_name(table)))?;
        let prop = source
            .get_property(property)
            .ok_or_else(|| TextDbError::PropertyNotFound {
                table: source.name().to_string(),
                property: property.to_string(),
            })?;
        prop.relation_target()
            .map(str::to_string)
            .ok_or_else(|| TextDbError::TypeMismatch {
                property: property.to_string(),
                expected: "relation".to_string(),
                actual: prop.column_type().name().to_string(),
            })
    }

    fn relation_mut(&mut self, table: &str, row: &str, property: &str) -> Result<&mut Relation> {
        let source = self
            .table_mut(table)
            .ok_or_else(|| TextDbError::TableNotFound(format_name(table)))?;
        let table_name = source.name().to_string();
        let row_ref = source
            .get_row_mut(row)
            .ok_or_else(|| TextDbError::RowNotFound {
                table: table_name.clone(),
                row: format_name(row),
            })?;
        let value = row_ref
            .get_mut(property)
            .ok_or_else(|| TextDbError::PropertyNotFound {
                table: table_name,
                property: property.to_string(),
            })?;
        let actual = value.kind();
        value
            .as_relation_mut()
            .ok_or_else(|| TextDbError::TypeMismatch {
                property: property.to_string(),
                expected: "relation".to_string(),
                actual: actual.to_string(),
            })
    }

    /// Add `target_row` to a row's relation column. Returns false if the target
    /// row does not currently exist or is already a member.
    pub fn link(&mut self, table: &str, row: &str, property: &str, target_row: &str) -> Result<bool> {
        let target = self.relation_target(table, property)?;
        let exists = self
            .table(&target)
            .ok_or_else(|| TextDbError::TableNotFound(target.clone()))?
            .get_row(target_row)
            .is_some();
        if !exists {
            return Ok(false);
        }
        Ok(self.relation_mut(table, row, property)?.push(target_row))
    }

    /// Remove `target_row` from a row's relation column.
    pub fn unlink(&mut self, table: &str, row: &str, property: &str, target_row: &str) -> Result<bool> {
        Ok(self.relation_mut(table, row, property)?.delete(target_row))
    }

    /// Rows currently referenced by a row's relation column. Members whose row no
    /// longer exists are skipped.
    pub fn resolve(&self, table: &str, row: &str, property: &str) -> Result<Vec<&Row>> {
        let source = self
            .table(table)
            .ok_or_else(|| TextDbError::TableNotFound(format_name(table)))?;
        let row_ref = source
            .get_row(row)
            .ok_or_else(|| TextDbError::RowNotFound {
                table: source.name().to_string(),
                row: format_name(row),
            })?;
        let value = row_ref
            .get(property)
            .ok_or_else(|| TextDbError::PropertyNotFound {
                table: source.name().to_string(),
                property: property.to_string(),
            })?;
        let relation = value.as_relation().ok_or_else(|| TextDbError::TypeMismatch {
            property: property.to_string(),
            expected: "relation".to_string(),
            actual: value.kind().to_string(),
        })?;
        Ok(relation.resolve(self).collect())
    }
}

/// Row files of a table directory, sorted. Hidden files and files with
/// other extensions are not rows.
fn row_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let pattern = format!(
        "{}/*.{ROW_EXTENSION}",
        glob::Pattern::escape(&dir.to_string_lossy())
    );
    let mut files: Vec<PathBuf> = glob::glob(&pattern)
        .map_err(|e| TextDbError::Other(format!("Glob error: {e}")))?
        .filter_map(|r| match r {
            Ok(path) => Some(path),
            Err(e) => {
                log::warn!("Skipping unreadable entry: {e}");
                None
            }
        })
        .filter(|path| path.is_file())
        .filter(|path| {
            path.file_name()
                .map(|n| !is_hidden(&n.to_string_lossy()))
                .unwrap_or(false)
        })
        .collect();
    files.sort();
    Ok(files)
}

fn load_rows(table: &mut Table, files: Vec<PathBuf>) -> Result<()> {
    for path in files {
        let doc = document::read_document(&path)?;
        let row_name = doc.name.clone();
        if !table.insert_document(doc)? {
            log::warn!(
                "Skipping {}: row '{}' already loaded in '{}'",
                path.display(),
                format_name(&row_name),
                table.name()
            );
        }
    }
    Ok(())
}

impl Keyed for Database {
    type Item = Table;

    fn get(&self, key: &str) -> Option<&Table> {
        self.table(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::PropertyEdit;
    use crate::value::Value;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn setup_test_db() -> (TempDir, Database) {
        let tmp = TempDir::new().unwrap();
        let mut db = Database::open(tmp.path().join("maindb")).unwrap();

        db.add_table("tasks");
        let tasks = db.table_mut("tasks").unwrap();
        tasks.add_property("done", "checkbox", None).unwrap();
        tasks.add_property("url", "text", None).unwrap();
        tasks.add_row([("name", "eat dinner")]).unwrap();
        tasks
            .add_row([("name", Value::from("sleep")), ("done", Value::from(true))])
            .unwrap();
        tasks
            .add_row([
                ("name", Value::from("take vitamins")),
                ("content", Value::from("two a day")),
            ])
            .unwrap();

        db.add_table("projects");
        db.table_mut("projects").unwrap().add_relation("tasks").unwrap();

        (tmp, db)
    }

    fn snapshot(db: &Database) -> Vec<(String, Vec<Row>)> {
        db.tables()
            .iter()
            .map(|t| (t.name().to_string(), t.rows().to_vec()))
            .collect()
    }

    fn read_tree(root: &Path) -> Vec<(PathBuf, String)> {
        let mut files = Vec::new();
        let mut stack = vec![root.to_path_buf()];
        while let Some(dir) = stack.pop() {
            for entry in fs::read_dir(&dir).unwrap() {
                let path = entry.unwrap().path();
                if path.is_dir() {
                    stack.push(path);
                } else {
                    let text = fs::read_to_string(&path).unwrap();
                    files.push((path, text));
                }
            }
        }
        files.sort();
        files
    }

    #[test]
    fn test_open_missing_directory_is_empty() {
        let tmp = TempDir::new().unwrap();
        let db = Database::open(tmp.path().join("nothing-here")).unwrap();
        assert!(db.tables().is_empty());
    }

    #[test]
    fn test_save_writes_layout() {
        let (tmp, db) = setup_test_db();
        db.save().unwrap();

        let root = tmp.path().join("maindb");
        let descriptor = fs::read_to_string(root.join(".properties/tasks.yaml")).unwrap();
        assert_eq!(descriptor, "done: checkbox\nurl: text\n");

        let relation_descriptor =
            fs::read_to_string(root.join(".properties/projects.yaml")).unwrap();
        assert!(relation_descriptor.contains("type: relation"));
        assert!(relation_descriptor.contains("structure: tasks"));

        let row = fs::read_to_string(root.join("tasks/eat_dinner.md")).unwrap();
        assert_eq!(row, "---\ndone: false\nurl: ''\n---\n");
        let row = fs::read_to_string(root.join("tasks/take_vitamins.md")).unwrap();
        assert!(row.ends_with("---\ntwo a day"));
    }

    #[test]
    fn test_round_trip() {
        let (tmp, mut db) = setup_test_db();
        db.table_mut("projects")
            .unwrap()
            .add_row([
                ("name", Value::from("relationtest")),
                ("tasks", Value::from(vec!["sleep", "take vitamins"])),
            ])
            .unwrap();
        db.save().unwrap();

        let reloaded = Database::open(tmp.path().join("maindb")).unwrap();
        assert_eq!(reloaded.table_names(), vec!["projects", "tasks"]);
        for table in db.tables() {
            let other = reloaded.table(table.name()).unwrap();
            assert_eq!(other.properties(), table.properties());
            assert_eq!(other.row_names().len(), table.row_names().len());
            for row in table {
                assert_eq!(other.get_row(row.name()), Some(row));
            }
        }
    }

    #[test]
    fn test_save_is_idempotent() {
        let (tmp, db) = setup_test_db();
        let root = tmp.path().join("maindb");

        db.save().unwrap();
        let first = read_tree(&root);
        db.save().unwrap();
        let second = read_tree(&root);
        assert_eq!(first, second);

        let mut reloaded = Database::open(&root).unwrap();
        reloaded.fix().unwrap();
        assert_eq!(read_tree(&root), first);
    }

    #[test]
    fn test_save_removes_untracked_row_file() {
        let (tmp, db) = setup_test_db();
        db.save().unwrap();

        let root = tmp.path().join("maindb");
        let stray = root.join("tasks/stray.md");
        fs::write(&stray, "not tracked").unwrap();
        let notes = root.join("tasks/notes.txt");
        fs::write(&notes, "not a row").unwrap();

        db.save().unwrap();
        assert!(!stray.exists());
        assert!(notes.exists(), "non-row files are left alone");
    }

    #[test]
    fn test_deleted_row_and_table_are_removed_on_save() {
        let (tmp, mut db) = setup_test_db();
        db.save().unwrap();
        let root = tmp.path().join("maindb");

        assert!(db.table_mut("tasks").unwrap().delete_row("sleep"));
        assert!(root.join("tasks/sleep.md").exists(), "deletion is deferred");
        assert!(db.delete_table("projects"));
        db.save().unwrap();

        assert!(!root.join("tasks/sleep.md").exists());
        assert!(root.join("tasks/eat_dinner.md").exists());
        assert!(!root.join("projects").exists());
        assert!(!root.join(".properties/projects.yaml").exists());
        assert!(root.join(".properties/tasks.yaml").exists());
    }

    #[test]
    fn test_new_table_is_created_on_save() {
        let (tmp, mut db) = setup_test_db();
        db.save().unwrap();

        db.add_table("notes");
        db.save().unwrap();

        let root = tmp.path().join("maindb");
        assert!(root.join("notes").is_dir());
        assert!(root.join(".properties/notes.yaml").is_file());
    }

    #[test]
    fn test_load_without_descriptor_is_schemaless() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("db");
        fs::create_dir_all(root.join("loose")).unwrap();
        fs::write(root.join("loose/hello world.md"), "---\nmood: happy\n---\nbody").unwrap();
        fs::create_dir_all(root.join(".git")).unwrap();

        let db = Database::open(&root).unwrap();
        assert_eq!(db.table_names(), vec!["loose"]);

        let table = db.table("loose").unwrap();
        assert!(table.properties().is_empty());
        let row = table.get_row("hello world").unwrap();
        assert_eq!(row.name(), "hello_world");
        assert_eq!(row.get("mood"), None);
        assert_eq!(row.content(), "body");
    }

    #[test]
    fn test_load_coerces_and_fills_defaults() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("db");
        fs::create_dir_all(root.join(".properties")).unwrap();
        fs::create_dir_all(root.join("tasks")).unwrap();
        fs::write(
            root.join(".properties/tasks.yaml"),
            "done: checkbox\nscore: number\ndue: date\n",
        )
        .unwrap();
        fs::write(
            root.join("tasks/walk.md"),
            "---\ndone: 'TRUE'\ndue: 2024-05-01\nextra: 1\n---\nouter\n",
        )
        .unwrap();
        fs::write(root.join("tasks/bare.md"), "no header here\nat all").unwrap();

        let db = Database::open(&root).unwrap();
        let table = db.table("tasks").unwrap();

        let walk = table.get_row("walk").unwrap();
        assert_eq!(walk.get("done"), Some(&Value::Bool(true)));
        assert_eq!(walk.get("score"), Some(&Value::Number(0.0)));
        assert_eq!(
            walk.get("due"),
            Some(&Value::Date(chrono::NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()))
        );
        assert_eq!(walk.get("extra"), None);
        assert_eq!(walk.content(), "outer");

        let bare = table.get_row("bare").unwrap();
        assert_eq!(bare.content(), "no header here\nat all");
        assert_eq!(bare.get("done"), Some(&Value::Bool(false)));
    }

    #[test]
    fn test_load_unknown_type_fails() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("db");
        fs::create_dir_all(root.join(".properties")).unwrap();
        fs::create_dir_all(root.join("tasks")).unwrap();
        fs::write(root.join(".properties/tasks.yaml"), "cost: money\n").unwrap();

        let result = Database::open(&root);
        assert!(matches!(result, Err(TextDbError::UnknownType { .. })));
    }

    #[test]
    fn test_load_keeps_unreadable_header_value() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("db");
        fs::create_dir_all(root.join(".properties")).unwrap();
        fs::create_dir_all(root.join("tasks")).unwrap();
        fs::write(root.join(".properties/tasks.yaml"), "done: checkbox
").unwrap();
        fs::write(root.join("tasks/a.md"), "---\ndone: yes\n---\n").unwrap();
        fs::write(root.join("tasks/b.md"), "---\ndone: true\n---\n").unwrap();

        let mut db = Database::open(&root).unwrap();
        let table = db.table("tasks").unwrap();
        assert_eq!(table.get_row("a").unwrap().get("done"), Some(&Value::from("yes")));
        assert_eq!(table.get_row("b").unwrap().get("done"), Some(&Value::Bool(true)));

        db.fix().unwrap();
        let reloaded = Database::open(&root).unwrap();
        assert_eq!(reloaded.table("tasks").unwrap().len(), 2);
    }

    #[test]
    fn test_unreadable_edit_survives_save() {
        let (tmp, mut db) = setup_test_db();
        db.table_mut("tasks")
            .unwrap()
            .edit_row("sleep", [("done", "maybe")])
            .unwrap();
        db.save().unwrap();

        let reloaded = Database::open(tmp.path().join("maindb")).unwrap();
        let sleep = reloaded.table("tasks").unwrap().get_row("sleep").unwrap();
        assert_eq!(sleep.get("done"), Some(&Value::from("maybe")));
    }

    #[test]
    fn test_retype_with_non_numeric_value_survives_reopen() {
        let (tmp, mut db) = setup_test_db();
        let tasks = db.table_mut("tasks").unwrap();
        tasks.edit_row("sleep", [("url", "high")]).unwrap();
        tasks.edit_row("eat dinner", [("url", "3")]).unwrap();
        tasks
            .edit_property("url", PropertyEdit::retype("number"))
            .unwrap();
        db.save().unwrap();

        let root = tmp.path().join("maindb");
        let descriptor = fs::read_to_string(root.join(".properties/tasks.yaml")).unwrap();
        assert_eq!(descriptor, "done: checkbox\nurl: number\n");

        let reloaded = Database::open(&root).unwrap();
        let tasks = reloaded.table("tasks").unwrap();
        assert_eq!(tasks.get_row("sleep").unwrap().get("url"), Some(&Value::from("high")));
        assert_eq!(
            tasks.get_row("eat dinner").unwrap().get("url"),
            Some(&Value::Number(3.0))
        );
    }

    #[test]
    fn test_unformatted_table_directory_is_moved_on_save() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("db");
        fs::create_dir_all(root.join("my tasks")).unwrap();
        fs::write(root.join("my tasks/a.md"), "precious").unwrap();
        fs::write(root.join("my tasks/notes.txt"), "not a row").unwrap();

        let db = Database::open(&root).unwrap();
        assert_eq!(db.table_names(), vec!["my_tasks"]);
        let table = db.table("my_tasks").unwrap();
        assert_eq!(table.get_row("a").unwrap().content(), "precious");

        db.save().unwrap();
        assert!(!root.join("my tasks").exists());
        assert_eq!(fs::read_to_string(root.join("my_tasks/a.md")).unwrap(), "precious");
        assert!(root.join("my_tasks/notes.txt").exists());

        let reloaded = Database::open(&root).unwrap();
        assert_eq!(reloaded.table_names(), vec!["my_tasks"]);
        assert_eq!(reloaded.table("my_tasks").unwrap().len(), 1);
    }

    #[test]
    fn test_unformatted_table_directory_keeps_clashing_files() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("db");
        fs::create_dir_all(root.join("v1.2")).unwrap();
        fs::create_dir_all(root.join("v1-2")).unwrap();
        fs::write(root.join("v1.2/a.md"), "from dotted").unwrap();
        fs::write(root.join("v1.2/b.md"), "only dotted").unwrap();
        fs::write(root.join("v1-2/a.md"), "from formatted").unwrap();

        let db = Database::open(&root).unwrap();
        assert_eq!(db.table_names(), vec!["v1-2"]);
        let table = db.table("v1-2").unwrap();
        assert_eq!(table.get_row("a").unwrap().content(), "from formatted");
        assert_eq!(table.get_row("b").unwrap().content(), "only dotted");

        db.save().unwrap();
        assert_eq!(fs::read_to_string(root.join("v1-2/b.md")).unwrap(), "only dotted");
        assert_eq!(fs::read_to_string(root.join("v1.2/a.md")).unwrap(), "from dotted");
    }

    #[test]
    fn test_add_table_rejects_duplicates() {
        let (_tmp, mut db) = setup_test_db();
        assert!(!db.add_table("tasks"));
        assert!(db.add_table("my notes"));
        assert!(db.table("my notes").is_some());
        assert_eq!(db.table("my notes").unwrap().name(), "my_notes");
    }

    #[test]
    fn test_relation_scenario() {
        let (_tmp, mut db) = setup_test_db();
        db.table_mut("projects")
            .unwrap()
            .add_row([
                ("name", Value::from("relationtest")),
                ("tasks", Value::from(vec!["sleep", "take vitamins"])),
            ])
            .unwrap();

        let resolved = db.resolve("projects", "relationtest", "tasks").unwrap();
        let names: Vec<&str> = resolved.iter().map(|r| r.name()).collect();
        assert_eq!(names, vec!["sleep", "take_vitamins"]);

        let relation = db
            .table("projects")
            .unwrap()
            .get_row("relationtest")
            .unwrap()
            .relation("tasks")
            .unwrap();
        assert_eq!(relation.get("sleep", &db).unwrap().get("done"), Some(&Value::Bool(true)));
        assert!(relation.get("eat dinner", &db).is_none());
    }

    #[test]
    fn test_link_requires_existing_target_row() {
        let (_tmp, mut db) = setup_test_db();
        db.table_mut("projects")
            .unwrap()
            .add_row([("name", "neatproject")])
            .unwrap();

        assert!(!db.link("projects", "neatproject", "tasks", "fly to mars").unwrap());
        assert!(db.link("projects", "neatproject", "tasks", "eat dinner").unwrap());
        assert!(!db.link("projects", "neatproject", "tasks", "eat dinner").unwrap());

        let relation = db
            .table("projects")
            .unwrap()
            .get_row("neatproject")
            .unwrap()
            .relation("tasks")
            .unwrap();
        assert_eq!(relation.items(), ["eat_dinner"]);

        assert!(db.unlink("projects", "neatproject", "tasks", "eat dinner").unwrap());
        assert!(!db.unlink("projects", "neatproject", "tasks", "eat dinner").unwrap());
    }

    #[test]
    fn test_relation_add_checks_target_table() {
        let (_tmp, db) = setup_test_db();
        let tasks = db.table("tasks").unwrap();
        let projects = db.table("projects").unwrap();

        let mut relation = Relation::new("tasks");
        assert!(relation.add("sleep", tasks));
        assert!(!relation.add("ghost", tasks));
        assert!(!relation.add("sleep", projects));
        assert_eq!(relation.items(), ["sleep"]);
    }

    #[test]
    fn test_relation_is_weak() {
        let (_tmp, mut db) = setup_test_db();
        db.table_mut("projects")
            .unwrap()
            .add_row([
                ("name", Value::from("p")),
                ("tasks", Value::from(vec!["sleep", "eat dinner"])),
            ])
            .unwrap();

        db.table_mut("tasks").unwrap().delete_row("sleep");

        let resolved = db.resolve("projects", "p", "tasks").unwrap();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].name(), "eat_dinner");
    }

    #[test]
    fn test_link_on_non_relation_property_fails() {
        let (_tmp, mut db) = setup_test_db();
        let result = db.link("tasks", "sleep", "done", "eat dinner");
        assert!(matches!(result, Err(TextDbError::TypeMismatch { .. })));
        let result = db.link("nope", "sleep", "done", "eat dinner");
        assert!(matches!(result, Err(TextDbError::TableNotFound(_))));
    }

    #[test]
    fn test_rename_property_survives_save() {
        let (tmp, mut db) = setup_test_db();
        db.table_mut("tasks")
            .unwrap()
            .edit_property("done", PropertyEdit::rename("finished"))
            .unwrap();
        db.save().unwrap();

        let reloaded = Database::open(tmp.path().join("maindb")).unwrap();
        let sleep = reloaded.table("tasks").unwrap().get_row("sleep").unwrap();
        assert_eq!(sleep.column_names().collect::<Vec<_>>(), vec!["finished", "url"]);
        assert_eq!(sleep.get("finished"), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_keyed_lookup() {
        let (_tmp, db) = setup_test_db();
        let tasks = Keyed::get(&db, "tasks").unwrap();
        let sleep = Keyed::get(tasks, "sleep").unwrap();
        assert_eq!(Keyed::get(sleep, "done"), Some(&Value::Bool(true)));
        assert!(Keyed::get(&db, "ghost").is_none());
    }

    #[test]
    fn test_snapshot_unchanged_by_save() {
        let (_tmp, db) = setup_test_db();
        let before = snapshot(&db);
        db.save().unwrap();
        assert_eq!(snapshot(&db), before);
    }
}
