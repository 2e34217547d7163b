//! In-memory tables.

use std::collections::HashMap;

use nexus_stmt::{ColumnMeta, Row};
use parking_lot::RwLock;

/// One table: its columns, rows and a metadata version bumped on every
/// definition change.
#[derive(Debug, Clone)]
pub struct Table {
    /// Table name.
    pub name: String,
    /// Column definitions.
    pub columns: Vec<ColumnMeta>,
    /// Stored rows.
    pub rows: Vec<Row>,
    /// Metadata version.
    pub version: u64,
}

impl Table {
    /// Position of a column, matched case-insensitively.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }
}

/// Table store keyed by lowercased name.
#[derive(Debug, Default)]
pub struct Catalog {
    tables: RwLock<HashMap<String, Table>>,
    next_version: RwLock<u64>,
}

impl Catalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    fn bump(&self) -> u64 {
        let mut next = self.next_version.write();
        *next += 1;
        *next
    }

    /// Creates or replaces a table.
    pub fn create(&self, name: &str, columns: Vec<ColumnMeta>) {
        let version = self.bump();
        let table = Table {
            name: name.to_string(),
            columns: columns
                .into_iter()
                .map(|c| c.with_table(name))
                .collect(),
            rows: Vec::new(),
            version,
        };
        self.tables.write().insert(name.to_ascii_lowercase(), table);
    }

    /// Drops a table. Returns false if it did not exist.
    pub fn drop_table(&self, name: &str) -> bool {
        self.tables.write().remove(&name.to_ascii_lowercase()).is_some()
    }

    /// Returns true if the table exists.
    pub fn contains(&self, name: &str) -> bool {
        self.tables.read().contains_key(&name.to_ascii_lowercase())
    }

    /// Copy of a table.
    pub fn get(&self, name: &str) -> Option<Table> {
        self.tables.read().get(&name.to_ascii_lowercase()).cloned()
    }

    /// Current metadata version of a table.
    pub fn version(&self, name: &str) -> Option<u64> {
        self.tables
            .read()
            .get(&name.to_ascii_lowercase())
            .map(|t| t.version)
    }

    /// Sorted table names.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.read().values().map(|t| t.name.clone()).collect();
        names.sort();
        names
    }

    /// Runs `f` on a table with write access.
    pub fn with_table_mut<R>(&self, name: &str, f: impl FnOnce(&mut Table) -> R) -> Option<R> {
        self.tables
            .write()
            .get_mut(&name.to_ascii_lowercase())
            .map(f)
    }

    /// Marks a table's metadata as changed without altering it.
    pub fn touch(&self, name: &str) -> bool {
        let version = self.bump();
        self.with_table_mut(name, |t| t.version = version).is_some()
    }

    /// Appends a column, filling existing rows with NULL.
    pub fn add_column(&self, name: &str, column: ColumnMeta) -> bool {
        let version = self.bump();
        self.with_table_mut(name, |t| {
            t.columns.push(column.with_table(t.name.clone()));
            for row in &mut t.rows {
                row.push(nexus_wire::Value::Null);
            }
            t.version = version;
        })
        .is_some()
    }
}
