//! Snapshot of the live database schema.
//!
//! Table and column comments carry the references written by the
//! reconciler; a table or column with an empty comment has no reference.

use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LiveSchema {
    pub tables: Vec<LiveTable>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LiveTable {
    pub name: String,
    pub comment: String,
    pub columns: Vec<LiveColumn>,
    pub foreign_keys: Vec<LiveForeignKey>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LiveColumn {
    pub name: String,
    pub column_type: String,
    pub nullable: bool,
    pub default: Option<String>,
    /// `COLUMN_KEY`: `PRI`, `MUL`, `UNI` or empty
    pub key: String,
    pub extra: String,
    pub comment: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LiveForeignKey {
    pub constraint_name: String,
    pub table: String,
    pub column: String,
    pub referenced_table: String,
    pub referenced_column: String,
    pub update_rule: String,
    pub delete_rule: String,
}

/// Name and type of a column found through its reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRef {
    pub name: String,
    pub column_type: String,
}

impl LiveTable {
    pub fn new(name: impl Into<String>, comment: impl Into<String>) -> Self {
        LiveTable {
            name: name.into(),
            comment: comment.into(),
            ..Default::default()
        }
    }

    pub fn with_column(mut self, column: LiveColumn) -> Self {
        self.columns.push(column);
        self
    }

    pub fn with_foreign_key(mut self, fk: LiveForeignKey) -> Self {
        self.foreign_keys.push(fk);
        self
    }

    pub fn column(&self, name: &str) -> Option<&LiveColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_by_comment(&self, reference: &str) -> Option<&LiveColumn> {
        self.columns.iter().find(|c| c.comment == reference)
    }
}

impl LiveColumn {
    pub fn new(
        name: impl Into<String>,
        column_type: impl Into<String>,
        comment: impl Into<String>,
    ) -> Self {
        LiveColumn {
            name: name.into(),
            column_type: column_type.into(),
            nullable: true,
            comment: comment.into(),
            ..Default::default()
        }
    }
}

impl LiveSchema {
    pub fn new(tables: Vec<LiveTable>) -> Self {
        LiveSchema { tables }
    }

    pub fn table(&self, name: &str) -> Option<&LiveTable> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Referenced tables keyed by their comment. Tables without a comment
    /// carry no reference and are left out.
    pub fn list_tables(&self) -> BTreeMap<String, String> {
        self.tables
            .iter()
            .filter(|t| !t.comment.is_empty())
            .map(|t| (t.comment.clone(), t.name.clone()))
            .collect()
    }

    /// Referenced columns of `table` keyed by their comment.
    pub fn list_columns(&self, table: &str) -> BTreeMap<String, String> {
        self.table(table)
            .map(|t| {
                t.columns
                    .iter()
                    .filter(|c| !c.comment.is_empty())
                    .map(|c| (c.comment.clone(), c.name.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Reference stored on `table`, if any.
    pub fn table_ref(&self, table: &str) -> Option<&str> {
        self.table(table)
            .map(|t| t.comment.as_str())
            .filter(|c| !c.is_empty())
    }

    pub fn table_by_ref(&self, reference: &str) -> Option<&LiveTable> {
        if reference.is_empty() {
            return None;
        }
        self.tables.iter().find(|t| t.comment == reference)
    }

    pub fn column_by_ref(&self, table: &str, reference: &str) -> Option<ColumnRef> {
        if reference.is_empty() {
            return None;
        }
        self.table(table)?
            .column_by_comment(reference)
            .map(|c| ColumnRef {
                name: c.name.clone(),
                column_type: c.column_type.clone(),
            })
    }

    pub fn foreign_keys(&self, table: &str) -> &[LiveForeignKey] {
        self.table(table)
            .map(|t| t.foreign_keys.as_slice())
            .unwrap_or(&[])
    }

    /// Foreign keys of any table that point at `table`.
    pub fn referencing_foreign_keys(&self, table: &str) -> Vec<&LiveForeignKey> {
        self.tables
            .iter()
            .flat_map(|t| t.foreign_keys.iter())
            .filter(|fk| fk.referenced_table == table)
            .collect()
    }
}
