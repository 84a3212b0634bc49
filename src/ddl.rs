//! MySQL DDL text.
//!
//! Every builder returns one complete statement terminated by `;`.

use crate::error::{Error, Result};
use crate::ir::{ColumnSpec, EntitySpec, ForeignKeySpec, SchemaDocument};

fn quote(ident: &str) -> String {
    format!("`{}`", ident.replace('`', "``"))
}

fn quote_list(idents: &[&str]) -> String {
    idents.iter().map(|i| quote(i)).collect::<Vec<_>>().join(",")
}

fn comment_literal(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

/// Column of another table a foreign key points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignTarget {
    pub table: String,
    pub column: String,
    pub sql_type: String,
    pub zerofill: bool,
}

const MAX_FK_DEPTH: usize = 8;

/// Resolve the table, column and concrete type an `indexOf` points at.
pub fn resolve_foreign_key(
    doc: &SchemaDocument,
    owner_bundle: &str,
    fk: &ForeignKeySpec,
) -> Result<ForeignTarget> {
    resolve_foreign_key_at(doc, owner_bundle, fk, 0)
}

fn resolve_foreign_key_at(
    doc: &SchemaDocument,
    owner_bundle: &str,
    fk: &ForeignKeySpec,
    depth: usize,
) -> Result<ForeignTarget> {
    if depth > MAX_FK_DEPTH {
        return Err(Error::Authoring(format!(
            "foreign key chain through {} is too deep or cyclic",
            fk.model
        )));
    }
    let (bundle, entity_name, entity) = doc.find_entity(owner_bundle, fk).ok_or_else(|| {
        Error::Authoring(format!("indexOf points at unknown entity {}", fk.model))
    })?;

    let (column, spec) = match &fk.property {
        Some(property) => entity
            .columns
            .get_key_value(property)
            .ok_or_else(|| {
                Error::Authoring(format!(
                    "indexOf points at unknown column {}.{}",
                    entity_name, property
                ))
            })?,
        None => entity.columns.iter().find(|(_, c)| c.identifier).ok_or_else(|| {
            Error::Authoring(format!(
                "indexOf points at {} which has no identifier column",
                entity_name
            ))
        })?,
    };

    let (sql_type, zerofill) = match &spec.index_of {
        Some(next) => {
            let target = resolve_foreign_key_at(doc, bundle, next, depth + 1)?;
            (target.sql_type, target.zerofill)
        }
        None => (spec.concrete_type(), spec.zerofill),
    };

    Ok(ForeignTarget {
        table: entity.table_name(entity_name).to_string(),
        column: column.clone(),
        sql_type,
        zerofill,
    })
}

/// A column with its concrete type resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinition {
    pub name: String,
    pub sql_type: String,
    pub zerofill: bool,
    pub not_null: bool,
    /// Rendered SQL literal
    pub default: Option<String>,
    pub auto_increment: bool,
    pub comment: Option<String>,
    pub identifier: bool,
    pub index: bool,
    pub foreign_key: Option<(ForeignTarget, ForeignKeySpec)>,
}

impl ColumnDefinition {
    /// Build the definition of `name` declared in `owner_bundle`. An
    /// `indexOf` column takes the type of the column it references.
    pub fn resolve(
        doc: &SchemaDocument,
        owner_bundle: &str,
        name: &str,
        spec: &ColumnSpec,
    ) -> Result<Self> {
        let (sql_type, zerofill, foreign_key) = match &spec.index_of {
            Some(fk) => {
                let target = resolve_foreign_key(doc, owner_bundle, fk)?;
                (
                    target.sql_type.clone(),
                    target.zerofill,
                    Some((target, fk.clone())),
                )
            }
            None => (spec.concrete_type(), spec.zerofill, None),
        };

        let not_null = spec.identifier || spec.nullable == Some(false);
        let default = if spec.identifier {
            None
        } else {
            spec.default.as_ref().map(|d| d.sql_literal())
        };

        Ok(ColumnDefinition {
            name: name.to_string(),
            sql_type,
            zerofill,
            not_null,
            default,
            auto_increment: spec.auto,
            comment: spec.reference().map(str::to_string),
            identifier: spec.identifier,
            index: spec.index,
            foreign_key,
        })
    }

    /// Everything after the column name, with optional `AFTER` placement.
    pub fn render(&self, after: Option<&str>) -> String {
        let mut sql = format!(" {}", self.sql_type);
        if self.zerofill {
            sql.push_str(" ZEROFILL");
        }
        if self.not_null {
            sql.push_str(" NOT NULL");
        }
        if let Some(default) = &self.default {
            sql.push_str(&format!(" DEFAULT {}", default));
        }
        if self.auto_increment {
            sql.push_str(" AUTO_INCREMENT");
        }
        if let Some(comment) = &self.comment {
            sql.push_str(&format!(" COMMENT {}", comment_literal(comment)));
        }
        if let Some(previous) = after {
            sql.push_str(&format!(" AFTER {}", quote(previous)));
        }
        sql
    }
}

/// Resolve every column of an entity in declaration order.
pub fn resolve_columns(
    doc: &SchemaDocument,
    bundle: &str,
    entity: &EntitySpec,
) -> Result<Vec<ColumnDefinition>> {
    entity
        .columns
        .iter()
        .map(|(name, spec)| ColumnDefinition::resolve(doc, bundle, name, spec))
        .collect()
}

pub fn create_table(table: &str, reference: Option<&str>, columns: &[ColumnDefinition]) -> String {
    let mut lines: Vec<String> = columns
        .iter()
        .map(|c| format!("    {}{}", quote(&c.name), c.render(None)))
        .collect();
    let primary: Vec<&str> = columns
        .iter()
        .filter(|c| c.identifier)
        .map(|c| c.name.as_str())
        .collect();
    if !primary.is_empty() {
        lines.push(format!("    PRIMARY KEY ({})", quote_list(&primary)));
    }
    let mut sql = format!(
        "CREATE TABLE IF NOT EXISTS {} (\n{}\n) ENGINE=InnoDB DEFAULT CHARSET=utf8",
        quote(table),
        lines.join(",\n")
    );
    if let Some(reference) = reference {
        sql.push_str(&format!(" COMMENT={}", comment_literal(reference)));
    }
    sql.push(';');
    sql
}

pub fn add_column(table: &str, column: &ColumnDefinition, after: Option<&str>) -> String {
    format!(
        "ALTER TABLE {} ADD COLUMN {}{};",
        quote(table),
        quote(&column.name),
        column.render(after)
    )
}

/// `ADD COLUMN` that keys the table in the same statement. MySQL refuses an
/// `AUTO_INCREMENT` column that is not part of a key.
pub fn add_key_column(
    table: &str,
    column: &ColumnDefinition,
    after: Option<&str>,
    key: &[&str],
    rebuild: bool,
) -> String {
    format!(
        "ALTER TABLE {} ADD COLUMN {}{}, {}ADD PRIMARY KEY({});",
        quote(table),
        quote(&column.name),
        column.render(after),
        if rebuild { "DROP PRIMARY KEY, " } else { "" },
        quote_list(key)
    )
}

/// Rename `from` to the definition's name, rewriting the definition.
pub fn change_column(
    table: &str,
    from: &str,
    column: &ColumnDefinition,
    after: Option<&str>,
) -> String {
    format!(
        "ALTER TABLE {} CHANGE COLUMN {} {}{};",
        quote(table),
        quote(from),
        quote(&column.name),
        column.render(after)
    )
}

pub fn drop_column(table: &str, column: &str) -> String {
    format!("ALTER TABLE {} DROP COLUMN {};", quote(table), quote(column))
}

pub fn index_name(column: &str) -> String {
    format!("index_{}", column)
}

pub fn add_index(table: &str, column: &str) -> String {
    format!(
        "ALTER TABLE {} ADD INDEX {} ({});",
        quote(table),
        quote(&index_name(column)),
        quote(column)
    )
}

pub fn foreign_key_name(table: &str, column: &str) -> String {
    format!("fk_{}_{}", table, column)
}

pub fn add_foreign_key(table: &str, column: &str, target: &ForeignTarget, fk: &ForeignKeySpec) -> String {
    format!(
        "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY({}) REFERENCES {}({}) ON UPDATE {} ON DELETE {};",
        quote(table),
        quote(&foreign_key_name(table, column)),
        quote(column),
        quote(&target.table),
        quote(&target.column),
        fk.update.unwrap_or_default().sql(),
        fk.delete.unwrap_or_default().sql()
    )
}

pub fn drop_foreign_key(table: &str, constraint: &str) -> String {
    format!(
        "ALTER TABLE {} DROP FOREIGN KEY {};",
        quote(table),
        quote(constraint)
    )
}

pub fn add_primary_key(table: &str, columns: &[&str]) -> String {
    format!(
        "ALTER TABLE {} ADD PRIMARY KEY({});",
        quote(table),
        quote_list(columns)
    )
}

pub fn rebuild_primary_key(table: &str, columns: &[&str]) -> String {
    format!(
        "ALTER TABLE {} DROP PRIMARY KEY, ADD PRIMARY KEY({});",
        quote(table),
        quote_list(columns)
    )
}

pub fn rename_table(from: &str, to: &str) -> String {
    format!("RENAME TABLE {} TO {};", quote(from), quote(to))
}

pub fn drop_table(table: &str) -> String {
    format!("DROP TABLE {};", quote(table))
}

pub fn set_table_comment(table: &str, reference: &str) -> String {
    format!(
        "ALTER TABLE {} COMMENT={};",
        quote(table),
        comment_literal(reference)
    )
}
