//! Reconciliation of the declared schema against a live snapshot.
//!
//! Tables and columns are correlated by reference first and by name second.
//! The diff is computed without any interaction: conflicts and orphans are
//! reported as pending decisions and the planner asks a
//! [`Resolver`](crate::resolve::Resolver) about each of them.

use std::collections::HashSet;

use crate::ir::{EntitySpec, SchemaDocument};
use crate::live::{LiveSchema, LiveTable};
use crate::resolve::Question;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableDecision {
    /// Same name, same reference.
    NoOp,
    /// Nothing live matches by name or reference.
    AddTable,
    /// The reference lives on a table with another name.
    RenameTable { from: String },
    /// A table with that name exists but carries another reference.
    Conflict { live_ref: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnDecision {
    NoOp,
    AddColumn,
    RenameColumn { from: String },
    Conflict { live_ref: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDiff {
    pub column: String,
    /// Column declared just before this one, used for `AFTER` placement
    pub previous: Option<String>,
    pub decision: ColumnDecision,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDiff {
    pub bundle: String,
    pub entity: String,
    /// Physical table name as declared
    pub table: String,
    pub decision: TableDecision,
    /// Column decisions; empty for `AddTable`
    pub columns: Vec<ColumnDiff>,
    /// Live columns with no declared counterpart
    pub orphan_columns: Vec<String>,
}

impl TableDiff {
    pub fn is_noop(&self) -> bool {
        self.decision == TableDecision::NoOp
            && self.orphan_columns.is_empty()
            && self
                .columns
                .iter()
                .all(|c| c.decision == ColumnDecision::NoOp)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaDiff {
    pub tables: Vec<TableDiff>,
    /// Live tables matched by no declared entity
    pub orphan_tables: Vec<String>,
}

impl SchemaDiff {
    pub fn compute(doc: &SchemaDocument, live: &LiveSchema) -> Self {
        let mut claimed: HashSet<&str> = HashSet::new();
        let mut tables = Vec::new();

        for (bundle, entity_name, entity) in doc.entities() {
            let table = entity.table_name(entity_name);
            let reference = entity.reference();
            let by_ref = reference.and_then(|r| live.table_by_ref(r));
            if let Some(t) = by_ref {
                claimed.insert(t.name.as_str());
            }

            let (decision, compared) = match live.table(table) {
                Some(existing) => {
                    claimed.insert(existing.name.as_str());
                    if reference.is_some() && live.table_ref(table) == reference {
                        (TableDecision::NoOp, Some(existing))
                    } else {
                        let live_ref = live.table_ref(table).map(str::to_string);
                        (TableDecision::Conflict { live_ref }, Some(existing))
                    }
                }
                None => match by_ref {
                    Some(old) => (
                        TableDecision::RenameTable {
                            from: old.name.clone(),
                        },
                        Some(old),
                    ),
                    None => (TableDecision::AddTable, None),
                },
            };

            let (columns, orphan_columns) = match compared {
                Some(live_table) => diff_columns(entity, live_table),
                None => (Vec::new(), Vec::new()),
            };

            tables.push(TableDiff {
                bundle: bundle.to_string(),
                entity: entity_name.to_string(),
                table: table.to_string(),
                decision,
                columns,
                orphan_columns,
            });
        }

        let orphan_tables = live
            .tables
            .iter()
            .filter(|t| !claimed.contains(t.name.as_str()))
            .map(|t| t.name.clone())
            .collect();

        SchemaDiff {
            tables,
            orphan_tables,
        }
    }

    /// Decisions the operator has to make, in the order the planner asks
    /// them when every table conflict is answered `update`.
    pub fn questions(&self) -> Vec<Question> {
        let mut questions = Vec::new();
        for t in &self.tables {
            if matches!(t.decision, TableDecision::Conflict { .. }) {
                questions.push(Question::TableConflict {
                    table: t.table.clone(),
                });
            }
            if t.decision == TableDecision::AddTable {
                continue;
            }
            for c in &t.columns {
                if matches!(c.decision, ColumnDecision::Conflict { .. }) {
                    questions.push(Question::ColumnConflict {
                        table: t.table.clone(),
                        column: c.column.clone(),
                    });
                }
            }
            for column in &t.orphan_columns {
                questions.push(Question::OrphanColumn {
                    table: t.table.clone(),
                    column: column.clone(),
                });
            }
        }
        for table in &self.orphan_tables {
            questions.push(Question::OrphanTable {
                table: table.clone(),
            });
        }
        questions
    }

    pub fn is_empty(&self) -> bool {
        self.orphan_tables.is_empty() && self.tables.iter().all(TableDiff::is_noop)
    }
}

/// Compare the declared columns of `entity` with `live_table`, which is the
/// table under its current physical name.
fn diff_columns(entity: &EntitySpec, live_table: &LiveTable) -> (Vec<ColumnDiff>, Vec<String>) {
    let mut claimed: HashSet<&str> = HashSet::new();
    let mut diffs = Vec::with_capacity(entity.columns.len());

    for (name, spec) in &entity.columns {
        let reference = spec.reference();
        let by_ref = reference.and_then(|r| live_table.column_by_comment(r));
        if let Some(c) = by_ref {
            claimed.insert(c.name.as_str());
        }

        let decision = match live_table.column(name) {
            Some(existing) => {
                claimed.insert(existing.name.as_str());
                if reference.is_some() && Some(existing.comment.as_str()) == reference {
                    ColumnDecision::NoOp
                } else {
                    ColumnDecision::Conflict {
                        live_ref: Some(existing.comment.clone()).filter(|c| !c.is_empty()),
                    }
                }
            }
            None => match by_ref {
                Some(old) => ColumnDecision::RenameColumn {
                    from: old.name.clone(),
                },
                None => ColumnDecision::AddColumn,
            },
        };

        diffs.push(ColumnDiff {
            column: name.clone(),
            previous: entity.previous_column(name).map(str::to_string),
            decision,
        });
    }

    let orphans = live_table
        .columns
        .iter()
        .filter(|c| !claimed.contains(c.name.as_str()))
        .map(|c| c.name.clone())
        .collect();

    (diffs, orphans)
}
