//! Ordered DDL batches built from a diff and the operator's answers.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use tracing::{debug, info, warn};

use crate::ddl::{self, ColumnDefinition};
use crate::diff::{ColumnDecision, SchemaDiff, TableDecision, TableDiff};
use crate::error::{Error, Result};
use crate::ir::{EntitySpec, SchemaDocument};
use crate::live::{LiveForeignKey, LiveSchema, LiveTable};
use crate::resolve::{ConflictAnswer, Question, Resolver};

/// Execution buckets, run in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    /// Foreign keys in the way of a drop, then `DROP TABLE`
    Drop,
    Rename,
    /// Table creation and column changes
    Structure,
    /// Primary keys, indexes and foreign keys
    Relink,
}

impl Phase {
    pub const ALL: [Phase; 4] = [Phase::Drop, Phase::Rename, Phase::Structure, Phase::Relink];

    pub fn name(self) -> &'static str {
        match self {
            Phase::Drop => "drop",
            Phase::Rename => "rename",
            Phase::Structure => "structure",
            Phase::Relink => "relink",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationPlan {
    statements: BTreeMap<Phase, Vec<String>>,
}

impl MigrationPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, phase: Phase, statement: impl Into<String>) {
        self.statements.entry(phase).or_default().push(statement.into());
    }

    pub fn statements(&self, phase: Phase) -> &[String] {
        self.statements.get(&phase).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Non-empty phases in execution order.
    pub fn phases(&self) -> impl Iterator<Item = (Phase, &[String])> {
        self.statements
            .iter()
            .filter(|(_, s)| !s.is_empty())
            .map(|(phase, s)| (*phase, s.as_slice()))
    }

    /// Every statement in execution order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.statements.values().flatten().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.statements.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for (phase, statements) in self.phases() {
            out.push_str(&format!("-- {}\n", phase));
            for statement in statements {
                out.push_str(statement);
                out.push('\n');
            }
        }
        out
    }
}

/// Turn `diff` into a plan, asking `resolver` about every conflict and
/// orphan along the way. A `cancel` answer aborts with
/// [`Error::Cancelled`] before anything is executed.
pub fn plan(
    doc: &SchemaDocument,
    live: &LiveSchema,
    diff: &SchemaDiff,
    resolver: &mut dyn Resolver,
) -> Result<MigrationPlan> {
    let mut planner = Planner {
        doc,
        live,
        resolver,
        plan: MigrationPlan::new(),
        dropped_tables: HashSet::new(),
        dropped_constraints: HashSet::new(),
        linked: HashSet::new(),
        unlinked: Vec::new(),
    };

    for table in &diff.tables {
        planner.plan_table(table)?;
    }
    for table in &diff.orphan_tables {
        let question = Question::OrphanTable {
            table: table.clone(),
        };
        if planner.resolver.confirm_drop(&question)? {
            planner.drop_table(table);
        } else {
            info!(table = %table, "keeping table missing from the schema");
        }
    }
    planner.relink_dropped()?;
    Ok(planner.plan)
}

struct Planner<'a, 'r> {
    doc: &'a SchemaDocument,
    live: &'a LiveSchema,
    resolver: &'r mut dyn Resolver,
    plan: MigrationPlan,
    dropped_tables: HashSet<String>,
    /// `(live table, constraint)`
    dropped_constraints: HashSet<(String, String)>,
    /// `(table, column)` of every foreign key added by the plan
    linked: HashSet<(String, String)>,
    /// Inbound foreign keys dropped along the way, with the declared name
    /// of the table they pointed at
    unlinked: Vec<(LiveForeignKey, String)>,
}

impl Planner<'_, '_> {
    fn plan_table(&mut self, diff: &TableDiff) -> Result<()> {
        let doc = self.doc;
        let live = self.live;
        let entity = doc.entity(&diff.bundle, &diff.entity).ok_or_else(|| {
            Error::Authoring(format!("{}.{} is not declared", diff.bundle, diff.entity))
        })?;

        match &diff.decision {
            TableDecision::AddTable => self.create_table(diff, entity),
            TableDecision::NoOp => match live.table(&diff.table) {
                Some(live_table) => self.alter_table(diff, entity, live_table),
                None => self.create_table(diff, entity),
            },
            TableDecision::RenameTable { from } => {
                self.plan
                    .push(Phase::Rename, ddl::rename_table(from, &diff.table));
                match live.table(from) {
                    Some(live_table) => self.alter_table(diff, entity, live_table),
                    None => Ok(()),
                }
            }
            TableDecision::Conflict { live_ref } => {
                let question = Question::TableConflict {
                    table: diff.table.clone(),
                };
                match self.resolver.resolve_conflict(&question)? {
                    ConflictAnswer::Replace => {
                        self.drop_table(&diff.table);
                        self.create_table(diff, entity)
                    }
                    ConflictAnswer::Update => {
                        debug!(table = %diff.table, live_ref = ?live_ref, "keeping table, re-stamping reference");
                        if let Some(reference) = entity.reference() {
                            self.plan.push(
                                Phase::Structure,
                                ddl::set_table_comment(&diff.table, reference),
                            );
                        }
                        match live.table(&diff.table) {
                            Some(live_table) => self.alter_table(diff, entity, live_table),
                            None => Ok(()),
                        }
                    }
                    ConflictAnswer::Cancel => Err(Error::Cancelled),
                }
            }
        }
    }

    fn create_table(&mut self, diff: &TableDiff, entity: &EntitySpec) -> Result<()> {
        let columns = ddl::resolve_columns(self.doc, &diff.bundle, entity)?;
        self.plan.push(
            Phase::Structure,
            ddl::create_table(&diff.table, entity.reference(), &columns),
        );
        for column in &columns {
            self.link_column(&diff.table, column);
        }
        Ok(())
    }


    /// Column-level changes on a table that already exists, found in the
    /// snapshot as `live_table`.
    fn alter_table(
        &mut self,
        diff: &TableDiff,
        entity: &EntitySpec,
        live_table: &LiveTable,
    ) -> Result<()> {
        let table = diff.table.as_str();
        let mut dropped: Vec<&str> = Vec::new();
        let mut key_changed = false;
        let mut key_added = false;
        // declared columns that exist at the current point of the plan
        let mut present: HashSet<&str> = diff
            .columns
            .iter()
            .filter(|c| c.decision != ColumnDecision::AddColumn)
            .map(|c| c.column.as_str())
            .collect();

        for column in &diff.columns {
            let spec = entity.columns.get(&column.column).ok_or_else(|| {
                Error::Authoring(format!("{}.{} is not declared", table, column.column))
            })?;
            let after = column.previous.as_deref();

            match &column.decision {
                ColumnDecision::NoOp => {}
                ColumnDecision::AddColumn => {
                    let def = ColumnDefinition::resolve(self.doc, &diff.bundle, &column.column, spec)?;
                    present.insert(column.column.as_str());
                    if def.identifier && def.auto_increment {
                        let rebuild = key_added || has_key(live_table, &dropped);
                        key_changed = !self.add_key_column(table, entity, &def, after, &present, rebuild);
                        key_added = true;
                    } else {
                        self.plan
                            .push(Phase::Structure, ddl::add_column(table, &def, after));
                        key_changed |= def.identifier;
                    }
                    self.link_column(table, &def);
                }
                ColumnDecision::RenameColumn { from } => {
                    let def = ColumnDefinition::resolve(self.doc, &diff.bundle, &column.column, spec)?;
                    self.plan
                        .push(Phase::Structure, ddl::change_column(table, from, &def, after));
                }
                ColumnDecision::Conflict { live_ref } => {
                    let question = Question::ColumnConflict {
                        table: table.to_string(),
                        column: column.column.clone(),
                    };
                    match self.resolver.resolve_conflict(&question)? {
                        ConflictAnswer::Replace => {
                            let def = ColumnDefinition::resolve(self.doc, &diff.bundle, &column.column, spec)?;
                            let was_key = live_table
                                .column(&column.column)
                                .map(|c| c.key == "PRI")
                                .unwrap_or(false);
                            self.drop_column(table, live_table, &column.column);
                            dropped.push(column.column.as_str());
                            if def.identifier && def.auto_increment {
                                let rebuild = key_added || has_key(live_table, &dropped);
                                key_changed = !self.add_key_column(table, entity, &def, after, &present, rebuild);
                                key_added = true;
                            } else {
                                self.plan
                                    .push(Phase::Structure, ddl::add_column(table, &def, after));
                                key_changed |= def.identifier || was_key;
                            }
                            self.link_column(table, &def);
                        }
                        ConflictAnswer::Update => {
                            info!(
                                table = %table,
                                column = %column.column,
                                live_ref = ?live_ref,
                                "keeping column as is; its parameters are not reconciled"
                            );
                        }
                        ConflictAnswer::Cancel => return Err(Error::Cancelled),
                    }
                }
            }
        }

        for orphan in &diff.orphan_columns {
            let question = Question::OrphanColumn {
                table: table.to_string(),
                column: orphan.clone(),
            };
            if self.resolver.confirm_drop(&question)? {
                self.drop_column(table, live_table, orphan);
                dropped.push(orphan.as_str());
                key_changed |= !key_added
                    && live_table
                        .column(orphan)
                        .map(|c| c.key == "PRI")
                        .unwrap_or(false);
            } else {
                info!(table = %table, column = %orphan, "keeping column missing from the schema");
            }
        }

        if key_changed {
            let identifiers = entity.identifier_columns();
            if !identifiers.is_empty() {
                let statement = if key_added || has_key(live_table, &dropped) {
                    ddl::rebuild_primary_key(table, &identifiers)
                } else {
                    ddl::add_primary_key(table, &identifiers)
                };
                self.plan.push(Phase::Relink, statement);
            }
        }
        Ok(())
    }

    /// Add an auto-increment identifier together with the primary key over
    /// the identifiers that exist by then. Returns whether that key covers
    /// every declared identifier.
    fn add_key_column(
        &mut self,
        table: &str,
        entity: &EntitySpec,
        def: &ColumnDefinition,
        after: Option<&str>,
        present: &HashSet<&str>,
        rebuild: bool,
    ) -> bool {
        let identifiers = entity.identifier_columns();
        let key: Vec<&str> = identifiers
            .iter()
            .copied()
            .filter(|c| present.contains(c))
            .collect();
        self.plan.push(
            Phase::Structure,
            ddl::add_key_column(table, def, after, &key, rebuild),
        );
        key.len() == identifiers.len()
    }

    fn link_column(&mut self, table: &str, column: &ColumnDefinition) {
        if column.index || column.foreign_key.is_some() {
            self.plan
                .push(Phase::Relink, ddl::add_index(table, &column.name));
        }
        if let Some((target, fk)) = &column.foreign_key {
            self.linked.insert((table.to_string(), column.name.clone()));
            self.plan.push(
                Phase::Relink,
                ddl::add_foreign_key(table, &column.name, target, fk),
            );
        }
    }

    /// Drop `table` and every foreign key of another table pointing at it.
    fn drop_table(&mut self, table: &str) {
        if !self.dropped_tables.insert(table.to_string()) {
            return;
        }
        let live = self.live;
        for fk in live.referencing_foreign_keys(table) {
            if fk.table == table || self.dropped_tables.contains(&fk.table) {
                continue;
            }
            warn!(
                table = %fk.table,
                constraint = %fk.constraint_name,
                "dropping foreign key into {}", table
            );
            self.drop_foreign_key(&fk.table, &fk.constraint_name);
            self.unlinked.push((fk.clone(), table.to_string()));
        }
        self.plan.push(Phase::Drop, ddl::drop_table(table));
    }

    /// Drop a live column, clearing the foreign keys on it and those
    /// pointing at it first. Drops of foreign keys run in the drop phase
    /// under their live table names.
    fn drop_column(&mut self, table: &str, live_table: &LiveTable, column: &str) {
        let live = self.live;
        for fk in live
            .foreign_keys(&live_table.name)
            .iter()
            .filter(|fk| fk.column == column)
        {
            self.drop_foreign_key(&fk.table, &fk.constraint_name);
        }
        for fk in live
            .referencing_foreign_keys(&live_table.name)
            .into_iter()
            .filter(|fk| fk.referenced_column == column)
        {
            if self.dropped_tables.contains(&fk.table) {
                continue;
            }
            warn!(
                table = %fk.table,
                constraint = %fk.constraint_name,
                "dropping foreign key into {}.{}", table, column
            );
            self.drop_foreign_key(&fk.table, &fk.constraint_name);
            self.unlinked.push((fk.clone(), table.to_string()));
        }
        self.plan
            .push(Phase::Structure, ddl::drop_column(table, column));
    }

    fn drop_foreign_key(&mut self, live_table: &str, constraint: &str) {
        let key = (live_table.to_string(), constraint.to_string());
        if self.dropped_constraints.insert(key) {
            self.plan
                .push(Phase::Drop, ddl::drop_foreign_key(live_table, constraint));
        }
    }

    /// Re-add the foreign keys dropped out of the way of a replaced table or
    /// column whose owning column still declares them.
    fn relink_dropped(&mut self) -> Result<()> {
        let doc = self.doc;
        let live = self.live;
        for (fk, target_table) in std::mem::take(&mut self.unlinked) {
            if self.dropped_tables.contains(&fk.table) {
                continue;
            }
            let Some((bundle, name, entity)) = declared_owner(doc, live, &fk.table) else {
                continue;
            };
            let column_ref = live
                .table(&fk.table)
                .and_then(|t| t.column(&fk.column))
                .map(|c| c.comment.as_str())
                .filter(|c| !c.is_empty());
            let Some((column, spec)) = entity
                .columns
                .iter()
                .find(|(n, s)| match column_ref {
                    Some(r) => s.reference() == Some(r),
                    None => n.as_str() == fk.column,
                })
            else {
                continue;
            };
            let Some(index_of) = &spec.index_of else {
                continue;
            };
            let target = ddl::resolve_foreign_key(doc, bundle, index_of)?;
            if target.table != target_table || target.column != fk.referenced_column {
                continue;
            }
            let table = entity.table_name(name);
            if self.linked.insert((table.to_string(), column.clone())) {
                info!(table = %table, column = %column, "recreating foreign key into {}", target_table);
                self.plan.push(
                    Phase::Relink,
                    ddl::add_foreign_key(table, column, &target, index_of),
                );
            }
        }
        Ok(())
    }
}

fn has_key(live_table: &LiveTable, dropped: &[&str]) -> bool {
    live_table
        .columns
        .iter()
        .any(|c| c.key == "PRI" && !dropped.contains(&c.name.as_str()))
}

/// Declared entity living in the live table `table`, found by the table's
/// reference, else by name.
fn declared_owner<'d>(
    doc: &'d SchemaDocument,
    live: &LiveSchema,
    table: &str,
) -> Option<(&'d str, &'d str, &'d EntitySpec)> {
    live.table_ref(table)
        .and_then(|reference| {
            doc.entities()
                .find(|(_, _, e)| e.reference() == Some(reference))
        })
        .or_else(|| doc.entities().find(|(_, name, e)| e.table_name(name) == table))
}
