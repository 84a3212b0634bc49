use sqlx::mysql::{MySqlPool, MySqlRow};
use sqlx::Row;
use tracing::debug;

use crate::config::Settings;
use crate::error::Result;
use crate::ir::{ColumnSpec, DefaultValue, EntityParams, EntitySpec, ForeignKeySpec, ReferentialAction};
use crate::live::{LiveColumn, LiveForeignKey, LiveSchema, LiveTable};
use crate::types;

/// Read-only queries against the `information_schema` of the configured
/// database.
pub struct Introspector {
    pool: MySqlPool,
}

fn text(row: &MySqlRow, column: &str) -> Result<String> {
    Ok(row.try_get::<Option<String>, _>(column)?.unwrap_or_default())
}

impl Introspector {
    pub async fn connect(settings: &Settings) -> Result<Self> {
        let pool = MySqlPool::connect(settings.database_url()?).await?;
        Ok(Self::new(pool))
    }

    pub fn new(pool: MySqlPool) -> Self {
        Introspector { pool }
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    /// Base tables with their comments, in name order.
    pub async fn tables(&self) -> Result<Vec<(String, String)>> {
        let rows = sqlx::query(
            "SELECT CAST(TABLE_NAME AS CHAR) AS name, CAST(TABLE_COMMENT AS CHAR) AS comment \
             FROM information_schema.TABLES \
             WHERE TABLE_SCHEMA = DATABASE() AND TABLE_TYPE = 'BASE TABLE' \
             ORDER BY TABLE_NAME",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|r| Ok((text(r, "name")?, text(r, "comment")?)))
            .collect()
    }

    /// Columns of `table` in ordinal order.
    pub async fn columns(&self, table: &str) -> Result<Vec<LiveColumn>> {
        let rows = sqlx::query(
            "SELECT CAST(COLUMN_NAME AS CHAR) AS name, CAST(COLUMN_TYPE AS CHAR) AS column_type, \
                    CAST(IS_NULLABLE AS CHAR) AS nullable, CAST(COLUMN_DEFAULT AS CHAR) AS col_default, \
                    CAST(COLUMN_KEY AS CHAR) AS col_key, CAST(EXTRA AS CHAR) AS extra, \
                    CAST(COLUMN_COMMENT AS CHAR) AS comment \
             FROM information_schema.COLUMNS \
             WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? \
             ORDER BY ORDINAL_POSITION",
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await?;

        let mut columns = Vec::with_capacity(rows.len());
        for r in rows {
            columns.push(LiveColumn {
                name: text(&r, "name")?,
                column_type: text(&r, "column_type")?,
                nullable: text(&r, "nullable")? == "YES",
                default: r.try_get::<Option<String>, _>("col_default")?,
                key: text(&r, "col_key")?,
                extra: text(&r, "extra")?,
                comment: text(&r, "comment")?,
            });
        }
        Ok(columns)
    }

    /// Foreign-key constraints declared on `table`.
    pub async fn foreign_keys(&self, table: &str) -> Result<Vec<LiveForeignKey>> {
        let rows = sqlx::query(
            "SELECT CAST(KCU.CONSTRAINT_NAME AS CHAR) AS constraint_name, \
                    CAST(KCU.TABLE_NAME AS CHAR) AS table_name, \
                    CAST(KCU.COLUMN_NAME AS CHAR) AS column_name, \
                    CAST(KCU.REFERENCED_TABLE_NAME AS CHAR) AS referenced_table, \
                    CAST(KCU.REFERENCED_COLUMN_NAME AS CHAR) AS referenced_column, \
                    CAST(RC.UPDATE_RULE AS CHAR) AS update_rule, \
                    CAST(RC.DELETE_RULE AS CHAR) AS delete_rule \
             FROM information_schema.KEY_COLUMN_USAGE KCU \
             JOIN information_schema.REFERENTIAL_CONSTRAINTS RC \
               ON RC.CONSTRAINT_SCHEMA = KCU.CONSTRAINT_SCHEMA \
              AND RC.CONSTRAINT_NAME = KCU.CONSTRAINT_NAME \
             WHERE KCU.TABLE_SCHEMA = DATABASE() AND KCU.TABLE_NAME = ? \
               AND KCU.REFERENCED_TABLE_NAME IS NOT NULL \
             ORDER BY KCU.CONSTRAINT_NAME, KCU.ORDINAL_POSITION",
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|r| {
                Ok(LiveForeignKey {
                    constraint_name: text(r, "constraint_name")?,
                    table: text(r, "table_name")?,
                    column: text(r, "column_name")?,
                    referenced_table: text(r, "referenced_table")?,
                    referenced_column: text(r, "referenced_column")?,
                    update_rule: text(r, "update_rule")?,
                    delete_rule: text(r, "delete_rule")?,
                })
            })
            .collect()
    }

    /// Read every table, its columns and foreign keys.
    pub async fn snapshot(&self) -> Result<LiveSchema> {
        let mut tables = Vec::new();
        for (name, comment) in self.tables().await? {
            let columns = self.columns(&name).await?;
            let foreign_keys = self.foreign_keys(&name).await?;
            debug!(table = %name, columns = columns.len(), "introspected table");
            tables.push(LiveTable {
                name,
                comment,
                columns,
                foreign_keys,
            });
        }
        Ok(LiveSchema::new(tables))
    }

    /// Describe a live table as a schema entity, or `None` if it does not
    /// exist.
    pub async fn dump_table(&self, table: &str) -> Result<Option<EntitySpec>> {
        let Some((_, comment)) = self.tables().await?.into_iter().find(|(n, _)| n == table) else {
            return Ok(None);
        };
        let live = LiveTable {
            name: table.to_string(),
            comment,
            columns: self.columns(table).await?,
            foreign_keys: self.foreign_keys(table).await?,
        };
        Ok(Some(entity_from_live(&live)))
    }
}

/// Translate a live table into the schema vocabulary. Foreign keys name the
/// referenced table as the target model.
pub fn entity_from_live(table: &LiveTable) -> EntitySpec {
    let mut entity = EntitySpec::default();
    if !table.comment.is_empty() {
        entity.params = Some(EntityParams {
            alias: None,
            reference: Some(table.comment.clone()),
        });
    }

    for column in &table.columns {
        let parsed = types::abstract_type(&column.column_type);
        // MySQL 8 no longer reports integer display widths, so `length`
        // may come back empty for integers
        let mut spec = ColumnSpec {
            reference: Some(column.comment.clone()).filter(|c| !c.is_empty()),
            kind: Some(parsed.kind.clone()),
            length: parsed.length,
            decimal: parsed.decimal,
            default: column.default.clone().map(DefaultValue::Text),
            nullable: Some(column.nullable),
            auto: column.extra.contains("auto_increment"),
            identifier: column.key == "PRI",
            zerofill: parsed.zerofill,
            index: column.key == "MUL",
            index_of: None,
        };
        if let Some(fk) = table.foreign_keys.iter().find(|fk| fk.column == column.name) {
            spec.index = false;
            spec.index_of = Some(ForeignKeySpec {
                bundle: None,
                model: fk.referenced_table.clone(),
                property: Some(fk.referenced_column.clone()),
                update: Some(ReferentialAction::from_rule(&fk.update_rule)),
                delete: Some(ReferentialAction::from_rule(&fk.delete_rule)),
            });
        }
        entity.columns.insert(column.name.clone(), spec);
    }
    entity
}
