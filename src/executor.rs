use sqlx::mysql::MySqlPool;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::plan::MigrationPlan;

/// Runs a [`MigrationPlan`] phase by phase. Each phase is sent inside one
/// transaction; MySQL commits DDL implicitly, so a failure stops the run
/// without undoing statements that already went through.
pub struct Executor {
    pool: MySqlPool,
}

impl Executor {
    pub fn new(pool: MySqlPool) -> Self {
        Executor { pool }
    }

    /// Returns the number of statements executed.
    pub async fn execute(&self, plan: &MigrationPlan) -> Result<usize> {
        let mut executed = 0;
        for (phase, statements) in plan.phases() {
            info!(phase = %phase, statements = statements.len(), "running phase");
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(|e| Error::execution(phase, e))?;
            for statement in statements {
                debug!(phase = %phase, "{}", statement);
                sqlx::query(statement)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| Error::execution(phase, e))?;
                executed += 1;
            }
            tx.commit().await.map_err(|e| Error::execution(phase, e))?;
        }
        Ok(executed)
    }
}
