//! DDL executor.
//!
//! Runs generated patch statements against a PostgreSQL pool.

use oxide_schema::introspect::DdlExecutor;
use oxide_schema::patch::PatchStatement;
use sqlx::postgres::{PgConnection, PgPool};
use tracing::{debug, info};

use crate::error::{MigrateError, Result};

/// Executes patch statements.
#[derive(Debug, Clone)]
pub struct PgDdlExecutor {
    pool: PgPool,
}

impl PgDdlExecutor {
    /// Creates an executor over `pool`.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Executes `statements` in order.
    ///
    /// With `transactional` set, statements that may run in a transaction
    /// are applied atomically and the rest (concurrent index builds) run
    /// after the commit. Otherwise every statement runs on its own.
    pub async fn run(&self, statements: &[PatchStatement], transactional: bool) -> Result<()> {
        if statements.is_empty() {
            return Ok(());
        }

        let (atomic, standalone): (Vec<&PatchStatement>, Vec<&PatchStatement>) = if transactional {
            statements.iter().partition(|s| s.transactional)
        } else {
            (Vec::new(), statements.iter().collect())
        };

        if !atomic.is_empty() {
            let mut tx = self.pool.begin().await?;
            for statement in &atomic {
                execute_one(&mut tx, statement).await?;
            }
            tx.commit().await?;
            info!(statements = atomic.len(), "Committed schema patch");
        }

        if !standalone.is_empty() {
            let mut conn = self.pool.acquire().await?;
            for statement in &standalone {
                execute_one(&mut conn, statement).await?;
            }
        }

        Ok(())
    }
}

async fn execute_one(conn: &mut PgConnection, statement: &PatchStatement) -> Result<()> {
    debug!(sql = %statement.sql, "Executing SQL");
    sqlx::query(&statement.sql)
        .execute(conn)
        .await
        .map_err(|source| MigrateError::Execution {
            statement: statement.sql.clone(),
            source,
        })?;
    Ok(())
}

impl DdlExecutor for PgDdlExecutor {
    type Error = MigrateError;

    async fn execute(&self, statements: &[PatchStatement], transactional: bool) -> Result<()> {
        self.run(statements, transactional).await
    }
}
