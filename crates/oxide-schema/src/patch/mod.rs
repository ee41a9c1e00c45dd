//! DDL patch generation.
//!
//! A [`SchemaPatch`] is the ordered statement list that turns the live table
//! into the desired one. Generation is pure; executing the statements is a
//! [`DdlExecutor`](crate::introspect::DdlExecutor)'s job.
//!
//! Statement order for an existing table:
//!
//! 1. drop extra or changed foreign keys, indexes and the old primary key
//! 2. add missing columns, alter changed ones, drop extra ones
//! 3. add or rename the primary key
//! 4. create missing or changed indexes
//! 5. add missing or changed foreign keys

mod dialect;
mod postgres;

use std::fmt;

use serde::Serialize;

use crate::delta::{InvalidChange, SchemaPatchDifference, TableDelta};
use crate::error::{Result, SchemaError};
use crate::model::{Table, TableName};

pub use dialect::DdlDialect;
pub use postgres::PostgresDdl;

/// One DDL statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatchStatement {
    /// The SQL text.
    pub sql: String,
    /// `false` for statements that cannot run inside a transaction block,
    /// such as `CREATE INDEX CONCURRENTLY`.
    pub transactional: bool,
}

impl PatchStatement {
    /// A statement that may run inside a transaction.
    #[must_use]
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            transactional: true,
        }
    }

    /// A statement that must run outside any transaction.
    #[must_use]
    pub fn outside_transaction(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            transactional: false,
        }
    }
}

impl fmt::Display for PatchStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{};", self.sql)
    }
}

/// The ordered DDL for one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaPatch {
    /// Target table.
    pub table: TableName,
    /// Verdict of the delta the patch was built from.
    pub difference: SchemaPatchDifference,
    /// Statements in execution order.
    pub statements: Vec<PatchStatement>,
    /// Changes the statements deliberately leave out.
    pub irreconcilable: Vec<InvalidChange>,
}

impl SchemaPatch {
    /// A patch with nothing to do.
    #[must_use]
    pub fn empty(table: TableName) -> Self {
        Self {
            table,
            difference: SchemaPatchDifference::None,
            statements: Vec::new(),
            irreconcilable: Vec::new(),
        }
    }

    /// Returns `true` if there are no statements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Returns `true` if executing the statements fully reconciles the
    /// table.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.irreconcilable.is_empty()
    }

    /// Fails with [`SchemaError::Irreconcilable`] if the patch leaves changes
    /// out.
    pub fn ensure_reconcilable(&self) -> Result<()> {
        if self.is_complete() {
            Ok(())
        } else {
            Err(SchemaError::Irreconcilable {
                table: self.table.to_string(),
                changes: self.irreconcilable.clone(),
            })
        }
    }

    /// SQL text of every statement.
    #[must_use]
    pub fn sql(&self) -> Vec<&str> {
        self.statements.iter().map(|s| s.sql.as_str()).collect()
    }
}

impl fmt::Display for SchemaPatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for statement in &self.statements {
            writeln!(f, "{statement}")?;
        }
        Ok(())
    }
}

/// Builds the PostgreSQL patch for a delta.
#[must_use]
pub fn build_patch(delta: &TableDelta) -> SchemaPatch {
    PostgresDdl::new().build_patch(delta)
}

/// Builds the PostgreSQL statements that create `table` from nothing.
#[must_use]
pub fn build_create(table: &Table) -> SchemaPatch {
    PostgresDdl::new().build_create(table)
}

/// Builds the PostgreSQL statements that drop and recreate `table`.
#[must_use]
pub fn build_rebuild(table: &Table) -> SchemaPatch {
    PostgresDdl::new().build_rebuild(table)
}
