//! Boundaries to the live database.
//!
//! Driver crates implement [`SchemaReader`] and [`DdlExecutor`]; the core
//! only defines the traits so it stays driver-agnostic and free of I/O.

use std::future::Future;

use crate::actual::ActualTable;
use crate::model::TableName;
use crate::patch::PatchStatement;

/// Reads the live schema of one table.
pub trait SchemaReader {
    /// Error type for read failures.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Returns the full actual schema of `table` (columns, primary key,
    /// introspectable indexes, foreign keys) in one logical read, or `None`
    /// if the table does not exist.
    fn fetch_existing(
        &self,
        table: &TableName,
    ) -> impl Future<Output = Result<Option<ActualTable>, Self::Error>> + Send;
}

/// Executes generated DDL.
pub trait DdlExecutor {
    /// Error type for execution failures; should carry the failing statement.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Executes `statements` in order. When `transactional` is set, every
    /// statement marked transactional runs inside one transaction; the
    /// others run after it commits.
    fn execute(
        &self,
        statements: &[PatchStatement],
        transactional: bool,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;
}
