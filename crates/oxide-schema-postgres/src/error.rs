//! Error types for the PostgreSQL driver.

use std::path::PathBuf;

use oxide_schema::delta::SchemaPatchDifference;
use oxide_schema::SchemaError;

/// Errors that can occur while reading, patching or verifying a schema.
#[derive(Debug, thiserror::Error)]
pub enum MigrateError {
    /// The desired schema is malformed, unmapped or cannot be reconciled.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Database error outside of statement execution.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A generated statement failed.
    #[error("Failed to execute `{statement}`: {source}")]
    Execution {
        /// The offending statement.
        statement: String,
        /// The driver error.
        source: sqlx::Error,
    },

    /// The catalog returned something the reader does not understand.
    #[error("Unexpected catalog contents for '{table}': {message}")]
    Catalog {
        /// Qualified table name.
        table: String,
        /// What was unexpected.
        message: String,
    },

    /// The auto-create policy does not allow the required change.
    #[error("Table '{table}' requires a change of kind '{difference}', which the auto-create policy does not allow")]
    Unapplied {
        /// Qualified table name.
        table: String,
        /// The verdict that was refused.
        difference: SchemaPatchDifference,
    },

    /// Tables still differ from their declaration.
    #[error("Schema mismatch in: {}", .tables.join(", "))]
    Mismatch {
        /// Qualified names of the differing tables.
        tables: Vec<String>,
    },

    /// IO error (reading schema or option files).
    #[error("IO error reading '{path}': {source}")]
    Io {
        /// The file being read.
        path: PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for driver operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
