//! # oxide-schema-postgres
//!
//! PostgreSQL driver for [`oxide_schema`].
//!
//! - [`PgSchemaReader`] reads a table's live schema from the system catalogs
//! - [`PgDdlExecutor`] executes generated patches, transactionally where
//!   PostgreSQL allows it
//! - [`PgTypeProvider`] maps native types to type names and `sqlx`
//!   parameter types
//! - [`SchemaMigrator`] ties them together under an
//!   [`AutoCreate`](oxide_schema::policy::AutoCreate) policy
//!
//! ```rust,no_run
//! use oxide_schema::prelude::*;
//! use oxide_schema_postgres::{MigratorOptions, PgDdlExecutor, PgSchemaReader, SchemaMigrator};
//! use sqlx::postgres::PgPoolOptions;
//!
//! # async fn run() -> oxide_schema_postgres::Result<()> {
//! let pool = PgPoolOptions::new()
//!     .connect("postgres://localhost/app")
//!     .await?;
//! let migrator = SchemaMigrator::new(
//!     PgSchemaReader::new(pool.clone()),
//!     PgDdlExecutor::new(pool),
//!     MigratorOptions::with_auto_create(AutoCreate::CreateOrUpdate),
//! );
//!
//! let people = Table::builder("people")
//!     .column(Column::new("id", "serial").primary_key())
//!     .column(Column::new("user_name", "varchar(50)").unique())
//!     .build()?;
//! migrator.apply(&[people]).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod executor;
pub mod migrator;
pub mod reader;
pub mod types;

pub use config::{load_tables, MigratorOptions};
pub use error::{MigrateError, Result};
pub use executor::PgDdlExecutor;
pub use migrator::{MigrationPlan, SchemaMigrator};
pub use reader::PgSchemaReader;
pub use types::PgTypeProvider;
