//! The desired-schema object model.
//!
//! Applications declare tables with [`TableBuilder`]; the resulting
//! [`Table`] is immutable and validated, and is what the delta detector
//! compares against the live database.
//!
//! ```rust
//! use oxide_schema::model::{Column, IndexDefinition, Table};
//!
//! let people = Table::builder("public.people")
//!     .column(Column::new("id", "int").primary_key())
//!     .column(Column::new("user_name", "varchar").not_null())
//!     .column(Column::new("data", "jsonb"))
//!     .index(IndexDefinition::on_columns(["user_name"]).unique())
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(people.indexes()[0].name(), "idx_people_user_name");
//! ```

mod column;
mod foreign_key;
mod index;
mod table;

pub use column::Column;
pub use foreign_key::{ForeignKeyAction, ForeignKeyDefinition};
pub use index::{IndexColumn, IndexDefinition, IndexMethod, IndexTarget, NullsOrder, SortOrder};
pub use table::{DEFAULT_SCHEMA, PrimaryKey, Table, TableBuilder, TableName};
