//! # oxide-schema
//!
//! Schema delta detection and DDL patch generation.
//!
//! Applications declare the tables they expect ([`model::Table`]), a driver
//! reads what the database actually has ([`actual::ActualTable`]), and this
//! crate works out the difference and the DDL that closes it:
//!
//! - [`delta::find_delta`] correlates columns, indexes and foreign keys by
//!   name and yields a [`delta::TableDelta`] with one
//!   [`delta::SchemaPatchDifference`] verdict (`None < Update < Create <
//!   Invalid`)
//! - [`patch::build_patch`] turns a delta into ordered statements
//! - [`canonical::Canonicalizer`] makes equivalent spellings compare equal
//! - [`types::TypeMapping`] maps native types to database type names
//!
//! Everything here is pure. Reading the live schema and executing DDL sit
//! behind the traits in [`introspect`], implemented by driver crates.
//!
//! ```rust
//! use oxide_schema::prelude::*;
//!
//! let people = Table::builder("people")
//!     .column(Column::new("id", "int").primary_key())
//!     .column(Column::new("user_name", "varchar(50)"))
//!     .build()
//!     .unwrap();
//!
//! // Table absent: create it.
//! let delta = find_delta(&people, None);
//! assert_eq!(delta.difference, SchemaPatchDifference::Create);
//!
//! // Table as created: nothing to do.
//! let live = ActualTable::from_desired(&people);
//! assert!(!find_delta(&people, Some(&live)).has_changes());
//!
//! // A new column is an additive update.
//! let wanted = people
//!     .modify()
//!     .column(Column::new("birth_day", "date"))
//!     .build()
//!     .unwrap();
//! let delta = find_delta(&wanted, Some(&live));
//! assert_eq!(delta.difference, SchemaPatchDifference::Update);
//! assert_eq!(
//!     build_patch(&delta).sql(),
//!     vec!["ALTER TABLE public.people ADD COLUMN birth_day date"]
//! );
//! ```

pub mod actual;
pub mod canonical;
pub mod delta;
pub mod error;
pub mod ident;
pub mod introspect;
pub mod model;
pub mod patch;
pub mod policy;
pub mod types;

pub use error::{Result, SchemaError};

/// Commonly used types.
pub mod prelude {
    pub use crate::actual::{
        ActualColumn, ActualForeignKey, ActualIndex, ActualPrimaryKey, ActualTable,
    };
    pub use crate::canonical::{Canonicalizer, TypeSynonyms};
    pub use crate::delta::{
        find_delta, DeltaDetector, InvalidChange, SchemaCategory, SchemaPatchDifference,
        TableDelta,
    };
    pub use crate::error::{Result, SchemaError};
    pub use crate::introspect::{DdlExecutor, SchemaReader};
    pub use crate::model::{
        Column, ForeignKeyAction, ForeignKeyDefinition, IndexColumn, IndexDefinition,
        IndexMethod, NullsOrder, SortOrder, Table, TableBuilder, TableName,
    };
    pub use crate::patch::{
        build_create, build_patch, build_rebuild, DdlDialect, PatchStatement, PostgresDdl,
        SchemaPatch,
    };
    pub use crate::policy::AutoCreate;
    pub use crate::types::{Memoized, NativeType, PostgresTypes, TypeMapping, TypeProvider};
}
