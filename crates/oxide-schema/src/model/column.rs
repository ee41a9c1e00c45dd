//! Column declarations.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{NativeType, TypeMapping};

use super::index::IndexDefinition;

/// A desired column.
///
/// Columns are nullable unless marked otherwise; primary key columns are
/// always `NOT NULL`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Column name, unique within its table (case-insensitive).
    pub name: String,
    /// Declared database type name, e.g. `varchar(100)` or `jsonb`.
    #[serde(rename = "type")]
    pub db_type: String,
    /// Whether the column accepts NULL.
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    /// Default-value expression, written as SQL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    /// Whether the column is part of the primary key.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub primary_key: bool,
    /// An index declared on this column alone. Moved into the table's index
    /// set when the table is built.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<IndexDefinition>,
}

const fn default_nullable() -> bool {
    true
}

impl Column {
    /// Creates a nullable column with the given database type.
    #[must_use]
    pub fn new(name: impl Into<String>, db_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            db_type: db_type.into(),
            nullable: true,
            default: None,
            primary_key: false,
            index: None,
        }
    }

    /// Creates a column whose database type is resolved from a native type.
    pub fn for_native(
        name: impl Into<String>,
        native: &NativeType,
        types: &dyn TypeMapping,
    ) -> Result<Self> {
        let db_type = types.database_type(native)?;
        Ok(Self::new(name, db_type))
    }

    /// Marks the column `NOT NULL`.
    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Marks the column nullable.
    #[must_use]
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Sets the default-value expression.
    #[must_use]
    pub fn default_value(mut self, expression: impl Into<String>) -> Self {
        self.default = Some(expression.into());
        self
    }

    /// Adds the column to the primary key.
    #[must_use]
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    /// Declares a unique btree index on this column.
    #[must_use]
    pub fn unique(self) -> Self {
        self.indexed(IndexDefinition::new().unique())
    }

    /// Declares an index on this column. Any column target set on the index
    /// is replaced by this column.
    #[must_use]
    pub fn indexed(mut self, index: IndexDefinition) -> Self {
        self.index = Some(index);
        self
    }
}
