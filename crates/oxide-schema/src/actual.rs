//! The live schema of a table, as reported by a [`SchemaReader`].
//!
//! [`SchemaReader`]: crate::introspect::SchemaReader

use serde::{Deserialize, Serialize};

use crate::canonical::serial_base;
use crate::ident::{same_identifier, truncate_identifier};
use crate::model::{ForeignKeyAction, Table, TableName};

/// A column as it exists in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActualColumn {
    /// Column name.
    pub name: String,
    /// Formatted type, e.g. `character varying(100)`.
    pub data_type: String,
    /// Whether the column accepts NULL.
    pub nullable: bool,
    /// Default expression as stored by the database.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

/// The primary key constraint as it exists in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActualPrimaryKey {
    /// Constraint name.
    pub name: String,
    /// Key columns in key order.
    pub columns: Vec<String>,
}

/// An index as it exists in the database. Only the catalog's rendering of
/// its definition is kept; comparison goes through the canonicalizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActualIndex {
    /// Index name.
    pub name: String,
    /// Full `CREATE INDEX` statement.
    pub definition: String,
}

/// A foreign key constraint as it exists in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActualForeignKey {
    /// Constraint name.
    pub name: String,
    /// Local columns.
    pub columns: Vec<String>,
    /// Referenced table.
    pub references: TableName,
    /// Referenced columns, paired positionally with `columns`.
    pub referenced_columns: Vec<String>,
    /// ON DELETE action.
    pub on_delete: ForeignKeyAction,
    /// ON UPDATE action.
    pub on_update: ForeignKeyAction,
}

/// Everything the database reports about one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActualTable {
    /// Qualified table name.
    pub name: TableName,
    /// Columns in ordinal order.
    pub columns: Vec<ActualColumn>,
    /// The primary key, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<ActualPrimaryKey>,
    /// Indexes other than the one backing the primary key.
    #[serde(default)]
    pub indexes: Vec<ActualIndex>,
    /// Foreign keys declared on this table.
    #[serde(default)]
    pub foreign_keys: Vec<ActualForeignKey>,
}

impl ActualTable {
    /// What the database reports right after `table` was created from its
    /// own create patch.
    #[must_use]
    pub fn from_desired(table: &Table) -> Self {
        let name = table.name().clone();
        let columns = table
            .columns()
            .iter()
            .map(|col| match serial_base(&col.db_type) {
                Some(base) => ActualColumn {
                    name: col.name.clone(),
                    data_type: base.to_string(),
                    nullable: col.nullable,
                    default: Some(format!(
                        "nextval('{}'::regclass)",
                        sequence_name(&name, &col.name)
                    )),
                },
                None => ActualColumn {
                    name: col.name.clone(),
                    data_type: col.db_type.clone(),
                    nullable: col.nullable,
                    default: col.default.clone(),
                },
            })
            .collect();
        let primary_key = table.primary_key().map(|pk| ActualPrimaryKey {
            name: pk.name.clone(),
            columns: pk.columns.clone(),
        });
        let indexes = table
            .indexes()
            .iter()
            .map(|idx| {
                let mut built = idx.clone();
                built.concurrently = false;
                ActualIndex {
                    name: idx.name().to_string(),
                    definition: built.to_ddl(&name),
                }
            })
            .collect();
        let foreign_keys = table
            .foreign_keys()
            .iter()
            .map(|fk| ActualForeignKey {
                name: fk.name().to_string(),
                columns: fk.columns.clone(),
                references: fk.references.clone(),
                referenced_columns: fk.referenced_columns.clone(),
                on_delete: fk.on_delete,
                on_update: fk.on_update,
            })
            .collect();

        Self {
            name,
            columns,
            primary_key,
            indexes,
            foreign_keys,
        }
    }

    /// Looks up a column by name (case-insensitive).
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&ActualColumn> {
        self.columns.iter().find(|c| same_identifier(&c.name, name))
    }

    /// Looks up an index by name (case-insensitive).
    #[must_use]
    pub fn index(&self, name: &str) -> Option<&ActualIndex> {
        self.indexes.iter().find(|i| same_identifier(&i.name, name))
    }

    /// Looks up a foreign key by name (case-insensitive).
    #[must_use]
    pub fn foreign_key(&self, name: &str) -> Option<&ActualForeignKey> {
        self.foreign_keys
            .iter()
            .find(|fk| same_identifier(&fk.name, name))
    }
}

/// The implicit sequence behind a serial column.
fn sequence_name(table: &TableName, column: &str) -> String {
    truncate_identifier(&format!("{}_{}_seq", table.name, column))
}
