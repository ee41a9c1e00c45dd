//! Structured differences between a desired table and its live schema.
//!
//! [`DeltaDetector::find_delta`] correlates columns, indexes and foreign
//! keys by name and records, per category, what matched, what is missing
//! from the database, what the database has extra and what differs. The
//! result carries one overall [`SchemaPatchDifference`] verdict.

mod column;
mod detector;
mod primary_key;

use std::fmt;

use serde::Serialize;

use crate::actual::{ActualColumn, ActualForeignKey, ActualIndex, ActualTable};
use crate::model::{Column, ForeignKeyDefinition, IndexDefinition, Table, TableName};

pub use column::{ColumnAlteration, ColumnDifference};
pub(crate) use column::storage_type;
pub use detector::{find_delta, DeltaDetector};
pub use primary_key::{PrimaryKeyChange, PrimaryKeyDelta};

// ================================================================
// Severity
// ================================================================

/// How much work reconciling a table takes, in increasing order of impact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaPatchDifference {
    /// Nothing to do.
    #[default]
    None,
    /// Reconcilable with additive or altering DDL.
    Update,
    /// The table does not exist.
    Create,
    /// Cannot be reconciled incrementally; needs a rebuild or an operator.
    Invalid,
}

impl fmt::Display for SchemaPatchDifference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::Update => "update",
            Self::Create => "create",
            Self::Invalid => "invalid",
        })
    }
}

/// The kind of schema object a change applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaCategory {
    /// A column.
    Column,
    /// The primary key.
    PrimaryKey,
    /// An index.
    Index,
    /// A foreign key.
    ForeignKey,
}

impl fmt::Display for SchemaCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Column => "column",
            Self::PrimaryKey => "primary key",
            Self::Index => "index",
            Self::ForeignKey => "foreign key",
        })
    }
}

// ================================================================
// Per-category records
// ================================================================

/// A desired item and the live item correlated with it by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Correlated<E, A> {
    /// The desired form.
    pub expected: E,
    /// The live form.
    pub actual: A,
}

/// Reconciliation of one category of named items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemDelta<E, A, D = Correlated<E, A>> {
    /// Correlated pairs whose bodies are equivalent.
    pub matched: Vec<Correlated<E, A>>,
    /// Desired items the database lacks, in declaration order.
    pub missing: Vec<E>,
    /// Live items nothing desired correlates with, ordered by name.
    pub extras: Vec<A>,
    /// Correlated pairs whose bodies differ.
    pub different: Vec<D>,
}

impl<E, A, D> Default for ItemDelta<E, A, D> {
    fn default() -> Self {
        Self {
            matched: Vec::new(),
            missing: Vec::new(),
            extras: Vec::new(),
            different: Vec::new(),
        }
    }
}

impl<E, A, D> ItemDelta<E, A, D> {
    /// Returns `true` if anything is missing, extra or different.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        !(self.missing.is_empty() && self.extras.is_empty() && self.different.is_empty())
    }

    /// `Update` if there are changes, else `None`.
    #[must_use]
    pub fn difference(&self) -> SchemaPatchDifference {
        if self.has_changes() {
            SchemaPatchDifference::Update
        } else {
            SchemaPatchDifference::None
        }
    }
}

/// Column reconciliation.
pub type ColumnDelta = ItemDelta<Column, ActualColumn, ColumnDifference>;
/// Index reconciliation.
pub type IndexDelta = ItemDelta<IndexDefinition, ActualIndex>;
/// Foreign key reconciliation.
pub type ForeignKeyDelta = ItemDelta<ForeignKeyDefinition, ActualForeignKey>;

/// A change that incremental DDL cannot express.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvalidChange {
    /// Category of the object.
    pub category: SchemaCategory,
    /// Name of the object.
    pub object: String,
    /// Desired form.
    pub expected: String,
    /// Live form.
    pub actual: String,
    /// Why it cannot be patched.
    pub reason: String,
}

impl fmt::Display for InvalidChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}: expected {}, actual {} ({})",
            self.category, self.object, self.expected, self.actual, self.reason
        )
    }
}

// ================================================================
// Table delta
// ================================================================

/// The full comparison result for one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableDelta {
    /// Qualified table name.
    pub table: TableName,
    /// Overall verdict: the maximum over every category.
    pub difference: SchemaPatchDifference,
    /// The desired table the delta was computed for.
    pub desired: Table,
    /// The live table, `None` when it does not exist.
    pub actual: Option<ActualTable>,
    /// Column reconciliation.
    pub columns: ColumnDelta,
    /// Primary key comparison.
    pub primary_key: PrimaryKeyDelta,
    /// Index reconciliation.
    pub indexes: IndexDelta,
    /// Foreign key reconciliation.
    pub foreign_keys: ForeignKeyDelta,
    /// Every change that forces the verdict to `Invalid`.
    pub invalid: Vec<InvalidChange>,
}

impl TableDelta {
    /// Returns `true` unless the verdict is `None`.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.difference != SchemaPatchDifference::None
    }

    /// Categories with at least one change, in patch order.
    #[must_use]
    pub fn changed_categories(&self) -> Vec<SchemaCategory> {
        let mut categories = Vec::new();
        if self.columns.has_changes() {
            categories.push(SchemaCategory::Column);
        }
        if self.primary_key.change != PrimaryKeyChange::None {
            categories.push(SchemaCategory::PrimaryKey);
        }
        if self.indexes.has_changes() {
            categories.push(SchemaCategory::Index);
        }
        if self.foreign_keys.has_changes() {
            categories.push(SchemaCategory::ForeignKey);
        }
        categories
    }
}
