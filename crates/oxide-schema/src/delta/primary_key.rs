//! Primary key comparison.

use serde::Serialize;

use crate::actual::ActualPrimaryKey;
use crate::ident::same_identifier;
use crate::model::PrimaryKey;

use super::SchemaPatchDifference;

/// What has to happen to the primary key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimaryKeyChange {
    /// Same columns, same name (or no key on either side).
    #[default]
    None,
    /// The table has no key yet.
    Add,
    /// The key is no longer wanted.
    Drop,
    /// The key columns differ.
    Redefine,
    /// Only the constraint name differs.
    Rename,
}

/// Comparison of the desired and live primary keys.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct PrimaryKeyDelta {
    /// Desired key.
    pub expected: Option<PrimaryKey>,
    /// Live key.
    pub actual: Option<ActualPrimaryKey>,
    /// Required change.
    pub change: PrimaryKeyChange,
    /// Severity of the change.
    pub difference: SchemaPatchDifference,
}

impl PrimaryKeyDelta {
    /// Compares two keys. Column order is significant.
    pub(crate) fn compare(
        expected: Option<&PrimaryKey>,
        actual: Option<&ActualPrimaryKey>,
    ) -> Self {
        let change = match (expected, actual) {
            (None, None) => PrimaryKeyChange::None,
            (Some(_), None) => PrimaryKeyChange::Add,
            (None, Some(_)) => PrimaryKeyChange::Drop,
            (Some(e), Some(a)) => {
                let same_columns = e.columns.len() == a.columns.len()
                    && e.columns
                        .iter()
                        .zip(&a.columns)
                        .all(|(x, y)| same_identifier(x, y));
                if !same_columns {
                    PrimaryKeyChange::Redefine
                } else if same_identifier(&e.name, &a.name) {
                    PrimaryKeyChange::None
                } else {
                    PrimaryKeyChange::Rename
                }
            }
        };
        let difference = if change == PrimaryKeyChange::None {
            SchemaPatchDifference::None
        } else {
            SchemaPatchDifference::Update
        };
        Self {
            expected: expected.cloned(),
            actual: actual.cloned(),
            change,
            difference,
        }
    }

    /// Marks the change as impossible to apply incrementally.
    pub(crate) fn invalidate(&mut self) {
        self.difference = SchemaPatchDifference::Invalid;
    }

    /// Key columns of the desired key, empty if none.
    #[must_use]
    pub fn expected_columns(&self) -> &[String] {
        self.expected.as_ref().map_or(&[], |pk| pk.columns.as_slice())
    }
}
