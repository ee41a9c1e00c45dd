//! The delta detector.

use std::sync::LazyLock;

use tracing::{debug, warn};

use crate::actual::{ActualForeignKey, ActualTable};
use crate::canonical::Canonicalizer;
use crate::ident::same_identifier;
use crate::model::{ForeignKeyDefinition, Table};
use crate::types::{Memoized, PostgresTypes, TypeMapping};

use super::column::{compare_column, ColumnAlteration, ColumnDifference};
use super::primary_key::{PrimaryKeyChange, PrimaryKeyDelta};
use super::{
    ColumnDelta, Correlated, ForeignKeyDelta, IndexDelta, InvalidChange, ItemDelta,
    SchemaCategory, SchemaPatchDifference, TableDelta,
};

static DEFAULT_DETECTOR: LazyLock<DeltaDetector> = LazyLock::new(DeltaDetector::default);

/// Computes the delta between `desired` and the live table with the
/// process-wide PostgreSQL detector.
#[must_use]
pub fn find_delta(desired: &Table, actual: Option<&ActualTable>) -> TableDelta {
    DEFAULT_DETECTOR.find_delta(desired, actual)
}

/// Compares desired tables with live ones.
///
/// The detector holds no mutable state besides the type mapping's memo, so
/// one instance can serve any number of concurrent comparisons.
#[derive(Debug)]
pub struct DeltaDetector<M = Memoized<PostgresTypes>> {
    canonicalizer: Canonicalizer,
    types: M,
}

impl Default for DeltaDetector {
    fn default() -> Self {
        Self::new(Canonicalizer::postgres(), Memoized::new(PostgresTypes::new()))
    }
}

impl<M: TypeMapping> DeltaDetector<M> {
    /// Creates a detector.
    #[must_use]
    pub const fn new(canonicalizer: Canonicalizer, types: M) -> Self {
        Self {
            canonicalizer,
            types,
        }
    }

    /// The canonicalizer used for equivalence checks.
    #[must_use]
    pub const fn canonicalizer(&self) -> &Canonicalizer {
        &self.canonicalizer
    }

    /// The type mapping used to judge type changes.
    #[must_use]
    pub const fn types(&self) -> &M {
        &self.types
    }

    /// Compares `desired` with the live table, `None` meaning the table
    /// does not exist.
    #[must_use]
    pub fn find_delta(&self, desired: &Table, actual: Option<&ActualTable>) -> TableDelta {
        let Some(actual) = actual else {
            debug!(table = %desired.name(), "Table does not exist");
            return Self::absent(desired);
        };

        let columns = self.compare_columns(desired, actual);
        let mut primary_key =
            PrimaryKeyDelta::compare(desired.primary_key(), actual.primary_key.as_ref());
        let indexes = self.compare_indexes(desired, actual);
        let foreign_keys = compare_foreign_keys(desired, actual);

        let mut invalid = Vec::new();
        for diff in &columns.different {
            if let Some(ColumnAlteration::Type {
                expected,
                actual,
                lossless: false,
            }) = diff.type_change()
            {
                invalid.push(InvalidChange {
                    category: SchemaCategory::Column,
                    object: diff.expected.name.clone(),
                    expected: expected.clone(),
                    actual: actual.clone(),
                    reason: "type change may lose or reinterpret data".to_string(),
                });
            }
        }
        if primary_key.change != PrimaryKeyChange::None {
            let lossy_key_column = columns.different.iter().any(|d| {
                d.is_lossy()
                    && primary_key
                        .expected_columns()
                        .iter()
                        .any(|k| same_identifier(k, &d.expected.name))
            });
            if lossy_key_column {
                primary_key.invalidate();
                invalid.push(InvalidChange {
                    category: SchemaCategory::PrimaryKey,
                    object: primary_key
                        .expected
                        .as_ref()
                        .map(|pk| pk.name.clone())
                        .unwrap_or_default(),
                    expected: format!("({})", primary_key.expected_columns().join(", ")),
                    actual: format!(
                        "({})",
                        primary_key
                            .actual
                            .as_ref()
                            .map(|pk| pk.columns.join(", "))
                            .unwrap_or_default()
                    ),
                    reason: "key column type cannot change in place".to_string(),
                });
            }
        }

        let mut difference = [
            columns.difference(),
            primary_key.difference,
            indexes.difference(),
            foreign_keys.difference(),
        ]
        .into_iter()
        .max()
        .unwrap_or_default();
        if !invalid.is_empty() {
            difference = SchemaPatchDifference::Invalid;
            for change in &invalid {
                warn!(table = %desired.name(), change = %change, "Irreconcilable change");
            }
        }

        debug!(
            table = %desired.name(),
            difference = %difference,
            missing_columns = columns.missing.len(),
            extra_columns = columns.extras.len(),
            different_columns = columns.different.len(),
            primary_key = ?primary_key.change,
            missing_indexes = indexes.missing.len(),
            extra_indexes = indexes.extras.len(),
            different_indexes = indexes.different.len(),
            missing_foreign_keys = foreign_keys.missing.len(),
            extra_foreign_keys = foreign_keys.extras.len(),
            different_foreign_keys = foreign_keys.different.len(),
            "Computed table delta"
        );

        TableDelta {
            table: desired.name().clone(),
            difference,
            desired: desired.clone(),
            actual: Some(actual.clone()),
            columns,
            primary_key,
            indexes,
            foreign_keys,
            invalid,
        }
    }

    fn absent(desired: &Table) -> TableDelta {
        TableDelta {
            table: desired.name().clone(),
            difference: SchemaPatchDifference::Create,
            desired: desired.clone(),
            actual: None,
            columns: ItemDelta {
                missing: desired.columns().to_vec(),
                ..ItemDelta::default()
            },
            primary_key: PrimaryKeyDelta::compare(desired.primary_key(), None),
            indexes: ItemDelta {
                missing: desired.indexes().to_vec(),
                ..ItemDelta::default()
            },
            foreign_keys: ItemDelta {
                missing: desired.foreign_keys().to_vec(),
                ..ItemDelta::default()
            },
            invalid: Vec::new(),
        }
    }

    fn compare_columns(&self, desired: &Table, actual: &ActualTable) -> ColumnDelta {
        reconcile(
            desired.columns(),
            &actual.columns,
            |c| c.name.as_str(),
            |c| c.name.as_str(),
            |expected, live| {
                let alterations =
                    compare_column(expected, live, &self.canonicalizer, &self.types);
                (!alterations.is_empty()).then(|| ColumnDifference {
                    expected: expected.clone(),
                    actual: live.clone(),
                    alterations,
                })
            },
        )
    }

    fn compare_indexes(&self, desired: &Table, actual: &ActualTable) -> IndexDelta {
        let table = desired.name();
        reconcile(
            desired.indexes(),
            &actual.indexes,
            |i| i.name(),
            |i| i.name.as_str(),
            |expected, live| {
                let want = self.canonicalizer.canonicalize_index(expected, table);
                let have = self
                    .canonicalizer
                    .canonical_index_ddl(&live.definition, table);
                (want != have).then(|| Correlated {
                    expected: expected.clone(),
                    actual: live.clone(),
                })
            },
        )
    }
}

fn compare_foreign_keys(desired: &Table, actual: &ActualTable) -> ForeignKeyDelta {
    reconcile(
        desired.foreign_keys(),
        &actual.foreign_keys,
        |fk| fk.name(),
        |fk| fk.name.as_str(),
        |expected, live| {
            (!same_foreign_key(expected, live)).then(|| Correlated {
                expected: expected.clone(),
                actual: live.clone(),
            })
        },
    )
}

fn same_foreign_key(expected: &ForeignKeyDefinition, actual: &ActualForeignKey) -> bool {
    let same_list = |a: &[String], b: &[String]| {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| same_identifier(x, y))
    };
    expected.references == actual.references
        && same_list(&expected.columns, &actual.columns)
        && same_list(&expected.referenced_columns, &actual.referenced_columns)
        && expected.on_delete == actual.on_delete
        && expected.on_update == actual.on_update
}

/// Correlates two lists by case-insensitive name. `differ` returns the
/// difference record for a correlated pair, or `None` if they match.
fn reconcile<E, A, D>(
    desired: &[E],
    actual: &[A],
    desired_name: impl Fn(&E) -> &str,
    actual_name: impl Fn(&A) -> &str,
    mut differ: impl FnMut(&E, &A) -> Option<D>,
) -> ItemDelta<E, A, D>
where
    E: Clone,
    A: Clone,
{
    let mut delta = ItemDelta::default();
    let mut correlated = vec![false; actual.len()];

    for item in desired {
        let name = desired_name(item);
        match actual.iter().position(|a| same_identifier(actual_name(a), name)) {
            None => delta.missing.push(item.clone()),
            Some(pos) => {
                correlated[pos] = true;
                let live = &actual[pos];
                match differ(item, live) {
                    Some(diff) => delta.different.push(diff),
                    None => delta.matched.push(Correlated {
                        expected: item.clone(),
                        actual: live.clone(),
                    }),
                }
            }
        }
    }

    let mut extras: Vec<A> = actual
        .iter()
        .zip(&correlated)
        .filter(|(_, seen)| !**seen)
        .map(|(a, _)| a.clone())
        .collect();
    extras.sort_by_key(|a| actual_name(a).to_ascii_lowercase());
    delta.extras = extras;
    delta
}
