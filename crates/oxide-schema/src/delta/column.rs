//! Column comparison.

use serde::Serialize;

use crate::actual::ActualColumn;
use crate::canonical::{serial_base, Canonicalizer, TypeSynonyms};
use crate::model::Column;
use crate::types::TypeMapping;

/// One attribute of a correlated column that differs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "attribute", rename_all = "snake_case")]
pub enum ColumnAlteration {
    /// The type differs.
    Type {
        /// Desired type.
        expected: String,
        /// Live type.
        actual: String,
        /// Converting live to desired loses nothing.
        lossless: bool,
    },
    /// Nullability differs.
    Nullability {
        /// Desired nullability.
        nullable: bool,
    },
    /// The default expression differs.
    Default {
        /// Desired default.
        expected: Option<String>,
        /// Live default.
        actual: Option<String>,
    },
}

/// A correlated column whose body differs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnDifference {
    /// Desired column.
    pub expected: Column,
    /// Live column.
    pub actual: ActualColumn,
    /// Differing attributes.
    pub alterations: Vec<ColumnAlteration>,
}

impl ColumnDifference {
    /// The type alteration, if the type differs.
    #[must_use]
    pub fn type_change(&self) -> Option<&ColumnAlteration> {
        self.alterations
            .iter()
            .find(|a| matches!(a, ColumnAlteration::Type { .. }))
    }

    /// Returns `true` if the type changes in a way that may lose data.
    #[must_use]
    pub fn is_lossy(&self) -> bool {
        matches!(
            self.type_change(),
            Some(ColumnAlteration::Type { lossless: false, .. })
        )
    }
}

/// The type a desired column is stored as: serial pseudo-types become
/// their integer type.
pub(crate) fn storage_type(column: &Column) -> &str {
    serial_base(&column.db_type).unwrap_or(column.db_type.as_str())
}

/// Lists the attributes of `actual` that differ from `expected`.
pub(crate) fn compare_column(
    expected: &Column,
    actual: &ActualColumn,
    canon: &Canonicalizer,
    types: &dyn TypeMapping,
) -> Vec<ColumnAlteration> {
    let mut alterations = Vec::new();

    let desired_type = storage_type(expected);
    if !canon.same_type(desired_type, &actual.data_type) {
        alterations.push(ColumnAlteration::Type {
            expected: desired_type.to_string(),
            actual: actual.data_type.clone(),
            lossless: is_lossless(&actual.data_type, desired_type, canon, types),
        });
    }

    if expected.nullable != actual.nullable {
        alterations.push(ColumnAlteration::Nullability {
            nullable: expected.nullable,
        });
    }

    // A serial column owns its sequence default.
    let serial_default = serial_base(&expected.db_type).is_some() && expected.default.is_none();
    if !serial_default {
        let want = expected.default.as_deref().map(|d| canon.canonical_default(d));
        let have = actual.default.as_deref().map(|d| canon.canonical_default(d));
        if want != have {
            alterations.push(ColumnAlteration::Default {
                expected: expected.default.clone(),
                actual: actual.default.clone(),
            });
        }
    }

    alterations
}

/// Returns `true` if converting a column from `from` to `to` cannot lose or
/// reinterpret data.
///
/// Same base type: every modifier must grow (or be dropped, which removes
/// the bound). Different base types: the desired type must carry no bound
/// and every native type the live type holds must also map to the desired
/// type.
pub(crate) fn is_lossless(
    from: &str,
    to: &str,
    canon: &Canonicalizer,
    types: &dyn TypeMapping,
) -> bool {
    let from_c = canon.canonical_type(from);
    let to_c = canon.canonical_type(to);
    if from_c.ends_with("[]") != to_c.ends_with("[]") {
        return false;
    }
    let from_base = TypeSynonyms::base_of(&from_c);
    let to_base = TypeSynonyms::base_of(&to_c);
    let from_mods = TypeSynonyms::modifiers_of(&from_c);
    let to_mods = TypeSynonyms::modifiers_of(&to_c);

    if from_base == to_base {
        if to_mods.is_empty() {
            return true;
        }
        if from_mods.is_empty() || from_mods.len() != to_mods.len() {
            return false;
        }
        if from_base == "decimal" && to_mods.len() == 2 {
            let (fp, fs) = (from_mods[0], from_mods[1]);
            let (tp, ts) = (to_mods[0], to_mods[1]);
            return ts >= fs && tp.saturating_sub(ts) >= fp.saturating_sub(fs);
        }
        return from_mods.iter().zip(&to_mods).all(|(f, t)| t >= f);
    }

    if !to_mods.is_empty() {
        return false;
    }
    let from_natives = types.native_candidates(&from_c);
    let to_natives = types.native_candidates(&to_c);
    !from_natives.is_empty() && from_natives.iter().all(|n| to_natives.contains(n))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PostgresTypes;

    fn lossless(from: &str, to: &str) -> bool {
        is_lossless(from, to, &Canonicalizer::postgres(), &PostgresTypes::new())
    }

    fn actual(data_type: &str, nullable: bool, default: Option<&str>) -> ActualColumn {
        ActualColumn {
            name: "c".into(),
            data_type: data_type.into(),
            nullable,
            default: default.map(str::to_string),
        }
    }

    fn compare(expected: &Column, actual: &ActualColumn) -> Vec<ColumnAlteration> {
        compare_column(expected, actual, &Canonicalizer::postgres(), &PostgresTypes::new())
    }

    #[test]
    fn widening_rules() {
        assert!(lossless("integer", "bigint"));
        assert!(lossless("smallint", "int"));
        assert!(lossless("real", "double precision"));
        assert!(lossless("character varying(50)", "varchar(100)"));
        assert!(lossless("varchar(50)", "text"));
        assert!(lossless("varchar(50)", "varchar"));
        assert!(lossless("numeric(10,2)", "decimal(12,2)"));
    }

    #[test]
    fn narrowing_and_reinterpretation() {
        assert!(!lossless("bigint", "int"));
        assert!(!lossless("varchar(100)", "varchar(50)"));
        assert!(!lossless("text", "varchar(50)"));
        assert!(!lossless("int", "uuid"));
        assert!(!lossless("text", "jsonb"));
        assert!(!lossless("numeric(10,2)", "numeric(10,4)"));
        assert!(!lossless("int", "int[]"));
        assert!(!lossless("tsvector", "text"));
        assert!(!lossless("character varying(50)", "char"));
        assert!(!lossless("text", "bpchar"));
    }

    #[test]
    fn bare_char_is_one_character() {
        assert!(lossless("char", "char(5)"));
        assert!(lossless("character(1)", "text"));
        let col = Column::new("c", "char").not_null();
        assert!(compare(&col, &actual("character(1)", false, None)).is_empty());
        let alts = compare(&col, &actual("character varying(50)", false, None));
        assert!(matches!(
            alts[0],
            ColumnAlteration::Type { lossless: false, .. }
        ));
    }

    #[test]
    fn synonyms_are_not_alterations() {
        let col = Column::new("c", "varchar(20)").not_null();
        assert!(compare(&col, &actual("character varying(20)", false, None)).is_empty());
    }

    #[test]
    fn every_attribute_is_reported() {
        let col = Column::new("c", "bigint").not_null().default_value("0");
        let alts = compare(&col, &actual("integer", true, Some("1")));
        assert_eq!(alts.len(), 3);
        assert!(matches!(
            alts[0],
            ColumnAlteration::Type { lossless: true, .. }
        ));
        assert_eq!(alts[1], ColumnAlteration::Nullability { nullable: false });
        assert!(matches!(alts[2], ColumnAlteration::Default { .. }));
    }

    #[test]
    fn cast_defaults_compare_equal() {
        let col = Column::new("c", "text").default_value("'abc'");
        assert!(compare(&col, &actual("text", true, Some("'abc'::text"))).is_empty());
        let col = Column::new("c", "int").default_value("-1");
        assert!(compare(&col, &actual("integer", true, Some("'-1'::integer"))).is_empty());
    }

    #[test]
    fn serial_matches_integer_with_sequence() {
        let col = Column::new("c", "serial").not_null();
        let live = actual("integer", false, Some("nextval('t_c_seq'::regclass)"));
        assert!(compare(&col, &live).is_empty());
        assert_eq!(storage_type(&col), "int");
    }
}
