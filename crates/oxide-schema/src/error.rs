//! Error types for schema definition, type mapping and reconciliation.

use crate::delta::InvalidChange;

/// Errors raised by the schema core.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// A desired schema object violates its own invariants.
    #[error("Malformed definition of table '{table}'{}: {reason}", object.as_ref().map(|o| format!(" ({o})")).unwrap_or_default())]
    MalformedDefinition {
        /// Qualified table name.
        table: String,
        /// The offending column, index or foreign key, if any.
        object: Option<String>,
        /// What is wrong with it.
        reason: String,
    },

    /// A native type has no database type or parameter type mapping.
    #[error("No database type mapping for native type '{native_type}'")]
    UnsupportedMapping {
        /// Display name of the native type.
        native_type: String,
    },

    /// Desired and actual schema cannot be reconciled with incremental DDL.
    #[error("Table '{table}' cannot be patched incrementally:\n{}", .changes.iter().map(|c| format!("  - {c}")).collect::<Vec<_>>().join("\n"))]
    Irreconcilable {
        /// Qualified table name.
        table: String,
        /// Every change that requires a destructive rebuild.
        changes: Vec<InvalidChange>,
    },
}

impl SchemaError {
    pub(crate) fn malformed(
        table: impl ToString,
        object: Option<&str>,
        reason: impl Into<String>,
    ) -> Self {
        Self::MalformedDefinition {
            table: table.to_string(),
            object: object.map(str::to_string),
            reason: reason.into(),
        }
    }
}

/// Result type for schema operations.
pub type Result<T> = std::result::Result<T, SchemaError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delta::SchemaCategory;

    #[test]
    fn malformed_message_names_object() {
        let err = SchemaError::malformed("public.people", Some("user_name"), "duplicate column");
        assert_eq!(
            err.to_string(),
            "Malformed definition of table 'public.people' (user_name): duplicate column"
        );
    }

    #[test]
    fn irreconcilable_lists_every_change() {
        let err = SchemaError::Irreconcilable {
            table: "public.people".to_string(),
            changes: vec![InvalidChange {
                category: SchemaCategory::Column,
                object: "id".to_string(),
                expected: "uuid".to_string(),
                actual: "int".to_string(),
                reason: "type reinterpretation".to_string(),
            }],
        };
        let msg = err.to_string();
        assert!(msg.contains("public.people"));
        assert!(msg.contains("column id"), "{msg}");
    }
}
