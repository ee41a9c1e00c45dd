//! PostgreSQL type provider.
//!
//! Adds `sqlx` parameter type tags on top of the core's PostgreSQL type
//! names. Both directions are memoized.

use oxide_schema::types::{CowMap, Memoized, NativeType, PostgresTypes, TypeMapping, TypeProvider};
use oxide_schema::{Result, SchemaError};
use sqlx::postgres::PgTypeInfo;

/// Type names and parameter types for PostgreSQL.
///
/// Custom types must be registered before the first lookup; resolved
/// mappings are cached for the life of the provider.
#[derive(Debug, Default)]
pub struct PgTypeProvider {
    names: Memoized<PostgresTypes>,
    parameters: CowMap<NativeType, PgTypeInfo>,
}

impl PgTypeProvider {
    /// Creates a provider with the built-in mappings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a custom native type under a PostgreSQL type name, used
    /// both for column declarations and parameter binding.
    pub fn register(&self, native: NativeType, db_type: &'static str) {
        self.names.inner().register(native.clone(), db_type);
        self.parameters.insert(native, PgTypeInfo::with_name(db_type));
    }

    fn builtin_parameter(native: &NativeType) -> Option<&'static str> {
        Some(match native {
            NativeType::Bool => "bool",
            NativeType::I16 => "int2",
            NativeType::I32 => "int4",
            NativeType::I64 => "int8",
            NativeType::F32 => "float4",
            NativeType::F64 => "float8",
            NativeType::String => "varchar",
            NativeType::Uuid => "uuid",
            NativeType::Decimal => "numeric",
            NativeType::Date => "date",
            NativeType::Time => "time",
            NativeType::DateTime => "timestamp",
            NativeType::DateTimeTz => "timestamptz",
            NativeType::Json => "jsonb",
            NativeType::Bytes => "bytea",
            NativeType::Named(_) => return None,
        })
    }
}

impl TypeMapping for PgTypeProvider {
    fn database_type(&self, native: &NativeType) -> Result<String> {
        self.names.database_type(native)
    }

    fn native_candidates(&self, db_type: &str) -> Vec<NativeType> {
        self.names.native_candidates(db_type)
    }
}

impl TypeProvider for PgTypeProvider {
    type ParameterType = PgTypeInfo;

    fn parameter_type(&self, native: &NativeType) -> Result<PgTypeInfo> {
        self.parameters.get_or_try_insert_with(native, || {
            Self::builtin_parameter(native)
                .map(PgTypeInfo::with_name)
                .ok_or_else(|| SchemaError::UnsupportedMapping {
                    native_type: native.to_string(),
                })
        })
    }
}
