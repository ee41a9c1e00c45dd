//! Native type ↔ database type mapping.
//!
//! The delta detector depends only on [`TypeMapping`]: a pure mapping from
//! native types to database type names and back. Driver crates add
//! parameter-type tags on top through [`TypeProvider`].
//!
//! Lookups are memoized in a [`CowMap`]: readers take a snapshot of an
//! immutable map and never wait on a writer, writers publish a new map by
//! swapping a pointer. Two threads resolving the same key race harmlessly
//! since the computed value is always the same.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::canonical::TypeSynonyms;
use crate::error::{Result, SchemaError};

/// A native value type, as seen by the application.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NativeType {
    /// `bool`
    Bool,
    /// `i16`
    I16,
    /// `i32`
    I32,
    /// `i64`
    I64,
    /// `f32`
    F32,
    /// `f64`
    F64,
    /// `String` / `&str`
    String,
    /// A 128-bit unique identifier.
    Uuid,
    /// Arbitrary-precision decimal.
    Decimal,
    /// Calendar date.
    Date,
    /// Time of day.
    Time,
    /// Timestamp without zone.
    DateTime,
    /// Timestamp with zone.
    DateTimeTz,
    /// JSON document.
    Json,
    /// Byte string.
    Bytes,
    /// Any other type, by its path. Needs a registered mapping.
    Named(String),
}

impl NativeType {
    /// A type identified by name only.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    /// Best-effort classification of a Rust type by its type name.
    /// `Option<T>` is unwrapped; nullability is a column property.
    #[must_use]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::from_type_name(std::any::type_name::<T>())
    }

    fn from_type_name(name: &str) -> Self {
        let name = strip_option(name);
        match name {
            "bool" => Self::Bool,
            "i16" => Self::I16,
            "i32" => Self::I32,
            "i64" => Self::I64,
            "f32" => Self::F32,
            "f64" => Self::F64,
            "str" | "&str" | "alloc::string::String" => Self::String,
            "uuid::Uuid" => Self::Uuid,
            "rust_decimal::decimal::Decimal" => Self::Decimal,
            "chrono::naive::date::NaiveDate" => Self::Date,
            "chrono::naive::time::NaiveTime" => Self::Time,
            "chrono::naive::datetime::NaiveDateTime" => Self::DateTime,
            "serde_json::value::Value" => Self::Json,
            "alloc::vec::Vec<u8>" | "[u8]" | "&[u8]" => Self::Bytes,
            n if n.starts_with("chrono::datetime::DateTime<") => Self::DateTimeTz,
            other => Self::Named(other.to_string()),
        }
    }
}

/// Strips `Option<...>` from a type name.
fn strip_option(name: &str) -> &str {
    name.strip_prefix("core::option::Option<")
        .and_then(|rest| rest.strip_suffix('>'))
        .unwrap_or(name)
}

impl fmt::Display for NativeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool => f.write_str("bool"),
            Self::I16 => f.write_str("i16"),
            Self::I32 => f.write_str("i32"),
            Self::I64 => f.write_str("i64"),
            Self::F32 => f.write_str("f32"),
            Self::F64 => f.write_str("f64"),
            Self::String => f.write_str("String"),
            Self::Uuid => f.write_str("Uuid"),
            Self::Decimal => f.write_str("Decimal"),
            Self::Date => f.write_str("Date"),
            Self::Time => f.write_str("Time"),
            Self::DateTime => f.write_str("DateTime"),
            Self::DateTimeTz => f.write_str("DateTimeTz"),
            Self::Json => f.write_str("Json"),
            Self::Bytes => f.write_str("Bytes"),
            Self::Named(name) => f.write_str(name),
        }
    }
}

/// Maps native types to database type names and back.
pub trait TypeMapping: Send + Sync {
    /// The database type used to declare a column holding `native`.
    fn database_type(&self, native: &NativeType) -> Result<String>;

    /// Native types that legitimately map to `db_type`. Empty when the type
    /// is unknown.
    fn native_candidates(&self, db_type: &str) -> Vec<NativeType>;
}

/// A driver's full type capability: the mapping plus a parameter-type tag
/// used to bind query parameters.
pub trait TypeProvider: TypeMapping {
    /// The driver's parameter type tag.
    type ParameterType: Clone + Send + Sync + 'static;

    /// The parameter type tag for binding a value of `native`.
    fn parameter_type(&self, native: &NativeType) -> Result<Self::ParameterType>;
}

impl<T: TypeMapping + ?Sized> TypeMapping for Arc<T> {
    fn database_type(&self, native: &NativeType) -> Result<String> {
        (**self).database_type(native)
    }

    fn native_candidates(&self, db_type: &str) -> Vec<NativeType> {
        (**self).native_candidates(db_type)
    }
}

// ================================================================
// Copy-on-write memo map
// ================================================================

/// A read-mostly map. Readers clone an `Arc` snapshot; writers build the next
/// map outside the lock and only take it to swap the pointer.
#[derive(Debug)]
pub struct CowMap<K, V> {
    current: RwLock<Arc<HashMap<K, V>>>,
}

impl<K, V> Default for CowMap<K, V> {
    fn default() -> Self {
        Self {
            current: RwLock::new(Arc::new(HashMap::new())),
        }
    }
}

impl<K: Eq + Hash + Clone, V: Clone> CowMap<K, V> {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The current immutable snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<HashMap<K, V>> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Looks up a key in the current snapshot.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<V> {
        self.snapshot().get(key).cloned()
    }

    /// Publishes a map containing `key -> value`; last writer wins.
    pub fn insert(&self, key: K, value: V) {
        loop {
            let base = self.snapshot();
            let mut next = HashMap::clone(&base);
            next.insert(key.clone(), value.clone());
            let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
            if Arc::ptr_eq(&guard, &base) {
                *guard = Arc::new(next);
                return;
            }
        }
    }

    /// Returns the cached value or computes, publishes and returns it.
    /// Errors are not cached.
    pub fn get_or_try_insert_with<E>(
        &self,
        key: &K,
        compute: impl FnOnce() -> std::result::Result<V, E>,
    ) -> std::result::Result<V, E> {
        if let Some(v) = self.get(key) {
            return Ok(v);
        }
        let value = compute()?;
        self.insert(key.clone(), value.clone());
        Ok(value)
    }

    /// Number of entries in the current snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    /// Returns `true` if the current snapshot is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }
}

/// Wraps a mapping and memoizes both directions for the life of the process.
#[derive(Debug, Default)]
pub struct Memoized<M> {
    inner: M,
    forward: CowMap<NativeType, String>,
    reverse: CowMap<String, Vec<NativeType>>,
}

impl<M: TypeMapping> Memoized<M> {
    /// Wraps `inner`.
    #[must_use]
    pub fn new(inner: M) -> Self {
        Self {
            inner,
            forward: CowMap::new(),
            reverse: CowMap::new(),
        }
    }

    /// The wrapped mapping.
    #[must_use]
    pub fn inner(&self) -> &M {
        &self.inner
    }
}

impl<M: TypeMapping> TypeMapping for Memoized<M> {
    fn database_type(&self, native: &NativeType) -> Result<String> {
        self.forward
            .get_or_try_insert_with(native, || self.inner.database_type(native))
    }

    fn native_candidates(&self, db_type: &str) -> Vec<NativeType> {
        let key = db_type.trim().to_ascii_lowercase();
        self.reverse
            .get_or_try_insert_with(&key, || {
                Ok::<_, SchemaError>(self.inner.native_candidates(db_type))
            })
            .unwrap_or_default()
    }
}

// ================================================================
// PostgreSQL names
// ================================================================

/// Built-in PostgreSQL type names with a registration hook for custom
/// native types.
#[derive(Debug)]
pub struct PostgresTypes {
    synonyms: TypeSynonyms,
    custom: CowMap<NativeType, String>,
}

impl Default for PostgresTypes {
    fn default() -> Self {
        Self::new()
    }
}

impl PostgresTypes {
    /// Creates the mapping with built-in types only.
    #[must_use]
    pub fn new() -> Self {
        Self {
            synonyms: TypeSynonyms::postgres(),
            custom: CowMap::new(),
        }
    }

    /// Registers (or overrides) the database type for a native type.
    pub fn register(&self, native: NativeType, db_type: impl Into<String>) {
        self.custom.insert(native, db_type.into());
    }

    fn builtin(native: &NativeType) -> Option<&'static str> {
        Some(match native {
            NativeType::Bool => "boolean",
            NativeType::I16 => "smallint",
            NativeType::I32 => "integer",
            NativeType::I64 => "bigint",
            NativeType::F32 => "real",
            NativeType::F64 => "double precision",
            NativeType::String => "varchar",
            NativeType::Uuid => "uuid",
            NativeType::Decimal => "decimal",
            NativeType::Date => "date",
            NativeType::Time => "time",
            NativeType::DateTime => "timestamp without time zone",
            NativeType::DateTimeTz => "timestamp with time zone",
            NativeType::Json => "jsonb",
            NativeType::Bytes => "bytea",
            NativeType::Named(_) => return None,
        })
    }

    fn builtin_candidates(base: &str) -> Vec<NativeType> {
        use NativeType as N;
        match base {
            "smallint" => vec![N::I16],
            "int" => vec![N::I32, N::I16],
            "bigint" => vec![N::I64, N::I32, N::I16],
            "real" => vec![N::F32],
            "double" => vec![N::F64, N::F32],
            "decimal" => vec![N::Decimal],
            "boolean" => vec![N::Bool],
            "varchar" | "char" | "text" | "citext" => vec![N::String],
            "uuid" => vec![N::Uuid],
            "date" => vec![N::Date],
            "time" => vec![N::Time],
            "timestamp" => vec![N::DateTime],
            "timestamptz" => vec![N::DateTimeTz],
            "jsonb" | "json" => vec![N::Json],
            "bytea" => vec![N::Bytes],
            _ => Vec::new(),
        }
    }
}

impl TypeMapping for PostgresTypes {
    fn database_type(&self, native: &NativeType) -> Result<String> {
        if let Some(custom) = self.custom.get(native) {
            return Ok(custom);
        }
        Self::builtin(native)
            .map(str::to_string)
            .ok_or_else(|| SchemaError::UnsupportedMapping {
                native_type: native.to_string(),
            })
    }

    fn native_candidates(&self, db_type: &str) -> Vec<NativeType> {
        let canonical = self.synonyms.canonical_type(db_type);
        let base = TypeSynonyms::base_of(&canonical);
        let mut candidates = if canonical.ends_with("[]") {
            Vec::new()
        } else {
            Self::builtin_candidates(base)
        };
        for (native, mapped) in self.custom.snapshot().iter() {
            if self.synonyms.canonical_type(mapped) == canonical && !candidates.contains(native) {
                candidates.push(native.clone());
            }
        }
        candidates
    }
}
