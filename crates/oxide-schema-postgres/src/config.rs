//! Migrator options and schema files.

use std::path::Path;

use oxide_schema::model::Table;
use oxide_schema::policy::AutoCreate;
use serde::{Deserialize, Serialize};

use crate::error::{MigrateError, Result};

/// How the migrator may change the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigratorOptions {
    /// Which verdicts may be acted on.
    pub auto_create: AutoCreate,
    /// Apply each table's patch inside a transaction.
    pub transactional: bool,
    /// Re-read each table after applying and fail if it still differs.
    pub confirm_after_apply: bool,
}

impl Default for MigratorOptions {
    fn default() -> Self {
        Self {
            auto_create: AutoCreate::default(),
            transactional: true,
            confirm_after_apply: true,
        }
    }
}

impl MigratorOptions {
    /// Options with the given policy and defaults otherwise.
    #[must_use]
    pub fn with_auto_create(auto_create: AutoCreate) -> Self {
        Self {
            auto_create,
            ..Self::default()
        }
    }

    /// Loads options from a JSON file. Missing fields take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = read(path.as_ref())?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Loads desired tables from a JSON array. Each table is validated as it
/// is deserialized.
pub fn load_tables(path: impl AsRef<Path>) -> Result<Vec<Table>> {
    let text = read(path.as_ref())?;
    Ok(serde_json::from_str(&text)?)
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| MigrateError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn file_with(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn defaults_are_conservative() {
        let options = MigratorOptions::default();
        assert_eq!(options.auto_create, AutoCreate::None);
        assert!(options.transactional);
        assert!(options.confirm_after_apply);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let file = file_with(r#"{ "auto_create": "create_or_update" }"#);
        let options = MigratorOptions::from_file(file.path()).unwrap();
        assert_eq!(options.auto_create, AutoCreate::CreateOrUpdate);
        assert!(options.transactional);
    }

    #[test]
    fn missing_file_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");
        let err = MigratorOptions::from_file(&path).unwrap_err();
        assert!(matches!(err, MigrateError::Io { .. }));
        assert!(err.to_string().contains("absent.json"));
    }

    #[test]
    fn loads_and_validates_tables() {
        let file = file_with(
            r#"[{
                "name": "crm.people",
                "columns": [
                    { "name": "id", "type": "serial", "primary_key": true },
                    { "name": "user_name", "type": "varchar(50)" }
                ]
            }]"#,
        );
        let tables = load_tables(file.path()).unwrap();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].name().to_string(), "crm.people");
        assert_eq!(tables[0].primary_key().unwrap().columns, vec!["id"]);

        let invalid = file_with(r#"[{ "name": "empty", "columns": [] }]"#);
        let err = load_tables(invalid.path()).unwrap_err();
        assert!(matches!(err, MigrateError::Serialization(_)));
        assert!(err.to_string().contains("no columns"), "{err}");
    }
}
