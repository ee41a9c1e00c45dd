//! Table declarations and their construction-time validation.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SchemaError};
use crate::ident::{quote_identifier, same_identifier, truncate_identifier};

use super::column::Column;
use super::foreign_key::ForeignKeyDefinition;
use super::index::{IndexColumn, IndexDefinition, IndexMethod, IndexTarget};

/// Schema used when a table name is not qualified.
pub const DEFAULT_SCHEMA: &str = "public";

/// A schema-qualified table name.
///
/// Serialized as `"schema.name"`; comparison is case-insensitive.
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct TableName {
    /// Schema name.
    pub schema: String,
    /// Table name.
    pub name: String,
}

impl TableName {
    /// Creates a qualified table name.
    #[must_use]
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }

    /// Parses `schema.name` or a bare `name` (in [`DEFAULT_SCHEMA`]).
    #[must_use]
    pub fn parse(qualified: &str) -> Self {
        match qualified.split_once('.') {
            Some((schema, name)) => Self::new(schema.trim(), name.trim()),
            None => Self::new(DEFAULT_SCHEMA, qualified.trim()),
        }
    }

    /// `schema.name` with identifiers quoted where needed.
    #[must_use]
    pub fn to_sql(&self) -> String {
        format!(
            "{}.{}",
            quote_identifier(&self.schema),
            quote_identifier(&self.name)
        )
    }
}

impl PartialEq for TableName {
    fn eq(&self, other: &Self) -> bool {
        same_identifier(&self.schema, &other.schema) && same_identifier(&self.name, &other.name)
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

impl From<&str> for TableName {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

impl From<String> for TableName {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<TableName> for String {
    fn from(name: TableName) -> Self {
        name.to_string()
    }
}

/// A primary key constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimaryKey {
    /// Constraint name.
    pub name: String,
    /// Key columns in key order.
    pub columns: Vec<String>,
}

impl PrimaryKey {
    /// The conventional constraint name for a key over `columns`.
    #[must_use]
    pub fn default_name(table: &TableName, columns: &[String]) -> String {
        truncate_identifier(&format!("pkey_{}_{}", table.name, columns.join("_")))
    }

    /// Renders the constraint body.
    #[must_use]
    pub fn constraint_sql(&self) -> String {
        let cols: Vec<String> = self.columns.iter().map(|c| quote_identifier(c)).collect();
        format!(
            "CONSTRAINT {} PRIMARY KEY ({})",
            quote_identifier(&self.name),
            cols.join(", ")
        )
    }
}

/// A desired table. Only constructed through [`TableBuilder::build`], so
/// every `Table` satisfies its invariants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TableBuilder", into = "TableBuilder")]
pub struct Table {
    name: TableName,
    columns: Vec<Column>,
    primary_key: Option<PrimaryKey>,
    indexes: Vec<IndexDefinition>,
    foreign_keys: Vec<ForeignKeyDefinition>,
}

impl Table {
    /// Starts declaring a table.
    #[must_use]
    pub fn builder(name: impl Into<TableName>) -> TableBuilder {
        TableBuilder::new(name)
    }

    /// Returns a builder seeded with this table, for declaring a changed
    /// version of it. A conventionally named primary key is renamed to
    /// follow its columns if they change.
    #[must_use]
    pub fn modify(&self) -> TableBuilder {
        TableBuilder {
            name: self.name.clone(),
            columns: self.columns.clone(),
            primary_key: self.primary_key.as_ref().map(|pk| pk.columns.clone()),
            primary_key_name: self
                .primary_key
                .as_ref()
                .filter(|pk| pk.name != PrimaryKey::default_name(&self.name, &pk.columns))
                .map(|pk| pk.name.clone()),
            indexes: self.indexes.clone(),
            foreign_keys: self.foreign_keys.clone(),
        }
    }

    /// Qualified table name.
    #[must_use]
    pub fn name(&self) -> &TableName {
        &self.name
    }

    /// Columns in declaration order.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Looks up a column by name (case-insensitive).
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| same_identifier(&c.name, name))
    }

    /// The primary key, if any column is part of it.
    #[must_use]
    pub fn primary_key(&self) -> Option<&PrimaryKey> {
        self.primary_key.as_ref()
    }

    /// Indexes, each with a resolved name.
    #[must_use]
    pub fn indexes(&self) -> &[IndexDefinition] {
        &self.indexes
    }

    /// Looks up an index by name (case-insensitive).
    #[must_use]
    pub fn index(&self, name: &str) -> Option<&IndexDefinition> {
        self.indexes.iter().find(|i| same_identifier(i.name(), name))
    }

    /// Foreign keys, each with a resolved name.
    #[must_use]
    pub fn foreign_keys(&self) -> &[ForeignKeyDefinition] {
        &self.foreign_keys
    }

    /// Looks up a foreign key by name (case-insensitive).
    #[must_use]
    pub fn foreign_key(&self, name: &str) -> Option<&ForeignKeyDefinition> {
        self.foreign_keys
            .iter()
            .find(|fk| same_identifier(fk.name(), name))
    }
}

impl From<Table> for TableBuilder {
    fn from(table: Table) -> Self {
        table.modify()
    }
}

impl TryFrom<TableBuilder> for Table {
    type Error = SchemaError;

    fn try_from(builder: TableBuilder) -> Result<Self> {
        builder.build()
    }
}

/// Fluent construction of a [`Table`] with validation on [`build`](Self::build).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableBuilder {
    name: TableName,
    #[serde(default)]
    columns: Vec<Column>,
    /// Explicit key column order; defaults to the flagged columns in
    /// declaration order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    primary_key: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    primary_key_name: Option<String>,
    #[serde(default)]
    indexes: Vec<IndexDefinition>,
    #[serde(default)]
    foreign_keys: Vec<ForeignKeyDefinition>,
}

impl TableBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new(name: impl Into<TableName>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            primary_key: None,
            primary_key_name: None,
            indexes: Vec::new(),
            foreign_keys: Vec::new(),
        }
    }

    /// Adds a column.
    #[must_use]
    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    /// Removes a column by name, together with the indexes and foreign keys
    /// that reference it and its primary key membership.
    #[must_use]
    pub fn remove_column(mut self, name: &str) -> Self {
        self.columns.retain(|c| !same_identifier(&c.name, name));
        self.indexes
            .retain(|i| !i.column_names().iter().any(|c| same_identifier(c, name)));
        self.foreign_keys
            .retain(|fk| !fk.columns.iter().any(|c| same_identifier(c, name)));
        if let Some(ref mut pk) = self.primary_key {
            pk.retain(|c| !same_identifier(c, name));
            if pk.is_empty() {
                self.primary_key = None;
            }
        }
        self
    }

    /// Replaces a column in place, keeping its position.
    #[must_use]
    pub fn modify_column(mut self, name: &str, f: impl FnOnce(Column) -> Column) -> Self {
        if let Some(pos) = self.columns.iter().position(|c| same_identifier(&c.name, name)) {
            let column = self.columns.remove(pos);
            self.columns.insert(pos, f(column));
        }
        self
    }

    /// Sets the primary key columns explicitly, in key order.
    #[must_use]
    pub fn primary_key<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.primary_key = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Names the primary key constraint.
    #[must_use]
    pub fn primary_key_name(mut self, name: impl Into<String>) -> Self {
        self.primary_key_name = Some(name.into());
        self
    }

    /// Adds an index.
    #[must_use]
    pub fn index(mut self, index: IndexDefinition) -> Self {
        self.indexes.push(index);
        self
    }

    /// Removes an index by its explicit or default name.
    #[must_use]
    pub fn remove_index(mut self, name: &str) -> Self {
        let table = self.name.clone();
        self.indexes.retain(|i| {
            let resolved = i.name.clone().unwrap_or_else(|| i.default_name(&table));
            !same_identifier(&resolved, name)
        });
        self
    }

    /// Adds a foreign key.
    #[must_use]
    pub fn foreign_key(mut self, foreign_key: ForeignKeyDefinition) -> Self {
        self.foreign_keys.push(foreign_key);
        self
    }

    /// Removes a foreign key by its explicit or default name.
    #[must_use]
    pub fn remove_foreign_key(mut self, name: &str) -> Self {
        let table = self.name.clone();
        self.foreign_keys.retain(|fk| {
            let resolved = fk.name.clone().unwrap_or_else(|| fk.default_name(&table));
            !same_identifier(&resolved, name)
        });
        self
    }

    /// Validates the declaration and produces the immutable table.
    ///
    /// Column-attached indexes move into the index set, default names are
    /// assigned, and primary key columns become `NOT NULL`.
    pub fn build(self) -> Result<Table> {
        let Self {
            name,
            mut columns,
            primary_key,
            primary_key_name,
            mut indexes,
            mut foreign_keys,
        } = self;

        if name.name.trim().is_empty() {
            return Err(SchemaError::malformed(&name, None, "table name is empty"));
        }
        if columns.is_empty() {
            return Err(SchemaError::malformed(&name, None, "table has no columns"));
        }

        let mut seen = HashSet::new();
        for col in &columns {
            if col.name.trim().is_empty() {
                return Err(SchemaError::malformed(&name, None, "column name is empty"));
            }
            if col.db_type.trim().is_empty() {
                return Err(SchemaError::malformed(
                    &name,
                    Some(col.name.as_str()),
                    "column type is empty",
                ));
            }
            if !seen.insert(col.name.to_ascii_lowercase()) {
                return Err(SchemaError::malformed(
                    &name,
                    Some(col.name.as_str()),
                    "duplicate column name",
                ));
            }
        }
        let has_column = |n: &str| columns.iter().any(|c| same_identifier(&c.name, n));

        // ---- primary key -------------------------------------------
        let key_columns = match primary_key {
            Some(explicit) => {
                if explicit.is_empty() {
                    return Err(SchemaError::malformed(
                        &name,
                        None,
                        "empty primary key column list",
                    ));
                }
                let mut seen = HashSet::new();
                for col in &explicit {
                    if !has_column(col) {
                        return Err(SchemaError::malformed(
                            &name,
                            Some(col.as_str()),
                            "primary key references an unknown column",
                        ));
                    }
                    if !seen.insert(col.to_ascii_lowercase()) {
                        return Err(SchemaError::malformed(
                            &name,
                            Some(col.as_str()),
                            "column listed twice in the primary key",
                        ));
                    }
                }
                let mut key = explicit;
                for col in columns.iter().filter(|c| c.primary_key) {
                    if !key.iter().any(|k| same_identifier(k, &col.name)) {
                        key.push(col.name.clone());
                    }
                }
                key
            }
            None => columns
                .iter()
                .filter(|c| c.primary_key)
                .map(|c| c.name.clone())
                .collect(),
        };
        for col in &mut columns {
            col.primary_key = key_columns.iter().any(|k| same_identifier(k, &col.name));
            if col.primary_key {
                col.nullable = false;
            }
        }
        let primary_key = if key_columns.is_empty() {
            None
        } else {
            let pk_name = primary_key_name
                .unwrap_or_else(|| PrimaryKey::default_name(&name, &key_columns));
            Some(PrimaryKey {
                name: pk_name,
                columns: key_columns,
            })
        };

        // ---- indexes -----------------------------------------------
        for col in &mut columns {
            if let Some(mut index) = col.index.take() {
                index.target = IndexTarget::Columns(vec![IndexColumn::new(col.name.clone())]);
                indexes.push(index);
            }
        }
        let has_column = |n: &str| columns.iter().any(|c| same_identifier(&c.name, n));
        let mut relation_names: HashSet<String> = HashSet::new();
        if let Some(ref pk) = primary_key {
            relation_names.insert(pk.name.to_ascii_lowercase());
        }
        for index in &mut indexes {
            match &index.target {
                IndexTarget::Columns(cols) => {
                    if cols.is_empty() {
                        return Err(SchemaError::malformed(
                            &name,
                            index.name.as_deref(),
                            "index has no columns",
                        ));
                    }
                    if let Some(missing) = cols.iter().find(|c| !has_column(&c.name)) {
                        return Err(SchemaError::malformed(
                            &name,
                            index.name.as_deref().or(Some(missing.name.as_str())),
                            format!("index references unknown column '{}'", missing.name),
                        ));
                    }
                }
                IndexTarget::Expression(expr) => {
                    if expr.trim().is_empty() {
                        return Err(SchemaError::malformed(
                            &name,
                            index.name.as_deref(),
                            "index expression is empty",
                        ));
                    }
                    if index.name.is_none() {
                        return Err(SchemaError::malformed(
                            &name,
                            Some(expr.as_str()),
                            "expression indexes must be named",
                        ));
                    }
                }
            }
            if index.unique && index.method != IndexMethod::Btree {
                return Err(SchemaError::malformed(
                    &name,
                    index.name.as_deref(),
                    format!("unique indexes require btree, not {}", index.method),
                ));
            }
            if index.name.is_none() {
                index.name = Some(index.default_name(&name));
            }
            if !relation_names.insert(index.name().to_ascii_lowercase()) {
                return Err(SchemaError::malformed(
                    &name,
                    Some(index.name()),
                    "duplicate index name",
                ));
            }
        }

        // ---- foreign keys ------------------------------------------
        let mut fk_names = HashSet::new();
        for fk in &mut foreign_keys {
            if fk.columns.is_empty() {
                return Err(SchemaError::malformed(
                    &name,
                    fk.name.as_deref(),
                    "foreign key has no columns",
                ));
            }
            if fk.columns.len() != fk.referenced_columns.len() {
                return Err(SchemaError::malformed(
                    &name,
                    fk.name.as_deref(),
                    format!(
                        "foreign key has {} local columns but {} referenced columns",
                        fk.columns.len(),
                        fk.referenced_columns.len()
                    ),
                ));
            }
            if let Some(missing) = fk.columns.iter().find(|c| !has_column(c)) {
                return Err(SchemaError::malformed(
                    &name,
                    fk.name.as_deref(),
                    format!("foreign key references unknown column '{missing}'"),
                ));
            }
            if fk.name.is_none() {
                fk.name = Some(fk.default_name(&name));
            }
            let lowered = fk.name().to_ascii_lowercase();
            if !fk_names.insert(lowered.clone()) || relation_names.contains(&lowered) {
                return Err(SchemaError::malformed(
                    &name,
                    Some(fk.name()),
                    "duplicate foreign key name",
                ));
            }
        }

        Ok(Table {
            name,
            columns,
            primary_key,
            indexes,
            foreign_keys,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn people() -> TableBuilder {
        Table::builder("people")
            .column(Column::new("id", "int").primary_key())
            .column(Column::new("first_name", "varchar"))
            .column(Column::new("user_name", "varchar"))
    }

    #[test]
    fn unqualified_names_land_in_public() {
        let name = TableName::parse("people");
        assert_eq!(name.schema, "public");
        assert_eq!(name, TableName::new("PUBLIC", "People"));
        assert_eq!(TableName::parse("other.people").schema, "other");
    }

    #[test]
    fn flagged_columns_form_the_primary_key() {
        let table = people().build().unwrap();
        let pk = table.primary_key().unwrap();
        assert_eq!(pk.columns, vec!["id"]);
        assert_eq!(pk.name, "pkey_people_id");
    }

    #[test]
    fn explicit_primary_key_order_is_kept() {
        let table = Table::builder("pairs")
            .column(Column::new("a", "int"))
            .column(Column::new("b", "int").nullable())
            .primary_key(["b", "a"])
            .primary_key_name("pairs_pk")
            .build()
            .unwrap();
        let pk = table.primary_key().unwrap();
        assert_eq!(pk.columns, vec!["b", "a"]);
        assert_eq!(pk.name, "pairs_pk");
        assert!(!table.column("b").unwrap().nullable);
    }

    #[test]
    fn redefined_key_follows_its_columns_unless_named() {
        let table = people().build().unwrap();
        let widened = table.modify().primary_key(["id", "user_name"]).build().unwrap();
        assert_eq!(widened.primary_key().unwrap().name, "pkey_people_id_user_name");

        let named = people().primary_key_name("people_pk").build().unwrap();
        let widened = named.modify().primary_key(["id", "user_name"]).build().unwrap();
        assert_eq!(widened.primary_key().unwrap().name, "people_pk");

        assert_eq!(table.modify().build().unwrap(), table);
    }

    #[test]
    fn column_attached_index_moves_to_the_table() {
        let table = people()
            .modify_column("user_name", Column::unique)
            .build()
            .unwrap();
        assert!(table.column("user_name").unwrap().index.is_none());
        let idx = table.index("idx_people_user_name").unwrap();
        assert!(idx.unique);
        assert_eq!(idx.column_names(), vec!["user_name"]);
    }

    #[test]
    fn duplicate_column_is_malformed() {
        let err = people()
            .column(Column::new("USER_NAME", "text"))
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::MalformedDefinition { .. }));
        assert!(err.to_string().contains("duplicate column"));
    }

    #[test]
    fn empty_primary_key_is_malformed() {
        let err = people().primary_key(Vec::<String>::new()).build().unwrap_err();
        assert!(err.to_string().contains("empty primary key"));
    }

    #[test]
    fn duplicate_index_name_is_malformed() {
        let err = people()
            .index(IndexDefinition::on_columns(["user_name"]))
            .index(IndexDefinition::on_columns(["user_name"]).unique())
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("duplicate index name"));
    }

    #[test]
    fn index_on_unknown_column_is_malformed() {
        let err = people()
            .index(IndexDefinition::on_columns(["nope"]))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("unknown column 'nope'"));
    }

    #[test]
    fn unique_gin_is_malformed() {
        let err = people()
            .index(
                IndexDefinition::on_columns(["user_name"])
                    .method(IndexMethod::Gin)
                    .unique(),
            )
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("require btree"));
    }

    #[test]
    fn foreign_key_column_count_must_match() {
        let mut fk = ForeignKeyDefinition::new("first_name", "states", "id");
        fk.referenced_columns.push("extra".into());
        let err = people().foreign_key(fk).build().unwrap_err();
        assert!(err.to_string().contains("1 local columns but 2"));
    }

    #[test]
    fn duplicate_foreign_key_name_is_malformed() {
        let err = people()
            .foreign_key(ForeignKeyDefinition::new("first_name", "states", "id").named("fk"))
            .foreign_key(ForeignKeyDefinition::new("user_name", "users", "id").named("FK"))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("duplicate foreign key name"));
    }

    #[test]
    fn remove_column_cascades_to_dependents() {
        let table = people()
            .index(IndexDefinition::on_columns(["user_name"]))
            .foreign_key(ForeignKeyDefinition::new("user_name", "users", "name"))
            .remove_column("user_name")
            .build()
            .unwrap();
        assert!(table.column("user_name").is_none());
        assert!(table.indexes().is_empty());
        assert!(table.foreign_keys().is_empty());
    }

    #[test]
    fn remove_by_default_name() {
        let table = people()
            .index(IndexDefinition::on_columns(["user_name"]))
            .foreign_key(ForeignKeyDefinition::new("first_name", "states", "id"))
            .build()
            .unwrap();
        let table = table
            .modify()
            .remove_index("idx_people_user_name")
            .remove_foreign_key("fkey_people_first_name")
            .build()
            .unwrap();
        assert!(table.indexes().is_empty());
        assert!(table.foreign_keys().is_empty());
    }

    #[test]
    fn deserialized_tables_are_validated() {
        let json = r#"{
            "name": "public.people",
            "columns": [
                {"name": "id", "type": "int", "primary_key": true},
                {"name": "id", "type": "int"}
            ]
        }"#;
        let err = serde_json::from_str::<Table>(json).unwrap_err();
        assert!(err.to_string().contains("duplicate column"));
    }

    #[test]
    fn serialization_round_trips() {
        let table = people()
            .index(IndexDefinition::on_columns(["user_name"]).unique())
            .build()
            .unwrap();
        let json = serde_json::to_string(&table).unwrap();
        let back: Table = serde_json::from_str(&json).unwrap();
        assert_eq!(back, table);
    }
}
