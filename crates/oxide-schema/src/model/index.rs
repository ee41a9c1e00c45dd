//! Index declarations.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ident::{quote_identifier, truncate_identifier};

use super::table::TableName;

/// Index access method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexMethod {
    /// B-tree index (default).
    #[default]
    Btree,
    /// Hash index.
    Hash,
    /// GIN index.
    Gin,
    /// GiST index.
    Gist,
    /// BRIN index.
    Brin,
    /// SP-GiST index.
    Spgist,
}

impl IndexMethod {
    /// Returns the SQL keyword for this method.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Btree => "btree",
            Self::Hash => "hash",
            Self::Gin => "gin",
            Self::Gist => "gist",
            Self::Brin => "brin",
            Self::Spgist => "spgist",
        }
    }
}

impl fmt::Display for IndexMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Sort order for index columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Ascending order (default).
    #[default]
    Asc,
    /// Descending order.
    Desc,
}

impl SortOrder {
    /// Returns the SQL keyword for this sort order, or empty string for ASC.
    #[must_use]
    pub const fn to_sql(self) -> &'static str {
        match self {
            Self::Asc => "",
            Self::Desc => " DESC",
        }
    }
}

/// Nulls ordering for index columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NullsOrder {
    /// Database default (NULLS LAST for ASC, NULLS FIRST for DESC).
    #[default]
    Default,
    /// Sort nulls before non-null values.
    First,
    /// Sort nulls after non-null values.
    Last,
}

impl NullsOrder {
    /// Returns the SQL clause for this nulls ordering, or empty string for default.
    #[must_use]
    pub const fn to_sql(self) -> &'static str {
        match self {
            Self::Default => "",
            Self::First => " NULLS FIRST",
            Self::Last => " NULLS LAST",
        }
    }
}

/// A column in an index with sort order, nulls ordering and an optional
/// operator class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexColumn {
    /// Column name.
    pub name: String,
    /// Sort order.
    #[serde(default)]
    pub order: SortOrder,
    /// Nulls ordering.
    #[serde(default)]
    pub nulls: NullsOrder,
    /// Operator class, e.g. `jsonb_path_ops`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opclass: Option<String>,
}

impl IndexColumn {
    /// Creates an ascending index column.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            order: SortOrder::Asc,
            nulls: NullsOrder::Default,
            opclass: None,
        }
    }

    /// Creates a descending index column.
    #[must_use]
    pub fn desc(name: impl Into<String>) -> Self {
        Self {
            order: SortOrder::Desc,
            ..Self::new(name)
        }
    }

    /// Sets the nulls ordering.
    #[must_use]
    pub fn nulls(mut self, nulls: NullsOrder) -> Self {
        self.nulls = nulls;
        self
    }

    /// Sets the operator class.
    #[must_use]
    pub fn opclass(mut self, opclass: impl Into<String>) -> Self {
        self.opclass = Some(opclass.into());
        self
    }

    /// Returns the SQL fragment for this column.
    #[must_use]
    pub fn to_sql(&self) -> String {
        let mut sql = quote_identifier(&self.name);
        if let Some(ref opclass) = self.opclass {
            sql.push(' ');
            sql.push_str(opclass);
        }
        sql.push_str(self.order.to_sql());
        sql.push_str(self.nulls.to_sql());
        sql
    }
}

impl From<&str> for IndexColumn {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for IndexColumn {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

/// What an index covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexTarget {
    /// A list of columns.
    Columns(Vec<IndexColumn>),
    /// A raw SQL expression list, written without the surrounding parentheses.
    Expression(String),
}

impl Default for IndexTarget {
    fn default() -> Self {
        Self::Columns(Vec::new())
    }
}

/// A desired index.
///
/// The name is the correlation key when comparing against the database. When
/// none is given the table build assigns `idx_<table>_<columns>[_<method>]`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IndexDefinition {
    /// Index name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Indexed columns or expression.
    #[serde(default)]
    pub target: IndexTarget,
    /// Access method.
    #[serde(default)]
    pub method: IndexMethod,
    /// Whether this is a UNIQUE index.
    #[serde(default)]
    pub unique: bool,
    /// Build with `CREATE INDEX CONCURRENTLY`.
    #[serde(default)]
    pub concurrently: bool,
    /// Partial index predicate (WHERE clause).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predicate: Option<String>,
    /// Storage parameters (`WITH (...)`).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub storage: BTreeMap<String, String>,
}

impl IndexDefinition {
    /// Creates an index with no target; used for column-attached indexes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an index over the given columns.
    #[must_use]
    pub fn on_columns<I, C>(columns: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<IndexColumn>,
    {
        Self {
            target: IndexTarget::Columns(columns.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    /// Creates an index over an expression. Expression indexes must be named.
    #[must_use]
    pub fn on_expression(name: impl Into<String>, expression: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            target: IndexTarget::Expression(expression.into()),
            ..Self::default()
        }
    }

    /// Sets an explicit name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the access method.
    #[must_use]
    pub fn method(mut self, method: IndexMethod) -> Self {
        self.method = method;
        self
    }

    /// Marks the index UNIQUE.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Builds the index concurrently.
    #[must_use]
    pub fn concurrently(mut self) -> Self {
        self.concurrently = true;
        self
    }

    /// Sets the partial index predicate.
    #[must_use]
    pub fn predicate(mut self, predicate: impl Into<String>) -> Self {
        self.predicate = Some(predicate.into());
        self
    }

    /// Adds a storage parameter.
    #[must_use]
    pub fn storage(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.storage.insert(key.into(), value.into());
        self
    }

    /// The index name. Always set on indexes that belong to a built table.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or_default()
    }

    /// Column names covered by a column target; empty for expressions.
    #[must_use]
    pub fn column_names(&self) -> Vec<&str> {
        match &self.target {
            IndexTarget::Columns(cols) => cols.iter().map(|c| c.name.as_str()).collect(),
            IndexTarget::Expression(_) => Vec::new(),
        }
    }

    /// The conventional name for an unnamed index on `table`.
    #[must_use]
    pub fn default_name(&self, table: &TableName) -> String {
        let mut name = format!("idx_{}", table.name);
        for col in self.column_names() {
            name.push('_');
            name.push_str(col);
        }
        if self.method != IndexMethod::Btree {
            name.push('_');
            name.push_str(self.method.as_sql());
        }
        truncate_identifier(&name)
    }

    /// Renders the `CREATE INDEX` statement for this index on `table`.
    #[must_use]
    pub fn to_ddl(&self, table: &TableName) -> String {
        let mut sql = String::from("CREATE ");
        if self.unique {
            sql.push_str("UNIQUE ");
        }
        sql.push_str("INDEX ");
        if self.concurrently {
            sql.push_str("CONCURRENTLY ");
        }
        sql.push_str(&quote_identifier(self.name()));
        sql.push_str(" ON ");
        sql.push_str(&table.to_sql());
        if self.method != IndexMethod::Btree {
            sql.push_str(" USING ");
            sql.push_str(self.method.as_sql());
        }
        sql.push_str(" (");
        match &self.target {
            IndexTarget::Columns(cols) => {
                let cols: Vec<String> = cols.iter().map(IndexColumn::to_sql).collect();
                sql.push_str(&cols.join(", "));
            }
            IndexTarget::Expression(expr) => sql.push_str(expr),
        }
        sql.push(')');
        if !self.storage.is_empty() {
            let params: Vec<String> = self
                .storage
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect();
            sql.push_str(&format!(" WITH ({})", params.join(", ")));
        }
        if let Some(ref predicate) = self.predicate {
            sql.push_str(" WHERE ");
            sql.push_str(predicate);
        }
        sql
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn people() -> TableName {
        TableName::new("public", "people")
    }

    #[test]
    fn default_name_includes_non_default_method() {
        let idx = IndexDefinition::on_columns(["user_name"]);
        assert_eq!(idx.default_name(&people()), "idx_people_user_name");

        let idx = IndexDefinition::on_columns(["data"]).method(IndexMethod::Gin);
        assert_eq!(idx.default_name(&people()), "idx_people_data_gin");
    }

    #[test]
    fn ddl_for_unique_btree() {
        let idx = IndexDefinition::on_columns(["user_name"])
            .named("idx_people_user_name")
            .unique();
        assert_eq!(
            idx.to_ddl(&people()),
            "CREATE UNIQUE INDEX idx_people_user_name ON public.people (user_name)"
        );
    }

    #[test]
    fn ddl_with_every_option() {
        let idx = IndexDefinition::on_columns([
            IndexColumn::desc("created").nulls(NullsOrder::Last),
            IndexColumn::new("data").opclass("jsonb_path_ops"),
        ])
        .named("idx_full")
        .method(IndexMethod::Gin)
        .concurrently()
        .storage("fastupdate", "off")
        .predicate("deleted = false");
        assert_eq!(
            idx.to_ddl(&people()),
            "CREATE INDEX CONCURRENTLY idx_full ON public.people USING gin \
             (created DESC NULLS LAST, data jsonb_path_ops) WITH (fastupdate=off) \
             WHERE deleted = false"
        );
    }

    #[test]
    fn expression_target() {
        let idx = IndexDefinition::on_expression("idx_lower_name", "lower(user_name)");
        assert!(idx.column_names().is_empty());
        assert_eq!(
            idx.to_ddl(&people()),
            "CREATE INDEX idx_lower_name ON public.people (lower(user_name))"
        );
    }
}
