//! Reads the live schema of a table from the PostgreSQL catalog.

use oxide_schema::actual::{
    ActualColumn, ActualForeignKey, ActualIndex, ActualPrimaryKey, ActualTable,
};
use oxide_schema::introspect::SchemaReader;
use oxide_schema::model::{ForeignKeyAction, TableName};
use sqlx::postgres::PgPool;
use sqlx::{Postgres, Transaction};
use tracing::{debug, warn};

use crate::error::{MigrateError, Result};

/// Resolves the table's relation kind. Empty when no relation has the name.
const RELATION_SQL: &str = "SELECT c.relkind::text FROM pg_class c WHERE c.oid = to_regclass($1)";

/// Columns in ordinal order with their formatted types and defaults.
const COLUMNS_SQL: &str = r"
SELECT a.attname::text,
       format_type(a.atttypid, a.atttypmod),
       NOT a.attnotnull,
       pg_get_expr(d.adbin, d.adrelid)
FROM pg_attribute a
LEFT JOIN pg_attrdef d ON d.adrelid = a.attrelid AND d.adnum = a.attnum
WHERE a.attrelid = to_regclass($1) AND a.attnum > 0 AND NOT a.attisdropped
ORDER BY a.attnum
";

/// The primary key constraint with its columns in key order.
const PRIMARY_KEY_SQL: &str = r"
SELECT con.conname::text,
       ARRAY(
           SELECT att.attname::text
           FROM unnest(con.conkey) WITH ORDINALITY AS k(attnum, ord)
           JOIN pg_attribute att ON att.attrelid = con.conrelid AND att.attnum = k.attnum
           ORDER BY k.ord
       )
FROM pg_constraint con
WHERE con.conrelid = to_regclass($1) AND con.contype = 'p'
";

/// Every index except the one backing the primary key.
const INDEXES_SQL: &str = r"
SELECT ic.relname::text, pg_get_indexdef(i.indexrelid)
FROM pg_index i
JOIN pg_class ic ON ic.oid = i.indexrelid
WHERE i.indrelid = to_regclass($1) AND NOT i.indisprimary
ORDER BY ic.relname
";

/// Foreign keys with both column lists in constraint order.
const FOREIGN_KEYS_SQL: &str = r"
SELECT con.conname::text,
       ARRAY(
           SELECT att.attname::text
           FROM unnest(con.conkey) WITH ORDINALITY AS k(attnum, ord)
           JOIN pg_attribute att ON att.attrelid = con.conrelid AND att.attnum = k.attnum
           ORDER BY k.ord
       ),
       rn.nspname::text,
       rc.relname::text,
       ARRAY(
           SELECT att.attname::text
           FROM unnest(con.confkey) WITH ORDINALITY AS k(attnum, ord)
           JOIN pg_attribute att ON att.attrelid = con.confrelid AND att.attnum = k.attnum
           ORDER BY k.ord
       ),
       con.confdeltype::text,
       con.confupdtype::text
FROM pg_constraint con
JOIN pg_class rc ON rc.oid = con.confrelid
JOIN pg_namespace rn ON rn.oid = rc.relnamespace
WHERE con.conrelid = to_regclass($1) AND con.contype = 'f'
ORDER BY con.conname
";

type ColumnRow = (String, String, bool, Option<String>);
type PrimaryKeyRow = (String, Vec<String>);
type IndexRow = (String, String);
type ForeignKeyRow = (String, Vec<String>, String, String, Vec<String>, String, String);

/// Reads table schemas through the system catalogs.
#[derive(Debug, Clone)]
pub struct PgSchemaReader {
    pool: PgPool,
}

impl PgSchemaReader {
    /// Creates a reader over `pool`.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Reads the table inside one read-only snapshot.
    pub async fn read_table(&self, table: &TableName) -> Result<Option<ActualTable>> {
        let qualified = table.to_sql();
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await?;

        let relation: Option<(String,)> = sqlx::query_as(RELATION_SQL)
            .bind(&qualified)
            .fetch_optional(&mut *tx)
            .await?;
        match relation.as_ref().map(|(kind,)| kind.as_str()) {
            None => {
                debug!(table = %table, "Table not found");
                tx.rollback().await?;
                return Ok(None);
            }
            Some("r" | "p") => {}
            Some(kind) => {
                warn!(table = %table, relkind = %kind, "Relation exists but is not a table");
                tx.rollback().await?;
                return Ok(None);
            }
        }

        let actual = Self::read_catalog(&mut tx, table, &qualified).await?;
        tx.rollback().await?;

        debug!(
            table = %table,
            columns = actual.columns.len(),
            indexes = actual.indexes.len(),
            foreign_keys = actual.foreign_keys.len(),
            "Read live schema"
        );
        Ok(Some(actual))
    }

    async fn read_catalog(
        tx: &mut Transaction<'static, Postgres>,
        table: &TableName,
        qualified: &str,
    ) -> Result<ActualTable> {
        let columns: Vec<ColumnRow> = sqlx::query_as(COLUMNS_SQL)
            .bind(qualified)
            .fetch_all(&mut **tx)
            .await?;
        let primary_key: Option<PrimaryKeyRow> = sqlx::query_as(PRIMARY_KEY_SQL)
            .bind(qualified)
            .fetch_optional(&mut **tx)
            .await?;
        let indexes: Vec<IndexRow> = sqlx::query_as(INDEXES_SQL)
            .bind(qualified)
            .fetch_all(&mut **tx)
            .await?;
        let foreign_keys: Vec<ForeignKeyRow> = sqlx::query_as(FOREIGN_KEYS_SQL)
            .bind(qualified)
            .fetch_all(&mut **tx)
            .await?;

        Ok(ActualTable {
            name: table.clone(),
            columns: columns.into_iter().map(column_from_row).collect(),
            primary_key: primary_key.map(|(name, columns)| ActualPrimaryKey { name, columns }),
            indexes: indexes
                .into_iter()
                .map(|(name, definition)| ActualIndex { name, definition })
                .collect(),
            foreign_keys: foreign_keys
                .into_iter()
                .map(|row| foreign_key_from_row(table, row))
                .collect::<Result<_>>()?,
        })
    }
}

impl SchemaReader for PgSchemaReader {
    type Error = MigrateError;

    async fn fetch_existing(&self, table: &TableName) -> Result<Option<ActualTable>> {
        self.read_table(table).await
    }
}

// ================================================================
// Row conversion
// ================================================================

fn column_from_row((name, data_type, nullable, default): ColumnRow) -> ActualColumn {
    ActualColumn {
        name,
        data_type,
        nullable,
        default,
    }
}

fn foreign_key_from_row(table: &TableName, row: ForeignKeyRow) -> Result<ActualForeignKey> {
    let (name, columns, ref_schema, ref_table, referenced_columns, on_delete, on_update) = row;
    if columns.len() != referenced_columns.len() {
        return Err(MigrateError::Catalog {
            table: table.to_string(),
            message: format!("foreign key {name} pairs {columns:?} with {referenced_columns:?}"),
        });
    }
    let on_delete = action(table, &name, &on_delete)?;
    let on_update = action(table, &name, &on_update)?;
    Ok(ActualForeignKey {
        name,
        columns,
        references: TableName::new(ref_schema, ref_table),
        referenced_columns,
        on_delete,
        on_update,
    })
}

fn action(table: &TableName, constraint: &str, code: &str) -> Result<ForeignKeyAction> {
    let mut chars = code.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => ForeignKeyAction::from_catalog_code(c),
        _ => None,
    }
    .ok_or_else(|| MigrateError::Catalog {
        table: table.to_string(),
        message: format!("foreign key {constraint} has unknown action code '{code}'"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn people() -> TableName {
        TableName::parse("people")
    }

    #[test]
    fn converts_column_rows() {
        let column = column_from_row((
            "id".into(),
            "integer".into(),
            false,
            Some("nextval('people_id_seq'::regclass)".into()),
        ));
        assert_eq!(column.name, "id");
        assert_eq!(column.data_type, "integer");
        assert!(!column.nullable);
        assert!(column.default.is_some());
    }

    #[test]
    fn converts_foreign_key_rows() {
        let fk = foreign_key_from_row(
            &people(),
            (
                "fkey_people_state_id".into(),
                vec!["state_id".into()],
                "crm".into(),
                "states".into(),
                vec!["id".into()],
                "n".into(),
                "a".into(),
            ),
        )
        .unwrap();
        assert_eq!(fk.references, TableName::new("crm", "states"));
        assert_eq!(fk.on_delete, ForeignKeyAction::SetNull);
        assert_eq!(fk.on_update, ForeignKeyAction::NoAction);
    }

    #[test]
    fn rejects_unknown_action_codes() {
        let err = foreign_key_from_row(
            &people(),
            (
                "fkey_people_state_id".into(),
                vec!["state_id".into()],
                "public".into(),
                "states".into(),
                vec!["id".into()],
                "x".into(),
                "a".into(),
            ),
        )
        .unwrap_err();
        assert!(matches!(err, MigrateError::Catalog { .. }));
        assert!(err.to_string().contains("'x'"));
    }

    #[test]
    fn rejects_unpaired_columns() {
        let err = foreign_key_from_row(
            &people(),
            (
                "fkey".into(),
                vec!["a".into(), "b".into()],
                "public".into(),
                "t".into(),
                vec!["a".into()],
                "a".into(),
                "a".into(),
            ),
        )
        .unwrap_err();
        assert!(matches!(err, MigrateError::Catalog { .. }));
    }
}
